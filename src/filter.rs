//! 过滤器接口
//!
//! 过滤器接收 `(消息, 级别)`，返回替换后的消息；返回 `None` 表示本次不输出，
//! 日志器随即停止处理该消息，不写入也不记录错误。
//!
//! 闭包自动实现 [`Filter`]，有状态的过滤器用结构体实现即可：
//!
//! ```
//! use qlogger_rs::{Filter, Level, Message};
//!
//! let upper = |msg: Message, _level: Level| Some(Message::from(msg.to_string().to_uppercase()));
//! assert_eq!(upper.filter("hi".into(), Level::Info), Some(Message::from("HI")));
//! ```

use std::sync::Arc;

use crate::Level;
use crate::Message;

/// 过滤器接口
pub trait Filter: Send + Sync {
    /// 变换消息，返回 `None` 时丢弃该消息
    fn filter(&self, message: Message, level: Level) -> Option<Message>;
}

impl<F> Filter for F
where
    F: Fn(Message, Level) -> Option<Message> + Send + Sync,
{
    #[inline]
    fn filter(&self, message: Message, level: Level) -> Option<Message> {
        self(message, level)
    }
}

/// 共享的过滤器句柄，按 `Arc` 身份移除
pub type FilterHandle = Arc<dyn Filter>;

/// 依次应用过滤器，任一过滤器返回 `None` 即停止
pub(crate) fn apply_filters(filters: &[FilterHandle], message: Message, level: Level) -> Option<Message> {
    filters
        .iter()
        .try_fold(message, |current, filter| filter.filter(current, level))
}
