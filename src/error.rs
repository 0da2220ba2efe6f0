/*!
日志库的错误处理模块。

错误分为两条通道：

- [`Error`]：同步返回的编程错误（无效日志级别、无法识别的输出目标等），
  在调用点立即返回；
- [`SinkError`]：运行期 I/O 故障，只通过写入完成回调累积，
  由 [`Logger::flush`](crate::Logger::flush) 以 [`FlushError`] 的形式交给调用方。
*/

use std::io;
use std::sync::Arc;

/// 同步错误类型
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// 无法识别的日志级别说明
    #[error("{0}: unrecognized loglevel")]
    InvalidLevel(String),

    /// 无法识别的输出目标说明
    #[error("{0}: unrecognized log writer spec")]
    UnsupportedWriterSpec(String),

    /// 网络输出目标无法建立连接
    #[error("{spec}: unable to connect: {source}")]
    SinkConnect {
        /// 输出目标说明
        spec: String,
        /// 底层错误
        #[source]
        source: io::Error,
    },

    /// 全局桥接日志器已经安装
    #[error("logger already initialized")]
    AlreadyInitialized,

    /// I/O错误，如文件打开失败
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// 输出目标写入或刷新失败的错误
///
/// 可克隆，同一批次失败时每个受影响的写入都能拿到同一个错误。
#[derive(Debug, Clone, thiserror::Error)]
pub enum SinkError {
    /// 单个数据报超过传输层上限
    #[error("log line longer than max UDP message size ({len} > {max})")]
    DatagramTooLarge {
        /// 行长度（字节）
        len: usize,
        /// 允许的最大长度
        max: usize,
    },

    /// 写入或刷新时的I/O错误
    #[error("write error: {0}")]
    Write(Arc<io::Error>),

    /// 输出目标在写入时 panic
    #[error("sink panicked: {0}")]
    Panicked(String),

    /// 自定义输出目标报告的其他错误
    #[error("{0}")]
    Other(String),
}

impl SinkError {
    /// 用任意消息构造错误，供自定义输出目标使用
    pub fn other(msg: impl Into<String>) -> Self {
        SinkError::Other(msg.into())
    }
}

impl From<io::Error> for SinkError {
    fn from(err: io::Error) -> Self {
        SinkError::Write(Arc::new(err))
    }
}

/// flush 交付的累积错误
///
/// 只有一个错误时为 `Single`，多个时按发生顺序保存在 `Multiple` 中。
#[derive(Debug, Clone, thiserror::Error)]
pub enum FlushError {
    /// 恰好一个错误
    #[error("{0}")]
    Single(SinkError),

    /// 多个错误
    #[error("{} write errors", .0.len())]
    Multiple(Vec<SinkError>),
}

impl FlushError {
    /// 由已排空的错误列表构造，空列表返回 `None`
    pub(crate) fn from_drained(mut errors: Vec<SinkError>) -> Option<Self> {
        match errors.len() {
            0 => None,
            1 => errors.pop().map(FlushError::Single),
            _ => Some(FlushError::Multiple(errors)),
        }
    }

    /// 按顺序返回全部错误
    pub fn errors(&self) -> &[SinkError] {
        match self {
            FlushError::Single(err) => std::slice::from_ref(err),
            FlushError::Multiple(errors) => errors,
        }
    }

    /// 错误个数
    pub fn len(&self) -> usize {
        self.errors().len()
    }

    /// 总是至少包含一个错误
    pub fn is_empty(&self) -> bool {
        self.errors().is_empty()
    }
}

/// 结果类型别名，简化错误处理
pub type Result<T> = std::result::Result<T, Error>;
