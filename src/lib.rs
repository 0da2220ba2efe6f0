/*!
非阻塞的 syslog 级别日志库。

消息先经过级别阈值和过滤器链，再以同一行分发给所有输出目标；
写入不阻塞调用方，I/O 错误累积起来由 [`Logger::flush`] 统一报告。

```rust
use qlogger_rs::{BasicFilter, Logger, MemorySink, info};
use std::sync::Arc;

let sink = Arc::new(MemorySink::new());
let logger = Logger::new("info").unwrap();
logger.add_filter(Arc::new(BasicFilter::new())).add_sink(sink.clone());

info!(logger, "listening on port {}", 8080);
logger.sync().unwrap();
assert!(sink.get_content().ends_with(" [info] listening on port 8080\n"));
```
*/

#![warn(missing_docs)]

pub mod bridge;
pub mod builder;
pub mod error;
pub mod filter;
pub mod format;
pub mod level;
pub mod logger;
pub mod macros;
pub mod message;
pub mod sink;
pub mod timebase;
pub mod timestamps;
pub mod worker;
pub mod writer;

// 公共API导出
pub use crate::bridge::{LogBridge, init_log_bridge};
pub use crate::builder::LoggerBuilder;
pub use crate::error::{Error, FlushError, Result, SinkError};
pub use crate::filter::{Filter, FilterHandle};
pub use crate::format::{BasicFilter, JsonFilter, KubeFilter, PinoFilter};
pub use crate::level::{Level, LevelSpec};
pub use crate::logger::{Logger, SinkSpec};
// 注意：宏通过#[macro_export]自动导出，无需在此处重新导出
pub use crate::message::{ErrorMessage, Message};
pub use crate::sink::{Completion, MemorySink, NullSink, Sink, SinkHandle};
pub use crate::timebase::Timebase;
pub use crate::worker::{Transport, WorkerSink};
pub use crate::writer::{WriterSpec, create_writer, create_writer_with};

/// 从全局时间戳缓存获取当前毫秒时间戳
pub fn get_timestamp() -> u64 {
    timebase::global().get_timestamp()
}

/// 异步获取全局时间戳缓存中的毫秒时间戳
pub fn get_timestamp_async<F>(callback: F)
where
    F: FnOnce(u64) + Send + 'static,
{
    timebase::global().get_timestamp_async(callback)
}
