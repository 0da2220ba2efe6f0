/*!
`log` 门面桥接。

把 [`Logger`] 安装为 `log` crate 的全局日志器后，依赖库通过 `log::info!` 等宏
输出的记录也会经过同一条过滤器链和输出目标。

```no_run
use qlogger_rs::{Logger, init_log_bridge};
use std::sync::Arc;

let logger = Arc::new(Logger::with_sink("debug", "stderr://").unwrap());
init_log_bridge(logger).unwrap();

log::info!("routed through qlogger");
```
*/

use std::sync::Arc;

use log::{LevelFilter, Metadata, Record};

use crate::error::Error;
use crate::level::Level;
use crate::logger::Logger;

/// 把 `log` 的级别映射到本库的级别
pub fn from_log_level(level: log::Level) -> Level {
    match level {
        log::Level::Error => Level::Error,
        log::Level::Warn => Level::Warning,
        log::Level::Info => Level::Info,
        log::Level::Debug => Level::Debug,
        log::Level::Trace => Level::Trace,
    }
}

/// 实现 `log::Log` 的桥接日志器
pub struct LogBridge {
    logger: Arc<Logger>,
}

impl LogBridge {
    /// 包装日志器
    pub fn new(logger: Arc<Logger>) -> Self {
        Self { logger }
    }

    /// 被包装的日志器
    pub fn logger(&self) -> &Arc<Logger> {
        &self.logger
    }
}

impl log::Log for LogBridge {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.logger.wants(from_log_level(metadata.level()))
    }

    fn log(&self, record: &Record) {
        let level = from_log_level(record.level());
        if !self.logger.wants(level) {
            return;
        }
        self.logger.emit(record.args().to_string(), level);
    }

    fn flush(&self) {
        let _ = self.logger.sync();
    }
}

/// 把日志器安装为 `log` 的全局日志器，进程内只能安装一次
///
/// 级别由日志器自身的阈值控制，`log` 的最大级别设为 `Trace`。
pub fn init_log_bridge(logger: Arc<Logger>) -> Result<(), Error> {
    log::set_boxed_logger(Box::new(LogBridge::new(logger))).map_err(|_| Error::AlreadyInitialized)?;
    log::set_max_level(LevelFilter::Trace);
    Ok(())
}
