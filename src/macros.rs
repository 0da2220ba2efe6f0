//! 日志宏模块
//!
//! 每个宏的第一个参数是日志器（`Logger`、`&Logger` 或 `Arc<Logger>`），
//! 其余参数与 `format!` 相同。

/// 以指定级别记录日志
///
/// 该宏具有惰性求值特性：只有当日志级别启用或注册了转发器时，才会执行格式化操作，
/// 避免了不必要的字符串格式化开销。
///
/// ```
/// use qlogger_rs::{Level, Logger, log_at};
///
/// let logger = Logger::new("info").unwrap();
/// log_at!(logger, Level::Notice, "disk {}% full", 91);
/// ```
#[macro_export]
macro_rules! log_at {
    ($logger:expr, $lvl:expr, $($arg:tt)+) => ({
        let logger = &$logger;
        let lvl = $lvl;
        if logger.wants(lvl) {
            logger.emit(format!($($arg)+), lvl);
        }
    });
}

/// 以当前阈值级别记录一个或多个值
///
/// 多个值合并为 [`Message::List`](crate::Message::List)，输出时以逗号分隔。
///
/// ```
/// use qlogger_rs::{Logger, log};
///
/// let logger = Logger::new("info").unwrap();
/// log!(logger, "request", 42, true);
/// ```
#[macro_export]
macro_rules! log {
    ($logger:expr, $msg:expr $(,)?) => (
        $logger.log($msg)
    );
    ($logger:expr, $($msg:expr),+ $(,)?) => ({
        let logger = &$logger;
        if logger.wants(logger.level()) {
            logger.log($crate::Message::List(vec![$($crate::Message::from($msg)),+]));
        }
    });
}

/// 记录紧急级别日志
#[macro_export]
macro_rules! emerg {
    ($logger:expr, $($arg:tt)+) => (
        $crate::log_at!($logger, $crate::Level::Emerg, $($arg)+)
    );
}

/// 记录警报级别日志
#[macro_export]
macro_rules! alert {
    ($logger:expr, $($arg:tt)+) => (
        $crate::log_at!($logger, $crate::Level::Alert, $($arg)+)
    );
}

/// 记录严重级别日志
#[macro_export]
macro_rules! crit {
    ($logger:expr, $($arg:tt)+) => (
        $crate::log_at!($logger, $crate::Level::Crit, $($arg)+)
    );
}

/// 记录错误级别日志
#[macro_export]
macro_rules! error {
    ($logger:expr, $($arg:tt)+) => (
        $crate::log_at!($logger, $crate::Level::Error, $($arg)+)
    );
}

/// 记录警告级别日志
#[macro_export]
macro_rules! warn {
    ($logger:expr, $($arg:tt)+) => (
        $crate::log_at!($logger, $crate::Level::Warning, $($arg)+)
    );
}

/// 记录通知级别日志
#[macro_export]
macro_rules! notice {
    ($logger:expr, $($arg:tt)+) => (
        $crate::log_at!($logger, $crate::Level::Notice, $($arg)+)
    );
}

/// 记录信息级别日志
#[macro_export]
macro_rules! info {
    ($logger:expr, $($arg:tt)+) => (
        $crate::log_at!($logger, $crate::Level::Info, $($arg)+)
    );
}

/// 记录调试级别日志
#[macro_export]
macro_rules! debug {
    ($logger:expr, $($arg:tt)+) => (
        $crate::log_at!($logger, $crate::Level::Debug, $($arg)+)
    );
}

/// 记录跟踪级别日志
#[macro_export]
macro_rules! trace {
    ($logger:expr, $($arg:tt)+) => (
        $crate::log_at!($logger, $crate::Level::Trace, $($arg)+)
    );
}
