/*!
独立的Builder模块，用于构建 [`Logger`] 实例。

该模块提供Builder模式，以流畅的方式配置级别、过滤器和输出目标：

```rust
use qlogger_rs::LoggerBuilder;

let logger = LoggerBuilder::new()
    .level("debug")
    .level_from_env("APP_LOGLEVEL")
    .with_basic_filter()
    .writer("null://")
    .build()
    .unwrap();
logger.debug("ready");
```
*/

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::error::Error;
use crate::filter::FilterHandle;
use crate::format::{BasicFilter, JsonFilter};
use crate::level::{Level, LevelSpec};
use crate::logger::{DEFAULT_POLL_INTERVAL, Logger, SinkSpec};
use crate::sink::SinkHandle;

/// 构建器模式配置
#[derive(Clone)]
pub struct LoggerBuilder {
    level: LevelSpec,
    relays: Vec<FilterHandle>,
    filters: Vec<FilterHandle>,
    sinks: Vec<SinkSpec>,
    poll_interval: Duration,
}

impl Default for LoggerBuilder {
    fn default() -> Self {
        Self {
            level: LevelSpec::Level(Level::Info),
            relays: Vec::new(),
            filters: Vec::new(),
            sinks: Vec::new(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl LoggerBuilder {
    /// 创建新的构建器
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置日志级别，无效的级别在 `build` 时报错
    pub fn level(mut self, level: impl Into<LevelSpec>) -> Self {
        self.level = level.into();
        self
    }

    /// 从环境变量读取日志级别，变量未设置时保持当前级别
    pub fn level_from_env(mut self, var: &str) -> Self {
        if let Ok(value) = std::env::var(var) {
            self.level = LevelSpec::Name(value);
        }
        self
    }

    /// 追加输出目标
    pub fn sink(mut self, sink: SinkHandle) -> Self {
        self.sinks.push(SinkSpec::Handle(sink));
        self
    }

    /// 追加按 URI 创建的输出目标，如 `"stderr://"`、`"file:///var/log/app.log"`
    pub fn writer(mut self, spec: impl Into<String>) -> Self {
        self.sinks.push(SinkSpec::Uri(spec.into()));
        self
    }

    /// 追加过滤器
    pub fn filter(mut self, filter: FilterHandle) -> Self {
        self.filters.push(filter);
        self
    }

    /// 追加转发器，收到级别判断之前的每条原始消息
    pub fn relay(mut self, relay: FilterHandle) -> Self {
        self.relays.push(relay);
        self
    }

    /// 使用基本过滤器 (便捷方法)
    pub fn with_basic_filter(self) -> Self {
        self.filter(Arc::new(BasicFilter::new()))
    }

    /// 使用默认模板的JSON过滤器 (便捷方法)
    pub fn with_json_filter(self) -> Self {
        self.filter(Arc::new(JsonFilter::new()))
    }

    /// 使用控制台输出 (便捷方法)
    pub fn with_console_output(self) -> Self {
        self.writer("stdout://")
    }

    /// 使用文件输出 (便捷方法)
    pub fn with_file_output<P: AsRef<Path>>(self, path: P) -> Self {
        let spec = format!("file://{}", path.as_ref().display());
        self.writer(spec)
    }

    /// 设置 flush 屏障的轮询间隔
    pub fn flush_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// 构建 Logger 实例
    pub fn build(self) -> Result<Logger, Error> {
        let level = self.level.resolve()?;
        let sinks = self
            .sinks
            .into_iter()
            .map(SinkSpec::resolve)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Logger::with_parts(level, self.relays, self.filters, sinks, self.poll_interval))
    }
}
