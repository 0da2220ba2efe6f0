//! 日志级别定义
//!
//! 与 syslog 相同的数值刻度：数值越小越严重。另有两个哨兵级别，
//! `All` 放行所有消息，`None` 拒绝所有消息。

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// 日志级别枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(i8)]
pub enum Level {
    /// 拒绝所有消息的阈值
    None = -1,
    /// 系统不可用
    Emerg = 0,
    /// 必须立即处理
    Alert = 1,
    /// 严重情况
    Crit = 2,
    /// 错误
    Error = 3,
    /// 警告
    Warning = 4,
    /// 正常但值得注意
    Notice = 5,
    /// 常规信息
    #[default]
    Info = 6,
    /// 调试信息
    Debug = 7,
    /// 跟踪信息
    Trace = 8,
    /// 放行所有消息的阈值
    All = 9,
}

lazy_static! {
    /// 可识别的级别名称（小写），程序启动后只读
    static ref LEVEL_NAMES: HashMap<&'static str, Level> = {
        let mut names = HashMap::new();
        for level in Level::ALL_LEVELS {
            names.insert(level.name(), level);
        }
        for (alias, level) in [
            ("err", Level::Error),
            ("warn", Level::Warning),
        ] {
            names.insert(alias, level);
        }
        names
    };
}

impl Level {
    /// 全部级别，按数值升序
    pub const ALL_LEVELS: [Level; 11] = [
        Level::None,
        Level::Emerg,
        Level::Alert,
        Level::Crit,
        Level::Error,
        Level::Warning,
        Level::Notice,
        Level::Info,
        Level::Debug,
        Level::Trace,
        Level::All,
    ];

    /// 数值代码
    #[inline]
    pub fn code(self) -> i32 {
        self as i32
    }

    /// 由数值代码查找级别
    pub fn from_code(code: i32) -> Option<Level> {
        Self::ALL_LEVELS.into_iter().find(|level| level.code() == code)
    }

    /// 级别名称，用于过滤器输出
    pub fn name(self) -> &'static str {
        match self {
            Level::None => "none",
            Level::Emerg => "emerg",
            Level::Alert => "alert",
            Level::Crit => "crit",
            Level::Error => "error",
            Level::Warning => "warning",
            Level::Notice => "notice",
            Level::Info => "info",
            Level::Debug => "debug",
            Level::Trace => "trace",
            Level::All => "all",
        }
    }
}

impl FromStr for Level {
    type Err = Error;

    /// 从字符串解析级别，大小写不敏感，接受 `log_` 前缀和数值代码
    fn from_str(s: &str) -> Result<Self, Error> {
        let lower = s.trim().to_ascii_lowercase();
        let name = lower.strip_prefix("log_").unwrap_or(lower.as_str());
        if let Some(level) = LEVEL_NAMES.get(name) {
            return Ok(*level);
        }
        name.parse::<i32>()
            .ok()
            .and_then(Level::from_code)
            .ok_or_else(|| Error::InvalidLevel(s.to_string()))
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 级别说明：名称、数值代码或现成的级别
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LevelSpec {
    /// 级别名称，如 `"info"`、`"LOG_ERR"`、`"7"`
    Name(String),
    /// 数值代码
    Code(i32),
    /// 已解析的级别
    Level(Level),
}

impl LevelSpec {
    /// 解析为级别，无法识别时返回 [`Error::InvalidLevel`]
    pub fn resolve(&self) -> Result<Level, Error> {
        match self {
            LevelSpec::Name(name) => name.parse(),
            LevelSpec::Code(code) => {
                Level::from_code(*code).ok_or_else(|| Error::InvalidLevel(code.to_string()))
            }
            LevelSpec::Level(level) => Ok(*level),
        }
    }
}

impl From<&str> for LevelSpec {
    fn from(name: &str) -> Self {
        LevelSpec::Name(name.to_string())
    }
}

impl From<String> for LevelSpec {
    fn from(name: String) -> Self {
        LevelSpec::Name(name)
    }
}

impl From<i32> for LevelSpec {
    fn from(code: i32) -> Self {
        LevelSpec::Code(code)
    }
}

impl From<Level> for LevelSpec {
    fn from(level: Level) -> Self {
        LevelSpec::Level(level)
    }
}
