/*!
时间戳格式化。

所有格式化函数都接受可选的毫秒时间戳，缺省时读取全局 [`Timebase`](crate::Timebase)。
格式中不随毫秒变化的前缀（到分钟或到秒）会被缓存，同一分钟内只格式化一次。

| 函数 | 示例 | 时区 |
|------|------|------|
| [`format_iso_date`] | `2014-10-19 01:23:45` | 本地 |
| [`format_iso_date_utc`] | `2014-10-19 01:23:45` | UTC |
| [`format_basic_date`] | `2014-10-19 01:23:45.678` | 本地 |
| [`format_numeric_date_utc`] | `20190201021637.368` | UTC |
| [`format_js_date_iso_string`] | `2019-02-01T02:16:37.368Z` | UTC |
| [`format_json_date`] | `2019-02-01T02:16:37.368Z` | UTC |
| [`format_raw_timestamp`] | `1549001797368` | - |
*/

use std::fmt::Write;
use std::sync::Mutex;

use chrono::{Local, TimeZone};
use time::OffsetDateTime;
use time::macros::format_description;

use crate::timebase;

const MINUTE: u64 = 60_000;
const SECOND: u64 = 1_000;

/// 按周期缓存格式化前缀
struct PrefixCache {
    period: u64,
    render: fn(u64) -> String,
    saved: Mutex<Option<(u64, String)>>,
}

impl PrefixCache {
    const fn new(period: u64, render: fn(u64) -> String) -> Self {
        Self {
            period,
            render,
            saved: Mutex::new(None),
        }
    }

    fn write_prefix(&self, millis: u64, out: &mut String) {
        let key = millis - millis % self.period;
        // 竞争时不等待，直接格式化
        let Ok(mut saved) = self.saved.try_lock() else {
            out.push_str(&(self.render)(key));
            return;
        };
        match saved.as_ref() {
            Some((saved_key, prefix)) if *saved_key == key => out.push_str(prefix),
            _ => {
                let prefix = (self.render)(key);
                out.push_str(&prefix);
                *saved = Some((key, prefix));
            }
        }
    }
}

static SQL_LOCAL: PrefixCache = PrefixCache::new(MINUTE, |ms| local_minutes(ms, "%Y-%m-%d %H:%M:"));
static SQL_UTC: PrefixCache = PrefixCache::new(MINUTE, |ms| {
    utc_minutes(ms, |dt| dt.format(format_description!("[year]-[month]-[day] [hour]:[minute]:")))
});
static NUMERIC_UTC: PrefixCache = PrefixCache::new(MINUTE, |ms| {
    utc_minutes(ms, |dt| dt.format(format_description!("[year][month][day][hour][minute]")))
});
static ISO_UTC: PrefixCache = PrefixCache::new(SECOND, |ms| {
    utc_minutes(ms, |dt| dt.format(format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]")))
});

fn local_minutes(millis: u64, pattern: &str) -> String {
    match Local.timestamp_millis_opt(millis as i64).earliest() {
        Some(dt) => dt.format(pattern).to_string(),
        None => String::new(),
    }
}

fn utc_minutes<F>(millis: u64, render: F) -> String
where
    F: FnOnce(OffsetDateTime) -> Result<String, time::error::Format>,
{
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000)
        .ok()
        .and_then(|dt| render(dt).ok())
        .unwrap_or_default()
}

#[inline]
fn resolve(millis: Option<u64>) -> u64 {
    millis.unwrap_or_else(|| timebase::global().get_timestamp())
}

fn seconds_of(millis: u64) -> u64 {
    millis / 1000 % 60
}

/// 本地时间 `YYYY-MM-DD HH:MM:SS`
pub fn format_iso_date(millis: Option<u64>) -> String {
    let ms = resolve(millis);
    let mut out = String::with_capacity(19);
    SQL_LOCAL.write_prefix(ms, &mut out);
    let _ = write!(out, "{:02}", seconds_of(ms));
    out
}

/// UTC 时间 `YYYY-MM-DD HH:MM:SS`
pub fn format_iso_date_utc(millis: Option<u64>) -> String {
    let ms = resolve(millis);
    let mut out = String::with_capacity(19);
    SQL_UTC.write_prefix(ms, &mut out);
    let _ = write!(out, "{:02}", seconds_of(ms));
    out
}

/// 本地时间 `YYYY-MM-DD HH:MM:SS.mmm`，基本过滤器使用的格式
pub fn format_basic_date(millis: Option<u64>) -> String {
    let ms = resolve(millis);
    let mut out = String::with_capacity(23);
    SQL_LOCAL.write_prefix(ms, &mut out);
    let _ = write!(out, "{:02}.{:03}", seconds_of(ms), ms % 1000);
    out
}

/// UTC 纯数字 `YYYYMMDDHHMMSS.mmm`
pub fn format_numeric_date_utc(millis: Option<u64>) -> String {
    let ms = resolve(millis);
    let mut out = String::with_capacity(18);
    NUMERIC_UTC.write_prefix(ms, &mut out);
    let _ = write!(out, "{:02}.{:03}", seconds_of(ms), ms % 1000);
    out
}

/// UTC ISO-8601 `YYYY-MM-DDTHH:MM:SS.mmmZ`
pub fn format_js_date_iso_string(millis: Option<u64>) -> String {
    let ms = resolve(millis);
    let mut out = String::with_capacity(24);
    ISO_UTC.write_prefix(ms, &mut out);
    let _ = write!(out, ".{:03}Z", ms % 1000);
    out
}

/// 同 [`format_js_date_iso_string`]
pub fn format_json_date(millis: Option<u64>) -> String {
    format_js_date_iso_string(millis)
}

/// 自 UNIX EPOCH 起的毫秒数
pub fn format_raw_timestamp(millis: Option<u64>) -> String {
    resolve(millis).to_string()
}

/// 补零到 2 位
pub fn pad2(n: u64) -> String {
    format!("{:02}", n)
}

/// 补零到 3 位
pub fn pad3(n: u64) -> String {
    format!("{:03}", n)
}

/// 补零到 4 位
pub fn pad4(n: u64) -> String {
    format!("{:04}", n)
}
