/*!
日志输出目标。

输出目标只需提供非阻塞的 `write(line, done)`：调用方不等待 I/O，
写入结果通过 [`Completion`] 回报。`flush` 与 `is_busy` 可选，
仅供日志器的 flush 屏障使用。
*/

use std::fmt;
use std::sync::{Arc, Mutex};

use crate::error::SinkError;

type CompletionFn = Box<dyn FnOnce(Result<(), SinkError>) + Send>;

/// 写入或刷新的完成通知
///
/// 每个 `Completion` 恰好触发一次：显式调用 [`Completion::complete`]，
/// 或者在未调用的情况下被丢弃（视为成功完成）。
pub struct Completion {
    callback: Option<CompletionFn>,
}

impl Completion {
    /// 用回调创建完成通知
    pub fn new<F>(callback: F) -> Self
    where
        F: FnOnce(Result<(), SinkError>) + Send + 'static,
    {
        Self {
            callback: Some(Box::new(callback)),
        }
    }

    /// 报告完成结果
    #[inline]
    pub fn complete(mut self, result: Result<(), SinkError>) {
        if let Some(callback) = self.callback.take() {
            callback(result);
        }
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        if let Some(callback) = self.callback.take() {
            callback(Ok(()));
        }
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("pending", &self.callback.is_some())
            .finish()
    }
}

/// 输出目标接口
pub trait Sink: Send + Sync {
    /// 写入一行（已含换行符），不得阻塞调用方，完成后触发 `done`
    fn write(&self, line: Arc<str>, done: Completion);

    /// 刷新内部缓冲，默认立即完成
    fn flush(&self, done: Completion) {
        done.complete(Ok(()));
    }

    /// 是否仍有缓冲未写出或写入进行中
    fn is_busy(&self) -> bool {
        false
    }
}

/// 共享的输出目标句柄，按 `Arc` 身份移除
pub type SinkHandle = Arc<dyn Sink>;

/// 内存输出目标（用于测试和调试）
pub struct MemorySink {
    /// 已写入的行
    lines: Mutex<Vec<String>>,
}

impl MemorySink {
    /// 创建新的内存输出目标
    pub fn new() -> Self {
        Self {
            lines: Mutex::new(Vec::new()),
        }
    }

    /// 获取已写入的行
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// 获取全部内容
    pub fn get_content(&self) -> String {
        self.lines.lock().unwrap_or_else(|e| e.into_inner()).concat()
    }

    /// 清空缓冲区
    pub fn clear(&self) {
        self.lines.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl Sink for MemorySink {
    fn write(&self, line: Arc<str>, done: Completion) {
        self.lines
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(line.to_string());
        done.complete(Ok(()));
    }
}

/// 空输出目标，丢弃所有数据
#[derive(Default)]
pub struct NullSink;

impl NullSink {
    /// 创建新的空输出目标
    pub fn new() -> Self {
        Self
    }
}

impl Sink for NullSink {
    #[inline]
    fn write(&self, _line: Arc<str>, done: Completion) {
        done.complete(Ok(()));
    }
}
