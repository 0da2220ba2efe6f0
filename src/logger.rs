/*!
日志器核心：级别过滤、过滤器链、多目标并发写入与 flush 屏障。

## 特性

- 非阻塞写入：消息经过滤器链后分发给所有输出目标，不等待任何写入完成
- 转发：每条消息在级别判断之前原样交给所有转发器，不受阈值影响
- 错误累积：写入和刷新失败只记录下来，由 `flush` 统一交付，热路径从不报错
- 故障隔离：单个输出目标 panic 不会影响其他目标和后续日志
- flush 屏障：等待所有进行中的写入与目标内部缓冲排空后回调
- 线程安全：可通过 `Arc` 在多个线程间共享

## 使用示例

```rust
use qlogger_rs::{Logger, MemorySink};
use std::sync::Arc;

let sink = Arc::new(MemorySink::new());
let logger = Logger::new("info").unwrap();
logger.add_sink(sink.clone());

logger.debug("x");
logger.info("hello");
logger.sync().unwrap();

assert_eq!(sink.lines(), vec!["hello\n"]);
```
*/

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicI8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock, mpsc};
use std::thread;
use std::time::Duration;

use crossbeam_queue::SegQueue;

use crate::error::{Error, FlushError, SinkError};
use crate::filter::{FilterHandle, apply_filters};
use crate::level::{Level, LevelSpec};
use crate::message::Message;
use crate::sink::{Completion, SinkHandle};
use crate::writer::create_writer;

/// flush 屏障默认的轮询间隔
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// 输出目标说明：现成的句柄，或交给 [`create_writer`] 解析的 URI
#[derive(Clone)]
pub enum SinkSpec {
    /// 现成的输出目标
    Handle(SinkHandle),
    /// URI 形式的说明，如 `"stdout://"`
    Uri(String),
}

impl SinkSpec {
    pub(crate) fn resolve(self) -> Result<SinkHandle, Error> {
        match self {
            SinkSpec::Handle(sink) => Ok(sink),
            SinkSpec::Uri(spec) => create_writer(&spec),
        }
    }
}

impl From<SinkHandle> for SinkSpec {
    fn from(sink: SinkHandle) -> Self {
        SinkSpec::Handle(sink)
    }
}

impl From<&str> for SinkSpec {
    fn from(spec: &str) -> Self {
        SinkSpec::Uri(spec.to_string())
    }
}

impl From<String> for SinkSpec {
    fn from(spec: String) -> Self {
        SinkSpec::Uri(spec)
    }
}

/// 写入计数与累积错误，由完成回调共享
#[derive(Default)]
struct WriteState {
    pending: AtomicUsize,
    errors: SegQueue<SinkError>,
}

impl WriteState {
    fn complete(&self, result: Result<(), SinkError>) {
        // 先记录错误再递减计数，flush 看到计数归零时错误已可见
        if let Err(e) = result {
            self.errors.push(e);
        }
        self.pending.fetch_sub(1, Ordering::AcqRel);
    }

    fn drain(&self) -> Vec<SinkError> {
        let mut errors = Vec::with_capacity(self.errors.len());
        while let Some(e) = self.errors.pop() {
            errors.push(e);
        }
        errors
    }
}

/// 日志器
pub struct Logger {
    threshold: AtomicI8,
    relays: RwLock<Vec<FilterHandle>>,
    relay_count: AtomicUsize,
    filters: RwLock<Vec<FilterHandle>>,
    sinks: RwLock<Vec<SinkHandle>>,
    state: Arc<WriteState>,
    poll_interval: Duration,
}

impl Logger {
    /// 创建新的日志器构建器
    pub fn builder() -> crate::builder::LoggerBuilder {
        crate::builder::LoggerBuilder::new()
    }

    /// 创建没有输出目标的日志器
    pub fn new(level: impl Into<LevelSpec>) -> Result<Self, Error> {
        let level = resolve_level(level)?;
        Ok(Self::with_parts(level, Vec::new(), Vec::new(), Vec::new(), DEFAULT_POLL_INTERVAL))
    }

    /// 创建日志器并注册第一个输出目标
    pub fn with_sink(level: impl Into<LevelSpec>, sink: impl Into<SinkSpec>) -> Result<Self, Error> {
        let level = resolve_level(level)?;
        let sink = SinkSpec::resolve(sink.into())?;
        Ok(Self::with_parts(level, Vec::new(), Vec::new(), vec![sink], DEFAULT_POLL_INTERVAL))
    }

    pub(crate) fn with_parts(
        level: Level,
        relays: Vec<FilterHandle>,
        filters: Vec<FilterHandle>,
        sinks: Vec<SinkHandle>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            threshold: AtomicI8::new(level as i8),
            relay_count: AtomicUsize::new(relays.len()),
            relays: RwLock::new(relays),
            filters: RwLock::new(filters),
            sinks: RwLock::new(sinks),
            state: Arc::new(WriteState::default()),
            poll_interval,
        }
    }

    /// 获取当前日志级别阈值
    #[inline]
    pub fn level(&self) -> Level {
        Level::from_code(i32::from(self.threshold.load(Ordering::Relaxed))).unwrap_or_default()
    }

    /// 设置日志级别阈值，返回原来的级别；无法识别时保持原级别不变
    pub fn set_level(&self, level: impl Into<LevelSpec>) -> Result<Level, Error> {
        let level = resolve_level(level)?;
        let previous = self.threshold.swap(level as i8, Ordering::Relaxed);
        Ok(Level::from_code(i32::from(previous)).unwrap_or_default())
    }

    /// 检查指定级别的消息是否会被输出
    #[inline]
    pub fn enabled(&self, level: Level) -> bool {
        let threshold = self.level();
        threshold != Level::None && level <= threshold
    }

    /// 指定级别的消息是否有人接收：会被输出，或者注册了转发器
    #[inline]
    pub fn wants(&self, level: Level) -> bool {
        self.relay_count.load(Ordering::Acquire) > 0 || self.enabled(level)
    }

    /// 系统不可用
    pub fn emerg(&self, message: impl Into<Message>) {
        self.emit(message, Level::Emerg);
    }

    /// 必须立即处理
    pub fn alert(&self, message: impl Into<Message>) {
        self.emit(message, Level::Alert);
    }

    /// 严重情况
    pub fn crit(&self, message: impl Into<Message>) {
        self.emit(message, Level::Crit);
    }

    /// 错误
    pub fn error(&self, message: impl Into<Message>) {
        self.emit(message, Level::Error);
    }

    /// `error` 的 syslog 风格别名
    pub fn err(&self, message: impl Into<Message>) {
        self.emit(message, Level::Error);
    }

    /// 警告
    pub fn warning(&self, message: impl Into<Message>) {
        self.emit(message, Level::Warning);
    }

    /// `warning` 的别名
    pub fn warn(&self, message: impl Into<Message>) {
        self.emit(message, Level::Warning);
    }

    /// 正常但值得注意
    pub fn notice(&self, message: impl Into<Message>) {
        self.emit(message, Level::Notice);
    }

    /// 常规信息
    pub fn info(&self, message: impl Into<Message>) {
        self.emit(message, Level::Info);
    }

    /// 调试信息
    pub fn debug(&self, message: impl Into<Message>) {
        self.emit(message, Level::Debug);
    }

    /// 跟踪信息
    pub fn trace(&self, message: impl Into<Message>) {
        self.emit(message, Level::Trace);
    }

    /// 以当前阈值级别记录消息
    ///
    /// 多个参数请传入 `Vec` 或使用 [`log!`](crate::log) 宏，它们会合并成 [`Message::List`]。
    pub fn log(&self, message: impl Into<Message>) {
        self.emit(message, self.level());
    }

    /// 记录消息（非阻塞）
    ///
    /// 先把原始消息交给每个转发器；级别高于阈值时随后返回，否则依次应用过滤器，
    /// 补齐换行符，然后把同一行分发给每个输出目标，不等待写入完成。
    pub fn emit(&self, message: impl Into<Message>, level: Level) {
        if self.relay_count.load(Ordering::Acquire) == 0 {
            if self.enabled(level) {
                self.process(message.into(), level);
            }
            return;
        }

        let message = message.into();
        {
            let relays = self.relays.read().unwrap_or_else(|e| e.into_inner());
            for relay in relays.iter() {
                let _ = relay.filter(message.clone(), level);
            }
        }
        if self.enabled(level) {
            self.process(message, level);
        }
    }

    fn process(&self, message: Message, level: Level) {
        let filtered = {
            let filters = self.filters.read().unwrap_or_else(|e| e.into_inner());
            apply_filters(&filters, message, level)
        };
        let Some(message) = filtered else {
            return;
        };
        if message.is_blank() {
            return;
        }

        let mut text = message.into_text();
        if !text.ends_with('\n') {
            text.push('\n');
        }
        let line: Arc<str> = Arc::from(text);

        let sinks = self.sinks.read().unwrap_or_else(|e| e.into_inner());
        for sink in sinks.iter() {
            self.dispatch(sink, line.clone());
        }
    }

    fn dispatch(&self, sink: &SinkHandle, line: Arc<str>) {
        // 一个计数属于完成通知，另一个在派发结束后释放：
        // panic 时完成通知随栈展开先被丢弃，错误入队之前计数不能归零
        self.state.pending.fetch_add(2, Ordering::AcqRel);
        let state = self.state.clone();
        let done = Completion::new(move |result| state.complete(result));

        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| sink.write(line, done))) {
            self.state
                .errors
                .push(SinkError::Panicked(panic_message(payload.as_ref())));
        }
        self.state.pending.fetch_sub(1, Ordering::AcqRel);
    }

    /// 追加转发器
    ///
    /// 转发器在级别判断和过滤器之前收到每一条消息的原样副本，返回值被忽略。
    pub fn add_relay(&self, relay: FilterHandle) -> &Self {
        let mut relays = self.relays.write().unwrap_or_else(|e| e.into_inner());
        relays.push(relay);
        self.relay_count.store(relays.len(), Ordering::Release);
        self
    }

    /// 移除第一个相同的转发器（按 `Arc` 身份），不存在时不做任何事
    pub fn remove_relay(&self, relay: &FilterHandle) -> &Self {
        let removed = {
            let mut relays = self.relays.write().unwrap_or_else(|e| e.into_inner());
            let removed = relays
                .iter()
                .position(|r| Arc::ptr_eq(r, relay))
                .map(|pos| relays.remove(pos));
            self.relay_count.store(relays.len(), Ordering::Release);
            removed
        };
        drop(removed);
        self
    }

    /// 当前的转发器序列
    pub fn relays(&self) -> Vec<FilterHandle> {
        self.relays.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// 追加过滤器
    pub fn add_filter(&self, filter: FilterHandle) -> &Self {
        self.filters
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(filter);
        self
    }

    /// 移除第一个相同的过滤器（按 `Arc` 身份），不存在时不做任何事
    pub fn remove_filter(&self, filter: &FilterHandle) -> &Self {
        let removed = {
            let mut filters = self.filters.write().unwrap_or_else(|e| e.into_inner());
            filters
                .iter()
                .position(|f| Arc::ptr_eq(f, filter))
                .map(|pos| filters.remove(pos))
        };
        drop(removed);
        self
    }

    /// 当前的过滤器序列
    pub fn filters(&self) -> Vec<FilterHandle> {
        self.filters.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// 追加输出目标
    pub fn add_sink(&self, sink: SinkHandle) -> &Self {
        self.sinks
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(sink);
        self
    }

    /// 按说明创建并追加输出目标
    pub fn add_writer(&self, spec: impl Into<SinkSpec>) -> Result<&Self, Error> {
        let sink = SinkSpec::resolve(spec.into())?;
        Ok(self.add_sink(sink))
    }

    /// 移除第一个相同的输出目标（按 `Arc` 身份），不存在时不做任何事
    pub fn remove_sink(&self, sink: &SinkHandle) -> &Self {
        // 在锁外释放，输出目标析构时可能再次写日志
        let removed = {
            let mut sinks = self.sinks.write().unwrap_or_else(|e| e.into_inner());
            sinks
                .iter()
                .position(|s| Arc::ptr_eq(s, sink))
                .map(|pos| sinks.remove(pos))
        };
        drop(removed);
        self
    }

    /// 当前的输出目标序列
    pub fn sinks(&self) -> Vec<SinkHandle> {
        self.sinks.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// 已发出但尚未完成的写入数
    pub fn pending_writes(&self) -> usize {
        self.state.pending.load(Ordering::Acquire)
    }

    /// 记录在完成通知之外发现的错误，由下一次 flush 报告
    pub fn report_error(&self, err: impl Into<SinkError>) {
        self.state.errors.push(err.into());
    }

    /// 刷新日志，等待所有写入完成后回调
    ///
    /// 先对每个输出目标发起 flush，再在后台线程上轮询：只要还有进行中的写入、
    /// 未完成的目标 flush 或忙碌的目标就继续等待；一旦累积了错误则立即结束。
    /// 回调拿到自上次 flush 以来累积的全部错误，回调总是异步执行。
    ///
    /// 没有超时：卡住的输出目标会让回调永远不被调用。
    pub fn flush<F>(&self, callback: F)
    where
        F: FnOnce(Result<(), FlushError>) + Send + 'static,
    {
        let sinks = self.sinks();
        let state = self.state.clone();
        let poll_interval = self.poll_interval;
        let outstanding = Arc::new(AtomicUsize::new(0));

        for sink in &sinks {
            outstanding.fetch_add(1, Ordering::AcqRel);
            let state = state.clone();
            let outstanding = outstanding.clone();
            let done = Completion::new(move |result| {
                if let Err(e) = result {
                    state.errors.push(e);
                }
                outstanding.fetch_sub(1, Ordering::AcqRel);
            });
            // 同步 panic 的 flush 视为立即完成
            let _ = panic::catch_unwind(AssertUnwindSafe(|| sink.flush(done)));
        }

        let barrier = move || {
            loop {
                let busy = state.pending.load(Ordering::Acquire) > 0
                    || outstanding.load(Ordering::Acquire) > 0
                    || sinks.iter().any(|sink| sink.is_busy());
                if !busy || !state.errors.is_empty() {
                    break;
                }
                thread::sleep(poll_interval);
            }
            match FlushError::from_drained(state.drain()) {
                None => callback(Ok(())),
                Some(err) => callback(Err(err)),
            }
        };

        let task = Arc::new(Mutex::new(Some(barrier)));
        let task_c = task.clone();
        let spawned = thread::Builder::new()
            .name("qlogger-flush".to_string())
            .spawn(move || {
                if let Some(run) = task_c.lock().unwrap_or_else(|e| e.into_inner()).take() {
                    run();
                }
            });
        if let Err(e) = spawned {
            log::warn!("cannot spawn flush thread, flushing inline: {}", e);
            if let Some(run) = task.lock().unwrap_or_else(|e| e.into_inner()).take() {
                run();
            }
        }
    }

    /// 阻塞当前线程直到 flush 完成，返回累积的错误
    ///
    /// 不要在输出目标的写入线程上调用。
    pub fn sync(&self) -> Result<(), FlushError> {
        let (tx, rx) = mpsc::channel();
        self.flush(move |result| {
            let _ = tx.send(result);
        });
        rx.recv().unwrap_or(Ok(()))
    }
}

fn resolve_level(level: impl Into<LevelSpec>) -> Result<Level, Error> {
    let spec: LevelSpec = level.into();
    spec.resolve()
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
