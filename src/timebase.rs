/*!
毫秒时间戳缓存。

高频日志在同一毫秒内反复读取系统时钟是浪费。[`Timebase`] 缓存最近一次读到的
毫秒值，并在刷新时安排一次延迟失效：失效线程在一个节拍（默认 1 ms）之后清空缓存。
两次失效之间返回的值都曾在该区间内某一时刻为真；另有复用次数上限，
即使失效线程被延迟，陈旧程度也有界。
*/

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use std::thread::{self, Thread};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crossbeam_queue::SegQueue;
use lazy_static::lazy_static;

/// 每次刷新后允许复用缓存值的次数
pub const REUSE_QUOTA: u32 = 50;

/// 默认失效节拍
pub const DEFAULT_TICK: Duration = Duration::from_millis(1);

type TimestampCallback = Box<dyn FnOnce(u64) + Send>;

lazy_static! {
    static ref GLOBAL_TIMEBASE: Arc<Timebase> = Timebase::new();
}

/// 进程级共享的时间戳缓存
pub fn global() -> &'static Arc<Timebase> {
    &GLOBAL_TIMEBASE
}

/// 读取系统时钟（自 UNIX EPOCH 起的毫秒数）
#[inline]
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default() // 如果系统时间在UNIX EPOCH之前，则使用默认值
        .as_millis() as u64
}

/// 带延迟失效的毫秒时间戳缓存
pub struct Timebase {
    /// 缓存的毫秒值，0 表示空
    millis: AtomicU64,
    /// 剩余复用次数
    budget: AtomicU32,
    /// 是否已安排失效
    pending: AtomicBool,
    /// 等待失效之后再取时间戳的回调
    waiters: SegQueue<TimestampCallback>,
    /// 失效线程，首次需要时启动；启动失败时为 `None`
    invalidator: OnceLock<Option<Thread>>,
    tick: Duration,
    this: Weak<Timebase>,
}

impl Timebase {
    /// 使用默认节拍创建
    pub fn new() -> Arc<Self> {
        Self::with_tick(DEFAULT_TICK)
    }

    /// 使用指定的失效节拍创建
    pub fn with_tick(tick: Duration) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            millis: AtomicU64::new(0),
            budget: AtomicU32::new(0),
            pending: AtomicBool::new(false),
            waiters: SegQueue::new(),
            invalidator: OnceLock::new(),
            tick,
            this: this.clone(),
        })
    }

    /// 获取当前毫秒时间戳，缓存仍有效时直接复用
    #[inline]
    pub fn get_timestamp(&self) -> u64 {
        let cached = self.millis.load(Ordering::Acquire);
        if cached != 0
            && self
                .budget
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |b| b.checked_sub(1))
                .is_ok()
        {
            return cached;
        }
        self.refresh()
    }

    /// 异步获取时间戳
    ///
    /// 回调在失效线程上执行，且在任何已安排的失效完成之后才读取缓存，
    /// 因此拿到的值不会早于本次调用所在的节拍。回调从不在调用方线程上同步执行，
    /// 除非失效线程无法启动。
    pub fn get_timestamp_async<F>(&self, callback: F)
    where
        F: FnOnce(u64) + Send + 'static,
    {
        self.waiters.push(Box::new(callback));
        match self.invalidator() {
            Some(thread) => thread.unpark(),
            None => {
                while let Some(waiter) = self.waiters.pop() {
                    waiter(self.get_timestamp());
                }
            }
        }
    }

    /// 清空缓存并取消已安排的失效
    pub fn reset(&self) {
        self.millis.store(0, Ordering::Release);
        self.pending.store(false, Ordering::Release);
    }

    fn refresh(&self) -> u64 {
        let now = now_millis();
        self.millis.store(now, Ordering::Release);
        self.budget.store(REUSE_QUOTA, Ordering::Release);
        if !self.pending.swap(true, Ordering::AcqRel)
            && let Some(thread) = self.invalidator()
        {
            thread.unpark();
        }
        now
    }

    fn invalidator(&self) -> Option<&Thread> {
        self.invalidator
            .get_or_init(|| {
                let weak = self.this.clone();
                let tick = self.tick;
                // 可能在过滤器内被调用，启动失败时不输出诊断日志
                thread::Builder::new()
                    .name("qlogger-timebase".to_string())
                    .spawn(move || run_invalidator(weak, tick))
                    .ok()
                    .map(|handle| handle.thread().clone())
            })
            .as_ref()
    }
}

impl Drop for Timebase {
    fn drop(&mut self) {
        // 唤醒失效线程，让它发现自己已无主并退出
        if let Some(Some(thread)) = self.invalidator.get() {
            thread.unpark();
        }
    }
}

fn run_invalidator(weak: Weak<Timebase>, tick: Duration) {
    loop {
        let Some(timebase) = weak.upgrade() else {
            return;
        };
        let pending = timebase.pending.load(Ordering::Acquire);
        if !pending && timebase.waiters.is_empty() {
            // 不能持有强引用睡眠，否则 Timebase 永远不会被释放
            drop(timebase);
            thread::park();
            continue;
        }
        if pending {
            thread::sleep(tick);
            timebase.reset();
        }
        while let Some(waiter) = timebase.waiters.pop() {
            waiter(timebase.get_timestamp());
        }
    }
}
