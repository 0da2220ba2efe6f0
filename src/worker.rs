/*!
带后台线程的异步写入输出目标。

调用方线程只把行放进有界队列，由专属消费者线程完成真正的 I/O：

- 非阻塞提交：`write` 不等待 I/O，队列满时才让出 CPU 等待空位
- 单目标先进先出：消费者按提交顺序处理
- 批量刷新：队列排空时统一 flush，再回报本批写入的完成结果
- 空闲休眠：队列为空时消费者线程 park，有新任务时才被唤醒
- 忙碌检测：已提交数与已完成数不等时报告忙碌，供 flush 屏障轮询
- 优雅关闭：最后一个句柄释放时等待队列写完再退出
*/

use std::io::{self, BufWriter, Write};
use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread::{self, JoinHandle, Thread};

use crossbeam_queue::ArrayQueue;

use crate::error::SinkError;
use crate::sink::{Completion, Sink};

/// 默认队列容量（行数）
pub const DEFAULT_CAPACITY: usize = 1024;

/// UDP 单个数据报的最大长度：(2^16 - 1) - 20 字节 IP 头 - 8 字节 UDP 头
pub const MAX_DATAGRAM: usize = 65507;

/// 后台线程上的实际写入端
pub trait Transport: Send + 'static {
    /// 写入一行
    fn write_line(&mut self, line: &str) -> io::Result<()>;

    /// 刷新缓冲
    fn flush(&mut self) -> io::Result<()>;
}

/// 带缓冲的字节流写入端（文件、标准输出、TCP）
pub struct Stream<W: Write> {
    writer: BufWriter<W>,
}

impl<W: Write> Stream<W> {
    /// 包装写入端
    pub fn new(writer: W) -> Self {
        Self {
            writer: BufWriter::new(writer),
        }
    }
}

impl<W: Write + Send + 'static> Transport for Stream<W> {
    fn write_line(&mut self, line: &str) -> io::Result<()> {
        self.writer.write_all(line.as_bytes())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// UDP 数据报写入端，每行一个数据报
pub struct Datagram {
    socket: UdpSocket,
    target: SocketAddr,
}

impl Datagram {
    /// 绑定本地临时端口，发往 `target`
    pub fn new(target: SocketAddr) -> io::Result<Self> {
        let local: SocketAddr = if target.is_ipv4() {
            SocketAddr::from(([0, 0, 0, 0], 0))
        } else {
            SocketAddr::from(([0u16; 8], 0))
        };
        let socket = UdpSocket::bind(local)?;
        Ok(Self { socket, target })
    }
}

impl Transport for Datagram {
    fn write_line(&mut self, line: &str) -> io::Result<()> {
        self.socket.send_to(line.as_bytes(), self.target).map(|_| ())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

enum Task {
    Write(Arc<str>, Completion),
    Flush(Completion),
}

/// 调用方与消费者线程共享的状态
struct Shared {
    queue: ArrayQueue<Task>,
    closed: AtomicBool,
    completed: AtomicUsize,
    /// 消费者进入休眠的次数
    parks: AtomicUsize,
}

/// 后台写入输出目标
pub struct WorkerSink {
    name: String,
    max_line: Option<usize>,
    published: AtomicUsize,
    shared: Arc<Shared>,
    consumer: Thread,
    handle: Option<JoinHandle<()>>,
}

impl WorkerSink {
    /// 使用默认容量创建
    pub fn new<T: Transport>(name: impl Into<String>, transport: T) -> io::Result<Self> {
        Self::with_capacity(name, transport, DEFAULT_CAPACITY)
    }

    /// 创建指定队列容量的后台写入输出目标
    pub fn with_capacity<T: Transport>(
        name: impl Into<String>,
        transport: T,
        capacity: usize,
    ) -> io::Result<Self> {
        let name = name.into();
        let shared = Arc::new(Shared {
            queue: ArrayQueue::new(capacity.max(1)),
            closed: AtomicBool::new(false),
            completed: AtomicUsize::new(0),
            parks: AtomicUsize::new(0),
        });

        let worker = shared.clone();
        let handle = thread::Builder::new()
            .name("qlogger-worker".into())
            .spawn(move || consume(&worker, transport))?;

        log::debug!("{}: worker sink started, queue size {}", name, capacity.max(1));

        Ok(Self {
            name,
            max_line: None,
            published: AtomicUsize::new(0),
            shared,
            consumer: handle.thread().clone(),
            handle: Some(handle),
        })
    }

    /// 设置单行最大长度，超长的行以 [`SinkError::DatagramTooLarge`] 失败
    pub fn with_max_line(mut self, max: usize) -> Self {
        self.max_line = Some(max);
        self
    }

    /// 输出目标名称
    pub fn name(&self) -> &str {
        &self.name
    }

    fn submit(&self, task: Task) {
        self.published.fetch_add(1, Ordering::AcqRel);
        let mut task = task;
        // 队列满：唤醒消费者并让出 CPU，直到有空位
        while let Err(back) = self.shared.queue.push(task) {
            task = back;
            self.consumer.unpark();
            thread::yield_now();
        }
        self.consumer.unpark();
    }
}

/// 消费者线程主循环
fn consume<T: Transport>(shared: &Shared, mut transport: T) {
    let mut batch: Vec<Completion> = Vec::new();
    loop {
        while let Some(task) = shared.queue.pop() {
            match task {
                Task::Write(line, done) => match transport.write_line(&line) {
                    // 成功的写入等到队列排空刷新后再回报
                    Ok(()) => batch.push(done),
                    Err(e) => {
                        shared.completed.fetch_add(1, Ordering::Release);
                        done.complete(Err(e.into()));
                    }
                },
                Task::Flush(done) => {
                    let result = transport.flush().map_err(SinkError::from);
                    settle(&mut batch, &result, &shared.completed);
                    shared.completed.fetch_add(1, Ordering::Release);
                    done.complete(result);
                }
            }
        }

        if !batch.is_empty() {
            let result = transport.flush().map_err(SinkError::from);
            settle(&mut batch, &result, &shared.completed);
        }

        if shared.closed.load(Ordering::Acquire) {
            if shared.queue.is_empty() {
                let _ = transport.flush();
                return;
            }
            continue;
        }

        shared.parks.fetch_add(1, Ordering::Relaxed);
        thread::park();
    }
}

fn settle(batch: &mut Vec<Completion>, result: &Result<(), SinkError>, completed: &AtomicUsize) {
    for done in batch.drain(..) {
        completed.fetch_add(1, Ordering::Release);
        done.complete(result.clone());
    }
}

impl Sink for WorkerSink {
    fn write(&self, line: Arc<str>, done: Completion) {
        if let Some(max) = self.max_line
            && line.len() > max
        {
            done.complete(Err(SinkError::DatagramTooLarge { len: line.len(), max }));
            return;
        }
        self.submit(Task::Write(line, done));
    }

    fn flush(&self, done: Completion) {
        self.submit(Task::Flush(done));
    }

    fn is_busy(&self) -> bool {
        self.published.load(Ordering::Acquire) != self.shared.completed.load(Ordering::Acquire)
    }
}

impl Drop for WorkerSink {
    fn drop(&mut self) {
        log::debug!("{}: worker sink closing", self.name);
        self.shared.closed.store(true, Ordering::Release);
        self.consumer.unpark();
        if let Some(handle) = self.handle.take() {
            // 最后一个句柄可能在消费者线程自身的完成回调里释放
            if handle.thread().id() != thread::current().id() && handle.join().is_err() {
                log::warn!("{}: worker thread panicked", self.name);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::mpsc;
    use std::time::Duration;

    /// 记录写入内容、可注入失败的写入端
    #[derive(Clone, Default)]
    struct Recorder {
        written: Arc<Mutex<Vec<String>>>,
        flushes: Arc<AtomicUsize>,
        fail_writes: bool,
    }

    impl Transport for Recorder {
        fn write_line(&mut self, line: &str) -> io::Result<()> {
            if self.fail_writes {
                return Err(io::Error::other("boom"));
            }
            self.written.lock().unwrap().push(line.to_string());
            Ok(())
        }

        fn flush(&mut self) -> io::Result<()> {
            self.flushes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn completion(tx: &mpsc::Sender<Result<(), SinkError>>) -> Completion {
        let tx = tx.clone();
        Completion::new(move |result| {
            let _ = tx.send(result);
        })
    }

    fn wait_idle(sink: &WorkerSink) {
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while sink.is_busy() && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_writes_in_order() {
        let recorder = Recorder::default();
        let sink = WorkerSink::with_capacity("test", recorder.clone(), 8).unwrap();
        let (tx, rx) = mpsc::channel();

        for i in 0..100 {
            sink.write(Arc::from(format!("line {}\n", i)), completion(&tx));
        }
        for _ in 0..100 {
            assert!(rx.recv_timeout(Duration::from_secs(5)).unwrap().is_ok());
        }
        wait_idle(&sink);

        let written = recorder.written.lock().unwrap().clone();
        assert_eq!(written.len(), 100);
        for (i, line) in written.iter().enumerate() {
            assert_eq!(line, &format!("line {}\n", i));
        }
        assert!(recorder.flushes.load(Ordering::SeqCst) >= 1);
        assert!(!sink.is_busy());
    }

    #[test]
    fn test_write_error_reported_through_completion() {
        let recorder = Recorder {
            fail_writes: true,
            ..Recorder::default()
        };
        let sink = WorkerSink::new("failing", recorder).unwrap();
        let (tx, rx) = mpsc::channel();

        sink.write(Arc::from("x\n"), completion(&tx));
        let result = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(result.unwrap_err().to_string(), "write error: boom");
    }

    #[test]
    fn test_flush_task() {
        let recorder = Recorder::default();
        let sink = WorkerSink::new("flush", recorder.clone()).unwrap();
        let (tx, rx) = mpsc::channel();

        sink.write(Arc::from("a\n"), completion(&tx));
        sink.flush(completion(&tx));
        assert!(rx.recv_timeout(Duration::from_secs(5)).unwrap().is_ok());
        assert!(rx.recv_timeout(Duration::from_secs(5)).unwrap().is_ok());
        assert_eq!(recorder.written.lock().unwrap().as_slice(), ["a\n"]);
    }

    #[test]
    fn test_oversized_line_rejected() {
        let recorder = Recorder::default();
        let sink = WorkerSink::new("udp", recorder.clone()).unwrap().with_max_line(8);
        let (tx, rx) = mpsc::channel();

        sink.write(Arc::from("0123456789\n"), completion(&tx));
        let result = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(matches!(
            result,
            Err(SinkError::DatagramTooLarge { len: 11, max: 8 })
        ));
        assert!(!sink.is_busy());
        assert!(recorder.written.lock().unwrap().is_empty());
    }

    #[test]
    fn test_datagram_transport() {
        let server = UdpSocket::bind("127.0.0.1:0").unwrap();
        server.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        let target = server.local_addr().unwrap();

        let sink = WorkerSink::new("udp", Datagram::new(target).unwrap())
            .unwrap()
            .with_max_line(MAX_DATAGRAM);
        let (tx, rx) = mpsc::channel();
        sink.write(Arc::from("hello\n"), completion(&tx));
        assert!(rx.recv_timeout(Duration::from_secs(5)).unwrap().is_ok());

        let mut buf = [0u8; 64];
        let (n, _) = server.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"hello\n");
    }

    #[test]
    fn test_consumer_parks_when_idle() {
        let recorder = Recorder::default();
        let sink = WorkerSink::new("idle", recorder.clone()).unwrap();
        let (tx, rx) = mpsc::channel();

        sink.write(Arc::from("a\n"), completion(&tx));
        assert!(rx.recv_timeout(Duration::from_secs(5)).unwrap().is_ok());
        wait_idle(&sink);
        std::thread::sleep(Duration::from_millis(50));

        // 空闲期间消费者应停在 park 上，而不是反复轮询
        let before = sink.shared.parks.load(Ordering::Relaxed);
        assert!(before >= 1);
        std::thread::sleep(Duration::from_millis(200));
        let after = sink.shared.parks.load(Ordering::Relaxed);
        assert!(after - before <= 2, "consumer woke {} times while idle", after - before);

        sink.write(Arc::from("b\n"), completion(&tx));
        assert!(rx.recv_timeout(Duration::from_secs(5)).unwrap().is_ok());
        assert_eq!(recorder.written.lock().unwrap().as_slice(), ["a\n", "b\n"]);
    }

    #[test]
    fn test_drop_drains_queue() {
        let recorder = Recorder::default();
        let sink = WorkerSink::with_capacity("drain", recorder.clone(), 4).unwrap();
        for i in 0..20 {
            sink.write(Arc::from(format!("{}\n", i)), Completion::new(|_| {}));
        }
        drop(sink);
        assert_eq!(recorder.written.lock().unwrap().len(), 20);
    }
}
