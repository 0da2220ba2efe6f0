//! 日志器集成测试
//!
//! 通过公开 API 组合构建器、过滤器和各类输出目标

use qlogger_rs::{
    BasicFilter, Completion, FlushError, JsonFilter, Level, Logger, LoggerBuilder, MemorySink, Message,
    Sink, SinkError, create_writer,
};
use std::io::{BufRead, BufReader};
use std::net::{TcpListener, UdpSocket};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

fn temp_log(name: &str) -> std::path::PathBuf {
    let path = std::env::temp_dir()
        .join("qlogger-it")
        .join(format!("{}-{}.log", name, std::process::id()));
    let _ = std::fs::remove_file(&path);
    path
}

#[test]
fn test_file_writer_end_to_end() {
    let path = temp_log("end-to-end");
    let logger = LoggerBuilder::new()
        .level("debug")
        .with_basic_filter()
        .with_file_output(&path)
        .build()
        .expect("build logger");

    logger.debug("first");
    logger.trace("dropped");
    logger.err("second");
    logger.sync().expect("sync");

    let content = std::fs::read_to_string(&path).expect("read log file");
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].ends_with(" [debug] first"));
    assert!(lines[1].ends_with(" [error] second"));

    let _ = std::fs::remove_file(&path);
}

#[test]
fn test_file_writer_keeps_order_under_load() {
    let path = temp_log("ordered");
    let logger = Logger::with_sink("info", format!("file://{}", path.display())).expect("logger");

    for i in 0..5000 {
        logger.info(format!("line {}", i));
    }
    logger.sync().expect("sync");

    let content = std::fs::read_to_string(&path).expect("read log file");
    let expected: Vec<String> = (0..5000).map(|i| format!("line {}", i)).collect();
    assert_eq!(content.lines().collect::<Vec<_>>(), expected);

    let _ = std::fs::remove_file(&path);
}

#[test]
fn test_json_lines_over_tcp() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");

    let logger = LoggerBuilder::new()
        .with_json_filter()
        .writer(format!("tcp://{}", addr))
        .build()
        .expect("build logger");
    let (conn, _) = listener.accept().expect("accept");
    conn.set_read_timeout(Some(Duration::from_secs(5))).expect("timeout");

    logger.notice(serde_json::json!({"event": "login", "user": "ann"}));
    logger.sync().expect("sync");

    let mut line = String::new();
    BufReader::new(conn).read_line(&mut line).expect("read line");
    let value: serde_json::Value = serde_json::from_str(&line).expect("json line");
    assert_eq!(value["level"], "notice");
    assert_eq!(value["event"], "login");
    assert_eq!(value["user"], "ann");
}

#[test]
fn test_udp_datagram_per_line() {
    let server = UdpSocket::bind("127.0.0.1:0").expect("bind");
    server.set_read_timeout(Some(Duration::from_secs(5))).expect("timeout");

    let logger = Logger::with_sink("info", format!("udp://{}", server.local_addr().expect("addr")))
        .expect("logger");
    logger.info("one");
    logger.info("two");
    logger.sync().expect("sync");

    let mut buf = [0u8; 128];
    let (n, _) = server.recv_from(&mut buf).expect("first datagram");
    assert_eq!(&buf[..n], b"one\n");
    let (n, _) = server.recv_from(&mut buf).expect("second datagram");
    assert_eq!(&buf[..n], b"two\n");
}

#[test]
fn test_udp_oversized_line_reported_on_flush() {
    let server = UdpSocket::bind("127.0.0.1:0").expect("bind");
    let logger = Logger::with_sink("info", format!("udp://{}", server.local_addr().expect("addr")))
        .expect("logger");

    logger.info("x".repeat(70_000));
    match logger.sync() {
        Err(FlushError::Single(SinkError::DatagramTooLarge { len, max })) => {
            assert_eq!(len, 70_001);
            assert_eq!(max, 65507);
        }
        other => panic!("unexpected flush result: {:?}", other),
    }
    assert!(logger.sync().is_ok());
}

#[test]
fn test_multiple_sinks_and_runtime_changes() {
    let first = Arc::new(MemorySink::new());
    let second = Arc::new(MemorySink::new());
    let logger = LoggerBuilder::new()
        .level(Level::Warning)
        .sink(first.clone())
        .build()
        .expect("build logger");

    logger.warning("a");
    logger.add_sink(second.clone());
    logger.warning("b");
    logger.info("hidden");

    assert_eq!(logger.set_level("info").expect("set level"), Level::Warning);
    let tag: qlogger_rs::FilterHandle = Arc::new(|msg: Message, level: Level| {
        Some(Message::from(format!("<{}> {}", level.code(), msg)))
    });
    logger.add_filter(tag.clone());
    logger.info("c");
    logger.remove_filter(&tag);
    logger.info("d");

    logger.sync().expect("sync");
    assert_eq!(first.lines(), vec!["a\n", "b\n", "<6> c\n", "d\n"]);
    assert_eq!(second.lines(), vec!["b\n", "<6> c\n", "d\n"]);
}

/// 在后台线程上完成写入的输出目标，完成时机不确定
struct SlowSink {
    written: Arc<AtomicUsize>,
}

impl Sink for SlowSink {
    fn write(&self, _line: Arc<str>, done: Completion) {
        let written = self.written.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(5));
            written.fetch_add(1, Ordering::SeqCst);
            done.complete(Ok(()));
        });
    }
}

#[test]
fn test_sync_waits_for_asynchronous_sinks() {
    let written = Arc::new(AtomicUsize::new(0));
    let logger = Logger::new("info").expect("logger");
    logger.add_sink(Arc::new(SlowSink {
        written: written.clone(),
    }));

    for i in 0..20 {
        logger.info(format!("{}", i));
    }
    logger.sync().expect("sync");
    assert_eq!(written.load(Ordering::SeqCst), 20);
    assert_eq!(logger.pending_writes(), 0);
}

#[test]
fn test_create_writer_null_and_basic_filter() {
    let sink = create_writer("null://").expect("null writer");
    let logger = Logger::new("all").expect("logger");
    logger.add_sink(sink).add_filter(Arc::new(BasicFilter::new()));
    logger.trace("nowhere");
    assert!(logger.sync().is_ok());
}

#[test]
fn test_json_filter_with_template() {
    let mut template = serde_json::Map::new();
    template.insert("app".to_string(), serde_json::json!("billing"));
    let sink = Arc::new(MemorySink::new());
    let logger = LoggerBuilder::new()
        .filter(Arc::new(JsonFilter::with_template(template)))
        .sink(sink.clone())
        .build()
        .expect("build logger");

    logger.info("charged");
    let line = sink.lines().pop().expect("one line");
    assert!(line.starts_with("{\"app\":\"billing\",\"time\":"));
    assert!(line.ends_with(",\"level\":\"info\",\"message\":\"charged\"}\n"));
}
