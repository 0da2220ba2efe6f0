use qlogger_rs::{LoggerBuilder, info, notice};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

fn main() -> Result<(), qlogger_rs::Error> {
    let logger = Arc::new(
        LoggerBuilder::new()
            .level_from_env("QLOGGER_LEVEL")
            .with_basic_filter()
            .with_file_output("logs/demo.log")
            .with_console_output()
            .build()?,
    );

    let running = Arc::new(AtomicBool::new(true));
    let flag = running.clone();
    if let Err(e) = ctrlc::set_handler(move || flag.store(false, Ordering::SeqCst)) {
        eprintln!("cannot install Ctrl-C handler: {}", e);
    }

    notice!(logger, "service started, press Ctrl-C to stop");
    let mut tick = 0u64;
    while running.load(Ordering::SeqCst) && tick < 50 {
        info!(logger, "tick {}", tick);
        tick += 1;
        std::thread::sleep(Duration::from_millis(100));
    }

    notice!(logger, "shutting down after {} ticks", tick);
    if let Err(e) = logger.sync() {
        eprintln!("log flush failed: {}", e);
    }
    Ok(())
}
