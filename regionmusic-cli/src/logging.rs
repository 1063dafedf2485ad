use log::{LevelFilter, Log, Metadata, Record};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, OnceLock};

const RING_LINES: usize = 500;

/// Newest log lines of this process, replayed by the `LOG` command.
#[derive(Clone, Default)]
pub struct LogRing {
    lines: Arc<Mutex<VecDeque<String>>>,
}

impl LogRing {
    fn push(&self, line: String) {
        let mut lines = self.lines.lock().unwrap_or_else(|p| p.into_inner());
        while lines.len() >= RING_LINES {
            lines.pop_front();
        }
        lines.push_back(line);
    }

    /// Oldest first.
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .iter()
            .cloned()
            .collect()
    }
}

struct RingLogger {
    filter: LevelFilter,
    ring: LogRing,
    echo_stderr: bool,
}

impl Log for RingLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.filter
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format!("[{}] {}", record.level(), record.args());
        if self.echo_stderr {
            eprintln!("{}", line);
        }
        self.ring.push(line);
    }

    fn flush(&self) {}
}

static LOGGER: OnceLock<RingLogger> = OnceLock::new();

/// `RUST_LOG` holds a plain level name; anything else means info.
fn filter_from(value: Option<&str>) -> LevelFilter {
    value
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(LevelFilter::Info)
}

/// Install the process logger. Log lines are echoed to stderr unless
/// `RMUSIC_LOG_STDERR=0`.
pub fn init() -> LogRing {
    let logger = LOGGER.get_or_init(|| RingLogger {
        filter: filter_from(std::env::var("RUST_LOG").ok().as_deref()),
        ring: LogRing::default(),
        echo_stderr: std::env::var("RMUSIC_LOG_STDERR").map_or(true, |value| value != "0"),
    });
    if log::set_logger(logger).is_ok() {
        log::set_max_level(logger.filter);
    }
    logger.ring.clone()
}
