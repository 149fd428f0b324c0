use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::config::{MAX_LOG_CAPACITY, MIN_LOG_CAPACITY};

/// How loudly a log line should be presented.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warn,
    Error,
}

/// One user-visible diagnostic line.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct LogLine {
    /// RFC 3339 local time at which the line was recorded.
    pub timestamp: String,
    pub severity: Severity,
    pub text: String,
}

impl LogLine {
    pub fn new(severity: Severity, text: impl Into<String>) -> Self {
        Self {
            timestamp: chrono::Local::now().to_rfc3339(),
            severity,
            text: text.into(),
        }
    }
}

impl std::fmt::Display for LogLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self.severity {
            Severity::Info => "info",
            Severity::Warn => "warn",
            Severity::Error => "error",
        };
        write!(f, "{} [{label}] {}", self.timestamp, self.text)
    }
}

/// Fixed-capacity circular log that overwrites its oldest line when full.
///
/// Backed by `capacity + 1` slots and two cursors: `read == write` means
/// empty, `write + 1 == read` (mod slots) means full.  The spare slot is what
/// keeps the two states apart without a separate counter.
pub struct RingLog {
    slots: Vec<Option<LogLine>>,
    read: usize,
    write: usize,
}

impl RingLog {
    /// Creates an empty log holding at most `capacity` lines.
    /// The capacity is clamped to the configured min/max.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.clamp(MIN_LOG_CAPACITY, MAX_LOG_CAPACITY);
        Self {
            slots: vec![None; capacity + 1],
            read: 0,
            write: 0,
        }
    }

    /// Creates a log pre-filled with `lines`, keeping only the newest
    /// `capacity` of them.  Restored lines are not re-emitted to tracing.
    pub fn with_lines(capacity: usize, lines: impl IntoIterator<Item = LogLine>) -> Self {
        let mut log = Self::new(capacity);
        for line in lines {
            log.push(line);
        }
        log
    }

    /// Appends `line`, discarding the oldest line first if the log is full.
    /// Never fails and never blocks.
    pub fn push(&mut self, line: LogLine) {
        if self.is_full() {
            self.slots[self.read] = None;
            self.read = self.advance(self.read);
        }
        self.slots[self.write] = Some(line);
        self.write = self.advance(self.write);
    }

    /// Removes and returns the oldest line, or `None` when empty.
    pub fn pop(&mut self) -> Option<LogLine> {
        if self.is_empty() {
            return None;
        }
        let line = self.slots[self.read].take();
        self.read = self.advance(self.read);
        line
    }

    /// Oldest-to-newest traversal that leaves both cursors untouched, so the
    /// same backlog can be redrawn any number of times.
    pub fn iter(&self) -> impl Iterator<Item = &LogLine> + '_ {
        let mut cursor = self.read;
        std::iter::from_fn(move || {
            if cursor == self.write {
                return None;
            }
            let line = self.slots[cursor].as_ref();
            cursor = self.advance(cursor);
            line
        })
    }

    pub fn is_empty(&self) -> bool {
        self.read == self.write
    }

    pub fn is_full(&self) -> bool {
        self.advance(self.write) == self.read
    }

    pub fn len(&self) -> usize {
        (self.write + self.slots.len() - self.read) % self.slots.len()
    }

    /// Maximum number of live lines.
    pub fn capacity(&self) -> usize {
        self.slots.len() - 1
    }

    /// Records an informational line and mirrors it to tracing.
    pub fn info(&mut self, text: impl Into<String>) {
        let line = LogLine::new(Severity::Info, text);
        info!("{}", line.text);
        self.push(line);
    }

    /// Records a warning and mirrors it to tracing.
    pub fn warn(&mut self, text: impl Into<String>) {
        let line = LogLine::new(Severity::Warn, text);
        warn!("{}", line.text);
        self.push(line);
    }

    /// Records an error and mirrors it to tracing.
    pub fn error(&mut self, text: impl Into<String>) {
        let line = LogLine::new(Severity::Error, text);
        error!("{}", line.text);
        self.push(line);
    }

    /// Returns `true` if any live line contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.iter().any(|line| line.text.contains(needle))
    }

    fn advance(&self, cursor: usize) -> usize {
        (cursor + 1) % self.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(text: &str) -> LogLine {
        LogLine::new(Severity::Info, text)
    }

    fn texts(log: &RingLog) -> Vec<String> {
        log.iter().map(|l| l.text.clone()).collect()
    }

    // ── capacity clamping ─────────────────────────────────────────────────────

    #[test]
    fn new_clamps_zero_to_min() {
        let log = RingLog::new(0);
        assert_eq!(log.capacity(), MIN_LOG_CAPACITY);
    }

    #[test]
    fn new_clamps_above_max() {
        let log = RingLog::new(usize::MAX - 1);
        assert_eq!(log.capacity(), MAX_LOG_CAPACITY);
    }

    // ── push / overwrite ──────────────────────────────────────────────────────

    #[test]
    fn starts_empty() {
        let log = RingLog::new(4);
        assert!(log.is_empty());
        assert!(!log.is_full());
        assert_eq!(log.len(), 0);
        assert_eq!(log.iter().count(), 0);
    }

    #[test]
    fn fills_up_to_capacity() {
        let mut log = RingLog::new(3);
        log.push(line("a"));
        log.push(line("b"));
        assert!(!log.is_full());
        log.push(line("c"));
        assert!(log.is_full());
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn overflow_keeps_last_n_in_push_order() {
        let mut log = RingLog::new(4);
        for i in 0..11 {
            log.push(line(&format!("line {i}")));
        }
        assert_eq!(log.len(), 4);
        assert_eq!(texts(&log), ["line 7", "line 8", "line 9", "line 10"]);
    }

    #[test]
    fn peek_never_exceeds_capacity() {
        let mut log = RingLog::new(5);
        for i in 0..100 {
            log.push(line(&i.to_string()));
            assert!(log.iter().count() <= 5);
        }
    }

    #[test]
    fn capacity_one_replaces_single_line() {
        let mut log = RingLog::new(1);
        log.push(line("first"));
        assert_eq!(texts(&log), ["first"]);
        log.push(line("second"));
        assert_eq!(texts(&log), ["second"]);
    }

    // ── pop ───────────────────────────────────────────────────────────────────

    #[test]
    fn pop_returns_oldest_first() {
        let mut log = RingLog::new(3);
        log.push(line("a"));
        log.push(line("b"));
        assert_eq!(log.pop().unwrap().text, "a");
        assert_eq!(log.pop().unwrap().text, "b");
        assert!(log.pop().is_none());
        assert!(log.is_empty());
    }

    #[test]
    fn pop_after_wrap_around() {
        let mut log = RingLog::new(2);
        log.push(line("a"));
        log.push(line("b"));
        log.push(line("c"));
        assert_eq!(log.pop().unwrap().text, "b");
        log.push(line("d"));
        assert_eq!(texts(&log), ["c", "d"]);
    }

    #[test]
    fn pop_on_empty_returns_none() {
        let mut log = RingLog::new(2);
        assert!(log.pop().is_none());
    }

    // ── iter ──────────────────────────────────────────────────────────────────

    #[test]
    fn iter_does_not_drain() {
        let mut log = RingLog::new(3);
        log.push(line("a"));
        log.push(line("b"));
        assert_eq!(texts(&log), ["a", "b"]);
        assert_eq!(texts(&log), ["a", "b"]);
        assert_eq!(log.len(), 2);
    }

    // ── helpers ───────────────────────────────────────────────────────────────

    #[test]
    fn severity_helpers_record_level() {
        let mut log = RingLog::new(3);
        log.info("started");
        log.warn("careful");
        log.error("broken");
        let levels: Vec<Severity> = log.iter().map(|l| l.severity).collect();
        assert_eq!(levels, [Severity::Info, Severity::Warn, Severity::Error]);
        assert!(log.contains("care"));
        assert!(!log.contains("missing"));
    }

    #[test]
    fn with_lines_keeps_newest() {
        let lines = (0..6).map(|i| line(&i.to_string()));
        let log = RingLog::with_lines(2, lines);
        assert_eq!(texts(&log), ["4", "5"]);
    }

    #[test]
    fn display_includes_level_and_text() {
        let l = LogLine::new(Severity::Warn, "File does not have read and write access!");
        let rendered = l.to_string();
        assert!(rendered.contains("[warn]"));
        assert!(rendered.ends_with("File does not have read and write access!"));
    }
}
