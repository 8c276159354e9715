//! Diagnostic sinks.
//!
//! Startup notices and rewrite failures are user-facing output, separate from the `log`
//! tracing of the engine. A sink is best-effort and never influences control flow.

use std::{
    fmt::Display,
    io::{self, Write},
    sync::Mutex,
};

use crate::Error;

/// Receives single-line diagnostics.
pub trait DiagnosticSink: Send + Sync {
    /// An informational line.
    fn info(&self, line: &str);

    /// A failed rewrite attempt.
    fn error(&self, error: &Error);
}

/// Writes notices to standard output and failures to standard error.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl DiagnosticSink for StdoutSink {
    fn info(&self, line: &str) {
        write_line(io::stdout().lock(), &line);
    }

    fn error(&self, error: &Error) {
        write_line(io::stderr().lock(), error);
    }
}

/// Writes one line, dropping any I/O error. A closed pipe must not unwind into class loading.
fn write_line(mut out: impl Write, line: &dyn Display) {
    let _ = writeln!(out, "{line}").and_then(|()| out.flush());
}

/// One recorded diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// An informational line
    Info(String),
    /// The rendered error of a failed rewrite
    Error(String),
}

/// Keeps every diagnostic in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<Diagnostic>>,
}

impl MemorySink {
    /// An empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything recorded so far, oldest first.
    pub fn records(&self) -> Vec<Diagnostic> {
        lock!(self.records).clone()
    }

    /// The informational lines recorded so far.
    pub fn lines(&self) -> Vec<String> {
        lock!(self.records)
            .iter()
            .filter_map(|record| match record {
                Diagnostic::Info(line) => Some(line.clone()),
                Diagnostic::Error(_) => None,
            })
            .collect()
    }

    /// Number of recorded errors.
    pub fn error_count(&self) -> usize {
        lock!(self.records)
            .iter()
            .filter(|record| matches!(record, Diagnostic::Error(_)))
            .count()
    }
}

impl DiagnosticSink for MemorySink {
    fn info(&self, line: &str) {
        lock!(self.records).push(Diagnostic::Info(line.to_string()));
    }

    fn error(&self, error: &Error) {
        lock!(self.records).push(Diagnostic::Error(error.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A writer whose reader has gone away.
    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }
    }

    #[test]
    fn write_line_ignores_closed_pipe() {
        write_line(ClosedPipe, &"Transformed ResourceBundle");
        write_line(ClosedPipe, &Error::Empty);
    }

    #[test]
    fn write_line_terminates_line() {
        let mut out = Vec::new();
        write_line(&mut out, &"BundleWeaveAgent activated");
        assert_eq!(out, b"BundleWeaveAgent activated\n");
    }

    #[test]
    fn memory_sink_records_in_order() {
        let sink = MemorySink::new();
        sink.info("first");
        sink.error(&Error::StructuralMismatch("no getObject".to_string()));
        sink.info("second");

        assert_eq!(sink.lines(), vec!["first", "second"]);
        assert_eq!(sink.error_count(), 1);
        assert_eq!(
            sink.records()[1],
            Diagnostic::Error("Structural mismatch - no getObject".to_string())
        );
    }
}
