//! Injectable logging handle.
//!
//! Components receive an `Arc<dyn Logger>` at construction instead of
//! reaching for a process-wide logger. The default implementation forwards
//! to `tracing`.

use std::fmt;
use std::sync::Arc;

/// Logging sink with the two levels the client emits.
pub trait Logger: Send + Sync + fmt::Debug {
    /// Writes a debug message.
    fn debug(&self, args: fmt::Arguments<'_>);
    /// Writes an informational message.
    fn info(&self, args: fmt::Arguments<'_>);

    /// Whether debug output is wanted; lets callers skip costly dumps.
    fn is_debug(&self) -> bool {
        true
    }
}

/// Forwards to `tracing` events under the `adabas_core` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn debug(&self, args: fmt::Arguments<'_>) {
        tracing::debug!(target: "adabas_core", "{}", args);
    }

    fn info(&self, args: fmt::Arguments<'_>) {
        tracing::info!(target: "adabas_core", "{}", args);
    }

    fn is_debug(&self) -> bool {
        tracing::enabled!(target: "adabas_core", tracing::Level::DEBUG)
    }
}

/// Discards all output.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullLogger;

impl Logger for NullLogger {
    fn debug(&self, _args: fmt::Arguments<'_>) {}

    fn info(&self, _args: fmt::Arguments<'_>) {}

    fn is_debug(&self) -> bool {
        false
    }
}

/// The default handle used when none is supplied.
pub fn default_logger() -> Arc<dyn Logger> {
    Arc::new(TracingLogger)
}

/// Hex dump in rows of `width` bytes, used for debug traces of frames.
pub fn hex_dump(title: &str, data: &[u8], width: usize) -> String {
    let width = width.max(1);
    let mut out = format!("{} ({} bytes)", title, data.len());
    for (row, chunk) in data.chunks(width).enumerate() {
        out.push_str(&format!("\n{:04x}:", row * width));
        for b in chunk {
            out.push_str(&format!(" {:02x}", b));
        }
        out.push_str("  ");
        out.extend(chunk.iter().map(|b| {
            if b.is_ascii_graphic() || *b == b' ' {
                *b as char
            } else {
                '.'
            }
        }));
    }
    out
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Captures log lines for assertions.
    #[derive(Debug, Default)]
    pub struct CaptureLogger {
        pub lines: Mutex<Vec<String>>,
    }

    impl Logger for CaptureLogger {
        fn debug(&self, args: fmt::Arguments<'_>) {
            self.lines.lock().unwrap().push(format!("DEBUG {}", args));
        }

        fn info(&self, args: fmt::Arguments<'_>) {
            self.lines.lock().unwrap().push(format!("INFO {}", args));
        }
    }
}
