//! Run progress logging.
//!
//! The pipeline reports progress through [`log_info`], [`log_success`],
//! [`log_warning`] and [`log_error`]. Entries go to stdout, either as text
//! with a level prefix or as one JSON object per line.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A single log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    /// Log level
    pub level: LogLevel,
    /// Log message
    pub message: String,
    /// Optional indentation level (for nested logs)
    #[serde(default)]
    pub indent: u8,
}

impl LogEntry {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: LogLevel::Info,
            message: message.into(),
            indent: 0,
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: LogLevel::Success,
            message: message.into(),
            indent: 0,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: LogLevel::Warning,
            message: message.into(),
            indent: 0,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: LogLevel::Error,
            message: message.into(),
            indent: 0,
        }
    }

    pub fn with_indent(mut self, indent: u8) -> Self {
        self.indent = indent;
        self
    }

    /// Render as a text line.
    pub fn to_text(&self) -> String {
        let prefix = match self.level {
            LogLevel::Info => "   ",
            LogLevel::Success => "   ✓",
            LogLevel::Warning => "   ⚠️",
            LogLevel::Error => "   ❌",
        };
        let indent = "   ".repeat(self.indent as usize);
        format!("{}{} {}", indent, prefix, self.message)
    }
}

/// Output format for log entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{}'", other)),
        }
    }
}

/// Global log sink
pub static LOG_SINK: Lazy<LogSink> = Lazy::new(LogSink::new);

/// Writes log entries to stdout.
pub struct LogSink {
    quiet: AtomicBool,
    json: AtomicBool,
}

impl LogSink {
    pub fn new() -> Self {
        Self {
            quiet: AtomicBool::new(false),
            json: AtomicBool::new(false),
        }
    }

    /// Suppress everything but errors.
    pub fn set_quiet(&self, quiet: bool) {
        self.quiet.store(quiet, Ordering::Relaxed);
    }

    pub fn set_format(&self, format: LogFormat) {
        self.json.store(format == LogFormat::Json, Ordering::Relaxed);
    }

    pub fn format(&self) -> LogFormat {
        if self.json.load(Ordering::Relaxed) {
            LogFormat::Json
        } else {
            LogFormat::Text
        }
    }

    /// Render an entry in the current format, or `None` when it is silenced.
    pub fn render(&self, entry: &LogEntry) -> Option<String> {
        if self.quiet.load(Ordering::Relaxed) && entry.level != LogLevel::Error {
            return None;
        }
        let line = match self.format() {
            LogFormat::Text => entry.to_text(),
            LogFormat::Json => serde_json::to_string(entry).unwrap_or_else(|_| entry.to_text()),
        };
        Some(line)
    }

    /// Write an entry
    pub fn log(&self, entry: LogEntry) {
        if let Some(line) = self.render(&entry) {
            println!("{}", line);
        }
    }
}

impl Default for LogSink {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenient logging functions
pub fn log_info(msg: impl Into<String>) {
    LOG_SINK.log(LogEntry::info(msg));
}

pub fn log_success(msg: impl Into<String>) {
    LOG_SINK.log(LogEntry::success(msg));
}

pub fn log_warning(msg: impl Into<String>) {
    LOG_SINK.log(LogEntry::warning(msg));
}

pub fn log_error(msg: impl Into<String>) {
    LOG_SINK.log(LogEntry::error(msg));
}

pub fn log_info_indent(msg: impl Into<String>, indent: u8) {
    LOG_SINK.log(LogEntry::info(msg).with_indent(indent));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_json_shape() {
        let entry = LogEntry::warning("2 rows excluded").with_indent(1);
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["level"], "warning");
        assert_eq!(json["message"], "2 rows excluded");
        assert_eq!(json["indent"], 1);
    }

    #[test]
    fn test_entry_text_prefix() {
        assert_eq!(LogEntry::success("done").to_text(), "   ✓ done");
        assert_eq!(LogEntry::info("x").with_indent(1).to_text(), "       x");
    }

    #[test]
    fn test_quiet_keeps_errors() {
        let sink = LogSink::new();
        sink.set_quiet(true);
        assert_eq!(sink.render(&LogEntry::info("reading")), None);
        assert_eq!(sink.render(&LogEntry::warning("no input")), None);
        assert_eq!(
            sink.render(&LogEntry::error("bad config")).as_deref(),
            Some("   ❌ bad config")
        );
    }

    #[test]
    fn test_json_sink_renders_warning() {
        let sink = LogSink::new();
        sink.set_format(LogFormat::Json);
        let line = sink.render(&LogEntry::warning("No eu_orders.csv found")).unwrap();
        let json: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(json["level"], "warning");
        assert_eq!(json["message"], "No eu_orders.csv found");
    }

    #[test]
    fn test_sink_format_switch() {
        let sink = LogSink::new();
        assert_eq!(sink.format(), LogFormat::Text);
        sink.set_format(LogFormat::Json);
        assert_eq!(sink.format(), LogFormat::Json);
        assert_eq!("JSON".parse::<LogFormat>(), Ok(LogFormat::Json));
    }
}
