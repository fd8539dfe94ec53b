//! Log records as handed over by the host logging pipeline.

use std::panic::Location;

use chrono::Utc;

use crate::domain::Level;

/// A loggable payload, resolved once where the record is created.
#[derive(Clone, Debug, PartialEq)]
pub enum LogValue {
    Text(String),
    Structured(serde_json::Value),
    Failure(Failure),
}

impl From<&str> for LogValue {
    fn from(s: &str) -> Self {
        LogValue::Text(s.to_string())
    }
}

impl From<String> for LogValue {
    fn from(s: String) -> Self {
        LogValue::Text(s)
    }
}

impl From<serde_json::Value> for LogValue {
    fn from(v: serde_json::Value) -> Self {
        LogValue::Structured(v)
    }
}

impl From<Failure> for LogValue {
    fn from(f: Failure) -> Self {
        LogValue::Failure(f)
    }
}

/// An error/exception captured for rendering.
#[derive(Clone, Debug, PartialEq)]
pub struct Failure {
    pub type_name: String,
    pub code: i64,
    pub message: String,
    pub file: String,
    pub line: u32,
    pub trace: Vec<StackFrame>,
}

impl Failure {
    pub fn new(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            code: 0,
            message: message.into(),
            file: String::new(),
            line: 0,
            trace: Vec::new(),
        }
    }

    /// Capture any `std::error::Error`, including its `source()` chain.
    ///
    /// File and line point at the caller, since Rust errors carry no location.
    #[track_caller]
    pub fn from_error<E: std::error::Error>(err: &E) -> Self {
        let loc = Location::caller();
        let full = std::any::type_name::<E>();
        // `a::Wrapper<b::Inner>` -> `Wrapper`
        let path = full.split('<').next().unwrap_or(full);
        let type_name = path.rsplit("::").next().unwrap_or(path).to_string();

        let mut message = err.to_string();
        let mut source = err.source();
        while let Some(s) = source {
            message.push_str(": ");
            message.push_str(&s.to_string());
            source = s.source();
        }

        Self {
            type_name,
            code: 0,
            message,
            file: loc.file().to_string(),
            line: loc.line(),
            trace: Vec::new(),
        }
    }

    pub fn with_code(mut self, code: i64) -> Self {
        self.code = code;
        self
    }

    pub fn at(mut self, file: impl Into<String>, line: u32) -> Self {
        self.file = file.into();
        self.line = line;
        self
    }

    pub fn with_trace(mut self, trace: Vec<StackFrame>) -> Self {
        self.trace = trace;
        self
    }
}

/// One call-stack frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StackFrame {
    pub file: Option<String>,
    pub line: Option<u32>,
    pub function: String,
    pub args: Vec<ArgValue>,
}

impl StackFrame {
    pub fn new(file: impl Into<String>, line: u32, function: impl Into<String>) -> Self {
        Self {
            file: Some(file.into()),
            line: Some(line),
            function: function.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args(mut self, args: Vec<ArgValue>) -> Self {
        self.args = args;
        self
    }
}

/// Argument value recorded in a stack frame.
#[derive(Clone, Debug, PartialEq)]
pub enum ArgValue {
    Str(String),
    Array,
    Null,
    Bool(bool),
    /// Object argument, rendered by its type name.
    Object(String),
    /// OS handle or similar, rendered by its kind.
    Resource(String),
    Int(i64),
    Float(f64),
}

/// An immutable log record.
#[derive(Clone, Debug, PartialEq)]
pub struct LogRecord {
    pub value: LogValue,
    pub level: Level,
    pub category: String,
    /// Seconds since the Unix epoch.
    pub timestamp: f64,
    pub frames: Vec<StackFrame>,
}

impl LogRecord {
    pub fn new(level: Level, category: impl Into<String>, value: impl Into<LogValue>) -> Self {
        Self {
            value: value.into(),
            level,
            category: category.into(),
            timestamp: now_seconds(),
            frames: Vec::new(),
        }
    }

    pub fn at(mut self, timestamp: f64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_frames(mut self, frames: Vec<StackFrame>) -> Self {
        self.frames = frames;
        self
    }
}

pub fn now_seconds() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}
