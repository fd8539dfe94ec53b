//! Application-facing logger with explicit per-call context.
//!
//! A [`LogContext`] collects extra lines (request data, links to trace files)
//! that are appended to the next message logged through it, then cleared.
//! Nothing here is process-global: callers own the context and pass it in.

use std::collections::BTreeMap;

use crate::{
    bot::BotClient,
    domain::Level,
    formatting::{escape_html, render_value, DEFAULT_TRACE_FRAMES},
    pipeline::RecordBuffer,
    record::{LogRecord, LogValue},
    trace_file::TraceFileSink,
    Result,
};

/// Request/process details attached to a message on demand.
#[derive(Clone, Debug, Default)]
pub struct RequestInfo {
    pub host: Option<String>,
    pub server: Option<String>,
    pub path: Option<String>,
    pub agent: Option<String>,
    pub referer: Option<String>,
    pub ip: Option<String>,
    pub session: Option<String>,
    pub headers: Option<BTreeMap<String, String>>,
    pub file: Option<String>,
    pub args: Option<String>,
    pub user: Option<String>,
    /// Decoded request body, rendered as JSON after the details.
    pub params: Option<serde_json::Value>,
}

impl RequestInfo {
    /// Details of the running process (for CLI tools and workers).
    pub fn from_process() -> Self {
        let mut args = std::env::args();
        let file = args.next();
        let rest = args.collect::<Vec<_>>().join(" ");
        Self {
            file,
            args: Some(rest).filter(|s| !s.is_empty()),
            user: std::env::var("USER")
                .or_else(|_| std::env::var("USERNAME"))
                .ok(),
            server: std::env::var("HOSTNAME").ok().or_else(|| {
                std::fs::read_to_string("/etc/hostname")
                    .ok()
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
            }),
            ..Default::default()
        }
    }

    /// `key: value` lines, followed by `extra` and the request params.
    pub fn render(&self, extra: &BTreeMap<String, String>) -> String {
        let mut out = String::new();
        let pairs = [
            ("host", &self.host),
            ("server", &self.server),
            ("path", &self.path),
            ("agent", &self.agent),
            ("referer", &self.referer),
            ("ip", &self.ip),
            ("session", &self.session),
            ("file", &self.file),
            ("args", &self.args),
            ("user", &self.user),
        ];
        for (k, v) in pairs {
            if let Some(v) = v {
                out.push_str(&format!("{k}: {v}\n"));
            }
        }
        if let Some(headers) = &self.headers {
            let json = serde_json::to_string_pretty(headers).unwrap_or_default();
            out.push_str(&format!("headers: {json}\n"));
        }
        for (k, v) in extra {
            out.push_str(&format!("{k}: {v}\n"));
        }
        if let Some(params) = &self.params {
            let json = serde_json::to_string_pretty(params).unwrap_or_else(|_| params.to_string());
            out.push_str(&format!("\nRequest Params: {json}\n"));
        }
        out
    }
}

#[derive(Clone, Debug, Default)]
pub struct LogContext {
    lines: Vec<String>,
    extra_info: BTreeMap<String, String>,
}

impl LogContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a line for the next message. Empty lines are ignored.
    pub fn add(&mut self, line: impl Into<String>) -> &mut Self {
        let line = line.into();
        if !line.is_empty() {
            self.lines.push(line);
        }
        self
    }

    /// Extra `key: value` shown with request data.
    pub fn set_extra_info(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.extra_info.insert(key.into(), value.into());
        self
    }

    pub fn pending(&self) -> &[String] {
        &self.lines
    }

    /// Drain queued lines, each prefixed with a newline.
    pub fn take_lines(&mut self) -> String {
        self.lines
            .drain(..)
            .map(|l| format!("\n{l}"))
            .collect()
    }

    /// Store `data` in a trace file and queue `<b>title:</b> url`.
    pub fn with_external_data(
        &mut self,
        sink: &TraceFileSink,
        data: impl Into<LogValue>,
        title: &str,
    ) -> Result<&mut Self> {
        let content = match data.into() {
            LogValue::Text(s) => s,
            LogValue::Structured(v) => serde_json::to_string_pretty(&v)?,
            other => render_value(&other, DEFAULT_TRACE_FRAMES),
        };
        let url = sink.create(&content, "trace", "txt")?;
        Ok(self.add(format!("<b>{}:</b> {url}", escape_html(title))))
    }

    /// Queue request details, as a trace-file link when a sink is given,
    /// inline otherwise.
    pub fn with_request_data(
        &mut self,
        request: &RequestInfo,
        sink: Option<&TraceFileSink>,
    ) -> Result<&mut Self> {
        let details = request.render(&self.extra_info);
        let rendered = match sink {
            Some(sink) => sink.create(&details, "trace", "txt")?,
            None => format!("<code>{}</code>", escape_html(&details)),
        };
        Ok(self.add(format!("<b>Request Data:</b> {rendered}")))
    }
}

/// Level helpers for one category, all funnelled through `process_log`.
#[derive(Clone, Debug)]
pub struct Logger {
    category: String,
    buffer: RecordBuffer,
}

impl Logger {
    pub fn new(category: impl Into<String>, buffer: RecordBuffer) -> Self {
        Self {
            category: category.into(),
            buffer,
        }
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn debug(&self, ctx: &mut LogContext, value: impl Into<LogValue>) {
        self.process_log(ctx, value.into(), Level::Trace);
    }

    pub fn info(&self, ctx: &mut LogContext, value: impl Into<LogValue>) {
        self.process_log(ctx, value.into(), Level::Info);
    }

    pub fn warning(&self, ctx: &mut LogContext, value: impl Into<LogValue>) {
        self.process_log(ctx, value.into(), Level::Warning);
    }

    pub fn error(&self, ctx: &mut LogContext, value: impl Into<LogValue>) {
        self.process_log(ctx, value.into(), Level::Error);
    }

    /// Render `value` plus queued lines without logging it.
    pub fn message(&self, ctx: &mut LogContext, value: impl Into<LogValue>) -> String {
        let mut out = render_value(&value.into(), DEFAULT_TRACE_FRAMES);
        out.push_str(&ctx.take_lines());
        out
    }

    /// Send `value` plus queued lines straight to this category's chat,
    /// bypassing the buffer. Empty text is not sent.
    pub async fn to_telegram(
        &self,
        ctx: &mut LogContext,
        bot: &BotClient,
        value: impl Into<LogValue>,
    ) -> Result<Vec<serde_json::Value>> {
        let value = value.into();
        if is_blank(&value) {
            return Ok(Vec::new());
        }
        let message = self.message(ctx, value);
        bot.send_message(bot.target(&self.category), &message).await
    }

    fn process_log(&self, ctx: &mut LogContext, value: LogValue, level: Level) {
        if is_blank(&value) {
            return;
        }
        let value = if ctx.pending().is_empty() {
            value
        } else {
            LogValue::Text(self.message(ctx, value))
        };
        self.buffer
            .push(LogRecord::new(level, self.category.clone(), value));
    }
}

fn is_blank(value: &LogValue) -> bool {
    matches!(value, LogValue::Text(s) if s.is_empty())
}
