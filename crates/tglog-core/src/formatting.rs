//! Formatting utilities (log record → Telegram HTML, markup stripping).

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::record::{ArgValue, Failure, LogRecord, LogValue, StackFrame};

/// Tags Telegram HTML mode renders and we let through.
pub const ALLOWED_TAGS: [&str; 7] = ["b", "strong", "i", "em", "a", "code", "pre"];

/// Default number of stack frames rendered for a failure.
pub const DEFAULT_TRACE_FRAMES: usize = 5;

const MAX_ARG_LEN: usize = 255;

/// Escape HTML special characters for Telegram HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)<!--.*?-->|</?([A-Za-z][A-Za-z0-9-]*)[^<>]*>").expect("valid regex")
    })
}

/// Remove every markup tag except [`ALLOWED_TAGS`].
///
/// HTML comments are dropped. A `<` that does not open a tag is escaped as
/// `&lt;` so the result always parses in HTML mode.
pub fn strip_markup(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0usize;

    for caps in tag_re().captures_iter(text) {
        let Some(m) = caps.get(0) else {
            continue;
        };
        out.push_str(&text[last..m.start()].replace('<', "&lt;"));
        last = m.end();

        let keep = caps
            .get(1)
            .map(|name| {
                let name = name.as_str().to_ascii_lowercase();
                ALLOWED_TAGS.contains(&name.as_str())
            })
            .unwrap_or(false);
        if keep {
            out.push_str(m.as_str());
        }
    }

    out.push_str(&text[last..].replace('<', "&lt;"));
    out
}

/// Truncate to `max_len` characters, appending `...` when shortened.
pub fn truncate_text(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        return s.to_string();
    }
    let mut out = s.chars().take(max_len).collect::<String>();
    out.push_str("...");
    out
}

fn render_arg(arg: &ArgValue) -> String {
    match arg {
        ArgValue::Str(s) => format!("'{}'", truncate_text(s, MAX_ARG_LEN)),
        ArgValue::Array => "Array".to_string(),
        ArgValue::Null => "NULL".to_string(),
        ArgValue::Bool(b) => b.to_string(),
        ArgValue::Object(class) => class.clone(),
        ArgValue::Resource(kind) => kind.clone(),
        ArgValue::Int(n) => n.to_string(),
        ArgValue::Float(f) => f.to_string(),
    }
}

/// Render frames as `#<n> <file>(<line>): <function>(<args>)`, one per line.
pub fn trace_as_string(frames: &[StackFrame], skip: usize, limit: usize) -> String {
    let mut out = String::new();
    for (n, frame) in frames.iter().skip(skip).take(limit).enumerate() {
        let args = frame
            .args
            .iter()
            .map(render_arg)
            .collect::<Vec<_>>()
            .join(", ");
        let line = frame.line.map(|l| l.to_string()).unwrap_or_default();
        out.push_str(&format!(
            "#{n} {}({line}): {}({args})\n",
            frame.file.as_deref().unwrap_or(""),
            frame.function
        ));
    }
    out
}

/// Describe a failure: type, code, message, location and a short trace.
pub fn describe_failure(f: &Failure, trace_frames: usize) -> String {
    format!(
        "{} [{}] {}\n\n<b>File:</b> {}:{}\n<b>Trace:</b> <code>{}</code>",
        escape_html(&f.type_name),
        f.code,
        escape_html(&f.message),
        escape_html(&f.file),
        f.line,
        escape_html(&trace_as_string(&f.trace, 0, trace_frames))
    )
}

/// Render the body of a record, without header or frames.
pub fn render_value(value: &LogValue, trace_frames: usize) -> String {
    match value {
        LogValue::Text(s) => s.clone(),
        LogValue::Structured(v) => {
            let dump = serde_json::to_string_pretty(v).unwrap_or_else(|_| v.to_string());
            escape_html(&dump)
        }
        LogValue::Failure(f) => describe_failure(f, trace_frames),
    }
}

/// `YYYY-mm-dd HH:MM:SS` in UTC.
pub fn format_time(timestamp: f64) -> String {
    let secs = timestamp.floor() as i64;
    let nanos = ((timestamp - timestamp.floor()) * 1_000_000_000.0) as u32;
    DateTime::<Utc>::from_timestamp(secs, nanos)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| timestamp.to_string())
}

#[derive(Clone, Debug)]
pub struct FormatOptions {
    /// Inserted between the time and `[LEVEL]`, e.g. a host or app name.
    pub prefix: Option<String>,
    pub trace_frames: usize,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            prefix: None,
            trace_frames: DEFAULT_TRACE_FRAMES,
        }
    }
}

/// Render a record as one Telegram HTML message.
pub fn format_record(record: &LogRecord, opts: &FormatOptions) -> String {
    let body = render_value(&record.value, opts.trace_frames);
    let prefix = opts
        .prefix
        .as_deref()
        .map(|p| format!("[{}]", escape_html(p)))
        .unwrap_or_default();

    let mut out = format!(
        "<code>{} {prefix}[{}][{}]</code>\n{body}",
        format_time(record.timestamp),
        record.level.name(),
        escape_html(&record.category)
    );

    let traces = record
        .frames
        .iter()
        .map(|f| {
            let file = escape_html(f.file.as_deref().unwrap_or("unknown"));
            let line = f.line.map(|l| l.to_string()).unwrap_or_default();
            format!("<code>in {file}:{line}</code>")
        })
        .collect::<Vec<_>>();
    if !traces.is_empty() {
        out.push_str("\n    ");
        out.push_str(&traces.join("\n    "));
    }

    strip_markup(&out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Level;
    use rand::{seq::SliceRandom, Rng};

    #[test]
    fn escapes_html() {
        let s = r#"<a href="x&y">"#;
        assert_eq!(escape_html(s), "&lt;a href=&quot;x&amp;y&quot;&gt;");
    }

    #[test]
    fn strip_keeps_allowed_tags_only() {
        let s = "<b>bold</b> <script>alert(1)</script> <a href=\"u\">l</a><div>x</div>";
        assert_eq!(
            strip_markup(s),
            "<b>bold</b> alert(1) <a href=\"u\">l</a>x"
        );
    }

    #[test]
    fn strip_is_case_insensitive_and_drops_comments() {
        assert_eq!(strip_markup("<PRE>x</PRE><!-- <b>hidden</b> -->"), "<PRE>x</PRE>");
    }

    #[test]
    fn strip_escapes_stray_angle_brackets() {
        assert_eq!(strip_markup("a < b <<i>c</i>"), "a &lt; b &lt;<i>c</i>");
    }

    #[test]
    fn formatter_never_emits_disallowed_tags() {
        let pieces = [
            "<b>", "</b>", "<script>", "</script>", "<div class='x'>", "<", ">", "<<", "<i",
            "text", "<!--", "-->", "<img src=x onerror=y>", "<code>", "</pre>", "é", "\n", "&",
            "<a href=\"h\">", "</a>", "<STYLE>", "<br/>",
        ];
        let any_tag = Regex::new(r"</?([A-Za-z][A-Za-z0-9-]*)[^<>]*>").unwrap();
        let mut rng = rand::thread_rng();

        for _ in 0..500 {
            let n = rng.gen_range(0..30);
            let soup: String = (0..n)
                .map(|_| *pieces.choose(&mut rng).unwrap())
                .collect();
            let rec = LogRecord::new(Level::Info, "fuzz", soup.clone()).at(0.0);
            let out = format_record(&rec, &FormatOptions::default());
            for caps in any_tag.captures_iter(&out) {
                let name = caps[1].to_ascii_lowercase();
                assert!(
                    ALLOWED_TAGS.contains(&name.as_str()),
                    "disallowed tag {name} in {out:?} (input {soup:?})"
                );
            }
        }
    }

    #[test]
    fn formats_header_body_and_frames() {
        let rec = LogRecord::new(Level::Error, "orders", "boom")
            .at(0.0)
            .with_frames(vec![
                StackFrame::new("/app/a.rs", 10, "f"),
                StackFrame::new("/app/b.rs", 20, "g"),
            ]);
        let out = format_record(&rec, &FormatOptions::default());
        assert_eq!(
            out,
            "<code>1970-01-01 00:00:00 [ERROR][orders]</code>\nboom\n    <code>in /app/a.rs:10</code>\n    <code>in /app/b.rs:20</code>"
        );
    }

    #[test]
    fn formats_prefix() {
        let rec = LogRecord::new(Level::Info, "app", "x").at(0.0);
        let opts = FormatOptions {
            prefix: Some("web-1".to_string()),
            ..Default::default()
        };
        assert!(format_record(&rec, &opts).starts_with("<code>1970-01-01 00:00:00 [web-1][INFO][app]</code>"));
    }

    #[test]
    fn structured_values_are_pretty_and_keep_unicode() {
        let rec = LogRecord::new(Level::Info, "app", serde_json::json!({"name": "Привет"})).at(0.0);
        let out = format_record(&rec, &FormatOptions::default());
        assert!(out.contains("{\n  &quot;name&quot;: &quot;Привет&quot;\n}"));
    }

    #[test]
    fn failure_is_described_with_truncated_trace() {
        let frames = (0..8)
            .map(|i| StackFrame::new(format!("/src/f{i}.rs"), i, format!("fn{i}")))
            .collect::<Vec<_>>();
        let f = Failure::new("IoError", "no <access>")
            .with_code(13)
            .at("/src/main.rs", 42)
            .with_trace(frames);
        let out = describe_failure(&f, DEFAULT_TRACE_FRAMES);

        assert!(out.starts_with("IoError [13] no &lt;access&gt;\n\n<b>File:</b> /src/main.rs:42\n"));
        assert!(out.contains("#4 /src/f4.rs(4): fn4()"));
        assert!(!out.contains("#5 "));
    }

    #[test]
    fn trace_args_are_abbreviated() {
        let long = "x".repeat(300);
        let frame = StackFrame::new("/a.rs", 1, "call").with_args(vec![
            ArgValue::Str(long),
            ArgValue::Array,
            ArgValue::Null,
            ArgValue::Bool(false),
            ArgValue::Object("Conn".to_string()),
            ArgValue::Resource("stream".to_string()),
            ArgValue::Int(7),
        ]);
        let s = trace_as_string(&[frame], 0, 5);
        let expected_str = format!("'{}...'", "x".repeat(255));
        assert_eq!(
            s,
            format!("#0 /a.rs(1): call({expected_str}, Array, NULL, false, Conn, stream, 7)\n")
        );
    }

    #[test]
    fn trace_skips_frames() {
        let frames = vec![
            StackFrame::new("/a.rs", 1, "a"),
            StackFrame::new("/b.rs", 2, "b"),
        ];
        assert_eq!(trace_as_string(&frames, 1, 5), "#0 /b.rs(2): b()\n");
    }
}
