//! Hooking into the host's `tracing` pipeline.
//!
//! [`TelegramLayer`] turns events into [`LogRecord`]s and parks them in a
//! [`RecordBuffer`]. Nothing is sent from inside the subscriber; the host
//! decides when to run an export cycle via `LogTarget::flush` (or
//! [`spawn_flush_loop`]).
//!
//! ```ignore
//! use tracing_subscriber::{filter::LevelFilter, prelude::*};
//!
//! let buffer = RecordBuffer::default();
//! tracing_subscriber::registry()
//!     .with(tracing_subscriber::fmt::layer())
//!     .with(TelegramLayer::new(buffer.clone()).with_filter(LevelFilter::ERROR))
//!     .init();
//! ```

use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use tokio::task::JoinHandle;
use tracing::{
    field::{Field, Visit},
    Event, Subscriber,
};
use tracing_subscriber::{layer::Context, Layer};

use crate::{
    domain::Level,
    record::{LogRecord, StackFrame},
    target::LogTarget,
};

/// Targets never forwarded, so sending a message cannot log its way into
/// another message.
const IGNORED_TARGETS: [&str; 7] = [
    "tglog",
    "tglog_core",
    "tglog_telegram",
    "reqwest",
    "hyper",
    "h2",
    "rustls",
];

/// Shared queue of records waiting for the next export cycle.
#[derive(Clone, Debug, Default)]
pub struct RecordBuffer {
    inner: Arc<Mutex<Vec<LogRecord>>>,
}

impl RecordBuffer {
    fn guard(&self) -> MutexGuard<'_, Vec<LogRecord>> {
        // A panic while pushing leaves the Vec intact; keep using it.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn push(&self, record: LogRecord) {
        self.guard().push(record);
    }

    pub fn drain(&self) -> Vec<LogRecord> {
        std::mem::take(&mut *self.guard())
    }

    pub fn len(&self) -> usize {
        self.guard().len()
    }

    pub fn is_empty(&self) -> bool {
        self.guard().is_empty()
    }
}

pub struct TelegramLayer {
    buffer: RecordBuffer,
}

impl TelegramLayer {
    pub fn new(buffer: RecordBuffer) -> Self {
        Self { buffer }
    }
}

fn is_ignored(target: &str) -> bool {
    IGNORED_TARGETS.iter().any(|t| {
        target == *t
            || target
                .strip_prefix(t)
                .map(|rest| rest.starts_with("::"))
                .unwrap_or(false)
    })
}

fn map_level(level: &tracing::Level) -> Level {
    match *level {
        tracing::Level::ERROR => Level::Error,
        tracing::Level::WARN => Level::Warning,
        tracing::Level::INFO => Level::Info,
        _ => Level::Trace,
    }
}

#[derive(Default)]
struct EventVisitor {
    message: Option<String>,
    fields: Vec<String>,
}

impl Visit for EventVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.fields.push(format!("{}={value}", field.name()));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{value:?}"));
        } else {
            self.fields.push(format!("{}={value:?}", field.name()));
        }
    }
}

impl<S: Subscriber> Layer<S> for TelegramLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        if is_ignored(meta.target()) {
            return;
        }

        let mut visitor = EventVisitor::default();
        event.record(&mut visitor);

        let mut text = visitor.message.unwrap_or_default();
        if !visitor.fields.is_empty() {
            if !text.is_empty() {
                text.push(' ');
            }
            text.push_str(&visitor.fields.join(" "));
        }

        let mut record = LogRecord::new(map_level(meta.level()), meta.target(), text);
        if let (Some(file), Some(line)) = (meta.file(), meta.line()) {
            record = record.with_frames(vec![StackFrame::new(
                file,
                line,
                meta.module_path().unwrap_or_default(),
            )]);
        }
        self.buffer.push(record);
    }
}

/// Flush `target` every `interval` until the handle is aborted.
///
/// Export failures are reported through `tracing` and do not stop the loop.
pub fn spawn_flush_loop(target: Arc<LogTarget>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            if let Err(e) = target.flush().await {
                tracing::warn!(error = %e, "telegram export failed");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        bot::BotClient,
        domain::Destination,
        errors::Error,
        record::LogValue,
        routing::RoutingTable,
        transport::{
            port::ApiTransport,
            types::{ApiRequest, ApiResponse},
        },
        Result,
    };
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tracing_subscriber::prelude::*;

    /// Fails the first call with a transport error, accepts the rest.
    #[derive(Default)]
    struct FlakyTransport {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ApiTransport for FlakyTransport {
        async fn call(&self, _req: ApiRequest) -> Result<ApiResponse> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(Error::Transport("connection reset".to_string()));
            }
            Ok(ApiResponse::from_body(true, r#"{"ok":true}"#))
        }
    }

    #[test]
    fn ignores_own_and_http_targets() {
        assert!(is_ignored("tglog_core::bot"));
        assert!(is_ignored("reqwest"));
        assert!(is_ignored("hyper::proto::h1"));
        assert!(!is_ignored("tglogger"));
        assert!(!is_ignored("orders::checkout"));
    }

    #[test]
    fn layer_buffers_events_as_records() {
        let buffer = RecordBuffer::default();
        let subscriber = tracing_subscriber::registry().with(TelegramLayer::new(buffer.clone()));

        tracing::subscriber::with_default(subscriber, || {
            tracing::error!(target: "orders", order_id = 42, "payment failed");
            tracing::warn!(target: "tglog_core::bot", "internal, not forwarded");
            tracing::debug!(target: "cache", "miss");
        });

        let records = buffer.drain();
        assert_eq!(records.len(), 2);

        assert_eq!(records[0].level, Level::Error);
        assert_eq!(records[0].category, "orders");
        assert_eq!(
            records[0].value,
            LogValue::Text("payment failed order_id=42".to_string())
        );
        assert_eq!(records[0].frames.len(), 1);
        assert!(records[0].frames[0]
            .file
            .as_deref()
            .unwrap()
            .ends_with("pipeline.rs"));

        assert_eq!(records[1].level, Level::Trace);
        assert_eq!(records[1].category, "cache");
        assert!(buffer.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn flush_loop_survives_failed_export() {
        let t = Arc::new(FlakyTransport::default());
        let buffer = RecordBuffer::default();
        let bot = BotClient::new(t.clone(), RoutingTable::new(Destination::new("000").unwrap()));
        let target = Arc::new(LogTarget::new(bot).with_buffer(buffer.clone()));

        buffer.push(LogRecord::new(Level::Error, "orders", "first"));
        let handle = spawn_flush_loop(target, Duration::from_secs(10));

        // First tick fires immediately and its export fails.
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(t.calls.load(Ordering::SeqCst), 1);
        assert!(buffer.is_empty());

        buffer.push(LogRecord::new(Level::Error, "orders", "second"));
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(t.calls.load(Ordering::SeqCst), 2);
        assert!(buffer.is_empty());

        handle.abort();
    }
}
