//! Per-case log capture via a tracing [`Layer`].
//!
//! [`CaptureLayer`] formats each tracing event as a single JSON line, tags it
//! with the `suite` and `case` fields of the enclosing spans, and publishes it
//! on a global [`broadcast`] channel. The runner subscribes around each case
//! and keeps the lines of failing cases for the report.

use std::fmt;
use std::sync::OnceLock;

use serde_json::{Map, Value};
use tokio::sync::broadcast;
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

// ---------------------------------------------------------------------------
// Global channel
// ---------------------------------------------------------------------------

static LOGS_TX: OnceLock<broadcast::Sender<CapturedEvent>> = OnceLock::new();

/// One formatted event and the suite/case it was emitted under.
#[derive(Debug, Clone)]
pub struct CapturedEvent {
    pub suite: Option<String>,
    pub case: Option<String>,
    pub line: String,
}

/// Initialise the global capture channel and return the sender.
///
/// Subsequent calls return a clone of the original sender.
pub fn init_capture() -> broadcast::Sender<CapturedEvent> {
    LOGS_TX
        .get_or_init(|| {
            let (tx, _) = broadcast::channel::<CapturedEvent>(1024);
            tx
        })
        .clone()
}

/// Receiver for captured events, or `None` before [`init_capture`].
pub fn subscribe() -> Option<broadcast::Receiver<CapturedEvent>> {
    LOGS_TX.get().map(|tx| tx.subscribe())
}

/// Drain whatever `rx` holds for the given suite and case.
///
/// When the receiver fell behind, a marker line records how many events
/// were lost; they may or may not have belonged to this case.
pub fn drain_for(
    rx: &mut broadcast::Receiver<CapturedEvent>,
    suite: &str,
    case: &str,
) -> Vec<String> {
    let mut lines = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(ev) => {
                if ev.suite.as_deref() == Some(suite) && ev.case.as_deref() == Some(case) {
                    lines.push(ev.line);
                }
            }
            Err(broadcast::error::TryRecvError::Lagged(n)) => {
                lines.push(dropped_marker(n));
            }
            Err(_) => break,
        }
    }
    lines
}

fn dropped_marker(n: u64) -> String {
    format!("[{n} log line(s) dropped: capture buffer overflowed]")
}

// ---------------------------------------------------------------------------
// Tracing layer
// ---------------------------------------------------------------------------

/// Span fields stashed in the registry's span extensions.
struct SpanFields(Map<String, Value>);

pub struct CaptureLayer {
    tx: broadcast::Sender<CapturedEvent>,
}

impl CaptureLayer {
    pub fn new(tx: broadcast::Sender<CapturedEvent>) -> Self {
        Self { tx }
    }
}

impl<S> Layer<S> for CaptureLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let mut visitor = JsonVisitor::default();
        attrs.record(&mut visitor);
        if let Some(span) = ctx.span(id) {
            span.extensions_mut().insert(SpanFields(visitor.fields));
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        // Nobody listening between cases.
        if self.tx.receiver_count() == 0 {
            return;
        }

        let meta = event.metadata();
        let mut visitor = JsonVisitor::default();
        event.record(&mut visitor);

        let mut suite = None;
        let mut case = None;
        if let Some(scope) = ctx.event_scope(event) {
            for span in scope.from_root() {
                let ext = span.extensions();
                if let Some(SpanFields(fields)) = ext.get::<SpanFields>() {
                    if let Some(Value::String(s)) = fields.get("suite") {
                        suite = Some(s.clone());
                    }
                    if let Some(Value::String(c)) = fields.get("case") {
                        case = Some(c.clone());
                    }
                }
            }
        }

        let json = serde_json::json!({
            "level": level_str(meta.level()),
            "target": meta.target(),
            "message": visitor.message.unwrap_or_default(),
            "fields": visitor.fields,
            "ts": chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        });

        if let Ok(line) = serde_json::to_string(&json) {
            let _ = self.tx.send(CapturedEvent { suite, case, line });
        }
    }
}

fn level_str(level: &Level) -> &'static str {
    match *level {
        Level::ERROR => "ERROR",
        Level::WARN => "WARN",
        Level::INFO => "INFO",
        Level::DEBUG => "DEBUG",
        Level::TRACE => "TRACE",
    }
}

// ---------------------------------------------------------------------------
// Field visitor
// ---------------------------------------------------------------------------

#[derive(Default)]
struct JsonVisitor {
    message: Option<String>,
    fields: Map<String, Value>,
}

impl Visit for JsonVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        let val = format!("{value:?}");
        if field.name() == "message" {
            self.message = Some(val);
        } else {
            self.fields
                .insert(field.name().to_string(), Value::String(val));
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.fields
                .insert(field.name().to_string(), Value::String(value.to_string()));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.fields
            .insert(field.name().to_string(), Value::Number(value.into()));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.fields
            .insert(field.name().to_string(), Value::Number(value.into()));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.fields
            .insert(field.name().to_string(), Value::Bool(value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::layer::SubscriberExt;

    #[test]
    fn events_are_tagged_with_suite_and_case() {
        let (tx, mut rx) = broadcast::channel(16);
        let subscriber = tracing_subscriber::registry().with(CaptureLayer::new(tx));

        tracing::subscriber::with_default(subscriber, || {
            let span = tracing::info_span!("case", suite = "general", case = "c1");
            let _g = span.enter();
            tracing::info!(course_id = 7u64, "navigated");
        });
        tracing::subscriber::with_default(
            tracing_subscriber::registry(),
            || tracing::info!("not captured"),
        );

        let lines = drain_for(&mut rx, "general", "c1");
        assert_eq!(lines.len(), 1);
        let v: Value = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(v["message"], "navigated");
        assert_eq!(v["level"], "INFO");
        assert_eq!(v["fields"]["course_id"], 7);
    }

    #[test]
    fn overflow_leaves_a_marker() {
        let (tx, mut rx) = broadcast::channel(2);
        let subscriber = tracing_subscriber::registry().with(CaptureLayer::new(tx));

        tracing::subscriber::with_default(subscriber, || {
            let span = tracing::info_span!("case", suite = "general", case = "c1");
            let _g = span.enter();
            for i in 0..5 {
                tracing::info!(i, "busy");
            }
        });

        let lines = drain_for(&mut rx, "general", "c1");
        assert_eq!(lines[0], "[3 log line(s) dropped: capture buffer overflowed]");
        assert_eq!(lines.len(), 3);
        let last: Value = serde_json::from_str(&lines[2]).unwrap();
        assert_eq!(last["fields"]["i"], 4);
    }

    #[test]
    fn drain_skips_other_cases() {
        let (tx, mut rx) = broadcast::channel(16);
        let subscriber = tracing_subscriber::registry().with(CaptureLayer::new(tx));

        tracing::subscriber::with_default(subscriber, || {
            let span = tracing::info_span!("case", suite = "general", case = "other");
            let _g = span.enter();
            tracing::warn!("elsewhere");
        });

        assert!(drain_for(&mut rx, "general", "c1").is_empty());
    }
}
