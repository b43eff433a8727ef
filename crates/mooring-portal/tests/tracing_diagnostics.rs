#![forbid(unsafe_code)]

//! Diagnostic logging: content rejections, resolution spans, and
//! watcher-path faults.
//!
//! Run:
//!   cargo test -p mooring-portal --test tracing_diagnostics

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;

use mooring_dom::Document;
use mooring_portal::{AnchorFault, AnchorSpec, Content, Portal, PortalConfig, Position};

// ============================================================================
// Test Infrastructure
// ============================================================================

#[derive(Debug, Clone)]
struct CapturedSpan {
    name: String,
    level: tracing::Level,
    fields: HashMap<String, String>,
}

#[derive(Debug, Clone)]
struct CapturedEvent {
    level: tracing::Level,
    message: String,
    fields: HashMap<String, String>,
    parent_span_name: Option<String>,
}

struct Capture {
    spans: Arc<Mutex<Vec<CapturedSpan>>>,
    events: Arc<Mutex<Vec<CapturedEvent>>>,
    span_index: Arc<Mutex<HashMap<u64, usize>>>,
}

struct CaptureHandle {
    spans: Arc<Mutex<Vec<CapturedSpan>>>,
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl CaptureHandle {
    fn spans_named(&self, name: &str) -> Vec<CapturedSpan> {
        self.spans
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.name == name)
            .cloned()
            .collect()
    }

    fn events_at(&self, level: tracing::Level) -> Vec<CapturedEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.level == level)
            .cloned()
            .collect()
    }
}

struct FieldVisitor(Vec<(String, String)>);

impl tracing::field::Visit for FieldVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.0.push((field.name().to_string(), format!("{value:?}")));
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.0.push((field.name().to_string(), value.to_string()));
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.0.push((field.name().to_string(), value.to_string()));
    }

    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        self.0.push((field.name().to_string(), value.to_string()));
    }
}

impl<S> tracing_subscriber::Layer<S> for Capture
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(
        &self,
        attrs: &tracing::span::Attributes<'_>,
        id: &tracing::span::Id,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let mut visitor = FieldVisitor(Vec::new());
        attrs.record(&mut visitor);
        let mut spans = self.spans.lock().unwrap();
        let idx = spans.len();
        spans.push(CapturedSpan {
            name: attrs.metadata().name().to_string(),
            level: *attrs.metadata().level(),
            fields: visitor.0.into_iter().collect(),
        });
        self.span_index.lock().unwrap().insert(id.into_u64(), idx);
    }

    fn on_record(
        &self,
        id: &tracing::span::Id,
        values: &tracing::span::Record<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let mut visitor = FieldVisitor(Vec::new());
        values.record(&mut visitor);
        let index = self.span_index.lock().unwrap();
        if let Some(&idx) = index.get(&id.into_u64()) {
            if let Some(span) = self.spans.lock().unwrap().get_mut(idx) {
                span.fields.extend(visitor.0);
            }
        }
    }

    fn on_event(&self, event: &tracing::Event<'_>, ctx: tracing_subscriber::layer::Context<'_, S>) {
        let mut visitor = FieldVisitor(Vec::new());
        event.record(&mut visitor);
        let fields: HashMap<String, String> = visitor.0.into_iter().collect();
        let message = fields.get("message").cloned().unwrap_or_default();
        let parent_span_name = ctx
            .current_span()
            .id()
            .and_then(|id| ctx.span(id))
            .map(|span_ref| span_ref.name().to_string());
        self.events.lock().unwrap().push(CapturedEvent {
            level: *event.metadata().level(),
            message,
            fields,
            parent_span_name,
        });
    }
}

fn with_captured<F>(f: F) -> CaptureHandle
where
    F: FnOnce(),
{
    let spans = Arc::new(Mutex::new(Vec::new()));
    let events = Arc::new(Mutex::new(Vec::new()));
    let layer = Capture {
        spans: spans.clone(),
        events: events.clone(),
        span_index: Arc::new(Mutex::new(HashMap::new())),
    };
    let subscriber = tracing_subscriber::registry()
        .with(tracing_subscriber::filter::LevelFilter::TRACE)
        .with(layer);
    tracing::subscriber::with_default(subscriber, f);
    CaptureHandle { spans, events }
}

fn doc_with_anchor() -> Document {
    let doc = Document::new();
    let anchor = doc.create_element("div");
    doc.set_attribute(anchor, "id", "anchor").unwrap();
    doc.append_child(doc.body(), anchor).unwrap();
    doc
}

// ============================================================================
// Content rejections
// ============================================================================

#[test]
fn multiple_children_log_an_error() {
    let handle = with_captured(|| {
        let doc = doc_with_anchor();
        let items = vec![
            Content::element(doc.create_element("div")),
            Content::element(doc.create_element("div")),
        ];
        let _portal = Portal::mount(&doc, PortalConfig::new("#anchor"), Content::Many(items)).unwrap();
    });

    let errors = handle.events_at(tracing::Level::ERROR);
    assert_eq!(errors.len(), 1, "{errors:?}");
    assert_eq!(errors[0].message, "portal content rejected");
    assert!(errors[0].fields["violation"].contains("multiple children are not supported"));
}

#[test]
fn fragment_children_log_an_error() {
    let handle = with_captured(|| {
        let doc = doc_with_anchor();
        let fragment = Content::Fragment(vec![Content::element(doc.create_element("span"))]);
        let _portal = Portal::mount(&doc, PortalConfig::new("#anchor"), fragment).unwrap();
    });

    let errors = handle.events_at(tracing::Level::ERROR);
    assert_eq!(errors.len(), 1, "{errors:?}");
    assert!(errors[0].fields["violation"].contains("fragment children are not supported"));
}

#[test]
fn text_and_empty_content_are_silent() {
    let handle = with_captured(|| {
        let doc = doc_with_anchor();
        let _a = Portal::mount(&doc, PortalConfig::new("#anchor"), Content::text("hi")).unwrap();
        let _b = Portal::mount(&doc, PortalConfig::new("#anchor"), Content::Empty).unwrap();
    });

    assert!(handle.events_at(tracing::Level::ERROR).is_empty());
    assert!(handle.events_at(tracing::Level::WARN).is_empty());
}

// ============================================================================
// Spans and transitions
// ============================================================================

#[test]
fn resolution_cycle_records_its_outcome() {
    let handle = with_captured(|| {
        let doc = doc_with_anchor();
        let content = doc.create_element("p");
        let _found = Portal::mount(&doc, PortalConfig::new("#anchor"), content).unwrap();
        let _missing = Portal::mount(&doc, PortalConfig::new("#missing"), Content::Empty).unwrap();
    });

    let spans = handle.spans_named("mooring.resolve");
    assert_eq!(spans.len(), 2);
    assert!(spans.iter().all(|s| s.level == tracing::Level::INFO));
    assert_eq!(spans[0].fields["anchor_kind"], "selector");
    assert_eq!(spans[0].fields["position"], "last");
    assert_eq!(spans[0].fields["anchor_found"], "true");
    assert_eq!(spans[0].fields["container_found"], "true");
    assert!(spans[0].fields.contains_key("duration_us"));
    assert_eq!(spans[1].fields["anchor_found"], "false");
    assert_eq!(spans[1].fields["container_found"], "false");
}

#[test]
fn attach_is_logged_inside_the_resolve_span() {
    let handle = with_captured(|| {
        let doc = doc_with_anchor();
        let _portal = Portal::mount(&doc, PortalConfig::new("#anchor"), doc.create_element("p")).unwrap();
    });

    let attached: Vec<_> = handle
        .events_at(tracing::Level::INFO)
        .into_iter()
        .filter(|e| e.message == "portal attached")
        .collect();
    assert_eq!(attached.len(), 1);
    assert_eq!(attached[0].parent_span_name.as_deref(), Some("mooring.resolve"));
}

#[test]
fn container_change_costs_a_single_cycle() {
    let handle = with_captured(|| {
        let doc = Document::new();
        let old_home = doc.create_element("div");
        let new_home = doc.create_element("div");
        doc.append_child(doc.body(), old_home).unwrap();
        doc.append_child(doc.body(), new_home).unwrap();
        let anchor = doc.create_element("div");
        doc.set_attribute(anchor, "id", "anchor").unwrap();
        doc.append_child(old_home, anchor).unwrap();
        let content = doc.create_element("p");
        let config = PortalConfig::new("#anchor").with_position(Position::After);
        let portal = Portal::mount(&doc, config, content).unwrap();
        doc.flush_mutations();

        doc.append_child(new_home, anchor).unwrap();
        doc.flush_mutations();
        assert_eq!(portal.container(), Some(new_home));
        assert_eq!(doc.next_sibling(anchor), Some(content));
    });

    // Mount, then the anchor move. Moving the content itself is self-caused.
    assert_eq!(handle.spans_named("mooring.resolve").len(), 2);
}

#[test]
fn watcher_fault_is_logged_under_the_flush_span() {
    let handle = with_captured(|| {
        let doc = Document::new();
        let config = PortalConfig::new(AnchorSpec::factory(|doc| {
            if doc.get_element_by_id("trigger").is_some() {
                Err(AnchorFault::new("trigger present"))
            } else {
                Ok(None)
            }
        }));
        let portal = Portal::mount(&doc, config, Content::Empty).unwrap();

        let trigger = doc.create_element("div");
        doc.set_attribute(trigger, "id", "trigger").unwrap();
        doc.append_child(doc.body(), trigger).unwrap();
        doc.flush_mutations();
        assert!(portal.take_fault().is_some());
    });

    let errors = handle.events_at(tracing::Level::ERROR);
    assert_eq!(errors.len(), 1, "{errors:?}");
    assert_eq!(errors[0].message, "resolution after document change failed");
    assert_eq!(errors[0].fields["error_type"], "anchor_factory");
    assert_eq!(
        errors[0].parent_span_name.as_deref(),
        Some("mooring.mutations.flush")
    );
}
