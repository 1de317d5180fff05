//! Bridge from `tracing` events into the router.
//!
//! Event targets are module paths (`hyper::proto::h1`). They are turned into
//! dotted source names and matched against the router's declared sources by
//! longest prefix. Events from undeclared targets go through the primary
//! source.

use std::{fmt, sync::Arc};

use tracing::{
    field::{Field, Visit},
    Event, Subscriber,
};
use tracing_subscriber::{layer::Context, registry::LookupSpan, Layer};

use super::{level::Level, router::LogRouter};

/// Targets of this crate, which the router itself logs under
const OWN_TARGET: &str = env!("CARGO_CRATE_NAME");

/// Tracing layer that forwards events to a [`LogRouter`]
pub struct RouterLayer {
    router: Arc<LogRouter>,
}

impl RouterLayer {
    pub fn new(router: Arc<LogRouter>) -> Self {
        Self { router }
    }
}

/// Visitor that collects the message and any extra fields of an event.
struct EventVisitor {
    message: String,
    fields: Vec<(String, String)>,
}

impl EventVisitor {
    fn new() -> Self {
        Self {
            message: String::new(),
            fields: Vec::new(),
        }
    }

    /// Message followed by `key=value` pairs
    fn into_line(self) -> String {
        let mut line = self.message;
        for (key, value) in self.fields {
            if !line.is_empty() {
                line.push(' ');
            }
            line.push_str(&key);
            line.push('=');
            line.push_str(&value);
        }
        line
    }
}

impl Visit for EventVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else {
            self.fields
                .push((field.name().to_string(), format!("{:?}", value)));
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields
                .push((field.name().to_string(), value.to_string()));
        }
    }
}

/// Convert a module path target into a dotted source name
pub fn target_to_source(target: &str) -> String {
    target.replace("::", ".")
}

/// Whether the event was emitted by this crate
fn is_own_target(target: &str) -> bool {
    target == OWN_TARGET
        || target
            .strip_prefix(OWN_TARGET)
            .is_some_and(|rest| rest.starts_with("::"))
}

/// Longest declared source that `name` equals or is nested under
pub fn match_source<'a>(name: &str, sources: &'a [String]) -> Option<&'a str> {
    sources
        .iter()
        .filter(|source| {
            name == source.as_str()
                || name
                    .strip_prefix(source.as_str())
                    .is_some_and(|rest| rest.starts_with('.'))
        })
        .max_by_key(|source| source.len())
        .map(String::as_str)
}

impl<S> Layer<S> for RouterLayer
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        // raised from inside the router (its own diagnostics, or a dependency
        // called during rotation); routing it would wait on our own lock
        if LogRouter::holds_lock_on_current_thread() || is_own_target(metadata.target()) {
            return;
        }

        let mut visitor = EventVisitor::new();
        event.record(&mut visitor);
        let line = visitor.into_line();
        let level = Level::from(*metadata.level());

        let name = target_to_source(metadata.target());
        let sources = self.router.source_names();
        match match_source(&name, &sources) {
            // the primary source is always first
            Some(source) if Some(source) != sources.first().map(String::as_str) => {
                self.router.log_source(source, level, &line);
            }
            _ => self.router.log(&line, level),
        }
    }
}
