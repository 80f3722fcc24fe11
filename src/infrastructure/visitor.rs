//! Field visitor that renders an event the way it will be printed.
//!
//! The filter key of an event is its level name plus this rendering, so two
//! events share a key exactly when their printed text is identical. The
//! `message` field comes first, other fields follow as ` name=value` in
//! record order, matching the default `fmt` layer.

use std::fmt::{self, Write};
use tracing::field::{Field, Visit};

/// A visitor that renders an event's message and fields into one line.
#[derive(Debug, Default)]
pub(crate) struct MessageVisitor {
    message: String,
    fields: String,
}

impl MessageVisitor {
    /// Create a new visitor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume the visitor and return the rendered line.
    pub fn into_line(self) -> String {
        let Self {
            mut message,
            fields,
        } = self;

        if message.is_empty() {
            // No message: fields only, without the leading space
            return fields.trim_start().to_string();
        }
        message.push_str(&fields);
        message
    }

    fn push_field(&mut self, field: &Field, value: fmt::Arguments<'_>) {
        // Fields bridged from the `log` crate carry metadata, not content
        if field.name().starts_with("log.") {
            return;
        }
        // Writing to a String cannot fail
        let _ = write!(self.fields, " {}={}", field.name(), value);
    }
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            self.push_field(field, format_args!("{:?}", value));
        }
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.push_field(field, format_args!("{}", value));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{:?}", value);
        } else {
            self.push_field(field, format_args!("{:?}", value));
        }
    }
}
