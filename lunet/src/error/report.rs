//! Human-readable rendering of runtime errors

use super::LuaError;
use crate::ast::Span;

impl LuaError {
    /// Spans of the frame chain from the raise point outward, stopping at
    /// the first frame that has no resolvable span.
    fn trace_spans(&self) -> Vec<(Span, Option<String>)> {
        let mut spans = Vec::new();
        let mut current = self.frame.clone();
        while let Some(frame) = current {
            let Some(span) = frame.span().filter(|s| s.is_resolvable()) else {
                break;
            };
            spans.push((span, frame.source_ref().map(str::to_string)));
            current = frame.parent();
        }
        spans
    }

    /// Render the error with one trace line per frame, mapping each span
    /// back to a line and column of `code`.
    pub fn to_pretty_string(&self, code: &str) -> String {
        let spans = self.trace_spans();
        if spans.is_empty() {
            return self.to_plain_string();
        }
        let mut trace = String::new();
        for (span, source_ref) in &spans {
            let (line, column) = span.line_column(code);
            trace.push_str(&format!(
                "* {} @ {line}:{column}:\n   {}\n",
                source_ref.as_deref().unwrap_or("(unknown source)"),
                span.excerpt(code)
            ));
        }
        let mut out = format!("LuaRuntimeError: {} {trace}", self.message);
        if let Some(hint) = &self.hint {
            out.push_str(&format!("  hint: {hint}\n"));
        }
        out
    }
}

/// Render an error as an ariadne report over `source`.
pub fn report(filename: &str, source: &str, error: &LuaError) -> String {
    use ariadne::{Config, IndexType, Label, Report, ReportKind, Source};

    let spans = error.trace_spans();
    let clamp = |span: &Span| {
        let end = span.end.min(source.len());
        span.start.min(end)..end
    };
    let range = spans.first().map(|(s, _)| clamp(s)).unwrap_or(0..0);

    let mut builder = Report::build(ReportKind::Error, (filename, range.clone()))
        .with_config(
            Config::default()
                .with_color(false)
                .with_index_type(IndexType::Byte),
        )
        .with_message("runtime error");
    if spans.is_empty() {
        builder = builder.with_note(&error.message);
    } else {
        builder = builder.with_label(Label::new((filename, range)).with_message(&error.message));
    }
    for (span, _) in spans.iter().skip(1) {
        let (line, column) = span.line_column(source);
        builder = builder.with_note(format!(
            "called from {filename}:{line}:{column}: {}",
            span.excerpt(source)
        ));
    }
    if let Some(hint) = &error.hint {
        builder = builder.with_help(hint);
    }

    let mut out = Vec::new();
    match builder.finish().write((filename, Source::from(source)), &mut out) {
        Ok(()) => String::from_utf8_lossy(&out).into_owned(),
        Err(_) => error.to_plain_string(),
    }
}
