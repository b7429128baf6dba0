//! Terminal diagnostic rendering.
//!
//! Renders a [`CompileError`] against the original source text through
//! ariadne, with the offending token labeled at its line/column position.
//! Colorless output keeps snapshot tests deterministic.

use ariadne::{Config, Label, Report, ReportKind, Source};

use stave_common::{CompileError, LineIndex, Severity};

/// Rendering options.
#[derive(Debug, Clone, Copy)]
pub struct DiagnosticOptions {
    pub color: bool,
}

impl Default for DiagnosticOptions {
    fn default() -> Self {
        Self { color: true }
    }
}

impl DiagnosticOptions {
    /// Deterministic output for snapshots.
    pub fn colorless() -> Self {
        Self { color: false }
    }
}

/// Render one diagnostic as a string.
pub fn render_diagnostic(
    err: &CompileError,
    source: &str,
    filename: &str,
    opts: &DiagnosticOptions,
) -> String {
    let index = LineIndex::new(source);
    let offset = index.offset(err.src.line.max(1), err.src.col.max(1)) as usize;
    let offset = offset.min(source.len().saturating_sub(1));
    let end = (offset + 1).min(source.len()).max(offset);
    let kind = match err.severity() {
        Severity::Error => ReportKind::Error,
        Severity::Warning => ReportKind::Warning,
    };
    let mut buf = Vec::new();
    let _ = Report::build(kind, (filename, offset..end))
        .with_config(Config::default().with_color(opts.color))
        .with_message(err.to_string())
        .with_label(Label::new((filename, offset..end)).with_message(err.to_string()))
        .finish()
        .write((filename, Source::from(source)), &mut buf);
    String::from_utf8_lossy(&buf).into_owned()
}

/// Render a list of diagnostics, one string each.
pub fn render_all(
    errors: &[CompileError],
    source: &str,
    filename: &str,
    opts: &DiagnosticOptions,
) -> Vec<String> {
    errors
        .iter()
        .map(|e| render_diagnostic(e, source, filename, opts))
        .collect()
}
