//! Human-readable reports for sequence text the sequencer stopped on.

use ariadne::{Config, IndexType, Label, Report, ReportKind, Source};

use crate::error::LexError;

/// Render `error` against the sequence text it came from, with the offending
/// character underlined. Output is plain text without colour codes.
pub fn render_halt(source: &str, error: &LexError) -> String {
    let span = error_span(source, error);
    let LexError::UnexpectedChar { ch, .. } = error;

    let report = Report::build(ReportKind::Warning, span.clone())
        .with_config(
            Config::default()
                .with_color(false)
                .with_index_type(IndexType::Byte),
        )
        .with_message("sequence halted")
        .with_label(Label::new(span).with_message(format!("unexpected '{ch}'")))
        .with_note("append more text or fix this position to resume")
        .finish();

    let mut out = Vec::new();
    match report.write(Source::from(source), &mut out) {
        Ok(()) => String::from_utf8_lossy(&out).into_owned(),
        Err(_) => error.to_string(),
    }
}

/// Byte range of the offending character, clamped to the text.
fn error_span(source: &str, error: &LexError) -> std::ops::Range<usize> {
    let LexError::UnexpectedChar { ch, pos } = error;
    let start = (*pos).min(source.len());
    let end = (start + ch.len_utf8()).min(source.len());
    start..end
}
