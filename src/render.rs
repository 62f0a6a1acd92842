//! Human-facing rendering of collected diagnostics.
//!
//! The engine reports plain messages with byte spans; this module dresses
//! them up with source snippets and severity coloring through miette.

use miette::{Diagnostic as MietteDiagnostic, LabeledSpan, Report, Severity as MietteSeverity};
use thiserror::Error;

use tabex_core::diagnostics::{Diagnostic, Severity};

/// One engine diagnostic adapted to miette's reporting model.
#[derive(Debug, Error)]
#[error("{message}")]
struct Rendered {
    message: String,
    severity: MietteSeverity,
    src: miette::NamedSource<String>,
    label: Option<LabeledSpan>,
}

impl MietteDiagnostic for Rendered {
    fn severity(&self) -> Option<MietteSeverity> {
        Some(self.severity)
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        Some(&self.src)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        self.label
            .clone()
            .map(|label| Box::new(std::iter::once(label)) as _)
    }
}

fn to_report(source: &str, diagnostic: &Diagnostic) -> Report {
    let severity = match diagnostic.severity {
        Severity::Error => MietteSeverity::Error,
        Severity::Warning => MietteSeverity::Warning,
        Severity::Note => MietteSeverity::Advice,
    };
    let label = diagnostic.span.map(|span| {
        LabeledSpan::new(
            None,
            span.start as usize,
            (span.end - span.start) as usize,
        )
    });
    Report::new(Rendered {
        message: diagnostic.message.clone(),
        severity,
        src: miette::NamedSource::new("expression", source.to_string()),
        label,
    })
}

/// Renders diagnostics against their source text, one report per entry.
pub fn render_diagnostics(source: &str, diagnostics: &[Diagnostic]) -> String {
    let mut out = String::new();
    for diagnostic in diagnostics {
        let report = to_report(source, diagnostic);
        out.push_str(&format!("{report:?}"));
        if !out.ends_with('\n') {
            out.push('\n');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabex_core::syntax::Span;

    #[test]
    fn renders_message_and_snippet() {
        let diagnostic = Diagnostic::new(
            Severity::Error,
            Some(Span::new(4, 7)),
            "Both operands of < must have the same type.",
        );
        let rendered = render_diagnostics("1 < 'a'", &[diagnostic]);
        assert!(rendered.contains("Both operands of <"), "{rendered}");
    }

    #[test]
    fn spanless_diagnostics_still_render() {
        let diagnostic = Diagnostic::new(Severity::Warning, None, "plain warning");
        let rendered = render_diagnostics("", &[diagnostic]);
        assert!(rendered.contains("plain warning"), "{rendered}");
    }
}
