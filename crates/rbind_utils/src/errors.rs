use std::ops::Range;

use ariadne::{Color, Config, Label, Report, ReportKind, Source};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticSeverity {
    Error,
    Warning,
}

/// A message anchored to a byte range of a source file.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    severity: DiagnosticSeverity,
    source_id: String,
    span: Range<usize>,
    message: String,
    label: Option<String>,
    help: Option<String>,
}

impl Diagnostic {
    pub fn new(
        severity: DiagnosticSeverity,
        source_id: impl Into<String>,
        span: Range<usize>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            source_id: source_id.into(),
            span,
            message: message.into(),
            label: None,
            help: None,
        }
    }

    pub fn error(source_id: impl Into<String>, span: Range<usize>, message: impl Into<String>) -> Self {
        Self::new(DiagnosticSeverity::Error, source_id, span, message)
    }

    pub fn warning(
        source_id: impl Into<String>,
        span: Range<usize>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(DiagnosticSeverity::Warning, source_id, span, message)
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn span(&self) -> Range<usize> {
        self.span.clone()
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn help(&self) -> Option<&str> {
        self.help.as_deref()
    }

    fn report_kind(&self) -> ReportKind<'static> {
        match self.severity {
            DiagnosticSeverity::Error => ReportKind::Error,
            DiagnosticSeverity::Warning => ReportKind::Warning,
        }
    }

    fn color(&self) -> Color {
        match self.severity {
            DiagnosticSeverity::Error => Color::Red,
            DiagnosticSeverity::Warning => Color::Yellow,
        }
    }

    fn report(&self, color: bool) -> Report<'static, (String, Range<usize>)> {
        let span = self.span();
        let mut label = Label::new((self.source_id.clone(), span.clone()));
        if color {
            label = label.with_color(self.color());
        }
        if let Some(text) = self.label() {
            label = label.with_message(text);
        }

        let mut report = Report::build(self.report_kind(), self.source_id.clone(), span.start)
            .with_config(Config::default().with_color(color))
            .with_message(&self.message)
            .with_label(label);
        if let Some(help) = self.help() {
            report = report.with_help(help);
        }
        report.finish()
    }
}

/// Print every diagnostic to stderr against `source`.
pub fn emit_diagnostics(diagnostics: &[Diagnostic], source: &str) {
    for diagnostic in diagnostics {
        eprint!("{}", render(diagnostic, source, true));
    }
}

pub fn emit_diagnostic(diagnostic: &Diagnostic, source: &str) {
    emit_diagnostics(std::slice::from_ref(diagnostic), source);
}

fn render(diagnostic: &Diagnostic, source: &str, color: bool) -> String {
    let mut out = Vec::new();
    let _ = diagnostic.report(color).write(
        (diagnostic.source_id().to_string(), Source::from(source)),
        &mut out,
    );
    String::from_utf8_lossy(&out).into_owned()
}
