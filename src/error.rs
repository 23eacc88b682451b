//! Diagnostic shapes shared across every phase of the pipeline.
//!
//! Each phase (lex, parse, resolve, validate) collects diagnostics into a
//! shared list and continues where possible; nothing in this module can
//! itself fail, it only describes failures that happened elsewhere.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

use crate::span::{LineIndex, TextSize};

/// Result alias for phases that can still bail out entirely (lexing with no
/// recoverable tokens at all, for instance).
pub type PhaseResult<T> = Result<T, Diagnostic>;

/// Severity of a single diagnostic.
///
/// Matches the filter vocabulary callers use in `diagnostic_filters`
/// (`off`/`info`/`warning`/`error`), plus `off` itself so a rule can be
/// silenced without being removed from the filter map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Display, EnumString, IntoStaticStr, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Off,
    Info,
    Warning,
    Error,
}

/// Stable vocabulary of diagnostic rule names.
///
/// This enumeration is treated as an external, stable vocabulary (per the
/// Non-goals): new variants may be appended, but an existing variant's
/// string form must never change, since embedders key `diagnostic_filters`
/// off it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, IntoStaticStr, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticRule {
    LexError,
    ParseError,
    UndefinedIdentifier,
    UndefinedType,
    TypeMismatch,
    ArityMismatch,
    InvalidOperands,
    MissingInitializer,
    MissingBindingAttribute,
    InvalidExternalInitializer,
    InvalidEntryPointSignature,
    BreakOutsideLoop,
    ContinueOutsideLoop,
    DiscardOutsideFragment,
    MissingReturn,
    DerivativeUniformity,
    SubgroupUniformity,
    BarrierUniformity,
    StructReturningBuiltinUnsupported,
    RuntimeArrayPosition,
}

impl DiagnosticRule {
    /// Default severity before any caller-supplied filter is applied.
    #[must_use]
    pub fn default_severity(self) -> Severity {
        match self {
            Self::LexError
            | Self::ParseError
            | Self::UndefinedIdentifier
            | Self::UndefinedType
            | Self::TypeMismatch
            | Self::ArityMismatch
            | Self::InvalidOperands
            | Self::MissingInitializer
            | Self::MissingBindingAttribute
            | Self::InvalidExternalInitializer
            | Self::InvalidEntryPointSignature
            | Self::BreakOutsideLoop
            | Self::ContinueOutsideLoop
            | Self::DiscardOutsideFragment
            | Self::MissingReturn
            | Self::BarrierUniformity
            | Self::RuntimeArrayPosition => Severity::Error,
            Self::DerivativeUniformity | Self::SubgroupUniformity => Severity::Error,
            Self::StructReturningBuiltinUnsupported => Severity::Warning,
        }
    }

    /// `true` for rules whose severity can never be overridden (per spec
    /// §4.5, `workgroupBarrier` and friends are unconditional errors).
    #[must_use]
    pub fn is_unconditional(self) -> bool {
        matches!(self, Self::BarrierUniformity)
    }
}

/// A single diagnostic produced anywhere in the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: Option<String>,
    pub rule: Option<DiagnosticRule>,
    pub message: String,
    /// 1-based line of the primary span.
    pub line: u32,
    /// 1-based column of the primary span.
    pub column: u32,
    pub end_line: Option<u32>,
    pub end_column: Option<u32>,
    /// Optional reference into the WGSL specification (e.g. "§17.1").
    pub spec_reference: Option<String>,
}

impl Diagnostic {
    #[must_use]
    pub fn new(severity: Severity, message: impl Into<String>, range: TextSize, line_index: &LineIndex) -> Self {
        let lc = line_index.line_col_byte(range);
        Self {
            severity,
            code: None,
            rule: None,
            message: message.into(),
            line: lc.line + 1,
            column: lc.column + 1,
            end_line: None,
            end_column: None,
            spec_reference: None,
        }
    }

    #[must_use]
    pub fn with_rule(mut self, rule: DiagnosticRule) -> Self {
        self.code = Some(format!("{rule}"));
        self.rule = Some(rule);
        self
    }

    #[must_use]
    pub fn with_spec_reference(mut self, reference: impl Into<String>) -> Self {
        self.spec_reference = Some(reference.into());
        self
    }

    #[must_use]
    pub fn with_end(mut self, end: TextSize, line_index: &LineIndex) -> Self {
        let lc = line_index.line_col_byte(end);
        self.end_line = Some(lc.line + 1);
        self.end_column = Some(lc.column + 1);
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}: {}", self.line, self.column, self.severity, self.message)
    }
}

/// Accumulates diagnostics across phases without ever aborting a call.
///
/// Every phase takes a `&mut DiagnosticSink` instead of returning a
/// `Result`, mirroring the spec's "continue where possible" propagation
/// policy: a parse error doesn't prevent validation from running on
/// whatever AST pass 1 did manage to produce.
#[derive(Debug, Default)]
pub struct DiagnosticSink {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        let rule: &'static str = diagnostic.rule.map_or("unknown", Into::into);
        match diagnostic.severity {
            Severity::Off => {}
            Severity::Info => {
                tracing::info!(target: "miniray::diagnostic", rule, line = diagnostic.line, column = diagnostic.column, "{}", diagnostic.message);
            }
            Severity::Warning => {
                tracing::warn!(target: "miniray::diagnostic", rule, line = diagnostic.line, column = diagnostic.column, "{}", diagnostic.message);
            }
            Severity::Error => {
                tracing::error!(target: "miniray::diagnostic", rule, line = diagnostic.line, column = diagnostic.column, "{}", diagnostic.message);
            }
        }
        self.diagnostics.push(diagnostic);
    }

    #[must_use]
    pub fn error_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.severity == Severity::Error).count()
    }

    #[must_use]
    pub fn warning_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.severity == Severity::Warning).count()
    }

    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    pub fn as_slice(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Elevates every `warning` to `error`, as `ValidateOptions::strict_mode` requires.
    pub fn escalate_warnings(&mut self) {
        for diagnostic in &mut self.diagnostics {
            if diagnostic.severity == Severity::Warning {
                diagnostic.severity = Severity::Error;
            }
        }
    }

    /// Overrides severity per rule name, per `ValidateOptions::diagnostic_filters`.
    /// A rule flagged [`DiagnosticRule::is_unconditional`] ignores any filter
    /// naming it (spec §4.5: `workgroupBarrier` and friends are unconditional
    /// errors no caller can downgrade).
    pub fn apply_filters(&mut self, filters: &std::collections::HashMap<String, Severity>) {
        if filters.is_empty() {
            return;
        }
        for diagnostic in &mut self.diagnostics {
            let Some(rule) = diagnostic.rule else { continue };
            if rule.is_unconditional() {
                continue;
            }
            let name: &'static str = rule.into();
            if let Some(&severity) = filters.get(name) {
                diagnostic.severity = severity;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_mode_escalates_warnings_only() {
        let mut sink = DiagnosticSink::new();
        let line_index = LineIndex::new("x");
        sink.push(Diagnostic::new(Severity::Warning, "w", TextSize::from(0), &line_index));
        sink.push(Diagnostic::new(Severity::Error, "e", TextSize::from(0), &line_index));
        sink.escalate_warnings();
        assert_eq!(sink.error_count(), 2);
    }

    #[test]
    fn rule_code_round_trips_through_strum() {
        let rule = DiagnosticRule::DerivativeUniformity;
        let text: &'static str = rule.into();
        assert_eq!(text, "derivative_uniformity");
    }
}
