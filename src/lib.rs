//! Miniray: a WGSL minifier, validator, and reflector.
//!
//! The crate is organized as a strict phase pipeline (spec §5): lex → parse
//! pass 1 → parse pass 2 → validate → dead-code elimination → rename →
//! print/reflect. Each phase is its own module and none of them panic on
//! malformed input — diagnostics accumulate in a [`error::DiagnosticSink`]
//! and later phases keep running on whatever AST the earlier ones produced.
//!
//! Grounded on the teacher's `run.rs` (`Runner`): a thin facade module that
//! owns no logic of its own, just wires the phases together in order and
//! shapes their output for a caller who never touches the AST directly.
//!
//! ```
//! let result = miniray::minify("const x: f32 = 1.0; @fragment fn main() -> @location(0) vec4f { return vec4f(x); }", &miniray::options::MinifyOptions::default());
//! assert!(result.errors.is_empty());
//! ```

pub mod ast;
pub mod builtins;
pub mod dce;
pub mod error;
pub mod intern;
pub mod lexer;
pub mod options;
pub mod parser;
pub mod printer;
pub mod reflect;
pub mod rename;
pub mod scope;
pub mod sourcemap;
pub mod span;
pub mod types;
pub mod validator;

use error::Diagnostic;
use options::{MinifyOptions, ValidateOptions};
use printer::PrintOptions;
use reflect::ReflectResult;
use rename::RenameOptions;
use sourcemap::{SourceMapBuilder, SourceMapV3};
use span::LineIndex;

/// Result of [`minify`] (spec §6).
#[derive(Debug, Clone, serde::Serialize)]
pub struct MinifyResult {
    pub code: String,
    pub errors: Vec<Diagnostic>,
    pub original_size: usize,
    pub minified_size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_map: Option<SourceMapV3>,
}

/// Result of [`minify_and_reflect`]: a [`MinifyResult`] plus a [`ReflectResult`]
/// computed from the same AST, using renamed names where the renamer ran.
#[derive(Debug, Clone, serde::Serialize)]
pub struct MinifyAndReflectResult {
    pub code: String,
    pub errors: Vec<Diagnostic>,
    pub original_size: usize,
    pub minified_size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_map: Option<SourceMapV3>,
    pub reflect: ReflectResult,
}

/// Result of [`validate`] (spec §6).
#[derive(Debug, Clone, serde::Serialize)]
pub struct ValidateResult {
    pub valid: bool,
    pub diagnostics: Vec<Diagnostic>,
    pub error_count: usize,
    pub warning_count: usize,
}

/// The front half of the pipeline, shared by every public operation: lex,
/// parse, validate. Nothing here depends on caller options, since `validate`
/// and `minify` both need struct layouts and entry-point metadata regardless
/// of whether the caller asked for tree-shaking or renaming.
struct FrontEnd {
    module: ast::Module,
    symbols: scope::SymbolTable,
    interner: intern::Interner,
    line_index: LineIndex,
    diagnostics: error::DiagnosticSink,
    validation: validator::ValidationResult,
}

fn run_front_end(source: &str) -> FrontEnd {
    tracing::debug!(target: "miniray::pipeline", phase = "lex");
    let line_index = LineIndex::new(source);
    tracing::debug!(target: "miniray::pipeline", phase = "parse");
    let parser::ParsedUnit { module, mut symbols, interner, mut diagnostics } = parser::parse(source);
    tracing::debug!(target: "miniray::pipeline", phase = "validate");
    let validation = validator::validate(&module, &mut symbols, &interner, &mut diagnostics, &line_index);
    FrontEnd { module, symbols, interner, line_index, diagnostics, validation }
}

/// Minifies `source` per `options` (spec §4.11, §6).
///
/// Always runs validation internally — dead-code elimination and renaming
/// both need entry-point and struct metadata the validator computes — but
/// validation diagnostics are folded into `errors` alongside lex/parse
/// diagnostics rather than gated behind a separate strict-mode flag; use
/// [`validate`] directly for a report shaped around pass/fail instead.
#[must_use]
#[tracing::instrument(name = "minify", skip_all, fields(source_len = source.len()))]
pub fn minify(source: &str, options: &MinifyOptions) -> MinifyResult {
    let mut front = run_front_end(source);

    if options.tree_shaking {
        tracing::debug!(target: "miniray::pipeline", phase = "dce");
        dce::run(&front.module, &mut front.symbols);
    } else {
        for symbol in front.symbols.symbols_mut() {
            symbol.is_live = true;
        }
    }

    if options.minify_identifiers {
        tracing::debug!(target: "miniray::pipeline", phase = "rename");
        let rename_options = RenameOptions {
            mangle_external_bindings: options.mangle_external_bindings,
            preserve_uniform_struct_types: options.preserve_uniform_struct_types,
            mangle_props: options.mangle_props,
            keep_names: options.keep_names.iter().cloned().collect(),
        };
        rename::run(&front.module, &mut front.symbols, &mut front.interner, &rename_options);
    }

    let print_options = PrintOptions { minify_whitespace: options.minify_whitespace, minify_syntax: options.minify_syntax, mangle_external_bindings: options.mangle_external_bindings };

    let mut source_map_builder = options.source_map.then(|| {
        let mut builder = SourceMapBuilder::new(options.source_map_options.clone());
        if options.source_map_options.include_source {
            builder.set_source_content(source);
        }
        builder
    });

    tracing::debug!(target: "miniray::pipeline", phase = "print");
    let code = printer::print(&front.module, &front.symbols, &front.interner, source, &front.line_index, &print_options, source_map_builder.as_mut());
    let source_map = source_map_builder.map(|builder| builder.build(generated_line_count(&code)));

    MinifyResult { original_size: source.len(), minified_size: code.len(), errors: front.diagnostics.into_vec(), code, source_map }
}

/// Reflects `source` without minifying it: bindings, struct layouts, and
/// entry points as declared, with no renaming applied (spec §4.10, §4.11).
#[must_use]
#[tracing::instrument(name = "reflect", skip_all, fields(source_len = source.len()))]
pub fn reflect(source: &str) -> ReflectResult {
    let front = run_front_end(source);
    reflect::reflect(&front.module, &front.symbols, &front.interner, &front.validation, false)
}

/// Minifies `source` and reflects the same AST in one pass, so the
/// reflection's binding/struct names match whatever the minifier actually
/// emitted (spec §4.11, Testable Property 8).
#[must_use]
#[tracing::instrument(name = "minify_and_reflect", skip_all, fields(source_len = source.len()))]
pub fn minify_and_reflect(source: &str, options: &MinifyOptions) -> MinifyAndReflectResult {
    let mut front = run_front_end(source);

    if options.tree_shaking {
        tracing::debug!(target: "miniray::pipeline", phase = "dce");
        dce::run(&front.module, &mut front.symbols);
    } else {
        for symbol in front.symbols.symbols_mut() {
            symbol.is_live = true;
        }
    }

    let renamed = options.minify_identifiers;
    if renamed {
        tracing::debug!(target: "miniray::pipeline", phase = "rename");
        let rename_options = RenameOptions {
            mangle_external_bindings: options.mangle_external_bindings,
            preserve_uniform_struct_types: options.preserve_uniform_struct_types,
            mangle_props: options.mangle_props,
            keep_names: options.keep_names.iter().cloned().collect(),
        };
        rename::run(&front.module, &mut front.symbols, &mut front.interner, &rename_options);
    }

    let print_options = PrintOptions { minify_whitespace: options.minify_whitespace, minify_syntax: options.minify_syntax, mangle_external_bindings: options.mangle_external_bindings };

    let mut source_map_builder = options.source_map.then(|| {
        let mut builder = SourceMapBuilder::new(options.source_map_options.clone());
        if options.source_map_options.include_source {
            builder.set_source_content(source);
        }
        builder
    });

    tracing::debug!(target: "miniray::pipeline", phase = "print");
    let code = printer::print(&front.module, &front.symbols, &front.interner, source, &front.line_index, &print_options, source_map_builder.as_mut());
    let source_map = source_map_builder.map(|builder| builder.build(generated_line_count(&code)));
    let reflect_result = reflect::reflect(&front.module, &front.symbols, &front.interner, &front.validation, renamed);

    MinifyAndReflectResult { original_size: source.len(), minified_size: code.len(), errors: front.diagnostics.into_vec(), code, source_map, reflect: reflect_result }
}

/// Validates `source` per `options` without producing any code (spec §4.11, §6).
#[must_use]
#[tracing::instrument(name = "validate", skip_all, fields(source_len = source.len()))]
pub fn validate(source: &str, options: &ValidateOptions) -> ValidateResult {
    let mut front = run_front_end(source);
    front.diagnostics.apply_filters(&options.diagnostic_filters);
    if options.strict_mode {
        front.diagnostics.escalate_warnings();
    }
    let error_count = front.diagnostics.error_count();
    let warning_count = front.diagnostics.warning_count();
    ValidateResult { valid: error_count == 0, diagnostics: front.diagnostics.into_vec(), error_count, warning_count }
}

/// Lines in `code`, counting the trailing (possibly empty) line after the
/// last `\n` — what [`sourcemap::SourceMapBuilder::build`] needs to size its
/// per-line mapping buckets.
fn generated_line_count(code: &str) -> u32 {
    u32::try_from(code.matches('\n').count()).unwrap_or(u32::MAX).saturating_add(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHADER: &str = "struct Uniforms { color: vec4f }\n@group(0) @binding(0) var<uniform> uniforms: Uniforms;\n@fragment fn main() -> @location(0) vec4f { return uniforms.color; }";

    #[test]
    fn minify_reports_errors_and_sizes() {
        let result = minify(SHADER, &MinifyOptions::default());
        assert!(result.errors.is_empty(), "{:?}", result.errors);
        assert_eq!(result.original_size, SHADER.len());
        assert_eq!(result.minified_size, result.code.len());
        assert!(result.minified_size < result.original_size);
        assert!(result.source_map.is_none());
    }

    #[test]
    fn minify_with_source_map_produces_one() {
        let mut options = MinifyOptions::default();
        options.source_map = true;
        let result = minify(SHADER, &options);
        assert!(result.source_map.is_some());
    }

    #[test]
    fn reflect_reports_binding_without_minifying() {
        let result = reflect(SHADER);
        assert_eq!(result.bindings.len(), 1);
        assert_eq!(result.bindings[0].original_name, "uniforms");
        assert_eq!(result.bindings[0].renamed_name, "uniforms");
        assert_eq!(result.entry_points.len(), 1);
        assert_eq!(result.entry_points[0].stage, "fragment");
    }

    #[test]
    fn minify_and_reflect_uses_renamed_names_consistently() {
        let result = minify_and_reflect(SHADER, &MinifyOptions::default());
        assert!(result.errors.is_empty(), "{:?}", result.errors);
        let binding = &result.reflect.bindings[0];
        // The binding itself is an external binding, so its declaration name
        // survives unrenamed by default; the struct type behind it does not,
        // which is what actually proves the reflection tracks the renamer's
        // output instead of just echoing the source.
        assert_eq!(binding.original_name, "uniforms");
        assert_eq!(binding.renamed_name, "uniforms");
        assert_eq!(binding.original_type, "Uniforms");
        assert_ne!(binding.renamed_type, binding.original_type);
        assert!(result.code.contains(&binding.renamed_type));
        assert!(!result.code.contains("Uniforms"));
    }

    #[test]
    fn validate_reports_no_errors_for_well_formed_shader() {
        let result = validate(SHADER, &ValidateOptions::default());
        assert!(result.valid);
        assert_eq!(result.error_count, 0);
    }

    #[test]
    fn validate_reports_errors_for_malformed_shader() {
        let result = validate("fn main() { return undeclared_name; }", &ValidateOptions::default());
        assert!(!result.valid);
        assert!(result.error_count > 0);
    }

    #[test]
    fn validate_strict_mode_escalates_warnings_to_errors() {
        let mut options = ValidateOptions::default();
        options.strict_mode = true;
        let result = validate(SHADER, &options);
        assert_eq!(result.warning_count, 0);
    }

    #[test]
    fn empty_source_minifies_to_empty_code() {
        let result = minify("", &MinifyOptions::default());
        assert_eq!(result.code, "");
    }
}
