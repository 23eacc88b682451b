//! Caller-facing option structs for the public facade (spec §6).
//!
//! Grounded on the teacher's `resource::ResourceLimits`: a plain
//! `serde`-derived configuration struct, each field documented with its
//! default right where it's declared, constructed with `Default` and
//! overridden field-by-field rather than through a builder.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::Severity;
use crate::sourcemap::SourceMapOptions;

/// Options accepted by [`crate::minify`] and [`crate::minify_and_reflect`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MinifyOptions {
    /// Remove discretionary whitespace. Default `true`.
    pub minify_whitespace: bool,
    /// Run the renamer. Default `true`.
    pub minify_identifiers: bool,
    /// Numeric literal shortening and other safe syntactic rewrites. Default `true`.
    pub minify_syntax: bool,
    /// Rename uniform/storage var names at their declaration site rather
    /// than only compressing internal uses. Default `false`.
    pub mangle_external_bindings: bool,
    /// Run dead-code elimination. Default `true`.
    pub tree_shaking: bool,
    /// Pin struct types referenced by a uniform/storage var's type to
    /// their original spelling. Default `false`.
    pub preserve_uniform_struct_types: bool,
    /// Rename struct member names. Default `false` — see `rename::RenameOptions::mangle_props`.
    pub mangle_props: bool,
    /// Names the caller wants left alone no matter what declares them. Default empty.
    pub keep_names: Vec<String>,
    /// Produce a source map alongside the minified code. Default `false`.
    pub source_map: bool,
    /// Knobs for the source map itself, consulted only when `source_map` is set.
    pub source_map_options: SourceMapOptions,
}

impl Default for MinifyOptions {
    fn default() -> Self {
        Self {
            minify_whitespace: true,
            minify_identifiers: true,
            minify_syntax: true,
            mangle_external_bindings: false,
            tree_shaking: true,
            preserve_uniform_struct_types: false,
            mangle_props: false,
            keep_names: Vec::new(),
            source_map: false,
            source_map_options: SourceMapOptions { cover_lines_without_mappings: true, ..SourceMapOptions::default() },
        }
    }
}

/// Options accepted by [`crate::validate`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidateOptions {
    /// Elevate every `warning` diagnostic to `error` before computing `valid`. Default `false`.
    pub strict_mode: bool,
    /// Per-rule severity override, keyed by the rule's `snake_case` name
    /// (e.g. `"derivative_uniformity"`). Default empty.
    pub diagnostic_filters: HashMap<String, Severity>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minify_options_defaults_match_spec_table() {
        let options = MinifyOptions::default();
        assert!(options.minify_whitespace);
        assert!(options.minify_identifiers);
        assert!(options.minify_syntax);
        assert!(!options.mangle_external_bindings);
        assert!(options.tree_shaking);
        assert!(!options.preserve_uniform_struct_types);
        assert!(options.source_map_options.cover_lines_without_mappings);
    }

    #[test]
    fn validate_options_default_is_permissive() {
        let options = ValidateOptions::default();
        assert!(!options.strict_mode);
        assert!(options.diagnostic_filters.is_empty());
    }
}
