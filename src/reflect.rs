//! Reflection: projects the post-parse AST into a language-agnostic
//! description of bindings, struct layouts, and entry points (spec §4.10).
//!
//! Grounded on the teacher's `object.rs` (`Object`, `DictPairs`): a
//! host-facing projection type kept deliberately separate from the
//! internal representation it's built from, so a caller never has to link
//! against the AST/symbol-table types to read a reflection result.

use ahash::AHashMap;
use indexmap::IndexMap;
use serde::Serialize;

use crate::ast::{Decl, Module};
use crate::intern::Interner;
use crate::scope::{Ref, SymbolTable};
use crate::types::{round_up, StructId, StructRegistry, Type};
use crate::validator::{EntryPointInfo, ShaderStage, ValidationResult};

/// One resolved struct field, recursively describing a nested struct type.
#[derive(Debug, Clone, Serialize)]
pub struct FieldReflection {
    pub name: String,
    pub ty: String,
    pub offset: u32,
    pub size: u32,
    pub alignment: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub struct_layout: Option<Box<StructLayoutReflection>>,
}

/// A resolved struct's size, alignment, and field list (spec §4.10).
#[derive(Debug, Clone, Serialize)]
pub struct StructLayoutReflection {
    pub size: u32,
    pub alignment: u32,
    pub fields: Vec<FieldReflection>,
}

/// Describes a (possibly nested) array binding: element count, stride, and
/// total size, plus a recursive `array` field for `array<array<T, N>, M>`.
///
/// `depth` is the total remaining nesting depth measured from this level
/// down (1 for a plain `array<T, N>`, 2 for `array<array<T, N>, M>` at the
/// outer level and 1 at the inner one) — the spec's scenario only exercises
/// depth 1, so this is a documented interpretation rather than a literal
/// requirement (see DESIGN.md).
#[derive(Debug, Clone, Serialize)]
pub struct ArrayDescriptor {
    pub depth: u32,
    pub element_count: Option<u64>,
    pub element_stride: u32,
    pub total_size: Option<u32>,
    pub element_type_original: String,
    pub element_type_renamed: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub element_layout: Option<StructLayoutReflection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub array: Option<Box<ArrayDescriptor>>,
}

/// One `@group`/`@binding` module-scope var (spec §4.10; includes
/// uniform/storage buffers as well as handle-space textures and samplers).
#[derive(Debug, Clone, Serialize)]
pub struct BindingReflection {
    pub group: u32,
    pub binding: u32,
    pub original_name: String,
    pub renamed_name: String,
    pub address_space: String,
    pub access_mode: String,
    pub original_type: String,
    pub renamed_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub struct_layout: Option<StructLayoutReflection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub array: Option<ArrayDescriptor>,
}

/// One `@vertex`/`@fragment`/`@compute` function.
#[derive(Debug, Clone, Serialize)]
pub struct EntryPointReflection {
    pub name: String,
    pub stage: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workgroup_size: Option<[u32; 3]>,
}

/// Full reflection result for one compilation unit.
#[derive(Debug, Clone, Serialize, Default)]
pub struct ReflectResult {
    pub bindings: Vec<BindingReflection>,
    pub structs: IndexMap<String, StructLayoutReflection>,
    pub entry_points: Vec<EntryPointReflection>,
}

/// Builds a [`ReflectResult`] from the post-parse AST and the validator's
/// output. `renamed` should be `true` only when `rename::run` has already
/// assigned `Symbol::renamed` — callers of `reflect()` (no minification)
/// pass `false`, `minify_and_reflect()` passes `true` after renaming.
#[must_use]
pub fn reflect(module: &Module, symbols: &SymbolTable, interner: &Interner, validation: &ValidationResult, renamed: bool) -> ReflectResult {
    let struct_refs: AHashMap<StructId, Ref> = validation.struct_ids.iter().map(|(&r, &id)| (id, r)).collect();

    let mut structs = IndexMap::new();
    for decl in &module.decls {
        if let Decl::Struct { symbol, .. } = decl {
            if let Some(&id) = validation.struct_ids.get(symbol) {
                let original = interner.resolve(symbols.symbol(*symbol).original_name).to_string();
                structs.insert(original, build_struct_layout(id, &validation.structs, interner, &struct_refs, symbols));
            }
        }
    }

    let bindings = validation
        .bindings
        .iter()
        .map(|b| {
            let sym = symbols.symbol(b.symbol);
            let original_name = interner.resolve(sym.original_name).to_string();
            let renamed_name = if renamed { sym.renamed.map_or_else(|| original_name.clone(), |id| interner.resolve(id).to_string()) } else { original_name.clone() };
            let original_type = type_to_string(&b.ty, interner, &validation.structs, &struct_refs, symbols, false);
            let renamed_type = type_to_string(&b.ty, interner, &validation.structs, &struct_refs, symbols, renamed);
            let (struct_layout, array) = match &b.ty {
                Type::Struct(id) => (Some(build_struct_layout(*id, &validation.structs, interner, &struct_refs, symbols)), None),
                Type::Array { elem, count } => (None, Some(build_array_descriptor(elem, *count, &validation.structs, interner, &struct_refs, symbols))),
                _ => (None, None),
            };
            BindingReflection {
                group: b.group,
                binding: b.binding,
                original_name,
                renamed_name,
                address_space: b.space.name().to_string(),
                access_mode: b.access.name().to_string(),
                original_type,
                renamed_type,
                struct_layout,
                array,
            }
        })
        .collect();

    let entry_points = validation.entry_points.iter().map(|info| build_entry_point(info, symbols, interner)).collect();

    ReflectResult { bindings, structs, entry_points }
}

fn build_entry_point(info: &EntryPointInfo, symbols: &SymbolTable, interner: &Interner) -> EntryPointReflection {
    let name = interner.resolve(symbols.symbol(info.symbol).original_name).to_string();
    let stage = match info.stage {
        ShaderStage::Vertex => "vertex",
        ShaderStage::Fragment => "fragment",
        ShaderStage::Compute => "compute",
    };
    EntryPointReflection { name, stage, workgroup_size: info.workgroup_size }
}

fn build_struct_layout(id: StructId, structs: &StructRegistry, interner: &Interner, struct_refs: &AHashMap<StructId, Ref>, symbols: &SymbolTable) -> StructLayoutReflection {
    let layout = structs.get(id);
    let fields = layout
        .fields
        .iter()
        .map(|field| {
            let struct_layout = if let Type::Struct(nested) = &field.ty { Some(Box::new(build_struct_layout(*nested, structs, interner, struct_refs, symbols))) } else { None };
            FieldReflection {
                name: interner.resolve(field.name).to_string(),
                ty: type_to_string(&field.ty, interner, structs, struct_refs, symbols, false),
                offset: field.offset,
                size: field.ty.size(structs).unwrap_or(0),
                alignment: field.ty.alignment(structs),
                struct_layout,
            }
        })
        .collect();
    StructLayoutReflection { size: layout.size, alignment: layout.alignment, fields }
}

fn build_array_descriptor(elem: &Type, count: Option<u64>, structs: &StructRegistry, interner: &Interner, struct_refs: &AHashMap<StructId, Ref>, symbols: &SymbolTable) -> ArrayDescriptor {
    let elem_size = elem.size(structs).unwrap_or(0);
    let elem_align = elem.alignment(structs);
    let element_stride = round_up(elem_size, elem_align);
    let total_size = count.map(|c| element_stride * u32::try_from(c).unwrap_or(u32::MAX));

    let element_layout = if let Type::Struct(id) = elem { Some(build_struct_layout(*id, structs, interner, struct_refs, symbols)) } else { None };
    let array = if let Type::Array { elem: inner_elem, count: inner_count } = elem {
        Some(Box::new(build_array_descriptor(inner_elem, *inner_count, structs, interner, struct_refs, symbols)))
    } else {
        None
    };

    ArrayDescriptor {
        depth: array_nesting_depth(elem) + 1,
        element_count: count,
        element_stride,
        total_size,
        element_type_original: type_to_string(elem, interner, structs, struct_refs, symbols, false),
        element_type_renamed: type_to_string(elem, interner, structs, struct_refs, symbols, true),
        element_layout,
        array,
    }
}

fn array_nesting_depth(ty: &Type) -> u32 {
    match ty {
        Type::Array { elem, .. } => 1 + array_nesting_depth(elem),
        _ => 0,
    }
}

/// Renders a resolved [`Type`] back to WGSL surface syntax, substituting a
/// struct's renamed name when `renamed` is set and the renamer assigned one.
/// Separate from `Type`'s own `Display` impl, which has no symbol table to
/// consult and so can only print a struct as an opaque `struct#N` (spec
/// §4.10 needs the real declared or renamed spelling in both bindings and
/// nested array/struct descriptors).
fn type_to_string(ty: &Type, interner: &Interner, structs: &StructRegistry, struct_refs: &AHashMap<StructId, Ref>, symbols: &SymbolTable, renamed: bool) -> String {
    match ty {
        Type::Scalar(s) => s.name().to_string(),
        Type::Vector { size, elem } => format!("vec{size}<{}>", elem.name()),
        Type::Matrix { cols, rows, elem } => format!("mat{cols}x{rows}<{}>", elem.name()),
        Type::Array { elem, count: Some(n) } => format!("array<{}, {n}>", type_to_string(elem, interner, structs, struct_refs, symbols, renamed)),
        Type::Array { elem, count: None } => format!("array<{}>", type_to_string(elem, interner, structs, struct_refs, symbols, renamed)),
        Type::Pointer { space, elem, access } => format!("ptr<{}, {}, {}>", space.name(), type_to_string(elem, interner, structs, struct_refs, symbols, renamed), access.name()),
        Type::Atomic(elem) => format!("atomic<{}>", type_to_string(elem, interner, structs, struct_refs, symbols, renamed)),
        Type::Sampler { comparison: false } => "sampler".to_string(),
        Type::Sampler { comparison: true } => "sampler_comparison".to_string(),
        Type::Texture { kind, dim, sampled, format, .. } => {
            let name = crate::printer::texture_type_name(*kind, *dim);
            if let Some(sampled) = sampled {
                format!("{name}<{}>", type_to_string(sampled, interner, structs, struct_refs, symbols, renamed))
            } else if let Some(format) = format {
                format!("{name}<{}>", crate::printer::texel_format_name(*format))
            } else {
                name.to_string()
            }
        }
        Type::Struct(id) => {
            if renamed {
                if let Some(name) = struct_refs.get(id).and_then(|r| symbols.symbol(*r).renamed) {
                    return interner.resolve(name).to_string();
                }
            }
            interner.resolve(structs.get(*id).name).to_string()
        }
        Type::Void => "void".to_string(),
        Type::Unknown => "<unknown>".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DiagnosticSink;
    use crate::span::LineIndex;
    use crate::{dce, rename, validator};

    fn run_pipeline(source: &str) -> (Module, SymbolTable, Interner, ValidationResult) {
        let mut unit = crate::parser::parse(source);
        let line_index = LineIndex::new(source);
        let mut diagnostics = DiagnosticSink::new();
        let validation = validator::validate(&unit.module, &mut unit.symbols, &unit.interner, &mut diagnostics, &line_index);
        assert!(!diagnostics.has_errors(), "unexpected diagnostics: {:?}", diagnostics.as_slice());
        dce::run(&unit.module, &mut unit.symbols);
        (unit.module, unit.symbols, unit.interner, validation)
    }

    #[test]
    fn uniform_struct_binding_reports_group_binding_and_layout() {
        let source = "struct U { t: f32 }\n@group(0) @binding(0) var<uniform> uniforms: U;\n@fragment fn main() -> @location(0) vec4f { return vec4f(uniforms.t); }";
        let (module, symbols, interner, validation) = run_pipeline(source);
        let result = reflect(&module, &symbols, &interner, &validation, false);
        let binding = &result.bindings[0];
        assert_eq!(binding.group, 0);
        assert_eq!(binding.binding, 0);
        assert_eq!(binding.original_name, "uniforms");
        assert_eq!(binding.address_space, "uniform");
        assert_eq!(binding.original_type, "U");
        let layout = binding.struct_layout.as_ref().expect("struct layout");
        assert_eq!(layout.size, 4);
        assert_eq!(layout.alignment, 4);
        assert_eq!(layout.fields[0].name, "t");
        assert_eq!(layout.fields[0].offset, 0);
    }

    #[test]
    fn storage_array_binding_reports_array_descriptor() {
        let source = "struct P { pos: vec3f, vel: f32 }\n@group(0) @binding(0) var<storage, read_write> data: array<P, 10000>;\n@compute @workgroup_size(64) fn main() {}";
        let (module, symbols, interner, validation) = run_pipeline(source);
        let result = reflect(&module, &symbols, &interner, &validation, false);
        let binding = &result.bindings[0];
        let array = binding.array.as_ref().expect("array descriptor");
        assert_eq!(array.depth, 1);
        assert_eq!(array.element_count, Some(10_000));
        assert_eq!(array.element_stride, 16);
        assert_eq!(array.total_size, Some(160_000));
        assert_eq!(array.element_type_original, "P");
        let layout = array.element_layout.as_ref().expect("element layout");
        assert_eq!(layout.size, 16);
        assert_eq!(layout.alignment, 16);
        assert_eq!(layout.fields[0].offset, 0);
        assert_eq!(layout.fields[1].offset, 12);
    }

    #[test]
    fn entry_points_report_stage_and_workgroup_size() {
        let source = "@compute @workgroup_size(8, 8) fn main() {}";
        let (module, symbols, interner, validation) = run_pipeline(source);
        let result = reflect(&module, &symbols, &interner, &validation, false);
        assert_eq!(result.entry_points.len(), 1);
        assert_eq!(result.entry_points[0].stage, "compute");
        assert_eq!(result.entry_points[0].workgroup_size, Some([8, 8, 1]));
    }

    #[test]
    fn renamed_mode_reports_renamed_struct_type() {
        let source = "struct U { t: f32 }\n@group(0) @binding(0) var<uniform> uniforms: U;\n@fragment fn main() -> @location(0) vec4f { return vec4f(uniforms.t); }";
        let (module, mut symbols, mut interner, validation) = run_pipeline(source);
        rename::run(&module, &mut symbols, &mut interner, &rename::RenameOptions::default());
        let result = reflect(&module, &symbols, &interner, &validation, true);
        let binding = &result.bindings[0];
        assert_ne!(binding.renamed_type, "U");
        assert_eq!(binding.original_type, "U");
        assert_eq!(binding.renamed_name, "uniforms");
    }
}
