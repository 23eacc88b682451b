//! Identifier renamer: assigns short, collision-free names to symbols that
//! are eligible for renaming (spec §4.7).
//!
//! Grounded on the teacher's `intern.rs` static-string-table layout (a small
//! reserved namespace checked before anything is minted) and `scope.rs`'s
//! arena-of-handles discipline: this module never constructs a `Ref`, it
//! only walks the scope tree `validator`/`dce` already built and writes into
//! `Symbol::renamed`.

use ahash::AHashSet;

use crate::ast::{Decl, Module, TypeExpr};
use crate::builtins;
use crate::intern::Interner;
use crate::scope::{Ref, ScopeId, SymbolKind, SymbolTable};
use crate::types::{AccessMode, AddressSpace, Scalar, TexelFormat};

/// Type and sampler names the template-bracket grammar reserves that aren't
/// already covered by `builtins::TEMPLATED_TYPE_NAMES`.
const EXTRA_RESERVED_NAMES: &[&str] = &["sampler", "sampler_comparison", "texture_depth_2d", "texture_depth_2d_array", "texture_depth_cube", "texture_depth_cube_array", "texture_external"];

/// Controls which classes of symbol the renamer is allowed to touch.
#[derive(Debug, Clone, Default)]
pub struct RenameOptions {
    /// Rename uniform/storage var names at their declaration site. When
    /// `false` the declaration keeps its original name; internal uses may
    /// still be compressed by the printer via a helper `let` binding.
    pub mangle_external_bindings: bool,
    /// Pin struct type names referenced by any uniform/storage var's type
    /// to their original spelling, even if otherwise eligible.
    pub preserve_uniform_struct_types: bool,
    /// Rename struct member names. Off by default since members are
    /// observable by name in reflection output and by byte offset on the
    /// host side regardless. Currently has no effect: `Expr::Member` stores
    /// a bare field name rather than a resolved `Ref`, so there is no way
    /// to rewrite a use site to match a renamed declaration without a type
    /// inference pass this crate doesn't have. Kept on `RenameOptions` for
    /// API compatibility with spec §6; see DESIGN.md.
    pub mangle_props: bool,
    /// Names the caller wants left alone no matter what declares them.
    pub keep_names: AHashSet<String>,
}

/// Walks the scope tree and assigns `Symbol::renamed` for every eligible
/// symbol. Call after `dce::run` so liveness is settled, though renaming
/// itself does not consult `is_live` — the printer decides what to emit.
pub fn run(module: &Module, symbols: &mut SymbolTable, interner: &mut Interner, options: &RenameOptions) {
    if options.preserve_uniform_struct_types {
        pin_uniform_struct_types(module, symbols);
    }
    rename_scope(ScopeId::MODULE, symbols, interner, options, &mut AHashSet::new());
}

/// Struct types named directly as a uniform/storage var's type keep their
/// declared name. Doesn't chase through aliases — a struct hidden behind an
/// alias indirection is a corner the spec leaves unaddressed.
fn pin_uniform_struct_types(module: &Module, symbols: &mut SymbolTable) {
    for decl in &module.decls {
        if let Decl::Var { space: Some(space), ty: Some(ty), .. } = decl {
            if !space.is_external_binding() {
                continue;
            }
            if let TypeExpr::Named(ident) = ty {
                if let Some(r) = ident.ref_ {
                    if symbols.symbol(r).kind == SymbolKind::Struct {
                        symbols.symbol_mut(r).must_not_be_renamed = true;
                    }
                }
            }
        }
    }
}

fn rename_scope(scope_id: ScopeId, symbols: &mut SymbolTable, interner: &mut Interner, options: &RenameOptions, visible: &mut AHashSet<String>) {
    let mut members: Vec<(_, Ref)> = symbols.scope(scope_id).members().collect();
    members.sort_by(|a, b| {
        let sa = symbols.symbol(a.1);
        let sb = symbols.symbol(b.1);
        sb.use_count.cmp(&sa.use_count).then(sa.declared_at.cmp(&sb.declared_at))
    });

    let mut local_visible = visible.clone();
    for (_, r) in members {
        assign_name(r, symbols, interner, options, &mut local_visible);
    }

    let children = symbols.scope(scope_id).children.clone();
    for child in children {
        rename_scope(child, symbols, interner, options, &mut local_visible.clone());
    }
}

fn assign_name(r: Ref, symbols: &mut SymbolTable, interner: &mut Interner, options: &RenameOptions, visible: &mut AHashSet<String>) {
    let sym = symbols.symbol(r);
    let original = interner.resolve(sym.original_name).to_string();

    if !is_eligible(sym, &original, options) {
        visible.insert(original);
        return;
    }

    let mut counter = 0u64;
    loop {
        let candidate = short_name(counter);
        counter += 1;
        if is_reserved(&candidate) || visible.contains(&candidate) {
            continue;
        }
        let id = interner.intern(&candidate);
        symbols.symbol_mut(r).renamed = Some(id);
        visible.insert(candidate);
        return;
    }
}

fn is_eligible(sym: &crate::scope::Symbol, original: &str, options: &RenameOptions) -> bool {
    if sym.must_not_be_renamed {
        return false;
    }
    if options.keep_names.contains(original) {
        return false;
    }
    // Never renamed regardless of `mangle_props`: see the field's doc comment.
    if sym.kind == SymbolKind::StructMember {
        return false;
    }
    if sym.is_external_binding && !options.mangle_external_bindings {
        return false;
    }
    // A symbol DCE left with no uses but that still has to be printed (a
    // param of a live function, say) keeps its source name: there's
    // nothing to save by renaming it.
    if sym.use_count == 0 {
        return false;
    }
    true
}

/// Generates the `counter`-th short identifier in the sequence
/// `a, b, ..., z, A, ..., Z, aa, ab, ..., Z9, ba, ...`. The first character
/// is drawn from a 52-letter alphabet (identifiers can't start with a
/// digit); later characters add digits, for 62 choices each.
pub(crate) fn short_name(mut counter: u64) -> String {
    const FIRST: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
    const REST: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    let first_len = FIRST.len() as u64;
    let rest_len = REST.len() as u64;

    let mut length: u64 = 1;
    let mut capacity = first_len;
    while counter >= capacity {
        counter -= capacity;
        length += 1;
        capacity = first_len * rest_len.pow((length - 1) as u32);
    }

    let mut digits = vec![0u64; length as usize];
    let mut rem = counter;
    for d in digits.iter_mut().skip(1).rev() {
        *d = rem % rest_len;
        rem /= rest_len;
    }
    digits[0] = rem;

    let mut s = String::with_capacity(length as usize);
    s.push(FIRST[digits[0] as usize] as char);
    for &d in &digits[1..] {
        s.push(REST[d as usize] as char);
    }
    s
}

/// True if `name` would shadow a WGSL keyword, reserved word, builtin
/// function, or built-in type/format name and so can't be minted fresh.
pub(crate) fn is_reserved(name: &str) -> bool {
    name.parse::<crate::lexer::Keyword>().is_ok()
        || crate::lexer::RESERVED_WORDS.contains(&name)
        || Scalar::from_name(name).is_some()
        || AddressSpace::from_name(name).is_some()
        || AccessMode::from_name(name).is_some()
        || TexelFormat::from_name(name).is_some()
        || builtins::TEMPLATED_TYPE_NAMES.contains(&name)
        || builtins::is_builtin_function(name)
        || EXTRA_RESERVED_NAMES.contains(&name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DiagnosticSink;
    use crate::span::{LineIndex, TextSize};
    use crate::{dce, validator};

    fn run_pipeline(source: &str, options: &RenameOptions) -> (Module, SymbolTable, Interner) {
        let mut unit = crate::parser::parse(source);
        let line_index = LineIndex::new(source);
        let mut diagnostics = DiagnosticSink::new();
        let _ = validator::validate(&unit.module, &mut unit.symbols, &unit.interner, &mut diagnostics, &line_index);
        assert!(!diagnostics.has_errors(), "unexpected diagnostics: {:?}", diagnostics.as_slice());
        dce::run(&unit.module, &mut unit.symbols);
        run(&unit.module, &mut unit.symbols, &mut unit.interner, options);
        (unit.module, unit.symbols, unit.interner)
    }

    fn find_symbol(symbols: &SymbolTable, interner: &mut Interner, name: &str) -> Ref {
        let id = interner.intern(name);
        symbols.resolve(ScopeId::MODULE, id, TextSize::from(0)).expect("symbol not found")
    }

    #[test]
    fn short_name_sequence_matches_spec_order() {
        assert_eq!(short_name(0), "a");
        assert_eq!(short_name(25), "z");
        assert_eq!(short_name(26), "A");
        assert_eq!(short_name(51), "Z");
        assert_eq!(short_name(52), "aa");
        assert_eq!(short_name(53), "ab");
    }

    #[test]
    fn reserved_words_are_never_minted() {
        assert!(is_reserved("fn"));
        assert!(is_reserved("var"));
        assert!(is_reserved("dpdx"));
        assert!(is_reserved("vec3"));
        assert!(is_reserved("sampler"));
        assert!(!is_reserved("q"));
    }

    #[test]
    fn entry_point_is_never_renamed() {
        let source = "@compute @workgroup_size(1) fn main() { }";
        let (_, symbols, mut interner) = run_pipeline(source, &RenameOptions::default());
        let main = find_symbol(&symbols, &mut interner, "main");
        assert!(symbols.symbol(main).renamed.is_none());
    }

    #[test]
    fn external_binding_keeps_name_unless_opted_in() {
        let source = "@group(0) @binding(0) var<uniform> settings: f32;\n@compute @workgroup_size(1) fn main() { let x = settings; }";
        let (_, symbols, mut interner) = run_pipeline(source, &RenameOptions::default());
        let settings = find_symbol(&symbols, &mut interner, "settings");
        assert!(symbols.symbol(settings).renamed.is_none());
    }

    #[test]
    fn external_binding_renamed_when_opted_in() {
        let source = "@group(0) @binding(0) var<uniform> settings: f32;\n@compute @workgroup_size(1) fn main() { let x = settings; }";
        let options = RenameOptions { mangle_external_bindings: true, ..RenameOptions::default() };
        let (_, symbols, mut interner) = run_pipeline(source, &options);
        let settings = find_symbol(&symbols, &mut interner, "settings");
        assert!(symbols.symbol(settings).renamed.is_some());
    }

    #[test]
    fn struct_members_are_never_renamed() {
        let source = "struct S { a: f32, b: f32 }\n@compute @workgroup_size(1) fn main() { var s: S; s.a = 1.0; }";
        let options = RenameOptions { mangle_props: true, ..RenameOptions::default() };
        let (module, symbols, mut interner) = run_pipeline(source, &options);
        let struct_decl = module.decls.iter().find_map(|d| match d {
            Decl::Struct { members, .. } => Some(members),
            _ => None,
        });
        let members = struct_decl.expect("struct decl");
        for member in members {
            assert!(symbols.symbol(member.symbol).renamed.is_none());
        }
        let _ = &mut interner;
    }

    #[test]
    fn keep_names_is_honored() {
        let source = "fn helper() -> i32 { return 1; }\n@compute @workgroup_size(1) fn main() { let x = helper(); let y = helper(); }";
        let mut options = RenameOptions::default();
        options.keep_names.insert("helper".to_string());
        let (_, symbols, mut interner) = run_pipeline(source, &options);
        let helper = find_symbol(&symbols, &mut interner, "helper");
        assert!(symbols.symbol(helper).renamed.is_none());
    }

    #[test]
    fn disjoint_scopes_may_reuse_names() {
        let source = "fn f() -> i32 { let q = 1; return q; }\nfn g() -> i32 { let q = 2; return q; }";
        let _ = run_pipeline(source, &RenameOptions::default());
    }
}
