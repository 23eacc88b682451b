//! Dead-code elimination: builds a reference graph over top-level
//! declarations and marks everything reachable from an entry point live
//! (spec §4.6).
//!
//! Grounded on the teacher's `compute_c3_mro`/class-graph reachability code
//! in `types/class.rs`: build a graph from declared name to the names it
//! mentions, then DFS from roots — the same shape, generalized from MRO
//! linearization to plain liveness marking.

use ahash::{AHashMap, AHashSet};

use crate::ast::{Attribute, Callee, Decl, Expr, Module, Stmt, TypeExpr};
use crate::scope::{Ref, SymbolTable};

/// Marks every symbol in `symbols` live or dead, per `module`'s declaration
/// graph. Call after the validator has set `is_entry_point` on every
/// exported function's symbol.
pub fn run(module: &Module, symbols: &mut SymbolTable) {
    let mut graph: AHashMap<Ref, AHashSet<Ref>> = AHashMap::new();
    let mut forced_live: AHashSet<Ref> = AHashSet::new();

    for decl in &module.decls {
        let mut refs = AHashSet::new();
        collect_decl_refs(decl, &mut refs);
        if let Some(sym) = decl.symbol() {
            graph.insert(sym, refs);
        } else {
            // `const_assert` has no symbol of its own but the spec requires
            // it always survive, so whatever it references must too.
            forced_live.extend(refs);
        }
    }

    let roots: Vec<Ref> = module.decls.iter().filter_map(Decl::symbol).filter(|r| symbols.symbol(*r).is_entry_point).collect();

    if roots.is_empty() {
        // No entry points to anchor reachability from: keep everything,
        // per spec's conservative fallback.
        for sym in symbols.symbols_mut() {
            sym.is_live = true;
        }
        return;
    }

    let mut live: AHashSet<Ref> = AHashSet::new();
    let mut stack: Vec<Ref> = roots;
    stack.extend(forced_live.iter().copied());
    while let Some(r) = stack.pop() {
        if !live.insert(r) {
            continue;
        }
        if let Some(refs) = graph.get(&r) {
            stack.extend(refs.iter().copied());
        }
    }

    for (&sym, _) in &graph {
        symbols.symbol_mut(sym).is_live = live.contains(&sym);
    }

    // Params and struct members aren't graph nodes themselves (only
    // top-level declarations are DCE roots/targets) but inherit liveness
    // from the function/struct that owns them, so later phases can ask
    // "is this binding live" at any granularity.
    for decl in &module.decls {
        match decl {
            Decl::Function { symbol, params, .. } if symbols.symbol(*symbol).is_live => {
                for param in params {
                    symbols.symbol_mut(param.symbol).is_live = true;
                }
            }
            Decl::Struct { symbol, members, .. } if symbols.symbol(*symbol).is_live => {
                for member in members {
                    symbols.symbol_mut(member.symbol).is_live = true;
                }
            }
            _ => {}
        }
    }
}

fn collect_attrs(attributes: &[Attribute], out: &mut AHashSet<Ref>) {
    for attr in attributes {
        for arg in &attr.args {
            collect_expr_refs(arg, out);
        }
    }
}

fn collect_type_refs(ty: &TypeExpr, out: &mut AHashSet<Ref>) {
    match ty {
        TypeExpr::Named(ident) => {
            if let Some(r) = ident.ref_ {
                out.insert(r);
            }
        }
        TypeExpr::Vector { elem, .. } | TypeExpr::Matrix { elem, .. } | TypeExpr::Atomic { elem, .. } | TypeExpr::Pointer { elem, .. } => {
            collect_type_refs(elem, out);
        }
        TypeExpr::Array { elem, size, .. } => {
            collect_type_refs(elem, out);
            if let Some(size) = size {
                collect_expr_refs(size, out);
            }
        }
        TypeExpr::Texture { sampled, .. } => {
            if let Some(sampled) = sampled {
                collect_type_refs(sampled, out);
            }
        }
        TypeExpr::Sampler { .. } => {}
    }
}

fn collect_expr_refs(expr: &Expr, out: &mut AHashSet<Ref>) {
    match expr {
        Expr::Literal { .. } => {}
        Expr::Identifier { ident, .. } => {
            if let Some(r) = ident.ref_ {
                out.insert(r);
            }
        }
        Expr::Binary { left, right, .. } => {
            collect_expr_refs(left, out);
            collect_expr_refs(right, out);
        }
        Expr::Unary { operand, .. } => collect_expr_refs(operand, out),
        Expr::Call { callee, args, .. } => {
            match callee {
                Callee::Name(ident) => {
                    if let Some(r) = ident.ref_ {
                        out.insert(r);
                    }
                }
                Callee::Type(ty) => collect_type_refs(ty, out),
            }
            for arg in args {
                collect_expr_refs(arg, out);
            }
        }
        Expr::Index { base, index, .. } => {
            collect_expr_refs(base, out);
            collect_expr_refs(index, out);
        }
        Expr::Member { base, .. } => collect_expr_refs(base, out),
        Expr::Paren { inner, .. } => collect_expr_refs(inner, out),
    }
}

fn collect_stmt_refs(stmt: &Stmt, out: &mut AHashSet<Ref>) {
    match stmt {
        Stmt::Compound { body, .. } => {
            for stmt in body {
                collect_stmt_refs(stmt, out);
            }
        }
        Stmt::Return { value, .. } => {
            if let Some(value) = value {
                collect_expr_refs(value, out);
            }
        }
        Stmt::If { condition, then_branch, else_branch, .. } => {
            collect_expr_refs(condition, out);
            collect_stmt_refs(then_branch, out);
            if let Some(else_branch) = else_branch {
                collect_stmt_refs(else_branch, out);
            }
        }
        Stmt::Switch { scrutinee, cases, .. } => {
            collect_expr_refs(scrutinee, out);
            for case in cases {
                for selector in &case.selectors {
                    collect_expr_refs(selector, out);
                }
                for stmt in &case.body {
                    collect_stmt_refs(stmt, out);
                }
            }
        }
        Stmt::For { init, condition, update, body, .. } => {
            if let Some(init) = init {
                collect_stmt_refs(init, out);
            }
            if let Some(condition) = condition {
                collect_expr_refs(condition, out);
            }
            if let Some(update) = update {
                collect_stmt_refs(update, out);
            }
            collect_stmt_refs(body, out);
        }
        Stmt::While { condition, body, .. } => {
            collect_expr_refs(condition, out);
            collect_stmt_refs(body, out);
        }
        Stmt::Loop { body, continuing, .. } => {
            for stmt in body {
                collect_stmt_refs(stmt, out);
            }
            if let Some(continuing) = continuing {
                for stmt in continuing {
                    collect_stmt_refs(stmt, out);
                }
            }
        }
        Stmt::Break { .. } | Stmt::Continue { .. } | Stmt::Discard { .. } => {}
        Stmt::BreakIf { condition, .. } => collect_expr_refs(condition, out),
        Stmt::Assign { target, value, .. } => {
            collect_expr_refs(target, out);
            collect_expr_refs(value, out);
        }
        Stmt::IncrDecr { target, .. } => collect_expr_refs(target, out),
        Stmt::Call { call, .. } => collect_expr_refs(call, out),
        Stmt::Decl { decl, .. } => collect_decl_refs(decl, out),
    }
}

fn collect_decl_refs(decl: &Decl, out: &mut AHashSet<Ref>) {
    match decl {
        Decl::Const { ty, value, .. } | Decl::Let { ty, value, .. } => {
            if let Some(ty) = ty {
                collect_type_refs(ty, out);
            }
            collect_expr_refs(value, out);
        }
        Decl::Override { attributes, ty, value, .. } => {
            collect_attrs(attributes, out);
            if let Some(ty) = ty {
                collect_type_refs(ty, out);
            }
            if let Some(value) = value {
                collect_expr_refs(value, out);
            }
        }
        Decl::Var { attributes, ty, value, .. } => {
            collect_attrs(attributes, out);
            if let Some(ty) = ty {
                collect_type_refs(ty, out);
            }
            if let Some(value) = value {
                collect_expr_refs(value, out);
            }
        }
        Decl::Function { attributes, params, return_attributes, return_type, body, .. } => {
            collect_attrs(attributes, out);
            for param in params {
                collect_attrs(&param.attributes, out);
                collect_type_refs(&param.ty, out);
            }
            collect_attrs(return_attributes, out);
            if let Some(return_type) = return_type {
                collect_type_refs(return_type, out);
            }
            for stmt in body {
                collect_stmt_refs(stmt, out);
            }
        }
        Decl::Struct { members, .. } => {
            for member in members {
                collect_attrs(&member.attributes, out);
                collect_type_refs(&member.ty, out);
            }
        }
        Decl::Alias { ty, .. } => collect_type_refs(ty, out),
        Decl::ConstAssert { condition, .. } => collect_expr_refs(condition, out),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DiagnosticSink;
    use crate::intern::Interner;
    use crate::span::{LineIndex, TextSize};
    use crate::validator;

    fn run_pipeline(source: &str) -> (Module, SymbolTable, Interner) {
        let mut unit = crate::parser::parse(source);
        let line_index = LineIndex::new(source);
        let mut diagnostics = DiagnosticSink::new();
        let _ = validator::validate(&unit.module, &mut unit.symbols, &unit.interner, &mut diagnostics, &line_index);
        assert!(!diagnostics.has_errors(), "unexpected diagnostics: {:?}", diagnostics.as_slice());
        run(&unit.module, &mut unit.symbols);
        (unit.module, unit.symbols, unit.interner)
    }

    fn find_symbol(symbols: &SymbolTable, interner: &mut Interner, name: &str) -> Ref {
        let id = interner.intern(name);
        symbols.resolve(crate::scope::ScopeId::MODULE, id, TextSize::from(0)).expect("symbol not found")
    }

    #[test]
    fn unreferenced_function_is_not_live_when_entry_point_exists() {
        let source = "fn dead() -> i32 { return 1; }\n@vertex fn main() -> @builtin(position) vec4<f32> { return vec4<f32>(0.0, 0.0, 0.0, 1.0); }";
        let (_, symbols, mut interner) = run_pipeline(source);
        let dead = find_symbol(&symbols, &mut interner, "dead");
        let main = find_symbol(&symbols, &mut interner, "main");
        assert!(!symbols.symbol(dead).is_live);
        assert!(symbols.symbol(main).is_live);
    }

    #[test]
    fn const_referenced_only_by_const_assert_stays_live() {
        let source = "const n = 4;\nconst_assert n > 0;\n@compute @workgroup_size(1) fn main() { }";
        let (_, symbols, mut interner) = run_pipeline(source);
        let n = find_symbol(&symbols, &mut interner, "n");
        assert!(symbols.symbol(n).is_live);
    }

    #[test]
    fn no_entry_point_marks_everything_live() {
        let source = "fn helper() -> i32 { return 1; }";
        let (_, symbols, mut interner) = run_pipeline(source);
        let helper = find_symbol(&symbols, &mut interner, "helper");
        assert!(symbols.symbol(helper).is_live);
    }
}
