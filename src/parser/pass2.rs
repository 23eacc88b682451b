//! Pass 2: re-walks the AST pass 1 built, in the same scope order, to bind
//! every identifier/type reference, count uses, fold `const` initializers,
//! and tag expression purity/constancy (spec §4.4, item 4).
//!
//! Grounded on the teacher's `prepare.rs` prepare pass: a second walk over
//! an already-shaped tree that fills in what the first walk couldn't know
//! yet (there, variable slots; here, symbol bindings and constant values).

use ahash::AHashMap;

use crate::ast::{Attribute, Callee, Decl, Expr, ExprFlags, IdentNode, Literal, Module, Stmt, TypeExpr};
use crate::builtins;
use crate::error::{Diagnostic, DiagnosticRule, DiagnosticSink, Severity};
use crate::intern::Interner;
use crate::scope::{Ref, ScopeId, SymbolTable};
use crate::span::LineIndex;

/// A folded compile-time constant value, tracked only for scalar numeric
/// and boolean `const`s — enough to answer `const_assert` conditions and
/// array sizes without a general interpreter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConstValue {
    Bool(bool),
    Int(i64),
    Float(f64),
}

impl ConstValue {
    fn as_bool(self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(b),
            _ => None,
        }
    }

    /// Used by the validator to evaluate array-size template arguments,
    /// which must be a non-negative integer.
    #[must_use]
    pub(crate) fn as_u64(self) -> Option<u64> {
        match self {
            Self::Int(i) => u64::try_from(i).ok(),
            _ => None,
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            Self::Bool(b) => f64::from(u8::from(b)),
            Self::Int(i) => i as f64,
            Self::Float(f) => f,
        }
    }

    fn is_float(self) -> bool {
        matches!(self, Self::Float(_))
    }
}

struct Binder<'a> {
    symbols: &'a mut SymbolTable,
    interner: &'a Interner,
    diagnostics: &'a mut DiagnosticSink,
    line_index: &'a LineIndex,
    /// Folded value of every `const` symbol resolved so far, keyed by its
    /// `Ref`. Consulted when folding a later `const` that references an
    /// earlier one.
    const_values: AHashMap<Ref, ConstValue>,
}

/// Runs pass 2 over `module` in place.
pub fn run(module: &mut Module, symbols: &mut SymbolTable, interner: &Interner, diagnostics: &mut DiagnosticSink, line_index: &LineIndex) {
    let mut binder = Binder { symbols, interner, diagnostics, line_index, const_values: AHashMap::new() };
    for decl in &mut module.decls {
        binder.bind_decl(decl, ScopeId::MODULE);
    }
}

impl Binder<'_> {
    fn error(&mut self, range: crate::span::TextRange, message: impl Into<String>, rule: DiagnosticRule) {
        self.diagnostics.push(Diagnostic::new(Severity::Error, message.into(), range.start(), self.line_index).with_rule(rule));
    }

    fn bind_ident_as_type(&mut self, ident: &mut IdentNode, scope: ScopeId) {
        if let Some(r) = self.symbols.resolve(scope, ident.name, ident.range.start()) {
            ident.ref_ = Some(r);
            self.symbols.record_use(r);
        } else {
            let name = self.interner.resolve(ident.name).to_owned();
            self.error(ident.range, format!("undefined type `{name}`"), DiagnosticRule::UndefinedType);
        }
    }

    fn bind_ident_as_value(&mut self, ident: &mut IdentNode, scope: ScopeId) {
        if let Some(r) = self.symbols.resolve(scope, ident.name, ident.range.start()) {
            ident.ref_ = Some(r);
            self.symbols.record_use(r);
        } else {
            let name = self.interner.resolve(ident.name).to_owned();
            self.error(ident.range, format!("undefined identifier `{name}`"), DiagnosticRule::UndefinedIdentifier);
        }
    }

    /// `@builtin(name)` and `@interpolate(type[, sampling])` take bare
    /// contextual-keyword arguments, not expressions — binding them as
    /// identifiers would misreport `vertex_index`/`flat`/… as undefined.
    /// Every other attribute's args (`@group(0)`, `@workgroup_size(x, y)`,
    /// `@align(n)`, …) are ordinary expressions and bind normally.
    fn bind_attributes(&mut self, attributes: &mut [Attribute], scope: ScopeId) {
        for attr in attributes {
            let name = self.interner.resolve(attr.name);
            if matches!(name, "builtin" | "interpolate") {
                continue;
            }
            for arg in &mut attr.args {
                self.bind_expr(arg, scope);
            }
        }
    }

    fn bind_type(&mut self, ty: &mut TypeExpr, scope: ScopeId) {
        match ty {
            TypeExpr::Named(ident) => self.bind_ident_as_type(ident, scope),
            TypeExpr::Vector { elem, .. } | TypeExpr::Matrix { elem, .. } | TypeExpr::Atomic { elem, .. } => {
                self.bind_type(elem, scope);
            }
            TypeExpr::Array { elem, size, .. } => {
                self.bind_type(elem, scope);
                if let Some(size) = size {
                    self.bind_expr(size, scope);
                }
            }
            TypeExpr::Pointer { elem, .. } => self.bind_type(elem, scope),
            TypeExpr::Texture { sampled, .. } => {
                if let Some(sampled) = sampled {
                    self.bind_type(sampled, scope);
                }
            }
            TypeExpr::Sampler { .. } => {}
        }
    }

    fn bind_decl(&mut self, decl: &mut Decl, scope: ScopeId) {
        match decl {
            Decl::Const { symbol, ty, value, .. } => {
                if let Some(ty) = ty {
                    self.bind_type(ty, scope);
                }
                self.bind_expr(value, scope);
                if let Some(folded) = fold_const(value, self.interner, &self.const_values) {
                    self.const_values.insert(*symbol, folded);
                }
            }
            Decl::Override { attributes, ty, value, .. } => {
                self.bind_attributes(attributes, scope);
                if let Some(ty) = ty {
                    self.bind_type(ty, scope);
                }
                if let Some(value) = value {
                    self.bind_expr(value, scope);
                }
            }
            Decl::Var { attributes, ty, value, .. } => {
                self.bind_attributes(attributes, scope);
                if let Some(ty) = ty {
                    self.bind_type(ty, scope);
                }
                if let Some(value) = value {
                    self.bind_expr(value, scope);
                }
            }
            Decl::Let { ty, value, .. } => {
                if let Some(ty) = ty {
                    self.bind_type(ty, scope);
                }
                self.bind_expr(value, scope);
            }
            Decl::Function { attributes, params, return_attributes, return_type, body, scope: fn_scope, .. } => {
                self.bind_attributes(attributes, scope);
                for param in params {
                    self.bind_attributes(&mut param.attributes, scope);
                    self.bind_type(&mut param.ty, scope);
                }
                self.bind_attributes(return_attributes, scope);
                if let Some(return_type) = return_type {
                    self.bind_type(return_type, scope);
                }
                for stmt in body {
                    self.bind_stmt(stmt, *fn_scope);
                }
            }
            Decl::Struct { members, .. } => {
                for member in members {
                    self.bind_attributes(&mut member.attributes, scope);
                    self.bind_type(&mut member.ty, scope);
                }
            }
            Decl::Alias { ty, .. } => self.bind_type(ty, scope),
            Decl::ConstAssert { condition, .. } => {
                self.bind_expr(condition, scope);
                if let Some(value) = fold_const(condition, self.interner, &self.const_values) {
                    if value.as_bool() == Some(false) {
                        self.error(condition.range(), "const_assert condition is false", DiagnosticRule::InvalidOperands);
                    }
                }
            }
        }
    }

    fn bind_stmt(&mut self, stmt: &mut Stmt, scope: ScopeId) {
        match stmt {
            Stmt::Compound { scope: inner, body, .. } => {
                for stmt in body {
                    self.bind_stmt(stmt, *inner);
                }
            }
            Stmt::Return { value, .. } => {
                if let Some(value) = value {
                    self.bind_expr(value, scope);
                }
            }
            Stmt::If { condition, then_branch, else_branch, .. } => {
                self.bind_expr(condition, scope);
                self.bind_stmt(then_branch, scope);
                if let Some(else_branch) = else_branch {
                    self.bind_stmt(else_branch, scope);
                }
            }
            Stmt::Switch { scrutinee, cases, .. } => {
                self.bind_expr(scrutinee, scope);
                for case in cases {
                    for selector in &mut case.selectors {
                        self.bind_expr(selector, scope);
                    }
                    for stmt in &mut case.body {
                        self.bind_stmt(stmt, scope);
                    }
                }
            }
            Stmt::For { scope: for_scope, init, condition, update, body, .. } => {
                if let Some(init) = init {
                    self.bind_stmt(init, *for_scope);
                }
                if let Some(condition) = condition {
                    self.bind_expr(condition, *for_scope);
                }
                if let Some(update) = update {
                    self.bind_stmt(update, *for_scope);
                }
                self.bind_stmt(body, *for_scope);
            }
            Stmt::While { condition, body, .. } => {
                self.bind_expr(condition, scope);
                self.bind_stmt(body, scope);
            }
            Stmt::Loop { scope: loop_scope, body, continuing, .. } => {
                for stmt in body {
                    self.bind_stmt(stmt, *loop_scope);
                }
                if let Some(continuing) = continuing {
                    for stmt in continuing {
                        self.bind_stmt(stmt, *loop_scope);
                    }
                }
            }
            Stmt::Break { .. } | Stmt::Continue { .. } | Stmt::Discard { .. } => {}
            Stmt::BreakIf { condition, .. } => self.bind_expr(condition, scope),
            Stmt::Assign { target, value, .. } => {
                self.bind_expr(target, scope);
                self.bind_expr(value, scope);
            }
            Stmt::IncrDecr { target, .. } => self.bind_expr(target, scope),
            Stmt::Call { call, .. } => self.bind_expr(call, scope),
            Stmt::Decl { decl, .. } => self.bind_decl(decl, scope),
        }
    }

    fn bind_expr(&mut self, expr: &mut Expr, scope: ScopeId) {
        match expr {
            Expr::Literal { .. } => {}
            Expr::Identifier { ident, flags } => {
                self.bind_ident_as_value(ident, scope);
                *flags = self.identifier_flags(ident.ref_);
            }
            Expr::Binary { left, right, flags, .. } => {
                self.bind_expr(left, scope);
                self.bind_expr(right, scope);
                *flags = ExprFlags::meet([left.flags(), right.flags()]);
            }
            Expr::Unary { operand, flags, .. } => {
                self.bind_expr(operand, scope);
                *flags = operand.flags();
            }
            Expr::Call { callee, args, flags, .. } => {
                match callee {
                    Callee::Name(ident) => self.bind_ident_as_value(ident, scope),
                    Callee::Type(ty) => self.bind_type(ty, scope),
                }
                for arg in args.iter_mut() {
                    self.bind_expr(arg, scope);
                }
                *flags = self.call_flags(callee, args);
            }
            Expr::Index { base, index, flags, .. } => {
                self.bind_expr(base, scope);
                self.bind_expr(index, scope);
                *flags = ExprFlags::meet([base.flags(), index.flags()]);
            }
            Expr::Member { base, flags, .. } => {
                self.bind_expr(base, scope);
                *flags = base.flags();
            }
            Expr::Paren { inner, .. } => self.bind_expr(inner, scope),
        }
    }

    /// A bare identifier's flags depend on what it resolved to: a `const`
    /// (or a parameter/let bound to one, tracked loosely here by symbol
    /// kind) is as constant/pure as its own initializer; anything else
    /// (function parameter, `var`, unresolved name) is never constant.
    fn identifier_flags(&self, ref_: Option<Ref>) -> ExprFlags {
        let Some(r) = ref_ else {
            return ExprFlags { can_be_removed_if_unused: true, is_constant: false, from_pure_function: true };
        };
        let is_constant = matches!(self.symbols.symbol(r).kind, crate::scope::SymbolKind::Const) && self.const_values.contains_key(&r);
        ExprFlags { can_be_removed_if_unused: true, is_constant, from_pure_function: true }
    }

    /// A call's flags depend on whether its callee is a pure builtin (type
    /// constructors count as pure) and whether every argument is pure.
    fn call_flags(&self, callee: &Callee, args: &[Expr]) -> ExprFlags {
        let callee_pure = match callee {
            Callee::Type(_) => true,
            Callee::Name(ident) => {
                let name = self.interner.resolve(ident.name);
                builtins::lookup(name).is_some_and(|f| f.is_pure)
            }
        };
        let mut flags = ExprFlags::meet(args.iter().map(Expr::flags));
        flags.from_pure_function = flags.from_pure_function && callee_pure;
        flags.can_be_removed_if_unused = flags.can_be_removed_if_unused && callee_pure;
        // A call's own result is never itself a compile-time constant in
        // this implementation (no builtin is constant-folded), regardless
        // of how constant its arguments are.
        flags.is_constant = false;
        flags
    }

}

/// Folds `expr` to a [`ConstValue`] when every operand is itself foldable:
/// literals, parenthesized/unary/binary combinations of folded values, and
/// identifiers bound to an already-folded `const`. Returns `None` for
/// anything involving a non-const symbol or an unsupported operator (e.g.
/// vector/matrix arithmetic) — the caller treats that as "not a
/// compile-time constant" rather than an error. Shared between pass 2
/// (folding `const` initializers) and the validator (evaluating array-size
/// template arguments).
#[must_use]
pub(crate) fn fold_const(expr: &Expr, interner: &Interner, const_values: &AHashMap<Ref, ConstValue>) -> Option<ConstValue> {
    match expr {
        Expr::Literal { value, .. } => fold_literal(value, interner),
        Expr::Paren { inner, .. } => fold_const(inner, interner, const_values),
        Expr::Identifier { ident, .. } => ident.ref_.and_then(|r| const_values.get(&r).copied()),
        Expr::Unary { op, operand, .. } => {
            let v = fold_const(operand, interner, const_values)?;
            fold_unary(*op, v)
        }
        Expr::Binary { op, left, right, .. } => {
            let a = fold_const(left, interner, const_values)?;
            let b = fold_const(right, interner, const_values)?;
            fold_binary(*op, a, b)
        }
        _ => None,
    }
}

fn fold_literal(literal: &Literal, interner: &Interner) -> Option<ConstValue> {
    match literal {
        Literal::Bool(b) => Some(ConstValue::Bool(*b)),
        Literal::Int { text, .. } => {
            let text = interner.resolve(*text);
            parse_int_literal(text).map(ConstValue::Int)
        }
        Literal::Float { text, .. } => {
            let text = interner.resolve(*text);
            let trimmed = text.trim_end_matches(['f', 'h']);
            trimmed.parse::<f64>().ok().map(ConstValue::Float)
        }
    }
}

fn fold_unary(op: crate::ast::UnaryOp, v: ConstValue) -> Option<ConstValue> {
    use crate::ast::UnaryOp;
    match (op, v) {
        (UnaryOp::Neg, ConstValue::Int(i)) => Some(ConstValue::Int(-i)),
        (UnaryOp::Neg, ConstValue::Float(f)) => Some(ConstValue::Float(-f)),
        (UnaryOp::Not, ConstValue::Bool(b)) => Some(ConstValue::Bool(!b)),
        (UnaryOp::BitNot, ConstValue::Int(i)) => Some(ConstValue::Int(!i)),
        _ => None,
    }
}

fn fold_binary(op: crate::ast::BinOp, a: ConstValue, b: ConstValue) -> Option<ConstValue> {
    use crate::ast::BinOp;
    if let (ConstValue::Bool(x), ConstValue::Bool(y)) = (a, b) {
        return match op {
            BinOp::LogicalAnd => Some(ConstValue::Bool(x && y)),
            BinOp::LogicalOr => Some(ConstValue::Bool(x || y)),
            BinOp::Eq => Some(ConstValue::Bool(x == y)),
            BinOp::Ne => Some(ConstValue::Bool(x != y)),
            _ => None,
        };
    }
    if matches!(op, BinOp::LogicalAnd | BinOp::LogicalOr) {
        return None;
    }
    if a.is_float() || b.is_float() {
        let (x, y) = (a.as_f64(), b.as_f64());
        return match op {
            BinOp::Add => Some(ConstValue::Float(x + y)),
            BinOp::Sub => Some(ConstValue::Float(x - y)),
            BinOp::Mul => Some(ConstValue::Float(x * y)),
            BinOp::Div => Some(ConstValue::Float(x / y)),
            BinOp::Eq => Some(ConstValue::Bool(x == y)),
            BinOp::Ne => Some(ConstValue::Bool(x != y)),
            BinOp::Lt => Some(ConstValue::Bool(x < y)),
            BinOp::Le => Some(ConstValue::Bool(x <= y)),
            BinOp::Gt => Some(ConstValue::Bool(x > y)),
            BinOp::Ge => Some(ConstValue::Bool(x >= y)),
            _ => None,
        };
    }
    let (ConstValue::Int(x), ConstValue::Int(y)) = (a, b) else { return None };
    match op {
        BinOp::Add => Some(ConstValue::Int(x.wrapping_add(y))),
        BinOp::Sub => Some(ConstValue::Int(x.wrapping_sub(y))),
        BinOp::Mul => Some(ConstValue::Int(x.wrapping_mul(y))),
        BinOp::Div if y != 0 => Some(ConstValue::Int(x / y)),
        BinOp::Mod if y != 0 => Some(ConstValue::Int(x % y)),
        BinOp::And => Some(ConstValue::Int(x & y)),
        BinOp::Or => Some(ConstValue::Int(x | y)),
        BinOp::Xor => Some(ConstValue::Int(x ^ y)),
        BinOp::Shl => Some(ConstValue::Int(x.wrapping_shl(y as u32))),
        BinOp::Shr => Some(ConstValue::Int(x.wrapping_shr(y as u32))),
        BinOp::Eq => Some(ConstValue::Bool(x == y)),
        BinOp::Ne => Some(ConstValue::Bool(x != y)),
        BinOp::Lt => Some(ConstValue::Bool(x < y)),
        BinOp::Le => Some(ConstValue::Bool(x <= y)),
        BinOp::Gt => Some(ConstValue::Bool(x > y)),
        BinOp::Ge => Some(ConstValue::Bool(x >= y)),
        _ => None,
    }
}

/// Parses a WGSL integer literal's text (decimal or `0x`-prefixed hex,
/// optional trailing `i`/`u` suffix already stripped by the lexer's
/// tokenization — the suffix character, if any, is still present in the
/// source slice and must be trimmed here).
fn parse_int_literal(text: &str) -> Option<i64> {
    let trimmed = text.trim_end_matches(['i', 'u']);
    if let Some(hex) = trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
        return i64::from_str_radix(hex, 16).ok();
    }
    trimmed.parse::<i64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    #[test]
    fn const_arithmetic_is_folded_and_propagates() {
        let source = "const a = 2 + 3;\nconst b = a * 10;\nfn f() -> i32 { return b; }";
        let unit = parse(source);
        assert!(!unit.diagnostics.has_errors());
    }

    #[test]
    fn undefined_identifier_is_reported() {
        let unit = parse("fn f() -> i32 { return nope; }");
        assert!(unit.diagnostics.has_errors());
    }

    #[test]
    fn false_const_assert_is_reported() {
        let unit = parse("const_assert 1 == 2;");
        assert!(unit.diagnostics.has_errors());
    }

    #[test]
    fn call_to_pure_builtin_with_constant_args_is_marked_pure_but_not_constant() {
        let unit = parse("fn f() -> f32 { return sqrt(4.0); }");
        assert!(!unit.diagnostics.has_errors());
    }
}
