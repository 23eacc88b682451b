//! AST node families: types, expressions, statements, declarations.
//!
//! Every node is a plain tagged union (no trait objects, no `Rc`), mirroring
//! the teacher's `Expr` design: cheap to clone, easy to pattern-match
//! exhaustively, and friendly to an arena-of-handles symbol table instead of
//! inline `Rc<RefCell<_>>` back-references.

use smallvec::SmallVec;

use crate::intern::StringId;
use crate::scope::Ref;
use crate::span::TextRange;
use crate::types::{AccessMode, AddressSpace, TexelFormat, TextureDim, TextureKind};

/// An identifier as written, with the symbol it was resolved to.
///
/// `ref_` is `None` until pass 2 runs (or forever, for a name that never
/// resolved — an "undefined identifier" diagnostic is raised in that case
/// and the node is left as-is rather than removed).
#[derive(Debug, Clone)]
pub struct IdentNode {
    pub name: StringId,
    pub range: TextRange,
    pub ref_: Option<Ref>,
}

/// A type as it appears in source: a struct/alias name, or one of the
/// built-in type constructors.
#[derive(Debug, Clone)]
pub enum TypeExpr {
    Named(IdentNode),
    Vector { size: u8, elem: Box<TypeExpr>, range: TextRange },
    Matrix { cols: u8, rows: u8, elem: Box<TypeExpr>, range: TextRange },
    Array { elem: Box<TypeExpr>, size: Option<Box<Expr>>, range: TextRange },
    Pointer { space: AddressSpace, elem: Box<TypeExpr>, access: Option<AccessMode>, range: TextRange },
    Atomic { elem: Box<TypeExpr>, range: TextRange },
    Texture { kind: TextureKind, dim: TextureDim, sampled: Option<Box<TypeExpr>>, format: Option<TexelFormat>, access: Option<AccessMode>, range: TextRange },
    Sampler { comparison: bool, range: TextRange },
}

impl TypeExpr {
    #[must_use]
    pub fn range(&self) -> TextRange {
        match self {
            Self::Named(ident) => ident.range,
            Self::Vector { range, .. }
            | Self::Matrix { range, .. }
            | Self::Array { range, .. }
            | Self::Pointer { range, .. }
            | Self::Atomic { range, .. }
            | Self::Texture { range, .. }
            | Self::Sampler { range, .. } => *range,
        }
    }
}

/// A literal value as written.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Bool(bool),
    /// Decimal or hex text, kept verbatim; parsed lazily by constant folding
    /// so lexer/parser never has to pick a width before the type checker
    /// does its abstract-int→concrete conversion.
    Int { text: StringId, suffix_is_unsigned: Option<bool> },
    Float { text: StringId, is_half: bool },
}

/// Binary operators, including the forms that only ever appear through
/// compound assignment (handled separately on `Stmt::Assign`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    LogicalAnd,
    LogicalOr,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
    BitNot,
    AddressOf,
    Deref,
}

/// Target of a call: either a plain function/builtin name, or a type
/// constructor (`vec3<f32>(...)`, `array<i32, 4>(...)`).
#[derive(Debug, Clone)]
pub enum Callee {
    Name(IdentNode),
    Type(Box<TypeExpr>),
}

/// Purity/constancy flags carried on every expression node, set during
/// pass 2 (spec §4.4, item 4).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExprFlags {
    pub can_be_removed_if_unused: bool,
    pub is_constant: bool,
    pub from_pure_function: bool,
}

impl ExprFlags {
    #[must_use]
    pub fn pure_leaf() -> Self {
        Self { can_be_removed_if_unused: true, is_constant: true, from_pure_function: true }
    }

    /// Combines the flags of an expression's operands: an operator is as
    /// pure/constant as the least pure/constant of its parts.
    #[must_use]
    pub fn meet(operands: impl IntoIterator<Item = Self>) -> Self {
        operands.into_iter().fold(Self::pure_leaf(), |acc, f| Self {
            can_be_removed_if_unused: acc.can_be_removed_if_unused && f.can_be_removed_if_unused,
            is_constant: acc.is_constant && f.is_constant,
            from_pure_function: acc.from_pure_function && f.from_pure_function,
        })
    }
}

pub type ExprArgs = SmallVec<[Expr; 4]>;

/// An expression node.
#[derive(Debug, Clone)]
pub enum Expr {
    Literal { value: Literal, range: TextRange, flags: ExprFlags },
    Identifier { ident: IdentNode, flags: ExprFlags },
    Binary { op: BinOp, left: Box<Expr>, right: Box<Expr>, range: TextRange, flags: ExprFlags },
    Unary { op: UnaryOp, operand: Box<Expr>, range: TextRange, flags: ExprFlags },
    Call { callee: Callee, args: ExprArgs, range: TextRange, flags: ExprFlags },
    Index { base: Box<Expr>, index: Box<Expr>, range: TextRange, flags: ExprFlags },
    Member { base: Box<Expr>, member: StringId, range: TextRange, flags: ExprFlags },
    Paren { inner: Box<Expr>, range: TextRange },
}

impl Expr {
    #[must_use]
    pub fn range(&self) -> TextRange {
        match self {
            Self::Literal { range, .. }
            | Self::Binary { range, .. }
            | Self::Unary { range, .. }
            | Self::Call { range, .. }
            | Self::Index { range, .. }
            | Self::Member { range, .. }
            | Self::Paren { range, .. } => *range,
            Self::Identifier { ident, .. } => ident.range,
        }
    }

    #[must_use]
    pub fn flags(&self) -> ExprFlags {
        match self {
            Self::Literal { flags, .. }
            | Self::Identifier { flags, .. }
            | Self::Binary { flags, .. }
            | Self::Unary { flags, .. }
            | Self::Call { flags, .. }
            | Self::Index { flags, .. }
            | Self::Member { flags, .. } => *flags,
            Self::Paren { inner, .. } => inner.flags(),
        }
    }
}

/// One `case` arm of a `switch` statement.
#[derive(Debug, Clone)]
pub struct SwitchCase {
    /// Empty for the `default` arm.
    pub selectors: SmallVec<[Expr; 2]>,
    pub is_default: bool,
    pub body: Vec<Stmt>,
    pub range: TextRange,
}

/// Assignment operator, covering simple `=` and every compound form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Simple,
    Compound(BinOp),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncrDecrOp {
    Increment,
    Decrement,
}

/// A statement node.
#[derive(Debug, Clone)]
pub enum Stmt {
    Compound { scope: crate::scope::ScopeId, body: Vec<Stmt>, range: TextRange },
    Return { value: Option<Expr>, range: TextRange },
    If { condition: Expr, then_branch: Box<Stmt>, else_branch: Option<Box<Stmt>>, range: TextRange },
    Switch { scrutinee: Expr, cases: Vec<SwitchCase>, range: TextRange },
    For {
        scope: crate::scope::ScopeId,
        init: Option<Box<Stmt>>,
        condition: Option<Expr>,
        update: Option<Box<Stmt>>,
        body: Box<Stmt>,
        range: TextRange,
    },
    While { condition: Expr, body: Box<Stmt>, range: TextRange },
    Loop { scope: crate::scope::ScopeId, body: Vec<Stmt>, continuing: Option<Vec<Stmt>>, range: TextRange },
    Break { range: TextRange },
    BreakIf { condition: Expr, range: TextRange },
    Continue { range: TextRange },
    Discard { range: TextRange },
    Assign { op: AssignOp, target: Expr, value: Expr, range: TextRange },
    IncrDecr { op: IncrDecrOp, target: Expr, range: TextRange },
    Call { call: Expr, range: TextRange },
    /// Wraps a `const`/`let`/`var` declared inside a function body so
    /// statement-level DCE and the printer can treat it uniformly with
    /// other statements.
    Decl { decl: Box<Decl>, range: TextRange },
}

impl Stmt {
    #[must_use]
    pub fn range(&self) -> TextRange {
        match self {
            Self::Compound { range, .. }
            | Self::Return { range, .. }
            | Self::If { range, .. }
            | Self::Switch { range, .. }
            | Self::For { range, .. }
            | Self::While { range, .. }
            | Self::Loop { range, .. }
            | Self::Break { range }
            | Self::BreakIf { range, .. }
            | Self::Continue { range }
            | Self::Discard { range }
            | Self::Assign { range, .. }
            | Self::IncrDecr { range, .. }
            | Self::Call { range, .. }
            | Self::Decl { range, .. } => *range,
        }
    }
}

/// An attribute written as `@name` or `@name(args)` (`@group(0)`,
/// `@vertex`, `@workgroup_size(8, 8, 1)`, `@builtin(position)`, …). Kept as
/// raw name + argument expressions rather than a closed enum so unusual or
/// future attributes still round-trip through the printer.
#[derive(Debug, Clone)]
pub struct Attribute {
    pub name: StringId,
    pub args: ExprArgs,
    pub range: TextRange,
}

#[derive(Debug, Clone)]
pub struct Param {
    pub attributes: Vec<Attribute>,
    pub name: StringId,
    pub ty: TypeExpr,
    pub symbol: Ref,
    pub range: TextRange,
}

#[derive(Debug, Clone)]
pub struct StructMember {
    pub attributes: Vec<Attribute>,
    pub name: StringId,
    pub ty: TypeExpr,
    pub symbol: Ref,
    pub range: TextRange,
}

/// A module- or function-scope declaration.
#[derive(Debug, Clone)]
pub enum Decl {
    Const { name: StringId, symbol: Ref, ty: Option<TypeExpr>, value: Expr, range: TextRange },
    Override { attributes: Vec<Attribute>, name: StringId, symbol: Ref, ty: Option<TypeExpr>, value: Option<Expr>, range: TextRange },
    Var {
        attributes: Vec<Attribute>,
        space: Option<AddressSpace>,
        access: Option<AccessMode>,
        name: StringId,
        symbol: Ref,
        ty: Option<TypeExpr>,
        value: Option<Expr>,
        range: TextRange,
    },
    Let { name: StringId, symbol: Ref, ty: Option<TypeExpr>, value: Expr, range: TextRange },
    Function {
        attributes: Vec<Attribute>,
        name: StringId,
        symbol: Ref,
        scope: crate::scope::ScopeId,
        params: Vec<Param>,
        return_attributes: Vec<Attribute>,
        return_type: Option<TypeExpr>,
        body: Vec<Stmt>,
        range: TextRange,
    },
    Struct { name: StringId, symbol: Ref, members: Vec<StructMember>, range: TextRange },
    Alias { name: StringId, symbol: Ref, ty: TypeExpr, range: TextRange },
    ConstAssert { condition: Expr, range: TextRange },
}

impl Decl {
    #[must_use]
    pub fn range(&self) -> TextRange {
        match self {
            Self::Const { range, .. }
            | Self::Override { range, .. }
            | Self::Var { range, .. }
            | Self::Let { range, .. }
            | Self::Function { range, .. }
            | Self::Struct { range, .. }
            | Self::Alias { range, .. }
            | Self::ConstAssert { range, .. } => *range,
        }
    }

    /// The declaration's own symbol, if it has one (`const_assert` does
    /// not declare a name).
    #[must_use]
    pub fn symbol(&self) -> Option<Ref> {
        match self {
            Self::Const { symbol, .. }
            | Self::Override { symbol, .. }
            | Self::Var { symbol, .. }
            | Self::Let { symbol, .. }
            | Self::Function { symbol, .. }
            | Self::Struct { symbol, .. }
            | Self::Alias { symbol, .. } => Some(*symbol),
            Self::ConstAssert { .. } => None,
        }
    }
}

/// A whole compilation unit: its top-level declarations in source order.
#[derive(Debug, Clone, Default)]
pub struct Module {
    pub decls: Vec<Decl>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expr_flags_meet_is_false_if_any_operand_is_impure() {
        let pure = ExprFlags::pure_leaf();
        let impure = ExprFlags { can_be_removed_if_unused: false, is_constant: false, from_pure_function: false };
        let combined = ExprFlags::meet([pure, impure]);
        assert!(!combined.is_constant);
        assert!(!combined.from_pure_function);
    }

    #[test]
    fn paren_expr_inherits_inner_flags() {
        let range = TextRange::empty(crate::span::TextSize::from(0));
        let inner = Expr::Literal { value: Literal::Bool(true), range, flags: ExprFlags::pure_leaf() };
        let paren = Expr::Paren { inner: Box::new(inner), range };
        assert!(paren.flags().is_constant);
    }
}
