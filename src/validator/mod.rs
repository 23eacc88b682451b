//! Semantic validator: struct layout resolution, declaration and statement
//! validation, and (via [`uniformity`]) non-uniform control-flow detection.
//!
//! Grounded on the teacher's `prepare.rs` per-function scope-info pass
//! (`collect_function_scope_info`/`collect_cell_vars_from_node`): a
//! dataflow-ish walk that threads a small piece of state (here, `in_loop`/
//! `in_switch`/`has_return`) through nested statements.

pub mod uniformity;

use ahash::{AHashMap, AHashSet};

use crate::ast::{Attribute, Callee, Decl, Expr, Literal, Module, Stmt, TypeExpr, UnaryOp};
use crate::builtins;
use crate::error::{Diagnostic, DiagnosticRule, DiagnosticSink};
use crate::intern::{Interner, StringId};
use crate::parser::pass2::{fold_const, ConstValue};
use crate::scope::{Ref, SymbolTable};
use crate::span::{LineIndex, TextRange};
use crate::types::{AccessMode, AddressSpace, Scalar, StructId, StructLayout, StructRegistry, Type};
use uniformity::UniformityChecker;

/// A user-defined function's resolved parameter/return types, collected
/// ahead of statement validation so a call to a function declared later in
/// the file type-checks the same as one declared earlier (module scope
/// allows either order).
#[derive(Debug, Clone)]
struct FunctionSignature {
    params: Vec<Type>,
    return_type: Type,
}

/// Stable identifier for which shader stage a function targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
    Compute,
}

/// One resolved entry point, used later by dead-code elimination (as a DCE
/// root) and reflection (stage + workgroup size reporting).
#[derive(Debug, Clone)]
pub struct EntryPointInfo {
    pub symbol: Ref,
    pub stage: ShaderStage,
    pub workgroup_size: Option<[u32; 3]>,
}

/// One module-scope `var` in the `uniform` or `storage` address space,
/// resolved enough for reflection to describe without re-walking the AST.
#[derive(Debug, Clone)]
pub struct ExternalBindingInfo {
    pub symbol: Ref,
    pub group: u32,
    pub binding: u32,
    pub space: AddressSpace,
    pub access: AccessMode,
    pub ty: Type,
}

/// Result of running the validator over a module: everything later phases
/// (DCE, renamer, printer, reflection) need that isn't already on the AST
/// or symbol table.
pub struct ValidationResult {
    pub structs: StructRegistry,
    pub struct_ids: AHashMap<Ref, StructId>,
    pub entry_points: Vec<EntryPointInfo>,
    pub bindings: Vec<ExternalBindingInfo>,
}

struct Validator<'a> {
    interner: &'a Interner,
    symbols: &'a mut SymbolTable,
    diagnostics: &'a mut DiagnosticSink,
    line_index: &'a LineIndex,
    struct_decls: AHashMap<Ref, (StringId, Vec<(StringId, &'a TypeExpr)>)>,
    alias_decls: AHashMap<Ref, &'a TypeExpr>,
    struct_ids: AHashMap<Ref, StructId>,
    alias_types: AHashMap<Ref, Type>,
    resolving: AHashSet<Ref>,
    structs: StructRegistry,
    const_values: AHashMap<Ref, ConstValue>,
    bindings: Vec<ExternalBindingInfo>,
    /// Resolved type of every symbol an expression can name: module-scope
    /// `const`/`override`/`var` declarations and, while a function body is
    /// being validated, that function's parameters and local declarations.
    locals: AHashMap<Ref, Type>,
    functions: AHashMap<Ref, FunctionSignature>,
}

/// Runs every validation phase over `module` and returns struct layouts and
/// entry-point metadata for the rest of the pipeline.
pub fn validate(module: &Module, symbols: &mut SymbolTable, interner: &Interner, diagnostics: &mut DiagnosticSink, line_index: &LineIndex) -> ValidationResult {
    let mut validator = Validator {
        interner,
        symbols,
        diagnostics,
        line_index,
        struct_decls: AHashMap::new(),
        alias_decls: AHashMap::new(),
        struct_ids: AHashMap::new(),
        alias_types: AHashMap::new(),
        resolving: AHashSet::new(),
        structs: StructRegistry::new(),
        const_values: AHashMap::new(),
        bindings: Vec::new(),
        locals: AHashMap::new(),
        functions: AHashMap::new(),
    };
    validator.collect_type_decls(module);
    validator.collect_const_values(module);
    validator.resolve_all_struct_layouts();
    validator.collect_function_signatures(module);
    validator.collect_module_symbol_types(module);
    let entry_points = validator.validate_decls(module);
    ValidationResult { structs: validator.structs, struct_ids: validator.struct_ids, entry_points, bindings: validator.bindings }
}

impl<'a> Validator<'a> {
    fn error(&mut self, range: TextRange, message: impl Into<String>, rule: DiagnosticRule) {
        let severity = rule.default_severity();
        self.diagnostics.push(Diagnostic::new(severity, message.into(), range.start(), self.line_index).with_rule(rule));
    }

    /// Phase 1: register every struct and alias name before resolving any
    /// of them, so a struct can reference an alias declared later in the
    /// file and vice versa (module scope allows forward references).
    fn collect_type_decls(&mut self, module: &'a Module) {
        for decl in &module.decls {
            match decl {
                Decl::Struct { symbol, name, members, .. } => {
                    let fields = members.iter().map(|m| (m.name, &m.ty)).collect();
                    self.struct_decls.insert(*symbol, (*name, fields));
                }
                Decl::Alias { symbol, ty, .. } => {
                    self.alias_decls.insert(*symbol, ty);
                }
                _ => {}
            }
        }
    }

    /// Folds every module-scope `const` so array-size template arguments
    /// that reference one resolve during type resolution.
    fn collect_const_values(&mut self, module: &Module) {
        for decl in &module.decls {
            if let Decl::Const { symbol, value, .. } = decl {
                if let Some(v) = fold_const(value, self.interner, &self.const_values) {
                    self.const_values.insert(*symbol, v);
                }
            }
        }
    }

    /// Phase 2: eagerly resolve every struct's layout (on-demand recursion
    /// into nested struct fields, memoized).
    fn resolve_all_struct_layouts(&mut self) {
        let refs: Vec<Ref> = self.struct_decls.keys().copied().collect();
        for r in refs {
            self.resolve_struct(r);
        }
    }

    /// Resolves every function's parameter/return types before any body is
    /// walked, so a call to a function declared later in the file (module
    /// scope allows forward references) still type-checks its arguments.
    fn collect_function_signatures(&mut self, module: &Module) {
        let mut sigs = Vec::new();
        for decl in &module.decls {
            if let Decl::Function { symbol, params, return_type, .. } = decl {
                let params = params.iter().map(|p| self.resolve_type_expr(&p.ty)).collect();
                let return_type = return_type.as_ref().map_or(Type::Void, |t| self.resolve_type_expr(t));
                sigs.push((*symbol, FunctionSignature { params, return_type }));
            }
        }
        self.functions.extend(sigs);
    }

    /// Resolves the type of every module-scope `const`/`override`/`var` up
    /// front (in source order — a const referencing one declared later in
    /// the file is the same known gap `collect_const_values` already has),
    /// so function bodies validated afterwards can look up a non-local
    /// identifier's type regardless of where in the module it's declared.
    fn collect_module_symbol_types(&mut self, module: &Module) {
        for decl in &module.decls {
            match decl {
                Decl::Const { symbol, ty, value, .. } => {
                    let resolved = ty.as_ref().map_or_else(|| self.infer_expr(value), |t| self.resolve_type_expr(t));
                    self.locals.insert(*symbol, resolved);
                }
                Decl::Override { symbol, ty, value, .. } => {
                    let resolved = ty
                        .as_ref()
                        .map(|t| self.resolve_type_expr(t))
                        .or_else(|| value.as_ref().map(|v| self.infer_expr(v)))
                        .unwrap_or(Type::Unknown);
                    self.locals.insert(*symbol, resolved);
                }
                Decl::Var { symbol, ty, .. } => {
                    let resolved = ty.as_ref().map_or(Type::Unknown, |t| self.resolve_type_expr(t));
                    self.locals.insert(*symbol, resolved);
                }
                _ => {}
            }
        }
    }

    fn resolve_struct(&mut self, r: Ref) -> Option<StructId> {
        if let Some(&id) = self.struct_ids.get(&r) {
            return Some(id);
        }
        if !self.resolving.insert(r) {
            // Self-referential struct: not valid WGSL, but fail soft rather
            // than recurse forever.
            return None;
        }
        let Some((name, fields)) = self.struct_decls.get(&r).cloned() else {
            self.resolving.remove(&r);
            return None;
        };
        let mut field_types = Vec::with_capacity(fields.len());
        for (i, (field_name, ty)) in fields.iter().enumerate() {
            let resolved = self.resolve_type_expr(ty);
            if resolved.has_runtime_array() && i + 1 != fields.len() {
                self.error(ty.range(), "a runtime-sized array may only be the last field of a struct", DiagnosticRule::RuntimeArrayPosition);
            }
            field_types.push((*field_name, resolved));
        }
        let layout = StructLayout::compute(name, field_types, &self.structs);
        let id = self.structs.insert(layout);
        self.struct_ids.insert(r, id);
        self.resolving.remove(&r);
        Some(id)
    }

    fn resolve_alias(&mut self, r: Ref) -> Type {
        if let Some(ty) = self.alias_types.get(&r) {
            return ty.clone();
        }
        if !self.resolving.insert(r) {
            return Type::Unknown;
        }
        let ty = self.alias_decls.get(&r).map_or(Type::Unknown, |ty| self.resolve_type_expr(ty));
        self.resolving.remove(&r);
        self.alias_types.insert(r, ty.clone());
        ty
    }

    fn resolve_type_expr(&mut self, ty: &TypeExpr) -> Type {
        match ty {
            TypeExpr::Named(ident) => {
                let name = self.interner.resolve(ident.name);
                if let Some(scalar) = Scalar::from_name(name) {
                    return Type::Scalar(scalar);
                }
                let Some(r) = ident.ref_ else { return Type::Unknown };
                if self.struct_decls.contains_key(&r) {
                    self.resolve_struct(r).map_or(Type::Unknown, Type::Struct)
                } else if self.alias_decls.contains_key(&r) {
                    self.resolve_alias(r)
                } else {
                    Type::Unknown
                }
            }
            TypeExpr::Vector { size, elem, .. } => Type::Vector { size: *size, elem: self.scalar_of(elem) },
            TypeExpr::Matrix { cols, rows, elem, .. } => Type::Matrix { cols: *cols, rows: *rows, elem: self.scalar_of(elem) },
            TypeExpr::Array { elem, size, .. } => {
                let elem_ty = self.resolve_type_expr(elem);
                let count = size.as_ref().and_then(|e| fold_const(e, self.interner, &self.const_values)).and_then(ConstValue::as_u64);
                Type::Array { elem: Box::new(elem_ty), count }
            }
            TypeExpr::Pointer { space, elem, access, .. } => {
                Type::Pointer { space: *space, elem: Box::new(self.resolve_type_expr(elem)), access: access.unwrap_or(AccessMode::Read) }
            }
            TypeExpr::Atomic { elem, .. } => Type::Atomic(Box::new(self.resolve_type_expr(elem))),
            TypeExpr::Texture { kind, dim, sampled, format, access, .. } => Type::Texture {
                kind: *kind,
                dim: *dim,
                sampled: sampled.as_ref().map(|s| Box::new(self.resolve_type_expr(s))),
                format: *format,
                access: access.unwrap_or(AccessMode::Read),
            },
            TypeExpr::Sampler { comparison, .. } => Type::Sampler { comparison: *comparison },
        }
    }

    fn scalar_of(&mut self, ty: &TypeExpr) -> Scalar {
        match self.resolve_type_expr(ty) {
            Type::Scalar(s) => s,
            _ => Scalar::F32,
        }
    }

    /// Infers `expr`'s type, reporting a [`DiagnosticRule::TypeMismatch`] or
    /// [`DiagnosticRule::ArityMismatch`] wherever the type algebra has no
    /// answer. Always returns *some* type — `Type::Unknown` on failure, or
    /// whenever an operand's own type couldn't be pinned down (an
    /// unresolved identifier, a call to a builtin this crate doesn't model
    /// argument types for) — so a caller one level up can keep checking the
    /// rest of the expression tree without re-deriving what already went
    /// wrong here (spec §4.5 phase 3/4).
    fn infer_expr(&mut self, expr: &Expr) -> Type {
        match expr {
            Expr::Literal { value, .. } => self.infer_literal(value),
            Expr::Identifier { ident, .. } => ident.ref_.and_then(|r| self.locals.get(&r).cloned()).unwrap_or(Type::Unknown),
            Expr::Paren { inner, .. } => self.infer_expr(inner),
            Expr::Unary { op, operand, .. } => self.infer_unary(*op, operand),
            Expr::Binary { op, left, right, range, .. } => self.infer_binary(*op, left, right, *range),
            Expr::Index { base, index, range, .. } => self.infer_index(base, index, *range),
            Expr::Member { base, member, range, .. } => self.infer_member(base, *member, *range),
            Expr::Call { callee, args, range, .. } => self.infer_call(callee, args, *range),
        }
    }

    fn infer_literal(&self, lit: &Literal) -> Type {
        match lit {
            Literal::Bool(_) => Type::Scalar(Scalar::Bool),
            Literal::Int { suffix_is_unsigned: Some(true), .. } => Type::Scalar(Scalar::U32),
            Literal::Int { suffix_is_unsigned: Some(false), .. } => Type::Scalar(Scalar::I32),
            Literal::Int { suffix_is_unsigned: None, .. } => Type::Scalar(Scalar::AbstractInt),
            Literal::Float { is_half: true, .. } => Type::Scalar(Scalar::F16),
            Literal::Float { is_half: false, .. } => Type::Scalar(Scalar::AbstractFloat),
        }
    }

    /// A unary operator never changes its operand's shape (spec §4.3
    /// doesn't define a separate unary result-type table); `&`/`*` would,
    /// but this checker doesn't model pointer types precisely enough to
    /// narrow through them, so it passes the operand type through there too.
    fn infer_unary(&mut self, _op: UnaryOp, operand: &Expr) -> Type {
        self.infer_expr(operand)
    }

    fn infer_binary(&mut self, op: crate::ast::BinOp, left: &Expr, right: &Expr, range: TextRange) -> Type {
        use crate::ast::BinOp;

        let lt = self.infer_expr(left);
        let rt = self.infer_expr(right);
        if lt == Type::Unknown || rt == Type::Unknown {
            return Type::Unknown;
        }
        match op {
            BinOp::LogicalAnd | BinOp::LogicalOr => {
                if lt == Type::Scalar(Scalar::Bool) && rt == Type::Scalar(Scalar::Bool) {
                    Type::Scalar(Scalar::Bool)
                } else {
                    self.error(range, format!("operands of a logical operator must be `bool`, found `{lt}` and `{rt}`"), DiagnosticRule::InvalidOperands);
                    Type::Unknown
                }
            }
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
                if Type::common_type(&lt, &rt).is_some() {
                    Type::Scalar(Scalar::Bool)
                } else {
                    self.error(range, format!("cannot compare `{lt}` and `{rt}`"), DiagnosticRule::TypeMismatch);
                    Type::Unknown
                }
            }
            BinOp::Add | BinOp::Sub => self.binary_result(Type::add_sub_result_type(&lt, &rt), &lt, &rt, range),
            BinOp::Mul => self.binary_result(Type::multiply_result_type(&lt, &rt), &lt, &rt, range),
            BinOp::Div | BinOp::Mod => self.binary_result(Type::div_result_type(&lt, &rt), &lt, &rt, range),
            BinOp::And | BinOp::Or | BinOp::Xor | BinOp::Shl | BinOp::Shr => self.binary_result(Type::common_type(&lt, &rt), &lt, &rt, range),
        }
    }

    fn binary_result(&mut self, result: Option<Type>, lt: &Type, rt: &Type, range: TextRange) -> Type {
        result.unwrap_or_else(|| {
            self.error(range, format!("no implicit conversion between `{lt}` and `{rt}`"), DiagnosticRule::TypeMismatch);
            Type::Unknown
        })
    }

    fn infer_index(&mut self, base: &Expr, index: &Expr, range: TextRange) -> Type {
        let base_ty = self.infer_expr(base);
        let index_ty = self.infer_expr(index);
        let is_integer = matches!(index_ty, Type::Scalar(Scalar::I32 | Scalar::U32 | Scalar::AbstractInt));
        if index_ty != Type::Unknown && !is_integer {
            self.error(index.range(), format!("array/vector index must be an integer, found `{index_ty}`"), DiagnosticRule::TypeMismatch);
        }
        match &base_ty {
            Type::Array { elem, .. } => (**elem).clone(),
            Type::Vector { elem, .. } => Type::Scalar(*elem),
            Type::Matrix { rows, elem, .. } => Type::Vector { size: *rows, elem: *elem },
            Type::Pointer { elem, .. } => (**elem).clone(),
            Type::Unknown => Type::Unknown,
            _ => {
                self.error(range, format!("cannot index into `{base_ty}`"), DiagnosticRule::TypeMismatch);
                Type::Unknown
            }
        }
    }

    /// Resolves member access to a struct field (by name, via the struct
    /// registry) or a vector swizzle: a length-1 swizzle (`.x`) collapses to
    /// the element scalar, a length 2-4 swizzle (`.xyz`) stays a vector of
    /// that length (spec §4.5).
    fn infer_member(&mut self, base: &Expr, member: StringId, range: TextRange) -> Type {
        let base_ty = self.infer_expr(base);
        match &base_ty {
            Type::Struct(id) => {
                let layout = self.structs.get(*id);
                if let Some(field) = layout.fields.iter().find(|f| f.name == member) {
                    field.ty.clone()
                } else {
                    let field_name = self.interner.resolve(member);
                    let struct_name = self.interner.resolve(layout.name);
                    self.error(range, format!("no field `{field_name}` on struct `{struct_name}`"), DiagnosticRule::TypeMismatch);
                    Type::Unknown
                }
            }
            Type::Vector { size, elem } => {
                let text = self.interner.resolve(member).to_string();
                match swizzle_len(&text, *size) {
                    Some(1) => Type::Scalar(*elem),
                    Some(n) => Type::Vector { size: n, elem: *elem },
                    None => {
                        self.error(range, format!("`{text}` is not a valid swizzle of a {size}-component vector"), DiagnosticRule::TypeMismatch);
                        Type::Unknown
                    }
                }
            }
            Type::Unknown => Type::Unknown,
            _ => {
                self.error(range, format!("`{base_ty}` has no members"), DiagnosticRule::TypeMismatch);
                Type::Unknown
            }
        }
    }

    fn infer_call(&mut self, callee: &Callee, args: &crate::ast::ExprArgs, range: TextRange) -> Type {
        let arg_types: Vec<Type> = args.iter().map(|a| self.infer_expr(a)).collect();
        match callee {
            Callee::Type(ty_expr) => self.infer_type_constructor(ty_expr, &arg_types, range),
            Callee::Name(ident) => {
                let Some(r) = ident.ref_ else { return Type::Unknown };
                let Some(sig) = self.functions.get(&r).cloned() else {
                    // A builtin (or an identifier that never resolved): this
                    // crate carries no argument-signature catalog for
                    // builtins, so arity/argument types go unchecked here
                    // rather than guessing at an overload.
                    return Type::Unknown;
                };
                let name = self.interner.resolve(ident.name).to_string();
                self.check_call_args(&name, &sig.params, &arg_types, sig.return_type, range)
            }
        }
    }

    fn check_call_args(&mut self, name: &str, params: &[Type], args: &[Type], return_type: Type, range: TextRange) -> Type {
        if params.len() != args.len() {
            self.error(range, format!("`{name}` expects {} argument(s), found {}", params.len(), args.len()), DiagnosticRule::ArityMismatch);
            return return_type;
        }
        for (i, (param, arg)) in params.iter().zip(args).enumerate() {
            if *arg == Type::Unknown || *param == Type::Unknown {
                continue;
            }
            if !arg.converts_to(param) {
                self.error(range, format!("argument {} to `{name}` expects `{param}`, found `{arg}`", i + 1), DiagnosticRule::TypeMismatch);
            }
        }
        return_type
    }

    /// Checks a type-constructor call (`vec3<f32>(...)`, `S(...)`) against
    /// its arity, without fully replaying WGSL's per-component constructor
    /// overload rules.
    fn infer_type_constructor(&mut self, ty_expr: &TypeExpr, arg_types: &[Type], range: TextRange) -> Type {
        let target = self.resolve_type_expr(ty_expr);
        match &target {
            Type::Vector { size, .. } => {
                let valid = arg_types.is_empty() || arg_types.len() == 1 || arg_types.len() == usize::from(*size);
                if !valid {
                    self.error(range, format!("invalid argument count constructing `{target}`"), DiagnosticRule::ArityMismatch);
                }
            }
            Type::Struct(id) => {
                let layout = self.structs.get(*id);
                if !arg_types.is_empty() && arg_types.len() != layout.fields.len() {
                    self.error(
                        range,
                        format!("`{target}` has {} field(s), found {} argument(s)", layout.fields.len(), arg_types.len()),
                        DiagnosticRule::ArityMismatch,
                    );
                } else {
                    let fields: Vec<_> = layout.fields.iter().map(|f| (self.interner.resolve(f.name).to_string(), f.ty.clone())).collect();
                    for ((field_name, field_ty), arg) in fields.iter().zip(arg_types) {
                        if *arg != Type::Unknown && !arg.converts_to(field_ty) {
                            self.error(range, format!("field `{field_name}` expects `{field_ty}`, found `{arg}`"), DiagnosticRule::TypeMismatch);
                        }
                    }
                }
            }
            _ => {}
        }
        target
    }

    fn attr_name(&self, attr: &Attribute) -> &str {
        self.interner.resolve(attr.name)
    }

    fn find_attr<'b>(&self, attrs: &'b [Attribute], name: &str) -> Option<&'b Attribute> {
        attrs.iter().find(|a| self.attr_name(a) == name)
    }

    /// Phase 3 + 4: validates every module-scope declaration and function,
    /// returning the entry points found for DCE/reflection.
    fn validate_decls(&mut self, module: &Module) -> Vec<EntryPointInfo> {
        let mut entry_points = Vec::new();
        for decl in &module.decls {
            match decl {
                Decl::Var { attributes, space, access, ty, value, range, symbol, .. } => {
                    self.validate_module_var(attributes, *space, *access, ty.as_ref(), value.as_ref(), *range, *symbol);
                }
                Decl::Const { ty, value, range, .. } => {
                    self.check_initializer(ty.as_ref(), Some(value), *range);
                }
                Decl::Override { ty, value, range, .. } => {
                    if ty.is_none() && value.is_none() {
                        self.error(*range, "override declaration needs a type or an initializer", DiagnosticRule::MissingInitializer);
                    }
                    self.check_initializer(ty.as_ref(), value.as_ref(), *range);
                }
                Decl::Function { attributes, params, return_type, body, range, symbol, .. } => {
                    if let Some(info) = self.validate_function(attributes, params, return_type.as_ref(), body, *range, *symbol) {
                        entry_points.push(info);
                    }
                }
                _ => {}
            }
        }
        entry_points
    }

    fn validate_module_var(
        &mut self,
        attributes: &[Attribute],
        space: Option<AddressSpace>,
        access: Option<AccessMode>,
        ty: Option<&TypeExpr>,
        value: Option<&Expr>,
        range: TextRange,
        symbol: Ref,
    ) {
        if ty.is_none() && value.is_none() {
            self.error(range, "variable declaration needs a type or an initializer", DiagnosticRule::MissingInitializer);
            return;
        }
        let resolved_ty = ty.map(|t| self.resolve_type_expr(t));
        // A texture/sampler var writes no explicit `<space>` at all; it is
        // implicitly `handle`-space and, like uniform/storage, observable
        // to the host via `@group`/`@binding` (spec §4.10).
        let effective_space = space.unwrap_or(AddressSpace::Handle);
        if effective_space.is_external_binding() {
            self.symbols.symbol_mut(symbol).is_external_binding = true;
        }

        if let Some(space) = space {
            match space {
                AddressSpace::Uniform | AddressSpace::Storage => {
                    if self.find_attr(attributes, "group").is_none() || self.find_attr(attributes, "binding").is_none() {
                        self.error(range, "uniform/storage variable requires @group and @binding", DiagnosticRule::MissingBindingAttribute);
                    }
                    if value.is_some() {
                        self.error(range, "uniform/storage variable cannot have an initializer", DiagnosticRule::InvalidExternalInitializer);
                    }
                    if let Some(resolved) = &resolved_ty {
                        if !resolved.is_host_shareable(&self.structs) {
                            self.error(range, "uniform/storage variable type must be host-shareable", DiagnosticRule::TypeMismatch);
                        }
                    }
                }
                AddressSpace::Workgroup => {
                    if let Some(resolved) = &resolved_ty {
                        if !resolved.is_storable(&self.structs) {
                            self.error(range, "workgroup variable type must be storable", DiagnosticRule::TypeMismatch);
                        }
                    }
                }
                AddressSpace::Private | AddressSpace::Function | AddressSpace::Handle => {}
            }
        }

        // Any module-scope var carrying both `@group` and `@binding` is part
        // of the host-visible interface, regardless of its address space:
        // uniform/storage buffers as well as handle-space textures/samplers.
        let group_attr = self.find_attr(attributes, "group");
        let binding_attr = self.find_attr(attributes, "binding");
        if let (Some(group_attr), Some(binding_attr), Some(ty)) = (group_attr, binding_attr, resolved_ty) {
            let group = group_attr.args.first().and_then(|e| fold_const(e, self.interner, &self.const_values)).and_then(ConstValue::as_u64);
            let binding = binding_attr.args.first().and_then(|e| fold_const(e, self.interner, &self.const_values)).and_then(ConstValue::as_u64);
            if let (Some(group), Some(binding)) = (group, binding) {
                self.bindings.push(ExternalBindingInfo {
                    symbol,
                    group: u32::try_from(group).unwrap_or(u32::MAX),
                    binding: u32::try_from(binding).unwrap_or(u32::MAX),
                    space: effective_space,
                    access: access.unwrap_or(AccessMode::Read),
                    ty,
                });
            }
        }
    }

    fn validate_function(
        &mut self,
        attributes: &[Attribute],
        params: &[crate::ast::Param],
        return_type: Option<&TypeExpr>,
        body: &[Stmt],
        range: TextRange,
        symbol: Ref,
    ) -> Option<EntryPointInfo> {
        let stage = if self.find_attr(attributes, "vertex").is_some() {
            Some(ShaderStage::Vertex)
        } else if self.find_attr(attributes, "fragment").is_some() {
            Some(ShaderStage::Fragment)
        } else if self.find_attr(attributes, "compute").is_some() {
            Some(ShaderStage::Compute)
        } else {
            None
        };

        for param in params {
            let ty = self.resolve_type_expr(&param.ty);
            self.locals.insert(param.symbol, ty);
        }

        let mut non_uniform_refs = AHashMap::new();
        for param in params {
            if let Some(builtin_attr) = self.find_attr(&param.attributes, "builtin") {
                if let Some(Expr::Identifier { ident, .. }) = builtin_attr.args.first() {
                    let name = self.interner.resolve(ident.name);
                    if builtins::builtin_io_uniformity(name) == Some(builtins::IoUniformity::NonUniform) {
                        non_uniform_refs.insert(param.symbol, name);
                    }
                }
            }
        }

        let entry_point = stage.map(|stage| {
            if stage == ShaderStage::Compute {
                let workgroup_size = self.find_attr(attributes, "workgroup_size").map_or([1, 1, 1], |attr| self.read_workgroup_size(attr));
                if self.find_attr(attributes, "workgroup_size").is_none() {
                    self.error(range, "compute entry point requires @workgroup_size", DiagnosticRule::InvalidEntryPointSignature);
                }
                EntryPointInfo { symbol, stage, workgroup_size: Some(workgroup_size) }
            } else {
                EntryPointInfo { symbol, stage, workgroup_size: None }
            }
        });

        let resolved_return_type = return_type.map(|t| self.resolve_type_expr(t));
        let has_return = self.validate_stmts(body, false, false, stage, resolved_return_type.as_ref(), range);
        if return_type.is_some() && !has_return {
            self.error(range, "function with a return type must return on every path it can take", DiagnosticRule::MissingReturn);
        }

        let mut checker = UniformityChecker::new(self.interner, self.diagnostics, self.line_index, &non_uniform_refs);
        checker.check_function_body(body);

        if entry_point.is_some() {
            let sym = self.symbols.symbol_mut(symbol);
            sym.is_entry_point = true;
            sym.must_not_be_renamed = true;
        }

        entry_point
    }

    fn read_workgroup_size(&mut self, attr: &Attribute) -> [u32; 3] {
        let mut sizes = [1u32, 1, 1];
        for (i, arg) in attr.args.iter().take(3).enumerate() {
            if let Some(v) = fold_const(arg, self.interner, &self.const_values).and_then(ConstValue::as_u64) {
                sizes[i] = u32::try_from(v).unwrap_or(1);
            }
        }
        sizes
    }

    /// Validates one statement list, tracking `in_loop`/`in_switch` to flag
    /// misplaced `break`/`continue`/`discard`. Returns whether the list is
    /// guaranteed to return on every path (used for the function-level
    /// missing-return check) — a conservative approximation: only a
    /// trailing bare `return` or an `if`/`else` where both arms return
    /// counts, matching what a straightforward control-flow walk can prove
    /// without full reachability analysis.
    fn validate_stmts(&mut self, stmts: &[Stmt], in_loop: bool, in_switch: bool, stage: Option<ShaderStage>, return_type: Option<&Type>, fn_range: TextRange) -> bool {
        let mut returns = false;
        for stmt in stmts {
            returns = self.validate_stmt(stmt, in_loop, in_switch, stage, return_type, fn_range) || returns;
        }
        returns
    }

    fn validate_stmt(&mut self, stmt: &Stmt, in_loop: bool, in_switch: bool, stage: Option<ShaderStage>, return_type: Option<&Type>, fn_range: TextRange) -> bool {
        match stmt {
            Stmt::Compound { body, .. } => self.validate_stmts(body, in_loop, in_switch, stage, return_type, fn_range),
            Stmt::Return { value, range } => {
                let value_ty = value.as_ref().map(|v| self.infer_expr(v));
                match (return_type, &value_ty) {
                    (Some(declared), Some(value_ty)) if *value_ty != Type::Unknown && *declared != Type::Unknown && !value_ty.converts_to(declared) => {
                        self.error(*range, format!("return value of type `{value_ty}` does not convert to declared return type `{declared}`"), DiagnosticRule::TypeMismatch);
                    }
                    (Some(_), None) => {
                        self.error(*range, "function with a return type must return a value", DiagnosticRule::TypeMismatch);
                    }
                    (None, Some(_)) => {
                        self.error(*range, "function with no return type cannot return a value", DiagnosticRule::TypeMismatch);
                    }
                    _ => {}
                }
                true
            }
            Stmt::If { then_branch, else_branch, .. } => {
                let then_returns = self.validate_stmt(then_branch, in_loop, in_switch, stage, return_type, fn_range);
                let else_returns = else_branch.as_ref().is_some_and(|e| self.validate_stmt(e, in_loop, in_switch, stage, return_type, fn_range));
                then_returns && else_returns
            }
            Stmt::Switch { cases, .. } => {
                let has_default = cases.iter().any(|c| c.is_default);
                let all_return = has_default && cases.iter().all(|c| self.validate_stmts(&c.body, in_loop, true, stage, return_type, fn_range));
                all_return
            }
            Stmt::For { body, .. } => {
                self.validate_stmt(body, true, in_switch, stage, return_type, fn_range);
                false
            }
            Stmt::While { body, .. } => {
                self.validate_stmt(body, true, in_switch, stage, return_type, fn_range);
                false
            }
            Stmt::Loop { body, continuing, .. } => {
                let returns = self.validate_stmts(body, true, in_switch, stage, return_type, fn_range);
                if let Some(continuing) = continuing {
                    self.validate_stmts(continuing, true, in_switch, stage, return_type, fn_range);
                }
                returns
            }
            Stmt::Break { range } => {
                if !in_loop && !in_switch {
                    self.error(*range, "break outside a loop or switch", DiagnosticRule::BreakOutsideLoop);
                }
                false
            }
            Stmt::BreakIf { range, .. } => {
                if !in_loop {
                    self.error(*range, "break-if outside a loop", DiagnosticRule::BreakOutsideLoop);
                }
                false
            }
            Stmt::Continue { range } => {
                if !in_loop {
                    self.error(*range, "continue outside a loop", DiagnosticRule::ContinueOutsideLoop);
                }
                false
            }
            Stmt::Discard { range } => {
                if stage != Some(ShaderStage::Fragment) {
                    self.error(*range, "discard used outside a fragment shader", DiagnosticRule::DiscardOutsideFragment);
                }
                false
            }
            Stmt::Assign { target, value, .. } => {
                let target_ty = self.infer_expr(target);
                let value_ty = self.infer_expr(value);
                if target_ty != Type::Unknown && value_ty != Type::Unknown && !value_ty.converts_to(&target_ty) {
                    self.error(stmt.range(), format!("cannot assign `{value_ty}` to `{target_ty}`"), DiagnosticRule::TypeMismatch);
                }
                false
            }
            Stmt::IncrDecr { target, .. } => {
                self.infer_expr(target);
                false
            }
            Stmt::Call { call, .. } => {
                self.infer_expr(call);
                false
            }
            Stmt::Decl { decl, .. } => {
                self.validate_local_decl(decl);
                false
            }
        }
    }

    /// Validates a `const`/`let`/`var` declared inside a function body: the
    /// initializer (if any) must convert to the declared type, and a `const`
    /// or `let` must have one (spec §4.5 phase 3/4). Either way records the
    /// declared symbol's resolved type so later references within the same
    /// function type-check against it.
    fn validate_local_decl(&mut self, decl: &Decl) {
        match decl {
            Decl::Const { symbol, ty, value, range, .. } | Decl::Let { symbol, ty, value, range, .. } => {
                let resolved = self.check_initializer(ty.as_ref(), Some(value), *range);
                self.locals.insert(*symbol, resolved);
            }
            Decl::Var { symbol, ty, value, range, .. } => {
                if ty.is_none() && value.is_none() {
                    self.error(*range, "variable declaration needs a type or an initializer", DiagnosticRule::MissingInitializer);
                }
                let resolved = self.check_initializer(ty.as_ref(), value.as_ref(), *range);
                self.locals.insert(*symbol, resolved);
            }
            _ => {}
        }
    }

    /// Infers `value`'s type (if present) and, when `declared` names a
    /// type, reports a mismatch if the initializer can't implicitly convert
    /// to it. Returns the symbol's resulting type: the declared type when
    /// given, else the initializer's inferred type, else `Unknown`.
    fn check_initializer(&mut self, declared: Option<&TypeExpr>, value: Option<&Expr>, range: TextRange) -> Type {
        let value_ty = value.map(|v| self.infer_expr(v));
        let resolved = declared.map(|t| self.resolve_type_expr(t));
        match (&resolved, &value_ty) {
            (Some(declared_ty), Some(value_ty)) => {
                if *value_ty != Type::Unknown && *declared_ty != Type::Unknown && !value_ty.converts_to(declared_ty) {
                    self.error(range, format!("initializer of type `{value_ty}` does not convert to declared type `{declared_ty}`"), DiagnosticRule::TypeMismatch);
                }
                declared_ty.clone()
            }
            (Some(declared_ty), None) => declared_ty.clone(),
            (None, Some(value_ty)) => value_ty.clone(),
            (None, None) => Type::Unknown,
        }
    }
}

/// Length of a vector swizzle such as `xyz` or `rgba`, or `None` if `name`
/// isn't a valid swizzle of a vector with `size` components: empty, longer
/// than 4 letters, mixing the `xyzw` and `rgba` namespaces, or naming a
/// component past `size` are all rejected.
fn swizzle_len(name: &str, size: u8) -> Option<u8> {
    if name.is_empty() || name.len() > 4 {
        return None;
    }
    let index = |c: char| match c {
        'x' | 'r' => Some(0u8),
        'y' | 'g' => Some(1u8),
        'z' | 'b' => Some(2u8),
        'w' | 'a' => Some(3u8),
        _ => None,
    };
    let mut namespace = None;
    for c in name.chars() {
        let pos = index(c)?;
        if pos >= size {
            return None;
        }
        let this_namespace = matches!(c, 'r' | 'g' | 'b' | 'a');
        match namespace {
            None => namespace = Some(this_namespace),
            Some(ns) if ns != this_namespace => return None,
            _ => {}
        }
    }
    Some(name.len() as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    #[test]
    fn missing_return_is_reported() {
        let mut unit = parse("fn f() -> i32 { let x = 1; }");
        let result = validate(&unit.module, &mut unit.symbols, &unit.interner, &mut unit.diagnostics, &LineIndex::new(""));
        assert!(unit.diagnostics.has_errors());
        drop(result);
    }

    #[test]
    fn uniform_storage_var_without_bindings_is_reported() {
        let mut unit = parse("var<storage, read> data: array<f32>;");
        let line_index = LineIndex::new("var<storage, read> data: array<f32>;");
        let _ = validate(&unit.module, &mut unit.symbols, &unit.interner, &mut unit.diagnostics, &line_index);
        assert!(unit.diagnostics.has_errors());
    }

    #[test]
    fn struct_layout_pads_vec3_field() {
        let source = "struct S { a: f32, b: vec3<f32> }";
        let mut unit = parse(source);
        let line_index = LineIndex::new(source);
        let result = validate(&unit.module, &mut unit.symbols, &unit.interner, &mut unit.diagnostics, &line_index);
        assert_eq!(result.structs.len(), 1);
        let layout = result.structs.get(result.struct_ids.values().next().copied().unwrap());
        assert_eq!(layout.size, 32);
    }

    #[test]
    fn break_outside_loop_is_reported() {
        let mut unit = parse("fn f() { break; }");
        let line_index = LineIndex::new("fn f() { break; }");
        let _ = validate(&unit.module, &mut unit.symbols, &unit.interner, &mut unit.diagnostics, &line_index);
        assert!(unit.diagnostics.has_errors());
    }

    #[test]
    fn assigning_a_vector_to_a_scalar_local_is_a_type_mismatch() {
        let source = "fn f() { var x: f32 = 1.0; x = vec3<f32>(1.0, 2.0, 3.0); }";
        let mut unit = parse(source);
        let line_index = LineIndex::new(source);
        let _ = validate(&unit.module, &mut unit.symbols, &unit.interner, &mut unit.diagnostics, &line_index);
        assert!(unit.diagnostics.as_slice().iter().any(|d| d.rule == Some(DiagnosticRule::TypeMismatch)));
    }

    #[test]
    fn discard_outside_fragment_is_reported() {
        let source = "fn f() { discard; }";
        let mut unit = parse(source);
        let line_index = LineIndex::new(source);
        let _ = validate(&unit.module, &mut unit.symbols, &unit.interner, &mut unit.diagnostics, &line_index);
        assert!(unit.diagnostics.as_slice().iter().any(|d| d.rule == Some(DiagnosticRule::DiscardOutsideFragment)));
    }

    #[test]
    fn discard_inside_fragment_is_fine() {
        let source = "@fragment fn f() -> @location(0) vec4f { discard; return vec4f(0.0); }";
        let mut unit = parse(source);
        let line_index = LineIndex::new(source);
        let _ = validate(&unit.module, &mut unit.symbols, &unit.interner, &mut unit.diagnostics, &line_index);
        assert!(!unit.diagnostics.as_slice().iter().any(|d| d.rule == Some(DiagnosticRule::DiscardOutsideFragment)));
    }

    #[test]
    fn override_with_neither_type_nor_initializer_is_reported() {
        let source = "override x;";
        let mut unit = parse(source);
        let line_index = LineIndex::new(source);
        let _ = validate(&unit.module, &mut unit.symbols, &unit.interner, &mut unit.diagnostics, &line_index);
        assert!(unit.diagnostics.as_slice().iter().any(|d| d.rule == Some(DiagnosticRule::MissingInitializer)));
    }

    #[test]
    fn const_initializer_mismatched_with_declared_type_is_reported() {
        let source = "const x: f32 = vec3<f32>(1.0, 2.0, 3.0);";
        let mut unit = parse(source);
        let line_index = LineIndex::new(source);
        let _ = validate(&unit.module, &mut unit.symbols, &unit.interner, &mut unit.diagnostics, &line_index);
        assert!(unit.diagnostics.as_slice().iter().any(|d| d.rule == Some(DiagnosticRule::TypeMismatch)));
    }

    #[test]
    fn vector_swizzle_narrows_to_its_length() {
        let source = "fn f() -> f32 { let v = vec3<f32>(1.0, 2.0, 3.0); return v.x; }";
        let mut unit = parse(source);
        let line_index = LineIndex::new(source);
        let _ = validate(&unit.module, &mut unit.symbols, &unit.interner, &mut unit.diagnostics, &line_index);
        assert!(!unit.diagnostics.has_errors(), "{:?}", unit.diagnostics.as_slice());
    }

    #[test]
    fn invalid_swizzle_component_is_reported() {
        let source = "fn f() { let v = vec3<f32>(1.0, 2.0, 3.0); let s = v.w; }";
        let mut unit = parse(source);
        let line_index = LineIndex::new(source);
        let _ = validate(&unit.module, &mut unit.symbols, &unit.interner, &mut unit.diagnostics, &line_index);
        assert!(unit.diagnostics.as_slice().iter().any(|d| d.rule == Some(DiagnosticRule::TypeMismatch)));
    }
}
