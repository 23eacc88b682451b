//! Token-level printer: walks the (possibly DCE'd and renamed) AST back into
//! WGSL text, either minified or pretty-printed for diagnostics (spec §4.8).
//!
//! Grounded on the teacher's `io.rs` writer abstraction (`PrintWriter`,
//! `StdPrint`, `CollectStringPrint`) for a pluggable output sink — here
//! specialized to the single sink the facade needs, a `String` buffer with
//! an optional attached [`SourceMapBuilder`].
//!
//! Parenthesization never needs a precedence table: the parser is a
//! precedence-climbing recursive descent, so the only way a lower-precedence
//! operator node can sit inside a higher-precedence one is through an
//! explicit `Expr::Paren` the parser built from source parens. Printing the
//! tree structurally, with literal `Paren` nodes emitting their own `(` `)`,
//! round-trips without re-deriving precedence here.

use ahash::{AHashMap, AHashSet};

use crate::ast::{AssignOp, Attribute, BinOp, Callee, Decl, Expr, IdentNode, IncrDecrOp, Literal, Module, Param, Stmt, SwitchCase, TypeExpr, UnaryOp};
use crate::intern::{Interner, StringId};
use crate::scope::{Ref, SymbolTable};
use crate::sourcemap::SourceMapBuilder;
use crate::span::{LineIndex, TextRange};
use crate::types::{TextureDim, TextureKind};

/// Caller-facing knobs for printing (spec §6, the `minify_*` subset).
#[derive(Debug, Clone)]
pub struct PrintOptions {
    pub minify_whitespace: bool,
    pub minify_syntax: bool,
    pub mangle_external_bindings: bool,
}

impl Default for PrintOptions {
    fn default() -> Self {
        Self { minify_whitespace: true, minify_syntax: true, mangle_external_bindings: false }
    }
}

/// Prints `module` to WGSL text. `source`/`line_index` are the original
/// source the AST was parsed from, needed to look up source positions for
/// the optional source map. Pass `minify_whitespace: false` in `options` for
/// the pretty-print mode used by diagnostics and snapshot tests.
#[must_use]
pub fn print(module: &Module, symbols: &SymbolTable, interner: &Interner, source: &str, line_index: &LineIndex, options: &PrintOptions, source_map: Option<&mut SourceMapBuilder>) -> String {
    let member_renames = build_member_rename_map(module, symbols);
    let mut printer = Printer {
        symbols,
        interner,
        source,
        line_index,
        options,
        source_map,
        member_renames,
        out: String::new(),
        last_char: None,
        gen_line: 0,
        gen_col: 0,
        indent: 0,
        aliases: AHashMap::new(),
        pending_aliases: Vec::new(),
    };
    printer.module(module);
    printer.out
}

/// For every field name shared by more than one struct, only rewrite it at
/// use sites if every struct that declares it agrees on the renamed form
/// (or agrees it isn't renamed). `Expr::Member` carries a bare field name,
/// not a resolved `Ref`, so there's no way to know which struct a given
/// `.field` belongs to without a type inference pass this crate doesn't
/// have; this is the bounded-safe approximation documented in DESIGN.md.
fn build_member_rename_map(module: &Module, symbols: &SymbolTable) -> AHashMap<StringId, Option<StringId>> {
    let mut map: AHashMap<StringId, Option<StringId>> = AHashMap::new();
    let mut seen: AHashSet<StringId> = AHashSet::new();
    for decl in &module.decls {
        let Decl::Struct { members, .. } = decl else { continue };
        for member in members {
            let sym = symbols.symbol(member.symbol);
            if seen.insert(sym.original_name) {
                map.insert(sym.original_name, sym.renamed);
            } else if map.get(&sym.original_name).copied().flatten() != sym.renamed {
                map.insert(sym.original_name, None);
            }
        }
    }
    map
}

struct Printer<'a> {
    symbols: &'a SymbolTable,
    interner: &'a Interner,
    source: &'a str,
    line_index: &'a LineIndex,
    options: &'a PrintOptions,
    source_map: Option<&'a mut SourceMapBuilder>,
    member_renames: AHashMap<StringId, Option<StringId>>,
    out: String,
    last_char: Option<char>,
    gen_line: u32,
    gen_col: u32,
    indent: u32,
    /// Function-local substitutions installed by `choose_aliases`, cleared
    /// after each function body.
    aliases: AHashMap<Ref, String>,
    pending_aliases: Vec<(String, String)>,
}

impl Printer<'_> {
    fn push_raw(&mut self, text: &str) {
        for ch in text.chars() {
            if ch == '\n' {
                self.gen_line += 1;
                self.gen_col = 0;
            } else {
                self.gen_col += 1;
            }
            self.last_char = Some(ch);
        }
        self.out.push_str(text);
    }

    fn separate_if_needed(&mut self, next_first: char) {
        if let Some(prev) = self.last_char {
            if needs_separator(prev, next_first) {
                self.push_raw(" ");
            }
        }
    }

    /// Emits a token with no source-map entry (operators, punctuation,
    /// keywords).
    fn token(&mut self, text: &str) {
        if let Some(c) = text.chars().next() {
            self.separate_if_needed(c);
        }
        self.push_raw(text);
    }

    /// Emits an identifier-like token and, if a source map is attached,
    /// records a mapping at `src_range`'s start byte. `original_name` is
    /// included in the map's names table whenever it differs from `text`.
    fn emit_mapped(&mut self, text: &str, src_range: TextRange, original_name: Option<&str>) {
        if let Some(c) = text.chars().next() {
            self.separate_if_needed(c);
        }
        let gen_line = self.gen_line;
        let gen_col = self.gen_col;
        self.push_raw(text);
        if let Some(sm) = self.source_map.as_mut() {
            let lc = self.line_index.line_col_utf16(self.source, src_range.start());
            sm.add_mapping(gen_line, gen_col, lc.line, lc.column, original_name);
        }
    }

    fn nl(&mut self) {
        if !self.options.minify_whitespace {
            self.push_raw("\n");
            for _ in 0..self.indent * 2 {
                self.push_raw(" ");
            }
        }
    }

    fn resolve(&self, id: StringId) -> &str {
        self.interner.resolve(id)
    }

    /// Declaration-site identifier: never consults function-local aliases,
    /// since those only redirect reads of an unrenamed external binding.
    fn decl_ident(&mut self, r: Ref) {
        let sym = self.symbols.symbol(r);
        let original = self.resolve(sym.original_name).to_string();
        let emitted = sym.renamed.map_or_else(|| original.clone(), |id| self.resolve(id).to_string());
        let range = TextRange::empty(sym.declared_at);
        let name = if emitted == original { None } else { Some(original.as_str()) };
        self.emit_mapped(&emitted, range, name);
    }

    /// Reference-site identifier (expression/type use of a symbol).
    fn ref_ident(&mut self, r: Ref, range: TextRange) {
        let sym = self.symbols.symbol(r);
        let original = self.resolve(sym.original_name).to_string();
        let emitted = if let Some(alias) = self.aliases.get(&r) {
            alias.clone()
        } else {
            sym.renamed.map_or_else(|| original.clone(), |id| self.resolve(id).to_string())
        };
        let name = if emitted == original { None } else { Some(original.as_str()) };
        self.emit_mapped(&emitted, range, name);
    }

    fn ident_expr(&mut self, ident: &IdentNode) {
        if let Some(r) = ident.ref_ {
            self.ref_ident(r, ident.range);
        } else {
            let text = self.resolve(ident.name).to_string();
            self.emit_mapped(&text, ident.range, None);
        }
    }

    fn attrs(&mut self, attrs: &[Attribute]) {
        for attr in attrs {
            self.token("@");
            let name = self.resolve(attr.name).to_string();
            self.token(&name);
            if !attr.args.is_empty() {
                self.token("(");
                for (i, arg) in attr.args.iter().enumerate() {
                    if i > 0 {
                        self.token(",");
                    }
                    self.expr(arg);
                }
                self.token(")");
            }
        }
    }

    fn type_expr(&mut self, ty: &TypeExpr) {
        match ty {
            TypeExpr::Named(ident) => self.ident_expr(ident),
            TypeExpr::Vector { size, elem, .. } => {
                self.token(vector_name(*size));
                self.token("<");
                self.type_expr(elem);
                self.token(">");
            }
            TypeExpr::Matrix { cols, rows, elem, .. } => {
                self.token(&format!("mat{cols}x{rows}"));
                self.token("<");
                self.type_expr(elem);
                self.token(">");
            }
            TypeExpr::Array { elem, size, .. } => {
                self.token("array");
                self.token("<");
                self.type_expr(elem);
                if let Some(size) = size {
                    self.token(",");
                    self.expr(size);
                }
                self.token(">");
            }
            TypeExpr::Pointer { space, elem, access, .. } => {
                self.token("ptr");
                self.token("<");
                self.token(space.name());
                self.token(",");
                self.type_expr(elem);
                if let Some(access) = access {
                    self.token(",");
                    self.token(access.name());
                }
                self.token(">");
            }
            TypeExpr::Atomic { elem, .. } => {
                self.token("atomic");
                self.token("<");
                self.type_expr(elem);
                self.token(">");
            }
            TypeExpr::Texture { kind, dim, sampled, format, access, .. } => {
                self.token(texture_type_name(*kind, *dim));
                match kind {
                    TextureKind::Sampled | TextureKind::Multisampled => {
                        if let Some(sampled) = sampled {
                            self.token("<");
                            self.type_expr(sampled);
                            self.token(">");
                        }
                    }
                    TextureKind::Storage => {
                        self.token("<");
                        if let Some(format) = format {
                            self.token(texel_format_name(*format));
                        }
                        if let Some(access) = access {
                            self.token(",");
                            self.token(access.name());
                        }
                        self.token(">");
                    }
                    TextureKind::Depth | TextureKind::External => {}
                }
            }
            TypeExpr::Sampler { comparison, .. } => {
                self.token(if *comparison { "sampler_comparison" } else { "sampler" });
            }
        }
    }

    fn literal(&mut self, value: &Literal) {
        match value {
            Literal::Bool(b) => self.token(if *b { "true" } else { "false" }),
            Literal::Int { text, .. } | Literal::Float { text, .. } => {
                let raw = self.resolve(*text).to_string();
                self.emit_number(&raw);
            }
        }
    }

    fn emit_number(&mut self, raw: &str) {
        if !self.options.minify_syntax {
            self.token(raw);
            return;
        }
        let (body, suffix) = split_numeric(raw);
        let mut body = body.to_string();
        if let Some(rest) = body.strip_prefix("0.") {
            if !rest.is_empty() && !self.last_char.is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '.') {
                body = format!(".{rest}");
            }
        }
        // Safe unconditionally: a literal is never directly followed by
        // another literal or a bare `.` token without an intervening
        // operator/punctuation in valid WGSL.
        if body.ends_with(".0") {
            body.truncate(body.len() - 1);
        }
        self.token(&format!("{body}{suffix}"));
    }

    fn expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Literal { value, .. } => self.literal(value),
            Expr::Identifier { ident, .. } => self.ident_expr(ident),
            Expr::Binary { op, left, right, .. } => {
                self.expr(left);
                self.token(bin_op_symbol(*op));
                self.expr(right);
            }
            Expr::Unary { op, operand, .. } => {
                self.token(unary_op_symbol(*op));
                self.expr(operand);
            }
            Expr::Call { callee, args, .. } => {
                match callee {
                    Callee::Name(ident) => self.ident_expr(ident),
                    Callee::Type(ty) => self.type_expr(ty),
                }
                self.token("(");
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        self.token(",");
                    }
                    self.expr(arg);
                }
                self.token(")");
            }
            Expr::Index { base, index, .. } => {
                self.expr(base);
                self.token("[");
                self.expr(index);
                self.token("]");
            }
            Expr::Member { base, member, .. } => {
                self.expr(base);
                self.token(".");
                let id = self.member_renames.get(member).copied().flatten().unwrap_or(*member);
                let text = self.resolve(id).to_string();
                self.token(&text);
            }
            Expr::Paren { inner, .. } => {
                self.token("(");
                self.expr(inner);
                self.token(")");
            }
        }
    }

    fn simple_stmt(&mut self, stmt: &Stmt, with_semi: bool) {
        match stmt {
            Stmt::Assign { op, target, value, .. } => {
                self.expr(target);
                match op {
                    AssignOp::Simple => self.token("="),
                    AssignOp::Compound(b) => self.token(compound_assign_symbol(*b)),
                }
                self.expr(value);
            }
            Stmt::IncrDecr { op, target, .. } => {
                self.expr(target);
                self.token(match op {
                    IncrDecrOp::Increment => "++",
                    IncrDecrOp::Decrement => "--",
                });
            }
            Stmt::Call { call, .. } => self.expr(call),
            Stmt::Decl { decl, .. } => self.value_decl(decl),
            _ => unreachable!("for-loop clause is always assign/incr-decr/call/decl"),
        }
        if with_semi {
            self.token(";");
        }
    }

    /// `const`/`let`/`var`/`const_assert`, without the trailing `;` (the
    /// caller adds it — shared between module-level and statement-level
    /// printing).
    fn value_decl(&mut self, decl: &Decl) {
        match decl {
            Decl::Const { symbol, ty, value, .. } => {
                self.token("const");
                self.decl_ident(*symbol);
                if let Some(ty) = ty {
                    self.token(":");
                    self.type_expr(ty);
                }
                self.token("=");
                self.expr(value);
            }
            Decl::Let { symbol, ty, value, .. } => {
                self.token("let");
                self.decl_ident(*symbol);
                if let Some(ty) = ty {
                    self.token(":");
                    self.type_expr(ty);
                }
                self.token("=");
                self.expr(value);
            }
            Decl::Override { attributes, symbol, ty, value, .. } => {
                self.attrs(attributes);
                self.token("override");
                self.decl_ident(*symbol);
                if let Some(ty) = ty {
                    self.token(":");
                    self.type_expr(ty);
                }
                if let Some(value) = value {
                    self.token("=");
                    self.expr(value);
                }
            }
            Decl::Var { attributes, space, access, symbol, ty, value, .. } => {
                self.attrs(attributes);
                self.token("var");
                if space.is_some() || access.is_some() {
                    self.token("<");
                    if let Some(space) = space {
                        self.token(space.name());
                    }
                    if let Some(access) = access {
                        self.token(",");
                        self.token(access.name());
                    }
                    self.token(">");
                }
                self.decl_ident(*symbol);
                if let Some(ty) = ty {
                    self.token(":");
                    self.type_expr(ty);
                }
                if let Some(value) = value {
                    self.token("=");
                    self.expr(value);
                }
            }
            Decl::Alias { symbol, ty, .. } => {
                self.token("alias");
                self.decl_ident(*symbol);
                self.token("=");
                self.type_expr(ty);
            }
            Decl::ConstAssert { condition, .. } => {
                self.token("const_assert");
                self.expr(condition);
            }
            Decl::Function { .. } | Decl::Struct { .. } => unreachable!("printed through their own methods"),
        }
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Compound { body, .. } => self.compound(body),
            Stmt::Return { value, .. } => {
                self.token("return");
                if let Some(value) = value {
                    self.expr(value);
                }
                self.token(";");
            }
            Stmt::If { condition, then_branch, else_branch, .. } => {
                self.token("if");
                self.expr(condition);
                self.stmt(then_branch);
                if let Some(else_branch) = else_branch {
                    self.token("else");
                    self.stmt(else_branch);
                }
            }
            Stmt::Switch { scrutinee, cases, .. } => self.switch(scrutinee, cases),
            Stmt::For { init, condition, update, body, .. } => {
                self.token("for");
                self.token("(");
                match init {
                    Some(init) => self.simple_stmt(init, true),
                    None => self.token(";"),
                }
                if let Some(condition) = condition {
                    self.expr(condition);
                }
                self.token(";");
                if let Some(update) = update {
                    self.simple_stmt(update, false);
                }
                self.token(")");
                self.stmt(body);
            }
            Stmt::While { condition, body, .. } => {
                self.token("while");
                self.expr(condition);
                self.stmt(body);
            }
            Stmt::Loop { body, continuing, .. } => self.loop_stmt(body, continuing.as_deref()),
            Stmt::Break { .. } => {
                self.token("break");
                self.token(";");
            }
            Stmt::BreakIf { condition, .. } => {
                self.token("break");
                self.token("if");
                self.expr(condition);
                self.token(";");
            }
            Stmt::Continue { .. } => {
                self.token("continue");
                self.token(";");
            }
            Stmt::Discard { .. } => {
                self.token("discard");
                self.token(";");
            }
            Stmt::Assign { .. } | Stmt::IncrDecr { .. } | Stmt::Call { .. } | Stmt::Decl { .. } => self.simple_stmt(stmt, true),
        }
    }

    fn switch(&mut self, scrutinee: &Expr, cases: &[SwitchCase]) {
        self.token("switch");
        self.expr(scrutinee);
        self.token("{");
        self.indent += 1;
        for case in cases {
            self.nl();
            if case.selectors.is_empty() {
                self.token("default");
            } else {
                self.token("case");
                for (i, selector) in case.selectors.iter().enumerate() {
                    if i > 0 {
                        self.token(",");
                    }
                    self.expr(selector);
                }
                if case.is_default {
                    self.token(",");
                    self.token("default");
                }
            }
            self.token(":");
            self.block(&case.body);
        }
        self.indent -= 1;
        self.nl();
        self.token("}");
    }

    fn loop_stmt(&mut self, body: &[Stmt], continuing: Option<&[Stmt]>) {
        self.token("loop");
        self.token("{");
        self.indent += 1;
        for stmt in body {
            self.nl();
            self.stmt(stmt);
        }
        if let Some(continuing) = continuing {
            self.nl();
            self.token("continuing");
            self.block(continuing);
        }
        self.indent -= 1;
        self.nl();
        self.token("}");
    }

    fn block(&mut self, body: &[Stmt]) {
        self.token("{");
        self.indent += 1;
        for stmt in body {
            self.nl();
            self.stmt(stmt);
        }
        self.indent -= 1;
        self.nl();
        self.token("}");
    }

    fn compound(&mut self, body: &[Stmt]) {
        self.block(body);
    }

    fn function_decl(&mut self, decl: &Decl) {
        let Decl::Function { attributes, symbol, params, return_attributes, return_type, body, .. } = decl else { unreachable!() };
        self.attrs(attributes);
        self.token("fn");
        self.decl_ident(*symbol);
        self.token("(");
        for (i, param) in params.iter().enumerate() {
            if i > 0 {
                self.token(",");
            }
            self.attrs(&param.attributes);
            self.decl_ident(param.symbol);
            self.token(":");
            self.type_expr(&param.ty);
        }
        self.token(")");
        if let Some(return_type) = return_type {
            self.token("->");
            self.attrs(return_attributes);
            self.type_expr(return_type);
        }
        self.function_body(params, body);
    }

    fn function_body(&mut self, params: &[Param], body: &[Stmt]) {
        self.choose_aliases(params, body);
        self.token("{");
        self.indent += 1;
        for (alias, original) in std::mem::take(&mut self.pending_aliases) {
            self.nl();
            self.token("let");
            self.token(&alias);
            self.token("=");
            self.token(&original);
            self.token(";");
        }
        for stmt in body {
            self.nl();
            self.stmt(stmt);
        }
        self.indent -= 1;
        self.nl();
        self.token("}");
        self.aliases.clear();
    }

    fn struct_decl(&mut self, decl: &Decl) {
        let Decl::Struct { symbol, members, .. } = decl else { unreachable!() };
        self.token("struct");
        self.decl_ident(*symbol);
        self.token("{");
        self.indent += 1;
        for (i, member) in members.iter().enumerate() {
            self.nl();
            self.attrs(&member.attributes);
            self.decl_ident(member.symbol);
            self.token(":");
            self.type_expr(&member.ty);
            if i + 1 < members.len() || !self.options.minify_whitespace {
                self.token(",");
            }
        }
        self.indent -= 1;
        self.nl();
        self.token("}");
    }

    fn top_level_decl(&mut self, decl: &Decl) {
        match decl {
            Decl::Function { .. } => self.function_decl(decl),
            Decl::Struct { .. } => self.struct_decl(decl),
            _ => {
                self.value_decl(decl);
                self.token(";");
            }
        }
    }

    fn module(&mut self, module: &Module) {
        for decl in &module.decls {
            if let Some(symbol) = decl.symbol() {
                if !self.symbols.symbol(symbol).is_live {
                    continue;
                }
            }
            self.top_level_decl(decl);
            self.nl();
        }
    }

    /// Per spec §4.8: a helper `let` binding is only worth synthesizing when
    /// the bytes it costs (its own declaration) are repaid by the bytes it
    /// saves across every read it replaces in this function. Collision
    /// checking is simplified to module-scope names plus this function's
    /// own parameters and earlier aliases — it does not walk into nested
    /// block scopes, a known simplification (DESIGN.md).
    fn choose_aliases(&mut self, params: &[Param], body: &[Stmt]) {
        if self.options.mangle_external_bindings {
            return;
        }
        let counts = count_refs(body);
        let mut candidates: Vec<(Ref, u32)> = counts
            .into_iter()
            .filter(|(r, _)| {
                let sym = self.symbols.symbol(*r);
                sym.is_external_binding && sym.renamed.is_none()
            })
            .collect();
        if candidates.is_empty() {
            return;
        }
        candidates.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

        let mut taken: AHashSet<String> = self.module_level_names();
        for param in params {
            taken.insert(self.name_for(param.symbol));
        }

        for (r, count) in candidates {
            let original = self.resolve(self.symbols.symbol(r).original_name).to_string();
            let mut counter = 0u64;
            let alias = loop {
                let candidate = crate::rename::short_name(counter);
                counter += 1;
                if crate::rename::is_reserved(&candidate) || taken.contains(&candidate) {
                    continue;
                }
                break candidate;
            };
            let savings = (original.len() as i64 - alias.len() as i64) * i64::from(count);
            let cost = ("let ".len() + alias.len() + " = ".len() + original.len() + ";\n".len()) as i64;
            if savings > cost {
                taken.insert(alias.clone());
                self.pending_aliases.push((alias.clone(), original));
                self.aliases.insert(r, alias);
            }
        }
    }

    fn name_for(&self, r: Ref) -> String {
        let sym = self.symbols.symbol(r);
        sym.renamed.map_or_else(|| self.resolve(sym.original_name).to_string(), |id| self.resolve(id).to_string())
    }

    fn module_level_names(&self) -> AHashSet<String> {
        // Not threaded through `module()`'s own `&Module` to keep this a
        // method on `self`; callers only ever invoke it mid-function-print,
        // by which point the module's symbols are already fully populated.
        self.symbols.symbols().iter().filter(|s| !s.is_external_binding).map(|s| s.renamed.map_or_else(|| self.resolve(s.original_name).to_string(), |id| self.resolve(id).to_string())).collect()
    }
}

fn needs_separator(prev: char, next: char) -> bool {
    let word = |c: char| c.is_alphanumeric() || c == '_';
    if word(prev) && word(next) {
        return true;
    }
    if prev == '.' && (next.is_ascii_digit() || next == '.') {
        return true;
    }
    matches!((prev, next), ('-', '-') | ('+', '+') | ('<', '<') | ('>', '>') | ('<', '=') | ('>', '=') | ('=', '=') | ('!', '=') | ('&', '&') | ('|', '|') | ('/', '/') | ('/', '*'))
}

/// Splits a literal's raw text (as the lexer produced it, suffix included)
/// into its numeric body and its 0-or-1-character suffix, mirroring
/// `Lexer::lex_number`'s own scanning order exactly.
fn split_numeric(raw: &str) -> (&str, &str) {
    let bytes = raw.as_bytes();
    let mut i = 0;
    let is_hex = bytes.len() >= 2 && bytes[0] == b'0' && (bytes[1] == b'x' || bytes[1] == b'X');
    if is_hex {
        i = 2;
        while i < bytes.len() && bytes[i].is_ascii_hexdigit() {
            i += 1;
        }
        if i < bytes.len() && bytes[i] == b'.' {
            i += 1;
            while i < bytes.len() && bytes[i].is_ascii_hexdigit() {
                i += 1;
            }
        }
        if i < bytes.len() && matches!(bytes[i], b'p' | b'P') {
            i += 1;
            if i < bytes.len() && matches!(bytes[i], b'+' | b'-') {
                i += 1;
            }
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
        }
    } else {
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if i < bytes.len() && bytes[i] == b'.' {
            i += 1;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
        }
        if i < bytes.len() && matches!(bytes[i], b'e' | b'E') {
            i += 1;
            if i < bytes.len() && matches!(bytes[i], b'+' | b'-') {
                i += 1;
            }
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
        }
    }
    (&raw[..i], &raw[i..])
}

fn vector_name(size: u8) -> &'static str {
    match size {
        2 => "vec2",
        3 => "vec3",
        _ => "vec4",
    }
}

pub(crate) fn texture_type_name(kind: TextureKind, dim: TextureDim) -> &'static str {
    use TextureDim::{Cube, CubeArray, D1, D2, D2Array, D3};
    use TextureKind::{Depth, External, Multisampled, Sampled, Storage};
    match (kind, dim) {
        (External, _) => "texture_external",
        (Depth, D2) => "texture_depth_2d",
        (Depth, D2Array) => "texture_depth_2d_array",
        (Depth, Cube) => "texture_depth_cube",
        (Depth, CubeArray) => "texture_depth_cube_array",
        (Multisampled, _) => "texture_multisampled_2d",
        (Sampled, D1) => "texture_1d",
        (Sampled, D2Array) => "texture_2d_array",
        (Sampled, D3) => "texture_3d",
        (Sampled, Cube) => "texture_cube",
        (Sampled, CubeArray) => "texture_cube_array",
        (Storage, D1) => "texture_storage_1d",
        (Storage, D2Array) => "texture_storage_2d_array",
        (Storage, D3) => "texture_storage_3d",
        // (Sampled, D2) and the Storage/D2 fallback, plus any combination a
        // valid parse can't otherwise produce.
        _ => {
            if kind == Storage {
                "texture_storage_2d"
            } else {
                "texture_2d"
            }
        }
    }
}

pub(crate) fn texel_format_name(format: crate::types::TexelFormat) -> &'static str {
    use crate::types::TexelFormat::{Bgra8Unorm, R32Float, R32Sint, R32Uint, Rg32Float, Rg32Sint, Rg32Uint, Rgba16Float, Rgba16Sint, Rgba16Uint, Rgba32Float, Rgba32Sint, Rgba32Uint, Rgba8Sint, Rgba8Snorm, Rgba8Uint, Rgba8Unorm};
    match format {
        Rgba8Unorm => "rgba8unorm",
        Rgba8Snorm => "rgba8snorm",
        Rgba8Uint => "rgba8uint",
        Rgba8Sint => "rgba8sint",
        Rgba16Uint => "rgba16uint",
        Rgba16Sint => "rgba16sint",
        Rgba16Float => "rgba16float",
        R32Uint => "r32uint",
        R32Sint => "r32sint",
        R32Float => "r32float",
        Rg32Uint => "rg32uint",
        Rg32Sint => "rg32sint",
        Rg32Float => "rg32float",
        Rgba32Uint => "rgba32uint",
        Rgba32Sint => "rgba32sint",
        Rgba32Float => "rgba32float",
        Bgra8Unorm => "bgra8unorm",
    }
}

fn bin_op_symbol(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "+",
        BinOp::Sub => "-",
        BinOp::Mul => "*",
        BinOp::Div => "/",
        BinOp::Mod => "%",
        BinOp::And => "&",
        BinOp::Or => "|",
        BinOp::Xor => "^",
        BinOp::Shl => "<<",
        BinOp::Shr => ">>",
        BinOp::LogicalAnd => "&&",
        BinOp::LogicalOr => "||",
        BinOp::Eq => "==",
        BinOp::Ne => "!=",
        BinOp::Lt => "<",
        BinOp::Le => "<=",
        BinOp::Gt => ">",
        BinOp::Ge => ">=",
    }
}

fn compound_assign_symbol(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "+=",
        BinOp::Sub => "-=",
        BinOp::Mul => "*=",
        BinOp::Div => "/=",
        BinOp::Mod => "%=",
        BinOp::And => "&=",
        BinOp::Or => "|=",
        BinOp::Xor => "^=",
        BinOp::Shl => "<<=",
        BinOp::Shr => ">>=",
        _ => unreachable!("compound assignment only ever wraps an arithmetic/bitwise op"),
    }
}

fn unary_op_symbol(op: UnaryOp) -> &'static str {
    match op {
        UnaryOp::Neg => "-",
        UnaryOp::Not => "!",
        UnaryOp::BitNot => "~",
        UnaryOp::AddressOf => "&",
        UnaryOp::Deref => "*",
    }
}

fn count_refs(body: &[Stmt]) -> AHashMap<Ref, u32> {
    let mut counts = AHashMap::new();
    for stmt in body {
        count_refs_stmt(stmt, &mut counts);
    }
    counts
}

fn count_refs_stmt(stmt: &Stmt, counts: &mut AHashMap<Ref, u32>) {
    match stmt {
        Stmt::Compound { body, .. } => {
            for stmt in body {
                count_refs_stmt(stmt, counts);
            }
        }
        Stmt::Return { value, .. } => {
            if let Some(value) = value {
                count_refs_expr(value, counts);
            }
        }
        Stmt::If { condition, then_branch, else_branch, .. } => {
            count_refs_expr(condition, counts);
            count_refs_stmt(then_branch, counts);
            if let Some(else_branch) = else_branch {
                count_refs_stmt(else_branch, counts);
            }
        }
        Stmt::Switch { scrutinee, cases, .. } => {
            count_refs_expr(scrutinee, counts);
            for case in cases {
                for selector in &case.selectors {
                    count_refs_expr(selector, counts);
                }
                for stmt in &case.body {
                    count_refs_stmt(stmt, counts);
                }
            }
        }
        Stmt::For { init, condition, update, body, .. } => {
            if let Some(init) = init {
                count_refs_stmt(init, counts);
            }
            if let Some(condition) = condition {
                count_refs_expr(condition, counts);
            }
            if let Some(update) = update {
                count_refs_stmt(update, counts);
            }
            count_refs_stmt(body, counts);
        }
        Stmt::While { condition, body, .. } => {
            count_refs_expr(condition, counts);
            count_refs_stmt(body, counts);
        }
        Stmt::Loop { body, continuing, .. } => {
            for stmt in body {
                count_refs_stmt(stmt, counts);
            }
            if let Some(continuing) = continuing {
                for stmt in continuing {
                    count_refs_stmt(stmt, counts);
                }
            }
        }
        Stmt::Break { .. } | Stmt::Continue { .. } | Stmt::Discard { .. } => {}
        Stmt::BreakIf { condition, .. } => count_refs_expr(condition, counts),
        Stmt::Assign { target, value, .. } => {
            count_refs_expr(target, counts);
            count_refs_expr(value, counts);
        }
        Stmt::IncrDecr { target, .. } => count_refs_expr(target, counts),
        Stmt::Call { call, .. } => count_refs_expr(call, counts),
        Stmt::Decl { decl, .. } => count_refs_decl(decl, counts),
    }
}

fn count_refs_decl(decl: &Decl, counts: &mut AHashMap<Ref, u32>) {
    match decl {
        Decl::Const { value, .. } | Decl::Let { value, .. } => count_refs_expr(value, counts),
        Decl::Override { value, .. } | Decl::Var { value, .. } => {
            if let Some(value) = value {
                count_refs_expr(value, counts);
            }
        }
        _ => {}
    }
}

fn count_refs_expr(expr: &Expr, counts: &mut AHashMap<Ref, u32>) {
    match expr {
        Expr::Literal { .. } => {}
        Expr::Identifier { ident, .. } => {
            if let Some(r) = ident.ref_ {
                *counts.entry(r).or_insert(0) += 1;
            }
        }
        Expr::Binary { left, right, .. } => {
            count_refs_expr(left, counts);
            count_refs_expr(right, counts);
        }
        Expr::Unary { operand, .. } => count_refs_expr(operand, counts),
        Expr::Call { callee, args, .. } => {
            if let Callee::Name(ident) = callee {
                if let Some(r) = ident.ref_ {
                    *counts.entry(r).or_insert(0) += 1;
                }
            }
            for arg in args {
                count_refs_expr(arg, counts);
            }
        }
        Expr::Index { base, index, .. } => {
            count_refs_expr(base, counts);
            count_refs_expr(index, counts);
        }
        Expr::Member { base, .. } => count_refs_expr(base, counts),
        Expr::Paren { inner, .. } => count_refs_expr(inner, counts),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DiagnosticSink;
    use crate::rename::{self, RenameOptions};
    use crate::{dce, validator};

    fn print_source(source: &str, rename_options: Option<&RenameOptions>, print_options: &PrintOptions) -> String {
        let mut unit = crate::parser::parse(source);
        let line_index = LineIndex::new(source);
        let mut diagnostics = DiagnosticSink::new();
        let _ = validator::validate(&unit.module, &mut unit.symbols, &unit.interner, &mut diagnostics, &line_index);
        assert!(!diagnostics.has_errors(), "unexpected diagnostics: {:?}", diagnostics.as_slice());
        dce::run(&unit.module, &mut unit.symbols);
        if let Some(options) = rename_options {
            rename::run(&unit.module, &mut unit.symbols, &mut unit.interner, options);
        }
        print(&unit.module, &unit.symbols, &unit.interner, source, &line_index, print_options, None)
    }

    #[test]
    fn minify_strips_discretionary_whitespace() {
        let source = "const n = 4;\n@compute @workgroup_size(1) fn main() { let x = n; }";
        let code = print_source(source, None, &PrintOptions::default());
        assert!(!code.contains('\n'));
        assert!(code.contains("constn=4;"));
    }

    #[test]
    fn pretty_mode_reindents_and_still_lexes() {
        let source = "const n=4;@compute @workgroup_size(1) fn main(){let x=n;}";
        let options = PrintOptions { minify_whitespace: false, ..PrintOptions::default() };
        let code = print_source(source, None, &options);
        assert!(code.contains('\n'));
    }

    #[test]
    fn leading_zero_is_dropped_when_safe() {
        let source = "const n = 0.5;";
        let code = print_source(source, None, &PrintOptions::default());
        assert!(code.contains(".5"));
        assert!(!code.contains("0.5"));
    }

    #[test]
    fn trailing_zero_is_dropped() {
        let source = "const n = 1.0;";
        let code = print_source(source, None, &PrintOptions::default());
        assert!(code.contains("1."));
        assert!(!code.contains("1.0"));
    }

    #[test]
    fn float_suffix_survives_shortening() {
        let source = "const n = 1.0f;";
        let code = print_source(source, None, &PrintOptions::default());
        assert!(code.contains("1.f"));
    }

    #[test]
    fn dead_top_level_decl_is_skipped() {
        let source = "fn dead() -> i32 { return 1; }\n@compute @workgroup_size(1) fn main() { }";
        let code = print_source(source, None, &PrintOptions::default());
        assert!(!code.contains("dead"));
    }

    #[test]
    fn renamed_identifiers_are_printed_short() {
        let source = "fn helper() -> i32 { return 1; }\n@compute @workgroup_size(1) fn main() { let x = helper(); }";
        let code = print_source(source, Some(&RenameOptions::default()), &PrintOptions::default());
        assert!(!code.contains("helper"));
    }

    #[test]
    fn external_binding_keeps_original_name_at_declaration() {
        let source = "@group(0) @binding(0) var<uniform> settings: f32;\n@compute @workgroup_size(1) fn main() { let x = settings; }";
        let code = print_source(source, Some(&RenameOptions::default()), &PrintOptions::default());
        assert!(code.contains("settings"));
    }

    #[test]
    fn source_map_gets_a_mapping_for_a_renamed_identifier() {
        let source = "fn helper() -> i32 { return 1; }\n@compute @workgroup_size(1) fn main() { let x = helper(); }";
        let mut unit = crate::parser::parse(source);
        let line_index = LineIndex::new(source);
        let mut diagnostics = DiagnosticSink::new();
        let _ = validator::validate(&unit.module, &mut unit.symbols, &unit.interner, &mut diagnostics, &line_index);
        dce::run(&unit.module, &mut unit.symbols);
        rename::run(&unit.module, &mut unit.symbols, &mut unit.interner, &RenameOptions::default());
        let mut builder = SourceMapBuilder::new(crate::sourcemap::SourceMapOptions::default());
        let code = print(&unit.module, &unit.symbols, &unit.interner, source, &line_index, &PrintOptions::default(), Some(&mut builder));
        let map = builder.build(code.matches('\n').count() as u32 + 1);
        assert!(!map.mappings.is_empty());
    }

    #[test]
    fn needs_separator_prevents_token_merges() {
        assert!(needs_separator('>', '='));
        assert!(needs_separator('a', 'b'));
        assert!(needs_separator('/', '/'));
        assert!(needs_separator('/', '*'));
        assert!(!needs_separator(';', 'a'));
        assert!(!needs_separator('-', '5'));
    }
}
