//! Two-pass parser: pass 1 builds the AST and declares symbols, pass 2
//! re-walks the same tree to bind references, count uses, fold constants,
//! and tag expression purity.
//!
//! Grounded on the teacher's `prepare.rs` prescan-then-prepare split: pass 1
//! here plays the role of `prescan_*` (declare every name up front) and
//! pass 2 plays `prepare_*` (bind, fold, tag) — the clearest direct analogue
//! between the teacher's interpreter front end and a compiler front end.

mod pass1;
pub(crate) mod pass2;

use crate::ast::Module;
use crate::error::DiagnosticSink;
use crate::intern::Interner;
use crate::lexer::{self, Token};
use crate::scope::SymbolTable;
use crate::span::{LineIndex, TextRange, TextSize};

/// Output of parsing one compilation unit: the AST, its symbol table and
/// string interner, and every diagnostic accumulated along the way.
pub struct ParsedUnit {
    pub module: Module,
    pub symbols: SymbolTable,
    pub interner: Interner,
    pub diagnostics: DiagnosticSink,
}

/// Lexes and parses `source` in full: pass 1 then pass 2, never aborting on
/// error (spec §5: phases are sequential but a failure in one does not
/// prevent the rest of the pipeline from running on a best-effort AST).
#[must_use]
pub fn parse(source: &str) -> ParsedUnit {
    let line_index = LineIndex::new(source);
    let mut diagnostics = DiagnosticSink::new();
    let (tokens, lex_errors) = lexer::lex(source);
    for err in lex_errors {
        diagnostics.push(
            crate::error::Diagnostic::new(crate::error::Severity::Error, err.message, err.span.start(), &line_index)
                .with_rule(crate::error::DiagnosticRule::LexError),
        );
    }

    let mut cursor = Cursor::new(source, &tokens, &line_index);
    let mut interner = Interner::new();
    let mut symbols = SymbolTable::new();
    let module = pass1::parse_module(&mut cursor, &mut interner, &mut symbols, &mut diagnostics);
    let mut module = module;
    pass2::run(&mut module, &mut symbols, &interner, &mut diagnostics, &line_index);

    ParsedUnit { module, symbols, interner, diagnostics }
}

/// Shared token-stream cursor used by pass 1's recursive-descent grammar.
pub(crate) struct Cursor<'a> {
    pub source: &'a str,
    pub tokens: &'a [Token],
    pub line_index: &'a LineIndex,
    pub pos: usize,
    /// A synthetic token standing in for the unconsumed remainder of a
    /// `>=`/`>>`/`>>=` token that `close_template` split to extract a
    /// single `>`. Transparent to every other cursor method: `current`
    /// and `bump` check this before falling back to `tokens[pos]`.
    split_remainder: Option<Token>,
}

impl<'a> Cursor<'a> {
    fn new(source: &'a str, tokens: &'a [Token], line_index: &'a LineIndex) -> Self {
        Self { source, tokens, line_index, pos: 0, split_remainder: None }
    }

    pub fn current(&self) -> Token {
        self.split_remainder.unwrap_or_else(|| self.tokens[self.pos.min(self.tokens.len() - 1)])
    }

    pub fn peek_kind(&self) -> crate::lexer::TokenKind {
        self.current().kind
    }

    pub fn peek_at(&self, offset: usize) -> Option<Token> {
        if self.split_remainder.is_some() {
            if offset == 0 {
                return Some(self.current());
            }
            return self.tokens.get(self.pos + offset - 1).copied();
        }
        self.tokens.get(self.pos + offset).copied()
    }

    pub fn text(&self) -> &'a str {
        let token = self.current();
        &self.source[token.span]
    }

    pub fn bump(&mut self) -> Token {
        let token = self.current();
        if self.split_remainder.take().is_none() && self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    pub fn is_eof(&self) -> bool {
        self.peek_kind() == crate::lexer::TokenKind::Eof
    }

    /// Closes a template argument list. `>` is consumed whole; `>=`, `>>`,
    /// `>>=` are split so their leading `>` closes this template while the
    /// remainder (`=`, `>`, `>=` respectively) is left for whatever parses
    /// next — the token-splitting trick spec §4.4 requires so the parser,
    /// not the lexer, disambiguates template brackets from shift/relational
    /// operators.
    pub fn close_template(&mut self) -> bool {
        use crate::lexer::{Punct, TokenKind};
        let current = self.current();
        let TokenKind::Punct(p) = current.kind else { return false };
        let remainder = match p {
            Punct::Gt => {
                self.bump();
                return true;
            }
            Punct::Ge => Punct::Eq,
            Punct::Shr => Punct::Gt,
            Punct::ShrEq => Punct::Ge,
            _ => return false,
        };
        let one_byte = TextSize::from(1);
        let remainder_start = current.span.start() + one_byte;
        self.split_remainder = Some(Token { kind: TokenKind::Punct(remainder), span: TextRange::new(remainder_start, current.span.end()) });
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_empty_source_with_no_diagnostics() {
        let unit = parse("");
        assert!(unit.module.decls.is_empty());
        assert!(!unit.diagnostics.has_errors());
    }

    #[test]
    fn lex_error_surfaces_as_parse_diagnostic() {
        let unit = parse("const x = 1 $ 2;");
        assert!(unit.diagnostics.has_errors());
    }
}
