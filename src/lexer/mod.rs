//! Tokenizes WGSL source text into a flat token stream with exact byte spans.
//!
//! The lexer never looks at nesting or grammar — it only classifies bytes.
//! Disambiguating `>` inside template argument lists from the relational
//! operator is the parser's job (see `parser::pass1`), per spec §4.4.

use strum::{Display, EnumString, IntoStaticStr};

use crate::span::{TextRange, TextSize};

/// Core WGSL syntax keywords.
///
/// This is deliberately the *short* reserved-word list: address spaces
/// (`uniform`, `storage`, ...), access modes (`read`, `write`, ...), and
/// texel formats are contextual identifiers in WGSL, not lexer keywords —
/// the parser recognizes them by name where the grammar expects them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Keyword {
    Alias,
    Break,
    Case,
    Const,
    ConstAssert,
    Continue,
    Continuing,
    Default,
    Diagnostic,
    Discard,
    Else,
    Enable,
    False,
    Fn,
    For,
    If,
    Let,
    Loop,
    Override,
    Requires,
    Return,
    Struct,
    Switch,
    True,
    Var,
    While,
}

impl Keyword {
    fn from_str_exact(s: &str) -> Option<Self> {
        match s {
            "alias" => Some(Self::Alias),
            "break" => Some(Self::Break),
            "case" => Some(Self::Case),
            "const" => Some(Self::Const),
            "const_assert" => Some(Self::ConstAssert),
            "continue" => Some(Self::Continue),
            "continuing" => Some(Self::Continuing),
            "default" => Some(Self::Default),
            "diagnostic" => Some(Self::Diagnostic),
            "discard" => Some(Self::Discard),
            "else" => Some(Self::Else),
            "enable" => Some(Self::Enable),
            "false" => Some(Self::False),
            "fn" => Some(Self::Fn),
            "for" => Some(Self::For),
            "if" => Some(Self::If),
            "let" => Some(Self::Let),
            "loop" => Some(Self::Loop),
            "override" => Some(Self::Override),
            "requires" => Some(Self::Requires),
            "return" => Some(Self::Return),
            "struct" => Some(Self::Struct),
            "switch" => Some(Self::Switch),
            "true" => Some(Self::True),
            "var" => Some(Self::Var),
            "while" => Some(Self::While),
            _ => None,
        }
    }
}

/// Words reserved by the WGSL specification for future use.
///
/// Not syntax keywords (the grammar doesn't use them today), but the
/// renamer must never mint one of these as a generated identifier, and the
/// parser must never let a user declare one. Kept as plain `&str` rather
/// than an enum since nothing branches on individual members.
pub const RESERVED_WORDS: &[&str] = &[
    "NULL", "Self", "abstract", "active", "alignas", "alignof", "as", "asm", "asm_fragment", "async", "attribute",
    "auto", "await", "become", "binding_array", "cast", "catch", "class", "co_await", "co_return", "co_yield",
    "coherent", "column_major", "common", "compile", "compile_fragment", "concept", "const_cast", "consteval",
    "constexpr", "constinit", "crate", "debugger", "decltype", "delete", "demote", "demote_to_helper", "do",
    "dynamic_cast", "enum", "explicit", "export", "extends", "extern", "external", "fallthrough", "filter", "final",
    "finally", "friend", "from", "fxgroup", "get", "goto", "groupshared", "highp", "impl", "implements", "import",
    "inline", "instanceof", "interface", "layout", "lowp", "mediump", "mod", "module", "move", "mut", "mutable",
    "namespace", "new", "nil", "noexcept", "noinline", "nointerpolation", "noperspective", "null", "nullptr", "of",
    "operator", "package", "packoffset", "partition", "pass", "patch", "pixelfragment", "precise", "precision",
    "premerge", "priv", "protected", "pub", "public", "readonly", "ref", "regardless", "register",
    "reinterpret_cast", "require", "resource", "restrict", "self", "set", "shared", "sizeof", "smooth", "snorm",
    "static", "static_assert", "static_cast", "std", "subroutine", "super", "target", "template", "this",
    "thread_local", "throw", "trait", "try", "type", "typedef", "typeid", "typename", "union", "unless", "unorm",
    "unsafe", "unsized", "use", "using", "varying", "virtual", "volatile", "wgsl", "where", "with", "writeonly",
    "yield",
];

/// Punctuation and operator tokens, always lexed as the longest match.
///
/// `>` inside a template argument list is still emitted here as `Gt`,
/// `Shr` (`>>`), `Ge` (`>=`), or `ShrEq` (`>>=`) — the parser splits these
/// back into a leading `Gt` plus a shorter remainder token when closing a
/// template argument list, the same token-splitting trick used to parse
/// nested generics without lexer lookahead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Punct {
    Amp,
    AmpAmp,
    AmpEq,
    Pipe,
    PipePipe,
    PipeEq,
    Caret,
    CaretEq,
    Bang,
    BangEq,
    Eq,
    EqEq,
    Lt,
    Le,
    Shl,
    ShlEq,
    Gt,
    Ge,
    Shr,
    ShrEq,
    Plus,
    PlusEq,
    PlusPlus,
    Minus,
    MinusEq,
    MinusMinus,
    Arrow,
    Star,
    StarEq,
    Slash,
    SlashEq,
    Percent,
    PercentEq,
    Tilde,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Semi,
    Dot,
    At,
    Underscore,
}

impl Punct {
    /// Source text for this punctuation token. Used by the printer when
    /// emitting a token verbatim and by diagnostics.
    #[must_use]
    pub fn text(self) -> &'static str {
        match self {
            Self::Amp => "&",
            Self::AmpAmp => "&&",
            Self::AmpEq => "&=",
            Self::Pipe => "|",
            Self::PipePipe => "||",
            Self::PipeEq => "|=",
            Self::Caret => "^",
            Self::CaretEq => "^=",
            Self::Bang => "!",
            Self::BangEq => "!=",
            Self::Eq => "=",
            Self::EqEq => "==",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Shl => "<<",
            Self::ShlEq => "<<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Shr => ">>",
            Self::ShrEq => ">>=",
            Self::Plus => "+",
            Self::PlusEq => "+=",
            Self::PlusPlus => "++",
            Self::Minus => "-",
            Self::MinusEq => "-=",
            Self::MinusMinus => "--",
            Self::Arrow => "->",
            Self::Star => "*",
            Self::StarEq => "*=",
            Self::Slash => "/",
            Self::SlashEq => "/=",
            Self::Percent => "%",
            Self::PercentEq => "%=",
            Self::Tilde => "~",
            Self::LParen => "(",
            Self::RParen => ")",
            Self::LBracket => "[",
            Self::RBracket => "]",
            Self::LBrace => "{",
            Self::RBrace => "}",
            Self::Comma => ",",
            Self::Colon => ":",
            Self::Semi => ";",
            Self::Dot => ".",
            Self::At => "@",
            Self::Underscore => "_",
        }
    }
}

/// Numeric literal suffix, carried separately from the lexeme so the
/// printer and type system don't have to re-scan the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericSuffix {
    None,
    I,
    U,
    F,
    H,
}

/// The classification of a single token, without its source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Keyword(Keyword),
    Identifier,
    IntLiteral { suffix: NumericSuffix },
    FloatLiteral { suffix: NumericSuffix },
    Punct(Punct),
    Eof,
}

/// A single lexed token: its kind plus the exact byte span it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: TextRange,
}

impl Token {
    #[must_use]
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.span]
    }
}

/// A malformed byte sequence or unterminated block comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexError {
    pub message: String,
    pub span: TextRange,
}

/// Tokenizes `source` in full, returning every token plus any lexical
/// errors encountered along the way. Lexing never stops at the first
/// error: an invalid byte is skipped and scanning resumes, so the parser
/// still gets as complete a token stream as possible (spec §7: "the
/// pipeline still emits best-effort code when recoverable").
pub fn lex(source: &str) -> (Vec<Token>, Vec<LexError>) {
    let mut lexer = Lexer::new(source);
    let mut tokens = Vec::new();
    let mut errors = Vec::new();
    loop {
        match lexer.next_token() {
            Ok(token) => {
                let is_eof = token.kind == TokenKind::Eof;
                tokens.push(token);
                if is_eof {
                    break;
                }
            }
            Err(err) => errors.push(err),
        }
    }
    (tokens, errors)
}

struct Lexer<'a> {
    source: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self { source, bytes: source.as_bytes(), pos: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Some(b)
    }

    fn span_from(&self, start: usize) -> TextRange {
        TextRange::new(TextSize::try_from(start).unwrap(), TextSize::try_from(self.pos).unwrap())
    }

    fn skip_trivia(&mut self) -> Option<LexError> {
        loop {
            match self.peek() {
                Some(b' ' | b'\t' | b'\n' | b'\r') => {
                    self.pos += 1;
                }
                Some(b'/') if self.peek_at(1) == Some(b'/') => {
                    self.pos += 2;
                    while !matches!(self.peek(), None | Some(b'\n')) {
                        self.pos += 1;
                    }
                }
                Some(b'/') if self.peek_at(1) == Some(b'*') => {
                    let start = self.pos;
                    self.pos += 2;
                    let mut depth = 1u32;
                    while depth > 0 {
                        match (self.peek(), self.peek_at(1)) {
                            (Some(b'/'), Some(b'*')) => {
                                depth += 1;
                                self.pos += 2;
                            }
                            (Some(b'*'), Some(b'/')) => {
                                depth -= 1;
                                self.pos += 2;
                            }
                            (Some(_), _) => self.pos += 1,
                            (None, _) => {
                                return Some(LexError {
                                    message: "unterminated block comment".to_owned(),
                                    span: self.span_from(start),
                                });
                            }
                        }
                    }
                }
                _ => return None,
            }
        }
    }

    fn next_token(&mut self) -> Result<Token, LexError> {
        if let Some(err) = self.skip_trivia() {
            return Err(err);
        }
        let start = self.pos;
        let Some(b) = self.peek() else {
            return Ok(Token { kind: TokenKind::Eof, span: self.span_from(start) });
        };

        if is_ident_start(b) {
            return Ok(self.lex_identifier_or_keyword(start));
        }
        if b.is_ascii_digit() || (b == b'.' && self.peek_at(1).is_some_and(|c| c.is_ascii_digit())) {
            return Ok(self.lex_number(start));
        }
        if let Some(token) = self.lex_punct(start) {
            return Ok(token);
        }

        self.pos += 1;
        Err(LexError { message: format!("invalid byte 0x{b:02x}"), span: self.span_from(start) })
    }

    fn lex_identifier_or_keyword(&mut self, start: usize) -> Token {
        self.pos += 1;
        while self.peek().is_some_and(is_ident_continue) {
            self.pos += 1;
        }
        let text = &self.source[start..self.pos];
        let kind = if text == "_" {
            TokenKind::Punct(Punct::Underscore)
        } else if let Some(kw) = Keyword::from_str_exact(text) {
            TokenKind::Keyword(kw)
        } else {
            TokenKind::Identifier
        };
        Token { kind, span: self.span_from(start) }
    }

    fn lex_number(&mut self, start: usize) -> Token {
        let is_hex = self.peek() == Some(b'0') && matches!(self.peek_at(1), Some(b'x' | b'X'));
        if is_hex {
            self.pos += 2;
            while self.peek().is_some_and(|c| c.is_ascii_hexdigit()) {
                self.pos += 1;
            }
            let mut is_float = false;
            if self.peek() == Some(b'.') {
                is_float = true;
                self.pos += 1;
                while self.peek().is_some_and(|c| c.is_ascii_hexdigit()) {
                    self.pos += 1;
                }
            }
            if matches!(self.peek(), Some(b'p' | b'P')) {
                is_float = true;
                self.pos += 1;
                if matches!(self.peek(), Some(b'+' | b'-')) {
                    self.pos += 1;
                }
                while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    self.pos += 1;
                }
            }
            let suffix = self.lex_suffix();
            let kind = if is_float { TokenKind::FloatLiteral { suffix } } else { TokenKind::IntLiteral { suffix } };
            return Token { kind, span: self.span_from(start) };
        }

        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        let mut is_float = false;
        if self.peek() == Some(b'.') {
            is_float = true;
            self.pos += 1;
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.pos += 1;
            }
        }
        if matches!(self.peek(), Some(b'e' | b'E')) {
            is_float = true;
            self.pos += 1;
            if matches!(self.peek(), Some(b'+' | b'-')) {
                self.pos += 1;
            }
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.pos += 1;
            }
        }
        let suffix = self.lex_suffix();
        if matches!(suffix, NumericSuffix::F | NumericSuffix::H) {
            is_float = true;
        }
        let kind = if is_float { TokenKind::FloatLiteral { suffix } } else { TokenKind::IntLiteral { suffix } };
        Token { kind, span: self.span_from(start) }
    }

    fn lex_suffix(&mut self) -> NumericSuffix {
        match self.peek() {
            Some(b'i') => {
                self.pos += 1;
                NumericSuffix::I
            }
            Some(b'u') => {
                self.pos += 1;
                NumericSuffix::U
            }
            Some(b'f') => {
                self.pos += 1;
                NumericSuffix::F
            }
            Some(b'h') => {
                self.pos += 1;
                NumericSuffix::H
            }
            _ => NumericSuffix::None,
        }
    }

    fn lex_punct(&mut self, start: usize) -> Option<Token> {
        let three = self.peek_at(0).and_then(|a| self.peek_at(1).map(|b| (a, b)));
        macro_rules! take {
            ($n:expr, $p:expr) => {{
                self.pos += $n;
                return Some(Token { kind: TokenKind::Punct($p), span: self.span_from(start) });
            }};
        }
        // 3-byte operators first.
        if let Some((a, b)) = three {
            let c = self.peek_at(2);
            match (a, b, c) {
                (b'<', b'<', Some(b'=')) => take!(3, Punct::ShlEq),
                (b'>', b'>', Some(b'=')) => take!(3, Punct::ShrEq),
                _ => {}
            }
        }
        if let Some((a, b)) = three {
            match (a, b) {
                (b'&', b'&') => take!(2, Punct::AmpAmp),
                (b'&', b'=') => take!(2, Punct::AmpEq),
                (b'|', b'|') => take!(2, Punct::PipePipe),
                (b'|', b'=') => take!(2, Punct::PipeEq),
                (b'^', b'=') => take!(2, Punct::CaretEq),
                (b'!', b'=') => take!(2, Punct::BangEq),
                (b'=', b'=') => take!(2, Punct::EqEq),
                (b'<', b'=') => take!(2, Punct::Le),
                (b'<', b'<') => take!(2, Punct::Shl),
                (b'>', b'=') => take!(2, Punct::Ge),
                (b'>', b'>') => take!(2, Punct::Shr),
                (b'+', b'=') => take!(2, Punct::PlusEq),
                (b'+', b'+') => take!(2, Punct::PlusPlus),
                (b'-', b'=') => take!(2, Punct::MinusEq),
                (b'-', b'-') => take!(2, Punct::MinusMinus),
                (b'-', b'>') => take!(2, Punct::Arrow),
                (b'*', b'=') => take!(2, Punct::StarEq),
                (b'/', b'=') => take!(2, Punct::SlashEq),
                (b'%', b'=') => take!(2, Punct::PercentEq),
                _ => {}
            }
        }
        let one = match self.peek()? {
            b'&' => Punct::Amp,
            b'|' => Punct::Pipe,
            b'^' => Punct::Caret,
            b'!' => Punct::Bang,
            b'=' => Punct::Eq,
            b'<' => Punct::Lt,
            b'>' => Punct::Gt,
            b'+' => Punct::Plus,
            b'-' => Punct::Minus,
            b'*' => Punct::Star,
            b'/' => Punct::Slash,
            b'%' => Punct::Percent,
            b'~' => Punct::Tilde,
            b'(' => Punct::LParen,
            b')' => Punct::RParen,
            b'[' => Punct::LBracket,
            b']' => Punct::RBracket,
            b'{' => Punct::LBrace,
            b'}' => Punct::RBrace,
            b',' => Punct::Comma,
            b':' => Punct::Colon,
            b';' => Punct::Semi,
            b'.' => Punct::Dot,
            b'@' => Punct::At,
            _ => return None,
        };
        take!(1, one)
    }
}

/// WGSL identifiers are ASCII-only in this implementation: `[a-zA-Z_][a-zA-Z0-9_]*`.
/// The full spec additionally allows a restricted set of Unicode XID characters;
/// supporting that is future work the lexer does not attempt today.
fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_ident_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let (tokens, errors) = lex(source);
        assert!(errors.is_empty(), "unexpected lex errors: {errors:?}");
        tokens.into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn lexes_keywords_and_identifiers() {
        let kinds = kinds("fn foo");
        assert_eq!(kinds[0], TokenKind::Keyword(Keyword::Fn));
        assert_eq!(kinds[1], TokenKind::Identifier);
        assert_eq!(kinds[2], TokenKind::Eof);
    }

    #[test]
    fn distinguishes_shift_and_relational_tokens() {
        let kinds = kinds("a << b >> c <= d >= e");
        assert!(kinds.contains(&TokenKind::Punct(Punct::Shl)));
        assert!(kinds.contains(&TokenKind::Punct(Punct::Shr)));
        assert!(kinds.contains(&TokenKind::Punct(Punct::Le)));
        assert!(kinds.contains(&TokenKind::Punct(Punct::Ge)));
    }

    #[test]
    fn nested_block_comments() {
        let (tokens, errors) = lex("/* a /* b */ c */ x");
        assert!(errors.is_empty());
        assert_eq!(tokens[0].kind, TokenKind::Identifier);
    }

    #[test]
    fn unterminated_block_comment_is_an_error() {
        let (_, errors) = lex("/* never closes");
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn numeric_suffixes() {
        let (tokens, _) = lex("1.0f 1u 1i 0x1p2h");
        assert_eq!(tokens[0].kind, TokenKind::FloatLiteral { suffix: NumericSuffix::F });
        assert_eq!(tokens[1].kind, TokenKind::IntLiteral { suffix: NumericSuffix::U });
        assert_eq!(tokens[2].kind, TokenKind::IntLiteral { suffix: NumericSuffix::I });
        assert_eq!(tokens[3].kind, TokenKind::FloatLiteral { suffix: NumericSuffix::H });
    }

    #[test]
    fn invalid_byte_recovers() {
        let (tokens, errors) = lex("a $ b");
        assert_eq!(errors.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::Identifier);
        assert_eq!(tokens[1].kind, TokenKind::Identifier);
    }

    #[test]
    fn underscore_is_its_own_token() {
        let (tokens, _) = lex("_ = 1;");
        assert_eq!(tokens[0].kind, TokenKind::Punct(Punct::Underscore));
    }
}
