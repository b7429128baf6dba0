use serde::Serialize;

use crate::cpu::{CpuChr, CpuFlo, CpuInt, CpuLon, CpuShr};
use crate::span::SrcInfo;

/// A token produced by the Stave parser front-end.
///
/// The expression compiler consumes these; it never sees raw source text.
/// The parser has already classified identifiers against the declared type
/// names of the module, so `TypeName` and `Identifier` arrive distinct.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrToken {
    pub kind: PrTokenKind,
    pub src: SrcInfo,
}

impl PrToken {
    /// Create a new parser token.
    pub fn new(kind: PrTokenKind, src: SrcInfo) -> Self {
        Self { kind, src }
    }
}

/// Every kind of parser token the expression compiler can receive.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum PrTokenKind {
    /// An expression operator (`+`, `<<=`, `.`, `?`, ...).
    Operator(PrOperator),
    /// A delimiter or separator (`(`, `]`, `,`, `:`, ...).
    Punctuator(PrPunctuator),
    /// A keyword that can occur inside an expression.
    Keyword(PrKeyword),
    /// An identifier that is not a declared type name.
    Identifier(String),
    /// An identifier the parser resolved as a declared type name.
    TypeName(String),
    /// Boolean literal.
    LitBol(bool),
    /// Character literal.
    LitChr(CpuChr),
    /// Short integer literal.
    LitShr(CpuShr),
    /// Integer literal.
    LitInt(CpuInt),
    /// Long integer literal.
    LitLon(CpuLon),
    /// Floating point literal.
    LitFlo(CpuFlo),
    /// String literal.
    LitStr(String),
}

/// Surface operators as classified by the parser.
///
/// `++`/`--` and `+`/`-` arrive undisambiguated; the expression tokenizer
/// rewrites them to prefix/postfix and unary/binary forms from context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PrOperator {
    /// `++`
    PlusPlus,
    /// `--`
    MinusMinus,
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `!`
    Not,
    /// `~`
    BitNot,
    /// `*`
    Asterisk,
    /// `/`
    Slash,
    /// `%`
    Percent,
    /// `<<`
    ShiftLeft,
    /// `>>`
    ShiftRight,
    /// `<`
    Less,
    /// `<=`
    LessEqual,
    /// `>`
    Greater,
    /// `>=`
    GreaterEqual,
    /// `==`
    Equal,
    /// `!=`
    Distinct,
    /// `&`
    Ampersand,
    /// `^`
    Caret,
    /// `|`
    VertBar,
    /// `&&`
    AndAnd,
    /// `||`
    OrOr,
    /// `=`
    Assign,
    /// `+=`
    AddAssign,
    /// `-=`
    SubAssign,
    /// `*=`
    MulAssign,
    /// `/=`
    DivAssign,
    /// `%=`
    ModAssign,
    /// `<<=`
    ShlAssign,
    /// `>>=`
    ShrAssign,
    /// `&=`
    AndAssign,
    /// `^=`
    XorAssign,
    /// `|=`
    OrAssign,
    /// `->` (sequence operator)
    Arrow,
    /// `?` (ternary condition)
    Question,
    /// `.` (member access)
    Member,
}

impl PrOperator {
    /// Printable form, used in diagnostics.
    pub fn text(self) -> &'static str {
        match self {
            Self::PlusPlus => "++",
            Self::MinusMinus => "--",
            Self::Plus => "+",
            Self::Minus => "-",
            Self::Not => "!",
            Self::BitNot => "~",
            Self::Asterisk => "*",
            Self::Slash => "/",
            Self::Percent => "%",
            Self::ShiftLeft => "<<",
            Self::ShiftRight => ">>",
            Self::Less => "<",
            Self::LessEqual => "<=",
            Self::Greater => ">",
            Self::GreaterEqual => ">=",
            Self::Equal => "==",
            Self::Distinct => "!=",
            Self::Ampersand => "&",
            Self::Caret => "^",
            Self::VertBar => "|",
            Self::AndAnd => "&&",
            Self::OrOr => "||",
            Self::Assign => "=",
            Self::AddAssign => "+=",
            Self::SubAssign => "-=",
            Self::MulAssign => "*=",
            Self::DivAssign => "/=",
            Self::ModAssign => "%=",
            Self::ShlAssign => "<<=",
            Self::ShrAssign => ">>=",
            Self::AndAssign => "&=",
            Self::XorAssign => "^=",
            Self::OrAssign => "|=",
            Self::Arrow => "->",
            Self::Question => "?",
            Self::Member => ".",
        }
    }
}

/// Delimiters and separators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PrPunctuator {
    /// `(`
    BegParen,
    /// `)`
    EndParen,
    /// `[`
    BegBracket,
    /// `]`
    EndBracket,
    /// `{`
    BegCurly,
    /// `}`
    EndCurly,
    /// `,`
    Comma,
    /// `:`
    Colon,
}

impl PrPunctuator {
    /// Printable form, used in bracket-mismatch diagnostics.
    pub fn text(self) -> &'static str {
        match self {
            Self::BegParen => "(",
            Self::EndParen => ")",
            Self::BegBracket => "[",
            Self::EndBracket => "]",
            Self::BegCurly => "{",
            Self::EndCurly => "}",
            Self::Comma => ",",
            Self::Colon => ":",
        }
    }
}

/// Keywords that can occur inside an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PrKeyword {
    /// `var` -- inferred-type variable declaration.
    Var,
    /// `for` -- expression loop.
    For,
    /// `if` -- condition inside `for(...)` / `array(...)`.
    If,
    /// `do` -- loop step inside `for(...)`.
    Do,
    /// `return` -- result inside `for(...)`.
    Return,
    /// `array` -- array comprehension.
    Array,
    /// `on` -- element variable inside `array(...)`.
    On,
    /// `index` -- index variable inside `array(...)`.
    Index,
    /// `as` -- result expression inside `array(...)`.
    As,
}

impl PrKeyword {
    /// Printable form, used in flow-sequence diagnostics.
    pub fn text(self) -> &'static str {
        match self {
            Self::Var => "var",
            Self::For => "for",
            Self::If => "if",
            Self::Do => "do",
            Self::Return => "return",
            Self::Array => "array",
            Self::On => "on",
            Self::Index => "index",
            Self::As => "as",
        }
    }
}

/// Look up an expression keyword from its string form.
pub fn keyword_from_str(s: &str) -> Option<PrKeyword> {
    match s {
        "var" => Some(PrKeyword::Var),
        "for" => Some(PrKeyword::For),
        "if" => Some(PrKeyword::If),
        "do" => Some(PrKeyword::Do),
        "return" => Some(PrKeyword::Return),
        "array" => Some(PrKeyword::Array),
        "on" => Some(PrKeyword::On),
        "index" => Some(PrKeyword::Index),
        "as" => Some(PrKeyword::As),
        _ => None,
    }
}

/// One parsed sentence: the parser-token stream the expression compiler
/// reads a `[beg..=end]` range of.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Sentence {
    pub tokens: Vec<PrToken>,
}

impl Sentence {
    pub fn new(tokens: Vec<PrToken>) -> Self {
        Self { tokens }
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Token at position `i`, or `None` past the end.
    pub fn get(&self, i: usize) -> Option<&PrToken> {
        self.tokens.get(i)
    }

    /// Token kind at position `i`, or `None` past the end.
    pub fn kind(&self, i: usize) -> Option<&PrTokenKind> {
        self.tokens.get(i).map(|t| &t.kind)
    }

    /// Source position of token `i`, falling back to the last token's
    /// position for end-of-sentence errors.
    pub fn src(&self, i: usize) -> SrcInfo {
        self.tokens
            .get(i)
            .or_else(|| self.tokens.last())
            .map(|t| t.src)
            .unwrap_or_else(SrcInfo::synthetic)
    }

    /// True when token `i` is the given operator.
    pub fn is_operator(&self, i: usize, opr: PrOperator) -> bool {
        matches!(self.kind(i), Some(PrTokenKind::Operator(o)) if *o == opr)
    }

    /// True when token `i` is the given punctuator.
    pub fn is_punctuator(&self, i: usize, pnc: PrPunctuator) -> bool {
        matches!(self.kind(i), Some(PrTokenKind::Punctuator(p)) if *p == pnc)
    }

    /// True when token `i` is the given keyword.
    pub fn is_keyword(&self, i: usize, kwd: PrKeyword) -> bool {
        matches!(self.kind(i), Some(PrTokenKind::Keyword(k)) if *k == kwd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::{FileId, SrcInfo};

    fn tok(kind: PrTokenKind) -> PrToken {
        PrToken::new(kind, SrcInfo::new(FileId(0), 1, 1))
    }

    #[test]
    fn keyword_from_str_recognizes_all_keywords() {
        let keywords = [
            ("var", PrKeyword::Var),
            ("for", PrKeyword::For),
            ("if", PrKeyword::If),
            ("do", PrKeyword::Do),
            ("return", PrKeyword::Return),
            ("array", PrKeyword::Array),
            ("on", PrKeyword::On),
            ("index", PrKeyword::Index),
            ("as", PrKeyword::As),
        ];
        for (s, expected) in &keywords {
            assert_eq!(keyword_from_str(s), Some(*expected));
            assert_eq!(expected.text(), *s);
        }
        assert_eq!(keyword_from_str("while"), None);
    }

    #[test]
    fn sentence_probes() {
        let stn = Sentence::new(vec![
            tok(PrTokenKind::Identifier("a".into())),
            tok(PrTokenKind::Operator(PrOperator::Plus)),
            tok(PrTokenKind::LitInt(1)),
            tok(PrTokenKind::Punctuator(PrPunctuator::Comma)),
        ]);
        assert_eq!(stn.len(), 4);
        assert!(stn.is_operator(1, PrOperator::Plus));
        assert!(!stn.is_operator(1, PrOperator::Minus));
        assert!(stn.is_punctuator(3, PrPunctuator::Comma));
        assert!(stn.kind(4).is_none());
    }

    #[test]
    fn sentence_src_falls_back_to_last_token() {
        let stn = Sentence::new(vec![tok(PrTokenKind::LitInt(7))]);
        assert_eq!(stn.src(10), stn.src(0));
    }

    #[test]
    fn operator_text_round_trip() {
        assert_eq!(PrOperator::ShlAssign.text(), "<<=");
        assert_eq!(PrOperator::Arrow.text(), "->");
        assert_eq!(PrPunctuator::BegCurly.text(), "{");
    }
}
