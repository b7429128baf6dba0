//! Shared test fixture: a minimal expression scanner plus a compiler
//! state bundle with pre-registered system types and master methods.
//!
//! The production parser is an external collaborator; the scanner here
//! exists only so tests can write expressions as source strings instead
//! of hand-built token vectors.

use stave_common::span::{FileId, SrcInfo};
use stave_common::{
    keyword_from_str, Diagnostics, PrOperator, PrPunctuator, PrToken, PrTokenKind, Sentence,
};
use stave_emit::{BinaryWriter, Inst};
use stave_expr::{register_master_methods, ExprToken, Expression};
use stave_symtab::{
    CallConv, FunDef, FunIndex, FunKind, ModIndex, ScopeDef, SymbolTable, TypIndex, VarAttrs,
    VarIndex,
};

/// Scan an expression source string into parser tokens. `type_names`
/// lists the identifiers the parser would classify as type names.
pub fn lex(source: &str, type_names: &[String]) -> Sentence {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0usize;
    let mut line = 1u32;
    let mut col = 1u32;
    let file = FileId(0);
    while i < bytes.len() {
        let src = SrcInfo::new(file, line, col);
        let c = bytes[i] as char;
        let mut advance = |n: usize, col: &mut u32, i: &mut usize| {
            *col += n as u32;
            *i += n;
        };
        match c {
            '\n' => {
                line += 1;
                col = 1;
                i += 1;
            }
            ' ' | '\t' | '\r' => advance(1, &mut col, &mut i),
            '0'..='9' => {
                let start = i;
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
                let mut is_float = false;
                if i + 1 < bytes.len()
                    && bytes[i] == b'.'
                    && bytes[i + 1].is_ascii_digit()
                {
                    is_float = true;
                    i += 1;
                    while i < bytes.len() && bytes[i].is_ascii_digit() {
                        i += 1;
                    }
                }
                let text = &source[start..i];
                let kind = if is_float {
                    PrTokenKind::LitFlo(text.parse().unwrap())
                } else if i < bytes.len() && bytes[i] == b'L' {
                    i += 1;
                    PrTokenKind::LitLon(text.parse().unwrap())
                } else if i < bytes.len() && bytes[i] == b'S' {
                    i += 1;
                    PrTokenKind::LitShr(text.parse().unwrap())
                } else {
                    PrTokenKind::LitInt(text.parse().unwrap())
                };
                col += (i - start) as u32;
                tokens.push(PrToken::new(kind, src));
            }
            'a'..='z' | 'A'..='Z' | '_' => {
                let start = i;
                while i < bytes.len()
                    && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_')
                {
                    i += 1;
                }
                let text = &source[start..i];
                col += (i - start) as u32;
                let kind = if text == "true" {
                    PrTokenKind::LitBol(true)
                } else if text == "false" {
                    PrTokenKind::LitBol(false)
                } else if let Some(kwd) = keyword_from_str(text) {
                    PrTokenKind::Keyword(kwd)
                } else if type_names.iter().any(|t| t == text) {
                    PrTokenKind::TypeName(text.to_string())
                } else {
                    PrTokenKind::Identifier(text.to_string())
                };
                tokens.push(PrToken::new(kind, src));
            }
            '\'' => {
                let value = bytes[i + 1];
                assert_eq!(bytes[i + 2], b'\'', "unterminated char literal");
                advance(3, &mut col, &mut i);
                tokens.push(PrToken::new(PrTokenKind::LitChr(value), src));
            }
            '"' => {
                let start = i + 1;
                let mut end = start;
                while end < bytes.len() && bytes[end] != b'"' {
                    end += 1;
                }
                assert!(end < bytes.len(), "unterminated string literal");
                let text = source[start..end].to_string();
                advance(end + 1 - i, &mut col, &mut i);
                tokens.push(PrToken::new(PrTokenKind::LitStr(text), src));
            }
            _ => {
                let rest = &source[i..];
                let three = ["<<=", ">>="];
                let two = [
                    "<<", ">>", "<=", ">=", "==", "!=", "&&", "||", "+=", "-=", "*=", "/=",
                    "%=", "&=", "^=", "|=", "->", "++", "--",
                ];
                let mut matched = None;
                for t in three {
                    if rest.starts_with(t) {
                        matched = Some(t);
                        break;
                    }
                }
                if matched.is_none() {
                    for t in two {
                        if rest.starts_with(t) {
                            matched = Some(t);
                            break;
                        }
                    }
                }
                let text = matched.unwrap_or(&rest[..1]);
                let kind = match text {
                    "<<=" => PrTokenKind::Operator(PrOperator::ShlAssign),
                    ">>=" => PrTokenKind::Operator(PrOperator::ShrAssign),
                    "<<" => PrTokenKind::Operator(PrOperator::ShiftLeft),
                    ">>" => PrTokenKind::Operator(PrOperator::ShiftRight),
                    "<=" => PrTokenKind::Operator(PrOperator::LessEqual),
                    ">=" => PrTokenKind::Operator(PrOperator::GreaterEqual),
                    "==" => PrTokenKind::Operator(PrOperator::Equal),
                    "!=" => PrTokenKind::Operator(PrOperator::Distinct),
                    "&&" => PrTokenKind::Operator(PrOperator::AndAnd),
                    "||" => PrTokenKind::Operator(PrOperator::OrOr),
                    "+=" => PrTokenKind::Operator(PrOperator::AddAssign),
                    "-=" => PrTokenKind::Operator(PrOperator::SubAssign),
                    "*=" => PrTokenKind::Operator(PrOperator::MulAssign),
                    "/=" => PrTokenKind::Operator(PrOperator::DivAssign),
                    "%=" => PrTokenKind::Operator(PrOperator::ModAssign),
                    "&=" => PrTokenKind::Operator(PrOperator::AndAssign),
                    "^=" => PrTokenKind::Operator(PrOperator::XorAssign),
                    "|=" => PrTokenKind::Operator(PrOperator::OrAssign),
                    "->" => PrTokenKind::Operator(PrOperator::Arrow),
                    "++" => PrTokenKind::Operator(PrOperator::PlusPlus),
                    "--" => PrTokenKind::Operator(PrOperator::MinusMinus),
                    "+" => PrTokenKind::Operator(PrOperator::Plus),
                    "-" => PrTokenKind::Operator(PrOperator::Minus),
                    "*" => PrTokenKind::Operator(PrOperator::Asterisk),
                    "/" => PrTokenKind::Operator(PrOperator::Slash),
                    "%" => PrTokenKind::Operator(PrOperator::Percent),
                    "<" => PrTokenKind::Operator(PrOperator::Less),
                    ">" => PrTokenKind::Operator(PrOperator::Greater),
                    "=" => PrTokenKind::Operator(PrOperator::Assign),
                    "!" => PrTokenKind::Operator(PrOperator::Not),
                    "~" => PrTokenKind::Operator(PrOperator::BitNot),
                    "&" => PrTokenKind::Operator(PrOperator::Ampersand),
                    "^" => PrTokenKind::Operator(PrOperator::Caret),
                    "|" => PrTokenKind::Operator(PrOperator::VertBar),
                    "?" => PrTokenKind::Operator(PrOperator::Question),
                    "." => PrTokenKind::Operator(PrOperator::Member),
                    "(" => PrTokenKind::Punctuator(PrPunctuator::BegParen),
                    ")" => PrTokenKind::Punctuator(PrPunctuator::EndParen),
                    "[" => PrTokenKind::Punctuator(PrPunctuator::BegBracket),
                    "]" => PrTokenKind::Punctuator(PrPunctuator::EndBracket),
                    "{" => PrTokenKind::Punctuator(PrPunctuator::BegCurly),
                    "}" => PrTokenKind::Punctuator(PrPunctuator::EndCurly),
                    "," => PrTokenKind::Punctuator(PrPunctuator::Comma),
                    ":" => PrTokenKind::Punctuator(PrPunctuator::Colon),
                    other => panic!("scanner cannot read {other:?}"),
                };
                let len = text.len();
                advance(len, &mut col, &mut i);
                tokens.push(PrToken::new(kind, src));
            }
        }
    }
    Sentence::new(tokens)
}

/// Compiler state bundle for one test.
pub struct Fixture {
    pub st: SymbolTable,
    pub writer: BinaryWriter,
    pub diag: Diagnostics,
    pub scope: ScopeDef,
    pub type_names: Vec<String>,
}

impl Fixture {
    pub fn new() -> Self {
        let mut st = SymbolTable::new("main");
        register_master_methods(&mut st);
        Self {
            st,
            writer: BinaryWriter::new(),
            diag: Diagnostics::new(),
            scope: ScopeDef::local(ModIndex(0), FunIndex(0)),
            type_names: vec![
                "bool".into(),
                "char".into(),
                "short".into(),
                "int".into(),
                "long".into(),
                "float".into(),
                "string".into(),
            ],
        }
    }

    /// Declare a variable of a named base type.
    pub fn declare(&mut self, name: &str, type_name: &str, initialized: bool) -> VarIndex {
        let typ = self
            .st
            .typ_search(type_name, &self.scope)
            .unwrap_or_else(|| panic!("unknown type {type_name}"));
        self.declare_typed(name, typ, initialized)
    }

    pub fn declare_typed(&mut self, name: &str, typ: TypIndex, initialized: bool) -> VarIndex {
        let (var, _) = self.st.store_variable(
            name,
            typ,
            self.scope,
            VarAttrs {
                is_initialized: initialized,
                ..VarAttrs::default()
            },
        );
        var
    }

    pub fn declare_const(&mut self, name: &str, type_name: &str) -> VarIndex {
        let typ = self.st.typ_search(type_name, &self.scope).unwrap();
        let (var, _) = self.st.store_variable(
            name,
            typ,
            self.scope,
            VarAttrs {
                is_const: true,
                is_initialized: true,
                ..VarAttrs::default()
            },
        );
        var
    }

    /// Declare a one-dimensional dynamic array variable.
    pub fn declare_dyn_array(
        &mut self,
        name: &str,
        elem_type: &str,
        initialized: bool,
    ) -> VarIndex {
        let elem = self.st.typ_search(elem_type, &self.scope).unwrap();
        let typ = self.st.dyn_array_of(elem, 1, ScopeDef::global());
        self.declare_typed(name, typ, initialized)
    }

    /// Declare a fixed array variable with the given geometry.
    pub fn declare_fix_array(
        &mut self,
        name: &str,
        elem_type: &str,
        sizes: &[i64],
        initialized: bool,
    ) -> VarIndex {
        let elem = self.st.typ_search(elem_type, &self.scope).unwrap();
        let mut geometry = [0i64; 4];
        geometry[..sizes.len()].copy_from_slice(sizes);
        let typ = self
            .st
            .fix_array_of(elem, sizes.len(), geometry, ScopeDef::global());
        self.declare_typed(name, typ, initialized)
    }

    /// Register a class and remember its name for the scanner.
    pub fn register_class(
        &mut self,
        name: &str,
        fields: Vec<(&str, &str, bool)>, // (name, type, is_static)
    ) -> TypIndex {
        let fields = fields
            .into_iter()
            .map(|(f, t, is_static)| {
                let typ = self.st.typ_search(t, &self.scope).unwrap();
                (f.to_string(), typ, is_static, false)
            })
            .collect();
        let typ = self.st.store_class(name, ScopeDef::global(), fields);
        self.type_names.push(name.to_string());
        typ
    }

    /// Register an enum and remember its name for the scanner.
    pub fn register_enum(&mut self, name: &str, members: Vec<(&str, i32)>) -> TypIndex {
        let members = members
            .into_iter()
            .map(|(m, v)| (m.to_string(), v))
            .collect();
        let typ = self.st.store_enum(name, ScopeDef::global(), members);
        self.type_names.push(name.to_string());
        typ
    }

    /// Register a free function in a module.
    pub fn register_function(
        &mut self,
        name: &str,
        module: ModIndex,
        parms: Vec<(&str, bool, bool)>, // (type, is_reference, is_const)
        result: Option<&str>,
        conv: CallConv,
        is_private: bool,
    ) -> FunIndex {
        let result_typ = result.map(|t| self.st.typ_search(t, &self.scope).unwrap());
        let parms = parms
            .into_iter()
            .enumerate()
            .map(|(k, (t, is_ref, is_const))| {
                let typ = self.st.typ_search(t, &self.scope).unwrap();
                (format!("p{k}"), typ, is_ref, is_const)
            })
            .collect();
        self.st.store_function(
            FunDef {
                name: name.to_string(),
                kind: FunKind::Function,
                module,
                scope: ScopeDef::module(module),
                is_private,
                typ: result_typ,
                parm_low: 0,
                parm_count: 0,
                address: 0,
                conv,
                master: None,
                member_of: None,
                is_initializer: false,
                dl_name: None,
                syscall: None,
            },
            parms,
        )
    }

    pub fn sentence(&self, source: &str) -> Sentence {
        lex(source, &self.type_names)
    }

    pub fn compile(&mut self, source: &str) -> stave_common::CResult<ExprToken> {
        let stn = self.sentence(source);
        let end = stn.len().saturating_sub(1);
        Expression::new(&mut self.st, &mut self.writer, &mut self.diag, self.scope)
            .compile_with_result(&stn, 0, end)
    }

    pub fn compile_void(&mut self, source: &str) -> stave_common::CResult<()> {
        let stn = self.sentence(source);
        let end = stn.len().saturating_sub(1);
        Expression::new(&mut self.st, &mut self.writer, &mut self.diag, self.scope)
            .compile_void(&stn, 0, end)
    }

    pub fn compute(&mut self, source: &str) -> stave_common::CResult<ExprToken> {
        let stn = self.sentence(source);
        let end = stn.len().saturating_sub(1);
        Expression::new(&mut self.st, &mut self.writer, &mut self.diag, self.scope)
            .compute(&stn, 0, end)
    }

    pub fn code(&self) -> &[Inst] {
        self.writer.code()
    }

    /// Emitted opcode mnemonics, in order.
    pub fn opcodes(&self) -> Vec<String> {
        self.writer.code().iter().map(|i| i.opcode.mnemonic()).collect()
    }

    /// Count of temporaries allocated so far.
    pub fn temp_count(&self) -> usize {
        (0..self.st.var_count())
            .filter(|&v| self.st.var(VarIndex(v)).is_temp)
            .count()
    }
}
