//! Stage 1: parser tokens to expression tokens.
//!
//! Maps each parser token to an [`ExprToken`], resolving identifiers
//! against the symbol tables, disambiguating `++`/`--`/`+`/`-` from
//! context, recognizing type casts, constructor calls, embedded
//! declarations, `for(...)`/`array(...)` flow groups, and complex `{...}`
//! initializers. The output is still infix; the ternary binder and the
//! RPN converter run on it afterwards.

use rustc_hash::{FxHashMap, FxHashSet};

use stave_common::cpu::CpuLon;
use stave_common::{
    CResult, CompileError, ErrorKind, PrKeyword, PrOperator, PrPunctuator, PrTokenKind, Sentence,
};
use stave_emit::{BinaryWriter, MetaCase};
use stave_symtab::{MasterType, ModIndex, ScopeDef, SymbolTable, VarAttrs, MAX_DIMS};

use crate::oper::{ExprDelimiter, ExprOperator, FlowOpr, LowLevelOpr};
use crate::token::{ExprToken, ExprTokenKind, MetaAttr};
use crate::typespec::read_type_spec;

/// Pending flow-operator emissions, keyed by parser-token position.
type FlowMap = FxHashMap<usize, Vec<(FlowOpr, CpuLon, Option<String>)>>;

/// Stage-1 state over one expression range.
pub struct Tokenizer<'a> {
    st: &'a mut SymbolTable,
    writer: &'a mut BinaryWriter,
    scope: ScopeDef,
    tokens: Vec<ExprToken>,
    /// Next `=` is an initialization, not an assignment.
    pending_init: bool,
    /// Flow operators to emit when the cursor reaches their position.
    pending_flow: FlowMap,
    /// Parser-token positions consumed by lookahead.
    skip: FxHashSet<usize>,
    /// Labels of the flow constructs the cursor is inside.
    flow_stack: Vec<CpuLon>,
    /// Variables a flow operator will declare during evaluation;
    /// mentions of them tokenize as undefined variables and resolve at
    /// the evaluator's re-check.
    flow_var_names: FxHashSet<String>,
}

/// Tokenize the parser-token range `[beg..=end]` of a sentence.
pub fn tokenize(
    st: &mut SymbolTable,
    writer: &mut BinaryWriter,
    scope: &ScopeDef,
    stn: &Sentence,
    beg: usize,
    end: usize,
) -> CResult<Vec<ExprToken>> {
    if beg > end || stn.get(beg).is_none() {
        return Err(CompileError::new(ErrorKind::EmptyExpression, stn.src(beg)));
    }
    let mut tokenizer = Tokenizer {
        st,
        writer,
        scope: *scope,
        tokens: Vec::new(),
        pending_init: false,
        pending_flow: FxHashMap::default(),
        skip: FxHashSet::default(),
        flow_stack: Vec::new(),
        flow_var_names: FxHashSet::default(),
    };
    tokenizer.run(stn, beg, end)?;
    check_consistency(&tokenizer.tokens)?;
    Ok(tokenizer.tokens)
}

impl Tokenizer<'_> {
    fn run(&mut self, stn: &Sentence, beg: usize, end: usize) -> CResult<()> {
        let mut i = beg;
        while i <= end {
            if self.skip.contains(&i) {
                i += 1;
                continue;
            }
            if let Some(ops) = self.pending_flow.remove(&i) {
                i = self.emit_flow_ops(stn, i, ops)?;
                continue;
            }
            let token = match stn.get(i) {
                Some(t) => t,
                None => break,
            };
            i = match &token.kind {
                PrTokenKind::Operator(opr) => self.on_operator(stn, i, end, *opr)?,
                PrTokenKind::Punctuator(pnc) => self.on_punctuator(stn, i, end, *pnc)?,
                PrTokenKind::Keyword(kwd) => self.on_keyword(stn, i, end, *kwd)?,
                PrTokenKind::Identifier(name) => {
                    let name = name.clone();
                    self.on_identifier(stn, i, &name)?
                }
                PrTokenKind::TypeName(name) => {
                    let name = name.clone();
                    self.on_type_name(stn, i, &name)?
                }
                PrTokenKind::LitBol(v) => {
                    self.tokens.push(ExprToken::this_bol(self.st, *v, token.src));
                    i + 1
                }
                PrTokenKind::LitChr(v) => {
                    self.tokens.push(ExprToken::this_chr(self.st, *v, token.src));
                    i + 1
                }
                PrTokenKind::LitShr(v) => {
                    self.tokens.push(ExprToken::this_shr(self.st, *v, token.src));
                    i + 1
                }
                PrTokenKind::LitInt(v) => {
                    self.tokens.push(ExprToken::this_int(self.st, *v, token.src));
                    i + 1
                }
                PrTokenKind::LitLon(v) => {
                    self.tokens.push(ExprToken::this_lon(self.st, *v, token.src));
                    i + 1
                }
                PrTokenKind::LitFlo(v) => {
                    self.tokens.push(ExprToken::this_flo(self.st, *v, token.src));
                    i + 1
                }
                PrTokenKind::LitStr(s) => {
                    let adr = self.writer.store_lit_string(s);
                    self.tokens.push(ExprToken::this_str(self.st, adr, token.src));
                    i + 1
                }
            };
        }
        Ok(())
    }

    /// The token to the left of the cursor reads as a completed operand.
    fn last_is_operand(&self) -> bool {
        match self.tokens.last().map(|t| &t.kind) {
            Some(ExprTokenKind::Operand(_))
            | Some(ExprTokenKind::UndefVar(_))
            | Some(ExprTokenKind::Field(_))
            | Some(ExprTokenKind::Delimiter(ExprDelimiter::EndParen))
            | Some(ExprTokenKind::Delimiter(ExprDelimiter::EndBracket))
            | Some(ExprTokenKind::Delimiter(ExprDelimiter::EndCurly))
            | Some(ExprTokenKind::Operator(ExprOperator::PostfixInc))
            | Some(ExprTokenKind::Operator(ExprOperator::PostfixDec)) => true,
            _ => false,
        }
    }

    fn push_operator(&mut self, opr: ExprOperator, src: stave_common::SrcInfo) {
        if opr != ExprOperator::Initialize && opr != ExprOperator::Assign {
            self.pending_init = false;
        }
        self.tokens.push(ExprToken::new(ExprTokenKind::Operator(opr), src));
    }

    // ── Operators ──────────────────────────────────────────────────────

    fn on_operator(
        &mut self,
        stn: &Sentence,
        i: usize,
        end: usize,
        opr: PrOperator,
    ) -> CResult<usize> {
        let src = stn.src(i);
        let mapped = match opr {
            PrOperator::PlusPlus => {
                if self.last_is_operand() {
                    ExprOperator::PostfixInc
                } else {
                    ExprOperator::PrefixInc
                }
            }
            PrOperator::MinusMinus => {
                if self.last_is_operand() {
                    ExprOperator::PostfixDec
                } else {
                    ExprOperator::PrefixDec
                }
            }
            PrOperator::Plus => {
                if self.last_is_operand() {
                    ExprOperator::Addition
                } else {
                    ExprOperator::UnaryPlus
                }
            }
            PrOperator::Minus => {
                if self.last_is_operand() {
                    ExprOperator::Subtraction
                } else {
                    ExprOperator::UnaryMinus
                }
            }
            PrOperator::Assign => {
                if self.pending_init {
                    self.pending_init = false;
                    ExprOperator::Initialize
                } else {
                    ExprOperator::Assign
                }
            }
            PrOperator::Question => {
                self.tokens.push(ExprToken::new(
                    ExprTokenKind::LowLevelOpr(LowLevelOpr::TernaryCond),
                    src,
                ));
                return Ok(i + 1);
            }
            PrOperator::Member => return self.on_member(stn, i, end),
            PrOperator::Not => ExprOperator::LogicalNot,
            PrOperator::BitNot => ExprOperator::BitwiseNot,
            PrOperator::Asterisk => ExprOperator::Multiplication,
            PrOperator::Slash => ExprOperator::Division,
            PrOperator::Percent => ExprOperator::Modulus,
            PrOperator::ShiftLeft => ExprOperator::ShiftLeft,
            PrOperator::ShiftRight => ExprOperator::ShiftRight,
            PrOperator::Less => ExprOperator::Less,
            PrOperator::LessEqual => ExprOperator::LessEqual,
            PrOperator::Greater => ExprOperator::Greater,
            PrOperator::GreaterEqual => ExprOperator::GreaterEqual,
            PrOperator::Equal => ExprOperator::Equal,
            PrOperator::Distinct => ExprOperator::Distinct,
            PrOperator::Ampersand => ExprOperator::BitwiseAnd,
            PrOperator::Caret => ExprOperator::BitwiseXor,
            PrOperator::VertBar => ExprOperator::BitwiseOr,
            PrOperator::AndAnd => ExprOperator::LogicalAnd,
            PrOperator::OrOr => ExprOperator::LogicalOr,
            PrOperator::AddAssign => ExprOperator::AddAssign,
            PrOperator::SubAssign => ExprOperator::SubAssign,
            PrOperator::MulAssign => ExprOperator::MulAssign,
            PrOperator::DivAssign => ExprOperator::DivAssign,
            PrOperator::ModAssign => ExprOperator::ModAssign,
            PrOperator::ShlAssign => ExprOperator::ShlAssign,
            PrOperator::ShrAssign => ExprOperator::ShrAssign,
            PrOperator::AndAssign => ExprOperator::AndAssign,
            PrOperator::XorAssign => ExprOperator::XorAssign,
            PrOperator::OrAssign => ExprOperator::OrAssign,
            PrOperator::Arrow => ExprOperator::SeqOper,
        };
        self.push_operator(mapped, src);
        Ok(i + 1)
    }

    /// Member operator: `.field` or `.method(...)` on the preceding
    /// operand.
    fn on_member(&mut self, stn: &Sentence, i: usize, end: usize) -> CResult<usize> {
        let src = stn.src(i);
        if !self.last_is_operand() {
            return Err(CompileError::new(
                ErrorKind::MissingOperand {
                    opr: ".".into(),
                    side: "left",
                },
                src,
            ));
        }
        let name = match stn.kind(i + 1) {
            Some(PrTokenKind::Identifier(name)) => name.clone(),
            _ => {
                return Err(CompileError::new(
                    ErrorKind::MissingOperand {
                        opr: ".".into(),
                        side: "right",
                    },
                    src,
                ))
            }
        };
        if stn.is_punctuator(i + 2, PrPunctuator::BegParen) {
            let parm_nr = count_parameters(stn, i + 2, end)?;
            self.tokens.push(ExprToken::new(
                ExprTokenKind::Method { name, parm_nr },
                src,
            ));
        } else {
            self.tokens
                .push(ExprToken::new(ExprTokenKind::Field(name), src));
        }
        Ok(i + 2)
    }

    // ── Punctuators ────────────────────────────────────────────────────

    fn on_punctuator(
        &mut self,
        stn: &Sentence,
        i: usize,
        end: usize,
        pnc: PrPunctuator,
    ) -> CResult<usize> {
        let src = stn.src(i);
        let delim = |d| ExprToken::new(ExprTokenKind::Delimiter(d), src);
        match pnc {
            PrPunctuator::BegParen => self.on_beg_paren(stn, i, end),
            PrPunctuator::EndParen => {
                self.tokens.push(delim(ExprDelimiter::EndParen));
                Ok(i + 1)
            }
            PrPunctuator::BegBracket => {
                self.tokens.push(delim(ExprDelimiter::BegBracket));
                Ok(i + 1)
            }
            PrPunctuator::EndBracket => {
                // `a[i][j]` reads as one multi-dimensional subscript:
                // adjacent `][` continues the same bracket pair.
                if stn.is_punctuator(i + 1, PrPunctuator::BegBracket) {
                    self.tokens.push(delim(ExprDelimiter::Comma));
                    return Ok(i + 2);
                }
                self.tokens.push(delim(ExprDelimiter::EndBracket));
                Ok(i + 1)
            }
            PrPunctuator::BegCurly => self.on_beg_curly(stn, i, end),
            PrPunctuator::EndCurly => {
                self.tokens.push(delim(ExprDelimiter::EndCurly));
                Ok(i + 1)
            }
            PrPunctuator::Comma => {
                self.tokens.push(delim(ExprDelimiter::Comma));
                Ok(i + 1)
            }
            PrPunctuator::Colon => {
                if i >= end {
                    return Err(CompileError::new(ErrorKind::StrayColon, src));
                }
                self.tokens.push(ExprToken::new(
                    ExprTokenKind::LowLevelOpr(LowLevelOpr::TernaryMid),
                    src,
                ));
                Ok(i + 1)
            }
        }
    }

    /// Opening parenthesis: type cast, declaration grouping, or plain
    /// grouping, decided by lookahead.
    fn on_beg_paren(&mut self, stn: &Sentence, i: usize, _end: usize) -> CResult<usize> {
        let src = stn.src(i);
        if let Some(PrTokenKind::TypeName(_)) = stn.kind(i + 1) {
            // Probe the full type specification.
            let (typ, after) = read_type_spec(self.st, &self.scope, stn, i + 1)?;
            if stn.is_punctuator(after, PrPunctuator::EndParen) {
                // Type cast. Enums never cast; classes only in front of a
                // complex initializer.
                let master = self.st.typ_master(typ);
                if master == MasterType::Enum {
                    return Err(CompileError::new(
                        ErrorKind::InvalidCastTarget(self.st.typ(typ).name.clone()),
                        src,
                    ));
                }
                if master == MasterType::Class
                    && !stn.is_punctuator(after + 1, PrPunctuator::BegCurly)
                {
                    return Err(CompileError::new(
                        ErrorKind::InvalidCastTarget(self.st.typ(typ).name.clone()),
                        src,
                    ));
                }
                let mut token = ExprToken::new(
                    ExprTokenKind::Operator(ExprOperator::TypeCast),
                    src,
                );
                token.cast_typ = Some(typ);
                self.tokens.push(token);
                return Ok(after + 1);
            }
        }
        self.tokens.push(ExprToken::new(
            ExprTokenKind::Delimiter(ExprDelimiter::BegParen),
            src,
        ));
        Ok(i + 1)
    }

    /// Opening curly: complex initializer; requires the preceding token to
    /// be a cast to a class or array type.
    fn on_beg_curly(&mut self, stn: &Sentence, i: usize, end: usize) -> CResult<usize> {
        let src = stn.src(i);
        let cast_typ = match self.tokens.last() {
            Some(t) => match (&t.kind, t.cast_typ) {
                (ExprTokenKind::Operator(ExprOperator::TypeCast), Some(typ)) => typ,
                _ => return Err(CompileError::new(ErrorKind::ComplexCastMissing, src)),
            },
            None => return Err(CompileError::new(ErrorKind::ComplexCastMissing, src)),
        };
        let master = self.st.typ_master(cast_typ);
        if !matches!(
            master,
            MasterType::Class | MasterType::FixArray | MasterType::DynArray
        ) {
            return Err(CompileError::new(ErrorKind::ComplexCastMissing, src));
        }
        let info = complex_lit_scan(self.st, stn, cast_typ, i, end)?;
        let mut token = ExprToken::new(ExprTokenKind::Complex { typ: cast_typ }, src);
        token.dim_size = info.dims;
        self.tokens.push(token);
        self.tokens.push(ExprToken::new(
            ExprTokenKind::Delimiter(ExprDelimiter::BegCurly),
            src,
        ));
        self.skip.extend(info.inner_braces);
        Ok(i + 1)
    }

    // ── Keywords ───────────────────────────────────────────────────────

    fn on_keyword(
        &mut self,
        stn: &Sentence,
        i: usize,
        end: usize,
        kwd: PrKeyword,
    ) -> CResult<usize> {
        let src = stn.src(i);
        match kwd {
            PrKeyword::Var => {
                let name = match stn.kind(i + 1) {
                    Some(PrTokenKind::Identifier(name)) => name.clone(),
                    _ => {
                        return Err(CompileError::new(
                            ErrorKind::UnexpectedToken("`var` needs a variable name".into()),
                            src,
                        ))
                    }
                };
                if !stn.is_operator(i + 2, PrOperator::Assign) {
                    return Err(CompileError::new(
                        ErrorKind::UnexpectedToken(format!(
                            "`var {name}` must be followed by `=`"
                        )),
                        src,
                    ));
                }
                if let Some(member) = self.st.dot_collision_check(&self.scope, &name) {
                    return Err(CompileError::new(
                        ErrorKind::DotCollision { name, member },
                        src,
                    ));
                }
                self.tokens
                    .push(ExprToken::new(ExprTokenKind::UndefVar(name), src));
                self.pending_init = true;
                Ok(i + 2)
            }
            PrKeyword::For => self.on_for(stn, i, end),
            PrKeyword::Array => self.on_array(stn, i, end),
            other => Err(CompileError::new(
                ErrorKind::FlowKeywordSequence {
                    construct: if matches!(other, PrKeyword::On | PrKeyword::Index | PrKeyword::As)
                    {
                        "array"
                    } else {
                        "for"
                    },
                    detail: format!("`{}` outside its construct", other.text()),
                },
                src,
            )),
        }
    }

    /// `for(init if cond do step return result)`.
    fn on_for(&mut self, stn: &Sentence, i: usize, end: usize) -> CResult<usize> {
        let src = stn.src(i);
        if !stn.is_punctuator(i + 1, PrPunctuator::BegParen) {
            return Err(CompileError::new(
                ErrorKind::FlowKeywordSequence {
                    construct: "for",
                    detail: "missing `(` after `for`".into(),
                },
                src,
            ));
        }
        let mut if_pos = None;
        let mut do_pos = None;
        let mut ret_pos = None;
        let close = scan_flow_keywords(stn, i + 1, end, |pos, kwd, seen| match kwd {
            PrKeyword::If if seen == 0 => {
                if_pos = Some(pos);
                Ok(1)
            }
            PrKeyword::Do if seen == 1 => {
                do_pos = Some(pos);
                Ok(2)
            }
            PrKeyword::Return if seen == 2 => {
                ret_pos = Some(pos);
                Ok(3)
            }
            other => Err(CompileError::new(
                ErrorKind::FlowKeywordSequence {
                    construct: "for",
                    detail: format!("unexpected `{}`", other.text()),
                },
                stn.src(pos),
            )),
        })?;
        let (if_pos, do_pos, ret_pos) = match (if_pos, do_pos, ret_pos) {
            (Some(a), Some(b), Some(c)) => (a, b, c),
            _ => {
                return Err(CompileError::new(
                    ErrorKind::FlowKeywordSequence {
                        construct: "for",
                        detail: "needs `if`, `do` and `return` in that order".into(),
                    },
                    src,
                ))
            }
        };
        let label = self.st.flow_label_generator();
        self.st.increase_flow_label_generator();
        self.pending_flow
            .entry(if_pos)
            .or_default()
            .push((FlowOpr::ForIf, label, None));
        self.pending_flow
            .entry(do_pos)
            .or_default()
            .push((FlowOpr::ForDo, label, None));
        self.pending_flow
            .entry(ret_pos)
            .or_default()
            .push((FlowOpr::ForRet, label, None));
        self.pending_flow
            .entry(close)
            .or_default()
            .push((FlowOpr::ForEnd, label, None));
        self.tokens.push(ExprToken::new(
            ExprTokenKind::Delimiter(ExprDelimiter::BegParen),
            src,
        ));
        let mut beg = ExprToken::new(
            ExprTokenKind::FlowOpr {
                opr: FlowOpr::ForBeg,
                name: None,
            },
            src,
        );
        beg.flow_label = Some(label);
        self.tokens.push(beg);
        self.flow_stack.push(label);
        Ok(i + 2)
    }

    /// `array(source on elem [index ix] [if cond] as result)`.
    fn on_array(&mut self, stn: &Sentence, i: usize, end: usize) -> CResult<usize> {
        let src = stn.src(i);
        if !stn.is_punctuator(i + 1, PrPunctuator::BegParen) {
            return Err(CompileError::new(
                ErrorKind::FlowKeywordSequence {
                    construct: "array",
                    detail: "missing `(` after `array`".into(),
                },
                src,
            ));
        }
        let mut on_pos = None;
        let mut index_pos = None;
        let mut if_pos = None;
        let mut as_pos = None;
        let close = scan_flow_keywords(stn, i + 1, end, |pos, kwd, seen| match kwd {
            PrKeyword::On if seen == 0 => {
                on_pos = Some(pos);
                Ok(1)
            }
            PrKeyword::Index if seen == 1 => {
                index_pos = Some(pos);
                Ok(2)
            }
            PrKeyword::If if (1..=2).contains(&seen) => {
                if_pos = Some(pos);
                Ok(3)
            }
            PrKeyword::As if (1..=3).contains(&seen) => {
                as_pos = Some(pos);
                Ok(4)
            }
            other => Err(CompileError::new(
                ErrorKind::FlowKeywordSequence {
                    construct: "array",
                    detail: format!("unexpected `{}`", other.text()),
                },
                stn.src(pos),
            )),
        })?;
        let (on_pos, as_pos) = match (on_pos, as_pos) {
            (Some(on), Some(as_)) => (on, as_),
            _ => {
                return Err(CompileError::new(
                    ErrorKind::FlowKeywordSequence {
                        construct: "array",
                        detail: "needs `on` and `as`".into(),
                    },
                    src,
                ))
            }
        };
        let elem_name = self.flow_var_name(stn, on_pos, "on")?;
        let ix_name = match index_pos {
            Some(pos) => Some(self.flow_var_name(stn, pos, "index")?),
            None => None,
        };
        let label = self.st.flow_label_generator();
        self.st.increase_flow_label_generator();
        let on_opr = if index_pos.is_some() {
            FlowOpr::ArrOxvar
        } else {
            FlowOpr::ArrOnvar
        };
        let on_entry = self.pending_flow.entry(on_pos).or_default();
        on_entry.push((on_opr, label, Some(elem_name)));
        if index_pos.is_none() {
            on_entry.push((FlowOpr::ArrInit, label, None));
        }
        if let (Some(pos), Some(name)) = (index_pos, ix_name) {
            let entry = self.pending_flow.entry(pos).or_default();
            entry.push((FlowOpr::ArrIxvar, label, Some(name)));
            entry.push((FlowOpr::ArrInit, label, None));
        }
        if let Some(pos) = if_pos {
            // The `if` keyword itself emits nothing; the condition tokens
            // follow and `as` pops them.
            self.skip.insert(pos);
            self.pending_flow
                .entry(as_pos)
                .or_default()
                .push((FlowOpr::ArrAsif, label, None));
        } else {
            self.skip.insert(as_pos);
        }
        self.pending_flow
            .entry(close)
            .or_default()
            .push((FlowOpr::ArrEnd, label, None));
        self.tokens.push(ExprToken::new(
            ExprTokenKind::Delimiter(ExprDelimiter::BegParen),
            src,
        ));
        let mut beg = ExprToken::new(
            ExprTokenKind::FlowOpr {
                opr: FlowOpr::ArrBeg,
                name: None,
            },
            src,
        );
        beg.flow_label = Some(label);
        self.tokens.push(beg);
        self.flow_stack.push(label);
        Ok(i + 2)
    }

    /// The identifier that must follow a flow variable keyword.
    fn flow_var_name(&mut self, stn: &Sentence, kwd_pos: usize, kwd: &str) -> CResult<String> {
        match stn.kind(kwd_pos + 1) {
            Some(PrTokenKind::Identifier(name)) => {
                self.skip.insert(kwd_pos + 1);
                self.flow_var_names.insert(name.clone());
                Ok(name.clone())
            }
            _ => Err(CompileError::new(
                ErrorKind::FlowKeywordSequence {
                    construct: "array",
                    detail: format!("`{kwd}` needs a variable name"),
                },
                stn.src(kwd_pos),
            )),
        }
    }

    /// Emit the queued flow operators for one position, then skip the
    /// keyword (and, for the closing position, emit the paren too).
    fn emit_flow_ops(
        &mut self,
        stn: &Sentence,
        i: usize,
        ops: Vec<(FlowOpr, CpuLon, Option<String>)>,
    ) -> CResult<usize> {
        let src = stn.src(i);
        let mut closes = false;
        for (opr, label, name) in ops {
            if matches!(opr, FlowOpr::ForEnd | FlowOpr::ArrEnd) {
                closes = true;
            }
            let mut token = ExprToken::new(ExprTokenKind::FlowOpr { opr, name }, src);
            token.flow_label = Some(label);
            self.tokens.push(token);
        }
        if closes {
            self.tokens.push(ExprToken::new(
                ExprTokenKind::Delimiter(ExprDelimiter::EndParen),
                src,
            ));
            self.flow_stack.pop();
        }
        Ok(i + 1)
    }

    // ── Identifiers ────────────────────────────────────────────────────

    fn on_identifier(&mut self, stn: &Sentence, i: usize, name: &str) -> CResult<usize> {
        let src = stn.src(i);
        // Module tracker alias: `alias.member`.
        if let Some(module) = self.st.trk_search(name) {
            return self.on_tracker(stn, i, name, module);
        }
        // Function call in the current module.
        if stn.is_punctuator(i + 1, PrPunctuator::BegParen) {
            let parm_nr = count_parameters(stn, i + 1, stn.len() - 1)?;
            self.tokens.push(ExprToken::new(
                ExprTokenKind::Function {
                    name: name.to_string(),
                    module: self.scope.module,
                    parm_nr,
                },
                src,
            ));
            return Ok(i + 1);
        }
        // Regular variable.
        if let Some(var) = self.st.var_search(name, &self.scope) {
            let mut token = ExprToken::this_var(self.st, var, src);
            token.source_var = Some(var);
            self.tokens.push(token);
            return Ok(i + 1);
        }
        // An undefined variable already introduced in this expression,
        // or one a flow operator will declare during evaluation.
        let undef = self
            .tokens
            .iter()
            .find(|t| matches!(&t.kind, ExprTokenKind::UndefVar(n) if n == name))
            .cloned();
        if let Some(mut token) = undef {
            token.src = src;
            self.tokens.push(token);
            return Ok(i + 1);
        }
        if self.flow_var_names.contains(name) {
            self.tokens.push(ExprToken::new(
                ExprTokenKind::UndefVar(name.to_string()),
                src,
            ));
            return Ok(i + 1);
        }
        Err(CompileError::new(
            ErrorKind::UndefinedIdentifier(name.to_string()),
            src,
        ))
    }

    /// `alias.member` resolves inside the tracked module.
    fn on_tracker(
        &mut self,
        stn: &Sentence,
        i: usize,
        alias: &str,
        module: ModIndex,
    ) -> CResult<usize> {
        let src = stn.src(i);
        if !stn.is_operator(i + 1, PrOperator::Member) {
            return Err(CompileError::new(
                ErrorKind::BareTracker(alias.to_string()),
                src,
            ));
        }
        let member = match stn.kind(i + 2) {
            Some(PrTokenKind::Identifier(name)) => name.clone(),
            _ => {
                return Err(CompileError::new(
                    ErrorKind::BareTracker(alias.to_string()),
                    src,
                ))
            }
        };
        if stn.is_punctuator(i + 3, PrPunctuator::BegParen) {
            let parm_nr = count_parameters(stn, i + 3, stn.len() - 1)?;
            self.tokens.push(ExprToken::new(
                ExprTokenKind::Function {
                    name: member,
                    module,
                    parm_nr,
                },
                src,
            ));
            return Ok(i + 3);
        }
        let module_scope = ScopeDef::module(module);
        if let Some(var) = self.st.var_search(&member, &module_scope) {
            let mut token = ExprToken::this_var(self.st, var, src);
            token.source_var = Some(var);
            self.tokens.push(token);
            return Ok(i + 3);
        }
        Err(CompileError::new(
            ErrorKind::UndefinedIdentifier(format!("{alias}.{member}")),
            src,
        ))
    }

    // ── Type names ─────────────────────────────────────────────────────

    fn on_type_name(&mut self, stn: &Sentence, i: usize, name: &str) -> CResult<usize> {
        let src = stn.src(i);
        let typ = self
            .st
            .typ_search(name, &self.scope)
            .ok_or_else(|| CompileError::new(ErrorKind::UndefinedType(name.to_string()), src))?;

        // `Type.member`: enum literal or reflective constant.
        if stn.is_operator(i + 1, PrOperator::Member) {
            let member = match stn.kind(i + 2) {
                Some(PrTokenKind::Identifier(m)) => m.clone(),
                _ => {
                    return Err(CompileError::new(
                        ErrorKind::MissingOperand {
                            opr: ".".into(),
                            side: "right",
                        },
                        src,
                    ))
                }
            };
            let token = self.type_member_token(typ, name, &member, src)?;
            self.tokens.push(token);
            return Ok(i + 3);
        }

        // `Type(...)`: constructor call.
        if stn.is_punctuator(i + 1, PrPunctuator::BegParen) {
            if self.st.typ_master(typ) != MasterType::Class {
                return Err(CompileError::new(
                    ErrorKind::InvalidCastTarget(name.to_string()),
                    src,
                ));
            }
            let parm_nr = count_parameters(stn, i + 1, stn.len() - 1)?;
            self.tokens.push(ExprToken::new(
                ExprTokenKind::Constructor { typ, parm_nr },
                src,
            ));
            return Ok(i + 1);
        }

        // `Type ident [*]`: embedded declaration.
        let (full_typ, after) = read_type_spec(self.st, &self.scope, stn, i)?;
        let var_name = match stn.kind(after) {
            Some(PrTokenKind::Identifier(v)) => v.clone(),
            _ => {
                return Err(CompileError::new(
                    ErrorKind::UnexpectedToken(format!("type `{name}` out of place")),
                    src,
                ))
            }
        };
        if let Some(member) = self.st.dot_collision_check(&self.scope, &var_name) {
            return Err(CompileError::new(
                ErrorKind::DotCollision {
                    name: var_name,
                    member,
                },
                src,
            ));
        }
        if let Some(existing) = self.st.var_search(&var_name, &self.scope) {
            if self.st.var(existing).scope == self.scope {
                return Err(CompileError::new(
                    ErrorKind::DuplicateVariable(var_name),
                    src,
                ));
            }
        }
        let (var, _) = self.st.store_variable(
            var_name,
            full_typ,
            self.scope,
            VarAttrs {
                flow_label: self.flow_stack.last().copied(),
                ..VarAttrs::default()
            },
        );
        let mut token = ExprToken::this_var(self.st, var, src);
        token.source_var = Some(var);
        let mut next = after + 1;
        if stn.is_operator(next, PrOperator::Asterisk) {
            token.has_initialization = true;
            next += 1;
        }
        self.tokens.push(token);
        self.pending_init = true;
        Ok(next)
    }

    /// `Type.member` resolution: enum members, and the reflective
    /// constants `name`, `fields`, `types` defined for every type.
    fn type_member_token(
        &mut self,
        typ: stave_symtab::TypIndex,
        type_name: &str,
        member: &str,
        src: stave_common::SrcInfo,
    ) -> CResult<ExprToken> {
        match member {
            "name" => {
                let adr = self.writer.store_lit_string(type_name);
                let mut token = ExprToken::this_str(self.st, adr, src);
                token.meta = Some(MetaAttr {
                    case: MetaCase::TypName,
                    typ: Some(typ),
                    var: None,
                });
                return Ok(token);
            }
            "fields" | "types" => {
                if self.st.typ_master(typ) != MasterType::Class {
                    return Err(CompileError::new(
                        ErrorKind::MemberOnNonClass(self.st.typ_master(typ).text().into()),
                        src,
                    ));
                }
                let str_typ = self.st.sys().str;
                let arr = self.st.dyn_array_of(str_typ, 1, ScopeDef::global());
                let mut token = ExprToken::this_str(self.st, 0, src);
                // Reflective arrays type as string[]; the emitter resolves
                // the table address at link time.
                token.kind = ExprTokenKind::Operand(crate::token::OperandData::Lit {
                    typ: arr,
                    value: crate::token::Lit::Str(0),
                });
                token.meta = Some(MetaAttr {
                    case: if member == "fields" {
                        MetaCase::FldNames
                    } else {
                        MetaCase::FldTypes
                    },
                    typ: Some(typ),
                    var: None,
                });
                return Ok(token);
            }
            _ => {}
        }
        if self.st.typ_master(typ) == MasterType::Enum {
            let fld = self.st.fld_search(typ, member).ok_or_else(|| {
                CompileError::new(
                    ErrorKind::UnknownField {
                        class: type_name.to_string(),
                        field: member.to_string(),
                    },
                    src,
                )
            })?;
            let value = self.st.fld(fld).enum_value.unwrap_or(0);
            return Ok(ExprToken::this_enu(typ, value, src));
        }
        Err(CompileError::new(
            ErrorKind::UnknownField {
                class: type_name.to_string(),
                field: member.to_string(),
            },
            src,
        ))
    }
}

// ── Free helpers ───────────────────────────────────────────────────────

/// Count call arguments from an opening paren: comma-separated items at
/// nesting level 1. Rejects leading, trailing, and doubled commas.
pub fn count_parameters(stn: &Sentence, open: usize, end: usize) -> CResult<usize> {
    debug_assert!(stn.is_punctuator(open, PrPunctuator::BegParen));
    let mut level = 0usize;
    let mut count = 0usize;
    let mut item_has_tokens = false;
    let mut i = open;
    while i <= end {
        match stn.kind(i) {
            Some(PrTokenKind::Punctuator(p)) => match p {
                PrPunctuator::BegParen | PrPunctuator::BegBracket | PrPunctuator::BegCurly => {
                    if level > 0 {
                        item_has_tokens = true;
                    }
                    level += 1;
                }
                PrPunctuator::EndParen | PrPunctuator::EndBracket | PrPunctuator::EndCurly => {
                    level -= 1;
                    if level == 0 {
                        if count > 0 && !item_has_tokens {
                            return Err(CompileError::new(
                                ErrorKind::ParameterListSyntax,
                                stn.src(i),
                            ));
                        }
                        if item_has_tokens {
                            count += 1;
                        }
                        return Ok(count);
                    }
                    item_has_tokens = true;
                }
                PrPunctuator::Comma if level == 1 => {
                    if !item_has_tokens {
                        return Err(CompileError::new(
                            ErrorKind::ParameterListSyntax,
                            stn.src(i),
                        ));
                    }
                    count += 1;
                    item_has_tokens = false;
                }
                _ => item_has_tokens = true,
            },
            Some(_) => {
                if level > 0 {
                    item_has_tokens = true;
                }
            }
            None => break,
        }
        i += 1;
    }
    Err(CompileError::new(
        ErrorKind::UnmatchedOpen('('),
        stn.src(open),
    ))
}

/// Scan a flow construct from its `(`: calls `on_kwd` for each keyword at
/// nesting level 1 and returns the position of the matching `)`.
///
/// `on_kwd` receives the running keyword state and returns the new state,
/// enforcing the construct's keyword order.
fn scan_flow_keywords<F>(
    stn: &Sentence,
    open: usize,
    end: usize,
    mut on_kwd: F,
) -> CResult<usize>
where
    F: FnMut(usize, PrKeyword, u8) -> CResult<u8>,
{
    let mut level = 0usize;
    let mut state = 0u8;
    let mut i = open;
    while i <= end {
        match stn.kind(i) {
            Some(PrTokenKind::Punctuator(p)) => match p {
                PrPunctuator::BegParen | PrPunctuator::BegBracket | PrPunctuator::BegCurly => {
                    level += 1
                }
                PrPunctuator::EndParen | PrPunctuator::EndBracket | PrPunctuator::EndCurly => {
                    level -= 1;
                    if level == 0 {
                        return Ok(i);
                    }
                }
                _ => {}
            },
            Some(PrTokenKind::Keyword(k)) if level == 1 => {
                // `for`/`array` keywords of a nested construct belong to
                // that construct's own scan.
                if !matches!(k, PrKeyword::For | PrKeyword::Array | PrKeyword::Var) {
                    state = on_kwd(i, *k, state)?;
                }
            }
            _ => {}
        }
        i += 1;
    }
    Err(CompileError::new(
        ErrorKind::UnmatchedOpen('('),
        stn.src(open),
    ))
}

/// Structure facts about one complex `{...}` initializer.
struct ComplexInfo {
    /// Dimension sizes, for arrays.
    dims: Option<(usize, stave_symtab::ArrayIndexes)>,
    /// Positions of inner braces; they shape rows but emit no tokens.
    inner_braces: Vec<usize>,
}

/// Validate the structure of a complex initializer and compute its
/// dimension sizes.
///
/// Class literals must carry exactly one entry per field. N-dimensional
/// array literals nest braces; every row must have the same length as the
/// first, and fixed geometry must match the declared sizes exactly.
fn complex_lit_scan(
    st: &SymbolTable,
    stn: &Sentence,
    typ: stave_symtab::TypIndex,
    open: usize,
    end: usize,
) -> CResult<ComplexInfo> {
    let master = st.typ_master(typ);
    let def = st.typ(typ);
    let declared_dims = def.dim_nr;
    let mut inner_braces = Vec::new();

    // Entry counts per depth. depth 1 = outer brace contents.
    let mut counts: Vec<Vec<usize>> = vec![Vec::new(); MAX_DIMS + 2];
    let mut item_counts: Vec<usize> = vec![0; MAX_DIMS + 2];
    let mut item_open: Vec<bool> = vec![false; MAX_DIMS + 2];
    let mut depth = 0usize;
    let mut paren_level = 0i32;
    let mut i = open;
    loop {
        if i > end {
            return Err(CompileError::new(
                ErrorKind::UnmatchedOpen('{'),
                stn.src(open),
            ));
        }
        match stn.kind(i) {
            Some(PrTokenKind::Punctuator(PrPunctuator::BegCurly)) if paren_level == 0 => {
                // A nested complex literal (brace preceded by a cast
                // close-paren) is one opaque entry, not a row.
                let nested = i > open && stn.is_punctuator(i - 1, PrPunctuator::EndParen);
                if nested {
                    paren_level += 1;
                    item_open[depth] = true;
                } else {
                    if depth > 0 {
                        item_open[depth] = true;
                        if i > open {
                            inner_braces.push(i);
                        }
                    }
                    depth += 1;
                    if depth > MAX_DIMS + 1 {
                        return Err(CompileError::new(
                            ErrorKind::ComplexDimMismatch {
                                expected: format!("{declared_dims}"),
                                found: format!(">{MAX_DIMS}"),
                            },
                            stn.src(i),
                        ));
                    }
                    item_counts[depth] = 0;
                    item_open[depth] = false;
                }
            }
            Some(PrTokenKind::Punctuator(PrPunctuator::EndCurly)) if paren_level == 0 => {
                if item_open[depth] {
                    item_counts[depth] += 1;
                }
                counts[depth].push(item_counts[depth]);
                depth -= 1;
                if depth == 0 {
                    break;
                }
                inner_braces.push(i);
            }
            Some(PrTokenKind::Punctuator(PrPunctuator::Comma)) if paren_level == 0 => {
                if item_open[depth] {
                    item_counts[depth] += 1;
                    item_open[depth] = false;
                }
            }
            Some(PrTokenKind::Punctuator(
                PrPunctuator::BegParen | PrPunctuator::BegBracket,
            )) => {
                paren_level += 1;
                item_open[depth] = true;
            }
            Some(PrTokenKind::Punctuator(
                PrPunctuator::EndParen | PrPunctuator::EndBracket,
            )) => {
                paren_level -= 1;
            }
            Some(PrTokenKind::Punctuator(PrPunctuator::BegCurly)) => {
                paren_level += 1;
            }
            Some(PrTokenKind::Punctuator(PrPunctuator::EndCurly)) => {
                paren_level -= 1;
            }
            Some(_) => {
                if depth > 0 {
                    item_open[depth] = true;
                }
            }
            None => {
                return Err(CompileError::new(
                    ErrorKind::UnmatchedOpen('{'),
                    stn.src(open),
                ));
            }
        }
        i += 1;
    }

    match master {
        MasterType::Class => {
            let found = counts[1].first().copied().unwrap_or(0);
            let expected = def.field_count;
            if found != expected {
                return Err(CompileError::new(
                    ErrorKind::ComplexFieldCount {
                        class: def.name.clone(),
                        expected,
                        found,
                    },
                    stn.src(open),
                ));
            }
            Ok(ComplexInfo {
                dims: None,
                inner_braces,
            })
        }
        MasterType::FixArray | MasterType::DynArray => {
            // Depth d rows must all agree with the first at that depth.
            let mut sizes: stave_symtab::ArrayIndexes = [0; MAX_DIMS];
            for d in 1..=declared_dims {
                let rows = &counts[d];
                let first = rows.first().copied().unwrap_or(0);
                for (r, &len) in rows.iter().enumerate() {
                    if len != first {
                        return Err(CompileError::new(
                            ErrorKind::ComplexRowMismatch {
                                row: r,
                                expected: first,
                                found: len,
                            },
                            stn.src(open),
                        ));
                    }
                }
                sizes[d - 1] = first as stave_common::cpu::CpuWrd;
            }
            // Deeper nesting than declared dimensions is a shape error.
            if counts[declared_dims + 1].iter().any(|&c| c > 0) {
                return Err(CompileError::new(
                    ErrorKind::ComplexDimMismatch {
                        expected: format!("{declared_dims}"),
                        found: format!("{}", declared_dims + 1),
                    },
                    stn.src(open),
                ));
            }
            if master == MasterType::FixArray {
                let dim = st.dim(def.dim_index.expect("fixed array without geometry"));
                if sizes[..declared_dims] != dim.sizes[..declared_dims] {
                    let fmt = |s: &[stave_common::cpu::CpuWrd]| {
                        s.iter()
                            .map(|v| v.to_string())
                            .collect::<Vec<_>>()
                            .join(",")
                    };
                    return Err(CompileError::new(
                        ErrorKind::ComplexDimMismatch {
                            expected: fmt(&dim.sizes[..declared_dims]),
                            found: fmt(&sizes[..declared_dims]),
                        },
                        stn.src(open),
                    ));
                }
            }
            Ok(ComplexInfo {
                dims: Some((declared_dims, sizes)),
                inner_braces,
            })
        }
        _ => Err(CompileError::new(ErrorKind::ComplexCastMissing, stn.src(open))),
    }
}

/// Surface consistency check over the finished token list: every operator
/// has operand-shaped neighbors on its required sides and delimiters
/// balance.
fn check_consistency(tokens: &[ExprToken]) -> CResult<()> {
    if tokens.is_empty() {
        return Err(CompileError::new(
            ErrorKind::EmptyExpression,
            stave_common::SrcInfo::synthetic(),
        ));
    }
    let operand_on_left = |idx: usize| -> bool {
        idx > 0
            && matches!(
                tokens[idx - 1].kind,
                ExprTokenKind::Operand(_)
                    | ExprTokenKind::UndefVar(_)
                    | ExprTokenKind::Field(_)
                    | ExprTokenKind::Delimiter(ExprDelimiter::EndParen)
                    | ExprTokenKind::Delimiter(ExprDelimiter::EndBracket)
                    | ExprTokenKind::Delimiter(ExprDelimiter::EndCurly)
                    | ExprTokenKind::Operator(ExprOperator::PostfixInc)
                    | ExprTokenKind::Operator(ExprOperator::PostfixDec)
            )
    };
    let operand_on_right = |idx: usize| -> bool {
        match tokens.get(idx + 1).map(|t| &t.kind) {
            Some(
                ExprTokenKind::Operand(_)
                | ExprTokenKind::UndefVar(_)
                | ExprTokenKind::Function { .. }
                | ExprTokenKind::Method { .. }
                | ExprTokenKind::Constructor { .. }
                | ExprTokenKind::Complex { .. }
                | ExprTokenKind::Delimiter(ExprDelimiter::BegParen)
                | ExprTokenKind::Delimiter(ExprDelimiter::BegCurly),
            ) => true,
            Some(ExprTokenKind::Operator(opr)) => {
                opr.is_unary() && !matches!(opr, ExprOperator::PostfixInc | ExprOperator::PostfixDec)
            }
            Some(ExprTokenKind::FlowOpr { .. }) => true,
            _ => false,
        }
    };
    let mut paren = 0i32;
    let mut bracket = 0i32;
    let mut curly = 0i32;
    for (i, token) in tokens.iter().enumerate() {
        match &token.kind {
            ExprTokenKind::Operator(opr) => {
                let def = opr.def();
                let postfix = matches!(opr, ExprOperator::PostfixInc | ExprOperator::PostfixDec);
                if def.arity == 2 {
                    if !operand_on_left(i) {
                        return Err(CompileError::new(
                            ErrorKind::MissingOperand {
                                opr: def.text.into(),
                                side: "left",
                            },
                            token.src,
                        ));
                    }
                    if !operand_on_right(i) {
                        return Err(CompileError::new(
                            ErrorKind::MissingOperand {
                                opr: def.text.into(),
                                side: "right",
                            },
                            token.src,
                        ));
                    }
                } else if postfix {
                    if !operand_on_left(i) {
                        return Err(CompileError::new(
                            ErrorKind::MissingOperand {
                                opr: def.text.into(),
                                side: "left",
                            },
                            token.src,
                        ));
                    }
                } else if !operand_on_right(i) {
                    return Err(CompileError::new(
                        ErrorKind::MissingOperand {
                            opr: def.text.into(),
                            side: "right",
                        },
                        token.src,
                    ));
                }
            }
            ExprTokenKind::Delimiter(d) => match d {
                ExprDelimiter::BegParen => paren += 1,
                ExprDelimiter::EndParen => {
                    paren -= 1;
                    if paren < 0 {
                        return Err(CompileError::new(ErrorKind::UnmatchedClose(')'), token.src));
                    }
                }
                ExprDelimiter::BegBracket => bracket += 1,
                ExprDelimiter::EndBracket => {
                    bracket -= 1;
                    if bracket < 0 {
                        return Err(CompileError::new(ErrorKind::UnmatchedClose(']'), token.src));
                    }
                }
                ExprDelimiter::BegCurly => curly += 1,
                ExprDelimiter::EndCurly => {
                    curly -= 1;
                    if curly < 0 {
                        return Err(CompileError::new(ErrorKind::UnmatchedClose('}'), token.src));
                    }
                }
                ExprDelimiter::Comma => {}
            },
            _ => {}
        }
    }
    if paren > 0 {
        return Err(CompileError::new(
            ErrorKind::UnmatchedOpen('('),
            tokens.last().unwrap().src,
        ));
    }
    if bracket > 0 {
        return Err(CompileError::new(
            ErrorKind::UnmatchedOpen('['),
            tokens.last().unwrap().src,
        ));
    }
    if curly > 0 {
        return Err(CompileError::new(
            ErrorKind::UnmatchedOpen('{'),
            tokens.last().unwrap().src,
        ));
    }
    Ok(())
}
