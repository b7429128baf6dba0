//! Operand case rules: which master-type combinations each operator
//! admits, what master the result has, and how operands promote.
//!
//! The table is searched sequentially and the first matching row wins;
//! when no row matches, the operator is rejected as a type error. Rows for
//! an operator are therefore ordered from most to least specific.

use serde::Serialize;

use stave_symtab::MasterType;

use crate::oper::ExprOperator;

/// Data promotion modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PromMode {
    /// Promote flagged operands to the rule's result master.
    ToResult,
    /// Result is the higher-ranked operand master; promote the lower one.
    ToMaximum,
    /// Promote flagged operands to an explicit target master.
    ToOther,
}

/// One row of the case-rule table.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CaseRule {
    pub opr: ExprOperator,
    /// Allowed operand masters, as bitmasks. Unary operators leave the
    /// second mask zero.
    pub masks: [u16; 2],
    pub mode: PromMode,
    /// Per-operand: operand participates in promotion.
    pub promote: [bool; 2],
    /// Promotion target for `ToOther`.
    pub prom_master: Option<MasterType>,
    /// Result master. Ignored under `ToMaximum` (the maximum wins).
    pub result: MasterType,
}

impl CaseRule {
    /// Result master for a concrete operand pair.
    pub fn result_master(&self, m1: MasterType, m2: Option<MasterType>) -> MasterType {
        match self.mode {
            PromMode::ToMaximum => {
                let m2 = m2.unwrap_or(m1);
                if m2.promotion_rank() > m1.promotion_rank() {
                    m2
                } else {
                    m1
                }
            }
            _ => self.result,
        }
    }
}

// ── Mask shorthands ────────────────────────────────────────────────────

const B: u16 = 1 << (MasterType::Boolean as u8);
const C: u16 = 1 << (MasterType::Char as u8);
const S: u16 = 1 << (MasterType::Short as u8);
const I: u16 = 1 << (MasterType::Integer as u8);
const L: u16 = 1 << (MasterType::Long as u8);
const F: u16 = 1 << (MasterType::Float as u8);
const ST: u16 = 1 << (MasterType::String as u8);
const EN: u16 = 1 << (MasterType::Enum as u8);
const CL: u16 = 1 << (MasterType::Class as u8);
const FA: u16 = 1 << (MasterType::FixArray as u8);
const DA: u16 = 1 << (MasterType::DynArray as u8);

/// Integer masters.
const INTS: u16 = C | S | I | L;
/// Numeric masters (integers plus float).
const NUM: u16 = INTS | F;

const fn rule(
    opr: ExprOperator,
    m1: u16,
    m2: u16,
    mode: PromMode,
    p1: bool,
    p2: bool,
    prom_master: Option<MasterType>,
    result: MasterType,
) -> CaseRule {
    CaseRule {
        opr,
        masks: [m1, m2],
        mode,
        promote: [p1, p2],
        prom_master,
        result,
    }
}

/// Same-master identity rule for a unary operator.
const fn same(opr: ExprOperator, mask: u16, result: MasterType) -> CaseRule {
    rule(opr, mask, 0, PromMode::ToResult, false, false, None, result)
}

use ExprOperator as Op;
use MasterType::{Boolean, Char, Float, Integer, Long, Short, String as StrM};
use PromMode::{ToMaximum, ToOther, ToResult};

/// The case-rule table. Sequential search, first match wins.
#[rustfmt::skip]
pub static CASE_RULES: &[CaseRule] = &[
    // ── Increments and decrements: identity per numeric master ─────────
    same(Op::PostfixInc, C, Char), same(Op::PostfixInc, S, Short),
    same(Op::PostfixInc, I, Integer), same(Op::PostfixInc, L, Long),
    same(Op::PostfixInc, F, Float),
    same(Op::PostfixDec, C, Char), same(Op::PostfixDec, S, Short),
    same(Op::PostfixDec, I, Integer), same(Op::PostfixDec, L, Long),
    same(Op::PostfixDec, F, Float),
    same(Op::PrefixInc, C, Char), same(Op::PrefixInc, S, Short),
    same(Op::PrefixInc, I, Integer), same(Op::PrefixInc, L, Long),
    same(Op::PrefixInc, F, Float),
    same(Op::PrefixDec, C, Char), same(Op::PrefixDec, S, Short),
    same(Op::PrefixDec, I, Integer), same(Op::PrefixDec, L, Long),
    same(Op::PrefixDec, F, Float),

    // ── Unary sign and complements ─────────────────────────────────────
    same(Op::UnaryPlus, C, Char), same(Op::UnaryPlus, S, Short),
    same(Op::UnaryPlus, I, Integer), same(Op::UnaryPlus, L, Long),
    same(Op::UnaryPlus, F, Float),
    same(Op::UnaryMinus, C, Char), same(Op::UnaryMinus, S, Short),
    same(Op::UnaryMinus, I, Integer), same(Op::UnaryMinus, L, Long),
    same(Op::UnaryMinus, F, Float),
    same(Op::LogicalNot, B, Boolean),
    same(Op::BitwiseNot, C, Char), same(Op::BitwiseNot, S, Short),
    same(Op::BitwiseNot, I, Integer), same(Op::BitwiseNot, L, Long),

    // ── Multiplicative and additive ────────────────────────────────────
    rule(Op::Multiplication, NUM, NUM, ToMaximum, true, true, None, Integer),
    rule(Op::Division,       NUM, NUM, ToMaximum, true, true, None, Integer),
    rule(Op::Modulus,        INTS, INTS, ToMaximum, true, true, None, Integer),
    rule(Op::Addition,       NUM, NUM, ToMaximum, true, true, None, Integer),
    rule(Op::Addition,       ST, ST, ToResult, false, false, None, StrM),
    rule(Op::Addition,       ST, C, ToResult, false, true, None, StrM),
    rule(Op::Addition,       C, ST, ToResult, true, false, None, StrM),
    rule(Op::Subtraction,    NUM, NUM, ToMaximum, true, true, None, Integer),

    // ── Shifts: result keeps the left master, count promotes to int ────
    rule(Op::ShiftLeft,  C, INTS, ToOther, false, true, Some(Integer), Char),
    rule(Op::ShiftLeft,  S, INTS, ToOther, false, true, Some(Integer), Short),
    rule(Op::ShiftLeft,  I, INTS, ToOther, false, true, Some(Integer), Integer),
    rule(Op::ShiftLeft,  L, INTS, ToOther, false, true, Some(Integer), Long),
    rule(Op::ShiftRight, C, INTS, ToOther, false, true, Some(Integer), Char),
    rule(Op::ShiftRight, S, INTS, ToOther, false, true, Some(Integer), Short),
    rule(Op::ShiftRight, I, INTS, ToOther, false, true, Some(Integer), Integer),
    rule(Op::ShiftRight, L, INTS, ToOther, false, true, Some(Integer), Long),

    // ── Comparisons ────────────────────────────────────────────────────
    rule(Op::Less,         NUM, NUM, ToMaximum, true, true, None, Boolean),
    rule(Op::Less,         ST, ST, ToResult, false, false, None, Boolean),
    rule(Op::LessEqual,    NUM, NUM, ToMaximum, true, true, None, Boolean),
    rule(Op::LessEqual,    ST, ST, ToResult, false, false, None, Boolean),
    rule(Op::Greater,      NUM, NUM, ToMaximum, true, true, None, Boolean),
    rule(Op::Greater,      ST, ST, ToResult, false, false, None, Boolean),
    rule(Op::GreaterEqual, NUM, NUM, ToMaximum, true, true, None, Boolean),
    rule(Op::GreaterEqual, ST, ST, ToResult, false, false, None, Boolean),
    rule(Op::Equal,    NUM, NUM, ToMaximum, true, true, None, Boolean),
    rule(Op::Equal,    B, B, ToResult, false, false, None, Boolean),
    rule(Op::Equal,    ST, ST, ToResult, false, false, None, Boolean),
    rule(Op::Equal,    EN, EN, ToResult, false, false, None, Boolean),
    rule(Op::Distinct, NUM, NUM, ToMaximum, true, true, None, Boolean),
    rule(Op::Distinct, B, B, ToResult, false, false, None, Boolean),
    rule(Op::Distinct, ST, ST, ToResult, false, false, None, Boolean),
    rule(Op::Distinct, EN, EN, ToResult, false, false, None, Boolean),

    // ── Bitwise and logical ────────────────────────────────────────────
    rule(Op::BitwiseAnd, INTS, INTS, ToMaximum, true, true, None, Integer),
    rule(Op::BitwiseXor, INTS, INTS, ToMaximum, true, true, None, Integer),
    rule(Op::BitwiseOr,  INTS, INTS, ToMaximum, true, true, None, Integer),
    rule(Op::LogicalAnd, B, B, ToResult, false, false, None, Boolean),
    rule(Op::LogicalOr,  B, B, ToResult, false, false, None, Boolean),

    // ── Initialization: target master fixes the result ─────────────────
    rule(Op::Initialize, B, B, ToResult, false, false, None, Boolean),
    rule(Op::Initialize, C, C, ToResult, false, false, None, Char),
    rule(Op::Initialize, S, C | S, ToResult, false, true, None, Short),
    rule(Op::Initialize, I, C | S | I, ToResult, false, true, None, Integer),
    rule(Op::Initialize, L, INTS, ToResult, false, true, None, Long),
    rule(Op::Initialize, F, NUM, ToResult, false, true, None, Float),
    rule(Op::Initialize, ST, ST | C, ToResult, false, true, None, StrM),
    rule(Op::Initialize, EN, EN, ToResult, false, false, None, MasterType::Enum),
    rule(Op::Initialize, CL, CL, ToResult, false, false, None, MasterType::Class),
    rule(Op::Initialize, FA, FA, ToResult, false, false, None, MasterType::FixArray),
    rule(Op::Initialize, DA, DA | FA, ToResult, false, false, None, MasterType::DynArray),

    // ── Assignment: same shape as initialization ───────────────────────
    rule(Op::Assign, B, B, ToResult, false, false, None, Boolean),
    rule(Op::Assign, C, C, ToResult, false, false, None, Char),
    rule(Op::Assign, S, C | S, ToResult, false, true, None, Short),
    rule(Op::Assign, I, C | S | I, ToResult, false, true, None, Integer),
    rule(Op::Assign, L, INTS, ToResult, false, true, None, Long),
    rule(Op::Assign, F, NUM, ToResult, false, true, None, Float),
    rule(Op::Assign, ST, ST | C, ToResult, false, true, None, StrM),
    rule(Op::Assign, EN, EN, ToResult, false, false, None, MasterType::Enum),
    rule(Op::Assign, CL, CL, ToResult, false, false, None, MasterType::Class),
    rule(Op::Assign, FA, FA, ToResult, false, false, None, MasterType::FixArray),
    rule(Op::Assign, DA, DA | FA, ToResult, false, false, None, MasterType::DynArray),

    // ── Compound assignments ───────────────────────────────────────────
    rule(Op::AddAssign, C, C, ToResult, false, false, None, Char),
    rule(Op::AddAssign, S, C | S, ToResult, false, true, None, Short),
    rule(Op::AddAssign, I, C | S | I, ToResult, false, true, None, Integer),
    rule(Op::AddAssign, L, INTS, ToResult, false, true, None, Long),
    rule(Op::AddAssign, F, NUM, ToResult, false, true, None, Float),
    rule(Op::AddAssign, ST, ST | C, ToResult, false, true, None, StrM),
    rule(Op::SubAssign, C, C, ToResult, false, false, None, Char),
    rule(Op::SubAssign, S, C | S, ToResult, false, true, None, Short),
    rule(Op::SubAssign, I, C | S | I, ToResult, false, true, None, Integer),
    rule(Op::SubAssign, L, INTS, ToResult, false, true, None, Long),
    rule(Op::SubAssign, F, NUM, ToResult, false, true, None, Float),
    rule(Op::MulAssign, C, C, ToResult, false, false, None, Char),
    rule(Op::MulAssign, S, C | S, ToResult, false, true, None, Short),
    rule(Op::MulAssign, I, C | S | I, ToResult, false, true, None, Integer),
    rule(Op::MulAssign, L, INTS, ToResult, false, true, None, Long),
    rule(Op::MulAssign, F, NUM, ToResult, false, true, None, Float),
    rule(Op::DivAssign, C, C, ToResult, false, false, None, Char),
    rule(Op::DivAssign, S, C | S, ToResult, false, true, None, Short),
    rule(Op::DivAssign, I, C | S | I, ToResult, false, true, None, Integer),
    rule(Op::DivAssign, L, INTS, ToResult, false, true, None, Long),
    rule(Op::DivAssign, F, NUM, ToResult, false, true, None, Float),
    rule(Op::ModAssign, C, C, ToResult, false, false, None, Char),
    rule(Op::ModAssign, S, C | S, ToResult, false, true, None, Short),
    rule(Op::ModAssign, I, C | S | I, ToResult, false, true, None, Integer),
    rule(Op::ModAssign, L, INTS, ToResult, false, true, None, Long),
    rule(Op::ShlAssign, C, INTS, ToOther, false, true, Some(Integer), Char),
    rule(Op::ShlAssign, S, INTS, ToOther, false, true, Some(Integer), Short),
    rule(Op::ShlAssign, I, INTS, ToOther, false, true, Some(Integer), Integer),
    rule(Op::ShlAssign, L, INTS, ToOther, false, true, Some(Integer), Long),
    rule(Op::ShrAssign, C, INTS, ToOther, false, true, Some(Integer), Char),
    rule(Op::ShrAssign, S, INTS, ToOther, false, true, Some(Integer), Short),
    rule(Op::ShrAssign, I, INTS, ToOther, false, true, Some(Integer), Integer),
    rule(Op::ShrAssign, L, INTS, ToOther, false, true, Some(Integer), Long),
    rule(Op::AndAssign, C, C, ToResult, false, false, None, Char),
    rule(Op::AndAssign, S, C | S, ToResult, false, true, None, Short),
    rule(Op::AndAssign, I, C | S | I, ToResult, false, true, None, Integer),
    rule(Op::AndAssign, L, INTS, ToResult, false, true, None, Long),
    rule(Op::XorAssign, C, C, ToResult, false, false, None, Char),
    rule(Op::XorAssign, S, C | S, ToResult, false, true, None, Short),
    rule(Op::XorAssign, I, C | S | I, ToResult, false, true, None, Integer),
    rule(Op::XorAssign, L, INTS, ToResult, false, true, None, Long),
    rule(Op::OrAssign, C, C, ToResult, false, false, None, Char),
    rule(Op::OrAssign, S, C | S, ToResult, false, true, None, Short),
    rule(Op::OrAssign, I, C | S | I, ToResult, false, true, None, Integer),
    rule(Op::OrAssign, L, INTS, ToResult, false, true, None, Long),
];

/// First-match lookup. `m2` is `None` for unary operators.
pub fn find_case_rule(
    opr: ExprOperator,
    m1: MasterType,
    m2: Option<MasterType>,
) -> Option<&'static CaseRule> {
    CASE_RULES.iter().find(|r| {
        if r.opr != opr {
            return false;
        }
        if r.masks[0] & m1.mask() == 0 {
            return false;
        }
        match m2 {
            Some(m2) => r.masks[1] & m2.mask() != 0,
            None => r.masks[1] == 0,
        }
    })
}
