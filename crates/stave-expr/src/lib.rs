//! Expression compiler core for the Stave compiler.
//!
//! Compiles one parsed expression at a time into VM instructions through
//! a five-stage pipeline:
//!
//! 1. [`tokenize`]: parser tokens to expression tokens, with identifier
//!    resolution, casts, constructors, flow groups and complex initializers
//! 2. [`ternary`]: label binding for `?:` triples
//! 3. [`rpn`]: infix to RPN via Shunting-Yard
//! 4. [`eval`]: the RPN stack machine that type-checks, promotes,
//!    allocates temporaries and emits instructions
//! 5. [`fold`]: compile-time reduction of literal expressions
//!
//! The [`Expression`] facade wires the stages together over the symbol
//! tables and the binary writer.

pub mod blocks;
pub mod calls;
pub mod cases;
pub mod diagnostics;
pub mod eval;
pub mod flow;
pub mod fold;
pub mod master;
pub mod oper;
pub mod promote;
pub mod rpn;
pub mod ternary;
pub mod token;
pub mod tokenize;
pub mod typespec;

use stave_common::{CResult, CompileError, Diagnostics, ErrorKind, PrOperator, Sentence};
use stave_emit::BinaryWriter;
use stave_symtab::{ScopeDef, SymbolTable};

pub use eval::Evaluator;
pub use master::register_master_methods;
pub use oper::{ExprOperator, OPERATOR_TABLE};
pub use token::{AdrMode, ExprToken, ExprTokenKind, Lit};

/// One expression compile session over the shared compiler state.
///
/// The caller (the statement compiler) holds the symbol tables, the
/// binary writer, and the diagnostics sink; `Expression` borrows them for
/// a batch of compiles within one scope.
pub struct Expression<'a> {
    st: &'a mut SymbolTable,
    writer: &'a mut BinaryWriter,
    diag: &'a mut Diagnostics,
    scope: ScopeDef,
}

impl<'a> Expression<'a> {
    pub fn new(
        st: &'a mut SymbolTable,
        writer: &'a mut BinaryWriter,
        diag: &'a mut Diagnostics,
        scope: ScopeDef,
    ) -> Self {
        Self {
            st,
            writer,
            diag,
            scope,
        }
    }

    /// Stages 1-3: parser tokens to RPN.
    fn pipeline(&mut self, stn: &Sentence, beg: usize, end: usize) -> CResult<Vec<ExprToken>> {
        let mut tokens = tokenize::tokenize(self.st, self.writer, &self.scope, stn, beg, end)?;
        ternary::ternary_label(self.st, &mut tokens)?;
        rpn::infix_to_rpn(tokens)
    }

    /// Compile a token range that must produce a value. The returned
    /// token still holds its temporary lock; release it when consumed.
    pub fn compile_with_result(
        &mut self,
        stn: &Sentence,
        beg: usize,
        end: usize,
    ) -> CResult<ExprToken> {
        let rpn = self.pipeline(stn, beg, end)?;
        let mut ev = Evaluator::new(self.st, self.writer, self.diag, self.scope);
        ev.eval(rpn)?
            .ok_or_else(|| CompileError::new(ErrorKind::ResultMandatory, stn.src(beg)))
    }

    /// Compile and report whether the result folded to a literal (no
    /// code was emitted for it).
    pub fn compile_with_result_computed(
        &mut self,
        stn: &Sentence,
        beg: usize,
        end: usize,
    ) -> CResult<(ExprToken, bool)> {
        let result = self.compile_with_result(stn, beg, end)?;
        let computed = result.is_lit_value();
        Ok((result, computed))
    }

    /// Compile a token range whose value, if any, is discarded.
    pub fn compile_void(&mut self, stn: &Sentence, beg: usize, end: usize) -> CResult<()> {
        let rpn = self.pipeline(stn, beg, end)?;
        let mut ev = Evaluator::new(self.st, self.writer, self.diag, self.scope);
        if let Some(result) = ev.eval(rpn)? {
            result.release(self.st);
        }
        Ok(())
    }

    /// Evaluate a token range entirely at compile time. Refuses anything
    /// not foldable.
    pub fn compute(&mut self, stn: &Sentence, beg: usize, end: usize) -> CResult<ExprToken> {
        let rpn = self.pipeline(stn, beg, end)?;
        fold::compute_rpn(self.st, self.writer, rpn)
    }

    /// Copy one operand into another; the entry point for composite
    /// value construction.
    pub fn copy_operand(&mut self, dst: &ExprToken, src: &ExprToken) -> CResult<()> {
        blocks::copy_operand(self.st, self.writer, dst, src)
    }

    /// Initialize an operand to its type's empty value. Returns whether
    /// any code was generated.
    pub fn init_operand(&mut self, dst: &ExprToken) -> CResult<bool> {
        blocks::init_operand(self.st, self.writer, dst)
    }
}

/// Whether a surface operator admits user `operator()` overloads.
pub fn is_overloadable_operator(opr: PrOperator) -> bool {
    use ExprOperator as E;
    let mapped = match opr {
        PrOperator::Asterisk => E::Multiplication,
        PrOperator::Slash => E::Division,
        PrOperator::Percent => E::Modulus,
        PrOperator::Plus => E::Addition,
        PrOperator::Minus => E::Subtraction,
        PrOperator::ShiftLeft => E::ShiftLeft,
        PrOperator::ShiftRight => E::ShiftRight,
        PrOperator::Less => E::Less,
        PrOperator::LessEqual => E::LessEqual,
        PrOperator::Greater => E::Greater,
        PrOperator::GreaterEqual => E::GreaterEqual,
        PrOperator::Equal => E::Equal,
        PrOperator::Distinct => E::Distinct,
        PrOperator::Ampersand => E::BitwiseAnd,
        PrOperator::Caret => E::BitwiseXor,
        PrOperator::VertBar => E::BitwiseOr,
        PrOperator::AddAssign => E::AddAssign,
        PrOperator::SubAssign => E::SubAssign,
        PrOperator::MulAssign => E::MulAssign,
        PrOperator::DivAssign => E::DivAssign,
        PrOperator::ModAssign => E::ModAssign,
        PrOperator::ShlAssign => E::ShlAssign,
        PrOperator::ShrAssign => E::ShrAssign,
        PrOperator::AndAssign => E::AndAssign,
        PrOperator::XorAssign => E::XorAssign,
        PrOperator::OrAssign => E::OrAssign,
        _ => return false,
    };
    mapped.def().overloadable
}
