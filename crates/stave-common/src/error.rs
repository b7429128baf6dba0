use std::fmt;

use serde::Serialize;

use crate::span::SrcInfo;

/// Result alias used by every fallible operation in the compiler core.
pub type CResult<T> = Result<T, CompileError>;

/// Severity of a diagnostic. Warnings never abort a compile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    Error,
    Warning,
}

/// A compile diagnostic: a kind plus the source position of the offending
/// token.
///
/// The expression compiler is fail-fast; the first `Error`-severity
/// diagnostic terminates the current expression compile. Warnings and a
/// bounded queue of delayed errors are collected in [`Diagnostics`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompileError {
    pub kind: ErrorKind,
    pub src: SrcInfo,
}

impl CompileError {
    /// Create a new diagnostic.
    pub fn new(kind: ErrorKind, src: SrcInfo) -> Self {
        Self { kind, src }
    }

    pub fn severity(&self) -> Severity {
        self.kind.severity()
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

impl std::error::Error for CompileError {}

/// Every kind of diagnostic the expression compiler can raise.
///
/// Variants group into the seven abstract families: lexical structure,
/// name resolution, type errors, initialization, compile-time arithmetic,
/// complex-literal structure, and internal inconsistencies. The last two
/// variants are warnings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ErrorKind {
    // ── Lexical structure ──────────────────────────────────────────────
    /// An opening delimiter was never closed.
    UnmatchedOpen(char),
    /// A closing delimiter had no matching opener.
    UnmatchedClose(char),
    /// A `:` outside any ternary expression.
    StrayColon,
    /// A `?` without a matching `:`.
    TernaryMissingColon,
    /// An operator is missing an operand on one side.
    MissingOperand {
        opr: String,
        side: &'static str,
    },
    /// The token range to compile is empty.
    EmptyExpression,
    /// A parameter list has a leading, trailing, or doubled comma.
    ParameterListSyntax,
    /// A `for(...)`/`array(...)` keyword is missing or out of order.
    FlowKeywordSequence {
        construct: &'static str,
        detail: String,
    },
    /// A token kind that cannot occur inside an expression.
    UnexpectedToken(String),

    // ── Name resolution ────────────────────────────────────────────────
    /// An identifier that resolves to nothing visible in scope.
    UndefinedIdentifier(String),
    /// A type name that resolves to no declared type.
    UndefinedType(String),
    /// No function/method overload matches the argument types.
    UndefinedFunction {
        name: String,
        parms: String,
    },
    /// A variable declared twice in the same scope.
    DuplicateVariable(String),
    /// A new variable name collides with a visible class/enum member.
    DotCollision {
        name: String,
        member: String,
    },
    /// A private function referenced from another module.
    PrivateFunction {
        name: String,
        module: String,
    },
    /// A class member not visible from the current scope.
    HiddenMember {
        name: String,
        class: String,
    },
    /// A field access that names no field of the class.
    UnknownField {
        class: String,
        field: String,
    },
    /// A module tracker alias used without a member access.
    BareTracker(String),

    // ── Type errors ────────────────────────────────────────────────────
    /// No case rule admits the operand master types for this operator.
    OperatorTypeMismatch {
        opr: String,
        left: String,
        right: String,
    },
    /// No case rule admits the operand master type for a unary operator.
    UnaryTypeMismatch {
        opr: String,
        operand: String,
    },
    /// A type cast to a target that casts cannot produce.
    InvalidCastTarget(String),
    /// An argument does not promote to the declared parameter type.
    ArgumentTypeMismatch {
        fun: String,
        pos: usize,
        expected: String,
        found: String,
    },
    /// A reference parameter requires an lvalue argument.
    ArgumentNotLValue {
        fun: String,
        pos: usize,
    },
    /// A constant passed where a mutable reference is required.
    ArgumentConst {
        fun: String,
        pos: usize,
    },
    /// Subscript applied to a type that is not an array or string.
    SubscriptNonIndexable(String),
    /// Subscript dimension count differs from the array's.
    SubscriptDimMismatch {
        expected: usize,
        found: usize,
    },
    /// Member access on a non-class operand.
    MemberOnNonClass(String),
    /// Assignment target is not an lvalue.
    AssignNonLValue,
    /// Write to a constant.
    ConstModification,
    /// A void function result consumed by a non-sequence operator.
    VoidResultUsed(String),
    /// Ternary branches produce incompatible types.
    TernaryBranchMismatch {
        left: String,
        right: String,
    },
    /// The index variable of `array(...)` must be a non-const word variable.
    FlowIndexVarInvalid(String),
    /// `array(...)` applied to a non-array source.
    FlowSourceNotArray(String),
    /// Expression was required to produce a result but did not.
    ResultMandatory,

    // ── Initialization ─────────────────────────────────────────────────
    /// An operand that must be initialized is not.
    UninitializedOperand(String),
    /// A member method called on an uninitialized receiver.
    UninitializedReceiver(String),

    // ── Compile-time arithmetic ────────────────────────────────────────
    /// Integer overflow while folding, e.g.
    /// "overflow multiplying 2147483647 * 2 as Integer".
    FoldOverflow {
        operation: String,
        master: String,
    },
    /// Division by a zero literal.
    DivisionByZero,
    /// Modulo by a zero literal.
    ModuloByZero,
    /// A floating point operation produced a non-finite result.
    FloatException(String),
    /// A literal does not fit the promotion target.
    PromotionOutOfRange {
        value: String,
        to: String,
    },
    /// `compute` called on an expression that is not compile-time foldable.
    NotComputable,

    // ── Complex literal structure ──────────────────────────────────────
    /// `{...}` without a preceding class/array type cast.
    ComplexCastMissing,
    /// Literal dimension sizes disagree with the declared fixed geometry.
    ComplexDimMismatch {
        expected: String,
        found: String,
    },
    /// A row of an N-dimensional literal differs in length from the first.
    ComplexRowMismatch {
        row: usize,
        expected: usize,
        found: usize,
    },
    /// A class literal with too few or too many field entries.
    ComplexFieldCount {
        class: String,
        expected: usize,
        found: usize,
    },

    // ── Internal inconsistency ─────────────────────────────────────────
    /// An invariant of the evaluator was violated; always a compiler bug.
    Internal(String),

    // ── Warnings ───────────────────────────────────────────────────────
    /// A variable declared but never read.
    UnusedVariable(String),
    /// A ternary/flow branch that can never execute.
    UnreachableBranch,
}

impl ErrorKind {
    pub fn severity(&self) -> Severity {
        match self {
            Self::UnusedVariable(_) | Self::UnreachableBranch => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnmatchedOpen(c) => write!(f, "unmatched `{c}`"),
            Self::UnmatchedClose(c) => write!(f, "unmatched `{c}` without opener"),
            Self::StrayColon => write!(f, "`:` outside of ternary expression"),
            Self::TernaryMissingColon => write!(f, "`?` without matching `:`"),
            Self::MissingOperand { opr, side } => {
                write!(f, "operator `{opr}` is missing an operand on the {side}")
            }
            Self::EmptyExpression => write!(f, "empty expression"),
            Self::ParameterListSyntax => write!(f, "malformed parameter list"),
            Self::FlowKeywordSequence { construct, detail } => {
                write!(f, "malformed `{construct}(...)`: {detail}")
            }
            Self::UnexpectedToken(t) => write!(f, "unexpected token `{t}` in expression"),
            Self::UndefinedIdentifier(name) => write!(f, "undefined identifier `{name}`"),
            Self::UndefinedType(name) => write!(f, "undefined type `{name}`"),
            Self::UndefinedFunction { name, parms } => {
                write!(f, "no matching overload for `{name}({parms})`")
            }
            Self::DuplicateVariable(name) => {
                write!(f, "variable `{name}` is already declared in this scope")
            }
            Self::DotCollision { name, member } => write!(
                f,
                "variable `{name}` collides with visible member `{member}`"
            ),
            Self::PrivateFunction { name, module } => {
                write!(f, "function `{name}` is private to module `{module}`")
            }
            Self::HiddenMember { name, class } => {
                write!(f, "member `{name}` of class `{class}` is not visible here")
            }
            Self::UnknownField { class, field } => {
                write!(f, "class `{class}` has no field `{field}`")
            }
            Self::BareTracker(name) => write!(
                f,
                "module alias `{name}` must be followed by a member access"
            ),
            Self::OperatorTypeMismatch { opr, left, right } => write!(
                f,
                "operator `{opr}` is not defined for `{left}` and `{right}`"
            ),
            Self::UnaryTypeMismatch { opr, operand } => {
                write!(f, "operator `{opr}` is not defined for `{operand}`")
            }
            Self::InvalidCastTarget(t) => write!(f, "cannot cast to `{t}`"),
            Self::ArgumentTypeMismatch {
                fun,
                pos,
                expected,
                found,
            } => write!(
                f,
                "argument {pos} of `{fun}` expects `{expected}`, found `{found}`"
            ),
            Self::ArgumentNotLValue { fun, pos } => write!(
                f,
                "argument {pos} of `{fun}` is passed by reference and must be an lvalue"
            ),
            Self::ArgumentConst { fun, pos } => write!(
                f,
                "argument {pos} of `{fun}` is passed by reference and cannot be constant"
            ),
            Self::SubscriptNonIndexable(m) => {
                write!(f, "type `{m}` cannot be subscripted")
            }
            Self::SubscriptDimMismatch { expected, found } => write!(
                f,
                "subscript has {found} dimensions, array has {expected}"
            ),
            Self::MemberOnNonClass(m) => {
                write!(f, "member access on non-class type `{m}`")
            }
            Self::AssignNonLValue => write!(f, "assignment target is not an lvalue"),
            Self::ConstModification => write!(f, "cannot modify a constant"),
            Self::VoidResultUsed(name) => {
                write!(f, "void result of `{name}()` used as an operand")
            }
            Self::TernaryBranchMismatch { left, right } => write!(
                f,
                "ternary branches have incompatible types `{left}` and `{right}`"
            ),
            Self::FlowIndexVarInvalid(name) => write!(
                f,
                "index variable `{name}` must be a non-constant word variable"
            ),
            Self::FlowSourceNotArray(m) => {
                write!(f, "`array(...)` source must be an array, found `{m}`")
            }
            Self::ResultMandatory => {
                write!(f, "expression does not produce a result")
            }
            Self::UninitializedOperand(name) => {
                write!(f, "`{name}` is used before initialization")
            }
            Self::UninitializedReceiver(name) => {
                write!(f, "method called on uninitialized `{name}`")
            }
            Self::FoldOverflow { operation, master } => {
                write!(f, "overflow {operation} as {master}")
            }
            Self::DivisionByZero => write!(f, "division by zero"),
            Self::ModuloByZero => write!(f, "modulo by zero"),
            Self::FloatException(op) => {
                write!(f, "floating point exception {op}")
            }
            Self::PromotionOutOfRange { value, to } => {
                write!(f, "value {value} does not fit in `{to}`")
            }
            Self::NotComputable => {
                write!(f, "expression is not computable at compile time")
            }
            Self::ComplexCastMissing => write!(
                f,
                "`{{...}}` initializer requires a preceding class or array cast"
            ),
            Self::ComplexDimMismatch { expected, found } => write!(
                f,
                "initializer dimensions [{found}] do not match declared [{expected}]"
            ),
            Self::ComplexRowMismatch {
                row,
                expected,
                found,
            } => write!(
                f,
                "row {row} of initializer has {found} elements, expected {expected}"
            ),
            Self::ComplexFieldCount {
                class,
                expected,
                found,
            } => write!(
                f,
                "initializer for class `{class}` has {found} fields, expected {expected}"
            ),
            Self::Internal(msg) => write!(f, "internal compiler error: {msg}"),
            Self::UnusedVariable(name) => {
                write!(f, "variable `{name}` is never used")
            }
            Self::UnreachableBranch => write!(f, "branch is unreachable"),
        }
    }
}

/// Upper bound on the delayed-error queue within one compile call.
const MAX_DELAYED: usize = 8;

/// Collector for warnings and delayed errors during one expression compile.
///
/// The compile itself is fail-fast (first error returns `Err`), but some
/// paths queue related secondary diagnostics (one per ambiguous argument,
/// for instance) which the caller flushes on exit. The queue is bounded;
/// once full, further delays are dropped.
#[derive(Debug, Default)]
pub struct Diagnostics {
    warnings: Vec<CompileError>,
    delayed: Vec<CompileError>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a warning. Warnings never abort.
    pub fn warn(&mut self, kind: ErrorKind, src: SrcInfo) {
        debug_assert_eq!(kind.severity(), Severity::Warning);
        self.warnings.push(CompileError::new(kind, src));
    }

    /// Queue a secondary error to be reported with the primary failure.
    /// Returns false when the queue is full and the error was dropped.
    pub fn delay(&mut self, kind: ErrorKind, src: SrcInfo) -> bool {
        if self.delayed.len() >= MAX_DELAYED {
            return false;
        }
        self.delayed.push(CompileError::new(kind, src));
        true
    }

    /// Drain the delayed queue. Called when a compile exits.
    pub fn flush_delayed(&mut self) -> Vec<CompileError> {
        std::mem::take(&mut self.delayed)
    }

    pub fn warnings(&self) -> &[CompileError] {
        &self.warnings
    }

    pub fn take_warnings(&mut self) -> Vec<CompileError> {
        std::mem::take(&mut self.warnings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::{FileId, SrcInfo};

    fn at() -> SrcInfo {
        SrcInfo::new(FileId(0), 3, 14)
    }

    #[test]
    fn display_names_the_entities() {
        let err = CompileError::new(
            ErrorKind::OperatorTypeMismatch {
                opr: "+".into(),
                left: "Boolean".into(),
                right: "String".into(),
            },
            at(),
        );
        assert_eq!(
            err.to_string(),
            "operator `+` is not defined for `Boolean` and `String`"
        );
    }

    #[test]
    fn fold_overflow_message_matches_compiler_style() {
        let kind = ErrorKind::FoldOverflow {
            operation: "multiplying 2147483647 * 2".into(),
            master: "Integer".into(),
        };
        assert_eq!(
            kind.to_string(),
            "overflow multiplying 2147483647 * 2 as Integer"
        );
    }

    #[test]
    fn severity_split() {
        assert_eq!(ErrorKind::DivisionByZero.severity(), Severity::Error);
        assert_eq!(
            ErrorKind::UnusedVariable("x".into()).severity(),
            Severity::Warning
        );
    }

    #[test]
    fn delayed_queue_is_bounded() {
        let mut diag = Diagnostics::new();
        for _ in 0..MAX_DELAYED {
            assert!(diag.delay(ErrorKind::ParameterListSyntax, at()));
        }
        assert!(!diag.delay(ErrorKind::ParameterListSyntax, at()));
        assert_eq!(diag.flush_delayed().len(), MAX_DELAYED);
        assert!(diag.flush_delayed().is_empty());
    }
}
