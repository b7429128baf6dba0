//! Function, parameter, and overload entries.

use serde::Serialize;

use stave_common::cpu::CpuAdr;

use crate::scope::ScopeDef;
use crate::types::{MasterType, ModIndex, TypIndex};
use crate::vars::VarIndex;

/// Index of a function entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct FunIndex(pub usize);

/// Index of a parameter entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ParmIndex(pub usize);

/// What kind of callable an entry is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FunKind {
    /// Free function.
    Function,
    /// Class member function (including constructors/initializers).
    Member,
    /// Built-in method on a master type, dispatched by the core.
    MasterMethod,
    /// User-declared operator overload.
    Operator,
}

/// How a callee receives its arguments and control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CallConv {
    /// Same-function-body nested callee: arguments move (`MV*`) straight
    /// into the callee's parameter slots, control transfers with `CALLN`.
    Local,
    /// Module-scope callee: arguments go on the parameter stack
    /// (`PUSH*`/`REFPU`), control transfers with `CALL`.
    Module,
    /// VM-implemented callee (`SCALL`).
    System,
    /// Dynamic-library callee: pushes carry reference/const flags
    /// (`LPU*`/`LRPU*`), control transfers with `LCALL`.
    DynLib,
}

/// A callable entry.
#[derive(Debug, Clone, Serialize)]
pub struct FunDef {
    pub name: String,
    pub kind: FunKind,
    pub module: ModIndex,
    pub scope: ScopeDef,
    /// Private callables are reachable only from their own module.
    pub is_private: bool,
    /// Result type; `None` is a void callable.
    pub typ: Option<TypIndex>,
    /// Parameter range into the parameter table.
    pub parm_low: usize,
    pub parm_count: usize,
    /// Code address of the callee body (0 until the body is emitted).
    pub address: CpuAdr,
    pub conv: CallConv,
    /// Receiver master type, for master methods.
    pub master: Option<MasterType>,
    /// Owning class, for members and constructors.
    pub member_of: Option<TypIndex>,
    /// Initializers may be called on an uninitialized receiver.
    pub is_initializer: bool,
    /// Dynamic-library set name and call id, for `CallConv::DynLib`.
    pub dl_name: Option<(String, String)>,
    /// System-call id, for `CallConv::System`.
    pub syscall: Option<u16>,
}

impl FunDef {
    /// Range of parameter indexes in the parameter table.
    pub fn parm_range(&self) -> std::ops::Range<usize> {
        self.parm_low..self.parm_low + self.parm_count
    }

    pub fn is_void(&self) -> bool {
        self.typ.is_none()
    }
}

/// A formal parameter.
///
/// Master methods whose element-generic parameters start with the element
/// placeholder are rewritten in place at their first call site to bind the
/// receiver's element type; this is the only mutation the core performs on
/// a parameter entry after registration.
#[derive(Debug, Clone, Serialize)]
pub struct ParmDef {
    pub name: String,
    pub typ: TypIndex,
    pub fun: FunIndex,
    pub is_reference: bool,
    pub is_const: bool,
    /// Local variable backing the parameter slot, for `CallConv::Local`.
    pub var: Option<VarIndex>,
}
