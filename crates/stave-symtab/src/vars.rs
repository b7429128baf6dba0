//! Variable entries and temporary-variable kinds.

use serde::Serialize;

use stave_common::cpu::{CpuAdr, CpuLon};

use crate::scope::ScopeDef;
use crate::types::TypIndex;

/// Index of a variable entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct VarIndex(pub usize);

/// Kind of a temporary variable. Reuse only pairs temporaries of the same
/// kind so promotion scratch never aliases operator results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TempKind {
    /// Operator results.
    Regular,
    /// Promotion conversions.
    Promotion,
    /// Master-method scratch.
    Master,
}

impl Default for TempKind {
    fn default() -> Self {
        TempKind::Regular
    }
}

/// A declared or compiler-generated variable.
#[derive(Debug, Clone, Serialize)]
pub struct VarDef {
    pub name: String,
    pub typ: TypIndex,
    pub scope: ScopeDef,
    /// Storage address inside the scope's value space.
    pub address: CpuAdr,
    /// Compiler-generated temporary.
    pub is_temp: bool,
    /// Kind of temporary; meaningless when `is_temp` is false.
    pub temp_kind: TempKind,
    /// Live-reference count. A temporary is eligible for reuse only at
    /// zero. Never used as a thread lock.
    pub lock_count: u32,
    /// Reference (indirection slot) rather than direct storage.
    pub is_reference: bool,
    pub is_const: bool,
    pub is_parameter: bool,
    /// Monotonic within a scope: set once a value is stored, never reset.
    pub is_initialized: bool,
    /// The variable's value reaches an observable operation.
    pub is_source_used: bool,
    /// Holds a compile-time computed value.
    pub is_computed: bool,
    pub is_static: bool,
    /// Retired by `hide_local_variables`; skipped by name search.
    pub is_hidden: bool,
    /// Flow label of the enclosing `for(...)`/`array(...)`, when declared
    /// inside one.
    pub flow_label: Option<CpuLon>,
}

impl VarDef {
    /// True while at least one live token references this temporary.
    pub fn is_locked(&self) -> bool {
        self.lock_count > 0
    }
}
