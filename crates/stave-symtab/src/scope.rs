//! Scope descriptors.

use serde::Serialize;

use crate::funcs::FunIndex;
use crate::types::ModIndex;

/// Where a declaration lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ScopeKind {
    /// Visible to every module.
    Global,
    /// Visible inside one module.
    Module,
    /// Local to one function body.
    Local,
}

/// A declaration scope: kind plus the owning module and function.
///
/// Scopes compare by value; two `Local` scopes are the same scope iff they
/// name the same module and function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ScopeDef {
    pub kind: ScopeKind,
    pub module: ModIndex,
    pub fun: Option<FunIndex>,
}

impl ScopeDef {
    pub fn global() -> Self {
        Self {
            kind: ScopeKind::Global,
            module: ModIndex(0),
            fun: None,
        }
    }

    pub fn module(module: ModIndex) -> Self {
        Self {
            kind: ScopeKind::Module,
            module,
            fun: None,
        }
    }

    pub fn local(module: ModIndex, fun: FunIndex) -> Self {
        Self {
            kind: ScopeKind::Local,
            module,
            fun: Some(fun),
        }
    }

    /// Nesting depth used by the emitter's jump-destination table.
    pub fn depth(&self) -> u32 {
        match self.kind {
            ScopeKind::Global => 0,
            ScopeKind::Module => 1,
            ScopeKind::Local => 2,
        }
    }

    /// True when a declaration in `self` is reachable from `other`.
    pub fn visible_from(&self, other: &ScopeDef) -> bool {
        match self.kind {
            ScopeKind::Global => true,
            ScopeKind::Module => self.module == other.module,
            ScopeKind::Local => {
                self.module == other.module && other.kind == ScopeKind::Local && self.fun == other.fun
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn visibility_rules() {
        let glob = ScopeDef::global();
        let m0 = ScopeDef::module(ModIndex(0));
        let m1 = ScopeDef::module(ModIndex(1));
        let f0 = ScopeDef::local(ModIndex(0), FunIndex(0));
        let f1 = ScopeDef::local(ModIndex(0), FunIndex(1));

        assert!(glob.visible_from(&f0));
        assert!(m0.visible_from(&f0));
        assert!(!m1.visible_from(&f0));
        assert!(f0.visible_from(&f0));
        assert!(!f0.visible_from(&f1));
        assert!(!f0.visible_from(&m0));
    }

    #[test]
    fn depths_increase_inward() {
        assert!(ScopeDef::global().depth() < ScopeDef::module(ModIndex(0)).depth());
        assert!(
            ScopeDef::module(ModIndex(0)).depth()
                < ScopeDef::local(ModIndex(0), FunIndex(0)).depth()
        );
    }
}
