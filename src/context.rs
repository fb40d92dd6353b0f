//! The shared analysis context: the two long-lived caches every pass reads
//! through, plus their validity discipline.
//!
//! Validity is tracked explicitly. Builder passes install a freshly computed
//! map (which marks it valid); structural passes must invalidate whichever
//! maps their rewrite made stale. Reading an invalid map is a bug in the
//! declared step sequence, never a user-facing error, so the accessors assert
//! instead of returning stale data. The pipeline engine checks the declared
//! sequence statically as well (see `pipeline::verify_step_order`).

use std::collections::BTreeMap;

use crate::{intern::Symbol, ir::NodeId};

/// A fully resolved type for an expression node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedType {
    Bits { width: u16 },
    Bool,
    Enum(Symbol),
    Extern(Symbol),
}

impl core::fmt::Display for ResolvedType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolvedType::Bits { width } => write!(f, "bits<{width}>"),
            ResolvedType::Bool => f.write_str("bool"),
            ResolvedType::Enum(name) => write!(f, "enum {name}"),
            ResolvedType::Extern(name) => write!(f, "extern {name}"),
        }
    }
}

#[derive(Debug, Default)]
pub struct AnalysisContext {
    references: BTreeMap<NodeId, NodeId>,
    types: BTreeMap<NodeId, ResolvedType>,
    references_valid: bool,
    types_valid: bool,
}

impl AnalysisContext {
    pub fn new() -> Self {
        Self::default()
    }

    /* Reference map */

    /// Installs a freshly built reference map, marking it valid
    pub fn set_references(&mut self, references: BTreeMap<NodeId, NodeId>) {
        self.references = references;
        self.references_valid = true;
    }

    /// Resolves an identifier-use node to the node id of its declaration
    /// (toplevel declaration, control local, parameter, or parser state).
    ///
    /// Panics if the reference map has not been built since the last
    /// invalidation: that is a broken step ordering, not recoverable state.
    pub fn resolve(&self, use_id: NodeId) -> Option<NodeId> {
        assert!(
            self.references_valid,
            "reference map read before it was built (or after invalidation without a rebuild)"
        );
        self.references.get(&use_id).copied()
    }

    pub fn references_valid(&self) -> bool {
        self.references_valid
    }

    pub fn invalidate_references(&mut self) {
        self.references.clear();
        self.references_valid = false;
    }

    /* Type map */

    /// Installs a freshly built type map, marking it valid
    pub fn set_types(&mut self, types: BTreeMap<NodeId, ResolvedType>) {
        self.types = types;
        self.types_valid = true;
    }

    /// Looks up the resolved type of an expression node.
    ///
    /// Panics if the type map has not been built since the last invalidation.
    pub fn type_of(&self, expr_id: NodeId) -> Option<&ResolvedType> {
        assert!(
            self.types_valid,
            "type map read before it was built (or after invalidation without a rebuild)"
        );
        self.types.get(&expr_id)
    }

    pub fn types_valid(&self) -> bool {
        self.types_valid
    }

    pub fn invalidate_types(&mut self) {
        self.types.clear();
        self.types_valid = false;
    }

    /// Snapshot of the current reference map, for builder idempotence checks
    pub fn reference_entries(&self) -> &BTreeMap<NodeId, NodeId> {
        &self.references
    }

    /// Snapshot of the current type map
    pub fn type_entries(&self) -> &BTreeMap<NodeId, ResolvedType> {
        &self.types
    }
}
