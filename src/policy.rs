//! Target customization for the enum representation pass.
//!
//! The pass itself is generic: it lowers enum declarations to fixed-width
//! integers. Which declarations it touches and at what width is a back-end
//! decision, injected once at pipeline construction. Provenance lookups go
//! through the per-run source table handed to the policy; there is no
//! process-wide source registry.

use crate::{
    ir::Declaration,
    source::{SourceFileOrigin, SourceMap},
};

/// File-name suffix identifying the bundled Creek standard library. Enums
/// declared there keep their symbolic representation; back ends know them by
/// name.
pub const STDLIB_FILE_SUFFIX: &str = "core.creek";

pub trait EnumRepresentationPolicy {
    /// Whether the generic pass should lower this enum declaration at all
    fn should_convert(&self, declaration: &Declaration, sources: &SourceMap) -> bool;

    /// The integer width converted members are given
    fn representation_width(&self, declaration: &Declaration) -> u16;
}

/// The soft-switch back end's policy: every user enum becomes `bits<32>`,
/// standard-library enums are exempt by provenance.
#[derive(Debug, Default)]
pub struct EnumOn32Bits;

impl EnumRepresentationPolicy for EnumOn32Bits {
    fn should_convert(&self, declaration: &Declaration, sources: &SourceMap) -> bool {
        let file = sources.get(declaration.span.source);

        match &file.origin {
            SourceFileOrigin::Memory => true,
            SourceFileOrigin::File(path) => !path
                .to_str()
                .is_some_and(|name| name.ends_with(STDLIB_FILE_SUFFIX)),
        }
    }

    fn representation_width(&self, _declaration: &Declaration) -> u16 {
        32
    }
}

/// Selects the policy for a named back-end target. Unknown targets get the
/// soft-switch default; a real driver registers its own here.
pub fn policy_for_target(_target: &str) -> Box<dyn EnumRepresentationPolicy> {
    Box::new(EnumOn32Bits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ir::build::TreeBuilder, source::SourceMap};

    #[test]
    fn stdlib_enums_are_exempt() {
        let mut sources = SourceMap::new();
        let stdlib = sources.add_file("creek/core.creek", "");
        let user = sources.add_file("pipe.creek", "");

        let mut b = TreeBuilder::new(stdlib);
        let stdlib_enum = b.enumeration("PortKind", &["PHYSICAL", "CPU"]);
        b.in_source(user);
        let user_enum = b.enumeration("Color", &["RED", "GREEN"]);

        let policy = EnumOn32Bits;
        assert!(!policy.should_convert(&stdlib_enum, &sources));
        assert!(policy.should_convert(&user_enum, &sources));
        assert_eq!(policy.representation_width(&user_enum), 32);
    }

    #[test]
    fn in_memory_sources_always_convert() {
        let mut sources = SourceMap::new();
        let mut b = TreeBuilder::new(sources.add_memory(""));
        let e = b.enumeration("Color", &["RED"]);

        assert!(EnumOn32Bits.should_convert(&e, &sources));
    }
}
