//! The individual midend passes. Each is a plain function over the program
//! tree; sequencing, analysis-map bookkeeping, and error tagging live in the
//! pipeline engine (`crate::pipeline`).

pub mod const_fold;
pub mod convert_enums;
pub mod dead_code;
pub mod declarations;
pub mod inline;
pub mod lower;
pub mod resolve;
pub mod rewrite;
pub mod simplify;
pub mod type_check;
