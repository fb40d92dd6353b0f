//! Middle end of the Creek compiler: the pass pipeline that takes a parsed,
//! tree-shaped program and lowers it for a packet-processing back end.
//!
//! The interesting surface is [`pipeline::Midend`]: pick a [`pipeline::Dialect`],
//! hand it the program tree and the run's [`source::SourceMap`], and get back
//! either a lowered tree plus the evaluated toplevel graph or an early,
//! non-fatal stop for library inputs.

pub mod context;
pub mod error;
pub mod evaluator;
pub mod intern;
pub mod ir;
pub mod passes;
pub mod pipeline;
pub mod policy;
pub mod source;
