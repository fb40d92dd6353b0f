//! Program evaluation: turns the static `instance` declarations into the
//! graph of toplevel objects that will actually be deployed, and answers the
//! one question the pipeline asks of it — does a `main` entry point exist.
//!
//! The evaluator runs twice per pipeline: once mid-run, purely to feed the
//! entry-point continuation (that graph is discarded), and once at the very
//! end to produce the definitive graph handed to the back end.

use itertools::Itertools;

use crate::{
    error::CompileError,
    intern::Symbol,
    ir::{DeclarationKind, ExpressionKind, NodeId, Program},
};

pub const ENTRY_POINT_NAME: &str = "main";

/// One instantiated toplevel object
#[derive(Debug, Clone)]
pub struct ToplevelNode {
    /// The instance name
    pub name: Symbol,
    /// The declaration the instance was constructed from
    pub target: NodeId,
    pub kind: ToplevelNodeKind,
    /// Names of the toplevel objects wired into this instance's constructor
    pub connections: Vec<Symbol>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToplevelNodeKind {
    Control,
    Parser,
    Extern,
}

/// The instantiated topology derived from the declaration tree. Stale as
/// soon as any later pass changes the tree structurally; consumers must
/// re-evaluate rather than hold onto an old graph.
#[derive(Debug, Clone, Default)]
pub struct ToplevelGraph {
    pub nodes: Vec<ToplevelNode>,
}

impl ToplevelGraph {
    pub fn has_entry_point(&self) -> bool {
        let entry = Symbol::new(ENTRY_POINT_NAME);
        self.nodes.iter().any(|node| node.name == entry)
    }

    pub fn node(&self, name: Symbol) -> Option<&ToplevelNode> {
        self.nodes.iter().find(|node| node.name == name)
    }
}

impl core::fmt::Display for ToplevelGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for node in &self.nodes {
            writeln!(
                f,
                "{} -> {:?}({})",
                node.name,
                node.kind,
                node.connections.iter().join(", ")
            )?;
        }
        Ok(())
    }
}

/// Walks the toplevel declarations and instantiates every `instance`.
///
/// Constructor arguments must be names of other toplevel declarations or
/// instances; anything else the front end let through is a structural error.
pub fn evaluate(program: &Program) -> Result<ToplevelGraph, CompileError> {
    let mut graph = ToplevelGraph::default();

    for declaration in &program.declarations {
        let DeclarationKind::Instance(instance) = &declaration.kind else {
            continue;
        };

        let Some(target) = program
            .declarations
            .iter()
            .find(|d| d.name.symbol == instance.target.symbol)
        else {
            return Err(CompileError::UnresolvedReference {
                name: instance.target.symbol,
                span: instance.target.span,
            });
        };

        let kind = match &target.kind {
            DeclarationKind::Control(_) => ToplevelNodeKind::Control,
            DeclarationKind::Parser(_) => ToplevelNodeKind::Parser,
            DeclarationKind::Extern(_) => ToplevelNodeKind::Extern,
            _ => {
                return Err(CompileError::NotInstantiable {
                    name: target.name.symbol,
                    span: instance.target.span,
                })
            }
        };

        let mut connections = Vec::with_capacity(instance.arguments.len());
        for argument in &instance.arguments {
            let ExpressionKind::Name(name) = &argument.kind else {
                return Err(CompileError::NotInstantiable {
                    name: declaration.name.symbol,
                    span: argument.span,
                });
            };
            connections.push(name.symbol);
        }

        graph.nodes.push(ToplevelNode {
            name: declaration.name.symbol,
            target: target.id,
            kind,
            connections,
        });
    }

    log::debug!(
        "evaluated toplevel graph: {} node(s), entry point {}",
        graph.nodes.len(),
        if graph.has_entry_point() {
            "present"
        } else {
            "absent"
        }
    );

    Ok(graph)
}
