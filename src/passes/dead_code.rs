//! Unused-declaration removal.
//!
//! Reachability is anchored at the `instance` declarations: whatever the
//! deployed topology does not transitively reference is dropped. A program
//! with no instances at all is a library still waiting to be linked into a
//! topology, so nothing is removed — the entry-point check downstream is the
//! place that decides whether such a program is worth lowering further.

use hashbrown::{HashMap, HashSet};

use crate::{
    context::AnalysisContext,
    ir::{
        visit::{self, Visitor},
        Declaration, DeclarationKind, Identifier, NodeId, Program,
    },
};

pub fn remove_unused_declarations(mut program: Program, context: &AnalysisContext) -> Program {
    if !program
        .declarations
        .iter()
        .any(|d| matches!(d.kind, DeclarationKind::Instance(_)))
    {
        return program;
    }

    // Map every resolvable node (declaration, local, parameter, state) to
    // the toplevel declaration that owns it
    let mut owners = HashMap::new();
    for declaration in &program.declarations {
        let mut indexer = OwnerIndexer {
            owner: declaration.id,
            owners: &mut owners,
        };
        indexer.index(declaration);
    }

    // Edges: toplevel declaration -> toplevel declarations it references
    let mut edges: HashMap<NodeId, HashSet<NodeId>> = HashMap::new();
    for declaration in &program.declarations {
        let mut collector = EdgeCollector {
            owner: declaration.id,
            owners: &owners,
            context,
            edges: edges.entry(declaration.id).or_default(),
        };
        collector.visit_declaration(declaration);
    }

    let mut reachable = HashSet::new();
    let mut worklist: Vec<NodeId> = program
        .declarations
        .iter()
        .filter(|d| matches!(d.kind, DeclarationKind::Instance(_)))
        .map(|d| d.id)
        .collect();

    while let Some(id) = worklist.pop() {
        if !reachable.insert(id) {
            continue;
        }
        if let Some(targets) = edges.get(&id) {
            worklist.extend(targets.iter().copied());
        }
    }

    let before = program.declarations.len();
    program.declarations.retain(|d| reachable.contains(&d.id));
    let removed = before - program.declarations.len();

    if removed > 0 {
        log::debug!("removed {removed} unused toplevel declaration(s)");
    }

    program
}

struct OwnerIndexer<'a> {
    owner: NodeId,
    owners: &'a mut HashMap<NodeId, NodeId>,
}

impl OwnerIndexer<'_> {
    fn index(&mut self, declaration: &Declaration) {
        self.owners.insert(declaration.id, self.owner);

        match &declaration.kind {
            DeclarationKind::Control(control) => {
                for parameter in &control.parameters {
                    self.owners.insert(parameter.id, self.owner);
                }
                for local in &control.locals {
                    self.index(local);
                }
            }
            DeclarationKind::Parser(parser) => {
                for parameter in &parser.parameters {
                    self.owners.insert(parameter.id, self.owner);
                }
                for state in &parser.states {
                    self.owners.insert(state.id, self.owner);
                }
            }
            DeclarationKind::Action(action) => {
                for parameter in &action.parameters {
                    self.owners.insert(parameter.id, self.owner);
                }
            }
            _ => {}
        }
    }
}

struct EdgeCollector<'a> {
    owner: NodeId,
    owners: &'a HashMap<NodeId, NodeId>,
    context: &'a AnalysisContext,
    edges: &'a mut HashSet<NodeId>,
}

impl Visitor for EdgeCollector<'_> {
    fn visit_declaration(&mut self, declaration: &Declaration) {
        visit::walk_declaration(self, declaration)
    }

    fn visit_identifier_use(&mut self, identifier: &Identifier) {
        let Some(target) = self.context.resolve(identifier.id) else {
            return;
        };
        let Some(owner) = self.owners.get(&target) else {
            return;
        };
        if *owner != self.owner {
            self.edges.insert(*owner);
        }
    }
}
