//! Reference resolution: maps every identifier use to the node id of the
//! declaration it names.
//!
//! Toplevel declarations are bound up front, so forward references between
//! toplevel objects are legal. Inside a control the parameters and local
//! declarations are in scope; inside a parser the parameters and states are.
//! Innermost binding wins on a name collision.

use std::collections::BTreeMap;

use hashbrown::HashMap;

use crate::{
    error::CompileError,
    intern::Symbol,
    ir::{
        visit::{self, Visitor},
        Declaration, DeclarationKind, Identifier, NodeId, Program,
    },
};

pub fn resolve_references(program: &Program) -> Result<BTreeMap<NodeId, NodeId>, CompileError> {
    let mut resolver = ReferenceResolver {
        scopes: vec![HashMap::new()],
        resolutions: BTreeMap::new(),
        error: None,
    };

    resolver.bind_toplevel(program)?;
    resolver.visit_program(program);

    match resolver.error {
        Some(error) => Err(error),
        None => Ok(resolver.resolutions),
    }
}

struct ReferenceResolver {
    scopes: Vec<HashMap<Symbol, NodeId>>,
    resolutions: BTreeMap<NodeId, NodeId>,
    error: Option<CompileError>,
}

impl ReferenceResolver {
    fn bind_toplevel(&mut self, program: &Program) -> Result<(), CompileError> {
        for declaration in &program.declarations {
            let scope = self.scopes.last_mut().unwrap();

            if scope
                .insert(declaration.name.symbol, declaration.id)
                .is_some()
            {
                return Err(CompileError::DuplicateDeclaration {
                    name: declaration.name.symbol,
                    span: declaration.name.span,
                });
            }
        }

        Ok(())
    }

    fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    fn bind(&mut self, name: Symbol, target: NodeId) {
        self.scopes.last_mut().unwrap().insert(name, target);
    }

    fn lookup(&self, name: Symbol) -> Option<NodeId> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(&name).copied())
    }
}

impl Visitor for ReferenceResolver {
    fn visit_declaration(&mut self, declaration: &Declaration) {
        if self.error.is_some() {
            return;
        }

        match &declaration.kind {
            DeclarationKind::Control(control) => {
                self.push_scope();
                for parameter in &control.parameters {
                    self.bind(parameter.name.symbol, parameter.id);
                    self.visit_type(&parameter.ty);
                }
                // Locals are bound before their bodies are walked so that a
                // local action may reference a local constant declared below
                // it, matching toplevel behavior
                for local in &control.locals {
                    self.bind(local.name.symbol, local.id);
                }
                for local in &control.locals {
                    self.visit_declaration(local);
                }
                self.visit_block(&control.body);
                self.pop_scope();
            }
            DeclarationKind::Parser(parser) => {
                self.push_scope();
                for parameter in &parser.parameters {
                    self.bind(parameter.name.symbol, parameter.id);
                    self.visit_type(&parameter.ty);
                }
                for state in &parser.states {
                    // States share one namespace, same rule as toplevel
                    let scope = self.scopes.last_mut().unwrap();
                    if scope.insert(state.name.symbol, state.id).is_some() {
                        self.error = Some(CompileError::DuplicateDeclaration {
                            name: state.name.symbol,
                            span: state.name.span,
                        });
                        self.pop_scope();
                        return;
                    }
                }
                for state in &parser.states {
                    self.visit_parser_state(state);
                }
                self.pop_scope();
            }
            DeclarationKind::Action(action) => {
                self.push_scope();
                for parameter in &action.parameters {
                    self.bind(parameter.name.symbol, parameter.id);
                    self.visit_type(&parameter.ty);
                }
                self.visit_block(&action.body);
                self.pop_scope();
            }
            _ => visit::walk_declaration(self, declaration),
        }
    }

    fn visit_identifier_use(&mut self, identifier: &Identifier) {
        if self.error.is_some() {
            return;
        }

        match self.lookup(identifier.symbol) {
            Some(target) => {
                self.resolutions.insert(identifier.id, target);
            }
            None => {
                self.error = Some(CompileError::UnresolvedReference {
                    name: identifier.symbol,
                    span: identifier.span,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ir::build::TreeBuilder, ir::Transition, source::SourceMap};

    #[test]
    fn resolves_action_call_inside_control() {
        let mut sources = SourceMap::new();
        let mut b = TreeBuilder::new(sources.add_memory(""));

        let body = {
            let call = b.call("set_port", vec![]);
            b.block(vec![call])
        };
        let action_body = b.block(vec![]);
        let action = b.action("set_port", vec![], action_body);
        let action_id = action.id;
        let control = b.control("ingress", vec![], vec![action], body);
        let program = b.finish(vec![control]);

        let map = resolve_references(&program).unwrap();
        assert!(map.values().any(|target| *target == action_id));
    }

    #[test]
    fn forward_references_between_toplevel_declarations_resolve() {
        let mut sources = SourceMap::new();
        let mut b = TreeBuilder::new(sources.add_memory(""));

        let body = {
            let call = b.call("later", vec![]);
            b.block(vec![call])
        };
        let first = b.control("first", vec![], vec![], body);
        let later_body = b.block(vec![]);
        let later = b.control("later", vec![], vec![], later_body);
        let program = b.finish(vec![first, later]);

        assert!(resolve_references(&program).is_ok());
    }

    #[test]
    fn unknown_name_is_fatal() {
        let mut sources = SourceMap::new();
        let mut b = TreeBuilder::new(sources.add_memory(""));

        let body = {
            let call = b.call("missing", vec![]);
            b.block(vec![call])
        };
        let control = b.control("ingress", vec![], vec![], body);
        let program = b.finish(vec![control]);

        assert!(matches!(
            resolve_references(&program),
            Err(CompileError::UnresolvedReference { .. })
        ));
    }

    #[test]
    fn duplicate_parser_state_names_are_fatal() {
        let mut sources = SourceMap::new();
        let mut b = TreeBuilder::new(sources.add_memory(""));

        let first = b.state("start", vec![], Transition::Accept);
        let second = b.state("start", vec![], Transition::Reject);
        let parser = b.parser("pkt", vec![], vec![first, second]);
        let program = b.finish(vec![parser]);

        assert!(matches!(
            resolve_references(&program),
            Err(CompileError::DuplicateDeclaration { .. })
        ));
    }

    #[test]
    fn duplicate_toplevel_names_are_fatal() {
        let mut sources = SourceMap::new();
        let mut b = TreeBuilder::new(sources.add_memory(""));

        let body_a = b.block(vec![]);
        let a = b.control("ingress", vec![], vec![], body_a);
        let body_b = b.block(vec![]);
        let b2 = b.control("ingress", vec![], vec![], body_b);
        let program = b.finish(vec![a, b2]);

        assert!(matches!(
            resolve_references(&program),
            Err(CompileError::DuplicateDeclaration { .. })
        ));
    }
}
