//! Declaration shaping: local renaming for global uniqueness and canonical
//! ordering of control-local declarations.
//!
//! Both passes only touch names and ordering. Node identities are stable, so
//! the reference and type maps stay valid across them.

use hashbrown::{HashMap, HashSet};

use crate::{
    context::AnalysisContext,
    intern::Symbol,
    ir::{DeclarationKind, NodeId, Program},
    passes::rewrite::for_each_identifier_mut,
};

/// Renames control-local declarations whose names collide with a toplevel
/// declaration or with another local, so later hoisting cannot capture them.
pub fn unique_names(mut program: Program, context: &AnalysisContext) -> Program {
    let toplevel: HashSet<Symbol> = program
        .declarations
        .iter()
        .map(|d| d.name.symbol)
        .collect();

    let mut renames: HashMap<NodeId, Symbol> = HashMap::new();

    for declaration in &mut program.declarations {
        let DeclarationKind::Control(control) = &mut declaration.kind else {
            continue;
        };

        let mut taken = toplevel.clone();
        for local in &mut control.locals {
            let name = local.name.symbol;
            if taken.insert(name) {
                continue;
            }
            let fresh = fresh_name(name, &taken);
            taken.insert(fresh);
            log::debug!("renaming local `{name}` to `{fresh}`");
            renames.insert(local.id, fresh);
            local.name.symbol = fresh;
        }
    }

    if renames.is_empty() {
        return program;
    }

    for declaration in &mut program.declarations {
        for_each_identifier_mut(declaration, &mut |identifier| {
            let Some(target) = context.resolve(identifier.id) else {
                return;
            };
            if let Some(fresh) = renames.get(&target) {
                identifier.symbol = *fresh;
            }
        });
    }

    program
}

fn fresh_name(base: Symbol, taken: &HashSet<Symbol>) -> Symbol {
    for n in 0usize.. {
        let candidate = Symbol::new(&format!("{base}_{n}"));
        if !taken.contains(&candidate) {
            return candidate;
        }
    }
    unreachable!()
}

/// Reorders control locals into the canonical shape the backend expects:
/// constants first, then everything else, each group in source order.
pub fn move_declarations(mut program: Program) -> Program {
    for declaration in &mut program.declarations {
        let DeclarationKind::Control(control) = &mut declaration.kind else {
            continue;
        };

        let locals = std::mem::take(&mut control.locals);
        let (constants, rest): (Vec<_>, Vec<_>) = locals
            .into_iter()
            .partition(|local| matches!(local.kind, DeclarationKind::Constant(_)));
        control.locals = constants;
        control.locals.extend(rest);
    }

    program
}
