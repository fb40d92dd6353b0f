//! The structural cleanup passes: parser state pruning, expression
//! involution cancellation, and control-flow flattening.

use hashbrown::{HashMap, HashSet};

use crate::{
    intern::Symbol,
    ir::{
        Block, DeclarationKind, Expression, ExpressionKind, Program, Statement, StatementKind,
        Transition, UnaryOperatorKind,
    },
    passes::rewrite::map_expressions_in_declaration,
};

pub const PARSER_START_STATE: &str = "start";

/// Drops parser states unreachable from `start`.
pub fn simplify_parsers(mut program: Program) -> Program {
    let start = Symbol::new(PARSER_START_STATE);
    let mut pruned = 0usize;

    for declaration in &mut program.declarations {
        let DeclarationKind::Parser(parser) = &mut declaration.kind else {
            continue;
        };

        let transitions: HashMap<Symbol, Symbol> = parser
            .states
            .iter()
            .filter_map(|state| match &state.transition {
                Transition::Next(next) => Some((state.name.symbol, next.symbol)),
                _ => None,
            })
            .collect();

        let mut reachable = HashSet::new();
        let mut cursor = Some(start);
        while let Some(name) = cursor {
            if !reachable.insert(name) {
                break;
            }
            cursor = transitions.get(&name).copied();
        }

        let before = parser.states.len();
        parser.states.retain(|state| reachable.contains(&state.name.symbol));
        pruned += before - parser.states.len();
    }

    if pruned > 0 {
        log::debug!("pruned {pruned} unreachable parser state(s)");
    }

    program
}

/// Cancels involutions: `--x`, `~~x`, and `!!x` collapse to `x`.
pub fn simplify_expressions(mut program: Program) -> Program {
    let mut simplified = 0usize;
    let mut declarations = std::mem::take(&mut program.declarations);

    for declaration in &mut declarations {
        map_expressions_in_declaration(declaration, &mut |expression| {
            cancel_involutions(expression, &mut simplified)
        });
    }

    program.declarations = declarations;

    if simplified > 0 {
        log::debug!("cancelled {simplified} involution(s)");
    }

    program
}

fn cancel_involutions(expression: Expression, simplified: &mut usize) -> Expression {
    let ExpressionKind::Unary { operator, operand } = &expression.kind else {
        return expression;
    };

    if let ExpressionKind::Unary {
        operator: inner_operator,
        operand: inner_operand,
    } = &operand.kind
    {
        let cancels = matches!(
            (operator, inner_operator),
            (UnaryOperatorKind::Negate, UnaryOperatorKind::Negate)
                | (UnaryOperatorKind::Not, UnaryOperatorKind::Not)
                | (UnaryOperatorKind::Complement, UnaryOperatorKind::Complement)
        );
        if cancels {
            *simplified += 1;
            return (**inner_operand).clone();
        }
    }

    expression
}

/// Flattens nested blocks into their parent, drops empty statements, and
/// resolves `if` statements whose condition is a boolean literal.
pub fn simplify_control_flow(mut program: Program) -> Program {
    for declaration in &mut program.declarations {
        match &mut declaration.kind {
            DeclarationKind::Control(control) => {
                for local in &mut control.locals {
                    if let DeclarationKind::Action(action) = &mut local.kind {
                        simplify_block(&mut action.body);
                    }
                }
                simplify_block(&mut control.body);
            }
            DeclarationKind::Action(action) => simplify_block(&mut action.body),
            _ => {}
        }
    }

    program
}

fn simplify_block(block: &mut Block) {
    let statements = std::mem::take(&mut block.statements);

    for mut statement in statements {
        match statement.kind {
            StatementKind::Empty => {}
            StatementKind::Block(mut nested) => {
                simplify_block(&mut nested);
                // Hoist the nested statements; block statements only exist
                // for grouping and inlining residue
                block.statements.extend(nested.statements);
            }
            StatementKind::If {
                condition,
                mut then_block,
                mut else_block,
            } => {
                simplify_block(&mut then_block);
                if let Some(else_block) = &mut else_block {
                    simplify_block(else_block);
                }
                if let Some(else_block) = &else_block {
                    if else_block.statements.is_empty() {
                        // An empty else arm is noise
                        statement.kind = StatementKind::If {
                            condition,
                            then_block,
                            else_block: None,
                        };
                        resolve_constant_condition(statement, block);
                        continue;
                    }
                }
                statement.kind = StatementKind::If {
                    condition,
                    then_block,
                    else_block,
                };
                resolve_constant_condition(statement, block);
            }
            other => {
                statement.kind = other;
                block.statements.push(statement);
            }
        }
    }
}

fn resolve_constant_condition(statement: Statement, block: &mut Block) {
    let StatementKind::If {
        condition,
        then_block,
        else_block,
    } = statement.kind
    else {
        unreachable!();
    };

    match condition.kind {
        ExpressionKind::BoolLiteral(true) => block.statements.extend(then_block.statements),
        ExpressionKind::BoolLiteral(false) => {
            if let Some(else_block) = else_block {
                block.statements.extend(else_block.statements);
            }
        }
        _ => {
            if then_block.statements.is_empty() && else_block.is_none() {
                // Conditions are pure in Creek, so a fully empty if can go
                return;
            }
            block.statements.push(Statement {
                id: statement.id,
                span: statement.span,
                kind: StatementKind::If {
                    condition,
                    then_block,
                    else_block,
                },
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ir::{build::TreeBuilder, print::dump_program},
        source::SourceMap,
    };

    #[test]
    fn unreachable_parser_states_are_pruned() {
        let mut sources = SourceMap::new();
        let mut b = TreeBuilder::new(sources.add_memory(""));

        let to_accepting = b.transition_to("accepting");
        let start = b.state("start", vec![], to_accepting);
        let accepting = b.state("accepting", vec![], Transition::Accept);
        let orphan = b.state("orphan", vec![], Transition::Reject);
        let parser = b.parser("p", vec![], vec![start, accepting, orphan]);
        let program = b.finish(vec![parser]);

        let program = simplify_parsers(program);
        let DeclarationKind::Parser(parser) = &program.declarations[0].kind else {
            panic!("parser survived");
        };
        let names: Vec<_> = parser
            .states
            .iter()
            .map(|s| s.name.symbol.value())
            .collect();
        assert_eq!(names, vec!["start", "accepting"]);
    }

    #[test]
    fn double_complement_cancels() {
        let mut sources = SourceMap::new();
        let mut b = TreeBuilder::new(sources.add_memory(""));

        let body = {
            let target = b.name("x");
            let inner = b.name("x");
            let once = b.unary(UnaryOperatorKind::Complement, inner);
            let twice = b.unary(UnaryOperatorKind::Complement, once);
            let assign = b.assign(target, twice);
            b.block(vec![assign])
        };
        let x_ty = b.bits(32);
        let x = b.parameter("x", x_ty);
        let control = b.control("ingress", vec![x], vec![], body);
        let program = b.finish(vec![control]);

        let program = simplify_expressions(program);
        let dump = dump_program(&program);
        assert!(dump.contains("x = x;"), "got:\n{dump}");
    }

    #[test]
    fn constant_conditions_are_resolved() {
        let mut sources = SourceMap::new();
        let mut b = TreeBuilder::new(sources.add_memory(""));

        let body = {
            let target = b.name("x");
            let one = b.int(1);
            let assign = b.assign(target, one);
            let then_block = b.block(vec![assign]);
            let condition = b.bool(true);
            let taken = b.if_else(condition, then_block, None);

            let target = b.name("x");
            let two = b.int(2);
            let assign = b.assign(target, two);
            let then_block = b.block(vec![assign]);
            let condition = b.bool(false);
            let dropped = b.if_else(condition, then_block, None);

            b.block(vec![taken, dropped])
        };
        let x_ty = b.bits(32);
        let x = b.parameter("x", x_ty);
        let control = b.control("ingress", vec![x], vec![], body);
        let program = b.finish(vec![control]);

        let program = simplify_control_flow(program);
        let dump = dump_program(&program);
        assert!(dump.contains("x = 1;"), "got:\n{dump}");
        assert!(!dump.contains("x = 2;"), "got:\n{dump}");
        assert!(!dump.contains("if"), "got:\n{dump}");
    }

    #[test]
    fn nested_blocks_are_flattened() {
        let mut sources = SourceMap::new();
        let mut b = TreeBuilder::new(sources.add_memory(""));

        let body = {
            let target = b.name("x");
            let one = b.int(1);
            let assign = b.assign(target, one);
            let inner = b.block(vec![assign]);
            let nested = b.nested(inner);
            let empty = b.empty();
            b.block(vec![nested, empty])
        };
        let x_ty = b.bits(32);
        let x = b.parameter("x", x_ty);
        let control = b.control("ingress", vec![x], vec![], body);
        let program = b.finish(vec![control]);

        let program = simplify_control_flow(program);
        let DeclarationKind::Control(control) = &program.declarations[0].kind else {
            unreachable!();
        };
        assert_eq!(control.body.statements.len(), 1);
        assert!(matches!(
            control.body.statements[0].kind,
            StatementKind::Assign { .. }
        ));
    }
}
