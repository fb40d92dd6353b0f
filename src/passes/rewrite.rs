//! Shared in-place rewriting machinery for the transform passes. Rewrites
//! are bottom-up: children are mapped before the function sees their parent,
//! so a single pass over the tree folds nested redexes inside-out.

use crate::ir::{
    Block, Declaration, DeclarationKind, Expression, ExpressionKind, Identifier, NodeId, Statement,
    StatementKind, Transition, TypeKind,
};

pub fn map_expressions_in_declaration(
    declaration: &mut Declaration,
    f: &mut impl FnMut(Expression) -> Expression,
) {
    match &mut declaration.kind {
        DeclarationKind::Control(control) => {
            for local in &mut control.locals {
                map_expressions_in_declaration(local, f);
            }
            map_expressions_in_block(&mut control.body, f);
        }
        DeclarationKind::Parser(parser) => {
            for state in &mut parser.states {
                for statement in &mut state.body {
                    map_expressions_in_statement(statement, f);
                }
            }
        }
        DeclarationKind::Action(action) => map_expressions_in_block(&mut action.body, f),
        DeclarationKind::Constant(constant) => map_expression(&mut constant.value, f),
        DeclarationKind::Instance(instance) => {
            for argument in &mut instance.arguments {
                map_expression(argument, f);
            }
        }
        DeclarationKind::Enum(_) | DeclarationKind::Extern(_) => {}
    }
}

pub fn map_expressions_in_block(block: &mut Block, f: &mut impl FnMut(Expression) -> Expression) {
    for statement in &mut block.statements {
        map_expressions_in_statement(statement, f);
    }
}

pub fn map_expressions_in_statement(
    statement: &mut Statement,
    f: &mut impl FnMut(Expression) -> Expression,
) {
    match &mut statement.kind {
        StatementKind::Assign { target, value } => {
            map_expression(target, f);
            map_expression(value, f);
        }
        StatementKind::Call { arguments, .. } => {
            for argument in arguments {
                map_expression(argument, f);
            }
        }
        StatementKind::If {
            condition,
            then_block,
            else_block,
        } => {
            map_expression(condition, f);
            map_expressions_in_block(then_block, f);
            if let Some(else_block) = else_block {
                map_expressions_in_block(else_block, f);
            }
        }
        StatementKind::Block(block) => map_expressions_in_block(block, f),
        StatementKind::Empty => {}
    }
}

pub fn map_expression(expression: &mut Expression, f: &mut impl FnMut(Expression) -> Expression) {
    match &mut expression.kind {
        ExpressionKind::Unary { operand, .. } => map_expression(operand, f),
        ExpressionKind::Binary { lhs, rhs, .. } => {
            map_expression(lhs, f);
            map_expression(rhs, f);
        }
        ExpressionKind::Slice { base, .. } => map_expression(base, f),
        ExpressionKind::Cast { operand, .. } => map_expression(operand, f),
        ExpressionKind::Name(_)
        | ExpressionKind::Member { .. }
        | ExpressionKind::IntLiteral { .. }
        | ExpressionKind::BoolLiteral(_) => {}
    }

    let placeholder = Expression {
        id: expression.id,
        span: expression.span,
        kind: ExpressionKind::BoolLiteral(false),
    };
    let taken = std::mem::replace(expression, placeholder);
    *expression = f(taken);
}

/// Re-identifies every node of a duplicated expression. Trees keep node ids
/// unique, so any pass that clones a subtree must run this on the copy.
pub fn refresh_expression_ids(expression: &mut Expression, fresh: &mut impl FnMut() -> NodeId) {
    expression.id = fresh();
    match &mut expression.kind {
        ExpressionKind::Name(name) => name.id = fresh(),
        ExpressionKind::Member { base, member } => {
            base.id = fresh();
            member.id = fresh();
        }
        ExpressionKind::IntLiteral { .. } | ExpressionKind::BoolLiteral(_) => {}
        ExpressionKind::Unary { operand, .. } => refresh_expression_ids(operand, fresh),
        ExpressionKind::Binary { lhs, rhs, .. } => {
            refresh_expression_ids(lhs, fresh);
            refresh_expression_ids(rhs, fresh);
        }
        ExpressionKind::Slice { base, .. } => refresh_expression_ids(base, fresh),
        ExpressionKind::Cast { operand, .. } => refresh_expression_ids(operand, fresh),
    }
}

/// Visits every identifier in the declaration, use and binding positions
/// alike, including type references.
pub fn for_each_identifier_mut(
    declaration: &mut Declaration,
    f: &mut impl FnMut(&mut Identifier),
) {
    f(&mut declaration.name);

    match &mut declaration.kind {
        DeclarationKind::Control(control) => {
            for parameter in &mut control.parameters {
                f(&mut parameter.name);
                identifiers_in_type(&mut parameter.ty.kind, f);
            }
            for local in &mut control.locals {
                for_each_identifier_mut(local, f);
            }
            identifiers_in_block(&mut control.body, f);
        }
        DeclarationKind::Parser(parser) => {
            for parameter in &mut parser.parameters {
                f(&mut parameter.name);
                identifiers_in_type(&mut parameter.ty.kind, f);
            }
            for state in &mut parser.states {
                f(&mut state.name);
                for statement in &mut state.body {
                    identifiers_in_statement(statement, f);
                }
                if let Transition::Next(next) = &mut state.transition {
                    f(next);
                }
            }
        }
        DeclarationKind::Action(action) => {
            for parameter in &mut action.parameters {
                f(&mut parameter.name);
                identifiers_in_type(&mut parameter.ty.kind, f);
            }
            identifiers_in_block(&mut action.body, f);
        }
        DeclarationKind::Enum(enumeration) => {
            for member in &mut enumeration.members {
                f(member);
            }
        }
        DeclarationKind::Constant(constant) => {
            identifiers_in_type(&mut constant.ty.kind, f);
            identifiers_in_expression(&mut constant.value, f);
        }
        DeclarationKind::Extern(ext) => {
            for method in &mut ext.methods {
                f(method);
            }
        }
        DeclarationKind::Instance(instance) => {
            f(&mut instance.target);
            for argument in &mut instance.arguments {
                identifiers_in_expression(argument, f);
            }
        }
    }
}

fn identifiers_in_type(kind: &mut TypeKind, f: &mut impl FnMut(&mut Identifier)) {
    if let TypeKind::Named(name) = kind {
        f(name);
    }
}

fn identifiers_in_block(block: &mut Block, f: &mut impl FnMut(&mut Identifier)) {
    for statement in &mut block.statements {
        identifiers_in_statement(statement, f);
    }
}

fn identifiers_in_statement(statement: &mut Statement, f: &mut impl FnMut(&mut Identifier)) {
    match &mut statement.kind {
        StatementKind::Assign { target, value } => {
            identifiers_in_expression(target, f);
            identifiers_in_expression(value, f);
        }
        StatementKind::Call { callee, arguments } => {
            f(callee);
            for argument in arguments {
                identifiers_in_expression(argument, f);
            }
        }
        StatementKind::If {
            condition,
            then_block,
            else_block,
        } => {
            identifiers_in_expression(condition, f);
            identifiers_in_block(then_block, f);
            if let Some(else_block) = else_block {
                identifiers_in_block(else_block, f);
            }
        }
        StatementKind::Block(block) => identifiers_in_block(block, f),
        StatementKind::Empty => {}
    }
}

fn identifiers_in_expression(expression: &mut Expression, f: &mut impl FnMut(&mut Identifier)) {
    match &mut expression.kind {
        ExpressionKind::Name(name) => f(name),
        ExpressionKind::Member { base, member } => {
            f(base);
            f(member);
        }
        ExpressionKind::IntLiteral { .. } | ExpressionKind::BoolLiteral(_) => {}
        ExpressionKind::Unary { operand, .. } => identifiers_in_expression(operand, f),
        ExpressionKind::Binary { lhs, rhs, .. } => {
            identifiers_in_expression(lhs, f);
            identifiers_in_expression(rhs, f);
        }
        ExpressionKind::Slice { base, .. } => identifiers_in_expression(base, f),
        ExpressionKind::Cast { operand, .. } => identifiers_in_expression(operand, f),
    }
}
