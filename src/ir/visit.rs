//! Read-only traversal over the program tree.
//!
//! Override the node kinds you care about; every default delegates to the
//! matching `walk_*` function so overridden methods can still descend into
//! their children.

use super::{
    Block, Declaration, DeclarationKind, Expression, ExpressionKind, Identifier, Parameter,
    ParserState, Program, Statement, StatementKind, Transition, Type, TypeKind,
};

pub trait Visitor: Sized {
    fn visit_program(&mut self, program: &Program) {
        walk_program(self, program)
    }

    fn visit_declaration(&mut self, declaration: &Declaration) {
        walk_declaration(self, declaration)
    }

    fn visit_parameter(&mut self, parameter: &Parameter) {
        walk_parameter(self, parameter)
    }

    fn visit_parser_state(&mut self, state: &ParserState) {
        walk_parser_state(self, state)
    }

    fn visit_type(&mut self, ty: &Type) {
        walk_type(self, ty)
    }

    fn visit_block(&mut self, block: &Block) {
        walk_block(self, block)
    }

    fn visit_statement(&mut self, statement: &Statement) {
        walk_statement(self, statement)
    }

    fn visit_expression(&mut self, expression: &Expression) {
        walk_expression(self, expression)
    }

    /// An identifier in a *use* position (never a binding occurrence)
    fn visit_identifier_use(&mut self, _identifier: &Identifier) {}
}

pub fn walk_program<V: Visitor>(visitor: &mut V, program: &Program) {
    for declaration in &program.declarations {
        visitor.visit_declaration(declaration);
    }
}

pub fn walk_declaration<V: Visitor>(visitor: &mut V, declaration: &Declaration) {
    match &declaration.kind {
        DeclarationKind::Control(control) => {
            for parameter in &control.parameters {
                visitor.visit_parameter(parameter);
            }
            for local in &control.locals {
                visitor.visit_declaration(local);
            }
            visitor.visit_block(&control.body);
        }
        DeclarationKind::Parser(parser) => {
            for parameter in &parser.parameters {
                visitor.visit_parameter(parameter);
            }
            for state in &parser.states {
                visitor.visit_parser_state(state);
            }
        }
        DeclarationKind::Action(action) => {
            for parameter in &action.parameters {
                visitor.visit_parameter(parameter);
            }
            visitor.visit_block(&action.body);
        }
        DeclarationKind::Enum(_) => {}
        DeclarationKind::Constant(constant) => {
            visitor.visit_type(&constant.ty);
            visitor.visit_expression(&constant.value);
        }
        DeclarationKind::Extern(_) => {}
        DeclarationKind::Instance(instance) => {
            visitor.visit_identifier_use(&instance.target);
            for argument in &instance.arguments {
                visitor.visit_expression(argument);
            }
        }
    }
}

pub fn walk_parameter<V: Visitor>(visitor: &mut V, parameter: &Parameter) {
    visitor.visit_type(&parameter.ty);
}

pub fn walk_parser_state<V: Visitor>(visitor: &mut V, state: &ParserState) {
    for statement in &state.body {
        visitor.visit_statement(statement);
    }
    if let Transition::Next(next) = &state.transition {
        visitor.visit_identifier_use(next);
    }
}

pub fn walk_type<V: Visitor>(visitor: &mut V, ty: &Type) {
    match &ty.kind {
        TypeKind::Bits { .. } | TypeKind::Bool => {}
        TypeKind::Named(name) => visitor.visit_identifier_use(name),
    }
}

pub fn walk_block<V: Visitor>(visitor: &mut V, block: &Block) {
    for statement in &block.statements {
        visitor.visit_statement(statement);
    }
}

pub fn walk_statement<V: Visitor>(visitor: &mut V, statement: &Statement) {
    match &statement.kind {
        StatementKind::Assign { target, value } => {
            visitor.visit_expression(target);
            visitor.visit_expression(value);
        }
        StatementKind::Call { callee, arguments } => {
            visitor.visit_identifier_use(callee);
            for argument in arguments {
                visitor.visit_expression(argument);
            }
        }
        StatementKind::If {
            condition,
            then_block,
            else_block,
        } => {
            visitor.visit_expression(condition);
            visitor.visit_block(then_block);
            if let Some(else_block) = else_block {
                visitor.visit_block(else_block);
            }
        }
        StatementKind::Block(block) => visitor.visit_block(block),
        StatementKind::Empty => {}
    }
}

pub fn walk_expression<V: Visitor>(visitor: &mut V, expression: &Expression) {
    match &expression.kind {
        ExpressionKind::Name(identifier) => visitor.visit_identifier_use(identifier),
        ExpressionKind::Member { base, member: _ } => visitor.visit_identifier_use(base),
        ExpressionKind::IntLiteral { .. } | ExpressionKind::BoolLiteral(_) => {}
        ExpressionKind::Unary { operand, .. } => visitor.visit_expression(operand),
        ExpressionKind::Binary { lhs, rhs, .. } => {
            visitor.visit_expression(lhs);
            visitor.visit_expression(rhs);
        }
        ExpressionKind::Slice { base, .. } => visitor.visit_expression(base),
        ExpressionKind::Cast { operand, .. } => visitor.visit_expression(operand),
    }
}
