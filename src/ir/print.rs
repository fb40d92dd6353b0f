//! Plain-text dump of the program tree. Node ids and spans are deliberately
//! left out so two structurally equal trees dump identically; the tests lean
//! on that for "nothing ran after the halt" style assertions.

use core::fmt::Write;

use itertools::Itertools;

use super::{
    Block, Declaration, DeclarationKind, Expression, ExpressionKind, Program, Statement,
    StatementKind, Transition, Type, TypeKind, UnaryOperatorKind,
};

pub fn dump_program(program: &Program) -> String {
    let mut out = String::new();
    for declaration in &program.declarations {
        dump_declaration(&mut out, declaration, 0);
    }
    out
}

fn indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str("    ");
    }
}

fn dump_declaration(out: &mut String, declaration: &Declaration, depth: usize) {
    indent(out, depth);

    match &declaration.kind {
        DeclarationKind::Control(control) => {
            let parameters = control
                .parameters
                .iter()
                .map(|p| format!("{}: {}", p.name.symbol, p.ty))
                .join(", ");
            let _ = writeln!(out, "control {}({parameters}) {{", declaration.name.symbol);
            for local in &control.locals {
                dump_declaration(out, local, depth + 1);
            }
            indent(out, depth + 1);
            out.push_str("apply ");
            dump_block(out, &control.body, depth + 1);
            out.push('\n');
            indent(out, depth);
            out.push_str("}\n");
        }
        DeclarationKind::Parser(parser) => {
            let parameters = parser
                .parameters
                .iter()
                .map(|p| format!("{}: {}", p.name.symbol, p.ty))
                .join(", ");
            let _ = writeln!(out, "parser {}({parameters}) {{", declaration.name.symbol);
            for state in &parser.states {
                indent(out, depth + 1);
                let _ = writeln!(out, "state {} {{", state.name.symbol);
                for statement in &state.body {
                    dump_statement(out, statement, depth + 2);
                }
                indent(out, depth + 2);
                match &state.transition {
                    Transition::Accept => out.push_str("transition accept\n"),
                    Transition::Reject => out.push_str("transition reject\n"),
                    Transition::Next(next) => {
                        let _ = writeln!(out, "transition {}", next.symbol);
                    }
                }
                indent(out, depth + 1);
                out.push_str("}\n");
            }
            indent(out, depth);
            out.push_str("}\n");
        }
        DeclarationKind::Action(action) => {
            let parameters = action
                .parameters
                .iter()
                .map(|p| format!("{}: {}", p.name.symbol, p.ty))
                .join(", ");
            let _ = write!(out, "action {}({parameters}) ", declaration.name.symbol);
            dump_block(out, &action.body, depth);
            out.push('\n');
        }
        DeclarationKind::Enum(enumeration) => {
            let members = enumeration.members.iter().map(|m| m.symbol).join(", ");
            let _ = writeln!(out, "enum {} {{ {members} }}", declaration.name.symbol);
        }
        DeclarationKind::Constant(constant) => {
            let _ = writeln!(
                out,
                "const {}: {} = {}",
                declaration.name.symbol, constant.ty, constant.value
            );
        }
        DeclarationKind::Extern(ext) => {
            let methods = ext.methods.iter().map(|m| m.symbol).join(", ");
            let _ = writeln!(out, "extern {} {{ {methods} }}", declaration.name.symbol);
        }
        DeclarationKind::Instance(instance) => {
            let arguments = instance.arguments.iter().map(|a| a.to_string()).join(", ");
            let _ = writeln!(
                out,
                "instance {} = {}({arguments})",
                declaration.name.symbol, instance.target.symbol
            );
        }
    }
}

fn dump_block(out: &mut String, block: &Block, depth: usize) {
    out.push_str("{\n");
    for statement in &block.statements {
        dump_statement(out, statement, depth + 1);
    }
    indent(out, depth);
    out.push('}');
}

fn dump_statement(out: &mut String, statement: &Statement, depth: usize) {
    indent(out, depth);

    match &statement.kind {
        StatementKind::Assign { target, value } => {
            let _ = writeln!(out, "{target} = {value};");
        }
        StatementKind::Call { callee, arguments } => {
            let arguments = arguments.iter().map(|a| a.to_string()).join(", ");
            let _ = writeln!(out, "{}({arguments});", callee.symbol);
        }
        StatementKind::If {
            condition,
            then_block,
            else_block,
        } => {
            let _ = write!(out, "if ({condition}) ");
            dump_block(out, then_block, depth);
            if let Some(else_block) = else_block {
                out.push_str(" else ");
                dump_block(out, else_block, depth);
            }
            out.push('\n');
        }
        StatementKind::Block(block) => {
            dump_block(out, block, depth);
            out.push('\n');
        }
        StatementKind::Empty => out.push_str(";\n"),
    }
}

impl core::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            TypeKind::Bits { width } => write!(f, "bits<{width}>"),
            TypeKind::Bool => f.write_str("bool"),
            TypeKind::Named(name) => write!(f, "{}", name.symbol),
        }
    }
}

impl core::fmt::Display for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            ExpressionKind::Name(name) => write!(f, "{}", name.symbol),
            ExpressionKind::Member { base, member } => {
                write!(f, "{}.{}", base.symbol, member.symbol)
            }
            ExpressionKind::IntLiteral { value, width } => match width {
                Some(width) => write!(f, "{width}w{value}"),
                None => write!(f, "{value}"),
            },
            ExpressionKind::BoolLiteral(value) => write!(f, "{value}"),
            ExpressionKind::Unary { operator, operand } => {
                let symbol = match operator {
                    UnaryOperatorKind::Negate => "-",
                    UnaryOperatorKind::Not => "!",
                    UnaryOperatorKind::Complement => "~",
                };
                write!(f, "{symbol}({operand})")
            }
            ExpressionKind::Binary { operator, lhs, rhs } => {
                write!(f, "({lhs} {operator} {rhs})")
            }
            ExpressionKind::Slice { base, high, low } => write!(f, "{base}[{high}:{low}]"),
            ExpressionKind::Cast { width, operand } => write!(f, "(bits<{width}>)({operand})"),
        }
    }
}
