//! Enum conversion.
//!
//! The policy decides, per enum declaration, whether it is lowered to a
//! fixed-width bit vector for the target. For converted enums every member
//! access becomes a sized integer literal (member index in declaration
//! order), every type reference becomes `bits<W>`, and the declaration itself
//! is dropped. Exempt enums pass through untouched.

use hashbrown::HashMap;

use crate::{
    context::AnalysisContext,
    intern::Symbol,
    ir::{
        DeclarationKind, Expression, ExpressionKind, NodeId, Program, Type, TypeKind,
    },
    passes::rewrite::map_expressions_in_declaration,
    policy::EnumRepresentationPolicy,
    source::SourceMap,
};

struct ConvertedEnum {
    width: u16,
    members: HashMap<Symbol, i64>,
}

pub fn convert_enums(
    mut program: Program,
    context: &AnalysisContext,
    policy: &dyn EnumRepresentationPolicy,
    sources: &SourceMap,
) -> Program {
    let mut converted: HashMap<NodeId, ConvertedEnum> = HashMap::new();

    for declaration in &program.declarations {
        let DeclarationKind::Enum(enumeration) = &declaration.kind else {
            continue;
        };
        if !policy.should_convert(declaration, sources) {
            log::debug!("enum `{}` is exempt from conversion", declaration.name.symbol);
            continue;
        }
        let members = enumeration
            .members
            .iter()
            .enumerate()
            .map(|(index, member)| (member.symbol, index as i64))
            .collect();
        converted.insert(
            declaration.id,
            ConvertedEnum {
                width: policy.representation_width(declaration),
                members,
            },
        );
    }

    if converted.is_empty() {
        return program;
    }

    let mut declarations = std::mem::take(&mut program.declarations);
    for declaration in &mut declarations {
        map_expressions_in_declaration(declaration, &mut |expression| {
            rewrite_member_access(expression, context, &converted)
        });
        rewrite_type_references(declaration, context, &converted);
    }
    declarations.retain(|d| !converted.contains_key(&d.id));
    program.declarations = declarations;

    program
}

fn rewrite_member_access(
    mut expression: Expression,
    context: &AnalysisContext,
    converted: &HashMap<NodeId, ConvertedEnum>,
) -> Expression {
    let ExpressionKind::Member { base, member } = &expression.kind else {
        return expression;
    };
    let Some(target) = context.resolve(base.id) else {
        return expression;
    };
    let Some(enumeration) = converted.get(&target) else {
        return expression;
    };
    let Some(index) = enumeration.members.get(&member.symbol) else {
        return expression;
    };

    expression.kind = ExpressionKind::IntLiteral {
        value: *index,
        width: Some(enumeration.width),
    };
    expression
}

fn rewrite_type_references(
    declaration: &mut crate::ir::Declaration,
    context: &AnalysisContext,
    converted: &HashMap<NodeId, ConvertedEnum>,
) {
    let rewrite = |ty: &mut Type| {
        let TypeKind::Named(name) = &ty.kind else {
            return;
        };
        let Some(target) = context.resolve(name.id) else {
            return;
        };
        if let Some(enumeration) = converted.get(&target) {
            ty.kind = TypeKind::Bits {
                width: enumeration.width,
            };
        }
    };

    match &mut declaration.kind {
        DeclarationKind::Control(control) => {
            for parameter in &mut control.parameters {
                rewrite(&mut parameter.ty);
            }
            for local in &mut control.locals {
                rewrite_type_references(local, context, converted);
            }
        }
        DeclarationKind::Parser(parser) => {
            for parameter in &mut parser.parameters {
                rewrite(&mut parameter.ty);
            }
        }
        DeclarationKind::Action(action) => {
            for parameter in &mut action.parameters {
                rewrite(&mut parameter.ty);
            }
        }
        DeclarationKind::Constant(constant) => rewrite(&mut constant.ty),
        DeclarationKind::Enum(_) | DeclarationKind::Extern(_) | DeclarationKind::Instance(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ir::{build::TreeBuilder, print::dump_program},
        passes::type_check::run_resolve_references,
        policy::EnumOn32Bits,
    };

    #[test]
    fn user_enums_become_sized_literals() {
        let mut sources = SourceMap::new();
        let mut b = TreeBuilder::new(sources.add_memory(""));

        let proto = b.enumeration("Proto", &["tcp", "udp"]);
        let body = {
            let target = b.name("selected");
            let value = b.member("Proto", "udp");
            let assign = b.assign(target, value);
            b.block(vec![assign])
        };
        let ty = b.named_type("Proto");
        let selected = b.parameter("selected", ty);
        let control = b.control("ingress", vec![selected], vec![], body);
        let program = b.finish(vec![proto, control]);

        let mut context = AnalysisContext::new();
        run_resolve_references(&program, &mut context).unwrap();

        let program = convert_enums(program, &context, &EnumOn32Bits, &sources);
        let dump = dump_program(&program);
        assert!(dump.contains("selected = 32w1;"), "got:\n{dump}");
        assert!(dump.contains("selected: bits<32>"), "got:\n{dump}");
        assert!(!dump.contains("enum Proto"), "got:\n{dump}");
    }

    #[test]
    fn stdlib_enums_are_exempt() {
        let mut sources = SourceMap::new();
        let stdlib = sources.add_file("creek/core.creek", "");
        let user = sources.add_memory("");

        let mut b = TreeBuilder::new(stdlib);
        let verdict = b.enumeration("Verdict", &["pass", "drop"]);
        b.in_source(user);
        let body = {
            let target = b.name("v");
            let value = b.member("Verdict", "drop");
            let assign = b.assign(target, value);
            b.block(vec![assign])
        };
        let ty = b.named_type("Verdict");
        let v = b.parameter("v", ty);
        let control = b.control("ingress", vec![v], vec![], body);
        let program = b.finish(vec![verdict, control]);

        let mut context = AnalysisContext::new();
        run_resolve_references(&program, &mut context).unwrap();

        let program = convert_enums(program, &context, &EnumOn32Bits, &sources);
        let dump = dump_program(&program);
        assert!(dump.contains("enum Verdict"), "got:\n{dump}");
        assert!(dump.contains("v = Verdict.drop;"), "got:\n{dump}");
        assert!(dump.contains("v: Verdict"), "got:\n{dump}");
    }
}
