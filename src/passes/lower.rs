//! Slice lowering.
//!
//! Targets take bit vectors, shifts, and masks; they do not take slice
//! syntax. `remove_left_slices` turns a slice assignment into a masked
//! read-modify-write of the whole base, and `lower_expressions` turns the
//! remaining slice reads into shift-and-cast. Both consult the type map for
//! the width of the sliced base, so they sit between type checking runs.

use crate::{
    context::{AnalysisContext, ResolvedType},
    ir::{
        BinaryOperatorKind, Block, DeclarationKind, Expression, ExpressionKind, Program, Statement,
        StatementKind,
    },
    passes::rewrite::{map_expressions_in_declaration, refresh_expression_ids},
};

/// Rewrites `base[h:l] = value` into
/// `base = (base & keep) | ((bits<W>)(value) << l)` where `keep` clears the
/// written bit range and `W` is the width of `base`.
pub fn remove_left_slices(mut program: Program, context: &AnalysisContext) -> Program {
    let mut declarations = std::mem::take(&mut program.declarations);

    for declaration in &mut declarations {
        match &mut declaration.kind {
            DeclarationKind::Control(control) => {
                for local in &mut control.locals {
                    if let DeclarationKind::Action(action) = &mut local.kind {
                        rewrite_block(&mut action.body, &mut program, context);
                    }
                }
                rewrite_block(&mut control.body, &mut program, context);
            }
            DeclarationKind::Action(action) => {
                rewrite_block(&mut action.body, &mut program, context)
            }
            DeclarationKind::Parser(parser) => {
                for state in &mut parser.states {
                    for statement in &mut state.body {
                        rewrite_statement(statement, &mut program, context);
                    }
                }
            }
            _ => {}
        }
    }

    program.declarations = declarations;
    program
}

fn rewrite_block(block: &mut Block, program: &mut Program, context: &AnalysisContext) {
    for statement in &mut block.statements {
        rewrite_statement(statement, program, context);
    }
}

fn rewrite_statement(statement: &mut Statement, program: &mut Program, context: &AnalysisContext) {
    match &mut statement.kind {
        StatementKind::If {
            then_block,
            else_block,
            ..
        } => {
            rewrite_block(then_block, program, context);
            if let Some(else_block) = else_block {
                rewrite_block(else_block, program, context);
            }
        }
        StatementKind::Block(block) => rewrite_block(block, program, context),
        StatementKind::Assign { .. } | StatementKind::Call { .. } | StatementKind::Empty => {}
    }

    // Each round peels one slice level off the target, so a nested slice
    // assignment collapses all the way down to the bare base
    loop {
        let StatementKind::Assign { target, .. } = &statement.kind else {
            break;
        };
        if !matches!(target.kind, ExpressionKind::Slice { .. }) {
            break;
        }
        let kind = std::mem::replace(&mut statement.kind, StatementKind::Empty);
        let StatementKind::Assign { target, value } = kind else {
            unreachable!();
        };
        let ExpressionKind::Slice { base, high, low } = target.kind else {
            unreachable!();
        };
        let Some(ResolvedType::Bits { width }) = context.type_of(base.id) else {
            // Only well-typed programs reach the tail of the pipeline
            statement.kind = StatementKind::Assign {
                target: Expression {
                    id: target.id,
                    span: target.span,
                    kind: ExpressionKind::Slice { base, high, low },
                },
                value,
            };
            break;
        };
        let width = *width;
        let span = target.span;

        let mut read = (*base).clone();
        refresh_expression_ids(&mut read, &mut || program.fresh_id());

        let field_width = high - low + 1;
        // Type checking caps widths at MAX_BITS_WIDTH, so the mask both
        // fits the shift and survives the `i64` literal below
        let keep = !(((1u128 << field_width) - 1) << low) & ((1u128 << width) - 1);

        let mut node = |kind| Expression {
            id: program.fresh_id(),
            span,
            kind,
        };
        let keep_mask = node(ExpressionKind::IntLiteral {
            value: keep as i64,
            width: Some(width),
        });
        let masked = node(ExpressionKind::Binary {
            operator: BinaryOperatorKind::BitAnd,
            lhs: Box::new(read),
            rhs: Box::new(keep_mask),
        });
        let widened = node(ExpressionKind::Cast {
            width,
            operand: Box::new(value),
        });
        let shift = node(ExpressionKind::IntLiteral {
            value: low as i64,
            width: None,
        });
        let shifted = node(ExpressionKind::Binary {
            operator: BinaryOperatorKind::ShiftLeft,
            lhs: Box::new(widened),
            rhs: Box::new(shift),
        });
        let merged = node(ExpressionKind::Binary {
            operator: BinaryOperatorKind::BitOr,
            lhs: Box::new(masked),
            rhs: Box::new(shifted),
        });

        statement.kind = StatementKind::Assign {
            target: *base,
            value: merged,
        };
    }
}

/// Rewrites slice reads `base[h:l]` into `(bits<h-l+1>)((base >> l))`.
pub fn lower_expressions(mut program: Program, context: &AnalysisContext) -> Program {
    let mut declarations = std::mem::take(&mut program.declarations);

    for declaration in &mut declarations {
        map_expressions_in_declaration(declaration, &mut |expression| {
            lower_slice_read(expression, &mut program, context)
        });
    }

    program.declarations = declarations;
    program
}

fn lower_slice_read(
    expression: Expression,
    program: &mut Program,
    context: &AnalysisContext,
) -> Expression {
    let ExpressionKind::Slice { .. } = &expression.kind else {
        return expression;
    };
    let ExpressionKind::Slice { base, high, low } = expression.kind else {
        unreachable!();
    };
    if !matches!(context.type_of(base.id), Some(ResolvedType::Bits { .. })) {
        return Expression {
            id: expression.id,
            span: expression.span,
            kind: ExpressionKind::Slice { base, high, low },
        };
    }

    let span = expression.span;
    let shift = Expression {
        id: program.fresh_id(),
        span,
        kind: ExpressionKind::IntLiteral {
            value: low as i64,
            width: None,
        },
    };
    let shifted = Expression {
        id: program.fresh_id(),
        span,
        kind: ExpressionKind::Binary {
            operator: BinaryOperatorKind::ShiftRight,
            lhs: base,
            rhs: Box::new(shift),
        },
    };

    Expression {
        id: expression.id,
        span,
        kind: ExpressionKind::Cast {
            width: high - low + 1,
            operand: Box::new(shifted),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ir::{build::TreeBuilder, print::dump_program},
        passes::type_check::run_type_checking,
        source::SourceMap,
    };

    #[test]
    fn slice_assignment_becomes_read_modify_write() {
        let mut sources = SourceMap::new();
        let mut b = TreeBuilder::new(sources.add_memory(""));

        let body = {
            let base = b.name("x");
            let target = b.slice(base, 5, 2);
            let value = b.int_with_width(5, 4);
            let assign = b.assign(target, value);
            b.block(vec![assign])
        };
        let x_ty = b.bits(8);
        let x = b.parameter("x", x_ty);
        let control = b.control("ingress", vec![x], vec![], body);
        let program = b.finish(vec![control]);

        let mut context = AnalysisContext::new();
        run_type_checking(&program, &mut context).unwrap();

        let program = remove_left_slices(program, &context);
        let dump = dump_program(&program);
        // keep mask: !(0b1111 << 2) over 8 bits = 0xC3 = 195
        assert!(
            dump.contains("x = ((x & 8w195) | ((bits<8>)(4w5) << 2));"),
            "got:\n{dump}"
        );
    }

    #[test]
    fn nested_slice_assignments_peel_down_to_the_base() {
        let mut sources = SourceMap::new();
        let mut b = TreeBuilder::new(sources.add_memory(""));

        let body = {
            let base = b.name("x");
            let outer = b.slice(base, 7, 4);
            let target = b.slice(outer, 2, 0);
            let value = b.name("v");
            let assign = b.assign(target, value);
            b.block(vec![assign])
        };
        let x_ty = b.bits(8);
        let x = b.parameter("x", x_ty);
        let v_ty = b.bits(3);
        let v = b.parameter("v", v_ty);
        let control = b.control("ingress", vec![x, v], vec![], body);
        let program = b.finish(vec![control]);

        let mut context = AnalysisContext::new();
        run_type_checking(&program, &mut context).unwrap();
        let program = remove_left_slices(program, &context);

        // Re-identified slice reads need fresh types before read lowering
        run_type_checking(&program, &mut context).unwrap();
        let program = lower_expressions(program, &context);

        let dump = dump_program(&program);
        assert!(
            dump.contains(
                "x = ((x & 8w15) | \
                 ((bits<8>)((((bits<4>)((x >> 4)) & 4w8) | ((bits<4>)(v) << 0))) << 4));"
            ),
            "got:\n{dump}"
        );
        // The target must end up a plain name, never a cast or a slice
        assert!(!dump.contains(") = "), "got:\n{dump}");
        assert!(!dump.contains("] = "), "got:\n{dump}");
    }

    #[test]
    fn wide_bases_keep_the_full_mask() {
        let mut sources = SourceMap::new();
        let mut b = TreeBuilder::new(sources.add_memory(""));

        let body = {
            let base = b.name("x");
            let target = b.slice(base, 47, 40);
            let value = b.int_with_width(3, 8);
            let assign = b.assign(target, value);
            b.block(vec![assign])
        };
        let x_ty = b.bits(48);
        let x = b.parameter("x", x_ty);
        let control = b.control("ingress", vec![x], vec![], body);
        let program = b.finish(vec![control]);

        let mut context = AnalysisContext::new();
        run_type_checking(&program, &mut context).unwrap();

        let program = remove_left_slices(program, &context);
        let dump = dump_program(&program);
        // keep mask: !(0xFF << 40) over 48 bits = 2^40 - 1
        assert!(
            dump.contains("x = ((x & 48w1099511627775) | ((bits<48>)(8w3) << 40));"),
            "got:\n{dump}"
        );
    }

    #[test]
    fn slice_reads_become_shift_and_cast() {
        let mut sources = SourceMap::new();
        let mut b = TreeBuilder::new(sources.add_memory(""));

        let body = {
            let target = b.name("y");
            let base = b.name("x");
            let value = b.slice(base, 5, 2);
            let assign = b.assign(target, value);
            b.block(vec![assign])
        };
        let x_ty = b.bits(8);
        let x = b.parameter("x", x_ty);
        let y_ty = b.bits(4);
        let y = b.parameter("y", y_ty);
        let control = b.control("ingress", vec![x, y], vec![], body);
        let program = b.finish(vec![control]);

        let mut context = AnalysisContext::new();
        run_type_checking(&program, &mut context).unwrap();

        let program = lower_expressions(program, &context);
        let dump = dump_program(&program);
        assert!(dump.contains("y = (bits<4>)((x >> 2));"), "got:\n{dump}");
    }
}
