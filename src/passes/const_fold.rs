//! Compile-time arithmetic: constant substitution and folding, plus the
//! strength-reduction rewrites for the soft-switch target.
//!
//! Folding is conservative: anything it cannot prove (division by zero,
//! oversized shift amounts, operands that are not literals) is left exactly
//! as written. All arithmetic wraps to the operand width, matching the
//! hardware semantics the back ends compile for.

use hashbrown::HashMap;

use crate::{
    context::AnalysisContext,
    ir::{
        BinaryOperatorKind, Declaration, DeclarationKind, Expression, ExpressionKind, NodeId,
        Program, UnaryOperatorKind,
    },
    passes::rewrite::map_expressions_in_declaration,
    passes::type_check::DEFAULT_LITERAL_WIDTH,
};

fn mask(width: u16) -> i64 {
    if width >= 64 {
        -1
    } else {
        (1i64 << width) - 1
    }
}

/// Substitutes references to literal-valued constants and folds literal
/// subexpressions bottom-up.
pub fn constant_folding(mut program: Program, context: &AnalysisContext) -> Program {
    // Constants whose initializer is already a literal can be substituted at
    // their use sites
    let mut literal_constants: HashMap<NodeId, ExpressionKind> = HashMap::new();
    for declaration in &program.declarations {
        index_literal_constants(declaration, &mut literal_constants);
    }

    let mut folded = 0usize;
    let mut declarations = std::mem::take(&mut program.declarations);

    for declaration in &mut declarations {
        // Instance arguments name toplevel objects; substituting constants
        // into them would corrupt the topology
        if matches!(declaration.kind, DeclarationKind::Instance(_)) {
            continue;
        }

        map_expressions_in_declaration(declaration, &mut |expression| {
            fold_expression(expression, context, &literal_constants, &mut folded)
        });
    }

    program.declarations = declarations;

    if folded > 0 {
        log::debug!("folded {folded} constant expression(s)");
    }

    program
}

fn index_literal_constants(
    declaration: &Declaration,
    literal_constants: &mut HashMap<NodeId, ExpressionKind>,
) {
    match &declaration.kind {
        DeclarationKind::Constant(constant) => {
            if matches!(
                constant.value.kind,
                ExpressionKind::IntLiteral { .. } | ExpressionKind::BoolLiteral(_)
            ) {
                literal_constants.insert(declaration.id, constant.value.kind.clone());
            }
        }
        DeclarationKind::Control(control) => {
            for local in &control.locals {
                index_literal_constants(local, literal_constants);
            }
        }
        _ => {}
    }
}

fn fold_expression(
    mut expression: Expression,
    context: &AnalysisContext,
    literal_constants: &HashMap<NodeId, ExpressionKind>,
    folded: &mut usize,
) -> Expression {
    match &expression.kind {
        ExpressionKind::Name(name) => {
            if let Some(kind) = context
                .resolve(name.id)
                .and_then(|target| literal_constants.get(&target))
            {
                expression.kind = kind.clone();
                *folded += 1;
            }
            expression
        }
        ExpressionKind::Unary { operator, operand } => {
            let ExpressionKind::IntLiteral { value, width } = operand.kind else {
                if let (UnaryOperatorKind::Not, ExpressionKind::BoolLiteral(b)) =
                    (operator, &operand.kind)
                {
                    expression.kind = ExpressionKind::BoolLiteral(!b);
                    *folded += 1;
                }
                return expression;
            };
            let width_bits = width.unwrap_or(DEFAULT_LITERAL_WIDTH);
            let result = match operator {
                UnaryOperatorKind::Negate => value.wrapping_neg(),
                UnaryOperatorKind::Complement => !value,
                UnaryOperatorKind::Not => return expression,
            };
            expression.kind = ExpressionKind::IntLiteral {
                value: result & mask(width_bits),
                width,
            };
            *folded += 1;
            expression
        }
        ExpressionKind::Binary { operator, lhs, rhs } => {
            match (&lhs.kind, &rhs.kind) {
                (
                    ExpressionKind::IntLiteral {
                        value: a,
                        width: wa,
                    },
                    ExpressionKind::IntLiteral {
                        value: b,
                        width: wb,
                    },
                ) => {
                    let width = wa.or(*wb);
                    if let Some(kind) = fold_int_binary(*operator, *a, *b, width) {
                        expression.kind = kind;
                        *folded += 1;
                    }
                }
                (ExpressionKind::BoolLiteral(a), ExpressionKind::BoolLiteral(b)) => {
                    let result = match operator {
                        BinaryOperatorKind::LogicalAnd => Some(*a && *b),
                        BinaryOperatorKind::LogicalOr => Some(*a || *b),
                        BinaryOperatorKind::Equal => Some(a == b),
                        BinaryOperatorKind::NotEqual => Some(a != b),
                        _ => None,
                    };
                    if let Some(result) = result {
                        expression.kind = ExpressionKind::BoolLiteral(result);
                        *folded += 1;
                    }
                }
                _ => {}
            }
            expression
        }
        ExpressionKind::Cast { width, operand } => {
            if let ExpressionKind::IntLiteral { value, .. } = operand.kind {
                expression.kind = ExpressionKind::IntLiteral {
                    value: value & mask(*width),
                    width: Some(*width),
                };
                *folded += 1;
            }
            expression
        }
        ExpressionKind::Slice { base, high, low } => {
            if let ExpressionKind::IntLiteral { value, .. } = base.kind {
                let width = high - low + 1;
                expression.kind = ExpressionKind::IntLiteral {
                    value: (value >> low) & mask(width),
                    width: Some(width),
                };
                *folded += 1;
            }
            expression
        }
        _ => expression,
    }
}

fn fold_int_binary(
    operator: BinaryOperatorKind,
    a: i64,
    b: i64,
    width: Option<u16>,
) -> Option<ExpressionKind> {
    use BinaryOperatorKind::*;

    let width_bits = width.unwrap_or(DEFAULT_LITERAL_WIDTH);

    let comparison = |result: bool| Some(ExpressionKind::BoolLiteral(result));
    let arithmetic =
        |result: i64| Some(ExpressionKind::IntLiteral { value: result & mask(width_bits), width });

    match operator {
        Add => arithmetic(a.wrapping_add(b)),
        Subtract => arithmetic(a.wrapping_sub(b)),
        Multiply => arithmetic(a.wrapping_mul(b)),
        Divide if b != 0 => arithmetic(a.wrapping_div(b)),
        Modulo if b != 0 => arithmetic(a.wrapping_rem(b)),
        Divide | Modulo => None,
        BitAnd => arithmetic(a & b),
        BitOr => arithmetic(a | b),
        BitXor => arithmetic(a ^ b),
        ShiftLeft if (0..64).contains(&b) => arithmetic(a.wrapping_shl(b as u32)),
        ShiftRight if (0..64).contains(&b) => arithmetic(((a as u64) >> b) as i64),
        ShiftLeft | ShiftRight => None,
        Equal => comparison(a == b),
        NotEqual => comparison(a != b),
        LessThan => comparison(a < b),
        GreaterThan => comparison(a > b),
        LogicalAnd | LogicalOr => None,
    }
}

/// Rewrites expensive operations into shift/mask equivalents when one
/// operand is a power-of-two literal.
pub fn strength_reduction(mut program: Program) -> Program {
    let mut reduced = 0usize;
    let mut declarations = std::mem::take(&mut program.declarations);

    for declaration in &mut declarations {
        if matches!(declaration.kind, DeclarationKind::Instance(_)) {
            continue;
        }
        map_expressions_in_declaration(declaration, &mut |expression| {
            reduce_expression(expression, &mut reduced)
        });
    }

    program.declarations = declarations;

    if reduced > 0 {
        log::debug!("strength-reduced {reduced} expression(s)");
    }

    program
}

fn reduce_expression(mut expression: Expression, reduced: &mut usize) -> Expression {
    use BinaryOperatorKind::*;

    let ExpressionKind::Binary { operator, lhs, rhs } = &mut expression.kind else {
        return expression;
    };

    let ExpressionKind::IntLiteral { value, width } = rhs.kind else {
        return expression;
    };

    // x + 0, x - 0, x << 0, x >> 0
    if value == 0 && matches!(operator, Add | Subtract | ShiftLeft | ShiftRight) {
        *reduced += 1;
        return *lhs.clone();
    }

    // x * 1, x / 1
    if value == 1 && matches!(operator, Multiply | Divide) {
        *reduced += 1;
        return *lhs.clone();
    }

    if value > 0 && (value & (value - 1)) == 0 {
        let shift = value.trailing_zeros() as i64;
        let replacement = match operator {
            Multiply => Some((ShiftLeft, shift)),
            Divide => Some((ShiftRight, shift)),
            Modulo => Some((BitAnd, value - 1)),
            _ => None,
        };
        if let Some((new_operator, new_rhs)) = replacement {
            *operator = new_operator;
            rhs.kind = ExpressionKind::IntLiteral {
                value: new_rhs,
                width,
            };
            *reduced += 1;
        }
    }

    expression
}
