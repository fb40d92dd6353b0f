//! Type inference for expression nodes.
//!
//! The `TypeChecking` pipeline step is the composition of reference
//! resolution and the inference below: it installs both maps into the
//! analysis context in one go, which is also why it is the only builder of
//! the type map.
//!
//! Creek's type discipline is deliberately rigid: fixed-width unsigned
//! integers must agree exactly on width (no implicit widening), conditions
//! are `bool`, and enum values only ever compare for equality. Unsuffixed
//! integer literals default to `bits<32>`.

use std::collections::BTreeMap;

use hashbrown::HashMap;

use crate::{
    context::{AnalysisContext, ResolvedType},
    error::CompileError,
    ir::{
        BinaryOperatorKind, Block, Declaration, DeclarationKind, Expression, ExpressionKind,
        NodeId, Parameter, Program, Statement, StatementKind, Type, TypeKind, UnaryOperatorKind,
    },
    passes::resolve::resolve_references,
    source::Span,
};

pub const DEFAULT_LITERAL_WIDTH: u16 = 32;

/// Literal values ride in an `i64`, so a full-width mask has to fit 63 bits.
/// Wider `bits<N>` types are rejected here, before any pass builds masks or
/// folds arithmetic at that width.
pub const MAX_BITS_WIDTH: u16 = 63;

fn check_width(width: u16, span: Span) -> Result<(), CompileError> {
    if width > MAX_BITS_WIDTH {
        return Err(CompileError::UnsupportedWidth { width, span });
    }
    Ok(())
}

/// Runs reference resolution followed by type inference and installs both
/// maps. Idempotent: re-running over an unchanged tree rebuilds identical
/// maps.
pub fn run_type_checking(
    program: &Program,
    context: &mut AnalysisContext,
) -> Result<(), CompileError> {
    let references = resolve_references(program)?;
    let types = infer_types(program, &references)?;

    context.set_references(references);
    context.set_types(types);

    Ok(())
}

/// The resolve-only builder step
pub fn run_resolve_references(
    program: &Program,
    context: &mut AnalysisContext,
) -> Result<(), CompileError> {
    let references = resolve_references(program)?;
    context.set_references(references);
    Ok(())
}

pub fn infer_types(
    program: &Program,
    references: &BTreeMap<NodeId, NodeId>,
) -> Result<BTreeMap<NodeId, ResolvedType>, CompileError> {
    let mut checker = TypeChecker {
        references,
        targets: HashMap::new(),
        types: BTreeMap::new(),
    };

    checker.index_program(program);

    for declaration in &program.declarations {
        checker.check_declaration(declaration)?;
    }

    Ok(checker.types)
}

/// What an identifier use may resolve to
enum Target<'a> {
    Declaration(&'a Declaration),
    Parameter(&'a Parameter),
    State,
}

struct TypeChecker<'a> {
    references: &'a BTreeMap<NodeId, NodeId>,
    targets: HashMap<NodeId, Target<'a>>,
    types: BTreeMap<NodeId, ResolvedType>,
}

impl<'a> TypeChecker<'a> {
    /* Indexing */

    fn index_program(&mut self, program: &'a Program) {
        for declaration in &program.declarations {
            self.index_declaration(declaration);
        }
    }

    fn index_declaration(&mut self, declaration: &'a Declaration) {
        self.targets
            .insert(declaration.id, Target::Declaration(declaration));

        match &declaration.kind {
            DeclarationKind::Control(control) => {
                for parameter in &control.parameters {
                    self.targets.insert(parameter.id, Target::Parameter(parameter));
                }
                for local in &control.locals {
                    self.index_declaration(local);
                }
            }
            DeclarationKind::Parser(parser) => {
                for parameter in &parser.parameters {
                    self.targets.insert(parameter.id, Target::Parameter(parameter));
                }
                for state in &parser.states {
                    self.targets.insert(state.id, Target::State);
                }
            }
            DeclarationKind::Action(action) => {
                for parameter in &action.parameters {
                    self.targets.insert(parameter.id, Target::Parameter(parameter));
                }
            }
            _ => {}
        }
    }

    fn target_of(&self, use_id: NodeId) -> Option<&Target<'a>> {
        self.references
            .get(&use_id)
            .and_then(|target| self.targets.get(target))
    }

    /* Declarations */

    fn check_declaration(&mut self, declaration: &Declaration) -> Result<(), CompileError> {
        match &declaration.kind {
            DeclarationKind::Control(control) => {
                self.check_parameters(&control.parameters)?;
                for local in &control.locals {
                    self.check_declaration(local)?;
                }
                self.check_block(&control.body)
            }
            DeclarationKind::Parser(parser) => {
                self.check_parameters(&parser.parameters)?;
                for state in &parser.states {
                    for statement in &state.body {
                        self.check_statement(statement)?;
                    }
                }
                Ok(())
            }
            DeclarationKind::Action(action) => {
                self.check_parameters(&action.parameters)?;
                self.check_block(&action.body)
            }
            DeclarationKind::Constant(constant) => {
                let declared = self.resolve_type(&constant.ty)?;
                let actual = self.check_expression(&constant.value)?;
                if actual != declared {
                    return Err(CompileError::TypeMismatch {
                        expected: declared.to_string(),
                        actual: actual.to_string(),
                        span: constant.value.span,
                    });
                }
                Ok(())
            }
            // Instance constructor arguments are checked by the evaluator,
            // not here: they name toplevel objects, not values
            DeclarationKind::Enum(_)
            | DeclarationKind::Extern(_)
            | DeclarationKind::Instance(_) => Ok(()),
        }
    }

    // Declared parameter types are validated even when no use site forces
    // their resolution
    fn check_parameters(&mut self, parameters: &[Parameter]) -> Result<(), CompileError> {
        for parameter in parameters {
            self.resolve_type(&parameter.ty)?;
        }
        Ok(())
    }

    /* Statements */

    fn check_block(&mut self, block: &Block) -> Result<(), CompileError> {
        for statement in &block.statements {
            self.check_statement(statement)?;
        }
        Ok(())
    }

    fn check_statement(&mut self, statement: &Statement) -> Result<(), CompileError> {
        match &statement.kind {
            StatementKind::Assign { target, value } => {
                let target_type = self.check_expression(target)?;
                let value_type = self.check_expression(value)?;
                if target_type != value_type {
                    return Err(CompileError::TypeMismatch {
                        expected: target_type.to_string(),
                        actual: value_type.to_string(),
                        span: value.span,
                    });
                }
                Ok(())
            }
            StatementKind::Call { callee, arguments } => {
                let parameters = match self.target_of(callee.id) {
                    Some(Target::Declaration(declaration)) => match &declaration.kind {
                        DeclarationKind::Action(action) => &action.parameters,
                        DeclarationKind::Control(control) => &control.parameters,
                        _ => {
                            return Err(CompileError::NotCallable {
                                name: callee.symbol,
                                span: callee.span,
                            })
                        }
                    },
                    _ => {
                        return Err(CompileError::NotCallable {
                            name: callee.symbol,
                            span: callee.span,
                        })
                    }
                };

                if parameters.len() != arguments.len() {
                    return Err(CompileError::ArgumentCountMismatch {
                        expected: parameters.len(),
                        actual: arguments.len(),
                        span: callee.span,
                    });
                }

                // The parameter types must be resolved before the arguments
                // are checked against them
                let expected = parameters
                    .iter()
                    .map(|p| self.resolve_type(&p.ty))
                    .collect::<Result<Vec<_>, _>>()?;

                for (argument, expected) in arguments.iter().zip(expected) {
                    let actual = self.check_expression(argument)?;
                    if actual != expected {
                        return Err(CompileError::TypeMismatch {
                            expected: expected.to_string(),
                            actual: actual.to_string(),
                            span: argument.span,
                        });
                    }
                }

                Ok(())
            }
            StatementKind::If {
                condition,
                then_block,
                else_block,
            } => {
                let condition_type = self.check_expression(condition)?;
                if condition_type != ResolvedType::Bool {
                    return Err(CompileError::TypeMismatch {
                        expected: ResolvedType::Bool.to_string(),
                        actual: condition_type.to_string(),
                        span: condition.span,
                    });
                }
                self.check_block(then_block)?;
                if let Some(else_block) = else_block {
                    self.check_block(else_block)?;
                }
                Ok(())
            }
            StatementKind::Block(block) => self.check_block(block),
            StatementKind::Empty => Ok(()),
        }
    }

    /* Expressions */

    fn check_expression(&mut self, expression: &Expression) -> Result<ResolvedType, CompileError> {
        let ty = match &expression.kind {
            ExpressionKind::Name(name) => match self.target_of(name.id) {
                Some(Target::Parameter(parameter)) => self.resolve_type(&parameter.ty)?,
                Some(Target::Declaration(declaration)) => match &declaration.kind {
                    DeclarationKind::Constant(constant) => self.resolve_type(&constant.ty)?,
                    other => {
                        return Err(CompileError::TypeMismatch {
                            expected: "a value".to_string(),
                            actual: format!("{} `{}`", other.keyword(), name.symbol),
                            span: name.span,
                        })
                    }
                },
                _ => {
                    return Err(CompileError::UnresolvedReference {
                        name: name.symbol,
                        span: name.span,
                    })
                }
            },
            ExpressionKind::Member { base, member } => {
                let Some(Target::Declaration(declaration)) = self.target_of(base.id) else {
                    return Err(CompileError::UnresolvedReference {
                        name: base.symbol,
                        span: base.span,
                    });
                };
                let DeclarationKind::Enum(enumeration) = &declaration.kind else {
                    return Err(CompileError::UnknownEnumMember {
                        base: base.symbol,
                        name: member.symbol,
                        span: member.span,
                    });
                };
                if !enumeration
                    .members
                    .iter()
                    .any(|m| m.symbol == member.symbol)
                {
                    return Err(CompileError::UnknownEnumMember {
                        base: base.symbol,
                        name: member.symbol,
                        span: member.span,
                    });
                }
                ResolvedType::Enum(declaration.name.symbol)
            }
            ExpressionKind::IntLiteral { width, .. } => {
                if let Some(width) = width {
                    check_width(*width, expression.span)?;
                }
                ResolvedType::Bits {
                    width: width.unwrap_or(DEFAULT_LITERAL_WIDTH),
                }
            }
            ExpressionKind::BoolLiteral(_) => ResolvedType::Bool,
            ExpressionKind::Unary { operator, operand } => {
                let operand_type = self.check_expression(operand)?;
                match (operator, &operand_type) {
                    (UnaryOperatorKind::Not, ResolvedType::Bool) => ResolvedType::Bool,
                    (
                        UnaryOperatorKind::Negate | UnaryOperatorKind::Complement,
                        ResolvedType::Bits { .. },
                    ) => operand_type,
                    _ => {
                        return Err(CompileError::InvalidOperation {
                            operator: format!("{operator:?}"),
                            span: expression.span,
                        })
                    }
                }
            }
            ExpressionKind::Binary { operator, lhs, rhs } => {
                let lhs_type = self.check_expression(lhs)?;
                let rhs_type = self.check_expression(rhs)?;
                self.check_binary(*operator, lhs_type, rhs_type, expression)?
            }
            ExpressionKind::Slice { base, high, low } => {
                let base_type = self.check_expression(base)?;
                let ResolvedType::Bits { width } = base_type else {
                    return Err(CompileError::InvalidOperation {
                        operator: "slice".to_string(),
                        span: expression.span,
                    });
                };
                if *high < *low || *high >= width {
                    return Err(CompileError::InvalidSlice {
                        high: *high,
                        low: *low,
                        width,
                        span: expression.span,
                    });
                }
                ResolvedType::Bits {
                    width: high - low + 1,
                }
            }
            ExpressionKind::Cast { width, operand } => {
                check_width(*width, expression.span)?;
                let operand_type = self.check_expression(operand)?;
                if !matches!(operand_type, ResolvedType::Bits { .. }) {
                    return Err(CompileError::InvalidOperation {
                        operator: "cast".to_string(),
                        span: expression.span,
                    });
                }
                ResolvedType::Bits { width: *width }
            }
        };

        self.types.insert(expression.id, ty.clone());
        Ok(ty)
    }

    fn check_binary(
        &mut self,
        operator: BinaryOperatorKind,
        lhs: ResolvedType,
        rhs: ResolvedType,
        expression: &Expression,
    ) -> Result<ResolvedType, CompileError> {
        use BinaryOperatorKind::*;

        let invalid = || CompileError::InvalidOperation {
            operator: operator.to_string(),
            span: expression.span,
        };

        match operator {
            LogicalAnd | LogicalOr => {
                if lhs == ResolvedType::Bool && rhs == ResolvedType::Bool {
                    Ok(ResolvedType::Bool)
                } else {
                    Err(invalid())
                }
            }
            Equal | NotEqual => {
                if lhs == rhs {
                    Ok(ResolvedType::Bool)
                } else {
                    Err(CompileError::TypeMismatch {
                        expected: lhs.to_string(),
                        actual: rhs.to_string(),
                        span: expression.span,
                    })
                }
            }
            LessThan | GreaterThan => match (&lhs, &rhs) {
                (ResolvedType::Bits { .. }, _) if lhs == rhs => Ok(ResolvedType::Bool),
                _ => Err(invalid()),
            },
            ShiftLeft | ShiftRight => match (&lhs, &rhs) {
                // The shift amount may be any width
                (ResolvedType::Bits { .. }, ResolvedType::Bits { .. }) => Ok(lhs),
                _ => Err(invalid()),
            },
            Add | Subtract | Multiply | Divide | Modulo | BitAnd | BitOr | BitXor => {
                match (&lhs, &rhs) {
                    (ResolvedType::Bits { .. }, _) if lhs == rhs => Ok(lhs),
                    (ResolvedType::Bits { .. }, ResolvedType::Bits { .. }) => {
                        Err(CompileError::TypeMismatch {
                            expected: lhs.to_string(),
                            actual: rhs.to_string(),
                            span: expression.span,
                        })
                    }
                    _ => Err(invalid()),
                }
            }
        }
    }

    fn resolve_type(&self, ty: &Type) -> Result<ResolvedType, CompileError> {
        match &ty.kind {
            TypeKind::Bits { width } => {
                check_width(*width, ty.span)?;
                Ok(ResolvedType::Bits { width: *width })
            }
            TypeKind::Bool => Ok(ResolvedType::Bool),
            TypeKind::Named(name) => match self.target_of(name.id) {
                Some(Target::Declaration(declaration)) => match &declaration.kind {
                    DeclarationKind::Enum(_) => Ok(ResolvedType::Enum(declaration.name.symbol)),
                    DeclarationKind::Extern(_) => Ok(ResolvedType::Extern(declaration.name.symbol)),
                    other => Err(CompileError::TypeMismatch {
                        expected: "a type".to_string(),
                        actual: format!("{} `{}`", other.keyword(), name.symbol),
                        span: name.span,
                    }),
                },
                _ => Err(CompileError::UnresolvedReference {
                    name: name.symbol,
                    span: name.span,
                }),
            },
        }
    }
}
