//! Construction surface for the program tree.
//!
//! The front end (and the test suite) build trees through this: the builder
//! hands out monotonically increasing node ids and stamps every node with a
//! span into the source file it is currently building from.

use crate::{
    intern::Symbol,
    source::{SourceId, Span},
};

use super::{
    ActionDeclaration, BinaryOperatorKind, Block, ConstantDeclaration, ControlDeclaration,
    Declaration, DeclarationKind, EnumDeclaration, Expression, ExpressionKind, ExternDeclaration,
    Identifier, InstanceDeclaration, NodeId, Parameter, ParserDeclaration, ParserState, Program,
    Statement, StatementKind, Transition, Type, TypeKind, UnaryOperatorKind,
};

#[derive(Debug)]
pub struct TreeBuilder {
    next_node_id: u32,
    source: SourceId,
    cursor: usize,
}

impl TreeBuilder {
    pub fn new(source: SourceId) -> Self {
        Self {
            next_node_id: 0,
            source,
            cursor: 0,
        }
    }

    /// Switch which source file subsequently built nodes are attributed to
    pub fn in_source(&mut self, source: SourceId) -> &mut Self {
        self.source = source;
        self
    }

    fn id(&mut self) -> NodeId {
        let id = NodeId(self.next_node_id);
        self.next_node_id += 1;
        id
    }

    // Front ends carry real token spans; built trees get synthetic ones that
    // are still unique and ordered so diagnostics stay meaningful.
    fn span(&mut self) -> Span {
        let start = self.cursor;
        self.cursor += 1;
        Span::new(self.source, start, start + 1)
    }

    pub fn ident(&mut self, name: &str) -> Identifier {
        Identifier {
            id: self.id(),
            span: self.span(),
            symbol: Symbol::new(name),
        }
    }

    /* Types */

    pub fn bits(&mut self, width: u16) -> Type {
        Type {
            id: self.id(),
            span: self.span(),
            kind: TypeKind::Bits { width },
        }
    }

    pub fn bool_type(&mut self) -> Type {
        Type {
            id: self.id(),
            span: self.span(),
            kind: TypeKind::Bool,
        }
    }

    pub fn named_type(&mut self, name: &str) -> Type {
        let name = self.ident(name);
        Type {
            id: self.id(),
            span: name.span,
            kind: TypeKind::Named(name),
        }
    }

    /* Expressions */

    fn expression(&mut self, kind: ExpressionKind) -> Expression {
        Expression {
            id: self.id(),
            span: self.span(),
            kind,
        }
    }

    pub fn name(&mut self, name: &str) -> Expression {
        let identifier = self.ident(name);
        self.expression(ExpressionKind::Name(identifier))
    }

    pub fn member(&mut self, base: &str, member: &str) -> Expression {
        let base = self.ident(base);
        let member = self.ident(member);
        self.expression(ExpressionKind::Member { base, member })
    }

    pub fn int(&mut self, value: i64) -> Expression {
        self.expression(ExpressionKind::IntLiteral { value, width: None })
    }

    pub fn int_with_width(&mut self, value: i64, width: u16) -> Expression {
        self.expression(ExpressionKind::IntLiteral {
            value,
            width: Some(width),
        })
    }

    pub fn bool(&mut self, value: bool) -> Expression {
        self.expression(ExpressionKind::BoolLiteral(value))
    }

    pub fn unary(&mut self, operator: UnaryOperatorKind, operand: Expression) -> Expression {
        self.expression(ExpressionKind::Unary {
            operator,
            operand: Box::new(operand),
        })
    }

    pub fn binary(
        &mut self,
        operator: BinaryOperatorKind,
        lhs: Expression,
        rhs: Expression,
    ) -> Expression {
        self.expression(ExpressionKind::Binary {
            operator,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    pub fn slice(&mut self, base: Expression, high: u16, low: u16) -> Expression {
        self.expression(ExpressionKind::Slice {
            base: Box::new(base),
            high,
            low,
        })
    }

    pub fn cast(&mut self, width: u16, operand: Expression) -> Expression {
        self.expression(ExpressionKind::Cast {
            width,
            operand: Box::new(operand),
        })
    }

    /* Statements */

    fn statement(&mut self, kind: StatementKind) -> Statement {
        Statement {
            id: self.id(),
            span: self.span(),
            kind,
        }
    }

    pub fn assign(&mut self, target: Expression, value: Expression) -> Statement {
        self.statement(StatementKind::Assign { target, value })
    }

    pub fn call(&mut self, callee: &str, arguments: Vec<Expression>) -> Statement {
        let callee = self.ident(callee);
        self.statement(StatementKind::Call { callee, arguments })
    }

    pub fn if_else(
        &mut self,
        condition: Expression,
        then_block: Block,
        else_block: Option<Block>,
    ) -> Statement {
        self.statement(StatementKind::If {
            condition,
            then_block,
            else_block,
        })
    }

    pub fn nested(&mut self, block: Block) -> Statement {
        self.statement(StatementKind::Block(block))
    }

    pub fn empty(&mut self) -> Statement {
        self.statement(StatementKind::Empty)
    }

    pub fn block(&mut self, statements: Vec<Statement>) -> Block {
        Block {
            id: self.id(),
            span: self.span(),
            statements,
        }
    }

    /* Declarations */

    fn declaration(&mut self, name: &str, kind: DeclarationKind) -> Declaration {
        let name = self.ident(name);
        Declaration {
            id: self.id(),
            span: name.span,
            name,
            kind,
        }
    }

    pub fn parameter(&mut self, name: &str, ty: Type) -> Parameter {
        let name = self.ident(name);
        Parameter {
            id: self.id(),
            span: name.span,
            name,
            ty,
        }
    }

    pub fn control(
        &mut self,
        name: &str,
        parameters: Vec<Parameter>,
        locals: Vec<Declaration>,
        body: Block,
    ) -> Declaration {
        self.declaration(
            name,
            DeclarationKind::Control(ControlDeclaration {
                parameters,
                locals,
                body,
            }),
        )
    }

    pub fn parser(
        &mut self,
        name: &str,
        parameters: Vec<Parameter>,
        states: Vec<ParserState>,
    ) -> Declaration {
        self.declaration(
            name,
            DeclarationKind::Parser(ParserDeclaration { parameters, states }),
        )
    }

    pub fn state(
        &mut self,
        name: &str,
        body: Vec<Statement>,
        transition: Transition,
    ) -> ParserState {
        let name = self.ident(name);
        ParserState {
            id: self.id(),
            span: name.span,
            name,
            body,
            transition,
        }
    }

    pub fn transition_to(&mut self, next: &str) -> Transition {
        Transition::Next(self.ident(next))
    }

    pub fn action(
        &mut self,
        name: &str,
        parameters: Vec<Parameter>,
        body: Block,
    ) -> Declaration {
        self.declaration(
            name,
            DeclarationKind::Action(ActionDeclaration { parameters, body }),
        )
    }

    pub fn enumeration(&mut self, name: &str, members: &[&str]) -> Declaration {
        let members = members.iter().map(|m| self.ident(m)).collect();
        self.declaration(name, DeclarationKind::Enum(EnumDeclaration { members }))
    }

    pub fn constant(&mut self, name: &str, ty: Type, value: Expression) -> Declaration {
        self.declaration(
            name,
            DeclarationKind::Constant(ConstantDeclaration { ty, value }),
        )
    }

    pub fn extern_object(&mut self, name: &str, methods: &[&str]) -> Declaration {
        let methods = methods.iter().map(|m| self.ident(m)).collect();
        self.declaration(name, DeclarationKind::Extern(ExternDeclaration { methods }))
    }

    pub fn instance(&mut self, name: &str, target: &str, arguments: Vec<Expression>) -> Declaration {
        let target = self.ident(target);
        self.declaration(
            name,
            DeclarationKind::Instance(InstanceDeclaration { target, arguments }),
        )
    }

    pub fn finish(self, declarations: Vec<Declaration>) -> Program {
        Program::new(declarations, self.next_node_id)
    }
}
