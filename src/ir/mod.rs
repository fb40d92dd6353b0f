//! The Creek program tree handed to the middle end by the front end.
//!
//! Every node carries a [`NodeId`] which is unique within its [`Program`].
//! The analysis maps (reference map, type map) are keyed by these ids, so
//! passes that clone subtrees must re-identify every cloned node through
//! [`Program::fresh_id`] before splicing the clone back into the tree.

use crate::{intern::Symbol, source::Span};

pub mod build;
pub mod print;
pub mod visit;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub u32);

/// The root of the program tree. Owned by whichever pipeline step is
/// currently executing; steps receive it by value and return it (possibly
/// rebuilt) when they finish.
#[derive(Debug, Clone)]
pub struct Program {
    pub declarations: Vec<Declaration>,
    next_node_id: u32,
}

impl Program {
    pub fn new(declarations: Vec<Declaration>, next_node_id: u32) -> Self {
        Self {
            declarations,
            next_node_id,
        }
    }

    /// Allocates a node id no existing node uses. Passes that synthesize or
    /// clone nodes must id them through this.
    pub fn fresh_id(&mut self) -> NodeId {
        let id = NodeId(self.next_node_id);
        self.next_node_id += 1;
        id
    }

    pub fn declaration(&self, id: NodeId) -> Option<&Declaration> {
        self.declarations.iter().find(|d| d.id == id)
    }

    pub fn declaration_mut(&mut self, id: NodeId) -> Option<&mut Declaration> {
        self.declarations.iter_mut().find(|d| d.id == id)
    }
}

#[derive(Debug, Clone)]
pub struct Declaration {
    pub id: NodeId,
    pub span: Span,
    pub name: Identifier,
    pub kind: DeclarationKind,
}

#[derive(Debug, Clone)]
pub enum DeclarationKind {
    Control(ControlDeclaration),
    Parser(ParserDeclaration),
    Action(ActionDeclaration),
    Enum(EnumDeclaration),
    Constant(ConstantDeclaration),
    Extern(ExternDeclaration),
    Instance(InstanceDeclaration),
}

impl DeclarationKind {
    pub fn keyword(&self) -> &'static str {
        match self {
            DeclarationKind::Control(_) => "control",
            DeclarationKind::Parser(_) => "parser",
            DeclarationKind::Action(_) => "action",
            DeclarationKind::Enum(_) => "enum",
            DeclarationKind::Constant(_) => "const",
            DeclarationKind::Extern(_) => "extern",
            DeclarationKind::Instance(_) => "instance",
        }
    }
}

/// A match/action control block: parameters, local declarations (actions,
/// constants, nested instances), and an apply body.
#[derive(Debug, Clone)]
pub struct ControlDeclaration {
    pub parameters: Vec<Parameter>,
    pub locals: Vec<Declaration>,
    pub body: Block,
}

#[derive(Debug, Clone)]
pub struct ParserDeclaration {
    pub parameters: Vec<Parameter>,
    pub states: Vec<ParserState>,
}

#[derive(Debug, Clone)]
pub struct ParserState {
    pub id: NodeId,
    pub span: Span,
    pub name: Identifier,
    pub body: Vec<Statement>,
    pub transition: Transition,
}

#[derive(Debug, Clone)]
pub enum Transition {
    Accept,
    Reject,
    Next(Identifier),
}

#[derive(Debug, Clone)]
pub struct ActionDeclaration {
    pub parameters: Vec<Parameter>,
    pub body: Block,
}

#[derive(Debug, Clone)]
pub struct EnumDeclaration {
    pub members: Vec<Identifier>,
}

#[derive(Debug, Clone)]
pub struct ConstantDeclaration {
    pub ty: Type,
    pub value: Expression,
}

#[derive(Debug, Clone)]
pub struct ExternDeclaration {
    pub methods: Vec<Identifier>,
}

/// Instantiation of a control, parser, or extern under a new name. The
/// instance named `main` is the program entry point; the evaluator walks
/// these to build the toplevel graph.
#[derive(Debug, Clone)]
pub struct InstanceDeclaration {
    pub target: Identifier,
    pub arguments: Vec<Expression>,
}

#[derive(Debug, Clone)]
pub struct Parameter {
    pub id: NodeId,
    pub span: Span,
    pub name: Identifier,
    pub ty: Type,
}

#[derive(Debug, Clone)]
pub struct Identifier {
    pub id: NodeId,
    pub span: Span,
    pub symbol: Symbol,
}

#[derive(Debug, Clone)]
pub struct Type {
    pub id: NodeId,
    pub span: Span,
    pub kind: TypeKind,
}

#[derive(Debug, Clone)]
pub enum TypeKind {
    /// Fixed-width unsigned integer, `bits<N>`
    Bits { width: u16 },
    Bool,
    /// Reference to an enum or extern declaration by name
    Named(Identifier),
}

#[derive(Debug, Clone)]
pub struct Block {
    pub id: NodeId,
    pub span: Span,
    pub statements: Vec<Statement>,
}

#[derive(Debug, Clone)]
pub struct Statement {
    pub id: NodeId,
    pub span: Span,
    pub kind: StatementKind,
}

#[derive(Debug, Clone)]
pub enum StatementKind {
    Assign {
        target: Expression,
        value: Expression,
    },
    /// Invocation of an action or of another control's apply body. These are
    /// the call sites the inlining protocol discovers.
    Call {
        callee: Identifier,
        arguments: Vec<Expression>,
    },
    If {
        condition: Expression,
        then_block: Block,
        else_block: Option<Block>,
    },
    Block(Block),
    Empty,
}

#[derive(Debug, Clone)]
pub struct Expression {
    pub id: NodeId,
    pub span: Span,
    pub kind: ExpressionKind,
}

#[derive(Debug, Clone)]
pub enum ExpressionKind {
    Name(Identifier),
    /// Enum member access, `Color.RED`
    Member {
        base: Identifier,
        member: Identifier,
    },
    IntLiteral {
        value: i64,
        width: Option<u16>,
    },
    BoolLiteral(bool),
    Unary {
        operator: UnaryOperatorKind,
        operand: Box<Expression>,
    },
    Binary {
        operator: BinaryOperatorKind,
        lhs: Box<Expression>,
        rhs: Box<Expression>,
    },
    /// Bit slice `base[high:low]`, both bounds inclusive
    Slice {
        base: Box<Expression>,
        high: u16,
        low: u16,
    },
    /// Width conversion, `(bits<N>) operand`
    Cast {
        width: u16,
        operand: Box<Expression>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperatorKind {
    Negate,
    Not,
    Complement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum BinaryOperatorKind {
    #[strum(serialize = "+")]
    Add,
    #[strum(serialize = "-")]
    Subtract,
    #[strum(serialize = "*")]
    Multiply,
    #[strum(serialize = "/")]
    Divide,
    #[strum(serialize = "%")]
    Modulo,
    #[strum(serialize = "&")]
    BitAnd,
    #[strum(serialize = "|")]
    BitOr,
    #[strum(serialize = "^")]
    BitXor,
    #[strum(serialize = "<<")]
    ShiftLeft,
    #[strum(serialize = ">>")]
    ShiftRight,
    #[strum(serialize = "==")]
    Equal,
    #[strum(serialize = "!=")]
    NotEqual,
    #[strum(serialize = "<")]
    LessThan,
    #[strum(serialize = ">")]
    GreaterThan,
    #[strum(serialize = "&&")]
    LogicalAnd,
    #[strum(serialize = "||")]
    LogicalOr,
}

impl BinaryOperatorKind {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            Self::Equal | Self::NotEqual | Self::LessThan | Self::GreaterThan
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(self, Self::LogicalAnd | Self::LogicalOr)
    }
}
