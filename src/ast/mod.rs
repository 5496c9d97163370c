//! The syntax tree consumed by the semantic passes.
//!
//! A front end (lexer + parser) produces this tree; the crate itself never
//! builds one from text. Every node carries a [`NodeId`] so the passes can
//! publish side tables (resolved symbols, inferred types) without mutating
//! the tree in place. Nodes are exclusively owned top-down by their parent.

use crate::{
    index::{Index, simple_index},
    middle::ty::Type,
};

simple_index! {
    /// Identifies one AST node within a [`Program`]
    pub struct NodeId;
}

/// An ordered list of top level declarations
#[derive(Debug)]
pub struct Program {
    pub declarations: Vec<Declaration>,
}

/// A named binding: a global or local variable (optionally initialized) or a
/// function (optionally carrying a body).
#[derive(Debug)]
pub struct Declaration {
    pub id: NodeId,
    pub name: String,
    pub ty: Type,
    pub initializer: Option<Expression>,
    pub body: Option<Vec<Statement>>,
}

#[derive(Debug)]
pub struct Statement {
    pub id: NodeId,
    pub kind: StatementKind,
}

#[derive(Debug)]
pub enum StatementKind {
    Declaration(Declaration),
    Expression(Expression),
    If {
        condition: Expression,
        then_body: Vec<Statement>,
        else_body: Option<Vec<Statement>>,
    },
    While {
        condition: Expression,
        body: Vec<Statement>,
    },
    For {
        initializer: Option<Expression>,
        condition: Option<Expression>,
        update: Option<Expression>,
        body: Vec<Statement>,
    },
    Return(Option<Expression>),
    Block(Vec<Statement>),
}

#[derive(Debug)]
pub struct Expression {
    pub id: NodeId,
    pub kind: ExpressionKind,
}

#[derive(Debug)]
pub enum ExpressionKind {
    Name(String),
    IntegerLiteral(i64),
    CharacterLiteral(char),
    BooleanLiteral(bool),
    StringLiteral(String),
    Binary {
        operator: BinaryOperatorKind,
        lhs: Box<Expression>,
        rhs: Box<Expression>,
    },
    Assignment {
        lhs: Box<Expression>,
        rhs: Box<Expression>,
    },
    /// `a += b`, `a -= b`
    OperatorAssignment {
        operator: BinaryOperatorKind,
        lhs: Box<Expression>,
        rhs: Box<Expression>,
    },
    /// `a++`
    Increment(Box<Expression>),
    /// `a--`
    Decrement(Box<Expression>),
    Subscript {
        array: Box<Expression>,
        index: Box<Expression>,
    },
    FunctionCall {
        function: Box<Expression>,
        arguments: Vec<Expression>,
    },
    /// `{1, 2, 3}` — only legal as an array initializer
    InitializerList(Vec<Expression>),
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
    #[strum(serialize = "==")]
    Equals,
    #[strum(serialize = "!=")]
    NotEquals,
    #[strum(serialize = "<")]
    LessThan,
    #[strum(serialize = "<=")]
    LessThanOrEqualTo,
    #[strum(serialize = ">")]
    GreaterThan,
    #[strum(serialize = ">=")]
    GreaterThanOrEqualTo,
}

impl BinaryOperatorKind {
    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            Self::Add | Self::Subtract | Self::Multiply | Self::Divide
        )
    }

    pub fn is_comparison(self) -> bool {
        !self.is_arithmetic()
    }
}

/// Allocates node ids monotonically while building a tree. The parser is the
/// id authority in a full front end; tests and embedders use this directly.
#[derive(Debug, Default)]
pub struct Builder {
    next: usize,
}

impl Builder {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&mut self) -> NodeId {
        let id = NodeId::new(self.next);
        self.next += 1;
        id
    }

    pub fn program(declarations: Vec<Declaration>) -> Program {
        Program { declarations }
    }

    /* Declarations */

    pub fn variable(
        &mut self,
        name: impl Into<String>,
        ty: Type,
        initializer: Option<Expression>,
    ) -> Declaration {
        Declaration {
            id: self.next_id(),
            name: name.into(),
            ty,
            initializer,
            body: None,
        }
    }

    pub fn function(
        &mut self,
        name: impl Into<String>,
        ty: Type,
        body: Vec<Statement>,
    ) -> Declaration {
        Declaration {
            id: self.next_id(),
            name: name.into(),
            ty,
            initializer: None,
            body: Some(body),
        }
    }

    pub fn prototype(&mut self, name: impl Into<String>, ty: Type) -> Declaration {
        Declaration {
            id: self.next_id(),
            name: name.into(),
            ty,
            initializer: None,
            body: None,
        }
    }

    /* Statements */

    fn statement(&mut self, kind: StatementKind) -> Statement {
        Statement {
            id: self.next_id(),
            kind,
        }
    }

    pub fn declaration_statement(&mut self, declaration: Declaration) -> Statement {
        self.statement(StatementKind::Declaration(declaration))
    }

    pub fn expression_statement(&mut self, expression: Expression) -> Statement {
        self.statement(StatementKind::Expression(expression))
    }

    pub fn if_statement(
        &mut self,
        condition: Expression,
        then_body: Vec<Statement>,
        else_body: Option<Vec<Statement>>,
    ) -> Statement {
        self.statement(StatementKind::If {
            condition,
            then_body,
            else_body,
        })
    }

    pub fn while_statement(&mut self, condition: Expression, body: Vec<Statement>) -> Statement {
        self.statement(StatementKind::While { condition, body })
    }

    pub fn for_statement(
        &mut self,
        initializer: Option<Expression>,
        condition: Option<Expression>,
        update: Option<Expression>,
        body: Vec<Statement>,
    ) -> Statement {
        self.statement(StatementKind::For {
            initializer,
            condition,
            update,
            body,
        })
    }

    pub fn return_statement(&mut self, value: Option<Expression>) -> Statement {
        self.statement(StatementKind::Return(value))
    }

    pub fn block(&mut self, body: Vec<Statement>) -> Statement {
        self.statement(StatementKind::Block(body))
    }

    /* Expressions */

    fn expression(&mut self, kind: ExpressionKind) -> Expression {
        Expression {
            id: self.next_id(),
            kind,
        }
    }

    pub fn name(&mut self, name: impl Into<String>) -> Expression {
        self.expression(ExpressionKind::Name(name.into()))
    }

    pub fn integer(&mut self, value: i64) -> Expression {
        self.expression(ExpressionKind::IntegerLiteral(value))
    }

    pub fn character(&mut self, value: char) -> Expression {
        self.expression(ExpressionKind::CharacterLiteral(value))
    }

    pub fn boolean(&mut self, value: bool) -> Expression {
        self.expression(ExpressionKind::BooleanLiteral(value))
    }

    pub fn string(&mut self, value: impl Into<String>) -> Expression {
        self.expression(ExpressionKind::StringLiteral(value.into()))
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

    pub fn assign(&mut self, lhs: Expression, rhs: Expression) -> Expression {
        self.expression(ExpressionKind::Assignment {
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    pub fn operator_assign(
        &mut self,
        operator: BinaryOperatorKind,
        lhs: Expression,
        rhs: Expression,
    ) -> Expression {
        self.expression(ExpressionKind::OperatorAssignment {
            operator,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    pub fn increment(&mut self, operand: Expression) -> Expression {
        self.expression(ExpressionKind::Increment(Box::new(operand)))
    }

    pub fn decrement(&mut self, operand: Expression) -> Expression {
        self.expression(ExpressionKind::Decrement(Box::new(operand)))
    }

    pub fn subscript(&mut self, array: Expression, index: Expression) -> Expression {
        self.expression(ExpressionKind::Subscript {
            array: Box::new(array),
            index: Box::new(index),
        })
    }

    pub fn call(&mut self, function: Expression, arguments: Vec<Expression>) -> Expression {
        self.expression(ExpressionKind::FunctionCall {
            function: Box::new(function),
            arguments,
        })
    }

    pub fn initializer_list(&mut self, elements: Vec<Expression>) -> Expression {
        self.expression(ExpressionKind::InitializerList(elements))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_allocates_unique_ids() {
        let mut b = Builder::new();

        let x = b.name("x");
        let y = b.name("y");
        let sum = b.binary(BinaryOperatorKind::Add, x, y);

        let ExpressionKind::Binary { lhs, rhs, .. } = &sum.kind else {
            panic!("expected binary node");
        };

        assert_ne!(lhs.id, rhs.id);
        assert_ne!(lhs.id, sum.id);
        assert_ne!(rhs.id, sum.id);
    }

    #[test]
    fn operator_display_matches_source_syntax() {
        assert_eq!(BinaryOperatorKind::Add.to_string(), "+");
        assert_eq!(BinaryOperatorKind::NotEquals.to_string(), "!=");
        assert_eq!(BinaryOperatorKind::LessThanOrEqualTo.to_string(), "<=");
    }
}
