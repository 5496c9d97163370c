//! Canonicalizing expression DAG.
//!
//! Expression trees are rebuilt as nodes in a [`DagPool`]: structurally
//! identical pure subexpressions intentionally alias the same node, so a
//! node may have multiple parents. Side-effecting kinds (assignment,
//! compound assignment, increment, decrement) are never merged across
//! occurrences — merging would skip a required repeated mutation.
//!
//! The pool exclusively owns every node created within its lifetime (one
//! pool per function) and releases them as a unit when dropped.

use crate::{
    ast::{BinaryOperatorKind, Expression, ExpressionKind},
    diagnostics::{DiagnosticKind, Diagnostics},
    index::{IndexVec, simple_index},
    middle::{resolve::Resolution, symbols::SymbolId},
};

simple_index! {
    /// Identifies one [`DagNode`] within a [`DagPool`]
    pub struct DagNodeId;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DagKind {
    Name,
    IntegerLiteral,
    CharacterLiteral,
    BooleanLiteral,
    StringLiteral,
    Add,
    Subtract,
    Multiply,
    Divide,
    Equals,
    NotEquals,
    LessThan,
    LessThanOrEqualTo,
    GreaterThan,
    GreaterThanOrEqualTo,
    Assign,
    AddAssign,
    SubtractAssign,
    Increment,
    Decrement,
    /// lhs = array value (a Name), rhs = index value
    Subscript,
    /// lhs = head of the Argument chain, payload = callee name
    Call,
    /// lhs = argument value, rhs = next Argument in the chain
    Argument,
}

impl DagKind {
    /// Side-effecting kinds are allocated fresh on every occurrence, even
    /// when structurally identical to an existing node
    pub fn has_side_effects(self) -> bool {
        matches!(
            self,
            Self::Assign
                | Self::AddAssign
                | Self::SubtractAssign
                | Self::Increment
                | Self::Decrement
        )
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            Self::Equals
                | Self::NotEquals
                | Self::LessThan
                | Self::LessThanOrEqualTo
                | Self::GreaterThan
                | Self::GreaterThanOrEqualTo
        )
    }

    fn from_operator(operator: BinaryOperatorKind) -> Self {
        match operator {
            BinaryOperatorKind::Add => Self::Add,
            BinaryOperatorKind::Subtract => Self::Subtract,
            BinaryOperatorKind::Multiply => Self::Multiply,
            BinaryOperatorKind::Divide => Self::Divide,
            BinaryOperatorKind::Equals => Self::Equals,
            BinaryOperatorKind::NotEquals => Self::NotEquals,
            BinaryOperatorKind::LessThan => Self::LessThan,
            BinaryOperatorKind::LessThanOrEqualTo => Self::LessThanOrEqualTo,
            BinaryOperatorKind::GreaterThan => Self::GreaterThan,
            BinaryOperatorKind::GreaterThanOrEqualTo => Self::GreaterThanOrEqualTo,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DagPayload {
    None,
    /// A resolved name reference. Equality includes the resolved symbol, so
    /// two scopes' distinct `x`s never alias within one pool.
    Name {
        symbol: Option<SymbolId>,
        text: String,
    },
    Integer(i64),
    Character(char),
    Boolean(bool),
    /// String literal contents
    Text(String),
}

#[derive(Debug, Clone)]
pub struct DagNode {
    pub kind: DagKind,
    pub lhs: Option<DagNodeId>,
    pub rhs: Option<DagNodeId>,
    pub payload: DagPayload,
}

#[derive(Debug, Default)]
pub struct DagPool {
    nodes: IndexVec<DagNodeId, DagNode>,
}

impl DagPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: DagNodeId) -> &DagNode {
        &self.nodes[id]
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DagNode> {
        self.nodes.iter()
    }

    /// Returns an existing node with equal kind, pointer-identical children
    /// and equal payload (introducing a new parent edge), or allocates one.
    ///
    /// The lookup is a deliberate linear scan: per-function expression
    /// counts are small, and the scan is the semantic baseline a hash index
    /// would have to reproduce exactly.
    pub fn find_or_create(
        &mut self,
        kind: DagKind,
        lhs: Option<DagNodeId>,
        rhs: Option<DagNodeId>,
        payload: DagPayload,
    ) -> DagNodeId {
        if !kind.has_side_effects() {
            for (id, node) in self.nodes.enumerate() {
                if node.kind == kind
                    && node.lhs == lhs
                    && node.rhs == rhs
                    && node.payload == payload
                {
                    return id;
                }
            }
        }

        self.nodes.push(DagNode {
            kind,
            lhs,
            rhs,
            payload,
        })
    }

    /// The literal value of an integer-literal node, or `None` for any
    /// other kind
    pub fn integer_literal_value(&self, id: DagNodeId) -> Option<i64> {
        let node = &self.nodes[id];

        match (node.kind, &node.payload) {
            (DagKind::IntegerLiteral, DagPayload::Integer(value)) => Some(*value),
            _ => None,
        }
    }
}

/// Canonicalizes one expression tree into the pool, folding constants as it
/// goes. Returns `None` when the expression contains a literal division by
/// zero — the diagnostic is reported here and the enclosing expression's
/// code generation must be skipped.
pub fn build_expression(
    pool: &mut DagPool,
    resolution: &Resolution,
    expression: &Expression,
    diagnostics: &mut Diagnostics,
) -> Option<DagNodeId> {
    match &expression.kind {
        ExpressionKind::Name(name) => Some(pool.find_or_create(
            DagKind::Name,
            None,
            None,
            DagPayload::Name {
                symbol: resolution.uses.get(&expression.id).copied(),
                text: name.clone(),
            },
        )),
        ExpressionKind::IntegerLiteral(value) => Some(pool.find_or_create(
            DagKind::IntegerLiteral,
            None,
            None,
            DagPayload::Integer(*value),
        )),
        ExpressionKind::CharacterLiteral(value) => Some(pool.find_or_create(
            DagKind::CharacterLiteral,
            None,
            None,
            DagPayload::Character(*value),
        )),
        ExpressionKind::BooleanLiteral(value) => Some(pool.find_or_create(
            DagKind::BooleanLiteral,
            None,
            None,
            DagPayload::Boolean(*value),
        )),
        ExpressionKind::StringLiteral(value) => Some(pool.find_or_create(
            DagKind::StringLiteral,
            None,
            None,
            DagPayload::Text(value.clone()),
        )),
        ExpressionKind::Binary { operator, lhs, rhs } => {
            let left = build_expression(pool, resolution, lhs, diagnostics)?;
            let right = build_expression(pool, resolution, rhs, diagnostics)?;

            if operator.is_arithmetic()
                && let (Some(a), Some(b)) = (
                    pool.integer_literal_value(left),
                    pool.integer_literal_value(right),
                )
            {
                if *operator == BinaryOperatorKind::Divide && b == 0 {
                    diagnostics.report(
                        DiagnosticKind::ConstantDivideByZero,
                        format!("`{a} / 0` divides by a constant zero"),
                    );
                    return None;
                }

                let folded = match operator {
                    BinaryOperatorKind::Add => a.wrapping_add(b),
                    BinaryOperatorKind::Subtract => a.wrapping_sub(b),
                    BinaryOperatorKind::Multiply => a.wrapping_mul(b),
                    BinaryOperatorKind::Divide => a.wrapping_div(b),
                    _ => unreachable!("arithmetic operators are the only folded kinds"),
                };

                return Some(pool.find_or_create(
                    DagKind::IntegerLiteral,
                    None,
                    None,
                    DagPayload::Integer(folded),
                ));
            }

            Some(pool.find_or_create(
                DagKind::from_operator(*operator),
                Some(left),
                Some(right),
                DagPayload::None,
            ))
        }
        ExpressionKind::Assignment { lhs, rhs } => {
            // Right-hand side first: it is evaluated first during codegen
            let value = build_expression(pool, resolution, rhs, diagnostics)?;
            let target = build_expression(pool, resolution, lhs, diagnostics)?;

            Some(pool.find_or_create(DagKind::Assign, Some(target), Some(value), DagPayload::None))
        }
        ExpressionKind::OperatorAssignment { operator, lhs, rhs } => {
            let kind = match operator {
                BinaryOperatorKind::Add => DagKind::AddAssign,
                BinaryOperatorKind::Subtract => DagKind::SubtractAssign,
                // The checker rejects every other compound operator
                _ => return None,
            };

            let value = build_expression(pool, resolution, rhs, diagnostics)?;
            let target = build_expression(pool, resolution, lhs, diagnostics)?;

            Some(pool.find_or_create(kind, Some(target), Some(value), DagPayload::None))
        }
        ExpressionKind::Increment(operand) => {
            let target = build_expression(pool, resolution, operand, diagnostics)?;
            Some(pool.find_or_create(DagKind::Increment, Some(target), None, DagPayload::None))
        }
        ExpressionKind::Decrement(operand) => {
            let target = build_expression(pool, resolution, operand, diagnostics)?;
            Some(pool.find_or_create(DagKind::Decrement, Some(target), None, DagPayload::None))
        }
        ExpressionKind::Subscript { array, index } => {
            let base = build_expression(pool, resolution, array, diagnostics)?;
            let position = build_expression(pool, resolution, index, diagnostics)?;

            Some(pool.find_or_create(
                DagKind::Subscript,
                Some(base),
                Some(position),
                DagPayload::None,
            ))
        }
        ExpressionKind::FunctionCall {
            function,
            arguments,
        } => {
            // Direct calls only; the checker has already rejected every
            // non-name callee
            let ExpressionKind::Name(name) = &function.kind else {
                return None;
            };

            // Chain right to left so the head of the chain is argument 0
            let mut chain = None;
            for argument in arguments.iter().rev() {
                let value = build_expression(pool, resolution, argument, diagnostics)?;
                chain = Some(pool.find_or_create(
                    DagKind::Argument,
                    Some(value),
                    chain,
                    DagPayload::None,
                ));
            }

            Some(pool.find_or_create(
                DagKind::Call,
                chain,
                None,
                DagPayload::Name {
                    symbol: resolution.uses.get(&function.id).copied(),
                    text: name.clone(),
                },
            ))
        }
        // Initializer lists are lowered element-wise at the declaration,
        // never as one expression node
        ExpressionKind::InitializerList(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ast::Builder, middle::resolve::Resolver};

    fn empty_resolution() -> Resolution {
        Resolver::resolve_program(&Builder::program(vec![]))
    }

    fn build(pool: &mut DagPool, expression: &Expression) -> Option<DagNodeId> {
        let resolution = empty_resolution();
        let mut diagnostics = Diagnostics::new();
        let root = build_expression(pool, &resolution, expression, &mut diagnostics);
        assert!(diagnostics.is_empty());
        root
    }

    #[test]
    fn canonicalization_is_idempotent() {
        let mut b = Builder::new();
        let mut pool = DagPool::new();

        let first = {
            let a = b.name("a");
            let c = b.name("c");
            b.binary(BinaryOperatorKind::Add, a, c)
        };
        let second = {
            let a = b.name("a");
            let c = b.name("c");
            b.binary(BinaryOperatorKind::Add, a, c)
        };

        let x = build(&mut pool, &first).unwrap();
        let size_after_first = pool.len();
        let y = build(&mut pool, &second).unwrap();

        assert_eq!(x, y);
        assert_eq!(pool.len(), size_after_first);
    }

    #[test]
    fn canonicalization_is_not_commutative() {
        let mut b = Builder::new();
        let mut pool = DagPool::new();

        let forward = {
            let a = b.name("a");
            let c = b.name("c");
            b.binary(BinaryOperatorKind::Add, a, c)
        };
        let reversed = {
            let c = b.name("c");
            let a = b.name("a");
            b.binary(BinaryOperatorKind::Add, c, a)
        };

        let x = build(&mut pool, &forward).unwrap();
        let y = build(&mut pool, &reversed).unwrap();

        assert_ne!(x, y);
    }

    #[test]
    fn shared_subexpressions_alias_one_node() {
        let mut b = Builder::new();
        let mut pool = DagPool::new();

        // (a + c) * (a + c)
        let product = {
            let lhs = {
                let a = b.name("a");
                let c = b.name("c");
                b.binary(BinaryOperatorKind::Add, a, c)
            };
            let rhs = {
                let a = b.name("a");
                let c = b.name("c");
                b.binary(BinaryOperatorKind::Add, a, c)
            };
            b.binary(BinaryOperatorKind::Multiply, lhs, rhs)
        };

        let root = build(&mut pool, &product).unwrap();
        let node = pool.get(root);

        assert_eq!(node.kind, DagKind::Multiply);
        assert_eq!(node.lhs, node.rhs);
    }

    #[test]
    fn constant_folding_collapses_to_a_single_literal() {
        let mut b = Builder::new();
        let mut pool = DagPool::new();

        // 2 + 3 * 4
        let expression = {
            let two = b.integer(2);
            let three = b.integer(3);
            let four = b.integer(4);
            let product = b.binary(BinaryOperatorKind::Multiply, three, four);
            b.binary(BinaryOperatorKind::Add, two, product)
        };

        let root = build(&mut pool, &expression).unwrap();

        assert_eq!(pool.integer_literal_value(root), Some(14));
        // No operator nodes remain, only literals
        assert!(pool.iter().all(|node| node.kind == DagKind::IntegerLiteral));
    }

    #[test]
    fn division_by_constant_zero_is_rejected_at_build_time() {
        let mut b = Builder::new();
        let mut pool = DagPool::new();
        let resolution = empty_resolution();
        let mut diagnostics = Diagnostics::new();

        let expression = {
            let ten = b.integer(10);
            let zero = b.integer(0);
            b.binary(BinaryOperatorKind::Divide, ten, zero)
        };

        let root = build_expression(&mut pool, &resolution, &expression, &mut diagnostics);

        assert_eq!(root, None);
        assert_eq!(
            diagnostics.count_of(DiagnosticKind::ConstantDivideByZero),
            1
        );
        // No division node was produced, only the literal operands
        assert!(pool.iter().all(|node| node.kind == DagKind::IntegerLiteral));
    }

    #[test]
    fn division_by_a_folded_zero_is_also_rejected() {
        let mut b = Builder::new();
        let mut pool = DagPool::new();
        let resolution = empty_resolution();
        let mut diagnostics = Diagnostics::new();

        // 7 / (2 - 2)
        let expression = {
            let seven = b.integer(7);
            let two_a = b.integer(2);
            let two_b = b.integer(2);
            let difference = b.binary(BinaryOperatorKind::Subtract, two_a, two_b);
            b.binary(BinaryOperatorKind::Divide, seven, difference)
        };

        let root = build_expression(&mut pool, &resolution, &expression, &mut diagnostics);

        assert_eq!(root, None);
        assert_eq!(
            diagnostics.count_of(DiagnosticKind::ConstantDivideByZero),
            1
        );
    }

    #[test]
    fn side_effecting_nodes_are_never_merged() {
        let mut b = Builder::new();
        let mut pool = DagPool::new();

        let first = {
            let x = b.name("x");
            let five = b.integer(5);
            b.assign(x, five)
        };
        let second = {
            let x = b.name("x");
            let five = b.integer(5);
            b.assign(x, five)
        };

        let a = build(&mut pool, &first).unwrap();
        let c = build(&mut pool, &second).unwrap();

        // Structurally identical, but two distinct mutations
        assert_ne!(a, c);

        // Their pure operands still alias
        assert_eq!(pool.get(a).lhs, pool.get(c).lhs);
        assert_eq!(pool.get(a).rhs, pool.get(c).rhs);
    }

    #[test]
    fn increments_are_never_merged() {
        let mut b = Builder::new();
        let mut pool = DagPool::new();

        let first = {
            let x = b.name("x");
            b.increment(x)
        };
        let second = {
            let x = b.name("x");
            b.increment(x)
        };

        let a = build(&mut pool, &first).unwrap();
        let c = build(&mut pool, &second).unwrap();

        assert_ne!(a, c);
    }

    #[test]
    fn comparisons_are_not_folded() {
        let mut b = Builder::new();
        let mut pool = DagPool::new();

        let expression = {
            let one = b.integer(1);
            let two = b.integer(2);
            b.binary(BinaryOperatorKind::LessThan, one, two)
        };

        let root = build(&mut pool, &expression).unwrap();
        assert_eq!(pool.get(root).kind, DagKind::LessThan);
    }

    #[test]
    fn call_arguments_chain_in_order() {
        let mut b = Builder::new();
        let mut pool = DagPool::new();

        let call = {
            let callee = b.name("f");
            let one = b.integer(1);
            let two = b.integer(2);
            b.call(callee, vec![one, two])
        };

        let root = build(&mut pool, &call).unwrap();
        let call_node = pool.get(root);
        assert_eq!(call_node.kind, DagKind::Call);

        let head = pool.get(call_node.lhs.unwrap());
        assert_eq!(head.kind, DagKind::Argument);
        assert_eq!(pool.integer_literal_value(head.lhs.unwrap()), Some(1));

        let next = pool.get(head.rhs.unwrap());
        assert_eq!(pool.integer_literal_value(next.lhs.unwrap()), Some(2));
        assert_eq!(next.rhs, None);
    }
}
