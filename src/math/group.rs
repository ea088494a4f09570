use std::fmt;
use std::mem;

use log::trace;

use crate::math::token::{Keyword, TokenKind};

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum BinaryOperator {
    /// `+`
    Add,
    /// `-`
    Subtract,
    /// `*`
    Multiply,
    /// `/`
    Divide,
    /// `mod`
    Mod,
    /// `and`
    And,
    /// `or`
    Or,
    /// `xor`
    Xor,
}

impl BinaryOperator {
    pub fn from_token(kind: &TokenKind) -> Option<Self> {
        Some(match kind {
            TokenKind::Add => BinaryOperator::Add,
            TokenKind::Subtract => BinaryOperator::Subtract,
            TokenKind::Multiply => BinaryOperator::Multiply,
            TokenKind::Divide => BinaryOperator::Divide,
            TokenKind::Keyword(Keyword::Mod) => BinaryOperator::Mod,
            TokenKind::Keyword(Keyword::And) => BinaryOperator::And,
            TokenKind::Keyword(Keyword::Or) => BinaryOperator::Or,
            TokenKind::Keyword(Keyword::Xor) => BinaryOperator::Xor,
            _ => return None,
        })
    }

    /// Binding strength, higher binds tighter
    pub fn precedence(&self) -> u8 {
        match self {
            BinaryOperator::And | BinaryOperator::Or | BinaryOperator::Xor => 1,
            BinaryOperator::Add | BinaryOperator::Subtract => 2,
            BinaryOperator::Mod => 3,
            BinaryOperator::Multiply | BinaryOperator::Divide => 4,
        }
    }

    pub fn op_str(&self) -> &str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Mod => "mod",
            BinaryOperator::And => "and",
            BinaryOperator::Or => "or",
            BinaryOperator::Xor => "xor",
        }
    }
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.op_str())
    }
}

/// Expression tree node
///
/// Every child is owned by exactly one parent. Dropping a node releases its whole subtree
/// children-first without recursing, so arbitrarily deep trees are safe to drop.
#[derive(Debug, PartialEq, Clone)]
pub enum Group {
    Number(f64),
    Negate(Box<Group>),
    /// (operator, left, right)
    BinaryOp(BinaryOperator, Box<Group>, Box<Group>),
    /// (function name, arguments)
    FunctionCall(String, Vec<Group>),
    /// Named variable from the context, evaluated on every reference
    Variable(String),
    /// Argument of the function call currently being evaluated
    Local(usize),
}

impl Group {
    pub fn negate(inner: Group) -> Self {
        Group::Negate(Box::new(inner))
    }

    pub fn binary(op: BinaryOperator, left: Group, right: Group) -> Self {
        Group::BinaryOp(op, Box::new(left), Box::new(right))
    }

    pub fn call(name: &str, arguments: Vec<Group>) -> Self {
        Group::FunctionCall(name.to_string(), arguments)
    }

    pub fn variable(name: &str) -> Self {
        Group::Variable(name.to_string())
    }

    pub fn is_leaf(&self) -> bool {
        match self {
            Group::Number(_) | Group::Variable(_) | Group::Local(_) => true,
            Group::FunctionCall(_, args) => args.is_empty(),
            Group::Negate(_) | Group::BinaryOp(..) => false,
        }
    }

    pub fn children(&self) -> Vec<&Group> {
        match self {
            Group::Negate(inner) => vec![&**inner],
            Group::BinaryOp(_, lhs, rhs) => vec![&**lhs, &**rhs],
            Group::FunctionCall(_, args) => args.iter().collect(),
            Group::Number(_) | Group::Variable(_) | Group::Local(_) => Vec::new(),
        }
    }

    pub fn node_count(&self) -> usize {
        let mut count = 0;
        let mut pending = vec![self];
        while let Some(node) = pending.pop() {
            count += 1;
            pending.extend(node.children());
        }

        count
    }

    /// Move every non-leaf child into `out`, leaving leaf placeholders behind
    fn detach_children(&mut self, out: &mut Vec<Group>) {
        let mut take = |child: &mut Group| {
            if !child.is_leaf() {
                out.push(mem::replace(child, Group::Number(0.0)));
            }
        };

        match self {
            Group::Negate(inner) => take(&mut **inner),
            Group::BinaryOp(_, lhs, rhs) => {
                take(&mut **lhs);
                take(&mut **rhs);
            }
            Group::FunctionCall(_, args) => args.iter_mut().for_each(take),
            Group::Number(_) | Group::Variable(_) | Group::Local(_) => (),
        }
    }
}

impl Drop for Group {
    fn drop(&mut self) {
        let mut pending = Vec::new();
        self.detach_children(&mut pending);

        // Each popped node only has leaf children left by the time it drops
        while let Some(mut node) = pending.pop() {
            node.detach_children(&mut pending);
        }
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Group::Number(n) => write!(f, "{}", n),
            Group::Negate(inner) => write!(f, "-{}", inner),
            Group::BinaryOp(op, lhs, rhs) => write!(f, "({} {} {})", lhs, op, rhs),
            Group::FunctionCall(name, args) => {
                write!(f, "{}(", name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
            Group::Variable(name) => write!(f, "{}", name),
            Group::Local(index) => write!(f, "${}", index),
        }
    }
}

/// Release a tree and all of its descendants
pub fn free_tree(tree: Group) {
    trace!("releasing tree of {} nodes", tree.node_count());
    drop(tree);
}

#[test]
fn test_display() {
    let data = vec![
        (Group::Number(3.5), "3.5"),
        (Group::negate(Group::Number(2.0)), "-2"),
        (
            Group::binary(
                BinaryOperator::Add,
                Group::Number(3.0),
                Group::binary(BinaryOperator::Multiply, Group::Number(7.0), Group::Number(5.0)),
            ),
            "(3 + (7 * 5))",
        ),
        (
            Group::binary(BinaryOperator::Xor, Group::Number(1.0), Group::Number(0.0)),
            "(1 xor 0)",
        ),
        (
            Group::call("pow", vec![Group::variable("x"), Group::Local(1)]),
            "pow(x, $1)",
        ),
    ];

    for (group, expected) in data {
        assert_eq!(group.to_string(), expected);
    }
}

#[test]
fn test_precedence_table() {
    let data = vec![
        (TokenKind::Keyword(Keyword::And), 1),
        (TokenKind::Keyword(Keyword::Or), 1),
        (TokenKind::Keyword(Keyword::Xor), 1),
        (TokenKind::Add, 2),
        (TokenKind::Subtract, 2),
        (TokenKind::Keyword(Keyword::Mod), 3),
        (TokenKind::Multiply, 4),
        (TokenKind::Divide, 4),
    ];

    for (kind, expected) in data {
        let op = BinaryOperator::from_token(&kind).expect("not an operator");
        assert_eq!(op.precedence(), expected);
    }

    assert_eq!(BinaryOperator::from_token(&TokenKind::Percent), None);
    assert_eq!(BinaryOperator::from_token(&TokenKind::Keyword(Keyword::Sin)), None);
}

#[test]
fn test_node_count() {
    let tree = Group::binary(
        BinaryOperator::Subtract,
        Group::negate(Group::Number(1.0)),
        Group::call("max", vec![Group::Number(2.0), Group::Number(3.0)]),
    );
    assert_eq!(tree.node_count(), 6);
    free_tree(tree);
}

#[test]
fn test_drop_deep_tree() {
    // Recursive drop of this chain would blow the test thread's stack
    let mut tree = Group::Number(1.0);
    for i in 0..200_000 {
        tree = if i % 2 == 0 {
            Group::negate(tree)
        } else {
            Group::binary(BinaryOperator::Add, tree, Group::Number(1.0))
        };
    }

    free_tree(tree);
}
