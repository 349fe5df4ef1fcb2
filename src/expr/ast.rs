//! Expression AST and dependency extraction

use serde_json::Value;
use smallvec::SmallVec;

use crate::path::Path;

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    /// A static member chain rooted at the snapshot (`todos.0.name`)
    Path(Path),
    /// An arrow-function parameter
    Local(String),
    Member {
        object: Box<Expr>,
        property: String,
    },
    /// Computed access with a non-literal key (`a[b]`)
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Conditional {
        test: Box<Expr>,
        consequent: Box<Expr>,
        alternate: Box<Expr>,
    },
    Object(Vec<(String, Expr)>),
    Array(Vec<Expr>),
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Lambda {
        params: Vec<String>,
        body: Box<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
    And,
    Or,
}

/// Ordered set of dependency paths (insertion order, no duplicates)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeySet(SmallVec<[Path; 4]>);

impl KeySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a path, returns false if it was already present
    pub fn insert(&mut self, path: Path) -> bool {
        if self.0.contains(&path) {
            return false;
        }
        self.0.push(path);
        true
    }

    pub fn extend_from(&mut self, other: &KeySet) {
        for path in other.iter() {
            self.insert(path.clone());
        }
    }

    pub fn contains(&self, path: &str) -> bool {
        self.0.iter().any(|p| p.as_str() == path)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[Path] {
        &self.0
    }
}

impl<'a> IntoIterator for &'a KeySet {
    type Item = &'a Path;
    type IntoIter = std::slice::Iter<'a, Path>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl Expr {
    /// Walk the tree and record every data path it reads.
    ///
    /// Callees and arrow parameters are not data reads; object keys never
    /// reach the AST as expressions.
    pub fn collect_keys(&self, keys: &mut KeySet) {
        match self {
            Expr::Path(path) => {
                keys.insert(path.clone());
            }
            Expr::Literal(_) | Expr::Local(_) => {}
            Expr::Member { object, .. } => object.collect_keys(keys),
            Expr::Index { object, index } => {
                object.collect_keys(keys);
                index.collect_keys(keys);
            }
            Expr::Unary { operand, .. } => operand.collect_keys(keys),
            Expr::Binary { lhs, rhs, .. } => {
                lhs.collect_keys(keys);
                rhs.collect_keys(keys);
            }
            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => {
                test.collect_keys(keys);
                consequent.collect_keys(keys);
                alternate.collect_keys(keys);
            }
            Expr::Object(fields) => {
                for (_, value) in fields {
                    value.collect_keys(keys);
                }
            }
            Expr::Array(items) => {
                for item in items {
                    item.collect_keys(keys);
                }
            }
            Expr::Call { callee, args } => {
                if !matches!(callee.as_ref(), Expr::Path(_)) {
                    callee.collect_keys(keys);
                }
                for arg in args {
                    arg.collect_keys(keys);
                }
            }
            Expr::Lambda { body, .. } => body.collect_keys(keys),
        }
    }

    /// Whether evaluation is free of host calls and functions
    pub fn is_pure(&self) -> bool {
        match self {
            Expr::Call { .. } | Expr::Lambda { .. } => false,
            Expr::Literal(_) | Expr::Path(_) | Expr::Local(_) => true,
            Expr::Member { object, .. } => object.is_pure(),
            Expr::Index { object, index } => object.is_pure() && index.is_pure(),
            Expr::Unary { operand, .. } => operand.is_pure(),
            Expr::Binary { lhs, rhs, .. } => lhs.is_pure() && rhs.is_pure(),
            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => test.is_pure() && consequent.is_pure() && alternate.is_pure(),
            Expr::Object(fields) => fields.iter().all(|(_, v)| v.is_pure()),
            Expr::Array(items) => items.iter().all(Expr::is_pure),
        }
    }
}
