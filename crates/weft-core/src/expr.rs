//! Compilation of property-access expressions into dependency paths.
//!
//! Binding declarations arrive either as an explicit [`Expr`] tree (the
//! shape a macro or UI DSL would produce from `vm.User.Name`) or through the
//! fluent [`PathExpr`] builder. Linear member chains compile to an ordered
//! [`PropertyPath`]; anything else degrades to the conservative name set in
//! [`PathSet`], which may over-invalidate but never misses a dependency.

use crate::path::{PathSet, PropertyPath};

/// A property-access expression tree.
///
/// `Frame` stands for the closure capture frame: a captured view-model
/// reference appears as a member read off `Frame`, which is why the first
/// collected member of a multi-segment chain is dropped during compilation.
#[derive(Clone, Debug)]
pub enum Expr {
    /// The closure capture frame terminal.
    Frame,
    /// A constant terminal.
    Literal,
    Member {
        target: Box<Expr>,
        name: String,
    },
    Cast(Box<Expr>),
    Call {
        target: Box<Expr>,
        args: Vec<Expr>,
    },
    Conditional {
        condition: Box<Expr>,
        when_true: Box<Expr>,
        when_false: Box<Expr>,
    },
    Binary {
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Unary(Box<Expr>),
    Lambda(Box<Expr>),
}

impl Expr {
    /// A reference to a closure-captured variable, e.g. the `vm` in
    /// `vm.User.Name`.
    pub fn captured(name: impl Into<String>) -> Self {
        Expr::Frame.member(name)
    }

    pub fn member(self, name: impl Into<String>) -> Self {
        Expr::Member {
            target: Box::new(self),
            name: name.into(),
        }
    }

    pub fn cast(self) -> Self {
        Expr::Cast(Box::new(self))
    }

    pub fn call(self, args: Vec<Expr>) -> Self {
        Expr::Call {
            target: Box::new(self),
            args,
        }
    }

    pub fn conditional(condition: Expr, when_true: Expr, when_false: Expr) -> Self {
        Expr::Conditional {
            condition: Box::new(condition),
            when_true: Box::new(when_true),
            when_false: Box::new(when_false),
        }
    }

    pub fn binary(lhs: Expr, rhs: Expr) -> Self {
        Expr::Binary {
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn unary(self) -> Self {
        Expr::Unary(Box::new(self))
    }

    pub fn lambda(self) -> Self {
        Expr::Lambda(Box::new(self))
    }
}

/// The result of compiling a binding expression.
#[derive(Clone, Debug)]
pub enum CompiledPath {
    /// A single linear member chain, in traversal order.
    Chain(PropertyPath),
    /// Every member name referenced anywhere in a complex expression body,
    /// order-free.
    Names(PathSet),
}

impl CompiledPath {
    pub fn chain(&self) -> Option<&PropertyPath> {
        match self {
            CompiledPath::Chain(path) => Some(path),
            CompiledPath::Names(_) => None,
        }
    }

    pub fn names(&self) -> Option<&PathSet> {
        match self {
            CompiledPath::Names(set) => Some(set),
            CompiledPath::Chain(_) => None,
        }
    }

    /// Whether the expression referenced no members at all. Such a binding
    /// has no dependency and holds a constant value.
    pub fn is_constant(&self) -> bool {
        match self {
            CompiledPath::Chain(path) => path.is_empty(),
            CompiledPath::Names(set) => set.is_empty(),
        }
    }
}

/// Compile an expression into a dependency path. Never fails: degenerate
/// inputs yield an empty chain, complex bodies yield a name set.
pub fn compile(expr: &Expr) -> CompiledPath {
    if let Some(names) = linear_chain(expr) {
        return CompiledPath::Chain(PropertyPath::new(names));
    }
    let mut set = PathSet::new();
    collect_names(expr, &mut set);
    CompiledPath::Names(set)
}

/// Walk a candidate member chain tail-to-head, following through casts and
/// stopping at the capture frame or a literal. Returns `None` when the body
/// is not a single linear chain.
///
/// A chain of more than one member that bottoms out at the frame starts with
/// the captured variable itself, not a property of the bound data, so that
/// first member is dropped. Single-member chains denote a property read
/// directly off the root context and are preserved as-is.
fn linear_chain(expr: &Expr) -> Option<Vec<String>> {
    let mut names = Vec::new();
    let mut cursor = expr;
    loop {
        match cursor {
            Expr::Member { target, name } => {
                names.push(name.clone());
                cursor = target;
            }
            Expr::Cast(inner) => cursor = inner,
            Expr::Frame | Expr::Literal => break,
            _ => return None,
        }
    }
    names.reverse();
    if names.len() > 1 {
        names.remove(0);
    }
    Some(names)
}

fn collect_names(expr: &Expr, out: &mut PathSet) {
    match expr {
        Expr::Frame | Expr::Literal => {}
        Expr::Member { target, name } => {
            out.insert(name.clone());
            collect_names(target, out);
        }
        Expr::Cast(inner) | Expr::Unary(inner) | Expr::Lambda(inner) => collect_names(inner, out),
        Expr::Call { target, args } => {
            collect_names(target, out);
            for arg in args {
                collect_names(arg, out);
            }
        }
        Expr::Conditional {
            condition,
            when_true,
            when_false,
        } => {
            collect_names(condition, out);
            collect_names(when_true, out);
            collect_names(when_false, out);
        }
        Expr::Binary { lhs, rhs } => {
            collect_names(lhs, out);
            collect_names(rhs, out);
        }
    }
}

/// Fluent construction of a [`PropertyPath`] without expression
/// introspection.
///
/// ```
/// use weft_core::PathExpr;
///
/// let path = PathExpr::new().property("User").property("Name").finish();
/// assert_eq!(path.to_string(), "User.Name");
/// ```
#[derive(Default, Debug)]
pub struct PathExpr {
    segments: Vec<String>,
}

impl PathExpr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn property(mut self, name: impl Into<String>) -> Self {
        self.segments.push(name.into());
        self
    }

    pub fn finish(self) -> PropertyPath {
        PropertyPath::new(self.segments)
    }
}
