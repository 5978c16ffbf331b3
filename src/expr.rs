//! Expression and statement tree.
//!
//! Guards, invariants, updates, weights and initializers all share one small
//! expression language. Every [`Expr`] is owned by exactly one structural
//! parent (an edge, a location or a declaration); reusing a subtree somewhere
//! else always goes through [`Clone`], which is a deep copy.
//!
//! [`Display`][fmt::Display] renders UPPAAL concrete syntax with the minimal
//! number of parentheses, so that a transformed network can be handed to the
//! verification engine's compiler verbatim.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// An identifier reference, optionally indexed (`a[i][j]`) and optionally
/// used as a clock rate (`x'`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ident {
    pub name: String,
    #[serde(default)]
    pub indices: Vec<Expr>,
    /// `true` for the derivative `x'` used in clock-rate constraints.
    #[serde(default)]
    pub rate: bool,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    Lt,
    Le,
    Eq,
    Ne,
    Ge,
    Gt,
}

impl CompareOp {
    /// The operator accepting exactly the complement.
    pub fn negate(self) -> Self {
        match self {
            CompareOp::Lt => CompareOp::Ge,
            CompareOp::Le => CompareOp::Gt,
            CompareOp::Eq => CompareOp::Ne,
            CompareOp::Ne => CompareOp::Eq,
            CompareOp::Ge => CompareOp::Lt,
            CompareOp::Gt => CompareOp::Le,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogicalOp {
    And,
    Or,
    Imply,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignOp {
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IncDecOp {
    PreInc,
    PreDec,
    PostInc,
    PostDec,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Expr {
    /// Literal token: `true`, `false`, `42`, `1.5`.
    Literal(String),
    /// Opaque user-supplied text. Always parenthesized when nested.
    Raw(String),
    Ident(Ident),
    /// Member access, e.g. `P.Done` in queries or `s.field` on records.
    Member(Box<Expr>, String),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Compare(CompareOp, Box<Expr>, Box<Expr>),
    Logical(LogicalOp, Box<Expr>, Box<Expr>),
    Conditional(Box<Expr>, Box<Expr>, Box<Expr>),
    Assign(AssignOp, Box<Expr>, Box<Expr>),
    IncDec(IncDecOp, Box<Expr>),
    Call(String, Vec<Expr>),
}

impl Expr {
    pub fn literal(text: impl Into<String>) -> Self {
        Expr::Literal(text.into())
    }

    pub fn raw(text: impl Into<String>) -> Self {
        Expr::Raw(text.into())
    }

    pub fn tt() -> Self {
        Expr::literal("true")
    }

    pub fn ff() -> Self {
        Expr::literal("false")
    }

    pub fn int(value: i64) -> Self {
        Expr::Literal(value.to_string())
    }

    pub fn ident(name: impl Into<String>) -> Self {
        Expr::Ident(Ident {
            name: name.into(),
            indices: Vec::new(),
            rate: false,
        })
    }

    pub fn indexed(name: impl Into<String>, indices: Vec<Expr>) -> Self {
        Expr::Ident(Ident {
            name: name.into(),
            indices,
            rate: false,
        })
    }

    /// The clock-rate reference `name'`.
    pub fn rate(name: impl Into<String>) -> Self {
        Expr::Ident(Ident {
            name: name.into(),
            indices: Vec::new(),
            rate: true,
        })
    }

    pub fn member(base: Expr, field: impl Into<String>) -> Self {
        Expr::Member(Box::new(base), field.into())
    }

    /// Logical negation.
    ///
    /// Double negations cancel, boolean literals flip, and comparisons flip
    /// their operator instead of being wrapped. Comparisons on a clock rate
    /// are wrapped rather than flipped: the engine rejects negated rate
    /// constraints in flipped form.
    pub fn not(value: Self) -> Self {
        match value {
            Expr::Unary(UnaryOp::Not, inner) => *inner,
            Expr::Literal(ref text) if text == "true" => Expr::ff(),
            Expr::Literal(ref text) if text == "false" => Expr::tt(),
            Expr::Compare(op, lhs, rhs) if !lhs.is_clock_rate() && !rhs.is_clock_rate() => {
                Expr::Compare(op.negate(), lhs, rhs)
            }
            _ => Expr::Unary(UnaryOp::Not, Box::new(value)),
        }
    }

    pub fn neg(value: Self) -> Self {
        Expr::Unary(UnaryOp::Neg, Box::new(value))
    }

    pub fn binary(op: BinaryOp, lhs: Self, rhs: Self) -> Self {
        Expr::Binary(op, Box::new(lhs), Box::new(rhs))
    }

    pub fn compare(op: CompareOp, lhs: Self, rhs: Self) -> Self {
        Expr::Compare(op, Box::new(lhs), Box::new(rhs))
    }

    pub fn eq(lhs: Self, rhs: Self) -> Self {
        Expr::compare(CompareOp::Eq, lhs, rhs)
    }

    pub fn and(lhs: Self, rhs: Self) -> Self {
        Expr::Logical(LogicalOp::And, Box::new(lhs), Box::new(rhs))
    }

    pub fn or(lhs: Self, rhs: Self) -> Self {
        Expr::Logical(LogicalOp::Or, Box::new(lhs), Box::new(rhs))
    }

    pub fn imply(lhs: Self, rhs: Self) -> Self {
        Expr::Logical(LogicalOp::Imply, Box::new(lhs), Box::new(rhs))
    }

    pub fn conditional(cond: Self, then: Self, else_: Self) -> Self {
        Expr::Conditional(Box::new(cond), Box::new(then), Box::new(else_))
    }

    pub fn assign(target: Self, value: Self) -> Self {
        Expr::Assign(AssignOp::Assign, Box::new(target), Box::new(value))
    }

    pub fn post_inc(target: Self) -> Self {
        Expr::IncDec(IncDecOp::PostInc, Box::new(target))
    }

    pub fn post_dec(target: Self) -> Self {
        Expr::IncDec(IncDecOp::PostDec, Box::new(target))
    }

    pub fn call(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Call(name.into(), args)
    }

    /// Folds `exprs` left-to-right with `op`, or returns the literal `empty`
    /// when there is nothing to fold.
    ///
    /// ```
    /// use nsta_rs::expr::{Expr, LogicalOp};
    ///
    /// let none = Expr::chain(Vec::new(), LogicalOp::Or, "false");
    /// assert!(none.is_false());
    ///
    /// let two = Expr::chain(vec![Expr::ident("a"), Expr::ident("b")], LogicalOp::Or, "false");
    /// assert_eq!(two.to_string(), "a || b");
    /// ```
    pub fn chain(exprs: Vec<Expr>, op: LogicalOp, empty: &str) -> Self {
        let mut iter = exprs.into_iter();
        match iter.next() {
            None => Expr::literal(empty),
            Some(first) => iter.fold(first, |acc, e| Expr::Logical(op, Box::new(acc), Box::new(e))),
        }
    }

    /// Conjoins `extra` onto an optional existing guard.
    pub fn conjoin(existing: Option<Expr>, extra: Expr) -> Expr {
        match existing {
            None => extra,
            Some(guard) => Expr::and(guard, extra),
        }
    }
}

impl Expr {
    pub fn is_literal(&self, text: &str) -> bool {
        matches!(self, Expr::Literal(t) if t == text)
    }

    pub fn is_true(&self) -> bool {
        self.is_literal("true")
    }

    pub fn is_false(&self) -> bool {
        self.is_literal("false")
    }

    pub fn is_clock_rate(&self) -> bool {
        matches!(self, Expr::Ident(Ident { rate: true, .. }))
    }

    /// The name at the root of an identifier, index or member chain.
    pub fn base_name(&self) -> Option<&str> {
        match self {
            Expr::Ident(ident) => Some(&ident.name),
            Expr::Member(base, _) => base.base_name(),
            _ => None,
        }
    }

    /// Direct children, left to right.
    pub fn children(&self) -> Vec<&Expr> {
        match self {
            Expr::Literal(_) | Expr::Raw(_) => Vec::new(),
            Expr::Ident(ident) => ident.indices.iter().collect(),
            Expr::Member(base, _) => vec![base],
            Expr::Unary(_, e) | Expr::IncDec(_, e) => vec![e],
            Expr::Binary(_, l, r)
            | Expr::Compare(_, l, r)
            | Expr::Logical(_, l, r)
            | Expr::Assign(_, l, r) => vec![l, r],
            Expr::Conditional(c, t, e) => vec![c, t, e],
            Expr::Call(_, args) => args.iter().collect(),
        }
    }

    /// Pre-order traversal.
    pub fn walk<'a, F>(&'a self, f: &mut F)
    where
        F: FnMut(&'a Expr),
    {
        f(self);
        for child in self.children() {
            child.walk(f);
        }
    }

    /// Every identifier name referenced anywhere in the tree.
    pub fn identifiers(&self) -> BTreeSet<&str> {
        let mut names = BTreeSet::new();
        self.walk(&mut |e| {
            if let Expr::Ident(ident) = e {
                names.insert(ident.name.as_str());
            }
        });
        names
    }

    /// Whether any identifier in the tree is one of `names`.
    pub fn mentions(&self, names: &BTreeSet<String>) -> bool {
        let mut found = false;
        self.walk(&mut |e| {
            if let Expr::Ident(ident) = e {
                found |= names.contains(&ident.name);
            }
        });
        found
    }

    /// Names used with a clock-rate annotation.
    pub fn rate_identifiers(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        self.walk(&mut |e| {
            if let Expr::Ident(Ident { name, rate: true, .. }) = e {
                names.insert(name.clone());
            }
        });
        names
    }

    fn precedence(&self) -> u8 {
        match self {
            Expr::Raw(_) => 0,
            Expr::Assign(..) => 1,
            Expr::Conditional(..) => 2,
            Expr::Logical(LogicalOp::Imply, ..) => 3,
            Expr::Logical(LogicalOp::Or, ..) => 4,
            Expr::Logical(LogicalOp::And, ..) => 5,
            Expr::Binary(BinaryOp::BitOr, ..) => 6,
            Expr::Binary(BinaryOp::BitXor, ..) => 7,
            Expr::Binary(BinaryOp::BitAnd, ..) => 8,
            Expr::Compare(CompareOp::Eq | CompareOp::Ne, ..) => 9,
            Expr::Compare(..) => 10,
            Expr::Binary(BinaryOp::Shl | BinaryOp::Shr, ..) => 11,
            Expr::Binary(BinaryOp::Add | BinaryOp::Sub, ..) => 12,
            Expr::Binary(..) => 13,
            Expr::Unary(..) | Expr::IncDec(IncDecOp::PreInc | IncDecOp::PreDec, _) => 14,
            Expr::IncDec(..) | Expr::Call(..) | Expr::Member(..) => 15,
            Expr::Literal(_) | Expr::Ident(_) => 16,
        }
    }
}

fn write_child(f: &mut fmt::Formatter<'_>, child: &Expr, parenthesize: bool) -> fmt::Result {
    if parenthesize {
        write!(f, "({})", child)
    } else {
        write!(f, "{}", child)
    }
}

fn write_infix(f: &mut fmt::Formatter<'_>, parent: u8, op: &str, lhs: &Expr, rhs: &Expr) -> fmt::Result {
    write_child(f, lhs, lhs.precedence() < parent)?;
    write!(f, " {} ", op)?;
    write_child(f, rhs, rhs.precedence() <= parent)
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UnaryOp::Not => "!",
            UnaryOp::Neg => "-",
        })
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
        })
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Ge => ">=",
            CompareOp::Gt => ">",
        })
    }
}

impl fmt::Display for LogicalOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogicalOp::And => "&&",
            LogicalOp::Or => "||",
            LogicalOp::Imply => "imply",
        })
    }
}

impl fmt::Display for AssignOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AssignOp::Assign => "=",
            AssignOp::AddAssign => "+=",
            AssignOp::SubAssign => "-=",
            AssignOp::MulAssign => "*=",
            AssignOp::DivAssign => "/=",
        })
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        for index in &self.indices {
            write!(f, "[{}]", index)?;
        }
        if self.rate {
            write!(f, "'")?;
        }
        Ok(())
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let p = self.precedence();
        match self {
            Expr::Literal(text) | Expr::Raw(text) => write!(f, "{}", text),
            Expr::Ident(ident) => write!(f, "{}", ident),
            Expr::Member(base, field) => {
                write_child(f, base, base.precedence() < p)?;
                write!(f, ".{}", field)
            }
            Expr::Unary(op, e) => {
                write!(f, "{}", op)?;
                write_child(f, e, e.precedence() < p)
            }
            Expr::Binary(op, l, r) => write_infix(f, p, &op.to_string(), l, r),
            Expr::Compare(op, l, r) => write_infix(f, p, &op.to_string(), l, r),
            Expr::Logical(op, l, r) => write_infix(f, p, &op.to_string(), l, r),
            Expr::Assign(op, l, r) => {
                // right-associative
                write_child(f, l, l.precedence() <= p)?;
                write!(f, " {} ", op)?;
                write_child(f, r, r.precedence() < p)
            }
            Expr::Conditional(c, t, e) => {
                write_child(f, c, c.precedence() <= p)?;
                write!(f, " ? ")?;
                write_child(f, t, t.precedence() <= p)?;
                write!(f, " : ")?;
                write_child(f, e, e.precedence() < p)
            }
            Expr::IncDec(op, e) => match op {
                IncDecOp::PreInc | IncDecOp::PreDec => {
                    write!(f, "{}", if *op == IncDecOp::PreInc { "++" } else { "--" })?;
                    write_child(f, e, e.precedence() < p)
                }
                IncDecOp::PostInc | IncDecOp::PostDec => {
                    write_child(f, e, e.precedence() < p)?;
                    write!(f, "{}", if *op == IncDecOp::PostInc { "++" } else { "--" })
                }
            },
            Expr::Call(name, args) => {
                write!(f, "{}(", name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    fn x() -> Expr {
        Expr::ident("x")
    }

    #[test]
    fn test_display_minimal_parentheses() {
        let e = Expr::and(
            Expr::compare(CompareOp::Gt, x(), Expr::int(5)),
            Expr::or(Expr::ident("a"), Expr::ident("b")),
        );
        assert_eq!(e.to_string(), "x > 5 && (a || b)");
    }

    #[test]
    fn test_display_left_associative_chain() {
        let e = Expr::chain(
            vec![Expr::ident("a"), Expr::ident("b"), Expr::ident("c")],
            LogicalOp::Or,
            "false",
        );
        assert_eq!(e.to_string(), "a || b || c");

        let nested_right = Expr::binary(
            BinaryOp::Sub,
            Expr::ident("a"),
            Expr::binary(BinaryOp::Sub, Expr::ident("b"), Expr::ident("c")),
        );
        assert_eq!(nested_right.to_string(), "a - (b - c)");
    }

    #[test]
    fn test_display_updates() {
        assert_eq!(Expr::post_inc(Expr::ident("__cur_transition")).to_string(), "__cur_transition++");
        assert_eq!(Expr::assign(x(), Expr::int(0)).to_string(), "x = 0");
        let slot = Expr::indexed("_f", vec![Expr::int(3)]);
        assert_eq!(Expr::assign(slot, Expr::tt()).to_string(), "_f[3] = true");
    }

    #[test]
    fn test_display_raw_is_parenthesized() {
        let e = Expr::not(Expr::raw("a || b"));
        assert_eq!(e.to_string(), "!(a || b)");
        let e = Expr::and(Expr::raw("x != 0"), Expr::not(Expr::raw("false")));
        assert_eq!(e.to_string(), "(x != 0) && !(false)");
    }

    #[test]
    fn test_display_rate_and_member() {
        let e = Expr::eq(Expr::rate("x"), Expr::int(2));
        assert_eq!(e.to_string(), "x' == 2");
        let loc = Expr::member(Expr::ident("P"), "Done");
        assert_eq!(loc.to_string(), "P.Done");
    }

    #[test]
    fn test_not_flips_comparison() {
        let e = Expr::not(Expr::compare(CompareOp::Lt, x(), Expr::int(3)));
        assert_eq!(e.to_string(), "x >= 3");
        assert_eq!(Expr::not(Expr::not(Expr::ident("a"))), Expr::ident("a"));
        assert!(Expr::not(Expr::tt()).is_false());
    }

    #[test]
    fn test_not_keeps_rate_comparison_wrapped() {
        let e = Expr::not(Expr::eq(Expr::rate("x"), Expr::int(0)));
        assert_eq!(e.to_string(), "!(x' == 0)");
    }

    #[test]
    fn test_conjoin() {
        assert_eq!(Expr::conjoin(None, x()), x());
        let g = Expr::conjoin(Some(Expr::ident("g")), x());
        assert_eq!(g.to_string(), "g && x");
    }

    #[test]
    fn test_identifiers_and_mentions() {
        let e = Expr::and(
            Expr::compare(CompareOp::Le, Expr::ident("d"), Expr::int(1)),
            Expr::indexed("arr", vec![Expr::ident("i")]),
        );
        let names: Vec<_> = e.identifiers().into_iter().collect();
        assert_eq!(names, vec!["arr", "d", "i"]);

        let hidden: BTreeSet<String> = ["d".to_string()].into();
        assert!(e.mentions(&hidden));
        let other: BTreeSet<String> = ["q".to_string()].into();
        assert!(!e.mentions(&other));
    }

    #[test]
    fn test_rate_identifiers() {
        let e = Expr::and(
            Expr::eq(Expr::rate("y"), Expr::int(2)),
            Expr::compare(CompareOp::Le, x(), Expr::int(4)),
        );
        let rates = e.rate_identifiers();
        assert_eq!(rates.len(), 1);
        assert!(rates.contains("y"));
    }

    #[test]
    fn test_clone_is_deep() {
        let original = Expr::and(x(), Expr::ident("y"));
        let mut copy = original.clone();
        if let Expr::Logical(_, lhs, _) = &mut copy {
            **lhs = Expr::tt();
        }
        assert_eq!(original.to_string(), "x && y");
        assert_eq!(copy.to_string(), "true && y");
    }
}
