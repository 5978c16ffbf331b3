use std::ops::{BitAnd, BitOr, Not, Rem};

use crate::expr::Expr;

impl BitAnd for Expr {
    type Output = Expr;

    fn bitand(self, rhs: Self) -> Self::Output {
        Expr::and(self, rhs)
    }
}

impl BitOr for Expr {
    type Output = Expr;

    fn bitor(self, rhs: Self) -> Self::Output {
        Expr::or(self, rhs)
    }
}

impl Not for Expr {
    type Output = Expr;

    fn not(self) -> Self::Output {
        Expr::not(self)
    }
}

/// `a % b` builds the equality `a == b`.
impl Rem for Expr {
    type Output = Expr;

    fn rem(self, rhs: Self) -> Self::Output {
        Expr::eq(self, rhs)
    }
}

impl From<bool> for Expr {
    fn from(value: bool) -> Self {
        if value {
            Expr::tt()
        } else {
            Expr::ff()
        }
    }
}

impl From<i64> for Expr {
    fn from(value: i64) -> Self {
        Expr::int(value)
    }
}

impl From<&str> for Expr {
    fn from(name: &str) -> Self {
        Expr::ident(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    #[test]
    fn test_and() {
        let e = Expr::ident("x") & Expr::ident("y");
        assert_eq!(e, Expr::and(Expr::ident("x"), Expr::ident("y")));
    }

    #[test]
    fn test_or() {
        let e = Expr::ident("x") | Expr::ident("y");
        assert_eq!(e.to_string(), "x || y");
    }

    #[test]
    fn test_not() {
        let e = !(Expr::ident("x") | Expr::ident("y"));
        assert_eq!(e.to_string(), "!(x || y)");
        assert_eq!(!!Expr::ident("x"), Expr::ident("x"));
    }

    #[test]
    fn test_eq() {
        let e = Expr::from("__cur_transition") % Expr::from(3);
        assert_eq!(e.to_string(), "__cur_transition == 3");
    }

    #[test]
    fn test_mixed_precedence() {
        let e = (Expr::from("a") | Expr::from("b")) & !Expr::from(false);
        assert_eq!(e.to_string(), "(a || b) && true");
    }
}
