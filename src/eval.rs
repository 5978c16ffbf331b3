//! Evaluation of expressions over a valuation.
//!
//! The engine never simulates a network itself; evaluation is only needed to
//! fold constant declarations (array sizes, range bounds, instantiation
//! arguments) and to replay guards and updates in tests.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::expr::{AssignOp, BinaryOp, CompareOp, Expr, IncDecOp, LogicalOp, UnaryOp};

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Double(f64),
}

impl Value {
    pub fn as_bool(self) -> bool {
        match self {
            Value::Bool(b) => b,
            Value::Int(i) => i != 0,
            Value::Double(d) => d != 0.0,
        }
    }

    pub fn as_int(self) -> Result<i64, EvalError> {
        match self {
            Value::Bool(b) => Ok(b as i64),
            Value::Int(i) => Ok(i),
            Value::Double(d) => Err(EvalError::Type(format!("expected an integer, found {}", d))),
        }
    }

    pub fn as_f64(self) -> f64 {
        match self {
            Value::Bool(b) => b as i64 as f64,
            Value::Int(i) => i as f64,
            Value::Double(d) => d,
        }
    }

    fn is_double(self) -> bool {
        matches!(self, Value::Double(_))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Double(d) => write!(f, "{}", d),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Double(value)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    #[error("unbound identifier `{0}`")]
    Unbound(String),
    #[error("cannot evaluate `{0}`")]
    Unsupported(String),
    #[error("type error: {0}")]
    Type(String),
    #[error("division by zero")]
    DivisionByZero,
}

/// Read access to variable values.
///
/// Array elements are looked up under their rendered name, e.g. `a[2]`.
/// Member accesses such as `P.Done` are looked up verbatim.
pub trait Valuation {
    fn value(&self, name: &str) -> Option<Value>;
}

impl Valuation for BTreeMap<String, Value> {
    fn value(&self, name: &str) -> Option<Value> {
        self.get(name).copied()
    }
}

impl Valuation for HashMap<String, Value> {
    fn value(&self, name: &str) -> Option<Value> {
        self.get(name).copied()
    }
}

pub trait Eval {
    fn eval(&self, env: &dyn Valuation) -> Result<Value, EvalError>;
}

impl Eval for Value {
    fn eval(&self, _env: &dyn Valuation) -> Result<Value, EvalError> {
        Ok(*self)
    }
}

impl Eval for Expr {
    fn eval(&self, env: &dyn Valuation) -> Result<Value, EvalError> {
        match self {
            Expr::Literal(text) => parse_literal(text),
            Expr::Raw(text) => Err(EvalError::Unsupported(text.clone())),
            Expr::Ident(_) | Expr::Member(..) => {
                let key = storage_key(self, env)?;
                env.value(&key).ok_or(EvalError::Unbound(key))
            }
            Expr::Unary(UnaryOp::Not, e) => Ok(Value::Bool(!e.eval(env)?.as_bool())),
            Expr::Unary(UnaryOp::Neg, e) => match e.eval(env)? {
                Value::Double(d) => Ok(Value::Double(-d)),
                v => Ok(Value::Int(-v.as_int()?)),
            },
            Expr::Binary(op, l, r) => arithmetic(*op, l.eval(env)?, r.eval(env)?),
            Expr::Compare(op, l, r) => {
                let (l, r) = (l.eval(env)?, r.eval(env)?);
                let ord = if l.is_double() || r.is_double() {
                    l.as_f64().partial_cmp(&r.as_f64())
                } else {
                    Some(l.as_int()?.cmp(&r.as_int()?))
                };
                let ord = ord.ok_or_else(|| EvalError::Type("comparison with NaN".to_string()))?;
                Ok(Value::Bool(match op {
                    CompareOp::Lt => ord.is_lt(),
                    CompareOp::Le => ord.is_le(),
                    CompareOp::Eq => ord.is_eq(),
                    CompareOp::Ne => ord.is_ne(),
                    CompareOp::Ge => ord.is_ge(),
                    CompareOp::Gt => ord.is_gt(),
                }))
            }
            Expr::Logical(op, l, r) => {
                let l = l.eval(env)?.as_bool();
                let value = match op {
                    LogicalOp::And => l && r.eval(env)?.as_bool(),
                    LogicalOp::Or => l || r.eval(env)?.as_bool(),
                    LogicalOp::Imply => !l || r.eval(env)?.as_bool(),
                };
                Ok(Value::Bool(value))
            }
            Expr::Conditional(c, t, e) => {
                if c.eval(env)?.as_bool() {
                    t.eval(env)
                } else {
                    e.eval(env)
                }
            }
            Expr::Call(name, args) => {
                let args = args.iter().map(|a| a.eval(env)).collect::<Result<Vec<_>, _>>()?;
                call(name, &args).ok_or_else(|| EvalError::Unsupported(self.to_string()))
            }
            Expr::Assign(..) | Expr::IncDec(..) => Err(EvalError::Unsupported(self.to_string())),
        }
    }
}

/// Applies an update statement to `env`.
///
/// Supports plain and compound assignment and increment/decrement on
/// identifiers and array elements. The right-hand side is evaluated before
/// the store.
pub fn execute(update: &Expr, env: &mut BTreeMap<String, Value>) -> Result<(), EvalError> {
    match update {
        Expr::Assign(op, target, value) => {
            let key = storage_key(target, env)?;
            let rhs = value.eval(env)?;
            let new = match op {
                AssignOp::Assign => rhs,
                AssignOp::AddAssign => arithmetic(BinaryOp::Add, current(env, &key)?, rhs)?,
                AssignOp::SubAssign => arithmetic(BinaryOp::Sub, current(env, &key)?, rhs)?,
                AssignOp::MulAssign => arithmetic(BinaryOp::Mul, current(env, &key)?, rhs)?,
                AssignOp::DivAssign => arithmetic(BinaryOp::Div, current(env, &key)?, rhs)?,
            };
            env.insert(key, new);
            Ok(())
        }
        Expr::IncDec(op, target) => {
            let key = storage_key(target, env)?;
            let delta = match op {
                IncDecOp::PreInc | IncDecOp::PostInc => 1,
                IncDecOp::PreDec | IncDecOp::PostDec => -1,
            };
            let new = arithmetic(BinaryOp::Add, current(env, &key)?, Value::Int(delta))?;
            env.insert(key, new);
            Ok(())
        }
        other => other.eval(env).map(|_| ()),
    }
}

fn current(env: &BTreeMap<String, Value>, key: &str) -> Result<Value, EvalError> {
    env.get(key).copied().ok_or_else(|| EvalError::Unbound(key.to_string()))
}

/// The name under which `target` is stored: indices are evaluated, so
/// `a[i + 1]` with `i == 1` is stored as `a[2]`.
fn storage_key(target: &Expr, env: &dyn Valuation) -> Result<String, EvalError> {
    match target {
        Expr::Ident(ident) => {
            let mut key = ident.name.clone();
            for index in &ident.indices {
                key.push_str(&format!("[{}]", index.eval(env)?.as_int()?));
            }
            Ok(key)
        }
        Expr::Member(base, field) => Ok(format!("{}.{}", storage_key(base, env)?, field)),
        other => Err(EvalError::Unsupported(other.to_string())),
    }
}

fn parse_literal(text: &str) -> Result<Value, EvalError> {
    match text {
        "true" => Ok(Value::Bool(true)),
        "false" => Ok(Value::Bool(false)),
        _ => {
            if let Ok(i) = text.parse::<i64>() {
                Ok(Value::Int(i))
            } else if let Ok(d) = text.parse::<f64>() {
                Ok(Value::Double(d))
            } else {
                Err(EvalError::Unsupported(text.to_string()))
            }
        }
    }
}

fn arithmetic(op: BinaryOp, l: Value, r: Value) -> Result<Value, EvalError> {
    if l.is_double() || r.is_double() {
        let (a, b) = (l.as_f64(), r.as_f64());
        let value = match op {
            BinaryOp::Add => a + b,
            BinaryOp::Sub => a - b,
            BinaryOp::Mul => a * b,
            BinaryOp::Div => a / b,
            BinaryOp::Mod => a % b,
            _ => return Err(EvalError::Type(format!("bitwise `{}` on a double", op))),
        };
        return Ok(Value::Double(value));
    }
    let (a, b) = (l.as_int()?, r.as_int()?);
    let value = match op {
        BinaryOp::Add => a.wrapping_add(b),
        BinaryOp::Sub => a.wrapping_sub(b),
        BinaryOp::Mul => a.wrapping_mul(b),
        BinaryOp::Div => a.checked_div(b).ok_or(EvalError::DivisionByZero)?,
        BinaryOp::Mod => a.checked_rem(b).ok_or(EvalError::DivisionByZero)?,
        BinaryOp::BitAnd => a & b,
        BinaryOp::BitOr => a | b,
        BinaryOp::BitXor => a ^ b,
        BinaryOp::Shl => a.wrapping_shl(b as u32),
        BinaryOp::Shr => a.wrapping_shr(b as u32),
    };
    Ok(Value::Int(value))
}

fn call(name: &str, args: &[Value]) -> Option<Value> {
    let f = |i: usize| args.get(i).map(|v| v.as_f64());
    let value = match (name, args.len()) {
        ("abs", 1) => Value::Int(args[0].as_int().ok()?.abs()),
        ("fabs", 1) => Value::Double(f(0)?.abs()),
        ("sqrt", 1) => Value::Double(f(0)?.sqrt()),
        ("exp", 1) => Value::Double(f(0)?.exp()),
        ("ln", 1) => Value::Double(f(0)?.ln()),
        ("floor", 1) => Value::Double(f(0)?.floor()),
        ("ceil", 1) => Value::Double(f(0)?.ceil()),
        ("round", 1) => Value::Double(f(0)?.round()),
        ("pow", 2) => Value::Double(f(0)?.powf(f(1)?)),
        ("fmin", 2) => Value::Double(f(0)?.min(f(1)?)),
        ("fmax", 2) => Value::Double(f(0)?.max(f(1)?)),
        _ => return None,
    };
    Some(value)
}
