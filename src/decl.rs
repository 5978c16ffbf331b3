//! Declarations at global and template scope.
//!
//! Variables are grouped the way they are written (`int a, b = 2;` is one
//! [`VariableDecl`] with two [`Variable`]s), so that removing hidden
//! variables keeps the remaining declaration text intact.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::expr::Expr;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Qualifiers {
    #[serde(default)]
    pub constant: bool,
    /// Excluded from the statistical engine's state, still queryable.
    #[serde(default)]
    pub meta: bool,
    #[serde(default)]
    pub urgent: bool,
    #[serde(default)]
    pub broadcast: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BaseType {
    Int { range: Option<(Expr, Expr)> },
    Bool,
    Double,
    Clock,
    Chan,
    /// A typedef name.
    Named(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Type {
    #[serde(default)]
    pub qualifiers: Qualifiers,
    pub base: BaseType,
}

impl Type {
    pub fn new(base: BaseType) -> Self {
        Type {
            qualifiers: Qualifiers::default(),
            base,
        }
    }

    pub fn int() -> Self {
        Type::new(BaseType::Int { range: None })
    }

    pub fn bounded_int(lower: Expr, upper: Expr) -> Self {
        Type::new(BaseType::Int {
            range: Some((lower, upper)),
        })
    }

    pub fn bool() -> Self {
        Type::new(BaseType::Bool)
    }

    pub fn double() -> Self {
        Type::new(BaseType::Double)
    }

    pub fn clock() -> Self {
        Type::new(BaseType::Clock)
    }

    pub fn chan() -> Self {
        Type::new(BaseType::Chan)
    }

    pub fn constant(mut self) -> Self {
        self.qualifiers.constant = true;
        self
    }

    pub fn meta(mut self) -> Self {
        self.qualifiers.meta = true;
        self
    }

    pub fn urgent(mut self) -> Self {
        self.qualifiers.urgent = true;
        self
    }

    pub fn broadcast(mut self) -> Self {
        self.qualifiers.broadcast = true;
        self
    }

    pub fn is_clock(&self) -> bool {
        self.base == BaseType::Clock
    }

    pub fn is_double(&self) -> bool {
        self.base == BaseType::Double
    }

    pub fn is_chan(&self) -> bool {
        self.base == BaseType::Chan
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Initializer {
    Expr(Expr),
    List(Vec<Initializer>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    /// Array dimensions, outermost first.
    #[serde(default)]
    pub dims: Vec<Expr>,
    #[serde(default)]
    pub init: Option<Initializer>,
}

impl Variable {
    pub fn new(name: impl Into<String>) -> Self {
        Variable {
            name: name.into(),
            dims: Vec::new(),
            init: None,
        }
    }

    pub fn with_init(mut self, init: Expr) -> Self {
        self.init = Some(Initializer::Expr(init));
        self
    }

    pub fn with_dim(mut self, size: Expr) -> Self {
        self.dims.push(size);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableDecl {
    pub ty: Type,
    pub variables: Vec<Variable>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub ty: Type,
    #[serde(default)]
    pub by_ref: bool,
    pub name: String,
}

impl Parameter {
    pub fn new(ty: Type, name: impl Into<String>) -> Self {
        Parameter {
            ty,
            by_ref: false,
            name: name.into(),
        }
    }
}

/// A function declaration. The body is kept as opaque text, braces included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionDecl {
    pub return_type: String,
    pub name: String,
    #[serde(default)]
    pub params: Vec<Parameter>,
    pub body: String,
}

impl FunctionDecl {
    /// A body with nothing between its braces.
    pub fn is_stub(&self) -> bool {
        let body = self.body.trim();
        body.is_empty() || body.strip_prefix('{').and_then(|b| b.strip_suffix('}')).is_some_and(|b| b.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypedefDecl {
    pub ty: Type,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Declaration {
    Variable(VariableDecl),
    Function(FunctionDecl),
    Typedef(TypedefDecl),
}

/// An ordered declaration list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Declarations(pub Vec<Declaration>);

impl Declarations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Declaration> {
        self.0.iter()
    }

    pub fn push(&mut self, declaration: Declaration) {
        self.0.push(declaration);
    }

    /// Every declared variable together with its type.
    pub fn variables(&self) -> impl Iterator<Item = (&Type, &Variable)> {
        self.0.iter().flat_map(|d| match d {
            Declaration::Variable(v) => v.variables.iter().map(move |var| (&v.ty, var)).collect::<Vec<_>>(),
            _ => Vec::new(),
        })
    }

    pub fn find_variable(&self, name: &str) -> Option<(&Type, &Variable)> {
        self.variables().find(|(_, v)| v.name == name)
    }

    pub fn find_function(&self, name: &str) -> Option<&FunctionDecl> {
        self.0.iter().find_map(|d| match d {
            Declaration::Function(f) if f.name == name => Some(f),
            _ => None,
        })
    }

    pub fn find_typedef(&self, name: &str) -> Option<&TypedefDecl> {
        self.0.iter().find_map(|d| match d {
            Declaration::Typedef(t) if t.name == name => Some(t),
            _ => None,
        })
    }

    /// All names introduced by this list.
    pub fn names(&self) -> BTreeSet<&str> {
        let mut names = BTreeSet::new();
        for d in &self.0 {
            match d {
                Declaration::Variable(v) => names.extend(v.variables.iter().map(|v| v.name.as_str())),
                Declaration::Function(f) => {
                    names.insert(f.name.as_str());
                }
                Declaration::Typedef(t) => {
                    names.insert(t.name.as_str());
                }
            }
        }
        names
    }

    pub fn add_variable(&mut self, ty: Type, variable: Variable) {
        self.0.push(Declaration::Variable(VariableDecl {
            ty,
            variables: vec![variable],
        }));
    }

    pub fn add_channel(&mut self, name: impl Into<String>, urgent: bool, broadcast: bool) {
        let mut ty = Type::chan();
        ty.qualifiers.urgent = urgent;
        ty.qualifiers.broadcast = broadcast;
        self.add_variable(ty, Variable::new(name));
    }

    pub fn add_function(&mut self, function: FunctionDecl) {
        self.0.push(Declaration::Function(function));
    }

    /// Removes the named variables; a declaration left without variables is
    /// removed as well. Returns how many variables were removed.
    pub fn remove_variables(&mut self, names: &BTreeSet<String>) -> usize {
        let mut removed = 0;
        for d in &mut self.0 {
            if let Declaration::Variable(v) = d {
                let before = v.variables.len();
                v.variables.retain(|var| !names.contains(&var.name));
                removed += before - v.variables.len();
            }
        }
        self.0.retain(|d| !matches!(d, Declaration::Variable(v) if v.variables.is_empty()));
        removed
    }

    /// Removes function declarations matching `predicate`.
    pub fn remove_functions(&mut self, mut predicate: impl FnMut(&FunctionDecl) -> bool) -> usize {
        let before = self.0.len();
        self.0.retain(|d| !matches!(d, Declaration::Function(f) if predicate(f)));
        before - self.0.len()
    }

    /// Rewrites the initializer of the const variable `name`. Returns `false`
    /// if no such constant is declared here.
    pub fn set_constant(&mut self, name: &str, literal: &str) -> bool {
        for d in &mut self.0 {
            if let Declaration::Variable(v) = d {
                if !v.ty.qualifiers.constant {
                    continue;
                }
                if let Some(var) = v.variables.iter_mut().find(|var| var.name == name) {
                    var.init = Some(Initializer::Expr(Expr::literal(literal)));
                    return true;
                }
            }
        }
        false
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Declaration> {
        self.0.iter_mut()
    }
}

/// The global channel priority order, lowest level first.
///
/// `chan priority a, b < c;` is `[["a", "b"], ["c"]]`. The pseudo-channel
/// `default` stands for every channel not listed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelPriority {
    pub levels: Vec<Vec<String>>,
}

impl ChannelPriority {
    pub const DEFAULT: &'static str = "default";

    /// Priority order containing only the `default` level.
    pub fn with_default() -> Self {
        ChannelPriority {
            levels: vec![vec![Self::DEFAULT.to_string()]],
        }
    }

    /// Appends `channel` as a new level above all existing ones.
    pub fn push_highest(&mut self, channel: impl Into<String>) {
        self.levels.push(vec![channel.into()]);
    }

    pub fn highest(&self) -> Option<&[String]> {
        self.levels.last().map(|l| l.as_slice())
    }

    pub fn channels(&self) -> impl Iterator<Item = &str> {
        self.levels.iter().flatten().map(|s| s.as_str())
    }
}

impl fmt::Display for Qualifiers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.constant {
            write!(f, "const ")?;
        }
        if self.meta {
            write!(f, "meta ")?;
        }
        if self.urgent {
            write!(f, "urgent ")?;
        }
        if self.broadcast {
            write!(f, "broadcast ")?;
        }
        Ok(())
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.qualifiers)?;
        match &self.base {
            BaseType::Int { range: None } => write!(f, "int"),
            BaseType::Int { range: Some((lo, hi)) } => write!(f, "int[{},{}]", lo, hi),
            BaseType::Bool => write!(f, "bool"),
            BaseType::Double => write!(f, "double"),
            BaseType::Clock => write!(f, "clock"),
            BaseType::Chan => write!(f, "chan"),
            BaseType::Named(name) => write!(f, "{}", name),
        }
    }
}

impl fmt::Display for Initializer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Initializer::Expr(e) => write!(f, "{}", e),
            Initializer::List(items) => {
                write!(f, "{{")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        for dim in &self.dims {
            write!(f, "[{}]", dim)?;
        }
        if let Some(init) = &self.init {
            write!(f, " = {}", init)?;
        }
        Ok(())
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}{}", self.ty, if self.by_ref { "&" } else { "" }, self.name)
    }
}

impl fmt::Display for Declaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Declaration::Variable(v) => {
                write!(f, "{} ", v.ty)?;
                for (i, var) in v.variables.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", var)?;
                }
                write!(f, ";")
            }
            Declaration::Function(func) => {
                write!(f, "{} {}(", func.return_type, func.name)?;
                for (i, p) in func.params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", p)?;
                }
                write!(f, ")\n{}", func.body)
            }
            Declaration::Typedef(t) => write!(f, "typedef {} {};", t.ty, t.name),
        }
    }
}

impl fmt::Display for Declarations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for d in &self.0 {
            writeln!(f, "{}", d)?;
        }
        Ok(())
    }
}

impl fmt::Display for ChannelPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "chan priority ")?;
        for (i, level) in self.levels.iter().enumerate() {
            if i > 0 {
                write!(f, " < ")?;
            }
            write!(f, "{}", level.join(", "))?;
        }
        write!(f, ";")
    }
}
