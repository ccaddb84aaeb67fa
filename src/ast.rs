use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Model(ModelBlock),
    Datasource(DatasourceBlock),
    /// `generator`, `enum`, `type`, `view` and friends; recognized but not parsed.
    Other { keyword: String, name: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelBlock {
    pub name: String,
    pub line: usize,
    /// Fields and block attributes in declaration order.
    pub members: Vec<Member>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Member {
    Field(FieldDecl),
    Attribute(Attribute),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    pub name: String,
    pub typ: TypeRef,
    pub attributes: Vec<Attribute>,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeRef {
    pub name: String,
    pub modifier: TypeModifier,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeModifier {
    Required, // T
    Optional, // T?
    List,     // T[]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeScope {
    Field, // @name
    Block, // @@name
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub scope: AttributeScope,
    /// Dotted path such as `relation` or `db.VarChar`.
    pub name: String,
    /// `None` when written without parentheses.
    pub args: Option<Vec<Arg>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Arg {
    pub name: Option<String>,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Ident(String),
    Str(String),
    Num(String),
    Array(Vec<Expr>),
    Call { name: String, args: Vec<Arg> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct DatasourceBlock {
    pub name: String,
    pub entries: Vec<(String, Expr)>,
}

impl Attribute {
    /// Positional argument at `index`, ignoring named ones.
    pub fn positional(&self, index: usize) -> Option<&Expr> {
        self.args
            .as_deref()?
            .iter()
            .filter(|a| a.name.is_none())
            .nth(index)
            .map(|a| &a.value)
    }

    pub fn named(&self, name: &str) -> Option<&Expr> {
        self.args
            .as_deref()?
            .iter()
            .find(|a| a.name.as_deref() == Some(name))
            .map(|a| &a.value)
    }
}

impl Expr {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Expr::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_ident(&self) -> Option<&str> {
        match self {
            Expr::Ident(s) => Some(s),
            _ => None,
        }
    }

    /// Identifiers of an array like `[a, b]`; a bare identifier counts as a
    /// one-element list.
    pub fn ident_list(&self) -> Vec<String> {
        match self {
            Expr::Array(items) => items
                .iter()
                .filter_map(|e| e.as_ident().map(str::to_string))
                .collect(),
            Expr::Ident(s) => vec![s.clone()],
            _ => Vec::new(),
        }
    }
}

impl DatasourceBlock {
    pub fn entry(&self, key: &str) -> Option<&Expr> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }
}

fn write_args(f: &mut fmt::Formatter<'_>, args: &[Arg]) -> fmt::Result {
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", arg)?;
    }
    Ok(())
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sigil = match self.scope {
            AttributeScope::Field => "@",
            AttributeScope::Block => "@@",
        };
        write!(f, "{}{}", sigil, self.name)?;
        if let Some(args) = &self.args {
            f.write_str("(")?;
            write_args(f, args)?;
            f.write_str(")")?;
        }
        Ok(())
    }
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = &self.name {
            write!(f, "{}: ", name)?;
        }
        write!(f, "{}", self.value)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Ident(s) | Expr::Num(s) => f.write_str(s),
            Expr::Str(s) => write!(f, "{:?}", s),
            Expr::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Expr::Call { name, args } => {
                write!(f, "{}(", name)?;
                write_args(f, args)?;
                f.write_str(")")
            }
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.modifier {
            TypeModifier::Required => f.write_str(&self.name),
            TypeModifier::Optional => write!(f, "{}?", self.name),
            TypeModifier::List => write!(f, "{}[]", self.name),
        }
    }
}
