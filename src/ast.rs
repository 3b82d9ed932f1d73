use std::fmt::Display;

use indexmap::IndexMap;
use serde::Serialize;
use strum_macros::EnumDiscriminants;

/// Generic tagged syntax tree produced by a [`crate::parser::SqlParser`].
///
/// Children are kept in insertion order. The default parser inserts them in the
/// order they appear in the source text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyntaxNode {
    pub kind: NodeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Scalar>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub children: IndexMap<String, Child>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Child {
    Node(Box<SyntaxNode>),
    Nodes(Vec<SyntaxNode>),
    Scalar(Scalar),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Scalar {
    String(String),
    Number(serde_json::Number),
    Bool(bool),
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::String(value.to_owned())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::String(value)
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Bool(value)
    }
}

impl Display for Scalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scalar::String(s) => write!(f, "{}", s),
            Scalar::Number(n) => write!(f, "{}", n),
            Scalar::Bool(b) => write!(f, "{}", b),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum_macros::Display)]
pub enum NodeKind {
    Statements,

    // Statements
    Insert,
    Row,
    CreateTable,
    CreateView,
    Drop,

    // Queries
    Query,
    With,
    Cte,
    SetOperation,
    Select,
    SelectItem,
    OrderByItem,

    // From items
    TableFactor,
    Subquery,
    Join,
    TableFunction,

    // Expressions
    Identifier,
    Star,
    QualifiedStar,
    Literal,
    TypedLiteral,
    Interval,
    Null,
    Binary,
    Unary,
    Grouping,
    IsNull,
    InList,
    InSubquery,
    Between,
    Like,
    Exists,
    ScalarSubquery,
    FunctionCall,
    Extract,
    Window,
    Cast,
    DataType,
    Case,
    When,
}

impl SyntaxNode {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            value: None,
            children: IndexMap::new(),
        }
    }

    pub fn with_value(mut self, value: impl Into<Scalar>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_node(mut self, name: &str, node: SyntaxNode) -> Self {
        self.children
            .insert(name.to_owned(), Child::Node(Box::new(node)));
        self
    }

    pub fn with_opt_node(self, name: &str, node: Option<SyntaxNode>) -> Self {
        match node {
            Some(node) => self.with_node(name, node),
            None => self,
        }
    }

    /// Empty sequences are not stored.
    pub fn with_nodes(mut self, name: &str, nodes: Vec<SyntaxNode>) -> Self {
        if !nodes.is_empty() {
            self.children.insert(name.to_owned(), Child::Nodes(nodes));
        }
        self
    }

    pub fn with_scalar(mut self, name: &str, scalar: impl Into<Scalar>) -> Self {
        self.children
            .insert(name.to_owned(), Child::Scalar(scalar.into()));
        self
    }

    pub fn child(&self, name: &str) -> Option<&Child> {
        self.children.get(name)
    }

    pub fn child_node(&self, name: &str) -> Option<&SyntaxNode> {
        match self.children.get(name) {
            Some(Child::Node(node)) => Some(node),
            _ => None,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match &self.value {
            Some(Scalar::String(s)) => Some(s),
            _ => None,
        }
    }
}

#[derive(PartialEq, Clone, Debug, EnumDiscriminants)]
#[strum_discriminants(name(TokenTypeVariant))]
pub enum TokenType {
    LeftParen,
    RightParen,
    Comma,
    Dot,
    Semicolon,
    Star,
    Plus,
    Minus,
    Slash,
    Percent,
    ConcatOperator,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,

    Identifier(String),
    QuotedIdentifier(String),
    String(String),
    Number(String),

    // Reserved Keywords
    All,
    And,
    As,
    Asc,
    Between,
    By,
    Case,
    Cast,
    Cross,
    Desc,
    Distinct,
    Else,
    End,
    Except,
    Exists,
    False,
    From,
    Full,
    Group,
    Having,
    In,
    Inner,
    Intersect,
    Is,
    Join,
    Left,
    Like,
    Limit,
    Not,
    Null,
    Offset,
    On,
    Or,
    Order,
    Outer,
    Over,
    Partition,
    Right,
    Select,
    Then,
    True,
    Union,
    Using,
    When,
    Where,
    With,

    Eof,
}

impl TokenTypeVariant {
    pub(crate) fn variant_str(&self) -> &str {
        match self {
            TokenTypeVariant::LeftParen => "(",
            TokenTypeVariant::RightParen => ")",
            TokenTypeVariant::Comma => ",",
            TokenTypeVariant::Dot => ".",
            TokenTypeVariant::Semicolon => ";",
            TokenTypeVariant::Star => "*",
            TokenTypeVariant::Plus => "+",
            TokenTypeVariant::Minus => "-",
            TokenTypeVariant::Slash => "/",
            TokenTypeVariant::Percent => "%",
            TokenTypeVariant::ConcatOperator => "||",
            TokenTypeVariant::Equal => "=",
            TokenTypeVariant::NotEqual => "<>",
            TokenTypeVariant::Less => "<",
            TokenTypeVariant::LessEqual => "<=",
            TokenTypeVariant::Greater => ">",
            TokenTypeVariant::GreaterEqual => ">=",
            TokenTypeVariant::Identifier => "Identifier",
            TokenTypeVariant::QuotedIdentifier => "QuotedIdentifier",
            TokenTypeVariant::String => "String",
            TokenTypeVariant::Number => "Number",

            // Reserved Keywords
            TokenTypeVariant::All => "ALL",
            TokenTypeVariant::And => "AND",
            TokenTypeVariant::As => "AS",
            TokenTypeVariant::Asc => "ASC",
            TokenTypeVariant::Between => "BETWEEN",
            TokenTypeVariant::By => "BY",
            TokenTypeVariant::Case => "CASE",
            TokenTypeVariant::Cast => "CAST",
            TokenTypeVariant::Cross => "CROSS",
            TokenTypeVariant::Desc => "DESC",
            TokenTypeVariant::Distinct => "DISTINCT",
            TokenTypeVariant::Else => "ELSE",
            TokenTypeVariant::End => "END",
            TokenTypeVariant::Except => "EXCEPT",
            TokenTypeVariant::Exists => "EXISTS",
            TokenTypeVariant::False => "FALSE",
            TokenTypeVariant::From => "FROM",
            TokenTypeVariant::Full => "FULL",
            TokenTypeVariant::Group => "GROUP",
            TokenTypeVariant::Having => "HAVING",
            TokenTypeVariant::In => "IN",
            TokenTypeVariant::Inner => "INNER",
            TokenTypeVariant::Intersect => "INTERSECT",
            TokenTypeVariant::Is => "IS",
            TokenTypeVariant::Join => "JOIN",
            TokenTypeVariant::Left => "LEFT",
            TokenTypeVariant::Like => "LIKE",
            TokenTypeVariant::Limit => "LIMIT",
            TokenTypeVariant::Not => "NOT",
            TokenTypeVariant::Null => "NULL",
            TokenTypeVariant::Offset => "OFFSET",
            TokenTypeVariant::On => "ON",
            TokenTypeVariant::Or => "OR",
            TokenTypeVariant::Order => "ORDER",
            TokenTypeVariant::Outer => "OUTER",
            TokenTypeVariant::Over => "OVER",
            TokenTypeVariant::Partition => "PARTITION",
            TokenTypeVariant::Right => "RIGHT",
            TokenTypeVariant::Select => "SELECT",
            TokenTypeVariant::Then => "THEN",
            TokenTypeVariant::True => "TRUE",
            TokenTypeVariant::Union => "UNION",
            TokenTypeVariant::Using => "USING",
            TokenTypeVariant::When => "WHEN",
            TokenTypeVariant::Where => "WHERE",
            TokenTypeVariant::With => "WITH",

            TokenTypeVariant::Eof => "EOF",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenType,
    pub lexeme: String,
    pub line: u32,
    pub col: u32,
}
