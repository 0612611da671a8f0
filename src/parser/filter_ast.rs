use serde_json::Value;
use std::fmt;

/// SCIM comparison operators (RFC 7644 section 3.4.2.2)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Equal,
    NotEqual,
    Contains,
    StartsWith,
    EndsWith,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
}

impl CompareOp {
    pub fn from_keyword(word: &str) -> Option<CompareOp> {
        match word.to_lowercase().as_str() {
            "eq" => Some(CompareOp::Equal),
            "ne" => Some(CompareOp::NotEqual),
            "co" => Some(CompareOp::Contains),
            "sw" => Some(CompareOp::StartsWith),
            "ew" => Some(CompareOp::EndsWith),
            "gt" => Some(CompareOp::GreaterThan),
            "ge" => Some(CompareOp::GreaterThanOrEqual),
            "lt" => Some(CompareOp::LessThan),
            "le" => Some(CompareOp::LessThanOrEqual),
            _ => None,
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let word = match self {
            CompareOp::Equal => "eq",
            CompareOp::NotEqual => "ne",
            CompareOp::Contains => "co",
            CompareOp::StartsWith => "sw",
            CompareOp::EndsWith => "ew",
            CompareOp::GreaterThan => "gt",
            CompareOp::GreaterThanOrEqual => "ge",
            CompareOp::LessThan => "lt",
            CompareOp::LessThanOrEqual => "le",
        };
        write!(f, "{}", word)
    }
}

/// A dotted attribute path, optionally URI-qualified
/// (`urn:ietf:params:scim:schemas:core:2.0:User:userName`). Attribute name
/// matching is case-insensitive; the original spelling is kept for error
/// messages.
#[derive(Debug, Clone, PartialEq)]
pub struct AttrPath {
    pub urn: Option<String>,
    pub segments: Vec<String>,
}

impl AttrPath {
    pub fn new(segments: Vec<String>) -> Self {
        AttrPath {
            urn: None,
            segments,
        }
    }

    /// Build a path from a single lexed identifier. URN-qualified names carry
    /// the schema URI up to the last colon; the remainder may itself be
    /// dotted (`urn:…:User:manager.value`).
    pub fn from_ident(ident: &str) -> Self {
        if let Some(last_colon) = ident.rfind(':') {
            let urn = ident[..last_colon].to_string();
            let rest = &ident[last_colon + 1..];
            return AttrPath {
                urn: Some(urn),
                segments: rest.split('.').map(|s| s.to_string()).collect(),
            };
        }
        AttrPath {
            urn: None,
            segments: vec![ident.to_string()],
        }
    }
}

impl fmt::Display for AttrPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref urn) = self.urn {
            write!(f, "{}:", urn)?;
        }
        write!(f, "{}", self.segments.join("."))
    }
}

/// Filter expression AST. One node per syntactic construct; the evaluator is
/// a pure function over (node, resource).
#[derive(Debug, Clone, PartialEq)]
pub enum FilterNode {
    Compare {
        path: AttrPath,
        op: CompareOp,
        value: Value,
    },
    Present {
        path: AttrPath,
    },
    And(Box<FilterNode>, Box<FilterNode>),
    Or(Box<FilterNode>, Box<FilterNode>),
    Not(Box<FilterNode>),
    /// Value path `attr[predicate]` with optional trailing sub-attribute:
    /// true iff any element of `attr` satisfies the predicate (and, when
    /// `sub_attr` is given, carries that sub-attribute).
    Complex {
        path: AttrPath,
        predicate: Box<FilterNode>,
        sub_attr: Option<String>,
    },
}
