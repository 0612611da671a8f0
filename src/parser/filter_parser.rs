use serde_json::Value;

use crate::error::{AppError, AppResult};
use crate::parser::filter_ast::{AttrPath, CompareOp, FilterNode};
use crate::parser::lexer::{tokenize, SpannedToken, Token};

/// Parse a SCIM filter expression (RFC 7644 section 3.4.2.2) into an AST.
///
/// `max_complexity` bounds the number of AST nodes (every comparison,
/// presence, logical and value-path node counts as one); expressions over the
/// budget are rejected with `FilterTooComplex`.
pub fn parse_filter(filter_str: &str, max_complexity: usize) -> AppResult<FilterNode> {
    let trimmed = filter_str.trim();
    if trimmed.is_empty() {
        return Err(AppError::InvalidFilter("Empty filter".to_string()));
    }

    let tokens = tokenize(trimmed)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        complexity: 0,
        max_complexity,
        in_value_path: false,
    };

    let node = parser.parse_or()?;
    if let Some(tok) = parser.peek() {
        return Err(AppError::InvalidFilter(format!(
            "Unexpected token at position {}",
            tok.pos
        )));
    }
    Ok(node)
}

struct Parser {
    tokens: Vec<SpannedToken>,
    pos: usize,
    complexity: usize,
    max_complexity: usize,
    in_value_path: bool,
}

impl Parser {
    fn peek(&self) -> Option<&SpannedToken> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<SpannedToken> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn count_node(&mut self) -> AppResult<()> {
        self.complexity += 1;
        if self.complexity > self.max_complexity {
            return Err(AppError::FilterTooComplex(format!(
                "Filter complexity exceeds the maximum of {}",
                self.max_complexity
            )));
        }
        Ok(())
    }

    // or := and ("or" and)*
    fn parse_or(&mut self) -> AppResult<FilterNode> {
        let mut left = self.parse_and()?;
        while matches!(self.peek().map(|t| &t.token), Some(Token::Or)) {
            self.advance();
            let right = self.parse_and()?;
            self.count_node()?;
            left = FilterNode::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    // and := not ("and" not)*
    fn parse_and(&mut self) -> AppResult<FilterNode> {
        let mut left = self.parse_not()?;
        while matches!(self.peek().map(|t| &t.token), Some(Token::And)) {
            self.advance();
            let right = self.parse_not()?;
            self.count_node()?;
            left = FilterNode::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    // not := "not" primary | primary
    fn parse_not(&mut self) -> AppResult<FilterNode> {
        if matches!(self.peek().map(|t| &t.token), Some(Token::Not)) {
            self.advance();
            let inner = self.parse_primary()?;
            self.count_node()?;
            return Ok(FilterNode::Not(Box::new(inner)));
        }
        self.parse_primary()
    }

    // primary := "(" filter ")" | attr-expr
    fn parse_primary(&mut self) -> AppResult<FilterNode> {
        let tok = self
            .peek()
            .cloned()
            .ok_or_else(|| AppError::InvalidFilter("Unexpected end of filter".to_string()))?;

        match tok.token {
            Token::LParen => {
                self.advance();
                let inner = self.parse_or()?;
                match self.advance() {
                    Some(SpannedToken {
                        token: Token::RParen,
                        ..
                    }) => Ok(inner),
                    _ => Err(AppError::InvalidFilter(format!(
                        "Unbalanced parenthesis opened at position {}",
                        tok.pos
                    ))),
                }
            }
            Token::Ident(_) => self.parse_attr_expression(),
            _ => Err(AppError::InvalidFilter(format!(
                "Unexpected token at position {}",
                tok.pos
            ))),
        }
    }

    // attr-expr := path (op literal | "pr")
    //            | path "[" filter "]" ("." name)? (op literal | "pr")?
    fn parse_attr_expression(&mut self) -> AppResult<FilterNode> {
        let path = self.parse_attr_path()?;

        if matches!(self.peek().map(|t| &t.token), Some(Token::LBracket)) {
            return self.parse_value_path(path);
        }

        self.parse_comparison_tail(path)
    }

    fn parse_comparison_tail(&mut self, path: AttrPath) -> AppResult<FilterNode> {
        let tok = self
            .advance()
            .ok_or_else(|| AppError::InvalidFilter("Expected operator after attribute".to_string()))?;

        match tok.token {
            Token::Pr => {
                self.count_node()?;
                Ok(FilterNode::Present { path })
            }
            Token::Op(op) => {
                let value = self.parse_literal()?;
                self.count_node()?;
                Ok(FilterNode::Compare { path, op, value })
            }
            _ => Err(AppError::InvalidFilter(format!(
                "Expected operator at position {}",
                tok.pos
            ))),
        }
    }

    /// Value path: `attr[filter]`, `attr[filter].sub`, and the filter forms
    /// `attr[filter].sub op literal` / `attr[filter].sub pr`. Trailing
    /// comparisons fold into the bracket predicate so evaluation stays a
    /// single existential scan over the array elements.
    fn parse_value_path(&mut self, path: AttrPath) -> AppResult<FilterNode> {
        let open = self.advance().expect("caller checked for '['");
        if self.in_value_path {
            return Err(AppError::InvalidFilter(format!(
                "Nested value path at position {}",
                open.pos
            )));
        }

        self.in_value_path = true;
        let predicate = self.parse_or();
        self.in_value_path = false;
        let mut predicate = predicate?;

        match self.advance() {
            Some(SpannedToken {
                token: Token::RBracket,
                ..
            }) => {}
            _ => {
                return Err(AppError::InvalidFilter(format!(
                    "Unbalanced bracket opened at position {}",
                    open.pos
                )));
            }
        }

        let mut sub_attr = None;
        if matches!(self.peek().map(|t| &t.token), Some(Token::Dot)) {
            self.advance();
            match self.advance() {
                Some(SpannedToken {
                    token: Token::Ident(name),
                    ..
                }) => sub_attr = Some(name),
                other => {
                    return Err(AppError::InvalidFilter(format!(
                        "Expected sub-attribute name{}",
                        other
                            .map(|t| format!(" at position {}", t.pos))
                            .unwrap_or_default()
                    )));
                }
            }
        }

        // A trailing comparison applies to the sub-attribute of matching
        // elements: emails[type eq "work"].value co "@corp" holds iff some
        // element matches the predicate and its value contains "@corp".
        let has_trailing_op = sub_attr.is_some()
            && matches!(
                self.peek().map(|t| &t.token),
                Some(Token::Op(_)) | Some(Token::Pr)
            );
        if has_trailing_op {
            let sub = sub_attr.take().expect("checked just above");
            let tail = self.parse_comparison_tail(AttrPath::new(vec![sub]))?;
            self.count_node()?;
            predicate = FilterNode::And(Box::new(predicate), Box::new(tail));
        }

        self.count_node()?;
        Ok(FilterNode::Complex {
            path,
            predicate: Box::new(predicate),
            sub_attr,
        })
    }

    // path := ident ("." ident)*  (URN qualification handled by the lexer)
    fn parse_attr_path(&mut self) -> AppResult<AttrPath> {
        let tok = self
            .advance()
            .ok_or_else(|| AppError::InvalidFilter("Expected attribute name".to_string()))?;
        let mut path = match tok.token {
            Token::Ident(name) => AttrPath::from_ident(&name),
            _ => {
                return Err(AppError::InvalidFilter(format!(
                    "Expected attribute name at position {}",
                    tok.pos
                )));
            }
        };

        while matches!(self.peek().map(|t| &t.token), Some(Token::Dot)) {
            // Only consume the dot when a segment follows; a dot before '['
            // or an operator is malformed either way.
            self.advance();
            match self.advance() {
                Some(SpannedToken {
                    token: Token::Ident(name),
                    ..
                }) => path.segments.push(name),
                other => {
                    return Err(AppError::InvalidFilter(format!(
                        "Expected attribute segment{}",
                        other
                            .map(|t| format!(" at position {}", t.pos))
                            .unwrap_or_default()
                    )));
                }
            }
        }

        Ok(path)
    }

    fn parse_literal(&mut self) -> AppResult<Value> {
        let tok = self
            .advance()
            .ok_or_else(|| AppError::InvalidFilter("Expected comparison value".to_string()))?;
        match tok.token {
            Token::Str(s) => Ok(Value::String(s)),
            Token::Number(n) => Ok(Value::Number(n)),
            Token::True => Ok(Value::Bool(true)),
            Token::False => Ok(Value::Bool(false)),
            Token::Null => Ok(Value::Null),
            _ => Err(AppError::InvalidFilter(format!(
                "Expected comparison value at position {}",
                tok.pos
            ))),
        }
    }
}
