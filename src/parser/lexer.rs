use crate::error::{AppError, AppResult};
use crate::parser::filter_ast::CompareOp;
use serde_json::Number;

/// Tokens of the SCIM filter language. Keywords and operators are
/// case-insensitive; whitespace separates tokens.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Ident(String),
    Str(String),
    Number(Number),
    True,
    False,
    Null,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Dot,
    And,
    Or,
    Not,
    Pr,
    Op(CompareOp),
}

/// A token together with its byte offset in the source, for error reporting.
#[derive(Debug, Clone, PartialEq)]
pub struct SpannedToken {
    pub token: Token,
    pub pos: usize,
}

pub fn tokenize(input: &str) -> AppResult<Vec<SpannedToken>> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];

        if ch.is_whitespace() {
            i += 1;
            continue;
        }

        let start = i;
        let token = match ch {
            '(' => {
                i += 1;
                Token::LParen
            }
            ')' => {
                i += 1;
                Token::RParen
            }
            '[' => {
                i += 1;
                Token::LBracket
            }
            ']' => {
                i += 1;
                Token::RBracket
            }
            '.' => {
                i += 1;
                Token::Dot
            }
            '"' => {
                let (value, next) = lex_string(&chars, i)?;
                i = next;
                Token::Str(value)
            }
            c if c.is_ascii_digit() || c == '-' => {
                let (value, next) = lex_number(&chars, i)?;
                i = next;
                Token::Number(value)
            }
            c if c.is_alphabetic() || c == '_' || c == '$' => {
                let (word, next) = lex_ident(&chars, i);
                i = next;
                classify_word(word)
            }
            other => {
                return Err(AppError::InvalidFilter(format!(
                    "Unexpected character '{}' at position {}",
                    other, start
                )));
            }
        };

        tokens.push(SpannedToken { token, pos: start });
    }

    Ok(tokens)
}

/// Identifiers cover plain attribute names and URN-qualified ones. Once a
/// colon is seen the rest of the URN may contain dots (`…:enterprise:2.0:User`),
/// so dots stop terminating the identifier from that point on.
fn lex_ident(chars: &[char], start: usize) -> (String, usize) {
    let mut i = start;
    let mut urn_mode = false;
    let mut word = String::new();

    while i < chars.len() {
        let c = chars[i];
        let accepted = c.is_alphanumeric()
            || c == '_'
            || c == '-'
            || c == '$'
            || c == ':'
            || (urn_mode && c == '.');
        if !accepted {
            break;
        }
        if c == ':' {
            urn_mode = true;
        }
        word.push(c);
        i += 1;
    }

    (word, i)
}

fn classify_word(word: String) -> Token {
    if word.contains(':') {
        return Token::Ident(word);
    }
    match word.to_lowercase().as_str() {
        "and" => Token::And,
        "or" => Token::Or,
        "not" => Token::Not,
        "pr" => Token::Pr,
        "true" => Token::True,
        "false" => Token::False,
        "null" => Token::Null,
        lowered => match CompareOp::from_keyword(lowered) {
            Some(op) => Token::Op(op),
            None => Token::Ident(word),
        },
    }
}

fn lex_string(chars: &[char], start: usize) -> AppResult<(String, usize)> {
    let mut i = start + 1;
    let mut value = String::new();

    while i < chars.len() {
        match chars[i] {
            '"' => return Ok((value, i + 1)),
            '\\' => {
                i += 1;
                if i >= chars.len() {
                    break;
                }
                match chars[i] {
                    '"' => value.push('"'),
                    '\\' => value.push('\\'),
                    '/' => value.push('/'),
                    'b' => value.push('\u{0008}'),
                    'f' => value.push('\u{000C}'),
                    'n' => value.push('\n'),
                    'r' => value.push('\r'),
                    't' => value.push('\t'),
                    'u' => {
                        let (ch, next) = lex_unicode_escape(chars, i + 1, start)?;
                        value.push(ch);
                        i = next;
                        continue;
                    }
                    other => {
                        return Err(AppError::InvalidFilter(format!(
                            "Invalid escape sequence '\\{}' in string at position {}",
                            other, start
                        )));
                    }
                }
                i += 1;
            }
            c => {
                value.push(c);
                i += 1;
            }
        }
    }

    Err(AppError::InvalidFilter(format!(
        "Unterminated string starting at position {}",
        start
    )))
}

/// Consume the four hex digits of a `\uXXXX` escape (plus the low half of a
/// surrogate pair when present). Returns the decoded char and the index just
/// past the escape.
fn lex_unicode_escape(chars: &[char], start: usize, string_start: usize) -> AppResult<(char, usize)> {
    let code = read_hex4(chars, start, string_start)?;
    let mut next = start + 4;

    // High surrogate: must be followed by \uXXXX with the low half
    if (0xD800..=0xDBFF).contains(&code) {
        if chars.get(next) == Some(&'\\') && chars.get(next + 1) == Some(&'u') {
            let low = read_hex4(chars, next + 2, string_start)?;
            if (0xDC00..=0xDFFF).contains(&low) {
                let combined = 0x10000 + ((code - 0xD800) << 10) + (low - 0xDC00);
                next += 6;
                if let Some(ch) = char::from_u32(combined) {
                    return Ok((ch, next));
                }
            }
        }
        return Err(AppError::InvalidFilter(format!(
            "Invalid unicode escape in string at position {}",
            string_start
        )));
    }

    match char::from_u32(code) {
        Some(ch) => Ok((ch, next)),
        None => Err(AppError::InvalidFilter(format!(
            "Invalid unicode escape in string at position {}",
            string_start
        ))),
    }
}

fn read_hex4(chars: &[char], start: usize, string_start: usize) -> AppResult<u32> {
    if start + 4 > chars.len() {
        return Err(AppError::InvalidFilter(format!(
            "Truncated unicode escape in string at position {}",
            string_start
        )));
    }
    let mut code = 0u32;
    for offset in 0..4 {
        let digit = chars[start + offset].to_digit(16).ok_or_else(|| {
            AppError::InvalidFilter(format!(
                "Invalid unicode escape in string at position {}",
                string_start
            ))
        })?;
        code = code * 16 + digit;
    }
    Ok(code)
}

fn lex_number(chars: &[char], start: usize) -> AppResult<(Number, usize)> {
    let mut i = start;
    if chars[i] == '-' {
        i += 1;
    }
    while i < chars.len() && chars[i].is_ascii_digit() {
        i += 1;
    }
    let mut is_float = false;
    if i < chars.len() && chars[i] == '.' && chars.get(i + 1).is_some_and(|c| c.is_ascii_digit()) {
        is_float = true;
        i += 1;
        while i < chars.len() && chars[i].is_ascii_digit() {
            i += 1;
        }
    }
    if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
        is_float = true;
        i += 1;
        if i < chars.len() && (chars[i] == '+' || chars[i] == '-') {
            i += 1;
        }
        while i < chars.len() && chars[i].is_ascii_digit() {
            i += 1;
        }
    }

    let raw: String = chars[start..i].iter().collect();
    if !is_float {
        if let Ok(n) = raw.parse::<i64>() {
            return Ok((Number::from(n), i));
        }
    }
    match raw.parse::<f64>().ok().and_then(Number::from_f64) {
        Some(n) => Ok((n, i)),
        None => Err(AppError::InvalidFilter(format!(
            "Invalid number '{}' at position {}",
            raw, start
        ))),
    }
}
