//! Arithmetic evaluation for the `calculator` tool.
//!
//! A small recursive-descent parser over `f64`:
//!
//! ```text
//! expr   := term (('+' | '-') term)*
//! term   := unary (('*' | '/' | '%') unary)*
//! unary  := ('+' | '-') unary | power
//! power  := atom (('^' | '**') unary)?
//! atom   := number | ident | ident '(' expr ')' | '(' expr ')'
//! ```

use crate::error::{EvaluationError, ToolExecutionError};

pub const NAME: &str = "calculator";
pub const DESCRIPTION: &str = "Useful for getting the result of a math expression. The input to this tool should be a valid mathematical expression that could be executed by a simple calculator.";

#[derive(Debug, Clone, Copy, Default)]
pub struct CalculatorTool;

impl CalculatorTool {
    pub fn new() -> Self {
        Self
    }

    pub fn execute(&self, input: &str) -> Result<String, ToolExecutionError> {
        let value = evaluate(input)?;
        Ok(format_value(value))
    }
}

pub fn evaluate(input: &str) -> Result<f64, EvaluationError> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(EvaluationError::Empty);
    }

    let mut parser = Parser { tokens, pos: 0 };
    let value = parser.expr()?;

    if let Some((token, pos)) = parser.tokens.get(parser.pos) {
        return Err(EvaluationError::UnexpectedToken {
            found: token.describe(),
            pos: *pos,
        });
    }

    if value.is_finite() {
        Ok(value)
    } else {
        Err(EvaluationError::NotFinite)
    }
}

const PLAIN_MIN: f64 = 1e-6;
const PLAIN_MAX: f64 = 1e15;

/// Integral values print without a fractional part. Moderate values are
/// rounded to 12 decimals to hide float noise; very large or very small
/// ones use scientific notation.
pub fn format_value(value: f64) -> String {
    let magnitude = value.abs();

    if value == value.trunc() && magnitude < PLAIN_MAX {
        // avoid "-0"
        format!("{}", value as i64)
    } else if (PLAIN_MIN..PLAIN_MAX).contains(&magnitude) {
        let rounded = (value * 1e12).round() / 1e12;
        format!("{}", rounded)
    } else {
        format!("{:e}", value)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Caret,
    LParen,
    RParen,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Number(n) => format!("number {}", n),
            Token::Ident(name) => format!("'{}'", name),
            Token::Plus => "'+'".into(),
            Token::Minus => "'-'".into(),
            Token::Star => "'*'".into(),
            Token::Slash => "'/'".into(),
            Token::Percent => "'%'".into(),
            Token::Caret => "'^'".into(),
            Token::LParen => "'('".into(),
            Token::RParen => "')'".into(),
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<(Token, usize)>, EvaluationError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];
        let start = i;

        let token = match ch {
            c if c.is_whitespace() || c == ',' && is_digit_group(&chars, i) => {
                i += 1;
                continue;
            }
            c if c.is_ascii_digit() || c == '.' => {
                while i < chars.len()
                    && (chars[i].is_ascii_digit()
                        || chars[i] == '.'
                        || chars[i] == ',' && is_digit_group(&chars, i))
                {
                    i += 1;
                }
                if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
                    let mut j = i + 1;
                    if j < chars.len() && (chars[j] == '+' || chars[j] == '-') {
                        j += 1;
                    }
                    if j < chars.len() && chars[j].is_ascii_digit() {
                        while j < chars.len() && chars[j].is_ascii_digit() {
                            j += 1;
                        }
                        i = j;
                    }
                }
                let literal: String = chars[start..i].iter().filter(|c| **c != ',').collect();
                let value = literal
                    .parse::<f64>()
                    .map_err(|_| EvaluationError::UnexpectedToken {
                        found: format!("'{}'", literal),
                        pos: start,
                    })?;
                tokens.push((Token::Number(value), start));
                continue;
            }
            c if c.is_alphabetic() || c == '_' => {
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let ident: String = chars[start..i].iter().collect();
                tokens.push((Token::Ident(ident.to_lowercase()), start));
                continue;
            }
            '+' => Token::Plus,
            '-' | '−' => Token::Minus,
            '*' if chars.get(i + 1) == Some(&'*') => {
                i += 1;
                Token::Caret
            }
            '*' | '×' => Token::Star,
            '/' | '÷' => Token::Slash,
            '%' => Token::Percent,
            '^' => Token::Caret,
            '(' => Token::LParen,
            ')' => Token::RParen,
            other => {
                return Err(EvaluationError::UnexpectedChar {
                    ch: other,
                    pos: start,
                });
            }
        };

        tokens.push((token, start));
        i += 1;
    }

    Ok(tokens)
}

/// `1,000,000` style grouping: a comma followed by exactly three digits.
fn is_digit_group(chars: &[char], comma: usize) -> bool {
    comma > 0
        && chars[comma - 1].is_ascii_digit()
        && chars.len() >= comma + 4
        && chars[comma + 1..comma + 4].iter().all(|c| c.is_ascii_digit())
        && chars.get(comma + 4).is_none_or(|c| !c.is_ascii_digit())
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn advance(&mut self) -> Option<(Token, usize)> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn end_pos(&self) -> usize {
        self.tokens
            .last()
            .map(|(_, p)| p + 1)
            .unwrap_or_default()
    }

    fn expect_rparen(&mut self) -> Result<(), EvaluationError> {
        match self.advance() {
            Some((Token::RParen, _)) => Ok(()),
            Some((other, pos)) => Err(EvaluationError::UnexpectedToken {
                found: other.describe(),
                pos,
            }),
            None => Err(EvaluationError::UnexpectedToken {
                found: "end of input, expected ')'".into(),
                pos: self.end_pos(),
            }),
        }
    }

    fn expr(&mut self) -> Result<f64, EvaluationError> {
        let mut value = self.term()?;
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.pos += 1;
                    value += self.term()?;
                }
                Some(Token::Minus) => {
                    self.pos += 1;
                    value -= self.term()?;
                }
                _ => return Ok(value),
            }
        }
    }

    fn term(&mut self) -> Result<f64, EvaluationError> {
        let mut value = self.unary()?;
        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.pos += 1;
                    value *= self.unary()?;
                }
                Some(Token::Slash) => {
                    self.pos += 1;
                    let rhs = self.unary()?;
                    if rhs == 0.0 {
                        return Err(EvaluationError::DivisionByZero);
                    }
                    value /= rhs;
                }
                Some(Token::Percent) => {
                    self.pos += 1;
                    let rhs = self.unary()?;
                    if rhs == 0.0 {
                        return Err(EvaluationError::DivisionByZero);
                    }
                    value %= rhs;
                }
                _ => return Ok(value),
            }
        }
    }

    fn unary(&mut self) -> Result<f64, EvaluationError> {
        match self.peek() {
            Some(Token::Minus) => {
                self.pos += 1;
                Ok(-self.unary()?)
            }
            Some(Token::Plus) => {
                self.pos += 1;
                self.unary()
            }
            _ => self.power(),
        }
    }

    // right associative: 2^3^2 == 2^9
    fn power(&mut self) -> Result<f64, EvaluationError> {
        let base = self.atom()?;
        if self.peek() == Some(&Token::Caret) {
            self.pos += 1;
            let exponent = self.unary()?;
            return Ok(base.powf(exponent));
        }
        Ok(base)
    }

    fn atom(&mut self) -> Result<f64, EvaluationError> {
        match self.advance() {
            Some((Token::Number(n), _)) => Ok(n),
            Some((Token::LParen, _)) => {
                let value = self.expr()?;
                self.expect_rparen()?;
                Ok(value)
            }
            Some((Token::Ident(name), pos)) => {
                if self.peek() == Some(&Token::LParen) {
                    self.pos += 1;
                    let arg = self.expr()?;
                    self.expect_rparen()?;
                    apply_function(&name, arg)
                } else {
                    constant(&name).ok_or_else(|| {
                        tracing::debug!(pos, "unknown identifier in expression");
                        EvaluationError::UnknownIdentifier(name)
                    })
                }
            }
            Some((other, pos)) => Err(EvaluationError::UnexpectedToken {
                found: other.describe(),
                pos,
            }),
            None => Err(EvaluationError::UnexpectedToken {
                found: "end of input".into(),
                pos: self.end_pos(),
            }),
        }
    }
}

fn constant(name: &str) -> Option<f64> {
    match name {
        "pi" => Some(std::f64::consts::PI),
        "e" => Some(std::f64::consts::E),
        "tau" => Some(std::f64::consts::TAU),
        _ => None,
    }
}

fn apply_function(name: &str, arg: f64) -> Result<f64, EvaluationError> {
    let value = match name {
        "sqrt" => arg.sqrt(),
        "abs" => arg.abs(),
        "ln" => arg.ln(),
        "log" | "log10" => arg.log10(),
        "log2" => arg.log2(),
        "exp" => arg.exp(),
        "sin" => arg.sin(),
        "cos" => arg.cos(),
        "tan" => arg.tan(),
        "asin" => arg.asin(),
        "acos" => arg.acos(),
        "atan" => arg.atan(),
        "floor" => arg.floor(),
        "ceil" => arg.ceil(),
        "round" => arg.round(),
        _ => return Err(EvaluationError::UnknownIdentifier(name.to_string())),
    };

    if value.is_finite() {
        Ok(value)
    } else {
        Err(EvaluationError::NotFinite)
    }
}
