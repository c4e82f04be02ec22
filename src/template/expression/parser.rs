// ABOUTME: Tokenizer, recursive-descent parser and evaluator for template expressions
// ABOUTME: Supports literals, ! and unary minus, arithmetic, comparisons and short-circuit logic

use std::cmp::Ordering;

use crate::template::path::is_word_char;
use crate::template::value::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Literal(Value),
    /// Bare name or dotted path, replaced by a literal during substitution
    Ident(String),
    Op(Op),
    LParen,
    RParen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    And,
    Or,
    Not,
}

impl Op {
    fn symbol(self) -> &'static str {
        match self {
            Op::Add => "+",
            Op::Sub => "-",
            Op::Mul => "*",
            Op::Div => "/",
            Op::Eq => "==",
            Op::Ne => "!=",
            Op::Lt => "<",
            Op::Gt => ">",
            Op::Le => "<=",
            Op::Ge => ">=",
            Op::And => "&&",
            Op::Or => "||",
            Op::Not => "!",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Unresolved(String),
    Not(Box<Expr>),
    Negate(Box<Expr>),
    Binary(Op, Box<Expr>, Box<Expr>),
}

pub fn tokenize(text: &str) -> Result<Vec<Token>, String> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < chars.len() {
        let c = chars[pos];
        let next = chars.get(pos + 1).copied();

        if c.is_whitespace() {
            pos += 1;
        } else if c.is_ascii_digit() || (c == '.' && next.is_some_and(|n| n.is_ascii_digit())) {
            let (number, end) = read_number(&chars, pos)?;
            tokens.push(Token::Literal(Value::Number(number)));
            pos = end;
        } else if c == '"' || c == '\'' {
            let (text, end) = read_string(&chars, pos)?;
            tokens.push(Token::Literal(Value::String(text)));
            pos = end;
        } else if c.is_alphabetic() || c == '_' {
            let start = pos;
            while pos < chars.len()
                && (is_word_char(chars[pos])
                    || (chars[pos] == '.' && chars.get(pos + 1).is_some_and(|n| is_word_char(*n))))
            {
                pos += 1;
            }
            let word: String = chars[start..pos].iter().collect();
            tokens.push(match word.to_ascii_lowercase().as_str() {
                "true" => Token::Literal(Value::Bool(true)),
                "false" => Token::Literal(Value::Bool(false)),
                "null" => Token::Literal(Value::Null),
                _ => Token::Ident(word),
            });
        } else {
            let (op, width) = match (c, next) {
                ('=', Some('=')) => (Op::Eq, strict_width(&chars, pos)),
                ('!', Some('=')) => (Op::Ne, strict_width(&chars, pos)),
                ('<', Some('=')) => (Op::Le, 2),
                ('>', Some('=')) => (Op::Ge, 2),
                ('&', Some('&')) => (Op::And, 2),
                ('|', Some('|')) => (Op::Or, 2),
                ('<', _) => (Op::Lt, 1),
                ('>', _) => (Op::Gt, 1),
                ('!', _) => (Op::Not, 1),
                ('+', _) => (Op::Add, 1),
                ('-', _) => (Op::Sub, 1),
                ('*', _) => (Op::Mul, 1),
                ('/', _) => (Op::Div, 1),
                ('(', _) => {
                    tokens.push(Token::LParen);
                    pos += 1;
                    continue;
                }
                (')', _) => {
                    tokens.push(Token::RParen);
                    pos += 1;
                    continue;
                }
                _ => return Err(format!("unexpected character '{}'", c)),
            };
            tokens.push(Token::Op(op));
            pos += width;
        }
    }

    Ok(tokens)
}

/// `===` and `!==` are accepted as spellings of `==` and `!=`
fn strict_width(chars: &[char], pos: usize) -> usize {
    if chars.get(pos + 2) == Some(&'=') {
        3
    } else {
        2
    }
}

fn read_number(chars: &[char], start: usize) -> Result<(f64, usize), String> {
    let mut pos = start;
    while pos < chars.len() && (chars[pos].is_ascii_digit() || chars[pos] == '.') {
        pos += 1;
    }
    if pos < chars.len() && matches!(chars[pos], 'e' | 'E') {
        let mut exponent = pos + 1;
        if exponent < chars.len() && matches!(chars[exponent], '+' | '-') {
            exponent += 1;
        }
        if exponent < chars.len() && chars[exponent].is_ascii_digit() {
            pos = exponent;
            while pos < chars.len() && chars[pos].is_ascii_digit() {
                pos += 1;
            }
        }
    }
    let literal: String = chars[start..pos].iter().collect();
    literal
        .parse::<f64>()
        .map(|number| (number, pos))
        .map_err(|_| format!("invalid number '{}'", literal))
}

fn read_string(chars: &[char], start: usize) -> Result<(String, usize), String> {
    let quote = chars[start];
    let mut text = String::new();
    let mut pos = start + 1;

    while pos < chars.len() {
        match chars[pos] {
            '\\' if pos + 1 < chars.len() => {
                text.push(match chars[pos + 1] {
                    'n' => '\n',
                    't' => '\t',
                    other => other,
                });
                pos += 2;
            }
            c if c == quote => return Ok((text, pos + 1)),
            c => {
                text.push(c);
                pos += 1;
            }
        }
    }

    Err(format!("unterminated string starting at {}", start))
}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    pub fn parse(mut self) -> Result<Expr, String> {
        if self.tokens.is_empty() {
            return Err("empty expression".to_string());
        }
        let expr = self.parse_or()?;
        match self.tokens.get(self.pos) {
            None => Ok(expr),
            Some(token) => Err(format!("unexpected {}", describe(token))),
        }
    }

    fn peek_op(&self) -> Option<Op> {
        match self.tokens.get(self.pos) {
            Some(Token::Op(op)) => Some(*op),
            _ => None,
        }
    }

    fn binary_level(
        &mut self,
        ops: &[Op],
        next: fn(&mut Self) -> Result<Expr, String>,
    ) -> Result<Expr, String> {
        let mut left = next(self)?;
        while let Some(op) = self.peek_op().filter(|op| ops.contains(op)) {
            self.pos += 1;
            let right = next(self)?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_or(&mut self) -> Result<Expr, String> {
        self.binary_level(&[Op::Or], Self::parse_and)
    }

    fn parse_and(&mut self) -> Result<Expr, String> {
        self.binary_level(&[Op::And], Self::parse_comparison)
    }

    fn parse_comparison(&mut self) -> Result<Expr, String> {
        self.binary_level(
            &[Op::Eq, Op::Ne, Op::Lt, Op::Gt, Op::Le, Op::Ge],
            Self::parse_additive,
        )
    }

    fn parse_additive(&mut self) -> Result<Expr, String> {
        self.binary_level(&[Op::Add, Op::Sub], Self::parse_multiplicative)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, String> {
        self.binary_level(&[Op::Mul, Op::Div], Self::parse_unary)
    }

    fn parse_unary(&mut self) -> Result<Expr, String> {
        match self.peek_op() {
            Some(Op::Not) => {
                self.pos += 1;
                Ok(Expr::Not(Box::new(self.parse_unary()?)))
            }
            Some(Op::Sub) => {
                self.pos += 1;
                Ok(Expr::Negate(Box::new(self.parse_unary()?)))
            }
            Some(Op::Add) => {
                self.pos += 1;
                self.parse_unary()
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, String> {
        let token = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or_else(|| "unexpected end of expression".to_string())?;
        self.pos += 1;

        match token {
            Token::Literal(value) => Ok(Expr::Literal(value)),
            Token::Ident(name) => Ok(Expr::Unresolved(name)),
            Token::LParen => {
                let inner = self.parse_or()?;
                match self.tokens.get(self.pos) {
                    Some(Token::RParen) => {
                        self.pos += 1;
                        Ok(inner)
                    }
                    _ => Err("missing closing parenthesis".to_string()),
                }
            }
            other => Err(format!("unexpected {}", describe(&other))),
        }
    }
}

fn describe(token: &Token) -> String {
    match token {
        Token::Literal(value) => format!("literal '{}'", value),
        Token::Ident(name) => format!("symbol '{}'", name),
        Token::Op(op) => format!("operator '{}'", op.symbol()),
        Token::LParen => "'('".to_string(),
        Token::RParen => "')'".to_string(),
    }
}

impl Expr {
    pub fn eval(&self) -> Result<Value, String> {
        match self {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Unresolved(name) => Err(format!("undefined symbol '{}'", name)),
            Expr::Not(inner) => Ok(Value::Bool(!inner.eval()?.is_truthy())),
            Expr::Negate(inner) => {
                let value = inner.eval()?;
                Ok(Value::Number(-numeric(&value, Op::Sub)?))
            }
            Expr::Binary(Op::And, left, right) => {
                Ok(Value::Bool(left.eval()?.is_truthy() && right.eval()?.is_truthy()))
            }
            Expr::Binary(Op::Or, left, right) => {
                Ok(Value::Bool(left.eval()?.is_truthy() || right.eval()?.is_truthy()))
            }
            Expr::Binary(op, left, right) => {
                let left = left.eval()?;
                let right = right.eval()?;
                apply_binary(*op, &left, &right)
            }
        }
    }
}

fn apply_binary(op: Op, left: &Value, right: &Value) -> Result<Value, String> {
    match op {
        Op::Add | Op::Sub | Op::Mul | Op::Div => {
            let a = numeric(left, op)?;
            let b = numeric(right, op)?;
            let result = match op {
                Op::Add => a + b,
                Op::Sub => a - b,
                Op::Mul => a * b,
                _ if b == 0.0 => return Err("division by zero".to_string()),
                _ => a / b,
            };
            Ok(Value::Number(result))
        }
        _ => {
            let ordering = compare(left, right);
            Ok(Value::Bool(match op {
                Op::Eq => ordering == Some(Ordering::Equal),
                Op::Ne => ordering != Some(Ordering::Equal),
                Op::Lt => ordering == Some(Ordering::Less),
                Op::Gt => ordering == Some(Ordering::Greater),
                Op::Le => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
                Op::Ge => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
                _ => unreachable!("logical operators are handled before comparison"),
            }))
        }
    }
}

fn numeric(value: &Value, op: Op) -> Result<f64, String> {
    value.as_number().ok_or_else(|| {
        format!(
            "unsupported operand '{}' for operator '{}'",
            value.to_text(),
            op.symbol()
        )
    })
}

/// Numeric comparison when both sides are numeric, string order otherwise
fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left.as_number(), right.as_number()) {
        (Some(a), Some(b)) => a.partial_cmp(&b),
        _ => Some(left.to_text().cmp(&right.to_text())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(text: &str) -> Result<Value, String> {
        Parser::new(tokenize(text)?).parse()?.eval()
    }

    #[test]
    fn test_arithmetic_precedence() {
        assert_eq!(eval("1 + 2 * 3"), Ok(Value::Number(7.0)));
        assert_eq!(eval("(1 + 2) * 3"), Ok(Value::Number(9.0)));
        assert_eq!(eval("10 - 4 - 3"), Ok(Value::Number(3.0)));
        assert_eq!(eval("3 * 3 * (100 + 30) / 100"), Ok(Value::Number(11.7)));
        assert_eq!(eval("-2 * 3"), Ok(Value::Number(-6.0)));
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(eval("5 == 5"), Ok(Value::Bool(true)));
        assert_eq!(eval("\"5\" == 5.0"), Ok(Value::Bool(true)));
        assert_eq!(eval("123 == \"abc\""), Ok(Value::Bool(false)));
        assert_eq!(eval("123 != 'abc'"), Ok(Value::Bool(true)));
        assert_eq!(eval("'apple' < 'banana'"), Ok(Value::Bool(true)));
        assert_eq!(eval("0.5 >= 1"), Ok(Value::Bool(false)));
        assert_eq!(eval("2 === 2"), Ok(Value::Bool(true)));
    }

    #[test]
    fn test_logical_precedence_and_short_circuit() {
        assert_eq!(eval("true || false && false"), Ok(Value::Bool(true)));
        assert_eq!(eval("!0"), Ok(Value::Bool(true)));
        assert_eq!(eval("1 + 1 == 2 && 3 > 2"), Ok(Value::Bool(true)));
        assert_eq!(eval("false && missing"), Ok(Value::Bool(false)));
        assert_eq!(eval("true || 1 / 0"), Ok(Value::Bool(true)));
    }

    #[test]
    fn test_string_literals() {
        assert_eq!(eval(r#""say \"hi\"""#), Ok(Value::from("say \"hi\"")));
        assert_eq!(eval("'it''s'").unwrap_err(), "unexpected literal 's'");
    }

    #[test]
    fn test_syntax_errors() {
        assert!(eval("1 +").is_err());
        assert!(eval("(1 + 2").is_err());
        assert!(eval("a = 1").is_err());
        assert!(eval("'open").is_err());
        assert!(eval("").is_err());
        assert_eq!(eval("undefinedThing").unwrap_err(), "undefined symbol 'undefinedThing'");
    }

    #[test]
    fn test_arithmetic_faults() {
        assert_eq!(eval("4 / 0").unwrap_err(), "division by zero");
        assert!(eval("'abc' * 2").is_err());
        assert_eq!(eval("'4' * 2"), Ok(Value::Number(8.0)));
    }

    #[test]
    fn test_tokenize_dotted_identifiers() {
        let tokens = tokenize("item.qty * loop.index0").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Ident("item.qty".to_string()),
                Token::Op(Op::Mul),
                Token::Ident("loop.index0".to_string()),
            ]
        );
    }
}
