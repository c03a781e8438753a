//! Tokenizer and recursive-descent evaluator for `+ - * /` expressions over numeric literals.
//!
//! Grammar:
//! ```text
//! expression := term (('+' | '-') term)*
//! term       := factor (('*' | '/') factor)*
//! factor     := '-' factor | '(' expression ')' | NUMBER
//! ```
//! Division by zero yields NaN.

use crate::value::EvalError;

#[derive(Clone, Debug, PartialEq)]
enum Token {
    Num(f64),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Num(n) => n.to_string(),
            Token::Plus => "+".into(),
            Token::Minus => "-".into(),
            Token::Star => "*".into(),
            Token::Slash => "/".into(),
            Token::LParen => "(".into(),
            Token::RParen => ")".into(),
        }
    }
}

fn tokenize(expr: &str) -> Result<Vec<Token>, EvalError> {
    let mut tokens = Vec::new();
    let mut chars = expr.char_indices().peekable();
    while let Some((start, ch)) = chars.next() {
        let token = match ch {
            c if c.is_whitespace() => continue,
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Star,
            '/' => Token::Slash,
            '(' => Token::LParen,
            ')' => Token::RParen,
            c if c.is_ascii_digit() || c == '.' => {
                let mut end = start + 1;
                while let Some(&(i, c)) = chars.peek() {
                    if !(c.is_ascii_digit() || c == '.') {
                        break;
                    }
                    end = i + 1;
                    chars.next();
                }
                let literal = &expr[start..end];
                let n = literal
                    .parse::<f64>()
                    .map_err(|_| EvalError::InvalidNumber(literal.to_string()))?;
                Token::Num(n)
            }
            other => return Err(EvalError::UnexpectedChar(other)),
        };
        tokens.push(token);
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn expression(&mut self) -> Result<f64, EvalError> {
        let mut left = self.term()?;
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.pos += 1;
                    left += self.term()?;
                }
                Some(Token::Minus) => {
                    self.pos += 1;
                    left -= self.term()?;
                }
                _ => return Ok(left),
            }
        }
    }

    fn term(&mut self) -> Result<f64, EvalError> {
        let mut left = self.factor()?;
        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.pos += 1;
                    left *= self.factor()?;
                }
                Some(Token::Slash) => {
                    self.pos += 1;
                    let right = self.factor()?;
                    left = if right == 0.0 { f64::NAN } else { left / right };
                }
                _ => return Ok(left),
            }
        }
    }

    fn factor(&mut self) -> Result<f64, EvalError> {
        match self.next() {
            Some(Token::Minus) => Ok(-self.factor()?),
            Some(Token::Plus) => self.factor(),
            Some(Token::LParen) => {
                let value = self.expression()?;
                match self.next() {
                    Some(Token::RParen) => Ok(value),
                    Some(other) => Err(EvalError::UnexpectedToken(other.describe())),
                    None => Err(EvalError::UnexpectedEnd),
                }
            }
            Some(Token::Num(n)) => Ok(n),
            Some(other) => Err(EvalError::UnexpectedToken(other.describe())),
            None => Err(EvalError::UnexpectedEnd),
        }
    }
}

/// Evaluate an arithmetic expression that contains only numbers, operators and parentheses.
pub fn evaluate_arithmetic(expr: &str) -> Result<f64, EvalError> {
    let mut parser = Parser {
        tokens: tokenize(expr)?,
        pos: 0,
    };
    let value = parser.expression()?;
    match parser.peek() {
        None => Ok(value),
        Some(token) => Err(EvalError::UnexpectedToken(token.describe())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precedence_and_grouping() {
        assert_eq!(evaluate_arithmetic("1 + 2 * 3"), Ok(7.0));
        assert_eq!(evaluate_arithmetic("(1 + 2) * 3"), Ok(9.0));
        assert_eq!(evaluate_arithmetic("10 - 4 - 3"), Ok(3.0));
        assert_eq!(evaluate_arithmetic("8 / 4 / 2"), Ok(1.0));
        assert_eq!(evaluate_arithmetic("-(2 + 3) * -2"), Ok(10.0));
        assert_eq!(evaluate_arithmetic("2 * (-3)"), Ok(-6.0));
        assert_eq!(evaluate_arithmetic(".5 + 1.25"), Ok(1.75));
    }

    #[test]
    fn division_by_zero_is_nan() {
        assert!(evaluate_arithmetic("1/0").unwrap().is_nan());
        assert!(evaluate_arithmetic("1/(2-2) + 5").unwrap().is_nan());
    }

    #[test]
    fn malformed_expressions_are_errors() {
        assert_eq!(evaluate_arithmetic("1 +"), Err(EvalError::UnexpectedEnd));
        assert_eq!(evaluate_arithmetic("(1 + 2"), Err(EvalError::UnexpectedEnd));
        assert_eq!(
            evaluate_arithmetic("1 2"),
            Err(EvalError::UnexpectedToken("2".into()))
        );
        assert_eq!(evaluate_arithmetic("1 & 2"), Err(EvalError::UnexpectedChar('&')));
        assert_eq!(
            evaluate_arithmetic("1.2.3"),
            Err(EvalError::InvalidNumber("1.2.3".into()))
        );
        assert_eq!(evaluate_arithmetic(""), Err(EvalError::UnexpectedEnd));
    }
}
