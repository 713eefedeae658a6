use std::{iter::Peekable, str::CharIndices};

use super::error::{EvalError, EvalResult};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ExprToken<'a> {
    Integer(i64),
    Float(f64),
    Str(String),
    Identifier(&'a str),
    Plus,
    Minus,
    Star,
    StarStar,
    Slash,
    SlashSlash,
    Percent,
    LParen,
    RParen,
    Comma,
    // Opens a reference span in operand position, compares in infix position
    Less,
    // Closes the innermost span, compares elsewhere
    Greater,
    LessEqual,
    GreaterEqual,
    EqualEqual,
    NotEqual,
    EOF,
}

/// Token plus the byte offset it starts at.
pub(crate) type Spanned<'a> = (ExprToken<'a>, usize);

pub(crate) struct ExprLexer<'a> {
    input: &'a str,
    chars: Peekable<CharIndices<'a>>,
}

impl<'a> ExprLexer<'a> {
    pub(crate) fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.char_indices().peekable(),
        }
    }

    fn next_token(&mut self) -> EvalResult<Spanned<'a>> {
        while let Some(&(_, c)) = self.chars.peek() {
            if !c.is_whitespace() {
                break;
            }
            self.chars.next();
        }

        let Some((start, ch)) = self.chars.next() else {
            return Ok((ExprToken::EOF, self.input.len()));
        };

        let token = match ch {
            '+' => ExprToken::Plus,
            '-' => ExprToken::Minus,
            '*' => {
                if self.eat('*') {
                    ExprToken::StarStar
                } else {
                    ExprToken::Star
                }
            }
            '/' => {
                if self.eat('/') {
                    ExprToken::SlashSlash
                } else {
                    ExprToken::Slash
                }
            }
            '%' => ExprToken::Percent,
            '(' => ExprToken::LParen,
            ')' => ExprToken::RParen,
            ',' => ExprToken::Comma,
            '<' => {
                if self.eat('=') {
                    ExprToken::LessEqual
                } else {
                    ExprToken::Less
                }
            }
            '>' => {
                if self.eat('=') {
                    ExprToken::GreaterEqual
                } else {
                    ExprToken::Greater
                }
            }
            '=' => {
                if self.eat('=') {
                    ExprToken::EqualEqual
                } else {
                    return Err(EvalError::syntax("unexpected '='", start));
                }
            }
            '!' => {
                if self.eat('=') {
                    ExprToken::NotEqual
                } else {
                    return Err(EvalError::syntax("unexpected '!'", start));
                }
            }
            '"' | '\'' => self.read_string(ch, start)?,
            c if c.is_ascii_digit() => self.read_number(start)?,
            c if c.is_alphabetic() || c == '_' => self.read_identifier(start),
            other => {
                return Err(EvalError::syntax(
                    format!("unexpected character '{other}'"),
                    start,
                ));
            }
        };
        Ok((token, start))
    }

    fn eat(&mut self, expected: char) -> bool {
        if let Some(&(_, c)) = self.chars.peek()
            && c == expected
        {
            self.chars.next();
            return true;
        }
        false
    }

    fn read_string(&mut self, quote: char, start: usize) -> EvalResult<ExprToken<'a>> {
        let mut value = String::new();
        for (_, c) in self.chars.by_ref() {
            if c == quote {
                return Ok(ExprToken::Str(value));
            }
            value.push(c);
        }
        Err(EvalError::syntax("unterminated string literal", start))
    }

    fn read_number(&mut self, start: usize) -> EvalResult<ExprToken<'a>> {
        let mut end = start + 1;
        let mut is_float = false;
        while let Some(&(idx, c)) = self.chars.peek() {
            if c.is_ascii_digit() {
                self.chars.next();
                end = idx + 1;
            } else if c == '.' && !is_float && self.digit_follows(idx) {
                is_float = true;
                self.chars.next();
                end = idx + 1;
            } else {
                break;
            }
        }

        let text = &self.input[start..end];
        if is_float {
            text.parse::<f64>()
                .map(ExprToken::Float)
                .map_err(|_| EvalError::syntax(format!("invalid number '{text}'"), start))
        } else {
            text.parse::<i64>()
                .map(ExprToken::Integer)
                .map_err(|_| EvalError::syntax(format!("integer '{text}' is out of range"), start))
        }
    }

    fn digit_follows(&self, dot_idx: usize) -> bool {
        self.input[dot_idx + 1..]
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_digit())
    }

    fn read_identifier(&mut self, start: usize) -> ExprToken<'a> {
        let mut end = self.input.len();
        while let Some(&(idx, c)) = self.chars.peek() {
            if c.is_alphanumeric() || c == '_' {
                self.chars.next();
            } else {
                end = idx;
                break;
            }
        }
        ExprToken::Identifier(&self.input[start..end])
    }
}

pub(crate) fn tokenize(input: &str) -> EvalResult<Vec<Spanned<'_>>> {
    let mut lexer = ExprLexer::new(input);
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        let is_eof = matches!(token.0, ExprToken::EOF);
        tokens.push(token);
        if is_eof {
            break;
        }
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<ExprToken<'_>> {
        tokenize(input)
            .expect("tokenize should succeed")
            .into_iter()
            .map(|(token, _)| token)
            .collect()
    }

    #[test]
    fn tokenizes_spans_and_operators() {
        assert_eq!(
            kinds("<a> + <b> * 2"),
            vec![
                ExprToken::Less,
                ExprToken::Identifier("a"),
                ExprToken::Greater,
                ExprToken::Plus,
                ExprToken::Less,
                ExprToken::Identifier("b"),
                ExprToken::Greater,
                ExprToken::Star,
                ExprToken::Integer(2),
                ExprToken::EOF,
            ]
        );
    }

    #[test]
    fn pairs_comparison_operators() {
        assert_eq!(
            kinds("<x>>=5 != 'a'"),
            vec![
                ExprToken::Less,
                ExprToken::Identifier("x"),
                ExprToken::Greater,
                ExprToken::GreaterEqual,
                ExprToken::Integer(5),
                ExprToken::NotEqual,
                ExprToken::Str("a".to_string()),
                ExprToken::EOF,
            ]
        );
    }

    #[test]
    fn pairs_power_and_floor_division() {
        assert_eq!(
            kinds("2 ** 3 // max(1, 2)"),
            vec![
                ExprToken::Integer(2),
                ExprToken::StarStar,
                ExprToken::Integer(3),
                ExprToken::SlashSlash,
                ExprToken::Identifier("max"),
                ExprToken::LParen,
                ExprToken::Integer(1),
                ExprToken::Comma,
                ExprToken::Integer(2),
                ExprToken::RParen,
                ExprToken::EOF,
            ]
        );
    }

    #[test]
    fn reads_floats_only_with_fraction_digits() {
        assert_eq!(
            kinds("2.5 3"),
            vec![ExprToken::Float(2.5), ExprToken::Integer(3), ExprToken::EOF]
        );
        assert!(tokenize("3.").is_err());
    }

    #[test]
    fn rejects_lone_equals_and_unterminated_strings() {
        let err = tokenize("<a> = 1").expect_err("expected syntax error");
        assert_eq!(err, EvalError::syntax("unexpected '='", 4));
        assert!(tokenize("\"open").is_err());
    }
}
