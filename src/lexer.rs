use std::{iter::Peekable, str::CharIndices};

use crate::token::{Span, Token, TokenKind};

pub mod error;

pub use error::{LexError, LexResult};

/// Splits markup source into tag units.
///
/// Angle brackets inside a tag are balanced, so attribute values such as
/// `text="<counter_value>"` or `value=<input prompt="Name?">` stay part of the
/// enclosing tag. Double quotes suspend bracket counting until they close.
pub struct Lexer<'a> {
    input: &'a str,
    chars: Peekable<CharIndices<'a>>,
    at_line_start: bool,
    eof_reached: bool,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.char_indices().peekable(),
            at_line_start: true,
            eof_reached: false,
            line: 1,
            column: 1,
        }
    }

    pub fn next_token(&mut self) -> LexResult<Token<'a>> {
        loop {
            if self.eof_reached {
                return Ok(self.eof_token());
            }

            if self.at_line_start {
                self.skip_blanks();
                if self.at_comment() {
                    self.skip_line();
                    continue;
                }
                self.at_line_start = false;
            }

            let (start_idx, ch) = match self.chars.peek() {
                Some(&(idx, c)) => (idx, c),
                None => {
                    self.eof_reached = true;
                    return Ok(self.eof_token());
                }
            };

            let start_line = self.line;
            let start_column = self.column;
            match ch {
                '\n' => {
                    self.advance_char();
                    self.at_line_start = true;
                }
                c if c.is_whitespace() => {
                    self.advance_char();
                }
                '<' => return self.read_tag(start_idx, start_line, start_column),
                _ => return Ok(self.read_text(start_idx, start_line, start_column)),
            }
        }
    }

    fn skip_blanks(&mut self) {
        while let Some(&(_, c)) = self.chars.peek() {
            if c == ' ' || c == '\t' || c == '\r' {
                self.advance_char();
            } else {
                break;
            }
        }
    }

    fn at_comment(&self) -> bool {
        let mut temp_chars = self.chars.clone();
        match temp_chars.next() {
            Some((_, '#')) => true,
            Some((_, '/')) => matches!(temp_chars.next(), Some((_, '/'))),
            _ => false,
        }
    }

    fn skip_line(&mut self) {
        while let Some((_, c)) = self.advance_char() {
            if c == '\n' {
                break;
            }
        }
        self.at_line_start = true;
    }

    fn read_text(&mut self, start: usize, line: usize, column: usize) -> Token<'a> {
        while let Some(&(_, c)) = self.chars.peek() {
            if c == '<' || c == '\n' {
                break;
            }
            self.advance_char();
        }

        let end_idx = self.current_index();
        let text = self.input[start..end_idx].trim_end();
        Token::new(
            TokenKind::Text(text),
            Span {
                start,
                end: start + text.len(),
                line,
                column,
            },
        )
    }

    fn read_tag(&mut self, start: usize, line: usize, column: usize) -> LexResult<Token<'a>> {
        let span = Span {
            start,
            end: start + 1,
            line,
            column,
        };
        self.advance_char(); // Consume '<'

        if let Some(&(_, '/')) = self.chars.peek() {
            self.advance_char();
            return self.read_close_tag(start, span);
        }

        let body_start = start + 1;
        let mut depth = 1usize;
        let mut in_string = false;
        let body_end = loop {
            let Some((idx, c)) = self.advance_char() else {
                if in_string {
                    return Err(LexError::UnterminatedString { span });
                }
                return Err(LexError::UnterminatedTag { span });
            };
            match c {
                '"' => in_string = !in_string,
                '\n' if in_string => return Err(LexError::UnterminatedString { span }),
                '<' if !in_string => depth += 1,
                '>' if !in_string => {
                    depth -= 1;
                    if depth == 0 {
                        break idx;
                    }
                }
                _ => {}
            }
        };

        let body = self.input[body_start..body_end].trim();
        let span = Span {
            end: body_end + 1,
            ..span
        };
        if body.is_empty() {
            return Err(LexError::EmptyTag { span });
        }
        Ok(Token::new(TokenKind::Tag(body), span))
    }

    fn read_close_tag(&mut self, start: usize, span: Span) -> LexResult<Token<'a>> {
        let name_start = start + 2;
        let name_end = loop {
            match self.advance_char() {
                Some((idx, '>')) => break idx,
                Some((_, '\n')) | None => return Err(LexError::UnterminatedTag { span }),
                Some(_) => {}
            }
        };

        let name = self.input[name_start..name_end].trim();
        let span = Span {
            end: name_end + 1,
            ..span
        };
        if name.is_empty() {
            return Err(LexError::EmptyTag { span });
        }
        Ok(Token::new(TokenKind::CloseTag(name), span))
    }

    fn eof_token(&mut self) -> Token<'a> {
        let index = self.current_index();
        Token::new(
            TokenKind::EOF,
            Span {
                start: index,
                end: index,
                line: self.line,
                column: self.column,
            },
        )
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = LexResult<Token<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.eof_reached {
            return None;
        }
        Some(self.next_token())
    }
}

impl<'a> Lexer<'a> {
    fn advance_char(&mut self) -> Option<(usize, char)> {
        let next = self.chars.next();
        if let Some((_, c)) = next {
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        next
    }

    fn current_index(&mut self) -> usize {
        self.chars
            .peek()
            .map(|(idx, _)| *idx)
            .unwrap_or(self.input.len())
    }
}

pub fn tokenize<'a>(input: &'a str) -> LexResult<Vec<Token<'a>>> {
    let mut lexer = Lexer::new(input);
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        let is_eof = matches!(token.kind, TokenKind::EOF);
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
    use indoc::indoc;

    fn kinds(input: &str) -> Vec<TokenKind<'_>> {
        tokenize(input)
            .expect("tokenize should succeed")
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    #[test]
    fn splits_counter_program_into_tags() {
        let input = indoc! {r#"
            <var name="counter" value="0">
            <forever interval="100">
                <if event="<btn_plus_click>">
                    <counter += 1>
                    <lbl_text="<counter_value>">
                </if>
            </forever>
        "#};

        assert_eq!(
            kinds(input),
            vec![
                TokenKind::Tag(r#"var name="counter" value="0""#),
                TokenKind::Tag(r#"forever interval="100""#),
                TokenKind::Tag(r#"if event="<btn_plus_click>""#),
                TokenKind::Tag("counter += 1"),
                TokenKind::Tag(r#"lbl_text="<counter_value>""#),
                TokenKind::CloseTag("if"),
                TokenKind::CloseTag("forever"),
                TokenKind::EOF,
            ]
        );
    }

    #[test]
    fn keeps_unquoted_nested_spans_inside_the_tag() {
        assert_eq!(
            kinds(r#"<var name="who" value=<input prompt="Name?">>"#),
            vec![
                TokenKind::Tag(r#"var name="who" value=<input prompt="Name?">"#),
                TokenKind::EOF,
            ]
        );
        assert_eq!(
            kinds("<total_value = <a_value> * 2>"),
            vec![TokenKind::Tag("total_value = <a_value> * 2"), TokenKind::EOF]
        );
    }

    #[test]
    fn quoted_comparisons_do_not_close_the_tag() {
        assert_eq!(
            kinds(r#"<if condition="<x_value> > 5">"#),
            vec![
                TokenKind::Tag(r#"if condition="<x_value> > 5""#),
                TokenKind::EOF
            ]
        );
    }

    #[test]
    fn skips_comment_lines_and_reports_text() {
        let input = indoc! {r#"
            # a comment <ignored>
              // another <ignored too>
            stray words <noterminate>
        "#};
        assert_eq!(
            kinds(input),
            vec![
                TokenKind::Text("stray words"),
                TokenKind::Tag("noterminate"),
                TokenKind::EOF,
            ]
        );
    }

    #[test]
    fn records_line_and_column_of_tags() {
        let tokens = tokenize("<gui>\n  <wnd_show>\n</gui>").expect("tokenize should succeed");
        assert_eq!(tokens[1].span.line, 2);
        assert_eq!(tokens[1].span.column, 3);
        assert_eq!(tokens[2].span.line, 3);
    }

    #[test]
    fn errors_on_unterminated_tag() {
        let err = tokenize("<var name=\"x\"\n").expect_err("expected lexing failure");
        assert!(matches!(err, LexError::UnterminatedTag { .. }));
        assert!(err.to_string().contains("line 1, column 1"));
    }

    #[test]
    fn errors_on_unterminated_string() {
        let err = tokenize("<lbl_text=\"open\n>").expect_err("expected lexing failure");
        assert!(matches!(err, LexError::UnterminatedString { .. }));
    }

    #[test]
    fn errors_on_empty_tag() {
        let err = tokenize("<   >").expect_err("expected lexing failure");
        assert!(matches!(err, LexError::EmptyTag { .. }));
    }
}
