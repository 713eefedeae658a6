use std::{iter::Peekable, str::CharIndices};

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AttrError {
    #[error("expected a tag name in '<{body}>'")]
    MissingTagName { body: String },
    #[error("unexpected '{operand}' after '{head}{symbol}'")]
    TrailingOperand {
        head: String,
        symbol: &'static str,
        operand: String,
    },
    #[error("missing value after '{head} {symbol}'")]
    MissingOperand { head: String, symbol: &'static str },
    #[error("unexpected '{found}' in attributes")]
    UnexpectedChar { found: char },
    #[error("missing value for attribute '{name}'")]
    MissingValue { name: String },
    #[error("unterminated attribute string")]
    UnterminatedString,
    #[error("unclosed '<' in '{text}'")]
    UnclosedSpan { text: String },
}

pub type AttrResult<T> = Result<T, AttrError>;

/// Tag body split into its head and what follows it.
#[derive(Debug, Clone, PartialEq)]
pub struct ScannedTag<'a> {
    pub head: &'a str,
    pub form: TagForm,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TagForm {
    /// `head attr="v" "positional" <span>`
    Plain(Attributes),
    /// `head = v`, `head += v`, `head++`, ...
    Operator {
        symbol: &'static str,
        value: Option<AttrValue>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    /// `"text"` with the quotes removed
    Text(String),
    /// `"300","350"`
    Stack(Vec<String>),
    /// Unquoted `<...>`, brackets included
    Span(String),
    /// Anything else up to the next blank, or the rest of an operator tag
    Bare(String),
}

impl AttrValue {
    /// The text handed to the expression parser.
    pub fn source(&self) -> String {
        match self {
            AttrValue::Text(text) | AttrValue::Span(text) | AttrValue::Bare(text) => text.clone(),
            AttrValue::Stack(items) => items.join(","),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attr {
    pub name: Option<String>,
    pub value: AttrValue,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes {
    entries: Vec<Attr>,
}

impl Attributes {
    pub const EMPTY: Attributes = Attributes {
        entries: Vec::new(),
    };

    pub fn get(&self, name: &str) -> Option<&AttrValue> {
        self.entries
            .iter()
            .find(|attr| attr.name.as_deref() == Some(name))
            .map(|attr| &attr.value)
    }

    pub fn named(&self) -> impl Iterator<Item = (&str, &AttrValue)> {
        self.entries
            .iter()
            .filter_map(|attr| attr.name.as_deref().map(|name| (name, &attr.value)))
    }

    pub fn positional(&self) -> impl Iterator<Item = &AttrValue> {
        self.entries
            .iter()
            .filter(|attr| attr.name.is_none())
            .map(|attr| &attr.value)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// Longest symbols first.
const OPERATORS: [&str; 10] = ["**=", "//=", "++", "--", "+=", "-=", "*=", "/=", "%=", "="];

pub fn scan_tag(body: &str) -> AttrResult<ScannedTag<'_>> {
    let head_end = body
        .char_indices()
        .find(|&(_, c)| !(c.is_alphanumeric() || c == '_'))
        .map(|(idx, _)| idx)
        .unwrap_or(body.len());
    let head = &body[..head_end];
    if !head.starts_with(|c: char| c.is_alphabetic() || c == '_') {
        return Err(AttrError::MissingTagName {
            body: body.to_string(),
        });
    }

    let rest = body[head_end..].trim_start();
    if let Some(symbol) = OPERATORS.iter().find(|op| rest.starts_with(**op)).copied()
        && !rest.starts_with("==")
    {
        let operand = rest[symbol.len()..].trim();
        let value = if symbol == "++" || symbol == "--" {
            if !operand.is_empty() {
                return Err(AttrError::TrailingOperand {
                    head: head.to_string(),
                    symbol,
                    operand: operand.to_string(),
                });
            }
            None
        } else {
            if operand.is_empty() {
                return Err(AttrError::MissingOperand {
                    head: head.to_string(),
                    symbol,
                });
            }
            Some(operator_value(operand)?)
        };
        return Ok(ScannedTag {
            head,
            form: TagForm::Operator { symbol, value },
        });
    }

    let mut scanner = AttrScanner::new(rest);
    let attributes = scanner.scan()?;
    Ok(ScannedTag {
        head,
        form: TagForm::Plain(attributes),
    })
}

// A whole quoted (or stacked) operand keeps its literal text; anything else
// is passed on raw.
fn operator_value(operand: &str) -> AttrResult<AttrValue> {
    if operand.starts_with('"') {
        let mut scanner = AttrScanner::new(operand);
        if let Some(value) = scanner.read_quoted_value()?
            && scanner.at_end()
        {
            return Ok(value);
        }
    }
    Ok(AttrValue::Bare(operand.to_string()))
}

struct AttrScanner<'a> {
    input: &'a str,
    chars: Peekable<CharIndices<'a>>,
}

impl<'a> AttrScanner<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.char_indices().peekable(),
        }
    }

    fn scan(&mut self) -> AttrResult<Attributes> {
        let mut entries = Vec::new();
        loop {
            self.skip_whitespace();
            let Some(&(start, ch)) = self.chars.peek() else {
                break;
            };

            if ch == '"' {
                if let Some(value) = self.read_quoted_value()? {
                    entries.push(Attr { name: None, value });
                }
                continue;
            }
            if ch == '<' {
                let value = self.read_span(start)?;
                entries.push(Attr { name: None, value });
                continue;
            }
            if !(ch.is_alphanumeric() || ch == '_') {
                return Err(AttrError::UnexpectedChar { found: ch });
            }

            let name = self.read_word(start);
            self.skip_whitespace();
            if let Some(&(_, '=')) = self.chars.peek() {
                self.chars.next();
                self.skip_whitespace();
                let value = self.read_value(name)?;
                entries.push(Attr {
                    name: Some(name.to_string()),
                    value,
                });
            } else {
                entries.push(Attr {
                    name: None,
                    value: AttrValue::Bare(name.to_string()),
                });
            }
        }
        Ok(Attributes { entries })
    }

    fn read_value(&mut self, name: &str) -> AttrResult<AttrValue> {
        let missing = || AttrError::MissingValue {
            name: name.to_string(),
        };
        match self.chars.peek() {
            Some(&(_, '"')) => self.read_quoted_value()?.ok_or_else(missing),
            Some(&(start, '<')) => self.read_span(start),
            Some(&(start, _)) => {
                let mut end = self.input.len();
                while let Some(&(idx, c)) = self.chars.peek() {
                    if c.is_whitespace() {
                        end = idx;
                        break;
                    }
                    self.chars.next();
                }
                Ok(AttrValue::Bare(self.input[start..end].to_string()))
            }
            None => Err(missing()),
        }
    }

    // One quoted string, or a comma separated stack of them.
    fn read_quoted_value(&mut self) -> AttrResult<Option<AttrValue>> {
        let mut items = Vec::new();
        while let Some(&(_, '"')) = self.chars.peek() {
            items.push(self.read_quoted()?);
            let mut lookahead = self.chars.clone();
            if let Some((_, ',')) = lookahead.next() {
                while let Some(&(_, c)) = lookahead.peek() {
                    if c == ' ' || c == '\t' {
                        lookahead.next();
                    } else {
                        break;
                    }
                }
                if let Some(&(_, '"')) = lookahead.peek() {
                    self.chars = lookahead;
                    continue;
                }
            }
            break;
        }

        Ok(match items.len() {
            0 => None,
            1 => items.pop().map(AttrValue::Text),
            _ => Some(AttrValue::Stack(items)),
        })
    }

    fn read_quoted(&mut self) -> AttrResult<String> {
        let Some((start, _)) = self.chars.next() else {
            return Err(AttrError::UnterminatedString);
        };
        for (idx, c) in self.chars.by_ref() {
            if c == '"' {
                return Ok(self.input[start + 1..idx].to_string());
            }
        }
        Err(AttrError::UnterminatedString)
    }

    fn read_span(&mut self, start: usize) -> AttrResult<AttrValue> {
        let mut depth = 0usize;
        let mut in_string = false;
        for (idx, c) in self.chars.by_ref() {
            match c {
                '"' => in_string = !in_string,
                '<' if !in_string => depth += 1,
                '>' if !in_string => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return Ok(AttrValue::Span(self.input[start..=idx].to_string()));
                    }
                }
                _ => {}
            }
        }
        Err(AttrError::UnclosedSpan {
            text: self.input[start..].to_string(),
        })
    }

    fn read_word(&mut self, start: usize) -> &'a str {
        let mut end = self.input.len();
        while let Some(&(idx, c)) = self.chars.peek() {
            if c.is_alphanumeric() || c == '_' || c == '-' {
                self.chars.next();
            } else {
                end = idx;
                break;
            }
        }
        &self.input[start..end]
    }

    fn skip_whitespace(&mut self) {
        while let Some(&(_, c)) = self.chars.peek() {
            if !c.is_whitespace() {
                break;
            }
            self.chars.next();
        }
    }

    fn at_end(&mut self) -> bool {
        self.skip_whitespace();
        self.chars.peek().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(body: &str) -> (String, Attributes) {
        let scanned = scan_tag(body).expect("scan should succeed");
        match scanned.form {
            TagForm::Plain(attributes) => (scanned.head.to_string(), attributes),
            other => panic!("expected plain form, got {other:?}"),
        }
    }

    #[test]
    fn scans_named_attributes() {
        let (head, attrs) = plain(r#"var name="counter" value="0""#);
        assert_eq!(head, "var");
        assert_eq!(attrs.get("name"), Some(&AttrValue::Text("counter".to_string())));
        assert_eq!(attrs.get("value"), Some(&AttrValue::Text("0".to_string())));
    }

    #[test]
    fn scans_stacks_spans_and_positionals() {
        let (_, attrs) = plain(r#"window title=<title_value> size="300", "350" name="wnd1""#);
        assert_eq!(
            attrs.get("title"),
            Some(&AttrValue::Span("<title_value>".to_string()))
        );
        assert_eq!(
            attrs.get("size"),
            Some(&AttrValue::Stack(vec!["300".to_string(), "350".to_string()]))
        );

        let (_, attrs) = plain(r#"input "Your name?" var="who""#);
        let positional: Vec<_> = attrs.positional().collect();
        assert_eq!(positional, vec![&AttrValue::Text("Your name?".to_string())]);
        assert_eq!(attrs.get("var"), Some(&AttrValue::Text("who".to_string())));
    }

    #[test]
    fn keeps_nested_spans_with_quotes() {
        let (_, attrs) = plain(r#"var name="who" value=<input prompt="Who > you?">"#);
        assert_eq!(
            attrs.get("value"),
            Some(&AttrValue::Span(r#"<input prompt="Who > you?">"#.to_string()))
        );
    }

    #[test]
    fn scans_operator_forms() {
        assert_eq!(
            scan_tag("counter += 1"),
            Ok(ScannedTag {
                head: "counter",
                form: TagForm::Operator {
                    symbol: "+=",
                    value: Some(AttrValue::Bare("1".to_string()))
                }
            })
        );
        assert_eq!(
            scan_tag(r#"lbl_text="Count: <counter_value>""#),
            Ok(ScannedTag {
                head: "lbl_text",
                form: TagForm::Operator {
                    symbol: "=",
                    value: Some(AttrValue::Text("Count: <counter_value>".to_string()))
                }
            })
        );
        assert_eq!(
            scan_tag("x_value--"),
            Ok(ScannedTag {
                head: "x_value",
                form: TagForm::Operator {
                    symbol: "--",
                    value: None
                }
            })
        );
        assert_eq!(
            scan_tag(r#"wnd_size="400","500""#).map(|tag| tag.form),
            Ok(TagForm::Operator {
                symbol: "=",
                value: Some(AttrValue::Stack(vec!["400".to_string(), "500".to_string()]))
            })
        );
    }

    #[test]
    fn operator_with_expression_stays_raw() {
        assert_eq!(
            scan_tag(r#"total = "a" + <b_value>"#).map(|tag| tag.form),
            Ok(TagForm::Operator {
                symbol: "=",
                value: Some(AttrValue::Bare(r#""a" + <b_value>"#.to_string()))
            })
        );
    }

    #[test]
    fn scans_compound_operators_longest_first() {
        for (body, wanted) in [
            ("x_value %= 2", "%="),
            ("x_value //= 2", "//="),
            ("x_value **= 2", "**="),
            ("x_value *= 2", "*="),
        ] {
            let scanned = scan_tag(body).expect("operator form");
            assert!(
                matches!(scanned.form, TagForm::Operator { symbol, .. } if symbol == wanted),
                "{body} should scan as {wanted}"
            );
        }
    }

    #[test]
    fn rejects_malformed_bodies() {
        assert_eq!(
            scan_tag("= 5"),
            Err(AttrError::MissingTagName {
                body: "= 5".to_string()
            })
        );
        assert_eq!(
            scan_tag("counter++ 1"),
            Err(AttrError::TrailingOperand {
                head: "counter".to_string(),
                symbol: "++",
                operand: "1".to_string()
            })
        );
        assert_eq!(
            scan_tag("counter +="),
            Err(AttrError::MissingOperand {
                head: "counter".to_string(),
                symbol: "+="
            })
        );
        assert_eq!(
            scan_tag(r#"var name="x" !"#),
            Err(AttrError::UnexpectedChar { found: '!' })
        );
        assert_eq!(
            scan_tag(r#"var name="x"#),
            Err(AttrError::UnterminatedString)
        );
        assert!(matches!(
            scan_tag("var value=<x_value"),
            Err(AttrError::UnclosedSpan { .. })
        ));
    }
}
