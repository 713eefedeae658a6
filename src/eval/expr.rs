use crate::value::{Comparison, Value};

use super::error::{EvalError, EvalResult};
use super::function::Function;
use super::lexer::{ExprToken, Spanned, tokenize};
use super::{Reference, Resolver};

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Reference(Reference),
    Unary {
        op: UnaryOperator,
        operand: Box<Expr>,
    },
    Binary {
        left: Box<Expr>,
        op: BinaryOperator,
        right: Box<Expr>,
    },
    Logical {
        left: Box<Expr>,
        op: LogicalOperator,
        right: Box<Expr>,
    },
    Call {
        function: Function,
        args: Vec<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Negate,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Rem,
    Pow,
    Compare(Comparison),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOperator {
    And,
    Or,
}

impl Expr {
    /// Parses a complete expression, resolving every reference span.
    pub fn parse(source: &str, resolver: &dyn Resolver) -> EvalResult<Expr> {
        let tokens = tokenize(source)?;
        let mut parser = ExprParser::new(tokens, resolver);
        let expr = parser.parse_expression()?;
        parser.expect_eof()?;
        Ok(expr)
    }
}

// Precedence, lowest first: or, and, not, comparison, additive,
// multiplicative, unary minus, power (right associative), primary.
struct ExprParser<'r, 'a> {
    tokens: Vec<Spanned<'a>>,
    position: usize,
    resolver: &'r dyn Resolver,
    span_depth: usize,
    // True directly inside a `<...>` span, where `>` ends the span
    closes_span: bool,
}

impl<'r, 'a> ExprParser<'r, 'a> {
    fn new(tokens: Vec<Spanned<'a>>, resolver: &'r dyn Resolver) -> Self {
        Self {
            tokens,
            position: 0,
            resolver,
            span_depth: 0,
            closes_span: false,
        }
    }

    fn parse_expression(&mut self) -> EvalResult<Expr> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> EvalResult<Expr> {
        let mut expr = self.parse_and()?;
        while self.at_keyword("or") {
            self.advance();
            let right = self.parse_and()?;
            expr = logical(expr, LogicalOperator::Or, right);
        }
        Ok(expr)
    }

    fn parse_and(&mut self) -> EvalResult<Expr> {
        let mut expr = self.parse_not()?;
        while self.at_keyword("and") {
            self.advance();
            let right = self.parse_not()?;
            expr = logical(expr, LogicalOperator::And, right);
        }
        Ok(expr)
    }

    fn parse_not(&mut self) -> EvalResult<Expr> {
        if self.at_keyword("not") {
            self.advance();
            let operand = self.parse_not()?;
            return Ok(Expr::Unary {
                op: UnaryOperator::Not,
                operand: Box::new(operand),
            });
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> EvalResult<Expr> {
        let mut expr = self.parse_additive()?;
        loop {
            let comparison = match self.current() {
                ExprToken::EqualEqual => Comparison::Equal,
                ExprToken::NotEqual => Comparison::NotEqual,
                ExprToken::Less => Comparison::Less,
                ExprToken::LessEqual => Comparison::LessEqual,
                ExprToken::GreaterEqual => Comparison::GreaterEqual,
                ExprToken::Greater if !self.closes_span => Comparison::Greater,
                _ => break,
            };
            self.advance();
            let right = self.parse_additive()?;
            expr = binary(expr, BinaryOperator::Compare(comparison), right);
        }
        Ok(expr)
    }

    fn parse_additive(&mut self) -> EvalResult<Expr> {
        let mut expr = self.parse_multiplicative()?;
        loop {
            let op = match self.current() {
                ExprToken::Plus => BinaryOperator::Add,
                ExprToken::Minus => BinaryOperator::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            expr = binary(expr, op, right);
        }
        Ok(expr)
    }

    fn parse_multiplicative(&mut self) -> EvalResult<Expr> {
        let mut expr = self.parse_unary()?;
        loop {
            let op = match self.current() {
                ExprToken::Star => BinaryOperator::Mul,
                ExprToken::Slash => BinaryOperator::Div,
                ExprToken::SlashSlash => BinaryOperator::FloorDiv,
                ExprToken::Percent => BinaryOperator::Rem,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            expr = binary(expr, op, right);
        }
        Ok(expr)
    }

    fn parse_unary(&mut self) -> EvalResult<Expr> {
        if matches!(self.current(), ExprToken::Minus) {
            self.advance();
            let operand = self.parse_unary()?;
            return Ok(Expr::Unary {
                op: UnaryOperator::Negate,
                operand: Box::new(operand),
            });
        }
        self.parse_power()
    }

    // `-2 ** 2` is `-(2 ** 2)`, while `2 ** -1` takes a negative exponent.
    fn parse_power(&mut self) -> EvalResult<Expr> {
        let base = self.parse_primary()?;
        if !matches!(self.current(), ExprToken::StarStar) {
            return Ok(base);
        }
        self.advance();
        let exponent = self.parse_unary()?;
        Ok(binary(base, BinaryOperator::Pow, exponent))
    }

    fn parse_primary(&mut self) -> EvalResult<Expr> {
        let offset = self.offset();
        match self.current().clone() {
            ExprToken::Integer(value) => {
                self.advance();
                Ok(Expr::Literal(Value::Integer(value)))
            }
            ExprToken::Float(value) => {
                self.advance();
                Ok(Expr::Literal(Value::Float(value)))
            }
            ExprToken::Str(value) => {
                self.advance();
                Ok(Expr::Literal(Value::String(value)))
            }
            ExprToken::Identifier("true") => {
                self.advance();
                Ok(Expr::Literal(Value::Boolean(true)))
            }
            ExprToken::Identifier("false") => {
                self.advance();
                Ok(Expr::Literal(Value::Boolean(false)))
            }
            ExprToken::Identifier(name @ ("and" | "or" | "not")) => Err(EvalError::syntax(
                format!("expected operand, found '{name}'"),
                offset,
            )),
            ExprToken::Identifier(name) if matches!(self.peek(), ExprToken::LParen) => {
                self.parse_call(name, offset)
            }
            ExprToken::Identifier(name) => {
                if self.span_depth == 0 {
                    return Err(EvalError::syntax(
                        format!("bare word '{name}' outside a <...> reference"),
                        offset,
                    ));
                }
                self.advance();
                self.resolver
                    .resolve(name)
                    .map(Expr::Reference)
                    .ok_or_else(|| EvalError::UnresolvedReference {
                        name: name.to_string(),
                    })
            }
            ExprToken::LParen => {
                self.advance();
                let closes_span = std::mem::replace(&mut self.closes_span, false);
                let expr = self.parse_expression()?;
                self.closes_span = closes_span;
                self.expect(ExprToken::RParen, "')'")?;
                Ok(expr)
            }
            ExprToken::Less => {
                self.advance();
                let closes_span = std::mem::replace(&mut self.closes_span, true);
                self.span_depth += 1;
                let expr = self.parse_expression()?;
                self.span_depth -= 1;
                self.closes_span = closes_span;
                self.expect(ExprToken::Greater, "'>' closing the reference")?;
                Ok(expr)
            }
            other => Err(EvalError::syntax(
                format!("expected operand, found {}", describe(&other)),
                offset,
            )),
        }
    }

    fn parse_call(&mut self, name: &str, offset: usize) -> EvalResult<Expr> {
        let Some(function) = Function::from_name(name) else {
            return Err(EvalError::syntax(format!("unknown function '{name}'"), offset));
        };
        self.advance();
        self.expect(ExprToken::LParen, "'('")?;
        let closes_span = std::mem::replace(&mut self.closes_span, false);
        let mut args = Vec::new();
        if !matches!(self.current(), ExprToken::RParen) {
            loop {
                args.push(self.parse_expression()?);
                if !matches!(self.current(), ExprToken::Comma) {
                    break;
                }
                self.advance();
            }
        }
        self.closes_span = closes_span;
        self.expect(ExprToken::RParen, "')'")?;

        let arity = function.arity();
        if !arity.accepts(args.len()) {
            return Err(EvalError::Arity {
                function: function.name(),
                expected: arity,
                found: args.len(),
            });
        }
        Ok(Expr::Call { function, args })
    }

    fn expect(&mut self, expected: ExprToken<'a>, label: &str) -> EvalResult<()> {
        if *self.current() == expected {
            self.advance();
            Ok(())
        } else {
            Err(EvalError::syntax(
                format!("expected {label}, found {}", describe(self.current())),
                self.offset(),
            ))
        }
    }

    fn expect_eof(&self) -> EvalResult<()> {
        if matches!(self.current(), ExprToken::EOF) {
            Ok(())
        } else {
            Err(EvalError::syntax(
                format!("unexpected {}", describe(self.current())),
                self.offset(),
            ))
        }
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        matches!(self.current(), ExprToken::Identifier(name) if *name == keyword)
    }

    fn current(&self) -> &ExprToken<'a> {
        self.tokens
            .get(self.position)
            .map(|(token, _)| token)
            .unwrap_or(&ExprToken::EOF)
    }

    fn peek(&self) -> &ExprToken<'a> {
        self.tokens
            .get(self.position + 1)
            .map(|(token, _)| token)
            .unwrap_or(&ExprToken::EOF)
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.position)
            .or_else(|| self.tokens.last())
            .map(|(_, offset)| *offset)
            .unwrap_or(0)
    }

    fn advance(&mut self) {
        if self.position < self.tokens.len() {
            self.position += 1;
        }
    }
}

fn binary(left: Expr, op: BinaryOperator, right: Expr) -> Expr {
    Expr::Binary {
        left: Box::new(left),
        op,
        right: Box::new(right),
    }
}

fn logical(left: Expr, op: LogicalOperator, right: Expr) -> Expr {
    Expr::Logical {
        left: Box::new(left),
        op,
        right: Box::new(right),
    }
}

fn describe(token: &ExprToken<'_>) -> String {
    match token {
        ExprToken::Integer(value) => value.to_string(),
        ExprToken::Float(value) => value.to_string(),
        ExprToken::Str(value) => format!("'{value}'"),
        ExprToken::Identifier(name) => format!("'{name}'"),
        ExprToken::Plus => "'+'".to_string(),
        ExprToken::Minus => "'-'".to_string(),
        ExprToken::Star => "'*'".to_string(),
        ExprToken::StarStar => "'**'".to_string(),
        ExprToken::Slash => "'/'".to_string(),
        ExprToken::SlashSlash => "'//'".to_string(),
        ExprToken::Comma => "','".to_string(),
        ExprToken::Percent => "'%'".to_string(),
        ExprToken::LParen => "'('".to_string(),
        ExprToken::RParen => "')'".to_string(),
        ExprToken::Less => "'<'".to_string(),
        ExprToken::Greater => "'>'".to_string(),
        ExprToken::LessEqual => "'<='".to_string(),
        ExprToken::GreaterEqual => "'>='".to_string(),
        ExprToken::EqualEqual => "'=='".to_string(),
        ExprToken::NotEqual => "'!='".to_string(),
        ExprToken::EOF => "end of expression".to_string(),
    }
}
