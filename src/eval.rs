use rustc_hash::FxHashMap;

use crate::value::Value;

pub mod error;
pub mod expr;
pub mod function;
mod lexer;

pub use error::{EvalError, EvalResult};
pub use expr::{BinaryOperator, Expr, LogicalOperator, UnaryOperator};
pub use function::{Arity, Function};

use lexer::ExprToken;

/// A `<...>` reference resolved against the load-time namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    Variable(String),
    Property { widget: String, property: String },
    Random { generator: String, kind: RandomKind },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RandomKind {
    Integer,
    Float,
}

/// Maps the identifier written inside a `<...>` span to what it names.
pub trait Resolver {
    fn resolve(&self, name: &str) -> Option<Reference>;
}

/// Supplies current values for resolved references.
pub trait Scope {
    fn lookup(&mut self, reference: &Reference) -> EvalResult<Value>;
}

/// Matches `name` or `name_value` against a variable namespace.
pub fn variable_name<'n>(name: &'n str, is_variable: impl Fn(&str) -> bool) -> Option<&'n str> {
    if is_variable(name) {
        return Some(name);
    }
    name.strip_suffix("_value").filter(|base| is_variable(base))
}

/// Attribute value parsed at load time.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueExpr {
    /// The whole text is one expression; keeps the result's type.
    Expr(Expr),
    /// Literal text with interpolated spans; always yields a string.
    Template(Vec<Segment>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Text(String),
    Expr(Expr),
}

impl ValueExpr {
    pub fn literal(value: impl Into<Value>) -> Self {
        ValueExpr::Expr(Expr::Literal(value.into()))
    }

    /// Parses attribute text as an expression, falling back to a template
    /// when the text is not a well-formed expression. Unresolved references
    /// are reported either way, and so are syntax errors in text that reads
    /// as arithmetic.
    pub fn parse(text: &str, resolver: &dyn Resolver) -> EvalResult<Self> {
        match Expr::parse(text, resolver) {
            Ok(expr) => Ok(ValueExpr::Expr(expr)),
            Err(error @ EvalError::Syntax { .. }) if reads_as_arithmetic(text) => Err(error),
            Err(EvalError::Syntax { .. }) => {
                parse_template(text, resolver).map(ValueExpr::Template)
            }
            Err(other) => Err(other),
        }
    }

    pub fn evaluate(&self, scope: &mut dyn Scope) -> EvalResult<Value> {
        match self {
            ValueExpr::Expr(expr) => expr.evaluate(scope),
            ValueExpr::Template(segments) => {
                let mut text = String::new();
                for segment in segments {
                    match segment {
                        Segment::Text(literal) => text.push_str(literal),
                        Segment::Expr(expr) => text.push_str(&expr.evaluate(scope)?.to_output()),
                    }
                }
                Ok(Value::String(text))
            }
        }
    }

    /// The literal text of a template without spans, or the literal value of
    /// a constant expression.
    pub fn as_constant(&self) -> Option<Value> {
        match self {
            ValueExpr::Expr(Expr::Literal(value)) => Some(value.clone()),
            ValueExpr::Template(segments) => match segments.as_slice() {
                [] => Some(Value::String(String::new())),
                [Segment::Text(text)] => Some(Value::String(text.clone())),
                _ => None,
            },
            ValueExpr::Expr(_) => None,
        }
    }
}

// Numbers, references and calls joined by at least one arithmetic operator,
// with no two operands side by side.
fn reads_as_arithmetic(text: &str) -> bool {
    let Ok(tokens) = lexer::tokenize(text) else {
        return false;
    };
    let mut operands = 0usize;
    let mut has_operator = false;
    let mut previous: Option<&ExprToken<'_>> = None;
    for (token, _) in &tokens {
        let starts_operand = match token {
            ExprToken::Integer(_) | ExprToken::Float(_) => {
                operands += 1;
                true
            }
            ExprToken::Identifier(name) => {
                let is_reference = matches!(previous, Some(ExprToken::Less));
                if !is_reference && Function::from_name(name).is_none() {
                    return false;
                }
                operands += 1;
                true
            }
            ExprToken::Str(_) => return false,
            ExprToken::LParen | ExprToken::Less => true,
            ExprToken::Plus
            | ExprToken::Minus
            | ExprToken::Star
            | ExprToken::StarStar
            | ExprToken::Slash
            | ExprToken::SlashSlash
            | ExprToken::Percent => {
                has_operator = true;
                false
            }
            _ => false,
        };
        let follows_operand = matches!(
            previous,
            Some(
                ExprToken::Integer(_)
                    | ExprToken::Float(_)
                    | ExprToken::RParen
                    | ExprToken::Greater
            )
        );
        if starts_operand && follows_operand {
            return false;
        }
        previous = Some(token);
    }
    has_operator && operands >= 2
}

fn parse_template(text: &str, resolver: &dyn Resolver) -> EvalResult<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut rest = text;

    while let Some(open) = rest.find(['<', '$']) {
        literal.push_str(&rest[..open]);
        let candidate = &rest[open..];
        if let Some(after_dollar) = candidate.strip_prefix('$') {
            let length = after_dollar
                .find(|c: char| !(c.is_alphanumeric() || c == '_'))
                .unwrap_or(after_dollar.len());
            let name = &after_dollar[..length];
            match resolver.resolve(name) {
                Some(reference @ Reference::Variable(_)) => {
                    push_expr(&mut segments, &mut literal, Expr::Reference(reference));
                }
                // `$` before anything but a variable stays literal
                _ => literal.push_str(&candidate[..=length]),
            }
            rest = &after_dollar[length..];
            continue;
        }
        match balanced_span(candidate) {
            Some(end) => {
                let span = &candidate[..end];
                match Expr::parse(span, resolver) {
                    Ok(expr) => push_expr(&mut segments, &mut literal, expr),
                    Err(EvalError::Syntax { .. }) => literal.push_str(span),
                    Err(other) => return Err(other),
                }
                rest = &candidate[end..];
            }
            None => {
                literal.push_str(candidate);
                rest = "";
            }
        }
    }
    literal.push_str(rest);
    if !literal.is_empty() {
        segments.push(Segment::Text(literal));
    }
    Ok(segments)
}

fn push_expr(segments: &mut Vec<Segment>, literal: &mut String, expr: Expr) {
    if !literal.is_empty() {
        segments.push(Segment::Text(std::mem::take(literal)));
    }
    segments.push(Segment::Expr(expr));
}

// Byte length of the `<...>` span at the start of `text`, counting nesting.
fn balanced_span(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (idx, c) in text.char_indices() {
        match c {
            '<' => depth += 1,
            '>' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(idx + 1);
                }
            }
            _ => {}
        }
    }
    None
}

impl Expr {
    pub fn evaluate(&self, scope: &mut dyn Scope) -> EvalResult<Value> {
        match self {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Reference(reference) => scope.lookup(reference),
            Expr::Unary { op, operand } => {
                let value = operand.evaluate(scope)?;
                match op {
                    UnaryOperator::Negate => Ok(value.negate()?),
                    UnaryOperator::Not => Ok(Value::Boolean(!value.is_truthy())),
                }
            }
            Expr::Binary { left, op, right } => {
                let left = left.evaluate(scope)?;
                let right = right.evaluate(scope)?;
                let value = match op {
                    BinaryOperator::Add => left.add(&right)?,
                    BinaryOperator::Sub => left.sub(&right)?,
                    BinaryOperator::Mul => left.mul(&right)?,
                    BinaryOperator::Div => left.div(&right)?,
                    BinaryOperator::FloorDiv => left.floor_div(&right)?,
                    BinaryOperator::Rem => left.rem(&right)?,
                    BinaryOperator::Pow => left.pow(&right)?,
                    BinaryOperator::Compare(comparison) => {
                        Value::Boolean(left.compare(*comparison, &right)?)
                    }
                };
                Ok(value)
            }
            Expr::Logical { left, op, right } => {
                let left = left.evaluate(scope)?.is_truthy();
                let short_circuit = match op {
                    LogicalOperator::And => !left,
                    LogicalOperator::Or => left,
                };
                if short_circuit {
                    return Ok(Value::Boolean(left));
                }
                Ok(Value::Boolean(right.evaluate(scope)?.is_truthy()))
            }
            Expr::Call { function, args } => {
                let values = args
                    .iter()
                    .map(|arg| arg.evaluate(scope))
                    .collect::<EvalResult<Vec<_>>>()?;
                Ok(function.call(&values)?)
            }
        }
    }
}

/// Parses and evaluates `source` in one step against a scope that also knows
/// how to resolve names.
pub fn evaluate<S: Resolver + Scope>(source: &str, scope: &mut S) -> EvalResult<Value> {
    let expr = ValueExpr::parse(source, &*scope)?;
    expr.evaluate(scope)
}

impl Resolver for FxHashMap<String, Value> {
    fn resolve(&self, name: &str) -> Option<Reference> {
        variable_name(name, |candidate| self.contains_key(candidate))
            .map(|name| Reference::Variable(name.to_string()))
    }
}

impl Scope for FxHashMap<String, Value> {
    fn lookup(&mut self, reference: &Reference) -> EvalResult<Value> {
        match reference {
            Reference::Variable(name) => {
                self.get(name)
                    .cloned()
                    .ok_or_else(|| EvalError::UnknownVariable { name: name.clone() })
            }
            Reference::Property { widget, .. } | Reference::Random { generator: widget, .. } => {
                Err(EvalError::UnresolvedReference {
                    name: widget.clone(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::value::ValueError;

    fn scope(entries: &[(&str, Value)]) -> FxHashMap<String, Value> {
        entries
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect()
    }

    #[test]
    fn applies_multiplicative_precedence() {
        let mut vars = scope(&[("a", Value::Integer(3)), ("b", Value::Integer(4))]);
        let value = evaluate("<a> + <b> * 2", &mut vars).expect("evaluate should succeed");
        assert_eq!(value, Value::Integer(11));
    }

    #[test]
    fn concatenates_string_references() {
        let mut vars = scope(&[("a", Value::from("x")), ("b", Value::from("y"))]);
        let value = evaluate("<a> + <b>", &mut vars).expect("evaluate should succeed");
        assert_eq!(value, Value::from("xy"));
    }

    #[test]
    fn rejects_mixed_arithmetic() {
        let mut vars = scope(&[("a", Value::from("x")), ("b", Value::Integer(1))]);
        let err = evaluate("<a> - <b>", &mut vars).expect_err("expected type mismatch");
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
    }

    #[test]
    fn reads_value_suffix_and_nested_spans() {
        let mut vars = scope(&[("counter", Value::Integer(2))]);
        assert_eq!(
            evaluate("<<counter_value> * 3>", &mut vars).expect("nested span"),
            Value::Integer(6)
        );
        assert_eq!(
            evaluate("(<counter> + 1) * 2", &mut vars).expect("parenthesized"),
            Value::Integer(6)
        );
    }

    #[test]
    fn compares_after_a_closed_span() {
        let mut vars = scope(&[("x", Value::Integer(6))]);
        assert_eq!(
            evaluate("<x_value> > 5", &mut vars).expect("comparison"),
            Value::Boolean(true)
        );
        assert_eq!(
            evaluate("<x> >= 7 or not <x> == 6", &mut vars).expect("logic"),
            Value::Boolean(false)
        );
        assert_eq!(
            evaluate("<(x > 5)>", &mut vars).expect("parenthesized comparison in span"),
            Value::Boolean(true)
        );
    }

    #[test]
    fn interpolates_templates_as_strings() {
        let mut vars = scope(&[("counter", Value::Integer(3))]);
        assert_eq!(
            evaluate("Count: <counter_value>!", &mut vars).expect("template"),
            Value::from("Count: 3!")
        );
        assert_eq!(
            evaluate("I have <3 apples> here", &mut vars).expect("literal angle text"),
            Value::from("I have <3 apples> here")
        );
    }

    #[test]
    fn whole_expression_keeps_its_type() {
        let mut vars = scope(&[("counter", Value::Float(1.5))]);
        assert_eq!(
            evaluate("<counter_value>", &mut vars).expect("reference"),
            Value::Float(1.5)
        );
        assert_eq!(evaluate("-4 % 3", &mut vars).expect("modulo"), Value::Integer(2));
        assert_eq!(evaluate("7 / 2", &mut vars).expect("division"), Value::Float(3.5));
    }

    #[test]
    fn unresolved_references_fail_even_inside_templates() {
        let vars = scope(&[]);
        let err = ValueExpr::parse("Total: <missing_value>", &vars).expect_err("unresolved");
        assert_eq!(
            err,
            EvalError::UnresolvedReference {
                name: "missing_value".to_string()
            }
        );
    }

    #[test]
    fn reports_division_by_zero() {
        let mut vars = scope(&[("n", Value::Integer(0))]);
        let err = evaluate("10 / <n>", &mut vars).expect_err("division by zero");
        assert_eq!(
            err,
            EvalError::Value(ValueError::DivisionByZero { operation: "/" })
        );
        assert_eq!(err.kind(), ErrorKind::Arithmetic);
    }

    #[test]
    fn strict_parse_rejects_bare_words() {
        let vars = scope(&[("x", Value::Integer(1))]);
        let err = Expr::parse("x > 1", &vars).expect_err("bare word");
        assert!(matches!(err, EvalError::Syntax { .. }));
    }

    #[test]
    fn power_binds_tighter_than_unary_minus() {
        let mut vars = scope(&[("n", Value::Integer(3))]);
        assert_eq!(evaluate("2 ** 3", &mut vars).expect("power"), Value::Integer(8));
        assert_eq!(evaluate("-2 ** 2", &mut vars).expect("power"), Value::Integer(-4));
        assert_eq!(evaluate("2 ** 3 ** 2", &mut vars).expect("power"), Value::Integer(512));
        assert_eq!(evaluate("2 ** -1", &mut vars).expect("power"), Value::Float(0.5));
        assert_eq!(evaluate("<n> // 2", &mut vars).expect("floor div"), Value::Integer(1));
        assert_eq!(evaluate("7 % -3", &mut vars).expect("modulo"), Value::Integer(-2));
    }

    #[test]
    fn calls_math_functions_inside_and_outside_references() {
        let mut vars = scope(&[("x", Value::Integer(-9))]);
        assert_eq!(evaluate("abs(-3)", &mut vars).expect("abs"), Value::Integer(3));
        assert_eq!(evaluate("<abs(<x>)>", &mut vars).expect("abs"), Value::Integer(9));
        assert_eq!(
            evaluate("max(<x>, 2, 1) + min(4, 5)", &mut vars).expect("extremes"),
            Value::Integer(6)
        );
        assert_eq!(
            evaluate("sqrt(abs(<x>))", &mut vars).expect("sqrt"),
            Value::Float(3.0)
        );
        assert_eq!(evaluate("round(2.5)", &mut vars).expect("round"), Value::Integer(2));
        assert_eq!(evaluate("pow(2, 5)", &mut vars).expect("pow"), Value::Integer(32));

        let err = ValueExpr::parse("abs(1, 2)", &vars).expect_err("arity");
        assert_eq!(
            err,
            EvalError::Arity {
                function: "abs",
                expected: Arity::Exact(1),
                found: 2
            }
        );
        assert_eq!(err.kind(), ErrorKind::Parse);
    }

    #[test]
    fn dollar_names_interpolate_variables() {
        let mut vars = scope(&[("x", Value::Integer(4))]);
        assert_eq!(
            evaluate("x is $x", &mut vars).expect("template"),
            Value::from("x is 4")
        );
        assert_eq!(
            evaluate("costs $5 or $y", &mut vars).expect("unknown names stay literal"),
            Value::from("costs $5 or $y")
        );
    }

    #[test]
    fn broken_arithmetic_is_not_taken_for_text() {
        let vars = scope(&[("a", Value::Integer(1))]);
        for source in ["2 +* 3", "(1 + 2", "<a> * / 2", "abs(2) +"] {
            let err = ValueExpr::parse(source, &vars).expect_err(source);
            assert!(matches!(err, EvalError::Syntax { .. }), "{source}: {err:?}");
        }
        for source in ["+", "(555) 123-4567", "Total: 3 + 4", "3 apples + 2 pears"] {
            let parsed = ValueExpr::parse(source, &vars).expect(source);
            assert!(matches!(parsed, ValueExpr::Template(_)), "{source}");
        }
    }

    #[test]
    fn evaluation_leaves_the_scope_untouched() {
        let mut vars = scope(&[("a", Value::Integer(1))]);
        evaluate("<a> + 1", &mut vars).expect("evaluate should succeed");
        assert_eq!(vars.get("a"), Some(&Value::Integer(1)));
        assert_eq!(vars.len(), 1);
    }
}
