use std::cmp::Ordering;
use std::fmt;

use thiserror::Error;

/// Dynamically typed scalar held by variables and widget properties.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Integer(i64),
    Float(f64),
    String(String),
    Boolean(bool),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValueError {
    #[error("Operation '{operation}' is not supported between {left} and {right}")]
    TypeMismatch {
        operation: &'static str,
        left: &'static str,
        right: &'static str,
    },
    #[error("Operation '{operation}' is not supported for type {type_name}")]
    UnsupportedOperand {
        operation: &'static str,
        type_name: &'static str,
    },
    #[error("Division by zero in '{operation}'")]
    DivisionByZero { operation: &'static str },
    #[error("Integer overflow in '{operation}'")]
    Overflow { operation: &'static str },
    #[error("Math domain error in '{operation}'")]
    Domain { operation: &'static str },
    #[error("Cannot convert '{text}' to {target}")]
    Conversion { target: &'static str, text: String },
}


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
}

impl Comparison {
    pub fn symbol(self) -> &'static str {
        match self {
            Comparison::Equal => "==",
            Comparison::NotEqual => "!=",
            Comparison::Less => "<",
            Comparison::LessEqual => "<=",
            Comparison::Greater => ">",
            Comparison::GreaterEqual => ">=",
        }
    }
}

enum Numbers {
    Integers(i64, i64),
    Floats(f64, f64),
}

impl Value {
    /// Infers a value from text coming from outside the program: attribute
    /// literals, console input, and widget text.
    pub fn infer(text: &str) -> Value {
        let trimmed = text.trim();
        if let Ok(value) = trimmed.parse::<i64>() {
            return Value::Integer(value);
        }
        if trimmed.contains(|c: char| c.is_ascii_digit())
            && !trimmed.contains(|c: char| c.is_alphabetic())
            && let Ok(value) = trimmed.parse::<f64>()
        {
            return Value::Float(value);
        }
        Value::String(text.to_string())
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Integer(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "str",
            Value::Boolean(_) => "bool",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Integer(_) | Value::Float(_))
    }

    pub fn to_output(&self) -> String {
        match self {
            Value::Integer(value) => value.to_string(),
            Value::Float(value) => {
                if value.is_finite() && value.fract() == 0.0 {
                    format!("{value:.1}")
                } else {
                    value.to_string()
                }
            }
            Value::String(value) => value.clone(),
            Value::Boolean(value) => {
                if *value {
                    "True".to_string()
                } else {
                    "False".to_string()
                }
            }
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Integer(value) => *value != 0,
            Value::Float(value) => *value != 0.0,
            Value::String(value) => !value.is_empty(),
            Value::Boolean(value) => *value,
        }
    }

    pub fn add(&self, other: &Value) -> Result<Value, ValueError> {
        if let (Value::String(left), Value::String(right)) = (self, other) {
            return Ok(Value::String(format!("{left}{right}")));
        }
        match self.numbers("+", other)? {
            Numbers::Integers(left, right) => left
                .checked_add(right)
                .map(Value::Integer)
                .ok_or(ValueError::Overflow { operation: "+" }),
            Numbers::Floats(left, right) => Ok(Value::Float(left + right)),
        }
    }

    pub fn sub(&self, other: &Value) -> Result<Value, ValueError> {
        match self.numbers("-", other)? {
            Numbers::Integers(left, right) => left
                .checked_sub(right)
                .map(Value::Integer)
                .ok_or(ValueError::Overflow { operation: "-" }),
            Numbers::Floats(left, right) => Ok(Value::Float(left - right)),
        }
    }

    pub fn mul(&self, other: &Value) -> Result<Value, ValueError> {
        match self.numbers("*", other)? {
            Numbers::Integers(left, right) => left
                .checked_mul(right)
                .map(Value::Integer)
                .ok_or(ValueError::Overflow { operation: "*" }),
            Numbers::Floats(left, right) => Ok(Value::Float(left * right)),
        }
    }

    /// True division; the result is always a float.
    pub fn div(&self, other: &Value) -> Result<Value, ValueError> {
        let (left, right) = match self.numbers("/", other)? {
            Numbers::Integers(left, right) => (left as f64, right as f64),
            Numbers::Floats(left, right) => (left, right),
        };
        if right == 0.0 {
            return Err(ValueError::DivisionByZero { operation: "/" });
        }
        Ok(Value::Float(left / right))
    }

    /// Floor division; the result takes the sign of the divisor's quotient
    /// rounded toward negative infinity.
    pub fn floor_div(&self, other: &Value) -> Result<Value, ValueError> {
        const OPERATION: &str = "//";
        match self.numbers(OPERATION, other)? {
            Numbers::Integers(_, 0) => Err(ValueError::DivisionByZero { operation: OPERATION }),
            Numbers::Integers(left, right) => {
                let quotient = left
                    .checked_div(right)
                    .ok_or(ValueError::Overflow { operation: OPERATION })?;
                if left % right != 0 && (left < 0) != (right < 0) {
                    Ok(Value::Integer(quotient - 1))
                } else {
                    Ok(Value::Integer(quotient))
                }
            }
            Numbers::Floats(_, right) if right == 0.0 => {
                Err(ValueError::DivisionByZero { operation: OPERATION })
            }
            Numbers::Floats(left, right) => Ok(Value::Float((left / right).floor())),
        }
    }

    /// Remainder whose sign follows the divisor.
    pub fn rem(&self, other: &Value) -> Result<Value, ValueError> {
        match self.numbers("%", other)? {
            Numbers::Integers(_, 0) => Err(ValueError::DivisionByZero { operation: "%" }),
            // i64::MIN % -1 is exactly zero
            Numbers::Integers(_, -1) => Ok(Value::Integer(0)),
            Numbers::Integers(left, right) => {
                let remainder = left % right;
                if remainder != 0 && (remainder < 0) != (right < 0) {
                    Ok(Value::Integer(remainder + right))
                } else {
                    Ok(Value::Integer(remainder))
                }
            }
            Numbers::Floats(_, right) if right == 0.0 => {
                Err(ValueError::DivisionByZero { operation: "%" })
            }
            Numbers::Floats(left, right) => {
                let remainder = left % right;
                if remainder != 0.0 && (remainder < 0.0) != (right < 0.0) {
                    Ok(Value::Float(remainder + right))
                } else {
                    Ok(Value::Float(remainder))
                }
            }
        }
    }

    /// Integer powers stay integers; a negative exponent yields a float.
    pub fn pow(&self, other: &Value) -> Result<Value, ValueError> {
        const OPERATION: &str = "**";
        match self.numbers(OPERATION, other)? {
            Numbers::Integers(0, exponent) if exponent < 0 => {
                Err(ValueError::DivisionByZero { operation: OPERATION })
            }
            Numbers::Integers(base, exponent) if exponent < 0 => {
                Ok(Value::Float((base as f64).powf(exponent as f64)))
            }
            Numbers::Integers(base, exponent) => u32::try_from(exponent)
                .ok()
                .and_then(|exponent| base.checked_pow(exponent))
                .map(Value::Integer)
                .ok_or(ValueError::Overflow { operation: OPERATION }),
            Numbers::Floats(base, exponent) if base == 0.0 && exponent < 0.0 => {
                Err(ValueError::DivisionByZero { operation: OPERATION })
            }
            Numbers::Floats(base, exponent) if base < 0.0 && exponent.fract() != 0.0 => {
                Err(ValueError::Domain { operation: OPERATION })
            }
            Numbers::Floats(base, exponent) => Ok(Value::Float(base.powf(exponent))),
        }
    }

    pub fn negate(&self) -> Result<Value, ValueError> {
        match self {
            Value::Integer(value) => value
                .checked_neg()
                .map(Value::Integer)
                .ok_or(ValueError::Overflow { operation: "-" }),
            Value::Float(value) => Ok(Value::Float(-value)),
            Value::String(_) | Value::Boolean(_) => Err(ValueError::UnsupportedOperand {
                operation: "-",
                type_name: self.type_name(),
            }),
        }
    }

    /// Equality never fails; ordering is defined between numbers and between
    /// strings only.
    pub fn compare(&self, comparison: Comparison, other: &Value) -> Result<bool, ValueError> {
        let ordering = match (self, other) {
            (Value::String(left), Value::String(right)) => Some(left.cmp(right)),
            (Value::Boolean(left), Value::Boolean(right)) => Some(left.cmp(right)),
            _ if self.is_numeric() && other.is_numeric() => match self.numbers("==", other)? {
                Numbers::Integers(left, right) => Some(left.cmp(&right)),
                Numbers::Floats(left, right) => left.partial_cmp(&right),
            },
            _ => None,
        };

        let orderable = matches!((self, other), (Value::String(_), Value::String(_)))
            || (self.is_numeric() && other.is_numeric());
        let accepts: fn(Ordering) -> bool = match comparison {
            Comparison::Equal => return Ok(ordering == Some(Ordering::Equal)),
            Comparison::NotEqual => return Ok(ordering != Some(Ordering::Equal)),
            Comparison::Less => Ordering::is_lt,
            Comparison::LessEqual => Ordering::is_le,
            Comparison::Greater => Ordering::is_gt,
            Comparison::GreaterEqual => Ordering::is_ge,
        };
        if !orderable {
            return Err(ValueError::TypeMismatch {
                operation: comparison.symbol(),
                left: self.type_name(),
                right: other.type_name(),
            });
        }
        // NaN orders against nothing
        Ok(ordering.is_some_and(accepts))
    }

    fn numbers(&self, operation: &'static str, other: &Value) -> Result<Numbers, ValueError> {
        match (self, other) {
            (Value::Integer(left), Value::Integer(right)) => Ok(Numbers::Integers(*left, *right)),
            (Value::Integer(left), Value::Float(right)) => {
                Ok(Numbers::Floats(*left as f64, *right))
            }
            (Value::Float(left), Value::Integer(right)) => {
                Ok(Numbers::Floats(*left, *right as f64))
            }
            (Value::Float(left), Value::Float(right)) => Ok(Numbers::Floats(*left, *right)),
            _ => Err(ValueError::TypeMismatch {
                operation,
                left: self.type_name(),
                right: other.type_name(),
            }),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_output())
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}
