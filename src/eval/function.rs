use std::fmt;

use crate::value::{Comparison, Value, ValueError};

/// Math functions callable from expressions, e.g. `max(<a_value>, 10)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Abs,
    Min,
    Max,
    Round,
    Int,
    Float,
    Sqrt,
    Pow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    Range { min: usize, max: Option<usize> },
}

impl Arity {
    pub fn accepts(self, count: usize) -> bool {
        match self {
            Arity::Exact(expected) => count == expected,
            Arity::Range { min, max } => count >= min && max.is_none_or(|max| count <= max),
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exact(1) => f.write_str("1 argument"),
            Arity::Exact(count) => write!(f, "{count} arguments"),
            Arity::Range { min, max: None } => write!(f, "at least {min} arguments"),
            Arity::Range {
                min,
                max: Some(max),
            } => write!(f, "{min} to {max} arguments"),
        }
    }
}

impl Function {
    pub fn from_name(name: &str) -> Option<Self> {
        let function = match name {
            "abs" => Function::Abs,
            "min" => Function::Min,
            "max" => Function::Max,
            "round" => Function::Round,
            "int" => Function::Int,
            "float" => Function::Float,
            "sqrt" => Function::Sqrt,
            "pow" => Function::Pow,
            _ => return None,
        };
        Some(function)
    }

    pub fn name(self) -> &'static str {
        match self {
            Function::Abs => "abs",
            Function::Min => "min",
            Function::Max => "max",
            Function::Round => "round",
            Function::Int => "int",
            Function::Float => "float",
            Function::Sqrt => "sqrt",
            Function::Pow => "pow",
        }
    }

    pub fn arity(self) -> Arity {
        match self {
            Function::Abs | Function::Int | Function::Float | Function::Sqrt => Arity::Exact(1),
            Function::Pow => Arity::Exact(2),
            Function::Min | Function::Max => Arity::Range { min: 2, max: None },
            Function::Round => Arity::Range {
                min: 1,
                max: Some(2),
            },
        }
    }

    /// Applies the function; the argument count was checked at load time.
    pub fn call(self, args: &[Value]) -> Result<Value, ValueError> {
        let operation = self.name();
        let [first, rest @ ..] = args else {
            return Err(ValueError::UnsupportedOperand {
                operation,
                type_name: "no arguments",
            });
        };
        match self {
            Function::Abs => match first {
                Value::Integer(value) => value
                    .checked_abs()
                    .map(Value::Integer)
                    .ok_or(ValueError::Overflow { operation }),
                Value::Float(value) => Ok(Value::Float(value.abs())),
                other => Err(unsupported(operation, other)),
            },
            Function::Min => extreme(first, rest, Comparison::Less),
            Function::Max => extreme(first, rest, Comparison::Greater),
            Function::Round => round(first, rest.first()),
            Function::Int => to_int(first),
            Function::Float => to_float(first),
            Function::Sqrt => {
                let value = number(operation, first)?;
                if value < 0.0 {
                    return Err(ValueError::Domain { operation });
                }
                Ok(Value::Float(value.sqrt()))
            }
            Function::Pow => match rest {
                [exponent] => first.pow(exponent),
                _ => Err(ValueError::UnsupportedOperand {
                    operation,
                    type_name: "missing exponent",
                }),
            },
        }
    }
}

// The first of the most extreme values wins ties.
fn extreme(first: &Value, rest: &[Value], wanted: Comparison) -> Result<Value, ValueError> {
    let mut best = first;
    for candidate in rest {
        if candidate.compare(wanted, best)? {
            best = candidate;
        }
    }
    Ok(best.clone())
}

// Halves round to even.
fn round(value: &Value, digits: Option<&Value>) -> Result<Value, ValueError> {
    const OPERATION: &str = "round";
    let digits = match digits {
        None => None,
        Some(Value::Integer(digits)) => Some(
            i32::try_from(*digits).map_err(|_| ValueError::Overflow { operation: OPERATION })?,
        ),
        Some(other) => return Err(unsupported(OPERATION, other)),
    };
    match (value, digits) {
        (Value::Integer(value), None) => Ok(Value::Integer(*value)),
        (Value::Integer(value), Some(digits)) if digits >= 0 => Ok(Value::Integer(*value)),
        (Value::Integer(value), Some(digits)) => {
            let scale = 10f64.powi(-digits);
            let rounded = (*value as f64 / scale).round_ties_even() * scale;
            float_to_integer(OPERATION, rounded)
        }
        (Value::Float(value), None) => float_to_integer(OPERATION, value.round_ties_even()),
        (Value::Float(value), Some(digits)) => {
            let scale = 10f64.powi(digits);
            Ok(Value::Float((value * scale).round_ties_even() / scale))
        }
        (other, _) => Err(unsupported(OPERATION, other)),
    }
}

fn to_int(value: &Value) -> Result<Value, ValueError> {
    match value {
        Value::Integer(value) => Ok(Value::Integer(*value)),
        Value::Float(value) if value.is_nan() => Err(ValueError::Conversion {
            target: "int",
            text: value.to_string(),
        }),
        Value::Float(value) => float_to_integer("int", value.trunc()),
        Value::Boolean(flag) => Ok(Value::Integer(i64::from(*flag))),
        Value::String(text) => {
            text.trim()
                .parse::<i64>()
                .map(Value::Integer)
                .map_err(|_| ValueError::Conversion {
                    target: "int",
                    text: text.clone(),
                })
        }
    }
}

fn to_float(value: &Value) -> Result<Value, ValueError> {
    match value {
        Value::Integer(value) => Ok(Value::Float(*value as f64)),
        Value::Float(value) => Ok(Value::Float(*value)),
        Value::Boolean(flag) => Ok(Value::Float(if *flag { 1.0 } else { 0.0 })),
        Value::String(text) => {
            text.trim()
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|_| ValueError::Conversion {
                    target: "float",
                    text: text.clone(),
                })
        }
    }
}

fn float_to_integer(operation: &'static str, value: f64) -> Result<Value, ValueError> {
    // i64::MAX is not representable; 2^63 is the first float past it
    if !value.is_finite() || value < i64::MIN as f64 || value >= i64::MAX as f64 {
        return Err(ValueError::Overflow { operation });
    }
    Ok(Value::Integer(value as i64))
}

fn number(operation: &'static str, value: &Value) -> Result<f64, ValueError> {
    match value {
        Value::Integer(value) => Ok(*value as f64),
        Value::Float(value) => Ok(*value),
        other => Err(unsupported(operation, other)),
    }
}

fn unsupported(operation: &'static str, value: &Value) -> ValueError {
    ValueError::UnsupportedOperand {
        operation,
        type_name: value.type_name(),
    }
}
