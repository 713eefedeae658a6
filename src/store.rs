use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::error::ErrorKind;
use crate::value::{Value, ValueError};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Variable '{name}' is already declared")]
    DuplicateName { name: String },
    #[error("Unknown variable '{name}'")]
    UnknownVariable { name: String },
    #[error("Cannot apply '{operation}' to variable '{name}': {source}")]
    Operation {
        name: String,
        operation: &'static str,
        #[source]
        source: ValueError,
    },
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::DuplicateName { .. } => ErrorKind::DuplicateName,
            StoreError::UnknownVariable { .. } => ErrorKind::UnknownVariable,
            StoreError::Operation {
                source:
                    ValueError::DivisionByZero { .. }
                    | ValueError::Overflow { .. }
                    | ValueError::Domain { .. },
                ..
            } => ErrorKind::Arithmetic,
            StoreError::Operation { .. } => ErrorKind::TypeMismatch,
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// In-place mutation applied to a stored value.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreOp {
    Increment,
    Decrement,
    Add(Value),
    Sub(Value),
    Mul(Value),
    Div(Value),
    FloorDiv(Value),
    Rem(Value),
    Pow(Value),
}

impl StoreOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            StoreOp::Increment => "++",
            StoreOp::Decrement => "--",
            StoreOp::Add(_) => "+=",
            StoreOp::Sub(_) => "-=",
            StoreOp::Mul(_) => "*=",
            StoreOp::Div(_) => "/=",
            StoreOp::FloorDiv(_) => "//=",
            StoreOp::Rem(_) => "%=",
            StoreOp::Pow(_) => "**=",
        }
    }
}

/// Variable cells in declaration order. Cells are never removed.
#[derive(Debug, Default, Clone)]
pub struct VariableStore {
    cells: FxHashMap<String, Value>,
    order: Vec<String>,
}

impl VariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare(&mut self, name: &str, initial: Value) -> StoreResult<()> {
        if self.cells.contains_key(name) {
            return Err(StoreError::DuplicateName {
                name: name.to_string(),
            });
        }
        self.cells.insert(name.to_string(), initial);
        self.order.push(name.to_string());
        Ok(())
    }

    pub fn get(&self, name: &str) -> StoreResult<&Value> {
        self.cells.get(name).ok_or_else(|| unknown(name))
    }

    pub fn set(&mut self, name: &str, value: Value) -> StoreResult<()> {
        let cell = self.cells.get_mut(name).ok_or_else(|| unknown(name))?;
        *cell = value;
        Ok(())
    }

    /// Applies `op` and returns the new value.
    pub fn apply(&mut self, name: &str, op: StoreOp) -> StoreResult<Value> {
        let cell = self.cells.get_mut(name).ok_or_else(|| unknown(name))?;
        let result = match &op {
            StoreOp::Increment => step(cell, 1),
            StoreOp::Decrement => step(cell, -1),
            StoreOp::Add(operand) => cell.add(operand),
            StoreOp::Sub(operand) => cell.sub(operand),
            StoreOp::Mul(operand) => cell.mul(operand),
            StoreOp::Div(operand) => cell.div(operand),
            StoreOp::FloorDiv(operand) => cell.floor_div(operand),
            StoreOp::Rem(operand) => cell.rem(operand),
            StoreOp::Pow(operand) => cell.pow(operand),
        };
        let updated = result.map_err(|source| StoreError::Operation {
            name: name.to_string(),
            operation: op.symbol(),
            source,
        })?;
        *cell = updated.clone();
        Ok(updated)
    }

    /// Variables with their current values, in declaration order.
    pub fn snapshot(&self) -> Vec<(String, Value)> {
        self.order
            .iter()
            .filter_map(|name| {
                self.cells
                    .get(name)
                    .map(|value| (name.clone(), value.clone()))
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

// `++`/`--` only step numbers; strings are not coerced.
fn step(cell: &Value, delta: i64) -> Result<Value, ValueError> {
    let operation = if delta > 0 { "++" } else { "--" };
    match cell {
        Value::Integer(_) | Value::Float(_) => cell
            .add(&Value::Integer(delta))
            .map_err(|_| ValueError::Overflow { operation }),
        Value::String(_) | Value::Boolean(_) => Err(ValueError::UnsupportedOperand {
            operation,
            type_name: cell.type_name(),
        }),
    }
}

fn unknown(name: &str) -> StoreError {
    StoreError::UnknownVariable {
        name: name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn increments_integers() {
        let mut store = VariableStore::new();
        store.declare("n", Value::Integer(5)).expect("declare");
        let value = store.apply("n", StoreOp::Increment).expect("increment");
        assert_eq!(value, Value::Integer(6));
        assert_eq!(store.get("n"), Ok(&Value::Integer(6)));
    }

    #[test]
    fn increment_on_string_is_a_type_mismatch() {
        let mut store = VariableStore::new();
        store.declare("s", Value::from("five")).expect("declare");
        let err = store
            .apply("s", StoreOp::Increment)
            .expect_err("expected type mismatch");
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
        assert_eq!(store.get("s"), Ok(&Value::from("five")));
    }

    #[test]
    fn rejects_duplicate_declarations() {
        let mut store = VariableStore::new();
        store.declare("x", Value::Integer(1)).expect("declare");
        let err = store
            .declare("x", Value::Integer(2))
            .expect_err("expected duplicate");
        assert_eq!(
            err,
            StoreError::DuplicateName {
                name: "x".to_string()
            }
        );
        assert_eq!(err.kind(), ErrorKind::DuplicateName);
    }

    #[test]
    fn unknown_variables_fail_every_access() {
        let mut store = VariableStore::new();
        assert_eq!(store.get("ghost").map(|_| ()), Err(unknown("ghost")));
        assert_eq!(store.set("ghost", Value::Integer(1)), Err(unknown("ghost")));
        assert_eq!(
            store.apply("ghost", StoreOp::Decrement).map(|_| ()),
            Err(unknown("ghost"))
        );
    }

    #[test]
    fn reassignment_may_change_type() {
        let mut store = VariableStore::new();
        store.declare("v", Value::Integer(1)).expect("declare");
        store.set("v", Value::from("one")).expect("set");
        store
            .apply("v", StoreOp::Add(Value::from("!")))
            .expect("concatenate");
        assert_eq!(store.get("v"), Ok(&Value::from("one!")));
    }

    #[test]
    fn compound_division_yields_float_and_guards_zero() {
        let mut store = VariableStore::new();
        store.declare("d", Value::Integer(9)).expect("declare");
        assert_eq!(
            store.apply("d", StoreOp::Div(Value::Integer(2))),
            Ok(Value::Float(4.5))
        );
        let err = store
            .apply("d", StoreOp::Div(Value::Integer(0)))
            .expect_err("expected division by zero");
        assert_eq!(err.kind(), ErrorKind::Arithmetic);
    }

    #[test]
    fn applies_floor_division_remainder_and_power() {
        let mut store = VariableStore::new();
        store.declare("n", Value::Integer(-7)).expect("declare");
        assert_eq!(
            store.apply("n", StoreOp::FloorDiv(Value::Integer(2))),
            Ok(Value::Integer(-4))
        );
        assert_eq!(
            store.apply("n", StoreOp::Rem(Value::Integer(3))),
            Ok(Value::Integer(2))
        );
        assert_eq!(
            store.apply("n", StoreOp::Pow(Value::Integer(5))),
            Ok(Value::Integer(32))
        );
        let err = store
            .apply("n", StoreOp::Rem(Value::Integer(0)))
            .expect_err("expected division by zero");
        assert_eq!(err.kind(), ErrorKind::Arithmetic);
        assert_eq!(store.get("n"), Ok(&Value::Integer(32)));
    }

    #[test]
    fn snapshot_keeps_declaration_order() {
        let mut store = VariableStore::new();
        store.declare("b", Value::Integer(2)).expect("declare");
        store.declare("a", Value::Integer(1)).expect("declare");
        let names: Vec<String> = store.snapshot().into_iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["b".to_string(), "a".to_string()]);
    }
}
