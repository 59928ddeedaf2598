//! Runtime values for the Lox VM.

use std::fmt;
use std::rc::Rc;

/// A runtime value. Strings share their text through `Rc`, so cloning a
/// value never copies string data.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Nil,
    Number(f64),
    String(Rc<str>),
    Boolean(bool),
}

/// Why an arithmetic operation could not produce a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpError {
    /// The operand variants do not support the operation.
    Unsupported,
    DivisionByZero,
}

impl Value {
    pub const NIL: Value = Value::Nil;
    pub const TRUE: Value = Value::Boolean(true);
    pub const FALSE: Value = Value::Boolean(false);

    pub fn string(s: impl Into<Rc<str>>) -> Self {
        Value::String(s.into())
    }

    pub fn bool(b: bool) -> Self {
        if b {
            Value::TRUE
        } else {
            Value::FALSE
        }
    }

    /// The type name used in runtime error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "Nil",
            Value::Number(_) => "Number",
            Value::String(_) => "String",
            Value::Boolean(_) => "Boolean",
        }
    }

    /// `nil` and `false` are falsy; everything else is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Nil => false,
            Value::Boolean(b) => *b,
            Value::Number(_) | Value::String(_) => true,
        }
    }

    pub fn negate(&self) -> Result<Value, OpError> {
        match self {
            Value::Number(n) => Ok(Value::Number(-n)),
            _ => Err(OpError::Unsupported),
        }
    }

    pub fn not(&self) -> Value {
        Value::bool(!self.is_truthy())
    }

    pub fn add(&self, rhs: &Value) -> Result<Value, OpError> {
        match (self, rhs) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
            (Value::String(a), Value::String(b)) => {
                let mut joined = String::with_capacity(a.len() + b.len());
                joined.push_str(a);
                joined.push_str(b);
                Ok(Value::string(joined))
            }
            _ => Err(OpError::Unsupported),
        }
    }

    pub fn subtract(&self, rhs: &Value) -> Result<Value, OpError> {
        match (self, rhs) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a - b)),
            _ => Err(OpError::Unsupported),
        }
    }

    pub fn multiply(&self, rhs: &Value) -> Result<Value, OpError> {
        match (self, rhs) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a * b)),
            _ => Err(OpError::Unsupported),
        }
    }

    /// Division by `0.0` or `-0.0` is an error rather than an infinity.
    pub fn divide(&self, rhs: &Value) -> Result<Value, OpError> {
        match (self, rhs) {
            (Value::Number(_), Value::Number(b)) if *b == 0.0 => Err(OpError::DivisionByZero),
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a / b)),
            _ => Err(OpError::Unsupported),
        }
    }

    /// Equality, decided by the left operand. `None` means the pair cannot
    /// be compared.
    ///
    /// `nil` is only equal to `nil`. A boolean compares against the right
    /// side's truthiness but is never equal to `nil`. Numbers and strings
    /// only compare against their own variant.
    pub fn cmp_equal(&self, rhs: &Value) -> Option<bool> {
        match self {
            Value::Nil => Some(matches!(rhs, Value::Nil)),
            Value::Boolean(_) if matches!(rhs, Value::Nil) => Some(false),
            Value::Boolean(b) => Some(*b == rhs.is_truthy()),
            Value::Number(a) => match rhs {
                Value::Number(b) => Some(a == b),
                _ => None,
            },
            Value::String(a) => match rhs {
                Value::String(b) => Some(a == b),
                _ => None,
            },
        }
    }

    pub fn cmp_not_equal(&self, rhs: &Value) -> Option<bool> {
        self.cmp_equal(rhs).map(|eq| !eq)
    }

    pub fn cmp_less(&self, rhs: &Value) -> Option<bool> {
        self.numbers(rhs).map(|(a, b)| a < b)
    }

    pub fn cmp_less_equal(&self, rhs: &Value) -> Option<bool> {
        self.numbers(rhs).map(|(a, b)| a <= b)
    }

    pub fn cmp_greater(&self, rhs: &Value) -> Option<bool> {
        self.numbers(rhs).map(|(a, b)| a > b)
    }

    pub fn cmp_greater_equal(&self, rhs: &Value) -> Option<bool> {
        self.numbers(rhs).map(|(a, b)| a >= b)
    }

    fn numbers(&self, rhs: &Value) -> Option<(f64, f64)> {
        match (self, rhs) {
            (Value::Number(a), Value::Number(b)) => Some((*a, *b)),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Number(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "{}", s),
            Value::Boolean(b) => write!(f, "{}", b),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(!Value::NIL.is_truthy());
        assert!(!Value::FALSE.is_truthy());
        assert!(Value::TRUE.is_truthy());
        assert!(Value::Number(0.0).is_truthy());
        assert!(Value::from("").is_truthy());
    }

    #[test]
    fn test_string_concatenation() {
        let joined = Value::from("foo").add(&Value::from("bar"));
        assert_eq!(joined, Ok(Value::from("foobar")));
    }

    #[test]
    fn test_mixed_arithmetic_is_unsupported() {
        assert_eq!(
            Value::Number(1.0).add(&Value::from("s")),
            Err(OpError::Unsupported)
        );
        assert_eq!(
            Value::from("a").multiply(&Value::from("b")),
            Err(OpError::Unsupported)
        );
        assert_eq!(Value::TRUE.negate(), Err(OpError::Unsupported));
    }

    #[test]
    fn test_divide_by_zero() {
        assert_eq!(
            Value::Number(1.0).divide(&Value::Number(0.0)),
            Err(OpError::DivisionByZero)
        );
        assert_eq!(
            Value::Number(1.0).divide(&Value::Number(-0.0)),
            Err(OpError::DivisionByZero)
        );
        assert_eq!(
            Value::Number(3.0).divide(&Value::Number(2.0)),
            Ok(Value::Number(1.5))
        );
    }

    #[test]
    fn test_equality_rules() {
        assert_eq!(Value::NIL.cmp_equal(&Value::NIL), Some(true));
        assert_eq!(Value::NIL.cmp_equal(&Value::FALSE), Some(false));
        assert_eq!(Value::FALSE.cmp_equal(&Value::NIL), Some(false));
        assert_eq!(Value::TRUE.cmp_equal(&Value::Number(1.0)), Some(true));
        assert_eq!(Value::FALSE.cmp_equal(&Value::from("x")), Some(false));
        assert_eq!(Value::Number(2.0).cmp_equal(&Value::Number(2.0)), Some(true));
        assert_eq!(Value::from("a").cmp_equal(&Value::from("a")), Some(true));
        assert_eq!(Value::Number(1.0).cmp_equal(&Value::from("1")), None);
    }

    #[test]
    fn test_equality_is_decided_by_left_operand() {
        assert_eq!(Value::TRUE.cmp_equal(&Value::Number(1.0)), Some(true));
        assert_eq!(Value::Number(1.0).cmp_equal(&Value::TRUE), None);
        assert_eq!(Value::NIL.cmp_equal(&Value::Number(1.0)), Some(false));
        assert_eq!(Value::Number(1.0).cmp_equal(&Value::NIL), None);
        assert_eq!(Value::from("a").cmp_equal(&Value::NIL), None);
        assert_eq!(Value::from("a").cmp_not_equal(&Value::NIL), None);
    }

    #[test]
    fn test_ordering_only_for_numbers() {
        assert_eq!(Value::Number(1.0).cmp_less(&Value::Number(2.0)), Some(true));
        assert_eq!(
            Value::Number(2.0).cmp_greater_equal(&Value::Number(2.0)),
            Some(true)
        );
        assert_eq!(Value::from("a").cmp_less(&Value::from("b")), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Number(1.0).to_string(), "1");
        assert_eq!(Value::Number(1.5).to_string(), "1.5");
        assert_eq!(Value::Number(-0.0).to_string(), "-0");
        assert_eq!(Value::NIL.to_string(), "nil");
        assert_eq!(Value::TRUE.to_string(), "true");
        assert_eq!(Value::from("hi").to_string(), "hi");
    }
}
