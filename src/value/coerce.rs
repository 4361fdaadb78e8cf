//! The type compatibility table and explicit value conversions.

use crate::result::RuntimeError;
use crate::value::{Value, ValueType};

/// How a value of one type may flow into a slot of another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compatibility {
    /// Stored as-is.
    Assignable,
    /// Stored after conversion, which may still fail for out-of-range values.
    Convertible,
    /// Rejected.
    Incompatible,
}

impl Compatibility {
    /// Assignable or convertible.
    pub const fn is_compatible(self) -> bool {
        !matches!(self, Compatibility::Incompatible)
    }
}

impl ValueType {
    /// Whether a value of `source` can be stored in a slot of type `self`.
    pub const fn compatibility_from(self, source: ValueType) -> Compatibility {
        use ValueType::*;

        match (self, source) {
            (Void, _) => Compatibility::Incompatible,
            (Null, Null) | (Bool, Bool) | (Int, Int) | (Long, Long) => Compatibility::Assignable,
            (Float, Float) | (Double, Double) | (String, String) => Compatibility::Assignable,
            (String, Null) => Compatibility::Assignable,
            (target, source) if target.is_numeric() && source.is_numeric() => {
                Compatibility::Convertible
            }
            _ => Compatibility::Incompatible,
        }
    }

    /// Shorthand for `compatibility_from(source).is_compatible()`.
    pub const fn accepts(self, source: ValueType) -> bool {
        self.compatibility_from(source).is_compatible()
    }
}

impl Value {
    /// Convert between numeric types.
    ///
    /// Integer targets round floating sources half-to-even and reject values
    /// that are out of range or not finite. Non-numeric pairs are rejected as
    /// evaluation errors; use [`Value::coerce_to`] to consult the table first.
    pub fn convert_to(self, target: ValueType) -> Result<Value, RuntimeError> {
        if self.value_type() == target {
            return Ok(self);
        }

        let overflow = |value: &Value| RuntimeError::ConversionOverflow {
            value: value.to_string(),
            target,
        };

        match (target, &self) {
            (ValueType::Int, Value::Long(n)) => i32::try_from(*n)
                .map(Value::Int)
                .map_err(|_| overflow(&self)),
            (ValueType::Int, Value::Float(n)) => round_to_i32(f64::from(*n))
                .map(Value::Int)
                .ok_or_else(|| overflow(&self)),
            (ValueType::Int, Value::Double(n)) => round_to_i32(*n)
                .map(Value::Int)
                .ok_or_else(|| overflow(&self)),
            (ValueType::Long, Value::Int(n)) => Ok(Value::Long(i64::from(*n))),
            (ValueType::Long, Value::Float(n)) => round_to_i64(f64::from(*n))
                .map(Value::Long)
                .ok_or_else(|| overflow(&self)),
            (ValueType::Long, Value::Double(n)) => round_to_i64(*n)
                .map(Value::Long)
                .ok_or_else(|| overflow(&self)),
            (ValueType::Float, Value::Int(n)) => Ok(Value::Float(*n as f32)),
            (ValueType::Float, Value::Long(n)) => Ok(Value::Float(*n as f32)),
            (ValueType::Float, Value::Double(n)) => {
                if n.is_finite() && n.abs() > f64::from(f32::MAX) {
                    Err(overflow(&self))
                } else {
                    Ok(Value::Float(*n as f32))
                }
            }
            (ValueType::Double, Value::Int(n)) => Ok(Value::Double(f64::from(*n))),
            (ValueType::Double, Value::Long(n)) => Ok(Value::Double(*n as f64)),
            (ValueType::Double, Value::Float(n)) => Ok(Value::Double(f64::from(*n))),
            _ => Err(RuntimeError::Evaluation(format!(
                "Cannot convert {} to {}",
                self.value_type(),
                target
            ))),
        }
    }
}

fn round_to_i32(value: f64) -> Option<i32> {
    let rounded = value.round_ties_even();
    let in_range = rounded >= f64::from(i32::MIN) && rounded <= f64::from(i32::MAX);
    (value.is_finite() && in_range).then_some(rounded as i32)
}

fn round_to_i64(value: f64) -> Option<i64> {
    // 2^63, the first value past i64::MAX
    const UPPER: f64 = 9_223_372_036_854_775_808.0;
    let rounded = value.round_ties_even();
    let in_range = rounded >= i64::MIN as f64 && rounded < UPPER;
    (value.is_finite() && in_range).then_some(rounded as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_types_are_assignable() {
        for ty in ValueType::ALL.iter().filter(|t| **t != ValueType::Void) {
            assert_eq!(ty.compatibility_from(*ty), Compatibility::Assignable, "{ty}");
        }
    }

    #[test]
    fn test_void_accepts_nothing() {
        for ty in ValueType::ALL {
            assert_eq!(ValueType::Void.compatibility_from(ty), Compatibility::Incompatible);
        }
    }

    #[test]
    fn test_null_only_flows_into_string() {
        assert!(ValueType::String.accepts(ValueType::Null));
        assert!(!ValueType::Int.accepts(ValueType::Null));
        assert!(!ValueType::Bool.accepts(ValueType::Null));
    }

    #[test]
    fn test_numeric_pairs_are_convertible() {
        assert_eq!(
            ValueType::Double.compatibility_from(ValueType::Int),
            Compatibility::Convertible
        );
        assert_eq!(
            ValueType::Int.compatibility_from(ValueType::Float),
            Compatibility::Convertible
        );
        assert!(!ValueType::Int.accepts(ValueType::Bool));
        assert!(!ValueType::String.accepts(ValueType::Int));
    }

    #[test]
    fn test_convert_rounds_half_to_even() {
        assert_eq!(Value::Double(2.5).convert_to(ValueType::Int), Ok(Value::Int(2)));
        assert_eq!(Value::Double(3.5).convert_to(ValueType::Int), Ok(Value::Int(4)));
        assert_eq!(Value::Float(-1.5).convert_to(ValueType::Long), Ok(Value::Long(-2)));
    }

    #[test]
    fn test_convert_out_of_range() {
        assert!(matches!(
            Value::Long(i64::from(i32::MAX) + 1).convert_to(ValueType::Int),
            Err(RuntimeError::ConversionOverflow { .. })
        ));
        assert!(Value::Double(f64::NAN).convert_to(ValueType::Int).is_err());
        assert!(Value::Double(1e300).convert_to(ValueType::Float).is_err());
    }

    #[test]
    fn test_coerce_incompatible_is_none() {
        assert!(Value::Bool(true).coerce_to(ValueType::Int).is_none());
        assert_eq!(
            Value::Int(4).coerce_to(ValueType::Double),
            Some(Ok(Value::Double(4.0)))
        );
    }
}
