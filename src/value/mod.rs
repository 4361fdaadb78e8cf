//! Runtime values and the types that describe them.

mod coerce;

pub use coerce::Compatibility;

use std::fmt;

use crate::result::RuntimeError;

/// The closed set of types a script can declare or produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    /// Return type of functions that produce nothing.
    Void,
    /// Type of the `null` literal.
    Null,
    /// `bool`
    Bool,
    /// `int` (32-bit signed)
    Int,
    /// `long` (64-bit signed)
    Long,
    /// `float` (32-bit)
    Float,
    /// `double` (64-bit)
    Double,
    /// `string`
    String,
}

impl ValueType {
    /// Every type, in declaration order. Used to enumerate the compatibility table.
    pub const ALL: [ValueType; 8] = [
        ValueType::Void,
        ValueType::Null,
        ValueType::Bool,
        ValueType::Int,
        ValueType::Long,
        ValueType::Float,
        ValueType::Double,
        ValueType::String,
    ];

    /// Look up a type by its script keyword (`int`, `string`, ...).
    pub fn from_keyword(word: &str) -> Option<Self> {
        match word {
            "void" => Some(ValueType::Void),
            "bool" => Some(ValueType::Bool),
            "int" => Some(ValueType::Int),
            "long" => Some(ValueType::Long),
            "float" => Some(ValueType::Float),
            "double" => Some(ValueType::Double),
            "string" => Some(ValueType::String),
            _ => None,
        }
    }

    /// The script keyword for this type.
    pub fn name(&self) -> &'static str {
        match self {
            ValueType::Void => "void",
            ValueType::Null => "null",
            ValueType::Bool => "bool",
            ValueType::Int => "int",
            ValueType::Long => "long",
            ValueType::Float => "float",
            ValueType::Double => "double",
            ValueType::String => "string",
        }
    }

    /// Whether the type is one of the four numeric types.
    pub const fn is_numeric(&self) -> bool {
        matches!(
            self,
            ValueType::Int | ValueType::Long | ValueType::Float | ValueType::Double
        )
    }

    /// Value a declaration of this type holds when it has no initializer.
    pub fn default_value(&self) -> Value {
        match self {
            ValueType::Void | ValueType::Null | ValueType::String => Value::Null,
            ValueType::Bool => Value::Bool(false),
            ValueType::Int => Value::Int(0),
            ValueType::Long => Value::Long(0),
            ValueType::Float => Value::Float(0.0),
            ValueType::Double => Value::Double(0.0),
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A runtime value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// The `null` reference.
    Null,
    /// Boolean value.
    Bool(bool),
    /// 32-bit integer.
    Int(i32),
    /// 64-bit integer.
    Long(i64),
    /// 32-bit float.
    Float(f32),
    /// 64-bit float.
    Double(f64),
    /// String value.
    String(String),
}

impl Value {
    /// The runtime type of this value.
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Null => ValueType::Null,
            Value::Bool(_) => ValueType::Bool,
            Value::Int(_) => ValueType::Int,
            Value::Long(_) => ValueType::Long,
            Value::Float(_) => ValueType::Float,
            Value::Double(_) => ValueType::Double,
            Value::String(_) => ValueType::String,
        }
    }

    /// Coerce this value into `target`, following the compatibility table.
    ///
    /// Assignable values come back untouched; convertible values are converted;
    /// anything else yields `None` so callers can build a context-specific error.
    pub fn coerce_to(self, target: ValueType) -> Option<Result<Value, RuntimeError>> {
        match target.compatibility_from(self.value_type()) {
            Compatibility::Assignable => Some(Ok(self)),
            Compatibility::Convertible => Some(self.convert_to(target)),
            Compatibility::Incompatible => None,
        }
    }

    /// Borrow as `bool`, if it is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Borrow as `&str`, if it is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Long(n) => write!(f, "{}", n),
            Value::Float(n) => write!(f, "{}", n),
            Value::Double(n) => write!(f, "{}", n),
            Value::String(s) => f.write_str(s),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Long(n)
    }
}

impl From<f32> for Value {
    fn from(n: f32) -> Self {
        Value::Float(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Double(n)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

/// Rust types that a script value can be extracted as.
///
/// Reads and return-value pops coerce to [`FromValue::VALUE_TYPE`] first, so
/// `from_value` only ever sees a value of exactly that type.
pub trait FromValue: Sized {
    /// The script type this Rust type corresponds to.
    const VALUE_TYPE: ValueType;

    /// Extract from a value already coerced to [`FromValue::VALUE_TYPE`].
    fn from_value(value: Value) -> Option<Self>;
}

macro_rules! impl_from_value {
    ($ty:ty, $value_type:ident, $variant:ident) => {
        impl FromValue for $ty {
            const VALUE_TYPE: ValueType = ValueType::$value_type;

            fn from_value(value: Value) -> Option<Self> {
                match value {
                    Value::$variant(inner) => Some(inner),
                    _ => None,
                }
            }
        }
    };
}

impl_from_value!(bool, Bool, Bool);
impl_from_value!(i32, Int, Int);
impl_from_value!(i64, Long, Long);
impl_from_value!(f32, Float, Float);
impl_from_value!(f64, Double, Double);

impl FromValue for () {
    const VALUE_TYPE: ValueType = ValueType::Void;

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Null => Some(()),
            _ => None,
        }
    }
}

impl FromValue for Option<String> {
    const VALUE_TYPE: ValueType = ValueType::String;

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(Some(s)),
            Value::Null => Some(None),
            _ => None,
        }
    }
}

/// Rejects `null`; use `Option<String>` when a function may return it.
impl FromValue for String {
    const VALUE_TYPE: ValueType = ValueType::String;

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

/// An immutable `(type, key, value)` record: the unit of variable storage.
///
/// Updating a variable replaces its record with a fresh one from
/// [`ScriptValue::update_value`]; records are never mutated in place.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptValue {
    value_type: ValueType,
    key: String,
    value: Value,
}

impl ScriptValue {
    /// Create a record.
    pub fn new(value_type: ValueType, key: impl Into<String>, value: Value) -> Self {
        Self {
            value_type,
            key: key.into(),
            value,
        }
    }

    /// Declared type of the variable.
    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    /// Variable name.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Current value.
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Consume the record, keeping only the value.
    pub fn into_value(self) -> Value {
        self.value
    }

    /// A new record with the same type and key holding `value`.
    pub fn update_value(&self, value: Value) -> ScriptValue {
        ScriptValue {
            value_type: self.value_type,
            key: self.key.clone(),
            value,
        }
    }
}
