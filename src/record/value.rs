//! Column values and ordering values

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A single column value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn approx_size(&self) -> usize {
        let heap = match self {
            Value::Str(s) => s.len(),
            Value::Bytes(b) => b.len(),
            _ => 0,
        };
        std::mem::size_of::<Value>() + heap
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Str(s) => write!(f, "{}", s),
            Value::Bytes(b) => write!(f, "0x{}", b.iter().map(|x| format!("{:02x}", x)).collect::<String>()),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

// =============================================================================
// Ordering Value
// =============================================================================

/// Precombine value deciding which of two versions of a key is newer.
///
/// Totally ordered: `Null` < numbers < `Str`. `Int` and `Float` compare by
/// numeric value (floats among themselves with `f64::total_cmp`); when an
/// `Int` and a `Float` are numerically equal the `Float` sorts higher.
/// A record without an ordering field carries `Null`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub enum OrderingValue {
    #[default]
    Null,
    Int(i64),
    Float(f64),
    Str(String),
}

impl OrderingValue {
    fn rank(&self) -> u8 {
        match self {
            OrderingValue::Null => 0,
            OrderingValue::Int(_) => 1,
            OrderingValue::Float(_) => 2,
            OrderingValue::Str(_) => 3,
        }
    }

    pub fn approx_size(&self) -> usize {
        match self {
            OrderingValue::Str(s) => std::mem::size_of::<Self>() + s.len(),
            _ => std::mem::size_of::<Self>(),
        }
    }
}

impl Ord for OrderingValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (OrderingValue::Int(a), OrderingValue::Int(b)) => a.cmp(b),
            (OrderingValue::Float(a), OrderingValue::Float(b)) => a.total_cmp(b),
            (OrderingValue::Str(a), OrderingValue::Str(b)) => a.cmp(b),
            (OrderingValue::Int(a), OrderingValue::Float(b)) => {
                cmp_int_float(*a, *b).then(Ordering::Less)
            }
            (OrderingValue::Float(a), OrderingValue::Int(b)) => {
                cmp_int_float(*b, *a).reverse().then(Ordering::Greater)
            }
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

/// Exact comparison of an integer with a float, consistent with `total_cmp`
/// placement of NaN (negative NaN lowest, positive NaN highest)
fn cmp_int_float(a: i64, b: f64) -> Ordering {
    // 2^63, the first float above i64::MAX
    const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;

    if b.is_nan() {
        return if b.is_sign_negative() {
            Ordering::Greater
        } else {
            Ordering::Less
        };
    }
    if b >= I64_BOUND {
        return Ordering::Less;
    }
    if b < -I64_BOUND {
        return Ordering::Greater;
    }

    let whole = b.trunc();
    match a.cmp(&(whole as i64)) {
        Ordering::Equal if b > whole => Ordering::Less,
        Ordering::Equal if b < whole => Ordering::Greater,
        other => other,
    }
}

impl PartialOrd for OrderingValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for OrderingValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for OrderingValue {}

impl From<i64> for OrderingValue {
    fn from(v: i64) -> Self {
        OrderingValue::Int(v)
    }
}

impl From<f64> for OrderingValue {
    fn from(v: f64) -> Self {
        OrderingValue::Float(v)
    }
}

impl From<&str> for OrderingValue {
    fn from(v: &str) -> Self {
        OrderingValue::Str(v.to_string())
    }
}

impl fmt::Display for OrderingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderingValue::Null => write!(f, "null"),
            OrderingValue::Int(i) => write!(f, "{}", i),
            OrderingValue::Float(x) => write!(f, "{}", x),
            OrderingValue::Str(s) => write!(f, "{}", s),
        }
    }
}
