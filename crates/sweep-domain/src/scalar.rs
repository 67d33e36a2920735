// scalar.rs
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::fmt;

/// Valor escalar de un parámetro: entero (rangos) o real finito (valores
/// fijos declarados con decimales).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Int(i64),
    Float(f64),
}

impl Scalar {
    /// Convierte un `Value` JSON numérico en `Scalar`. Devuelve `None` para
    /// cualquier otro tipo o para reales no finitos.
    pub fn from_json(value: &Value) -> Option<Self> {
        let n = value.as_number()?;
        if let Some(i) = n.as_i64() {
            return Some(Scalar::Int(i));
        }
        n.as_f64().filter(|f| f.is_finite()).map(Scalar::Float)
    }

    /// Valor como real (binding para fórmulas y nombres de job).
    pub fn as_f64(&self) -> f64 {
        match *self {
            Scalar::Int(i) => i as f64,
            Scalar::Float(f) => f,
        }
    }

    pub fn to_json(&self) -> Value {
        match *self {
            Scalar::Int(i) => Value::from(i),
            Scalar::Float(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        }
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::Int(v)
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::Float(v)
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Int(i) => write!(f, "{i}"),
            Scalar::Float(v) => write!(f, "{v}"),
        }
    }
}
