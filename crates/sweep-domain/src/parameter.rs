//! Espacio de parámetros (`ParameterSpace`) y puntos concretos
//! (`ParameterPoint`).
//!
//! El espacio se valida al construirse: cada entrada tiene exactamente una de
//! las dos formas admitidas (`{value}` fijo o `{min, max, step}` rango entero
//! inclusivo). Por eso la expansión (ver `expansion`) no puede fallar una vez
//! que se tiene un `ParameterSpace`.
//!
//! El orden de declaración de las claves se conserva (`IndexMap`); de él
//! dependen tanto el orden de la expansión como el `JobName`.
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{DomainError, Scalar};

const RANGE_KEYS: [&str; 3] = ["min", "max", "step"];

/// Declaración de un parámetro del barrido.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterSpec {
    /// Valor único.
    Fixed { value: Scalar },
    /// Rango entero inclusivo `min..=max` con paso positivo.
    Range { min: i64, max: i64, step: i64 },
}

impl ParameterSpec {
    /// Construye un rango validando `step > 0`, `min <= max` y que la cantidad
    /// de valores quepa en `usize`.
    pub fn range(name: &str, min: i64, max: i64, step: i64) -> Result<Self, DomainError> {
        if step <= 0 {
            return Err(DomainError::invalid_parameter(name, format!("step must be positive, got {step}")));
        }
        if min > max {
            return Err(DomainError::invalid_parameter(name, format!("min ({min}) is greater than max ({max})")));
        }
        if usize::try_from(range_count(min, max, step)).is_err() {
            return Err(DomainError::invalid_parameter(name, "range has too many values"));
        }
        Ok(ParameterSpec::Range { min, max, step })
    }

    /// Interpreta la declaración JSON de un parámetro.
    pub fn from_json(name: &str, decl: &Value) -> Result<Self, DomainError> {
        let obj = decl.as_object()
                      .ok_or_else(|| DomainError::invalid_parameter(name, "declaration must be a mapping"))?;
        let has_value = obj.contains_key("value");
        let range_keys = RANGE_KEYS.iter().filter(|k| obj.contains_key(**k)).count();

        match (has_value, range_keys) {
            (true, 0) => {
                let value = Scalar::from_json(&obj["value"])
                    .ok_or_else(|| DomainError::invalid_parameter(name, "'value' must be a finite number"))?;
                Ok(ParameterSpec::Fixed { value })
            }
            (false, 3) => {
                let min = int_field(name, obj, "min")?;
                let max = int_field(name, obj, "max")?;
                let step = int_field(name, obj, "step")?;
                Self::range(name, min, max, step)
            }
            (true, _) => Err(DomainError::invalid_parameter(name, "declares both 'value' and a min/max/step range")),
            (false, _) => Err(DomainError::invalid_parameter(name,
                                                             "either min/max/step or value must be defined")),
        }
    }

    /// Cantidad de valores que aporta al producto cartesiano.
    pub fn len(&self) -> usize {
        match *self {
            ParameterSpec::Fixed { .. } => 1,
            ParameterSpec::Range { min, max, step } => usize::try_from(range_count(min, max, step)).unwrap_or(usize::MAX),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Valor `index`-ésimo (sin comprobar límites; `index < len()`).
    pub(crate) fn value_at(&self, index: usize) -> Scalar {
        match *self {
            ParameterSpec::Fixed { value } => value,
            ParameterSpec::Range { min, step, .. } => Scalar::Int(min + step * index as i64),
        }
    }

    /// Todos los valores en orden ascendente.
    pub fn values(&self) -> Vec<Scalar> {
        (0..self.len()).map(|i| self.value_at(i)).collect()
    }
}

// i128: evita overflow con rangos extremos
fn range_count(min: i64, max: i64, step: i64) -> i128 {
    (max as i128 - min as i128) / step as i128 + 1
}

fn int_field(name: &str, obj: &Map<String, Value>, key: &str) -> Result<i64, DomainError> {
    obj[key].as_i64()
            .ok_or_else(|| DomainError::invalid_parameter(name, format!("'{key}' must be an integer")))
}

/// Espacio de parámetros validado, en orden de declaración.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ParameterSpace {
    entries: IndexMap<String, ParameterSpec>,
}

impl ParameterSpace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Interpreta el mapping `parameter_space` de la configuración. Falla con
    /// la primera entrada inválida, identificando el parámetro.
    pub fn from_json(decl: &Value) -> Result<Self, DomainError> {
        let obj = decl.as_object()
                      .ok_or_else(|| DomainError::invalid_field("parameter_space", "must be a mapping"))?;
        let mut space = Self::new();
        for (name, entry) in obj {
            let spec = ParameterSpec::from_json(name, entry)?;
            space.entries.insert(name.clone(), spec);
        }
        space.check_size()
    }

    /// Añade (o reemplaza) un parámetro fijo.
    pub fn with_fixed(mut self, name: impl Into<String>, value: impl Into<Scalar>) -> Self {
        self.entries.insert(name.into(), ParameterSpec::Fixed { value: value.into() });
        self
    }

    /// Añade (o reemplaza) un rango entero inclusivo.
    pub fn with_range(mut self, name: impl Into<String>, min: i64, max: i64, step: i64) -> Result<Self, DomainError> {
        let name = name.into();
        let spec = ParameterSpec::range(&name, min, max, step)?;
        self.entries.insert(name, spec);
        self.check_size()
    }

    fn check_size(self) -> Result<Self, DomainError> {
        if self.checked_point_count().is_none() {
            return Err(DomainError::invalid_field("parameter_space",
                                                  "sweep too large: the number of points does not fit in usize"));
        }
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&ParameterSpec> {
        self.entries.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParameterSpec)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Número total de puntos del barrido (producto de longitudes). Satura
    /// en `usize::MAX`; los constructores validados nunca llegan a ese caso.
    pub fn point_count(&self) -> usize {
        self.checked_point_count().unwrap_or(usize::MAX)
    }

    /// `None` si el producto de longitudes desborda `usize`.
    pub fn checked_point_count(&self) -> Option<usize> {
        self.entries.values().try_fold(1usize, |acc, spec| acc.checked_mul(spec.len()))
    }

    /// Representación JSON en forma de declaración.
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl TryFrom<&Value> for ParameterSpace {
    type Error = DomainError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        Self::from_json(value)
    }
}

/// Asignación concreta de valores: una unidad de trabajo del barrido.
///
/// No expone API de mutación: una vez producido, el punto es inmutable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterPoint {
    values: IndexMap<String, Scalar>,
}

impl ParameterPoint {
    pub(crate) fn from_map(values: IndexMap<String, Scalar>) -> Self {
        Self { values }
    }

    pub fn get(&self, name: &str) -> Option<Scalar> {
        self.values.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Scalar)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Tabla nombre → real usada por el evaluador de fórmulas.
    pub fn bindings(&self) -> IndexMap<&str, f64> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_f64())).collect()
    }

    /// El punto visto como espacio de parámetros de entradas fijas
    /// (`{name: {value: v}}`), forma que toma en la config efectiva.
    pub fn as_space(&self) -> ParameterSpace {
        let entries = self.values
                          .iter()
                          .map(|(k, v)| (k.clone(), ParameterSpec::Fixed { value: *v }))
                          .collect();
        ParameterSpace { entries }
    }

    /// `{name: value}` plano.
    pub fn to_json(&self) -> Value {
        Value::Object(self.values.iter().map(|(k, v)| (k.clone(), v.to_json())).collect())
    }
}

impl<K, V> FromIterator<(K, V)> for ParameterPoint
    where K: Into<String>,
          V: Into<Scalar>
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self { values: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_both_shapes_in_declaration_order() {
        let space = ParameterSpace::from_json(&json!({
                        "MSQUARK": {"min": 800, "max": 1200, "step": 200},
                        "MLSP": {"value": 100}
                    })).expect("valid space");
        let names: Vec<&str> = space.names().collect();
        assert_eq!(names, vec!["MSQUARK", "MLSP"]);
        assert_eq!(space.point_count(), 3);
    }

    #[test]
    fn rejects_entry_without_shape_naming_the_parameter() {
        let err = ParameterSpace::from_json(&json!({"a": {"value": 1}, "b": {"min": 0, "max": 3}})).unwrap_err();
        match err {
            DomainError::InvalidParameter { name, .. } => assert_eq!(name, "b"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rejects_mixed_shapes_and_bad_steps() {
        assert!(ParameterSpace::from_json(&json!({"a": {"value": 1, "min": 0, "max": 1, "step": 1}})).is_err());
        assert!(ParameterSpace::from_json(&json!({"a": {"min": 0, "max": 4, "step": 0}})).is_err());
        assert!(ParameterSpace::from_json(&json!({"a": {"min": 5, "max": 4, "step": 1}})).is_err());
        assert!(ParameterSpace::from_json(&json!({"a": {"min": 0.5, "max": 4, "step": 1}})).is_err());
        assert!(ParameterSpace::from_json(&json!({"a": {"value": "x"}})).is_err());
        assert!(ParameterSpace::from_json(&json!(["a"])).is_err());
    }

    #[test]
    fn oversized_sweep_is_a_configuration_error() {
        let huge = json!({
            "a": {"min": 0, "max": 4_294_967_296_i64, "step": 1},
            "b": {"min": 0, "max": 4_294_967_296_i64, "step": 1}
        });
        match ParameterSpace::from_json(&huge).unwrap_err() {
            DomainError::InvalidField { field, .. } => assert_eq!(field, "parameter_space"),
            other => panic!("unexpected error: {other}"),
        }
        let built = ParameterSpace::new().with_range("a", 0, 1 << 40, 1).unwrap().with_range("b", 0, 1 << 40, 1);
        assert!(built.is_err());
        assert!(ParameterSpec::range("full", i64::MIN, i64::MAX, 1).is_err());
    }

    #[test]
    fn range_length_truncates_when_step_does_not_divide() {
        let spec = ParameterSpec::range("a", 0, 5, 2).unwrap();
        assert_eq!(spec.len(), 3);
        assert_eq!(spec.values(), vec![Scalar::Int(0), Scalar::Int(2), Scalar::Int(4)]);
    }

    #[test]
    fn point_as_space_uses_fixed_entries() {
        let point: ParameterPoint = vec![("a", Scalar::Int(2)), ("b", Scalar::Float(0.5))].into_iter().collect();
        assert_eq!(point.as_space().to_json(), json!({"a": {"value": 2}, "b": {"value": 0.5}}));
        assert_eq!(point.to_json(), json!({"a": 2, "b": 0.5}));
    }
}
