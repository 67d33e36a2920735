//! Lectura tipada de los ajustes de un step.
//!
//! Cada step built-in declara un struct `Deserialize`; los campos
//! desconocidos se rechazan para que un error tipográfico en la config no
//! pase desapercibido.
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use sweep_core::{StepError, USES_KEY};

/// Deserializa `settings` en `T`. La clave `uses` la consume el registro y
/// no llega al struct del step.
pub(crate) fn parse<T: DeserializeOwned>(step: &str, settings: &Map<String, Value>) -> Result<T, StepError> {
    let mut settings = settings.clone();
    settings.remove(USES_KEY);
    serde_json::from_value(Value::Object(settings)).map_err(|e| StepError::configuration(step, e.to_string()))
}

pub(crate) fn default_true() -> bool {
    true
}

/// Formato `%.8E`: mantisa con 8 decimales y exponente con signo y al menos
/// dos dígitos (`800 → 8.00000000E+02`).
pub fn format_scientific(value: f64) -> String {
    let raw = format!("{value:.8E}");
    match raw.split_once('E') {
        Some((mantissa, exp)) => {
            let (sign, digits) = match exp.strip_prefix('-') {
                Some(d) => ('-', d),
                None => ('+', exp),
            };
            format!("{mantissa}E{sign}{digits:0>2}")
        }
        None => raw,
    }
}

/// Número para líneas de comando: entero si no tiene parte fraccionaria.
pub fn format_plain(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scientific_matches_printf() {
        assert_eq!(format_scientific(800.0), "8.00000000E+02");
        assert_eq!(format_scientific(0.00125), "1.25000000E-03");
        assert_eq!(format_scientific(-1.5e20), "-1.50000000E+20");
        assert_eq!(format_scientific(0.0), "0.00000000E+00");
    }

    #[test]
    fn plain_drops_integral_fraction() {
        assert_eq!(format_plain(200.0), "200");
        assert_eq!(format_plain(12.5), "12.5");
    }
}
