//! Nombres de job deterministas.
//!
//! Formato: `{topology}.{v1}_{v2}_..._{vn}.{energy}`, donde cada `vi` es la
//! codificación compacta del valor i-ésimo del punto (orden de declaración).
//! Ejemplo: `SS_direct.100p0_50p0.13p0`.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::ParameterPoint;

/// Dígitos significativos usados al renderizar reales.
pub const SIGNIFICANT_DIGITS: usize = 10;
/// Separador que reemplaza al punto decimal.
pub const DECIMAL_SEPARATOR: char = 'p';

/// Identificador de un punto del barrido; también nombre de su directorio y
/// prefijo de sus archivos de resultados.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobName(String);

impl JobName {
    /// Deriva el nombre de un punto a partir de la topología y la energía.
    pub fn new(topology: &str, point: &ParameterPoint, energy: f64) -> Self {
        let values: Vec<String> = point.iter().map(|(_, v)| encode_scalar(v.as_f64())).collect();
        JobName(format!("{}.{}.{}", sanitize_topology(topology), values.join("_"), encode_scalar(energy)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for JobName {
    fn from(raw: String) -> Self {
        JobName(raw)
    }
}

impl fmt::Display for JobName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for JobName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl AsRef<Path> for JobName {
    fn as_ref(&self) -> &Path {
        Path::new(&self.0)
    }
}

/// Atajo funcional de `JobName::new`.
pub fn job_name(topology: &str, point: &ParameterPoint, energy: f64) -> JobName {
    JobName::new(topology, point, energy)
}

/// Codificación compacta de un real: `125.5 → 125p5`, `125.0 → 125p0`,
/// `13 → 13p0`. Total sobre cualquier `f64`.
///
/// Las formas científicas (`|v| >= 1e10` o `|v| < 1e-4`) conservan el
/// exponente completo tras la mantisa: `1e20 → 1p0e+20`,
/// `1.5e20 → 1p5e+20`. Los layouts heredados usaban `1e+20p0` y recortaban
/// los ceros del exponente (`1p5e+2`); un barrido con valores en ese rango
/// no reutiliza directorios con aquel formato. En el rango habitual de
/// masas, anchuras y energías ambas codificaciones coinciden.
pub fn encode_scalar(value: f64) -> String {
    if value.is_nan() {
        return format!("nan{DECIMAL_SEPARATOR}0");
    }
    if value.is_infinite() {
        let sign = if value < 0.0 { "-" } else { "" };
        return format!("{sign}inf{DECIMAL_SEPARATOR}0");
    }
    let rendered = format_general(value, SIGNIFICANT_DIGITS);
    let (mantissa, exponent) = match rendered.find('e') {
        Some(pos) => rendered.split_at(pos),
        None => (rendered.as_str(), ""),
    };
    match mantissa.split_once('.') {
        Some((int, dec)) => {
            let dec = dec.trim_end_matches('0');
            let dec = if dec.is_empty() { "0" } else { dec };
            format!("{int}{DECIMAL_SEPARATOR}{dec}{exponent}")
        }
        None => format!("{mantissa}{DECIMAL_SEPARATOR}0{exponent}"),
    }
}

/// Renderiza como `%.{precision}g` de C: notación fija si el exponente
/// decimal está en `[-4, precision)`, científica en otro caso; sin ceros
/// finales.
fn format_general(value: f64, precision: usize) -> String {
    if value == 0.0 {
        return if value.is_sign_negative() { "-0".into() } else { "0".into() };
    }
    let precision = precision.max(1);
    let sci = format!("{:.*e}", precision - 1, value);
    let (mantissa, exp) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
    let exp: i32 = exp.parse().unwrap_or(0);

    if exp < -4 || exp >= precision as i32 {
        let mantissa = strip_fraction_zeros(mantissa);
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{mantissa}e{sign}{:02}", exp.abs())
    } else {
        let decimals = (precision as i32 - 1 - exp).max(0) as usize;
        strip_fraction_zeros(&format!("{:.*}", decimals, value)).to_string()
    }
}

fn strip_fraction_zeros(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

/// Sustituye caracteres que no son seguros en nombres de archivo.
fn sanitize_topology(topology: &str) -> String {
    if topology.is_empty() {
        return "unknown".to_string();
    }
    topology.chars()
            .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '+' | '-') { c } else { '_' })
            .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Scalar;

    #[test]
    fn compact_encoding_examples() {
        assert_eq!(encode_scalar(125.5), "125p5");
        assert_eq!(encode_scalar(125.0), "125p0");
        assert_eq!(encode_scalar(13.0), "13p0");
        assert_eq!(encode_scalar(13.6), "13p6");
        assert_eq!(encode_scalar(0.0), "0p0");
        assert_eq!(encode_scalar(-2.25), "-2p25");
    }

    #[test]
    fn compact_encoding_limits_significant_digits() {
        assert_eq!(encode_scalar(1.0 / 3.0), "0p3333333333");
        assert_eq!(encode_scalar(0.0001), "0p0001");
        assert_eq!(encode_scalar(0.00001), "1p0e-05");
        assert_eq!(encode_scalar(1.5e20), "1p5e+20");
        assert_eq!(encode_scalar(12345678901.0), "1p23456789e+10");
    }

    #[test]
    fn scientific_forms_keep_the_whole_exponent() {
        assert_eq!(encode_scalar(1e20), "1p0e+20");
        assert_eq!(encode_scalar(1.5e200), "1p5e+200");
        assert_ne!(encode_scalar(1.5e20), encode_scalar(1.5e200));
        assert_eq!(encode_scalar(9999999999.0), "9999999999p0");
    }

    #[test]
    fn compact_encoding_is_total() {
        assert_eq!(encode_scalar(f64::NAN), "nanp0");
        assert_eq!(encode_scalar(f64::NEG_INFINITY), "-infp0");
    }

    #[test]
    fn job_name_encodes_every_value_in_order() {
        let point: ParameterPoint = vec![("MSQUARK", Scalar::Int(100)), ("MLSP", Scalar::Float(50.5))].into_iter().collect();
        let name = JobName::new("SS_direct", &point, 13.0);
        assert_eq!(name.as_str(), "SS_direct.100p0_50p5.13p0");
    }

    #[test]
    fn topology_is_made_filesystem_safe() {
        let point: ParameterPoint = vec![("a", Scalar::Int(1))].into_iter().collect();
        assert_eq!(JobName::new("a/b c", &point, 13.6).as_str(), "a_b_c.1p0.13p6");
        assert_eq!(JobName::new("", &point, 8.0).as_str(), "unknown.1p0.8p0");
    }
}
