//! Configuración del barrido (`WorkflowConfig`).
//!
//! Se construye desde un mapping JSON. Claves reconocidas: `topology`,
//! `energy`, `parameter_space`, `workflow`, `steps`, `workdir`; el resto se
//! conserva en `extra` sin interpretar.
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

use crate::{expand, DomainError, JobName, ParameterPoint, ParameterSpace};

pub const DEFAULT_WORKDIR: &str = "./all_points_runs";

const KNOWN_KEYS: [&str; 6] = ["topology", "energy", "parameter_space", "workflow", "steps", "workdir"];

#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowConfig {
    pub topology: String,
    pub energy: f64,
    pub workdir: PathBuf,
    pub parameter_space: ParameterSpace,
    /// Orden de ejecución de los steps (nombres de registro).
    pub workflow: Vec<String>,
    /// Ajustes por step: nombre → mapping.
    pub steps: Map<String, Value>,
    pub extra: Map<String, Value>,
}

impl WorkflowConfig {
    pub fn from_value(value: &Value) -> Result<Self, DomainError> {
        let obj = value.as_object()
                       .ok_or_else(|| DomainError::invalid_field("<root>", "configuration must be a mapping"))?;

        let topology = obj.get("topology")
                          .ok_or_else(|| DomainError::MissingField("topology".into()))?
                          .as_str()
                          .ok_or_else(|| DomainError::invalid_field("topology", "must be a string"))?
                          .to_string();

        let energy = obj.get("energy")
                        .ok_or_else(|| DomainError::MissingField("energy".into()))?
                        .as_f64()
                        .filter(|e| e.is_finite())
                        .ok_or_else(|| DomainError::invalid_field("energy", "must be a finite number"))?;

        let parameter_space =
            ParameterSpace::from_json(obj.get("parameter_space")
                                         .ok_or_else(|| DomainError::MissingField("parameter_space".into()))?)?;

        let workflow = parse_workflow(obj.get("workflow")
                                         .ok_or_else(|| DomainError::MissingField("workflow".into()))?)?;

        let steps = match obj.get("steps") {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(m)) => m.clone(),
            Some(_) => return Err(DomainError::invalid_field("steps", "must be a mapping of step name to settings")),
        };

        let workdir = match obj.get("workdir") {
            None | Some(Value::Null) => PathBuf::from(DEFAULT_WORKDIR),
            Some(Value::String(s)) if !s.is_empty() => PathBuf::from(s),
            Some(_) => return Err(DomainError::invalid_field("workdir", "must be a non-empty string")),
        };

        let extra = obj.iter()
                       .filter(|(k, _)| !KNOWN_KEYS.contains(&k.as_str()))
                       .map(|(k, v)| (k.clone(), v.clone()))
                       .collect();

        Ok(Self { topology,
                  energy,
                  workdir,
                  parameter_space,
                  workflow,
                  steps,
                  extra })
    }

    /// Lee y valida un archivo JSON. No modifica ningún estado global.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, DomainError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let value: Value = serde_json::from_str(&raw)?;
        Self::from_value(&value)
    }

    /// Copia cuyo `parameter_space` es el punto visto como entradas fijas.
    pub fn for_point(&self, point: &ParameterPoint) -> Self {
        Self { parameter_space: point.as_space(),
               ..self.clone() }
    }

    /// Ajustes del step `name`. Busca primero la clave exacta y luego sin
    /// distinguir mayúsculas.
    pub fn step_settings(&self, name: &str) -> Option<&Value> {
        self.steps.get(name).or_else(|| {
                                 self.steps
                                     .iter()
                                     .find(|(k, _)| k.eq_ignore_ascii_case(name))
                                     .map(|(_, v)| v)
                             })
    }

    pub fn points(&self) -> Vec<ParameterPoint> {
        expand(&self.parameter_space)
    }

    pub fn job_name(&self, point: &ParameterPoint) -> JobName {
        JobName::new(&self.topology, point, self.energy)
    }

    /// Mapping completo, en la forma en que se leyó.
    pub fn to_json(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("topology".into(), Value::String(self.topology.clone()));
        obj.insert("energy".into(), serde_json::Number::from_f64(self.energy).map(Value::Number).unwrap_or(Value::Null));
        obj.insert("workdir".into(), Value::String(self.workdir.to_string_lossy().into_owned()));
        obj.insert("parameter_space".into(), self.parameter_space.to_json());
        obj.insert("workflow".into(), Value::Array(self.workflow.iter().cloned().map(Value::String).collect()));
        obj.insert("steps".into(), Value::Object(self.steps.clone()));
        for (k, v) in &self.extra {
            obj.insert(k.clone(), v.clone());
        }
        Value::Object(obj)
    }
}

fn parse_workflow(value: &Value) -> Result<Vec<String>, DomainError> {
    let items = value.as_array()
                     .ok_or_else(|| DomainError::invalid_field("workflow", "must be a list of step names"))?;
    if items.is_empty() {
        return Err(DomainError::invalid_field("workflow", "must name at least one step"));
    }
    items.iter()
         .map(|item| {
             item.as_str()
                 .filter(|s| !s.trim().is_empty())
                 .map(str::to_string)
                 .ok_or_else(|| DomainError::invalid_field("workflow", format!("invalid step name {item}")))
         })
         .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Scalar;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "topology": "SS_direct",
            "energy": 13.6,
            "parameter_space": {"MSQUARK": {"min": 800, "max": 1000, "step": 100}, "MLSP": {"value": 50}},
            "workflow": ["slha", "madgraph"],
            "steps": {"slha": {"template": "card.tpl"}},
            "campaign": "test"
        })
    }

    #[test]
    fn parses_known_keys_and_keeps_extra() {
        let cfg = WorkflowConfig::from_value(&sample()).unwrap();
        assert_eq!(cfg.topology, "SS_direct");
        assert_eq!(cfg.workdir, PathBuf::from(DEFAULT_WORKDIR));
        assert_eq!(cfg.workflow, vec!["slha", "madgraph"]);
        assert_eq!(cfg.extra.get("campaign"), Some(&json!("test")));
        assert_eq!(cfg.points().len(), 3);
        assert_eq!(cfg.step_settings("SLHA"), Some(&json!({"template": "card.tpl"})));
        assert_eq!(cfg.step_settings("madgraph"), None);
    }

    #[test]
    fn missing_and_invalid_fields_are_reported() {
        let mut v = sample();
        v.as_object_mut().unwrap().remove("energy");
        assert!(matches!(WorkflowConfig::from_value(&v), Err(DomainError::MissingField(f)) if f == "energy"));

        let mut v = sample();
        v["workflow"] = json!([]);
        assert!(matches!(WorkflowConfig::from_value(&v), Err(DomainError::InvalidField { field, .. }) if field == "workflow"));

        let mut v = sample();
        v["parameter_space"]["MLSP"] = json!({"min": 1});
        assert!(matches!(WorkflowConfig::from_value(&v), Err(DomainError::InvalidParameter { name, .. }) if name == "MLSP"));
    }

    #[test]
    fn for_point_fixes_the_parameter_space() {
        let cfg = WorkflowConfig::from_value(&sample()).unwrap();
        let point = cfg.points().remove(1);
        let effective = cfg.for_point(&point);
        assert_eq!(effective.parameter_space.to_json(), json!({"MSQUARK": {"value": 900}, "MLSP": {"value": 50}}));
        assert_eq!(effective.points(), vec![point.clone()]);
        assert_eq!(point.get("MSQUARK"), Some(Scalar::Int(900)));
        assert_eq!(cfg.job_name(&point).as_str(), "SS_direct.900p0_50p0.13p6");
    }

    #[test]
    fn from_path_reads_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sweep.json");
        std::fs::write(&path, sample().to_string()).unwrap();
        let cfg = WorkflowConfig::from_path(&path).unwrap();
        assert_eq!(cfg.to_json()["campaign"], json!("test"));
        assert!(matches!(WorkflowConfig::from_path(dir.path().join("nope.json")), Err(DomainError::Io(_))));
    }
}
