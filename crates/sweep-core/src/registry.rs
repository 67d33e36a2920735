//! Registro de steps por nombre.
//!
//! El registro se construye desde una tabla explícita de `StepEntry`; no
//! hay descubrimiento por introspección. La clave de registro (en
//! minúsculas) manda sobre el `name()` interno del step.
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::fmt;

use crate::errors::{RegistryError, StepError};
use crate::step::Step;

/// Ajuste con el que una entrada del workflow elige otro step registrado
/// (`"madgraph": {"uses": "command", ...}`).
pub const USES_KEY: &str = "uses";

/// Construye un step a partir de sus ajustes.
pub type StepFactory = fn(&Map<String, Value>) -> Result<Box<dyn Step>, StepError>;

#[derive(Clone, Copy)]
pub struct StepEntry {
    pub name: &'static str,
    pub factory: StepFactory,
}

impl StepEntry {
    pub const fn new(name: &'static str, factory: StepFactory) -> Self {
        Self { name, factory }
    }
}

#[derive(Clone, Default)]
pub struct StepRegistry {
    factories: IndexMap<String, StepFactory>,
}

impl fmt::Debug for StepEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepEntry").field("name", &self.name).finish_non_exhaustive()
    }
}

impl fmt::Debug for StepRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.factories.keys()).finish()
    }
}

impl StepRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registro a partir de una tabla. Una clave repetida (sin distinguir
    /// mayúsculas) es un error.
    pub fn discover(entries: &[StepEntry]) -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        for entry in entries {
            registry.register(entry.name, entry.factory)?;
        }
        Ok(registry)
    }

    pub fn register(&mut self, name: &str, factory: StepFactory) -> Result<(), RegistryError> {
        let key = name.to_lowercase();
        if self.factories.contains_key(&key) {
            return Err(RegistryError::DuplicateStep(key));
        }
        log::debug!("registered step '{key}'");
        self.factories.insert(key, factory);
        Ok(())
    }

    /// Instancia el step `name` (sin distinguir mayúsculas). `config` debe ser
    /// un mapping; `null` equivale a un mapping vacío.
    pub fn get(&self, name: &str, config: &Value) -> Result<Box<dyn Step>, RegistryError> {
        let key = name.to_lowercase();
        let factory = self.factories.get(&key).ok_or_else(|| RegistryError::UnknownStep { name: name.to_string(),
                                                                                          available: self.names() })?;
        let empty = Map::new();
        let settings = match config {
            Value::Object(map) => map,
            Value::Null => &empty,
            other => {
                return Err(RegistryError::InvalidStepConfig { step: key,
                                                              reason: format!("expected a mapping, got {other}") })
            }
        };
        factory(settings).map_err(|source| RegistryError::Construction { step: key, source })
    }

    /// Instancia la entrada `name` del workflow. Si sus ajustes llevan
    /// `uses`, se construye ese step y, salvo que ya venga, se añade
    /// `name` a los ajustes para que el step trabaje bajo ese nombre.
    pub fn resolve(&self, name: &str, settings: &Value) -> Result<Box<dyn Step>, RegistryError> {
        let Some(target) = settings.get(USES_KEY) else {
            return self.get(name, settings);
        };
        let target = target.as_str().ok_or_else(|| RegistryError::InvalidStepConfig { step: name.to_lowercase(),
                                                                                       reason: format!("'{USES_KEY}' must be a step name") })?;
        let mut settings = settings.clone();
        if let Value::Object(map) = &mut settings {
            map.entry("name").or_insert_with(|| Value::String(name.to_lowercase()));
        }
        self.get(target, &settings)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(&name.to_lowercase())
    }

    /// Claves registradas en orden de registro.
    pub fn names(&self) -> Vec<String> {
        self.factories.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}
