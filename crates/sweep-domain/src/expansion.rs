//! Expansión del espacio de parámetros en puntos concretos.
//!
//! El resultado es el producto cartesiano en orden row-major: el último
//! parámetro declarado varía más rápido. Este orden es parte del contrato,
//! ya que determina la estabilidad de los `JobName` entre re-ejecuciones.
use indexmap::IndexMap;

use crate::{ParameterPoint, ParameterSpace, ParameterSpec};

/// Iterador perezoso sobre los puntos de un `ParameterSpace`.
///
/// Funciona como un odómetro: `cursor[i]` es el índice del valor actual del
/// parámetro `i`; se incrementa desde el final.
#[derive(Debug, Clone)]
pub struct Expansion<'a> {
    specs: Vec<(&'a str, &'a ParameterSpec)>,
    cursor: Vec<usize>,
    remaining: usize,
}

impl<'a> Expansion<'a> {
    pub fn new(space: &'a ParameterSpace) -> Self {
        let specs: Vec<(&str, &ParameterSpec)> = space.iter().collect();
        Self { cursor: vec![0; specs.len()],
               remaining: space.point_count(),
               specs }
    }

    fn advance(&mut self) {
        for i in (0..self.cursor.len()).rev() {
            self.cursor[i] += 1;
            if self.cursor[i] < self.specs[i].1.len() {
                return;
            }
            self.cursor[i] = 0;
        }
    }
}

impl Iterator for Expansion<'_> {
    type Item = ParameterPoint;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let values: IndexMap<String, _> = self.specs
                                              .iter()
                                              .zip(&self.cursor)
                                              .map(|((name, spec), idx)| (name.to_string(), spec.value_at(*idx)))
                                              .collect();
        self.remaining -= 1;
        self.advance();
        Some(ParameterPoint::from_map(values))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for Expansion<'_> {}

/// Expande el espacio completo. Un espacio vacío produce un único punto vacío.
pub fn expand(space: &ParameterSpace) -> Vec<ParameterPoint> {
    Expansion::new(space).collect()
}
