/*!
 * Concurrent resolution of one file's units.
 *
 * Eligible units are resolved with at most `max_concurrent_units` in flight.
 * Results are keyed by `UnitId`, so completion order does not matter.
 */

use futures::stream::{self, StreamExt};
use log::debug;

use crate::extraction::{Outcomes, TranslatableUnit, TranslationOutcome};

use super::core::TranslationService;

/// Resolves every unit of a file through the translation service
#[derive(Clone)]
pub struct BatchTranslator {
    service: TranslationService,
    max_concurrent_units: usize,
}

impl BatchTranslator {
    pub fn new(service: TranslationService, max_concurrent_units: usize) -> Self {
        Self {
            service,
            max_concurrent_units: max_concurrent_units.max(1),
        }
    }

    pub fn service(&self) -> &TranslationService {
        &self.service
    }

    /// Resolve units not already decided in `outcomes` and return the full map
    pub async fn resolve_units(
        &self,
        units: &[TranslatableUnit],
        mut outcomes: Outcomes,
        progress_callback: impl Fn(&TranslatableUnit, &TranslationOutcome),
    ) -> Outcomes {
        let pending: Vec<&TranslatableUnit> = units
            .iter()
            .filter(|unit| !outcomes.contains_key(&unit.id))
            .collect();

        debug!(
            "Resolving {} of {} units ({} in flight)",
            pending.len(),
            units.len(),
            self.max_concurrent_units
        );

        let mut results = stream::iter(pending)
            .map(|unit| async move { (unit, self.service.resolve(&unit.text).await) })
            .buffer_unordered(self.max_concurrent_units);

        while let Some((unit, outcome)) = results.next().await {
            progress_callback(unit, &outcome);
            outcomes.insert(unit.id, outcome);
        }

        outcomes
    }
}
