//! Process-wide sequence generator and the concept code handler.
//!
//! # Invariants
//! - Values are strictly increasing and never repeat within a process.
//! - The counter is seeded from storage once, inside the lock, on first use;
//!   later calls never query storage.
//! - The lock covers only seed-check and increment, never a persistence
//!   write.

use crate::advice::error::AdviceResult;
use crate::advice::registry::LifecycleHandler;
use crate::advice::walker::HandlerCall;
use crate::model::capability::DomainObject;
use crate::model::catalog::Concept;
use crate::repo::{ClinicalRepository, RepoError};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex};

#[derive(Debug)]
pub enum SequenceError {
    /// Reading the persisted maximum failed.
    Seed(RepoError),
    /// A caller panicked while holding the counter lock.
    Poisoned,
    Exhausted,
}

impl Display for SequenceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Seed(err) => write!(f, "failed to seed sequence: {err}"),
            Self::Poisoned => write!(f, "sequence counter lock is poisoned"),
            Self::Exhausted => write!(f, "sequence exhausted"),
        }
    }
}

impl Error for SequenceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Seed(err) => Some(err),
            Self::Poisoned | Self::Exhausted => None,
        }
    }
}

/// Source of the highest value already persisted.
pub trait SequenceSeed: Send + Sync {
    fn current_max(&self) -> Result<Option<i64>, SequenceError>;
}

/// Seeds from the highest numeric suffix among persisted concept codes.
pub struct ConceptCodeSeed {
    repository: Arc<dyn ClinicalRepository>,
    prefix: String,
}

impl ConceptCodeSeed {
    pub fn new(repository: Arc<dyn ClinicalRepository>, prefix: impl Into<String>) -> Self {
        Self {
            repository,
            prefix: prefix.into(),
        }
    }
}

impl SequenceSeed for ConceptCodeSeed {
    fn current_max(&self) -> Result<Option<i64>, SequenceError> {
        self.repository
            .max_concept_code_suffix(&self.prefix)
            .map_err(SequenceError::Seed)
    }
}

/// Lazily seeded, in-memory, strictly increasing counter.
pub struct SequenceGenerator {
    seed: Arc<dyn SequenceSeed>,
    last: Mutex<Option<i64>>,
}

impl SequenceGenerator {
    pub fn new(seed: Arc<dyn SequenceSeed>) -> Self {
        Self {
            seed,
            last: Mutex::new(None),
        }
    }

    /// Returns the next value, seeding from storage on first use.
    pub fn next_value(&self) -> Result<i64, SequenceError> {
        let mut last = self.last.lock().map_err(|_| SequenceError::Poisoned)?;
        let current = match *last {
            Some(value) => value,
            None => {
                let seeded = self.seed.current_max()?.unwrap_or(0);
                log::info!(
                    "event=sequence_seed module=handlers status=ok seeded_from={}",
                    seeded
                );
                seeded
            }
        };
        let next = current.checked_add(1).ok_or(SequenceError::Exhausted)?;
        *last = Some(next);
        Ok(next)
    }

    /// Last value handed out, if the generator has been used.
    pub fn last_value(&self) -> Option<i64> {
        self.last.lock().ok().and_then(|last| *last)
    }
}

/// Assigns `<prefix><n>` to concepts saved without a code.
pub struct ConceptCodeHandler {
    generator: Arc<SequenceGenerator>,
    prefix: String,
}

impl ConceptCodeHandler {
    pub fn new(generator: Arc<SequenceGenerator>, prefix: impl Into<String>) -> Self {
        Self {
            generator,
            prefix: prefix.into(),
        }
    }
}

impl LifecycleHandler for ConceptCodeHandler {
    fn name(&self) -> &'static str {
        "concept_code"
    }

    fn handle(
        &self,
        target: &mut dyn DomainObject,
        _call: &mut HandlerCall<'_>,
    ) -> AdviceResult<()> {
        let Some(concept) = target.downcast_mut::<Concept>() else {
            return Ok(());
        };
        if concept.code.as_deref().is_some_and(|code| !code.trim().is_empty()) {
            return Ok(());
        }
        let value = self.generator.next_value()?;
        concept.code = Some(format!("{}{value}", self.prefix));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{SequenceError, SequenceGenerator, SequenceSeed};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingSeed {
        start: Option<i64>,
        calls: AtomicUsize,
    }

    impl SequenceSeed for CountingSeed {
        fn current_max(&self) -> Result<Option<i64>, SequenceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.start)
        }
    }

    #[test]
    fn seeds_once_then_counts_in_memory() {
        let seed = Arc::new(CountingSeed {
            start: Some(41),
            calls: AtomicUsize::new(0),
        });
        let generator = SequenceGenerator::new(seed.clone());

        assert_eq!(generator.last_value(), None);
        assert_eq!(generator.next_value().unwrap(), 42);
        assert_eq!(generator.next_value().unwrap(), 43);
        assert_eq!(generator.last_value(), Some(43));
        assert_eq!(seed.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn empty_storage_starts_at_one() {
        let generator = SequenceGenerator::new(Arc::new(CountingSeed {
            start: None,
            calls: AtomicUsize::new(0),
        }));
        assert_eq!(generator.next_value().unwrap(), 1);
    }

    #[test]
    fn exhausted_counter_is_an_error() {
        let generator = SequenceGenerator::new(Arc::new(CountingSeed {
            start: Some(i64::MAX),
            calls: AtomicUsize::new(0),
        }));
        assert!(matches!(
            generator.next_value(),
            Err(SequenceError::Exhausted)
        ));
    }
}
