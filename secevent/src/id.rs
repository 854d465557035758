//! `jti` generation.

use std::sync::{Arc, LazyLock, PoisonError, RwLock};

/// Source of unique token identifiers.
pub trait IdGenerator: Send + Sync {
    /// Produce a new identifier.
    fn generate(&self) -> String;
}

/// Random UUID v4 identifiers.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn generate(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

static DEFAULT_GENERATOR: LazyLock<RwLock<Arc<dyn IdGenerator>>> =
    LazyLock::new(|| RwLock::new(Arc::new(UuidGenerator)));

/// The process-wide default generator.
#[must_use]
pub fn default_id_generator() -> Arc<dyn IdGenerator> {
    Arc::clone(
        &DEFAULT_GENERATOR
            .read()
            .unwrap_or_else(PoisonError::into_inner),
    )
}

/// Replace the process-wide default generator, returning the previous one.
pub fn set_default_id_generator(generator: Arc<dyn IdGenerator>) -> Arc<dyn IdGenerator> {
    let mut slot = DEFAULT_GENERATOR
        .write()
        .unwrap_or_else(PoisonError::into_inner);
    std::mem::replace(&mut *slot, generator)
}
