//! Configuration sources.

use crate::bag::Bag;

/// A read-only view of configuration data from one origin.
///
/// Content is fixed once the source is constructed; priority is tracked by
/// the [`Config`](super::Config) the source is registered with.
pub trait Source: Send + Sync {
    fn bag(&self) -> &Bag;
}

/// Source backed by an in-memory bag.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    bag: Bag,
}

impl MemorySource {
    pub fn new(bag: Bag) -> Self {
        Self { bag }
    }
}

impl Source for MemorySource {
    fn bag(&self) -> &Bag {
        &self.bag
    }
}
