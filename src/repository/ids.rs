//! Monotonic id generation for ledger-owned records

use snowflaked::sync::Generator;

/// Snowflake id generator shared by the ledger and the notifier.
///
/// Ids are strictly increasing per process instance, so loan records sort
/// by creation order without a database round trip.
pub struct IdGenerator {
    generator: Generator,
}

impl IdGenerator {
    pub fn new(instance: u16) -> Self {
        Self {
            generator: Generator::new(instance),
        }
    }

    pub fn next(&self) -> i64 {
        self.generator.generate()
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new(0)
    }
}
