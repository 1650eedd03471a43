use async_trait::async_trait;

use super::{Client, Error};

/// Per-prefix sequence storage backing ticket numbers.
#[async_trait]
pub trait Store: Send + Sync {
    /// Inserts a zeroed counter for `prefix` unless one already exists.
    async fn seed_counter(&self, prefix: &str) -> Result<(), Error>;

    /// Atomically bumps the counter for `prefix` (creating it at 1 if absent)
    /// and returns the new value.
    async fn increment_and_fetch(&self, prefix: &str) -> Result<i64, Error>;
}

#[async_trait]
impl Store for Client {
    async fn seed_counter(&self, prefix: &str) -> Result<(), Error> {
        const SQL: &str = "\
            INSERT INTO ticket_counters (prefix, sequence) \
            VALUES ($1, 0) \
            ON CONFLICT (prefix) DO NOTHING";
        self.0.execute(SQL, &[&prefix]).await.map(drop)?;
        Ok(())
    }

    async fn increment_and_fetch(&self, prefix: &str) -> Result<i64, Error> {
        const SQL: &str = "\
            INSERT INTO ticket_counters (prefix, sequence) \
            VALUES ($1, 1) \
            ON CONFLICT (prefix) DO UPDATE \
            SET sequence = ticket_counters.sequence + 1 \
            RETURNING sequence";
        Ok(self.0.query_one(SQL, &[&prefix]).await?.get("sequence"))
    }
}
