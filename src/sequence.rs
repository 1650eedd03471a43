//! Ticket number allocation.

use std::{error::Error as StdError, sync::Arc, time::Duration};

use derive_more::Display;
use tokio::time;

use crate::db::{self, counter, ticket::Number};

pub struct SequenceAllocator {
    counters: Arc<dyn counter::Store>,
    timeout: Duration,
}

impl SequenceAllocator {
    pub fn new(counters: Arc<dyn counter::Store>, timeout: Duration) -> Self {
        Self { counters, timeout }
    }

    /// Makes sure every prefix has a counter row, leaving existing ones
    /// untouched.
    pub async fn seed<'a>(
        &self,
        prefixes: impl IntoIterator<Item = &'a str>,
    ) -> Result<(), db::Error> {
        for prefix in prefixes {
            self.counters.seed_counter(prefix).await?;
        }
        Ok(())
    }

    /// Returns the next sequence for `prefix`.
    ///
    /// The store performs the increment and the read as one operation, so
    /// concurrent callers always observe distinct values.
    pub async fn next_sequence(&self, prefix: &str) -> Result<i64, Error> {
        match time::timeout(
            self.timeout,
            self.counters.increment_and_fetch(prefix),
        )
        .await
        {
            Ok(Ok(sequence)) => Ok(sequence),
            Ok(Err(e)) => Err(Error::Store(e)),
            Err(_) => Err(Error::TimedOut(self.timeout)),
        }
    }

    pub async fn next_number(&self, prefix: &str) -> Result<Number, Error> {
        self.next_sequence(prefix)
            .await
            .map(|sequence| Number::new(prefix, sequence))
    }
}

#[derive(Debug, Display)]
pub enum Error {
    #[display("sequence allocation failed: {_0}")]
    Store(db::Error),

    #[display("sequence allocation timed out after {_0:?}")]
    TimedOut(Duration),
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Store(e) => Some(e),
            Self::TimedOut(_) => None,
        }
    }
}
