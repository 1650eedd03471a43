//! Field-level change tracking.
//!
//! A [`Diff`] is fed the current value and the requested value of each
//! field. Differing values are recorded as `{from, to}` pairs and handed
//! back so the caller can place them into its typed patch; equal or absent
//! values are dropped. An empty diff means the write is a no-op.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `{ field: { from, to } }`, ordered by field name.
pub type Changes = BTreeMap<String, Change>;

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Change {
    pub from: Value,
    pub to: Value,
}

impl Change {
    pub fn new(from: &impl Serialize, to: &impl Serialize) -> Self {
        Self {
            from: serde_json::to_value(from).unwrap_or_default(),
            to: serde_json::to_value(to).unwrap_or_default(),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Diff {
    changes: Changes,
}

impl Diff {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compares `candidate` against `current` by value.
    ///
    /// Returns the candidate only when it differs, after recording the
    /// change under `field`.
    pub fn field<T>(
        &mut self,
        field: &str,
        current: &T,
        candidate: Option<T>,
    ) -> Option<T>
    where
        T: PartialEq + Serialize,
    {
        let candidate = candidate.filter(|c| c != current)?;
        self.changes
            .insert(field.to_owned(), Change::new(current, &candidate));
        Some(candidate)
    }

    /// Records a change that has no direct field counterpart, such as an
    /// attachment count.
    pub fn synthetic(
        &mut self,
        field: &str,
        from: &impl Serialize,
        to: &impl Serialize,
    ) {
        self.changes.insert(field.to_owned(), Change::new(from, to));
    }

    pub fn contains(&self, field: &str) -> bool {
        self.changes.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn into_changes(self) -> Changes {
        self.changes
    }
}
