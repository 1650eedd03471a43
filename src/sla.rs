//! Priority-driven response and resolution deadlines.

use std::collections::HashMap;

use time::{Duration, OffsetDateTime};

use crate::db::ticket::Priority;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Target {
    pub first_response_hours: i64,
    pub resolution_hours: i64,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DueDates {
    pub first_response_due: OffsetDateTime,
    pub resolution_due: OffsetDateTime,
}

#[derive(Clone, Debug)]
pub struct Policy {
    targets: HashMap<Priority, Target>,
}

impl Policy {
    /// Returns `None` if any target resolves before its first response.
    pub fn new(targets: HashMap<Priority, Target>) -> Option<Self> {
        targets
            .values()
            .all(|t| {
                t.first_response_hours > 0
                    && t.resolution_hours >= t.first_response_hours
            })
            .then_some(Self { targets })
    }

    pub fn target(&self, priority: Priority) -> Target {
        self.targets
            .get(&priority)
            .copied()
            .unwrap_or_else(|| Self::default_target(priority))
    }

    pub fn due_dates(
        &self,
        priority: Priority,
        now: OffsetDateTime,
    ) -> DueDates {
        let target = self.target(priority);
        DueDates {
            first_response_due: now
                + Duration::hours(target.first_response_hours),
            resolution_due: now + Duration::hours(target.resolution_hours),
        }
    }

    fn default_target(priority: Priority) -> Target {
        let (first_response_hours, resolution_hours) = match priority {
            Priority::Urgent => (1, 4),
            Priority::High => (4, 24),
            Priority::Medium => (8, 48),
            Priority::Low => (24, 72),
        };
        Target {
            first_response_hours,
            resolution_hours,
        }
    }
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            targets: Priority::ALL
                .into_iter()
                .map(|p| (p, Self::default_target(p)))
                .collect(),
        }
    }
}

/// Explicit request value, then the ticket type's default, then LOW.
pub fn resolve_priority(
    requested: Option<Priority>,
    type_default: Option<Priority>,
) -> Priority {
    requested.or(type_default).unwrap_or(Priority::Low)
}
