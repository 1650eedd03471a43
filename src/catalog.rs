//! Static per-ticket-type tables.

use std::collections::HashMap;

use crate::db::ticket::{Priority, Type};

/// Prefix used for any ticket type missing from the prefix table.
pub const FALLBACK_PREFIX: &str = "OT";

/// Immutable lookup tables handed to the service at construction.
#[derive(Clone, Debug)]
pub struct Catalog {
    prefixes: HashMap<Type, &'static str>,
    priorities: HashMap<Type, Priority>,
}

impl Catalog {
    pub fn new(
        prefixes: HashMap<Type, &'static str>,
        priorities: HashMap<Type, Priority>,
    ) -> Self {
        Self {
            prefixes,
            priorities,
        }
    }

    pub fn prefix_for(&self, ticket_type: Type) -> &'static str {
        self.prefixes
            .get(&ticket_type)
            .copied()
            .unwrap_or(FALLBACK_PREFIX)
    }

    pub fn default_priority(&self, ticket_type: Type) -> Option<Priority> {
        self.priorities.get(&ticket_type).copied()
    }

    /// Every prefix a ticket can be numbered with, fallback included.
    pub fn known_prefixes(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.prefixes
            .values()
            .copied()
            .chain([FALLBACK_PREFIX])
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new(
            HashMap::from([
                (Type::SiteIssue, "SI"),
                (Type::ProductFeedback, "PF"),
                (Type::Investor, "IN"),
                (Type::Branding, "BR"),
                (Type::RequestRefund, "RR"),
            ]),
            HashMap::from([
                (Type::SiteIssue, Priority::High),
                (Type::ProductFeedback, Priority::Low),
                (Type::Investor, Priority::High),
                (Type::Branding, Priority::Medium),
                (Type::RequestRefund, Priority::Medium),
                (Type::Other, Priority::Low),
            ]),
        )
    }
}
