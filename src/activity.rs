//! Audit trail writes.
//!
//! Activities are recorded after the primary write they describe. A failed
//! audit write is logged and swallowed: the primary effect has already
//! happened and is not rolled back.

use std::sync::Arc;

use itertools::Itertools as _;

use crate::{
    db::{
        activity::{self, Activity, Actor, Kind, Metadata},
        note::Note,
        task::Task,
        ticket::{self, Ticket},
    },
    diff::Changes,
};

/// What an activity says, before it is tied to a ticket and an actor.
#[derive(Clone, Debug, PartialEq)]
pub struct Entry {
    pub kind: Kind,
    pub description: String,
    pub metadata: Metadata,
}

pub struct Recorder {
    store: Arc<dyn activity::Store>,
}

impl Recorder {
    pub fn new(store: Arc<dyn activity::Store>) -> Self {
        Self { store }
    }

    /// Appends one activity. Returns `None` if the audit store failed.
    pub async fn record(
        &self,
        entry: Entry,
        ticket: ticket::Id,
        actor: Actor,
    ) -> Option<Activity> {
        let kind = entry.kind;
        let new = activity::New {
            kind,
            description: entry.description,
            created_by: actor,
            ticket,
            metadata: entry.metadata,
        };
        match self.store.insert_activity(new).await {
            Ok(activity) => Some(activity),
            Err(e) => {
                tracing::error!(
                    %ticket,
                    %kind,
                    error = %e,
                    "failed to record activity"
                );
                None
            }
        }
    }
}

pub fn ticket_created(ticket: &Ticket) -> Entry {
    Entry {
        kind: Kind::TicketCreated,
        description: format!(
            "Ticket {} created: {}",
            ticket.ticket_number, ticket.subject,
        ),
        metadata: Metadata::TicketCreated {
            ticket_number: ticket.ticket_number.clone(),
            priority: ticket.priority,
        },
    }
}

/// Describes a ticket update by its most significant change.
///
/// Precedence is status, then priority, then assignee, then anything else.
/// Every change is kept in the metadata regardless of which one headlines.
pub fn ticket_updated(changes: Changes, updated: &Ticket) -> Entry {
    if changes.contains_key("status") {
        Entry {
            kind: Kind::StatusChanged,
            description: format!("Status changed to {}", updated.status),
            metadata: Metadata::StatusChanged { changes },
        }
    } else if changes.contains_key("priority") {
        Entry {
            kind: Kind::PriorityChanged,
            description: format!("Priority changed to {}", updated.priority),
            metadata: Metadata::PriorityChanged { changes },
        }
    } else if changes.contains_key("assignee") {
        let name = updated
            .assignee
            .as_ref()
            .map_or("nobody", |a| a.name.as_str());
        Entry {
            kind: Kind::TicketAssigned,
            description: format!("Ticket assigned to {name}"),
            metadata: Metadata::AssigneeChanged { changes },
        }
    } else {
        Entry {
            kind: Kind::TicketUpdated,
            description: format!(
                "Ticket {} updated: {}",
                updated.ticket_number,
                changes.keys().join(", "),
            ),
            metadata: Metadata::TicketUpdated { changes },
        }
    }
}

pub fn ticket_deleted(ticket: &Ticket) -> Entry {
    Entry {
        kind: Kind::TicketDeleted,
        description: format!("Ticket {} deleted", ticket.ticket_number),
        metadata: Metadata::TicketDeleted,
    }
}

pub fn note_created(note: &Note) -> Entry {
    Entry {
        kind: Kind::NoteCreated,
        description: format!("Note added by {}", note.created_by.name),
        metadata: Metadata::NoteCreated { note_id: note.id },
    }
}

pub fn note_updated(note: &Note, changes: Changes) -> Entry {
    Entry {
        kind: Kind::NoteUpdated,
        description: "Note content updated".to_owned(),
        metadata: Metadata::NoteUpdated {
            note_id: note.id,
            changes,
        },
    }
}

pub fn note_deleted(note: &Note) -> Entry {
    Entry {
        kind: Kind::NoteDeleted,
        description: "Note deleted".to_owned(),
        metadata: Metadata::NoteDeleted { note_id: note.id },
    }
}

pub fn task_created(task: &Task) -> Entry {
    Entry {
        kind: Kind::TaskCreated,
        description: format!("Task created: {}", task.title),
        metadata: Metadata::TaskCreated { task_id: task.id },
    }
}

pub fn task_updated(task: &Task, changes: Changes) -> Entry {
    let description = match changes.get("isCompleted") {
        Some(_) if task.is_completed => {
            format!("Task completed: {}", task.title)
        }
        Some(_) => format!("Task reopened: {}", task.title),
        None => format!("Task updated: {}", task.title),
    };
    Entry {
        kind: Kind::TaskUpdated,
        description,
        metadata: Metadata::TaskUpdated {
            task_id: task.id,
            changes,
        },
    }
}

pub fn task_deleted(task: &Task) -> Entry {
    Entry {
        kind: Kind::TaskDeleted,
        description: format!("Task deleted: {}", task.title),
        metadata: Metadata::TaskDeleted { task_id: task.id },
    }
}
