use std::{error::Error as StdError, str::FromStr};

use async_trait::async_trait;
use derive_more::Display;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio_postgres::{
    types::{
        accepts, private::BytesMut, to_sql_checked, FromSql, IsNull, Json,
        ToSql, Type as SqlType,
    },
    Row,
};

use crate::diff::Changes;

use super::{
    note, task, ticket, to_i64,
    user::{self, User},
    uuid_id, Client, Error,
};

uuid_id!(Id);

/// Append-only audit entry. Only `deleted_at` ever changes after insert.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: Id,
    #[serde(rename = "type")]
    pub kind: Kind,
    pub description: String,
    pub created_by: Actor,
    pub ticket: ticket::Id,
    pub metadata: Metadata,
    #[serde(with = "time::serde::rfc3339::option")]
    pub deleted_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Activity {
    fn from_row(row: &Row) -> Self {
        Self {
            id: row.get("id"),
            kind: row.get("type"),
            description: row.get("description"),
            created_by: row.get::<_, Json<Actor>>("created_by").0,
            ticket: row.get("ticket_id"),
            metadata: row.get::<_, Json<Metadata>>("metadata").0,
            deleted_at: row.get("deleted_at"),
            created_at: row.get("created_at"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct New {
    pub kind: Kind,
    pub description: String,
    pub created_by: Actor,
    pub ticket: ticket::Id,
    pub metadata: Metadata,
}

/// Who performed a change, as they were at the time.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Actor {
    pub id: user::Id,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

impl From<&User> for Actor {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            avatar: user.avatar.clone(),
        }
    }
}

impl From<&user::Snapshot> for Actor {
    fn from(snapshot: &user::Snapshot) -> Self {
        Self {
            id: snapshot.id,
            name: snapshot.name.clone(),
            avatar: snapshot.avatar.clone(),
        }
    }
}

/// Display label of an activity.
#[derive(Clone, Copy, Debug, Deserialize, Display, Eq, PartialEq, Serialize)]
pub enum Kind {
    #[display("Ticket Created")]
    #[serde(rename = "Ticket Created")]
    TicketCreated,
    #[display("Ticket Updated")]
    #[serde(rename = "Ticket Updated")]
    TicketUpdated,
    #[display("Status Changed to")]
    #[serde(rename = "Status Changed to")]
    StatusChanged,
    #[display("Priority Changed to")]
    #[serde(rename = "Priority Changed to")]
    PriorityChanged,
    #[display("Ticket Assigned to")]
    #[serde(rename = "Ticket Assigned to")]
    TicketAssigned,
    #[display("Ticket Deleted")]
    #[serde(rename = "Ticket Deleted")]
    TicketDeleted,
    #[display("Note Created")]
    #[serde(rename = "Note Created")]
    NoteCreated,
    #[display("Note Updated")]
    #[serde(rename = "Note Updated")]
    NoteUpdated,
    #[display("Note Deleted")]
    #[serde(rename = "Note Deleted")]
    NoteDeleted,
    #[display("Task Created")]
    #[serde(rename = "Task Created")]
    TaskCreated,
    #[display("Task Updated")]
    #[serde(rename = "Task Updated")]
    TaskUpdated,
    #[display("Task Deleted")]
    #[serde(rename = "Task Deleted")]
    TaskDeleted,
}

impl Kind {
    const ALL: [Self; 12] = [
        Self::TicketCreated,
        Self::TicketUpdated,
        Self::StatusChanged,
        Self::PriorityChanged,
        Self::TicketAssigned,
        Self::TicketDeleted,
        Self::NoteCreated,
        Self::NoteUpdated,
        Self::NoteDeleted,
        Self::TaskCreated,
        Self::TaskUpdated,
        Self::TaskDeleted,
    ];
}

#[derive(Clone, Debug, Display, Eq, PartialEq)]
#[display("unknown activity type `{_0}`")]
pub struct ParseKindError(String);

impl StdError for ParseKindError {}

impl FromStr for Kind {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.to_string() == s)
            .ok_or_else(|| ParseKindError(s.to_owned()))
    }
}

impl FromSql<'_> for Kind {
    accepts!(TEXT);

    fn from_sql(
        ty: &SqlType,
        raw: &[u8],
    ) -> Result<Self, Box<dyn StdError + Sync + Send>> {
        Ok(String::from_sql(ty, raw)?.parse()?)
    }
}

impl ToSql for Kind {
    accepts!(TEXT);

    to_sql_checked!();

    fn to_sql(
        &self,
        ty: &SqlType,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn StdError + Sync + Send>> {
        self.to_string().to_sql(ty, out)
    }
}

/// Event payload, one shape per `logType`.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(
    tag = "logType",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum Metadata {
    TicketCreated {
        ticket_number: ticket::Number,
        priority: ticket::Priority,
    },
    TicketUpdated {
        changes: Changes,
    },
    StatusChanged {
        changes: Changes,
    },
    PriorityChanged {
        changes: Changes,
    },
    AssigneeChanged {
        changes: Changes,
    },
    TicketDeleted,
    NoteCreated {
        note_id: note::Id,
    },
    NoteUpdated {
        note_id: note::Id,
        changes: Changes,
    },
    NoteDeleted {
        note_id: note::Id,
    },
    TaskCreated {
        task_id: task::Id,
    },
    TaskUpdated {
        task_id: task::Id,
        changes: Changes,
    },
    TaskDeleted {
        task_id: task::Id,
    },
}

impl Metadata {
    pub fn changes(&self) -> Option<&Changes> {
        match self {
            Self::TicketUpdated { changes }
            | Self::StatusChanged { changes }
            | Self::PriorityChanged { changes }
            | Self::AssigneeChanged { changes }
            | Self::NoteUpdated { changes, .. }
            | Self::TaskUpdated { changes, .. } => Some(changes),
            Self::TicketCreated { .. }
            | Self::TicketDeleted
            | Self::NoteCreated { .. }
            | Self::NoteDeleted { .. }
            | Self::TaskCreated { .. }
            | Self::TaskDeleted { .. } => None,
        }
    }
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn insert_activity(&self, new: New) -> Result<Activity, Error>;

    /// Live activities of a ticket, newest first.
    async fn activities_for_ticket(
        &self,
        ticket: ticket::Id,
        limit: usize,
    ) -> Result<Vec<Activity>, Error>;
}

const COLUMNS: &str = "\
    id, type, description, created_by, ticket_id, metadata, \
    deleted_at, created_at";

#[async_trait]
impl Store for Client {
    async fn insert_activity(&self, new: New) -> Result<Activity, Error> {
        let sql = format!(
            "INSERT INTO activities (id, type, description, created_by, \
                                     ticket_id, metadata) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {COLUMNS}"
        );
        let row = self
            .0
            .query_one(
                &sql,
                &[
                    &Id::new(),
                    &new.kind,
                    &new.description,
                    &Json(&new.created_by),
                    &new.ticket,
                    &Json(&new.metadata),
                ],
            )
            .await?;
        Ok(Activity::from_row(&row))
    }

    async fn activities_for_ticket(
        &self,
        ticket: ticket::Id,
        limit: usize,
    ) -> Result<Vec<Activity>, Error> {
        let sql = format!(
            "SELECT {COLUMNS} FROM activities \
             WHERE ticket_id = $1 AND deleted_at IS NULL \
             ORDER BY created_at DESC, id DESC \
             LIMIT $2"
        );
        Ok(self
            .0
            .query(&sql, &[&ticket, &to_i64(limit)])
            .await?
            .iter()
            .map(Activity::from_row)
            .collect())
    }
}
