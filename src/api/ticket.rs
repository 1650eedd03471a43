use serde::{Deserialize, Serialize};

use crate::db::{Activity, Capped, File, Note, Task};

use super::FileRef;

pub use crate::db::ticket::{
    Filter, Id, Number, Priority, Sort, SortField, Status, Ticket, Type,
};

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct New {
    /// External party id of the customer the ticket is raised for.
    pub customer_id: String,
    pub subject: String,
    pub message: String,
    pub ticket_type: Type,
    #[serde(default)]
    pub priority: Option<Priority>,
    /// Ignored: new tickets always start OPEN.
    #[serde(default)]
    pub status: Option<Status>,
    #[serde(default)]
    pub source: Option<String>,
    /// External party id of the assignee.
    #[serde(default)]
    pub assignee_id: Option<String>,
    /// External party ids of the followers.
    #[serde(default)]
    pub followers: Vec<String>,
    #[serde(default)]
    pub files: Vec<FileRef>,
}

impl New {
    pub fn new(
        customer_id: impl Into<String>,
        subject: impl Into<String>,
        message: impl Into<String>,
        ticket_type: Type,
    ) -> Self {
        Self {
            customer_id: customer_id.into(),
            subject: subject.into(),
            message: message.into(),
            ticket_type,
            priority: None,
            status: None,
            source: None,
            assignee_id: None,
            followers: Vec::new(),
            files: Vec::new(),
        }
    }
}

/// Requested field values; absent fields are left untouched.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Edit {
    pub subject: Option<String>,
    pub message: Option<String>,
    pub ticket_type: Option<Type>,
    pub status: Option<Status>,
    pub priority: Option<Priority>,
    /// External party id of the new assignee.
    pub assignee_id: Option<String>,
    #[serde(default)]
    pub files: Vec<FileRef>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Details {
    #[serde(flatten)]
    pub ticket: Ticket,
    pub activities: Capped<Activity>,
    pub tasks: Capped<Task>,
    pub notes: Capped<Note>,
    pub files: Capped<File>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Updated {
    #[serde(flatten)]
    pub ticket: Ticket,
    /// `None` when nothing changed or the audit write failed.
    pub activity: Option<Activity>,
}
