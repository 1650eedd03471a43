use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

pub use crate::db::task::{Id, Task};

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct New {
    pub title: String,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub due_date: Option<OffsetDateTime>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Edit {
    pub title: Option<String>,
    pub is_completed: Option<bool>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub due_date: Option<OffsetDateTime>,
}
