pub mod follower;
pub mod note;
pub mod task;
pub mod ticket;
pub mod user;

use serde::{Deserialize, Serialize};

pub use self::{ticket::Ticket, user::User};

/// A file to attach, already uploaded to storage.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRef {
    pub url: String,
    pub file_type: String,
}
