use serde::{Deserialize, Serialize};

use super::FileRef;

pub use crate::db::note::{Id, Note};

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct New {
    pub content: String,
    #[serde(default)]
    pub files: Vec<FileRef>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Edit {
    pub content: String,
}
