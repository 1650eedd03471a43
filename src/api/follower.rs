use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Add {
    /// External party id of the user to follow the ticket.
    pub follower_id: String,
}
