use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_postgres::Row;

use crate::{
    context::Caller,
    directory::{self, Directory},
};

use super::{uuid_id, Client};

uuid_id!(Id);

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Id,
    pub external_id: String,
    pub name: String,
    pub avatar: Option<String>,
}

impl User {
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            id: self.id,
            external_id: self.external_id.clone(),
            name: self.name.clone(),
            avatar: self.avatar.clone(),
        }
    }

    fn from_row(row: &Row) -> Self {
        Self {
            id: row.get("id"),
            external_id: row.get("external_id"),
            name: row.get("name"),
            avatar: row.get("avatar"),
        }
    }
}

/// Copy of a user taken when a ticket is written. Never refreshed.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub id: Id,
    pub external_id: String,
    pub name: String,
    pub avatar: Option<String>,
}

impl From<super::Error> for directory::Error {
    fn from(e: super::Error) -> Self {
        Self::Unavailable(e.to_string())
    }
}

#[async_trait]
impl Directory for Client {
    async fn resolve_or_create_user(
        &self,
        _: &Caller,
        external_id: &str,
    ) -> Result<User, directory::Error> {
        // The no-op update makes RETURNING yield the existing row too.
        const SQL: &str = "\
            INSERT INTO users (id, external_id, name) \
            VALUES ($1, $2, $2) \
            ON CONFLICT (external_id) DO UPDATE \
            SET external_id = EXCLUDED.external_id \
            RETURNING id, external_id, name, avatar";
        let row = self
            .0
            .query_one(SQL, &[&Id::new(), &external_id])
            .await
            .map_err(super::Error::from)?;
        Ok(User::from_row(&row))
    }

    async fn user_by_id(
        &self,
        _: &Caller,
        id: Id,
    ) -> Result<Option<User>, directory::Error> {
        const SQL: &str = "SELECT id, external_id, name, avatar \
                           FROM users \
                           WHERE id = $1 \
                           LIMIT 1";
        Ok(self
            .0
            .query_opt(SQL, &[&id])
            .await
            .map_err(super::Error::from)?
            .map(|row| User::from_row(&row)))
    }

    async fn user_by_external_id(
        &self,
        _: &Caller,
        external_id: &str,
    ) -> Result<Option<User>, directory::Error> {
        const SQL: &str = "SELECT id, external_id, name, avatar \
                           FROM users \
                           WHERE external_id = $1 \
                           LIMIT 1";
        Ok(self
            .0
            .query_opt(SQL, &[&external_id])
            .await
            .map_err(super::Error::from)?
            .map(|row| User::from_row(&row)))
    }
}
