use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio_postgres::{types::Json, Row};

use super::{activity::Actor, ticket, to_i64, uuid_id, Client, Error};

uuid_id!(Id);

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: Id,
    pub ticket: ticket::Id,
    pub content: String,
    pub created_by: Actor,
    #[serde(with = "time::serde::rfc3339::option")]
    pub deleted_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Note {
    fn from_row(row: &Row) -> Self {
        Self {
            id: row.get("id"),
            ticket: row.get("ticket_id"),
            content: row.get("content"),
            created_by: row.get::<_, Json<Actor>>("created_by").0,
            deleted_at: row.get("deleted_at"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct New {
    pub ticket: ticket::Id,
    pub content: String,
    pub created_by: Actor,
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn create_note(&self, new: New) -> Result<Note, Error>;

    async fn note_by_id(&self, id: Id) -> Result<Option<Note>, Error>;

    async fn update_note_content(
        &self,
        id: Id,
        content: &str,
    ) -> Result<Option<Note>, Error>;

    async fn soft_delete_note(&self, id: Id) -> Result<bool, Error>;

    /// Live notes of a ticket, newest first.
    async fn notes_for_ticket(
        &self,
        ticket: ticket::Id,
        limit: usize,
    ) -> Result<Vec<Note>, Error>;
}

const COLUMNS: &str = "\
    id, ticket_id, content, created_by, deleted_at, created_at, updated_at";

#[async_trait]
impl Store for Client {
    async fn create_note(&self, new: New) -> Result<Note, Error> {
        let sql = format!(
            "INSERT INTO notes (id, ticket_id, content, created_by) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {COLUMNS}"
        );
        let row = self
            .0
            .query_one(
                &sql,
                &[
                    &Id::new(),
                    &new.ticket,
                    &new.content,
                    &Json(&new.created_by),
                ],
            )
            .await?;
        Ok(Note::from_row(&row))
    }

    async fn note_by_id(&self, id: Id) -> Result<Option<Note>, Error> {
        let sql = format!(
            "SELECT {COLUMNS} FROM notes \
             WHERE id = $1 AND deleted_at IS NULL"
        );
        Ok(self
            .0
            .query_opt(&sql, &[&id])
            .await?
            .map(|row| Note::from_row(&row)))
    }

    async fn update_note_content(
        &self,
        id: Id,
        content: &str,
    ) -> Result<Option<Note>, Error> {
        let sql = format!(
            "UPDATE notes SET content = $2, updated_at = now() \
             WHERE id = $1 AND deleted_at IS NULL \
             RETURNING {COLUMNS}"
        );
        Ok(self
            .0
            .query_opt(&sql, &[&id, &content])
            .await?
            .map(|row| Note::from_row(&row)))
    }

    async fn soft_delete_note(&self, id: Id) -> Result<bool, Error> {
        const SQL: &str = "\
            UPDATE notes SET deleted_at = now() \
            WHERE id = $1 AND deleted_at IS NULL";
        Ok(self.0.execute(SQL, &[&id]).await? > 0)
    }

    async fn notes_for_ticket(
        &self,
        ticket: ticket::Id,
        limit: usize,
    ) -> Result<Vec<Note>, Error> {
        let sql = format!(
            "SELECT {COLUMNS} FROM notes \
             WHERE ticket_id = $1 AND deleted_at IS NULL \
             ORDER BY created_at DESC, id DESC \
             LIMIT $2"
        );
        Ok(self
            .0
            .query(&sql, &[&ticket, &to_i64(limit)])
            .await?
            .iter()
            .map(Note::from_row)
            .collect())
    }
}
