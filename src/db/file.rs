use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio_postgres::Row;

use crate::{
    context::Caller,
    files::{self, FileRegistry},
};

use super::{note, ticket, to_i64, uuid_id, Client};

uuid_id!(Id);

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct File {
    pub id: Id,
    pub ticket: ticket::Id,
    pub note: Option<note::Id>,
    pub url: String,
    pub file_type: String,
    #[serde(with = "time::serde::rfc3339::option")]
    pub deleted_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl File {
    fn from_row(row: &Row) -> Self {
        Self {
            id: row.get("id"),
            ticket: row.get("ticket_id"),
            note: row.get("note_id"),
            url: row.get("url"),
            file_type: row.get("file_type"),
            deleted_at: row.get("deleted_at"),
            created_at: row.get("created_at"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct New {
    pub url: String,
    pub file_type: String,
    pub ticket: ticket::Id,
    pub note: Option<note::Id>,
}

impl From<super::Error> for files::Error {
    fn from(e: super::Error) -> Self {
        Self::Unavailable(e.to_string())
    }
}

const COLUMNS: &str = "\
    id, ticket_id, note_id, url, file_type, deleted_at, created_at";

#[async_trait]
impl FileRegistry for Client {
    async fn register_file(
        &self,
        _: &Caller,
        new: New,
    ) -> Result<File, files::Error> {
        let sql = format!(
            "INSERT INTO files (id, ticket_id, note_id, url, file_type) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {COLUMNS}"
        );
        let row = self
            .0
            .query_one(
                &sql,
                &[&Id::new(), &new.ticket, &new.note, &new.url, &new.file_type],
            )
            .await
            .map_err(super::Error::from)?;
        Ok(File::from_row(&row))
    }

    async fn files_for_ticket(
        &self,
        _: &Caller,
        ticket: ticket::Id,
        limit: usize,
    ) -> Result<Vec<File>, files::Error> {
        let sql = format!(
            "SELECT {COLUMNS} FROM files \
             WHERE ticket_id = $1 AND deleted_at IS NULL \
             ORDER BY created_at DESC, id DESC \
             LIMIT $2"
        );
        Ok(self
            .0
            .query(&sql, &[&ticket, &to_i64(limit)])
            .await
            .map_err(super::Error::from)?
            .iter()
            .map(File::from_row)
            .collect())
    }

    async fn count_for_ticket(
        &self,
        _: &Caller,
        ticket: ticket::Id,
    ) -> Result<usize, files::Error> {
        const SQL: &str = "\
            SELECT COUNT(*) FROM files \
            WHERE ticket_id = $1 AND deleted_at IS NULL";
        let count: i64 = self
            .0
            .query_one(SQL, &[&ticket])
            .await
            .map_err(super::Error::from)?
            .get(0);
        Ok(usize::try_from(count).unwrap_or_default())
    }
}
