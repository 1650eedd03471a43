use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio_postgres::{types::Json, Row};

use super::{
    activity::Actor, ticket, to_i64, uuid_id, Clauses, Client, Error,
};

uuid_id!(Id);

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Id,
    pub ticket: ticket::Id,
    pub title: String,
    pub is_completed: bool,
    #[serde(with = "time::serde::rfc3339::option")]
    pub due_date: Option<OffsetDateTime>,
    pub created_by: Actor,
    #[serde(with = "time::serde::rfc3339::option")]
    pub deleted_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Task {
    fn from_row(row: &Row) -> Self {
        Self {
            id: row.get("id"),
            ticket: row.get("ticket_id"),
            title: row.get("title"),
            is_completed: row.get("is_completed"),
            due_date: row.get("due_date"),
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
    pub title: String,
    pub due_date: Option<OffsetDateTime>,
    pub created_by: Actor,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Patch {
    pub title: Option<String>,
    pub is_completed: Option<bool>,
    pub due_date: Option<OffsetDateTime>,
}

impl Patch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply(&self, task: &mut Task) {
        if let Some(title) = &self.title {
            task.title.clone_from(title);
        }
        if let Some(is_completed) = self.is_completed {
            task.is_completed = is_completed;
        }
        if let Some(due_date) = self.due_date {
            task.due_date = Some(due_date);
        }
    }
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn create_task(&self, new: New) -> Result<Task, Error>;

    async fn task_by_id(&self, id: Id) -> Result<Option<Task>, Error>;

    async fn update_task(
        &self,
        id: Id,
        patch: &Patch,
    ) -> Result<Option<Task>, Error>;

    async fn soft_delete_task(&self, id: Id) -> Result<bool, Error>;

    /// Live tasks of a ticket, newest first.
    async fn tasks_for_ticket(
        &self,
        ticket: ticket::Id,
        limit: usize,
    ) -> Result<Vec<Task>, Error>;
}

const COLUMNS: &str = "\
    id, ticket_id, title, is_completed, due_date, created_by, \
    deleted_at, created_at, updated_at";

#[async_trait]
impl Store for Client {
    async fn create_task(&self, new: New) -> Result<Task, Error> {
        let sql = format!(
            "INSERT INTO tasks (id, ticket_id, title, due_date, created_by) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {COLUMNS}"
        );
        let row = self
            .0
            .query_one(
                &sql,
                &[
                    &Id::new(),
                    &new.ticket,
                    &new.title,
                    &new.due_date,
                    &Json(&new.created_by),
                ],
            )
            .await?;
        Ok(Task::from_row(&row))
    }

    async fn task_by_id(&self, id: Id) -> Result<Option<Task>, Error> {
        let sql = format!(
            "SELECT {COLUMNS} FROM tasks \
             WHERE id = $1 AND deleted_at IS NULL"
        );
        Ok(self
            .0
            .query_opt(&sql, &[&id])
            .await?
            .map(|row| Task::from_row(&row)))
    }

    async fn update_task(
        &self,
        id: Id,
        patch: &Patch,
    ) -> Result<Option<Task>, Error> {
        let mut sets = Clauses::new();
        let id_param = sets.bind(&id);
        sets.raw("updated_at = now()");
        if let Some(title) = &patch.title {
            sets.eq("title", title);
        }
        if let Some(is_completed) = &patch.is_completed {
            sets.eq("is_completed", is_completed);
        }
        if let Some(due_date) = &patch.due_date {
            sets.eq("due_date", due_date);
        }

        let sql = format!(
            "UPDATE tasks SET {} \
             WHERE id = {id_param} AND deleted_at IS NULL \
             RETURNING {COLUMNS}",
            sets.join(", "),
        );
        Ok(self
            .0
            .query_opt(&sql, &sets.params)
            .await?
            .map(|row| Task::from_row(&row)))
    }

    async fn soft_delete_task(&self, id: Id) -> Result<bool, Error> {
        const SQL: &str = "\
            UPDATE tasks SET deleted_at = now() \
            WHERE id = $1 AND deleted_at IS NULL";
        Ok(self.0.execute(SQL, &[&id]).await? > 0)
    }

    async fn tasks_for_ticket(
        &self,
        ticket: ticket::Id,
        limit: usize,
    ) -> Result<Vec<Task>, Error> {
        let sql = format!(
            "SELECT {COLUMNS} FROM tasks \
             WHERE ticket_id = $1 AND deleted_at IS NULL \
             ORDER BY created_at DESC, id DESC \
             LIMIT $2"
        );
        Ok(self
            .0
            .query(&sql, &[&ticket, &to_i64(limit)])
            .await?
            .iter()
            .map(Task::from_row)
            .collect())
    }
}
