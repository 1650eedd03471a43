use crate::{
    activity,
    api,
    context::Caller,
    db::{
        activity::Actor,
        task::{self as db_task, Patch, Task},
        ticket as db_ticket,
    },
    diff::Diff,
};

use super::{Entity, Error, Service, Validation};

impl Service {
    #[tracing::instrument(skip_all, fields(ticket = %ticket))]
    pub async fn add_task(
        &self,
        caller: &Caller,
        ticket: db_ticket::Id,
        input: api::task::New,
    ) -> Result<Task, Error> {
        if input.title.trim().is_empty() {
            return Err(Validation::EmptyField("title").into());
        }
        self.live_ticket(ticket).await?;
        let actor = Actor::from(&self.actor(caller).await?);

        let task = self
            .tasks
            .create_task(db_task::New {
                ticket,
                title: input.title,
                due_date: input.due_date,
                created_by: actor.clone(),
            })
            .await?;
        self.recorder
            .record(activity::task_created(&task), ticket, actor)
            .await;
        Ok(task)
    }

    #[tracing::instrument(skip_all, fields(task = %id))]
    pub async fn update_task(
        &self,
        caller: &Caller,
        id: db_task::Id,
        edit: api::task::Edit,
    ) -> Result<Task, Error> {
        if edit.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(Validation::EmptyField("title").into());
        }
        let task = self.live_task(id).await?;
        self.live_ticket(task.ticket).await?;
        let actor = self.actor(caller).await?;

        let mut diff = Diff::new();
        let patch = Patch {
            title: diff.field("title", &task.title, edit.title),
            is_completed: diff.field(
                "isCompleted",
                &task.is_completed,
                edit.is_completed,
            ),
            due_date: diff
                .field("dueDate", &task.due_date, edit.due_date.map(Some))
                .flatten(),
        };
        if diff.is_empty() {
            return Ok(task);
        }

        let updated = self
            .tasks
            .update_task(id, &patch)
            .await?
            .ok_or(Error::NotFound(Entity::Task))?;
        self.recorder
            .record(
                activity::task_updated(&updated, diff.into_changes()),
                updated.ticket,
                Actor::from(&actor),
            )
            .await;
        Ok(updated)
    }

    #[tracing::instrument(skip_all, fields(task = %id))]
    pub async fn delete_task(
        &self,
        caller: &Caller,
        id: db_task::Id,
    ) -> Result<(), Error> {
        let task = self.live_task(id).await?;
        self.live_ticket(task.ticket).await?;
        let actor = self.actor(caller).await?;
        if !self.tasks.soft_delete_task(id).await? {
            return Err(Error::NotFound(Entity::Task));
        }
        self.recorder
            .record(activity::task_deleted(&task), task.ticket, Actor::from(&actor))
            .await;
        Ok(())
    }

    async fn live_task(&self, id: db_task::Id) -> Result<Task, Error> {
        self.tasks
            .task_by_id(id)
            .await?
            .ok_or(Error::NotFound(Entity::Task))
    }
}
