use crate::{
    activity,
    api,
    context::Caller,
    db::{
        activity::Actor,
        note::{self as db_note, Note},
        ticket as db_ticket,
    },
    diff::Diff,
};

use super::{Entity, Error, Service, Validation};

impl Service {
    #[tracing::instrument(skip_all, fields(ticket = %ticket))]
    pub async fn add_note(
        &self,
        caller: &Caller,
        ticket: db_ticket::Id,
        input: api::note::New,
    ) -> Result<Note, Error> {
        if input.content.trim().is_empty() {
            return Err(Validation::EmptyField("content").into());
        }
        self.live_ticket(ticket).await?;
        let actor = Actor::from(&self.actor(caller).await?);

        let note = self
            .notes
            .create_note(db_note::New {
                ticket,
                content: input.content,
                created_by: actor.clone(),
            })
            .await?;
        if !input.files.is_empty() {
            self.register_files(caller, ticket, Some(note.id), input.files)
                .await;
        }
        self.recorder
            .record(activity::note_created(&note), ticket, actor)
            .await;
        Ok(note)
    }

    #[tracing::instrument(skip_all, fields(note = %id))]
    pub async fn update_note(
        &self,
        caller: &Caller,
        id: db_note::Id,
        edit: api::note::Edit,
    ) -> Result<Note, Error> {
        if edit.content.trim().is_empty() {
            return Err(Validation::EmptyField("content").into());
        }
        let note = self.live_note(id).await?;
        self.live_ticket(note.ticket).await?;
        let actor = self.actor(caller).await?;

        let mut diff = Diff::new();
        let Some(content) =
            diff.field("content", &note.content, Some(edit.content))
        else {
            return Ok(note);
        };
        let updated = self
            .notes
            .update_note_content(id, &content)
            .await?
            .ok_or(Error::NotFound(Entity::Note))?;
        self.recorder
            .record(
                activity::note_updated(&updated, diff.into_changes()),
                updated.ticket,
                Actor::from(&actor),
            )
            .await;
        Ok(updated)
    }

    #[tracing::instrument(skip_all, fields(note = %id))]
    pub async fn delete_note(
        &self,
        caller: &Caller,
        id: db_note::Id,
    ) -> Result<(), Error> {
        let note = self.live_note(id).await?;
        self.live_ticket(note.ticket).await?;
        let actor = self.actor(caller).await?;
        if !self.notes.soft_delete_note(id).await? {
            return Err(Error::NotFound(Entity::Note));
        }
        self.recorder
            .record(activity::note_deleted(&note), note.ticket, Actor::from(&actor))
            .await;
        Ok(())
    }

    async fn live_note(&self, id: db_note::Id) -> Result<Note, Error> {
        self.notes
            .note_by_id(id)
            .await?
            .ok_or(Error::NotFound(Entity::Note))
    }
}
