use crate::{
    activity,
    api,
    context::Caller,
    db::{
        activity::Actor,
        ticket::{self as db_ticket, Patch},
        user,
    },
    diff::Diff,
};

use super::{Entity, Error, Service, Validation};

impl Service {
    #[tracing::instrument(skip_all, fields(ticket = %id))]
    pub async fn add_follower(
        &self,
        caller: &Caller,
        id: db_ticket::Id,
        follower_external_id: &str,
    ) -> Result<api::ticket::Updated, Error> {
        let ticket = self.live_ticket(id).await?;
        let follower = self
            .resolve_required(caller, follower_external_id)
            .await?;
        if ticket.has_follower(follower.id) {
            return Err(Validation::DuplicateFollower.into());
        }
        let actor = self.actor(caller).await?;

        let mut followers = ticket.followers.clone();
        followers.push(follower.id);
        self.write_followers(id, &ticket.followers, followers, &actor)
            .await
    }

    /// Takes a user off the follower list. Every party involved must
    /// already exist; nothing is created on this path.
    #[tracing::instrument(skip_all, fields(ticket = %id, follower = %follower_id))]
    pub async fn remove_follower(
        &self,
        caller: &Caller,
        id: db_ticket::Id,
        follower_id: user::Id,
    ) -> Result<api::ticket::Updated, Error> {
        let ticket = self.live_ticket(id).await?;
        let actor_id =
            caller.external_id.as_deref().ok_or(Error::Unauthenticated)?;
        let (actor, follower) = tokio::try_join!(
            self.directory.user_by_external_id(caller, actor_id),
            self.directory.user_by_id(caller, follower_id),
        )?;
        let actor = actor.ok_or(Error::NotFound(Entity::User))?;
        let follower = follower.ok_or(Error::NotFound(Entity::Follower))?;
        if !ticket.has_follower(follower.id) {
            return Err(Validation::NotAFollower.into());
        }

        let followers = ticket
            .followers
            .iter()
            .copied()
            .filter(|id| *id != follower.id)
            .collect();
        self.write_followers(id, &ticket.followers, followers, &actor)
            .await
    }

    async fn write_followers(
        &self,
        id: db_ticket::Id,
        current: &Vec<user::Id>,
        followers: Vec<user::Id>,
        actor: &user::User,
    ) -> Result<api::ticket::Updated, Error> {
        let mut diff = Diff::new();
        let patch = Patch {
            followers: diff.field("followers", current, Some(followers)),
            ..Patch::default()
        };
        let updated = self
            .tickets
            .update_ticket(id, &patch)
            .await?
            .ok_or(Error::NotFound(Entity::Ticket))?;
        let activity = self
            .recorder
            .record(
                activity::ticket_updated(diff.into_changes(), &updated),
                id,
                Actor::from(actor),
            )
            .await;
        Ok(api::ticket::Updated {
            ticket: updated,
            activity,
        })
    }
}
