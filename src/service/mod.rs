//! Ticket lifecycle orchestration.
//!
//! Every mutating operation follows the same order: load and validate,
//! resolve mandatory collaborators, assemble the full patch, write once,
//! then record a single activity. Nothing is written if validation or a
//! mandatory lookup fails; optional lookups and the audit write only log.

mod follower;
mod note;
mod task;
mod ticket;

use std::{error::Error as StdError, sync::Arc, time::Duration};

use derive_more::{Display, From};
use futures::future;
use itertools::Itertools as _;

use crate::{
    activity::Recorder,
    api::FileRef,
    catalog::Catalog,
    config,
    context::Caller,
    db::{
        self, activity, counter, file, note as db_note, task as db_task,
        ticket as db_ticket, user, File, User,
    },
    directory::{self, Directory},
    files::FileRegistry,
    sequence::{self, SequenceAllocator},
    sla,
    transition::InvalidTransition,
};

/// The storage and external collaborators a [`Service`] runs on.
pub struct Backend {
    pub tickets: Arc<dyn db_ticket::Store>,
    pub counters: Arc<dyn counter::Store>,
    pub activities: Arc<dyn activity::Store>,
    pub notes: Arc<dyn db_note::Store>,
    pub tasks: Arc<dyn db_task::Store>,
    pub directory: Arc<dyn Directory>,
    pub files: Arc<dyn FileRegistry>,
}

impl Backend {
    /// Uses one store for every collection and collaborator.
    pub fn uniform<S>(store: Arc<S>) -> Self
    where
        S: db_ticket::Store
            + counter::Store
            + activity::Store
            + db_note::Store
            + db_task::Store
            + Directory
            + FileRegistry
            + 'static,
    {
        Self {
            tickets: store.clone(),
            counters: store.clone(),
            activities: store.clone(),
            notes: store.clone(),
            tasks: store.clone(),
            directory: store.clone(),
            files: store,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Settings {
    /// Entries per related collection embedded in a ticket view.
    pub display_cap: usize,
    pub allocation_timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            display_cap: 3,
            allocation_timeout: Duration::from_secs(5),
        }
    }
}

impl From<&config::Tickets> for Settings {
    fn from(config: &config::Tickets) -> Self {
        Self {
            display_cap: config.display_cap,
            allocation_timeout: config.allocation_timeout,
        }
    }
}

pub struct Service {
    tickets: Arc<dyn db_ticket::Store>,
    activities: Arc<dyn activity::Store>,
    notes: Arc<dyn db_note::Store>,
    tasks: Arc<dyn db_task::Store>,
    directory: Arc<dyn Directory>,
    files: Arc<dyn FileRegistry>,
    sequences: SequenceAllocator,
    recorder: Recorder,
    catalog: Catalog,
    sla: sla::Policy,
    settings: Settings,
}

impl Service {
    pub fn new(
        backend: Backend,
        catalog: Catalog,
        sla: sla::Policy,
        settings: Settings,
    ) -> Self {
        Self {
            sequences: SequenceAllocator::new(
                backend.counters,
                settings.allocation_timeout,
            ),
            recorder: Recorder::new(backend.activities.clone()),
            tickets: backend.tickets,
            activities: backend.activities,
            notes: backend.notes,
            tasks: backend.tasks,
            directory: backend.directory,
            files: backend.files,
            catalog,
            sla,
            settings,
        }
    }

    /// Seeds a counter for every known prefix. Run once at startup.
    pub async fn bootstrap(&self) -> Result<(), Error> {
        self.sequences.seed(self.catalog.known_prefixes()).await?;
        Ok(())
    }

    async fn live_ticket(
        &self,
        id: db_ticket::Id,
    ) -> Result<db_ticket::Ticket, Error> {
        self.tickets
            .ticket_by_id(id)
            .await?
            .ok_or(Error::NotFound(Entity::Ticket))
    }

    /// Resolves a user the operation cannot do without.
    async fn resolve_required(
        &self,
        caller: &Caller,
        external_id: &str,
    ) -> Result<User, Error> {
        Ok(self
            .directory
            .resolve_or_create_user(caller, external_id)
            .await?)
    }

    /// Resolves the caller as the actor of a mutation.
    async fn actor(&self, caller: &Caller) -> Result<User, Error> {
        let external_id =
            caller.external_id.as_deref().ok_or(Error::Unauthenticated)?;
        self.resolve_required(caller, external_id).await
    }

    /// Resolves followers concurrently, dropping the ones that fail.
    async fn resolve_followers(
        &self,
        caller: &Caller,
        external_ids: &[String],
    ) -> Vec<user::Id> {
        let lookups = external_ids.iter().map(|external_id| async move {
            match self
                .directory
                .resolve_or_create_user(caller, external_id)
                .await
            {
                Ok(user) => Some(user.id),
                Err(e) => {
                    tracing::warn!(
                        follower = %external_id,
                        error = %e,
                        "dropping unresolvable follower"
                    );
                    None
                }
            }
        });
        future::join_all(lookups)
            .await
            .into_iter()
            .flatten()
            .unique()
            .collect()
    }

    /// Registers files concurrently. Each one succeeds or fails on its own;
    /// failures are logged and left out of the result.
    async fn register_files(
        &self,
        caller: &Caller,
        ticket: db_ticket::Id,
        note: Option<db_note::Id>,
        files: Vec<FileRef>,
    ) -> Vec<File> {
        let registrations = files.into_iter().map(|f| async move {
            let url = f.url.clone();
            let new = file::New {
                url: f.url,
                file_type: f.file_type,
                ticket,
                note,
            };
            match self.files.register_file(caller, new).await {
                Ok(file) => Some(file),
                Err(e) => {
                    tracing::warn!(
                        %ticket,
                        %url,
                        error = %e,
                        "failed to register file"
                    );
                    None
                }
            }
        });
        future::join_all(registrations)
            .await
            .into_iter()
            .flatten()
            .collect()
    }
}

#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum Entity {
    #[display("ticket")]
    Ticket,
    #[display("note")]
    Note,
    #[display("task")]
    Task,
    #[display("user")]
    User,
    #[display("follower")]
    Follower,
}

#[derive(Clone, Debug, Display, Eq, From, PartialEq)]
pub enum Validation {
    #[from]
    InvalidTransition(InvalidTransition),

    #[display("user is already following this ticket")]
    DuplicateFollower,

    #[display("user is not following this ticket")]
    NotAFollower,

    #[display("assignee reference is malformed")]
    MalformedAssignee,

    #[display("{_0} must not be empty")]
    EmptyField(&'static str),
}

#[derive(Debug, Display, From)]
pub enum Error {
    #[display("{_0} not found")]
    NotFound(Entity),

    #[from]
    Validation(Validation),

    #[from]
    Dependency(directory::Error),

    #[from]
    Concurrency(sequence::Error),

    #[display("caller identity required")]
    Unauthenticated,

    #[from]
    Store(db::Error),
}

impl From<InvalidTransition> for Error {
    fn from(e: InvalidTransition) -> Self {
        Self::Validation(e.into())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Dependency(e) => Some(e),
            Self::Concurrency(e) => Some(e),
            Self::Store(e) => Some(e),
            Self::NotFound(_) | Self::Validation(_) | Self::Unauthenticated => {
                None
            }
        }
    }
}
