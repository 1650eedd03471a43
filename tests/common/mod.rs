use std::{collections::HashSet, sync::Arc};

use async_trait::async_trait;
use helpdesk::{
    api,
    context::Caller,
    db::{
        self, activity, activity::Store as _, file, ticket, ticket::Store as _,
        user, File, Memory, Page, Paginated, Ticket, User,
    },
    directory::{self, Directory},
    files::{self, FileRegistry},
    service::{Backend, Settings},
    sla, Catalog, Service,
};

pub const AGENT: &str = "agent-1";
pub const CUSTOMER: &str = "customer-1";

pub fn agent() -> Caller {
    Caller::authenticated(AGENT).with_token("agent-token")
}

pub struct Harness {
    pub memory: Arc<Memory>,
    pub service: Service,
}

impl Harness {
    pub async fn new() -> Self {
        Fixture::new().build().await
    }

    pub async fn open_ticket(&self, ticket_type: api::ticket::Type) -> api::Ticket {
        self.service
            .create(
                &agent(),
                api::ticket::New::new(CUSTOMER, "Subject", "Message", ticket_type),
            )
            .await
            .expect("failed to create a ticket")
    }

    /// Walks a fresh ticket through valid transitions until it reaches
    /// `status`.
    pub async fn ticket_in(&self, status: api::ticket::Status) -> api::Ticket {
        use api::ticket::Status as S;

        let path: &[S] = match status {
            S::Open => &[],
            S::InProgress => &[S::InProgress],
            S::Pending => &[S::Pending],
            S::Resolved => &[S::InProgress, S::Resolved],
            S::Closed => &[S::Closed],
            S::Reopened => &[S::Closed, S::Reopened],
        };
        let mut ticket = self.open_ticket(api::ticket::Type::SiteIssue).await;
        for step in path {
            ticket = self
                .service
                .update(
                    &agent(),
                    ticket.id,
                    api::ticket::Edit {
                        status: Some(*step),
                        ..Default::default()
                    },
                )
                .await
                .expect("failed to walk a ticket")
                .ticket;
        }
        assert_eq!(ticket.status, status);
        ticket
    }

    pub async fn activities(&self, ticket: ticket::Id) -> Vec<activity::Activity> {
        activity::Store::activities_for_ticket(&*self.memory, ticket, usize::MAX)
            .await
            .expect("failed to read activities")
    }

    pub async fn user(&self, external_id: &str) -> User {
        self.memory
            .resolve_or_create_user(&agent(), external_id)
            .await
            .expect("failed to resolve a user")
    }
}

pub struct Fixture {
    memory: Arc<Memory>,
    backend: Backend,
    settings: Settings,
}

impl Fixture {
    pub fn new() -> Self {
        let memory = Arc::new(Memory::new());
        Self {
            backend: Backend::uniform(memory.clone()),
            memory,
            settings: Settings::default(),
        }
    }

    pub fn failing_activities(mut self) -> Self {
        self.backend.activities = Arc::new(FailingActivities(self.memory.clone()));
        self
    }

    pub fn failing_ticket_writes(mut self) -> Self {
        self.backend.tickets = Arc::new(FailingTicketWrites(self.memory.clone()));
        self
    }

    pub fn refusing(mut self, external_ids: &[&str]) -> Self {
        self.backend.directory = Arc::new(RefusingDirectory {
            inner: self.memory.clone(),
            refused: external_ids.iter().map(|&id| id.to_owned()).collect(),
        });
        self
    }

    pub fn failing_files(mut self, urls: &[&str]) -> Self {
        self.backend.files = Arc::new(FailingFiles {
            inner: self.memory.clone(),
            failing: urls.iter().map(|&url| url.to_owned()).collect(),
            unavailable: false,
        });
        self
    }

    pub fn unavailable_files(mut self) -> Self {
        self.backend.files = Arc::new(FailingFiles {
            inner: self.memory.clone(),
            failing: HashSet::new(),
            unavailable: true,
        });
        self
    }

    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    pub async fn build(self) -> Harness {
        let service = Service::new(
            self.backend,
            Catalog::default(),
            sla::Policy::default(),
            self.settings,
        );
        service.bootstrap().await.expect("failed to bootstrap");
        Harness {
            memory: self.memory,
            service,
        }
    }
}

/// Rejects every audit write; reads go through.
pub struct FailingActivities(pub Arc<Memory>);

#[async_trait]
impl activity::Store for FailingActivities {
    async fn insert_activity(
        &self,
        _: activity::New,
    ) -> Result<activity::Activity, db::Error> {
        Err(db::Error::Unavailable("audit store is down".into()))
    }

    async fn activities_for_ticket(
        &self,
        ticket: ticket::Id,
        limit: usize,
    ) -> Result<Vec<activity::Activity>, db::Error> {
        self.0.activities_for_ticket(ticket, limit).await
    }
}

/// Rejects ticket updates; everything else goes through.
pub struct FailingTicketWrites(pub Arc<Memory>);

#[async_trait]
impl ticket::Store for FailingTicketWrites {
    async fn create_ticket(&self, new: ticket::New) -> Result<Ticket, db::Error> {
        self.0.create_ticket(new).await
    }

    async fn ticket_by_id(&self, id: ticket::Id) -> Result<Option<Ticket>, db::Error> {
        self.0.ticket_by_id(id).await
    }

    async fn find_ticket(
        &self,
        filter: &ticket::Filter,
    ) -> Result<Option<Ticket>, db::Error> {
        self.0.find_ticket(filter).await
    }

    async fn find_tickets(
        &self,
        filter: &ticket::Filter,
        page: Page,
        sort: ticket::Sort,
    ) -> Result<Paginated<Ticket>, db::Error> {
        self.0.find_tickets(filter, page, sort).await
    }

    async fn update_ticket(
        &self,
        _: ticket::Id,
        _: &ticket::Patch,
    ) -> Result<Option<Ticket>, db::Error> {
        Err(db::Error::Unavailable("ticket store is read-only".into()))
    }

    async fn soft_delete_ticket(&self, id: ticket::Id) -> Result<bool, db::Error> {
        self.0.soft_delete_ticket(id).await
    }

    async fn delete_ticket_permanently(
        &self,
        id: ticket::Id,
    ) -> Result<bool, db::Error> {
        self.0.delete_ticket_permanently(id).await
    }
}

pub struct RefusingDirectory {
    inner: Arc<Memory>,
    refused: HashSet<String>,
}

#[async_trait]
impl Directory for RefusingDirectory {
    async fn resolve_or_create_user(
        &self,
        caller: &Caller,
        external_id: &str,
    ) -> Result<User, directory::Error> {
        if self.refused.contains(external_id) {
            return Err(directory::Error::NotFound(external_id.to_owned()));
        }
        self.inner.resolve_or_create_user(caller, external_id).await
    }

    async fn user_by_id(
        &self,
        caller: &Caller,
        id: user::Id,
    ) -> Result<Option<User>, directory::Error> {
        self.inner.user_by_id(caller, id).await
    }

    async fn user_by_external_id(
        &self,
        caller: &Caller,
        external_id: &str,
    ) -> Result<Option<User>, directory::Error> {
        if self.refused.contains(external_id) {
            return Ok(None);
        }
        self.inner.user_by_external_id(caller, external_id).await
    }
}

pub struct FailingFiles {
    inner: Arc<Memory>,
    failing: HashSet<String>,
    unavailable: bool,
}

#[async_trait]
impl FileRegistry for FailingFiles {
    async fn register_file(
        &self,
        caller: &Caller,
        new: file::New,
    ) -> Result<File, files::Error> {
        if self.unavailable {
            return Err(files::Error::Unavailable("storage is down".into()));
        }
        if self.failing.contains(&new.url) {
            return Err(files::Error::Rejected(new.url));
        }
        self.inner.register_file(caller, new).await
    }

    async fn files_for_ticket(
        &self,
        caller: &Caller,
        ticket: ticket::Id,
        limit: usize,
    ) -> Result<Vec<File>, files::Error> {
        if self.unavailable {
            return Err(files::Error::Unavailable("storage is down".into()));
        }
        self.inner.files_for_ticket(caller, ticket, limit).await
    }

    async fn count_for_ticket(
        &self,
        caller: &Caller,
        ticket: ticket::Id,
    ) -> Result<usize, files::Error> {
        if self.unavailable {
            return Err(files::Error::Unavailable("storage is down".into()));
        }
        self.inner.count_for_ticket(caller, ticket).await
    }
}
