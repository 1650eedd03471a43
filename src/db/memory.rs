//! Process-local implementation of every store contract.
//!
//! State lives behind a single mutex that is never held across an await
//! point, so each call is one atomic step just like a single-document write.

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::{
    context::Caller,
    directory::{self, Directory},
    files::{self, FileRegistry},
};

use super::{
    activity::{self, Activity},
    counter,
    file::{self, File},
    note::{self, Note},
    task::{self, Task},
    ticket::{self, Ticket},
    user::{self, User},
    Direction, Error, Page, Paginated,
};

#[derive(Default)]
struct State {
    users: Vec<User>,
    tickets: Vec<Ticket>,
    counters: HashMap<String, i64>,
    activities: Vec<Activity>,
    notes: Vec<Note>,
    tasks: Vec<Task>,
    files: Vec<File>,
}

#[derive(Default)]
pub struct Memory {
    state: Mutex<State>,
}

impl Memory {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a user up front, e.g. with a display name and avatar.
    pub fn insert_user(&self, user: User) {
        self.state().users.push(user);
    }

    /// Current value of a counter, if it has been seeded or used.
    pub fn counter(&self, prefix: &str) -> Option<i64> {
        self.state().counters.get(prefix).copied()
    }
}

/// Most recently inserted first, skipping soft-deleted entries.
fn newest_live<T: Clone>(
    items: &[T],
    limit: usize,
    keep: impl Fn(&T) -> bool,
) -> Vec<T> {
    items
        .iter()
        .rev()
        .filter(|item| keep(item))
        .take(limit)
        .cloned()
        .collect()
}

#[async_trait]
impl ticket::Store for Memory {
    async fn create_ticket(&self, new: ticket::New) -> Result<Ticket, Error> {
        let now = OffsetDateTime::now_utc();
        let ticket = Ticket {
            id: ticket::Id::new(),
            ticket_number: new.ticket_number,
            customer: new.customer,
            assignee: new.assignee,
            subject: new.subject,
            message: new.message,
            ticket_type: new.ticket_type,
            priority: new.priority,
            status: new.status,
            source: new.source,
            first_response_due: new.first_response_due,
            resolution_due: new.resolution_due,
            followers: new.followers,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        };

        let mut state = self.state();
        if state
            .tickets
            .iter()
            .any(|t| t.ticket_number == ticket.ticket_number)
        {
            return Err(Error::Corrupted(format!(
                "duplicate ticket number {}",
                ticket.ticket_number,
            )));
        }
        state.tickets.push(ticket.clone());
        Ok(ticket)
    }

    async fn ticket_by_id(
        &self,
        id: ticket::Id,
    ) -> Result<Option<Ticket>, Error> {
        Ok(self
            .state()
            .tickets
            .iter()
            .find(|t| t.id == id && t.deleted_at.is_none())
            .cloned())
    }

    async fn find_ticket(
        &self,
        filter: &ticket::Filter,
    ) -> Result<Option<Ticket>, Error> {
        Ok(self
            .state()
            .tickets
            .iter()
            .find(|t| filter.matches(t))
            .cloned())
    }

    async fn find_tickets(
        &self,
        filter: &ticket::Filter,
        page: Page,
        sort: ticket::Sort,
    ) -> Result<Paginated<Ticket>, Error> {
        let state = self.state();
        let mut matching = state
            .tickets
            .iter()
            .enumerate()
            .filter(|(_, t)| filter.matches(t))
            .collect::<Vec<_>>();

        let key = |t: &Ticket| match sort.field {
            ticket::SortField::CreatedAt => t.created_at,
            ticket::SortField::UpdatedAt => t.updated_at,
        };
        matching.sort_by(|(ia, a), (ib, b)| {
            let ordering = key(a).cmp(&key(b)).then(ia.cmp(ib));
            match sort.direction {
                Direction::Asc => ordering,
                Direction::Desc => ordering.reverse(),
            }
        });

        let total_count = matching.len();
        let items = matching
            .into_iter()
            .skip(page.offset())
            .take(page.limit)
            .map(|(_, t)| t.clone())
            .collect();
        Ok(Paginated::new(items, total_count, page))
    }

    async fn update_ticket(
        &self,
        id: ticket::Id,
        patch: &ticket::Patch,
    ) -> Result<Option<Ticket>, Error> {
        let mut state = self.state();
        let Some(ticket) = state
            .tickets
            .iter_mut()
            .find(|t| t.id == id && t.deleted_at.is_none())
        else {
            return Ok(None);
        };
        patch.apply(ticket);
        ticket.updated_at = OffsetDateTime::now_utc();
        Ok(Some(ticket.clone()))
    }

    async fn soft_delete_ticket(&self, id: ticket::Id) -> Result<bool, Error> {
        let mut state = self.state();
        Ok(state
            .tickets
            .iter_mut()
            .find(|t| t.id == id && t.deleted_at.is_none())
            .map(|t| t.deleted_at = Some(OffsetDateTime::now_utc()))
            .is_some())
    }

    async fn delete_ticket_permanently(
        &self,
        id: ticket::Id,
    ) -> Result<bool, Error> {
        let mut state = self.state();
        let before = state.tickets.len();
        state.tickets.retain(|t| t.id != id);
        Ok(state.tickets.len() < before)
    }
}

#[async_trait]
impl counter::Store for Memory {
    async fn seed_counter(&self, prefix: &str) -> Result<(), Error> {
        self.state().counters.entry(prefix.to_owned()).or_insert(0);
        Ok(())
    }

    async fn increment_and_fetch(&self, prefix: &str) -> Result<i64, Error> {
        let mut state = self.state();
        let sequence = state.counters.entry(prefix.to_owned()).or_insert(0);
        *sequence += 1;
        Ok(*sequence)
    }
}

#[async_trait]
impl activity::Store for Memory {
    async fn insert_activity(
        &self,
        new: activity::New,
    ) -> Result<Activity, Error> {
        let activity = Activity {
            id: activity::Id::new(),
            kind: new.kind,
            description: new.description,
            created_by: new.created_by,
            ticket: new.ticket,
            metadata: new.metadata,
            deleted_at: None,
            created_at: OffsetDateTime::now_utc(),
        };
        self.state().activities.push(activity.clone());
        Ok(activity)
    }

    async fn activities_for_ticket(
        &self,
        ticket: ticket::Id,
        limit: usize,
    ) -> Result<Vec<Activity>, Error> {
        Ok(newest_live(&self.state().activities, limit, |a| {
            a.ticket == ticket && a.deleted_at.is_none()
        }))
    }
}

#[async_trait]
impl note::Store for Memory {
    async fn create_note(&self, new: note::New) -> Result<Note, Error> {
        let now = OffsetDateTime::now_utc();
        let note = Note {
            id: note::Id::new(),
            ticket: new.ticket,
            content: new.content,
            created_by: new.created_by,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        };
        self.state().notes.push(note.clone());
        Ok(note)
    }

    async fn note_by_id(&self, id: note::Id) -> Result<Option<Note>, Error> {
        Ok(self
            .state()
            .notes
            .iter()
            .find(|n| n.id == id && n.deleted_at.is_none())
            .cloned())
    }

    async fn update_note_content(
        &self,
        id: note::Id,
        content: &str,
    ) -> Result<Option<Note>, Error> {
        let mut state = self.state();
        Ok(state
            .notes
            .iter_mut()
            .find(|n| n.id == id && n.deleted_at.is_none())
            .map(|note| {
                content.clone_into(&mut note.content);
                note.updated_at = OffsetDateTime::now_utc();
                note.clone()
            }))
    }

    async fn soft_delete_note(&self, id: note::Id) -> Result<bool, Error> {
        let mut state = self.state();
        Ok(state
            .notes
            .iter_mut()
            .find(|n| n.id == id && n.deleted_at.is_none())
            .map(|n| n.deleted_at = Some(OffsetDateTime::now_utc()))
            .is_some())
    }

    async fn notes_for_ticket(
        &self,
        ticket: ticket::Id,
        limit: usize,
    ) -> Result<Vec<Note>, Error> {
        Ok(newest_live(&self.state().notes, limit, |n| {
            n.ticket == ticket && n.deleted_at.is_none()
        }))
    }
}

#[async_trait]
impl task::Store for Memory {
    async fn create_task(&self, new: task::New) -> Result<Task, Error> {
        let now = OffsetDateTime::now_utc();
        let task = Task {
            id: task::Id::new(),
            ticket: new.ticket,
            title: new.title,
            is_completed: false,
            due_date: new.due_date,
            created_by: new.created_by,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        };
        self.state().tasks.push(task.clone());
        Ok(task)
    }

    async fn task_by_id(&self, id: task::Id) -> Result<Option<Task>, Error> {
        Ok(self
            .state()
            .tasks
            .iter()
            .find(|t| t.id == id && t.deleted_at.is_none())
            .cloned())
    }

    async fn update_task(
        &self,
        id: task::Id,
        patch: &task::Patch,
    ) -> Result<Option<Task>, Error> {
        let mut state = self.state();
        Ok(state
            .tasks
            .iter_mut()
            .find(|t| t.id == id && t.deleted_at.is_none())
            .map(|task| {
                patch.apply(task);
                task.updated_at = OffsetDateTime::now_utc();
                task.clone()
            }))
    }

    async fn soft_delete_task(&self, id: task::Id) -> Result<bool, Error> {
        let mut state = self.state();
        Ok(state
            .tasks
            .iter_mut()
            .find(|t| t.id == id && t.deleted_at.is_none())
            .map(|t| t.deleted_at = Some(OffsetDateTime::now_utc()))
            .is_some())
    }

    async fn tasks_for_ticket(
        &self,
        ticket: ticket::Id,
        limit: usize,
    ) -> Result<Vec<Task>, Error> {
        Ok(newest_live(&self.state().tasks, limit, |t| {
            t.ticket == ticket && t.deleted_at.is_none()
        }))
    }
}

#[async_trait]
impl Directory for Memory {
    async fn resolve_or_create_user(
        &self,
        _: &Caller,
        external_id: &str,
    ) -> Result<User, directory::Error> {
        let mut state = self.state();
        if let Some(user) =
            state.users.iter().find(|u| u.external_id == external_id)
        {
            return Ok(user.clone());
        }
        let user = User {
            id: user::Id::new(),
            external_id: external_id.to_owned(),
            name: external_id.to_owned(),
            avatar: None,
        };
        state.users.push(user.clone());
        Ok(user)
    }

    async fn user_by_id(
        &self,
        _: &Caller,
        id: user::Id,
    ) -> Result<Option<User>, directory::Error> {
        Ok(self.state().users.iter().find(|u| u.id == id).cloned())
    }

    async fn user_by_external_id(
        &self,
        _: &Caller,
        external_id: &str,
    ) -> Result<Option<User>, directory::Error> {
        Ok(self
            .state()
            .users
            .iter()
            .find(|u| u.external_id == external_id)
            .cloned())
    }
}

#[async_trait]
impl FileRegistry for Memory {
    async fn register_file(
        &self,
        _: &Caller,
        new: file::New,
    ) -> Result<File, files::Error> {
        let file = File {
            id: file::Id::new(),
            ticket: new.ticket,
            note: new.note,
            url: new.url,
            file_type: new.file_type,
            deleted_at: None,
            created_at: OffsetDateTime::now_utc(),
        };
        self.state().files.push(file.clone());
        Ok(file)
    }

    async fn files_for_ticket(
        &self,
        _: &Caller,
        ticket: ticket::Id,
        limit: usize,
    ) -> Result<Vec<File>, files::Error> {
        Ok(newest_live(&self.state().files, limit, |f| {
            f.ticket == ticket && f.deleted_at.is_none()
        }))
    }

    async fn count_for_ticket(
        &self,
        _: &Caller,
        ticket: ticket::Id,
    ) -> Result<usize, files::Error> {
        Ok(self
            .state()
            .files
            .iter()
            .filter(|f| f.ticket == ticket && f.deleted_at.is_none())
            .count())
    }
}
