use time::OffsetDateTime;

use crate::{
    activity,
    api::{self, ticket::Details},
    context::Caller,
    db::{
        activity::Actor,
        ticket::{
            self as db_ticket, Filter, Number, Patch, Sort, Status, Ticket,
        },
        Capped, Page, Paginated,
    },
    diff::Diff,
    sla,
    transition::{self, Transition},
};

use super::{Entity, Error, Service, Validation};

const DEFAULT_SOURCE: &str = "web";

impl Service {
    /// Opens a new ticket.
    ///
    /// All lookups happen before the sequence is allocated, so a failed
    /// mandatory lookup neither writes nor consumes a ticket number.
    #[tracing::instrument(skip_all, fields(ticket_type = %input.ticket_type))]
    pub async fn create(
        &self,
        caller: &Caller,
        input: api::ticket::New,
    ) -> Result<Ticket, Error> {
        if input.customer_id.trim().is_empty() {
            return Err(Validation::EmptyField("customerId").into());
        }
        let assignee_id = match input.assignee_id.as_deref() {
            Some(id) if id.trim().is_empty() => {
                return Err(Validation::MalformedAssignee.into());
            }
            id => id,
        };

        let customer = self.resolve_required(caller, &input.customer_id);
        let assignee = async {
            match assignee_id {
                Some(id) => self.resolve_required(caller, id).await.map(Some),
                None => Ok(None),
            }
        };
        let (customer, assignee) = tokio::try_join!(customer, assignee)?;
        let followers =
            self.resolve_followers(caller, &input.followers).await;

        let actor = match caller.external_id.as_deref() {
            Some(id) => match self.resolve_required(caller, id).await {
                Ok(user) => Actor::from(&user),
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        "crediting ticket creation to the customer"
                    );
                    Actor::from(&customer)
                }
            },
            None => Actor::from(&customer),
        };

        let prefix = self.catalog.prefix_for(input.ticket_type);
        let ticket_number = self.sequences.next_number(prefix).await?;

        let priority = sla::resolve_priority(
            input.priority,
            self.catalog.default_priority(input.ticket_type),
        );
        let due = self.sla.due_dates(priority, OffsetDateTime::now_utc());

        let ticket = self
            .tickets
            .create_ticket(db_ticket::New {
                ticket_number,
                customer: customer.snapshot(),
                assignee: assignee.as_ref().map(|a| a.snapshot()),
                subject: input.subject,
                message: input.message,
                ticket_type: input.ticket_type,
                priority,
                status: Status::Open,
                source: input
                    .source
                    .filter(|s| !s.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_SOURCE.to_owned()),
                first_response_due: due.first_response_due,
                resolution_due: due.resolution_due,
                followers,
            })
            .await?;
        tracing::info!(
            ticket = %ticket.id,
            number = %ticket.ticket_number,
            "ticket created"
        );

        self.recorder
            .record(activity::ticket_created(&ticket), ticket.id, actor)
            .await;

        if !input.files.is_empty() {
            self.register_files(caller, ticket.id, None, input.files)
                .await;
        }

        Ok(ticket)
    }

    /// Returns a live ticket with the newest few related entries embedded.
    #[tracing::instrument(skip_all, fields(ticket = %id))]
    pub async fn find_one_by_id(
        &self,
        caller: &Caller,
        id: db_ticket::Id,
    ) -> Result<Details, Error> {
        let ticket = self.live_ticket(id).await?;

        let cap = self.settings.display_cap;
        let overfetch = cap.saturating_add(1);
        let (activities, tasks, notes) = tokio::try_join!(
            self.activities.activities_for_ticket(id, overfetch),
            self.tasks.tasks_for_ticket(id, overfetch),
            self.notes.notes_for_ticket(id, overfetch),
        )?;
        let files = match self.files.files_for_ticket(caller, id, overfetch).await
        {
            Ok(files) => Capped::from_overfetch(files, cap),
            Err(e) => {
                tracing::warn!(error = %e, "omitting ticket files");
                Capped::default()
            }
        };

        Ok(Details {
            ticket,
            activities: Capped::from_overfetch(activities, cap),
            tasks: Capped::from_overfetch(tasks, cap),
            notes: Capped::from_overfetch(notes, cap),
            files,
        })
    }

    pub async fn find_by_number(&self, number: &Number) -> Result<Ticket, Error> {
        self.tickets
            .find_ticket(&Filter::by_number(number.clone()))
            .await?
            .ok_or(Error::NotFound(Entity::Ticket))
    }

    pub async fn list(
        &self,
        filter: &Filter,
        page: Page,
        sort: Sort,
    ) -> Result<Paginated<Ticket>, Error> {
        Ok(self.tickets.find_tickets(filter, page, sort).await?)
    }

    /// Applies the requested field changes and records one activity.
    ///
    /// The status transition is checked before anything else is looked up
    /// or written; a rejected transition leaves the ticket untouched.
    #[tracing::instrument(skip_all, fields(ticket = %id))]
    pub async fn update(
        &self,
        caller: &Caller,
        id: db_ticket::Id,
        edit: api::ticket::Edit,
    ) -> Result<api::ticket::Updated, Error> {
        let ticket = self.live_ticket(id).await?;

        let status = match edit.status {
            Some(to) => match transition::apply_transition(ticket.status, to)?
            {
                Transition::Unchanged => None,
                Transition::Moved { to, .. } => Some(to),
            },
            None => None,
        };
        if edit
            .assignee_id
            .as_deref()
            .is_some_and(|id| id.trim().is_empty())
        {
            return Err(Validation::MalformedAssignee.into());
        }

        let actor = self.actor(caller).await?;
        let assignee = match edit.assignee_id.as_deref() {
            Some(external_id) => {
                Some(self.resolve_required(caller, external_id).await?)
            }
            None => None,
        };

        let mut diff = Diff::new();
        let mut patch = Patch {
            subject: diff.field("subject", &ticket.subject, edit.subject),
            message: diff.field("message", &ticket.message, edit.message),
            ticket_type: diff.field(
                "ticketType",
                &ticket.ticket_type,
                edit.ticket_type,
            ),
            status: diff.field("status", &ticket.status, status),
            priority: diff.field("priority", &ticket.priority, edit.priority),
            ..Patch::default()
        };
        if let Some(assignee) = assignee {
            let current = ticket.assignee.as_ref().map(|a| a.id);
            if current != Some(assignee.id) {
                let snapshot = assignee.snapshot();
                diff.synthetic("assignee", &ticket.assignee, &snapshot);
                patch.assignee = Some(snapshot);
            }
        }
        if diff.is_empty() && edit.files.is_empty() {
            tracing::debug!("no changes requested");
            return Ok(api::ticket::Updated {
                ticket,
                activity: None,
            });
        }

        // Files are attached only once the ticket write has gone through.
        let updated = if patch.is_empty() {
            ticket
        } else {
            self.tickets
                .update_ticket(id, &patch)
                .await?
                .ok_or(Error::NotFound(Entity::Ticket))?
        };
        if !edit.files.is_empty() {
            let before = self
                .files
                .count_for_ticket(caller, id)
                .await
                .unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "cannot count ticket files");
                    0
                });
            let added =
                self.register_files(caller, id, None, edit.files).await.len();
            if added > 0 {
                diff.synthetic("files", &before, &(before + added));
            }
        }
        if diff.is_empty() {
            tracing::debug!("no file could be attached");
            return Ok(api::ticket::Updated {
                ticket: updated,
                activity: None,
            });
        }
        let activity = self
            .recorder
            .record(
                activity::ticket_updated(diff.into_changes(), &updated),
                id,
                Actor::from(&actor),
            )
            .await;

        Ok(api::ticket::Updated {
            ticket: updated,
            activity,
        })
    }

    /// Marks a ticket deleted. Related entries are left in place.
    #[tracing::instrument(skip_all, fields(ticket = %id))]
    pub async fn soft_delete(
        &self,
        caller: &Caller,
        id: db_ticket::Id,
    ) -> Result<(), Error> {
        let ticket = self.live_ticket(id).await?;
        if !self.tickets.soft_delete_ticket(id).await? {
            return Err(Error::NotFound(Entity::Ticket));
        }
        tracing::info!(number = %ticket.ticket_number, "ticket deleted");

        match self.actor(caller).await {
            Ok(actor) => {
                self.recorder
                    .record(
                        activity::ticket_deleted(&ticket),
                        id,
                        Actor::from(&actor),
                    )
                    .await;
            }
            Err(e) => {
                tracing::debug!(error = %e, "deletion not attributed");
            }
        }
        Ok(())
    }

    /// Removes a ticket for good, deleted or not.
    #[tracing::instrument(skip_all, fields(ticket = %id))]
    pub async fn delete_permanently(
        &self,
        id: db_ticket::Id,
    ) -> Result<(), Error> {
        if !self.tickets.delete_ticket_permanently(id).await? {
            return Err(Error::NotFound(Entity::Ticket));
        }
        tracing::info!("ticket permanently deleted");
        Ok(())
    }
}
