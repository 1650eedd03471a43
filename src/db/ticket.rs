use std::{error::Error as StdError, str::FromStr};

use async_trait::async_trait;
use derive_more::Display;
use enum_utils::TryFromRepr;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use time::OffsetDateTime;
use tokio_postgres::{
    types::{
        accepts, private::BytesMut, to_sql_checked, FromSql, IsNull, Json,
        ToSql, Type as SqlType,
    },
    Row,
};

use super::{
    int2_enum, to_i64,
    user::{self, Snapshot},
    uuid_id, Clauses, Client, Direction, Error, Page, Paginated,
};

uuid_id!(Id);

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub id: Id,
    pub ticket_number: Number,
    pub customer: Snapshot,
    pub assignee: Option<Snapshot>,
    pub subject: String,
    pub message: String,
    pub ticket_type: Type,
    pub priority: Priority,
    pub status: Status,
    pub source: String,
    #[serde(with = "time::serde::rfc3339")]
    pub first_response_due: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub resolution_due: OffsetDateTime,
    pub followers: Vec<user::Id>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub deleted_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Ticket {
    pub fn has_follower(&self, id: user::Id) -> bool {
        self.followers.contains(&id)
    }

    fn from_row(row: &Row) -> Self {
        Self {
            id: row.get("id"),
            ticket_number: row.get("ticket_number"),
            customer: row.get::<_, Json<Snapshot>>("customer").0,
            assignee: row
                .get::<_, Option<Json<Snapshot>>>("assignee")
                .map(|json| json.0),
            subject: row.get("subject"),
            message: row.get("message"),
            ticket_type: row.get("ticket_type"),
            priority: row.get("priority"),
            status: row.get("status"),
            source: row.get("source"),
            first_response_due: row.get("first_response_due"),
            resolution_due: row.get("resolution_due"),
            followers: row.get("followers"),
            deleted_at: row.get("deleted_at"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }
}

/// Everything a store needs to insert a ticket. Identity and lifecycle
/// timestamps are assigned by the store.
#[derive(Clone, Debug)]
pub struct New {
    pub ticket_number: Number,
    pub customer: Snapshot,
    pub assignee: Option<Snapshot>,
    pub subject: String,
    pub message: String,
    pub ticket_type: Type,
    pub priority: Priority,
    pub status: Status,
    pub source: String,
    pub first_response_due: OffsetDateTime,
    pub resolution_due: OffsetDateTime,
    pub followers: Vec<user::Id>,
}

/// Fully assembled set of field changes, written in one call.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Patch {
    pub subject: Option<String>,
    pub message: Option<String>,
    pub ticket_type: Option<Type>,
    pub status: Option<Status>,
    pub priority: Option<Priority>,
    pub assignee: Option<Snapshot>,
    pub followers: Option<Vec<user::Id>>,
}

impl Patch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply(&self, ticket: &mut Ticket) {
        if let Some(subject) = &self.subject {
            ticket.subject.clone_from(subject);
        }
        if let Some(message) = &self.message {
            ticket.message.clone_from(message);
        }
        if let Some(ticket_type) = self.ticket_type {
            ticket.ticket_type = ticket_type;
        }
        if let Some(status) = self.status {
            ticket.status = status;
        }
        if let Some(priority) = self.priority {
            ticket.priority = priority;
        }
        if let Some(assignee) = &self.assignee {
            ticket.assignee = Some(assignee.clone());
        }
        if let Some(followers) = &self.followers {
            ticket.followers.clone_from(followers);
        }
    }
}

/// Conditions combined with AND. Soft-deleted tickets never match.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Filter {
    pub ticket_number: Option<Number>,
    pub status: Option<Status>,
    pub priority: Option<Priority>,
    pub ticket_type: Option<Type>,
    pub assignee: Option<user::Id>,
    pub customer: Option<user::Id>,
}

impl Filter {
    pub fn by_number(number: Number) -> Self {
        Self {
            ticket_number: Some(number),
            ..Self::default()
        }
    }

    pub fn matches(&self, ticket: &Ticket) -> bool {
        ticket.deleted_at.is_none()
            && self
                .ticket_number
                .as_ref()
                .map_or(true, |n| *n == ticket.ticket_number)
            && self.status.map_or(true, |s| s == ticket.status)
            && self.priority.map_or(true, |p| p == ticket.priority)
            && self.ticket_type.map_or(true, |t| t == ticket.ticket_type)
            && self.assignee.map_or(true, |id| {
                ticket.assignee.as_ref().is_some_and(|a| a.id == id)
            })
            && self.customer.map_or(true, |id| ticket.customer.id == id)
    }
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    #[default]
    CreatedAt,
    UpdatedAt,
}

impl SortField {
    fn column(self) -> &'static str {
        match self {
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Sort {
    #[serde(default)]
    pub field: SortField,
    #[serde(default)]
    pub direction: Direction,
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn create_ticket(&self, new: New) -> Result<Ticket, Error>;

    /// Returns `None` for missing and soft-deleted tickets alike.
    async fn ticket_by_id(&self, id: Id) -> Result<Option<Ticket>, Error>;

    async fn find_ticket(
        &self,
        filter: &Filter,
    ) -> Result<Option<Ticket>, Error>;

    async fn find_tickets(
        &self,
        filter: &Filter,
        page: Page,
        sort: Sort,
    ) -> Result<Paginated<Ticket>, Error>;

    /// Applies the whole patch atomically and returns the stored result.
    async fn update_ticket(
        &self,
        id: Id,
        patch: &Patch,
    ) -> Result<Option<Ticket>, Error>;

    async fn soft_delete_ticket(&self, id: Id) -> Result<bool, Error>;

    async fn delete_ticket_permanently(&self, id: Id) -> Result<bool, Error>;
}

#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Display,
    Eq,
    Hash,
    PartialEq,
    Serialize,
    TryFromRepr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum Type {
    #[display("SITE_ISSUE")]
    SiteIssue = 1,
    #[display("PRODUCT_FEEDBACK")]
    ProductFeedback = 2,
    #[display("INVESTOR")]
    Investor = 3,
    #[display("BRANDING")]
    Branding = 4,
    #[display("REQUEST_REFUND")]
    RequestRefund = 5,
    #[display("OTHER")]
    Other = 6,
}

int2_enum!(Type, "invalid ticket type");

#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Display,
    Eq,
    Hash,
    PartialEq,
    Serialize,
    TryFromRepr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum Priority {
    #[display("LOW")]
    Low = 1,
    #[display("MEDIUM")]
    Medium = 2,
    #[display("HIGH")]
    High = 3,
    #[display("URGENT")]
    Urgent = 4,
}

impl Priority {
    pub const ALL: [Self; 4] =
        [Self::Low, Self::Medium, Self::High, Self::Urgent];
}

int2_enum!(Priority, "invalid priority");

#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Display,
    Eq,
    Hash,
    PartialEq,
    Serialize,
    TryFromRepr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum Status {
    /// Initial state of every ticket.
    #[display("OPEN")]
    Open = 1,

    #[display("IN_PROGRESS")]
    InProgress = 2,

    /// Waiting on the customer or a third party.
    #[display("PENDING")]
    Pending = 3,

    #[display("RESOLVED")]
    Resolved = 4,

    #[display("CLOSED")]
    Closed = 5,

    #[display("REOPENED")]
    Reopened = 6,
}

impl Status {
    pub const ALL: [Self; 6] = [
        Self::Open,
        Self::InProgress,
        Self::Pending,
        Self::Resolved,
        Self::Closed,
        Self::Reopened,
    ];
}

int2_enum!(Status, "invalid status");

/// Human-readable ticket identifier, e.g. `#IN-000005`.
#[derive(Clone, Debug, Display, Eq, Hash, PartialEq)]
#[display("#{prefix}-{sequence:06}")]
pub struct Number {
    prefix: String,
    sequence: i64,
}

impl Number {
    pub fn new(prefix: impl Into<String>, sequence: i64) -> Self {
        Self {
            prefix: prefix.into(),
            sequence,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn sequence(&self) -> i64 {
        self.sequence
    }
}

#[derive(Clone, Debug, Display, Eq, PartialEq)]
#[display("malformed ticket number `{_0}`")]
pub struct ParseNumberError(String);

impl StdError for ParseNumberError {}

impl FromStr for Number {
    type Err = ParseNumberError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseNumberError(s.to_owned());
        let (prefix, digits) = s
            .strip_prefix('#')
            .and_then(|rest| rest.split_once('-'))
            .ok_or_else(err)?;
        if prefix.len() != 2
            || !prefix.chars().all(|c| c.is_ascii_uppercase())
            || digits.len() < 6
            || !digits.chars().all(|c| c.is_ascii_digit())
        {
            return Err(err());
        }
        let sequence = digits.parse().map_err(|_| err())?;
        Ok(Self::new(prefix, sequence))
    }
}

impl Serialize for Number {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Number {
    fn deserialize<D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Self, D::Error> {
        String::deserialize(deserializer)?
            .parse()
            .map_err(de::Error::custom)
    }
}

impl FromSql<'_> for Number {
    accepts!(TEXT);

    fn from_sql(
        ty: &SqlType,
        raw: &[u8],
    ) -> Result<Self, Box<dyn StdError + Sync + Send>> {
        Ok(String::from_sql(ty, raw)?.parse()?)
    }
}

impl ToSql for Number {
    accepts!(TEXT);

    to_sql_checked!();

    fn to_sql(
        &self,
        ty: &SqlType,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn StdError + Sync + Send>> {
        self.to_string().to_sql(ty, out)
    }
}

const COLUMNS: &str = "\
    id, ticket_number, customer, assignee, subject, message, \
    ticket_type, priority, status, source, \
    first_response_due, resolution_due, followers, \
    deleted_at, created_at, updated_at";

impl Filter {
    fn where_clause<'a>(&'a self, clauses: &mut Clauses<'a>) {
        clauses.raw("deleted_at IS NULL");
        if let Some(number) = &self.ticket_number {
            clauses.eq("ticket_number", number);
        }
        if let Some(status) = &self.status {
            clauses.eq("status", status);
        }
        if let Some(priority) = &self.priority {
            clauses.eq("priority", priority);
        }
        if let Some(ticket_type) = &self.ticket_type {
            clauses.eq("ticket_type", ticket_type);
        }
        if let Some(assignee) = &self.assignee {
            let param = clauses.bind(assignee);
            clauses.raw(&format!("(assignee->>'id')::uuid = {param}"));
        }
        if let Some(customer) = &self.customer {
            let param = clauses.bind(customer);
            clauses.raw(&format!("(customer->>'id')::uuid = {param}"));
        }
    }
}

#[async_trait]
impl Store for Client {
    async fn create_ticket(&self, new: New) -> Result<Ticket, Error> {
        let sql = format!(
            "INSERT INTO tickets (id, ticket_number, customer, assignee, \
                                  subject, message, ticket_type, priority, \
                                  status, source, first_response_due, \
                                  resolution_due, followers) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
             RETURNING {COLUMNS}"
        );
        let row = self
            .0
            .query_one(
                &sql,
                &[
                    &Id::new(),
                    &new.ticket_number,
                    &Json(&new.customer),
                    &new.assignee.as_ref().map(Json),
                    &new.subject,
                    &new.message,
                    &new.ticket_type,
                    &new.priority,
                    &new.status,
                    &new.source,
                    &new.first_response_due,
                    &new.resolution_due,
                    &new.followers,
                ],
            )
            .await?;
        Ok(Ticket::from_row(&row))
    }

    async fn ticket_by_id(&self, id: Id) -> Result<Option<Ticket>, Error> {
        let sql = format!(
            "SELECT {COLUMNS} FROM tickets \
             WHERE id = $1 AND deleted_at IS NULL"
        );
        Ok(self
            .0
            .query_opt(&sql, &[&id])
            .await?
            .map(|row| Ticket::from_row(&row)))
    }

    async fn find_ticket(
        &self,
        filter: &Filter,
    ) -> Result<Option<Ticket>, Error> {
        let mut clauses = Clauses::new();
        filter.where_clause(&mut clauses);
        let sql = format!(
            "SELECT {COLUMNS} FROM tickets WHERE {} LIMIT 1",
            clauses.join(" AND "),
        );
        Ok(self
            .0
            .query_opt(&sql, &clauses.params)
            .await?
            .map(|row| Ticket::from_row(&row)))
    }

    async fn find_tickets(
        &self,
        filter: &Filter,
        page: Page,
        sort: Sort,
    ) -> Result<Paginated<Ticket>, Error> {
        let offset = to_i64(page.offset());
        let limit = to_i64(page.limit);

        let mut clauses = Clauses::new();
        filter.where_clause(&mut clauses);
        let condition = clauses.join(" AND ");
        let count_params = clauses.params.clone();

        let offset_param = clauses.bind(&offset);
        let limit_param = clauses.bind(&limit);
        let page_sql = format!(
            "SELECT {COLUMNS} FROM tickets \
             WHERE {condition} \
             ORDER BY {column} {direction}, id {direction} \
             OFFSET {offset_param} LIMIT {limit_param}",
            column = sort.field.column(),
            direction = sort.direction,
        );
        let count_sql =
            format!("SELECT COUNT(*) FROM tickets WHERE {condition}");

        let (rows, count) = tokio::try_join!(
            self.0.query(&page_sql, &clauses.params),
            self.0.query_one(&count_sql, &count_params),
        )?;
        let total_count = usize::try_from(count.get::<_, i64>(0))
            .map_err(|e| Error::Corrupted(e.to_string()))?;

        Ok(Paginated::new(
            rows.iter().map(Ticket::from_row).collect(),
            total_count,
            page,
        ))
    }

    async fn update_ticket(
        &self,
        id: Id,
        patch: &Patch,
    ) -> Result<Option<Ticket>, Error> {
        let assignee = patch.assignee.as_ref().map(Json);

        let mut sets = Clauses::new();
        let id_param = sets.bind(&id);
        sets.raw("updated_at = now()");
        if let Some(subject) = &patch.subject {
            sets.eq("subject", subject);
        }
        if let Some(message) = &patch.message {
            sets.eq("message", message);
        }
        if let Some(ticket_type) = &patch.ticket_type {
            sets.eq("ticket_type", ticket_type);
        }
        if let Some(status) = &patch.status {
            sets.eq("status", status);
        }
        if let Some(priority) = &patch.priority {
            sets.eq("priority", priority);
        }
        if let Some(assignee) = &assignee {
            sets.eq("assignee", assignee);
        }
        if let Some(followers) = &patch.followers {
            sets.eq("followers", followers);
        }

        let sql = format!(
            "UPDATE tickets SET {} \
             WHERE id = {id_param} AND deleted_at IS NULL \
             RETURNING {COLUMNS}",
            sets.join(", "),
        );
        Ok(self
            .0
            .query_opt(&sql, &sets.params)
            .await?
            .map(|row| Ticket::from_row(&row)))
    }

    async fn soft_delete_ticket(&self, id: Id) -> Result<bool, Error> {
        const SQL: &str = "\
            UPDATE tickets SET deleted_at = now() \
            WHERE id = $1 AND deleted_at IS NULL";
        Ok(self.0.execute(SQL, &[&id]).await? > 0)
    }

    async fn delete_ticket_permanently(&self, id: Id) -> Result<bool, Error> {
        const SQL: &str = "DELETE FROM tickets WHERE id = $1";
        Ok(self.0.execute(SQL, &[&id]).await? > 0)
    }
}
