pub mod activity;
pub mod counter;
pub mod file;
pub mod memory;
pub mod note;
pub mod task;
pub mod ticket;
pub mod user;

use std::{error::Error as StdError, fmt};

use derive_more::{Display, From};
use serde::{Deserialize, Serialize};
use tokio_postgres::{tls::NoTlsStream, NoTls, Socket};

use crate::config;

pub use self::{
    activity::Activity, file::File, memory::Memory, note::Note, task::Task,
    ticket::Ticket, user::User,
};

pub type Connection = tokio_postgres::Connection<Socket, NoTlsStream>;

pub async fn connect(
    config: &config::Db,
) -> Result<(Client, Connection), Error> {
    tokio_postgres::connect(&config.url, NoTls)
        .await
        .map(|(client, connection)| (Client(client), connection))
        .map_err(Error::from)
}

/// PostgreSQL-backed implementation of every store contract.
pub struct Client(tokio_postgres::Client);

impl Client {
    /// Creates missing tables. Safe to run on every startup.
    pub async fn init_schema(&self) -> Result<(), Error> {
        const SQL: &str = include_str!("schema.sql");
        self.0.batch_execute(SQL).await.map_err(Error::from)
    }
}

#[derive(Debug, Display, From)]
pub enum Error {
    #[display("postgres: {_0}")]
    #[from]
    Postgres(tokio_postgres::Error),

    #[display("corrupted row: {_0}")]
    Corrupted(String),

    #[display("store unavailable: {_0}")]
    Unavailable(String),
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Postgres(e) => Some(e),
            Self::Corrupted(_) | Self::Unavailable(_) => None,
        }
    }
}

/// 1-based page request.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Page {
    pub page: usize,
    pub limit: usize,
}

impl Page {
    pub fn offset(&self) -> usize {
        self.page.saturating_sub(1) * self.limit
    }
}

impl Default for Page {
    fn default() -> Self {
        Self { page: 1, limit: 10 }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub page: usize,
    pub limit: usize,
    pub total_pages: usize,
    pub has_next_page: bool,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub total_count: usize,
    pub page_info: PageInfo,
}

impl<T> Paginated<T> {
    pub fn new(items: Vec<T>, total_count: usize, page: Page) -> Self {
        let total_pages = if page.limit == 0 {
            0
        } else {
            total_count.div_ceil(page.limit)
        };
        Self {
            items,
            total_count,
            page_info: PageInfo {
                page: page.page,
                limit: page.limit,
                total_pages,
                has_next_page: page.page < total_pages,
            },
        }
    }
}

/// The newest `cap` entries of a collection, plus whether older ones exist.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Capped<T> {
    pub items: Vec<T>,
    pub has_more: bool,
}

impl<T> Capped<T> {
    /// Expects up to `cap + 1` items so the extra one can signal `has_more`.
    pub fn from_overfetch(mut items: Vec<T>, cap: usize) -> Self {
        let has_more = items.len() > cap;
        items.truncate(cap);
        Self { items, has_more }
    }
}

impl<T> Default for Capped<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            has_more: false,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Asc,
    #[default]
    Desc,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        })
    }
}

pub(crate) fn to_i64(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Declares a UUID-backed identifier stored as a postgres `UUID`.
macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Clone,
            Copy,
            Debug,
            Default,
            ::serde::Deserialize,
            ::derive_more::Display,
            Eq,
            Hash,
            Ord,
            PartialEq,
            PartialOrd,
            ::serde::Serialize,
        )]
        pub struct $name(::uuid::Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(::uuid::Uuid::new_v4())
            }
        }

        impl From<u128> for $name {
            fn from(value: u128) -> Self {
                Self(::uuid::Uuid::from_u128(value))
            }
        }

        impl ::std::str::FromStr for $name {
            type Err = ::uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.parse::<::uuid::Uuid>().map(Self)
            }
        }

        impl ::tokio_postgres::types::FromSql<'_> for $name {
            ::tokio_postgres::types::accepts!(UUID);

            fn from_sql(
                ty: &::tokio_postgres::types::Type,
                raw: &[u8],
            ) -> Result<
                Self,
                Box<dyn ::std::error::Error + Sync + Send>,
            > {
                <::uuid::Uuid as ::tokio_postgres::types::FromSql>::from_sql(
                    ty, raw,
                )
                .map(Self)
            }
        }

        impl ::tokio_postgres::types::ToSql for $name {
            ::tokio_postgres::types::accepts!(UUID);

            ::tokio_postgres::types::to_sql_checked!();

            fn to_sql(
                &self,
                ty: &::tokio_postgres::types::Type,
                out: &mut ::tokio_postgres::types::private::BytesMut,
            ) -> Result<
                ::tokio_postgres::types::IsNull,
                Box<dyn ::std::error::Error + Sync + Send>,
            > {
                <::uuid::Uuid as ::tokio_postgres::types::ToSql>::to_sql(
                    &self.0, ty, out,
                )
            }
        }
    };
}

/// Stores a `#[repr(u8)]` enum deriving `TryFromRepr` as `INT2`.
macro_rules! int2_enum {
    ($name:ident, $what:literal) => {
        impl ::tokio_postgres::types::FromSql<'_> for $name {
            ::tokio_postgres::types::accepts!(INT2);

            fn from_sql(
                ty: &::tokio_postgres::types::Type,
                raw: &[u8],
            ) -> Result<
                Self,
                Box<dyn ::std::error::Error + Sync + Send>,
            > {
                let repr =
                    <i16 as ::tokio_postgres::types::FromSql>::from_sql(
                        ty, raw,
                    )?;
                let repr = u8::try_from(repr)?;
                let value = Self::try_from(repr).map_err(|_| $what)?;
                Ok(value)
            }
        }

        impl ::tokio_postgres::types::ToSql for $name {
            ::tokio_postgres::types::accepts!(INT2);

            ::tokio_postgres::types::to_sql_checked!();

            fn to_sql(
                &self,
                ty: &::tokio_postgres::types::Type,
                out: &mut ::tokio_postgres::types::private::BytesMut,
            ) -> Result<
                ::tokio_postgres::types::IsNull,
                Box<dyn ::std::error::Error + Sync + Send>,
            > {
                let repr = i16::from((*self) as u8);
                <i16 as ::tokio_postgres::types::ToSql>::to_sql(
                    &repr, ty, out,
                )
            }
        }
    };
}

pub(crate) use {int2_enum, uuid_id};

/// Numbered SQL fragments (`column = $n`) with their bound values.
pub(crate) struct Clauses<'a> {
    pub fragments: Vec<String>,
    pub params: Vec<&'a (dyn tokio_postgres::types::ToSql + Sync)>,
}

impl<'a> Clauses<'a> {
    pub fn new() -> Self {
        Self {
            fragments: Vec::new(),
            params: Vec::new(),
        }
    }

    pub fn raw(&mut self, fragment: &str) {
        self.fragments.push(fragment.to_owned());
    }

    pub fn eq(
        &mut self,
        column: &str,
        value: &'a (dyn tokio_postgres::types::ToSql + Sync),
    ) {
        self.params.push(value);
        self.fragments
            .push(format!("{column} = ${}", self.params.len()));
    }

    /// Binds a value without emitting a fragment, returning its placeholder.
    pub fn bind(
        &mut self,
        value: &'a (dyn tokio_postgres::types::ToSql + Sync),
    ) -> String {
        self.params.push(value);
        format!("${}", self.params.len())
    }

    pub fn join(&self, separator: &str) -> String {
        self.fragments.join(separator)
    }
}
