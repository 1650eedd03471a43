//! File registration consumed by the service.
//!
//! Every registration is independent: one failing upload never affects
//! the others or the ticket it belongs to.

use std::error::Error as StdError;

use async_trait::async_trait;
use derive_more::Display;

use crate::{
    context::Caller,
    db::{
        file::{File, New},
        ticket,
    },
};

#[async_trait]
pub trait FileRegistry: Send + Sync {
    async fn register_file(
        &self,
        caller: &Caller,
        new: New,
    ) -> Result<File, Error>;

    /// Live files of a ticket, newest first.
    async fn files_for_ticket(
        &self,
        caller: &Caller,
        ticket: ticket::Id,
        limit: usize,
    ) -> Result<Vec<File>, Error>;

    async fn count_for_ticket(
        &self,
        caller: &Caller,
        ticket: ticket::Id,
    ) -> Result<usize, Error>;
}

#[derive(Clone, Debug, Display, Eq, PartialEq)]
pub enum Error {
    #[display("file `{_0}` rejected")]
    Rejected(String),

    #[display("file service unavailable: {_0}")]
    Unavailable(String),
}

impl StdError for Error {}
