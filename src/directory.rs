//! Identity lookup consumed by the service.
//!
//! Lookups may be slow or unavailable. Whether a failure is fatal is decided
//! by the caller: customers and assignees must resolve, followers may not.

use std::error::Error as StdError;

use async_trait::async_trait;
use derive_more::Display;

use crate::{
    context::Caller,
    db::user::{self, User},
};

#[async_trait]
pub trait Directory: Send + Sync {
    /// Returns the user with `external_id`, creating it on first sight.
    async fn resolve_or_create_user(
        &self,
        caller: &Caller,
        external_id: &str,
    ) -> Result<User, Error>;

    async fn user_by_id(
        &self,
        caller: &Caller,
        id: user::Id,
    ) -> Result<Option<User>, Error>;

    async fn user_by_external_id(
        &self,
        caller: &Caller,
        external_id: &str,
    ) -> Result<Option<User>, Error>;
}

#[derive(Clone, Debug, Display, Eq, PartialEq)]
pub enum Error {
    #[display("user `{_0}` cannot be resolved")]
    NotFound(String),

    #[display("directory unavailable: {_0}")]
    Unavailable(String),
}

impl StdError for Error {}
