/// Identity of whoever issued the current request.
///
/// Built once by the transport layer and passed by reference into every
/// service call, so downstream lookups can forward the caller's token.
#[derive(Clone, Debug, Default)]
pub struct Caller {
    /// Bearer token to forward to the directory and file services.
    pub token: Option<String>,
    /// External party id of the authenticated user, if any.
    pub external_id: Option<String>,
}

impl Caller {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn authenticated(external_id: impl Into<String>) -> Self {
        Self {
            token: None,
            external_id: Some(external_id.into()),
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}
