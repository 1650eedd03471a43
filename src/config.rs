use std::{net, time};

use serde::Deserialize;

#[derive(Deserialize)]
pub struct Config {
    pub db: Db,
    pub http: Http,
    pub jwt: Jwt,
    #[serde(default)]
    pub log: Log,
    #[serde(default)]
    pub tickets: Tickets,
}

#[derive(Deserialize)]
pub struct Db {
    pub url: String,
}

#[derive(Deserialize)]
pub struct Http {
    pub server: Server,
    pub cors: Cors,
}

#[derive(Deserialize)]
pub struct Server {
    pub addr: net::SocketAddr,
}

#[derive(Deserialize)]
pub struct Cors {
    pub allowed_origins: Vec<String>,
}

/// Bearer tokens are only decoded here, never issued.
#[derive(Deserialize)]
pub struct Jwt {
    pub secret: String,
}

#[derive(Deserialize)]
pub struct Log {
    #[serde(default = "Log::default_level")]
    pub level: String,
}

impl Log {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for Log {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

#[derive(Deserialize)]
pub struct Tickets {
    /// How many activities/notes/tasks/files a ticket view embeds.
    #[serde(default = "Tickets::default_display_cap")]
    pub display_cap: usize,
    #[serde(
        default = "Tickets::default_allocation_timeout",
        with = "humantime_serde"
    )]
    pub allocation_timeout: time::Duration,
}

impl Tickets {
    fn default_display_cap() -> usize {
        3
    }

    fn default_allocation_timeout() -> time::Duration {
        time::Duration::from_secs(5)
    }
}

impl Default for Tickets {
    fn default() -> Self {
        Self {
            display_cap: Self::default_display_cap(),
            allocation_timeout: Self::default_allocation_timeout(),
        }
    }
}
