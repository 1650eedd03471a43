pub mod activity;
pub mod api;
pub mod catalog;
pub mod config;
pub mod context;
pub mod db;
pub mod diff;
pub mod directory;
pub mod files;
pub mod sequence;
pub mod service;
pub mod sla;
pub mod transition;

pub use self::{
    catalog::Catalog,
    config::Config,
    context::Caller,
    service::{Error, Service},
};
