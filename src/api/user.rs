pub use crate::db::user::{Id, Snapshot, User};
