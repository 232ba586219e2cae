pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod identity;
pub mod logging;
pub mod models;
pub mod server;
pub mod store;

pub use db::Database;
pub use error::{Error, ErrorKind, Result};
pub use identity::{ContactSummary, Reconciler};
pub use store::ContactStore;
