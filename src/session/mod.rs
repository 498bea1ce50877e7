//! SQLite-backed session persistence for pipeline runs.

pub mod store;

pub use store::{CreateOutcome, Session, SessionStore};
