//! Terminal rendering for the `folio` binary.

pub mod search;
pub mod setup;
pub mod summary;
pub mod ui;
pub mod watch;
