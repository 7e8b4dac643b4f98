//! Client side of the document server: the HTTP store and its outbox.

pub mod http;
pub mod outbox;

pub use http::{HttpDocumentStore, HttpStoreError};
pub use outbox::{Outbox, OutboxEntry, OutboxError, OutboxOp};
