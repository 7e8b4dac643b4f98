//! Tourney: the document server, its HTTP client store and the
//! connectivity probe that drive the `tourney-core` sync layer.

pub mod config;
pub mod probe;
pub mod remote;
pub mod server;
