//! NekoRest: a sitting tracker that keeps a virtual cat healthy when you
//! take breaks.
//!
//! The browser extension renders the pet; this crate owns the state machine
//! behind it and serves it over WebSocket or native messaging.

pub mod broadcast;
pub mod command;
pub mod config;
pub mod daemon;
pub mod error;
pub mod i18n;
pub mod native_messaging;
pub mod notify;
pub mod pet;
pub mod probe;
pub mod store;
pub mod tracker;
pub mod ws;
