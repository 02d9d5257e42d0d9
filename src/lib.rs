#![forbid(unsafe_code)]

//! fetchtube: paste a media link, get a file that lives for a couple of minutes.
//!
//! The library holds everything the `server` binary wires together so the
//! pieces can be exercised in isolation.

pub mod audit;
pub mod config;
pub mod download;
pub mod error;
pub mod extractor;
pub mod page;
pub mod retention;
pub mod sanitize;
pub mod security;
pub mod server;
pub mod validate;
