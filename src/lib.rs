//! papershelf: a personal research-paper library
//!
//! PDFs dropped into a watched directory (or queued from the CLI) land in a
//! durable SQLite work queue. A single background worker extracts their
//! text, splits it into overlapping chunks, embeds each chunk through an
//! OpenAI-compatible API and writes the vectors to Qdrant. The library
//! catalog regroups the stored chunks into papers for listing, search and
//! metadata edits.

pub mod chunk;
pub mod commands;
pub mod config;
pub mod embed;
pub mod error;
pub mod extract;
pub mod library;
pub mod queue;
pub mod service;
pub mod store;
pub mod watch;
pub mod worker;
