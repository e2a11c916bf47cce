//! The core of docmirror: the forum client and the per-topic cache in front of it.
//!
//! The web frontend in the `docmirror` crate only talks to [`services::DocsService`], which owns
//! one [`forum::ForumClient`] and one [`caching::TopicCache`] for the whole lifetime of the process.

#[macro_use]
pub mod metrics;

pub mod caching;
pub mod config;
pub mod forum;
pub mod services;
pub mod types;
pub mod utils;
