//! docmirror.
//!
//! docmirror serves the documentation topics of a Discourse forum as a plain website. Topics are
//! fetched from the forum's JSON API on demand and kept in a per-topic cache, which keeps serving
//! the last good copy of a topic while the forum is unavailable.

#![warn(
    missing_docs,
    missing_debug_implementations,
    unused_crate_dependencies,
    clippy::all
)]

mod cli;
mod endpoints;
mod healthcheck;
mod logging;
mod render;
mod server;

fn main() {
    match cli::execute() {
        Ok(()) => std::process::exit(0),
        Err(error) => {
            logging::ensure_log_error(&error);
            std::process::exit(1);
        }
    }
}
