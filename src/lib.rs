#![allow(clippy::uninlined_format_args)]

pub mod api;
pub mod app;
pub mod comments;
pub mod config;
pub mod data;
pub mod mutation;
pub mod page;
pub mod posts;
pub mod query;
pub mod users;

#[cfg(test)]
mod testing;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use app::{run, RunOptions};
