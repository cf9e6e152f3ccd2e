//! Core engine: the poll → decide → execute loop.

pub mod cycle;
pub mod executor;
