//! MU Watcher — debounced filesystem change stream and update worker
//!
//! The watcher turns raw filesystem notifications into a typed channel
//! of [`mu_core::FileChange`] values; the worker is the single writer
//! that applies them to the graph store and broadcasts graph events.

pub mod watcher;
pub mod worker;

#[cfg(test)]
pub mod tests;

pub use watcher::{WatcherConfig, spawn_watcher};
pub use worker::{UpdateWorker, WorkerHealth};
