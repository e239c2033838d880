//! # deskindex core
//!
//! Shared, I/O-free logic for deskindex: the file and document models,
//! stable identifier derivation, snapshot diffing, content normalization,
//! and the [`store::DocumentStore`] abstraction.
//!
//! This crate contains no tokio, sqlx, HTTP clients, or filesystem walking.
//! The application crate wires these pieces to real storage and the
//! scanner.

pub mod models;
pub mod snapshot;
pub mod store;
pub mod text;
