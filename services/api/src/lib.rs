//! tutorhub API service library.
//!
//! This crate primarily ships a `tutorhub-api` binary, but we expose a small
//! library surface to enable integration testing.

pub mod api;
pub mod config;
pub mod state;
