//! myblog - A small personal blog on a hosted backend
//!
//! This library provides the core functionality for the blog: the remote data
//! and auth client, per-client session synchronization, page services, the
//! template engine and the HTTP layer.

pub mod api;
pub mod config;
pub mod models;
pub mod remote;
pub mod services;
pub mod session;
pub mod theme;
