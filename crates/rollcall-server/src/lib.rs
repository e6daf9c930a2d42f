//! # rollcall-server
//!
//! HTTP server library for the rollcall attendance system.
//!
//! Exposes the core's session codes, scans and reports over a JSON API with
//! bearer-token authentication and an OpenAPI document.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

pub mod api;
pub mod auth;
pub mod logging;
pub mod state;
