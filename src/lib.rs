//! cmdgate Library
//!
//! This library provides the core functionality for cmdgate, an
//! authenticated HTTP service for bounded remote command execution:
//! denylist validation, supervised subprocess execution, and the HTTP
//! surface around them.
//!
//! # Security Model
//!
//! cmdgate is NOT a sandbox. Commands run as the service user with a
//! pattern-based denylist standing between the caller and the shell; the
//! denylist rejects known-dangerous invocations but is inherently
//! incomplete. Deploy behind network isolation and a dedicated low-privilege
//! user, and treat namespace/capability isolation as the correct general
//! solution this service deliberately does not attempt.

pub mod config;
pub mod exec;
pub mod metrics;
pub mod server;
pub mod tasks;
