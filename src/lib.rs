//! crpt-submit - Rate-Limited Document Submission Client
//!
//! This crate submits signed documents to a remote registration API while
//! capping how many submissions are admitted per time window. Callers over
//! the quota wait until the window is reset by a background timer.

pub mod config;
pub mod document;
pub mod error;
pub mod ratelimit;
pub mod submit;
