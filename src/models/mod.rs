//! Core data models for the gateway.
//!
//! Requests, the audit rows they produce, and the rejection message format
//! shared with the consumer process.

pub mod audit;
pub mod notification;
pub mod request;
