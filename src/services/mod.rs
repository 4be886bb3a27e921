//! Collaborators and the pipeline that composes them.

pub mod audit_store;
pub mod blob_store;
pub mod notifier;
pub mod pipeline;
pub mod policy;
pub mod rejection_consumer;
pub mod zone;

#[cfg(test)]
pub(crate) mod testing;
