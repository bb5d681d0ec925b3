//! Application layer containing the collection flow orchestration.
//!
//! This module defines the `CollectionOrchestrator`, the primary entry point
//! for driving a payment account through selection, charge dispatch and
//! reconciliation against the storage and gateway ports.

pub mod orchestrator;
