//! Per-record download procedure.
//!
//! Split into focused submodules:
//! - [`context`] - Directory preparation for first attempts and retries
//! - [`orchestration`] - The ordered steps for one record
//! - [`finalization`] - Archive verification that decides the outcome

mod context;
mod finalization;
mod orchestration;


pub(crate) use context::Attempt;
