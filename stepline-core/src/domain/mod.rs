//! Core domain types
//!
//! This module contains the domain structures shared across Stepline crates.
//! Pipeline definitions and components are persisted as JSON documents in the
//! pipeline's storage container; session types only exist while a component runs.

pub mod component;
pub mod pipeline;
pub mod session;
