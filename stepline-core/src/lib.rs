//! Stepline Core
//!
//! Core types and abstractions for the Stepline pipeline engine.
//!
//! This crate contains:
//! - Domain types: Pipeline definitions, components and execution session state
//! - DTOs: Wire representations exchanged with the content store and compute provider
//! - Validation and slug helpers shared by the engine and the CLI

pub mod domain;
pub mod dto;
pub mod slug;
pub mod validation;

pub use validation::ValidationError;
