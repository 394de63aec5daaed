//! Data Transfer Objects for the external collaborators
//!
//! This module contains the request and response shapes exchanged with the
//! content store (storage folders) and the compute provider (sessions).
//! Domain code works with the unwrapped types; the envelope types mirror the
//! provider's JSON exactly.

pub mod component;
pub mod folder;
pub mod session;
