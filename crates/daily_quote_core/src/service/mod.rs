//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into the selection and admin use cases.
//! - Keep callers decoupled from storage details.

pub mod admin_service;
pub mod error;
pub mod selection;
