//! Shared test utilities for rekon integration tests.
//!
//! This module provides:
//! - Builders for resources and registries
//! - Fake controllers, handlers, validations and reporters that record calls

pub mod builders;
pub mod fakes;

pub use builders::*;
pub use fakes::*;
