//! Common test utilities and helpers
//!
//! This module provides shared test infrastructure including:
//! - Migration directory fixtures
//! - A recording migration runner
//! - Test database setup


pub use fixtures::*;
pub use mocks::*;
pub use test_db::*;
