//! Test utilities.
//!
//! This module provides:
//! - Test data factories for local rows and remote payloads
//! - In-memory repository implementations for mocking persistence
//! - A fake payment platform implementing the `StripeApi` port
//! - `TestAppStateBuilder` for HTTP-level tests

mod factories;
mod mocks;
mod stripe_fake;

pub use app_state_builder::*;
pub use factories::*;
pub use mocks::*;
pub use stripe_fake::*;
