//! Shared utilities for pdfcast integration tests.
//!
//! - `TestHarness` owns a temp directory and a fully wired `ConversionService`
//! - `FakeStages` scripts executor behaviour per stage without any network
//!   or external tools
//! - `builders` produces configurations and small PDFs

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::{FakeStages, Gate, TestHarness};
