//! # filecast testkit
//!
//! Testing utilities for filecast.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: Whole in-process groups over in-memory or on-disk stores
//! - **Generators**: Proptest strategies for file contents, chunk sizes and
//!   size expressions
//!
//! ## Test Fixtures
//!
//! Quickly set up a group where one member has the file:
//!
//! ```rust,no_run
//! use filecast::core::ElectionStrategy;
//! use filecast_testkit::fixtures::MemoryGroupFixture;
//!
//! async fn example() {
//!     let fixture = MemoryGroupFixture::new(3).with_file(0, b"payload");
//!     let outcomes = fixture.run(fixture.config(ElectionStrategy::ByAuto)).await;
//!     assert!(outcomes.iter().all(|o| o.is_success()));
//!     assert_eq!(fixture.contents(2).unwrap(), b"payload");
//! }
//! ```
//!
//! ## Property Testing
//!
//! Use the generators with proptest:
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use filecast_testkit::generators::{chunk_size, file_contents};
//!
//! proptest! {
//!     #[test]
//!     fn plan_covers_file(contents in file_contents(1024), chunk in chunk_size(128)) {
//!         // ...
//!     }
//! }
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{
    agreed_root, random_contents, run_group, DiskGroupFixture, MemoryGroupFixture, MEMORY_FILE,
};
pub use generators::{chunk_size, file_contents, group_size, size_expression};
