//! Integration test suite for boxcache
//!
//! # Running Integration Tests
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **coordinator**: the fetch-once protocol against in-memory fakes
//! - **box_adder**: concurrent adds against a real on-disk catalog
//! - **cli**: the `boxcache` binary end to end

#[path = "../common/mod.rs"]
mod common;

mod box_adder;
mod cli;
mod coordinator;
