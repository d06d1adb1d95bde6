//! Integration tests - the executor against a mocked graph store
//!
//! These tests drive compile, store call and shaping together through the
//! public `Executor` API.

mod executor_tests;
mod shaping_tests;
