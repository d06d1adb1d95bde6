//! Unit tests - compile requests against the fixture schema
//!
//! Nothing here talks to a store: every test inspects the compiled
//! statement, its parameters or the shaped result of hand-written records.

mod common;
mod filter_tests;
mod pagination_tests;
mod polymorphism_tests;
mod sort_tests;
