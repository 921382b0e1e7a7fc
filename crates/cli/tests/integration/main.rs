//! CLI integration tests for soup.

mod build_tests;
mod common;
mod graph_tests;
mod inspect_tests;
