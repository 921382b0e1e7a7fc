//! Integration tests for soup-lib.

mod build_tests;
mod common;
mod load_tests;
