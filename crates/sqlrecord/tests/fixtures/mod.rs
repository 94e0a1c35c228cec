//! Test fixtures for sqlrecord integration tests.
#![allow(dead_code)]

pub mod mock_connection;
pub mod models;

pub use mock_connection::*;
pub use models::*;
