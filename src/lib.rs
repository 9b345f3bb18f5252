//! PocketChat library
//!
//! Core library for the PocketChat on-device chat application.

pub mod app;
pub mod error;
pub mod inference;
pub mod storage;
pub mod system;
pub mod types;
pub mod ui;
