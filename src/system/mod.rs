//! System utilities
//!
//! Host hardware probing used to pick engine parameters.

pub mod hardware;
