//! Foundation module - Core utilities and types
//!
//! This module provides fundamental utilities used throughout the engine:
//! - Math types (vectors, rectangles, colors, bounding boxes)
//! - Handle collections and id allocation
//! - Logging utilities

pub mod math;
pub mod collections;
pub mod logging;
