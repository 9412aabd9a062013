//! Configuration constants
//!
//! - [`defaults`] - Default values for build options and on-disk layout

pub mod defaults;
