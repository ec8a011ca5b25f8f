//! Shared test utilities for the tile streaming workspace.
//!
//! This crate provides common testing infrastructure including:
//! - A scriptable in-memory [`MockConnection`]
//! - Payload generators for bin and term tiles
//! - Request and response fixtures
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```
//!
//! Then import in your tests:
//!
//! ```ignore
//! use test_utils::{MockConnection, fixtures};
//! ```

pub mod fixtures;
pub mod generators;
pub mod mock;

// Re-export commonly used items at the crate root
pub use fixtures::*;
pub use generators::*;
pub use mock::MockConnection;

/// Macro for approximate floating-point equality assertions.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_approx_eq;
///
/// assert_approx_eq!(1.0001_f64, 1.0_f64, 0.001_f64); // passes
/// assert_approx_eq!(1.1_f32, 1.0_f32, 0.001_f32);    // fails
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: f64 = $left as f64;
        let right: f64 = $right as f64;
        let epsilon: f64 = $epsilon as f64;
        let diff = (left - right).abs();
        if diff > epsilon {
            panic!(
                "assertion failed: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`,\n  diff: `{:?}` > epsilon `{:?}`",
                left, right, diff, epsilon
            );
        }
    }};
}

/// Macro for approximate equality of a `{min, max}` range.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_extrema_eq;
///
/// assert_extrema_eq!(tracker.current(), (2.0, 9.0), 1e-9);
/// ```
#[macro_export]
macro_rules! assert_extrema_eq {
    ($extrema:expr, ($min:expr, $max:expr), $epsilon:expr) => {{
        let extrema = $extrema;
        $crate::assert_approx_eq!(extrema.min, $min, $epsilon);
        $crate::assert_approx_eq!(extrema.max, $max, $epsilon);
    }};
}
