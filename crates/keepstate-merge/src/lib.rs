//! Merge strategies for keepstate.
//!
//! On restore, the caller's freshly constructed default state is combined
//! with whatever was read back from storage. A [`MergeStrategy`] decides how.
//! Strategies borrow both inputs and return a new value; neither input is
//! ever modified.
//!
//! # Key Types
//!
//! - [`ShallowMerge`]: top-level keys from the restored state win (the default)
//! - [`DeepMerge`]: recursive structural merge with special-type rules
//! - [`ReplaceMerge`]: the restored state replaces the default outright
//! - [`ValueDiff`] / [`diff_values`]: top-level summary of what a merge changed

pub mod deep;
pub mod diff;
pub mod error;
pub mod replace;
pub mod shallow;
pub mod traits;

pub use deep::{deep_merge, DeepMerge};
pub use diff::{diff_values, ValueChange, ValueDiff};
pub use error::{MergeError, MergeResult};
pub use replace::ReplaceMerge;
pub use shallow::ShallowMerge;
pub use traits::MergeStrategy;
