use crate::error::MergeResult;
use crate::traits::MergeStrategy;

/// The restored state replaces the default outright.
///
/// Works for any cloneable state, so it is the usual choice for statically
/// typed stores whose shape cannot be partially combined.
#[derive(Clone, Copy, Debug, Default)]
pub struct ReplaceMerge;

impl<T: Clone> MergeStrategy<T> for ReplaceMerge {
    fn merge(&self, _initial: &T, restored: &T) -> MergeResult<T> {
        Ok(restored.clone())
    }
}
