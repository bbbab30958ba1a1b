use crate::error::MergeResult;

/// Combines a default state with a restored one.
///
/// Implementations must not modify either input; the effective initial
/// state is always a new value.
pub trait MergeStrategy<T>: Send + Sync {
    fn merge(&self, initial: &T, restored: &T) -> MergeResult<T>;
}

impl<T, F> MergeStrategy<T> for F
where
    F: Fn(&T, &T) -> MergeResult<T> + Send + Sync,
{
    fn merge(&self, initial: &T, restored: &T) -> MergeResult<T> {
        self(initial, restored)
    }
}
