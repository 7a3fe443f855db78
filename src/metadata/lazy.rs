//! Deferred metadata values.

use std::fmt;

use crate::errors::{FormatError, MetaDataError};

use super::MetaValue;

/// A deferred, memoized metadata computation.
///
/// A `LazyMetaValue` stands in for a concrete value until the key is first
/// read through a [`MetaData`](super::MetaData) instance. The result is then
/// stored in that instance in place of the wrapper, so the computation runs
/// at most once per instance. Copies of a `MetaData` share the *unevaluated*
/// wrapper by reference; each copy evaluates independently on its own first
/// read and does not see the memoized result of its siblings.
pub struct LazyMetaValue {
    func: Box<dyn Fn() -> Result<MetaValue, FormatError>>,
}

impl LazyMetaValue {
    /// Wrap a deferred computation.
    pub fn new<F>(func: F) -> Self
    where
        F: Fn() -> Result<MetaValue, FormatError> + 'static,
    {
        LazyMetaValue {
            func: Box::new(func),
        }
    }

    /// Run the wrapped computation.
    pub(crate) fn compute(&self) -> Result<MetaValue, MetaDataError> {
        (self.func)().map_err(|e| MetaDataError::LazyFailed(e.to_string()))
    }
}

impl fmt::Debug for LazyMetaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyMetaValue").finish_non_exhaustive()
    }
}
