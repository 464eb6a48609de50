//! The decoratee wrapper: a decoration result that remembers the original
//! definition.

use crate::arena::{DecorateeData, ValueData, ValueId};
use crate::state::InferenceState;

impl InferenceState {
    /// Wrap a decorator application result so goto and signature queries
    /// can still reach the original def.
    pub(crate) fn decoratee(&mut self, inner: ValueId, original: ValueId) -> ValueId {
        if inner == original {
            return original;
        }
        self.alloc_value(ValueData::Decoratee(DecorateeData { inner, original }))
    }
}
