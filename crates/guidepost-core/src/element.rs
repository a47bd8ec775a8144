#![forbid(unsafe_code)]

//! Element identity.

use std::fmt;

/// Opaque identity of a live host element.
///
/// Handles are issued by the [`HostSurface`](crate::surface::HostSurface) and
/// stay stable for the lifetime of the element, independent of the locator
/// that was used to find it. Two locators that resolve to the same element
/// yield equal handles; a re-created element gets a fresh handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementHandle(pub u64);

impl ElementHandle {
    /// Raw identity value.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "el#{}", self.0)
    }
}
