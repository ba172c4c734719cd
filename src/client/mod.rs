//! Check-in API client layer.

pub mod http;
pub mod pager;
pub mod session;

#[cfg(any(test, feature = "test-seams"))]
pub mod testing;
