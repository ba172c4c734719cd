//! Check-in API wire format.

pub mod models;
