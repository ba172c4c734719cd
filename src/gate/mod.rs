//! Gate decision and actuation.

pub mod actuator;
pub mod control;
pub mod validator;
