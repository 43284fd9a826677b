//! CLI command implementations.

pub mod authenticate;
pub mod encode;
pub mod register;
