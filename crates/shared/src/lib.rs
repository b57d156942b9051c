//! Types shared between the kitchen client core and its front ends.

pub mod domain;
pub mod error;
pub mod protocol;
