//! CLI command implementations

pub(crate) mod common;
pub(crate) mod convert;
pub(crate) mod integrate;
pub(crate) mod rules;
