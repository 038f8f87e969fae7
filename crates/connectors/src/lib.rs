//! Concrete primary execution channels.
pub mod sources;
