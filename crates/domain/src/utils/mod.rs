//! Serialization helpers shared by the domain types

pub mod serde;
