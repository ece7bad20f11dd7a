//! Internal serde helpers shared by the sources.

pub(crate) mod serde;
