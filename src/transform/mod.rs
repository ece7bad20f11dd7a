//! Transform adapters from upstream document shapes into the flat record model.

pub(crate) mod record;
