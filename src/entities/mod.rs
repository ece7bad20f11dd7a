//! Record model plus the query and aggregation workflows run against a snapshot.

pub mod record;
pub mod search;
pub mod stats;
