pub mod list;
pub mod query;
pub mod serve;
pub mod snapshot;
pub mod validate;
