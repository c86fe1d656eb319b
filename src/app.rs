pub mod context;
pub mod notify;
pub mod querier;
pub mod supervisor;
pub mod tracker;
