pub mod cache;
pub mod recommendation;
pub mod serving;
pub mod store;
