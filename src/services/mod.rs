pub mod claim;
pub mod merge_handler;
