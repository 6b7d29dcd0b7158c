pub mod common;
pub mod export;
pub mod list;
