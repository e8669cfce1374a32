pub mod command;
pub mod context;
pub mod error;
pub mod identity_map;
pub mod poll;
pub mod retry;
pub mod shared;
