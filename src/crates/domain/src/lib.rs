pub mod album;
pub mod artist;
pub mod error;
pub mod link;
pub mod play_event;
pub mod track;
pub mod value;
