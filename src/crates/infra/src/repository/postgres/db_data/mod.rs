pub mod album;
pub mod album_artist;
pub mod album_track;
pub mod artist;
pub mod event;
pub mod track;
pub mod track_artist;
