pub mod discovery;
pub mod library;
pub mod playback;
pub mod playlists;
