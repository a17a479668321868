pub mod network {
    pub const SPOTIFY_API_URL: &str = "https://api.spotify.com/v1";
    pub const SPOTIFY_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
    pub const LASTFM_API_URL: &str = "http://ws.audioscrobbler.com/2.0/";
    pub const DEFAULT_BIND: &str = "0.0.0.0:8080";
    pub const TIMEOUT_UPSTREAM_REQUEST_MS: u64 = 15_000;
    pub const USER_AGENT: &str = "spotify-mcp/0.3";
}

pub mod credentials {
    pub const EXPIRY_MARGIN_MS: u64 = 30_000;
    pub const MAX_TOKEN_LIFETIME_SECS: u64 = 86_400;
}

pub mod limits {
    pub const MAX_ERROR_BODY_BYTES: usize = 4 * 1024;
    pub const MAX_PLAYLIST_ADD_URIS: usize = 100;
    pub const MAX_PAGE_LIMIT: i64 = 50;
    pub const MAX_PLAYLIST_ITEMS_LIMIT: i64 = 100;
    pub const MAX_PLAYLIST_OFFSET: i64 = 100_000;
    pub const MAX_SIMILAR_LIMIT: i64 = 100;
}

pub mod protocol {
    pub const PROTOCOL_VERSION: &str = "2025-06-18";
    pub const SERVER_NAME: &str = "spotify-mcp";
    pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");
}
