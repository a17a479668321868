pub mod credential_store;
pub mod executor;
pub mod lastfm;
pub mod logger;
pub mod normalizer;
pub mod token_refresher;
pub mod tool_registry;
pub mod validation;
