pub mod delimited;
pub mod ids;
pub mod redact;
pub mod suggest;
pub mod text;
