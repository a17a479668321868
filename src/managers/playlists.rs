use crate::constants::limits::MAX_PLAYLIST_ADD_URIS;
use crate::errors::ToolError;
use crate::services::executor::{AuthenticatedExecutor, Verb};
use crate::services::logger::Logger;
use crate::services::normalizer::normalize;
use crate::services::tool_registry::{ToolHandler, ToolSpec};
use crate::services::validation::{ParamSpec, ToolArgs};
use crate::utils::delimited::split_delimited;
use crate::utils::ids::resolve_id;
use serde_json::{json, Value};

/// Playlist mutations.
#[derive(Clone)]
pub struct PlaylistManager {
    logger: Logger,
    executor: AuthenticatedExecutor,
}

impl PlaylistManager {
    pub fn new(logger: Logger, executor: AuthenticatedExecutor) -> Self {
        Self {
            logger: logger.child("playlists"),
            executor,
        }
    }

    pub fn specs() -> Vec<ToolSpec> {
        vec![
            ToolSpec::new(
                "create_playlist",
                "Create a playlist for a user. Use the 'id' from current_user_profile as user_id.",
                vec![
                    ParamSpec::string("user_id").required().describe("Owner's Spotify user id."),
                    ParamSpec::string("name").required().describe("Playlist name."),
                    ParamSpec::string("description")
                        .default_value("")
                        .describe("Playlist description."),
                    ParamSpec::boolean("public")
                        .default_value(true)
                        .describe("Whether the playlist is public."),
                ],
            ),
            ToolSpec::new(
                "add_to_playlist",
                "Add tracks or episodes to a playlist. Batch as many uris as possible into one call (at most 100).",
                vec![
                    ParamSpec::string("playlist_id")
                        .required()
                        .describe("Playlist id or spotify:playlist: uri."),
                    ParamSpec::string("track_uri")
                        .required()
                        .describe("Comma-separated list of track or episode uris."),
                ],
            ),
        ]
    }

    pub async fn handle_tool(&self, tool: &str, args: &ToolArgs) -> Result<Value, ToolError> {
        match tool {
            "create_playlist" => {
                let user_id = resolve_id("user_id", args.require_str("user_id")?, "user")?;
                let raw = self
                    .executor
                    .execute(
                        Verb::Post,
                        &format!("/users/{}/playlists", user_id),
                        Some(json!({
                            "name": args.require_str("name")?,
                            "description": args.str("description").unwrap_or(""),
                            "public": args.bool("public").unwrap_or(true),
                        })),
                    )
                    .await?;
                Ok(normalize(tool, &raw, &args.to_value()))
            }
            "add_to_playlist" => {
                let playlist_id =
                    resolve_id("playlist_id", args.require_str("playlist_id")?, "playlist")?;
                let uris = split_delimited("track_uri", args.require_str("track_uri")?)?;
                if uris.len() > MAX_PLAYLIST_ADD_URIS {
                    return Err(ToolError::invalid_parameter(
                        "track_uri",
                        format!(
                            "{} uris given; at most {} can be added per call",
                            uris.len(),
                            MAX_PLAYLIST_ADD_URIS
                        ),
                    )
                    .with_hint("Split the list across several add_to_playlist calls."));
                }
                let raw = self
                    .executor
                    .execute(
                        Verb::Post,
                        &format!("/playlists/{}/tracks", playlist_id),
                        Some(json!({ "uris": uris })),
                    )
                    .await?;
                let mut context = args.to_value();
                if let Value::Object(map) = &mut context {
                    map.insert("uris".to_string(), json!(uris));
                }
                Ok(normalize(tool, &raw, &context))
            }
            other => Err(ToolError::unknown_tool(other)),
        }
    }
}

#[async_trait::async_trait]
impl ToolHandler for PlaylistManager {
    async fn handle(&self, tool: &str, args: &ToolArgs) -> Result<Value, ToolError> {
        self.logger.debug("handle_tool", Some(&json!({ "tool": tool })));
        self.handle_tool(tool, args).await
    }
}
