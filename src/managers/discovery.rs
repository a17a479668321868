use crate::constants::limits::MAX_SIMILAR_LIMIT;
use crate::errors::ToolError;
use crate::services::lastfm::LastFmClient;
use crate::services::logger::Logger;
use crate::services::normalizer::normalize;
use crate::services::tool_registry::{ToolHandler, ToolSpec};
use crate::services::validation::{ParamSpec, ToolArgs};
use serde_json::{json, Value};

/// Similarity lookups backed by Last.fm.
#[derive(Clone)]
pub struct DiscoveryManager {
    logger: Logger,
    lastfm: LastFmClient,
}

impl DiscoveryManager {
    pub fn new(logger: Logger, lastfm: LastFmClient) -> Self {
        Self {
            logger: logger.child("discovery"),
            lastfm,
        }
    }

    pub fn specs() -> Vec<ToolSpec> {
        vec![
            ToolSpec::new(
                "get_similar_tracks",
                "Tracks similar to a given song, from Last.fm. Resolve results with search_spotify before playing them.",
                vec![
                    ParamSpec::string("artist_name").required().describe("Artist of the song."),
                    ParamSpec::string("track_name").required().describe("Title of the song."),
                    ParamSpec::integer("limit")
                        .default_value(5)
                        .range(1, MAX_SIMILAR_LIMIT)
                        .describe("Maximum number of similar tracks."),
                ],
            ),
            ToolSpec::new(
                "get_similar_artists",
                "Artists similar to a given artist, from Last.fm.",
                vec![
                    ParamSpec::string("artist_name").required().describe("Artist name."),
                    ParamSpec::integer("limit")
                        .default_value(5)
                        .range(1, MAX_SIMILAR_LIMIT)
                        .describe("Maximum number of similar artists."),
                ],
            ),
        ]
    }

    pub async fn handle_tool(&self, tool: &str, args: &ToolArgs) -> Result<Value, ToolError> {
        let limit = args.int("limit").unwrap_or(5).to_string();
        let raw = match tool {
            "get_similar_tracks" => {
                self.lastfm
                    .call(
                        "track.getSimilar",
                        &[
                            ("artist", args.require_str("artist_name")?.to_string()),
                            ("track", args.require_str("track_name")?.to_string()),
                            ("limit", limit),
                        ],
                    )
                    .await?
            }
            "get_similar_artists" => {
                self.lastfm
                    .call(
                        "artist.getSimilar",
                        &[
                            ("artist", args.require_str("artist_name")?.to_string()),
                            ("limit", limit),
                        ],
                    )
                    .await?
            }
            other => return Err(ToolError::unknown_tool(other)),
        };
        Ok(normalize(tool, &raw, &args.to_value()))
    }
}

#[async_trait::async_trait]
impl ToolHandler for DiscoveryManager {
    async fn handle(&self, tool: &str, args: &ToolArgs) -> Result<Value, ToolError> {
        self.logger.debug("handle_tool", Some(&json!({ "tool": tool })));
        self.handle_tool(tool, args).await
    }
}
