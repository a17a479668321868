use crate::errors::ToolError;
use crate::services::executor::{AuthenticatedExecutor, Verb};
use crate::services::logger::Logger;
use crate::services::normalizer::normalize;
use crate::services::tool_registry::{ToolHandler, ToolSpec};
use crate::services::validation::{ParamSpec, ToolArgs};
use crate::utils::delimited::split_delimited;
use serde_json::{json, Value};

/// Player control on the user's active device.
#[derive(Clone)]
pub struct PlaybackManager {
    logger: Logger,
    executor: AuthenticatedExecutor,
}

impl PlaybackManager {
    pub fn new(logger: Logger, executor: AuthenticatedExecutor) -> Self {
        Self {
            logger: logger.child("playback"),
            executor,
        }
    }

    pub fn specs() -> Vec<ToolSpec> {
        vec![
            ToolSpec::new(
                "start_playback",
                "Start or resume playback on the active device. With neither context_uri nor track_uris the current context resumes.",
                vec![
                    ParamSpec::string("context_uri")
                        .describe("Album, artist or playlist uri to play."),
                    ParamSpec::string("track_uris")
                        .describe("Comma-separated list of track uris to play."),
                    ParamSpec::integer("position_ms")
                        .at_least(0)
                        .describe("Position to start from, in milliseconds."),
                ],
            ),
            ToolSpec::new(
                "pause_playback",
                "Pause playback on the active device.",
                vec![],
            ),
        ]
    }

    pub async fn handle_tool(&self, tool: &str, args: &ToolArgs) -> Result<Value, ToolError> {
        let raw = match tool {
            "start_playback" => {
                let uris = match args.str("track_uris") {
                    Some(raw) => Some(split_delimited("track_uris", raw)?),
                    None => None,
                };
                if uris.is_some() && args.str("context_uri").is_some() {
                    return Err(ToolError::invalid_parameter(
                        "track_uris",
                        "cannot be combined with context_uri",
                    ));
                }
                self.executor
                    .execute(
                        Verb::Put,
                        "/me/player/play",
                        Some(json!({
                            "context_uri": args.str("context_uri"),
                            "uris": uris,
                            "position_ms": args.int("position_ms"),
                        })),
                    )
                    .await?
            }
            "pause_playback" => {
                self.executor
                    .execute(Verb::Put, "/me/player/pause", None)
                    .await?
            }
            other => return Err(ToolError::unknown_tool(other)),
        };
        Ok(normalize(tool, &raw, &args.to_value()))
    }
}

#[async_trait::async_trait]
impl ToolHandler for PlaybackManager {
    async fn handle(&self, tool: &str, args: &ToolArgs) -> Result<Value, ToolError> {
        self.logger.debug("handle_tool", Some(&json!({ "tool": tool })));
        self.handle_tool(tool, args).await
    }
}
