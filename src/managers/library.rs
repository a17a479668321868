use crate::constants::limits::{MAX_PAGE_LIMIT, MAX_PLAYLIST_ITEMS_LIMIT, MAX_PLAYLIST_OFFSET};
use crate::errors::ToolError;
use crate::services::executor::{AuthenticatedExecutor, Verb};
use crate::services::logger::Logger;
use crate::services::normalizer::normalize;
use crate::services::tool_registry::{ToolHandler, ToolSpec};
use crate::services::validation::{ParamSpec, ToolArgs};
use crate::utils::ids::resolve_id;
use serde_json::{json, Value};

const SEARCH_TYPES: &[&str] = &[
    "track",
    "artist",
    "album",
    "playlist",
    "show",
    "episode",
    "audiobook",
];
const TIME_RANGES: &[&str] = &["short_term", "medium_term", "long_term"];

/// Read-only catalog and library lookups.
#[derive(Clone)]
pub struct LibraryManager {
    logger: Logger,
    executor: AuthenticatedExecutor,
}

impl LibraryManager {
    pub fn new(logger: Logger, executor: AuthenticatedExecutor) -> Self {
        Self {
            logger: logger.child("library"),
            executor,
        }
    }

    pub fn specs() -> Vec<ToolSpec> {
        vec![
            ToolSpec::new(
                "search_spotify",
                "Search Spotify for tracks, artists, albums, playlists, shows, episodes or audiobooks. \
                 Each item carries 'id', 'name', 'uri' (needed for playback and playlists) and, for tracks, 'artists' and 'album'.",
                vec![
                    ParamSpec::string("query").required().describe("The search term."),
                    ParamSpec::string("search_type")
                        .default_value("track")
                        .one_of(SEARCH_TYPES)
                        .describe("Kind of item to search for."),
                    ParamSpec::integer("limit")
                        .default_value(5)
                        .range(1, MAX_PAGE_LIMIT)
                        .describe("Maximum number of results; widen it when the right item is not found."),
                ],
            ),
            ToolSpec::new(
                "artist_top_tracks",
                "Top tracks of an artist. Requires the artist id (see search_spotify with search_type=artist).",
                vec![
                    ParamSpec::string("artist_id")
                        .required()
                        .describe("Spotify artist id, e.g. 4Z8W4fKeB5YxbusRsdQVPb."),
                    ParamSpec::string("market")
                        .default_value("US")
                        .describe("ISO 3166-1 alpha-2 market code."),
                ],
            ),
            ToolSpec::new(
                "current_user_profile",
                "Profile of the current user. Its 'id' is the user_id expected by create_playlist.",
                vec![],
            ),
            ToolSpec::new(
                "current_user_top_tracks",
                "The current user's top tracks, ranked. Map a requested period to the closest time_range.",
                vec![
                    ParamSpec::string("time_range")
                        .default_value("short_term")
                        .one_of(TIME_RANGES)
                        .describe("short_term (~4 weeks), medium_term (~6 months) or long_term (years)."),
                    ParamSpec::integer("limit")
                        .default_value(10)
                        .range(1, MAX_PAGE_LIMIT)
                        .describe("Number of tracks to return."),
                ],
            ),
            ToolSpec::new(
                "get_current_user_playlists",
                "One page of the current user's playlists. Raise offset to page through all of them.",
                vec![
                    ParamSpec::integer("limit")
                        .default_value(10)
                        .range(1, MAX_PAGE_LIMIT)
                        .describe("Page size."),
                    ParamSpec::integer("offset")
                        .default_value(0)
                        .range(0, MAX_PLAYLIST_OFFSET)
                        .describe("Index of the first playlist to return."),
                ],
            ),
            ToolSpec::new(
                "get_playlist_items",
                "One page of the tracks in a playlist. Find the playlist id with get_current_user_playlists.",
                vec![
                    ParamSpec::string("playlist_id")
                        .required()
                        .describe("Playlist id or spotify:playlist: uri."),
                    ParamSpec::integer("limit")
                        .default_value(10)
                        .range(1, MAX_PLAYLIST_ITEMS_LIMIT)
                        .describe("Page size."),
                    ParamSpec::integer("offset")
                        .default_value(0)
                        .at_least(0)
                        .describe("Index of the first item to return."),
                ],
            ),
        ]
    }

    pub async fn handle_tool(&self, tool: &str, args: &ToolArgs) -> Result<Value, ToolError> {
        let raw = match tool {
            "search_spotify" => {
                self.executor
                    .execute(
                        Verb::Get,
                        "/search",
                        Some(json!({
                            "q": args.require_str("query")?,
                            "type": args.str("search_type"),
                            "limit": args.int("limit"),
                        })),
                    )
                    .await?
            }
            "artist_top_tracks" => {
                let artist_id = resolve_id("artist_id", args.require_str("artist_id")?, "artist")?;
                self.executor
                    .execute(
                        Verb::Get,
                        &format!("/artists/{}/top-tracks", artist_id),
                        Some(json!({ "market": args.str("market") })),
                    )
                    .await?
            }
            "current_user_profile" => self.executor.execute(Verb::Get, "/me", None).await?,
            "current_user_top_tracks" => {
                self.executor
                    .execute(
                        Verb::Get,
                        "/me/top/tracks",
                        Some(json!({
                            "time_range": args.str("time_range"),
                            "limit": args.int("limit"),
                        })),
                    )
                    .await?
            }
            "get_current_user_playlists" => {
                self.executor
                    .execute(
                        Verb::Get,
                        "/me/playlists",
                        Some(json!({ "limit": args.int("limit"), "offset": args.int("offset") })),
                    )
                    .await?
            }
            "get_playlist_items" => {
                let playlist_id =
                    resolve_id("playlist_id", args.require_str("playlist_id")?, "playlist")?;
                self.executor
                    .execute(
                        Verb::Get,
                        &format!("/playlists/{}/tracks", playlist_id),
                        Some(json!({ "limit": args.int("limit"), "offset": args.int("offset") })),
                    )
                    .await?
            }
            other => return Err(ToolError::unknown_tool(other)),
        };
        Ok(normalize(tool, &raw, &args.to_value()))
    }
}

#[async_trait::async_trait]
impl ToolHandler for LibraryManager {
    async fn handle(&self, tool: &str, args: &ToolArgs) -> Result<Value, ToolError> {
        self.logger.debug("handle_tool", Some(&json!({ "tool": tool })));
        self.handle_tool(tool, args).await
    }
}
