mod common;
use common::{build_app, config_for, MockUpstream, LASTFM_KEY, LASTFM_PATH};

use serde_json::json;
use spotify_mcp::app::App;
use spotify_mcp::errors::ToolErrorKind;

#[tokio::test]
async fn unknown_tool_never_reaches_upstream() {
    let mock = MockUpstream::start().await;
    let app = build_app(&mock);

    let err = app
        .registry
        .invoke("serach_spotify", json!({"query": "x"}))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ToolErrorKind::UnknownTool);
    assert!(err.hint.unwrap_or_default().contains("search_spotify"));
    assert!(mock.requests().is_empty());
    assert_eq!(mock.token_calls(), 0);
}

#[tokio::test]
async fn registry_lists_every_tool_once() {
    let mock = MockUpstream::start().await;
    let app = build_app(&mock);

    let names: Vec<String> = app.registry.list().into_iter().map(|t| t.name).collect();
    assert_eq!(names.len(), 12);
    for expected in [
        "search_spotify",
        "artist_top_tracks",
        "current_user_profile",
        "current_user_top_tracks",
        "get_current_user_playlists",
        "get_playlist_items",
        "create_playlist",
        "add_to_playlist",
        "get_similar_tracks",
        "get_similar_artists",
        "start_playback",
        "pause_playback",
    ] {
        assert!(names.iter().any(|n| n == expected), "missing {}", expected);
    }
}

#[tokio::test]
async fn add_to_playlist_splits_and_trims_uris() {
    let mock = MockUpstream::start().await;
    mock.reply("POST", "/v1/playlists/p1/tracks", 201, r#"{"snapshot_id":"snap"}"#);
    let app = build_app(&mock);

    let out = app
        .registry
        .invoke(
            "add_to_playlist",
            json!({"playlist_id": "p1", "track_uri": "uri1, uri2"}),
        )
        .await
        .expect("added");
    assert_eq!(out, json!({"snapshot_id": "snap", "added": 2, "uris": ["uri1", "uri2"]}));

    let requests = mock.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].json_body(), json!({"uris": ["uri1", "uri2"]}));
}

#[tokio::test]
async fn add_to_playlist_rejects_oversized_batches_locally() {
    let mock = MockUpstream::start().await;
    let app = build_app(&mock);
    let uris: Vec<String> = (0..101).map(|i| format!("spotify:track:{}", i)).collect();

    let err = app
        .registry
        .invoke(
            "add_to_playlist",
            json!({"playlist_id": "p1", "track_uri": uris.join(",")}),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind, ToolErrorKind::InvalidParameter);
    assert_eq!(err.tool.as_deref(), Some("add_to_playlist"));
    assert!(mock.requests().is_empty());
}

#[tokio::test]
async fn upstream_not_found_surfaces_as_execution_error() {
    let mock = MockUpstream::start().await;
    let app = build_app(&mock);

    let err = app
        .registry
        .invoke("artist_top_tracks", json!({"artist_id": "nope"}))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ToolErrorKind::ToolExecution);
    assert_eq!(err.code, "UPSTREAM_ERROR");
    assert_eq!(err.tool.as_deref(), Some("artist_top_tracks"));
    assert_eq!(err.details.as_ref().unwrap()["status"], 404);
}

#[tokio::test]
async fn search_applies_defaults_and_normalizes() {
    let mock = MockUpstream::start().await;
    mock.reply(
        "GET",
        "/v1/search",
        200,
        r#"{"tracks":{"items":[{"id":"1","name":"One More Time","uri":"spotify:track:1","artists":[{"name":"Daft Punk"}],"album":{"name":"Discovery"},"popularity":80}]}}"#,
    );
    let app = build_app(&mock);

    let out = app
        .registry
        .invoke("search_spotify", json!({"query": "one more time"}))
        .await
        .expect("search");
    assert_eq!(
        out,
        json!({"type": "track", "items": [{
            "id": "1",
            "name": "One More Time",
            "uri": "spotify:track:1",
            "artists": ["Daft Punk"],
            "album": "Discovery",
        }]})
    );

    let query = mock.requests()[0].query_pairs();
    assert_eq!(query["q"], "one more time");
    assert_eq!(query["type"], "track");
    assert_eq!(query["limit"], "5");
}

#[tokio::test]
async fn string_limits_are_coerced() {
    let mock = MockUpstream::start().await;
    mock.reply("GET", "/v1/me/playlists", 200, r#"{"items":[],"total":0}"#);
    let app = build_app(&mock);

    let out = app
        .registry
        .invoke("get_current_user_playlists", json!({"limit": "20"}))
        .await
        .expect("playlists");
    assert_eq!(out["limit"], 20);
    assert_eq!(out["offset"], 0);
    assert_eq!(mock.requests()[0].query_pairs()["limit"], "20");
}

#[tokio::test]
async fn out_of_range_limit_is_rejected_before_any_request() {
    let mock = MockUpstream::start().await;
    let app = build_app(&mock);

    let err = app
        .registry
        .invoke("search_spotify", json!({"query": "x", "limit": 500}))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ToolErrorKind::InvalidParameter);
    assert!(err.message.starts_with("limit"));
    assert!(mock.requests().is_empty());
    assert_eq!(mock.token_calls(), 0);
}

#[tokio::test]
async fn playlist_items_skip_entries_without_a_track() {
    let mock = MockUpstream::start().await;
    mock.reply(
        "GET",
        "/v1/playlists/p1/tracks",
        200,
        r#"{"total":2,"items":[{"track":null},{"track":{"id":"t","name":"T","uri":"spotify:track:t","explicit":false,"artists":[],"album":{"name":"A"}}}]}"#,
    );
    let app = build_app(&mock);

    let out = app
        .registry
        .invoke("get_playlist_items", json!({"playlist_id": "spotify:playlist:p1"}))
        .await
        .expect("items");
    assert_eq!(out["total_tracks"], 2);
    assert_eq!(out["returned"], 1);
    assert_eq!(out["items"][0]["id"], "t");
}

#[tokio::test]
async fn start_playback_with_no_content_reports_ok() {
    let mock = MockUpstream::start().await;
    mock.reply("PUT", "/v1/me/player/play", 204, "");
    let app = build_app(&mock);

    let out = app
        .registry
        .invoke("start_playback", json!({"track_uris": "spotify:track:a,spotify:track:b"}))
        .await
        .expect("play");
    assert_eq!(out, json!({"status": "ok"}));

    let body = mock.requests()[0].json_body();
    assert_eq!(body, json!({"uris": ["spotify:track:a", "spotify:track:b"]}));
}

#[tokio::test]
async fn start_playback_rejects_context_with_track_list() {
    let mock = MockUpstream::start().await;
    let app = build_app(&mock);

    let err = app
        .registry
        .invoke(
            "start_playback",
            json!({"context_uri": "spotify:album:x", "track_uris": "spotify:track:a"}),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind, ToolErrorKind::InvalidParameter);
    assert!(mock.requests().is_empty());
}

#[tokio::test]
async fn pause_without_device_is_an_execution_error() {
    let mock = MockUpstream::start().await;
    mock.reply(
        "PUT",
        "/v1/me/player/pause",
        404,
        r#"{"error":{"status":404,"message":"Player command failed: No active device found"}}"#,
    );
    let app = build_app(&mock);

    let err = app
        .registry
        .invoke("pause_playback", json!({}))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ToolErrorKind::ToolExecution);
    assert!(err.message.contains("No active device"));
}

#[tokio::test]
async fn similar_tracks_accept_a_single_object_result() {
    let mock = MockUpstream::start().await;
    mock.reply(
        "GET",
        LASTFM_PATH,
        200,
        r#"{"similartracks":{"track":{"name":"Digital Love","artist":{"name":"Daft Punk"}}}}"#,
    );
    let app = build_app(&mock);

    let out = app
        .registry
        .invoke(
            "get_similar_tracks",
            json!({"artist_name": "Daft Punk", "track_name": "One More Time"}),
        )
        .await
        .expect("similar");
    assert_eq!(
        out,
        json!({"similar_tracks": [{"track": "Digital Love", "artist": "Daft Punk"}]})
    );

    let requests = mock.requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].authorization.is_none());
    let query = requests[0].query_pairs();
    assert_eq!(query["method"], "track.getSimilar");
    assert_eq!(query["api_key"], LASTFM_KEY);
    assert_eq!(query["autocorrect"], "1");
    assert_eq!(query["format"], "json");
    assert_eq!(query["artist"], "Daft Punk");
    assert_eq!(query["track"], "One More Time");
    assert_eq!(query["limit"], "5");
    assert_eq!(mock.token_calls(), 0);
}

#[tokio::test]
async fn lastfm_error_body_is_a_rejection() {
    let mock = MockUpstream::start().await;
    mock.reply(
        "GET",
        LASTFM_PATH,
        200,
        r#"{"error":6,"message":"The artist you supplied could not be found"}"#,
    );
    let app = build_app(&mock);

    let err = app
        .registry
        .invoke("get_similar_artists", json!({"artist_name": "zzzz"}))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ToolErrorKind::ToolExecution);
    assert_eq!(err.code, "UPSTREAM_REJECTED");
    assert!(!err.message.contains(LASTFM_KEY));
}

#[tokio::test]
async fn similarity_tools_are_absent_without_a_lastfm_key() {
    let mock = MockUpstream::start().await;
    let app = App::initialize(config_for(&mock, false, 2_000)).expect("app");

    assert_eq!(app.registry.list().len(), 10);
    let err = app
        .registry
        .invoke("get_similar_artists", json!({"artist_name": "x"}))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ToolErrorKind::UnknownTool);
    assert!(mock.requests().is_empty());
}

#[tokio::test]
async fn dot_segment_ids_never_reach_upstream() {
    let mock = MockUpstream::start().await;
    let app = build_app(&mock);

    let err = app
        .registry
        .invoke("get_playlist_items", json!({"playlist_id": ".."}))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ToolErrorKind::InvalidParameter);

    let err = app
        .registry
        .invoke("create_playlist", json!({"user_id": "..", "name": "Mix"}))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ToolErrorKind::InvalidParameter);
    assert!(mock.requests().is_empty());
}
