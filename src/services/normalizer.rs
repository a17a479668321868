//! Reshapes upstream payloads into the small fixed result of each tool.
//!
//! Every normalizer is pure and total: a missing container yields an empty
//! list and a missing field yields `null`, never an error.

use once_cell::sync::Lazy;
use serde_json::{Map, Value};
use std::collections::HashMap;

/// `raw` is the upstream payload; `context` holds the validated call
/// arguments plus anything the handler derived from them.
pub type NormalizeFn = fn(raw: &Value, context: &Value) -> Value;

static NORMALIZERS: Lazy<HashMap<&'static str, NormalizeFn>> = Lazy::new(|| {
    let mut table: HashMap<&'static str, NormalizeFn> = HashMap::new();
    table.insert("search_spotify", search);
    table.insert("artist_top_tracks", artist_top_tracks);
    table.insert("current_user_profile", user_profile);
    table.insert("current_user_top_tracks", top_tracks);
    table.insert("get_current_user_playlists", user_playlists);
    table.insert("get_playlist_items", playlist_items);
    table.insert("create_playlist", created_playlist);
    table.insert("add_to_playlist", added_to_playlist);
    table.insert("get_similar_tracks", similar_tracks);
    table.insert("get_similar_artists", similar_artists);
    table.insert("start_playback", playback);
    table.insert("pause_playback", playback);
    table
});

pub fn has_normalizer(tool: &str) -> bool {
    NORMALIZERS.contains_key(tool)
}

/// Tools without an entry pass the upstream payload through unchanged.
pub fn normalize(tool: &str, raw: &Value, context: &Value) -> Value {
    match NORMALIZERS.get(tool) {
        Some(normalizer) => normalizer(raw, context),
        None => raw.clone(),
    }
}

fn field(value: &Value, key: &str) -> Value {
    value.get(key).cloned().unwrap_or(Value::Null)
}

fn nested(value: &Value, outer: &str, inner: &str) -> Value {
    value
        .get(outer)
        .and_then(|v| v.get(inner))
        .cloned()
        .unwrap_or(Value::Null)
}

/// Items of a list-valued field; absent or non-list containers are empty.
fn items<'a>(value: Option<&'a Value>) -> &'a [Value] {
    value.and_then(Value::as_array).map(Vec::as_slice).unwrap_or(&[])
}

/// Last.fm collapses one-element lists into a bare object.
fn one_or_many(value: Option<&Value>) -> Vec<&Value> {
    match value {
        Some(Value::Array(list)) => list.iter().collect(),
        Some(obj @ Value::Object(_)) => vec![obj],
        _ => Vec::new(),
    }
}

fn artist_names(track: &Value) -> Value {
    Value::Array(
        items(track.get("artists"))
            .iter()
            .map(|artist| field(artist, "name"))
            .collect(),
    )
}

fn track_summary(track: &Value) -> Map<String, Value> {
    let mut out = Map::new();
    out.insert("id".to_string(), field(track, "id"));
    out.insert("name".to_string(), field(track, "name"));
    out.insert("uri".to_string(), field(track, "uri"));
    out.insert("artists".to_string(), artist_names(track));
    out.insert("album".to_string(), nested(track, "album", "name"));
    out
}

fn search(raw: &Value, context: &Value) -> Value {
    let search_type = context
        .get("search_type")
        .and_then(Value::as_str)
        .unwrap_or("track");
    let container = format!("{}s", search_type);
    let found: Vec<Value> = items(raw.get(container.as_str()).and_then(|c| c.get("items")))
        .iter()
        .filter(|item| !item.is_null())
        .map(|item| {
            let has_artists = item
                .get("artists")
                .and_then(Value::as_array)
                .map_or(false, |list| !list.is_empty());
            serde_json::json!({
                "id": field(item, "id"),
                "name": field(item, "name"),
                "uri": field(item, "uri"),
                "artists": if has_artists { artist_names(item) } else { Value::Null },
                "album": nested(item, "album", "name"),
            })
        })
        .collect();
    serde_json::json!({ "type": search_type, "items": found })
}

fn artist_top_tracks(raw: &Value, _context: &Value) -> Value {
    let tracks: Vec<Value> = items(raw.get("tracks"))
        .iter()
        .map(|track| {
            let mut out = track_summary(track);
            out.insert("popularity".to_string(), field(track, "popularity"));
            Value::Object(out)
        })
        .collect();
    serde_json::json!({ "tracks": tracks })
}

fn user_profile(raw: &Value, _context: &Value) -> Value {
    serde_json::json!({
        "id": field(raw, "id"),
        "display_name": field(raw, "display_name"),
        "uri": field(raw, "uri"),
        "email": field(raw, "email"),
        "country": field(raw, "country"),
        "product": field(raw, "product"),
        "followers": nested(raw, "followers", "total"),
    })
}

fn top_tracks(raw: &Value, context: &Value) -> Value {
    let tracks: Vec<Value> = items(raw.get("items"))
        .iter()
        .enumerate()
        .map(|(idx, track)| {
            let mut out = Map::new();
            out.insert("rank".to_string(), Value::from(idx + 1));
            out.extend(track_summary(track));
            Value::Object(out)
        })
        .collect();
    serde_json::json!({ "time_range": field(context, "time_range"), "tracks": tracks })
}

fn user_playlists(raw: &Value, context: &Value) -> Value {
    let playlists: Vec<Value> = items(raw.get("items"))
        .iter()
        .filter(|p| !p.is_null())
        .map(|playlist| {
            serde_json::json!({
                "id": field(playlist, "id"),
                "name": field(playlist, "name"),
                "uri": field(playlist, "uri"),
                "description": field(playlist, "description"),
                "owner": nested(playlist, "owner", "display_name"),
                "tracks_total": nested(playlist, "tracks", "total"),
            })
        })
        .collect();
    serde_json::json!({
        "total_playlists": field(raw, "total"),
        "returned": playlists.len(),
        "limit": field(context, "limit"),
        "offset": field(context, "offset"),
        "playlists": playlists,
    })
}

fn playlist_items(raw: &Value, context: &Value) -> Value {
    // Entries whose track was removed or is local-only carry `track: null`.
    let tracks: Vec<Value> = items(raw.get("items"))
        .iter()
        .filter_map(|entry| entry.get("track").filter(|t| !t.is_null()))
        .map(|track| {
            let mut out = track_summary(track);
            out.insert("explicit".to_string(), field(track, "explicit"));
            Value::Object(out)
        })
        .collect();
    serde_json::json!({
        "total_tracks": field(raw, "total"),
        "returned": tracks.len(),
        "limit": field(context, "limit"),
        "offset": field(context, "offset"),
        "items": tracks,
    })
}

fn created_playlist(raw: &Value, _context: &Value) -> Value {
    serde_json::json!({
        "id": field(raw, "id"),
        "name": field(raw, "name"),
        "uri": field(raw, "uri"),
        "description": field(raw, "description"),
        "public": field(raw, "public"),
        "owner": nested(raw, "owner", "display_name"),
    })
}

fn added_to_playlist(raw: &Value, context: &Value) -> Value {
    let uris = items(context.get("uris")).to_vec();
    serde_json::json!({
        "snapshot_id": field(raw, "snapshot_id"),
        "added": uris.len(),
        "uris": uris,
    })
}

fn similar_tracks(raw: &Value, _context: &Value) -> Value {
    let tracks: Vec<Value> = one_or_many(raw.get("similartracks").and_then(|c| c.get("track")))
        .into_iter()
        .map(|track| {
            serde_json::json!({
                "track": field(track, "name"),
                "artist": nested(track, "artist", "name"),
            })
        })
        .collect();
    serde_json::json!({ "similar_tracks": tracks })
}

fn similar_artists(raw: &Value, _context: &Value) -> Value {
    let names: Vec<Value> = one_or_many(raw.get("similarartists").and_then(|c| c.get("artist")))
        .into_iter()
        .map(|artist| field(artist, "name"))
        .collect();
    serde_json::json!({ "similar_artists": names })
}

fn playback(raw: &Value, _context: &Value) -> Value {
    serde_json::json!({ "status": raw.get("status").cloned().unwrap_or_else(|| Value::from("ok")) })
}
