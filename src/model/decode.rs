//! Decoding of the JSON payloads the backend stores inside string fields.
//!
//! A post's `title` carries `{ title, albums, description }` and a user's
//! `fullName` carries `{ fullName, nickName, bio }`. Every render path needs a
//! displayable value, so decoding never fails: a payload that doesn't parse to
//! an object produces [`Decoded::Fallback`] with placeholder content.

use serde_json::{Map, Value};

pub const UNTITLED: &str = "Untitled";
pub const ANONYMOUS: &str = "anonymous";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded<T> {
    Ok(T),
    Fallback(T),
}

impl<T> Decoded<T> {
    pub fn is_fallback(&self) -> bool {
        matches!(self, Decoded::Fallback(..))
    }

    pub fn into_inner(self) -> T {
        match self {
            Decoded::Ok(value) | Decoded::Fallback(value) => value,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Album {
    pub title: String,
    pub artist: String,
    pub cover_url: String,
    pub video_id: Option<String>,
    pub video_url: Option<String>,
}

impl Album {
    /// Link to the track's video, preferring an explicit url over the id.
    pub fn video_link(&self) -> Option<String> {
        self.video_url
            .clone()
            .filter(|url| !url.is_empty())
            .or_else(|| {
                self.video_id
                    .as_ref()
                    .filter(|id| !id.is_empty())
                    .map(|id| format!("https://www.youtube.com/watch?v={}", id))
            })
    }

    fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        Some(Self {
            title: string_field(object, "title").unwrap_or_default(),
            artist: string_field(object, "artist").unwrap_or_default(),
            cover_url: string_field(object, "coverUrl").unwrap_or_default(),
            video_id: string_field(object, "videoId"),
            video_url: string_field(object, "videoUrl"),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedPost {
    pub title: String,
    pub description: String,
    pub albums: Vec<Album>,
}

impl Default for DecodedPost {
    fn default() -> Self {
        Self {
            title: UNTITLED.to_string(),
            description: String::new(),
            albums: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedAuthor {
    pub nickname: String,
    pub full_name: String,
    pub bio: String,
}

impl Default for DecodedAuthor {
    fn default() -> Self {
        Self {
            nickname: ANONYMOUS.to_string(),
            full_name: String::new(),
            bio: String::new(),
        }
    }
}

pub fn decode_post(title_raw: &str) -> Decoded<DecodedPost> {
    let Some(object) = parse_object(title_raw) else {
        return Decoded::Fallback(DecodedPost::default());
    };

    let albums = object
        .get("albums")
        .and_then(Value::as_array)
        .map(|albums| albums.iter().filter_map(Album::from_value).collect())
        .unwrap_or_default();

    Decoded::Ok(DecodedPost {
        title: string_field(&object, "title").unwrap_or_else(|| UNTITLED.to_string()),
        description: string_field(&object, "description").unwrap_or_default(),
        albums,
    })
}

pub fn decode_author(full_name_raw: &str) -> Decoded<DecodedAuthor> {
    let Some(object) = parse_object(full_name_raw) else {
        return Decoded::Fallback(DecodedAuthor::default());
    };

    Decoded::Ok(DecodedAuthor {
        nickname: string_field(&object, "nickName")
            .filter(|nickname| !nickname.trim().is_empty())
            .unwrap_or_else(|| ANONYMOUS.to_string()),
        full_name: string_field(&object, "fullName").unwrap_or_default(),
        bio: string_field(&object, "bio").unwrap_or_default(),
    })
}

fn parse_object(raw: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(object)) => Some(object),
        _ => None,
    }
}

fn string_field(object: &Map<String, Value>, key: &str) -> Option<String> {
    object.get(key).and_then(Value::as_str).map(str::to_string)
}
