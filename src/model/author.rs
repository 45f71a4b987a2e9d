use log::warn;

use crate::{
    api::UserData,
    model::decode::{DecodedAuthor, decode_author},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    pub id: String,
    pub nickname: String,
    pub full_name: String,
    pub bio: String,
    pub image_url: Option<String>,
}

impl Default for Author {
    fn default() -> Self {
        let DecodedAuthor {
            nickname,
            full_name,
            bio,
        } = DecodedAuthor::default();
        Self {
            id: String::new(),
            nickname,
            full_name,
            bio,
            image_url: None,
        }
    }
}

impl From<UserData> for Author {
    fn from(value: UserData) -> Self {
        let decoded = decode_author(&value.full_name_raw);
        if decoded.is_fallback() {
            warn!("user {} has an unreadable profile payload", value.id);
        }
        let DecodedAuthor {
            nickname,
            full_name,
            bio,
        } = decoded.into_inner();

        Self {
            id: value.id,
            nickname,
            full_name,
            bio,
            image_url: value.image.filter(|url| !url.is_empty()),
        }
    }
}
