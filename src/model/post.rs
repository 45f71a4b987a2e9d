use chrono::{DateTime, Utc};
use log::warn;

use crate::{
    api::{LikeData, PostData},
    model::{
        author::Author,
        comment::Comment,
        decode::{Album, DecodedPost, decode_post},
    },
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Like {
    pub id: String,
    pub user_id: String,
}

impl From<LikeData> for Like {
    fn from(value: LikeData) -> Self {
        Self {
            id: value.id,
            user_id: value.user,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Post {
    pub id: String,
    pub channel_id: String,
    pub title: String,
    pub description: String,
    pub albums: Vec<Album>,
    pub author: Author,
    pub likes: Vec<Like>,
    pub comments: Vec<Comment>,
    pub created_at: Option<DateTime<Utc>>,
}

impl Post {
    pub fn first_album(&self) -> Option<&Album> {
        self.albums.first()
    }
}

impl From<PostData> for Post {
    fn from(value: PostData) -> Self {
        let decoded = decode_post(&value.title_raw);
        if decoded.is_fallback() {
            warn!("post {} has an unreadable title payload", value.id);
        }
        let DecodedPost {
            title,
            description,
            albums,
        } = decoded.into_inner();

        Post {
            channel_id: value.channel.id().to_string(),
            id: value.id,
            title,
            description,
            albums,
            author: value.author.into(),
            likes: value.likes.into_iter().map(Like::from).collect(),
            comments: value.comments.into_iter().map(Comment::from).collect(),
            created_at: value.created_at,
        }
    }
}
