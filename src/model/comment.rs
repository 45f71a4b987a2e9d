use chrono::{DateTime, Utc};

use crate::{api::CommentData, model::author::Author};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub id: String,
    pub author: Author,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl From<CommentData> for Comment {
    fn from(value: CommentData) -> Self {
        Self {
            id: value.id,
            author: value.author.into(),
            body: value.comment,
            created_at: value.created_at,
        }
    }
}
