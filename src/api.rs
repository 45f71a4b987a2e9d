use std::fmt::{self, Display};

use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::session::Session;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    Network(String),
    NotFound(String),
    Status(u16, String),
    Body(String),
    Unauthenticated,
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound(..))
    }
}

impl Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Network(message) => write!(f, "network error: {}", message),
            ApiError::NotFound(path) => write!(f, "{} no longer exists", path),
            ApiError::Status(code, body) if body.is_empty() => write!(f, "server answered {}", code),
            ApiError::Status(code, body) => write!(f, "server answered {}: {}", code, body),
            ApiError::Body(message) => write!(f, "unexpected response: {}", message),
            ApiError::Unauthenticated => write!(f, "sign in first"),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_decode() {
            ApiError::Body(value.to_string())
        } else {
            ApiError::Network(value.to_string())
        }
    }
}

#[derive(Debug, Clone)]
pub struct MusicApi {
    client: Client,
    base_url: String,
}

impl MusicApi {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let client = Client::builder()
            .user_agent(concat!("tunefeed/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Raw client, for fetching assets such as album covers.
    pub fn client(&self) -> &Client {
        &self.client
    }

    pub async fn get_user(
        &self,
        session: Option<&Session>,
        user_id: &str,
    ) -> Result<UserData, ApiError> {
        let request = self.client.get(self.url(&format!("/users/{}", user_id)));
        Self::json(authorize(request, session)).await
    }

    pub async fn get_post(
        &self,
        session: Option<&Session>,
        post_id: &str,
    ) -> Result<PostData, ApiError> {
        let request = self.client.get(self.url(&format!("/posts/{}", post_id)));
        Self::json(authorize(request, session)).await
    }

    pub async fn get_channel_posts(
        &self,
        session: Option<&Session>,
        channel_id: &str,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<PostData>, ApiError> {
        let request = self
            .client
            .get(self.url(&format!("/channels/{}/posts", channel_id)))
            .query(&[("page", page), ("pageSize", page_size)]);
        Self::json(authorize(request, session)).await
    }

    pub async fn create_like(&self, session: &Session, post_id: &str) -> Result<LikeData, ApiError> {
        let request = self
            .client
            .post(self.url(&format!("/posts/{}/likes", post_id)))
            .bearer_auth(&session.token);
        Self::json(request).await
    }

    pub async fn delete_like(&self, session: &Session, like_id: &str) -> Result<(), ApiError> {
        let request = self
            .client
            .delete(self.url(&format!("/likes/{}", like_id)))
            .bearer_auth(&session.token);
        Self::send(request).await.map(|_| ())
    }

    pub async fn create_comment(
        &self,
        session: &Session,
        post_id: &str,
        comment: &str,
    ) -> Result<CommentData, ApiError> {
        let request = self
            .client
            .post(self.url(&format!("/posts/{}/comments", post_id)))
            .bearer_auth(&session.token)
            .json(&CommentRequest { comment });
        Self::json(request).await
    }

    pub async fn delete_comment(&self, session: &Session, comment_id: &str) -> Result<(), ApiError> {
        let request = self
            .client
            .delete(self.url(&format!("/comments/{}", comment_id)))
            .bearer_auth(&session.token);
        Self::send(request).await.map(|_| ())
    }

    pub async fn create_notification(
        &self,
        session: &Session,
        notification: &NotificationRequest,
    ) -> Result<NotificationData, ApiError> {
        let request = self
            .client
            .post(self.url("/notifications"))
            .bearer_auth(&session.token)
            .json(notification);
        Self::json(request).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(request: RequestBuilder) -> Result<Response, ApiError> {
        let response = request.send().await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound(response.url().path().to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status(status.as_u16(), body));
        }
        Ok(response)
    }

    async fn json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, ApiError> {
        Self::send(request)
            .await?
            .json()
            .await
            .map_err(|e| ApiError::Body(e.to_string()))
    }
}

fn authorize(request: RequestBuilder, session: Option<&Session>) -> RequestBuilder {
    match session {
        Some(session) => request.bearer_auth(&session.token),
        None => request,
    }
}

#[derive(Debug, Serialize)]
struct CommentRequest<'a> {
    comment: &'a str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    Like,
    Comment,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRequest {
    pub notification_type: NotificationKind,
    /// Id of the like or comment that triggered the notification.
    pub notification_type_id: String,
    /// Recipient.
    pub user_id: String,
    pub post_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NotificationData {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub seen: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserData {
    #[serde(alias = "_id")]
    pub id: String,
    /// JSON-encoded `{ fullName, nickName, bio }`.
    #[serde(rename = "fullName", default)]
    pub full_name_raw: String,
    pub image: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LikeData {
    #[serde(alias = "_id")]
    pub id: String,
    pub user: String,
    pub post: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommentData {
    #[serde(alias = "_id")]
    pub id: String,
    pub author: UserData,
    pub comment: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChannelData {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// The backend embeds the channel on some endpoints and only references it
/// by id on others.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ChannelRef {
    Id(String),
    Channel(ChannelData),
}

impl ChannelRef {
    pub fn id(&self) -> &str {
        match self {
            ChannelRef::Id(id) => id,
            ChannelRef::Channel(channel) => &channel.id,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PostData {
    #[serde(alias = "_id")]
    pub id: String,
    /// JSON-encoded `{ title, albums, description }`.
    #[serde(rename = "title", default)]
    pub title_raw: String,
    pub author: UserData,
    #[serde(default)]
    pub likes: Vec<LikeData>,
    #[serde(default)]
    pub comments: Vec<CommentData>,
    pub channel: ChannelRef,
    #[serde(rename = "createdAt", default)]
    pub created_at: Option<DateTime<Utc>>,
}
