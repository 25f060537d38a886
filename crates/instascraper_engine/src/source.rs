use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::{ProviderError, Query};

/// Post handle as delivered by a provider. Fields the provider could not
/// supply stay `None`; record construction decides which are mandatory.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProviderPost {
    pub shortcode: Option<String>,
    pub caption: Option<String>,
    pub owner_username: Option<String>,
    pub taken_at: Option<DateTime<Utc>>,
    pub is_video: bool,
    pub display_url: Option<String>,
    pub video_url: Option<String>,
    /// Public permalink, used to look up comments.
    pub permalink: Option<String>,
    pub caption_hashtags: Vec<String>,
    pub tagged_users: Vec<String>,
    pub likes: Option<i64>,
    pub comments: Option<i64>,
    /// Provider document as received; saved verbatim as the metadata file.
    pub raw: serde_json::Value,
}

impl ProviderPost {
    /// URL of the primary media payload.
    pub fn media_url(&self) -> Option<&str> {
        if self.is_video {
            self.video_url.as_deref()
        } else {
            self.display_url.as_deref()
        }
    }

    pub fn media_extension(&self) -> &'static str {
        if self.is_video {
            "mp4"
        } else {
            "jpg"
        }
    }
}

/// A comment with its direct replies. The platform nests one level only,
/// so `answers` of an answer are ignored.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProviderComment {
    pub id: Option<String>,
    pub text: Option<String>,
    pub owner_username: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub likes_count: Option<i64>,
    pub answers: Vec<ProviderComment>,
}

/// Callback for diagnostics the external client would otherwise print.
pub trait ClientObserver: Send + Sync {
    fn on_client_error(&self, message: &str);
}

impl<F> ClientObserver for F
where
    F: Fn(&str) + Send + Sync,
{
    fn on_client_error(&self, message: &str) {
        self(message)
    }
}

/// Lazy sequence of posts for one query, pulled one item at a time.
#[async_trait::async_trait]
pub trait PostCursor: Send {
    async fn next_post(
        &mut self,
        observer: &dyn ClientObserver,
    ) -> Option<Result<ProviderPost, ProviderError>>;
}

/// Seam around the external scraping client.
#[async_trait::async_trait]
pub trait PostSource: Send + Sync {
    /// Resolves a query to a fresh cursor. `limit` is a hint; the worker
    /// stops pulling once it has enough items.
    async fn discover(
        &self,
        query: &Query,
        limit: usize,
        observer: &dyn ClientObserver,
    ) -> Result<Box<dyn PostCursor>, ProviderError>;

    async fn comments(
        &self,
        post: &ProviderPost,
        observer: &dyn ClientObserver,
    ) -> Result<Vec<ProviderComment>, ProviderError>;

    async fn download(
        &self,
        url: &str,
        observer: &dyn ClientObserver,
    ) -> Result<Bytes, ProviderError>;
}
