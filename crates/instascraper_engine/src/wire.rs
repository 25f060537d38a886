//! Request and response shapes of the Apify REST API and its Instagram actors.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ProviderComment, ProviderPost};

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiResponse<T> {
    pub data: T,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RunData {
    pub id: String,
    pub status: String,
    #[serde(rename = "defaultDatasetId")]
    pub default_dataset_id: String,
}

/// Input for the apify/instagram-hashtag-scraper actor.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct HashtagInput {
    pub hashtags: Vec<String>,
    #[serde(rename = "resultsLimit")]
    pub results_limit: usize,
}

/// Input for the apify/instagram-post-scraper actor.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct ProfileInput {
    pub username: Vec<String>,
    #[serde(rename = "resultsLimit")]
    pub results_limit: usize,
}

/// Input for the apify/instagram-comment-scraper actor.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct CommentInput {
    #[serde(rename = "directUrls")]
    pub direct_urls: Vec<String>,
    #[serde(rename = "resultsLimit")]
    pub results_limit: usize,
    #[serde(rename = "includeNestedComments")]
    pub include_nested_comments: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TaggedUser {
    pub username: Option<String>,
}

/// One dataset item of the post and hashtag scrapers (same schema).
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct InstagramPost {
    #[serde(rename = "shortCode")]
    pub short_code: Option<String>,
    pub caption: Option<String>,
    #[serde(rename = "ownerUsername")]
    pub owner_username: Option<String>,
    pub url: Option<String>,
    #[serde(rename = "displayUrl")]
    pub display_url: Option<String>,
    #[serde(rename = "videoUrl")]
    pub video_url: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(rename = "type")]
    pub post_type: Option<String>,
    #[serde(default)]
    pub hashtags: Vec<String>,
    #[serde(rename = "taggedUsers", default)]
    pub tagged_users: Vec<TaggedUser>,
    #[serde(rename = "likesCount")]
    pub likes_count: Option<i64>,
    #[serde(rename = "commentsCount")]
    pub comments_count: Option<i64>,
}

impl InstagramPost {
    pub fn into_provider_post(self, raw: serde_json::Value) -> ProviderPost {
        let is_video = self
            .post_type
            .as_deref()
            .is_some_and(|kind| kind.eq_ignore_ascii_case("video"));
        ProviderPost {
            shortcode: self.short_code,
            caption: self.caption,
            owner_username: self.owner_username,
            taken_at: self.timestamp,
            is_video,
            display_url: self.display_url,
            video_url: self.video_url,
            permalink: self.url,
            caption_hashtags: self.hashtags,
            tagged_users: self
                .tagged_users
                .into_iter()
                .filter_map(|user| user.username)
                .collect(),
            likes: self.likes_count,
            comments: self.comments_count,
            raw,
        }
    }
}

/// One dataset item of the comment scraper.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct InstagramComment {
    pub id: Option<String>,
    pub text: Option<String>,
    #[serde(rename = "ownerUsername")]
    pub owner_username: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(rename = "likesCount")]
    pub likes_count: Option<i64>,
    #[serde(default)]
    pub replies: Vec<InstagramComment>,
}

impl From<InstagramComment> for ProviderComment {
    fn from(comment: InstagramComment) -> Self {
        ProviderComment {
            id: comment.id,
            text: comment.text,
            owner_username: comment.owner_username,
            created_at: comment.timestamp,
            likes_count: comment.likes_count,
            answers: comment
                .replies
                .into_iter()
                .map(|reply| ProviderComment {
                    answers: Vec::new(),
                    ..ProviderComment::from(reply)
                })
                .collect(),
        }
    }
}
