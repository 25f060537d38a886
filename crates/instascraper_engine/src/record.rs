use std::sync::LazyLock;

use regex::Regex;

use crate::{ProviderComment, ProviderPost};

static HASHTAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#([^\s,.+=-]+)").expect("hashtag pattern"));
static MENTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@([a-zA-Z0-9_]+)").expect("mention pattern"));

/// Columns every record carries, in export order.
pub const BASE_COLUMNS: [&str; 15] = [
    "id",
    "thread_id",
    "parent_id",
    "body",
    "author",
    "timestamp",
    "type",
    "url",
    "thumbnail_url",
    "hashtags",
    "usertags",
    "mentioned",
    "num_likes",
    "num_comments",
    "subject",
];
pub const PHOTO_FILE_COLUMN: &str = "photo_file";
pub const METADATA_FILE_COLUMN: &str = "metadata_file";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordType {
    Picture,
    Video,
    Comment,
}

impl RecordType {
    pub fn as_str(self) -> &'static str {
        match self {
            RecordType::Picture => "picture",
            RecordType::Video => "video",
            RecordType::Comment => "comment",
        }
    }
}

/// One flattened output row: a post, a comment or a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultRecord {
    pub id: String,
    pub thread_id: String,
    pub parent_id: String,
    pub body: String,
    pub author: String,
    pub timestamp: i64,
    pub record_type: RecordType,
    pub url: String,
    pub thumbnail_url: String,
    pub hashtags: String,
    pub usertags: String,
    pub mentioned: String,
    pub num_likes: i64,
    pub num_comments: i64,
    /// `Some` when file capture is on; empty for rows without a file.
    pub photo_file: Option<String>,
    /// `Some` when metadata capture is on; empty for rows without a file.
    pub metadata_file: Option<String>,
}

impl ResultRecord {
    /// Column names present on this record, in export order.
    pub fn columns(&self) -> Vec<&'static str> {
        let mut columns = BASE_COLUMNS.to_vec();
        if self.photo_file.is_some() {
            columns.push(PHOTO_FILE_COLUMN);
        }
        if self.metadata_file.is_some() {
            columns.push(METADATA_FILE_COLUMN);
        }
        columns
    }

    /// Textual value of one column, `None` if the record lacks it.
    pub fn value(&self, column: &str) -> Option<String> {
        let value = match column {
            "id" => self.id.clone(),
            "thread_id" => self.thread_id.clone(),
            "parent_id" => self.parent_id.clone(),
            "body" => self.body.clone(),
            "author" => self.author.clone(),
            "timestamp" => self.timestamp.to_string(),
            "type" => self.record_type.as_str().to_string(),
            "url" => self.url.clone(),
            "thumbnail_url" => self.thumbnail_url.clone(),
            "hashtags" => self.hashtags.clone(),
            "usertags" => self.usertags.clone(),
            "mentioned" => self.mentioned.clone(),
            "num_likes" => self.num_likes.to_string(),
            "num_comments" => self.num_comments.to_string(),
            // reserved for compatibility with other tools' exports
            "subject" => String::new(),
            PHOTO_FILE_COLUMN => return self.photo_file.clone(),
            METADATA_FILE_COLUMN => return self.metadata_file.clone(),
            _ => return None,
        };
        Some(value)
    }

    pub fn fields(&self) -> Vec<(&'static str, String)> {
        self.columns()
            .into_iter()
            .filter_map(|column| self.value(column).map(|value| (column, value)))
            .collect()
    }

    pub fn is_post(&self) -> bool {
        self.record_type != RecordType::Comment
    }
}

/// Which optional file columns a run adds to every record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CaptureColumns {
    pub photo_file: bool,
    pub metadata_file: bool,
}

impl CaptureColumns {
    fn photo(self) -> Option<String> {
        self.photo_file.then(String::new)
    }

    fn metadata(self) -> Option<String> {
        self.metadata_file.then(String::new)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    #[error("provider item is missing `{0}`")]
    MissingField(&'static str),
}

fn required<T: Clone>(value: &Option<T>, field: &'static str) -> Result<T, RecordError> {
    value.clone().ok_or(RecordError::MissingField(field))
}

fn mentions(text: &str) -> String {
    MENTION
        .captures_iter(text)
        .map(|caps| caps[1].to_string())
        .collect::<Vec<_>>()
        .join(",")
}

fn hashtags(text: &str) -> String {
    HASHTAG
        .captures_iter(text)
        .map(|caps| caps[1].to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Top-level post: `id == thread_id == parent_id`.
pub fn build_post_record(
    post: &ProviderPost,
    capture: CaptureColumns,
) -> Result<ResultRecord, RecordError> {
    let shortcode = required(&post.shortcode, "shortcode")?;
    let author = required(&post.owner_username, "owner_username")?;
    let taken_at = required(&post.taken_at, "taken_at")?;
    let thumbnail_url = required(&post.display_url, "display_url")?;
    let url = if post.is_video {
        required(&post.video_url, "video_url")?
    } else {
        thumbnail_url.clone()
    };
    let caption = post.caption.clone().unwrap_or_default();

    Ok(ResultRecord {
        id: shortcode.clone(),
        thread_id: shortcode.clone(),
        parent_id: shortcode,
        mentioned: mentions(&caption),
        body: caption,
        author,
        timestamp: taken_at.timestamp(),
        record_type: if post.is_video {
            RecordType::Video
        } else {
            RecordType::Picture
        },
        url,
        thumbnail_url,
        hashtags: post.caption_hashtags.join(","),
        usertags: post.tagged_users.join(","),
        num_likes: post.likes.unwrap_or(0),
        num_comments: post.comments.unwrap_or(0),
        photo_file: capture.photo(),
        metadata_file: capture.metadata(),
    })
}

fn build_response_record(
    thread_id: &str,
    parent_id: &str,
    comment: &ProviderComment,
    num_comments: i64,
    capture: CaptureColumns,
) -> Result<ResultRecord, RecordError> {
    let id = required(&comment.id, "id")?;
    let author = required(&comment.owner_username, "owner_username")?;
    let created_at = required(&comment.created_at, "created_at")?;
    let text = comment.text.clone().unwrap_or_default();

    Ok(ResultRecord {
        id,
        thread_id: thread_id.to_string(),
        parent_id: parent_id.to_string(),
        hashtags: hashtags(&text),
        mentioned: mentions(&text),
        body: text,
        author,
        timestamp: created_at.timestamp(),
        record_type: RecordType::Comment,
        url: String::new(),
        thumbnail_url: String::new(),
        usertags: String::new(),
        num_likes: comment.likes_count.unwrap_or(0),
        num_comments,
        photo_file: capture.photo(),
        metadata_file: capture.metadata(),
    })
}

/// First-level comment; its parent is the post.
pub fn build_comment_record(
    post: &ResultRecord,
    comment: &ProviderComment,
    capture: CaptureColumns,
) -> Result<ResultRecord, RecordError> {
    build_response_record(
        &post.thread_id,
        &post.id,
        comment,
        comment.answers.len() as i64,
        capture,
    )
}

/// Reply to a comment; its parent is the comment, never the post.
pub fn build_reply_record(
    comment: &ResultRecord,
    reply: &ProviderComment,
    capture: CaptureColumns,
) -> Result<ResultRecord, RecordError> {
    build_response_record(&comment.thread_id, &comment.id, reply, 0, capture)
}
