use std::sync::Arc;
use std::thread::{self, JoinHandle};

use scrape_logging::{scrape_debug, scrape_error, scrape_info, scrape_warn};

use crate::media::MediaStore;
use crate::rate_limit::RateLimitObserver;
use crate::record::{build_comment_record, build_post_record, build_reply_record, CaptureColumns};
use crate::{
    CancelToken, ClientObserver, EventSink, Interrupted, PostSource, ProviderError,
    ProviderErrorKind, ProviderPost, Query, ResultRecord, ScrapeConfiguration, ScrapeEvent,
    ScrapeOutcome, ScrapeStatus, INDETERMINATE_PROGRESS,
};

/// Running worker thread. At most one should exist per UI.
pub struct ScrapeHandle {
    cancel: CancelToken,
    thread: JoinHandle<ScrapeOutcome>,
}

impl ScrapeHandle {
    /// Spawns the worker and returns immediately.
    pub fn start(
        config: ScrapeConfiguration,
        source: Arc<dyn PostSource>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        let cancel = CancelToken::new();
        let worker_cancel = cancel.clone();
        let thread = thread::spawn(move || {
            let outcome = match tokio::runtime::Runtime::new() {
                Ok(runtime) => runtime
                    .block_on(run_scrape(
                        &config,
                        source.as_ref(),
                        sink.as_ref(),
                        &worker_cancel,
                    ))
                    .map_or(ScrapeOutcome::Interrupted, ScrapeOutcome::Completed),
                Err(err) => {
                    scrape_error!("Could not start scrape runtime: {}", err);
                    ScrapeOutcome::Interrupted
                }
            };
            let status = match &outcome {
                ScrapeOutcome::Completed(_) => ScrapeStatus::Done,
                ScrapeOutcome::Interrupted => ScrapeStatus::Interrupted,
            };
            sink.emit(ScrapeEvent::Status(status));
            outcome
        });
        Self { cancel, thread }
    }

    /// Requests a cooperative stop; the worker notices at its next checkpoint.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Blocks until the worker has fully stopped.
    pub fn join(self) -> ScrapeOutcome {
        match self.thread.join() {
            Ok(outcome) => outcome,
            Err(_) => {
                scrape_error!("Scrape worker panicked; treating run as interrupted");
                ScrapeOutcome::Interrupted
            }
        }
    }
}

struct PendingPost {
    query: Query,
    post: ProviderPost,
}

enum QueryFailure {
    Interrupted,
    Provider(ProviderError),
}

impl From<Interrupted> for QueryFailure {
    fn from(_: Interrupted) -> Self {
        QueryFailure::Interrupted
    }
}

impl From<ProviderError> for QueryFailure {
    fn from(err: ProviderError) -> Self {
        QueryFailure::Provider(err)
    }
}

/// Executes one scrape run. All-or-nothing: once cancellation is observed
/// the partial results are dropped and `Interrupted` is returned.
pub async fn run_scrape(
    config: &ScrapeConfiguration,
    source: &dyn PostSource,
    sink: &dyn EventSink,
    cancel: &CancelToken,
) -> Result<Vec<ResultRecord>, Interrupted> {
    let observer = RateLimitObserver::new(sink);
    sink.emit(ScrapeEvent::Progress(INDETERMINATE_PROGRESS));

    let pending = discover(config, source, sink, &observer, cancel).await?;
    scrape_info!(
        "Discovered {} posts across {} queries",
        pending.len(),
        config.queries.len()
    );
    enumerate(config, source, sink, &observer, cancel, pending).await
}

async fn discover(
    config: &ScrapeConfiguration,
    source: &dyn PostSource,
    sink: &dyn EventSink,
    observer: &dyn ClientObserver,
    cancel: &CancelToken,
) -> Result<Vec<PendingPost>, Interrupted> {
    let mut pending = Vec::new();
    for query in &config.queries {
        sink.emit(ScrapeEvent::Log(format!("Retrieving posts ('{query}')")));
        match discover_query(config, source, sink, observer, cancel, query).await {
            Ok(posts) => pending.extend(posts.into_iter().map(|post| PendingPost {
                query: query.clone(),
                post,
            })),
            Err(QueryFailure::Interrupted) => return Err(Interrupted),
            Err(QueryFailure::Provider(err)) => {
                scrape_warn!("Discovery for {} failed: {}", query, err);
                sink.emit(ScrapeEvent::Log(format!(
                    "Error while retrieving posts for query '{query}'"
                )));
            }
        }
    }
    Ok(pending)
}

async fn discover_query(
    config: &ScrapeConfiguration,
    source: &dyn PostSource,
    sink: &dyn EventSink,
    observer: &dyn ClientObserver,
    cancel: &CancelToken,
    query: &Query,
) -> Result<Vec<ProviderPost>, QueryFailure> {
    let limit = config.max_items_per_query;
    let mut cursor = source.discover(query, limit, observer).await?;
    let mut posts = Vec::new();
    while posts.len() < limit {
        cancel.checkpoint()?;
        match cursor.next_post(observer).await {
            None => break,
            Some(Ok(post)) => {
                posts.push(post);
                sink.emit(ScrapeEvent::Log(format!(
                    "Retrieving post list ('{}', {} posts)",
                    query.name(),
                    posts.len()
                )));
            }
            Some(Err(err)) => return Err(err.into()),
        }
    }
    Ok(posts)
}

async fn enumerate(
    config: &ScrapeConfiguration,
    source: &dyn PostSource,
    sink: &dyn EventSink,
    observer: &dyn ClientObserver,
    cancel: &CancelToken,
    pending: Vec<PendingPost>,
) -> Result<Vec<ResultRecord>, Interrupted> {
    let total = pending.len();
    let capture = CaptureColumns {
        photo_file: config.scrape_files,
        metadata_file: config.scrape_metadata,
    };
    let store = config
        .captures_files()
        .then(|| MediaStore::new(config.files_folder()));
    let comments_bit = if config.scrape_comments {
        " and comments"
    } else {
        ""
    };

    let mut results = Vec::new();
    for (index, item) in pending.iter().enumerate() {
        cancel.checkpoint()?;
        let processed = index + 1;
        let label = item.post.shortcode.as_deref().unwrap_or("?");
        sink.emit(ScrapeEvent::Log(format!(
            "Downloading post{comments_bit} {label}, {processed}/{total}"
        )));
        sink.emit(ScrapeEvent::Progress(processed as f64 / total as f64));

        let mut record = match build_post_record(&item.post, capture) {
            Ok(record) => record,
            Err(err) => {
                scrape_debug!("Skipping post from {}: {}", item.query, err);
                continue;
            }
        };

        if let Some(store) = &store {
            save_files(config, source, sink, observer, store, &item.post, &mut record).await;
        }

        if config.scrape_comments {
            cancel.checkpoint()?;
            let responses =
                expand_comments(source, sink, observer, &item.post, &record, capture).await;
            results.push(record);
            results.extend(responses);
        } else {
            results.push(record);
        }
    }
    Ok(results)
}

async fn save_files(
    config: &ScrapeConfiguration,
    source: &dyn PostSource,
    sink: &dyn EventSink,
    observer: &dyn ClientObserver,
    store: &MediaStore,
    post: &ProviderPost,
    record: &mut ResultRecord,
) {
    if config.scrape_files {
        match fetch_media(source, observer, post).await {
            Ok(payload) => {
                match store.save_media(&record.thread_id, post.media_extension(), &payload) {
                    Ok(path) => record.photo_file = Some(path.display().to_string()),
                    Err(err) => {
                        scrape_warn!("Could not write media for {}: {}", record.id, err);
                        sink.emit(ScrapeEvent::Log(format!(
                            "Could not save media file for post {}",
                            record.id
                        )));
                    }
                }
            }
            Err(err) => {
                scrape_warn!("Could not download media for {}: {}", record.id, err);
                sink.emit(ScrapeEvent::Log(format!(
                    "Could not download media for post {}",
                    record.id
                )));
            }
        }
    }

    if config.scrape_metadata {
        match store.save_metadata(&record.thread_id, &post.raw) {
            Ok(path) => record.metadata_file = Some(path.display().to_string()),
            Err(err) => {
                scrape_warn!("Could not write metadata for {}: {}", record.id, err);
                sink.emit(ScrapeEvent::Log(format!(
                    "Could not save metadata file for post {}",
                    record.id
                )));
            }
        }
    }
}

async fn fetch_media(
    source: &dyn PostSource,
    observer: &dyn ClientObserver,
    post: &ProviderPost,
) -> Result<bytes::Bytes, ProviderError> {
    let url = post
        .media_url()
        .ok_or_else(|| ProviderError::new(ProviderErrorKind::NotFound, "post has no media url"))?;
    source.download(url, observer).await
}

async fn expand_comments(
    source: &dyn PostSource,
    sink: &dyn EventSink,
    observer: &dyn ClientObserver,
    post: &ProviderPost,
    record: &ResultRecord,
    capture: CaptureColumns,
) -> Vec<ResultRecord> {
    let comments = match source.comments(post, observer).await {
        Ok(comments) => comments,
        Err(err) => {
            scrape_warn!("Comments for {} unavailable: {}", record.id, err);
            sink.emit(ScrapeEvent::Log(format!(
                "Could not retrieve comments for post {}",
                record.id
            )));
            return Vec::new();
        }
    };

    let mut responses = Vec::new();
    for comment in &comments {
        let comment_record = match build_comment_record(record, comment, capture) {
            Ok(comment_record) => comment_record,
            Err(err) => {
                // replies cannot be attached without their parent's id
                scrape_debug!("Skipping comment on {}: {}", record.id, err);
                continue;
            }
        };
        let replies: Vec<_> = comment
            .answers
            .iter()
            .filter_map(|answer| match build_reply_record(&comment_record, answer, capture) {
                Ok(reply) => Some(reply),
                Err(err) => {
                    scrape_debug!("Skipping reply on {}: {}", comment_record.id, err);
                    None
                }
            })
            .collect();
        responses.push(comment_record);
        responses.extend(replies);
    }
    responses
}
