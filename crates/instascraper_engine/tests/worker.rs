use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};

use bytes::Bytes;
use chrono::{TimeZone, Utc};
use instascraper_engine::{
    run_scrape, CancelToken, ClientObserver, EventSink, Interrupted, PostCursor, PostSource,
    ProviderComment, ProviderError, ProviderErrorKind, ProviderPost, Query, RecordType,
    ScrapeConfiguration, ScrapeEvent, ScrapeHandle, ScrapeOutcome, ScrapeStatus,
    INDETERMINATE_PROGRESS, METADATA_FILE_COLUMN, PHOTO_FILE_COLUMN,
};
use pretty_assertions::assert_eq;
use serde_json::json;

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(scrape_logging::initialize_for_tests);
}

#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<ScrapeEvent>>,
}

impl RecordingSink {
    fn events(&self) -> Vec<ScrapeEvent> {
        self.events.lock().unwrap().clone()
    }

    fn logs(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ScrapeEvent::Log(line) => Some(line),
                _ => None,
            })
            .collect()
    }

    fn progress(&self) -> Vec<f64> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ScrapeEvent::Progress(value) => Some(value),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: ScrapeEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Cancels `token` once `after` items were handed out.
#[derive(Clone)]
struct CancelAfter {
    after: usize,
    token: CancelToken,
}

#[derive(Default)]
struct FakeSource {
    posts: HashMap<Query, Result<Vec<ProviderPost>, ProviderError>>,
    failing_after: HashMap<Query, usize>,
    comments: HashMap<String, Result<Vec<ProviderComment>, ProviderError>>,
    rate_limit_notice: Option<String>,
    cancel_on_pull: Option<CancelAfter>,
    cancel_on_comments: Option<CancelToken>,
    cancel_on_download: Option<CancelToken>,
    pulls: Arc<AtomicUsize>,
}

struct FakeCursor {
    items: VecDeque<ProviderPost>,
    fail_when_empty: bool,
    pulls: Arc<AtomicUsize>,
    cancel_on_pull: Option<CancelAfter>,
}

#[async_trait::async_trait]
impl PostCursor for FakeCursor {
    async fn next_post(
        &mut self,
        _observer: &dyn ClientObserver,
    ) -> Option<Result<ProviderPost, ProviderError>> {
        let pulled = self.pulls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(cancel) = &self.cancel_on_pull {
            if pulled >= cancel.after {
                cancel.token.cancel();
            }
        }
        match self.items.pop_front() {
            Some(post) => Some(Ok(post)),
            None if self.fail_when_empty => Some(Err(ProviderError::new(
                ProviderErrorKind::Network,
                "connection reset",
            ))),
            None => None,
        }
    }
}

#[async_trait::async_trait]
impl PostSource for FakeSource {
    async fn discover(
        &self,
        query: &Query,
        _limit: usize,
        observer: &dyn ClientObserver,
    ) -> Result<Box<dyn PostCursor>, ProviderError> {
        if let Some(notice) = &self.rate_limit_notice {
            observer.on_client_error(notice);
        }
        let posts = self
            .posts
            .get(query)
            .cloned()
            .unwrap_or_else(|| Err(ProviderError::new(ProviderErrorKind::NotFound, "no such query")))?;
        let mut items: VecDeque<_> = posts.into();
        let fail_when_empty = match self.failing_after.get(query) {
            Some(keep) => {
                items.truncate(*keep);
                true
            }
            None => false,
        };
        Ok(Box::new(FakeCursor {
            items,
            fail_when_empty,
            pulls: self.pulls.clone(),
            cancel_on_pull: self.cancel_on_pull.clone(),
        }))
    }

    async fn comments(
        &self,
        post: &ProviderPost,
        _observer: &dyn ClientObserver,
    ) -> Result<Vec<ProviderComment>, ProviderError> {
        if let Some(token) = &self.cancel_on_comments {
            token.cancel();
        }
        let key = post.shortcode.clone().unwrap_or_default();
        self.comments.get(&key).cloned().unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn download(
        &self,
        url: &str,
        _observer: &dyn ClientObserver,
    ) -> Result<Bytes, ProviderError> {
        if let Some(token) = &self.cancel_on_download {
            token.cancel();
        }
        Ok(Bytes::from(format!("payload of {url}")))
    }
}

fn post(shortcode: &str, is_video: bool) -> ProviderPost {
    ProviderPost {
        shortcode: Some(shortcode.to_string()),
        caption: Some(format!("caption for {shortcode} @friend")),
        owner_username: Some("owner".to_string()),
        taken_at: Some(Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap()),
        is_video,
        display_url: Some(format!("https://cdn.example/{shortcode}.jpg")),
        video_url: is_video.then(|| format!("https://cdn.example/{shortcode}.mp4")),
        raw: json!({ "shortCode": shortcode }),
        ..ProviderPost::default()
    }
}

fn comment(id: &str, answers: Vec<ProviderComment>) -> ProviderComment {
    ProviderComment {
        id: Some(id.to_string()),
        text: Some(format!("text {id}")),
        owner_username: Some("commenter".to_string()),
        created_at: Some(Utc.with_ymd_and_hms(2024, 1, 3, 0, 0, 0).unwrap()),
        likes_count: Some(1),
        answers,
    }
}

fn config(queries: &[&str], max_items: usize) -> ScrapeConfiguration {
    ScrapeConfiguration {
        queries: queries.iter().map(|q| Query::parse(q).unwrap()).collect(),
        max_items_per_query: max_items,
        scrape_comments: false,
        scrape_files: false,
        scrape_metadata: false,
        output_directory: std::env::temp_dir(),
        output_filename: "instagram-scrape.csv".to_string(),
    }
}

fn tag(name: &str) -> Query {
    Query::Hashtag(name.to_string())
}

#[tokio::test]
async fn discovery_stops_at_items_per_query() {
    init_logging();
    let mut source = FakeSource::default();
    source.posts.insert(
        tag("test"),
        Ok(vec![
            post("a", false),
            post("b", true),
            post("c", false),
            post("d", false),
            post("e", false),
        ]),
    );
    let sink = RecordingSink::default();

    let records = run_scrape(&config(&["#test"], 2), &source, &sink, &CancelToken::new())
        .await
        .unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(source.pulls.load(Ordering::SeqCst), 2);
    assert_eq!(records[0].record_type, RecordType::Picture);
    assert_eq!(records[1].record_type, RecordType::Video);
    for record in &records {
        assert_eq!(record.id, record.thread_id);
        assert_eq!(record.id, record.parent_id);
    }
    assert_eq!(records[1].url, "https://cdn.example/b.mp4");
}

#[tokio::test]
async fn failed_query_does_not_stop_later_queries() {
    init_logging();
    let mut source = FakeSource::default();
    source.posts.insert(tag("ok"), Ok(vec![post("ok1", false)]));
    let sink = RecordingSink::default();

    let records = run_scrape(
        &config(&["@deleted_user", "#ok"], 10),
        &source,
        &sink,
        &CancelToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, "ok1");
    assert!(sink
        .logs()
        .iter()
        .any(|line| line == "Error while retrieving posts for query '@deleted_user'"));
}

#[tokio::test]
async fn mid_stream_error_yields_zero_results_for_that_query() {
    init_logging();
    let mut source = FakeSource::default();
    source
        .posts
        .insert(tag("flaky"), Ok(vec![post("f1", false), post("f2", false)]));
    source.failing_after.insert(tag("flaky"), 1);
    source.posts.insert(tag("ok"), Ok(vec![post("ok1", false)]));
    let sink = RecordingSink::default();

    let records = run_scrape(
        &config(&["#flaky", "#ok"], 10),
        &source,
        &sink,
        &CancelToken::new(),
    )
    .await
    .unwrap();

    let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["ok1"]);
}

#[tokio::test]
async fn every_query_failing_gives_empty_results() {
    init_logging();
    let source = FakeSource::default();
    let sink = RecordingSink::default();

    let records = run_scrape(&config(&["#a", "@b"], 5), &source, &sink, &CancelToken::new())
        .await
        .unwrap();

    assert!(records.is_empty());
    assert_eq!(sink.progress(), vec![INDETERMINATE_PROGRESS]);
}

#[tokio::test]
async fn progress_is_monotonic_and_ends_at_one() {
    init_logging();
    let mut source = FakeSource::default();
    source.posts.insert(
        tag("x"),
        Ok(vec![post("1", false), post("2", false), post("3", false)]),
    );
    let sink = RecordingSink::default();

    run_scrape(&config(&["#x"], 10), &source, &sink, &CancelToken::new())
        .await
        .unwrap();

    let progress = sink.progress();
    assert_eq!(progress[0], INDETERMINATE_PROGRESS);
    let fractions = &progress[1..];
    assert_eq!(fractions.len(), 3);
    assert!(fractions.windows(2).all(|pair| pair[0] <= pair[1]));
    assert_eq!(fractions.last().copied(), Some(1.0));
}

#[tokio::test]
async fn comments_and_replies_follow_their_post() {
    init_logging();
    let mut source = FakeSource::default();
    source
        .posts
        .insert(tag("x"), Ok(vec![post("p1", false), post("p2", false)]));
    source.comments.insert(
        "p1".to_string(),
        Ok(vec![
            comment("c1", vec![comment("r1", Vec::new()), comment("r2", Vec::new())]),
            comment("c2", Vec::new()),
        ]),
    );
    let mut config = config(&["#x"], 10);
    config.scrape_comments = true;
    let sink = RecordingSink::default();

    let records = run_scrape(&config, &source, &sink, &CancelToken::new())
        .await
        .unwrap();

    let shape: Vec<_> = records
        .iter()
        .map(|r| (r.id.as_str(), r.parent_id.as_str(), r.thread_id.as_str()))
        .collect();
    assert_eq!(
        shape,
        vec![
            ("p1", "p1", "p1"),
            ("c1", "p1", "p1"),
            ("r1", "c1", "p1"),
            ("r2", "c1", "p1"),
            ("c2", "p1", "p1"),
            ("p2", "p2", "p2"),
        ]
    );
    assert_eq!(records[1].num_comments, 2);
    assert!(sink
        .logs()
        .contains(&"Downloading post and comments p1, 1/2".to_string()));
}

#[tokio::test]
async fn comment_fetch_error_keeps_the_post() {
    init_logging();
    let mut source = FakeSource::default();
    source.posts.insert(tag("x"), Ok(vec![post("p1", false)]));
    source.comments.insert(
        "p1".to_string(),
        Err(ProviderError::new(ProviderErrorKind::NotFound, "gone")),
    );
    let mut config = config(&["#x"], 10);
    config.scrape_comments = true;
    let sink = RecordingSink::default();

    let records = run_scrape(&config, &source, &sink, &CancelToken::new())
        .await
        .unwrap();

    assert_eq!(records.len(), 1);
    assert!(sink
        .logs()
        .contains(&"Could not retrieve comments for post p1".to_string()));
}

#[tokio::test]
async fn malformed_post_is_skipped() {
    init_logging();
    let mut broken = post("bad", false);
    broken.taken_at = None;
    let mut source = FakeSource::default();
    source
        .posts
        .insert(tag("x"), Ok(vec![broken, post("good", false)]));
    let sink = RecordingSink::default();

    let records = run_scrape(&config(&["#x"], 10), &source, &sink, &CancelToken::new())
        .await
        .unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, "good");
    assert_eq!(sink.progress().last().copied(), Some(1.0));
}

#[tokio::test]
async fn cancellation_during_discovery_discards_everything() {
    init_logging();
    let token = CancelToken::new();
    let mut source = FakeSource::default();
    source.posts.insert(
        tag("x"),
        Ok(vec![post("1", false), post("2", false), post("3", false)]),
    );
    source.cancel_on_pull = Some(CancelAfter {
        after: 1,
        token: token.clone(),
    });
    let sink = RecordingSink::default();

    let result = run_scrape(&config(&["#x"], 10), &source, &sink, &token).await;

    assert_eq!(result, Err(Interrupted));
    assert_eq!(source.pulls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn cancellation_before_comment_expansion_interrupts() {
    init_logging();
    let token = CancelToken::new();
    let mut source = FakeSource::default();
    source
        .posts
        .insert(tag("x"), Ok(vec![post("p1", false), post("p2", false)]));
    source.cancel_on_comments = Some(token.clone());
    let mut config = config(&["#x"], 10);
    config.scrape_comments = true;
    let sink = RecordingSink::default();

    let result = run_scrape(&config, &source, &sink, &token).await;

    assert_eq!(result, Err(Interrupted));
    assert!(!sink
        .logs()
        .iter()
        .any(|line| line.starts_with("Downloading post and comments p2")));
}

#[tokio::test]
async fn cancellation_between_posts_interrupts_enumeration() {
    init_logging();
    let temp = tempfile::TempDir::new().unwrap();
    let token = CancelToken::new();
    let mut source = FakeSource::default();
    source.posts.insert(
        tag("x"),
        Ok(vec![post("p1", false), post("p2", false), post("p3", false)]),
    );
    source.cancel_on_download = Some(token.clone());
    let mut config = config(&["#x"], 10);
    config.scrape_files = true;
    config.output_directory = temp.path().to_path_buf();
    let sink = RecordingSink::default();

    let result = run_scrape(&config, &source, &sink, &token).await;

    assert_eq!(result, Err(Interrupted));
    let downloads: Vec<_> = sink
        .logs()
        .into_iter()
        .filter(|line| line.starts_with("Downloading post"))
        .collect();
    assert_eq!(downloads, vec!["Downloading post p1, 1/3".to_string()]);
}

#[tokio::test]
async fn rate_limit_notice_reaches_the_ui_log() {
    init_logging();
    let mut source = FakeSource::default();
    source.posts.insert(tag("x"), Ok(vec![post("1", false)]));
    source.rate_limit_notice = Some(
        "429 Too Many Requests. The request will be retried in 60 seconds, at 10:11:12."
            .to_string(),
    );
    let sink = RecordingSink::default();

    run_scrape(&config(&["#x"], 1), &source, &sink, &CancelToken::new())
        .await
        .unwrap();

    assert!(sink.logs().contains(
        &"Uh oh, Instagram noticed us! Waiting until 10:11:12 before continuing...".to_string()
    ));
}

#[tokio::test]
async fn file_capture_writes_media_and_metadata() {
    init_logging();
    let temp = tempfile::TempDir::new().unwrap();
    let mut source = FakeSource::default();
    source
        .posts
        .insert(tag("x"), Ok(vec![post("pic", false), post("vid", true)]));
    source
        .comments
        .insert("pic".to_string(), Ok(vec![comment("c1", Vec::new())]));
    let mut config = config(&["#x"], 10);
    config.scrape_files = true;
    config.scrape_metadata = true;
    config.scrape_comments = true;
    config.output_directory = temp.path().to_path_buf();
    let sink = RecordingSink::default();

    let records = run_scrape(&config, &source, &sink, &CancelToken::new())
        .await
        .unwrap();

    let folder = temp.path().join("instagram-scrape");
    let photo = folder.join("pic.jpg");
    let video = folder.join("vid.mp4");
    assert_eq!(
        std::fs::read_to_string(&photo).unwrap(),
        "payload of https://cdn.example/pic.jpg"
    );
    assert!(video.is_file());
    assert!(folder.join("vid.json").is_file());

    assert_eq!(records[0].value(PHOTO_FILE_COLUMN), Some(photo.display().to_string()));
    assert_eq!(
        records[0].value(METADATA_FILE_COLUMN),
        Some(folder.join("pic.json").display().to_string())
    );
    // the comment row carries the columns but no files
    assert_eq!(records[1].record_type, RecordType::Comment);
    assert_eq!(records[1].value(PHOTO_FILE_COLUMN), Some(String::new()));
    assert_eq!(records[1].value(METADATA_FILE_COLUMN), Some(String::new()));
}

#[test]
fn handle_reports_done_then_hands_over_results() {
    init_logging();
    let mut source = FakeSource::default();
    source.posts.insert(tag("x"), Ok(vec![post("1", false)]));
    let sink = Arc::new(RecordingSink::default());

    let handle = ScrapeHandle::start(config(&["#x"], 5), Arc::new(source), sink.clone());
    let outcome = handle.join();

    let records = outcome.into_records().expect("completed run");
    assert_eq!(records.len(), 1);
    assert_eq!(
        sink.events().last(),
        Some(&ScrapeEvent::Status(ScrapeStatus::Done))
    );
}

#[test]
fn handle_cancel_yields_interrupted_without_results() {
    init_logging();
    let mut source = FakeSource::default();
    source.posts.insert(tag("x"), Ok(vec![post("1", false)]));
    let sink = Arc::new(RecordingSink::default());

    let handle = ScrapeHandle::start(config(&["#x"], 5), Arc::new(source), sink.clone());
    handle.cancel();
    let outcome = handle.join();

    // the run may have finished before the flag was seen
    match outcome {
        ScrapeOutcome::Interrupted => assert_eq!(
            sink.events().last(),
            Some(&ScrapeEvent::Status(ScrapeStatus::Interrupted))
        ),
        ScrapeOutcome::Completed(records) => {
            assert_eq!(records.len(), 1);
            assert_eq!(
                sink.events().last(),
                Some(&ScrapeEvent::Status(ScrapeStatus::Done))
            );
        }
    }
}

#[test]
fn pre_cancelled_token_interrupts_deterministically() {
    init_logging();
    let token = CancelToken::new();
    token.cancel();
    let mut source = FakeSource::default();
    source.posts.insert(tag("x"), Ok(vec![post("1", false)]));
    let sink = RecordingSink::default();

    let runtime = tokio::runtime::Runtime::new().unwrap();
    let result = runtime.block_on(run_scrape(&config(&["#x"], 5), &source, &sink, &token));

    assert_eq!(result, Err(Interrupted));
    assert_eq!(source.pulls.load(Ordering::SeqCst), 0);
}
