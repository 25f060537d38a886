use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::{Local, TimeDelta};
use futures_util::StreamExt;
use reqwest::header::RETRY_AFTER;
use reqwest::{RequestBuilder, Response, StatusCode};
use scrape_logging::{scrape_debug, scrape_info};
use serde::Serialize;

use crate::wire::{
    ApiResponse, CommentInput, HashtagInput, InstagramComment, InstagramPost, ProfileInput,
    RunData,
};
use crate::{
    ClientObserver, PostCursor, PostSource, ProviderComment, ProviderError, ProviderErrorKind,
    ProviderPost, Query,
};

const HASHTAG_SCRAPER: &str = "apify~instagram-hashtag-scraper";
const PROFILE_SCRAPER: &str = "apify~instagram-post-scraper";
const COMMENT_SCRAPER: &str = "apify~instagram-comment-scraper";
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct ApifySettings {
    pub base_url: String,
    pub token: String,
    pub request_timeout: Duration,
    /// Dataset items fetched per page while a cursor is drained.
    pub page_size: usize,
    pub max_rate_limit_retries: u32,
    pub max_media_bytes: u64,
    pub comments_limit: usize,
}

impl Default for ApifySettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.apify.com/v2".to_string(),
            token: String::new(),
            request_timeout: Duration::from_secs(60),
            page_size: 50,
            max_rate_limit_retries: 5,
            max_media_bytes: 50 * 1024 * 1024,
            comments_limit: 500,
        }
    }
}

/// Post provider backed by Apify's Instagram actors.
#[derive(Clone)]
pub struct ApifyPostSource {
    api: ApifyApi,
}

impl ApifyPostSource {
    pub fn new(settings: ApifySettings) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .map_err(map_reqwest_error)?;
        Ok(Self {
            api: ApifyApi {
                client,
                settings: Arc::new(settings),
            },
        })
    }
}

#[derive(Clone)]
struct ApifyApi {
    client: reqwest::Client,
    settings: Arc<ApifySettings>,
}

impl ApifyApi {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.settings.base_url.trim_end_matches('/'), path)
    }

    /// Sends a request, sleeping through 429 responses as the server asks.
    async fn send(
        &self,
        build: impl Fn() -> RequestBuilder + Send,
        observer: &dyn ClientObserver,
    ) -> Result<Response, ProviderError> {
        let mut retries = 0;
        loop {
            let response = build().send().await.map_err(map_reqwest_error)?;
            let status = response.status();
            if status == StatusCode::TOO_MANY_REQUESTS {
                if retries >= self.settings.max_rate_limit_retries {
                    return Err(ProviderError::new(
                        ProviderErrorKind::RateLimited,
                        format!("still rate limited after {retries} retries"),
                    ));
                }
                retries += 1;
                let seconds = retry_after_secs(&response);
                let resume_at = TimeDelta::try_seconds(seconds as i64)
                    .map(|delay| Local::now() + delay)
                    .unwrap_or_else(Local::now);
                observer.on_client_error(&format!(
                    "{status}. The request will be retried in {seconds} seconds, at {}.",
                    resume_at.format("%H:%M:%S")
                ));
                tokio::time::sleep(Duration::from_secs(seconds)).await;
                continue;
            }
            if status == StatusCode::NOT_FOUND {
                return Err(ProviderError::new(ProviderErrorKind::NotFound, status.to_string()));
            }
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                observer.on_client_error(&format!("{status}: {body}"));
                return Err(ProviderError::new(
                    ProviderErrorKind::HttpStatus(status.as_u16()),
                    body,
                ));
            }
            return Ok(response);
        }
    }

    async fn run_actor(
        &self,
        actor: &str,
        input: &(impl Serialize + Sync),
        observer: &dyn ClientObserver,
    ) -> Result<RunData, ProviderError> {
        let start_url = self.url(&format!("/acts/{actor}/runs"));
        let response = self
            .send(
                || {
                    self.client
                        .post(&start_url)
                        .bearer_auth(&self.settings.token)
                        .json(input)
                },
                observer,
            )
            .await?;
        let run = parse_json::<ApiResponse<RunData>>(response).await?.data;
        scrape_info!("Started {} run {}", actor, run.id);
        self.wait_for_run(&run.id, observer).await
    }

    /// Long-polls until the run reaches a terminal status.
    async fn wait_for_run(
        &self,
        run_id: &str,
        observer: &dyn ClientObserver,
    ) -> Result<RunData, ProviderError> {
        let poll_url = self.url(&format!("/actor-runs/{run_id}?waitForFinish=60"));
        loop {
            let response = self
                .send(
                    || self.client.get(&poll_url).bearer_auth(&self.settings.token),
                    observer,
                )
                .await?;
            let run = parse_json::<ApiResponse<RunData>>(response).await?.data;
            match run.status.as_str() {
                "SUCCEEDED" => return Ok(run),
                "FAILED" | "ABORTED" | "TIMED-OUT" => {
                    return Err(ProviderError::new(
                        ProviderErrorKind::RunFailed(run.status.clone()),
                        format!("run {run_id} did not succeed"),
                    ));
                }
                other => scrape_debug!("Run {} still {}", run_id, other),
            }
        }
    }

    async fn dataset_page(
        &self,
        dataset_id: &str,
        offset: usize,
        observer: &dyn ClientObserver,
    ) -> Result<Vec<serde_json::Value>, ProviderError> {
        let page_url = self.url(&format!(
            "/datasets/{dataset_id}/items?format=json&offset={offset}&limit={}",
            self.settings.page_size
        ));
        let response = self
            .send(
                || self.client.get(&page_url).bearer_auth(&self.settings.token),
                observer,
            )
            .await?;
        parse_json(response).await
    }

    async fn download(
        &self,
        url: &str,
        observer: &dyn ClientObserver,
    ) -> Result<Bytes, ProviderError> {
        let max_bytes = self.settings.max_media_bytes;
        let response = self.send(|| self.client.get(url), observer).await?;
        if let Some(length) = response.content_length() {
            if length > max_bytes {
                return Err(too_large(max_bytes, length));
            }
        }

        let mut payload = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            let next_len = payload.len() as u64 + chunk.len() as u64;
            if next_len > max_bytes {
                return Err(too_large(max_bytes, next_len));
            }
            payload.extend_from_slice(&chunk);
        }
        Ok(Bytes::from(payload))
    }
}

/// Pages through a finished run's dataset on demand.
struct DatasetCursor {
    api: ApifyApi,
    dataset_id: String,
    offset: usize,
    buffer: VecDeque<serde_json::Value>,
    exhausted: bool,
}

impl DatasetCursor {
    fn new(api: ApifyApi, dataset_id: String) -> Self {
        Self {
            api,
            dataset_id,
            offset: 0,
            buffer: VecDeque::new(),
            exhausted: false,
        }
    }

    async fn next_item(
        &mut self,
        observer: &dyn ClientObserver,
    ) -> Option<Result<serde_json::Value, ProviderError>> {
        if self.buffer.is_empty() && !self.exhausted {
            match self
                .api
                .dataset_page(&self.dataset_id, self.offset, observer)
                .await
            {
                Ok(items) => {
                    self.exhausted = items.len() < self.api.settings.page_size.max(1);
                    self.offset += items.len();
                    self.buffer.extend(items);
                }
                Err(err) => {
                    self.exhausted = true;
                    return Some(Err(err));
                }
            }
        }
        self.buffer.pop_front().map(Ok)
    }
}

#[async_trait::async_trait]
impl PostCursor for DatasetCursor {
    async fn next_post(
        &mut self,
        observer: &dyn ClientObserver,
    ) -> Option<Result<ProviderPost, ProviderError>> {
        // Items that do not fit the post schema are dropped one at a time.
        loop {
            let item = match self.next_item(observer).await? {
                Ok(item) => item,
                Err(err) => return Some(Err(err)),
            };
            match serde_json::from_value::<InstagramPost>(item.clone()) {
                Ok(post) => return Some(Ok(post.into_provider_post(item))),
                Err(err) => {
                    scrape_debug!(
                        "Skipping malformed item in dataset {}: {}",
                        self.dataset_id,
                        err
                    );
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl PostSource for ApifyPostSource {
    async fn discover(
        &self,
        query: &Query,
        limit: usize,
        observer: &dyn ClientObserver,
    ) -> Result<Box<dyn PostCursor>, ProviderError> {
        let run = match query {
            Query::Profile(handle) => {
                let input = ProfileInput {
                    username: vec![handle.clone()],
                    results_limit: limit,
                };
                self.api.run_actor(PROFILE_SCRAPER, &input, observer).await?
            }
            Query::Hashtag(tag) => {
                let input = HashtagInput {
                    hashtags: vec![tag.clone()],
                    results_limit: limit,
                };
                self.api.run_actor(HASHTAG_SCRAPER, &input, observer).await?
            }
        };
        Ok(Box::new(DatasetCursor::new(
            self.api.clone(),
            run.default_dataset_id,
        )))
    }

    async fn comments(
        &self,
        post: &ProviderPost,
        observer: &dyn ClientObserver,
    ) -> Result<Vec<ProviderComment>, ProviderError> {
        let permalink = match (&post.permalink, &post.shortcode) {
            (Some(url), _) => url.clone(),
            (None, Some(shortcode)) => format!("https://www.instagram.com/p/{shortcode}/"),
            (None, None) => {
                return Err(ProviderError::new(
                    ProviderErrorKind::NotFound,
                    "post has neither permalink nor shortcode",
                ))
            }
        };
        let input = CommentInput {
            direct_urls: vec![permalink],
            results_limit: self.api.settings.comments_limit,
            include_nested_comments: true,
        };
        let run = self.api.run_actor(COMMENT_SCRAPER, &input, observer).await?;

        let mut cursor = DatasetCursor::new(self.api.clone(), run.default_dataset_id);
        let mut comments = Vec::new();
        while let Some(item) = cursor.next_item(observer).await {
            match serde_json::from_value::<InstagramComment>(item?) {
                Ok(comment) => comments.push(ProviderComment::from(comment)),
                Err(err) => scrape_debug!(
                    "Skipping malformed comment on {}: {}",
                    shortcode_label(post),
                    err
                ),
            }
        }
        Ok(comments)
    }

    async fn download(
        &self,
        url: &str,
        observer: &dyn ClientObserver,
    ) -> Result<Bytes, ProviderError> {
        self.api.download(url, observer).await
    }
}

fn shortcode_label(post: &ProviderPost) -> &str {
    post.shortcode.as_deref().unwrap_or("?")
}

async fn parse_json<T: serde::de::DeserializeOwned>(
    response: Response,
) -> Result<T, ProviderError> {
    response
        .json::<T>()
        .await
        .map_err(|err| ProviderError::new(ProviderErrorKind::Parse, err.to_string()))
}

fn retry_after_secs(response: &Response) -> u64 {
    response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(DEFAULT_RETRY_AFTER_SECS)
}

fn too_large(max_bytes: u64, actual: u64) -> ProviderError {
    ProviderError::new(
        ProviderErrorKind::TooLarge {
            max_bytes,
            actual: Some(actual),
        },
        "media payload too large",
    )
}

fn map_reqwest_error(err: reqwest::Error) -> ProviderError {
    ProviderError::new(ProviderErrorKind::Network, err.to_string())
}
