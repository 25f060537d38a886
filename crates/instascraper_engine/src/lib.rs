//! Scraper engine: worker thread, provider seam, records and export.
mod apify;
mod cancel;
mod events;
mod export;
mod media;
mod persist;
mod query;
mod rate_limit;
mod record;
mod source;
mod types;
mod wire;
mod worker;

pub use apify::{ApifyPostSource, ApifySettings};
pub use cancel::{CancelToken, Interrupted};
pub use events::{ChannelEventSink, EventSink};
pub use export::{
    export_header, export_records, read_records, ExportError, ExportSummary, ExportedRow,
};
pub use media::{files_folder_name, MediaStore};
pub use persist::{check_writable, ensure_output_dir, AtomicFileWriter, PersistError};
pub use query::{parse_queries, ParsedQueries, Query, QueryError};
pub use rate_limit::{RateLimitObserver, RateLimitSignal};
pub use record::{
    build_comment_record, build_post_record, build_reply_record, CaptureColumns, RecordError,
    RecordType, ResultRecord, BASE_COLUMNS, METADATA_FILE_COLUMN, PHOTO_FILE_COLUMN,
};
pub use source::{ClientObserver, PostCursor, PostSource, ProviderComment, ProviderPost};
pub use types::{
    ProviderError, ProviderErrorKind, ScrapeConfiguration, ScrapeEvent, ScrapeOutcome,
    ScrapeStatus, INDETERMINATE_PROGRESS,
};
pub use worker::{run_scrape, ScrapeHandle};
