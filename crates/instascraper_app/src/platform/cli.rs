use std::time::Duration;

use clap::{Parser, ValueEnum};
use instascraper_core::SettingsSnapshot;
use instascraper_engine::ApifySettings;

use super::logging::LogDestination;

#[derive(Debug, Parser)]
#[command(
    name = "instascraper",
    about = "Scrape Instagram posts and comments for hashtags and profiles into a CSV file"
)]
pub struct Cli {
    /// `#tag` or `@handle`; repeat for several. Replaces the saved query list.
    #[arg(long = "query", short = 'q')]
    pub queries: Vec<String>,

    /// Posts to retrieve per query.
    #[arg(long)]
    pub items: Option<String>,

    /// Also scrape comments and their replies.
    #[arg(long)]
    pub comments: bool,

    /// Download each post's photo or video.
    #[arg(long)]
    pub files: bool,

    /// Save each post's raw metadata document.
    #[arg(long)]
    pub metadata: bool,

    #[arg(long)]
    pub output_dir: Option<String>,

    #[arg(long)]
    pub output_file: Option<String>,

    #[arg(long, env = "APIFY_TOKEN", hide_env_values = true)]
    pub apify_token: String,

    #[arg(long, default_value = "https://api.apify.com/v2")]
    pub apify_base_url: String,

    /// Seconds before a single Apify request is abandoned.
    #[arg(long, default_value_t = 60)]
    pub request_timeout: u64,

    #[arg(long, value_enum, default_value_t = LogTarget::File)]
    pub log: LogTarget,

    /// trace, debug, info, warn, error or off.
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogTarget {
    Terminal,
    File,
    Both,
}

impl Cli {
    /// Flags given on the command line win over the restored form.
    pub fn apply(&self, mut settings: SettingsSnapshot) -> SettingsSnapshot {
        if !self.queries.is_empty() {
            settings.query_text = self.queries.join("\n");
        }
        if let Some(items) = &self.items {
            settings.items_per_query = items.clone();
        }
        settings.scrape_comments |= self.comments;
        settings.scrape_files |= self.files;
        settings.scrape_metadata |= self.metadata;
        if let Some(dir) = &self.output_dir {
            settings.output_directory = dir.clone();
        }
        if let Some(file) = &self.output_file {
            settings.output_filename = file.clone();
        }
        settings
    }

    pub fn apify_settings(&self) -> ApifySettings {
        ApifySettings {
            base_url: self.apify_base_url.clone(),
            token: self.apify_token.clone(),
            request_timeout: Duration::from_secs(self.request_timeout),
            ..ApifySettings::default()
        }
    }

    pub fn log_destination(&self) -> LogDestination {
        match self.log {
            LogTarget::Terminal => LogDestination::Terminal,
            LogTarget::File => LogDestination::File,
            LogTarget::Both => LogDestination::Both,
        }
    }
}
