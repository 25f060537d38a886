//! Terminal stand-ins for the window's buttons and fields.
use instascraper_core::Msg;

pub const HELP: &str = "Commands: stop | retry | dir <path> | quit";

/// Maps one line typed on stdin to a controller message.
pub fn parse_command(line: &str) -> Option<Msg> {
    let line = line.trim();
    let (command, rest) = line
        .split_once(char::is_whitespace)
        .map(|(command, rest)| (command, rest.trim()))
        .unwrap_or((line, ""));
    match (command.to_ascii_lowercase().as_str(), rest) {
        ("stop" | "s", "") => Some(Msg::ScrapeButtonClicked),
        ("retry" | "r", "") => Some(Msg::RetryExportClicked),
        ("quit" | "q" | "exit", "") => Some(Msg::QuitRequested),
        ("dir", path) if !path.is_empty() => Some(Msg::OutputDirChanged(path.to_string())),
        _ => None,
    }
}
