use std::io::{self, Write};

use instascraper_core::{AppViewModel, ProgressView, SessionState};

const BAR_WIDTH: usize = 30;
/// Carriage return plus ANSI "erase line".
const CLEAR_LINE: &str = "\r\x1b[2K";

/// Prints the view model as a scrolling log with the status line kept
/// below it. The status line is redrawn in place, never scrolled.
pub struct TerminalRenderer<W: Write> {
    out: W,
    printed_lines: usize,
    last_status: Option<String>,
    pulse: usize,
}

impl<W: Write> TerminalRenderer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            printed_lines: 0,
            last_status: None,
            pulse: 0,
        }
    }

    pub fn render(&mut self, view: &AppViewModel) -> io::Result<()> {
        let status = status_line(view, self.pulse);
        let has_new_lines = view.log_lines.len() > self.printed_lines;
        if !has_new_lines && self.last_status.as_deref() == Some(status.as_str()) {
            return Ok(());
        }

        write!(self.out, "{CLEAR_LINE}")?;
        // the log only ever grows
        for line in view.log_lines.iter().skip(self.printed_lines) {
            writeln!(self.out, "{line}")?;
        }
        self.printed_lines = view.log_lines.len();
        write!(self.out, "{status}")?;
        self.last_status = Some(status);
        self.out.flush()
    }

    /// Advances the indeterminate bar; called on ticks while pulsing.
    pub fn pulse(&mut self, view: &AppViewModel) -> io::Result<()> {
        if view.progress != ProgressView::Pulsing {
            return Ok(());
        }
        self.pulse = self.pulse.wrapping_add(1);
        self.render(view)
    }

    /// Leaves the cursor on a fresh line below the status line.
    pub fn finish(&mut self) -> io::Result<()> {
        if self.last_status.take().is_some() {
            writeln!(self.out)?;
        }
        self.out.flush()
    }
}

pub fn status_line(view: &AppViewModel, pulse: usize) -> String {
    let session = match view.session {
        SessionState::Idle => "Idle",
        SessionState::Scraping => "Scraping",
        SessionState::Stopping => "Stopping",
    };
    let mut status = format!("[{session}]");
    let progress = progress_text(view.progress, pulse);
    if !progress.is_empty() {
        status.push(' ');
        status.push_str(&progress);
    }
    if view.export_retry_available {
        status.push_str(" | type `retry` to write the results again, `dir <path>` to change folder");
    }
    status
}

pub fn progress_text(progress: ProgressView, pulse: usize) -> String {
    match progress {
        ProgressView::Disabled => String::new(),
        ProgressView::Pulsing => {
            let position = pulse % BAR_WIDTH;
            let bar: String = (0..BAR_WIDTH)
                .map(|i| if i == position { '#' } else { '-' })
                .collect();
            format!("[{bar}]")
        }
        ProgressView::Fraction(fraction) => {
            let fraction = fraction.clamp(0.0, 1.0);
            let filled = (fraction * BAR_WIDTH as f64).round() as usize;
            format!(
                "[{}{}] {:>3.0}%",
                "#".repeat(filled),
                "-".repeat(BAR_WIDTH - filled),
                fraction * 100.0
            )
        }
    }
}
