//! Terminal side of the CLI: progress bar, prompts and result printing.
//!
//! Results go to stdout, everything else (progress, hints, logs) to stderr.

use std::io::{self, BufRead, Write};
use std::process::{Command, Stdio};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use youtube_uploader_core::auth::Prompt;
use youtube_uploader_core::contract::ProgressSink;
use youtube_uploader_core::error::{ApiHint, UploadError};
use youtube_uploader_core::upload::UploadReport;

/// Byte progress of the upload, drawn with indicatif.
pub struct ProgressBarSink {
    bar: ProgressBar,
}

impl ProgressBarSink {
    pub fn new() -> Self {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓▒░ ");
        bar.set_style(style);
        Self { bar }
    }
}

impl Default for ProgressBarSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for ProgressBarSink {
    fn start(&self, total: u64) {
        self.bar.set_length(total);
        self.bar.set_position(0);
        self.bar.enable_steady_tick(Duration::from_millis(100));
    }

    fn advance(&self, sent: u64, _total: u64) {
        self.bar.set_position(sent);
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

/// [`Prompt`] backed by stdin/stdout and the platform's URL opener.
pub struct TerminalPrompt;

impl Prompt for TerminalPrompt {
    fn show(&self, message: &str) {
        println!("{message}");
    }

    fn read_line(&self, question: &str) -> io::Result<String> {
        print!("{question}");
        io::stdout().flush()?;
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        Ok(line.trim_end().to_string())
    }

    fn open_browser(&self, url: &str) -> bool {
        let mut command = if cfg!(target_os = "macos") {
            Command::new("open")
        } else if cfg!(target_os = "windows") {
            let mut c = Command::new("cmd");
            c.args(["/C", "start", ""]);
            c
        } else {
            if std::env::var_os("DISPLAY").is_none() && std::env::var_os("WAYLAND_DISPLAY").is_none() {
                tracing::debug!("No display available, not opening a browser");
                return false;
            }
            Command::new("xdg-open")
        };
        match command
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
        {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(error = %e, "Could not launch a browser");
                false
            }
        }
    }
}

/// Writes the result block shown after a successful upload.
pub fn print_success(out: &mut impl Write, report: &UploadReport) -> io::Result<()> {
    writeln!(out, "✅ Upload successful!")?;
    match serde_json::to_string_pretty(&report.resource) {
        Ok(pretty) => writeln!(out, "Response: {pretty}")?,
        Err(e) => tracing::warn!(error = %e, "Could not render the API response"),
    }
    writeln!(out, "Video ID: {}", report.video_id)?;
    writeln!(out, "Video URL: {}", report.watch_url)
}

/// The hint to print for an error chain, if it carries an API failure.
pub fn hint_for(err: &anyhow::Error) -> Option<ApiHint> {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<UploadError>())
        .and_then(UploadError::hint)
}

pub fn report_error(err: &anyhow::Error) {
    eprintln!("❌ Upload failed: {err:#}");
    if let Some(hint) = hint_for(err) {
        eprintln!();
        eprintln!("{}", hint.headline());
        for line in hint.lines() {
            eprintln!("- {line}");
        }
    }
}
