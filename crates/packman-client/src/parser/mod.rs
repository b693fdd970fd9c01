//! Streaming parser for the package manager's HTML console transcript.
//!
//! The console endpoint writes a pseudo-streaming HTML fragment while an
//! install, uninstall or build runs. The parser classifies it line by line so
//! listeners observe progress as bytes arrive:
//!
//! ```text
//! AwaitingStart --title--> Running --"in Nms."--> done (success)
//!                             |
//!                             +--"Error during processing."--> CollectingFailure --"</pre>"--> done (failure)
//! ```
//!
//! Within `Running` the rules are tried in a fixed order: success line, log
//! fragments, structured message, failure marker. Reordering them changes how
//! ambiguous lines are classified.

use futures::{Stream, StreamExt};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::trace;

use packman_core::error::{PackmanError, PackmanResult};
use packman_core::types::DetailedResponse;

pub mod listener;

pub use listener::{NoopListener, ProgressEvent, ProgressListener, TracingListener};

static TITLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^<body><h2>([^<]*)</h2>").unwrap());

static LOG: Lazy<Regex> = Lazy::new(|| Regex::new(r"^((?:[^<]*<br>)+)").unwrap());

static MESSAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<span class="([^"]*)"><b>([^<]*)</b>&nbsp;([^<(]*)(\([^)]*\))?</span>"#).unwrap()
});

static SUCCESS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^</div><br>(.*) in (\d+)ms\.<br>").unwrap());

const FAILURE_BEGIN: &str = r#"<span class="error">Error during processing.</span><br><code><pre>"#;
const FAILURE_END: &str = "</pre>";

#[derive(Debug)]
enum State {
    AwaitingStart,
    Running,
    CollectingFailure(Vec<String>),
    Done,
}

/// Line-fed transcript parser.
///
/// Feed decoded lines with [`ResponseParser::feed_line`] until it returns a
/// response, then stop reading. [`ResponseParser::finish`] reports an
/// incomplete transcript when the input ran out first.
pub struct ResponseParser<'a> {
    listener: &'a mut dyn ProgressListener,
    state: State,
    progress_errors: Vec<String>,
}

impl<'a> ResponseParser<'a> {
    pub fn new(listener: &'a mut dyn ProgressListener) -> Self {
        Self {
            listener,
            state: State::AwaitingStart,
            progress_errors: Vec::new(),
        }
    }

    /// Whether a terminal line has been seen
    pub fn is_done(&self) -> bool {
        matches!(self.state, State::Done)
    }

    /// Consume one line. Returns the final response when the line is terminal.
    pub fn feed_line(&mut self, line: &str) -> Option<DetailedResponse> {
        if let State::AwaitingStart = self.state {
            if !self.on_awaiting_start(line) {
                return None;
            }
        }

        match self.state {
            State::AwaitingStart | State::Done => None,
            State::Running => self.on_running(line),
            State::CollectingFailure(_) => self.on_collecting_failure(line),
        }
    }

    /// Finish parsing after the input is exhausted
    pub fn finish(self) -> PackmanResult<DetailedResponse> {
        let message = match self.state {
            State::AwaitingStart => "transcript ended before the title line",
            State::Running => "transcript ended without a completion line",
            State::CollectingFailure(_) => "transcript ended inside the failure trace",
            State::Done => "response was already returned",
        };
        Err(PackmanError::IncompleteResponse {
            message: message.to_string(),
        })
    }

    fn on_awaiting_start(&mut self, line: &str) -> bool {
        let Some(caps) = TITLE.captures(line) else {
            return false;
        };
        trace!("transcript started");
        self.listener.on_event(ProgressEvent::Start {
            title: caps[1].to_string(),
        });
        self.state = State::Running;
        true
    }

    fn on_running(&mut self, line: &str) -> Option<DetailedResponse> {
        if let Some(response) = self.match_success(line) {
            return Some(response);
        }

        if !line.starts_with("<span") {
            self.emit_logs(line);
        }

        self.emit_message(line);

        if line.ends_with(FAILURE_BEGIN) {
            trace!("transcript reports a failure");
            self.state = State::CollectingFailure(Vec::new());
        }
        None
    }

    fn on_collecting_failure(&mut self, line: &str) -> Option<DetailedResponse> {
        if line.starts_with(FAILURE_END) {
            let State::CollectingFailure(lines) = std::mem::replace(&mut self.state, State::Done) else {
                return None;
            };
            return Some(DetailedResponse::failed(
                lines,
                std::mem::take(&mut self.progress_errors),
            ));
        }

        if let State::CollectingFailure(lines) = &mut self.state {
            lines.push(line.to_string());
        }
        None
    }

    fn match_success(&mut self, line: &str) -> Option<DetailedResponse> {
        let caps = SUCCESS.captures(line)?;
        let duration = caps[2].parse::<i64>().unwrap_or(-1);
        self.state = State::Done;
        Some(DetailedResponse::succeeded(
            caps[1].to_string(),
            duration,
            std::mem::take(&mut self.progress_errors),
        ))
    }

    fn emit_logs(&mut self, line: &str) {
        let Some(caps) = LOG.captures(line) else {
            return;
        };
        for fragment in caps[1].split("<br>").filter(|f| !f.is_empty()) {
            self.listener.on_event(ProgressEvent::Log {
                line: fragment.to_string(),
            });
        }
    }

    fn emit_message(&mut self, line: &str) {
        let Some(caps) = MESSAGE.captures(line) else {
            return;
        };
        let action = &caps[1];
        let path = &caps[3];

        if action == "E" {
            let detail = caps.get(4).map(|m| m.as_str()).unwrap_or_default();
            self.progress_errors.push(format!("{} {}", path, detail));
            self.listener.on_event(ProgressEvent::Error {
                path: path.trim().to_string(),
                error: strip_parens(detail).to_string(),
            });
        } else if action.chars().count() == 1 {
            self.listener.on_event(ProgressEvent::Progress {
                action: action.to_string(),
                path: path.trim().to_string(),
            });
        } else {
            self.listener.on_event(ProgressEvent::Message {
                text: action.to_string(),
            });
        }
    }
}

fn strip_parens(detail: &str) -> &str {
    detail
        .strip_prefix('(')
        .and_then(|d| d.strip_suffix(')'))
        .unwrap_or(detail)
}

/// Parse a complete transcript held in memory
pub fn parse_lines<I, S>(lines: I, listener: &mut dyn ProgressListener) -> PackmanResult<DetailedResponse>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut parser = ResponseParser::new(listener);
    for line in lines {
        if let Some(response) = parser.feed_line(line.as_ref()) {
            return Ok(response);
        }
    }
    parser.finish()
}

/// Parse a transcript as its lines arrive.
///
/// Stops pulling from `lines` at the first terminal line; errors from the
/// stream are returned as-is.
pub async fn parse_line_stream<S>(lines: S, listener: &mut dyn ProgressListener) -> PackmanResult<DetailedResponse>
where
    S: Stream<Item = PackmanResult<String>>,
{
    futures::pin_mut!(lines);
    let mut parser = ResponseParser::new(listener);
    while let Some(line) = lines.next().await {
        if let Some(response) = parser.feed_line(&line?) {
            return Ok(response);
        }
    }
    parser.finish()
}
