//! Console rendering of transcript progress events.

use std::collections::BTreeMap;
use std::io::{self, Write};

use packman_client::{ProgressEvent, ProgressListener};

use super::colors::ColorSupport;

/// Prints progress events as they are parsed and counts path actions
pub struct ConsoleListener<W: Write + Send = io::Stdout> {
    out: W,
    colors: ColorSupport,
    verbose: bool,
    actions: BTreeMap<String, usize>,
}

impl ConsoleListener {
    pub fn stdout(colors: ColorSupport, verbose: bool) -> Self {
        Self::new(io::stdout(), colors, verbose)
    }
}

impl<W: Write + Send> ConsoleListener<W> {
    pub fn new(out: W, colors: ColorSupport, verbose: bool) -> Self {
        Self {
            out,
            colors,
            verbose,
            actions: BTreeMap::new(),
        }
    }

    /// Count of progress lines per action letter, e.g. `A`, `U`, `D`
    pub fn action_counts(&self) -> &BTreeMap<String, usize> {
        &self.actions
    }

    /// One-line summary such as `A 3, U 1`
    pub fn summary(&self) -> Option<String> {
        if self.actions.is_empty() {
            return None;
        }
        let parts: Vec<String> = self
            .action_counts()
            .iter()
            .map(|(action, count)| format!("{} {}", action, count))
            .collect();
        Some(parts.join(", "))
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn action_color(&self, action: &str) -> String {
        match action {
            "A" => self.colors.green(action),
            "U" => self.colors.yellow(action),
            "D" | "E" => self.colors.red(action),
            _ => self.colors.dim(action),
        }
    }
}

impl<W: Write + Send> ProgressListener for ConsoleListener<W> {
    fn on_event(&mut self, event: ProgressEvent) {
        // A closed stdout must not abort the command mid-transcript.
        let _ = match event {
            ProgressEvent::Start { title } => writeln!(self.out, "{}", self.colors.bold(&title)),
            ProgressEvent::Log { line } if self.verbose => writeln!(self.out, "{}", self.colors.dim(&line)),
            ProgressEvent::Log { .. } => Ok(()),
            ProgressEvent::Progress { action, path } => {
                let line = format!("{} {}", self.action_color(&action), path);
                *self.actions.entry(action).or_default() += 1;
                writeln!(self.out, "{}", line)
            }
            ProgressEvent::Message { text } => writeln!(self.out, "{}", self.colors.dim(&text)),
            ProgressEvent::Error { path, error } => {
                *self.actions.entry("E".to_string()).or_default() += 1;
                writeln!(self.out, "{} {} ({})", self.colors.red("E"), path, error)
            }
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listener(verbose: bool) -> ConsoleListener<Vec<u8>> {
        ConsoleListener::new(Vec::new(), ColorSupport::disabled(), verbose)
    }

    fn feed(listener: &mut ConsoleListener<Vec<u8>>) {
        listener.on_event(ProgressEvent::Start {
            title: "Installing content".to_string(),
        });
        listener.on_event(ProgressEvent::Log {
            line: "Collecting import information...".to_string(),
        });
        listener.on_event(ProgressEvent::Progress {
            action: "A".to_string(),
            path: "/apps/demo".to_string(),
        });
        listener.on_event(ProgressEvent::Progress {
            action: "A".to_string(),
            path: "/apps/demo/components".to_string(),
        });
        listener.on_event(ProgressEvent::Error {
            path: "/apps/demo/config".to_string(),
            error: "javax.jcr.nodetype.ConstraintViolationException".to_string(),
        });
    }

    #[test]
    fn test_console_listener_prints_events() {
        let mut console = listener(false);
        feed(&mut console);
        let output = String::from_utf8(console.into_inner()).unwrap();

        assert_eq!(
            output,
            "Installing content\n\
             A /apps/demo\n\
             A /apps/demo/components\n\
             E /apps/demo/config (javax.jcr.nodetype.ConstraintViolationException)\n"
        );
    }

    #[test]
    fn test_console_listener_shows_log_when_verbose() {
        let mut console = listener(true);
        feed(&mut console);
        let output = String::from_utf8(console.into_inner()).unwrap();

        assert!(output.contains("Collecting import information..."));
    }

    #[test]
    fn test_console_listener_summary() {
        let mut console = listener(false);
        assert_eq!(console.summary(), None);

        feed(&mut console);
        assert_eq!(console.action_counts().get("A"), Some(&2));
        assert_eq!(console.summary().as_deref(), Some("A 2, E 1"));
    }
}
