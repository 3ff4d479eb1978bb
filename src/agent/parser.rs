//! Response Parser - pulls directives out of free-form agent replies
//!
//! The agent is told to wrap workspace markup in an `html` fence and
//! terminal commands in a `bash` fence. Extraction is purely syntactic:
//!
//! - only the first fence of each tag is honored
//! - the inner text is trimmed; a whitespace-only block yields `""`
//! - a fence with nothing at all between tag and closing fence is no block
//! - nested or malformed fences are not handled
//! - nothing is validated or sanitized; whoever runs the payload owns that
//!
//! Extra fences of the same tag are dropped, but the parser records a WARN
//! entry with how many were ignored.

use lazy_static::lazy_static;
use regex::Regex;

use crate::logging::{LogLevel, LogSink};
use crate::metrics::DIRECTIVES_EXTRACTED;

/// Log source used for every entry the parser records
pub const LOG_SOURCE: &str = "PARSER";

lazy_static! {
    static ref MARKUP_FENCE: Regex = Regex::new(r"(?s)```html(.*?)```").expect("valid regex");
    static ref COMMAND_FENCE: Regex = Regex::new(r"(?s)```bash(.*?)```").expect("valid regex");
}

/// Payloads extracted from a single reply
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedDirective {
    /// Web workspace markup from the first `html` fence
    pub markup: Option<String>,
    /// Terminal command from the first `bash` fence
    pub command: Option<String>,
}

impl ParsedDirective {
    pub fn is_empty(&self) -> bool {
        self.markup.is_none() && self.command.is_none()
    }
}

/// Extract the first `html` and first `bash` block from `reply`
///
/// Pure function of its input: no callbacks, no logging.
pub fn extract_directives(reply: &str) -> ParsedDirective {
    ParsedDirective {
        markup: first_block(&MARKUP_FENCE, reply),
        command: first_block(&COMMAND_FENCE, reply),
    }
}

fn first_block(fence: &Regex, text: &str) -> Option<String> {
    let inner = fence.captures(text)?.get(1)?.as_str();
    if inner.is_empty() {
        None
    } else {
        Some(inner.trim().to_string())
    }
}

/// Number of fences after the first one that extraction ignores
fn ignored_blocks(fence: &Regex, text: &str) -> usize {
    fence.find_iter(text).count().saturating_sub(1)
}

type Consumer = Box<dyn Fn(&str) + Send + Sync>;

/// Parser that routes extracted payloads to their consumers
///
/// # Example
/// ```ignore
/// let parser = ResponseParser::new(log.clone())
///     .on_markup(|html| workspace.load(html))
///     .on_command(|cmd| terminal.suggest(cmd));
/// let directive = parser.parse(&reply);
/// ```
pub struct ResponseParser {
    log: LogSink,
    markup_consumer: Option<Consumer>,
    command_consumer: Option<Consumer>,
}

impl ResponseParser {
    /// Create a parser without consumers
    pub fn new(log: LogSink) -> Self {
        Self {
            log,
            markup_consumer: None,
            command_consumer: None,
        }
    }

    /// Set the callback receiving extracted markup
    pub fn on_markup<F>(mut self, consumer: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.markup_consumer = Some(Box::new(consumer));
        self
    }

    /// Set the callback receiving extracted commands
    pub fn on_command<F>(mut self, consumer: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.command_consumer = Some(Box::new(consumer));
        self
    }

    /// Extract directives from `reply` and hand each one to its consumer
    ///
    /// Each consumer runs synchronously and at most once per call.
    pub fn parse(&self, reply: &str) -> ParsedDirective {
        let directive = extract_directives(reply);

        if let Some(markup) = &directive.markup {
            if let Some(consumer) = &self.markup_consumer {
                consumer(markup);
            }
            DIRECTIVES_EXTRACTED.with_label_values(&["markup"]).inc();
            self.log.log(
                "Extracted HTML code block from response",
                LogLevel::System,
                LOG_SOURCE,
            );
        }

        if let Some(command) = &directive.command {
            if let Some(consumer) = &self.command_consumer {
                consumer(command);
            }
            DIRECTIVES_EXTRACTED.with_label_values(&["command"]).inc();
            self.log.log(
                format!("Extracted bash command: {}", command),
                LogLevel::System,
                LOG_SOURCE,
            );
        }

        self.report_ignored("html", &MARKUP_FENCE, reply);
        self.report_ignored("bash", &COMMAND_FENCE, reply);

        directive
    }

    fn report_ignored(&self, tag: &str, fence: &Regex, reply: &str) {
        let ignored = ignored_blocks(fence, reply);
        if ignored > 0 {
            self.log.log(
                format!("Ignored {} additional {} block(s); only the first is used", ignored, tag),
                LogLevel::Warn,
                LOG_SOURCE,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Parser whose consumers record every payload they receive
    fn recording_parser(log: LogSink) -> (ResponseParser, Arc<Mutex<Vec<String>>>, Arc<Mutex<Vec<String>>>) {
        let markups = Arc::new(Mutex::new(Vec::new()));
        let commands = Arc::new(Mutex::new(Vec::new()));
        let m = Arc::clone(&markups);
        let c = Arc::clone(&commands);
        let parser = ResponseParser::new(log)
            .on_markup(move |html| m.lock().unwrap().push(html.to_string()))
            .on_command(move |cmd| c.lock().unwrap().push(cmd.to_string()));
        (parser, markups, commands)
    }

    #[test]
    fn test_markup_only() {
        let log = LogSink::new();
        let (parser, markups, commands) = recording_parser(log.clone());

        let directive = parser.parse("Use this:\n```html\n<p>hi</p>\n```");
        assert_eq!(directive.markup.as_deref(), Some("<p>hi</p>"));
        assert!(directive.command.is_none());
        assert_eq!(*markups.lock().unwrap(), vec!["<p>hi</p>".to_string()]);
        assert!(commands.lock().unwrap().is_empty());

        let history = log.history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].level, LogLevel::System);
        assert_eq!(history[0].source, "PARSER");
    }

    #[test]
    fn test_command_only() {
        let log = LogSink::new();
        let (parser, markups, commands) = recording_parser(log.clone());

        let directive = parser.parse("Run:\n```bash\nls -la\n```");
        assert_eq!(directive.command.as_deref(), Some("ls -la"));
        assert!(directive.markup.is_none());
        assert_eq!(*commands.lock().unwrap(), vec!["ls -la".to_string()]);
        assert!(markups.lock().unwrap().is_empty());
        assert_eq!(log.history()[0].message, "Extracted bash command: ls -la");
    }

    #[test]
    fn test_both_blocks() {
        let reply = "Page:\n```html\n<h1>Hi</h1>\n```\nThen serve it:\n```bash\npython -m http.server\n```";
        let directive = extract_directives(reply);
        assert_eq!(directive.markup.as_deref(), Some("<h1>Hi</h1>"));
        assert_eq!(directive.command.as_deref(), Some("python -m http.server"));
    }

    #[test]
    fn test_plain_text_invokes_nothing() {
        let log = LogSink::new();
        let (parser, markups, commands) = recording_parser(log.clone());

        let directive = parser.parse("Nothing to run here. Use `ls` inline if you like.");
        assert!(directive.is_empty());
        assert!(markups.lock().unwrap().is_empty());
        assert!(commands.lock().unwrap().is_empty());
        assert!(log.is_empty());
    }

    #[test]
    fn test_untagged_and_other_fences_ignored() {
        let directive = extract_directives("```\nplain\n```\n```python\nprint(1)\n```");
        assert!(directive.is_empty());
    }

    #[test]
    fn test_only_first_block_per_tag() {
        let log = LogSink::new();
        let (parser, _, commands) = recording_parser(log.clone());

        let reply = "```bash\necho one\n```\nor\n```bash\necho two\n```\nor\n```bash\necho three\n```";
        let directive = parser.parse(reply);
        assert_eq!(directive.command.as_deref(), Some("echo one"));
        assert_eq!(commands.lock().unwrap().len(), 1);

        let warnings: Vec<_> = log
            .history()
            .into_iter()
            .filter(|e| e.level == LogLevel::Warn)
            .collect();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("Ignored 2 additional bash"));
    }

    #[test]
    fn test_whitespace_block_forwards_empty_markup() {
        let log = LogSink::new();
        let (parser, markups, _) = recording_parser(log.clone());

        let directive = parser.parse("Here:\n```html\n   \n```");
        assert_eq!(directive.markup.as_deref(), Some(""));
        assert_eq!(*markups.lock().unwrap(), vec![String::new()]);
        assert_eq!(log.len(), 1);
        assert_eq!(log.history()[0].level, LogLevel::System);
    }

    #[test]
    fn test_empty_first_command_still_counts_as_first() {
        let log = LogSink::new();
        let (parser, _, commands) = recording_parser(log.clone());

        let directive = parser.parse("```bash\n\n```\n```bash\nls\n```");
        assert_eq!(directive.command.as_deref(), Some(""));
        assert_eq!(*commands.lock().unwrap(), vec![String::new()]);
        assert!(log
            .history()
            .iter()
            .any(|e| e.level == LogLevel::Warn && e.message.contains("Ignored 1 additional bash")));
    }

    #[test]
    fn test_fence_without_content_is_a_miss() {
        let log = LogSink::new();
        let (parser, markups, _) = recording_parser(log.clone());

        let directive = parser.parse("```html```");
        assert!(directive.markup.is_none());
        assert!(markups.lock().unwrap().is_empty());
        assert!(log.is_empty());
    }

    #[test]
    fn test_non_greedy_and_inline_tag() {
        // Content directly after the tag, no newline
        let directive = extract_directives("```html<b>x</b>``` trailing ``` text");
        assert_eq!(directive.markup.as_deref(), Some("<b>x</b>"));
    }

    #[test]
    fn test_unterminated_fence_is_a_miss() {
        let directive = extract_directives("```bash\nrm -rf build");
        assert!(directive.command.is_none());
    }

    #[test]
    fn test_parse_is_idempotent() {
        let parser = ResponseParser::new(LogSink::new());
        let reply = "```html\n<div/>\n```\n```bash\nmake\n```";
        assert_eq!(parser.parse(reply), parser.parse(reply));
        assert_eq!(extract_directives(reply), extract_directives(reply));
    }

    #[test]
    fn test_parse_without_consumers() {
        let log = LogSink::new();
        let parser = ResponseParser::new(log.clone());
        let directive = parser.parse("```bash\nuptime\n```");
        assert_eq!(directive.command.as_deref(), Some("uptime"));
        assert_eq!(log.len(), 1);
    }
}
