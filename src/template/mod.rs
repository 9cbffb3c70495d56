//! Destination-name templates — render per-item names from bracket tokens.
//!
//! A [`NameTemplate`] turns a pattern string into a concrete destination name
//! (a message label or a filename) for one transferred item. The following
//! tokens are recognized, case-sensitively:
//!
//! | Token                              | Replacement                                   |
//! |------------------------------------|-----------------------------------------------|
//! | `[yyyy]` `[MM]` `[dd]`             | Zero-padded year, month, day of the timestamp |
//! | `[HH]` `[mm]` `[ss]` `[fff]`       | Zero-padded hour, minute, second, millisecond |
//! | `[Task.Name]`                      | Name of the owning task                       |
//! | `[Source.Name]`                    | Original filename or message label            |
//! | `[GUID]`                           | A freshly generated UUID (new per occurrence) |
//! | `[n]`                              | Item sequence number, plain decimal           |
//! | `[n1]` .. `[n8]`                   | Sequence number zero-padded to that width     |
//!
//! Rendering is a single left-to-right pass: substituted output is never
//! re-scanned, so a source name containing `[GUID]` cannot smuggle a second
//! substitution into the result. Unrecognized bracket tokens (and any `[`
//! without a matching `]`) pass through verbatim. There is no escaping
//! mechanism and rendering never fails.

use chrono::{DateTime, Datelike, Local, Timelike};
use uuid::Uuid;

/// The default destination-name template, applied when a task leaves the
/// template unset.
pub const DEFAULT_NAME_TEMPLATE: &str = "msg-[yyyy][MM][dd]-[HH][mm][ss]-[fff]-[n4].xml";

/// Per-item inputs consumed by [`NameTemplate::render`].
///
/// One context is built fresh for every item of an invocation; nothing in it
/// is ever stored back onto the task definition.
#[derive(Debug, Clone)]
pub struct RenderContext<'a> {
    /// Wall-clock timestamp the batch started at.
    pub timestamp: DateTime<Local>,
    /// Zero-based position of this item within the current invocation.
    pub sequence: u32,
    /// Original filename or message label picked up from the source.
    pub source_name: &'a str,
    /// Name of the task performing the transfer.
    pub task_name: &'a str,
}

/// A compiled-in-spirit destination-name template.
///
/// The pattern is stored as-is; all the work happens in [`render`], which is
/// cheap enough for per-item use.
///
/// # Examples
///
/// ```
/// use chrono::{Local, TimeZone};
/// use mqbridge::template::{NameTemplate, RenderContext};
///
/// let template = NameTemplate::new("[Task.Name]-[n3].xml");
/// let name = template.render(&RenderContext {
///     timestamp: Local.with_ymd_and_hms(2024, 4, 8, 12, 0, 0).unwrap(),
///     sequence: 7,
///     source_name: "input.xml",
///     task_name: "archive",
/// });
/// assert_eq!(name, "archive-007.xml");
/// ```
///
/// [`render`]: NameTemplate::render
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameTemplate {
    pattern: String,
}

impl NameTemplate {
    /// Creates a template from a pattern string.
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
        }
    }

    /// Returns the raw pattern string.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Renders the template against `ctx`, producing a destination name.
    ///
    /// Each `[GUID]` occurrence yields a distinct value. `[nK]` pads to a
    /// minimum width of `K` digits and never truncates a wider sequence
    /// number.
    pub fn render(&self, ctx: &RenderContext<'_>) -> String {
        let mut out = String::with_capacity(self.pattern.len());
        let mut rest = self.pattern.as_str();

        while let Some(open) = rest.find('[') {
            out.push_str(&rest[..open]);
            let after_open = &rest[open + 1..];

            match after_open.find(']') {
                Some(close) => {
                    let token = &after_open[..close];
                    match substitute(token, ctx) {
                        Some(replacement) => {
                            out.push_str(&replacement);
                            rest = &after_open[close + 1..];
                        }
                        None => {
                            // Not a recognized token; emit the bracket and
                            // keep scanning from the next character so a
                            // token starting later still matches.
                            out.push('[');
                            rest = after_open;
                        }
                    }
                }
                None => {
                    // Unmatched '[' — the remainder is literal.
                    out.push('[');
                    rest = after_open;
                }
            }
        }

        out.push_str(rest);
        out
    }
}

impl std::fmt::Display for NameTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.pattern)
    }
}

// Replacement text for one bracket token, or `None` if the token is unknown.
fn substitute(token: &str, ctx: &RenderContext<'_>) -> Option<String> {
    let ts = &ctx.timestamp;
    Some(match token {
        "yyyy" => format!("{:04}", ts.year()),
        "MM" => format!("{:02}", ts.month()),
        "dd" => format!("{:02}", ts.day()),
        "HH" => format!("{:02}", ts.hour()),
        "mm" => format!("{:02}", ts.minute()),
        "ss" => format!("{:02}", ts.second()),
        "fff" => format!("{:03}", ts.timestamp_subsec_millis()),
        "Task.Name" => ctx.task_name.to_owned(),
        "Source.Name" => ctx.source_name.to_owned(),
        "GUID" => Uuid::new_v4().to_string(),
        "n" => ctx.sequence.to_string(),
        _ => {
            let width = padded_width(token)?;
            format!("{:0width$}", ctx.sequence)
        }
    })
}

// Width of an `[nK]` token for K in 1..=8, or `None` for anything else.
fn padded_width(token: &str) -> Option<usize> {
    let digit = token.strip_prefix('n')?;
    match digit {
        "1" => Some(1),
        "2" => Some(2),
        "3" => Some(3),
        "4" => Some(4),
        "5" => Some(5),
        "6" => Some(6),
        "7" => Some(7),
        "8" => Some(8),
        _ => None,
    }
}
