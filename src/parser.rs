//! Line-level structure: `;` segments, `&` units, `|` stages and `<`/`>` redirections.
//!
//! Everything here produces owned values. Nothing is executed and no string is
//! edited in place; the dispatcher consumes the results once.

use crate::errors::{Result, ShellError};
use crate::lexer::{contains_unquoted, split_unquoted};

/// One dispatchable piece of a segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unit {
    pub text: String,
    /// True iff the unit was terminated by `&`.
    pub background: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Segment {
    pub units: Vec<Unit>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandLine {
    pub segments: Vec<Segment>,
}

/// Split a raw line into sequential segments and their units.
///
/// `a & b & c` gives `a` and `b` as background units and `c` as foreground.
/// Empty units (`a ; ; b`, a trailing `&`) are dropped.
pub fn parse_line(line: &str) -> CommandLine {
    let segments = split_unquoted(line.trim(), ';')
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(parse_segment)
        .filter(|s| !s.units.is_empty())
        .collect();
    CommandLine { segments }
}

fn parse_segment(segment: &str) -> Segment {
    let parts = split_unquoted(segment, '&');
    let last = parts.len() - 1;
    let units = parts
        .into_iter()
        .enumerate()
        .filter_map(|(i, part)| {
            let text = part.trim();
            (!text.is_empty()).then(|| Unit {
                text: text.to_string(),
                background: i < last,
            })
        })
        .collect();
    Segment { units }
}

/// Whether the unit contains an unquoted `|`.
pub fn is_pipeline(unit: &str) -> bool {
    contains_unquoted(unit, '|')
}

pub fn is_redirection(unit: &str) -> bool {
    contains_unquoted(unit, '<') || contains_unquoted(unit, '>')
}

/// Raw stage strings of a pipeline, trimmed. Empty stages are kept so the
/// pipeline builder can reject them.
pub fn split_pipeline(unit: &str) -> Vec<String> {
    split_unquoted(unit, '|')
        .into_iter()
        .map(|s| s.trim().to_string())
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectKind {
    /// `>`: create or truncate.
    Output,
    /// `>>`: create or append.
    Append,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputTarget {
    pub path: String,
    pub kind: RedirectKind,
}

/// A command with its redirection syntax pulled out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectSpec {
    pub input: Option<String>,
    pub output: Option<OutputTarget>,
    /// The command text with every operator and target removed. Quoting
    /// inside the command is left untouched.
    pub command: String,
}

/// Extract `< in`, `> out` and `>> out` from a unit.
///
/// The last operator of each direction wins. A target follows the same
/// quoting rule as the tokenizer, so `> "a b.txt"` names one file.
///
/// # Arguments
///
/// * `unit` - One unit of a command line that contains an unquoted `<` or `>`.
///
/// # Returns
///
/// * `Result<RedirectSpec>` - The targets and the remaining command text, or
///   `ShellError::Usage` when an operator has no target word.
pub fn parse_redirection(unit: &str) -> Result<RedirectSpec> {
    let mut input = None;
    let mut output = None;
    let mut command = String::with_capacity(unit.len());

    let mut chars = unit.chars().peekable();
    let mut quoted = false;
    while let Some(ch) = chars.next() {
        if ch == '\'' || ch == '"' {
            quoted = !quoted;
            command.push(ch);
            continue;
        }
        if quoted || (ch != '<' && ch != '>') {
            command.push(ch);
            continue;
        }

        let kind = if ch == '>' && chars.peek() == Some(&'>') {
            chars.next();
            Some(RedirectKind::Append)
        } else if ch == '>' {
            Some(RedirectKind::Output)
        } else {
            None
        };

        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        let mut target = String::new();
        let mut target_quoted = false;
        while let Some(c) = chars.next_if(|c| {
            target_quoted || (!c.is_whitespace() && *c != '<' && *c != '>')
        }) {
            if c == '\'' || c == '"' {
                target_quoted = !target_quoted;
            } else {
                target.push(c);
            }
        }
        if target.is_empty() {
            return Err(ShellError::usage(format!(
                "Missing file name after '{}'",
                if kind.is_some() { '>' } else { '<' }
            )));
        }

        match kind {
            Some(kind) => output = Some(OutputTarget { path: target, kind }),
            None => input = Some(target),
        }
        command.push(' ');
    }

    Ok(RedirectSpec {
        input,
        output,
        command: command.trim().to_string(),
    })
}
