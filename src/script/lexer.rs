//! Comment stripping and line based segmentation of script buffers.
//!
//! A buffer is first stripped of comments, then split into physical lines.
//! Lines are trimmed and blank lines skipped. A line whose text ends with
//! `;` completes the pending statement unit. Trigger bodies contain
//! terminated statements of their own, so a `CREATE TRIGGER` line switches
//! to a state where everything up to a line beginning with `END;` belongs to
//! one unit.
//!
//! Directive lines (`.echo`, `.read`, `.print`, `.tables`) are only
//! recognized between units. Inside a trigger body they are plain text.

use std::path::PathBuf;

use crate::error::{Error, Result};

// =============================================================================
// Comments
// =============================================================================

/// Removes `/* ... */` block comments and `-- ...` line comments.
///
/// Block comments do not nest and may span lines; an unterminated `/*` is
/// left as is. A line comment also takes the blanks in front of it. Quotes
/// are not tracked, so comment markers inside string literals are stripped
/// too.
pub fn strip_comments(input: &str) -> String {
    let mut text = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find("/*") {
        let Some(len) = rest[start + 2..].find("*/") else {
            break;
        };
        text.push_str(&rest[..start]);
        rest = &rest[start + 2 + len + 2..];
    }
    text.push_str(rest);

    let mut out = String::with_capacity(text.len());
    for line in text.split_inclusive('\n') {
        let (body, newline) = match line.strip_suffix('\n') {
            Some(body) => (body, true),
            None => (line, false),
        };
        match body.find("--") {
            Some(i) => out.push_str(body[..i].trim_end_matches([' ', '\t'])),
            None => out.push_str(body),
        }
        if newline {
            out.push('\n');
        }
    }
    out
}

// =============================================================================
// Directives
// =============================================================================

/// Interpreter command given on a line of its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// `.echo <bool>`: write each statement before running it.
    Echo(bool),
    /// `.read <path>`: run another script file.
    Read(PathBuf),
    /// `.print <text>`: write text followed by a newline.
    Print(String),
    /// `.tables`: list table names.
    Tables,
}

impl Directive {
    /// Parses a trimmed line starting with `.`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownDirective`] for any other directive name.
    /// Names are case sensitive.
    pub fn parse(line: &str) -> Result<Self> {
        let (name, arg) = match line.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (line, ""),
        };
        match name {
            ".echo" => Ok(Self::Echo(parse_bool(arg))),
            ".read" => Ok(Self::Read(PathBuf::from(arg))),
            ".print" => Ok(Self::Print(unquote(arg).to_string())),
            ".tables" => Ok(Self::Tables),
            _ => Err(Error::UnknownDirective {
                line: line.to_string(),
            }),
        }
    }
}

/// Accepts `1`, `t`, `true` and `on` in any case. Everything else is false.
pub fn parse_bool(text: &str) -> bool {
    matches!(
        text.trim().to_ascii_lowercase().as_str(),
        "1" | "t" | "true" | "on"
    )
}

fn unquote(text: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = text.strip_prefix(quote).and_then(|t| t.strip_suffix(quote)) {
            return inner;
        }
    }
    text
}

// =============================================================================
// Segmentation
// =============================================================================

/// One unit of work produced by [`steps`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Directive(Directive),
    /// Statement text, lines joined with `\n`.
    Statement(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Normal,
    InTrigger,
}

/// Iterator over the steps of a comment free buffer.
///
/// Stops after the first error.
#[derive(Debug)]
pub struct Steps<'a> {
    lines: std::str::Lines<'a>,
    state: State,
    pending: Vec<&'a str>,
    done: bool,
}

/// Segments `text` into directives and statement units.
pub fn steps(text: &str) -> Steps<'_> {
    Steps {
        lines: text.lines(),
        state: State::Normal,
        pending: Vec::new(),
        done: false,
    }
}

impl Steps<'_> {
    fn take(&mut self) -> Step {
        Step::Statement(std::mem::take(&mut self.pending).join("\n"))
    }
}

impl Iterator for Steps<'_> {
    type Item = Result<Step>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        while let Some(raw) = self.lines.next() {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }

            match self.state {
                State::InTrigger => {
                    self.pending.push(line);
                    if closes_trigger(line) {
                        self.state = State::Normal;
                        return Some(Ok(self.take()));
                    }
                }
                State::Normal if self.pending.is_empty() && line.starts_with('.') => {
                    let directive = Directive::parse(line);
                    self.done = directive.is_err();
                    return Some(directive.map(Step::Directive));
                }
                State::Normal => {
                    if self.pending.is_empty() && starts_trigger(line) && !ends_trigger(line) {
                        self.state = State::InTrigger;
                        self.pending.push(line);
                        continue;
                    }
                    self.pending.push(line);
                    if line.ends_with(';') {
                        return Some(Ok(self.take()));
                    }
                }
            }
        }

        // Unterminated units go to the engine, which reports the syntax error.
        self.done = true;
        self.state = State::Normal;
        (!self.pending.is_empty()).then(|| Ok(self.take()))
    }
}

/// `CREATE [TEMP|TEMPORARY] TRIGGER ...`
fn starts_trigger(line: &str) -> bool {
    let mut words = line.split_whitespace().map(str::to_ascii_uppercase);
    if words.next().as_deref() != Some("CREATE") {
        return false;
    }
    match words.next().as_deref() {
        Some("TRIGGER") => true,
        Some("TEMP" | "TEMPORARY") => words.next().as_deref() == Some("TRIGGER"),
        _ => false,
    }
}

/// Line begins with `END` followed by `;`.
fn closes_trigger(line: &str) -> bool {
    line.get(..3)
        .is_some_and(|head| head.eq_ignore_ascii_case("END"))
        && line[3..].trim_start().starts_with(';')
}

/// Line ends with the keyword `END` followed by `;`, i.e. a whole trigger
/// on one line.
fn ends_trigger(line: &str) -> bool {
    let Some(body) = line.strip_suffix(';') else {
        return false;
    };
    let body = body.trim_end();
    let split = body.len().saturating_sub(3);
    match (body.get(..split), body.get(split..)) {
        (Some(before), Some(tail)) => {
            tail.eq_ignore_ascii_case("END")
                && !before.ends_with(|c: char| c.is_alphanumeric() || c == '_')
        }
        _ => false,
    }
}
