//! Separator and blank-line canonicalization.
//!
//! CLIs love to draw horizontal rules between sections, and a terminal pane
//! that is redrawn or scrolled tends to accumulate them in runs. [`collapse`]
//! keeps the text readable without touching the substantive lines:
//!
//! - a run of separator lines keeps only its first line
//! - a run of blank lines keeps only its first line
//! - blank lines directly in front of a separator are dropped
//! - separators are cut to a bounded visible width
//!
//! Line endings are normalized first (`\r\n` and lone `\r` become `\n`) so
//! transport-level variance cannot hide a blank or separator line.

use std::borrow::Cow;

use crate::ansi::{strip_ansi, truncate_visible};

/// Width separators are cut to when the caller has no preference.
pub const DEFAULT_SEPARATOR_WIDTH: usize = 40;

/// Rendering options for [`collapse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanonOptions {
    /// Maximum visible characters kept on a separator line.
    pub max_separator_width: usize,
}

impl Default for CanonOptions {
    fn default() -> Self {
        Self {
            max_separator_width: DEFAULT_SEPARATOR_WIDTH,
        }
    }
}

impl CanonOptions {
    pub fn apply(&self, text: &str) -> String {
        collapse(text, self.max_separator_width)
    }
}

/// Classification of a single line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    /// Empty once escapes and surrounding whitespace are removed.
    Blank,
    /// Made only of rule characters.
    Separator,
    Text,
}

fn is_rule_char(c: char) -> bool {
    matches!(
        c,
        '-' | '_'
            | '='
            | '~'
            | '|'
            | '\u{2500}'
            | '\u{2501}'
            | '\u{2502}'
            | '\u{2503}'
            | '\u{2504}'
            | '\u{2505}'
            | '\u{2508}'
            | '\u{2509}'
            | '\u{254C}'
            | '\u{254D}'
            | '\u{2550}'
            | '\u{2574}'
            | '\u{2576}'
            | '\u{2578}'
            | '\u{257A}'
            | '\u{2581}'
            | '\u{2594}'
    )
}

/// Classify one line (without its terminator).
pub fn classify(line: &str) -> LineKind {
    let stripped = strip_ansi(line);
    let trimmed = stripped.trim();
    if trimmed.is_empty() {
        LineKind::Blank
    } else if trimmed.chars().all(is_rule_char) {
        LineKind::Separator
    } else {
        LineKind::Text
    }
}

pub fn is_separator(line: &str) -> bool {
    classify(line) == LineKind::Separator
}

pub fn is_blank(line: &str) -> bool {
    classify(line) == LineKind::Blank
}

fn normalize_newlines(text: &str) -> Cow<'_, str> {
    if !text.contains('\r') {
        return Cow::Borrowed(text);
    }
    Cow::Owned(text.replace("\r\n", "\n").replace('\r', "\n"))
}

/// Split into lines, reporting whether the text ended with a terminator.
/// A final `\n` terminates the last line rather than starting an empty one.
fn split_lines(text: &str) -> (Vec<&str>, bool) {
    if text.is_empty() {
        return (Vec::new(), false);
    }
    match text.strip_suffix('\n') {
        Some(body) => (body.split('\n').collect(), true),
        None => (text.split('\n').collect(), false),
    }
}

fn join_lines<S: AsRef<str>>(lines: &[S], trailing_newline: bool) -> String {
    if lines.is_empty() {
        return String::new();
    }
    let mut out = String::with_capacity(lines.iter().map(|l| l.as_ref().len() + 1).sum());
    for (i, line) in lines.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        out.push_str(line.as_ref());
    }
    if trailing_newline {
        out.push('\n');
    }
    out
}

/// Classify `line` by what [`collapse`] will emit for it: separators are cut
/// to `max_separator_width` first, and a cut separator can end up blank.
fn shape(line: &str, max_separator_width: usize) -> (LineKind, Cow<'_, str>) {
    match classify(line) {
        LineKind::Separator => {
            let cut = truncate_visible(line, max_separator_width);
            (classify(&cut), cut)
        }
        kind => (kind, Cow::Borrowed(line)),
    }
}

/// Canonicalize `text`: collapse separator and blank runs, drop blanks in
/// front of separators, and cut separators to `max_separator_width` visible
/// characters.
///
/// Idempotent: running it again on its own output changes nothing. A width of
/// zero empties separator lines, which then count as blank lines.
pub fn collapse(text: &str, max_separator_width: usize) -> String {
    let text = normalize_newlines(text);
    let (lines, trailing_newline) = split_lines(&text);

    // Truncate up front so the rules below judge each line by what will
    // actually be emitted. A cut separator can end up blank.
    let shaped: Vec<(LineKind, Cow<'_, str>)> = lines
        .iter()
        .map(|&line| shape(line, max_separator_width))
        .collect();

    let mut out: Vec<&str> = Vec::with_capacity(shaped.len());
    let mut last: Option<LineKind> = None;
    // Verdict for the current blank run: (index of first non-blank after the
    // run, its kind). Shared by every blank in the run so the peek stays linear.
    let mut run_lookahead: Option<(usize, Option<LineKind>)> = None;

    for (i, (kind, line)) in shaped.iter().enumerate() {
        match kind {
            LineKind::Separator if last == Some(LineKind::Separator) => continue,
            LineKind::Blank => {
                let next = match run_lookahead {
                    Some((end, next)) if end > i => next,
                    _ => {
                        let end = shaped[i..]
                            .iter()
                            .position(|(k, _)| *k != LineKind::Blank)
                            .map_or(shaped.len(), |offset| i + offset);
                        let next = shaped.get(end).map(|(k, _)| *k);
                        run_lookahead = Some((end, next));
                        next
                    }
                };
                if last == Some(LineKind::Blank) || next == Some(LineKind::Separator) {
                    continue;
                }
            }
            _ => {}
        }
        out.push(line.as_ref());
        last = Some(*kind);
    }

    join_lines(&out, trailing_newline)
}

/// [`collapse`] of the part of `text` that appending more output cannot
/// change.
///
/// The cut falls right after the last complete line that is not blank once
/// shaped. A trailing blank run may still vanish in front of a later
/// separator, and an unterminated last line may still change kind, so both
/// are held back. For any `t` and `s`, `collapse_settled(t, w)` is a prefix of
/// `collapse_settled(t + s, w)`.
pub fn collapse_settled(text: &str, max_separator_width: usize) -> String {
    let text = normalize_newlines(text);
    let mut cut = 0;
    let mut start = 0;
    for end in memchr::memchr_iter(b'\n', text.as_bytes()) {
        if shape(&text[start..end], max_separator_width).0 != LineKind::Blank {
            cut = end + 1;
        }
        start = end + 1;
    }
    collapse(&text[..cut], max_separator_width)
}

/// Drop every separator line, leaving all other lines untouched.
pub fn strip_separators(text: &str) -> String {
    let text = normalize_newlines(text);
    let (lines, trailing_newline) = split_lines(&text);
    let kept: Vec<&str> = lines
        .into_iter()
        .filter(|line| classify(line) != LineKind::Separator)
        .collect();
    join_lines(&kept, trailing_newline)
}

/// Compact plain-text preview for notification cards: the last `max_lines`
/// lines with substance, escapes removed and each line trimmed.
pub fn preview(text: &str, max_lines: usize) -> String {
    let text = normalize_newlines(text);
    let lines: Vec<String> = text
        .split('\n')
        .filter(|line| classify(line) == LineKind::Text)
        .map(|line| strip_ansi(line).trim().to_string())
        .collect();
    let start = lines.len().saturating_sub(max_lines);
    lines[start..].join("\n")
}
