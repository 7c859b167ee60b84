//! ANSI escape handling for terminal output.
//!
//! Only CSI sequences (`ESC [ <params> <final>`) are recognised. Anything else
//! starting with `ESC`, including a CSI cut short by the end of the input, is
//! ordinary visible text and counts toward width.

use std::borrow::Cow;

const ESC: u8 = 0x1b;

/// One piece of a line: a complete escape sequence or a single visible char.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    Escape(&'a str),
    Char(char),
}

/// Iterator over the [`Segment`]s of a string, in order.
pub struct Segments<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Iterator for Segments<'a> {
    type Item = Segment<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let rest = &self.text[self.pos..];
        let c = rest.chars().next()?;
        if let Some(len) = csi_len(rest.as_bytes()) {
            self.pos += len;
            return Some(Segment::Escape(&rest[..len]));
        }
        self.pos += c.len_utf8();
        Some(Segment::Char(c))
    }
}

/// Split `text` into escape sequences and visible characters.
pub fn segments(text: &str) -> Segments<'_> {
    Segments { text, pos: 0 }
}

/// Byte length of a complete CSI sequence at the start of `bytes`, if any.
///
/// Parameter bytes are `0x30..=0x3F`, intermediates `0x20..=0x2F`, and the
/// sequence ends with one final byte in `0x40..=0x7E`. All of these are ASCII,
/// so the returned length always lands on a char boundary.
fn csi_len(bytes: &[u8]) -> Option<usize> {
    if bytes.len() < 3 || bytes[0] != ESC || bytes[1] != b'[' {
        return None;
    }
    let mut i = 2;
    while i < bytes.len() && (0x30..=0x3f).contains(&bytes[i]) {
        i += 1;
    }
    while i < bytes.len() && (0x20..=0x2f).contains(&bytes[i]) {
        i += 1;
    }
    match bytes.get(i) {
        Some(b) if (0x40..=0x7e).contains(b) => Some(i + 1),
        _ => None,
    }
}

/// Remove every recognised escape sequence from `text`.
pub fn strip_ansi(text: &str) -> Cow<'_, str> {
    if memchr::memchr(ESC, text.as_bytes()).is_none() {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len());
    for segment in segments(text) {
        if let Segment::Char(c) = segment {
            out.push(c);
        }
    }
    Cow::Owned(out)
}

/// Number of visible characters in `text` (escape sequences excluded).
pub fn visible_width(text: &str) -> usize {
    if memchr::memchr(ESC, text.as_bytes()).is_none() {
        return text.chars().count();
    }
    segments(text)
        .filter(|s| matches!(s, Segment::Char(_)))
        .count()
}

/// Cut `text` down to at most `width` visible characters.
///
/// Escape sequences that appear before the cut point are kept verbatim; any
/// sequence after the last retained character is dropped. Text that already
/// fits is returned unchanged.
pub fn truncate_visible(text: &str, width: usize) -> Cow<'_, str> {
    if visible_width(text) <= width {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len().min(width * 4 + 16));
    let mut visible = 0usize;
    for segment in segments(text) {
        if visible == width {
            break;
        }
        match segment {
            Segment::Escape(seq) => out.push_str(seq),
            Segment::Char(c) => {
                out.push(c);
                visible += 1;
            }
        }
    }
    Cow::Owned(out)
}
