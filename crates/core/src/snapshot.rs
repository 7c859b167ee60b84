//! Incremental chunks from repeated full-screen captures.
//!
//! Some jobs only expose their output as a terminal pane that can be
//! captured whole. Polling the pane yields overlapping snapshots; this module
//! turns them into the append-only chunks the multiplexer expects.

/// Tracks the last capture of a pane and yields what is new in the next one.
#[derive(Debug, Default, Clone)]
pub struct SnapshotDiff {
    last: String,
}

impl SnapshotDiff {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing capture so scrollback left over from earlier
    /// runs in the same pane is not re-sent.
    pub fn seeded(capture: &str) -> Self {
        Self {
            last: capture.trim().to_string(),
        }
    }

    /// Feed the next capture. Returns the new lines (newline-terminated so
    /// consecutive chunks concatenate into whole lines), or `None` when the
    /// capture holds nothing new.
    pub fn advance(&mut self, capture: &str) -> Option<String> {
        let capture = capture.trim();
        if capture.is_empty() || capture == self.last {
            return None;
        }
        let fresh = new_lines(&self.last, capture);
        self.last = capture.to_string();
        if fresh.is_empty() {
            return None;
        }
        Some(format!("{fresh}\n"))
    }

    pub fn last_capture(&self) -> &str {
        &self.last
    }
}

/// Lines of `current` that follow the tail of `previous`.
///
/// Anchors are tried from the end of `previous`, skipping empty lines; the
/// first one found again in `current` (searching from its end) marks where new
/// output begins. When no anchor survives, the pane scrolled past everything
/// seen before and nothing is returned: re-sending would duplicate output
/// already delivered.
pub fn new_lines(previous: &str, current: &str) -> String {
    if previous.is_empty() {
        return current.to_string();
    }

    let current_lines: Vec<&str> = current.lines().collect();

    for anchor in previous.lines().rev().filter(|l| !l.is_empty()) {
        if let Some(pos) = current_lines.iter().rposition(|l| *l == anchor) {
            return current_lines[pos + 1..].join("\n");
        }
    }

    String::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn first_capture_is_emitted_whole() {
        let mut diff = SnapshotDiff::new();
        assert_eq!(diff.advance("$ make\ncompiling\n").as_deref(), Some("$ make\ncompiling\n"));
    }

    #[test]
    fn only_new_lines_are_emitted() {
        let mut diff = SnapshotDiff::new();
        diff.advance("$ make\ncompiling");
        assert_eq!(
            diff.advance("$ make\ncompiling\nlinking\ndone").as_deref(),
            Some("linking\ndone\n")
        );
    }

    #[test]
    fn unchanged_capture_yields_nothing() {
        let mut diff = SnapshotDiff::new();
        diff.advance("one\ntwo");
        assert_eq!(diff.advance("one\ntwo\n\n"), None);
    }

    #[test]
    fn seeded_diff_skips_old_scrollback() {
        let mut diff = SnapshotDiff::seeded("old run\n$ deploy");
        assert_eq!(diff.advance("old run\n$ deploy\nnew run").as_deref(), Some("new run\n"));
    }

    #[test]
    fn empty_trailing_anchor_falls_back_to_earlier_line() {
        assert_eq!(new_lines("a\nb\n\n", "a\nb\nc"), "c");
    }

    #[test]
    fn scrolled_past_previous_capture_yields_nothing() {
        let mut diff = SnapshotDiff::new();
        diff.advance("alpha\nbeta");
        assert_eq!(diff.advance("gamma\ndelta"), None);
        assert_eq!(diff.last_capture(), "gamma\ndelta");
    }

    #[test]
    fn anchor_is_matched_from_the_end() {
        // "tick" repeats; the newest occurrence is the anchor.
        assert_eq!(new_lines("tick", "tick\ntick\ntock"), "tock");
    }

    #[test]
    fn empty_capture_is_ignored() {
        let mut diff = SnapshotDiff::new();
        assert_eq!(diff.advance("   \n"), None);
    }
}
