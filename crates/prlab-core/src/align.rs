//! Line alignment between two versions of a file.
//!
//! GitLab only accepts a thread on an unmodified line when both the old and
//! the new line numbers are given. The alignment recovers the missing one
//! from a Myers line diff of the two blobs.

use similar::{capture_diff_slices, Algorithm, DiffOp};

/// Kind of a line edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditKind {
    Equal,
    Delete,
    Insert,
}

/// A run of lines sharing the same edit kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edit {
    pub kind: EditKind,
    pub lines: usize,
}

/// A block of identical lines, with 0-based offsets on each side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineMatch {
    pub base_start: usize,
    pub head_start: usize,
    pub len: usize,
}

/// Ordered list of identical blocks between base and head.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Alignment {
    matches: Vec<LineMatch>,
}

/// Line edit script from `base` to `head`.
pub fn line_edits(base: &str, head: &str) -> Vec<Edit> {
    let base_lines: Vec<&str> = base.lines().collect();
    let head_lines: Vec<&str> = head.lines().collect();

    let mut edits = Vec::new();
    for op in capture_diff_slices(Algorithm::Myers, &base_lines, &head_lines) {
        match op {
            DiffOp::Equal { len, .. } => edits.push(Edit {
                kind: EditKind::Equal,
                lines: len,
            }),
            DiffOp::Delete { old_len, .. } => edits.push(Edit {
                kind: EditKind::Delete,
                lines: old_len,
            }),
            DiffOp::Insert { new_len, .. } => edits.push(Edit {
                kind: EditKind::Insert,
                lines: new_len,
            }),
            DiffOp::Replace {
                old_len, new_len, ..
            } => {
                edits.push(Edit {
                    kind: EditKind::Delete,
                    lines: old_len,
                });
                edits.push(Edit {
                    kind: EditKind::Insert,
                    lines: new_len,
                });
            }
        }
    }
    edits
}

impl Alignment {
    /// Align two file contents.
    pub fn compute(base: &str, head: &str) -> Self {
        Self::from_edits(&line_edits(base, head))
    }

    /// Walk an edit script, keeping the equal runs.
    pub fn from_edits(edits: &[Edit]) -> Self {
        let mut matches = Vec::new();
        let mut base = 0;
        let mut head = 0;

        for edit in edits {
            match edit.kind {
                EditKind::Equal => {
                    if edit.lines > 0 {
                        matches.push(LineMatch {
                            base_start: base,
                            head_start: head,
                            len: edit.lines,
                        });
                    }
                    base += edit.lines;
                    head += edit.lines;
                }
                EditKind::Delete => base += edit.lines,
                EditKind::Insert => head += edit.lines,
            }
        }

        Self { matches }
    }

    pub fn from_matches(matches: Vec<LineMatch>) -> Self {
        Self { matches }
    }

    pub fn matches(&self) -> &[LineMatch] {
        &self.matches
    }

    /// Head line (1-based) of an unchanged base line; `None` inside a changed hunk.
    pub fn base_to_head(&self, line: u32) -> Option<u32> {
        let index = (line as usize).checked_sub(1)?;
        self.matches
            .iter()
            .find(|m| m.base_start <= index && index < m.base_start + m.len)
            .map(|m| (m.head_start + (index - m.base_start) + 1) as u32)
    }

    /// Base line (1-based) of an unchanged head line; `None` inside a changed hunk.
    pub fn head_to_base(&self, line: u32) -> Option<u32> {
        let index = (line as usize).checked_sub(1)?;
        self.matches
            .iter()
            .find(|m| m.head_start <= index && index < m.head_start + m.len)
            .map(|m| (m.base_start + (index - m.head_start) + 1) as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "a\nb\nc\nd\ne\nf\n";
    const HEAD: &str = "a\nb\nX\nY\nd\ne\nf\ng\n";

    #[test]
    fn test_from_edits_cursors() {
        let edits = [
            Edit { kind: EditKind::Equal, lines: 2 },
            Edit { kind: EditKind::Delete, lines: 1 },
            Edit { kind: EditKind::Insert, lines: 2 },
            Edit { kind: EditKind::Equal, lines: 3 },
            Edit { kind: EditKind::Insert, lines: 1 },
        ];
        let alignment = Alignment::from_edits(&edits);
        assert_eq!(
            alignment.matches(),
            &[
                LineMatch { base_start: 0, head_start: 0, len: 2 },
                LineMatch { base_start: 3, head_start: 4, len: 3 },
            ]
        );
    }

    #[test]
    fn test_compute_translates_unchanged_lines() {
        let alignment = Alignment::compute(BASE, HEAD);

        assert_eq!(alignment.base_to_head(1), Some(1));
        assert_eq!(alignment.base_to_head(2), Some(2));
        assert_eq!(alignment.base_to_head(4), Some(5));
        assert_eq!(alignment.base_to_head(6), Some(7));

        assert_eq!(alignment.head_to_base(5), Some(4));
        assert_eq!(alignment.head_to_base(7), Some(6));
    }

    #[test]
    fn test_changed_lines_are_untranslatable() {
        let alignment = Alignment::compute(BASE, HEAD);

        // "c" was replaced
        assert_eq!(alignment.base_to_head(3), None);
        // "X", "Y" and "g" are new
        assert_eq!(alignment.head_to_base(3), None);
        assert_eq!(alignment.head_to_base(4), None);
        assert_eq!(alignment.head_to_base(8), None);
        // Out of range and line zero
        assert_eq!(alignment.base_to_head(42), None);
        assert_eq!(alignment.base_to_head(0), None);
    }

    #[test]
    fn test_round_trip_inside_equal_runs() {
        let alignment = Alignment::compute(BASE, HEAD);
        for m in alignment.matches() {
            for offset in 0..m.len {
                let base_line = (m.base_start + offset + 1) as u32;
                let head_line = alignment.base_to_head(base_line).unwrap();
                assert_eq!(alignment.head_to_base(head_line), Some(base_line));
            }
        }
    }

    #[test]
    fn test_identical_and_empty_contents() {
        let same = Alignment::compute("x\ny\n", "x\ny\n");
        assert_eq!(
            same.matches(),
            &[LineMatch { base_start: 0, head_start: 0, len: 2 }]
        );

        let added = Alignment::compute("", "x\ny\n");
        assert!(added.matches().is_empty());
        assert_eq!(added.head_to_base(1), None);
    }

    #[test]
    fn test_line_edits_split_replace() {
        let edits = line_edits("a\nb\n", "a\nc\n");
        assert_eq!(edits[0], Edit { kind: EditKind::Equal, lines: 1 });
        assert!(edits[1..].contains(&Edit { kind: EditKind::Delete, lines: 1 }));
        assert!(edits[1..].contains(&Edit { kind: EditKind::Insert, lines: 1 }));
    }
}
