//! Structure-aware truncation of unified diffs to a character budget.
//!
//! Headers are packed first so the result still names every file it can,
//! then bodies fill what is left in file order. The first body that does
//! not fit is cut at a hunk boundary, a line boundary, or as a last resort
//! mid-line, and everything after it is dropped. A marker with the number
//! of fully omitted files is always appended when anything was removed.

use tracing::debug;

use crate::git::diff_split::{hunk_starts, split_by_file, FileSegment};

/// Builds the marker appended to a truncated diff.
#[must_use]
pub fn truncation_marker(omitted_files: usize) -> String {
    format!("\n[diff truncated to fit the model context: {omitted_files} file(s) omitted]\n")
}

/// How much of one segment made it into the output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Inclusion {
    header: bool,
    body_len: usize,
}

/// A diff split into per-file segments with the part of each that fits.
#[derive(Debug, Clone)]
pub struct TruncationPlan<'a> {
    diff: &'a str,
    segments: Vec<FileSegment<'a>>,
    inclusions: Vec<Inclusion>,
    budget_chars: usize,
    fits: bool,
}

/// Output of [`truncate_diff`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TruncatedDiff {
    /// Diff text, with the marker appended when truncated.
    pub text: String,
    /// Files that received no content at all.
    pub omitted_files: usize,
    /// Path of the file whose body was cut part-way, if any.
    pub partial_file: Option<String>,
    /// Whether anything was removed.
    pub truncated: bool,
}

impl<'a> TruncationPlan<'a> {
    /// Plans the truncation of `diff` to `budget_chars`.
    #[must_use]
    pub fn new(diff: &'a str, budget_chars: usize) -> Self {
        let segments = split_by_file(diff);
        let fits = diff.len() <= budget_chars;
        let inclusions = if fits {
            segments
                .iter()
                .map(|s| Inclusion {
                    header: true,
                    body_len: s.body.len(),
                })
                .collect()
        } else {
            // Keep the marker inside the budget whenever the budget allows it.
            let reserve = truncation_marker(segments.len()).len();
            let content_budget = if budget_chars > reserve {
                budget_chars - reserve
            } else {
                0
            };
            fill(&segments, content_budget)
        };

        Self {
            diff,
            segments,
            inclusions,
            budget_chars,
            fits,
        }
    }

    /// Number of files with content but nothing included.
    #[must_use]
    pub fn omitted_files(&self) -> usize {
        self.segments
            .iter()
            .zip(&self.inclusions)
            .filter(|(segment, inclusion)| {
                let header_dropped = !inclusion.header && !segment.header.is_empty();
                let body_dropped = !segment.body.is_empty() && inclusion.body_len == 0;
                header_dropped || body_dropped
            })
            .count()
    }

    /// Renders the truncated text.
    #[must_use]
    pub fn render(&self) -> TruncatedDiff {
        if self.fits {
            return TruncatedDiff {
                text: self.diff.to_string(),
                omitted_files: 0,
                partial_file: None,
                truncated: false,
            };
        }

        let mut text = String::with_capacity(self.budget_chars + 128);
        let mut partial_file = None;
        for (segment, inclusion) in self.segments.iter().zip(&self.inclusions) {
            if inclusion.header {
                text.push_str(segment.header);
            }
            text.push_str(&segment.body[..inclusion.body_len]);
            if inclusion.body_len > 0 && inclusion.body_len < segment.body.len() {
                partial_file = Some(segment.path.clone());
            }
        }

        let omitted_files = self.omitted_files();
        text.push_str(&truncation_marker(omitted_files));

        debug!(
            input_len = self.diff.len(),
            budget_chars = self.budget_chars,
            output_len = text.len(),
            omitted_files,
            partial_file = ?partial_file,
            "Truncated diff"
        );

        TruncatedDiff {
            text,
            omitted_files,
            partial_file,
            truncated: true,
        }
    }
}

/// Truncates `diff` to roughly `budget_chars`.
///
/// Returns the input unchanged when it already fits. Otherwise the result
/// is never longer than `budget_chars` plus the marker length.
#[must_use]
pub fn truncate_diff(diff: &str, budget_chars: usize) -> TruncatedDiff {
    TruncationPlan::new(diff, budget_chars).render()
}

/// Two passes over the segments: headers first, then bodies.
fn fill(segments: &[FileSegment<'_>], budget: usize) -> Vec<Inclusion> {
    let mut inclusions = vec![Inclusion::default(); segments.len()];
    let mut remaining = budget;

    for (segment, inclusion) in segments.iter().zip(inclusions.iter_mut()) {
        if segment.header.len() > remaining {
            break;
        }
        inclusion.header = true;
        remaining -= segment.header.len();
    }

    for (segment, inclusion) in segments.iter().zip(inclusions.iter_mut()) {
        if !inclusion.header {
            break;
        }
        if segment.body.len() <= remaining {
            inclusion.body_len = segment.body.len();
            remaining -= segment.body.len();
        } else {
            inclusion.body_len = cut_point(segment.body, remaining);
            break;
        }
    }

    inclusions
}

/// Picks where to cut a body that does not fit in `limit` bytes.
///
/// Prefers the last hunk boundary if it lies past half of `limit`, then
/// the last line boundary, then the largest char boundary within `limit`.
fn cut_point(body: &str, limit: usize) -> usize {
    let limit = floor_char_boundary(body, limit.min(body.len()));
    if limit == 0 {
        return 0;
    }
    let window = &body[..limit];

    if let Some(&hunk) = hunk_starts(window).last() {
        if hunk > limit / 2 {
            return hunk;
        }
    }
    if let Some(newline) = window.rfind('\n') {
        return newline + 1;
    }
    limit
}

fn floor_char_boundary(s: &str, mut index: usize) -> usize {
    while index > 0 && !s.is_char_boundary(index) {
        index -= 1;
    }
    index
}
