//! Per-file splitting of unified diffs into header and body segments.

/// Marker that begins a per-file section in unified diff output.
const FILE_DIFF_MARKER: &str = "diff --git a/";

/// Marker that begins a hunk within a file diff.
pub(crate) const HUNK_MARKER: &str = "@@ ";

/// One file's slice of a unified diff, borrowed from the input.
///
/// `header` holds everything before the first hunk (`diff --git`, `index`,
/// `---`, `+++`, mode and rename lines). `body` holds the hunks. A file
/// without hunks (binary, mode-only) has an empty body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSegment<'a> {
    /// Path from the `b/` side of the `diff --git` line; empty for text
    /// that precedes the first file section.
    pub path: String,
    /// File header lines.
    pub header: &'a str,
    /// Hunk content.
    pub body: &'a str,
}

/// Splits a unified diff at `diff --git a/` boundaries.
///
/// Concatenating every segment's header and body reproduces the input
/// exactly. Text before the first file section becomes a path-less
/// segment; input without any file marker is returned as a single
/// path-less segment whose body is the whole text. Empty input yields no
/// segments.
#[must_use]
pub fn split_by_file(diff: &str) -> Vec<FileSegment<'_>> {
    if diff.is_empty() {
        return Vec::new();
    }

    let positions = line_starts_with(diff, FILE_DIFF_MARKER);
    if positions.is_empty() {
        return vec![FileSegment {
            path: String::new(),
            header: "",
            body: diff,
        }];
    }

    let mut result = Vec::with_capacity(positions.len() + 1);
    if positions[0] > 0 {
        result.push(FileSegment {
            path: String::new(),
            header: &diff[..positions[0]],
            body: "",
        });
    }

    for (i, &pos) in positions.iter().enumerate() {
        let end = positions.get(i + 1).copied().unwrap_or(diff.len());
        let content = &diff[pos..end];
        let first_line = content.lines().next().unwrap_or("");
        let path = extract_path_from_diff_header(first_line);
        let (header, body) = match hunk_starts(content).first() {
            Some(&hunk) => content.split_at(hunk),
            None => (content, ""),
        };
        result.push(FileSegment { path, header, body });
    }

    result
}

/// Byte offsets of every hunk header line in `text`.
#[must_use]
pub(crate) fn hunk_starts(text: &str) -> Vec<usize> {
    line_starts_with(text, HUNK_MARKER)
}

/// Byte offsets of every line in `text` beginning with `marker`.
fn line_starts_with(text: &str, marker: &str) -> Vec<usize> {
    let mut positions = Vec::new();
    if text.starts_with(marker) {
        positions.push(0);
    }
    let search = format!("\n{marker}");
    let mut start = 0;
    while let Some(pos) = text[start..].find(&search) {
        // +1 to skip the newline; the line starts after it.
        positions.push(start + pos + 1);
        start = start + pos + 1;
    }
    positions
}

/// Extracts the file path from the `b/` side of a `diff --git` header line.
fn extract_path_from_diff_header(header_line: &str) -> String {
    // Format: "diff --git a/old_path b/new_path"
    // Find the last " b/" to handle paths that may contain spaces.
    if let Some(b_pos) = header_line.rfind(" b/") {
        header_line[b_pos + 3..].to_string()
    } else {
        header_line
            .strip_prefix(FILE_DIFF_MARKER)
            .unwrap_or(header_line)
            .to_string()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
pub(crate) mod tests {
    use super::*;

    // ── test helpers ────────────────────────────────────────────

    /// Builds a standard single-file diff header.
    pub(crate) fn make_file_header(path: &str) -> String {
        format!(
            "diff --git a/{path} b/{path}\n\
             index abc1234..def5678 100644\n\
             --- a/{path}\n\
             +++ b/{path}\n"
        )
    }

    /// Builds a single hunk string.
    pub(crate) fn make_hunk(old_start: usize, new_start: usize, body: &str) -> String {
        format!("@@ -{old_start},3 +{new_start},4 @@\n{body}")
    }

    /// Builds a complete single-file, single-hunk diff.
    pub(crate) fn make_single_file_diff(path: &str, hunk_body: &str) -> String {
        format!("{}{}", make_file_header(path), make_hunk(1, 1, hunk_body))
    }

    fn rejoin(segments: &[FileSegment<'_>]) -> String {
        segments
            .iter()
            .map(|s| format!("{}{}", s.header, s.body))
            .collect()
    }

    // ── split_by_file ──────────────────────────────────────────

    #[test]
    fn split_by_file_empty_input() {
        assert!(split_by_file("").is_empty());
    }

    #[test]
    fn split_by_file_no_diff_markers_is_one_body() {
        let text = "some random text\nwithout diff markers\n";
        let result = split_by_file(text);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].header, "");
        assert_eq!(result[0].body, text);
    }

    #[test]
    fn split_by_file_single_file_header_and_body() {
        let diff = make_single_file_diff(
            "src/main.rs",
            " fn main() {\n+    println!(\"hello\");\n }\n",
        );
        let result = split_by_file(&diff);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].path, "src/main.rs");
        assert_eq!(result[0].header, make_file_header("src/main.rs"));
        assert!(result[0].body.starts_with(HUNK_MARKER));
    }

    #[test]
    fn split_by_file_multiple_hunks_stay_in_body() {
        let header = make_file_header("lib.rs");
        let hunk1 = make_hunk(1, 1, "+use std::io;\n");
        let hunk2 = make_hunk(10, 11, "+// new comment\n");
        let diff = format!("{header}{hunk1}{hunk2}");

        let result = split_by_file(&diff);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].body, format!("{hunk1}{hunk2}"));
    }

    #[test]
    fn split_by_file_multiple_files() {
        let file1 = make_single_file_diff("a.rs", "+line\n");
        let file2 = make_single_file_diff("b.rs", "+other\n");
        let file3 = make_single_file_diff("c.rs", "+third\n");
        let diff = format!("{file1}{file2}{file3}");

        let paths: Vec<_> = split_by_file(&diff).into_iter().map(|s| s.path).collect();
        assert_eq!(paths, vec!["a.rs", "b.rs", "c.rs"]);
    }

    #[test]
    fn split_by_file_binary_has_empty_body() {
        let diff = "diff --git a/image.png b/image.png\n\
                     new file mode 100644\n\
                     index 0000000..abc1234\n\
                     Binary files /dev/null and b/image.png differ\n";

        let result = split_by_file(diff);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].path, "image.png");
        assert_eq!(result[0].header, diff);
        assert!(result[0].body.is_empty());
    }

    #[test]
    fn split_by_file_rename() {
        let diff = "diff --git a/old_name.rs b/new_name.rs\n\
                     similarity index 95%\n\
                     rename from old_name.rs\n\
                     rename to new_name.rs\n\
                     index abc1234..def5678 100644\n\
                     --- a/old_name.rs\n\
                     +++ b/new_name.rs\n\
                     @@ -1,3 +1,3 @@\n\
                     -// old\n\
                     +// new\n";

        let result = split_by_file(diff);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].path, "new_name.rs");
        assert!(result[0].header.ends_with("+++ b/new_name.rs\n"));
    }

    #[test]
    fn split_by_file_keeps_preamble() {
        let file = make_single_file_diff("a.rs", "+line\n");
        let diff = format!("warning: something\n{file}");
        let result = split_by_file(&diff);
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].path, "");
        assert_eq!(result[0].header, "warning: something\n");
        assert_eq!(rejoin(&result), diff);
    }

    #[test]
    fn split_by_file_content_preserved_verbatim() {
        let file1 = make_single_file_diff("a.rs", "+line\n");
        let file2 = make_single_file_diff("b.rs", "+other\n@@ -9,3 +9,4 @@\n+more\n");
        let diff = format!("{file1}{file2}");
        assert_eq!(rejoin(&split_by_file(&diff)), diff);
    }

    // ── hunk_starts ────────────────────────────────────────────

    #[test]
    fn hunk_starts_finds_line_leading_markers_only() {
        let body = "@@ -1 +1 @@\n+a @@ b\n@@ -5 +5 @@\n+c\n";
        assert_eq!(hunk_starts(body), vec![0, 20]);
    }

    // ── extract_path_from_diff_header ──────────────────────────

    #[test]
    fn path_extraction_nested() {
        assert_eq!(
            extract_path_from_diff_header("diff --git a/src/git/diff.rs b/src/git/diff.rs"),
            "src/git/diff.rs"
        );
    }

    #[test]
    fn path_extraction_rename() {
        assert_eq!(
            extract_path_from_diff_header("diff --git a/old.rs b/new.rs"),
            "new.rs"
        );
    }

    #[test]
    fn path_extraction_with_spaces() {
        assert_eq!(
            extract_path_from_diff_header("diff --git a/my file.rs b/my file.rs"),
            "my file.rs"
        );
    }
}
