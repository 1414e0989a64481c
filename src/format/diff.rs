//! Close-time change detection against the last saved box layout.

const THRESHOLD_MESSAGE: &str =
    "File size exceeds checking threshold; contents might not have changed.";
const NEW_FILE_MESSAGE: &str = "New file.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeDetail {
    Unchanged,
    Diff(String),
    ExceedsThreshold,
    NewFile,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeCheck {
    pub has_changed: bool,
    pub detail: ChangeDetail,
}

impl ChangeCheck {
    /// Text shown alongside the save prompt.
    pub fn message(&self) -> &str {
        match &self.detail {
            ChangeDetail::Unchanged => "",
            ChangeDetail::Diff(diff) => diff,
            ChangeDetail::ExceedsThreshold => THRESHOLD_MESSAGE,
            ChangeDetail::NewFile => NEW_FILE_MESSAGE,
        }
    }
}

/// `saved` is `None` when nothing has been saved yet. Layouts larger than
/// `threshold` bytes are reported as changed without comparing.
pub fn check_change(current: &str, saved: Option<&str>, threshold: usize) -> ChangeCheck {
    let Some(saved) = saved else {
        return ChangeCheck {
            has_changed: true,
            detail: ChangeDetail::NewFile,
        };
    };
    if current.len() > threshold {
        return ChangeCheck {
            has_changed: true,
            detail: ChangeDetail::ExceedsThreshold,
        };
    }
    if current == saved {
        ChangeCheck {
            has_changed: false,
            detail: ChangeDetail::Unchanged,
        }
    } else {
        ChangeCheck {
            has_changed: true,
            detail: ChangeDetail::Diff(line_diff(saved, current)),
        }
    }
}

/// Line diff from `old` to `new`: `"  "` kept, `"- "` removed, `"+ "` added.
/// Every output line ends with a newline; removals precede additions.
pub fn line_diff(old: &str, new: &str) -> String {
    let old = old.lines().collect::<Vec<_>>();
    let new = new.lines().collect::<Vec<_>>();
    let (n, m) = (old.len(), new.len());

    // lcs[i][j]: longest common subsequence of old[i..] and new[j..]
    let mut lcs = vec![vec![0usize; m + 1]; n + 1];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            lcs[i][j] = if old[i] == new[j] {
                lcs[i + 1][j + 1] + 1
            } else {
                lcs[i + 1][j].max(lcs[i][j + 1])
            };
        }
    }

    let mut out = String::new();
    let (mut i, mut j) = (0, 0);
    while i < n || j < m {
        if i < n && j < m && old[i] == new[j] {
            push_line(&mut out, "  ", old[i]);
            i += 1;
            j += 1;
        } else if j == m || (i < n && lcs[i + 1][j] >= lcs[i][j + 1]) {
            push_line(&mut out, "- ", old[i]);
            i += 1;
        } else {
            push_line(&mut out, "+ ", new[j]);
            j += 1;
        }
    }
    out
}

fn push_line(out: &mut String, prefix: &str, line: &str) {
    out.push_str(prefix);
    out.push_str(line);
    out.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_layout_is_unchanged() {
        let check = check_change("a 0 0 1 1 0", Some("a 0 0 1 1 0"), 100);
        assert!(!check.has_changed);
        assert_eq!(check.message(), "");
    }

    #[test]
    fn one_character_difference_produces_a_diff() {
        let saved = "あ 0 0 1 1 0\nい 0 0 1 1 0\nう 5 5 6 6 0";
        let current = "あ 0 0 1 1 0\nえ 0 0 1 1 0\nう 5 5 6 6 0";
        let check = check_change(current, Some(saved), 7_000);
        assert!(check.has_changed);
        insta::assert_snapshot!(check.message().trim_end(), @r"
          あ 0 0 1 1 0
        - い 0 0 1 1 0
        + え 0 0 1 1 0
          う 5 5 6 6 0
        ");
    }

    #[test]
    fn oversized_layout_skips_comparison() {
        let current = "x".repeat(11);
        let check = check_change(&current, Some(&current), 10);
        assert!(check.has_changed);
        assert_eq!(check.detail, ChangeDetail::ExceedsThreshold);
        assert!(check.message().contains("threshold"));
    }

    #[test]
    fn threshold_counts_bytes_not_characters() {
        let current = "あいう";
        assert_eq!(check_change(current, Some(current), 8).detail, ChangeDetail::ExceedsThreshold);
        assert_eq!(check_change(current, Some(current), 9).detail, ChangeDetail::Unchanged);
    }

    #[test]
    fn missing_saved_file_is_new() {
        let check = check_change("", None, 10);
        assert!(check.has_changed);
        assert_eq!(check.message(), "New file.");
    }

    #[test]
    fn appended_and_removed_lines() {
        assert_eq!(line_diff("a\nb", "a\nb\nc"), "  a\n  b\n+ c\n");
        assert_eq!(line_diff("a\nb\nc", "b"), "- a\n  b\n- c\n");
        assert_eq!(line_diff("", ""), "");
    }
}
