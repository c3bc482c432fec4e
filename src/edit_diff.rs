use crate::util::split_lines;
use similar::{ChangeTag, DiffTag, TextDiff};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffKind {
    Equal,
    Delete,
    Insert,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffLine {
    pub kind: DiffKind,
    pub text: String,
    pub old_line: Option<usize>,
    pub new_line: Option<usize>,
}

/// A run of changes plus surrounding context, numbered like a unified diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffHunk {
    pub old_start: usize,
    pub old_count: usize,
    pub new_start: usize,
    pub new_count: usize,
    pub lines: Vec<DiffLine>,
}

pub const DEFAULT_DIFF_CONTEXT_LINES: usize = 2;

/// Line diff (Myers, linear space) grouped into hunks with
/// `context_lines` of unchanged text around each change.
pub fn diff_hunks(original: &str, modified: &str, context_lines: usize) -> Vec<DiffHunk> {
    let (old_lines, _) = split_lines(original);
    let (new_lines, _) = split_lines(modified);
    let diff = TextDiff::from_slices(&old_lines[..], &new_lines[..]);
    let groups = diff.grouped_ops(context_lines);

    groups
        .iter()
        .filter(|group| group.iter().any(|op| op.tag() != DiffTag::Equal))
        .map(|group| {
            let lines: Vec<DiffLine> = group
                .iter()
                .flat_map(|op| diff.iter_changes(op))
                .map(|change| DiffLine {
                    kind: match change.tag() {
                        ChangeTag::Equal => DiffKind::Equal,
                        ChangeTag::Delete => DiffKind::Delete,
                        ChangeTag::Insert => DiffKind::Insert,
                    },
                    text: change.value().to_string(),
                    old_line: change.old_index().map(|index| index + 1),
                    new_line: change.new_index().map(|index| index + 1),
                })
                .collect();
            let old_start = lines
                .iter()
                .find_map(|line| line.old_line)
                .or_else(|| lines.iter().find_map(|line| line.new_line))
                .unwrap_or(1);
            let new_start = lines
                .iter()
                .find_map(|line| line.new_line)
                .or_else(|| lines.iter().find_map(|line| line.old_line))
                .unwrap_or(1);
            DiffHunk {
                old_start,
                old_count: lines.iter().filter(|line| line.old_line.is_some()).count(),
                new_start,
                new_count: lines.iter().filter(|line| line.new_line.is_some()).count(),
                lines,
            }
        })
        .collect()
}

/// Renders hunks for a terminal: `@@` headers, numbered lines with
/// `-`/`+` markers, `...` between hunks.
pub fn render_hunks(hunks: &[DiffHunk], indent: &str) -> String {
    if hunks.is_empty() {
        return format!("{indent}... no modified lines ...\n");
    }

    let mut out = String::new();
    for (index, hunk) in hunks.iter().enumerate() {
        if index > 0 {
            out.push_str(&format!("{indent}...\n"));
        }
        out.push_str(&format!(
            "{indent}@@ -{},{} +{},{} @@\n",
            hunk.old_start, hunk.old_count, hunk.new_start, hunk.new_count
        ));
        for line in &hunk.lines {
            let marker = match line.kind {
                DiffKind::Equal => ' ',
                DiffKind::Delete => '-',
                DiffKind::Insert => '+',
            };
            let line_number = line.old_line.or(line.new_line).unwrap_or(1);
            let text = if line.text.is_empty() {
                "<empty>"
            } else {
                line.text.as_str()
            };
            out.push_str(&format!("{indent}{line_number} {marker} {text}\n"));
        }
    }
    out
}
