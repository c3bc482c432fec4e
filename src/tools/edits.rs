use crate::error::PreviewError;
use crate::util::{join_lines, split_lines};
use regex::{NoExpand, RegexBuilder};
use serde::Deserialize;
use serde_json::Value;

pub const WRITE_FILE_TOOL: &str = "write_file";
pub const INSERT_CONTENT_TOOL: &str = "insert_content";
pub const EDIT_LINES_TOOL: &str = "edit_lines";
pub const SEARCH_REPLACE_TOOL: &str = "search_replace";

pub fn is_file_edit_tool(name: &str) -> bool {
    matches!(
        name,
        WRITE_FILE_TOOL | INSERT_CONTENT_TOOL | EDIT_LINES_TOOL | SEARCH_REPLACE_TOOL
    )
}

/// One line-addressed edit. `old` is checked against the current line before
/// anything changes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LineEdit {
    pub line: usize,
    #[serde(default)]
    pub old: Option<String>,
    #[serde(default)]
    pub new: Option<String>,
}

/// A recognised file-editing tool call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileEdit {
    /// `content: None` deletes the file.
    Write { content: Option<String> },
    /// `line` is 1-based; 0 appends.
    Insert { line: usize, content: String },
    LineDiff { edits: Vec<LineEdit> },
    SearchReplace {
        search: String,
        replace: String,
        regex: bool,
        ignore_case: bool,
    },
}

impl FileEdit {
    /// Reads the edit out of tool arguments. `path` is handled by the caller.
    pub fn from_tool_call(name: &str, args: &Value) -> Result<Self, PreviewError> {
        match name {
            WRITE_FILE_TOOL => Ok(FileEdit::Write {
                content: args
                    .get("content")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            }),
            INSERT_CONTENT_TOOL => {
                let line = match args.get("line").or_else(|| args.get("position")) {
                    None | Some(Value::Null) => 0,
                    Some(value) => value.as_u64().ok_or_else(|| PreviewError::InvalidArgument {
                        tool: INSERT_CONTENT_TOOL,
                        argument: "line",
                        reason: format!("expected a non-negative integer, got {value}"),
                    })? as usize,
                };
                let content = required_str(args, INSERT_CONTENT_TOOL, "content")?;
                Ok(FileEdit::Insert { line, content })
            }
            EDIT_LINES_TOOL => {
                let raw = args
                    .get("replacements")
                    .or_else(|| args.get("edits"))
                    .ok_or(PreviewError::MissingArgument {
                        tool: EDIT_LINES_TOOL,
                        argument: "replacements",
                    })?;
                let edits = Vec::<LineEdit>::deserialize(raw).map_err(|error| {
                    PreviewError::InvalidArgument {
                        tool: EDIT_LINES_TOOL,
                        argument: "replacements",
                        reason: error.to_string(),
                    }
                })?;
                Ok(FileEdit::LineDiff { edits })
            }
            SEARCH_REPLACE_TOOL => Ok(FileEdit::SearchReplace {
                search: required_str(args, SEARCH_REPLACE_TOOL, "search")?,
                replace: args
                    .get("replace")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                regex: bool_arg(args, &["regex", "use_regex"]),
                ignore_case: bool_arg(args, &["ignore_case", "case_insensitive"]),
            }),
            other => Err(PreviewError::UnsupportedTool(other.to_string())),
        }
    }

    pub fn is_delete(&self) -> bool {
        matches!(self, FileEdit::Write { content: None })
    }

    /// Applies the edit to `original`. `None` in the outcome means the file
    /// would be deleted.
    pub fn apply(&self, original: &str) -> Result<EditOutcome, PreviewError> {
        match self {
            FileEdit::Write { content } => Ok(EditOutcome {
                content: content.clone(),
                warnings: Vec::new(),
            }),
            FileEdit::Insert { line, content } => Ok(EditOutcome {
                content: Some(insert_at_line(original, *line, content)),
                warnings: Vec::new(),
            }),
            FileEdit::LineDiff { edits } => {
                let (content, warnings) = apply_line_edits(original, edits);
                Ok(EditOutcome {
                    content: Some(content),
                    warnings,
                })
            }
            FileEdit::SearchReplace {
                search,
                replace,
                regex,
                ignore_case,
            } => {
                let (content, replaced) =
                    search_and_replace(original, search, replace, *regex, *ignore_case)?;
                let warnings = if replaced == 0 {
                    vec![format!("search pattern {search:?} matched nothing")]
                } else {
                    Vec::new()
                };
                Ok(EditOutcome {
                    content: Some(content),
                    warnings,
                })
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditOutcome {
    pub content: Option<String>,
    pub warnings: Vec<String>,
}

fn required_str(args: &Value, tool: &'static str, argument: &'static str) -> Result<String, PreviewError> {
    args.get(argument)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(PreviewError::MissingArgument { tool, argument })
}

fn bool_arg(args: &Value, keys: &[&str]) -> bool {
    keys.iter()
        .find_map(|key| args.get(*key).and_then(Value::as_bool))
        .unwrap_or(false)
}

/// Inserts `content` so that it starts at 1-based `line`. `0`, or a line past
/// the end, appends.
pub fn insert_at_line(original: &str, line: usize, content: &str) -> String {
    let (mut lines, trailing_newline) = split_lines(original);
    let (inserted, _) = split_lines(content);
    if inserted.is_empty() {
        return original.to_string();
    }
    let at = if line == 0 || line > lines.len() {
        lines.len()
    } else {
        line - 1
    };
    lines.splice(at..at, inserted);
    let keep_trailing = trailing_newline || (at == 0 && original.is_empty() && content.ends_with('\n'));
    join_lines(&lines, keep_trailing)
}

/// Applies line edits from the highest line number down so earlier edits
/// never shift later ones. An edit whose `old` does not match the actual line
/// is skipped and reported; the rest still apply.
pub fn apply_line_edits(original: &str, edits: &[LineEdit]) -> (String, Vec<String>) {
    let (lines, trailing_newline) = split_lines(original);
    let mut lines: Vec<String> = lines.into_iter().map(str::to_string).collect();
    let mut warnings = Vec::new();

    let mut ordered: Vec<&LineEdit> = edits.iter().collect();
    ordered.sort_by(|a, b| b.line.cmp(&a.line));

    for edit in ordered {
        if edit.line == 0 {
            warnings.push("skipped edit at line 0: lines are 1-based".to_string());
            continue;
        }
        let at = edit.line - 1;
        match (&edit.old, &edit.new) {
            (Some(old), new) => {
                let Some(actual) = lines.get(at) else {
                    warnings.push(format!(
                        "skipped edit at line {}: document has only {} lines",
                        edit.line,
                        lines.len()
                    ));
                    continue;
                };
                if actual.trim_end_matches('\r') != old.trim_end_matches('\r') {
                    tracing::debug!(line = edit.line, "line edit precondition mismatch");
                    warnings.push(format!(
                        "skipped edit at line {}: expected {:?}, found {:?}",
                        edit.line, old, actual
                    ));
                    continue;
                }
                match new {
                    Some(new) => {
                        let (replacement, _) = split_lines(new);
                        let replacement: Vec<String> = if replacement.is_empty() {
                            vec![String::new()]
                        } else {
                            replacement.into_iter().map(str::to_string).collect()
                        };
                        lines.splice(at..=at, replacement);
                    }
                    None => {
                        lines.remove(at);
                    }
                }
            }
            (None, Some(new)) => {
                if at > lines.len() {
                    warnings.push(format!(
                        "skipped insert at line {}: document has only {} lines",
                        edit.line,
                        lines.len()
                    ));
                    continue;
                }
                let (inserted, _) = split_lines(new);
                let inserted: Vec<String> = if inserted.is_empty() {
                    vec![String::new()]
                } else {
                    inserted.into_iter().map(str::to_string).collect()
                };
                lines.splice(at..at, inserted);
            }
            (None, None) => {
                warnings.push(format!(
                    "skipped edit at line {}: neither old nor new content given",
                    edit.line
                ));
            }
        }
    }

    (join_lines(&lines, trailing_newline), warnings)
}

/// Replaces every match across the whole content; returns the new content
/// and the number of replacements.
pub fn search_and_replace(
    original: &str,
    search: &str,
    replace: &str,
    regex: bool,
    ignore_case: bool,
) -> Result<(String, usize), PreviewError> {
    if search.is_empty() {
        return Err(PreviewError::InvalidArgument {
            tool: SEARCH_REPLACE_TOOL,
            argument: "search",
            reason: "must not be empty".to_string(),
        });
    }

    if regex {
        let pattern = RegexBuilder::new(search)
            .case_insensitive(ignore_case)
            .multi_line(true)
            .build()
            .map_err(|error| PreviewError::InvalidPattern(error.to_string()))?;
        let count = pattern.find_iter(original).count();
        let replaced = pattern.replace_all(original, replace).into_owned();
        return Ok((replaced, count));
    }

    if !ignore_case {
        let count = original.matches(search).count();
        return Ok((original.replace(search, replace), count));
    }

    let pattern = RegexBuilder::new(&regex::escape(search))
        .case_insensitive(true)
        .build()
        .map_err(|error| PreviewError::InvalidPattern(error.to_string()))?;
    let count = pattern.find_iter(original).count();
    let replaced = pattern.replace_all(original, NoExpand(replace)).into_owned();
    Ok((replaced, count))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn edit(line: usize, old: Option<&str>, new: Option<&str>) -> LineEdit {
        LineEdit {
            line,
            old: old.map(str::to_string),
            new: new.map(str::to_string),
        }
    }

    #[test]
    fn test_write_keeps_null_content_distinct_from_empty() {
        let delete = FileEdit::from_tool_call("write_file", &json!({"path": "a.md"})).unwrap();
        assert!(delete.is_delete());
        assert_eq!(delete.apply("X").unwrap().content, None);

        let null = FileEdit::from_tool_call("write_file", &json!({"path": "a.md", "content": null}))
            .unwrap();
        assert!(null.is_delete());

        let empty =
            FileEdit::from_tool_call("write_file", &json!({"path": "a.md", "content": ""})).unwrap();
        assert_eq!(empty.apply("X").unwrap().content.as_deref(), Some(""));
    }

    #[test]
    fn test_insert_positions() {
        let original = "a\nb\nc\n";
        assert_eq!(insert_at_line(original, 1, "x"), "x\na\nb\nc\n");
        assert_eq!(insert_at_line(original, 3, "x\ny"), "a\nb\nx\ny\nc\n");
        assert_eq!(insert_at_line(original, 0, "z"), "a\nb\nc\nz\n");
        assert_eq!(insert_at_line(original, 99, "z"), "a\nb\nc\nz\n");
        assert_eq!(insert_at_line("", 0, "first"), "first");
    }

    #[test]
    fn test_line_edits_apply_back_to_front() {
        let original = "one\ntwo\nthree\nfour\n";
        let edits = vec![
            edit(1, Some("one"), None),
            edit(3, Some("three"), Some("THREE\nTHREE-B")),
        ];
        let (content, warnings) = apply_line_edits(original, &edits);
        assert_eq!(content, "two\nTHREE\nTHREE-B\nfour\n");
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_line_edit_mismatch_skips_only_that_edit() {
        let original = "one\ntwo\nthree";
        let edits = vec![
            edit(1, Some("one"), Some("ONE")),
            edit(2, Some("not two"), Some("TWO")),
            edit(3, Some("three"), Some("THREE")),
        ];
        let (content, warnings) = apply_line_edits(original, &edits);
        assert_eq!(content, "ONE\ntwo\nTHREE");
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("line 2"));
    }

    #[test]
    fn test_line_edits_are_deterministic() {
        let original = "a\nb\nc\nd";
        let edits = vec![
            edit(4, Some("d"), None),
            edit(2, None, Some("inserted")),
            edit(9, Some("zz"), Some("nope")),
        ];
        let first = apply_line_edits(original, &edits);
        let second = apply_line_edits(original, &edits);
        assert_eq!(first, second);
        assert_eq!(first.0, "a\ninserted\nb\nc");
        assert_eq!(first.1.len(), 1);
    }

    #[test]
    fn test_edit_lines_accepts_edits_alias_and_rejects_bad_shape() {
        let parsed = FileEdit::from_tool_call(
            "edit_lines",
            &json!({"path": "a.md", "edits": [{"line": 1, "old": "a", "new": "b"}]}),
        )
        .unwrap();
        assert_eq!(
            parsed,
            FileEdit::LineDiff {
                edits: vec![edit(1, Some("a"), Some("b"))]
            }
        );
        assert!(matches!(
            FileEdit::from_tool_call("edit_lines", &json!({"replacements": "oops"})),
            Err(PreviewError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_search_replace_modes() {
        let text = "Cat cat CAT";
        assert_eq!(
            search_and_replace(text, "cat", "dog", false, false).unwrap(),
            ("Cat dog CAT".to_string(), 1)
        );
        assert_eq!(
            search_and_replace(text, "cat", "dog", false, true).unwrap(),
            ("dog dog dog".to_string(), 3)
        );
        assert_eq!(
            search_and_replace(text, r"^c\w+", "X", true, true).unwrap(),
            ("X cat CAT".to_string(), 1)
        );
        assert_eq!(
            search_and_replace("v1 v22", r"v(\d+)", "version-$1", true, false).unwrap(),
            ("version-1 version-22".to_string(), 2)
        );
        assert!(matches!(
            search_and_replace(text, "(", "", true, false),
            Err(PreviewError::InvalidPattern(_))
        ));
    }

    #[test]
    fn test_ignore_case_folds_non_ascii_and_keeps_replacement_literal() {
        assert_eq!(
            search_and_replace("Äpfel und äpfel", "äpfel", "Birnen", false, true).unwrap(),
            ("Birnen und Birnen".to_string(), 2)
        );
        assert_eq!(
            search_and_replace("Straße (alt)", "STRASSE (ALT)", "x", false, true).unwrap(),
            ("Straße (alt)".to_string(), 0)
        );
        assert_eq!(
            search_and_replace("price: 5$", "PRICE", "cost $1", false, true).unwrap(),
            ("cost $1: 5$".to_string(), 1)
        );
    }

    #[test]
    fn test_search_without_match_warns() {
        let edit = FileEdit::from_tool_call(
            "search_replace",
            &json!({"path": "a.md", "search": "zzz", "replace": "y"}),
        )
        .unwrap();
        let outcome = edit.apply("abc").unwrap();
        assert_eq!(outcome.content.as_deref(), Some("abc"));
        assert_eq!(outcome.warnings.len(), 1);
    }

    #[test]
    fn test_unknown_tool_is_unsupported() {
        assert_eq!(
            FileEdit::from_tool_call("read_file", &json!({})),
            Err(PreviewError::UnsupportedTool("read_file".to_string()))
        );
        assert!(!is_file_edit_tool("read_file"));
    }
}
