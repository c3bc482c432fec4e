use markpilot::api::{ApiClient, DocumentBackend, FsDocumentBackend, MemoryDocumentBackend};
use markpilot::config::Config;
use markpilot::state::{ConversationManager, MAIN_TAB_BAR_ID};
use markpilot::tools::edits::{insert_at_line, search_and_replace};
use markpilot::tools::FileEdit;
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

#[test]
fn test_search_replace_modes() {
    let text = "Alpha beta\nalpha gamma\n";

    let (plain, count) = search_and_replace(text, "alpha", "omega", false, false).expect("plain");
    assert_eq!(count, 1);
    assert_eq!(plain, "Alpha beta\nomega gamma\n");

    let (folded, count) = search_and_replace(text, "ALPHA", "omega", false, true).expect("folded");
    assert_eq!(count, 2);
    assert_eq!(folded, "omega beta\nomega gamma\n");

    let (regex, count) = search_and_replace(text, r"^(\w+) ", "$1: ", true, false).expect("regex");
    assert_eq!(count, 2);
    assert_eq!(regex, "Alpha: beta\nalpha: gamma\n");

    assert!(search_and_replace(text, "", "x", false, false).is_err());
    assert!(search_and_replace(text, "(", "x", true, false).is_err());
}

#[test]
fn test_insert_content_positions() {
    assert_eq!(insert_at_line("a\nb\n", 1, "top\n"), "top\na\nb\n");
    assert_eq!(insert_at_line("a\nb\n", 0, "end\n"), "a\nb\nend\n");
    assert_eq!(insert_at_line("a\nb\n", 99, "end"), "a\nb\nend\n");
}

#[test]
fn test_unknown_tool_is_not_an_edit() {
    assert!(FileEdit::from_tool_call("run_shell", &json!({"command": "ls"})).is_err());
    assert!(FileEdit::from_tool_call("search_replace", &json!({"path": "a.md"})).is_err());

    let edit = FileEdit::from_tool_call("write_file", &json!({"path": "a.md"})).expect("edit");
    assert!(edit.is_delete());
}

#[tokio::test]
async fn test_fs_backend_creates_nested_documents() {
    let temp = TempDir::new().expect("temp dir");
    let backend = FsDocumentBackend::new(temp.path().to_path_buf());

    backend
        .save("journal/2024/day.md", "# Day\n")
        .await
        .expect("save");
    let on_disk = std::fs::read_to_string(temp.path().join("journal/2024/day.md")).expect("read");
    assert_eq!(on_disk, "# Day\n");
    assert!(backend.fetch("../outside.md").await.is_err());
}

#[tokio::test]
async fn test_session_document_lifecycle_without_a_turn() {
    let temp = TempDir::new().expect("temp dir");
    std::fs::write(temp.path().join("a.md"), "first\n").expect("seed file");
    let backend = Arc::new(FsDocumentBackend::new(temp.path().to_path_buf()));
    let config = Config::default();
    let client = ApiClient::new(&config).expect("client");
    let mut manager = ConversationManager::new(client, backend, &config);

    manager.open_document("a.md").await.expect("open");
    assert_eq!(manager.workspace().current("a.md"), Some("first\n"));

    manager.edit_document("a.md", "second\n").expect("edit");
    assert!(manager.is_dirty("a.md"));
    manager.save_document("a.md").await.expect("save");
    assert!(!manager.is_dirty("a.md"));
    let on_disk = std::fs::read_to_string(temp.path().join("a.md")).expect("read");
    assert_eq!(on_disk, "second\n");

    let split = manager.split_pane(MAIN_TAB_BAR_ID, "a.md").expect("split");
    assert!(!manager.close_tab(MAIN_TAB_BAR_ID, "a.md").expect("close"));
    assert!(manager.close_tab(&split, "a.md").expect("close"));
    assert!(manager.workspace().current("a.md").is_none());
}

#[tokio::test]
async fn test_memory_backend_save_failure_keeps_document_dirty() {
    let backend = MemoryDocumentBackend::with_documents([("a.md", "X")]);
    let config = Config::default();
    let client = ApiClient::new(&config).expect("client");
    let mut manager = ConversationManager::new(client, Arc::new(backend.clone()), &config);

    manager.open_document("a.md").await.expect("open");
    manager.edit_document("a.md", "XY").expect("edit");
    backend.set_fail_saves(true);

    assert!(manager.save_document("a.md").await.is_err());
    assert!(manager.is_dirty("a.md"));
    assert_eq!(backend.get("a.md").as_deref(), Some("X"));
}
