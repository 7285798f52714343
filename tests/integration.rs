use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn gmuse_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("gmuse");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    // Files to add as documents
    let files_dir = root.join("files");
    fs::create_dir_all(&files_dir).unwrap();
    fs::write(
        files_dir.join("factor.txt"),
        "FACTOR Juried Sound Recording grant guidelines.\n\nEligibility: Canadian citizens and \
         permanent residents with a completed demo.\n\nDeadline: May 30. Late applications are \
         not accepted.",
    )
    .unwrap();
    fs::write(
        files_dir.join("touring.txt"),
        "Touring and showcase support program.\n\nCovers travel costs for showcase performances \
         at approved festivals.",
    )
    .unwrap();

    let config_content = format!(
        r#"[db]
path = "{root}/data/grantmuse.sqlite"

[storage]
root = "{root}/blobs"

[server]
bind = "127.0.0.1:7431"
"#,
        root = root.display()
    );

    let config_path = config_dir.join("grantmuse.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_gmuse(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = gmuse_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run gmuse binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

/// Pull the document id out of `gmuse add` output.
fn parse_added_id(stdout: &str) -> String {
    stdout
        .lines()
        .find_map(|line| line.trim().strip_prefix("id:"))
        .map(|id| id.trim().to_string())
        .unwrap_or_else(|| panic!("no id in add output: {}", stdout))
}

#[test]
fn test_init_creates_database() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_gmuse(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_gmuse(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_gmuse(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_add_and_process_document() {
    let (tmp, config_path) = setup_test_env();
    run_gmuse(&config_path, &["init"]);

    let file = tmp.path().join("files/factor.txt");
    let (stdout, stderr, success) = run_gmuse(&config_path, &["add", file.to_str().unwrap()]);
    assert!(success, "add failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("added factor.txt"));
    let id = parse_added_id(&stdout);

    let (stdout, stderr, success) = run_gmuse(&config_path, &["process", &id]);
    assert!(success, "process failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("category: Recording Grants"));
    assert!(stdout.contains("grant"));
    assert!(stdout.contains("factor"));
    assert!(stdout.contains("ok"));
}

#[test]
fn test_list_and_get_show_processed_content() {
    let (tmp, config_path) = setup_test_env();
    run_gmuse(&config_path, &["init"]);

    let file = tmp.path().join("files/touring.txt");
    let (stdout, _, _) = run_gmuse(&config_path, &["add", file.to_str().unwrap()]);
    let id = parse_added_id(&stdout);

    // Unprocessed documents are flagged as such
    let (stdout, _, _) = run_gmuse(&config_path, &["list"]);
    assert!(stdout.contains("touring.txt"));
    assert!(stdout.contains("unprocessed"));

    run_gmuse(&config_path, &["process", &id]);

    let (stdout, _, _) = run_gmuse(&config_path, &["list"]);
    assert!(stdout.contains("Touring & Showcase Grants"));

    let (stdout, _, success) = run_gmuse(&config_path, &["get", &id]);
    assert!(success);
    assert!(stdout.contains("Touring and showcase support program."));
    assert!(stdout.contains("\"chunkCount\":"));
}

#[test]
fn test_process_is_idempotent() {
    let (tmp, config_path) = setup_test_env();
    run_gmuse(&config_path, &["init"]);

    let file = tmp.path().join("files/factor.txt");
    let (stdout, _, _) = run_gmuse(&config_path, &["add", file.to_str().unwrap()]);
    let id = parse_added_id(&stdout);

    let (first, _, ok1) = run_gmuse(&config_path, &["process", &id]);
    let (second, _, ok2) = run_gmuse(&config_path, &["process", &id]);
    assert!(ok1 && ok2);
    assert_eq!(first, second);
}

#[test]
fn test_tag_appears_in_metadata() {
    let (tmp, config_path) = setup_test_env();
    run_gmuse(&config_path, &["init"]);

    let file = tmp.path().join("files/touring.txt");
    let (stdout, _, _) = run_gmuse(&config_path, &["add", file.to_str().unwrap()]);
    let id = parse_added_id(&stdout);

    let (_, _, success) = run_gmuse(&config_path, &["tag", &id, "Ontario"]);
    assert!(success);

    let (stdout, _, _) = run_gmuse(&config_path, &["get", &id]);
    assert!(stdout.contains("ontario"));
}

#[test]
fn test_delete_removes_document_and_blob() {
    let (tmp, config_path) = setup_test_env();
    run_gmuse(&config_path, &["init"]);

    let file = tmp.path().join("files/factor.txt");
    let (stdout, _, _) = run_gmuse(&config_path, &["add", file.to_str().unwrap()]);
    let id = parse_added_id(&stdout);

    let (_, _, success) = run_gmuse(&config_path, &["delete", &id]);
    assert!(success);

    let (stdout, _, _) = run_gmuse(&config_path, &["list"]);
    assert!(stdout.contains("No documents."));

    // Blob store no longer holds the file
    let blob_files = walk_files(&tmp.path().join("blobs"));
    assert!(blob_files.is_empty(), "leftover blobs: {:?}", blob_files);
}

#[test]
fn test_process_unknown_document_fails() {
    let (_tmp, config_path) = setup_test_env();
    run_gmuse(&config_path, &["init"]);

    let (_, stderr, success) = run_gmuse(&config_path, &["process", "no-such-id"]);
    assert!(!success);
    assert!(stderr.contains("not found"));
}

#[test]
fn test_get_unknown_document_fails() {
    let (_tmp, config_path) = setup_test_env();
    run_gmuse(&config_path, &["init"]);

    let (_, stderr, success) = run_gmuse(&config_path, &["get", "no-such-id"]);
    assert!(!success);
    assert!(stderr.contains("not found"));
}

fn walk_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    if let Ok(entries) = fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                files.extend(walk_files(&path));
            } else {
                files.push(path);
            }
        }
    }
    files
}
