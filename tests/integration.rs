use std::fs;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::thread::JoinHandle;
use tempfile::TempDir;

const TOKEN_ENV: &str = "PULSE_IT_TOKEN";

const FIXTURE: &str = "\
title,number,url,assignees,labels,status,created_at,updated_at
Login bug,1,https://github.com/acme/app/issues/1,\"alice, bob\",bug,Done,2024-01-05T10:00:00,2024-01-09T10:00:00
Signup flow,2,https://github.com/acme/app/issues/2,alice,\"feature, ui\",In Progress,2024-01-20T10:00:00,2024-02-01T10:00:00
Docs pass,,,,,Closed,2024-03-02T10:00:00,2024-03-04T10:00:00
Idea,,,,,,2024-03-15T10:00:00,2024-03-15T10:00:00
";

fn pulse_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_pulse"))
}

fn setup_test_env(api_url: &str) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    fs::create_dir_all(root.join("data")).unwrap();

    let config_content = format!(
        r#"[github]
org = "acme"
project_number = 42
api_url = "{}"
token_env = "{}"
timeout_secs = 5

[output]
dir = "{}/data"
prefix = "shop"
"#,
        api_url,
        TOKEN_ENV,
        root.display()
    );

    let config_path = config_dir.join("pulse.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_pulse(config_path: &Path, args: &[&str], token: Option<&str>) -> (String, String, bool) {
    let binary = pulse_binary();
    let mut cmd = Command::new(&binary);
    cmd.arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env_remove("PULSE_LOG");
    match token {
        Some(t) => cmd.env(TOKEN_ENV, t),
        None => cmd.env_remove(TOKEN_ENV),
    };
    let output = cmd
        .output()
        .unwrap_or_else(|e| panic!("Failed to run pulse binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

fn write_fixture(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, FIXTURE).unwrap();
    path
}

fn data_files(config_path: &Path) -> Vec<PathBuf> {
    let data = config_path.parent().unwrap().parent().unwrap().join("data");
    let mut files: Vec<PathBuf> = fs::read_dir(data)
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    files.sort();
    files
}

fn read_request(stream: &mut TcpStream) -> String {
    let mut request = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = stream.read(&mut chunk).unwrap();
        if n == 0 {
            break;
        }
        request.extend_from_slice(&chunk[..n]);
        if let Some(end) = request.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&request[..end]).to_lowercase();
            let len = head
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .map(|v| v.trim().parse::<usize>().unwrap())
                .unwrap_or(0);
            if request.len() >= end + 4 + len {
                break;
            }
        }
    }
    String::from_utf8_lossy(&request).to_string()
}

/// Local GraphQL stand-in: answers one request per connection with the next
/// canned JSON body and returns the raw requests it received.
fn serve_graphql(bodies: Vec<serde_json::Value>) -> (String, JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}/graphql", listener.local_addr().unwrap());
    let handle = std::thread::spawn(move || {
        let mut requests = Vec::new();
        for body in bodies {
            let (mut stream, _) = listener.accept().unwrap();
            requests.push(read_request(&mut stream));
            let body = body.to_string();
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            stream.write_all(response.as_bytes()).unwrap();
        }
        requests
    });
    (url, handle)
}

fn project_responses() -> Vec<serde_json::Value> {
    vec![
        serde_json::json!({ "data": { "organization": { "projectV2": { "id": "PVT_42" } } } }),
        serde_json::json!({
            "data": { "node": { "items": {
                "pageInfo": { "hasNextPage": false, "endCursor": "c1" },
                "nodes": [
                    {
                        "id": "PVTI_1",
                        "createdAt": "2024-01-01T00:00:00Z",
                        "updatedAt": "2024-01-02T00:00:00Z",
                        "content": {
                            "__typename": "Issue",
                            "title": "Fix login",
                            "number": 12,
                            "url": "https://github.com/acme/app/issues/12",
                            "assignees": { "nodes": [{ "login": "alice" }, { "login": "bob" }] },
                            "labels": { "nodes": [{ "name": "bug" }] },
                            "createdAt": "2024-01-03T09:00:00Z",
                            "updatedAt": "2024-01-04T09:00:00Z"
                        },
                        "fieldValues": { "nodes": [{ "name": "Done", "field": { "name": "Status" } }] }
                    },
                    {
                        "id": "PVTI_2",
                        "createdAt": "2024-01-01T00:00:00Z",
                        "updatedAt": "2024-01-02T00:00:00Z",
                        "content": null,
                        "fieldValues": { "nodes": [] }
                    }
                ]
            } } }
        }),
    ]
}

#[test]
fn test_report_json_from_file() {
    let (tmp, config_path) = setup_test_env("http://127.0.0.1:9/graphql");
    let csv = write_fixture(tmp.path(), "fixture.csv");

    let (stdout, stderr, success) = run_pulse(
        &config_path,
        &["report", "--file", csv.to_str().unwrap(), "--format", "json"],
        None,
    );
    assert!(success, "report failed: stdout={}, stderr={}", stdout, stderr);

    let json: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(json["total"], 4);
    assert_eq!(json["completed"], 2);
    assert_eq!(json["completion_rate"], 50.0);
    assert_eq!(json["mean_cycle_days"], 3.0);
    assert_eq!(json["range"]["start"], "2024-01-05");
    assert_eq!(json["range"]["end"], "2024-03-15");

    let months: Vec<&str> = json["trend"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["month"].as_str().unwrap())
        .collect();
    assert_eq!(months, vec!["2024-01", "2024-03"]);

    assert_eq!(json["workload"][0]["assignee"], "alice");
    assert_eq!(json["workload"][0]["open"], 1);
    assert_eq!(json["workload"][0]["closed"], 1);
    assert_eq!(json["workload"][1]["assignee"], "bob");

    assert_eq!(json["missing_metadata"].as_array().unwrap().len(), 2);
    assert_eq!(json["multi_owner"][0]["title"], "Login bug");
    // fixture dates are long past: both open items are stale
    assert_eq!(json["stale"].as_array().unwrap().len(), 2);
    assert!(json["recently_closed"].as_array().unwrap().is_empty());
}

#[test]
fn test_report_text_with_date_range() {
    let (tmp, config_path) = setup_test_env("http://127.0.0.1:9/graphql");
    let csv = write_fixture(tmp.path(), "fixture.csv");

    let (stdout, stderr, success) = run_pulse(
        &config_path,
        &[
            "report",
            "--file",
            csv.to_str().unwrap(),
            "--since",
            "2024-01-10",
        ],
        None,
    );
    assert!(success, "report failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Showing 3 items created between 2024-01-10 and 2024-03-15."));
    assert!(stdout.contains("Completion Rate (%): 33.3"));
    assert!(stdout.contains("Average Days to Completion: 2.0"));
    assert!(stdout.contains("No items with multiple assignees found."));
    assert!(stdout.contains("No recently closed items found."));
}

#[test]
fn test_report_rejects_inverted_range() {
    let (tmp, config_path) = setup_test_env("http://127.0.0.1:9/graphql");
    let csv = write_fixture(tmp.path(), "fixture.csv");

    let (_, stderr, success) = run_pulse(
        &config_path,
        &[
            "report",
            "--file",
            csv.to_str().unwrap(),
            "--since",
            "2024-03-01",
            "--until",
            "2024-01-01",
        ],
        None,
    );
    assert!(!success);
    assert!(stderr.contains("--since"), "stderr={}", stderr);
}

#[test]
fn test_report_uses_latest_snapshot() {
    let (_tmp, config_path) = setup_test_env("http://127.0.0.1:9/graphql");
    let data = config_path.parent().unwrap().parent().unwrap().join("data");

    fs::write(
        data.join("shop_42_items_2024-01-01.csv"),
        "title,number,url,assignees,labels,status,created_at,updated_at\n",
    )
    .unwrap();
    write_fixture(&data, "shop_42_items_2024-05-01.csv");

    let (stdout, stderr, success) =
        run_pulse(&config_path, &["report", "--format", "json"], None);
    assert!(success, "report failed: stdout={}, stderr={}", stdout, stderr);
    let json: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(json["total"], 4);
}

#[test]
fn test_report_without_snapshot_fails() {
    let (_tmp, config_path) = setup_test_env("http://127.0.0.1:9/graphql");

    let (_, stderr, success) = run_pulse(&config_path, &["report"], None);
    assert!(!success);
    assert!(stderr.contains("no snapshot found"), "stderr={}", stderr);
}

#[test]
fn test_report_bad_timestamp_names_row() {
    let (tmp, config_path) = setup_test_env("http://127.0.0.1:9/graphql");
    let csv = tmp.path().join("broken.csv");
    fs::write(
        &csv,
        "title,number,url,assignees,labels,status,created_at,updated_at\n\
         A,1,,,,,yesterday,2024-01-01T00:00:00\n",
    )
    .unwrap();

    let (_, stderr, success) =
        run_pulse(&config_path, &["report", "--file", csv.to_str().unwrap()], None);
    assert!(!success);
    assert!(stderr.contains("row 1"), "stderr={}", stderr);
}

#[test]
fn test_status_lists_latest_snapshot() {
    let (_tmp, config_path) = setup_test_env("http://127.0.0.1:9/graphql");

    let (stdout, stderr, success) = run_pulse(&config_path, &["status"], None);
    assert!(success, "status failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("acme/42"));
    assert!(stdout.contains("NOT SET"));
    assert!(stdout.contains("none"));

    let data = config_path.parent().unwrap().parent().unwrap().join("data");
    write_fixture(&data, "shop_42_items_2024-05-01.csv");

    let (stdout, _, success) = run_pulse(&config_path, &["status"], Some("t0ken"));
    assert!(success);
    assert!(stdout.contains("set ($PULSE_IT_TOKEN)"));
    assert!(stdout.contains("shop_42_items_2024-05-01.csv (4 records)"));
}

#[test]
fn test_sync_requires_token() {
    let (_tmp, config_path) = setup_test_env("http://127.0.0.1:9/graphql");

    let (_, stderr, success) = run_pulse(&config_path, &["sync", "--progress", "off"], None);
    assert!(!success);
    assert!(stderr.contains(TOKEN_ENV), "stderr={}", stderr);
    assert!(data_files(&config_path).is_empty());
}

#[test]
fn test_sync_unreachable_endpoint_writes_nothing() {
    let (_tmp, config_path) = setup_test_env("http://127.0.0.1:9/graphql");

    let (stdout, stderr, success) = run_pulse(
        &config_path,
        &["sync", "--progress", "off"],
        Some("t0ken"),
    );
    assert!(!success, "sync unexpectedly succeeded: {}", stdout);
    assert!(stderr.contains("failed to resolve project acme/42"), "stderr={}", stderr);
    assert!(data_files(&config_path).is_empty());
}

#[test]
fn test_invalid_config_is_rejected() {
    let (_tmp, config_path) = setup_test_env("http://127.0.0.1:9/graphql");
    fs::write(
        &config_path,
        "[github]\norg = \"acme\"\nproject_number = 42\npage_size = 500\n",
    )
    .unwrap();

    let (_, stderr, success) = run_pulse(&config_path, &["status"], None);
    assert!(!success);
    assert!(stderr.contains("page_size"), "stderr={}", stderr);
}

#[test]
fn test_sync_writes_dated_snapshot() {
    let (url, server) = serve_graphql(project_responses());
    let (_tmp, config_path) = setup_test_env(&url);

    let (stdout, stderr, success) = run_pulse(
        &config_path,
        &["sync", "--progress", "off"],
        Some("t0ken"),
    );
    assert!(success, "sync failed: stdout={}, stderr={}", stdout, stderr);

    let requests = server.join().unwrap();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].to_lowercase().contains("bearer t0ken"));
    assert!(requests[1].contains("PVT_42"));

    let files = data_files(&config_path);
    assert_eq!(files.len(), 1);
    let name = files[0].file_name().unwrap().to_str().unwrap().to_string();
    let date = name
        .strip_prefix("shop_42_items_")
        .and_then(|rest| rest.strip_suffix(".csv"))
        .unwrap_or_else(|| panic!("unexpected snapshot name {}", name));
    assert!(chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d").is_ok(), "{}", name);

    let content = fs::read_to_string(&files[0]).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(
        lines,
        vec![
            "title,number,url,assignees,labels,status,created_at,updated_at",
            "Fix login,12,https://github.com/acme/app/issues/12,\"alice, bob\",bug,Done,2024-01-03T09:00:00,2024-01-04T09:00:00",
            "(No title),,,,,,2024-01-01T00:00:00,2024-01-02T00:00:00",
        ]
    );

    assert!(stdout.contains("sync acme/42"));
    assert!(stdout.contains("fetched: 2 items"));
    assert!(stdout.contains("pages: 1"));
    assert!(stdout.contains("fingerprint: "));
    assert!(stdout.contains(&format!("saved: {}", files[0].display())));
    assert_eq!(stdout.lines().last(), Some("ok"));
}

#[test]
fn test_sync_dry_run_writes_nothing() {
    let (url, server) = serve_graphql(project_responses());
    let (_tmp, config_path) = setup_test_env(&url);

    let (stdout, stderr, success) = run_pulse(
        &config_path,
        &["sync", "--dry-run", "--progress", "off"],
        Some("t0ken"),
    );
    assert!(success, "sync failed: stdout={}, stderr={}", stdout, stderr);
    assert_eq!(server.join().unwrap().len(), 2);

    assert!(stdout.contains("sync acme/42 (dry-run)"));
    assert!(stdout.contains("fetched: 2 items"));
    assert!(stdout.contains("pages: 1"));
    assert!(!stdout.contains("saved:"));
    assert!(data_files(&config_path).is_empty());
}
