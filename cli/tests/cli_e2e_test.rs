use assert_cmd::{Command, cargo_bin_cmd};
use predicates::prelude::*;
use serde_json::json;
use std::fs;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn mirror(root: &TempDir) -> Command {
    let mut cmd = cargo_bin_cmd!("mirror");
    for var in [
        "MIRROR_BASE_URL",
        "MIRROR_SPACE_KEY",
        "MIRROR_SPACE_ID",
        "MIRROR_ROOT",
        "MIRROR_TOKEN_ENV",
        "MIRROR_API_TOKEN"
    ] {
        cmd.env_remove(var);
    }
    cmd.env("NO_COLOR", "1");
    cmd.arg("--root").arg(root.path());
    cmd
}

async fn remote_space() -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v2/spaces"))
        .and(query_param("keys", "DOCS"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{ "id": "S1", "key": "DOCS", "name": "Documentation", "homepageId": "1" }]
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v2/spaces/S1/pages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                { "id": "1", "title": "Home", "version": { "number": 1 } },
                { "id": "2", "title": "Guide", "parentId": "1", "version": { "number": 2 } }
            ]
        })))
        .mount(&server)
        .await;

    for (id, title, parent, version, body) in [
        ("1", "Home", None, 1, "Welcome. See [the guide](page://2)."),
        ("2", "Guide", Some("1"), 2, "Step one.")
    ] {
        Mock::given(method("GET"))
            .and(path(format!("/api/v2/pages/{}", id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": id,
                "title": title,
                "parentId": parent,
                "version": { "number": version },
                "body": { "storage": { "representation": "storage", "value": body } }
            })))
            .mount(&server)
            .await;
    }

    server
}

#[test]
fn test_help_lists_commands() {
    let root = TempDir::new().unwrap();
    mirror(&root)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("init"))
        .stdout(predicate::str::contains("pull"))
        .stdout(predicate::str::contains("push"))
        .stdout(predicate::str::contains("status"));
}

#[test]
fn test_version() {
    let root = TempDir::new().unwrap();
    mirror(&root)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_commands_outside_a_mirror_exit_not_configured() {
    let root = TempDir::new().unwrap();
    for command in ["pull", "push", "status"] {
        mirror(&root)
            .arg(command)
            .assert()
            .code(2)
            .stderr(predicate::str::contains("mirror init"));
    }
}

#[test]
fn test_init_without_url_fails() {
    let root = TempDir::new().unwrap();
    mirror(&root)
        .args(["init", "--space", "DOCS"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("No remote URL configured"));
    assert!(!root.path().join(".mirror").join("config.toml").exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_init_writes_config_and_state() {
    let server = remote_space().await;
    let root = TempDir::new().unwrap();

    mirror(&root)
        .args(["init", "--space", "DOCS", "--url", server.uri().as_str()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Mirroring Documentation (DOCS)"));

    let config = fs::read_to_string(root.path().join(".mirror/config.toml")).unwrap();
    assert!(config.contains("key = \"DOCS\""));
    assert!(config.contains("id = \"S1\""));
    assert!(config.contains(&server.uri()));

    let state: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(root.path().join(".mirror/state.json")).unwrap())
            .unwrap();
    assert_eq!(state["spaceId"], "S1");
    assert_eq!(state["homepageId"], "1");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_init_leaves_existing_config_without_force() {
    let server = remote_space().await;
    let root = TempDir::new().unwrap();
    let config_file = root.path().join(".mirror/config.toml");
    fs::create_dir_all(config_file.parent().unwrap()).unwrap();
    fs::write(&config_file, "# hand written\n").unwrap();

    mirror(&root)
        .args(["init", "--space", "DOCS", "--url", server.uri().as_str()])
        .assert()
        .success()
        .stderr(predicate::str::contains("already exists"));

    assert_eq!(fs::read_to_string(&config_file).unwrap(), "# hand written\n");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_init_unknown_space_exits_not_found() {
    let server = remote_space().await;
    let root = TempDir::new().unwrap();

    mirror(&root)
        .args(["init", "--space", "NOPE", "--url", server.uri().as_str()])
        .assert()
        .code(4);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_init_then_pull_then_status() {
    let server = remote_space().await;
    let root = TempDir::new().unwrap();

    mirror(&root)
        .args(["init", "--space", "DOCS", "--url", server.uri().as_str()])
        .assert()
        .success();

    mirror(&root)
        .args(["pull", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("+ Guide [2]"));
    assert!(!root.path().join("guide.md").exists());

    mirror(&root)
        .arg("pull")
        .assert()
        .success()
        .stdout(predicate::str::contains("guide.md"));

    let readme = fs::read_to_string(root.path().join("README.md")).unwrap();
    assert!(readme.contains("page_id: '1'") || readme.contains("page_id: \"1\""));
    assert!(readme.contains("[the guide](guide.md)"));
    assert!(
        fs::read_to_string(root.path().join("guide.md"))
            .unwrap()
            .contains("Step one.")
    );

    let output = mirror(&root)
        .args(["status", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let status: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(status["remote"]["added"], json!([]));
    assert_eq!(status["remote"]["modified"], json!([]));
    assert_eq!(status["local"], json!([]));
}
