//! End-to-end runs against a mock platform with a shell generator.
#![cfg(unix)]

use std::path::Path;
use std::sync::Arc;

use lockbot_core::{BranchPolicy, InstallationId, RepositoryIdentity, Subscription};
use lockbot_github::{AccessToken, GitHubClient, StaticTokenProvider};
use lockbot_reconcile::{CommandLockGenerator, ReconcileSettings, Reconciler, RunStatus, Step};
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const GENERATED_B64: &str = "eyJyZXBvIjoid2lkZ2V0cyJ9";

fn subscription() -> Subscription {
    Subscription {
        repository: RepositoryIdentity::new("acme", "widgets"),
        installation_id: InstallationId(42),
    }
}

fn reconciler(server: &MockServer, root: &Path, script: &str) -> Reconciler {
    let client = GitHubClient::new(&server.uri()).expect("client");
    Reconciler::new(
        Arc::new(client),
        Arc::new(StaticTokenProvider::new(AccessToken::new("ghs_e2e", None))),
        Arc::new(CommandLockGenerator::new(
            "sh",
            vec!["-c".into(), script.into(), "sh".into()],
        )),
        ReconcileSettings {
            workspace_root: root.to_path_buf(),
            branch_policy: BranchPolicy::default(),
        },
    )
}

async fn mount_repository(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/repos/acme/widgets"))
        .and(header("authorization", "Bearer ghs_e2e"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"default_branch": "main"})))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/widgets/git/refs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"ref": "refs/heads/main", "object": {"sha": "abc123"}},
        ])))
        .mount(server)
        .await;
}

async fn mount_pull_request(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/repos/acme/widgets/pulls"))
        .and(body_json(json!({
            "title": "Merge add-docker-lock as new version of package available",
            "head": "add-docker-lock",
            "base": "main",
            "maintainer_can_modify": true,
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "number": 12,
            "html_url": "https://github.com/acme/widgets/pull/12",
        })))
        .expect(1)
        .mount(server)
        .await;
}

fn assert_scratch_empty(root: &Path) {
    let leftovers: Vec<_> = std::fs::read_dir(root)
        .map(|entries| entries.flatten().map(|e| e.path()).collect())
        .unwrap_or_default();
    assert!(leftovers.is_empty(), "scratch not cleaned: {leftovers:?}");
}

#[tokio::test]
async fn fresh_repository_gets_branch_file_and_pull_request() {
    let server = MockServer::start().await;
    mount_repository(&server).await;
    Mock::given(method("POST"))
        .and(path("/repos/acme/widgets/git/refs"))
        .and(body_json(json!({"ref": "refs/heads/add-docker-lock", "sha": "abc123"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "ref": "refs/heads/add-docker-lock",
            "object": {"sha": "abc123"},
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/widgets/contents/"))
        .and(query_param("ref", "add-docker-lock"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"name": "Dockerfile", "sha": "d0d0"},
        ])))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/repos/acme/widgets/contents/docker-lock.json"))
        .and(body_json(json!({
            "message": "updating docker-lock.json",
            "content": GENERATED_B64,
            "branch": "add-docker-lock",
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"content": {"sha": "f00d"}})))
        .expect(1)
        .mount(&server)
        .await;
    mount_pull_request(&server).await;

    let root = TempDir::new().unwrap();
    let report = reconciler(
        &server,
        root.path(),
        r#"test "$3" = ghs_e2e || exit 9; printf '{"repo":"%s"}' "$1" > "$4/docker-lock.json""#,
    )
    .reconcile(&subscription())
    .await;

    assert_eq!(report.status, RunStatus::Succeeded, "{report:#?}");
    assert_scratch_empty(root.path());
}

#[tokio::test]
async fn existing_branch_and_file_update_with_blob_sha() {
    let server = MockServer::start().await;
    mount_repository(&server).await;
    Mock::given(method("POST"))
        .and(path("/repos/acme/widgets/git/refs"))
        .respond_with(
            ResponseTemplate::new(422).set_body_json(json!({"message": "Reference already exists"})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/widgets/contents/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"name": "docker-lock.json", "sha": "3d21ec53a331a6f037a91c368710b99387d012c1"},
        ])))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/repos/acme/widgets/contents/docker-lock.json"))
        .and(body_json(json!({
            "message": "updating docker-lock.json",
            "content": GENERATED_B64,
            "branch": "add-docker-lock",
            "sha": "3d21ec53a331a6f037a91c368710b99387d012c1",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"content": {"sha": "beef"}})))
        .expect(1)
        .mount(&server)
        .await;
    mount_pull_request(&server).await;

    let root = TempDir::new().unwrap();
    let report = reconciler(
        &server,
        root.path(),
        r#"printf '{"repo":"%s"}' "$1" > "$4/docker-lock.json""#,
    )
    .reconcile(&subscription())
    .await;

    assert_eq!(report.status, RunStatus::Succeeded, "{report:#?}");
    assert!(!report.outcome(Step::CreateBranch).unwrap().is_failed());
}

#[tokio::test]
async fn failing_generator_still_reaches_platform_and_cleans_up() {
    let server = MockServer::start().await;
    mount_repository(&server).await;
    Mock::given(method("POST"))
        .and(path("/repos/acme/widgets/git/refs"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "ref": "refs/heads/add-docker-lock",
            "object": {"sha": "abc123"},
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/widgets/contents/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;
    mount_pull_request(&server).await;

    let root = TempDir::new().unwrap();
    let report = reconciler(&server, root.path(), "echo 'pull failed' >&2; exit 1")
        .reconcile(&subscription())
        .await;

    assert!(report.outcome(Step::Generate).unwrap().is_failed());
    assert!(report.outcome(Step::Publish).unwrap().is_failed());
    assert_eq!(
        report.status,
        RunStatus::Partial {
            failed: vec![Step::Generate, Step::Publish]
        }
    );
    assert_scratch_empty(root.path());
}
