use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::os::unix::net::UnixStream as StdUnixStream;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, mpsc, oneshot, RwLock};
use tokio::time::{Instant, MissedTickBehavior};

use lockbot_core::config::{self, lockbot_root};
use lockbot_core::{Config, RepositoryIdentity};
use lockbot_reconcile::pipeline::{self, ReconcileScope};
use lockbot_reconcile::{build_reconciler, ReconcileReport, Reconciler, RunStatus};

use crate::error::{io_err, DaemonError};
use crate::paths::socket_path;
use crate::protocol::{DaemonRequest, DaemonResponse};

/// Most recent report per repository.
pub type RunHistory = HashMap<RepositoryIdentity, ReconcileReport>;

struct ReconcileJob {
    scope: ReconcileScope,
    source: &'static str,
    respond_to: oneshot::Sender<Result<PassSummary, String>>,
}

/// Result of one reconcile pass, as returned over the socket.
#[derive(Debug, Clone, Serialize)]
pub struct PassSummary {
    pub target: String,
    pub source: String,
    pub reports: Vec<ReconcileReport>,
    pub duration_ms: u128,
}

#[derive(Clone)]
struct DaemonState {
    home: PathBuf,
    config: Arc<RwLock<Config>>,
    history: Arc<RwLock<RunHistory>>,
    reconciler: Arc<Reconciler>,
    started_at: DateTime<Utc>,
}

/// Start the daemon runtime and block the current thread until it exits.
pub fn start_blocking(home: &Path, json_logs: bool) -> Result<(), DaemonError> {
    init_tracing(json_logs);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(home.to_path_buf()))
}

/// Run the daemon runtime.
pub async fn run(home: PathBuf) -> Result<(), DaemonError> {
    ensure_runtime_dirs(&home)?;

    let config = config::load_at(&home)?;
    let reconciler = Arc::new(build_reconciler(&home, &config)?);
    let interval = config.interval();
    tracing::info!(
        interval_secs = interval.as_secs(),
        repositories = config.repositories.len(),
        api_base_url = %config.api_base_url,
        "daemon starting",
    );

    let state = DaemonState {
        home: home.clone(),
        config: Arc::new(RwLock::new(config)),
        history: Arc::new(RwLock::new(RunHistory::new())),
        reconciler,
        started_at: Utc::now(),
    };

    let (job_tx, job_rx) = mpsc::channel::<ReconcileJob>(64);
    let (shutdown_tx, _) = broadcast::channel::<()>(16);

    let scheduler_handle = {
        let shutdown = shutdown_tx.clone();
        let job_tx = job_tx.clone();
        tokio::spawn(async move {
            let result = scheduler_task(interval, job_tx, shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    };

    let processor_handle = {
        let shutdown = shutdown_tx.clone();
        let state = state.clone();
        tokio::spawn(async move {
            let result = processor_task(state, job_rx, shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    };

    let socket_handle = {
        let shutdown = shutdown_tx.clone();
        let state = state.clone();
        let job_tx = job_tx.clone();
        tokio::spawn(async move {
            let result =
                socket_server_task(state, job_tx, shutdown.clone(), shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    };

    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            let mut shutdown_rx = shutdown.subscribe();
            tokio::select! {
                _ = shutdown_rx.recv() => Ok(()),
                signal = wait_for_signal() => {
                    match signal {
                        Ok(name) => {
                            tracing::info!(signal = name, "received signal, shutting down daemon");
                            let _ = shutdown.send(());
                            Ok(())
                        }
                        Err(err) => Err(DaemonError::Protocol(format!("signal handler failed: {err}"))),
                    }
                }
            }
        })
    };

    let (scheduler_result, processor_result, socket_result, signal_result) = tokio::join!(
        scheduler_handle,
        processor_handle,
        socket_handle,
        signal_handle
    );

    handle_join("scheduler", scheduler_result)?;
    handle_join("reconcile_processor", processor_result)?;
    handle_join("socket_server", socket_result)?;
    handle_join("signal_handler", signal_result)?;
    tracing::info!("daemon stopped");
    Ok(())
}

/// Enqueue a full pass on every tick. The first tick fires immediately.
///
/// Passes are not awaited here: a slow pass never delays the next tick, and
/// overlapping runs for one repository are turned away by its lease.
async fn scheduler_task(
    period: Duration,
    job_tx: mpsc::Sender<ReconcileJob>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = ticker.tick() => {
                let job_tx = job_tx.clone();
                tokio::spawn(async move {
                    match enqueue_reconcile(&job_tx, ReconcileScope::All, "scheduler").await {
                        Ok(summary) => tracing::info!(
                            repositories = summary.reports.len(),
                            duration_ms = summary.duration_ms,
                            "scheduled reconcile pass completed",
                        ),
                        Err(err) => tracing::error!(error = %err, "scheduled reconcile pass failed"),
                    }
                });
            }
        }
    }
    Ok(())
}

async fn processor_task(
    state: DaemonState,
    mut job_rx: mpsc::Receiver<ReconcileJob>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            maybe_job = job_rx.recv() => {
                let Some(job) = maybe_job else { break };
                let state = state.clone();
                tokio::spawn(async move {
                    let outcome = run_pass(&state, job.scope, job.source)
                        .await
                        .map_err(|err| err.to_string());
                    let _ = job.respond_to.send(outcome);
                });
            }
        }
    }
    Ok(())
}

async fn run_pass(
    state: &DaemonState,
    scope: ReconcileScope,
    source: &'static str,
) -> Result<PassSummary, DaemonError> {
    let started = Instant::now();
    let config = refresh_config(state).await;
    let target = scope_label(&scope);

    let reports = pipeline::run(state.reconciler.clone(), &config.repositories, scope).await?;
    record_reports(&state.history, &reports).await;

    Ok(PassSummary {
        target,
        source: source.to_string(),
        reports,
        duration_ms: started.elapsed().as_millis(),
    })
}

/// Re-read the config so repositories added or removed since startup are
/// picked up. A config that fails to load leaves the cached one in place.
async fn refresh_config(state: &DaemonState) -> Config {
    let home = state.home.clone();
    match tokio::task::spawn_blocking(move || config::load_at(&home)).await {
        Ok(Ok(fresh)) => {
            let mut guard = state.config.write().await;
            *guard = fresh.clone();
            fresh
        }
        Ok(Err(err)) => {
            tracing::warn!(error = %err, "config reload failed; using cached config");
            state.config.read().await.clone()
        }
        Err(err) => {
            tracing::warn!(error = %err, "config reload task failed; using cached config");
            state.config.read().await.clone()
        }
    }
}

/// Skipped runs never replace a real report.
async fn record_reports(history: &RwLock<RunHistory>, reports: &[ReconcileReport]) {
    let mut history = history.write().await;
    for report in reports {
        let skipped = matches!(report.status, RunStatus::Skipped { .. });
        if skipped && history.contains_key(&report.repository) {
            continue;
        }
        history.insert(report.repository.clone(), report.clone());
    }
}

fn scope_label(scope: &ReconcileScope) -> String {
    match scope {
        ReconcileScope::All => "all".to_string(),
        ReconcileScope::Repository(repository) => repository.to_string(),
    }
}

async fn socket_server_task(
    state: DaemonState,
    job_tx: mpsc::Sender<ReconcileJob>,
    shutdown_tx: broadcast::Sender<()>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let socket = socket_path(&state.home);
    prepare_socket_for_bind(&socket)?;

    let listener = UnixListener::bind(&socket).map_err(|e| io_err(&socket, e))?;
    set_socket_permissions(&socket)?;
    tracing::info!(socket = %socket.display(), "control socket listening");

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            accepted = listener.accept() => {
                let (stream, _) = accepted.map_err(|e| io_err(&socket, e))?;
                let state = state.clone();
                let job_tx = job_tx.clone();
                let shutdown_tx = shutdown_tx.clone();
                tokio::spawn(async move {
                    if let Err(err) = handle_socket_client(stream, state, job_tx, shutdown_tx).await {
                        tracing::error!(error = %err, "socket client error");
                    }
                });
            }
        }
    }

    if socket.exists() {
        let _ = fs::remove_file(&socket);
    }
    Ok(())
}

async fn handle_socket_client(
    stream: UnixStream,
    state: DaemonState,
    job_tx: mpsc::Sender<ReconcileJob>,
    shutdown_tx: broadcast::Sender<()>,
) -> Result<(), DaemonError> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| io_err("daemon socket read", e))?
    {
        if line.trim().is_empty() {
            continue;
        }

        let request: DaemonRequest = match serde_json::from_str(&line) {
            Ok(request) => request,
            Err(err) => {
                write_response(
                    &mut writer,
                    &DaemonResponse::error(format!("invalid request: {err}")),
                )
                .await?;
                continue;
            }
        };

        let response = match &request {
            DaemonRequest::Status => DaemonResponse::ok(build_status_payload(&state).await),
            DaemonRequest::Reconcile { repository } => match parse_scope(repository.as_deref()) {
                Ok(scope) => match enqueue_reconcile(&job_tx, scope, "socket").await {
                    Ok(summary) => DaemonResponse::ok(json!(summary)),
                    Err(err) => DaemonResponse::error(err.to_string()),
                },
                Err(message) => DaemonResponse::error(message),
            },
            DaemonRequest::Stop => {
                let _ = shutdown_tx.send(());
                DaemonResponse::ok(json!({ "stopping": true }))
            }
        };

        write_response(&mut writer, &response).await?;
        if request == DaemonRequest::Stop {
            break;
        }
    }

    Ok(())
}

fn parse_scope(repository: Option<&str>) -> Result<ReconcileScope, String> {
    match repository {
        None => Ok(ReconcileScope::All),
        Some(raw) => raw
            .parse::<RepositoryIdentity>()
            .map(ReconcileScope::Repository)
            .map_err(|err| err.to_string()),
    }
}

async fn build_status_payload(state: &DaemonState) -> Value {
    let subscriptions = state.config.read().await.repositories.clone();

    // Snapshot history (read lock, dropped before JSON assembly).
    let history: RunHistory = state.history.read().await.clone();

    let repositories: Vec<Value> = subscriptions
        .iter()
        .map(|sub| {
            let last_run = history.get(&sub.repository).map(|report| {
                json!({
                    "status": report.status.label(),
                    "finished_at": report.finished_at,
                    "branch": report.branch,
                    "failed_steps": report.failed_steps(),
                })
            });
            json!({
                "repository": sub.repository.to_string(),
                "installation_id": sub.installation_id,
                "last_run": last_run,
            })
        })
        .collect();

    let last_run_at = history.values().map(|report| report.finished_at).max();
    let in_flight: Vec<String> = state
        .reconciler
        .leases()
        .in_flight()
        .iter()
        .map(ToString::to_string)
        .collect();

    json!({
        "running": true,
        "started_at": state.started_at,
        "last_run_at": last_run_at,
        "in_flight": in_flight,
        "repositories": repositories,
        "socket": socket_path(&state.home).display().to_string(),
        "workspace_root": state.reconciler.settings().workspace_root.display().to_string(),
    })
}

async fn enqueue_reconcile(
    job_tx: &mpsc::Sender<ReconcileJob>,
    scope: ReconcileScope,
    source: &'static str,
) -> Result<PassSummary, DaemonError> {
    let (tx, rx) = oneshot::channel();
    job_tx
        .send(ReconcileJob {
            scope,
            source,
            respond_to: tx,
        })
        .await
        .map_err(|_| DaemonError::ChannelClosed("reconcile queue"))?;

    let outcome = rx
        .await
        .map_err(|_| DaemonError::ChannelClosed("reconcile response"))?;
    outcome.map_err(DaemonError::Protocol)
}

#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result.map(|()| "ctrl-c"),
        _ = terminate.recv() => Ok("SIGTERM"),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await.map(|()| "ctrl-c")
}

fn prepare_socket_for_bind(socket: &Path) -> Result<(), DaemonError> {
    if !socket.exists() {
        return Ok(());
    }

    match StdUnixStream::connect(socket) {
        Ok(_) => {
            return Err(DaemonError::Protocol(format!(
                "daemon socket already in use: {}",
                socket.display()
            )));
        }
        Err(err) => {
            tracing::warn!(
                socket = %socket.display(),
                error = %err,
                "removing stale daemon socket before bind",
            );
        }
    }

    match fs::remove_file(socket) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(io_err(socket, err)),
    }
}

fn ensure_runtime_dirs(home: &Path) -> Result<(), DaemonError> {
    let root = lockbot_root(home);
    if !root.exists() {
        fs::create_dir_all(&root).map_err(|e| io_err(&root, e))?;
    }
    Ok(())
}

async fn write_response(
    writer: &mut OwnedWriteHalf,
    response: &DaemonResponse,
) -> Result<(), DaemonError> {
    let payload = serde_json::to_string(response)?;
    writer
        .write_all(payload.as_bytes())
        .await
        .map_err(|e| io_err("daemon socket write", e))?;
    writer
        .write_all(b"\n")
        .await
        .map_err(|e| io_err("daemon socket write", e))?;
    writer
        .flush()
        .await
        .map_err(|e| io_err("daemon socket flush", e))?;
    Ok(())
}

fn handle_join(
    task: &str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(DaemonError::Protocol(format!(
            "{task} task join failure: {err}"
        ))),
    }
}

/// Install the global subscriber on stderr: `RUST_LOG` filter (default
/// `info`), human or JSON lines.
pub fn init_tracing(json_logs: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    let _ = if json_logs {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

#[cfg(unix)]
fn set_socket_permissions(path: &Path) -> Result<(), DaemonError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|e| io_err(path, e))
}

#[cfg(not(unix))]
fn set_socket_permissions(_path: &Path) -> Result<(), DaemonError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use lockbot_core::{CredentialsConfig, InstallationId, Subscription};
    use lockbot_reconcile::{Step, StepOutcome, StepRecord};
    use tempfile::TempDir;

    fn subscription(name: &str) -> Subscription {
        Subscription {
            repository: RepositoryIdentity::new("acme", name),
            installation_id: InstallationId(7),
        }
    }

    /// Config pointing at a closed port, saved under `home`.
    fn offline_config(home: &Path, repositories: Vec<Subscription>) -> Config {
        let config = Config {
            api_base_url: "http://127.0.0.1:9".into(),
            workspace_root: Some(home.join("scratch")),
            credentials: CredentialsConfig::TokenEnv {
                var: "LOCKBOT_TEST_UNSET_TOKEN".into(),
            },
            repositories,
            ..Config::default()
        };
        config::save_at(home, &config).expect("save config");
        config
    }

    fn state_for(home: &Path, repositories: Vec<Subscription>) -> DaemonState {
        let config = offline_config(home, repositories);
        DaemonState {
            home: home.to_path_buf(),
            reconciler: Arc::new(build_reconciler(home, &config).expect("reconciler")),
            config: Arc::new(RwLock::new(config)),
            history: Arc::new(RwLock::new(RunHistory::new())),
            started_at: Utc::now(),
        }
    }

    fn report(name: &str, status: RunStatus) -> ReconcileReport {
        let now = Utc::now();
        ReconcileReport {
            repository: RepositoryIdentity::new("acme", name),
            started_at: now,
            finished_at: now,
            branch: Some("add-docker-lock".into()),
            steps: vec![StepRecord {
                step: Step::CreateBranch,
                outcome: StepOutcome::Failed {
                    error: "boom".into(),
                },
            }],
            status,
        }
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn scheduler_fires_immediately_then_every_period() {
        let (job_tx, mut job_rx) = mpsc::channel::<ReconcileJob>(8);
        let (shutdown_tx, _) = broadcast::channel::<()>(1);
        let started = Instant::now();

        let handle = tokio::spawn(scheduler_task(
            Duration::from_secs(30),
            job_tx,
            shutdown_tx.subscribe(),
        ));

        let first = job_rx.recv().await.expect("first job");
        assert!(started.elapsed() < Duration::from_secs(1), "no initial delay");
        assert_eq!(first.scope, ReconcileScope::All);
        assert_eq!(first.source, "scheduler");
        let _ = first.respond_to.send(Err("test".into()));

        let second = job_rx.recv().await.expect("second job");
        assert!(started.elapsed() >= Duration::from_secs(30));
        let _ = second.respond_to.send(Err("test".into()));

        shutdown_tx.send(()).expect("shutdown");
        handle.await.expect("join").expect("scheduler");
    }

    #[tokio::test]
    async fn status_payload_before_any_run() {
        let home = TempDir::new().expect("home");
        let state = state_for(home.path(), vec![subscription("widgets")]);

        let payload = build_status_payload(&state).await;

        assert_eq!(payload["running"], json!(true));
        assert_eq!(payload["last_run_at"], Value::Null);
        assert_eq!(payload["in_flight"], json!([]));
        let repositories = payload["repositories"].as_array().expect("array");
        assert_eq!(repositories.len(), 1);
        assert_eq!(repositories[0]["repository"], "acme/widgets");
        assert_eq!(repositories[0]["installation_id"], 7);
        assert_eq!(repositories[0]["last_run"], Value::Null);
    }

    #[tokio::test]
    async fn status_payload_includes_last_report_per_repository() {
        let home = TempDir::new().expect("home");
        let state = state_for(
            home.path(),
            vec![subscription("gadgets"), subscription("widgets")],
        );
        record_reports(
            &state.history,
            &[report(
                "widgets",
                RunStatus::Partial {
                    failed: vec![Step::CreateBranch],
                },
            )],
        )
        .await;

        let payload = build_status_payload(&state).await;

        let repositories = payload["repositories"].as_array().expect("array");
        assert_eq!(repositories[0]["last_run"], Value::Null);
        assert_eq!(repositories[1]["last_run"]["status"], "partial");
        assert_eq!(repositories[1]["last_run"]["failed_steps"], json!(["create_branch"]));
        assert_ne!(payload["last_run_at"], Value::Null);
    }

    #[tokio::test]
    async fn skipped_report_does_not_replace_previous_run() {
        let history = RwLock::new(RunHistory::new());
        record_reports(&history, &[report("widgets", RunStatus::Succeeded)]).await;
        record_reports(
            &history,
            &[report(
                "widgets",
                RunStatus::Skipped {
                    reason: "reconciliation already in flight".into(),
                },
            )],
        )
        .await;

        let history = history.read().await;
        let kept = history
            .get(&RepositoryIdentity::new("acme", "widgets"))
            .expect("report");
        assert_eq!(kept.status, RunStatus::Succeeded);
    }

    #[test]
    fn parse_scope_accepts_all_and_single_repository() {
        assert_eq!(parse_scope(None).unwrap(), ReconcileScope::All);
        assert_eq!(
            parse_scope(Some("acme/widgets")).unwrap(),
            ReconcileScope::Repository(RepositoryIdentity::new("acme", "widgets"))
        );
        assert!(parse_scope(Some("not-a-repo")).is_err());
    }

    async fn exchange(
        lines: &mut tokio::io::Lines<BufReader<tokio::net::unix::OwnedReadHalf>>,
        writer: &mut OwnedWriteHalf,
        request: &str,
    ) -> Value {
        writer.write_all(request.as_bytes()).await.expect("write");
        writer.write_all(b"\n").await.expect("newline");
        let line = lines.next_line().await.expect("read").expect("response line");
        serde_json::from_str(&line).expect("decode")
    }

    #[tokio::test]
    async fn socket_protocol_over_connected_pair() {
        let home = TempDir::new().expect("home");
        let state = state_for(home.path(), vec![subscription("widgets")]);
        let (job_tx, job_rx) = mpsc::channel::<ReconcileJob>(8);
        let (shutdown_tx, mut shutdown_rx) = broadcast::channel::<()>(4);

        tokio::spawn(processor_task(
            state.clone(),
            job_rx,
            shutdown_tx.subscribe(),
        ));

        let (server, client) = UnixStream::pair().expect("pair");
        let server_task = tokio::spawn(handle_socket_client(
            server,
            state,
            job_tx,
            shutdown_tx.clone(),
        ));

        let (reader, mut writer) = client.into_split();
        let mut lines = BufReader::new(reader).lines();

        let status = exchange(&mut lines, &mut writer, r#"{"cmd":"status"}"#).await;
        assert_eq!(status["ok"], json!(true));
        assert_eq!(status["data"]["repositories"][0]["repository"], "acme/widgets");

        let invalid = exchange(&mut lines, &mut writer, "{not json").await;
        assert_eq!(invalid["ok"], json!(false));
        assert!(invalid["error"].as_str().unwrap().contains("invalid request"));

        let unknown = exchange(&mut lines, &mut writer, r#"{"cmd":"merge"}"#).await;
        assert_eq!(unknown["ok"], json!(false));
        assert!(unknown["error"].as_str().unwrap().contains("merge"));

        let malformed = exchange(
            &mut lines,
            &mut writer,
            r#"{"cmd":"reconcile","repository":"widgets"}"#,
        )
        .await;
        assert_eq!(malformed["ok"], json!(false));

        let unsubscribed = exchange(
            &mut lines,
            &mut writer,
            r#"{"cmd":"reconcile","repository":"acme/gadgets"}"#,
        )
        .await;
        assert_eq!(unsubscribed["ok"], json!(false));
        assert!(unsubscribed["error"]
            .as_str()
            .unwrap()
            .contains("acme/gadgets is not subscribed"));

        let pass = exchange(
            &mut lines,
            &mut writer,
            r#"{"cmd":"reconcile","repository":"acme/widgets"}"#,
        )
        .await;
        assert_eq!(pass["ok"], json!(true), "{pass}");
        assert_eq!(pass["data"]["target"], "acme/widgets");
        assert_eq!(pass["data"]["source"], "socket");
        assert_eq!(pass["data"]["reports"][0]["status"]["status"], "failed");

        let stop = exchange(&mut lines, &mut writer, r#"{"cmd":"stop"}"#).await;
        assert_eq!(stop["data"]["stopping"], json!(true));
        shutdown_rx.recv().await.expect("shutdown signal");
        server_task.await.expect("join").expect("client handler");
    }

    #[tokio::test]
    async fn stale_socket_file_is_removed_before_bind() {
        let home = TempDir::new().expect("home");
        let socket = home.path().join("daemon.sock");
        fs::write(&socket, "").expect("stale file");

        prepare_socket_for_bind(&socket).expect("prepare");
        assert!(!socket.exists());
    }
}
