//! Run sequence tests against an in-memory engine.
//!
//! These exercise the whole pull/create/start/wait/logs/remove flow without a
//! daemon, including interrupts and cleanup after failures.

use async_trait::async_trait;
use futures::channel::mpsc;
use futures::stream::{self, BoxStream, StreamExt};
use std::path::PathBuf;
use std::sync::Mutex;
use tempfile::TempDir;
use throwaway::container::{
    ContainerConfig, ContainerEngine, ContainerError, ContainerOrchestrator, ImageInfo, LogChunk,
    LogSource, OrchestratorConfig, Result, WaitOutcome,
};

#[derive(Clone, Copy)]
enum WaitBehavior {
    Exit(i64),
    Hang,
    Fail,
}

struct FakeEngine {
    calls: Mutex<Vec<String>>,
    created: Mutex<Option<(ContainerConfig, String)>>,
    wait: WaitBehavior,
    logs: Vec<LogChunk>,
    images: Vec<ImageInfo>,
    fail_pull: bool,
    hang_pull: bool,
    fail_start: bool,
    fail_logs: bool,
    fail_remove_container: bool,
    /// Delivers an interrupt while the container is being started
    interrupt_on_start: Option<mpsc::UnboundedSender<()>>,
}

impl FakeEngine {
    fn new(wait: WaitBehavior) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            created: Mutex::new(None),
            wait,
            logs: vec![LogChunk::stdout("hello\nwor"), LogChunk::stdout("ld\n")],
            images: vec![
                ImageInfo {
                    id: "sha256:busybox".to_string(),
                    repo_tags: vec!["busybox:latest".to_string()],
                },
                ImageInfo {
                    id: "sha256:alpine".to_string(),
                    repo_tags: vec!["alpine:latest".to_string()],
                },
            ],
            fail_pull: false,
            hang_pull: false,
            fail_start: false,
            fail_logs: false,
            fail_remove_container: false,
            interrupt_on_start: None,
        }
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContainerEngine for FakeEngine {
    async fn pull_image(&self, image: &str, platform: Option<&str>) -> Result<()> {
        self.record(format!("pull {} {}", image, platform.unwrap_or("-")));
        if self.fail_pull {
            return Err(ContainerError::PullError {
                image: image.to_string(),
                message: "manifest unknown".to_string(),
            });
        }
        if self.hang_pull {
            return std::future::pending::<Result<()>>().await;
        }
        Ok(())
    }

    async fn create_container(&self, config: &ContainerConfig, name: &str) -> Result<String> {
        self.record("create");
        *self.created.lock().unwrap() = Some((config.clone(), name.to_string()));
        Ok("c0ffee".to_string())
    }

    async fn start_container(&self, container_id: &str) -> Result<()> {
        self.record(format!("start {}", container_id));
        if let Some(interrupt) = &self.interrupt_on_start {
            interrupt.unbounded_send(()).unwrap();
        }
        if self.fail_start {
            return Err(ContainerError::Other("cannot start".to_string()));
        }
        Ok(())
    }

    async fn wait_container(&self, container_id: &str) -> Result<i64> {
        self.record(format!("wait {}", container_id));
        match self.wait {
            WaitBehavior::Exit(code) => Ok(code),
            WaitBehavior::Hang => std::future::pending::<Result<i64>>().await,
            WaitBehavior::Fail => Err(ContainerError::Other("connection reset".to_string())),
        }
    }

    fn container_logs<'a>(
        &'a self,
        container_id: &'a str,
        include_stderr: bool,
    ) -> BoxStream<'a, Result<LogChunk>> {
        self.record(format!("logs {} stderr={}", container_id, include_stderr));
        let mut chunks: Vec<Result<LogChunk>> = self
            .logs
            .iter()
            .filter(|c| include_stderr || c.source == LogSource::Stdout)
            .cloned()
            .map(Ok)
            .collect();
        if self.fail_logs {
            chunks.truncate(1);
            chunks.push(Err(ContainerError::Other("log stream closed".to_string())));
        }
        stream::iter(chunks).boxed()
    }

    async fn remove_container(&self, container_id: &str, force: bool) -> Result<()> {
        self.record(format!("remove_container {} force={}", container_id, force));
        if self.fail_remove_container {
            return Err(ContainerError::NotFound(container_id.to_string()));
        }
        Ok(())
    }

    async fn list_images(&self) -> Result<Vec<ImageInfo>> {
        self.record("list_images");
        Ok(self.images.clone())
    }

    async fn remove_image(&self, image: &str, force: bool) -> Result<()> {
        self.record(format!("remove_image {} force={}", image, force));
        Ok(())
    }
}

struct Workspace {
    _temp: TempDir,
    input: PathBuf,
    output: PathBuf,
}

fn workspace() -> Workspace {
    let temp = TempDir::new().unwrap();
    let input = temp.path().join("dir1");
    let output = temp.path().join("dir2");
    std::fs::create_dir(&input).unwrap();
    std::fs::create_dir(&output).unwrap();
    Workspace {
        _temp: temp,
        input,
        output,
    }
}

fn config(ws: &Workspace) -> OrchestratorConfig {
    OrchestratorConfig {
        input_dir: ws.input.clone(),
        output_dir: ws.output.clone(),
        ..OrchestratorConfig::default()
    }
}

fn command() -> Vec<String> {
    vec!["uname".to_string(), "-a".to_string()]
}

fn text(buf: Vec<u8>) -> String {
    String::from_utf8(buf).unwrap()
}

fn no_interrupts() -> stream::Pending<()> {
    stream::pending()
}

/// A single Ctrl-C that is already waiting when the run starts.
fn one_interrupt() -> stream::Iter<std::vec::IntoIter<()>> {
    stream::iter(vec![()])
}

fn removed_everything(calls: &[String]) -> bool {
    calls.contains(&"remove_container c0ffee force=true".to_string())
        && calls.contains(&"remove_image sha256:alpine force=true".to_string())
}

#[tokio::test]
async fn test_successful_run_sequence() {
    let ws = workspace();
    let engine = FakeEngine::new(WaitBehavior::Exit(0));
    let orchestrator = ContainerOrchestrator::new(engine, config(&ws));

    let mut out: Vec<u8> = Vec::new();
    let mut err: Vec<u8> = Vec::new();
    let report = orchestrator
        .run(&command(), no_interrupts(), &mut out, &mut err)
        .await
        .unwrap();

    assert_eq!(report.outcome, WaitOutcome::Exited(0));
    assert_eq!(report.container_id, "c0ffee");
    assert!(report.image_removed);
    assert_eq!(report.exit_code(), 0);

    assert_eq!(text(out), "(exited with 0)\nhello\nworld\n");
    assert!(err.is_empty());

    assert_eq!(
        orchestrator.engine().calls(),
        vec![
            "pull alpine:latest linux/amd64",
            "create",
            "start c0ffee",
            "wait c0ffee",
            "logs c0ffee stderr=false",
            "remove_container c0ffee force=true",
            "list_images",
            "remove_image sha256:alpine force=true",
        ]
    );
}

#[tokio::test]
async fn test_created_container_configuration() {
    let ws = workspace();
    let engine = FakeEngine::new(WaitBehavior::Exit(0));
    let orchestrator = ContainerOrchestrator::new(engine, config(&ws));

    orchestrator
        .run(
            &command(),
            no_interrupts(),
            &mut std::io::sink(),
            &mut std::io::sink(),
        )
        .await
        .unwrap();

    let (created, name) = orchestrator.engine().created.lock().unwrap().clone().unwrap();
    assert!(name.starts_with("throwaway-"));
    assert_eq!(created.image, "alpine:latest");
    assert_eq!(created.cmd, Some(command()));
    assert_eq!(
        created.platform.map(|p| p.to_string()),
        Some("linux/amd64".to_string())
    );
    assert_eq!(
        created.labels.get("throwaway.managed").map(String::as_str),
        Some("true")
    );

    assert_eq!(created.mounts.len(), 2);
    let input = &created.mounts[0];
    assert!(input.source.is_absolute());
    assert!(input.source.ends_with("dir1"));
    assert_eq!(input.target, "/dir1");
    assert!(input.read_only);

    let output = &created.mounts[1];
    assert!(output.source.ends_with("dir2"));
    assert_eq!(output.target, "/dir2");
    assert!(!output.read_only);
}

#[tokio::test]
async fn test_nonzero_exit_code_is_reported() {
    let ws = workspace();
    let engine = FakeEngine::new(WaitBehavior::Exit(3));
    let orchestrator = ContainerOrchestrator::new(engine, config(&ws));

    let mut out: Vec<u8> = Vec::new();
    let report = orchestrator
        .run(&command(), no_interrupts(), &mut out, &mut std::io::sink())
        .await
        .unwrap();

    assert_eq!(report.outcome, WaitOutcome::Exited(3));
    assert_eq!(report.exit_code(), 3);
    assert!(text(out).starts_with("(exited with 3)\n"));
}

#[tokio::test]
async fn test_interrupt_still_prints_logs_and_cleans_up() {
    let ws = workspace();
    let engine = FakeEngine::new(WaitBehavior::Hang);
    let orchestrator = ContainerOrchestrator::new(engine, config(&ws));

    let mut out: Vec<u8> = Vec::new();
    let report = orchestrator
        .run(&command(), one_interrupt(), &mut out, &mut std::io::sink())
        .await
        .unwrap();

    assert_eq!(report.outcome, WaitOutcome::Interrupted);
    assert_eq!(report.exit_code(), 130);
    assert_eq!(text(out), "(caught SIGINT)\nhello\nworld\n");

    assert!(removed_everything(&orchestrator.engine().calls()));
}

#[tokio::test]
async fn test_daemon_error_while_waiting() {
    let ws = workspace();
    let engine = FakeEngine::new(WaitBehavior::Fail);
    let orchestrator = ContainerOrchestrator::new(engine, config(&ws));

    let mut out: Vec<u8> = Vec::new();
    let report = orchestrator
        .run(&command(), no_interrupts(), &mut out, &mut std::io::sink())
        .await
        .unwrap();

    assert!(matches!(report.outcome, WaitOutcome::DaemonError(_)));
    assert_eq!(report.exit_code(), 1);
    assert!(text(out).starts_with("An error occurred with the docker daemon\n"));
    assert!(
        orchestrator
            .engine()
            .calls()
            .contains(&"remove_container c0ffee force=true".to_string())
    );
}

#[tokio::test]
async fn test_start_failure_removes_container() {
    let ws = workspace();
    let mut engine = FakeEngine::new(WaitBehavior::Exit(0));
    engine.fail_start = true;
    let orchestrator = ContainerOrchestrator::new(engine, config(&ws));

    let result = orchestrator
        .run(
            &command(),
            no_interrupts(),
            &mut std::io::sink(),
            &mut std::io::sink(),
        )
        .await;

    assert!(matches!(result, Err(ContainerError::Other(_))));
    let calls = orchestrator.engine().calls();
    assert!(!calls.iter().any(|c| c.starts_with("wait")));
    assert!(calls.contains(&"remove_container c0ffee force=true".to_string()));
    assert!(calls.contains(&"remove_image sha256:alpine force=true".to_string()));
}

#[tokio::test]
async fn test_pull_failure_creates_nothing() {
    let ws = workspace();
    let mut engine = FakeEngine::new(WaitBehavior::Exit(0));
    engine.fail_pull = true;
    let orchestrator = ContainerOrchestrator::new(engine, config(&ws));

    let result = orchestrator
        .run(
            &command(),
            no_interrupts(),
            &mut std::io::sink(),
            &mut std::io::sink(),
        )
        .await;

    assert!(matches!(result, Err(ContainerError::PullError { .. })));
    assert_eq!(
        orchestrator.engine().calls(),
        vec!["pull alpine:latest linux/amd64"]
    );
}

#[tokio::test]
async fn test_missing_host_directory_fails_before_daemon_calls() {
    let ws = workspace();
    let config = OrchestratorConfig {
        input_dir: ws.input.join("does-not-exist"),
        ..config(&ws)
    };
    let orchestrator = ContainerOrchestrator::new(FakeEngine::new(WaitBehavior::Exit(0)), config);

    let result = orchestrator
        .run(
            &command(),
            no_interrupts(),
            &mut std::io::sink(),
            &mut std::io::sink(),
        )
        .await;

    assert!(matches!(result, Err(ContainerError::ConfigError(_))));
    assert!(orchestrator.engine().calls().is_empty());
}

#[tokio::test]
async fn test_keep_image_skips_image_removal() {
    let ws = workspace();
    let config = OrchestratorConfig {
        keep_image: true,
        ..config(&ws)
    };
    let orchestrator = ContainerOrchestrator::new(FakeEngine::new(WaitBehavior::Exit(0)), config);

    let report = orchestrator
        .run(
            &command(),
            no_interrupts(),
            &mut std::io::sink(),
            &mut std::io::sink(),
        )
        .await
        .unwrap();

    assert!(!report.image_removed);
    let calls = orchestrator.engine().calls();
    assert!(!calls.contains(&"list_images".to_string()));
    assert!(!calls.iter().any(|c| c.starts_with("remove_image")));
}

#[tokio::test]
async fn test_untagged_image_is_not_removed() {
    let ws = workspace();
    let config = OrchestratorConfig {
        image: "debian".to_string(),
        platform: None,
        ..config(&ws)
    };
    let orchestrator = ContainerOrchestrator::new(FakeEngine::new(WaitBehavior::Exit(0)), config);

    let report = orchestrator
        .run(
            &command(),
            no_interrupts(),
            &mut std::io::sink(),
            &mut std::io::sink(),
        )
        .await
        .unwrap();

    assert!(!report.image_removed);
    let calls = orchestrator.engine().calls();
    assert_eq!(calls[0], "pull debian -");
    assert!(calls.contains(&"list_images".to_string()));
    assert!(!calls.iter().any(|c| c.starts_with("remove_image")));
}

#[tokio::test]
async fn test_stderr_routed_when_enabled() {
    let ws = workspace();
    let mut engine = FakeEngine::new(WaitBehavior::Exit(1));
    engine.logs = vec![
        LogChunk::stdout("out line\n"),
        LogChunk::stderr("err "),
        LogChunk::stderr("line"),
    ];
    let config = OrchestratorConfig {
        show_stderr: true,
        ..config(&ws)
    };
    let orchestrator = ContainerOrchestrator::new(engine, config);

    let mut out: Vec<u8> = Vec::new();
    let mut err: Vec<u8> = Vec::new();
    orchestrator
        .run(&command(), no_interrupts(), &mut out, &mut err)
        .await
        .unwrap();

    assert_eq!(text(out), "(exited with 1)\nout line\n");
    assert_eq!(text(err), "err line\n");
    assert!(
        orchestrator
            .engine()
            .calls()
            .contains(&"logs c0ffee stderr=true".to_string())
    );
}

#[tokio::test]
async fn test_container_removal_failure_still_removes_image() {
    let ws = workspace();
    let mut engine = FakeEngine::new(WaitBehavior::Exit(0));
    engine.fail_remove_container = true;
    let orchestrator = ContainerOrchestrator::new(engine, config(&ws));

    let result = orchestrator
        .run(
            &command(),
            no_interrupts(),
            &mut std::io::sink(),
            &mut std::io::sink(),
        )
        .await;

    assert!(matches!(result, Err(ContainerError::NotFound(_))));
    let calls = orchestrator.engine().calls();
    assert!(removed_everything(&calls));
    assert_eq!(calls.last().unwrap(), "remove_image sha256:alpine force=true");
}

#[tokio::test]
async fn test_log_stream_error_still_cleans_up() {
    let ws = workspace();
    let mut engine = FakeEngine::new(WaitBehavior::Exit(0));
    engine.fail_logs = true;
    let orchestrator = ContainerOrchestrator::new(engine, config(&ws));

    let mut out: Vec<u8> = Vec::new();
    let result = orchestrator
        .run(&command(), no_interrupts(), &mut out, &mut std::io::sink())
        .await;

    assert!(matches!(result, Err(ContainerError::Other(_))));
    assert_eq!(text(out), "(exited with 0)\nhello\n");
    assert!(removed_everything(&orchestrator.engine().calls()));
}

#[tokio::test]
async fn test_interrupt_during_pull_creates_nothing() {
    let ws = workspace();
    let mut engine = FakeEngine::new(WaitBehavior::Exit(0));
    engine.hang_pull = true;
    let orchestrator = ContainerOrchestrator::new(engine, config(&ws));

    let result = orchestrator
        .run(
            &command(),
            one_interrupt(),
            &mut std::io::sink(),
            &mut std::io::sink(),
        )
        .await;

    assert!(matches!(result, Err(ContainerError::Interrupted)));
    assert_eq!(
        orchestrator.engine().calls(),
        vec!["pull alpine:latest linux/amd64"]
    );
}

#[tokio::test]
async fn test_interrupt_during_start_ends_wait_and_cleans_up() {
    let ws = workspace();
    let (tx, rx) = mpsc::unbounded();
    let mut engine = FakeEngine::new(WaitBehavior::Hang);
    engine.interrupt_on_start = Some(tx);
    let orchestrator = ContainerOrchestrator::new(engine, config(&ws));

    let mut out: Vec<u8> = Vec::new();
    let report = orchestrator
        .run(&command(), rx, &mut out, &mut std::io::sink())
        .await
        .unwrap();

    assert_eq!(report.outcome, WaitOutcome::Interrupted);
    assert_eq!(text(out), "(caught SIGINT)\nhello\nworld\n");
    assert!(removed_everything(&orchestrator.engine().calls()));
}

#[tokio::test]
async fn test_interrupt_during_logs_stops_printing() {
    let ws = workspace();
    let engine = FakeEngine::new(WaitBehavior::Exit(0));
    let orchestrator = ContainerOrchestrator::new(engine, config(&ws));

    // The container has already exited, so the pending Ctrl-C lands on the log dump
    let mut out: Vec<u8> = Vec::new();
    let report = orchestrator
        .run(&command(), one_interrupt(), &mut out, &mut std::io::sink())
        .await
        .unwrap();

    assert_eq!(report.outcome, WaitOutcome::Exited(0));
    assert_eq!(text(out), "(exited with 0)\n");
    assert!(removed_everything(&orchestrator.engine().calls()));
}
