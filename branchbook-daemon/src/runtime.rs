use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinError;

use branchbook_build::{BranchPipeline, Pipeline, SiteBuilder};
use branchbook_core::{OutputLayout, Settings, SystemRunner, ToolRunner};
use branchbook_nav::NavInjector;

use crate::error::{io_err, DaemonError};
use crate::git::GitRepository;
use crate::reconciler::Reconciler;
use crate::server;

/// Start the daemon and block the current thread until it exits.
pub fn start_blocking(settings: Settings) -> Result<(), DaemonError> {
    init_tracing(&settings.log_level);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    let result = runtime.block_on(run(settings));
    // A build still running on a blocking thread is abandoned, not drained.
    runtime.shutdown_background();
    result
}

/// Run the daemon: clone, initialize, then serve and reconcile until a
/// shutdown signal arrives.
///
/// Everything before the tasks are spawned is startup and fails outward:
/// invalid settings, an unusable output root, a port that cannot be bound, or
/// a repository that cannot be cloned.
pub async fn run(settings: Settings) -> Result<(), DaemonError> {
    settings.validate()?;
    let layout = OutputLayout::new(prepare_output(&settings.output)?);
    let site = layout.site_dir();
    std::fs::create_dir_all(&site).map_err(|e| io_err(&site, e))?;

    let addr = SocketAddr::from(([0, 0, 0, 0], settings.port));
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| DaemonError::Bind {
            addr: addr.to_string(),
            source,
        })?;

    let runner: Arc<dyn ToolRunner> = Arc::new(SystemRunner);
    let repository = {
        let runner = Arc::clone(&runner);
        let url = settings.repository.clone();
        let path = layout.repository_dir();
        let filter = settings.branch_filter.clone();
        tokio::task::spawn_blocking(move || GitRepository::clone_or_open(runner, &url, &path, filter))
            .await
            .map_err(join_err("clone"))??
    };

    let injector = Arc::new(NavInjector::new(layout.clone())?);
    let builder = SiteBuilder::new(runner, Arc::clone(&injector), settings.project_dir.clone());
    let pipeline: Arc<dyn BranchPipeline> = Arc::new(Pipeline::new(builder));
    let mut reconciler = Reconciler::new(
        Box::new(repository),
        pipeline,
        injector,
        settings.default_branch.clone(),
    );
    let reconciler = tokio::task::spawn_blocking(move || {
        reconciler.initialize().map(|()| reconciler)
    })
    .await
    .map_err(join_err("initialize"))??;

    let (shutdown_tx, _) = broadcast::channel::<()>(16);

    let server_handle = {
        let shutdown = shutdown_tx.clone();
        let shutdown_rx = shutdown.subscribe();
        tokio::spawn(async move {
            let result = server::serve(listener, site, shutdown_rx).await;
            let _ = shutdown.send(());
            result
        })
    };

    let reconcile_handle = {
        let shutdown = shutdown_tx.clone();
        let shutdown_rx = shutdown.subscribe();
        let sleep = settings.sleep;
        tokio::spawn(async move {
            let result = reconcile_task(reconciler, sleep, shutdown_rx).await;
            let _ = shutdown.send(());
            result
        })
    };

    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        let mut shutdown_rx = shutdown.subscribe();
        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown_rx.recv() => Ok(()),
                result = shutdown_signal() => {
                    let _ = shutdown.send(());
                    result
                }
            }
        })
    };

    let (server_result, reconcile_result, signal_result) =
        tokio::join!(server_handle, reconcile_handle, signal_handle);

    handle_join("server", server_result)?;
    handle_join("reconciler", reconcile_result)?;
    handle_join("signal_handler", signal_result)?;
    tracing::info!("shut down");
    Ok(())
}

/// Create the output root and make it absolute, so every path handed to git,
/// the build tool, and the server agrees regardless of their working dirs.
fn prepare_output(output: &Path) -> Result<PathBuf, DaemonError> {
    std::fs::create_dir_all(output).map_err(|e| io_err(output, e))?;
    std::fs::canonicalize(output).map_err(|e| io_err(output, e))
}

/// Poll, reconcile, sleep, fetch; forever. Shutdown interrupts any phase,
/// including a cycle in flight.
async fn reconcile_task(
    mut reconciler: Reconciler,
    sleep: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    loop {
        let cycle = tokio::task::spawn_blocking(move || {
            reconciler.run_cycle();
            reconciler
        });
        reconciler = tokio::select! {
            _ = shutdown_rx.recv() => return Ok(()),
            joined = cycle => joined.map_err(join_err("cycle"))?,
        };

        reconciler.begin_sleep();
        tokio::select! {
            _ = shutdown_rx.recv() => return Ok(()),
            _ = tokio::time::sleep(sleep) => {}
        }

        let fetch = tokio::task::spawn_blocking(move || {
            reconciler.fetch();
            reconciler
        });
        reconciler = tokio::select! {
            _ = shutdown_rx.recv() => return Ok(()),
            joined = fetch => joined.map_err(join_err("fetch"))?,
        };
    }
}

async fn shutdown_signal() -> Result<(), DaemonError> {
    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::warn!(error = %err, "cannot install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.map_err(|err| DaemonError::Signal(format!("ctrl-c handler failed: {err}")))?;
            tracing::info!("received ctrl-c, shutting down");
        }
        _ = terminate => {
            tracing::info!("received SIGTERM, shutting down");
        }
    }
    Ok(())
}

fn join_err(task: &'static str) -> impl FnOnce(JoinError) -> DaemonError {
    move |err| DaemonError::Join {
        task,
        message: err.to_string(),
    }
}

fn handle_join(
    task: &'static str,
    result: Result<Result<(), DaemonError>, JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(join_err(task)(err)),
    }
}

/// Install the fmt subscriber. `RUST_LOG` wins over `level`; an unparsable
/// level falls back to `info`. Records from crates logging through the `log`
/// facade are captured too.
pub fn init_tracing(level: &str) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}
