//! A concurrent application runner that manages long-running processes with graceful shutdown.
//!
//! The runner owns the process lifecycle of the bridge:
//! - Named app processes run concurrently until one fails or a shutdown signal arrives
//! - SIGTERM/SIGINT cancel the shared token
//! - Closers run afterwards, one at a time, in the order they were registered
//! - The exit code is 0 for a signal or clean completion and 1 when a process failed
//!
//! # Example
//!
//! ```no_run
//! use bridge_runner::Runner;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let runner = Runner::new()
//!         .with_app_process(|ctx| async move {
//!             ctx.cancelled().await;
//!             tracing::info!("Process stopping gracefully");
//!             Ok(())
//!         })
//!         .with_closer(|| async move {
//!             tracing::info!("Releasing storage connection");
//!             Ok(())
//!         })
//!         .with_closer_timeout(Duration::from_secs(5));
//!
//!     runner.run().await;
//! }
//! ```

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Type alias for an app process function.
/// Takes a cancellation token and returns a future that resolves to Result<(), anyhow::Error>
pub type AppProcess = Box<
    dyn FnOnce(CancellationToken) -> Pin<Box<dyn Future<Output = Result<(), anyhow::Error>> + Send>>
        + Send,
>;

/// Type alias for a closer function.
/// Returns a future that resolves to Result<(), anyhow::Error>
pub type Closer =
    Box<dyn FnOnce() -> Pin<Box<dyn Future<Output = Result<(), anyhow::Error>> + Send>> + Send>;

/// Exit code after a signal or a clean stop of every process.
pub const EXIT_OK: i32 = 0;
/// Exit code after an app process failed or panicked.
pub const EXIT_FAILURE: i32 = 1;

/// A concurrent application runner that manages long-running processes with graceful shutdown.
pub struct Runner {
    app_processes: Vec<(String, AppProcess)>,
    closers: Vec<Closer>,
    closer_timeout: Duration,
    cancellation_token: CancellationToken,
}

impl Default for Runner {
    fn default() -> Self {
        Self::new()
    }
}

impl Runner {
    /// Creates a new Runner with a 10 second closer timeout and nothing registered.
    pub fn new() -> Self {
        Self {
            app_processes: Vec::new(),
            closers: Vec::new(),
            closer_timeout: Duration::from_secs(10),
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Adds an anonymous app process to the runner.
    ///
    /// If any process returns an error, all processes are cancelled and closers are executed.
    pub fn with_app_process<F, Fut>(self, process: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), anyhow::Error>> + Send + 'static,
    {
        let name = format!("process_{}", self.app_processes.len());
        self.with_named_process(name, Box::new(move |token| Box::pin(process(token))))
    }

    /// Adds an already boxed app process under a name used in log output.
    pub fn with_named_process(mut self, name: impl Into<String>, process: AppProcess) -> Self {
        self.app_processes.push((name.into(), process));
        self
    }

    /// Adds a closer to the runner.
    ///
    /// Closers run after all app processes have stopped, sequentially and in
    /// registration order. A failing closer does not prevent the next one from running.
    pub fn with_closer<F, Fut>(mut self, closer: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), anyhow::Error>> + Send + 'static,
    {
        self.closers.push(Box::new(|| Box::pin(closer())));
        self
    }

    /// Sets the overall timeout for executing closers. Default is 10 seconds.
    pub fn with_closer_timeout(mut self, timeout: Duration) -> Self {
        self.closer_timeout = timeout;
        self
    }

    /// Sets a custom cancellation token, allowing external control over process cancellation.
    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = token;
        self
    }

    /// Runs all app processes, then the closers, then exits the process.
    pub async fn run(self) {
        let code = self.execute().await;
        if code == EXIT_OK {
            tracing::info!("Application exiting normally");
        } else {
            tracing::error!(exit_code = code, "Application exiting with error");
        }
        std::process::exit(code);
    }

    /// Runs all app processes until a signal, a failure or completion, then runs
    /// the closers and returns the exit code instead of exiting.
    pub async fn execute(self) -> i32 {
        let token = self.cancellation_token;
        let closer_timeout = self.closer_timeout;
        let closers = self.closers;
        let mut join_set = JoinSet::new();

        for (name, process) in self.app_processes {
            let process_token = token.clone();
            join_set.spawn(async move {
                tracing::debug!(process = %name, "Starting app process");
                (name, process(process_token).await)
            });
        }

        spawn_signal_handlers(token.clone());

        let mut failed = false;
        while let Some(result) = join_set.join_next().await {
            match result {
                Ok((name, Ok(()))) => {
                    tracing::debug!(process = %name, "App process completed successfully");
                }
                Ok((name, Err(err))) => {
                    if !token.is_cancelled() {
                        tracing::error!(process = %name, "App process error: {:#}", err);
                        failed = true;
                        token.cancel();
                    } else {
                        tracing::warn!(process = %name, "App process error during shutdown: {:#}", err);
                    }
                }
                Err(err) => {
                    tracing::error!("App process panicked: {}", err);
                    if !token.is_cancelled() {
                        failed = true;
                        token.cancel();
                    }
                }
            }

            if token.is_cancelled() {
                break;
            }
        }

        // Give the remaining processes a chance to observe the cancellation and
        // release their connections before closers run.
        while let Ok(Some(result)) =
            tokio::time::timeout(closer_timeout, join_set.join_next()).await
        {
            if let Ok((name, Err(err))) = result {
                tracing::warn!(process = %name, "App process error during shutdown: {:#}", err);
            }
        }
        join_set.shutdown().await;

        if !closers.is_empty() {
            tracing::info!("Running closers with timeout of {:?}", closer_timeout);
            match tokio::time::timeout(closer_timeout, run_closers(closers)).await {
                Ok(()) => tracing::info!("All closers completed"),
                Err(_) => tracing::error!("Closers timed out after {:?}", closer_timeout),
            }
        }

        if failed {
            EXIT_FAILURE
        } else {
            EXIT_OK
        }
    }
}

fn spawn_signal_handlers(token: CancellationToken) {
    let ctrl_c_token = token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Received shutdown signal");
                ctrl_c_token.cancel();
            }
            Err(err) => {
                tracing::error!("Error setting up signal handler: {}", err);
            }
        }
    });

    #[cfg(unix)]
    tokio::spawn(async move {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
                token.cancel();
            }
            Err(err) => {
                tracing::error!("Error setting up SIGTERM handler: {}", err);
            }
        }
    });
}

/// Runs closers one after another so that release order is preserved.
async fn run_closers(closers: Vec<Closer>) {
    for (index, closer) in closers.into_iter().enumerate() {
        match tokio::spawn(closer()).await {
            Ok(Ok(())) => {
                tracing::debug!(closer = index, "Closer completed successfully");
            }
            Ok(Err(err)) => {
                tracing::error!(closer = index, "Closer error: {:#}", err);
            }
            Err(err) => {
                tracing::error!(closer = index, "Closer panicked: {}", err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    #[tokio::test]
    async fn test_cancellation_exits_ok_and_runs_closers() {
        let closer_called = Arc::new(AtomicBool::new(false));
        let closer_called_clone = closer_called.clone();

        let token = CancellationToken::new();
        let token_clone = token.clone();

        let runner = Runner::new()
            .with_app_process(|ctx| async move {
                tokio::select! {
                    _ = ctx.cancelled() => Ok(()),
                    _ = tokio::time::sleep(Duration::from_secs(100)) => Ok(()),
                }
            })
            .with_closer(move || async move {
                closer_called_clone.store(true, Ordering::SeqCst);
                Ok(())
            })
            .with_cancellation_token(token)
            .with_closer_timeout(Duration::from_secs(5));

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            token_clone.cancel();
        });

        assert_eq!(runner.execute().await, EXIT_OK);
        assert!(closer_called.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_failing_process_cancels_others_and_exits_with_failure() {
        let sibling_stopped = Arc::new(AtomicBool::new(false));
        let sibling_stopped_clone = sibling_stopped.clone();

        let runner = Runner::new()
            .with_app_process(|_ctx| async move { Err(anyhow::anyhow!("broker gave up")) })
            .with_app_process(move |ctx| async move {
                ctx.cancelled().await;
                sibling_stopped_clone.store(true, Ordering::SeqCst);
                Ok(())
            })
            .with_closer_timeout(Duration::from_secs(5));

        assert_eq!(runner.execute().await, EXIT_FAILURE);
        assert!(sibling_stopped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_closers_run_in_registration_order_and_tolerate_failure() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let first = order.clone();
        let second = order.clone();
        let third = order.clone();

        let runner = Runner::new()
            .with_closer(move || async move {
                first.lock().unwrap().push("broker");
                Err(anyhow::anyhow!("already disconnected"))
            })
            .with_closer(move || async move {
                second.lock().unwrap().push("storage");
                Ok(())
            })
            .with_closer(move || async move {
                third.lock().unwrap().push("telemetry");
                Ok(())
            });

        run_closers(runner.closers).await;
        assert_eq!(*order.lock().unwrap(), vec!["broker", "storage", "telemetry"]);
    }

    #[tokio::test]
    async fn test_all_processes_completing_exits_ok() {
        let runner = Runner::new()
            .with_named_process("noop", Box::new(|_ctx| Box::pin(async { Ok(()) })));

        assert_eq!(runner.execute().await, EXIT_OK);
    }
}
