//! SIGINT/SIGTERM handling for graceful shutdown.
//!
//! The first signal raises an [`InterruptFlag`] that the loop checks between
//! passes. A second signal terminates the process immediately.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use anyhow::{Context, Result};
use colored::Colorize;
use tracing::{debug, warn};

use crate::exit_codes;

/// Shared "stop after this pass" flag.
#[derive(Debug, Clone, Default)]
pub struct InterruptFlag(Arc<AtomicBool>);

impl InterruptFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn set(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Install signal listeners on a background thread and return the flag they raise.
pub fn install() -> Result<InterruptFlag> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("build signal runtime")?;
    let listener = {
        let _guard = runtime.enter();
        Listener::register()?
    };

    let flag = InterruptFlag::new();
    let handle = flag.clone();
    thread::Builder::new()
        .name("work-loop-signals".to_string())
        .spawn(move || {
            runtime.block_on(async move {
                let mut listener = listener;
                listener.recv().await;
                warn!("interrupt received, finishing current pass");
                eprintln!("\n{}", "⚠ Process interrupted by user".yellow());
                handle.set();

                listener.recv().await;
                eprintln!("{}", "❌ Forced exit".red());
                std::process::exit(exit_codes::INTERRUPTED);
            });
        })
        .context("spawn signal thread")?;
    debug!("signal handlers installed");
    Ok(flag)
}

#[cfg(unix)]
struct Listener {
    interrupt: tokio::signal::unix::Signal,
    terminate: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl Listener {
    fn register() -> Result<Self> {
        use tokio::signal::unix::{SignalKind, signal};

        Ok(Self {
            interrupt: signal(SignalKind::interrupt()).context("register SIGINT handler")?,
            terminate: signal(SignalKind::terminate()).context("register SIGTERM handler")?,
        })
    }

    async fn recv(&mut self) {
        tokio::select! {
            _ = self.interrupt.recv() => debug!(signal = "SIGINT", "signal received"),
            _ = self.terminate.recv() => debug!(signal = "SIGTERM", "signal received"),
        }
    }
}

#[cfg(not(unix))]
struct Listener;

#[cfg(not(unix))]
impl Listener {
    fn register() -> Result<Self> {
        Ok(Self)
    }

    async fn recv(&mut self) {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(err = %err, "ctrl-c listener failed");
            std::future::pending::<()>().await;
        }
    }
}
