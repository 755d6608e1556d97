//! OS signal handling.
//!
//! # Responsibilities
//! - Register handlers for the configured signal set
//! - Merge them into a single `recv` stream of [`Signal`]s
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - Handlers are installed before any server starts, so a failure aborts early
//! - Non-unix targets only support `Interrupt` (Ctrl+C)

use std::fmt;
use std::io;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::lifecycle::app::App;

/// A shutdown-relevant OS signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    /// SIGTERM
    Terminate,
    /// SIGQUIT
    Quit,
    /// SIGINT / Ctrl+C
    Interrupt,
    /// SIGHUP
    Hangup,
    /// SIGUSR1
    User1,
    /// SIGUSR2
    User2,
}

impl Signal {
    /// Terminate, quit and interrupt.
    pub fn defaults() -> Vec<Signal> {
        vec![Signal::Terminate, Signal::Quit, Signal::Interrupt]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Signal::Terminate => "SIGTERM",
            Signal::Quit => "SIGQUIT",
            Signal::Interrupt => "SIGINT",
            Signal::Hangup => "SIGHUP",
            Signal::User1 => "SIGUSR1",
            Signal::User2 => "SIGUSR2",
        }
    }

    #[cfg(unix)]
    fn kind(self) -> tokio::signal::unix::SignalKind {
        use tokio::signal::unix::SignalKind;
        match self {
            Signal::Terminate => SignalKind::terminate(),
            Signal::Quit => SignalKind::quit(),
            Signal::Interrupt => SignalKind::interrupt(),
            Signal::Hangup => SignalKind::hangup(),
            Signal::User1 => SignalKind::user_defined1(),
            Signal::User2 => SignalKind::user_defined2(),
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Custom reaction to a received signal, replacing the default `App::stop`.
pub type SignalHandler = Arc<dyn Fn(App, Signal) -> BoxFuture<'static, ()> + Send + Sync>;

/// Merged receiver over the configured signal set.
pub struct SignalListener {
    #[cfg(unix)]
    streams: Vec<(Signal, tokio::signal::unix::Signal)>,
    #[cfg(not(unix))]
    interrupt: bool,
}

impl SignalListener {
    /// Install handlers for `signals`.
    #[cfg(unix)]
    pub fn install(signals: &[Signal]) -> io::Result<Self> {
        let mut streams = Vec::with_capacity(signals.len());
        for &signal in signals {
            if streams.iter().any(|(s, _)| *s == signal) {
                continue;
            }
            streams.push((signal, tokio::signal::unix::signal(signal.kind())?));
        }
        Ok(Self { streams })
    }

    /// Install handlers for `signals`.
    #[cfg(not(unix))]
    pub fn install(signals: &[Signal]) -> io::Result<Self> {
        Ok(Self {
            interrupt: signals.contains(&Signal::Interrupt),
        })
    }

    /// Wait for the next signal from the set.
    ///
    /// Pends forever when the set is empty.
    #[cfg(unix)]
    pub async fn recv(&mut self) -> Option<Signal> {
        if self.streams.is_empty() {
            return std::future::pending().await;
        }
        let pending = self
            .streams
            .iter_mut()
            .map(|(signal, stream)| {
                let signal = *signal;
                Box::pin(async move { stream.recv().await.map(|()| signal) })
            });
        let (received, _, _) = futures_util::future::select_all(pending).await;
        received
    }

    /// Wait for the next signal from the set.
    #[cfg(not(unix))]
    pub async fn recv(&mut self) -> Option<Signal> {
        if !self.interrupt {
            return std::future::pending().await;
        }
        tokio::signal::ctrl_c().await.ok().map(|()| Signal::Interrupt)
    }
}
