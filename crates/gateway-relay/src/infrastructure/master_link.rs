//! The persistent TCP link to the privileged master process.
//!
//! The relay keeps exactly one connection to the master.  Every granted
//! request writes one 9-byte command (see [`gateway_core::encode_command`])
//! down that connection; the master never answers.
//!
//! # Connection lifecycle
//!
//! ```text
//!   connect() ──► [Connecting] ── open ok ──► [Connected]
//!                     ▲                           │
//!                     │ retry every               │ watchdog sees EOF/error,
//!                     │ reconnect_interval        │ or a write fails twice
//!                     │                           ▼
//!                     └─────────────────── [Reconnecting]
//! ```
//!
//! A background *watchdog* task reads from each connection.  Since the master
//! sends nothing, the only thing a read can return is EOF or an error, which
//! is exactly the signal that the connection is gone.
//!
//! # Concurrency
//!
//! The write half lives in a `tokio::sync::Mutex<Option<Connection>>`.  Holding
//! that lock is the only way to write, and the only way to install or clear a
//! connection, so a command is never split across two connections and never
//! interleaved with another command.
//!
//! Each connection carries a generation number.  The watchdog of an old
//! connection can therefore never clear a newer one that replaced it.
//!
//! # Lifetime
//!
//! Watchdogs and the background reconnect task hold only a `Weak` reference
//! to the link.  Dropping the last [`MasterLink`] clone closes the connection
//! and stops any reconnect loop at its next attempt.
//!
//! The master host is looked up on every connection attempt, not once at
//! startup, so a master whose DNS name moves is found on the next reconnect.

use std::io;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use subtle::ConstantTimeEq;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{watch, Mutex};
use tokio::task::AbortHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use gateway_core::{encode_command, AuthorizationCommand, Expiration};

use crate::application::gateway_link::{GatewayLink, LinkError, LinkHealth};
use crate::domain::LinkSettings;

/// One established connection plus the handle of its watchdog.
struct Connection {
    generation: u64,
    write_half: OwnedWriteHalf,
    /// Cleared by the watchdog before it asks for the slot to be emptied.
    alive: Arc<AtomicBool>,
    watchdog: AbortHandle,
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.watchdog.abort();
    }
}

struct LinkInner {
    settings: LinkSettings,
    password: String,
    writer: Mutex<Option<Connection>>,
    generation: AtomicU64,
    /// `true` while a background reconnect task is running.
    reconnecting: AtomicBool,
    health: watch::Sender<LinkHealth>,
}

/// Production [`GatewayLink`]: checks the password locally and writes grant
/// commands to the master over TCP.
///
/// Cloning is cheap; all clones share one connection.
#[derive(Clone)]
pub struct MasterLink {
    inner: Arc<LinkInner>,
}

impl MasterLink {
    /// Creates a link that is not yet connected.
    ///
    /// The first call to [`GatewayLink::authenticate`] with the right password
    /// fails with [`LinkError::NotConnected`] and starts connecting in the
    /// background.  Use [`MasterLink::connect`] to wait for the master instead.
    pub fn new(settings: LinkSettings, password: impl Into<String>) -> Self {
        let (health, _) = watch::channel(LinkHealth::Connecting);
        Self {
            inner: Arc::new(LinkInner {
                settings,
                password: password.into(),
                writer: Mutex::new(None),
                generation: AtomicU64::new(0),
                reconnecting: AtomicBool::new(false),
                health,
            }),
        }
    }

    /// Creates a link and waits until the master accepts a connection.
    ///
    /// Retries every `settings.reconnect_interval` for as long as it takes;
    /// there is no point serving requests before the master is listening.
    pub async fn connect(settings: LinkSettings, password: impl Into<String>) -> Self {
        let link = Self::new(settings, password);
        info!(master = %link.inner.settings.master, "connecting to master");
        link.inner.reconnect_loop().await;
        link
    }

    /// Current connection state.
    pub fn health(&self) -> LinkHealth {
        *self.inner.health.borrow()
    }

    /// A receiver that observes every connection state change.
    pub fn subscribe(&self) -> watch::Receiver<LinkHealth> {
        self.inner.health.subscribe()
    }
}

#[async_trait]
impl GatewayLink for MasterLink {
    async fn authenticate(
        &self,
        ip: Ipv4Addr,
        password: &str,
        expiration: Expiration,
    ) -> Result<bool, LinkError> {
        if !self.inner.password_matches(password) {
            return Ok(false);
        }

        let frame = encode_command(&AuthorizationCommand::authenticate(ip, expiration));
        self.inner.send(&frame).await?;
        debug!(%ip, ?expiration, "grant command written to master");
        Ok(true)
    }
}

impl LinkInner {
    fn password_matches(&self, candidate: &str) -> bool {
        self.password.as_bytes().ct_eq(candidate.as_bytes()).into()
    }

    /// Writes `frame` on the current connection.
    ///
    /// On a write failure the connection is discarded and replaced once, under
    /// the same lock, and the write is retried on the fresh connection.
    async fn send(self: &Arc<Self>, frame: &[u8]) -> Result<(), LinkError> {
        let mut slot = self.writer.lock().await;

        let Some(conn) = slot.as_mut() else {
            drop(slot);
            self.spawn_reconnect();
            return Err(LinkError::NotConnected);
        };

        let first = match self.write_frame(conn, frame).await {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };
        warn!(error = %first, "write to master failed; reconnecting once");
        slot.take();
        self.health.send_replace(LinkHealth::Reconnecting);

        let mut fresh = match self.open().await {
            Ok(conn) => conn,
            Err(e) => {
                drop(slot);
                self.spawn_reconnect();
                return Err(LinkError::Transport(e));
            }
        };

        match self.write_frame(&mut fresh, frame).await {
            Ok(()) => {
                info!(master = %self.settings.master, "reconnected to master");
                *slot = Some(fresh);
                self.health.send_replace(LinkHealth::Connected);
                Ok(())
            }
            Err(e) => {
                drop(fresh);
                drop(slot);
                self.spawn_reconnect();
                Err(e)
            }
        }
    }

    async fn write_frame(&self, conn: &mut Connection, frame: &[u8]) -> Result<(), LinkError> {
        let limit = self.settings.write_timeout;
        let write = async {
            conn.write_half.write_all(frame).await?;
            conn.write_half.flush().await
        };
        match timeout(limit, write).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(LinkError::Transport(e)),
            Err(_) => Err(LinkError::Timeout(limit)),
        }
    }

    /// Opens a new connection and starts its watchdog.  Does not install it.
    ///
    /// The host name is resolved as part of the attempt, inside the connect
    /// timeout.
    async fn open(self: &Arc<Self>) -> io::Result<Connection> {
        let master = &self.settings.master;
        let connect = TcpStream::connect((master.host.as_str(), master.port));
        let stream = match timeout(self.settings.connect_timeout, connect).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("connecting to {master} timed out"),
                ))
            }
        };
        stream.set_nodelay(true)?;

        let (read_half, write_half) = stream.into_split();
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let alive = Arc::new(AtomicBool::new(true));
        let watchdog = tokio::spawn(Self::watch_connection(
            Arc::downgrade(self),
            read_half,
            generation,
            Arc::clone(&alive),
        ));

        Ok(Connection {
            generation,
            write_half,
            alive,
            watchdog: watchdog.abort_handle(),
        })
    }

    /// Installs `conn` unless the slot is already filled.
    ///
    /// Returns `false` only when `conn` died before it could be installed.
    async fn install(&self, conn: Connection) -> bool {
        let mut slot = self.writer.lock().await;
        if slot.is_some() {
            return true;
        }
        if !conn.alive.load(Ordering::Acquire) {
            return false;
        }
        info!(
            master = %self.settings.master,
            generation = conn.generation,
            "connected to master"
        );
        *slot = Some(conn);
        self.health.send_replace(LinkHealth::Connected);
        true
    }

    /// One connection attempt.  Returns `true` once a connection is installed.
    async fn try_connect(self: &Arc<Self>, failures: &mut u32) -> bool {
        if self.writer.lock().await.is_some() {
            return true;
        }
        match self.open().await {
            Ok(conn) => self.install(conn).await,
            Err(e) => {
                *failures += 1;
                let master = &self.settings.master;
                if *failures == 1 {
                    let interval = self.settings.reconnect_interval;
                    warn!(%master, error = %e, "master not reachable; retrying every {interval:?}");
                } else {
                    debug!(%master, attempt = *failures, error = %e, "master still not reachable");
                }
                false
            }
        }
    }

    /// Retries until a connection is installed.
    async fn reconnect_loop(self: &Arc<Self>) {
        let mut failures: u32 = 0;
        while !self.try_connect(&mut failures).await {
            sleep(self.settings.reconnect_interval).await;
        }
    }

    /// Starts a background reconnect unless one is already running.
    ///
    /// The task upgrades its `Weak` once per attempt and holds no reference
    /// while it sleeps, so it ends when the link is dropped.
    fn spawn_reconnect(self: &Arc<Self>) {
        if self.reconnecting.swap(true, Ordering::AcqRel) {
            return;
        }
        let link = Arc::downgrade(self);
        let interval = self.settings.reconnect_interval;
        tokio::spawn(async move {
            let mut failures: u32 = 0;
            loop {
                let Some(inner) = link.upgrade() else {
                    debug!("link dropped; reconnect abandoned");
                    return;
                };
                if inner.try_connect(&mut failures).await {
                    inner.reconnecting.store(false, Ordering::Release);
                    // A loss reported while the flag was still set would otherwise be missed.
                    if inner.writer.lock().await.is_none() {
                        inner.spawn_reconnect();
                    }
                    return;
                }
                drop(inner);
                sleep(interval).await;
            }
        });
    }

    /// Reads until the peer goes away, then reports the loss.
    async fn watch_connection(
        link: Weak<Self>,
        mut read_half: OwnedReadHalf,
        generation: u64,
        alive: Arc<AtomicBool>,
    ) {
        let mut buf = [0u8; 64];
        loop {
            match read_half.read(&mut buf).await {
                Ok(0) => {
                    debug!(generation, "master closed the connection");
                    break;
                }
                Ok(n) => debug!(generation, bytes = n, "ignoring unexpected bytes from master"),
                Err(e) => {
                    debug!(generation, error = %e, "read from master failed");
                    break;
                }
            }
        }
        alive.store(false, Ordering::Release);
        if let Some(inner) = link.upgrade() {
            inner.connection_lost(generation).await;
        }
    }

    async fn connection_lost(self: &Arc<Self>, generation: u64) {
        let lost = {
            let mut slot = self.writer.lock().await;
            match slot.as_ref() {
                Some(conn) if conn.generation == generation => slot.take(),
                _ => None,
            }
        };
        if lost.is_some() {
            warn!(master = %self.settings.master, "lost connection to master");
            self.health.send_replace(LinkHealth::Reconnecting);
            self.spawn_reconnect();
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
