use std::{
    env, io,
    net::{SocketAddr, TcpListener, TcpStream},
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Duration,
};

use log::{debug, error, info, warn};
use thiserror::Error;

use crate::storage::{ArticleStore, BackupError, Snapshot};

use super::{LineTransport, Session, SessionPool};

pub const DEFAULT_PORT: u16 = 11900;
pub const DEFAULT_BACKUP: &str = "storage_backup.json";

const BACKUP_ENV: &str = "USENET_BACKUP";
const BACKUP_INTERVAL_ENV: &str = "USENET_BACKUP_INTERVAL";
const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },
    #[error("server io error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Backup file written at shutdown and on every periodic save.
    pub backup: PathBuf,
    /// Periodic backup interval; `None` only saves at shutdown.
    pub backup_interval: Option<Duration>,
}

impl ServerConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            backup: PathBuf::from(DEFAULT_BACKUP),
            backup_interval: None,
        }
    }

    /// Applies `USENET_BACKUP` and `USENET_BACKUP_INTERVAL` (seconds, `0` disables).
    pub fn with_env(mut self) -> Self {
        if let Ok(path) = env::var(BACKUP_ENV) {
            self.backup = PathBuf::from(path);
        }
        if let Ok(secs) = env::var(BACKUP_INTERVAL_ENV) {
            match secs.trim().parse::<u64>() {
                Ok(0) => self.backup_interval = None,
                Ok(secs) => self.backup_interval = Some(Duration::from_secs(secs)),
                Err(_) => warn!("ignoring {BACKUP_INTERVAL_ENV}={secs:?}: not a number of seconds"),
            }
        }
        self
    }
}

/// Adds the sample groups and welcome article a fresh server starts with.
pub fn seed_sample(store: &ArticleStore) {
    store.add_group("comp.example");
    store.add_group("talk.example");
    store.add_article(
        "comp.example",
        "Welcome",
        "admin@example",
        "This is a sample article.",
    );
}

/// Restores the store from `backup`, falling back to the sample content when there is no
/// usable backup. A broken backup file is logged, never fatal.
pub fn load_or_seed(backup: &Path) -> ArticleStore {
    match Snapshot::load(backup).and_then(|s| s.map(ArticleStore::from_snapshot).transpose()) {
        Ok(Some(store)) => return store,
        Ok(None) => info!("no backup found at {}, starting fresh", backup.display()),
        Err(e) => error!("failed to load backup: {e}"),
    }

    let store = ArticleStore::new();
    seed_sample(&store);
    store
}

/// Coordinates stopping the server.
///
/// [`trigger`](Shutdown::trigger) may be called from any thread, including a signal
/// handler. The final backup flush runs at most once per `Shutdown`.
#[derive(Debug)]
pub struct Shutdown {
    stopping: AtomicBool,
    flushed: AtomicBool,
    store: Arc<ArticleStore>,
    backup: PathBuf,
    sessions: Arc<SessionPool>,
}

impl Shutdown {
    fn new(store: Arc<ArticleStore>, backup: PathBuf, sessions: Arc<SessionPool>) -> Self {
        Self {
            stopping: AtomicBool::new(false),
            flushed: AtomicBool::new(false),
            store,
            backup,
            sessions,
        }
    }

    /// Stops accepting connections and closes every live session.
    pub fn trigger(&self) {
        if !self.stopping.swap(true, Ordering::SeqCst) {
            info!("shutdown requested");
        }
        self.sessions.close_all();
    }

    pub fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::SeqCst)
    }

    /// Writes the final backup. Returns `false` when a flush already happened.
    pub fn flush_backup(&self) -> bool {
        if self.flushed.swap(true, Ordering::SeqCst) {
            return false;
        }
        if let Err(e) = self.save_backup() {
            error!("failed to save backup: {e}");
        }
        true
    }

    /// Saves a snapshot without counting as the final flush.
    pub fn save_backup(&self) -> Result<(), BackupError> {
        self.store.snapshot().save(&self.backup)
    }
}

pub struct UsenetServer {
    listener: TcpListener,
    store: Arc<ArticleStore>,
    sessions: Arc<SessionPool>,
    shutdown: Arc<Shutdown>,
    backup_interval: Option<Duration>,
}

impl UsenetServer {
    pub fn bind(config: &ServerConfig, store: ArticleStore) -> Result<Self, ServerError> {
        let address = format!("{}:{}", config.host, config.port);
        let listener = TcpListener::bind((config.host.as_str(), config.port))
            .map_err(|source| ServerError::Bind { address, source })?;
        listener.set_nonblocking(true)?;

        let store = Arc::new(store);
        let sessions = Arc::new(SessionPool::new());
        let shutdown = Arc::new(Shutdown::new(
            Arc::clone(&store),
            config.backup.clone(),
            Arc::clone(&sessions),
        ));

        Ok(Self {
            listener,
            store,
            sessions,
            shutdown,
            backup_interval: config.backup_interval,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    pub fn store(&self) -> Arc<ArticleStore> {
        Arc::clone(&self.store)
    }

    pub fn shutdown_handle(&self) -> Arc<Shutdown> {
        Arc::clone(&self.shutdown)
    }

    /// Accepts connections until shutdown is triggered, then waits for every session and
    /// flushes the backup.
    pub fn listen(self) -> Result<(), ServerError> {
        info!("listening at {}", self.local_addr()?);
        let saver = self
            .backup_interval
            .map(|every| spawn_periodic_backup(Arc::clone(&self.shutdown), every));

        while !self.shutdown.is_stopping() {
            match self.listener.accept() {
                Ok((stream, peer)) => self.spawn_session(stream, peer),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => thread::sleep(POLL_INTERVAL),
                Err(e) => {
                    // Persistent failures such as EMFILE would otherwise spin.
                    warn!("broken connection: {e:?}");
                    thread::sleep(POLL_INTERVAL);
                }
            }
        }

        info!("waiting for {} session(s) to close", self.sessions.active());
        self.sessions.close_all();
        self.sessions.join();
        self.shutdown.flush_backup();

        if let Some(saver) = saver {
            if saver.join().is_err() {
                warn!("periodic backup thread panicked");
            }
        }
        info!("server stopped");
        Ok(())
    }

    fn spawn_session(&self, stream: TcpStream, peer: SocketAddr) {
        // Accepted sockets may inherit the listener's non-blocking mode.
        if let Err(e) = stream.set_nonblocking(false) {
            warn!("dropping connection from {peer}: {e}");
            return;
        }

        let store = Arc::clone(&self.store);
        let socket = match stream.try_clone() {
            Ok(socket) => socket,
            Err(e) => {
                warn!("dropping connection from {peer}: {e}");
                return;
            }
        };
        if let Err(e) = self
            .sessions
            .execute(socket, move || handle_connection(stream, store, peer))
        {
            warn!("failed to start session for {peer}: {e}");
        }
    }
}

fn handle_connection(stream: TcpStream, store: Arc<ArticleStore>, peer: SocketAddr) {
    info!("connection from {peer}");

    let result = LineTransport::from_stream(stream)
        .and_then(|transport| Session::new(transport, store).run());
    match result {
        Ok(()) => info!("connection closed: {peer}"),
        Err(e) => warn!("connection {peer} aborted: {e}"),
    }
}

fn spawn_periodic_backup(shutdown: Arc<Shutdown>, every: Duration) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut waited = Duration::ZERO;
        while !shutdown.is_stopping() {
            thread::sleep(POLL_INTERVAL);
            waited += POLL_INTERVAL;
            if waited < every {
                continue;
            }

            waited = Duration::ZERO;
            debug!("periodic backup");
            if let Err(e) = shutdown.save_backup() {
                error!("periodic backup failed: {e}");
            }
        }
    })
}
