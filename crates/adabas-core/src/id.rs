//! Session identity and per-target state.
//!
//! A [`SessionId`] is the process-level identity presented to every
//! database plus a concurrent map from target URL to [`Status`]. Each
//! status owns the transport driver of its target and the bookkeeping
//! (open flag, open transactions, platform) that the call engine mutates
//! while holding the status lock.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use tokio::sync::{Mutex, MutexGuard};

use crate::acbx::{Acbx, CommandCode};
use crate::codec::Endian;
use crate::driver::TransportDriver;
use crate::logging::{default_logger, Logger};
use crate::response;
use crate::url::Url;

/// Wire size of the identity block.
pub const ADA_ID_SIZE: u16 = 32;

const ADA_ID_LEVEL: u16 = 3;
const UNKNOWN: &str = "Unknown";

static ID_COUNTER: AtomicU32 = AtomicU32::new(0);

/// Identity of a client session: node, user, surrogate pid and timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdaId {
    /// Layout level, 3.
    pub level: u16,
    /// Encoded size, [`ADA_ID_SIZE`].
    pub size: u16,
    /// Host name, space padded.
    pub node: [u8; 8],
    /// User name, space padded.
    pub user: [u8; 8],
    /// Surrogate process id, unique across parallel replicas.
    pub pid: u32,
    /// Creation time in seconds since the epoch.
    pub timestamp: u64,
}

impl AdaId {
    /// Identity of the current process user on the current host.
    pub fn new() -> Self {
        let user = env_name(&["USER", "USERNAME", "LOGNAME"]);
        let node = env_name(&["HOSTNAME", "COMPUTERNAME"]);
        Self::with_names(&user, &node)
    }

    /// Identity with explicit user and node names.
    pub fn with_names(user: &str, node: &str) -> Self {
        let micros = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as u64)
            .unwrap_or_default();
        let counter = ID_COUNTER.fetch_add(1, Ordering::SeqCst) + 1;
        let pid = ((micros - micros % 100) + u64::from(counter)) as u32;
        Self {
            level: ADA_ID_LEVEL,
            size: ADA_ID_SIZE,
            node: padded(node),
            user: padded(user),
            pid,
            timestamp: micros / 1_000_000,
        }
    }

    /// Replaces the user name.
    pub fn set_user(&mut self, user: &str) {
        self.user = padded(user);
    }

    /// Replaces the node name.
    pub fn set_node(&mut self, node: &str) {
        self.node = padded(node);
    }

    /// Overrides the surrogate pid.
    pub fn set_pid(&mut self, pid: u32) {
        self.pid = pid;
    }
}

impl Default for AdaId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AdaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} [{}] {:x}",
            String::from_utf8_lossy(&self.node),
            String::from_utf8_lossy(&self.user),
            self.pid,
            self.timestamp
        )
    }
}

fn env_name(keys: &[&str]) -> String {
    keys.iter()
        .find_map(|k| std::env::var(k).ok().filter(|v| !v.is_empty()))
        .unwrap_or_else(|| UNKNOWN.to_string())
}

fn padded(name: &str) -> [u8; 8] {
    let mut out = [b' '; 8];
    let bytes = name.as_bytes();
    let n = bytes.len().min(8);
    out[..n].copy_from_slice(&bytes[..n]);
    out
}

/// Database platform reported in the ISN lower limit of an open call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Platform {
    architecture: u8,
}

impl Platform {
    /// Mainframe byte order and EBCDIC.
    pub const MAINFRAME: u8 = 0x00;
    /// Open systems, big endian.
    pub const OPEN_SYSTEMS_HIGH_ORDER: u8 = 0x20;
    /// Open systems, little endian.
    pub const OPEN_SYSTEMS_LOW_ORDER: u8 = 0x21;

    /// Platform with the given architecture byte.
    pub fn new(architecture: u8) -> Self {
        Self { architecture }
    }

    /// Decodes the architecture byte from bits 24..32 of the ISL.
    pub fn from_isl(isl: u64) -> Self {
        Self::new(((isl >> 24) & 0xff) as u8)
    }

    /// Raw architecture byte.
    pub fn architecture(&self) -> u8 {
        self.architecture
    }

    /// Whether the high nibble is zero.
    pub fn is_mainframe(&self) -> bool {
        self.architecture & 0xf0 == Self::MAINFRAME
    }

    /// Blank character in the platform's native charset.
    pub fn space_byte(&self) -> u8 {
        if self.architecture == Self::MAINFRAME {
            0x40
        } else {
            0x20
        }
    }

    /// Byte order of the database host.
    pub fn order(&self) -> Endian {
        if self.architecture == Self::OPEN_SYSTEMS_LOW_ORDER {
            Endian::Little
        } else {
            Endian::Big
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_mainframe() {
            "Mainframe"
        } else {
            "Open System"
        };
        let order = match self.order() {
            Endian::Little => "Low Order",
            Endian::Big => "High Order",
        };
        write!(f, "{},{}", kind, order)
    }
}

/// Mutable state of one target, guarded by the [`Status`] lock.
#[derive(Debug, Default)]
pub struct TargetState {
    /// A user session (OP) is active.
    pub open: bool,
    /// Update calls since the last ET or BT.
    pub open_transactions: u32,
    /// Platform reported by the last OP.
    pub platform: Option<Platform>,
    /// Connected driver, created lazily by the engine.
    pub driver: Option<Box<dyn TransportDriver>>,
}

impl TargetState {
    /// Forgets the session: not open, no open transactions.
    pub fn reset_session(&mut self) {
        self.open = false;
        self.open_transactions = 0;
    }
}

/// Per-target status shared by every engine using the same session.
#[derive(Debug)]
pub struct Status {
    url: String,
    target: Url,
    state: Mutex<TargetState>,
}

impl Status {
    fn new(target: Url) -> Self {
        Self {
            url: target.to_string(),
            target,
            state: Mutex::new(TargetState::default()),
        }
    }

    /// Target URL this status belongs to.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Locks the target; calls on one target serialize on this lock.
    pub async fn lock(&self) -> MutexGuard<'_, TargetState> {
        self.state.lock().await
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.state.try_lock() {
            Ok(state) => write!(
                f,
                "{} open={} transactions={} connected={}",
                self.url,
                state.open,
                state.open_transactions,
                state.driver.is_some()
            ),
            Err(_) => write!(f, "{} (busy)", self.url),
        }
    }
}

/// Process identity plus the URL to status map.
#[derive(Debug)]
pub struct SessionId {
    ada_id: AdaId,
    targets: DashMap<String, Arc<Status>>,
    logger: Arc<dyn Logger>,
}

impl SessionId {
    /// Session for the current user and host, logging through tracing.
    pub fn new() -> Self {
        Self::with_logger(AdaId::new(), default_logger())
    }

    /// Session with an explicit identity and logger.
    pub fn with_logger(ada_id: AdaId, logger: Arc<dyn Logger>) -> Self {
        logger.info(format_args!("Create Adabas ID: {} -> {}", ada_id.pid, ada_id));
        Self {
            ada_id,
            targets: DashMap::new(),
            logger,
        }
    }

    /// Identity presented to every database.
    pub fn ada_id(&self) -> &AdaId {
        &self.ada_id
    }

    /// Logger shared with engines and drivers.
    pub fn logger(&self) -> &Arc<dyn Logger> {
        &self.logger
    }

    /// Status for `url`, created on first use.
    pub fn status(&self, url: &Url) -> Arc<Status> {
        let key = url.to_string();
        self.targets
            .entry(key)
            .or_insert_with(|| Arc::new(Status::new(url.clone())))
            .clone()
    }

    /// Whether `url` has an open user session.
    pub async fn is_open(&self, url: &Url) -> bool {
        self.status(url).lock().await.open
    }

    /// Open transactions on `url`.
    pub async fn transactions(&self, url: &Url) -> u32 {
        self.status(url).lock().await.open_transactions
    }

    /// Platform `url` reported on open.
    pub async fn platform(&self, url: &Url) -> Option<Platform> {
        self.status(url).lock().await.platform
    }

    /// URLs with a known status.
    pub fn targets(&self) -> Vec<String> {
        self.targets.iter().map(|e| e.key().clone()).collect()
    }

    /// Ends every open target and forgets all sessions.
    ///
    /// Open transactions are backed out before the close; failures of
    /// either call are logged and the driver is disconnected regardless.
    pub async fn close(&self) {
        let statuses: Vec<Arc<Status>> = self.targets.iter().map(|e| e.value().clone()).collect();
        for status in statuses {
            let mut state = status.lock().await;
            if let Some(mut driver) = state.driver.take() {
                if state.open {
                    if state.open_transactions > 0 {
                        self.end_call(&status, driver.as_mut(), CommandCode::BT).await;
                    }
                    self.end_call(&status, driver.as_mut(), CommandCode::CL).await;
                }
                if driver.is_connected() {
                    if let Err(e) = driver.disconnect().await {
                        self.logger
                            .debug(format_args!("Disconnect {} failed: {}", status.url(), e));
                    }
                }
            }
            state.reset_session();
        }
        self.logger.debug(format_args!("Closed session {}", self.ada_id));
    }

    async fn end_call(&self, status: &Status, driver: &mut dyn TransportDriver, command: CommandCode) {
        let mut acbx = Acbx::new(status.target.dbid);
        acbx.command = command;
        acbx.response = response::NOT_ACTIVE;
        match driver.send(&mut acbx, &mut []).await {
            Ok(()) if response::is_error(acbx.response) => self.logger.debug(format_args!(
                "{} on {} returned {}",
                command,
                status.url(),
                acbx.response
            )),
            Ok(()) => {}
            Err(e) => self
                .logger
                .debug(format_args!("{} on {} failed: {}", command, status.url(), e)),
        }
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.ada_id)
    }
}
