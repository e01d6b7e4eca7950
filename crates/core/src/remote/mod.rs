//! C7: the Remote Session Adapter.
//!
//! A client-side session multiplexing over one or more byte-framed
//! connections, with failover and clustered-commit semantics (`spec.md`
//! §4.7, §6). Actual TCP framing is out of scope (`spec.md` §1); this
//! depends only on the [`Transport`] trait, so failover/cluster-commit
//! logic is unit-testable against an in-memory fake.

use crate::error::RemoteError;

/// Wire opcodes (`spec.md` §6), `#[repr(i32)]` to match the length-delimited
/// frame format's `opcode:int32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum OpCode {
    SessionPrepare = 0,
    CommandExecuteQuery = 1,
    CommandExecuteUpdate = 2,
    CommandClose = 3,
    CommandCommit = 4,
    ResultFetchRows = 5,
    ResultClose = 6,
    LobRead = 7,
    SessionSetAutocommit = 8,
    SessionCancelStatement = 9,
    SessionHasPendingTransaction = 10,
    GetJdbcMeta = 11,
    SessionClose = 12,
    SessionSetId = 13,
}

/// Response status byte (`spec.md` §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Status {
    Ok = 0,
    OkStateChanged = 1,
    Closed = 2,
    Error = 3,
}

impl Status {
    pub fn from_i32(v: i32) -> Option<Self> {
        match v {
            0 => Some(Self::Ok),
            1 => Some(Self::OkStateChanged),
            2 => Some(Self::Closed),
            3 => Some(Self::Error),
            _ => None,
        }
    }
}

/// An error frame (`spec.md` §6): `(sqlstate, message, sql, errorCode, stack)`.
#[derive(Debug, Clone)]
pub struct ErrorFrame {
    pub sqlstate: String,
    pub message: String,
    pub sql: String,
    pub error_code: i32,
    pub stack: String,
}

/// A single byte-framed connection to one cluster node. Real TCP framing is
/// out of scope (`spec.md` §1); a real engine implements this over a socket.
pub trait Transport {
    fn write_frame(&mut self, opcode: OpCode, payload: &[u8]) -> Result<(), RemoteError>;
    fn read_status(&mut self) -> Result<(Status, Vec<u8>), RemoteError>;
}

/// The client-side remote session (`spec.md` §4.7): one transport per
/// cluster node, with failover and (when clustered) explicit per-transport
/// commit.
pub struct RemoteSession<T: Transport> {
    transports: Vec<T>,
    auto_reconnect: bool,
    session_id: Option<u64>,
}

impl<T: Transport> RemoteSession<T> {
    pub fn new(transports: Vec<T>, auto_reconnect: bool) -> Self {
        // Clustered sessions (more than one transport) disable server-side
        // auto-commit and commit explicitly against every node (`spec.md`
        // §4.7).
        Self { transports, auto_reconnect, session_id: None }
    }

    pub fn is_clustered(&self) -> bool {
        self.transports.len() > 1
    }

    pub fn transport_count(&self) -> usize {
        self.transports.len()
    }

    pub fn session_id(&self) -> Option<u64> {
        self.session_id
    }

    /// Re-adds a freshly established transport after all prior ones failed.
    /// No-op (beyond logging) if auto-reconnect wasn't configured, since the
    /// caller shouldn't have bothered establishing one.
    pub fn reconnect_with(&mut self, transport: T) {
        if self.auto_reconnect {
            self.transports.push(transport);
        }
    }

    /// Sends `opcode`/`payload` to every live transport, removing any that
    /// fail (`spec.md` §4.7: "any IOException during a request removes the
    /// failing transport"). Returns the statuses of transports that
    /// survived. If all transports fail and auto-reconnect is disabled, the
    /// session is considered closed.
    pub fn dispatch(&mut self, opcode: OpCode, payload: &[u8]) -> Result<Vec<(Status, Vec<u8>)>, RemoteError> {
        let mut results = Vec::new();
        let mut survivors = Vec::with_capacity(self.transports.len());
        for mut t in self.transports.drain(..) {
            match t.write_frame(opcode, payload).and_then(|_| t.read_status()) {
                Ok(result) => {
                    results.push(result);
                    survivors.push(t);
                }
                Err(_) => continue,
            }
        }
        self.transports = survivors;
        if self.transports.is_empty() {
            // Establishing a fresh transport is transport-specific and out
            // of scope; the caller is expected to supply one via
            // `reconnect_with` when `auto_reconnect` is set, or treat the
            // session as closed otherwise.
            return Err(RemoteError::AllTransportsFailed);
        }
        Ok(results)
    }

    /// `dispatch` specialized for commit: clustered sessions commit
    /// explicitly against every surviving transport (`spec.md` §4.7).
    pub fn commit(&mut self) -> Result<(), RemoteError> {
        self.dispatch(OpCode::CommandCommit, &[])?;
        Ok(())
    }

    /// Statement cancellation opens a fresh transport independent of any
    /// in-flight request (`spec.md` §4.7). The caller supplies the fresh
    /// transport since establishing one is transport-specific.
    pub fn cancel_via(mut fresh: T) -> Result<(), RemoteError> {
        fresh.write_frame(OpCode::SessionCancelStatement, &[])?;
        fresh.read_status()?;
        Ok(())
    }
}
