//! SessionRegistry: the single source of truth for who is connected.
//!
//! The registry holds two collections:
//!
//! - **Device sessions**, keyed by [`SessionId`].  IDs come from a counter that
//!   starts at 1001 and only ever increments, so a `BTreeMap` iterates in
//!   insertion (oldest-connected-first) order for free.
//! - **Admin connections**, the broadcast set.
//!
//! # Concurrency (for beginners)
//!
//! Every connection runs in its own Tokio task, and all of them read and write
//! the registry.  Both collections live behind one `tokio::sync::RwLock`.
//! Every public method takes the lock once, does its work, and releases it;
//! no caller ever holds it across another registry call.
//!
//! Readers get *snapshots*: [`SessionRegistry::list_sessions`] returns a
//! `Vec` of cloned entries, not an iterator over the live map, so a session
//! connecting or disconnecting mid-`ls` cannot invalidate anything.
//!
//! Broadcasting follows the same rule: the admin set is cloned under the lock
//! and the lines are queued after it is released.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use relay_core::{
    format_log_line, MacAddress, Session, SessionId, Transport, FIRST_SESSION_ID,
};
use tokio::sync::RwLock;
use tracing::{info, warn};

use super::link::ConnectionHandle;

/// Identifier for an admin connection (internal only, never shown).
pub type AdminId = u64;

/// A session together with the handle used to reach its connection.
#[derive(Debug, Clone)]
pub struct SessionEntry {
    pub session: Session,
    pub link: ConnectionHandle,
}

/// One connected admin.
#[derive(Debug, Clone)]
pub struct AdminConnection {
    pub id: AdminId,
    pub remote_addr: SocketAddr,
    pub transport: Transport,
    pub link: ConnectionHandle,
}

#[derive(Debug, Default)]
struct RegistryState {
    sessions: BTreeMap<SessionId, SessionEntry>,
    admins: BTreeMap<AdminId, AdminConnection>,
}

/// Shared registry of device sessions and admin connections.
///
/// Construct one per process and share it as `Arc<SessionRegistry>`.
#[derive(Debug)]
pub struct SessionRegistry {
    state: RwLock<RegistryState>,
    next_session_id: AtomicU64,
    next_admin_id: AtomicU64,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(RegistryState::default()),
            next_session_id: AtomicU64::new(FIRST_SESSION_ID),
            next_admin_id: AtomicU64::new(1),
        }
    }

    // ── Sessions ──────────────────────────────────────────────────────────────

    /// Allocates the next ID and inserts a fresh, unidentified session.
    pub async fn create_session(
        &self,
        remote_addr: SocketAddr,
        transport: Transport,
        link: ConnectionHandle,
    ) -> Session {
        let id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        // tokio's clock so paused-time tests see consistent uptimes.
        let started_at = tokio::time::Instant::now().into_std();
        let session = Session::new(id, remote_addr, transport, started_at);

        let mut state = self.state.write().await;
        state.sessions.insert(
            id,
            SessionEntry {
                session: session.clone(),
                link,
            },
        );
        session
    }

    /// Removes a session.  Returns the last state if it was present.
    pub async fn remove_session(&self, id: SessionId) -> Option<Session> {
        let mut state = self.state.write().await;
        state.sessions.remove(&id).map(|entry| entry.session)
    }

    /// Applies `update` to the stored session, if it is still registered.
    pub async fn update_session<R>(
        &self,
        id: SessionId,
        update: impl FnOnce(&mut Session) -> R,
    ) -> Option<R> {
        let mut state = self.state.write().await;
        state
            .sessions
            .get_mut(&id)
            .map(|entry| update(&mut entry.session))
    }

    pub async fn find_by_id(&self, id: SessionId) -> Option<SessionEntry> {
        let state = self.state.read().await;
        state.sessions.get(&id).cloned()
    }

    /// First session (oldest first) whose MAC equals `mac`.
    ///
    /// Duplicate MACs are not prevented; the oldest match wins.
    pub async fn find_by_mac(&self, mac: &MacAddress) -> Option<SessionEntry> {
        let state = self.state.read().await;
        state
            .sessions
            .values()
            .find(|entry| entry.session.mac.as_ref() == Some(mac))
            .cloned()
    }

    /// Point-in-time copy of every session, oldest first.
    pub async fn list_sessions(&self) -> Vec<SessionEntry> {
        let state = self.state.read().await;
        state.sessions.values().cloned().collect()
    }

    pub async fn session_count(&self) -> usize {
        self.state.read().await.sessions.len()
    }

    // ── Admins ────────────────────────────────────────────────────────────────

    /// Adds an admin to the broadcast set.
    pub async fn register_admin(
        &self,
        remote_addr: SocketAddr,
        transport: Transport,
        link: ConnectionHandle,
    ) -> AdminConnection {
        let id = self.next_admin_id.fetch_add(1, Ordering::Relaxed);
        let admin = AdminConnection {
            id,
            remote_addr,
            transport,
            link,
        };
        let mut state = self.state.write().await;
        state.admins.insert(id, admin.clone());
        admin
    }

    /// Removes an admin from the broadcast set.  Returns `false` if it was
    /// already gone.
    pub async fn unregister_admin(&self, id: AdminId) -> bool {
        let mut state = self.state.write().await;
        state.admins.remove(&id).is_some()
    }

    pub async fn admin_count(&self) -> usize {
        self.state.read().await.admins.len()
    }

    // ── Broadcast ─────────────────────────────────────────────────────────────

    /// Timestamps `message` and delivers it to every registered admin.
    ///
    /// The line is always written to the local log first.  A failure to reach
    /// one admin is logged and skipped; the rest still receive the line.
    /// Returns the number of admins the line was queued for.
    pub async fn broadcast(&self, message: impl Display) -> usize {
        let line = format_log_line(&message);
        info!(target: "relay::broadcast", "{line}");

        let admins: Vec<AdminConnection> = {
            let state = self.state.read().await;
            state.admins.values().cloned().collect()
        };

        let mut delivered = 0;
        for admin in &admins {
            match admin.link.send_line(&line) {
                Ok(()) => delivered += 1,
                Err(e) => warn!("broadcast to admin {} failed: {e}", admin.remote_addr),
            }
        }
        delivered
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
