//! Admin command processor.
//!
//! Executes one parsed [`AdminCommand`] against the registry.  Every outcome
//! is reported through [`SessionRegistry::broadcast`], so all admins see the
//! result of every command, including the admin who typed it.
//!
//! | Command        | Output per affected session                         |
//! |----------------|-----------------------------------------------------|
//! | `ls [filter]`  | one `[SESS]` line if it contains `filter`           |
//! | `cmd t1,t2 p`  | `[CMD]` sent, or `[CMD ERR]` not found / not writable / invalid |
//! | `cmdall p`     | `[CMD]` for each writable session                   |
//! | `drop id`      | `[DROP]` for a known ID, nothing otherwise          |

use relay_core::{AdminCommand, RelayEvent, SessionId, Target};

use super::registry::{SessionEntry, SessionRegistry};

/// Runs `command` to completion.
pub async fn execute(command: &AdminCommand, registry: &SessionRegistry) {
    match command {
        AdminCommand::List { filter } => list(registry, filter).await,
        AdminCommand::Command { targets, payload } => {
            for target in targets {
                command_target(registry, target, payload).await;
            }
        }
        AdminCommand::CommandAll { payload } => command_all(registry, payload).await,
        AdminCommand::Drop { id: Some(id) } => drop_session(registry, *id).await,
        AdminCommand::Drop { id: None } | AdminCommand::Unrecognized => {}
    }
}

// ── ls ────────────────────────────────────────────────────────────────────────

async fn list(registry: &SessionRegistry, filter: &str) {
    let now = tokio::time::Instant::now().into_std();
    for entry in registry.list_sessions().await {
        let line = entry.session.listing_line(now);
        if filter.is_empty() || line.contains(filter) {
            registry.broadcast(RelayEvent::Listing(line)).await;
        }
    }
}

// ── cmd / cmdall ──────────────────────────────────────────────────────────────

async fn command_target(registry: &SessionRegistry, target: &Target, payload: &str) {
    let (found, label) = match target {
        Target::Id(id) => (registry.find_by_id(*id).await, id.to_string()),
        Target::Mac(mac) => (registry.find_by_mac(mac).await, mac.to_string()),
        Target::Invalid(raw) => {
            registry
                .broadcast(RelayEvent::CommandInvalidTarget {
                    target: raw.clone(),
                })
                .await;
            return;
        }
    };

    match found {
        Some(entry) => send_payload(registry, &entry, payload).await,
        None => {
            registry
                .broadcast(RelayEvent::CommandNotFound { target: label })
                .await;
        }
    }
}

async fn command_all(registry: &SessionRegistry, payload: &str) {
    for entry in registry.list_sessions().await {
        if entry.link.is_writable() {
            send_payload(registry, &entry, payload).await;
        }
    }
}

/// Announces and queues `payload` for one session.
async fn send_payload(registry: &SessionRegistry, entry: &SessionEntry, payload: &str) {
    let id = entry.session.id;
    let token = entry.session.token.clone();

    if !entry.link.is_writable() {
        registry
            .broadcast(RelayEvent::CommandNotWritable { id, token })
            .await;
        return;
    }

    registry
        .broadcast(RelayEvent::CommandSent {
            id,
            token: token.clone(),
            payload: payload.to_string(),
        })
        .await;
    if entry.link.send_line(payload).is_err() {
        // Closed between the check and the write, or its queue overflowed.
        registry
            .broadcast(RelayEvent::CommandNotWritable { id, token })
            .await;
    }
}

// ── drop ──────────────────────────────────────────────────────────────────────

async fn drop_session(registry: &SessionRegistry, id: SessionId) {
    let Some(entry) = registry.find_by_id(id).await else {
        return;
    };
    registry
        .broadcast(RelayEvent::Dropped {
            id,
            token: entry.session.token.clone(),
        })
        .await;
    entry.link.close();
}

// ── Tests ─────────────────────────────────────────────────────────────────────
