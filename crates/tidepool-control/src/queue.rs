//! Command queue operations.
//!
//! The queue behaves like one mailbox slot per command kind: writing a new
//! command supersedes every pending command of the same kind, while delivery
//! across kinds stays in creation order. A poll receives at most one command.

use chrono::{DateTime, Duration, Utc};
use tidepool_core::DeviceId;
use tidepool_store::{Command, CommandKind, CommandValue, Store};

use crate::error::Result;

/// Append an unprocessed command created at `now`.
///
/// # Errors
///
/// Returns `ControlError::StorageUnavailable` if the store fails.
pub fn enqueue<S: Store + ?Sized>(
    store: &S,
    device_id: &DeviceId,
    value: CommandValue,
    now: DateTime<Utc>,
) -> Result<Command> {
    let command = store.insert_command(device_id, value, now)?;
    tracing::debug!(
        device_id = %device_id,
        command_id = %command.id,
        kind = %command.kind(),
        "Enqueued command"
    );
    Ok(command)
}

/// Mark every pending command of `kind` as processed without delivering it.
///
/// Returns how many commands were superseded.
///
/// # Errors
///
/// Returns `ControlError::StorageUnavailable` if the store fails.
pub fn supersede<S: Store + ?Sized>(
    store: &S,
    device_id: &DeviceId,
    kind: CommandKind,
    now: DateTime<Utc>,
) -> Result<usize> {
    let superseded = store.mark_pending_processed_by_kind(device_id, kind, now)?;
    if superseded > 0 {
        tracing::debug!(device_id = %device_id, kind = %kind, superseded, "Superseded pending commands");
    }
    Ok(superseded)
}

/// Supersede pending commands of the value's kind and enqueue the new one in
/// a single store operation.
///
/// # Errors
///
/// Returns `ControlError::StorageUnavailable` if the store fails. Nothing is
/// written in that case.
pub fn submit<S: Store + ?Sized>(
    store: &S,
    device_id: &DeviceId,
    value: CommandValue,
    now: DateTime<Utc>,
) -> Result<Command> {
    let (command, superseded) = store.replace_pending_command(device_id, value, now)?;
    tracing::info!(
        device_id = %device_id,
        command_id = %command.id,
        kind = %command.kind(),
        superseded,
        "Queued command"
    );
    Ok(command)
}

/// Whether a command is too old to be delivered.
///
/// A command exactly `ttl` old is still delivered.
#[must_use]
pub fn is_expired(command: &Command, ttl: Duration, now: DateTime<Utc>) -> bool {
    now - command.created_at > ttl
}

/// Take the oldest pending command for delivery.
///
/// The command is claimed (marked processed) atomically. If it is older than
/// `ttl` it is discarded and `None` is returned for this poll; the next poll
/// considers the next-oldest command.
///
/// # Errors
///
/// Returns `ControlError::StorageUnavailable` if the store fails.
pub fn dequeue_oldest_valid<S: Store + ?Sized>(
    store: &S,
    device_id: &DeviceId,
    ttl: Duration,
    now: DateTime<Utc>,
) -> Result<Option<Command>> {
    let Some(command) = store.claim_oldest_unprocessed_command(device_id, now)? else {
        return Ok(None);
    };

    if is_expired(&command, ttl, now) {
        tracing::info!(
            device_id = %device_id,
            command_id = %command.id,
            kind = %command.kind(),
            created_at = %command.created_at,
            "Discarded expired command"
        );
        return Ok(None);
    }

    tracing::info!(
        device_id = %device_id,
        command_id = %command.id,
        kind = %command.kind(),
        "Delivering command"
    );
    Ok(Some(command))
}
