//! Conversation log.
//!
//! Append-only log of the messages in the open conversation. Locally sent
//! messages are appended optimistically before the server confirms them;
//! when the server echoes a message back, the echo is matched against recent
//! optimistic entries instead of being displayed twice.
//!
//! # Echo suppression
//!
//! The dedup key is `(sender, destination, payload, timestamp)`. An echo
//! whose timestamp is unknown (older server revisions strip it) matches on
//! the first three fields alone. The scan walks backwards from the newest
//! entry and stops at the first entry older than the dedup window, so the
//! cost is bounded by recent traffic rather than log length. Each local
//! entry absorbs at most one echo.

use std::{ops::Sub, time::Duration};

use chatwire_proto::{Destination, Envelope};
use tracing::{debug, trace};

use crate::{
    router::{Routed, Subscription},
    session::SessionConfig,
};

/// Identifier of a log entry, unique within one conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(u64);

impl EntryId {
    /// Raw counter value.
    pub fn value(self) -> u64 {
        self.0
    }
}

/// Where an entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    /// Sent from this client and appended optimistically
    Local,
    /// Received from the server
    Remote,
}

/// Delivery progress of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeliveryStatus {
    /// Appended, not yet handed to the transport
    Pending,
    /// Written to the transport
    Sent,
    /// Could not be sent. The entry stays in the log.
    Failed,
    /// Server echoed the message back
    Confirmed,
    /// Arrived from the network
    Received,
}

/// One message in the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry<I> {
    id: EntryId,
    envelope: Envelope,
    origin: Origin,
    delivery: DeliveryStatus,
    appended_at: I,
}

impl<I: Copy> Entry<I> {
    /// Entry identifier
    pub fn id(&self) -> EntryId {
        self.id
    }

    /// The message
    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    /// Where the entry came from
    pub fn origin(&self) -> Origin {
        self.origin
    }

    /// Delivery progress
    pub fn delivery(&self) -> DeliveryStatus {
        self.delivery
    }

    /// True if the message could not be sent.
    pub fn delivery_failed(&self) -> bool {
        self.delivery == DeliveryStatus::Failed
    }

    /// Local time the entry was appended
    pub fn appended_at(&self) -> I {
        self.appended_at
    }
}

/// Result of offering a network envelope to the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// New entry appended
    Appended(EntryId),
    /// Echo of an optimistic entry, which is now confirmed
    Duplicate(EntryId),
    /// Routed under a different subscription, dropped
    Discarded,
}

/// Read position in the log, for incremental rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct LogCursor(usize);

/// Log of the conversation bound to one [`Subscription`].
///
/// Generic over `Instant` to support both real time and virtual time for
/// deterministic testing.
#[derive(Debug, Clone)]
pub struct Conversation<I> {
    subscription: Subscription,
    entries: Vec<Entry<I>>,
    next_id: u64,
    dedup_window: Duration,
    dedup_echoes: bool,
}

impl<I> Conversation<I>
where
    I: Copy + Ord + Sub<Output = Duration>,
{
    /// Empty log bound to `subscription`.
    pub fn new(subscription: Subscription, config: &SessionConfig) -> Self {
        Self {
            subscription,
            entries: Vec::new(),
            next_id: 0,
            dedup_window: config.dedup_window,
            dedup_echoes: config.dedup_echoes,
        }
    }

    /// Destination the log is bound to.
    pub fn destination(&self) -> &Destination {
        self.subscription.destination()
    }

    /// Subscription generation the log accepts deliveries from.
    pub fn generation(&self) -> u64 {
        self.subscription.generation()
    }

    /// All entries in append order.
    pub fn entries(&self) -> &[Entry<I>] {
        &self.entries
    }

    /// Entry by id.
    pub fn entry(&self, id: EntryId) -> Option<&Entry<I>> {
        self.position(id).map(|index| &self.entries[index])
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing has been appended.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries appended since `cursor`, and the cursor to pass next time.
    pub fn read_from(&self, cursor: LogCursor) -> (&[Entry<I>], LogCursor) {
        let start = cursor.0.min(self.entries.len());
        (&self.entries[start..], LogCursor(self.entries.len()))
    }

    /// Append a locally composed message before it is sent.
    ///
    /// The envelope should come from [`crate::ChannelRouter::address`] for
    /// the same subscription.
    pub fn append_optimistic(&mut self, envelope: Envelope, now: I) -> EntryId {
        debug_assert_eq!(envelope.destination(), Some(self.destination()));
        let id = self.push(envelope, Origin::Local, DeliveryStatus::Pending, now);
        trace!(id = id.0, "optimistic append");
        id
    }

    /// Offer a routed network envelope.
    pub fn append_from_network(&mut self, routed: Routed, now: I) -> AppendOutcome {
        if routed.generation != self.generation() {
            debug!(
                delivered = routed.generation,
                current = self.generation(),
                "delivery from stale subscription, discarding"
            );
            return AppendOutcome::Discarded;
        }

        if self.dedup_echoes
            && let Some(index) = self.find_echo_target(&routed.envelope, now)
        {
            let entry = &mut self.entries[index];
            entry.delivery = DeliveryStatus::Confirmed;
            trace!(id = entry.id.0, "echo confirmed optimistic entry");
            return AppendOutcome::Duplicate(entry.id);
        }

        let id = self.push(routed.envelope, Origin::Remote, DeliveryStatus::Received, now);
        AppendOutcome::Appended(id)
    }

    /// Transport accepted the entry. Returns false if the entry is unknown
    /// or no longer pending.
    pub fn mark_sent(&mut self, id: EntryId) -> bool {
        self.transition(id, DeliveryStatus::Pending, DeliveryStatus::Sent)
    }

    /// Transport refused the entry. Returns false if the entry is unknown or
    /// no longer pending.
    pub fn mark_failed(&mut self, id: EntryId) -> bool {
        self.transition(id, DeliveryStatus::Pending, DeliveryStatus::Failed)
    }

    fn transition(&mut self, id: EntryId, from: DeliveryStatus, to: DeliveryStatus) -> bool {
        let Some(index) = self.position(id) else {
            return false;
        };

        let entry = &mut self.entries[index];
        if entry.delivery != from {
            return false;
        }
        entry.delivery = to;
        true
    }

    fn find_echo_target(&self, echo: &Envelope, now: I) -> Option<usize> {
        for (index, entry) in self.entries.iter().enumerate().rev() {
            if now - entry.appended_at > self.dedup_window {
                break;
            }

            let eligible = entry.origin == Origin::Local
                && matches!(entry.delivery, DeliveryStatus::Pending | DeliveryStatus::Sent);
            if eligible && is_echo_of(echo, &entry.envelope) {
                return Some(index);
            }
        }
        None
    }

    fn push(
        &mut self,
        envelope: Envelope,
        origin: Origin,
        delivery: DeliveryStatus,
        now: I,
    ) -> EntryId {
        let id = EntryId(self.next_id);
        self.next_id += 1;
        self.entries.push(Entry { id, envelope, origin, delivery, appended_at: now });
        id
    }

    fn position(&self, id: EntryId) -> Option<usize> {
        // Ids are assigned in push order and never removed.
        let index = usize::try_from(id.0).ok()?;
        (self.entries.get(index).map(|entry| entry.id) == Some(id)).then_some(index)
    }
}

fn is_echo_of(echo: &Envelope, local: &Envelope) -> bool {
    echo.sender() == local.sender()
        && echo.destination() == local.destination()
        && echo.payload() == local.payload()
        && (!echo.timestamp().is_known() || echo.timestamp() == local.timestamp())
}
