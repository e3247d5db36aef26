//! Destination routing.
//!
//! The router owns the active [`Destination`] and decides which inbound
//! envelopes belong to the open conversation. Every subscription gets a new
//! generation number; deliveries carry the generation they were routed
//! under, and a [`crate::Conversation`] refuses deliveries from any other
//! generation. A switch therefore never leaks envelopes from the previous
//! destination into the new log.

use chatwire_proto::{Destination, Envelope, EnvelopeKind, Timestamp, UserId};
use tracing::{debug, trace};

use crate::{context::UserContext, error::RouterError};

/// Binding of a conversation to one destination.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Subscription {
    destination: Destination,
    generation: u64,
}

impl Subscription {
    /// Destination this subscription is bound to.
    pub fn destination(&self) -> &Destination {
        &self.destination
    }

    /// Monotonic subscription counter.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Envelope accepted by the router, tagged with its subscription generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Routed {
    /// Generation of the subscription that accepted the envelope
    pub generation: u64,
    /// The accepted message
    pub envelope: Envelope,
}

/// Returns true if `envelope` belongs to the conversation at `active` as
/// seen by `current_user`.
///
/// Room mode matches on room id regardless of sender. Direct mode matches
/// when `{sender, recipient}` equals `{current_user, peer}` as an unordered
/// pair, so both directions of the conversation are accepted.
pub fn matches_destination(
    current_user: &UserId,
    active: &Destination,
    envelope: &Envelope,
) -> bool {
    if *envelope.kind() != EnvelopeKind::Message {
        return false;
    }

    match (active, envelope.destination()) {
        (Destination::Room(active_room), Some(Destination::Room(room))) => active_room == room,
        (Destination::DirectPeer(peer), Some(Destination::DirectPeer(recipient))) => {
            let Some(sender) = envelope.sender() else {
                return false;
            };
            (sender == current_user && recipient == peer)
                || (sender == peer && recipient == current_user)
        },
        _ => false,
    }
}

/// Tracks the active destination for an authenticated user.
#[derive(Debug, Clone)]
pub struct ChannelRouter {
    context: UserContext,
    active: Option<Subscription>,
    generation: u64,
}

impl ChannelRouter {
    /// Router for `context` with nothing subscribed.
    pub fn new(context: UserContext) -> Self {
        Self { context, active: None, generation: 0 }
    }

    /// Identity the router filters for.
    pub fn context(&self) -> &UserContext {
        &self.context
    }

    /// Current subscription, if any.
    pub fn active(&self) -> Option<&Subscription> {
        self.active.as_ref()
    }

    /// Bind to `destination`, replacing any previous subscription.
    ///
    /// Resubscribing to the same destination still opens a new generation.
    pub fn subscribe(&mut self, destination: Destination) -> Subscription {
        self.generation += 1;
        let subscription = Subscription { destination, generation: self.generation };

        debug!(
            destination = %subscription.destination,
            generation = subscription.generation,
            "subscribed"
        );
        self.active = Some(subscription.clone());
        subscription
    }

    /// Drop the active subscription. Later envelopes are all discarded.
    pub fn unsubscribe(&mut self) {
        if let Some(previous) = self.active.take() {
            debug!(destination = %previous.destination, "unsubscribed");
        }
    }

    /// Accept `envelope` for the active conversation, or drop it.
    pub fn route(&self, envelope: Envelope) -> Option<Routed> {
        let Some(active) = &self.active else {
            trace!(kind = %envelope.kind(), "no active destination, dropping");
            return None;
        };

        if !matches_destination(self.context.user(), &active.destination, &envelope) {
            trace!(
                kind = %envelope.kind(),
                destination = ?envelope.destination(),
                active = %active.destination,
                "envelope not for active conversation, dropping"
            );
            return None;
        }

        Some(Routed { generation: active.generation, envelope })
    }

    /// Outbound message from the current user to the active destination.
    ///
    /// # Errors
    ///
    /// - `RouterError::NoActiveDestination` if nothing is subscribed
    pub fn address(
        &self,
        content: impl Into<String>,
        timestamp: Timestamp,
    ) -> Result<Envelope, RouterError> {
        let active = self.active.as_ref().ok_or(RouterError::NoActiveDestination)?;
        Ok(Envelope::message(
            self.context.user().clone(),
            active.destination.clone(),
            content,
            timestamp,
        ))
    }

    /// Join announcement for the active destination.
    ///
    /// # Errors
    ///
    /// - `RouterError::NoActiveDestination` if nothing is subscribed
    pub fn join(&self) -> Result<Envelope, RouterError> {
        let active = self.active.as_ref().ok_or(RouterError::NoActiveDestination)?;
        Ok(Envelope::join(self.context.user().clone(), active.destination.clone()))
    }
}
