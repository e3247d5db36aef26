//! Standard invariant checks.
//!
//! These invariants capture behavioral properties that must always hold.
//! They verify WHAT must be true, not specific test scenarios.

use std::collections::HashSet;

use chatwire_app::ConnectionStatus;
use chatwire_client::{Destination, UserId};

use super::{Invariant, InvariantResult, SystemSnapshot, Violation};

/// Each conversation entry is shown at most once.
///
/// A repeated entry id means the view mirrored the same log append twice.
pub struct UniqueEntries;

impl Invariant for UniqueEntries {
    fn name(&self) -> &'static str {
        "unique_entries"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for client in &state.clients {
            let mut seen = HashSet::new();
            for message in &client.messages {
                if !seen.insert(message.entry) {
                    return Err(Violation {
                        invariant: self.name(),
                        message: format!(
                            "client {}: entry {} shown twice",
                            client.name, message.entry
                        ),
                    });
                }
            }
        }
        Ok(())
    }
}

/// The transcript never shrinks.
///
/// Line-oriented renderers print only what was appended since the last
/// render, so a shorter transcript would lose output.
pub struct TranscriptAppendOnly;

impl Invariant for TranscriptAppendOnly {
    fn name(&self) -> &'static str {
        "transcript_append_only"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for client in &state.clients {
            for window in client.transcript_history.windows(2) {
                if window[1] < window[0] {
                    return Err(Violation {
                        invariant: self.name(),
                        message: format!(
                            "client {}: transcript shrank {} → {}",
                            client.name, window[0], window[1]
                        ),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Every connect is closed once, and only once.
///
/// At any point the number of outstanding connections equals whether the
/// driver holds one open.
pub struct ConnectionBalance;

impl Invariant for ConnectionBalance {
    fn name(&self) -> &'static str {
        "connection_balance"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for client in &state.clients {
            let outstanding = client.connects.checked_sub(client.closes);
            if outstanding != Some(usize::from(client.transport_open)) {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!(
                        "client {}: {} connects, {} closes, transport open: {}",
                        client.name, client.connects, client.closes, client.transport_open
                    ),
                });
            }
        }
        Ok(())
    }
}

/// A client that claims a live session holds a transport.
pub struct StatusMatchesTransport;

impl Invariant for StatusMatchesTransport {
    fn name(&self) -> &'static str {
        "status_matches_transport"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for client in &state.clients {
            let live = matches!(
                client.status,
                ConnectionStatus::Authenticating | ConnectionStatus::Connected { .. }
            );
            if live && !client.transport_open {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!(
                        "client {}: status {:?} without an open transport",
                        client.name, client.status
                    ),
                });
            }
        }
        Ok(())
    }
}

/// The server's echo of a local message never shows up as a second copy.
///
/// Holds while echo suppression is enabled and each user runs one client.
pub struct EchoesSuppressed;

impl Invariant for EchoesSuppressed {
    fn name(&self) -> &'static str {
        "echoes_suppressed"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for client in &state.clients {
            let sent: HashSet<(Option<&UserId>, &str)> = client
                .messages
                .iter()
                .filter(|message| message.local)
                .map(|message| (message.sender.as_ref(), message.content.as_str()))
                .collect();

            let duplicate = client.messages.iter().find(|message| {
                let key = (message.sender.as_ref(), message.content.as_str());
                !message.local && sent.contains(&key)
            });
            if let Some(message) = duplicate {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!(
                        "client {}: echo of {:?} appended as entry {}",
                        client.name, message.content, message.entry
                    ),
                });
            }
        }
        Ok(())
    }
}

/// A direct conversation only shows its two participants.
pub struct DirectPeerBound;

impl Invariant for DirectPeerBound {
    fn name(&self) -> &'static str {
        "direct_peer_bound"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for client in &state.clients {
            let Some(Destination::DirectPeer(peer)) = &client.destination else {
                continue;
            };
            let own: HashSet<&UserId> = client
                .messages
                .iter()
                .filter(|message| message.local)
                .filter_map(|message| message.sender.as_ref())
                .chain(client.user())
                .collect();

            let stray = client.messages.iter().find(|message| {
                message.sender.as_ref().is_none_or(|sender| sender != peer && !own.contains(sender))
            });
            if let Some(message) = stray {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!(
                        "client {}: entry {} from {:?} in conversation with {}",
                        client.name, message.entry, message.sender, peer
                    ),
                });
            }
        }
        Ok(())
    }
}
