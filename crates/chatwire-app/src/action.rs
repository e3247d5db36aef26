//! Application side-effects and intents.
//!
//! This module defines the [`AppAction`] enum, which represents instructions
//! produced by the [`crate::App`] state machine for the runtime to execute.

use chatwire_client::{Credentials, Destination};

/// Actions produced by the App state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppAction {
    /// Render the UI.
    Render,

    /// Quit the application.
    Quit,

    /// Open a fresh session to the server.
    Connect,

    /// Close the current session.
    Disconnect,

    /// Log in or sign up.
    SubmitCredentials(Credentials),

    /// Bind the conversation to a destination.
    OpenConversation(Destination),

    /// Send a message to the open conversation.
    SendMessage {
        /// Message text.
        text: String,
    },
}
