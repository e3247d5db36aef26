//! Terminal client for chatwire
//!
//! A thin shell over [`chatwire_app::Driver`] that provides line-oriented
//! terminal I/O. All orchestration logic lives in the generic
//! [`chatwire_app::Runtime`].

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod render;
pub mod terminal;

pub use chatwire_app::{App, AppAction, AppEvent, Bridge, Driver, Runtime};
pub use terminal::{TICK_INTERVAL, TerminalDriver, TerminalError};
