//! Plain-text rendering of the transcript.
//!
//! The terminal prints each [`TranscriptLine`] once, when it is appended.
//! Delivery failures arrive as their own lines, so nothing printed earlier
//! ever needs to be redrawn.

use std::io::{self, Write};

use chatwire_app::{ConnectionStatus, TranscriptLine};
use chatwire_client::UserId;

/// Format one transcript line.
pub fn format_line(line: &TranscriptLine) -> String {
    match line {
        TranscriptLine::Notice(text) => format!("* {text}"),
        TranscriptLine::Error(text) => format!("! {text}"),
        TranscriptLine::Message(message) => format_message(
            message.sender.as_ref(),
            &message.content,
            message.time_label.as_deref(),
        ),
        TranscriptLine::Undelivered { content, .. } => format!("! not delivered: {content}"),
    }
}

/// `[HH:MM] sender: content`, without the time for untimestamped frames.
pub fn format_message(sender: Option<&UserId>, content: &str, time_label: Option<&str>) -> String {
    let sender = sender.map_or("?", UserId::as_str);
    match time_label {
        Some(time) => format!("[{time}] {sender}: {content}"),
        None => format!("{sender}: {content}"),
    }
}

/// Write the lines of `transcript` from index `from` on.
///
/// Returns the new count of written lines.
pub fn write_new_lines<W: Write>(
    out: &mut W,
    transcript: &[TranscriptLine],
    from: usize,
) -> io::Result<usize> {
    for line in transcript.iter().skip(from) {
        writeln!(out, "{}", format_line(line))?;
    }
    Ok(transcript.len().max(from))
}

/// One-word connection summary for the prompt.
pub fn format_status(status: &ConnectionStatus) -> String {
    match status {
        ConnectionStatus::Disconnected => "offline".to_string(),
        ConnectionStatus::Connecting => "connecting".to_string(),
        ConnectionStatus::Authenticating => "login".to_string(),
        ConnectionStatus::Connected { user } => user.to_string(),
    }
}
