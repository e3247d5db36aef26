//! Command-line input parsing.
//!
//! Every line the user submits is either a slash command or message text.
//! Parsing never fails: unrecognized commands become [`Command::Unknown`] so
//! the app can explain them.

/// A parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/login <user> <password>`
    Login {
        /// Account name.
        username: String,
        /// Password, possibly empty.
        password: String,
    },
    /// `/signup <user> <password>`
    Signup {
        /// Account name.
        username: String,
        /// Password, possibly empty.
        password: String,
    },
    /// `/room <name>`
    Room(String),
    /// `/dm <user>`
    Direct(String),
    /// `/leave`: close the current session.
    Leave,
    /// `/connect`: open a fresh session.
    Connect,
    /// `/quit`
    Quit,
    /// `/help`
    Help,
    /// Message text for the open conversation.
    Say(String),
    /// Unrecognized or incomplete command.
    Unknown(String),
    /// Blank line.
    Empty,
}

/// Usage text for [`Command::Help`].
pub const HELP: &str = "commands: /login <user> <password>, /signup <user> <password>, \
                        /room <name>, /dm <user>, /leave, /connect, /quit";

/// Parse one input line.
pub fn parse(line: &str) -> Command {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() {
        return Command::Empty;
    }

    let Some(rest) = line.trim_start().strip_prefix('/') else {
        return Command::Say(line.to_string());
    };

    let mut words = rest.split_whitespace();
    let name = words.next().unwrap_or_default();
    let arg = words.next().map(str::to_string);
    let extra = words.next().map(str::to_string);
    // Words past the second argument are never silently dropped.
    if name != "help" && words.next().is_some() {
        return Command::Unknown(line.trim().to_string());
    }

    match (name, arg, extra) {
        ("login", Some(username), password) => {
            Command::Login { username, password: password.unwrap_or_default() }
        },
        ("signup", Some(username), password) => {
            Command::Signup { username, password: password.unwrap_or_default() }
        },
        ("room" | "join", Some(room), None) => Command::Room(room),
        ("dm" | "msg", Some(peer), None) => Command::Direct(peer),
        ("leave", None, None) => Command::Leave,
        ("connect", None, None) => Command::Connect,
        ("quit" | "exit", None, None) => Command::Quit,
        ("help", _, _) => Command::Help,
        _ => Command::Unknown(line.trim().to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_credentials() {
        assert_eq!(parse("/login alice secret"), Command::Login {
            username: "alice".into(),
            password: "secret".into()
        });
        assert_eq!(parse("/signup bob"), Command::Signup {
            username: "bob".into(),
            password: String::new()
        });
    }

    #[test]
    fn passwords_with_spaces_are_refused() {
        assert_eq!(
            parse("/login alice my secret"),
            Command::Unknown("/login alice my secret".into())
        );
        assert_eq!(parse("/signup bob a b"), Command::Unknown("/signup bob a b".into()));
    }

    #[test]
    fn parses_destinations() {
        assert_eq!(parse("/room general"), Command::Room("general".into()));
        assert_eq!(parse("/dm bob\n"), Command::Direct("bob".into()));
        assert_eq!(parse("/room"), Command::Unknown("/room".into()));
        assert_eq!(parse("/room a b"), Command::Unknown("/room a b".into()));
    }

    #[test]
    fn plain_text_is_kept_verbatim() {
        assert_eq!(parse("hello  there "), Command::Say("hello  there ".into()));
        assert_eq!(parse("   "), Command::Empty);
    }

    #[test]
    fn unknown_commands() {
        assert_eq!(parse("/dance"), Command::Unknown("/dance".into()));
        assert_eq!(parse("/quit"), Command::Quit);
        assert_eq!(parse("/help me"), Command::Help);
    }
}
