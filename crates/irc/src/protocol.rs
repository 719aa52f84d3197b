//! Outbound line encoding and the one inbound signal we care about.

/// A single outbound protocol line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line<'a> {
    /// `PASS <credential>`
    Pass(&'a str),
    /// `NICK <username>`
    Nick(&'a str),
    /// `JOIN #<destination>`
    Join(&'a str),
    /// `PRIVMSG #<destination> :<text>`
    Privmsg { destination: &'a str, text: &'a str },
    /// `PONG :<server identity>`
    Pong(&'a str),
}

impl Line<'_> {
    /// Encode as wire bytes, CRLF-terminated.
    ///
    /// CR and LF inside arguments are replaced by spaces so one `Line` is
    /// always exactly one protocol line.
    #[must_use]
    pub fn encode(&self) -> String {
        match self {
            Self::Pass(credential) => format!("PASS {}\r\n", single_line(credential)),
            Self::Nick(username) => format!("NICK {}\r\n", single_line(username)),
            Self::Join(destination) => format!("JOIN #{}\r\n", single_line(destination)),
            Self::Privmsg { destination, text } => format!(
                "PRIVMSG #{} :{}\r\n",
                single_line(destination),
                single_line(text)
            ),
            Self::Pong(server) => format!("PONG :{}\r\n", single_line(server)),
        }
    }

    /// Command word, for logging without leaking arguments.
    #[must_use]
    pub fn command(&self) -> &'static str {
        match self {
            Self::Pass(_) => "PASS",
            Self::Nick(_) => "NICK",
            Self::Join(_) => "JOIN",
            Self::Privmsg { .. } => "PRIVMSG",
            Self::Pong(_) => "PONG",
        }
    }
}

fn single_line(arg: &str) -> String {
    arg.replace(['\r', '\n'], " ")
}

/// Whether an inbound line is the server's keep-alive ping.
///
/// Only the command position counts: `PING :tmi.twitch.tv` and
/// `:server PING :x` match, a chat message containing "PING" does not.
#[must_use]
pub fn is_keepalive(line: &str) -> bool {
    let line = line.trim_start();
    let rest = match line.strip_prefix(':') {
        Some(prefixed) => prefixed.split_once(' ').map_or("", |(_, rest)| rest),
        None => line,
    };
    rest.split_ascii_whitespace()
        .next()
        .is_some_and(|cmd| cmd.eq_ignore_ascii_case("PING"))
}
