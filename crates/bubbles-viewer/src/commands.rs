//! Operator commands read from standard input.
//!
//! One command per line, case-insensitive: `connect`, `disconnect`,
//! `quit`, `help`. Single-letter abbreviations work too.

use bubbles_client::Command;

/// What the operator asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// A blank line.
    Empty,
    /// A command for the session.
    Session(Command),
    /// Stop the viewer.
    Quit,
    /// Print the command list.
    Help,
    /// Anything else.
    Unknown(String),
}

/// One-line usage summary.
pub const USAGE: &str = "commands: connect (c), disconnect (d), quit (q), help (h)";

/// Parse one line of input.
pub fn parse(line: &str) -> Input {
    let word = line.trim();
    match word.to_ascii_lowercase().as_str() {
        "" => Input::Empty,
        "connect" | "c" => Input::Session(Command::Connect),
        "disconnect" | "d" => Input::Session(Command::Disconnect),
        "quit" | "q" | "exit" => Input::Quit,
        "help" | "h" | "?" => Input::Help,
        _ => Input::Unknown(word.to_owned()),
    }
}
