//! Command vocabulary for `/`-prefixed lines

/// A recognised command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/help` or `/menu`
    Help,
    /// `/list`
    List,
    /// `/whoami`
    WhoAmI,
    /// `/busy`
    Busy,
    /// `/free`
    Free,
    /// `/chat <USER>`; the argument is upper-cased, `None` when missing
    Chat(Option<String>),
    /// `/leave`
    Leave,
    /// `/rooms`
    Rooms,
    /// `/join <ROOM_ID>`; `None` when missing
    Join(Option<String>),
    /// `/quit`
    Quit,
    /// Any other `/word`
    Unknown(String),
}

/// A classified inbound line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// Blank line, ignored
    Empty,
    /// Command line
    Command(Command),
    /// Chat content for the active room
    Chat(String),
}

/// Classify a line of client input
pub fn parse_line(line: &str) -> Input {
    let line = line.trim();

    if line.is_empty() {
        return Input::Empty;
    }

    let Some(rest) = line.strip_prefix('/') else {
        return Input::Chat(line.to_string());
    };

    let mut parts = rest.splitn(2, char::is_whitespace);
    let word = parts.next().unwrap_or_default().to_ascii_lowercase();
    let arg = parts
        .next()
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(String::from);

    let command = match word.as_str() {
        "help" | "menu" => Command::Help,
        "list" => Command::List,
        "whoami" => Command::WhoAmI,
        "busy" => Command::Busy,
        "free" => Command::Free,
        "chat" => Command::Chat(arg.map(|a| a.to_uppercase())),
        "leave" => Command::Leave,
        "rooms" => Command::Rooms,
        "join" => Command::Join(arg),
        "quit" => Command::Quit,
        _ => Command::Unknown(word),
    };

    Input::Command(command)
}
