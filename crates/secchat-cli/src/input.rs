//! Parsing of lines typed at the prompt.

/// What a single line of input asks for.
#[derive(Debug, PartialEq, Eq)]
pub enum Input<'a> {
    /// Plain text to encrypt and send.
    Say(&'a str),
    /// `/typing`
    Typing,
    /// `/recall <id>`
    Recall(&'a str),
    /// `/read <id>`
    Read(&'a str),
    /// `/status`
    Status,
    /// `/quit`
    Quit,
    /// Blank line.
    Empty,
    /// Something starting with `/` we could not make sense of.
    Invalid(String),
}

/// Classify one line of input. Surrounding whitespace is ignored.
pub fn parse(line: &str) -> Input<'_> {
    let line = line.trim();
    if line.is_empty() {
        return Input::Empty;
    }
    let Some(command) = line.strip_prefix('/') else {
        return Input::Say(line);
    };

    let (name, arg) = match command.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (command, ""),
    };
    match (name, arg) {
        ("typing", "") => Input::Typing,
        ("status", "") => Input::Status,
        ("quit" | "exit", "") => Input::Quit,
        ("recall", id) if !id.is_empty() => Input::Recall(id),
        ("read", id) if !id.is_empty() => Input::Read(id),
        ("recall" | "read", _) => Input::Invalid(format!("usage: /{name} <message id>")),
        _ => Input::Invalid(format!("unknown command: /{name}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn plain_text_is_sent() {
        assert_eq!(parse("  hello there \n"), Input::Say("hello there"));
    }

    #[test]
    fn blank_lines_are_ignored() {
        assert_eq!(parse(""), Input::Empty);
        assert_eq!(parse("   \t"), Input::Empty);
    }

    #[test]
    fn commands_without_arguments() {
        assert_eq!(parse("/typing"), Input::Typing);
        assert_eq!(parse("/status"), Input::Status);
        assert_eq!(parse("/quit"), Input::Quit);
        assert_eq!(parse("/exit"), Input::Quit);
    }

    #[test]
    fn commands_with_ids() {
        assert_eq!(parse("/recall msg_123"), Input::Recall("msg_123"));
        assert_eq!(parse("/read   msg_9  "), Input::Read("msg_9"));
    }

    #[test]
    fn missing_id_is_reported() {
        assert_matches!(
            parse("/recall"),
            Input::Invalid(msg) if msg.contains("/recall <message id>")
        );
        assert_matches!(parse("/read "), Input::Invalid(msg) if msg.contains("/read"));
    }

    #[test]
    fn unknown_commands_are_reported() {
        assert_matches!(
            parse("/dance now"),
            Input::Invalid(msg) if msg == "unknown command: /dance"
        );
        assert_matches!(parse("/typing fast"), Input::Invalid(_));
    }
}
