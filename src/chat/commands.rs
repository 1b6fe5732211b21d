//! Command parsing for the interactive loops.
//!
//! A handful of bare words control the session instead of being sent to the
//! server.  The words may also be written with a leading `/`.

/// A parsed chat command.
///
/// These commands control the chat session and are not sent to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    /// Clear the conversation history.
    Clear,

    /// Display help information.
    Help,

    /// Display session statistics.
    Stats,

    /// Exit the chat application.
    Quit,
}

/// Parses user input for commands.
///
/// Returns `Some(ChatCommand)` if the whole input is a command word,
/// or `None` if it should be treated as a regular message.
///
/// # Examples
///
/// ```
/// # use vllm_chat::chat::{ChatCommand, parse_command};
/// assert_eq!(parse_command("quit"), Some(ChatCommand::Quit));
/// assert_eq!(parse_command("/clear"), Some(ChatCommand::Clear));
/// assert!(parse_command("quit smoking tips?").is_none());
/// ```
pub fn parse_command(input: &str) -> Option<ChatCommand> {
    let input = input.trim();
    let word = input.strip_prefix('/').unwrap_or(input).to_lowercase();

    match word.as_str() {
        "quit" | "exit" | "q" => Some(ChatCommand::Quit),
        "clear" => Some(ChatCommand::Clear),
        "help" | "?" => Some(ChatCommand::Help),
        "stats" => Some(ChatCommand::Stats),
        _ => None,
    }
}

/// Returns the help text listing available commands.
pub fn help_text() -> &'static str {
    r#"Available commands:
  clear    Clear conversation history
  stats    Show session statistics
  help     Show this help message
  quit     Exit the chat (also: exit, q, Ctrl+D)"#
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_quit_commands() {
        assert_eq!(parse_command("quit"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("exit"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("q"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("  QUIT  "), Some(ChatCommand::Quit));
        assert_eq!(parse_command("/exit"), Some(ChatCommand::Quit));
    }

    #[test]
    fn parse_clear() {
        assert_eq!(parse_command("clear"), Some(ChatCommand::Clear));
        assert_eq!(parse_command("Clear"), Some(ChatCommand::Clear));
        assert_eq!(parse_command("/clear"), Some(ChatCommand::Clear));
    }

    #[test]
    fn parse_help_and_stats() {
        assert_eq!(parse_command("help"), Some(ChatCommand::Help));
        assert_eq!(parse_command("/?"), Some(ChatCommand::Help));
        assert_eq!(parse_command("stats"), Some(ChatCommand::Stats));
    }

    #[test]
    fn non_commands() {
        assert_eq!(parse_command("Hello there!"), None);
        assert_eq!(parse_command("clear the table"), None);
        assert_eq!(parse_command(""), None);
        assert_eq!(parse_command("  "), None);
        assert_eq!(parse_command("/model m1"), None);
    }

    #[test]
    fn help_text_not_empty() {
        let help = help_text();
        assert!(help.contains("quit"));
        assert!(help.contains("clear"));
        assert!(help.contains("stats"));
    }
}
