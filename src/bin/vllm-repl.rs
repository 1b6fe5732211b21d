//! Minimal perpetual chat client for vLLM OpenAI-compatible servers.
//!
//! The model is discovered from `/v1/models` unless given, the history is
//! trimmed to the most recent messages before every request, and a reply
//! that fails with a context-length error is retried once with only the
//! latest user message.
//!
//! # Usage
//!
//! ```bash
//! vllm-repl http://localhost:8000
//! vllm-repl 192.168.1.100:8000
//! vllm-repl --max-history 10 --system "Answer in French" gpu-box:8000
//! ```
//!
//! # Commands
//!
//! - `clear` - Clear conversation history
//! - `stats` - Show session statistics
//! - `help` - Show available commands
//! - `quit` - Exit (also `exit`, `q`, Ctrl+C, Ctrl+D)

use std::sync::Arc;

use arrrg::CommandLine;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use vllm_chat::chat::{
    ChatCommand, ChatSession, PlainTextRenderer, ReplArgs, Renderer, help_text, parse_command,
};
use vllm_chat::{ChatClient, Interrupt, StderrLogger};

const USAGE: &str = "vllm-repl [OPTIONS] <URL_OR_HOST:PORT>";

/// Main entry point for the vllm-repl application.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (args, free) = ReplArgs::from_command_line_relaxed(USAGE);
    let Some(url) = free.first() else {
        eprintln!("Usage: {USAGE}");
        eprintln!("Example: vllm-repl http://localhost:8000");
        eprintln!("         vllm-repl 192.168.1.100:8000");
        std::process::exit(1);
    };

    let requested_model = args.model.clone();
    let verbose = args.verbose;
    // The model is filled in once known.
    let config = match args.into_config(String::new()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error: {err}");
            std::process::exit(1);
        }
    };

    let mut client = match ChatClient::with_options(url, Some(config.timeout)) {
        Ok(client) => client,
        Err(err) => {
            eprintln!("Error: {err}");
            std::process::exit(1);
        }
    };
    if verbose {
        client = client.with_logger(Arc::new(StderrLogger::new()));
    }
    println!("Connecting to: {}", client.endpoint());

    let model = match requested_model {
        Some(model) => model,
        None => match client.discover_model().await {
            Some(model) => model,
            None => {
                eprintln!(
                    "Error: Could not determine model name. Make sure the vLLM server is running."
                );
                std::process::exit(1);
            }
        },
    };
    let config = config.with_model(model);
    if let Err(err) = config.validate() {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }

    println!("Using model: {}", config.model());
    println!("Type 'quit' or Ctrl+C to exit. Type 'clear' to clear conversation history.\n");

    let interrupt = Arc::new(Interrupt::new());
    {
        // Ctrl+C during a request abandons it, a second one exits.
        let interrupt = interrupt.clone();
        ctrlc::set_handler(move || {
            if interrupt.trigger() {
                std::process::exit(130);
            }
        })?;
    }
    let mut renderer = PlainTextRenderer::with_color(config.use_color);
    let mut session = ChatSession::new(client, config);
    let mut rl = DefaultEditor::new()?;

    loop {
        interrupt.reset();
        let line = match rl.readline("You: ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                println!("\nGoodbye!");
                break;
            }
            Err(err) => {
                renderer.print_error(&format!("Input error: {err}"));
                break;
            }
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let _ = rl.add_history_entry(line);

        if let Some(cmd) = parse_command(line) {
            match cmd {
                ChatCommand::Quit => {
                    println!("Goodbye!");
                    break;
                }
                ChatCommand::Clear => {
                    session.clear();
                    renderer.print_info("Conversation history cleared.\n");
                }
                ChatCommand::Help => println!("{}\n", help_text()),
                ChatCommand::Stats => println!("{}\n", session.stats()),
            }
            continue;
        }

        renderer.start_response("Assistant");
        match interrupt.run(session.send(line)).await {
            Some(Ok(completion)) => {
                if completion.recovered() {
                    renderer.print_info("Conversation too long. History cleared and retried.");
                    renderer.start_response("Assistant");
                }
                renderer.print_text(&completion.content);
                renderer.finish_response();
                println!();
            }
            Some(Err(err)) => {
                renderer.print_error(&err.to_string());
                println!();
            }
            None => {
                renderer.print_interrupted();
                println!();
            }
        }
    }

    Ok(())
}
