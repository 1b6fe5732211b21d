//! Command-line chat client for vLLM OpenAI-compatible servers.
//!
//! # Usage
//!
//! ```bash
//! # One prompt, reply printed when complete
//! vllm-chat --prompt "What is the capital of France?"
//!
//! # Several messages given as ROLE:CONTENT pairs
//! vllm-chat "system:You are terse." "user:Name three primes."
//!
//! # Prompt from a pipe, streamed
//! echo "Tell me a joke" | vllm-chat --stream
//!
//! # Ping a server every five seconds
//! vllm-chat --url gpu-box:8000 --loop-mode
//!
//! # Interactive chat
//! vllm-chat --interactive
//! ```

use std::io::Read;
use std::sync::Arc;
use std::time::Duration;

use arrrg::CommandLine;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use time::OffsetDateTime;
use time::macros::format_description;

use vllm_chat::chat::{
    ChatArgs, ChatCommand, ChatConfig, ChatMode, ChatSession, LOOP_INTERVAL, LOOP_MESSAGE,
    PlainTextRenderer, Renderer, help_text, parse_command, parse_message_arg,
};
use vllm_chat::{ChatClient, Interrupt, Message, StderrLogger, Transcript};

/// Characters of each reply shown in loop mode.
const LOOP_PREVIEW_CHARS: usize = 100;

/// Main entry point for the vllm-chat application.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (args, free) = ChatArgs::from_command_line_relaxed("vllm-chat [OPTIONS] [ROLE:CONTENT]...");
    let config = match ChatConfig::try_from(&args) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error: {err}");
            std::process::exit(1);
        }
    };
    if let Err(err) = config.validate() {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }

    let mut client = match ChatClient::with_options(args.url(), Some(config.timeout)) {
        Ok(client) => client,
        Err(err) => {
            eprintln!("Error: {err}");
            std::process::exit(1);
        }
    };
    if args.verbose {
        client = client.with_logger(Arc::new(StderrLogger::new()));
    }

    let mode = args.mode();
    let interrupt = Arc::new(Interrupt::new());
    {
        // First Ctrl+C abandons the current request or stops the loop, a second one exits.
        let interrupt = interrupt.clone();
        ctrlc::set_handler(move || {
            if interrupt.trigger() {
                std::process::exit(130);
            }
        })?;
    }
    let mut renderer =
        PlainTextRenderer::with_color(config.use_color).with_interrupt(interrupt.clone());

    match mode {
        ChatMode::OneShot => {
            let messages = match one_shot_messages(&args, &free) {
                Ok(Some(messages)) => messages,
                Ok(None) => {
                    eprintln!(
                        "Error: No prompt provided. Use --prompt, ROLE:CONTENT arguments, or pipe input."
                    );
                    std::process::exit(1);
                }
                Err(err) => {
                    eprintln!("Error: {err}");
                    std::process::exit(1);
                }
            };
            let transcript = seed_transcript(&config, messages);
            let stream = config.stream;
            let mut session = ChatSession::with_transcript(client, config, transcript);
            let result = if stream {
                interrupt
                    .run(session.stream_exchange(&mut renderer))
                    .await
                    .map(|result| result.map(|_| ()))
            } else {
                interrupt.run(session.exchange()).await.map(|result| {
                    result.map(|completion| println!("{}", completion.content))
                })
            };
            match result {
                Some(Ok(())) => {}
                Some(Err(err)) => {
                    renderer.print_error(&err.to_string());
                    std::process::exit(1);
                }
                None => {
                    renderer.print_interrupted();
                    std::process::exit(130);
                }
            }
            if interrupt.is_triggered() {
                std::process::exit(130);
            }
        }
        ChatMode::Loop => run_loop(client, config, &mut renderer, &interrupt).await,
        ChatMode::Interactive => {
            run_interactive(client, config, &mut renderer, &interrupt).await?
        }
    }

    Ok(())
}

/// Messages for one-shot mode: the prompt, else the positional pairs, else stdin.
fn one_shot_messages(
    args: &ChatArgs,
    free: &[String],
) -> Result<Option<Vec<Message>>, Box<dyn std::error::Error>> {
    if let Some(prompt) = &args.prompt {
        return Ok(Some(vec![Message::user(prompt.as_str())]));
    }
    if !free.is_empty() {
        let messages = free
            .iter()
            .map(|arg| parse_message_arg(arg))
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(Some(messages));
    }
    let mut input = String::new();
    std::io::stdin().read_to_string(&mut input)?;
    let input = input.trim();
    if input.is_empty() {
        Ok(None)
    } else {
        Ok(Some(vec![Message::user(input)]))
    }
}

fn seed_transcript(config: &ChatConfig, messages: Vec<Message>) -> Transcript {
    let mut transcript = match &config.system_prompt {
        Some(prompt) => Transcript::with_system(prompt.as_str()),
        None => Transcript::new(),
    };
    for message in messages {
        transcript.push(message);
    }
    transcript
}

/// Sends [`LOOP_MESSAGE`] every [`LOOP_INTERVAL`] until interrupted.
async fn run_loop(
    client: ChatClient,
    config: ChatConfig,
    renderer: &mut PlainTextRenderer,
    interrupt: &Interrupt,
) {
    println!(
        "Loop mode: sending '{LOOP_MESSAGE}' every {} seconds (Ctrl+C to stop)",
        LOOP_INTERVAL.as_secs()
    );
    let transcript = seed_transcript(&config, vec![Message::user(LOOP_MESSAGE)]);
    while !interrupt.is_triggered() {
        println!("\n[{}] Sending request...", timestamp());
        let stream = config.stream;
        let mut session =
            ChatSession::with_transcript(client.clone(), config.clone(), transcript.clone());
        if stream {
            match interrupt.run(session.stream_exchange(renderer)).await {
                Some(Ok(_)) => {}
                Some(Err(err)) => renderer.print_error(&err.to_string()),
                None => renderer.print_interrupted(),
            }
        } else {
            match interrupt.run(session.exchange()).await {
                Some(Ok(completion)) => {
                    let preview: String =
                        completion.content.chars().take(LOOP_PREVIEW_CHARS).collect();
                    println!("Response: {preview}...");
                }
                Some(Err(err)) => renderer.print_error(&err.to_string()),
                None => renderer.print_interrupted(),
            }
        }
        pause(LOOP_INTERVAL, interrupt).await;
    }
    println!("\nStopped.");
}

/// Sleeps for `duration`, waking early when interrupted.
async fn pause(duration: Duration, interrupt: &Interrupt) {
    tokio::select! {
        _ = tokio::time::sleep(duration) => {}
        _ = interrupt.wait() => {}
    }
}

fn timestamp() -> String {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    now.format(format_description!("[hour]:[minute]:[second]"))
        .unwrap_or_default()
}

/// Reads prompts from the terminal until a quit word, Ctrl+C or Ctrl+D.
async fn run_interactive(
    client: ChatClient,
    config: ChatConfig,
    renderer: &mut PlainTextRenderer,
    interrupt: &Interrupt,
) -> Result<(), Box<dyn std::error::Error>> {
    let stream = config.stream;
    let mut session = ChatSession::new(client, config);
    let mut rl = DefaultEditor::new()?;

    println!("Interactive chat mode (type 'quit' or 'exit' to end)");
    println!("{}", "=".repeat(60));

    loop {
        interrupt.reset();
        println!();
        let line = match rl.readline("You: ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                println!("\nExiting...");
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
                ChatCommand::Quit => break,
                ChatCommand::Clear => {
                    session.clear();
                    renderer.print_info("Conversation cleared.");
                }
                ChatCommand::Help => println!("{}", help_text()),
                ChatCommand::Stats => println!("{}", session.stats()),
            }
            continue;
        }

        renderer.start_response("Assistant");
        if stream {
            // The streamed reply is shown but not kept as context.
            match interrupt.run(session.send_streaming(line, renderer)).await {
                Some(Ok(_)) => {}
                Some(Err(err)) => renderer.print_error(&err.to_string()),
                None => renderer.print_interrupted(),
            }
        } else {
            match interrupt.run(session.send(line)).await {
                Some(Ok(completion)) => {
                    renderer.print_text(&completion.content);
                    renderer.finish_response();
                }
                Some(Err(err)) => renderer.print_error(&err.to_string()),
                None => renderer.print_interrupted(),
            }
        }
    }

    Ok(())
}
