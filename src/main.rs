use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::{self, UnboundedReceiver};

use codesherpa::conversation::{ChatResult, ConversationDriver, ConversationEvent, TurnOutcome};
use codesherpa::model::arg::Args;
use codesherpa::model::config::Config;
use codesherpa::openai::model::Role;
use codesherpa::openai::parser::descape;
use codesherpa::openai::provider::OpenAiProvider;
use codesherpa::plugin::{ToolRegistry, ToolServerClient, UploadedFile};

type Driver = ConversationDriver<OpenAiProvider, ToolServerClient>;

#[tokio::main]
async fn main() {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging, stdout belongs to the conversation
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| Config::default_config_path().to_string());
    let mut config = Config::load(&config_path).unwrap_or_else(|e| {
        tracing::error!("Failed to load config: {:#}", e);
        std::process::exit(1);
    });
    if let Some(model) = args.model {
        config.model = model;
    }

    if let Err(e) = run(args, config).await {
        tracing::error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args, config: Config) -> anyhow::Result<()> {
    let registry = match &config.openapi_path {
        Some(path) => ToolRegistry::load(path)?,
        None => ToolRegistry::codesherpa(),
    };
    tracing::info!(
        "Model: {} ({}), {} tool functions",
        config.model,
        config.model.api_name(),
        registry.len()
    );
    tracing::info!("Tool server: {}", config.tool_server_url);
    if let Some(proxy_url) = &config.proxy_url {
        tracing::info!("HTTP proxy configured: {}", proxy_url);
    }

    let chat = OpenAiProvider::from_config(&config)?;
    let tools = ToolServerClient::from_config(&config)?;

    let (tx, rx) = mpsc::unbounded_channel();
    let mut driver = ConversationDriver::new(chat, tools, registry, &config).with_events(tx);
    let streaming = Arc::new(AtomicBool::new(false));
    let renderer = tokio::spawn(render_events(rx, Arc::clone(&streaming)));

    // Ctrl-C stops the in-flight turn, and quits when nothing is streaming
    let cancel = driver.cancel_handle();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            match interrupt_action(&streaming) {
                Interrupt::CancelTurn => cancel.cancel(),
                Interrupt::Exit => {
                    eprintln!();
                    std::process::exit(130);
                }
            }
        }
    });

    let mut attachment = match &args.upload {
        Some(path) => Some(driver.tools().upload_file(path).await?),
        None => None,
    };

    if let Some(prompt) = &args.prompt {
        report(driver.send_user_message(prompt, attachment.as_ref()).await);
    } else {
        repl(&mut driver, &mut attachment).await?;
    }

    drop(driver);
    renderer.await?;
    Ok(())
}

async fn repl(driver: &mut Driver, attachment: &mut Option<UploadedFile>) -> anyhow::Result<()> {
    eprintln!("Commands: /regenerate, /upload <path>, /discard, /new, /quit. Ctrl-C stops a reply, or quits when idle.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        match line.split_once(' ').map_or((line, ""), |(cmd, rest)| (cmd, rest.trim())) {
            ("", _) => continue,
            ("/quit" | "/exit", _) => break,
            ("/new", _) => {
                driver.reset();
                eprintln!("Started a new conversation");
            }
            ("/regenerate", _) => match driver.regenerate().await {
                Ok(Some(outcome)) => report(Ok(outcome)),
                Ok(None) => eprintln!("Nothing to regenerate"),
                Err(e) => report(Err(e)),
            },
            ("/upload", "") => eprintln!("Usage: /upload <path>"),
            ("/upload", path) => match driver.tools().upload_file(path).await {
                Ok(file) => {
                    eprintln!("Attached {} to the next message", file.name);
                    *attachment = Some(file);
                }
                Err(e) => eprintln!("Error: {}", e.user_message()),
            },
            ("/discard", _) => match attachment.take() {
                Some(file) => match driver.tools().delete_upload(&file.name).await {
                    Ok(()) => eprintln!("Removed {}", file.name),
                    Err(e) => eprintln!("Error: {}", e.user_message()),
                },
                None => eprintln!("No attached file"),
            },
            _ => {
                let file = attachment.take();
                report(driver.send_user_message(line, file.as_ref()).await);
            }
        }
    }
    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
enum Interrupt {
    CancelTurn,
    Exit,
}

fn interrupt_action(streaming: &AtomicBool) -> Interrupt {
    if streaming.load(Ordering::SeqCst) {
        Interrupt::CancelTurn
    } else {
        Interrupt::Exit
    }
}

fn report(result: ChatResult<TurnOutcome>) {
    match result {
        Ok(TurnOutcome::Reply(_)) => {}
        Ok(TurnOutcome::Cancelled) => eprintln!("\n[stopped]"),
        Err(e) if e.is_tool_failure() => eprintln!("\nTool error: {}", e.user_message()),
        Err(e) => eprintln!("\nError: {}", e.user_message()),
    }
}

/// Prints conversation events as they arrive
///
/// Text replies stream straight through. Function call messages are held
/// until complete and shown with their escaping undone. `streaming` mirrors
/// the driver's streaming flag for the Ctrl-C handler.
async fn render_events(mut events: UnboundedReceiver<ConversationEvent>, streaming: Arc<AtomicBool>) {
    let mut printed = 0;
    let mut function_call: Option<String> = None;
    let mut stdout = std::io::stdout();

    while let Some(event) = events.recv().await {
        match event {
            ConversationEvent::MessageAdded { message, .. } => {
                flush_function_call(&mut function_call);
                printed = 0;
                match message.role {
                    Role::System | Role::User => {}
                    Role::Function => {
                        let name = message.name.as_deref().unwrap_or("function");
                        println!("[{}] {}", name, message.content);
                    }
                    Role::Assistant if message.is_function_call() => {
                        function_call = Some(message.content);
                    }
                    Role::Assistant => {
                        print!("{}", message.content);
                        printed = message.content.len();
                    }
                }
            }
            ConversationEvent::MessageUpdated { content, .. } => {
                if let Some(pending) = function_call.as_mut() {
                    *pending = content;
                } else {
                    print!("{}", content.get(printed..).unwrap_or_default());
                    printed = content.len();
                }
            }
            ConversationEvent::StreamingChanged(true) => streaming.store(true, Ordering::SeqCst),
            ConversationEvent::StreamingChanged(false) => {
                streaming.store(false, Ordering::SeqCst);
                flush_function_call(&mut function_call);
                println!();
            }
            ConversationEvent::MessagesTruncated { .. } => {
                // regenerate or new conversation, the held call is gone
                function_call = None;
                printed = 0;
            }
        }
        let _ = stdout.flush();
    }
}

fn flush_function_call(function_call: &mut Option<String>) {
    if let Some(content) = function_call.take() {
        println!("[function call] {}", descape(&content));
    }
}
