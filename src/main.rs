//! mcp-host binary entry point.

use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use mcp_host::agent_loop::{CycleEvent, CycleStatus, Orchestrator};
use mcp_host::cli::{ChatArgs, Cli, Commands, ServeArgs, ToolServerArgs};
use mcp_host::config::HostConfig;
use mcp_host::conversation::{Conversation, OutcomePayload};
use mcp_host::error::HostError;
use mcp_host::host::{self, HostState};
use mcp_host::mcp::{ConnectResult, ServerRegistry, SseConnector, SseOptions};
use mcp_host::provider::create_endpoint;
use mcp_host::server::{self, SessionTable, SseSettings};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(log_filter(std::env::var(EnvFilter::DEFAULT_ENV).ok()))
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    let result = match cli.command {
        Commands::Serve(args) => handle_serve(config_path, args).await,
        Commands::ToolServer(args) => handle_tool_server(args).await,
        Commands::Tools => handle_tools(config_path).await,
        Commands::Chat(args) => handle_chat(config_path, args).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

/// `RUST_LOG` directives when set and valid, `info` otherwise.
fn log_filter(directives: Option<String>) -> EnvFilter {
    directives
        .filter(|directives| !directives.trim().is_empty())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

fn load_config(path: Option<&std::path::Path>) -> Result<HostConfig, HostError> {
    let config = HostConfig::load(path)?;
    config.validate()?;
    Ok(config)
}

fn connector(config: &HostConfig) -> Result<Arc<SseConnector>, HostError> {
    Ok(Arc::new(SseConnector::new(SseOptions {
        open_timeout: config.timeouts.connect(),
        request_timeout: config.timeouts.call(),
    })?))
}

fn report_connections(report: &std::collections::BTreeMap<String, ConnectResult>) {
    for (server, result) in report {
        match result {
            ConnectResult::Connected { tools } => info!(%server, tools, "connected"),
            ConnectResult::Failed { error } => warn!(%server, %error, "unavailable"),
        }
    }
}

async fn handle_serve(
    config_path: Option<&std::path::Path>,
    args: ServeArgs,
) -> Result<(), HostError> {
    let mut config = load_config(config_path)?;
    if let Some(bind) = args.bind {
        config.http.bind = bind;
    }

    let model = create_endpoint(&config.model)?;
    let (state, report) = HostState::connect(&config, connector(&config)?, model).await?;
    report_connections(&report);

    info!("Starting mcp-host v{}", env!("CARGO_PKG_VERSION"));
    let listener = TcpListener::bind(&config.http.bind).await?;
    host::serve(listener, state, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await
}

async fn handle_tool_server(args: ToolServerArgs) -> Result<(), HostError> {
    let port = match args.port {
        Some(port) => port,
        None => std::env::var(args.preset.port_env())
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or_else(|| args.preset.default_port()),
    };
    let listener = TcpListener::bind((args.host.as_str(), port)).await?;
    server::serve(
        listener,
        Arc::new(args.preset.build()),
        SessionTable::new(),
        SseSettings::default(),
    )
    .await
}

async fn handle_tools(config_path: Option<&std::path::Path>) -> Result<(), HostError> {
    let config = load_config(config_path)?;
    let registry = ServerRegistry::from_config(&config, connector(&config)?)?;
    let report = registry.connect_all().await;

    let catalog = registry.catalog();
    for entry in catalog.entries() {
        println!("{}\t{}", entry.qualified_name, entry.description);
    }
    for (server, result) in &report {
        if let ConnectResult::Failed { error } = result {
            eprintln!("{server}: {error}");
        }
    }
    registry.shutdown().await;
    Ok(())
}

async fn handle_chat(config_path: Option<&std::path::Path>, args: ChatArgs) -> Result<(), HostError> {
    let mut config = load_config(config_path)?;
    if let Some(system) = args.system {
        config.model.system_prompt = Some(system);
    }
    if let Some(dispatch) = args.dispatch {
        config.orchestration.dispatch = dispatch;
    }

    let model = create_endpoint(&config.model)?;
    let registry = Arc::new(ServerRegistry::from_config(&config, connector(&config)?)?);
    report_connections(&registry.connect_all().await);

    let orchestrator = Orchestrator::from_config(&config, model, Arc::clone(&registry))
        .with_event_sink(Arc::new(print_event));
    let mut conversation = Conversation::new();

    let result = match args.prompt {
        Some(prompt) => chat_once(&orchestrator, &mut conversation, prompt).await,
        None => chat_loop(&orchestrator, &mut conversation).await,
    };
    registry.shutdown().await;
    result
}

async fn chat_once(
    orchestrator: &Orchestrator,
    conversation: &mut Conversation,
    message: String,
) -> Result<(), HostError> {
    let report = orchestrator.submit(conversation, message).await?;
    if report.status == CycleStatus::BudgetExceeded {
        eprintln!("(stopped after {} rounds without a final answer)", report.rounds);
    }
    Ok(())
}

async fn chat_loop(
    orchestrator: &Orchestrator,
    conversation: &mut Conversation,
) -> Result<(), HostError> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(b"\nQuery: ").await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.eq_ignore_ascii_case("quit") || line.eq_ignore_ascii_case("exit") {
            break;
        }
        // A failed cycle keeps the conversation usable.
        if let Err(err) = chat_once(orchestrator, conversation, line.to_string()).await {
            eprintln!("Error: {err}");
        }
    }
    Ok(())
}

fn print_event(event: CycleEvent) {
    match event {
        CycleEvent::AssistantText { text } => println!("{text}"),
        CycleEvent::ToolInvoked {
            name, arguments, ..
        } => eprintln!("[Calling tool {name} with args {arguments}]"),
        CycleEvent::ToolCompleted { outcome, .. } => {
            let output = outcome.render_for_model();
            let truncated = if output.len() > 200 {
                let mut end = 200;
                while end > 0 && !output.is_char_boundary(end) {
                    end -= 1;
                }
                format!("{}...", &output[..end])
            } else {
                output
            };
            match outcome {
                OutcomePayload::Success { .. } => eprintln!("  ok: {truncated}"),
                OutcomePayload::Error { .. } => eprintln!("  error: {truncated}"),
            }
        }
        CycleEvent::RoundStarted { .. } | CycleEvent::Finished { .. } => {}
    }
}
