//! Command-line interface for the MCP host.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::agent_loop::DispatchMode;
use crate::server::presets::Preset;

/// Chat host for remote MCP tool servers
#[derive(Parser, Debug)]
#[command(name = "mcp-host", version, about = "Chat host for remote MCP tool servers")]
pub struct Cli {
    /// Path to a TOML config file (defaults to $MCP_HOST_CONFIG, then the platform config dir)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Connect the configured servers and run the HTTP host
    Serve(ServeArgs),
    /// Run one of the built-in demo tool servers
    ToolServer(ToolServerArgs),
    /// Connect the configured servers and print the tool catalog
    Tools,
    /// Chat with the model from the terminal
    Chat(ChatArgs),
}

/// Arguments for `mcp-host serve`.
#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Address to bind, overriding `[http].bind`
    #[arg(short, long)]
    pub bind: Option<String>,
}

/// Arguments for `mcp-host tool-server`.
#[derive(Parser, Debug)]
pub struct ToolServerArgs {
    /// Demo server to run (todoplan, project, example)
    #[arg(short, long)]
    pub preset: Preset,

    /// Port to listen on; defaults to the preset's port or its env override
    #[arg(long)]
    pub port: Option<u16>,

    /// Interface to bind
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,
}

/// Arguments for `mcp-host chat`.
#[derive(Parser, Debug)]
pub struct ChatArgs {
    /// Operator prompt placed before the generated tool instructions
    #[arg(short, long)]
    pub system: Option<String>,

    /// How tool calls of one response run (sequential, concurrent)
    #[arg(long)]
    pub dispatch: Option<DispatchMode>,

    /// Single message to send; starts an interactive session when omitted
    pub prompt: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_serve_with_bind() {
        let cli = Cli::try_parse_from(["mcp-host", "serve", "--bind", "0.0.0.0:3000"]).unwrap();
        match cli.command {
            Commands::Serve(args) => assert_eq!(args.bind.as_deref(), Some("0.0.0.0:3000")),
            other => panic!("expected Serve, got {other:?}"),
        }
    }

    #[test]
    fn parse_tool_server_preset_and_port() {
        let cli = Cli::try_parse_from([
            "mcp-host",
            "tool-server",
            "--preset",
            "project",
            "--port",
            "9001",
        ])
        .unwrap();
        match cli.command {
            Commands::ToolServer(args) => {
                assert_eq!(args.preset, Preset::Project);
                assert_eq!(args.port, Some(9001));
                assert_eq!(args.host, "0.0.0.0");
            }
            other => panic!("expected ToolServer, got {other:?}"),
        }
    }

    #[test]
    fn parse_tool_server_rejects_unknown_preset() {
        assert!(Cli::try_parse_from(["mcp-host", "tool-server", "--preset", "weather"]).is_err());
    }

    #[test]
    fn parse_chat_with_global_config() {
        let cli = Cli::try_parse_from([
            "mcp-host",
            "chat",
            "--config",
            "/tmp/host.toml",
            "--dispatch",
            "concurrent",
            "what should I do today?",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/host.toml")));
        match cli.command {
            Commands::Chat(args) => {
                assert_eq!(args.dispatch, Some(DispatchMode::Concurrent));
                assert!(args.system.is_none());
                assert_eq!(args.prompt.as_deref(), Some("what should I do today?"));
            }
            other => panic!("expected Chat, got {other:?}"),
        }
    }

    #[test]
    fn parse_tools() {
        let cli = Cli::try_parse_from(["mcp-host", "tools"]).unwrap();
        assert!(matches!(cli.command, Commands::Tools));
    }

    #[test]
    fn parse_missing_subcommand_is_error() {
        assert!(Cli::try_parse_from(["mcp-host"]).is_err());
    }
}
