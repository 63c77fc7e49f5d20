//! Demo tool servers.

use serde::Deserialize;
use serde_json::json;
use strum::{Display, EnumIter, EnumString};

use super::tool::{ServerTool, ToolArguments};
use super::ToolServer;
use crate::error::HostError;
use crate::mcp::schema::SchemaBuilder;

/// Built-in demo servers runnable with `mcp-host tool-server`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum Preset {
    Todoplan,
    Project,
    Example,
}

impl Preset {
    pub fn build(self) -> ToolServer {
        match self {
            Self::Todoplan => todoplan(),
            Self::Project => project(),
            Self::Example => example(),
        }
    }

    pub fn default_port(self) -> u16 {
        match self {
            Self::Todoplan | Self::Example => 8000,
            Self::Project => 8001,
        }
    }

    /// Environment variable overriding [`Self::default_port`].
    pub fn port_env(self) -> &'static str {
        match self {
            Self::Todoplan => "MCP_SERVER_TODOPLAN_PORT",
            Self::Project => "MCP_SERVER_PROJECT_PORT",
            Self::Example => "PORT",
        }
    }
}

#[derive(Deserialize)]
struct CategoryArgs {
    category: String,
}

fn category_schema(described: bool) -> serde_json::Value {
    let description = if described {
        "Category of todo to retrieve (life, work, family, friends)"
    } else {
        "Todo category"
    };
    SchemaBuilder::new().string("category", description, true).build()
}

fn todo_tool(work_item: &'static str, described: bool) -> ServerTool {
    ServerTool::new(
        "get-todo",
        "Get the current todo for a category",
        category_schema(described),
        move |args: ToolArguments| async move {
            let CategoryArgs { category } = args.deserialize()?;
            let todo = match category.as_str() {
                "life" => "go to the gym",
                "work" => work_item,
                "family" => "trip to disneyland",
                "friends" => "drink at the pub",
                _ => "no todo available",
            };
            Ok::<_, HostError>(json!(todo))
        },
    )
}

fn plan_tool(plan: &'static str) -> ServerTool {
    ServerTool::new(
        "get-plan",
        "Get today's plan",
        SchemaBuilder::new().build(),
        move |_args| async move { Ok(json!(plan)) },
    )
}

/// `todoplan-server`: `get-todo` and `get-plan`.
pub fn todoplan() -> ToolServer {
    ToolServer::new("todoplan-server", "1.0.0")
        .with_tool(todo_tool("finish the project Jupiter report", true))
        .with_tool(plan_tool("meet my friends"))
}

/// `project-mcp-server`: `get-project-details`.
pub fn project() -> ToolServer {
    ToolServer::new("project-mcp-server", "1.0.0").with_tool(ServerTool::new(
        "get-project-details",
        "Get the details of a project by name",
        SchemaBuilder::new()
            .string("project_name", "Name of the project to retrieve details", true)
            .build(),
        |args: ToolArguments| async move {
            let details = match args.get_str("project_name")? {
                "Earth" => "Project A is a project to build a website for a client",
                "Jupiter" => "Project B is a project to build a mobile app for a client",
                "Saturn" => "Project C is a project to build a desktop app for a client",
                "Uranus" => "Project D is a project to build a robot for a client",
                _ => "no todo available",
            };
            Ok::<_, HostError>(json!(details))
        },
    ))
}

/// `example-server`: the single-server variant with its own answers.
pub fn example() -> ToolServer {
    ToolServer::new("example-server", "1.0.0")
        .with_tool(todo_tool("finish the project report", false))
        .with_tool(plan_tool("buy stocks"))
}
