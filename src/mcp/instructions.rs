//! System instruction synthesis from the live catalog.

use std::collections::HashSet;

use super::catalog::ToolCatalog;

/// Instruction text a server supplied, tagged with the server name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructionSource {
    pub server: String,
    pub instructions: String,
}

impl InstructionSource {
    pub fn new(server: impl Into<String>, instructions: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            instructions: instructions.into(),
        }
    }
}

const NO_TOOLS: &str = "No tools are currently available. Answer from your own knowledge and say so when a request needs a tool.";

const USAGE: &str = "When responding to user queries, use these tools as needed to provide complete answers. If a task requires multiple tools, use them in sequence without waiting for additional prompting. Always analyze tool results and use them to guide further tool choices when necessary.";

/// Render the system instructions sent with every model call.
///
/// Layout: optional operator prompt, the tool list with the naming
/// convention, then one `[server:<name>]` block per server that sent
/// instructions.
pub fn render_system_instructions(
    base_prompt: Option<&str>,
    catalog: &ToolCatalog,
    sources: &[InstructionSource],
) -> String {
    let mut parts = Vec::new();
    if let Some(prompt) = base_prompt.map(str::trim).filter(|p| !p.is_empty()) {
        parts.push(prompt.to_string());
    }
    parts.push(render_tool_section(catalog));
    if let Some(block) = render_server_block(sources) {
        parts.push(block);
    }
    parts.join("\n\n")
}

fn render_tool_section(catalog: &ToolCatalog) -> String {
    if catalog.is_empty() {
        return NO_TOOLS.to_string();
    }

    let listing = catalog
        .entries()
        .iter()
        .map(|entry| format!("- {}: {}", entry.qualified_name, entry.description))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You have access to the following tools from multiple servers:\n{listing}\n\n{USAGE}\n\n{}",
        naming_note(catalog)
    )
}

/// Explain the `<server>_<tool>` convention using up to two real names from different servers.
fn naming_note(catalog: &ToolCatalog) -> String {
    let mut servers = HashSet::new();
    let examples = catalog
        .entries()
        .iter()
        .filter(|entry| servers.insert(entry.server.as_str()))
        .take(2)
        .map(|entry| format!("\"{}\"", entry.qualified_name))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "Important: Tools are prefixed with the server name they belong to (e.g., {examples}). Always call tools by their full prefixed name."
    )
}

fn render_server_block(sources: &[InstructionSource]) -> Option<String> {
    let normalized = normalize_sources(sources);
    if normalized.is_empty() {
        return None;
    }

    let sections = normalized
        .iter()
        .map(|source| format!("[server:{}]\n{}", source.server, source.instructions.trim()))
        .collect::<Vec<_>>();

    Some(format!(
        "Server instructions:\n\n{}",
        sections.join("\n\n")
    ))
}

fn normalize_sources(sources: &[InstructionSource]) -> Vec<InstructionSource> {
    let mut sources = sources
        .iter()
        .filter(|source| !source.instructions.trim().is_empty())
        .cloned()
        .collect::<Vec<_>>();
    sources.sort_by(|left, right| left.server.cmp(&right.server));

    let mut seen = HashSet::new();
    sources.retain(|source| seen.insert((source.server.clone(), source.instructions.clone())));
    sources
}
