//! Unified tool catalog with deterministic server/tool routing.
//!
//! Every tool is exposed to the model as `<server>_<tool>`. Server names may
//! not contain the separator, so splitting a qualified name at its first `_`
//! recovers the owning server and the server-local tool name exactly.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock, RwLock};

use regex::Regex;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::warn;

use super::schema::ToolDescriptor;
use crate::error::HostError;
use crate::util::sync::{read, write};

pub const QUALIFIER_SEPARATOR: char = '_';

static SERVER_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9-]+$").expect("server name validation regex must compile")
});

/// Character set and length model APIs accept for tool names.
static MODEL_TOOL_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_-]{1,64}$").expect("tool name validation regex must compile")
});

pub fn is_valid_server_name(name: &str) -> bool {
    SERVER_NAME_RE.is_match(name)
}

pub fn qualify(server: &str, tool: &str) -> String {
    format!("{server}{QUALIFIER_SEPARATOR}{tool}")
}

/// Split a qualified name into `(server, tool)` at the first separator.
pub fn split_qualified(qualified: &str) -> Option<(&str, &str)> {
    let (server, tool) = qualified.split_once(QUALIFIER_SEPARATOR)?;
    if server.is_empty() || tool.is_empty() {
        return None;
    }
    Some((server, tool))
}

/// How to treat two descriptors that qualify to the same name.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CollisionPolicy {
    /// Keep the earlier registration and log the later one.
    #[default]
    KeepFirst,
    /// Refuse to build the catalog.
    Reject,
}

/// One routable tool.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogEntry {
    pub qualified_name: String,
    pub server: String,
    pub tool_name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

/// Tool definition in the shape handed to the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelTool {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

/// Where a qualified name is dispatched to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolRoute {
    pub server: String,
    pub tool_name: String,
}

/// Immutable snapshot of every routable tool, in registration order.
#[derive(Debug, Default)]
pub struct ToolCatalog {
    entries: Vec<CatalogEntry>,
    index: HashMap<String, usize>,
    skipped: Vec<String>,
}

impl ToolCatalog {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn build(
        descriptors: impl IntoIterator<Item = ToolDescriptor>,
        policy: CollisionPolicy,
    ) -> Result<Self, HostError> {
        let mut catalog = Self::default();

        for descriptor in descriptors {
            if !is_valid_server_name(&descriptor.server) {
                warn!(server = %descriptor.server, tool = %descriptor.name, "skipping tool from invalid server name");
                catalog.skipped.push(qualify(&descriptor.server, &descriptor.name));
                continue;
            }

            let qualified_name = qualify(&descriptor.server, &descriptor.name);
            if !MODEL_TOOL_NAME_RE.is_match(&qualified_name) {
                warn!(tool = %qualified_name, "skipping tool whose name models cannot accept");
                catalog.skipped.push(qualified_name);
                continue;
            }

            if let Some(&existing) = catalog.index.get(&qualified_name) {
                let first = catalog.entries[existing].server.clone();
                match policy {
                    CollisionPolicy::Reject => {
                        return Err(HostError::CatalogCollision {
                            qualified_name,
                            first,
                            second: descriptor.server,
                        });
                    }
                    CollisionPolicy::KeepFirst => {
                        warn!(tool = %qualified_name, %first, second = %descriptor.server, "duplicate qualified tool name; keeping first");
                        catalog.skipped.push(qualified_name);
                        continue;
                    }
                }
            }

            catalog
                .index
                .insert(qualified_name.clone(), catalog.entries.len());
            catalog.entries.push(CatalogEntry {
                qualified_name,
                server: descriptor.server,
                tool_name: descriptor.name,
                description: descriptor.description,
                input_schema: descriptor.input_schema,
            });
        }

        Ok(catalog)
    }

    pub fn list_for_model(&self) -> Vec<ModelTool> {
        self.entries
            .iter()
            .map(|entry| ModelTool {
                name: entry.qualified_name.clone(),
                description: entry.description.clone(),
                input_schema: entry.input_schema.clone(),
            })
            .collect()
    }

    /// Resolve a qualified name; unknown names return `None`.
    pub fn resolve(&self, qualified_name: &str) -> Option<ToolRoute> {
        self.get(qualified_name).map(|entry| ToolRoute {
            server: entry.server.clone(),
            tool_name: entry.tool_name.clone(),
        })
    }

    pub fn get(&self, qualified_name: &str) -> Option<&CatalogEntry> {
        self.index
            .get(qualified_name)
            .map(|&position| &self.entries[position])
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    /// Qualified names dropped while building.
    pub fn skipped(&self) -> &[String] {
        &self.skipped
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Shared slot holding the current catalog; readers never see a half-built one.
#[derive(Debug, Default)]
pub struct CatalogHandle {
    current: RwLock<Arc<ToolCatalog>>,
}

impl CatalogHandle {
    pub fn load(&self) -> Arc<ToolCatalog> {
        Arc::clone(&read(&self.current))
    }

    /// Install `catalog`, returning the one it replaced.
    pub fn swap(&self, catalog: ToolCatalog) -> Arc<ToolCatalog> {
        std::mem::replace(&mut *write(&self.current), Arc::new(catalog))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn descriptor(server: &str, name: &str) -> ToolDescriptor {
        ToolDescriptor {
            server: server.into(),
            name: name.into(),
            description: format!("{name} on {server}"),
            input_schema: json!({"type": "object"}),
        }
    }

    #[test]
    fn qualified_names_split_back_exactly() {
        let cases = [
            ("alpha", "lookup"),
            ("todoplan-server", "get-todo"),
            ("beta", "read_file"),
            ("a", "b_c_d"),
        ];
        for (server, tool) in cases {
            let qualified = qualify(server, tool);
            assert_eq!(split_qualified(&qualified), Some((server, tool)));
        }
        assert_eq!(split_qualified("noseparator"), None);
        assert_eq!(split_qualified("_tool"), None);
    }

    #[test]
    fn server_names_reject_separator() {
        assert!(is_valid_server_name("project-server"));
        assert!(!is_valid_server_name("project_server"));
        assert!(!is_valid_server_name(""));
        assert!(!is_valid_server_name("has space"));
    }

    #[test]
    fn same_tool_on_two_servers_routes_separately() {
        let catalog = ToolCatalog::build(
            vec![descriptor("alpha", "lookup"), descriptor("beta", "lookup")],
            CollisionPolicy::Reject,
        )
        .unwrap();

        assert_eq!(
            catalog.resolve("alpha_lookup"),
            Some(ToolRoute {
                server: "alpha".into(),
                tool_name: "lookup".into()
            })
        );
        assert_eq!(catalog.resolve("beta_lookup").unwrap().server, "beta");
        assert_eq!(catalog.resolve("gamma_lookup"), None);
        assert_eq!(catalog.resolve("lookup"), None);
    }

    #[test]
    fn list_for_model_keeps_registration_order() {
        let catalog = ToolCatalog::build(
            vec![
                descriptor("todoplan-server", "get-todo"),
                descriptor("todoplan-server", "get-plan"),
                descriptor("project-server", "get-project-details"),
            ],
            CollisionPolicy::KeepFirst,
        )
        .unwrap();

        let names: Vec<String> = catalog.list_for_model().into_iter().map(|t| t.name).collect();
        assert_eq!(
            names,
            vec![
                "todoplan-server_get-todo",
                "todoplan-server_get-plan",
                "project-server_get-project-details"
            ]
        );
    }

    #[test]
    fn collisions_follow_policy() {
        let twice = || vec![descriptor("alpha", "lookup"), descriptor("alpha", "lookup")];

        let kept = ToolCatalog::build(twice(), CollisionPolicy::KeepFirst).unwrap();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept.skipped(), &["alpha_lookup".to_string()]);

        let err = ToolCatalog::build(twice(), CollisionPolicy::Reject).unwrap_err();
        assert!(matches!(err, HostError::CatalogCollision { qualified_name, .. } if qualified_name == "alpha_lookup"));
    }

    #[test]
    fn invalid_names_are_skipped() {
        let catalog = ToolCatalog::build(
            vec![
                descriptor("a_b", "c"),
                descriptor("alpha", "has space"),
                descriptor("alpha", "ok"),
            ],
            CollisionPolicy::Reject,
        )
        .unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.skipped().len(), 2);
    }

    #[test]
    fn handle_swaps_whole_catalog() {
        let handle = CatalogHandle::default();
        let before = handle.load();
        assert!(before.is_empty());

        handle.swap(
            ToolCatalog::build(vec![descriptor("alpha", "lookup")], CollisionPolicy::KeepFirst)
                .unwrap(),
        );
        assert!(before.is_empty());
        assert_eq!(handle.load().len(), 1);
    }

    #[test]
    fn collision_policy_parses_from_config_strings() {
        assert_eq!("reject".parse::<CollisionPolicy>().unwrap(), CollisionPolicy::Reject);
        assert_eq!(CollisionPolicy::KeepFirst.to_string(), "keep_first");
    }
}
