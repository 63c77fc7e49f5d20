//! Model Context Protocol client side: sessions, registry, catalog, and dispatch.

pub mod catalog;
pub mod client;
pub mod dispatch;
pub mod instructions;
pub mod protocol;
pub mod registry;
pub mod schema;
pub mod session;
pub mod transport;

pub use catalog::{
    qualify, split_qualified, CatalogEntry, CollisionPolicy, ModelTool, ToolCatalog, ToolRoute,
};
pub use client::{McpClient, ToolCallResult};
pub use dispatch::ToolDispatcher;
pub use instructions::{render_system_instructions, InstructionSource};
pub use registry::{ConnectResult, ConnectionState, RegistryOptions, ServerRegistry, ServerStatus};
pub use schema::{SchemaBuilder, ToolDescriptor, ToolSchema};
pub use session::{SessionConnector, ToolSession};
pub use transport::{LocalConnector, SseConnector, SseOptions};
