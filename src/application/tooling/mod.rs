mod discovery;
mod error;
mod interface;
mod process;
mod registry;

pub use discovery::{
    DiscoveryError, DiscoveryReport, SkippedTool, ToolFailure, discover, extract_tools,
};
pub use error::ToolInvokeError;
pub use interface::{RawToolCatalog, ToolListing, ToolServerClient};
pub use process::McpProcess;
pub use registry::{
    HELP_TOOL_DESCRIPTION, HELP_TOOL_NAME, HELP_TOOL_RESPONSE, MISSING_DESCRIPTION, RegistryError,
    RemoteTool, StaticTool, ToolDescriptor, ToolHandler, ToolRegistry, help_tool,
};
