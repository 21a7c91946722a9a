//! Built-in local tools.
//!
//! Each tool is one file implementing [`kaio_core::Tool`]. The registry
//! assembled by [`default_registry`] is the fixed local table offered to
//! the model alongside any MCP-discovered tools.

pub mod create_file;
pub mod edit_file;
pub mod list_files;
pub mod os_info;
pub mod policy;
pub mod read_file;
pub mod run_command;
pub mod search_code;
pub mod web_search;

pub use create_file::CreateFileTool;
pub use edit_file::EditFileTool;
pub use list_files::ListFilesTool;
pub use os_info::OsInfoTool;
pub use policy::{AllowAll, CommandDenylist, ToolPolicy};
pub use read_file::ReadFileTool;
pub use run_command::RunCommandTool;
pub use search_code::SearchCodeTool;
pub use web_search::WebSearchTool;

use kaio_core::tool::ToolRegistry;

/// The full local tool table.
pub fn default_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(ListFilesTool));
    registry.register(Box::new(ReadFileTool));
    registry.register(Box::new(CreateFileTool));
    registry.register(Box::new(EditFileTool));
    registry.register(Box::new(RunCommandTool));
    registry.register(Box::new(SearchCodeTool));
    registry.register(Box::new(OsInfoTool));
    registry.register(Box::new(WebSearchTool::new()));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_has_all_tools() {
        let registry = default_registry();
        for name in [
            "list_files",
            "read_file",
            "create_file",
            "edit_file",
            "run_command",
            "search_code",
            "get_os_info",
            "search_web",
        ] {
            assert!(registry.contains(name), "missing tool {name}");
        }
        assert_eq!(registry.len(), 8);
    }
}
