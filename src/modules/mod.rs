pub mod accounts;
pub mod books;

use bookshelf_kernel::ModuleRegistry;

use crate::AppState;

/// Register all project-specific modules with the registry
pub fn register_all(registry: &mut ModuleRegistry, state: &AppState) -> anyhow::Result<()> {
    registry.register(accounts::create_module(state.clone()))?;
    registry.register(books::create_module(state.clone()))?;
    Ok(())
}
