//! `agentloop tools`: list the tools an agent would be given.

use crate::commands::ToolSet;

pub fn run(toolset: ToolSet) -> Result<(), Box<dyn std::error::Error>> {
    let registry = toolset.registry();
    if registry.is_empty() {
        println!("No tools in the '{toolset:?}' set.");
        return Ok(());
    }

    for def in registry.definitions() {
        println!("{}", def.name);
        println!("  {}", def.description);
        let schema = serde_json::to_string_pretty(&def.parameters)?;
        for line in schema.lines() {
            println!("  {line}");
        }
        println!();
    }
    Ok(())
}
