//! `leadflow handlers`: list registered handler names.

use anyhow::Result;
use console::style;

use crate::state::AppState;

pub fn list_handlers(state: &AppState, json: bool) -> Result<()> {
    let names = state.registry.names();

    if json {
        println!("{}", serde_json::to_string_pretty(&names)?);
        return Ok(());
    }

    println!();
    for name in &names {
        println!("  {} {}", style("*").green(), style(name).cyan());
    }
    println!();
    println!("  {} handlers registered", names.len());
    println!();
    Ok(())
}
