use anyhow::{Context, Result};
use inquire::{Confirm, Select, Text};

use tritrack_core::schema::{self, OWNER_OPTIONS};

/// Asks for a yes/no confirmation, defaulting to no
pub fn confirm(message: &str) -> Result<bool> {
    Ok(Confirm::new(message).with_default(false).prompt()?)
}

/// Picks a status from the options of `phase_key`, starting at the current value
pub fn prompt_status(phase_key: &str, current: Option<&str>) -> Result<String> {
    let phase = schema::phase(phase_key)
        .with_context(|| format!("Unknown phase: {}", phase_key))?;
    let options: Vec<&str> = phase.options.to_vec();
    let start = current
        .and_then(|c| options.iter().position(|o| *o == c))
        .unwrap_or(0);

    let value = Select::new(&format!("{} status:", phase.label), options)
        .with_starting_cursor(start)
        .prompt()?;
    Ok(value.to_string())
}

/// Picks an owner from the known list, or types a different one
pub fn prompt_owner(current: Option<&str>) -> Result<String> {
    const OTHER: &str = "Other...";
    const CLEAR: &str = "(none)";

    let mut options = vec![CLEAR];
    options.extend(OWNER_OPTIONS.iter().copied().filter(|o| !o.is_empty()));
    options.push(OTHER);

    let start = current
        .and_then(|c| options.iter().position(|o| *o == c))
        .unwrap_or(0);

    match Select::new("Owner:", options)
        .with_starting_cursor(start)
        .prompt()?
    {
        CLEAR => Ok(String::new()),
        OTHER => Ok(Text::new("Owner name:").prompt()?.trim().to_string()),
        owner => Ok(owner.to_string()),
    }
}
