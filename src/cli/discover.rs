use std::error::Error;
use std::io::Write;

use crate::core::connector::{Connector, DiscoveredModel};

pub async fn run(connector: &Connector, json: bool) -> Result<(), Box<dyn Error>> {
    let discovered = connector.discover_models().await;
    let mut stdout = std::io::stdout().lock();
    write_listing(&mut stdout, &discovered, json)?;
    Ok(())
}

fn write_listing<W: Write>(
    out: &mut W,
    discovered: &[DiscoveredModel],
    json: bool,
) -> Result<(), Box<dyn Error>> {
    if json {
        serde_json::to_writer_pretty(&mut *out, discovered)?;
        writeln!(out)?;
        return Ok(());
    }

    if discovered.is_empty() {
        writeln!(out, "No MCP servers configured.")?;
        return Ok(());
    }

    let width = discovered.iter().map(|model| model.id.len()).max().unwrap_or(0);
    for model in discovered {
        match &model.error {
            Some(error) => writeln!(out, "{:<width$}  {error}", model.id)?,
            None if model.name != model.id.rsplit('/').next().unwrap_or_default() => {
                writeln!(out, "{:<width$}  {}", model.id, model.name)?
            }
            None => writeln!(out, "{}", model.id)?,
        }
    }
    Ok(())
}
