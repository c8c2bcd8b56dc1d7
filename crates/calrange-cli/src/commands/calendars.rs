//! `calrange calendars`: list the deduplicated calendar sources.

use std::fmt::Write as _;
use std::sync::Arc;

use calrange_providers::{CalendarClient, CalendarSource, SourceAggregator};

use crate::error::CliResult;

pub async fn run(client: Arc<dyn CalendarClient>, json: bool) -> CliResult<()> {
    let aggregator = SourceAggregator::discover(client).await?;
    print!("{}", render(aggregator.sources(), json)?);
    Ok(())
}

/// Renders sources as aligned text, or as a JSON array.
pub fn render(sources: &[CalendarSource], json: bool) -> CliResult<String> {
    if json {
        let mut out = serde_json::to_string_pretty(sources)?;
        out.push('\n');
        return Ok(out);
    }

    if sources.is_empty() {
        return Ok("No calendars.\n".to_string());
    }

    let width = sources
        .iter()
        .map(|s| s.display_name.chars().count())
        .max()
        .unwrap_or(0);
    let mut out = String::new();
    for source in sources {
        let _ = writeln!(
            out,
            "{:<width$}  {}",
            source.display_name,
            source.feed_locator,
            width = width
        );
    }
    Ok(out)
}
