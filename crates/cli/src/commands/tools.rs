//! `nexus tools`: list the registered tools.

use std::sync::Arc;

use nexus_cache::NoopCache;
use nexus_config::AppConfig;
use nexus_tools::ToolListing;

pub fn run(config: &AppConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let dispatcher = nexus_tools::default_dispatcher(&config.tools, Arc::new(NoopCache));
    print!("{}", render(&dispatcher.listings()));
    Ok(())
}

fn render(listings: &[ToolListing]) -> String {
    let width = listings
        .iter()
        .map(|l| l.definition.name.len())
        .max()
        .unwrap_or(0);

    let mut out = String::new();
    for listing in listings {
        out.push_str(&format!(
            "{:<width$}  {:>6}  {}\n",
            listing.definition.name,
            format_ttl(listing.ttl_secs),
            listing.definition.description,
        ));
    }
    out
}

fn format_ttl(secs: u64) -> String {
    match secs {
        0 => "-".into(),
        s if s % 3600 == 0 => format!("{}h", s / 3600),
        s if s % 60 == 0 => format!("{}m", s / 60),
        s => format!("{s}s"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ttl_formatting() {
        assert_eq!(format_ttl(0), "-");
        assert_eq!(format_ttl(60), "1m");
        assert_eq!(format_ttl(86_400), "24h");
        assert_eq!(format_ttl(90), "90s");
    }

    #[test]
    fn lists_every_builtin_tool() {
        let dispatcher = nexus_tools::default_dispatcher(
            &nexus_config::ToolsConfig::default(),
            Arc::new(NoopCache),
        );
        let text = render(&dispatcher.listings());
        assert_eq!(text.lines().count(), 5);
        assert!(text.contains("get_stock_price"));
        assert!(text.contains("get_balance_sheet"));
        assert!(text.contains("24h"));
    }
}
