//! Configuration management commands.

use console::style;

use crate::cli::icons::{dim_arrow, warn};
use crate::config::{Config, Settings};
use crate::rate_limit::ServiceClass;

/// Show effective settings.
pub fn cmd_config_show(settings: &Settings, config: &Config) -> anyhow::Result<()> {
    match config.source_path {
        Some(ref path) => println!("{} {}", style("Config:").bold(), path.display()),
        None => println!("{} (defaults)", style("Config:").bold()),
    }

    println!("{}", style("Endpoints").bold());
    let endpoints = &settings.endpoints;
    for (name, url) in [
        ("annotation", &endpoints.annotation),
        ("id_converter", &endpoints.id_converter),
        ("eutils", &endpoints.eutils),
        ("biorxiv", &endpoints.biorxiv),
        ("medrxiv", &endpoints.medrxiv),
    ] {
        println!("  {} {:<13} {}", dim_arrow(), name, url);
    }

    println!("{}", style("Requests").bold());
    println!("  {} user agent    {}", dim_arrow(), settings.user_agent());
    println!("  {} tool          {}", dim_arrow(), settings.identity.tool);
    match settings.identity.email {
        Some(ref email) => println!("  {} email         {}", dim_arrow(), email),
        None => println!("  {} email         not set (NCBI asks for one)", warn()),
    }
    println!("  {} timeout       {}s", dim_arrow(), settings.request_timeout);
    println!("  {} workers       {}", dim_arrow(), settings.workers);
    println!("  {} key timeout   {}s", dim_arrow(), settings.key_timeout);

    println!("{}", style("Rate limits").bold());
    for class in ServiceClass::ALL {
        let budget = settings.rate_limits.budget(class);
        println!(
            "  {} {:<17} {} / {:?}",
            dim_arrow(),
            class.as_str(),
            budget.calls,
            budget.period
        );
    }

    println!("{}", style("Conversion").bold());
    println!("  {} output dir    {}", dim_arrow(), settings.output_dir.display());
    println!("  {} stylesheet    {}", dim_arrow(), settings.stylesheet.display());

    let file = toml::to_string_pretty(config)?;
    if !file.trim().is_empty() {
        println!("{}", style("File contents").bold());
        println!("{}", file);
    }
    Ok(())
}

/// Print the path of the config file in use.
pub fn cmd_config_path(config: &Config) {
    match config.source_path {
        Some(ref path) => println!("{}", path.display()),
        None => eprintln!(
            "{} No config file found (looked for {}.toml/.yaml/.json)",
            warn(),
            crate::config::CONFIG_NAME
        ),
    }
}
