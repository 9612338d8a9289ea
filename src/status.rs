use anyhow::Result;

use crate::config::Config;
use crate::store;

/// Print the configured project, credential presence, and newest snapshot.
pub fn run_status(config: &Config) -> Result<()> {
    let github = &config.github;

    let token_state = match std::env::var(&github.token_env) {
        Ok(v) if !v.trim().is_empty() => "set",
        _ => "NOT SET",
    };

    println!(
        "{:<12} {}/{}",
        "PROJECT", github.org, github.project_number
    );
    println!("{:<12} {}", "ENDPOINT", github.api_url);
    println!("{:<12} {} (${})", "TOKEN", token_state, github.token_env);
    println!("{:<12} {}", "OUTPUT", config.output.dir.display());

    match store::latest_snapshot(&config.output.dir, &config.output.prefix, github.project_number)? {
        Some(path) => {
            let records = match store::read_snapshot(&path) {
                Ok(snapshot) => snapshot.len().to_string(),
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "latest snapshot is unreadable");
                    "unreadable".to_string()
                }
            };
            println!("{:<12} {} ({} records)", "LATEST", path.display(), records);
        }
        None => println!("{:<12} none", "LATEST"),
    }

    Ok(())
}
