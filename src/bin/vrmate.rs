use std::env;
use vrmate_rig::config::{CliOverrides, RigConfig};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let overrides = match CliOverrides::parse(env::args()) {
        Ok(parsed) => parsed,
        Err(err) => {
            eprintln!("[cli] {err}");
            std::process::exit(2);
        }
    };

    if let Err(err) = run(&overrides) {
        eprintln!("[vrmate] error: {err}");
        std::process::exit(1);
    }
}

fn run(overrides: &CliOverrides) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = match &overrides.config_path {
        Some(path) => RigConfig::load(path)?,
        None => RigConfig::default(),
    };
    config.apply_env(|key| env::var(key).ok())?;
    config.apply_overrides(overrides);

    let summary = vrmate_rig::run(config)?;
    println!(
        "[vrmate] {} frames, {} messages applied, {} malformed",
        summary.frames, summary.processed, summary.malformed
    );
    Ok(())
}
