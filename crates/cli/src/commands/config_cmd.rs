//! `stepwise config`: print configuration.

use stepwise_config::AppConfig;

pub async fn show(default: bool) -> Result<(), Box<dyn std::error::Error>> {
    if default {
        println!("{}", AppConfig::default_toml());
        return Ok(());
    }

    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    println!("{config:#?}");

    match config.resolve_backend() {
        Ok(resolved) => println!("\nBackend: {resolved:#?}"),
        Err(e) => println!("\nBackend: not resolvable ({e})"),
    }
    Ok(())
}

pub async fn path() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = AppConfig::config_dir().join("config.toml");
    println!("{}", config_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    #[test]
    fn config_path_is_under_stepwise_dir() {
        let path = stepwise_config::AppConfig::config_dir().join("config.toml");
        assert!(path.to_str().unwrap().contains(".stepwise"));
    }
}
