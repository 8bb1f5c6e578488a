use anyhow::{Context, Result};
use patdex::config::{Config, DEFAULT_CONFIG_FILE};
use std::path::PathBuf;

pub fn init_config(path: PathBuf) -> Result<()> {
    let config = Config::default();
    let config_path = path.join(DEFAULT_CONFIG_FILE);

    if config_path.exists() {
        anyhow::bail!("Configuration already exists: {}", config_path.display());
    }

    let toml_content = format!(
        r#"# patdex configuration

[store]
# sled | elasticsearch | memory
backend = "sled"
data_dir = ".patdex"

[elasticsearch]
host = "{}"
index = "{}"
# username / password fall back to ELASTIC_USERNAME / ELASTIC_PASSWORD
verify_certs = {}
timeout_secs = {}

[ingest]
# grant_data_path = "ipg240102.xml"
# application_data_path = "ipa240104.xml"
checkpoint_interval = {}
max_conflict_retries = {}
max_write_retries = {}
retry_backoff_ms = {}

[logging]
# text | json
format = "text"
level = "info"
"#,
        config.elasticsearch.host,
        config.elasticsearch.index,
        config.elasticsearch.verify_certs,
        config.elasticsearch.timeout_secs,
        config.ingest.checkpoint_interval,
        config.ingest.max_conflict_retries,
        config.ingest.max_write_retries,
        config.ingest.retry_backoff_ms,
    );

    std::fs::create_dir_all(&path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    std::fs::write(&config_path, toml_content)?;
    println!("Created configuration file: {}", config_path.display());

    Ok(())
}
