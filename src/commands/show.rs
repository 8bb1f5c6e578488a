use anyhow::{Context, Result};
use patdex::{
    config::Config,
    store::{open_store, PatentStore},
};

pub fn show_patent(config: &Config, app_doc_id: &str) -> Result<()> {
    let store = open_store(config).context("Failed to open index store")?;

    let Some(record) = store.get(app_doc_id)? else {
        anyhow::bail!("No record for application {}", app_doc_id);
    };

    println!("{}", serde_json::to_string_pretty(&record.source)?);
    eprintln!(
        "({}, seq_no={}, primary_term={})",
        store.name(),
        record.version.seq_no,
        record.version.primary_term
    );
    Ok(())
}
