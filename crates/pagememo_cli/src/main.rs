//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `pagememo_core` linkage.
//! - Print the export of one address's tree from a data directory.
//!
//! Usage: `pagememo_cli [<data_dir> <url> [json|markdown|notebooklm]]`

use pagememo_core::db::open_tier_databases;
use pagememo_core::{
    export_tree, CoreConfig, ExportFormat, MemoStore, SqliteKvTier, TierKind,
};
use std::process::ExitCode;

fn main() -> ExitCode {
    println!("pagememo_core ping={}", pagememo_core::ping());
    println!("pagememo_core version={}", pagememo_core::core_version());

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (data_dir, url) = match args.as_slice() {
        [] => return ExitCode::SUCCESS,
        [data_dir, url, ..] => (data_dir, url),
        [_] => {
            eprintln!("usage: pagememo_cli [<data_dir> <url> [json|markdown|notebooklm]]");
            return ExitCode::FAILURE;
        }
    };
    let format = args.get(2).map_or("markdown", String::as_str);

    match export_for_url(data_dir, url, format) {
        Ok(text) => {
            println!("{text}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("pagememo_cli error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn export_for_url(data_dir: &str, url: &str, format: &str) -> Result<String, String> {
    let format: ExportFormat = format.parse().map_err(|err| format!("{err}"))?;
    let config = CoreConfig::new(data_dir);
    let databases = open_tier_databases(&config).map_err(|err| err.to_string())?;
    let store = MemoStore::new(
        SqliteKvTier::try_new(&databases.bulk, TierKind::Bulk).map_err(|err| err.to_string())?,
        SqliteKvTier::try_new(&databases.synced, TierKind::Synced)
            .map_err(|err| err.to_string())?,
    );

    let tree = store
        .find_tree_by_url(url)
        .map_err(|err| err.to_string())?
        .ok_or_else(|| format!("no memo tree for `{url}`"))?;
    export_tree(&tree, format).map_err(|err| err.to_string())
}
