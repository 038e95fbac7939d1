use crate::{
    cli::{actions::session, globals::GlobalArgs},
    dashboard::LoadStatus,
    export::file_name,
    model::Table,
};
use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::info;

pub struct Args {
    pub globals: GlobalArgs,
    pub table: Table,
    pub output: Option<PathBuf>,
}

/// Load the dashboard and write one table as CSV to stdout or a file.
///
/// # Errors
/// Returns an error if the data cannot be loaded or the file cannot be written.
pub async fn execute(args: Args) -> Result<()> {
    let dashboard = session::open(&args.globals, false).await?;
    let status = dashboard.status();
    let csv = dashboard.export(args.table);
    dashboard.sign_out().await;

    if let LoadStatus::Failed(message) = status {
        bail!(message);
    }
    let csv = csv.with_context(|| format!("Failed to export {}", args.table))?;

    match args.output {
        None => println!("{csv}"),
        Some(output) => {
            let target = resolve_target(&output, args.table, Local::now().date_naive());
            fs::write(&target, csv)
                .with_context(|| format!("Failed to write {}", target.display()))?;
            info!("Exported {} to {}", args.table, target.display());
            eprintln!("Wrote {}", target.display());
        }
    }
    Ok(())
}

/// A directory gets the default `<table>-<date>.csv` name inside it.
fn resolve_target(output: &Path, table: Table, date: NaiveDate) -> PathBuf {
    if output.is_dir() {
        output.join(file_name(table, date))
    } else {
        output.to_path_buf()
    }
}
