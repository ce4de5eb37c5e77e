use anyhow::Result;

use super::ui::{self, StyleType};
use crate::batch::BatchRunner;

pub async fn run_and_display(runner: &BatchRunner) -> Result<()> {
    let spinner = ui::new_spinner("Fetching market indicators...");
    let summary = runner.run_once(None).await?;
    spinner.finish_and_clear();

    if summary.skipped {
        println!(
            "{}",
            ui::style_text(
                "A batch run is already in flight; nothing to do.",
                StyleType::Subtle
            )
        );
        return Ok(());
    }

    let mut table = ui::new_styled_table();
    table.set_header(vec![ui::header_cell(""), ui::header_cell("Count")]);
    table.add_row(vec![
        comfy_table::Cell::new("Indicators fetched"),
        ui::value_cell(&summary.fetched.len().to_string()),
    ]);
    table.add_row(vec![
        comfy_table::Cell::new("Indicators failed"),
        ui::value_cell(&summary.failed.len().to_string()),
    ]);
    table.add_row(vec![
        comfy_table::Cell::new("Price records written"),
        ui::value_cell(&summary.records_written.to_string()),
    ]);
    table.add_row(vec![
        comfy_table::Cell::new("Expired rows purged"),
        ui::value_cell(&summary.purged.to_string()),
    ]);
    println!("{table}");

    if !summary.failed.is_empty() {
        println!(
            "{}",
            ui::style_text(
                &format!("Unavailable this cycle: {}", summary.failed.join(", ")),
                StyleType::Error
            )
        );
    }
    Ok(())
}
