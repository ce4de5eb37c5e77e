use anyhow::{Result, anyhow};
use std::str::FromStr;

use super::ui::{self, StyleType};
use crate::MatchArgs;
use crate::config::AppConfig;
use crate::mapper::RuleBook;
use crate::model::{BreedingStatus, LivestockDescriptor, Sex, Species};

pub fn match_and_display(config: &AppConfig, args: &MatchArgs) -> Result<()> {
    let descriptor = LivestockDescriptor {
        species: Species::from_str(&args.species)?,
        sex: Sex::from_str(&args.sex)?,
        castrated: args.castrated,
        age_months: args.age_months,
        weight_kg: args.weight_kg,
        breeding_status: args
            .breeding_status
            .as_deref()
            .map(BreedingStatus::from_str)
            .transpose()?
            .unwrap_or(BreedingStatus::NotBreeding),
        breed: args.breed.clone(),
    };

    let book = RuleBook::new(&config.rules).map_err(|e| anyhow!(e))?;
    match book.match_descriptor(&descriptor) {
        Some(rule) => {
            let mut table = ui::new_styled_table();
            table.set_header(vec![
                ui::header_cell("Rule"),
                ui::header_cell("Category"),
                ui::header_cell("Indicator"),
                ui::header_cell("Priority"),
            ]);
            table.add_row(vec![
                comfy_table::Cell::new(&rule.name),
                comfy_table::Cell::new(&rule.category),
                comfy_table::Cell::new(&rule.indicator),
                ui::value_cell(&rule.priority.to_string()),
            ]);
            println!("{table}");
        }
        None => {
            println!(
                "{}",
                ui::style_text(
                    "No mapping rule matched this animal description.",
                    StyleType::Warning
                )
            );
        }
    }
    Ok(())
}
