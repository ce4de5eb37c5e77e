use anyhow::Result;
use std::str::FromStr;

use super::ui::{self, StyleType};
use crate::PriceArgs;
use crate::model::{PriceQuote, Species};
use crate::resolver::PriceResolver;

pub async fn resolve_and_display(resolver: &PriceResolver, args: &PriceArgs) -> Result<()> {
    let species = Species::from_str(&args.species)?;

    let outcome = resolver
        .resolve_price(
            species,
            &args.category,
            args.breed.as_deref(),
            args.state.as_deref(),
            args.saleyard.as_deref(),
        )
        .await;

    match outcome {
        Ok(quote) => {
            display_quote(&quote);
            Ok(())
        }
        Err(e) if e.is_no_price() => {
            // An explicit outcome, not a failure.
            println!(
                "{}",
                ui::style_text(
                    &format!("No price available for '{}'.", args.category),
                    StyleType::Warning
                )
            );
            println!(
                "{}",
                ui::style_text(
                    "Run `saleyard generate` to fetch the latest market indicators.",
                    StyleType::Subtle
                )
            );
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

fn display_quote(quote: &PriceQuote) {
    println!(
        "\n{}",
        ui::style_text(&format!("Price for {}", quote.category), StyleType::Title)
    );

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Category"),
        ui::header_cell("Breed"),
        ui::header_cell("Price"),
        ui::header_cell("Location"),
        ui::header_cell("As of"),
        ui::header_cell("Source"),
    ]);
    table.add_row(vec![
        comfy_table::Cell::new(&quote.category),
        quote
            .breed
            .as_deref()
            .map(comfy_table::Cell::new)
            .unwrap_or_else(ui::na_cell),
        ui::value_cell(&format!("{:.2} {}", quote.price, quote.unit)),
        quote
            .saleyard
            .as_deref()
            .or(quote.state.as_deref())
            .map(comfy_table::Cell::new)
            .unwrap_or_else(|| comfy_table::Cell::new("National")),
        comfy_table::Cell::new(quote.as_of.to_string()),
        comfy_table::Cell::new(quote.source.to_string()),
    ]);
    println!("{table}");

    if quote.degraded {
        println!(
            "{}",
            ui::style_text(
                "Estimate only: no exact match for the requested breed/location; premiums not applied.",
                StyleType::Warning
            )
        );
    }
}
