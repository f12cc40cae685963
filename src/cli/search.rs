use super::ui;
use crate::crypto::CryptoPriceProvider;
use anyhow::{Context, Result};
use comfy_table::{Cell, CellAlignment};

pub async fn run(crypto: &CryptoPriceProvider, query: &str) -> Result<()> {
    let hits = crypto
        .search(query)
        .await
        .with_context(|| format!("Coin search for '{query}' failed"))?;

    if hits.is_empty() {
        println!(
            "{}",
            ui::style_text(&format!("No coins match '{query}'"), ui::StyleType::Subtle)
        );
        return Ok(());
    }

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Id"),
        ui::header_cell("Name"),
        ui::header_cell("Symbol"),
        ui::header_cell("Rank"),
    ]);
    for hit in hits {
        let rank = hit
            .market_cap_rank
            .map_or_else(|| ui::na_cell(false), |r| {
                Cell::new(r).set_alignment(CellAlignment::Right)
            });
        table.add_row(vec![
            Cell::new(hit.id),
            Cell::new(hit.name),
            Cell::new(hit.symbol),
            rank,
        ]);
    }
    println!("{table}");
    Ok(())
}
