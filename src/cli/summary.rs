use super::ui;
use crate::core::holding::AssetClass;
use crate::fx::RateState;
use crate::store::{HoldingsSource, SettingsSource};
use crate::valuation::{Performer, PortfolioTotals, Valuation, ValuationAggregator};
use anyhow::Result;
use comfy_table::Cell;

const CLASS_ORDER: [AssetClass; 6] = [
    AssetClass::Equity,
    AssetClass::MutualFund,
    AssetClass::Crypto,
    AssetClass::Forex,
    AssetClass::Commodity,
    AssetClass::FixedAsset,
];

impl Valuation {
    pub fn display_as_table(&self) -> String {
        let currency = &self.display_currency;

        let mut table = ui::new_styled_table();
        table.set_header(vec![
            ui::header_cell("Holding"),
            ui::header_cell("Type"),
            ui::header_cell("Units"),
            ui::header_cell("Price"),
            ui::header_cell("Day"),
            ui::header_cell(&format!("Value ({currency})")),
            ui::header_cell(&format!("P/L ({currency})")),
            ui::header_cell("P/L (%)"),
            ui::header_cell("Weight (%)"),
            ui::header_cell("Source"),
        ]);

        for vh in &self.holdings {
            let unavailable = vh.quote.is_unavailable();
            let price = if unavailable {
                ui::na_cell(true)
            } else {
                Cell::new(format!("{} {}", ui::amount(vh.quote.price), vh.holding.currency))
            };
            let day = if unavailable {
                ui::na_cell(false)
            } else {
                ui::change_cell(vh.quote.change_percent)
            };
            table.add_row(vec![
                Cell::new(vh.holding.display_name()),
                Cell::new(vh.holding.asset_class.to_string()),
                Cell::new(vh.holding.quantity.normalize().to_string()),
                price,
                day,
                ui::amount_cell(vh.display.current_value),
                ui::signed_cell(vh.display.profit_loss, ""),
                ui::change_cell(vh.display.profit_loss_percent),
                ui::amount_cell(vh.weight),
                ui::provenance_cell(vh.quote.provenance),
            ]);
        }

        let mut output = format!(
            "Portfolio ({})\n\n",
            ui::style_text(currency, ui::StyleType::Title)
        );
        output.push_str(&table.to_string());

        let by_class = self.class_breakdown();
        if !by_class.is_empty() {
            output.push_str("\n\n");
            output.push_str(&by_class);
        }

        output.push_str(&format!("\n\n{}", totals_lines(&self.totals, currency)));
        if self.rates != RateState::Live {
            output.push_str(&format!(
                "\n{}",
                ui::style_text(
                    "Exchange rates are not live; converted values are approximate.",
                    ui::StyleType::Warning
                )
            ));
        }
        output
    }

    fn class_breakdown(&self) -> String {
        let mut table = ui::new_styled_table();
        table.set_header(vec![
            ui::header_cell("Asset class"),
            ui::header_cell("Value"),
            ui::header_cell("Invested"),
            ui::header_cell("P/L (%)"),
        ]);
        let mut rows = 0;
        for class in CLASS_ORDER {
            if !self.holdings.iter().any(|vh| vh.holding.asset_class == class) {
                continue;
            }
            let totals = self.totals_for(class);
            table.add_row(vec![
                Cell::new(class.to_string()),
                ui::amount_cell(totals.current_value),
                ui::amount_cell(totals.total_invested),
                ui::change_cell(totals.profit_loss_percent),
            ]);
            rows += 1;
        }
        if rows > 1 { table.to_string() } else { String::new() }
    }
}

fn performer_line(label: &str, performer: &Option<Performer>) -> Option<String> {
    performer
        .as_ref()
        .map(|p| format!("{label}: {} ({}%)", p.name, ui::amount(p.percent)))
}

fn totals_lines(totals: &PortfolioTotals, currency: &str) -> String {
    let mut lines = vec![
        format!(
            "Total Value ({}): {}",
            ui::style_text(currency, ui::StyleType::TotalLabel),
            ui::style_text(&ui::amount(totals.current_value), ui::StyleType::TotalValue)
        ),
        format!(
            "Invested: {}   P/L: {} ({}%)",
            ui::amount(totals.total_invested),
            ui::amount(totals.profit_loss),
            ui::amount(totals.profit_loss_percent)
        ),
        format!(
            "Today: {} ({}%)",
            ui::amount(totals.daily_gain),
            ui::amount(totals.daily_gain_percent)
        ),
    ];
    lines.extend(
        [
            performer_line("Best performer", &totals.best_performer),
            performer_line("Worst performer", &totals.worst_performer),
            performer_line("Top gainer today", &totals.best_daily_mover),
            performer_line("Top loser today", &totals.worst_daily_mover),
        ]
        .into_iter()
        .flatten(),
    );
    lines.join("\n")
}

pub async fn run<S>(aggregator: &ValuationAggregator, source: &S, force: bool) -> Result<()>
where
    S: HoldingsSource + SettingsSource,
{
    let raw = source.get_holdings().await;
    if raw.is_empty() {
        println!(
            "{}",
            ui::style_text("No holdings configured.", ui::StyleType::Subtle)
        );
        return Ok(());
    }
    let settings = source.get_user_settings().await;

    let pb = ui::new_spinner("Fetching prices...");
    let (valuation, warnings) = if force {
        let report = aggregator
            .force_refresh(raw, &settings.display_currency)
            .await;
        (report.valuation, report.warnings)
    } else {
        let valuation = aggregator.aggregate(raw, &settings.display_currency).await;
        (valuation, Vec::new())
    };
    pb.finish_and_clear();

    println!("{}", valuation.display_as_table());
    if !warnings.is_empty() {
        ui::print_separator();
        for warning in &warnings {
            println!("{}", ui::style_text(warning, ui::StyleType::Error));
        }
    }
    Ok(())
}
