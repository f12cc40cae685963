use super::ui;
use crate::refresh::ValuationLoop;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Re-renders the portfolio after every pass until Ctrl-C.
pub async fn run(valuation_loop: Arc<ValuationLoop>, period: Duration) -> Result<()> {
    let rates_task = valuation_loop.aggregator().rates().initialize();
    let mut updates = valuation_loop.subscribe();
    let pass_task = valuation_loop.start(period);

    println!(
        "{}",
        ui::style_text(
            &format!("Refreshing every {}s, press Ctrl-C to stop.", period.as_secs()),
            ui::StyleType::Subtle
        )
    );

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let latest = updates.borrow_and_update().clone();
                if let Some(valuation) = latest {
                    ui::print_separator();
                    println!("{}", valuation.display_as_table());
                    println!(
                        "{}",
                        ui::style_text(
                            &format!("Updated {}", valuation.generated_at.format("%H:%M:%S UTC")),
                            ui::StyleType::Subtle
                        )
                    );
                }
            }
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for Ctrl-C")?;
                break;
            }
        }
    }

    info!("Stopping background refresh");
    pass_task.shutdown().await;
    rates_task.shutdown().await;
    Ok(())
}
