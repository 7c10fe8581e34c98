use super::ui;
use crate::core::{QuoteSession, QuoteView};
use anyhow::{Result, bail};
use chrono::Local;
use comfy_table::Cell;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

const WATCH_HINT: &str = "[r] refresh  [q] quit";

impl QuoteView {
    pub fn display_as_table(&self) -> String {
        if self.is_initial_loading {
            return ui::style_text("Loading quotes...", ui::StyleType::Subtle);
        }

        if self.is_blocking_error {
            let message = self
                .error
                .as_ref()
                .map_or("Could not load quotes.", |e| e.message.as_str());
            return ui::style_text(message, ui::StyleType::Error);
        }

        let mut table = ui::new_styled_table();
        table.set_header(vec![
            ui::header_cell("Pair"),
            ui::header_cell("Name"),
            ui::header_cell("Price"),
            ui::header_cell("Change"),
            ui::header_cell("Change (%)"),
            ui::header_cell("Updated"),
        ]);

        for record in &self.records {
            table.add_row(vec![
                Cell::new(&record.pair),
                Cell::new(&record.name),
                ui::number_cell(format!("{:.4}", record.price)),
                ui::change_cell(
                    record.variation_absolute,
                    format!("{:+.4}", record.variation_absolute),
                ),
                ui::change_cell(
                    record.variation_percent,
                    format!("{:+.2}%", record.variation_percent),
                ),
                ui::format_optional_cell(record.last_update_at(), |at| {
                    at.format("%d/%m %H:%M:%S").to_string()
                }),
            ]);
        }

        let mut output = format!(
            "{}\n\n",
            ui::style_text("Currency Quotes", ui::StyleType::Title)
        );
        output.push_str(&table.to_string());

        let fetched_at = self.last_successful_fetch_at.map_or("never".to_string(), |at| {
            at.with_timezone(&Local).format("%H:%M:%S").to_string()
        });
        output.push_str(&format!(
            "\n\n{}",
            ui::style_text(&format!("Last updated: {fetched_at}"), ui::StyleType::Subtle)
        ));
        if self.is_refreshing {
            output.push_str(&format!(
                "  {}",
                ui::style_text("refreshing...", ui::StyleType::Subtle)
            ));
        }
        if let Some(error) = &self.error {
            output.push_str(&format!(
                "\n{}",
                ui::style_text(&format!("! {}", error.message), ui::StyleType::Warning)
            ));
        }

        output
    }
}

/// Loads the quotes once and prints them.
pub async fn show(session: QuoteSession) -> Result<()> {
    let spinner = ui::new_spinner("Fetching quotes...");
    let view = session.settled().await;
    spinner.finish_and_clear();
    session.shutdown().await;

    println!("{}", view.display_as_table());
    if view.is_blocking_error {
        bail!("No quotes could be loaded");
    }
    Ok(())
}

fn redraw(view: &QuoteView) -> Result<()> {
    console::Term::stdout().clear_screen()?;
    let hint = if view.is_blocking_error {
        "[r] retry  [q] quit"
    } else {
        WATCH_HINT
    };
    println!(
        "{}\n\n{}",
        view.display_as_table(),
        ui::style_text(hint, ui::StyleType::Subtle)
    );
    Ok(())
}

/// Keeps the quotes on screen, redrawing on every state change, until the user quits.
pub async fn watch(session: QuoteSession) -> Result<()> {
    let mut updates = session.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let initial = updates.borrow_and_update().clone();
    redraw(&initial)?;

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let view = updates.borrow_and_update().clone();
                redraw(&view)?;
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                match line.trim() {
                    "q" | "quit" => break,
                    "r" | "" => session.request_reload(),
                    other => debug!(command = %other, "Ignoring unknown command"),
                }
            }
        }
    }

    session.shutdown().await;
    Ok(())
}
