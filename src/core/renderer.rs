//! Turns the registry into a text table and writes it to the terminal sink.

use crate::core::calculator;
use crate::core::config::LoggerConfig;
use crate::core::formatter;
use crate::core::models::ProgressState;
use crate::core::registry::ProgressRegistry;
use crate::terminal::Terminal;
use chrono::{DateTime, Utc};
use std::io;
use std::sync::{Mutex, PoisonError};

const CLEAR_SCREEN: &str = "\x1b[2J";
const CURSOR_HOME: &str = "\x1b[H";

pub const BAR_WIDTH: usize = 20;
const NAME_WIDTH: usize = 20;
const CURRENT_TOTAL_WIDTH: usize = 16;
const PERCENT_WIDTH: usize = 5;
const BAR_COLUMN_WIDTH: usize = BAR_WIDTH + 2;
const RATE_WIDTH: usize = 10;
const ETA_WIDTH: usize = 10;
const ELAPSED_WIDTH: usize = 10;
const SEPARATOR_WIDTH: usize = 100;
const HEADER: &str =
    "Task                 Current/Total    %    Progress              Rate      ETA       Elapsed";
const COUNTER_PREFIX: &str = "  └─ ";

pub struct Renderer {
    terminal: Mutex<Box<dyn Terminal + Send>>,
}

impl Renderer {
    pub fn new(terminal: Box<dyn Terminal + Send>) -> Self {
        Self {
            terminal: Mutex::new(terminal),
        }
    }

    /// Draws one frame. Writes nothing in quiet mode or when there is nothing
    /// to show; sink failures are logged and dropped.
    pub fn render(&self, registry: &ProgressRegistry, config: &LoggerConfig) {
        if config.quiet {
            return;
        }

        let states: Vec<ProgressState> = registry.get_all().iter().map(|p| p.state()).collect();
        if states.is_empty() {
            return;
        }

        let table = build_table(sort_for_display(states), registry.context().now());
        let mut terminal = self.terminal.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = write_frame(terminal.as_mut(), &table) {
            log::debug!("Failed to write progress table: {e}");
        }
    }
}

fn write_frame(terminal: &mut dyn Terminal, table: &str) -> io::Result<()> {
    if terminal.is_interactive() {
        terminal.write(&format!("{CLEAR_SCREEN}{CURSOR_HOME}"))?;
        terminal.write(table)?;
    } else {
        terminal.write(&format!("\n{table}\n"))?;
    }
    terminal.flush()
}

/// Most recently updated first; ties keep their registration order.
pub fn sort_for_display(mut states: Vec<ProgressState>) -> Vec<ProgressState> {
    states.sort_by(|a, b| b.last_updated_at.cmp(&a.last_updated_at));
    states
}

/// Builds the full table for `states` in the given order.
pub fn build_table(states: Vec<ProgressState>, now: DateTime<Utc>) -> String {
    let mut lines = Vec::with_capacity(states.len() * 2 + 2);
    lines.push(HEADER.to_string());
    lines.push("─".repeat(SEPARATOR_WIDTH));

    for state in &states {
        let metrics = calculator::metrics(state, now);

        let current_total = match state.total {
            Some(total) => format!(
                "{}/{}",
                formatter::number(state.current),
                formatter::number(total)
            ),
            None => formatter::number(state.current),
        };

        lines.push(format_row(
            &formatter::truncate(&state.name, NAME_WIDTH),
            &current_total,
            &format!("{}%", metrics.percentage),
            &formatter::progress_bar(metrics.percentage, BAR_WIDTH),
            &formatter::rate(metrics.rate),
            &formatter::eta(metrics.eta),
            &formatter::elapsed(metrics.elapsed),
        ));

        if !state.counters.is_empty() {
            lines.push(format!(
                "{COUNTER_PREFIX}{}",
                formatter::counters(&state.counters)
            ));
        }
    }

    lines.join("\n")
}

fn format_row(
    name: &str,
    current_total: &str,
    percent: &str,
    bar: &str,
    rate: &str,
    eta: &str,
    elapsed: &str,
) -> String {
    format!(
        "{name:<NAME_WIDTH$} {current_total:<CURRENT_TOTAL_WIDTH$} {percent:<PERCENT_WIDTH$} \
         {bar:<BAR_COLUMN_WIDTH$} {rate:<RATE_WIDTH$} {eta:<ETA_WIDTH$} {elapsed:<ELAPSED_WIDTH$}"
    )
}
