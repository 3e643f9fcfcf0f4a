//! Console reports for plugins, tasks and statistics

use std::collections::HashMap;
use colored::{ColoredString, Colorize};
use prettytable::{format, Cell, Row, Table};

use crate::engine::{EngineHealth, EngineStatisticsSnapshot};
use crate::plugin::{PluginInfo, PluginState};
use crate::scheduler::{SchedulerStatistics, TaskSnapshot};

/// Colouring for report text; plain when disabled
#[derive(Debug, Clone, Copy)]
pub struct Palette {
    enabled: bool,
}

impl Palette {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    /// Colours unless `--no-color` or `NO_COLOR` says otherwise
    pub fn from_flag(no_color: bool) -> Self {
        Self::new(!no_color && std::env::var_os("NO_COLOR").is_none())
    }

    fn paint(&self, text: &str, style: fn(&str) -> ColoredString) -> String {
        if self.enabled {
            style(text).to_string()
        } else {
            text.to_string()
        }
    }

    pub fn heading(&self, text: &str) -> String {
        self.paint(text, |t| t.bold().cyan())
    }

    pub fn good(&self, text: &str) -> String {
        self.paint(text, |t| t.green())
    }

    pub fn bad(&self, text: &str) -> String {
        self.paint(text, |t| t.red())
    }

    pub fn status(&self, ok: bool, text: &str) -> String {
        if ok {
            self.good(text)
        } else {
            self.bad(text)
        }
    }
}

/// Borderless table with a 2-space indent
pub fn format_compact_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    if rows.is_empty() {
        return String::new();
    }

    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_CLEAN);
    table.set_titles(Row::new(headers.iter().map(|header| Cell::new(header)).collect()));
    for row in rows {
        table.add_row(Row::new(row.iter().map(|cell| Cell::new(cell)).collect()));
    }

    let mut result = String::new();
    for line in table.to_string().lines() {
        result.push_str("  ");
        result.push_str(line);
        result.push('\n');
    }
    result
}

pub fn plugin_report(infos: &[PluginInfo], states: &HashMap<String, PluginState>, palette: Palette) -> String {
    let mut output = format!("{}\n", palette.heading("Collector Plugins"));
    if infos.is_empty() {
        output.push_str("  No plugins registered.\n");
        return output;
    }

    let rows: Vec<Vec<String>> = infos
        .iter()
        .map(|info| {
            let state = states.get(&info.plugin_type).copied().unwrap_or(PluginState::Created);
            vec![
                info.plugin_type.clone(),
                info.name.clone(),
                info.version.clone(),
                info.priority.to_string(),
                info.status.to_string(),
                state.to_string(),
            ]
        })
        .collect();
    output.push_str(&format_compact_table(&["TYPE", "NAME", "VERSION", "PRIORITY", "STATUS", "STATE"], &rows));
    output
}

pub fn task_report(tasks: &[TaskSnapshot], palette: Palette) -> String {
    let mut output = format!("{}\n", palette.heading("Scheduled Tasks"));
    if tasks.is_empty() {
        output.push_str("  No tasks scheduled.\n");
        return output;
    }

    let rows: Vec<Vec<String>> = tasks
        .iter()
        .map(|task| {
            let runtime = &task.runtime;
            vec![
                task.task_id.to_string(),
                task.name.clone(),
                task.schedule_type.to_string(),
                runtime.status.to_string(),
                runtime
                    .next_execution_time
                    .map(|next| next.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_else(|| "-".to_string()),
                runtime.execution_count.to_string(),
                format!("{:.1}%", runtime.success_rate()),
            ]
        })
        .collect();
    output.push_str(&format_compact_table(&["ID", "NAME", "TYPE", "STATUS", "NEXT", "RUNS", "SUCCESS"], &rows));
    output
}

pub fn scheduler_report(stats: &SchedulerStatistics, palette: Palette) -> String {
    let rows = vec![
        vec!["Status".to_string(), palette.status(!stats.status.is_stopped(), stats.status.as_str())],
        vec!["Uptime".to_string(), stats.formatted_uptime()],
        vec![
            "Tasks".to_string(),
            format!(
                "{} total, {} scheduled, {} running, {} paused, {} waiting",
                stats.total_tasks, stats.scheduled_tasks, stats.running_tasks, stats.paused_tasks, stats.waiting_tasks
            ),
        ],
        vec![
            "Executions".to_string(),
            format!("{} ({} ok, {} failed)", stats.total_executions, stats.total_successes, stats.total_failures),
        ],
        vec!["Success rate".to_string(), palette.status(stats.success_rate() >= 80.0, &format!("{:.1}%", stats.success_rate()))],
        vec![
            "Execution time".to_string(),
            format!("avg {}ms, min {}ms, max {}ms", stats.average_execution_time, stats.min_execution_time, stats.max_execution_time),
        ],
        vec![
            "Workers".to_string(),
            format!("{}/{} busy, {} queued", stats.active_workers, stats.total_workers, stats.queued_tasks),
        ],
    ];
    format!("{}\n{}", palette.heading("Scheduler"), format_compact_table(&["", ""], &rows))
}

pub fn engine_report(stats: &EngineStatisticsSnapshot, health: &EngineHealth, palette: Palette) -> String {
    let mut output = format!("{}\n", palette.heading("Collector Engine"));
    let rows = vec![
        vec!["Health".to_string(), palette.status(health.healthy, if health.healthy { "HEALTHY" } else { "UNHEALTHY" })],
        vec![
            "Collections".to_string(),
            format!(
                "{} ({} ok, {} failed, {} active)",
                stats.total_collections, stats.successful_collections, stats.failed_collections, stats.active_collections
            ),
        ],
        vec!["Success rate".to_string(), format!("{:.1}%", stats.success_rate)],
    ];
    output.push_str(&format_compact_table(&["", ""], &rows));

    for issue in &health.issues {
        output.push_str(&format!("  {}\n", palette.bad(issue)));
    }

    if !stats.plugins.is_empty() {
        let plugin_rows: Vec<Vec<String>> = stats
            .plugins
            .iter()
            .map(|plugin| {
                vec![
                    plugin.plugin_type.clone(),
                    plugin.execution_count.to_string(),
                    format!("{:.1}ms", plugin.average_execution_time),
                    plugin.error_count.to_string(),
                ]
            })
            .collect();
        output.push_str(&format_compact_table(&["PLUGIN", "RUNS", "AVG", "ERRORS"], &plugin_rows));
    }
    output
}
