use crate::error::{Error, Result};
use crate::estimate::{Method, Urgency, format_runtime, format_runtime_compact};
use crate::events::{Event, EventSeverity};
use crate::monitor::CycleReport;
use crate::status::{StatusReport, UpsState};
use colored::{ColoredString, Colorize};
use serde::Serialize;
use std::time::Duration;

const LABEL_W: usize = 18;

fn opt(value: Option<f64>, precision: usize, suffix: &str) -> String {
    value
        .map(|v| format!("{:.*}{}", precision, v, suffix))
        .unwrap_or_else(|| "N/A".to_string())
}

fn flag(value: Option<bool>, yes: &str, no: &str) -> String {
    match value {
        Some(true) => yes.to_string(),
        Some(false) => no.to_string(),
        None => "Unknown".to_string(),
    }
}

/// Draw a titled box around label/value rows.
fn print_box(title: &str, rows: &[(&str, String)]) {
    let inner_w = rows
        .iter()
        .map(|(l, v)| l.len().max(LABEL_W) + 2 + v.chars().count())
        .max()
        .unwrap_or(40)
        .max(title.len() + 2);

    let fill = inner_w.saturating_sub(1 + title.len());
    println!("╭─ {} {}╮", title.bold(), "─".repeat(fill));
    for (label, value) in rows {
        let padded = format!("{:<w$}", label, w = LABEL_W);
        let pad = inner_w.saturating_sub(LABEL_W + 2 + value.chars().count());
        println!("│ {}  {}{} │", padded.dimmed(), value, " ".repeat(pad));
    }
    println!("╰{}╯", "─".repeat(inner_w + 2));
}

fn state_colored(state: UpsState) -> ColoredString {
    let text = state.to_string();
    match state {
        UpsState::Critical => text.red().bold(),
        UpsState::OnBattery => text.yellow(),
        UpsState::Charging | UpsState::OverReporting => text.cyan(),
        UpsState::NoBattery => text.dimmed(),
        UpsState::ExternalPower | UpsState::Good => text.green(),
    }
}

fn urgency_line(urgency: Option<Urgency>) -> Option<ColoredString> {
    let urgency = urgency?;
    let message = urgency.message()?;
    Some(match urgency {
        Urgency::Critical => message.red().bold(),
        Urgency::Warning => message.yellow().bold(),
        _ => message.blue(),
    })
}

pub fn print_status(report: &StatusReport) {
    let reading = &report.cycle.reading;
    let corrected = &reading.corrected;
    let sample = &corrected.sample;

    let mut rows = vec![
        ("Model", report.model.to_string()),
        ("Gauge", format!("{:?}", report.profile)),
        ("Power Source", report.power_source.to_string()),
        ("Battery", flag(Some(corrected.has_battery), "Present", "Not detected")),
        ("Voltage", opt(sample.battery_voltage, 3, " V")),
        ("Charge (gauge)", opt(sample.battery_percentage_raw, 1, "%")),
        ("Charge", opt(corrected.percentage(), 1, "%")),
        ("Charge (stable)", opt(reading.battery_percentage_stable, 1, "%")),
        ("Charging", flag(corrected.is_charging(), "Yes", "No")),
        ("Runtime", report.runtime_display.clone()),
    ];
    if sample.load_current_ma.is_some() || sample.load_power_watts.is_some() {
        rows.push((
            "Load",
            format!(
                "{} / {}",
                opt(sample.load_current_ma, 0, " mA"),
                opt(sample.load_power_watts, 2, " W")
            ),
        ));
    }
    print_box("UPS", &rows);

    println!("  Status: {}", state_colored(report.state));
    if let Some(line) = urgency_line(report.urgency) {
        println!("  {}", line);
    }
    for event in &report.cycle.events {
        print_event(event);
    }
}

pub fn print_runtime(report: &StatusReport) {
    let cycle = &report.cycle;

    let title = "Runtime Estimates";
    let divider_w: usize = 48;
    println!(
        "── {} {}",
        title.bold(),
        "─".repeat(divider_w.saturating_sub(2 + title.len()))
    );
    for method in Method::ALL {
        let value = match cycle.estimates.get(method) {
            Some(h) => format!("{} ({:.2}h)", format_runtime(Some(h)), h),
            None => "skipped".dimmed().to_string(),
        };
        println!(
            "  {:<w$} {:>4.1}  {}",
            method.label(),
            method.weight(),
            value,
            w = LABEL_W
        );
    }
    println!("{}", "─".repeat(divider_w));

    match cycle.runtime.hours {
        Some(h) => println!(
            "  {} {}  {}",
            "Fused:".bold(),
            report.runtime_display.green().bold(),
            format_runtime_compact(Some(h)).dimmed()
        ),
        None => println!("  {} {}", "Fused:".bold(), report.runtime_display.yellow()),
    }
    if let Some(watts) = cycle.reading.corrected.sample.load_power_watts {
        println!("  {}", format!("Measured load {:.2}W", watts).dimmed());
    } else if let Some(draw) = &cycle.power_draw {
        println!(
            "  {}",
            format!(
                "Draw {:.1}W (CPU {}, mem {}, {})",
                draw.watts,
                opt(draw.cpu_percent, 0, "%"),
                opt(draw.memory_percent, 0, "%"),
                opt(draw.cpu_temp_c, 1, "°C"),
            )
            .dimmed()
        );
    }
    if let Some(line) = urgency_line(report.urgency) {
        println!("  {}", line);
    }
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| Error::Other(format!("failed to serialize output: {}", e)))?;
    println!("{}", json);
    Ok(())
}

pub fn print_event(event: &Event) {
    let tag = match event.severity() {
        EventSeverity::Critical => "CRIT".red().bold(),
        EventSeverity::Warning => "WARN".yellow().bold(),
        EventSeverity::Info => "INFO".blue().bold(),
    };
    println!("  {} {}", tag, event);
}

pub fn print_monitor_header() {
    println!(
        "{:>8} {:>9} {:>8} {:>8} {:>10} {:>8} {:>14}",
        "Time".dimmed(),
        "Power".cyan(),
        "Volts".cyan(),
        "Batt %".cyan(),
        "Current".cyan(),
        "Draw".cyan(),
        "Runtime".cyan(),
    );
    println!("{}", "-".repeat(71).dimmed());
}

pub fn print_monitor_row(elapsed: Duration, report: &CycleReport) {
    let corrected = &report.reading.corrected;
    let time_str = format!(
        "{:02}:{:02}",
        elapsed.as_secs() / 60,
        elapsed.as_secs() % 60
    );
    let power = flag(corrected.external_power(), "external", "battery");
    let pct = report
        .reading
        .battery_percentage_stable
        .or_else(|| corrected.percentage());

    println!(
        "{:>8} {:>9} {:>8} {:>8} {:>10} {:>8} {:>14}",
        time_str,
        power,
        opt(corrected.voltage(), 2, "V"),
        opt(pct, 1, "%"),
        opt(report.battery_current_ma, 0, "mA"),
        opt(report.power_watts, 1, "W"),
        format_runtime(report.runtime.hours),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opt_formatting() {
        assert_eq!(opt(Some(3.14159), 2, "V"), "3.14V");
        assert_eq!(opt(None, 2, "V"), "N/A");
    }

    #[test]
    fn test_flag_formatting() {
        assert_eq!(flag(Some(true), "Yes", "No"), "Yes");
        assert_eq!(flag(Some(false), "Yes", "No"), "No");
        assert_eq!(flag(None, "Yes", "No"), "Unknown");
    }

    #[test]
    fn test_urgency_line_only_when_short() {
        assert!(urgency_line(None).is_none());
        assert!(urgency_line(Some(Urgency::Ok)).is_none());
        let line = urgency_line(Some(Urgency::Critical)).unwrap();
        assert!(line.to_string().contains("30 minutes"));
    }
}
