use crate::calibration::{Calibration, StableState};
use crate::config::{DetectionConfig, MonitorConfig, UpsConfig};
use crate::error::Result;
use crate::estimate::power_draw::{PowerDraw, SystemPowerEstimator};
use crate::estimate::{FusedEstimate, RuntimeEstimateSet, RuntimeEstimator, fuse};
use crate::events::{Event, EventDetector, EventSeverity, battery_current_ma};
use crate::history::HistoryWindow;
use crate::output;
use crate::sample::{CorrectedSample, Sample, StabilizedReading};
use crate::source::{HatSource, ReadingSource};
use crate::status::StatusReport;
use crate::sysfs::SysfsRoot;
use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::Serialize;
use std::time::{Duration, Instant};

/// Everything one poll cycle produced.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    #[serde(flatten)]
    pub reading: StabilizedReading,
    /// Measured on battery when a power monitor is fitted, else from SOC.
    pub battery_current_ma: Option<f64>,
    /// Load in watts as fed to the power-based estimator.
    pub power_watts: Option<f64>,
    pub power_draw: Option<PowerDraw>,
    pub estimates: RuntimeEstimateSet,
    pub runtime: FusedEstimate,
    pub events: Vec<Event>,
}

/// The polling pipeline for one UPS: read, classify, correct, stabilize,
/// estimate and detect, then record the sample in history.
pub struct Monitor<S: ReadingSource> {
    source: S,
    calibration: Calibration,
    detection: DetectionConfig,
    estimator: RuntimeEstimator,
    detector: EventDetector,
    capacity_mah: f64,
    history: HistoryWindow,
    stable: StableState,
}

impl<S: ReadingSource> Monitor<S> {
    /// Fails if the calibration settings are unusable.
    pub fn new(source: S, config: &UpsConfig) -> Result<Self> {
        let calibration = Calibration::new(&config.calibration)?;
        log::debug!("calibration factor {}", calibration.factor());
        let interval = Duration::from_secs(config.monitor.poll_interval_secs.max(1));
        Ok(Self {
            source,
            calibration,
            detection: config.detection.clone(),
            estimator: RuntimeEstimator::new(config.estimator.clone(), interval),
            detector: EventDetector::new(config.events.clone()),
            capacity_mah: config.estimator.capacity_mah,
            history: HistoryWindow::new(config.monitor.history_capacity),
            stable: StableState::default(),
        })
    }

    /// Start from a previously persisted window instead of an empty one.
    pub fn with_history(mut self, history: HistoryWindow) -> Self {
        self.history = history;
        self
    }

    pub fn history(&self) -> &HistoryWindow {
        &self.history
    }

    pub fn stable_state(&self) -> StableState {
        self.stable
    }

    /// Read one sample and classify and correct it. A failed read yields a
    /// sample with every field unavailable.
    pub fn poll(&mut self) -> CorrectedSample {
        let sample = self.source.read().unwrap_or_else(|e| {
            log::warn!("UPS reading failed: {}", e);
            Sample::unavailable(Utc::now())
        });
        self.calibration.apply(sample, &self.detection)
    }

    /// Fused runtime for `sample` against the current history.
    pub fn estimate_runtime(
        &self,
        sample: &CorrectedSample,
        power_draw_watts: Option<f64>,
    ) -> FusedEstimate {
        self.estimator
            .estimate_runtime(sample, power_draw_watts, &self.history)
    }

    /// Events for `sample` against the current history.
    pub fn detect_events(&self, sample: &CorrectedSample) -> Vec<Event> {
        let current = self.battery_current_ma(sample);
        self.detector.detect(sample, &self.history, current)
    }

    fn battery_current_ma(&self, sample: &CorrectedSample) -> Option<f64> {
        battery_current_ma(self.history.last(), sample, self.capacity_mah)
    }

    /// Run one full cycle. The estimator and detector both see the sample
    /// before it is appended to history.
    pub fn cycle(&mut self, power_draw: Option<PowerDraw>) -> CycleReport {
        let corrected = self.poll();

        let (reading, stable) = self.calibration.stabilize_sample(corrected, self.stable);
        self.stable = stable;

        let battery_current_ma = self.battery_current_ma(&corrected);
        // A measured load beats the modeled one.
        let power_watts = corrected
            .sample
            .load_power_watts
            .or(power_draw.map(|d| d.watts));
        let estimates = self
            .estimator
            .estimate(&corrected, power_watts, &self.history);
        let runtime = fuse(&estimates);
        if estimates.is_empty() {
            log::debug!("no runtime estimator had usable inputs");
        }

        let events = self
            .detector
            .detect(&corrected, &self.history, battery_current_ma);
        for event in &events {
            match event.severity() {
                EventSeverity::Info => log::info!("{}: {}", event.code(), event),
                EventSeverity::Warning | EventSeverity::Critical => {
                    log::warn!("{}: {}", event.code(), event)
                }
            }
        }

        self.history.push(corrected);

        CycleReport {
            reading,
            battery_current_ma,
            power_watts,
            power_draw,
            estimates,
            runtime,
            events,
        }
    }
}

/// Load the persisted history window. Unreadable files and windows whose
/// newest entry is older than three poll intervals start empty.
pub fn restore_history(config: &MonitorConfig, now: DateTime<Utc>) -> HistoryWindow {
    let empty = HistoryWindow::new(config.history_capacity);
    if config.history_file.as_os_str().is_empty() {
        return empty;
    }

    let window = match HistoryWindow::load(&config.history_file, config.history_capacity) {
        Ok(w) => w,
        Err(e) => {
            log::warn!("ignoring history: {}", e);
            return empty;
        }
    };

    let max_age = chrono::Duration::seconds(config.poll_interval_secs.max(1) as i64 * 3);
    match window.last() {
        Some(last) if now - last.timestamp() > max_age => {
            log::debug!(
                "history in {} is stale (newest {}), starting fresh",
                config.history_file.display(),
                last.timestamp()
            );
            empty
        }
        _ => window,
    }
}

fn power_estimator(config: &UpsConfig) -> SystemPowerEstimator {
    SystemPowerEstimator::new(
        SysfsRoot::new(config.device.root.clone()),
        config.estimator.fallback_power_watts,
    )
}

/// Take a single reading. With `measure_load`, CPU use is sampled over a
/// short window so the power-based estimator can run.
pub fn snapshot(config: &UpsConfig, measure_load: bool) -> Result<StatusReport> {
    let source = HatSource::open(&config.device)?;
    let (model, profile) = (source.model(), source.profile());
    let history = restore_history(&config.monitor, Utc::now());
    let mut monitor = Monitor::new(source, config)?.with_history(history);

    let power_draw = if measure_load {
        let mut power = power_estimator(config);
        power.prime();
        std::thread::sleep(Duration::from_secs(1));
        Some(power.sample())
    } else {
        None
    };

    let report = monitor.cycle(power_draw);
    Ok(StatusReport::new(model, profile, report))
}

/// Poll until interrupted, printing one row per cycle and persisting history.
pub fn run(config: &UpsConfig) -> Result<()> {
    let source = HatSource::open(&config.device)?;
    let model = source.model();
    let history = restore_history(&config.monitor, Utc::now());
    let mut monitor = Monitor::new(source, config)?.with_history(history);
    let mut power = power_estimator(config);
    power.prime();

    let interval = Duration::from_secs(config.monitor.poll_interval_secs.max(1));
    let persist = !config.monitor.history_file.as_os_str().is_empty();

    println!("{} ({})", "UPS Monitor".bold().underline(), model);
    println!(
        "Polling every {}s, press Ctrl+C to stop",
        interval.as_secs()
    );
    if !monitor.history().is_empty() {
        println!(
            "  {} resumed with {} samples of history",
            "Note:".yellow(),
            monitor.history().len()
        );
    }
    println!();
    output::print_monitor_header();

    let start = Instant::now();
    loop {
        let report = monitor.cycle(Some(power.sample()));
        output::print_monitor_row(start.elapsed(), &report);
        for event in &report.events {
            output::print_event(event);
        }

        if persist && let Err(e) = monitor.history().save(&config.monitor.history_file) {
            log::warn!("failed to persist history: {}", e);
        }

        std::thread::sleep(interval);
    }
}
