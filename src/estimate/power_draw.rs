use crate::sysfs::SysfsRoot;
use serde::Serialize;

/// Idle draw of a Pi 5 with the HAT attached.
const BASE_WATTS: f64 = 2.5;
/// Extra draw at 100% CPU.
const CPU_WATTS: f64 = 5.5;
/// Extra draw at 100% memory use.
const MEMORY_WATTS: f64 = 0.5;
/// Above this SoC temperature the draw is scaled up.
const WARM_CELSIUS: f64 = 50.0;

/// Aggregate CPU jiffies from the first line of /proc/stat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuTimes {
    pub total: u64,
    pub idle: u64,
}

impl CpuTimes {
    /// Parse `cpu  user nice system idle iowait irq softirq steal ...`.
    pub fn parse(stat: &str) -> Option<Self> {
        let line = stat.lines().find(|l| l.starts_with("cpu "))?;
        let fields: Vec<u64> = line
            .split_whitespace()
            .skip(1)
            .map(|f| f.parse().ok())
            .collect::<Option<Vec<u64>>>()?;
        if fields.len() < 4 {
            return None;
        }
        let idle = fields[3] + fields.get(4).copied().unwrap_or(0);
        let total = fields.iter().take(8).sum();
        Some(Self { total, idle })
    }

    /// Busy percentage between two readings.
    pub fn busy_percent_since(&self, prev: &CpuTimes) -> Option<f64> {
        let total = self.total.checked_sub(prev.total)?;
        let idle = self.idle.checked_sub(prev.idle)?;
        if total == 0 {
            return None;
        }
        Some((total.saturating_sub(idle)) as f64 / total as f64 * 100.0)
    }
}

/// Inputs and result of one power-draw estimate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PowerDraw {
    pub watts: f64,
    pub cpu_percent: Option<f64>,
    pub memory_percent: Option<f64>,
    pub cpu_temp_c: Option<f64>,
}

/// Linear load model for system draw. Missing inputs contribute nothing.
pub fn model_watts(
    cpu_percent: Option<f64>,
    memory_percent: Option<f64>,
    cpu_temp_c: Option<f64>,
) -> f64 {
    let cpu = cpu_percent.unwrap_or(0.0).clamp(0.0, 100.0) / 100.0 * CPU_WATTS;
    let memory = memory_percent.unwrap_or(0.0).clamp(0.0, 100.0) / 100.0 * MEMORY_WATTS;
    let temp_factor = match cpu_temp_c {
        Some(t) if t > WARM_CELSIUS => 1.1 + (t - WARM_CELSIUS) / 100.0,
        _ => 1.0,
    };
    (BASE_WATTS + cpu + memory) * temp_factor
}

/// Parse used-memory percentage from /proc/meminfo.
pub fn memory_percent(meminfo: &str) -> Option<f64> {
    let field = |name: &str| -> Option<f64> {
        meminfo
            .lines()
            .find(|l| l.starts_with(name))?
            .split_whitespace()
            .nth(1)?
            .parse()
            .ok()
    };
    let total = field("MemTotal:")?;
    let available = field("MemAvailable:")?;
    if total <= 0.0 {
        return None;
    }
    Some((total - available) / total * 100.0)
}

/// Estimates system power draw from CPU load, memory use and temperature.
/// CPU load needs two /proc/stat readings, so the first `sample` after
/// construction has no CPU figure unless [`SystemPowerEstimator::prime`]
/// was called some time earlier.
pub struct SystemPowerEstimator {
    sysfs: SysfsRoot,
    prev_cpu: Option<CpuTimes>,
    fallback_watts: f64,
}

impl SystemPowerEstimator {
    pub fn new(sysfs: SysfsRoot, fallback_watts: f64) -> Self {
        Self {
            sysfs,
            prev_cpu: None,
            fallback_watts,
        }
    }

    fn read_cpu_times(&self) -> Option<CpuTimes> {
        let stat = self.sysfs.read_optional("proc/stat").ok().flatten()?;
        CpuTimes::parse(&stat)
    }

    /// Take the baseline CPU reading.
    pub fn prime(&mut self) {
        self.prev_cpu = self.read_cpu_times();
    }

    pub fn sample(&mut self) -> PowerDraw {
        let curr_cpu = self.read_cpu_times();
        let cpu_percent = match (&self.prev_cpu, &curr_cpu) {
            (Some(prev), Some(curr)) => curr.busy_percent_since(prev),
            _ => None,
        };
        self.prev_cpu = curr_cpu;

        let memory_percent = self
            .sysfs
            .read_optional("proc/meminfo")
            .ok()
            .flatten()
            .and_then(|m| memory_percent(&m));

        let cpu_temp_c = self
            .sysfs
            .read_parse::<f64>("sys/class/thermal/thermal_zone0/temp")
            .ok()
            .map(|millideg| millideg / 1000.0);

        let watts = if cpu_percent.is_none() && memory_percent.is_none() && cpu_temp_c.is_none() {
            log::debug!(
                "no load inputs readable, assuming {:.1}W",
                self.fallback_watts
            );
            self.fallback_watts
        } else {
            model_watts(cpu_percent, memory_percent, cpu_temp_c)
        };

        PowerDraw {
            watts,
            cpu_percent,
            memory_percent,
            cpu_temp_c,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const STAT_A: &str = "cpu  100 0 100 800 0 0 0 0 0 0\ncpu0 25 0 25 200 0 0 0 0 0 0\n";
    const STAT_B: &str = "cpu  200 0 200 1400 0 0 0 0 0 0\ncpu0 50 0 50 350 0 0 0 0 0 0\n";
    const MEMINFO: &str = "MemTotal:        8000000 kB\nMemFree:         1000000 kB\nMemAvailable:    6000000 kB\n";

    #[test]
    fn test_cpu_times_parse() {
        let t = CpuTimes::parse(STAT_A).unwrap();
        assert_eq!(t.total, 1000);
        assert_eq!(t.idle, 800);
        assert!(CpuTimes::parse("intr 1 2 3").is_none());
    }

    #[test]
    fn test_busy_percent() {
        let a = CpuTimes::parse(STAT_A).unwrap();
        let b = CpuTimes::parse(STAT_B).unwrap();
        // 800 jiffies elapsed, 600 idle
        assert_eq!(b.busy_percent_since(&a), Some(25.0));
        assert_eq!(a.busy_percent_since(&b), None);
        assert_eq!(a.busy_percent_since(&a), None);
    }

    #[test]
    fn test_memory_percent() {
        assert_eq!(memory_percent(MEMINFO), Some(25.0));
        assert_eq!(memory_percent("MemTotal: 100 kB\n"), None);
    }

    #[test]
    fn test_model_watts() {
        assert_eq!(model_watts(None, None, None), 2.5);
        assert!((model_watts(Some(100.0), Some(100.0), Some(40.0)) - 8.5).abs() < 1e-9);
        // 70C -> factor 1.3
        assert!((model_watts(Some(0.0), Some(0.0), Some(70.0)) - 3.25).abs() < 1e-9);
    }

    #[test]
    fn test_estimator_reads_mock_tree() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("proc")).unwrap();
        fs::create_dir_all(tmp.path().join("sys/class/thermal/thermal_zone0")).unwrap();
        fs::write(tmp.path().join("proc/stat"), STAT_A).unwrap();
        fs::write(tmp.path().join("proc/meminfo"), MEMINFO).unwrap();
        fs::write(
            tmp.path().join("sys/class/thermal/thermal_zone0/temp"),
            "45000\n",
        )
        .unwrap();

        let mut est = SystemPowerEstimator::new(SysfsRoot::new(tmp.path()), 4.0);
        est.prime();
        fs::write(tmp.path().join("proc/stat"), STAT_B).unwrap();
        let draw = est.sample();

        assert_eq!(draw.cpu_percent, Some(25.0));
        assert_eq!(draw.memory_percent, Some(25.0));
        assert_eq!(draw.cpu_temp_c, Some(45.0));
        // 2.5 + 1.375 + 0.125
        assert!((draw.watts - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_estimator_falls_back() {
        let tmp = tempfile::tempdir().unwrap();
        let mut est = SystemPowerEstimator::new(SysfsRoot::new(tmp.path()), 4.0);
        let draw = est.sample();
        assert_eq!(draw.watts, 4.0);
        assert_eq!(draw.cpu_percent, None);
    }
}
