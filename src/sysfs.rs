use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

/// Filesystem root that GPIO, procfs and thermal reads are resolved against.
/// `/` on a real Pi; tests point it at a temp directory.
#[derive(Debug, Clone)]
pub struct SysfsRoot {
    root: PathBuf,
}

impl Default for SysfsRoot {
    fn default() -> Self {
        Self {
            root: PathBuf::from("/"),
        }
    }
}

impl SysfsRoot {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve a path relative to this root,
    /// e.g. `path("sys/class/gpio/gpio6/value")`.
    pub fn path(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.root.join(relative)
    }

    /// Read a file, trimming whitespace.
    pub fn read(&self, relative: impl AsRef<Path>) -> Result<String> {
        let path = self.path(relative);
        std::fs::read_to_string(&path)
            .map(|s| s.trim().to_string())
            .map_err(|e| Error::SysfsRead { path, source: e })
    }

    /// Read a file, returning None if it is missing or not readable by us.
    pub fn read_optional(&self, relative: impl AsRef<Path>) -> Result<Option<String>> {
        let path = self.path(relative);
        match std::fs::read_to_string(&path) {
            Ok(s) => Ok(Some(s.trim().to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => Ok(None),
            Err(e) => Err(Error::SysfsRead { path, source: e }),
        }
    }

    pub fn read_parse<T: std::str::FromStr>(&self, relative: impl AsRef<Path>) -> Result<T>
    where
        T::Err: std::fmt::Display,
    {
        let relative = relative.as_ref();
        let value = self.read(relative)?;
        value.parse::<T>().map_err(|e| Error::Parse {
            path: self.path(relative),
            detail: format!("failed to parse '{}': {}", value, e),
        })
    }

    /// Level of an exported sysfs GPIO line (0 or 1).
    pub fn gpio_value(&self, pin: u32) -> Result<u8> {
        let relative = format!("sys/class/gpio/gpio{}/value", pin);
        let level: u8 = self.read_parse(&relative)?;
        if level > 1 {
            return Err(Error::Parse {
                path: self.path(&relative),
                detail: format!("gpio level out of range: {}", level),
            });
        }
        Ok(level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_read_parse() {
        let tmp = tempfile::tempdir().unwrap();
        let sysfs = SysfsRoot::new(tmp.path());

        fs::create_dir_all(tmp.path().join("sys/class/thermal/thermal_zone0")).unwrap();
        fs::write(
            tmp.path().join("sys/class/thermal/thermal_zone0/temp"),
            "48312\n",
        )
        .unwrap();

        assert_eq!(
            sysfs.read_parse::<u32>("sys/class/thermal/thermal_zone0/temp").unwrap(),
            48312
        );
    }

    #[test]
    fn test_read_optional_missing() {
        let tmp = tempfile::tempdir().unwrap();
        let sysfs = SysfsRoot::new(tmp.path());

        assert_eq!(sysfs.read_optional("proc/nonexistent").unwrap(), None);
    }

    #[test]
    fn test_gpio_value() {
        let tmp = tempfile::tempdir().unwrap();
        let sysfs = SysfsRoot::new(tmp.path());

        let dir = tmp.path().join("sys/class/gpio/gpio6");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("value"), "1\n").unwrap();
        assert_eq!(sysfs.gpio_value(6).unwrap(), 1);

        fs::write(dir.join("value"), "7\n").unwrap();
        assert!(sysfs.gpio_value(6).is_err());

        assert!(sysfs.gpio_value(16).is_err());
    }
}
