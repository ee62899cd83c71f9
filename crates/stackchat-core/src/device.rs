//! Accelerator selection for model deployment.
//!
//! This is a static lookup on the host platform, not a capability probe.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Device identifier understood by the backend's deploy endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    /// Apple-silicon Metal Performance Shaders.
    Mps,
    Cuda,
    Cpu,
}

impl Device {
    pub fn as_str(&self) -> &'static str {
        match self {
            Device::Mps => "mps",
            Device::Cuda => "cuda",
            Device::Cpu => "cpu",
        }
    }

    /// Picks the device for a platform: `mps` on Apple silicon, `cuda` elsewhere.
    ///
    /// `cpu` is never chosen by the lookup; it is only reachable through an
    /// explicit override.
    pub fn for_platform(platform: &Platform) -> Self {
        if platform.is_apple_silicon() {
            Device::Mps
        } else {
            Device::Cuda
        }
    }

    /// Uses the override when given, otherwise the platform lookup.
    pub fn resolve(override_device: Option<Device>, platform: &Platform) -> Self {
        override_device.unwrap_or_else(|| Self::for_platform(platform))
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Device {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mps" => Ok(Device::Mps),
            "cuda" => Ok(Device::Cuda),
            "cpu" => Ok(Device::Cpu),
            other => Err(format!("unknown device '{other}' (expected mps, cuda or cpu)")),
        }
    }
}

/// Host operating system and CPU architecture, as reported by `std::env::consts`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    pub os: String,
    pub arch: String,
}

impl Platform {
    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
        }
    }

    pub fn current() -> Self {
        Self::new(std::env::consts::OS, std::env::consts::ARCH)
    }

    pub fn is_apple_silicon(&self) -> bool {
        self.os == "macos" && (self.arch == "aarch64" || self.arch.starts_with("arm"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apple_silicon_selects_mps() {
        let platform = Platform::new("macos", "aarch64");
        assert_eq!(Device::for_platform(&platform), Device::Mps);
    }

    #[test]
    fn test_other_platforms_select_cuda() {
        for (os, arch) in [
            ("macos", "x86_64"),
            ("linux", "x86_64"),
            ("linux", "aarch64"),
            ("windows", "x86_64"),
        ] {
            let platform = Platform::new(os, arch);
            assert_eq!(Device::for_platform(&platform), Device::Cuda, "{os}/{arch}");
        }
    }

    #[test]
    fn test_override_wins_over_lookup() {
        let platform = Platform::new("macos", "aarch64");
        assert_eq!(Device::resolve(Some(Device::Cpu), &platform), Device::Cpu);
        assert_eq!(Device::resolve(None, &platform), Device::Mps);
    }

    #[test]
    fn test_parse_device() {
        assert_eq!("CPU".parse::<Device>(), Ok(Device::Cpu));
        assert!("tpu".parse::<Device>().is_err());
    }
}
