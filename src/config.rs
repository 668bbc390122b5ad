use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Device the segmentation network runs on
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ComputeTarget {
    Cpu,
    Cuda { device_id: i32 },
    TensorRt { device_id: i32 },
}

impl Default for ComputeTarget {
    fn default() -> Self {
        ComputeTarget::Cuda { device_id: 0 }
    }
}

impl FromStr for ComputeTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        let (kind, device) = match lower.split_once(':') {
            Some((kind, device)) => (kind, Some(device)),
            None => (lower.as_str(), None),
        };

        let device_id = match device {
            Some(d) => d
                .parse::<i32>()
                .ok()
                .filter(|id| *id >= 0)
                .ok_or_else(|| format!("invalid device index in '{}'", s))?,
            None => 0,
        };

        match kind {
            "cpu" if device.is_none() => Ok(ComputeTarget::Cpu),
            "cuda" | "gpu" => Ok(ComputeTarget::Cuda { device_id }),
            "tensorrt" | "trt" => Ok(ComputeTarget::TensorRt { device_id }),
            _ => Err(format!(
                "unknown compute target '{}' (expected cpu, cuda[:N] or tensorrt[:N])",
                s
            )),
        }
    }
}

impl fmt::Display for ComputeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComputeTarget::Cpu => write!(f, "cpu"),
            ComputeTarget::Cuda { device_id } => write!(f, "cuda:{}", device_id),
            ComputeTarget::TensorRt { device_id } => write!(f, "tensorrt:{}", device_id),
        }
    }
}

/// Construction-time settings for the segmentation backend
#[derive(Clone, Debug, PartialEq)]
pub struct BackendConfig {
    /// Model weights to load
    pub model: PathBuf,
    /// Inference device
    pub target: ComputeTarget,
    /// Requested enablement; downgraded when the backend cannot be loaded
    pub enabled: bool,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            model: PathBuf::from("FastSAM-x.onnx"),
            target: ComputeTarget::default(),
            enabled: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("cpu", ComputeTarget::Cpu)]
    #[case("CPU", ComputeTarget::Cpu)]
    #[case("cuda", ComputeTarget::Cuda { device_id: 0 })]
    #[case("gpu", ComputeTarget::Cuda { device_id: 0 })]
    #[case("cuda:1", ComputeTarget::Cuda { device_id: 1 })]
    #[case("tensorrt", ComputeTarget::TensorRt { device_id: 0 })]
    #[case(" trt:2 ", ComputeTarget::TensorRt { device_id: 2 })]
    fn test_parse_compute_target(#[case] input: &str, #[case] expected: ComputeTarget) {
        assert_eq!(input.parse::<ComputeTarget>().unwrap(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("npu")]
    #[case("cpu:0")]
    #[case("cuda:x")]
    #[case("cuda:-1")]
    fn test_parse_compute_target_rejects(#[case] input: &str) {
        assert!(input.parse::<ComputeTarget>().is_err());
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        for target in [
            ComputeTarget::Cpu,
            ComputeTarget::Cuda { device_id: 3 },
            ComputeTarget::TensorRt { device_id: 0 },
        ] {
            assert_eq!(target.to_string().parse::<ComputeTarget>().unwrap(), target);
        }
    }

    #[test]
    fn test_default_config_is_disabled() {
        let config = BackendConfig::default();
        assert!(!config.enabled);
        assert_eq!(config.target, ComputeTarget::Cuda { device_id: 0 });
    }
}
