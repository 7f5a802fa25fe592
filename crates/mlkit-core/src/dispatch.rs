//! Runtime kernel selection
//!
//! Kernels are generic over their element type and primitives backend at
//! compile time. At runtime a [`KernelRegistry`] picks one instantiation per
//! algorithm container from the method the caller asked for and the CPU
//! level reported by a [`CpuProbe`].
//!
//! Selection never fails because a wider instruction set is missing: entries
//! above the detected level are skipped and the search continues downwards
//! to the baseline entry.

use crate::error::{ErrorDetail, ErrorKind};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;
use tracing::{debug, warn};

/// Environment variable capping the detected CPU level
pub const CPU_LEVEL_ENV: &str = "MLKIT_CPU_LEVEL";

bitflags! {
    /// Instruction set extensions relevant to kernel selection
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct CpuFeatures: u32 {
        const SSE2 = 1 << 0;
        const AVX = 1 << 1;
        const AVX2 = 1 << 2;
        const FMA = 1 << 3;
        const AVX512F = 1 << 4;
        const AVX512VL = 1 << 5;
    }
}

/// Ordered capability level used as the runtime dispatch key
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CpuLevel {
    /// Plain scalar code, always available
    Baseline = 0,
    /// AVX2 with FMA (256-bit vectors)
    Avx2 = 1,
    /// AVX-512F/VL with FMA (512-bit vectors)
    Avx512 = 2,
}

impl CpuLevel {
    /// Highest level whose requirements are contained in `features`
    pub fn from_features(features: CpuFeatures) -> Self {
        let avx2 = CpuFeatures::AVX2 | CpuFeatures::FMA;
        if features.contains(avx2 | CpuFeatures::AVX512F | CpuFeatures::AVX512VL) {
            CpuLevel::Avx512
        } else if features.contains(avx2) {
            CpuLevel::Avx2
        } else {
            CpuLevel::Baseline
        }
    }

    /// Minimal feature set implied by this level
    pub fn features(self) -> CpuFeatures {
        match self {
            CpuLevel::Baseline => CpuFeatures::empty(),
            CpuLevel::Avx2 => CpuFeatures::SSE2 | CpuFeatures::AVX | CpuFeatures::AVX2 | CpuFeatures::FMA,
            CpuLevel::Avx512 => CpuLevel::Avx2.features() | CpuFeatures::AVX512F | CpuFeatures::AVX512VL,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            CpuLevel::Baseline => "baseline",
            CpuLevel::Avx2 => "avx2",
            CpuLevel::Avx512 => "avx512",
        }
    }

    /// Parse a level name as accepted in [`CPU_LEVEL_ENV`]
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "baseline" | "scalar" | "sse2" => Some(CpuLevel::Baseline),
            "avx2" => Some(CpuLevel::Avx2),
            "avx512" => Some(CpuLevel::Avx512),
            _ => None,
        }
    }
}

impl fmt::Display for CpuLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source of CPU capability information
pub trait CpuProbe: Send + Sync + fmt::Debug {
    fn features(&self) -> CpuFeatures;

    fn level(&self) -> CpuLevel {
        CpuLevel::from_features(self.features())
    }
}

static HOST_FEATURES: OnceLock<CpuFeatures> = OnceLock::new();
static HOST_LEVEL: OnceLock<CpuLevel> = OnceLock::new();

/// Detect the running CPU's features once per process
pub fn detect_features() -> CpuFeatures {
    *HOST_FEATURES.get_or_init(detect_features_uncached)
}

#[cold]
fn detect_features_uncached() -> CpuFeatures {
    #[allow(unused_mut)]
    let mut features = CpuFeatures::empty();
    #[cfg(target_arch = "x86_64")]
    {
        let checks = [
            (is_x86_feature_detected!("sse2"), CpuFeatures::SSE2),
            (is_x86_feature_detected!("avx"), CpuFeatures::AVX),
            (is_x86_feature_detected!("avx2"), CpuFeatures::AVX2),
            (is_x86_feature_detected!("fma"), CpuFeatures::FMA),
            (is_x86_feature_detected!("avx512f"), CpuFeatures::AVX512F),
            (is_x86_feature_detected!("avx512vl"), CpuFeatures::AVX512VL),
        ];
        for (present, flag) in checks {
            features.set(flag, present);
        }
    }
    features
}

/// Probe of the machine the process runs on
///
/// The detected level is capped by [`CPU_LEVEL_ENV`] when it is set.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostCpu;

impl CpuProbe for HostCpu {
    fn features(&self) -> CpuFeatures {
        detect_features()
    }

    fn level(&self) -> CpuLevel {
        *HOST_LEVEL.get_or_init(|| {
            let detected = CpuLevel::from_features(detect_features());
            let capped = cap_level(detected, std::env::var(CPU_LEVEL_ENV).ok().as_deref());
            debug!(detected = %detected, level = %capped, "host cpu level");
            capped
        })
    }
}

fn cap_level(detected: CpuLevel, cap: Option<&str>) -> CpuLevel {
    match cap {
        None => detected,
        Some(name) => match CpuLevel::parse(name) {
            Some(cap) => detected.min(cap),
            None => {
                warn!(value = name, "ignoring unrecognised {}", CPU_LEVEL_ENV);
                detected
            }
        },
    }
}

/// Probe reporting a fixed level, for tests and reproducible runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedCpu {
    level: CpuLevel,
}

impl FixedCpu {
    pub fn new(level: CpuLevel) -> Self {
        Self { level }
    }

    pub fn baseline() -> Self {
        Self::new(CpuLevel::Baseline)
    }
}

impl CpuProbe for FixedCpu {
    fn features(&self) -> CpuFeatures {
        self.level.features()
    }

    fn level(&self) -> CpuLevel {
        self.level
    }
}

/// Builds a kernel; `None` when the running CPU cannot execute it
pub type KernelFactory<K> = fn() -> Option<Box<K>>;

struct KernelEntry<M, K: ?Sized> {
    method: M,
    level: CpuLevel,
    factory: KernelFactory<K>,
}

/// Kernel chosen for one algorithm container
pub struct SelectedKernel<K: ?Sized> {
    pub kernel: Box<K>,
    pub level: CpuLevel,
}

impl<K: ?Sized> fmt::Debug for SelectedKernel<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectedKernel").field("level", &self.level).finish_non_exhaustive()
    }
}

/// Factories keyed by `(method, level)`
pub struct KernelRegistry<M, K: ?Sized> {
    algorithm: &'static str,
    entries: Vec<KernelEntry<M, K>>,
}

impl<M, K> KernelRegistry<M, K>
where
    M: Copy + PartialEq + fmt::Debug,
    K: ?Sized,
{
    pub fn new(algorithm: &'static str) -> Self {
        Self {
            algorithm,
            entries: Vec::new(),
        }
    }

    /// Add a factory for `method` requiring at least `level`
    pub fn register(mut self, method: M, level: CpuLevel, factory: KernelFactory<K>) -> Self {
        self.entries.push(KernelEntry { method, level, factory });
        self
    }

    pub fn supports(&self, method: M) -> bool {
        self.entries.iter().any(|e| e.method == method)
    }

    /// Levels registered for `method`, ascending
    pub fn levels(&self, method: M) -> Vec<CpuLevel> {
        let mut levels: Vec<_> = self.entries.iter().filter(|e| e.method == method).map(|e| e.level).collect();
        levels.sort();
        levels.dedup();
        levels
    }

    /// Build the widest kernel for `method` not exceeding `available`
    pub fn select(&self, method: M, available: CpuLevel) -> Result<SelectedKernel<K>, ErrorDetail> {
        let mut candidates: Vec<&KernelEntry<M, K>> = self
            .entries
            .iter()
            .filter(|e| e.method == method && e.level <= available)
            .collect();
        candidates.sort_by(|a, b| b.level.cmp(&a.level));

        for entry in candidates {
            match (entry.factory)() {
                Some(kernel) => {
                    debug!(
                        algorithm = self.algorithm,
                        method = ?method,
                        level = %entry.level,
                        available = %available,
                        "selected kernel"
                    );
                    return Ok(SelectedKernel {
                        kernel,
                        level: entry.level,
                    });
                }
                None => debug!(level = %entry.level, "kernel unavailable on this cpu, falling back"),
            }
        }

        Err(ErrorDetail::new(ErrorKind::MethodNotSupported)
            .with_argument("method")
            .with_message(format!("{} has no kernel for {:?}", self.algorithm, method)))
    }
}
