//! Host hardware profile
//!
//! Picks thread count and GPU offload for the engine from what the host
//! offers and which llama.cpp backend was compiled in.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpuBackend {
    Metal,
    Cuda,
    Vulkan,
    Cpu,
}

impl GpuBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            GpuBackend::Metal => "metal",
            GpuBackend::Cuda => "cuda",
            GpuBackend::Vulkan => "vulkan",
            GpuBackend::Cpu => "cpu",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HardwareProfile {
    pub cpu_threads: u32,
    pub gpu_backend: GpuBackend,
}

impl HardwareProfile {
    /// Inspect the current host
    pub fn detect() -> Self {
        let cpu_threads = std::thread::available_parallelism()
            .map(|n| n.get() as u32)
            .unwrap_or(4);
        let profile = Self {
            cpu_threads,
            gpu_backend: detect_backend(),
        };
        tracing::info!(
            "Hardware: {} threads, backend {}",
            profile.cpu_threads,
            profile.gpu_backend.as_str()
        );
        profile
    }

    /// Leave one core for the UI; mobile SoCs gain little past 8 threads.
    pub fn recommended_threads(&self) -> u32 {
        self.cpu_threads.saturating_sub(1).clamp(1, 8)
    }

    pub fn recommended_gpu_layers(&self) -> u32 {
        match self.gpu_backend {
            GpuBackend::Cpu => 0,
            // llama.cpp caps this at the model's layer count
            _ => 99,
        }
    }
}

fn detect_backend() -> GpuBackend {
    if cfg!(feature = "metal") && cfg!(target_os = "macos") {
        return GpuBackend::Metal;
    }
    if cfg!(feature = "cuda") && has_nvidia_device() {
        return GpuBackend::Cuda;
    }
    if cfg!(feature = "vulkan") {
        return GpuBackend::Vulkan;
    }
    GpuBackend::Cpu
}

#[cfg(target_os = "linux")]
fn has_nvidia_device() -> bool {
    let dev = std::path::Path::new("/dev");
    dev.join("nvidia0").exists() || dev.join("nvidiactl").exists()
}

// Windows drivers expose no device node; trust the build feature
#[cfg(not(target_os = "linux"))]
fn has_nvidia_device() -> bool {
    true
}
