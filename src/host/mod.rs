pub mod config;
pub mod host_compute;
pub mod kernel;
pub mod kernels;
pub mod memory_tracker;

pub use config::HostComputeConfig;
pub use host_compute::HostCompute;
pub use kernel::{HostKernel, KernelArgs, ThreadId};
