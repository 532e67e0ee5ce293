use crate::error::DispatchError;

pub struct HostComputeConfig {
    // Worker threads that run thread groups in parallel
    pub threads: usize,
    // None means no cap on live buffer bytes
    pub memory_limit_bytes: Option<u64>,
    // Register Relu, BatchNorm, Conv2D etc. on construction
    pub builtin_kernels: bool,
}

impl HostComputeConfig {
    pub fn build(self) -> Result<Self, DispatchError> {
        if self.threads == 0 {
            return Err(DispatchError::InvalidConfig(
                "threads must be at least 1".to_string(),
            ));
        }

        Ok(self)
    }
}

impl Default for HostComputeConfig {
    fn default() -> Self {
        Self {
            threads: num_cpus::get(),
            memory_limit_bytes: None,
            builtin_kernels: true,
        }
    }
}
