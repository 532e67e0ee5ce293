use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Mutex, MutexGuard, PoisonError};

use log::{debug, warn};
use rayon::prelude::*;

use crate::compute::resource::{
    BufferHandle, BufferRole, ComputeResource, DispatchGrid, KernelHandle, ShapeName,
    ThreadGroupSize,
};
use crate::error::DispatchError;

use super::config::HostComputeConfig;
use super::kernel::{HostKernel, KernelArgs, ThreadId};
use super::kernels::builtin_kernels;
use super::memory_tracker::MemoryTracker;

const F32_BYTES: u64 = std::mem::size_of::<f32>() as u64;

struct HostState {
    buffers: HashMap<u64, Vec<f32>>,
    next_buffer: u64,
    memory: MemoryTracker,
    bindings: HashMap<(KernelHandle, BufferRole), BufferHandle>,
    shapes: HashMap<ShapeName, Vec<u32>>,
}

impl HostState {
    fn buffer(&self, handle: BufferHandle) -> Result<&Vec<f32>, DispatchError> {
        self.buffers
            .get(&handle.0)
            .ok_or(DispatchError::InvalidBuffer(handle.0))
    }

    fn bound(&self, kernel: KernelHandle, role: BufferRole) -> Option<&[f32]> {
        self.bindings
            .get(&(kernel, role))
            .and_then(|handle| self.buffers.get(&handle.0))
            .map(|buffer| buffer.as_slice())
    }
}

// Lane writes are buffered and land once the whole grid has run
pub struct HostCompute {
    kernels: Vec<HostKernel>,
    pool: rayon::ThreadPool,
    state: Mutex<HostState>,
}

impl HostCompute {
    pub fn new() -> Result<Self, DispatchError> {
        Self::with_config(HostComputeConfig::default())
    }

    pub fn with_config(config: HostComputeConfig) -> Result<Self, DispatchError> {
        let config = config.build()?;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.threads)
            .thread_name(|i| format!("host-compute-{}", i))
            .build()?;

        let memory = match config.memory_limit_bytes {
            Some(limit) => MemoryTracker::new(limit),
            None => MemoryTracker::unlimited(),
        };

        let mut host = Self {
            kernels: Vec::new(),
            pool,
            state: Mutex::new(HostState {
                buffers: HashMap::new(),
                next_buffer: 0,
                memory,
                bindings: HashMap::new(),
                shapes: HashMap::new(),
            }),
        };

        if config.builtin_kernels {
            for kernel in builtin_kernels() {
                host.register(kernel)?;
            }
        }

        Ok(host)
    }

    // Same name replaces the earlier kernel
    pub fn register(&mut self, kernel: HostKernel) -> Result<KernelHandle, DispatchError> {
        let group = kernel.group();
        if group.x == 0 || group.y == 0 || group.z == 0 {
            return Err(DispatchError::InvalidThreadGroup {
                kernel: kernel.name().to_string(),
                group,
                reason: "every axis needs at least one lane",
            });
        }

        if let Some(idx) = self.kernels.iter().position(|k| k.name() == kernel.name()) {
            self.kernels[idx] = kernel;
            return Ok(KernelHandle(idx));
        }

        self.kernels.push(kernel);
        Ok(KernelHandle(self.kernels.len() - 1))
    }

    pub fn kernel_names(&self) -> Vec<&str> {
        self.kernels.iter().map(|k| k.name()).collect()
    }

    pub fn live_buffers(&self) -> usize {
        self.diagnostics().buffers.len()
    }

    pub fn allocated_bytes(&self) -> u64 {
        self.diagnostics().memory.get_current()
    }

    // Read-only counters stay truthful even after a poisoned lock
    fn diagnostics(&self) -> MutexGuard<'_, HostState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock(&self) -> Result<MutexGuard<'_, HostState>, DispatchError> {
        self.state.lock().map_err(|_| DispatchError::LockPoisoned)
    }

    fn kernel(&self, kernel: KernelHandle) -> Result<&HostKernel, DispatchError> {
        self.kernels
            .get(kernel.0)
            .ok_or_else(|| DispatchError::KernelNotFound(format!("handle {}", kernel.0)))
    }
}

impl ComputeResource for HostCompute {
    fn find_kernel(&self, name: &str) -> Result<KernelHandle, DispatchError> {
        self.kernels
            .iter()
            .position(|k| k.name() == name)
            .map(KernelHandle)
            .ok_or_else(|| DispatchError::KernelNotFound(name.to_string()))
    }

    fn kernel_name(&self, kernel: KernelHandle) -> String {
        self.kernels
            .get(kernel.0)
            .map(|k| k.name().to_string())
            .unwrap_or_else(|| format!("<unknown kernel {}>", kernel.0))
    }

    fn thread_group_size(&self, kernel: KernelHandle) -> Result<ThreadGroupSize, DispatchError> {
        Ok(self.kernel(kernel)?.group())
    }

    fn allocate(&self, len: usize) -> Result<BufferHandle, DispatchError> {
        let bytes = (len as u64).checked_mul(F32_BYTES).ok_or_else(|| {
            DispatchError::OutOfMemory(format!("{} floats overflow a byte count", len))
        })?;

        let mut state = self.lock()?;
        state.memory.allocate(bytes)?;

        let id = state.next_buffer;
        state.next_buffer += 1;
        state.buffers.insert(id, vec![0.0; len]);

        Ok(BufferHandle(id))
    }

    fn upload(&self, buffer: BufferHandle, data: &[f32]) -> Result<(), DispatchError> {
        let mut state = self.lock()?;
        let target = state
            .buffers
            .get_mut(&buffer.0)
            .ok_or(DispatchError::InvalidBuffer(buffer.0))?;

        if data.len() > target.len() {
            return Err(DispatchError::BufferSize {
                handle: buffer.0,
                capacity: target.len(),
                len: data.len(),
            });
        }
        target[..data.len()].copy_from_slice(data);
        Ok(())
    }

    fn download(&self, buffer: BufferHandle, out: &mut [f32]) -> Result<(), DispatchError> {
        let state = self.lock()?;
        let source = state.buffer(buffer)?;

        if out.len() > source.len() {
            return Err(DispatchError::BufferSize {
                handle: buffer.0,
                capacity: source.len(),
                len: out.len(),
            });
        }
        out.copy_from_slice(&source[..out.len()]);
        Ok(())
    }

    fn release(&self, buffer: BufferHandle) {
        let mut state = match self.lock() {
            Ok(state) => state,
            Err(_) => {
                warn!("host compute lock poisoned, leaking buffer {}", buffer);
                return;
            }
        };

        match state.buffers.remove(&buffer.0) {
            Some(data) => {
                state.memory.deallocate(data.len() as u64 * F32_BYTES);
                state.bindings.retain(|_, bound| *bound != buffer);
            }
            None => warn!("released unknown buffer {}", buffer),
        }
    }

    fn set_buffer(
        &self,
        kernel: KernelHandle,
        role: BufferRole,
        buffer: BufferHandle,
    ) -> Result<(), DispatchError> {
        self.kernel(kernel)?;
        let mut state = self.lock()?;
        state.buffer(buffer)?;
        state.bindings.insert((kernel, role), buffer);
        Ok(())
    }

    fn set_ints(&self, name: ShapeName, values: &[u32]) -> Result<(), DispatchError> {
        let mut state = self.lock()?;
        state.shapes.insert(name, values.to_vec());
        Ok(())
    }

    fn dispatch(&self, kernel: KernelHandle, grid: DispatchGrid) -> Result<(), DispatchError> {
        let host_kernel = self.kernel(kernel)?;
        let group = host_kernel.group();
        let name = host_kernel.name();

        // Kernels run on copies so the state lock is never held across user code
        let (output_handle, staged) = {
            let state = self.lock()?;
            let output_handle = *state
                .bindings
                .get(&(kernel, BufferRole::Output))
                .ok_or_else(|| DispatchError::MissingBinding {
                    kernel: name.to_string(),
                    role: BufferRole::Output,
                })?;
            let output_len = state.buffer(output_handle)?.len();
            (output_handle, Staged::copy(&state, kernel, output_len))
        };

        let args = staged.args(name);
        debug!(
            "host dispatch {}: group {}, grid {}, {} lanes",
            name,
            group,
            grid,
            grid.group_count() * group.lanes()
        );

        let writes = panic::catch_unwind(AssertUnwindSafe(|| {
            self.pool.install(|| run_grid(host_kernel, &args, group, grid))
        }))
        .map_err(|payload| {
            let message = panic_message(&*payload);
            warn!("host kernel {} panicked: {}", name, message);
            DispatchError::KernelPanicked {
                kernel: name.to_string(),
                message,
            }
        })??;

        let mut state = self.lock()?;
        let output = state
            .buffers
            .get_mut(&output_handle.0)
            .ok_or(DispatchError::InvalidBuffer(output_handle.0))?;

        // Either every write lands or none does
        let len = output.len();
        if let Some(&(index, _)) = writes.iter().flatten().find(|(index, _)| *index >= len) {
            return Err(DispatchError::KernelOutOfBounds {
                kernel: name.to_string(),
                index,
                len,
            });
        }
        for (index, value) in writes.into_iter().flatten() {
            output[index] = value;
        }
        Ok(())
    }
}

struct Staged {
    input: Option<Vec<f32>>,
    filter: Option<Vec<f32>>,
    bias: Option<Vec<f32>>,
    output_len: usize,
    input_shape: Option<Vec<u32>>,
    filter_shape: Option<Vec<u32>>,
    output_shape: Option<Vec<u32>>,
}

impl Staged {
    fn copy(state: &HostState, kernel: KernelHandle, output_len: usize) -> Self {
        let bound = |role: BufferRole| state.bound(kernel, role).map(<[f32]>::to_vec);
        let shape = |name: ShapeName| state.shapes.get(&name).cloned();
        Self {
            input: bound(BufferRole::Input),
            filter: bound(BufferRole::Filter),
            bias: bound(BufferRole::Bias),
            output_len,
            input_shape: shape(ShapeName::InputShape),
            filter_shape: shape(ShapeName::FilterShape),
            output_shape: shape(ShapeName::OutputShape),
        }
    }

    fn args<'a>(&'a self, kernel: &'a str) -> KernelArgs<'a> {
        KernelArgs {
            kernel,
            input: self.input.as_deref(),
            filter: self.filter.as_deref(),
            bias: self.bias.as_deref(),
            output_len: self.output_len,
            input_shape: self.input_shape.as_deref(),
            filter_shape: self.filter_shape.as_deref(),
            output_shape: self.output_shape.as_deref(),
        }
    }
}

// Global ids are widened so a full u32 grid times its group cannot wrap
fn lane_id(group: ThreadGroupSize, group_id: [u32; 3], local: [u32; 3]) -> ThreadId {
    let size = [group.x, group.y, group.z];
    let global =
        [0, 1, 2].map(|axis| group_id[axis] as u64 * size[axis] as u64 + local[axis] as u64);
    ThreadId {
        group: group_id,
        local,
        global,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

// Runs every group in parallel, each group's lanes in order
fn run_grid(
    kernel: &HostKernel,
    args: &KernelArgs<'_>,
    group: ThreadGroupSize,
    grid: DispatchGrid,
) -> Result<Vec<Vec<(usize, f32)>>, DispatchError> {
    let groups = grid.group_count();

    (0..groups)
        .into_par_iter()
        .map(|flat| {
            let gx = (flat % grid.x as u64) as u32;
            let gy = ((flat / grid.x as u64) % grid.y as u64) as u32;
            let gz = (flat / (grid.x as u64 * grid.y as u64)) as u32;

            let mut writes = Vec::new();
            for lz in 0..group.z {
                for ly in 0..group.y {
                    for lx in 0..group.x {
                        let id = lane_id(group, [gx, gy, gz], [lx, ly, lz]);
                        kernel.run(args, id, &mut writes)?;
                    }
                }
            }
            Ok(writes)
        })
        .collect()
}
