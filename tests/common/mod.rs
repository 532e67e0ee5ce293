#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use pix2pix_gpu::{
    BufferHandle, BufferRole, ComputeResource, DispatchError, DispatchGrid, HostCompute,
    HostComputeConfig, KernelDispatcher, KernelHandle, ShapeName, ThreadGroupSize,
};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    Allocate { len: usize, handle: BufferHandle },
    Upload { handle: BufferHandle, len: usize },
    Download { handle: BufferHandle },
    Release(BufferHandle),
    SetBuffer { role: BufferRole, handle: BufferHandle },
    SetInts { name: ShapeName, values: Vec<u32> },
    Dispatch { kernel: String, grid: DispatchGrid },
}

/// Forwards to a HostCompute and records every call made through it.
pub struct RecordingResource {
    pub inner: HostCompute,
    events: Mutex<Vec<Event>>,
}

impl RecordingResource {
    pub fn new(inner: HostCompute) -> Self {
        Self {
            inner,
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }

    pub fn allocations(&self) -> Vec<usize> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Allocate { len, .. } => Some(len),
                _ => None,
            })
            .collect()
    }

    pub fn releases(&self) -> Vec<BufferHandle> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Release(handle) => Some(handle),
                _ => None,
            })
            .collect()
    }

    pub fn dispatches(&self) -> Vec<DispatchGrid> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Dispatch { grid, .. } => Some(grid),
                _ => None,
            })
            .collect()
    }

    pub fn published(&self, name: ShapeName) -> Option<Vec<u32>> {
        self.events().into_iter().rev().find_map(|e| match e {
            Event::SetInts { name: n, values } if n == name => Some(values),
            _ => None,
        })
    }

    fn record(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

impl ComputeResource for RecordingResource {
    fn find_kernel(&self, name: &str) -> Result<KernelHandle, DispatchError> {
        self.inner.find_kernel(name)
    }

    fn kernel_name(&self, kernel: KernelHandle) -> String {
        self.inner.kernel_name(kernel)
    }

    fn thread_group_size(&self, kernel: KernelHandle) -> Result<ThreadGroupSize, DispatchError> {
        self.inner.thread_group_size(kernel)
    }

    fn allocate(&self, len: usize) -> Result<BufferHandle, DispatchError> {
        let handle = self.inner.allocate(len)?;
        self.record(Event::Allocate { len, handle });
        Ok(handle)
    }

    fn upload(&self, buffer: BufferHandle, data: &[f32]) -> Result<(), DispatchError> {
        self.record(Event::Upload {
            handle: buffer,
            len: data.len(),
        });
        self.inner.upload(buffer, data)
    }

    fn download(&self, buffer: BufferHandle, out: &mut [f32]) -> Result<(), DispatchError> {
        self.record(Event::Download { handle: buffer });
        self.inner.download(buffer, out)
    }

    fn release(&self, buffer: BufferHandle) {
        self.record(Event::Release(buffer));
        self.inner.release(buffer)
    }

    fn set_buffer(
        &self,
        kernel: KernelHandle,
        role: BufferRole,
        buffer: BufferHandle,
    ) -> Result<(), DispatchError> {
        self.record(Event::SetBuffer {
            role,
            handle: buffer,
        });
        self.inner.set_buffer(kernel, role, buffer)
    }

    fn set_ints(&self, name: ShapeName, values: &[u32]) -> Result<(), DispatchError> {
        self.record(Event::SetInts {
            name,
            values: values.to_vec(),
        });
        self.inner.set_ints(name, values)
    }

    fn dispatch(&self, kernel: KernelHandle, grid: DispatchGrid) -> Result<(), DispatchError> {
        self.record(Event::Dispatch {
            kernel: self.inner.kernel_name(kernel),
            grid,
        });
        self.inner.dispatch(kernel, grid)
    }
}

pub fn host() -> HostCompute {
    HostCompute::with_config(HostComputeConfig {
        threads: 2,
        ..Default::default()
    })
    .unwrap()
}

pub fn recording(host: HostCompute) -> (Arc<RecordingResource>, KernelDispatcher<RecordingResource>) {
    init_logging();
    let resource = Arc::new(RecordingResource::new(host));
    let dispatcher = KernelDispatcher::new(Arc::clone(&resource));
    (resource, dispatcher)
}
