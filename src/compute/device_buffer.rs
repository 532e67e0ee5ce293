use log::trace;

use crate::error::DispatchError;

use super::resource::{BufferHandle, ComputeResource};

// Released on drop, including every `?` exit out of an invocation
pub struct DeviceBuffer<'r, R: ComputeResource + ?Sized> {
    resource: &'r R,
    handle: BufferHandle,
    len: usize,
}

impl<'r, R: ComputeResource + ?Sized> DeviceBuffer<'r, R> {
    pub fn allocate(resource: &'r R, len: usize) -> Result<Self, DispatchError> {
        let handle = resource.allocate(len)?;
        trace!("allocated device buffer {} ({} floats)", handle, len);

        Ok(Self {
            resource,
            handle,
            len,
        })
    }

    // Allocate sized to `data` and copy it in
    pub fn upload(resource: &'r R, data: &[f32]) -> Result<Self, DispatchError> {
        let buffer = Self::allocate(resource, data.len())?;
        buffer.write(data)?;
        Ok(buffer)
    }

    pub fn write(&self, data: &[f32]) -> Result<(), DispatchError> {
        if data.len() != self.len {
            return Err(DispatchError::BufferSize {
                handle: self.handle.0,
                capacity: self.len,
                len: data.len(),
            });
        }
        self.resource.upload(self.handle, data)
    }

    pub fn read_into(&self, out: &mut [f32]) -> Result<(), DispatchError> {
        if out.len() != self.len {
            return Err(DispatchError::BufferSize {
                handle: self.handle.0,
                capacity: self.len,
                len: out.len(),
            });
        }
        self.resource.download(self.handle, out)
    }

    pub fn handle(&self) -> BufferHandle {
        self.handle
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl<R: ComputeResource + ?Sized> Drop for DeviceBuffer<'_, R> {
    fn drop(&mut self) {
        trace!("releasing device buffer {}", self.handle);
        self.resource.release(self.handle);
    }
}
