use std::sync::Arc;

use crate::compute::resource::{ComputeResource, KernelHandle, ThreadGroupSize};
use crate::error::DispatchError;

use super::grid::ensure_nonzero_group;

// Nothing is cached between invocations
pub struct KernelDispatcher<R: ComputeResource + ?Sized> {
    pub(super) resource: Arc<R>,
}

impl<R: ComputeResource + ?Sized> KernelDispatcher<R> {
    pub fn new(resource: Arc<R>) -> Self {
        Self { resource }
    }

    pub fn resource(&self) -> &Arc<R> {
        &self.resource
    }

    // Name lookup plus the kernel's fixed group size
    pub(super) fn resolve(
        &self,
        name: &str,
    ) -> Result<(KernelHandle, ThreadGroupSize), DispatchError> {
        let kernel = self.resource.find_kernel(name)?;
        let group = self.resource.thread_group_size(kernel)?;
        ensure_nonzero_group(name, group)?;
        Ok((kernel, group))
    }
}

impl<R: ComputeResource + ?Sized> Clone for KernelDispatcher<R> {
    fn clone(&self) -> Self {
        Self {
            resource: Arc::clone(&self.resource),
        }
    }
}
