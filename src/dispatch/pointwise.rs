use log::debug;

use crate::compute::device_buffer::DeviceBuffer;
use crate::compute::resource::{BufferRole, ComputeResource, DispatchGrid, GridAxis};
use crate::error::DispatchError;
use crate::tensor::Tensor;

use super::dispatcher::KernelDispatcher;
use super::grid::groups_along;

impl<R: ComputeResource + ?Sized> KernelDispatcher<R> {
    pub fn invoke_function(&self, name: &str, input: &Tensor) -> Result<Tensor, DispatchError> {
        let (kernel, group) = self.resolve(name)?;

        if group.y != 1 || group.z != 1 {
            return Err(DispatchError::InvalidThreadGroup {
                kernel: name.to_string(),
                group,
                reason: "pointwise kernels must be one dimensional",
            });
        }

        let length = input.len();
        let groups = groups_along(name, "elements", GridAxis::X, length, group.x)?;
        let grid = DispatchGrid::new(groups, 1, 1);

        let resource = &*self.resource;
        let buffer_input = DeviceBuffer::upload(resource, input.data())?;
        let buffer_output = DeviceBuffer::allocate(resource, length)?;

        resource.set_buffer(kernel, BufferRole::Input, buffer_input.handle())?;
        resource.set_buffer(kernel, BufferRole::Output, buffer_output.handle())?;

        debug!("dispatch {} group {} grid {}", name, group, grid);
        resource.dispatch(kernel, grid)?;

        let mut output = Tensor::new(input.shape().to_vec());
        buffer_output.read_into(output.data_mut())?;

        Ok(output)
    }
}
