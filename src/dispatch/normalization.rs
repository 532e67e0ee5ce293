use log::debug;

use crate::compute::device_buffer::DeviceBuffer;
use crate::compute::resource::{BufferRole, ComputeResource, DispatchGrid, GridAxis, ShapeName};
use crate::error::DispatchError;
use crate::tensor::Tensor;

use super::dispatcher::KernelDispatcher;
use super::grid::groups_along;

impl<R: ComputeResource + ?Sized> KernelDispatcher<R> {
    // One lane per channel, so only gx partitions the dispatch
    pub fn invoke_normalization(
        &self,
        name: &str,
        input: &Tensor,
        scale: &Tensor,
        offset: &Tensor,
    ) -> Result<Tensor, DispatchError> {
        let (kernel, group) = self.resolve(name)?;

        let [_, _, channels] = input.dims3()?;
        let groups = groups_along(name, "channels", GridAxis::X, channels, group.x)?;

        if scale.len() != channels {
            return Err(DispatchError::ParameterLength {
                param: "scale",
                expected: channels,
                actual: scale.len(),
            });
        }
        if offset.len() != channels {
            return Err(DispatchError::ParameterLength {
                param: "offset",
                expected: channels,
                actual: offset.len(),
            });
        }

        let shape = input.shape_u32()?;
        let grid = DispatchGrid::new(groups, 1, 1);

        let resource = &*self.resource;
        let buffer_input = DeviceBuffer::upload(resource, input.data())?;
        let buffer_scale = DeviceBuffer::upload(resource, scale.data())?;
        let buffer_offset = DeviceBuffer::upload(resource, offset.data())?;
        let buffer_output = DeviceBuffer::allocate(resource, input.len())?;

        // Same shape in and out
        resource.set_ints(ShapeName::InputShape, &shape)?;
        resource.set_ints(ShapeName::OutputShape, &shape)?;

        resource.set_buffer(kernel, BufferRole::Input, buffer_input.handle())?;
        resource.set_buffer(kernel, BufferRole::Filter, buffer_scale.handle())?;
        resource.set_buffer(kernel, BufferRole::Bias, buffer_offset.handle())?;
        resource.set_buffer(kernel, BufferRole::Output, buffer_output.handle())?;

        debug!("dispatch {} group {} grid {}", name, group, grid);
        resource.dispatch(kernel, grid)?;

        let mut output = Tensor::new(input.shape().to_vec());
        buffer_output.read_into(output.data_mut())?;

        Ok(output)
    }
}
