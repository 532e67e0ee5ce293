pub mod device_buffer;
pub mod resource;

pub use device_buffer::DeviceBuffer;
pub use resource::{
    BufferHandle, BufferRole, ComputeResource, DispatchGrid, GridAxis, KernelHandle, ShapeName,
    ThreadGroupSize,
};
