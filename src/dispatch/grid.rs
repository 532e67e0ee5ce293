use crate::compute::resource::{GridAxis, ThreadGroupSize};
use crate::error::DispatchError;

// Extent must be an exact multiple of the group size
pub fn groups_along(
    kernel: &str,
    dimension: &'static str,
    axis: GridAxis,
    extent: usize,
    group: u32,
) -> Result<u32, DispatchError> {
    let not_divisible = || DispatchError::NotDivisible {
        kernel: kernel.to_string(),
        dimension,
        axis,
        extent,
        group,
    };

    if group == 0 || extent % group as usize != 0 {
        return Err(not_divisible());
    }

    u32::try_from(extent / group as usize).map_err(|_| DispatchError::ShapeOverflow(extent))
}

pub fn ensure_nonzero_group(kernel: &str, group: ThreadGroupSize) -> Result<(), DispatchError> {
    if group.x == 0 || group.y == 0 || group.z == 0 {
        return Err(DispatchError::InvalidThreadGroup {
            kernel: kernel.to_string(),
            group,
            reason: "every axis needs at least one lane",
        });
    }
    Ok(())
}
