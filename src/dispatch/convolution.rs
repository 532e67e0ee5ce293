use log::debug;

use crate::compute::device_buffer::DeviceBuffer;
use crate::compute::resource::{BufferRole, ComputeResource, DispatchGrid, GridAxis, ShapeName};
use crate::error::DispatchError;
use crate::tensor::{shape_to_u32, Tensor};

use super::dispatcher::KernelDispatcher;
use super::grid::groups_along;

// Stride of every convolution kernel in the generator
pub const SAMPLING_FACTOR: usize = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConvolutionMode {
    // Strided convolution, halves height and width
    Forward,
    // Transposed convolution, doubles height and width
    Backward,
}

impl ConvolutionMode {
    // Filter axis holding the output channel count. Transposed filters are
    // laid out [kh, kw, out, in], forward filters [kh, kw, in, out].
    pub fn output_channel_axis(&self) -> usize {
        match self {
            ConvolutionMode::Forward => 3,
            ConvolutionMode::Backward => 2,
        }
    }
}

pub fn convolution_output_shape(
    mode: ConvolutionMode,
    input_shape: [usize; 3],
    filter_shape: &[usize],
) -> Result<[usize; 3], DispatchError> {
    if filter_shape.len() != 4 {
        return Err(DispatchError::FilterRank(filter_shape.to_vec()));
    }

    let [in_height, in_width, _] = input_shape;
    let out_channels = filter_shape[mode.output_channel_axis()];

    let (out_height, out_width) = match mode {
        ConvolutionMode::Forward => (in_height / SAMPLING_FACTOR, in_width / SAMPLING_FACTOR),
        ConvolutionMode::Backward => (
            in_height
                .checked_mul(SAMPLING_FACTOR)
                .ok_or(DispatchError::ShapeOverflow(in_height))?,
            in_width
                .checked_mul(SAMPLING_FACTOR)
                .ok_or(DispatchError::ShapeOverflow(in_width))?,
        ),
    };

    Ok([out_height, out_width, out_channels])
}

impl<R: ComputeResource + ?Sized> KernelDispatcher<R> {
    // Group (gx, gy, gz) covers (output channels, output width, output height)
    pub fn invoke_convolution(
        &self,
        mode: ConvolutionMode,
        name: &str,
        input: &Tensor,
        filter: &Tensor,
        bias: &Tensor,
    ) -> Result<Tensor, DispatchError> {
        let (kernel, group) = self.resolve(name)?;

        let out_shape = convolution_output_shape(mode, input.dims3()?, filter.shape())?;
        let [out_height, out_width, out_channels] = out_shape;

        let grid = DispatchGrid::new(
            groups_along(name, "output channels", GridAxis::X, out_channels, group.x)?,
            groups_along(name, "output width", GridAxis::Y, out_width, group.y)?,
            groups_along(name, "output height", GridAxis::Z, out_height, group.z)?,
        );

        let input_shape = input.shape_u32()?;
        let filter_shape = filter.shape_u32()?;
        let output_shape = shape_to_u32(&out_shape)?;

        let mut output = Tensor::new(out_shape.to_vec());

        let resource = &*self.resource;
        let buffer_input = DeviceBuffer::upload(resource, input.data())?;
        let buffer_filter = DeviceBuffer::upload(resource, filter.data())?;
        let buffer_bias = DeviceBuffer::upload(resource, bias.data())?;
        let buffer_output = DeviceBuffer::allocate(resource, output.len())?;

        resource.set_ints(ShapeName::InputShape, &input_shape)?;
        resource.set_ints(ShapeName::FilterShape, &filter_shape)?;
        resource.set_ints(ShapeName::OutputShape, &output_shape)?;

        resource.set_buffer(kernel, BufferRole::Input, buffer_input.handle())?;
        resource.set_buffer(kernel, BufferRole::Filter, buffer_filter.handle())?;
        resource.set_buffer(kernel, BufferRole::Bias, buffer_bias.handle())?;
        resource.set_buffer(kernel, BufferRole::Output, buffer_output.handle())?;

        debug!(
            "dispatch {} ({:?}) {:?} -> {:?} group {} grid {}",
            name,
            mode,
            input.shape(),
            out_shape,
            group,
            grid
        );
        resource.dispatch(kernel, grid)?;

        buffer_output.read_into(output.data_mut())?;

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::host::kernels::{CONV2D, TRANS_CONV2D, TRANS_CONV2D_FINAL};
    use crate::host::{HostCompute, HostComputeConfig};

    fn dispatcher() -> KernelDispatcher<HostCompute> {
        let host = HostCompute::with_config(HostComputeConfig {
            threads: 2,
            ..Default::default()
        })
        .unwrap();
        KernelDispatcher::new(Arc::new(host))
    }

    #[test]
    fn forward_halves_and_takes_last_filter_axis() {
        let shape = convolution_output_shape(ConvolutionMode::Forward, [8, 8, 4], &[3, 3, 4, 8]);
        assert_eq!(shape.unwrap(), [4, 4, 8]);
    }

    #[test]
    fn backward_doubles_and_takes_third_filter_axis() {
        let shape = convolution_output_shape(ConvolutionMode::Backward, [8, 8, 4], &[3, 3, 8, 4]);
        assert_eq!(shape.unwrap(), [16, 16, 8]);
    }

    #[test]
    fn odd_extents_floor_when_downsampling() {
        let shape = convolution_output_shape(ConvolutionMode::Forward, [9, 7, 1], &[4, 4, 1, 4]);
        assert_eq!(shape.unwrap(), [4, 3, 4]);
    }

    #[test]
    fn filter_must_be_rank_four() {
        assert!(matches!(
            convolution_output_shape(ConvolutionMode::Forward, [8, 8, 4], &[3, 3, 8]),
            Err(DispatchError::FilterRank(_))
        ));
    }

    #[test]
    fn one_by_one_forward_samples_even_pixels() {
        let dispatcher = dispatcher();
        let input = Tensor::from_vec(vec![8, 8, 1], (0..64).map(|i| i as f32).collect()).unwrap();
        // Identity taps into 4 output channels scaled 1..=4
        let filter = Tensor::from_vec(vec![1, 1, 1, 4], vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let bias = Tensor::from_vec(vec![4], vec![0.5; 4]).unwrap();

        let output = dispatcher
            .invoke_convolution(ConvolutionMode::Forward, CONV2D, &input, &filter, &bias)
            .unwrap();

        assert_eq!(output.shape(), &[4, 4, 4]);
        for y in 0..4 {
            for x in 0..4 {
                let source = ((2 * y) * 8 + 2 * x) as f32;
                for c in 0..4 {
                    let got = output.data()[(y * 4 + x) * 4 + c];
                    assert_eq!(got, source * (c + 1) as f32 + 0.5);
                }
            }
        }
        assert_eq!(dispatcher.resource().live_buffers(), 0);
    }

    #[test]
    fn one_by_one_backward_scatters_to_even_pixels() {
        let dispatcher = dispatcher();
        let input = Tensor::from_vec(vec![2, 2, 1], vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let filter = Tensor::filled(vec![1, 1, 4, 1], 1.0);
        let bias = Tensor::new(vec![4]);

        let output = dispatcher
            .invoke_convolution(ConvolutionMode::Backward, TRANS_CONV2D, &input, &filter, &bias)
            .unwrap();

        assert_eq!(output.shape(), &[4, 4, 4]);
        for y in 0..4 {
            for x in 0..4 {
                let expected = if y % 2 == 0 && x % 2 == 0 {
                    input.data()[(y / 2) * 2 + x / 2]
                } else {
                    0.0
                };
                for c in 0..4 {
                    assert_eq!(output.data()[(y * 4 + x) * 4 + c], expected);
                }
            }
        }
    }

    #[test]
    fn four_by_four_forward_matches_direct_sum() {
        let dispatcher = dispatcher();
        let input = Tensor::random(vec![8, 8, 2], 1);
        let filter = Tensor::random(vec![4, 4, 2, 4], 2);
        let bias = Tensor::random(vec![4], 3);

        let output = dispatcher
            .invoke_convolution(ConvolutionMode::Forward, CONV2D, &input, &filter, &bias)
            .unwrap();

        // Output (1, 2), channel 3; padding is one pixel on the leading edge
        let (oy, ox, oc) = (1usize, 2usize, 3usize);
        let mut expected = bias.data()[oc];
        for ky in 0..4 {
            for kx in 0..4 {
                let iy = (oy * 2 + ky) as isize - 1;
                let ix = (ox * 2 + kx) as isize - 1;
                if iy < 0 || ix < 0 || iy >= 8 || ix >= 8 {
                    continue;
                }
                for c in 0..2 {
                    let i = input.data()[(iy as usize * 8 + ix as usize) * 2 + c];
                    let f = filter.data()[((ky * 4 + kx) * 2 + c) * 4 + oc];
                    expected += i * f;
                }
            }
        }
        let got = output.data()[(oy * 4 + ox) * 4 + oc];
        assert!((got - expected).abs() < 1e-5, "got {} expected {}", got, expected);
    }

    #[test]
    fn final_layer_kernel_accepts_three_channels() {
        let dispatcher = dispatcher();
        let input = Tensor::random(vec![2, 2, 8], 4);
        let filter = Tensor::random(vec![4, 4, 3, 8], 5);
        let bias = Tensor::new(vec![3]);

        assert!(matches!(
            dispatcher.invoke_convolution(ConvolutionMode::Backward, TRANS_CONV2D, &input, &filter, &bias),
            Err(DispatchError::NotDivisible { dimension: "output channels", extent: 3, group: 4, .. })
        ));

        let output = dispatcher
            .invoke_convolution(ConvolutionMode::Backward, TRANS_CONV2D_FINAL, &input, &filter, &bias)
            .unwrap();
        assert_eq!(output.shape(), &[4, 4, 3]);
    }

    #[test]
    fn output_height_must_divide_group() {
        let dispatcher = dispatcher();
        // 12x16 downsamples to 6x8: width fits the group, height does not
        let input = Tensor::new(vec![12, 16, 1]);
        let filter = Tensor::new(vec![1, 1, 1, 4]);
        let bias = Tensor::new(vec![4]);

        assert!(matches!(
            dispatcher.invoke_convolution(ConvolutionMode::Forward, CONV2D, &input, &filter, &bias),
            Err(DispatchError::NotDivisible { axis: GridAxis::Z, extent: 6, .. })
        ));
        assert_eq!(dispatcher.resource().allocated_bytes(), 0);
    }
}
