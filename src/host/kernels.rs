use crate::compute::resource::{ShapeName, ThreadGroupSize};
use crate::dispatch::convolution::SAMPLING_FACTOR;
use crate::error::DispatchError;

use super::kernel::{fetch, HostKernel, KernelArgs, ThreadId};

// Kernel names registered by HostCompute when builtin kernels are enabled
pub const RELU: &str = "Relu";
pub const LEAKY_RELU: &str = "LeakyRelu";
pub const TANH: &str = "Tanh";
pub const BATCH_NORM: &str = "BatchNorm";
pub const CONV2D: &str = "Conv2D";
pub const TRANS_CONV2D: &str = "TransConv2D";
pub const TRANS_CONV2D_FINAL: &str = "TransConv2DFinal";

pub const POINTWISE_GROUP: ThreadGroupSize = ThreadGroupSize::new(64, 1, 1);
pub const NORMALIZATION_GROUP: ThreadGroupSize = ThreadGroupSize::new(4, 1, 1);
pub const CONVOLUTION_GROUP: ThreadGroupSize = ThreadGroupSize::new(4, 4, 4);
// The generator's last layer produces RGB
pub const FINAL_CONVOLUTION_GROUP: ThreadGroupSize = ThreadGroupSize::new(3, 4, 4);

pub const LEAKY_RELU_SLOPE: f32 = 0.2;
pub const BATCH_NORM_EPSILON: f32 = 1e-5;

pub fn builtin_kernels() -> Vec<HostKernel> {
    vec![
        pointwise(RELU, |x| x.max(0.0)),
        pointwise(LEAKY_RELU, |x| if x < 0.0 { x * LEAKY_RELU_SLOPE } else { x }),
        pointwise(TANH, f32::tanh),
        HostKernel::new(BATCH_NORM, NORMALIZATION_GROUP, batch_norm),
        HostKernel::new(CONV2D, CONVOLUTION_GROUP, conv2d),
        HostKernel::new(TRANS_CONV2D, CONVOLUTION_GROUP, trans_conv2d),
        HostKernel::new(TRANS_CONV2D_FINAL, FINAL_CONVOLUTION_GROUP, trans_conv2d),
    ]
}

pub fn pointwise<F>(name: &str, op: F) -> HostKernel
where
    F: Fn(f32) -> f32 + Send + Sync + 'static,
{
    HostKernel::new(name, POINTWISE_GROUP, move |args, id, out| {
        let input = args.input()?;
        let i = id.global[0] as usize;
        if i < input.len() {
            out.push((i, op(input[i])));
        }
        Ok(())
    })
}

// One lane per channel: statistics over the spatial extent, then scale/offset
fn batch_norm(
    args: &KernelArgs<'_>,
    id: ThreadId,
    out: &mut Vec<(usize, f32)>,
) -> Result<(), DispatchError> {
    let input = args.input()?;
    let scale = args.filter()?;
    let offset = args.bias()?;
    let [height, width, channels] = args.dims::<3>(ShapeName::InputShape)?;

    let c = id.global[0] as usize;
    let pixels = height * width;
    if c >= channels || pixels == 0 {
        return Ok(());
    }

    let mean = (0..pixels).map(|p| fetch(input, p * channels + c)).sum::<f32>() / pixels as f32;
    let variance = (0..pixels)
        .map(|p| {
            let d = fetch(input, p * channels + c) - mean;
            d * d
        })
        .sum::<f32>()
        / pixels as f32;
    let inv_std = 1.0 / (variance + BATCH_NORM_EPSILON).sqrt();

    let gain = fetch(scale, c);
    let shift = fetch(offset, c);
    out.extend((0..pixels).map(|p| {
        let i = p * channels + c;
        (i, gain * (fetch(input, i) - mean) * inv_std + shift)
    }));

    Ok(())
}

// Leading padding of a "same" strided convolution, never negative
fn leading_pad(taps: usize, stride: usize, large: usize, small: usize) -> isize {
    let needed = (small.saturating_sub(1) * stride + taps) as isize - large as isize;
    needed.max(0) / 2
}

// Filter [kh, kw, in, out]; lane (oc, ox, oy)
fn conv2d(
    args: &KernelArgs<'_>,
    id: ThreadId,
    out: &mut Vec<(usize, f32)>,
) -> Result<(), DispatchError> {
    let input = args.input()?;
    let filter = args.filter()?;
    let bias = args.bias()?;
    let [in_h, in_w, in_c] = args.dims::<3>(ShapeName::InputShape)?;
    let [kh, kw, f_in, f_out] = args.dims::<4>(ShapeName::FilterShape)?;
    let [out_h, out_w, out_c] = args.dims::<3>(ShapeName::OutputShape)?;

    if f_in != in_c {
        return Err(DispatchError::ChannelMismatch {
            expected: in_c,
            actual: f_in,
        });
    }

    let [oc, ox, oy] = id.global.map(|v| v as usize);
    if oc >= out_c || ox >= out_w || oy >= out_h {
        return Ok(());
    }

    let stride = SAMPLING_FACTOR;
    let pad_y = leading_pad(kh, stride, in_h, out_h);
    let pad_x = leading_pad(kw, stride, in_w, out_w);

    let mut acc = fetch(bias, oc);
    for ky in 0..kh {
        let iy = (oy * stride + ky) as isize - pad_y;
        if iy < 0 || iy as usize >= in_h {
            continue;
        }
        for kx in 0..kw {
            let ix = (ox * stride + kx) as isize - pad_x;
            if ix < 0 || ix as usize >= in_w {
                continue;
            }
            let pixel = (iy as usize * in_w + ix as usize) * in_c;
            let tap = (ky * kw + kx) * f_in;
            for c in 0..in_c {
                acc += fetch(input, pixel + c) * fetch(filter, (tap + c) * f_out + oc);
            }
        }
    }

    out.push(((oy * out_w + ox) * out_c + oc, acc));
    Ok(())
}

// Filter [kh, kw, out, in]; gathers every input pixel that scatters onto (oy, ox)
fn trans_conv2d(
    args: &KernelArgs<'_>,
    id: ThreadId,
    out: &mut Vec<(usize, f32)>,
) -> Result<(), DispatchError> {
    let input = args.input()?;
    let filter = args.filter()?;
    let bias = args.bias()?;
    let [in_h, in_w, in_c] = args.dims::<3>(ShapeName::InputShape)?;
    let [kh, kw, f_out, f_in] = args.dims::<4>(ShapeName::FilterShape)?;
    let [out_h, out_w, out_c] = args.dims::<3>(ShapeName::OutputShape)?;

    if f_in != in_c {
        return Err(DispatchError::ChannelMismatch {
            expected: in_c,
            actual: f_in,
        });
    }

    let [oc, ox, oy] = id.global.map(|v| v as usize);
    if oc >= out_c || ox >= out_w || oy >= out_h {
        return Ok(());
    }

    let stride = SAMPLING_FACTOR as isize;
    let pad_y = leading_pad(kh, SAMPLING_FACTOR, out_h, in_h);
    let pad_x = leading_pad(kw, SAMPLING_FACTOR, out_w, in_w);

    let mut acc = fetch(bias, oc);
    for ky in 0..kh {
        let ty = oy as isize + pad_y - ky as isize;
        if ty < 0 || ty % stride != 0 || (ty / stride) as usize >= in_h {
            continue;
        }
        let iy = (ty / stride) as usize;
        for kx in 0..kw {
            let tx = ox as isize + pad_x - kx as isize;
            if tx < 0 || tx % stride != 0 || (tx / stride) as usize >= in_w {
                continue;
            }
            let ix = (tx / stride) as usize;
            let pixel = (iy * in_w + ix) * in_c;
            let tap = (ky * kw + kx) * f_out + oc;
            for c in 0..in_c {
                acc += fetch(input, pixel + c) * fetch(filter, tap * f_in + c);
            }
        }
    }

    out.push(((oy * out_w + ox) * out_c + oc, acc));
    Ok(())
}
