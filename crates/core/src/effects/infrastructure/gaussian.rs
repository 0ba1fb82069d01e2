/// Precompute a normalized 1D Gaussian kernel spanning `radius` pixels on
/// each side (`2 * radius + 1` taps).
///
/// Sigma is `kernel_size / 6.0`, so the kernel covers roughly ±3 sigma.
pub fn gaussian_kernel_1d(radius: usize) -> Vec<f32> {
    let kernel_size = 2 * radius + 1;
    let sigma = kernel_size as f64 / 6.0;
    let mut kernel: Vec<f64> = (0..kernel_size)
        .map(|i| {
            let x = i as f64 - radius as f64;
            (-x * x / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let sum: f64 = kernel.iter().sum();
    for v in &mut kernel {
        *v /= sum;
    }
    kernel.iter().map(|&v| v as f32).collect()
}

/// Separable Gaussian blur over a tightly packed block, in place.
///
/// Samples beyond the block edge are clamped to the edge pixel, so the
/// block never reads pixels outside itself. `temp` is reused across calls.
pub fn blur_block(
    data: &mut [u8],
    width: usize,
    height: usize,
    channels: usize,
    kernel: &[f32],
    temp: &mut Vec<f32>,
) {
    if kernel.len() <= 1 || width == 0 || height == 0 {
        return;
    }
    let half = (kernel.len() / 2) as isize;
    temp.clear();
    temp.resize(width * height * channels, 0.0);

    // Horizontal pass: data → temp
    for y in 0..height {
        let row = y * width;
        for x in 0..width {
            for c in 0..channels {
                let mut sum = 0.0f32;
                for (k, &w) in kernel.iter().enumerate() {
                    let sx = clamp_index(x as isize + k as isize - half, width);
                    sum += data[(row + sx) * channels + c] as f32 * w;
                }
                temp[(row + x) * channels + c] = sum;
            }
        }
    }

    // Vertical pass: temp → data
    for y in 0..height {
        for x in 0..width {
            for c in 0..channels {
                let mut sum = 0.0f32;
                for (k, &w) in kernel.iter().enumerate() {
                    let sy = clamp_index(y as isize + k as isize - half, height);
                    sum += temp[(sy * width + x) * channels + c] * w;
                }
                data[(y * width + x) * channels + c] = sum.round().clamp(0.0, 255.0) as u8;
            }
        }
    }
}

fn clamp_index(i: isize, len: usize) -> usize {
    i.clamp(0, len as isize - 1) as usize
}
