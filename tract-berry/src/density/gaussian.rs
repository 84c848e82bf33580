//! 可分离的三维高斯平滑 (反射边界).

use ndarray::{Array3, ArrayView1, ArrayViewMut1, Axis, Zip};

use crate::consts::density::GAUSSIAN_TRUNCATE;

/// 归一化的一维高斯核, 长度为 `2r + 1`, 其中 `r = (truncate * sigma + 0.5)` 向下取整.
///
/// `sigma <= 0` 时返回 `[1.0]`.
pub fn gaussian_kernel(sigma: f64, truncate: f64) -> Vec<f64> {
    if !(sigma > 0.0) {
        return vec![1.0];
    }
    let radius = (truncate * sigma + 0.5) as isize;
    let weights: Vec<f64> = (-radius..=radius)
        .map(|x| (-0.5 * (x * x) as f64 / (sigma * sigma)).exp())
        .collect();
    let sum: f64 = weights.iter().sum();
    weights.into_iter().map(|w| w / sum).collect()
}

/// 反射边界下的下标: `d c b a | a b c d | d c b a`.
#[inline]
fn reflect(i: isize, n: usize) -> usize {
    let m = i.rem_euclid(2 * n as isize) as usize;
    if m >= n {
        2 * n - 1 - m
    } else {
        m
    }
}

/// 一维卷积.
fn convolve_lane(src: ArrayView1<f64>, mut dst: ArrayViewMut1<f64>, kernel: &[f64]) {
    let n = src.len();
    let r = (kernel.len() / 2) as isize;
    for (i, out) in dst.iter_mut().enumerate() {
        *out = kernel
            .iter()
            .enumerate()
            .map(|(k, w)| w * src[reflect(i as isize + k as isize - r, n)])
            .sum();
    }
}

/// 以标准差 `sigma` (单位: 体素, 各轴相同) 对 `data` 做高斯平滑, 核在 4 sigma 处截断.
///
/// 中间结果以 `f64` 计算. `sigma <= 0` 时原样返回.
pub fn gaussian_filter(data: &Array3<f32>, sigma: f64) -> Array3<f32> {
    let kernel = gaussian_kernel(sigma, GAUSSIAN_TRUNCATE);
    if kernel.len() == 1 || data.is_empty() {
        return data.clone();
    }

    let mut src = data.mapv(f64::from);
    let mut dst = Array3::<f64>::zeros(data.raw_dim());
    for axis in 0..3 {
        let zip = Zip::from(dst.lanes_mut(Axis(axis))).and(src.lanes(Axis(axis)));
        #[cfg(feature = "rayon")]
        zip.par_for_each(|o, i| convolve_lane(i, o, &kernel));
        #[cfg(not(feature = "rayon"))]
        zip.for_each(|o, i| convolve_lane(i, o, &kernel));
        std::mem::swap(&mut src, &mut dst);
    }
    src.mapv(|v| v as f32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kernel() {
        let k = gaussian_kernel(0.5, 4.0);
        // r = int(4 * 0.5 + 0.5) = 2.
        assert_eq!(k.len(), 5);
        assert!((k.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!((k[0] - k[4]).abs() < 1e-15 && k[2] > k[1]);
        assert_eq!(gaussian_kernel(0.0, 4.0), vec![1.0]);
        assert_eq!(gaussian_kernel(-1.0, 4.0), vec![1.0]);
    }

    #[test]
    fn test_reflect() {
        let idx: Vec<usize> = (-3..7).map(|i| reflect(i, 4)).collect();
        assert_eq!(idx, vec![2, 1, 0, 0, 1, 2, 3, 3, 2, 1]);
        assert_eq!(reflect(-1, 1), 0);
        assert_eq!(reflect(5, 1), 0);
    }

    #[test]
    fn test_zero_sigma_is_identity() {
        let data = Array3::from_shape_fn((3, 4, 5), |(i, j, k)| (i * 20 + j * 5 + k) as f32);
        assert_eq!(gaussian_filter(&data, 0.0), data);
    }

    #[test]
    fn test_mass_is_preserved() {
        // 反射边界下总质量不变.
        let mut data = Array3::zeros((5, 6, 7));
        data[(0, 0, 0)] = 10.0f32;
        data[(2, 3, 4)] = 5.0;
        let out = gaussian_filter(&data, 0.5);
        assert!((out.sum() - 15.0).abs() < 1e-4);
        assert!(out[(2, 3, 4)] < 5.0 && out[(2, 3, 5)] > 0.0);
        assert!(out.iter().all(|v| *v >= 0.0));
    }

    #[test]
    fn test_constant_is_unchanged() {
        let data = Array3::from_elem((4, 4, 4), 2.5f32);
        let out = gaussian_filter(&data, 1.0);
        assert!(out.iter().all(|v| (v - 2.5).abs() < 1e-5));
    }

    #[test]
    fn test_single_voxel_axis() {
        let data = Array3::from_shape_fn((1, 3, 1), |(_, j, _)| j as f32);
        let out = gaussian_filter(&data, 0.5);
        assert_eq!(out.dim(), (1, 3, 1));
        assert!((out.sum() - 3.0).abs() < 1e-5);
    }
}
