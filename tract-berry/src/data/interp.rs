//! 连续体素坐标上的三线性插值.
//!
//! 体素 `(i, j, k)` 的中心位于连续坐标 `(i, j, k)`. 合法的连续坐标范围是每个轴上的
//! `[-0.5, dim - 0.5)`; 在该范围内但超出最外层体素中心的位置, 沿用最外层体素的值.

use glam::DVec3;
use ndarray::{ArrayView3, ArrayView4, Axis};

use crate::Idx3d;

/// 三线性插值的 8 个角点及其权重.
pub type Corners = [(Idx3d, f64); 8];

/// 计算连续体素坐标 `p` 在形状为 `shape` 的网格上的插值角点.
///
/// 若 `p` 在合法范围外 (或含 NaN), 返回 `None`.
pub fn corners(shape: Idx3d, p: DVec3) -> Option<Corners> {
    let dims = [shape.0, shape.1, shape.2];
    let q = p.to_array();
    let mut lo = [0usize; 3];
    let mut hi = [0usize; 3];
    let mut frac = [0.0f64; 3];
    for axis in 0..3 {
        let n = dims[axis];
        // NaN 在这里同样会被拒绝.
        if !(q[axis] >= -0.5 && q[axis] < n as f64 - 0.5) {
            return None;
        }
        let f = q[axis].floor();
        frac[axis] = q[axis] - f;
        let f = f as isize;
        lo[axis] = f.max(0) as usize;
        hi[axis] = ((f + 1).max(0) as usize).min(n - 1);
    }

    let mut out = [((0, 0, 0), 0.0); 8];
    for (n, slot) in out.iter_mut().enumerate() {
        let pick = |axis: usize| -> (usize, f64) {
            if n >> axis & 1 == 1 {
                (hi[axis], frac[axis])
            } else {
                (lo[axis], 1.0 - frac[axis])
            }
        };
        let (i, wi) = pick(0);
        let (j, wj) = pick(1);
        let (k, wk) = pick(2);
        *slot = ((i, j, k), wi * wj * wk);
    }
    Some(out)
}

/// 在连续体素坐标 `p` 处三线性插值标量场 `data`. 越界时返回 `None`.
pub fn trilinear(data: &ArrayView3<f32>, p: DVec3) -> Option<f64> {
    let c = corners(data.dim(), p)?;
    Some(c.iter().map(|&(idx, w)| w * data[idx] as f64).sum())
}

/// 在连续体素坐标 `p` 处三线性插值 4D 场 `data` 的最后一维, 结果写入 `out`.
///
/// 越界时返回 `false`, 此时 `out` 全为 0. `out` 的长度必须等于最后一维长度.
pub fn trilinear_lane(data: &ArrayView4<f32>, p: DVec3, out: &mut [f64]) -> bool {
    debug_assert_eq!(out.len(), data.len_of(Axis(3)));
    out.fill(0.0);
    let (x, y, z, _) = data.dim();
    let Some(c) = corners((x, y, z), p) else {
        return false;
    };
    for ((i, j, k), w) in c {
        if w == 0.0 {
            continue;
        }
        let lane = data.slice(ndarray::s![i, j, k, ..]);
        for (o, &v) in out.iter_mut().zip(lane.iter()) {
            *o += w * v as f64;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array3, Array4};

    fn f64_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_weights_sum_to_one() {
        for p in [
            DVec3::new(0.3, 1.7, 2.2),
            DVec3::new(-0.49, 0.0, 3.49),
            DVec3::new(2.0, 2.0, 2.0),
        ] {
            let c = corners((3, 3, 4), p).unwrap();
            assert!(f64_eq(c.iter().map(|(_, w)| w).sum(), 1.0));
        }
    }

    #[test]
    fn test_out_of_range() {
        assert!(corners((3, 3, 3), DVec3::new(-0.51, 0.0, 0.0)).is_none());
        assert!(corners((3, 3, 3), DVec3::new(0.0, 2.5, 0.0)).is_none());
        assert!(corners((3, 3, 3), DVec3::new(0.0, 0.0, f64::NAN)).is_none());
        assert!(corners((0, 3, 3), DVec3::ZERO).is_none());
    }

    #[test]
    fn test_trilinear_linear_field() {
        // f(i, j, k) = i + 2j + 3k, 三线性插值在内部应当精确.
        let data = Array3::from_shape_fn((4, 4, 4), |(i, j, k)| (i + 2 * j + 3 * k) as f32);
        let v = trilinear(&data.view(), DVec3::new(1.25, 0.5, 2.75)).unwrap();
        assert!(f64_eq(v, 1.25 + 1.0 + 8.25));
        // 边界外半个体素内沿用边界值.
        let v = trilinear(&data.view(), DVec3::new(-0.4, 0.0, 0.0)).unwrap();
        assert!(f64_eq(v, 0.0));
    }

    #[test]
    fn test_trilinear_lane() {
        let data = Array4::from_shape_fn((2, 2, 2, 2), |(i, _, _, n)| (i * (n + 1)) as f32);
        let mut out = [0.0; 2];
        assert!(trilinear_lane(&data.view(), DVec3::new(0.5, 0.5, 0.5), &mut out));
        assert!(f64_eq(out[0], 0.5) && f64_eq(out[1], 1.0));
        assert!(!trilinear_lane(&data.view(), DVec3::new(5.0, 0.5, 0.5), &mut out));
        assert_eq!(out, [0.0, 0.0]);
    }
}
