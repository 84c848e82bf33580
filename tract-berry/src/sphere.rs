//! 离散单位球面.
//!
//! 方向场的 PMF 定义在一组固定的球面顶点上. 默认球面由对称 Fibonacci
//! 点阵生成: 先在上半球均匀取点, 再补上它们的对踵点, 因此顶点数为偶数,
//! 且第 `i` 个顶点与第 `i + n/2` 个顶点互为对踵点.
//!
//! 默认球面只用于在其上求值球谐系数. 离散 PMF 的每个值都绑定在拟合时所用球面的
//! 某个顶点上, 必须以 [`Sphere::open`] 读入同一张顶点表.

use std::path::Path;

use glam::DVec3;
use ndarray::{Array2, ArrayView2};
use ndarray_npy::read_npy;
use once_cell::sync::Lazy;

use crate::consts::DEFAULT_SPHERE_PAIRS;
use crate::{TrackError, TrackResult};

/// 离散单位球面. 所有顶点都已经单位化.
#[derive(Debug, Clone, PartialEq)]
pub struct Sphere {
    vertices: Vec<DVec3>,
}

static DEFAULT_SPHERE: Lazy<Sphere> =
    Lazy::new(|| Sphere::symmetric_fibonacci(DEFAULT_SPHERE_PAIRS));

impl Sphere {
    /// 以给定顶点创建球面. 顶点会被单位化.
    ///
    /// 若存在零向量或非有限值顶点, 或者没有任何顶点, 返回 `Err(TrackError::EmptySphere)`.
    pub fn new(vertices: Vec<DVec3>) -> TrackResult<Self> {
        if vertices.is_empty() {
            return Err(TrackError::EmptySphere);
        }
        let vertices = vertices
            .into_iter()
            .map(|v| v.try_normalize().ok_or(TrackError::EmptySphere))
            .collect::<TrackResult<Vec<_>>>()?;
        Ok(Self { vertices })
    }

    /// 生成 `pairs` 对对踵点组成的对称 Fibonacci 球面, 共 `2 * pairs` 个顶点.
    ///
    /// `pairs == 0` 时 panic.
    pub fn symmetric_fibonacci(pairs: usize) -> Self {
        assert_ne!(pairs, 0);
        let golden = std::f64::consts::PI * (3.0 - 5f64.sqrt());
        let mut vertices = Vec::with_capacity(pairs * 2);
        for i in 0..pairs {
            let z = 1.0 - (i as f64 + 0.5) / pairs as f64;
            let r = (1.0 - z * z).max(0.0).sqrt();
            let phi = golden * i as f64;
            vertices.push(DVec3::new(r * phi.cos(), r * phi.sin(), z));
        }
        let upper = vertices.clone();
        vertices.extend(upper.into_iter().map(|v| -v));
        Self { vertices }
    }

    /// 以 `n x 3` 的顶点坐标矩阵创建球面, 每行一个顶点 `(x, y, z)`.
    ///
    /// 列数不为 3 时返回 `Err(TrackError::ShapeMismatch)`.
    pub fn from_array(vertices: ArrayView2<f64>) -> TrackResult<Self> {
        let (n, cols) = vertices.dim();
        if cols != 3 {
            return Err(TrackError::ShapeMismatch(vec![n, 3], vec![n, cols]));
        }
        Self::new(
            vertices
                .rows()
                .into_iter()
                .map(|r| DVec3::new(r[0], r[1], r[2]))
                .collect(),
        )
    }

    /// 打开 `.npy` 格式 (`float64`, 形状 `n x 3`) 的顶点表.
    ///
    /// 离散 PMF 的第 `i` 个值对应该表的第 `i` 行, 因此 PMF 场必须与拟合它时使用的
    /// 顶点表一同提供.
    pub fn open<P: AsRef<Path>>(path: P) -> TrackResult<Self> {
        let vertices: Array2<f64> = read_npy(path.as_ref())?;
        Self::from_array(vertices.view())
    }

    /// 默认球面 (724 个顶点). 全局只构建一次.
    #[inline]
    pub fn default_symmetric() -> &'static Sphere {
        &DEFAULT_SPHERE
    }

    /// 顶点.
    #[inline]
    pub fn vertices(&self) -> &[DVec3] {
        &self.vertices
    }

    /// 顶点个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    /// 是否没有顶点. 合法构造的球面总是返回 `false`.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// 每个顶点的球坐标 `(theta, phi)`. `theta` 为极角 (与 +z 的夹角),
    /// `phi` 为方位角.
    pub fn spherical_coords(&self) -> Vec<(f64, f64)> {
        self.vertices
            .iter()
            .map(|v| (v.z.clamp(-1.0, 1.0).acos(), v.y.atan2(v.x)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_sphere() {
        let s = Sphere::default_symmetric();
        assert_eq!(s.len(), 724);
        let half = s.len() / 2;
        for i in 0..half {
            let v = s.vertices()[i];
            assert!((v.length() - 1.0).abs() < 1e-12);
            assert!((v + s.vertices()[i + half]).length() < 1e-12);
        }
    }

    #[test]
    fn test_fibonacci_is_roughly_uniform() {
        // 均匀球面上各顶点的平均向量接近 0 (上半球则接近 (0, 0, 0.5)).
        let s = Sphere::symmetric_fibonacci(500);
        let upper: DVec3 = s.vertices()[..500].iter().copied().sum::<DVec3>() / 500.0;
        assert!(upper.x.abs() < 0.02 && upper.y.abs() < 0.02);
        assert!((upper.z - 0.5).abs() < 0.02);
    }

    #[test]
    fn test_invalid_vertices() {
        assert!(matches!(Sphere::new(vec![]), Err(TrackError::EmptySphere)));
        assert!(Sphere::new(vec![DVec3::X, DVec3::ZERO]).is_err());
        let s = Sphere::new(vec![DVec3::new(0.0, 3.0, 0.0)]).unwrap();
        assert_eq!(s.vertices()[0], DVec3::Y);
    }

    #[test]
    fn test_from_array_and_npy() {
        let table = ndarray::array![[0.0, 0.0, 2.0], [1.0, 1.0, 0.0], [-1.0, 0.0, 0.0]];
        let s = Sphere::from_array(table.view()).unwrap();
        assert_eq!(s.len(), 3);
        assert_eq!(s.vertices()[0], DVec3::Z);
        assert!((s.vertices()[1] - DVec3::new(1.0, 1.0, 0.0).normalize()).length() < 1e-15);

        let path = std::env::temp_dir().join(format!("tract-berry-sphere-{}.npy", std::process::id()));
        ndarray_npy::write_npy(&path, &table).unwrap();
        assert_eq!(Sphere::open(&path).unwrap(), s);
        std::fs::remove_file(&path).unwrap();

        let bad = ndarray::Array2::<f64>::zeros((4, 2));
        assert!(matches!(Sphere::from_array(bad.view()), Err(TrackError::ShapeMismatch(..))));
    }

    #[test]
    fn test_coords() {
        let s = Sphere::new(vec![DVec3::X, DVec3::Y, DVec3::Z]).unwrap();
        let c = s.spherical_coords();
        assert!((c[2].0).abs() < 1e-12);
        assert!((c[1].0 - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
        assert!((c[1].1 - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
    }
}
