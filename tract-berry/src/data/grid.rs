//! 体素网格: 形状 + 仿射矩阵.

use glam::{DMat4, DVec3, DVec4};
use nifti::NiftiHeader;

use crate::{Idx3d, TrackError, TrackResult};

/// 两个仿射矩阵逐元素允许的最大误差. NIfTI header 以 `f32` 存储仿射矩阵,
/// 因此不能要求完全相等.
const AFFINE_TOLERANCE: f64 = 1e-4;

/// 体素网格. 描述体数据的形状, 以及体素索引 `(i, j, k)` 到物理空间
/// (RAS, 毫米) 的仿射变换.
///
/// 同一次运行中的所有体数据必须共享同一个网格.
#[derive(Debug, Clone, PartialEq)]
pub struct VoxelGrid {
    shape: Idx3d,
    affine: DMat4,
    inverse: DMat4,
}

/// 按行给出 4x4 矩阵.
#[inline]
fn from_rows(rows: [[f64; 4]; 4]) -> DMat4 {
    DMat4::from_cols_array_2d(&rows).transpose()
}

impl VoxelGrid {
    /// 以形状 `shape` 和仿射矩阵 `affine` 创建网格.
    ///
    /// 仿射矩阵不可逆时返回 `Err(TrackError::SingularAffine)`.
    pub fn new(shape: Idx3d, affine: DMat4) -> TrackResult<Self> {
        let det = affine.determinant();
        if !det.is_finite() || det.abs() < 1e-12 {
            return Err(TrackError::SingularAffine);
        }
        Ok(Self {
            shape,
            affine,
            inverse: affine.inverse(),
        })
    }

    /// 以单位矩阵为仿射矩阵 (1 毫米各向同性, 原点在体素 `(0, 0, 0)`) 创建网格.
    #[inline]
    pub fn identity(shape: Idx3d) -> Self {
        Self {
            shape,
            affine: DMat4::IDENTITY,
            inverse: DMat4::IDENTITY,
        }
    }

    /// 从 nifti header 读取形状与仿射矩阵.
    ///
    /// 仿射矩阵的选取顺序与常见工具一致: `sform_code > 0` 时使用 sform,
    /// 否则 `qform_code > 0` 时使用四元数 qform, 否则退化为仅由 `pixdim` 缩放的对角阵.
    pub fn from_header(h: &NiftiHeader) -> TrackResult<Self> {
        let [_, x, y, z, ..] = h.dim;
        Self::new((x as usize, y as usize, z as usize), header_affine(h))
    }

    /// 数据形状.
    #[inline]
    pub fn shape(&self) -> Idx3d {
        self.shape
    }

    /// 体素个数.
    #[inline]
    pub fn len(&self) -> usize {
        let (x, y, z) = self.shape;
        x * y * z
    }

    /// 网格是否不含任何体素.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 体素到物理空间的仿射矩阵.
    #[inline]
    pub fn affine(&self) -> DMat4 {
        self.affine
    }

    /// 连续体素坐标 -> 物理坐标.
    #[inline]
    pub fn voxel_to_world(&self, p: DVec3) -> DVec3 {
        self.affine.transform_point3(p)
    }

    /// 物理坐标 -> 连续体素坐标.
    #[inline]
    pub fn world_to_voxel(&self, p: DVec3) -> DVec3 {
        self.inverse.transform_point3(p)
    }

    /// 各轴体素尺寸 (单位: 毫米), 即仿射矩阵线性部分各列的模长.
    #[inline]
    pub fn voxel_size(&self) -> DVec3 {
        DVec3::new(
            self.affine.x_axis.truncate().length(),
            self.affine.y_axis.truncate().length(),
            self.affine.z_axis.truncate().length(),
        )
    }

    /// 检查索引是否合法.
    #[inline]
    pub fn check(&self, &(i, j, k): &Idx3d) -> bool {
        let (x, y, z) = self.shape;
        i < x && j < y && k < z
    }

    /// 找到连续体素坐标 `p` 最近的体素 (即 `floor(p + 0.5)`).
    ///
    /// 若最近体素在网格外 (或 `p` 含 NaN), 则返回 `None`.
    pub fn nearest_voxel(&self, p: DVec3) -> Option<Idx3d> {
        let r = (p + DVec3::splat(0.5)).floor();
        let (x, y, z) = self.shape;
        let fits = |v: f64, n: usize| v >= 0.0 && v < n as f64;
        (fits(r.x, x) && fits(r.y, y) && fits(r.z, z))
            .then(|| (r.x as usize, r.y as usize, r.z as usize))
    }

    /// 两个网格是否一致: 形状相同, 且仿射矩阵在 `f32` 精度内相同.
    #[inline]
    pub fn matches(&self, other: &VoxelGrid) -> bool {
        self.shape == other.shape && self.affine.abs_diff_eq(other.affine, AFFINE_TOLERANCE)
    }

    /// 生成一个以本网格为准的最小 nifti header (sform 有效).
    ///
    /// 仅在没有参考 header 时使用.
    pub fn to_header(&self) -> NiftiHeader {
        let mut header = NiftiHeader::default();
        let (x, y, z) = self.shape;
        header.dim = [3, x as u16, y as u16, z as u16, 1, 1, 1, 1];
        let size = self.voxel_size();
        header.pixdim = [1.0, size.x as f32, size.y as f32, size.z as f32, 1.0, 1.0, 1.0, 1.0];
        header.sform_code = 1;
        (header.scl_slope, header.scl_inter) = (1.0, 0.0);
        let row = |r: usize| -> [f32; 4] {
            let v: DVec4 = self.affine.row(r);
            [v.x as f32, v.y as f32, v.z as f32, v.w as f32]
        };
        header.srow_x = row(0);
        header.srow_y = row(1);
        header.srow_z = row(2);
        header
    }
}

/// 从 header 中读取仿射矩阵. 见 [`VoxelGrid::from_header`].
fn header_affine(h: &NiftiHeader) -> DMat4 {
    let [_, dx, dy, dz, ..] = h.pixdim.map(|v| v as f64);
    if h.sform_code > 0 {
        let r = |s: [f32; 4]| s.map(|v| v as f64);
        from_rows([r(h.srow_x), r(h.srow_y), r(h.srow_z), [0.0, 0.0, 0.0, 1.0]])
    } else if h.qform_code > 0 {
        let (b, c, d) = (h.quatern_b as f64, h.quatern_c as f64, h.quatern_d as f64);
        // 浮点误差可能让 `1 - (b^2 + c^2 + d^2)` 略小于 0.
        let a = (1.0 - (b * b + c * c + d * d)).max(0.0).sqrt();
        let qfac = if h.pixdim[0] < 0.0 { -1.0 } else { 1.0 };
        let (sx, sy, sz) = (dx, dy, dz * qfac);
        from_rows([
            [
                (a * a + b * b - c * c - d * d) * sx,
                2.0 * (b * c - a * d) * sy,
                2.0 * (b * d + a * c) * sz,
                h.quatern_x as f64,
            ],
            [
                2.0 * (b * c + a * d) * sx,
                (a * a + c * c - b * b - d * d) * sy,
                2.0 * (c * d - a * b) * sz,
                h.quatern_y as f64,
            ],
            [
                2.0 * (b * d - a * c) * sx,
                2.0 * (c * d + a * b) * sy,
                (a * a + d * d - c * c - b * b) * sz,
                h.quatern_z as f64,
            ],
            [0.0, 0.0, 0.0, 1.0],
        ])
    } else {
        let fix = |v: f64| if v > 0.0 { v } else { 1.0 };
        DMat4::from_scale(DVec3::new(fix(dx), fix(dy), fix(dz)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f64_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_singular_affine() {
        let e = VoxelGrid::new((2, 2, 2), DMat4::ZERO).unwrap_err();
        assert!(matches!(e, TrackError::SingularAffine));
    }

    #[test]
    fn test_world_voxel_round_trip() {
        let affine = DMat4::from_scale_rotation_translation(
            DVec3::new(2.0, 2.0, 3.0),
            glam::DQuat::IDENTITY,
            DVec3::new(-10.0, 5.0, 1.0),
        );
        let g = VoxelGrid::new((4, 5, 6), affine).unwrap();
        let p = DVec3::new(1.5, 2.0, 3.25);
        let w = g.voxel_to_world(p);
        assert!(f64_eq(w.x, -7.0) && f64_eq(w.y, 9.0) && f64_eq(w.z, 10.75));
        assert!(g.world_to_voxel(w).abs_diff_eq(p, 1e-12));
        assert!(g.voxel_size().abs_diff_eq(DVec3::new(2.0, 2.0, 3.0), 1e-12));
    }

    #[test]
    fn test_nearest_voxel() {
        let g = VoxelGrid::identity((3, 3, 3));
        assert_eq!(g.nearest_voxel(DVec3::new(0.49, 1.5, 2.2)), Some((0, 2, 2)));
        assert_eq!(g.nearest_voxel(DVec3::new(-0.4, 0.0, 0.0)), Some((0, 0, 0)));
        assert_eq!(g.nearest_voxel(DVec3::new(-0.6, 0.0, 0.0)), None);
        assert_eq!(g.nearest_voxel(DVec3::new(0.0, 2.5, 0.0)), None);
        assert_eq!(g.nearest_voxel(DVec3::new(f64::NAN, 0.0, 0.0)), None);
    }

    #[test]
    fn test_header_round_trip() {
        let affine = from_rows([
            [-1.5, 0.0, 0.0, 90.0],
            [0.0, 1.5, 0.0, -126.0],
            [0.0, 0.0, 1.5, -72.0],
            [0.0, 0.0, 0.0, 1.0],
        ]);
        let g = VoxelGrid::new((10, 11, 12), affine).unwrap();
        let back = VoxelGrid::from_header(&g.to_header()).unwrap();
        assert!(g.matches(&back));
    }

    #[test]
    fn test_qform_affine() {
        let mut h = NiftiHeader::default();
        h.dim = [3, 4, 4, 4, 1, 1, 1, 1];
        h.pixdim = [1.0, 2.0, 2.0, 2.0, 1.0, 1.0, 1.0, 1.0];
        h.sform_code = 0;
        h.qform_code = 1;
        // 绕 z 轴旋转 180 度.
        (h.quatern_b, h.quatern_c, h.quatern_d) = (0.0, 0.0, 1.0);
        (h.quatern_x, h.quatern_y, h.quatern_z) = (1.0, 2.0, 3.0);
        let g = VoxelGrid::from_header(&h).unwrap();
        let w = g.voxel_to_world(DVec3::new(1.0, 1.0, 1.0));
        assert!(w.abs_diff_eq(DVec3::new(-1.0, 0.0, 5.0), 1e-9));
    }

    #[test]
    fn test_matches() {
        let a = VoxelGrid::identity((2, 3, 4));
        let b = VoxelGrid::identity((2, 3, 5));
        let c = VoxelGrid::new((2, 3, 4), DMat4::from_scale(DVec3::splat(2.0))).unwrap();
        assert!(a.matches(&a.clone()));
        assert!(!a.matches(&b));
        assert!(!a.matches(&c));
    }
}
