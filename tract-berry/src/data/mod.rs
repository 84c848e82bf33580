use std::ops::{Index, IndexMut};
use std::path::Path;

use glam::DVec3;
use ndarray::{Array3, Array4, ArrayD, ArrayView3, ArrayView4, Axis, Ix3, Ix4};
use nifti::{IntoNdArray, NiftiHeader, NiftiObject, ReaderOptions};

use crate::consts::label::is_roi;
use crate::{Idx3d, TrackError, TrackResult};

mod grid;
pub mod interp;
pub mod save;

pub use grid::VoxelGrid;

/// `NiftiHeader` 是栈上大对象, 移动该对象的开销很可观.
/// 因此我们将其分配到堆上.
type BoxedHeader = Box<NiftiHeader>;

/// 读取 nii 文件, 得到 header 和按 `[x, y, z, ...]` 索引的 `f32` 数据.
/// 数据已经按照 `scl_slope`/`scl_inter` 换算.
fn read_nifti<P: AsRef<Path>>(path: P) -> TrackResult<(BoxedHeader, ArrayD<f32>)> {
    let obj = ReaderOptions::new().read_file(path.as_ref())?;
    let header = Box::new(obj.header().clone());
    let data = obj.into_volume().into_ndarray::<f32>()?;
    Ok((header, data))
}

/// 将读入的数据整理为三维. 第四维长度为 1 的四维数据也被接受.
fn into_3d(data: ArrayD<f32>) -> TrackResult<Array3<f32>> {
    if data.ndim() == 4 && data.shape()[3] == 1 {
        let data = data.into_dimensionality::<Ix4>()?;
        return Ok(data.index_axis_move(Axis(3), 0));
    }
    Ok(data.into_dimensionality::<Ix3>()?)
}

/// 3D 体数据 header 与网格的共用属性和部分通用操作.
pub trait VolumeAttr {
    /// 获取体素网格.
    fn grid(&self) -> &VoxelGrid;

    /// 获取原始 nifti header. 内存中直接构造的数据没有 header.
    fn header(&self) -> Option<&NiftiHeader>;

    /// 获取数据形状大小.
    #[inline]
    fn shape(&self) -> Idx3d {
        self.grid().shape()
    }

    /// 获取数据体素个数.
    #[inline]
    fn size(&self) -> usize {
        self.grid().len()
    }

    /// 检查索引是否合法.
    #[inline]
    fn check(&self, pos: &Idx3d) -> bool {
        self.grid().check(pos)
    }

    /// 获取各轴体素分辨率, 以毫米为单位.
    #[inline]
    fn voxel_size(&self) -> DVec3 {
        self.grid().voxel_size()
    }

    /// 获取可以用来写出同网格数据的 header. 有原始 header 时优先使用它.
    fn reference_header(&self) -> NiftiHeader {
        match self.header() {
            Some(h) => h.clone(),
            None => self.grid().to_header(),
        }
    }
}

/// 3D 体数据, 包括 (可选的) header, 体素网格和数据.
///
/// 数据按 `(i, j, k)` 索引, 与仿射矩阵的列顺序一致.
#[derive(Debug, Clone)]
pub struct Volume<T> {
    header: Option<BoxedHeader>,
    grid: VoxelGrid,
    data: Array3<T>,
}

/// 标量场, 例如 FA 图.
pub type ScalarVolume = Volume<f32>;

/// 整数标签体数据, 例如 ROI. 标签 0 代表不属于任何 ROI.
pub type LabelVolume = Volume<i32>;

/// 二值掩膜, 例如种子掩膜.
pub type MaskVolume = Volume<bool>;

impl<T> VolumeAttr for Volume<T> {
    #[inline]
    fn grid(&self) -> &VoxelGrid {
        &self.grid
    }

    #[inline]
    fn header(&self) -> Option<&NiftiHeader> {
        self.header.as_deref()
    }
}

impl<T> Index<Idx3d> for Volume<T> {
    type Output = T;

    #[inline]
    fn index(&self, index: Idx3d) -> &Self::Output {
        &self.data[index]
    }
}

impl<T> IndexMut<Idx3d> for Volume<T> {
    #[inline]
    fn index_mut(&mut self, index: Idx3d) -> &mut Self::Output {
        &mut self.data[index]
    }
}

impl<T> Volume<T> {
    /// 以网格 `grid` 和数据 `data` 创建体数据.
    ///
    /// 如果 `data` 的形状和 `grid` 不符, 返回 `Err(TrackError::ShapeMismatch)`.
    pub fn new(grid: VoxelGrid, data: Array3<T>) -> TrackResult<Self> {
        let (x, y, z) = grid.shape();
        if data.dim() != (x, y, z) {
            return Err(TrackError::ShapeMismatch(
                vec![x, y, z],
                data.shape().to_vec(),
            ));
        }
        Ok(Self {
            header: None,
            grid,
            data,
        })
    }

    /// 附加原始 header. 之后写出的同网格数据会沿用它.
    #[inline]
    pub fn with_header(mut self, header: NiftiHeader) -> Self {
        self.header = Some(Box::new(header));
        self
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView3<'_, T> {
        self.data.view()
    }

    /// 消费自我, 获得底层数据.
    #[inline]
    pub fn into_data(self) -> Array3<T> {
        self.data
    }

    /// 逐体素映射为新的体数据, 保留网格与 header.
    pub fn map<U, F: FnMut(&T) -> U>(&self, f: F) -> Volume<U> {
        Volume {
            header: self.header.clone(),
            grid: self.grid.clone(),
            data: self.data.map(f),
        }
    }

    /// 打开 nii 文件并以 `f` 转换体素值.
    fn open_with<P: AsRef<Path>, F: FnMut(f32) -> T>(path: P, f: F) -> TrackResult<Self> {
        let (header, data) = read_nifti(path)?;
        let grid = VoxelGrid::from_header(&header)?;
        let data = into_3d(data)?.mapv(f);
        let mut v = Self::new(grid, data)?;
        v.header = Some(header);
        Ok(v)
    }
}

impl ScalarVolume {
    /// 打开 nii 文件格式的标量场. `path` 为 nii 文件的本地路径.
    pub fn open<P: AsRef<Path>>(path: P) -> TrackResult<Self> {
        Self::open_with(path, |v| v)
    }
}

impl LabelVolume {
    /// 打开 nii 文件格式的标签体数据. 浮点值向零截断为整数.
    pub fn open<P: AsRef<Path>>(path: P) -> TrackResult<Self> {
        Self::open_with(path, |v| v as i32)
    }

    /// 按升序收集所有出现过的 ROI 标签 (不含 0).
    pub fn roi_labels(&self) -> Vec<i32> {
        let mut labels: Vec<i32> = self.data.iter().copied().filter(|l| is_roi(*l)).collect();
        labels.sort_unstable();
        labels.dedup();
        labels
    }

    /// 获取连续体素坐标 `p` 最近体素的标签. 越界时返回 `None`.
    #[inline]
    pub fn label_near(&self, p: DVec3) -> Option<i32> {
        self.grid.nearest_voxel(p).map(|idx| self.data[idx])
    }
}

impl MaskVolume {
    /// 打开 nii 文件格式的二值掩膜. 非零体素视为掩膜内.
    pub fn open<P: AsRef<Path>>(path: P) -> TrackResult<Self> {
        Self::open_with(path, |v| v != 0.0)
    }

    /// 掩膜内体素个数.
    #[inline]
    pub fn count(&self) -> usize {
        self.data.iter().filter(|p| **p).count()
    }

    /// 收集掩膜内所有体素对应的下标. 结果按行优先存储.
    pub fn true_voxels(&self) -> Vec<Idx3d> {
        self.data
            .indexed_iter()
            .filter_map(|(pos, &inside)| inside.then_some(pos))
            .collect()
    }
}

/// 4D 方向分布场. 前三维与网格一致, 第四维是每个体素的球谐系数或离散 PMF.
///
/// 数据在内存中保持标准布局, 因此每个体素的分布是连续存储的.
#[derive(Debug, Clone)]
pub struct OdfVolume {
    header: Option<BoxedHeader>,
    grid: VoxelGrid,
    data: Array4<f32>,
}

impl VolumeAttr for OdfVolume {
    #[inline]
    fn grid(&self) -> &VoxelGrid {
        &self.grid
    }

    #[inline]
    fn header(&self) -> Option<&NiftiHeader> {
        self.header.as_deref()
    }
}

impl OdfVolume {
    /// 以网格 `grid` 和数据 `data` 创建方向分布场.
    ///
    /// 如果 `data` 的前三维和 `grid` 不符, 返回 `Err(TrackError::ShapeMismatch)`.
    pub fn new(grid: VoxelGrid, data: Array4<f32>) -> TrackResult<Self> {
        let (x, y, z) = grid.shape();
        let (dx, dy, dz, _) = data.dim();
        if (dx, dy, dz) != (x, y, z) {
            return Err(TrackError::ShapeMismatch(
                vec![x, y, z],
                data.shape()[..3].to_vec(),
            ));
        }
        let data = if data.is_standard_layout() {
            data
        } else {
            data.as_standard_layout().to_owned()
        };
        Ok(Self {
            header: None,
            grid,
            data,
        })
    }

    /// 打开 nii 文件格式的 4D 方向分布场.
    pub fn open<P: AsRef<Path>>(path: P) -> TrackResult<Self> {
        let (header, data) = read_nifti(path)?;
        let grid = VoxelGrid::from_header(&header)?;
        let mut v = Self::new(grid, data.into_dimensionality::<Ix4>()?)?;
        v.header = Some(header);
        Ok(v)
    }

    /// 每个体素的分布长度 (系数个数或球面顶点个数).
    #[inline]
    pub fn len_values(&self) -> usize {
        self.data.len_of(Axis(3))
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView4<'_, f32> {
        self.data.view()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::ShapeBuilder;

    #[test]
    fn test_shape_mismatch() {
        let grid = VoxelGrid::identity((2, 2, 2));
        let e = ScalarVolume::new(grid.clone(), Array3::zeros((2, 2, 3))).unwrap_err();
        assert!(matches!(e, TrackError::ShapeMismatch(..)));
        let e = OdfVolume::new(grid, Array4::zeros((2, 3, 2, 5))).unwrap_err();
        assert!(matches!(e, TrackError::ShapeMismatch(..)));
    }

    #[test]
    fn test_mask_true_voxels_row_major() {
        let mut data = Array3::from_elem((2, 2, 2), false);
        data[(1, 0, 1)] = true;
        data[(0, 1, 0)] = true;
        let mask = MaskVolume::new(VoxelGrid::identity((2, 2, 2)), data).unwrap();
        assert_eq!(mask.count(), 2);
        assert_eq!(mask.true_voxels(), vec![(0, 1, 0), (1, 0, 1)]);
    }

    #[test]
    fn test_roi_labels() {
        let mut data = Array3::zeros((3, 1, 1));
        data[(0, 0, 0)] = 5;
        data[(2, 0, 0)] = 2;
        let rois = LabelVolume::new(VoxelGrid::identity((3, 1, 1)), data).unwrap();
        assert_eq!(rois.roi_labels(), vec![2, 5]);
        assert_eq!(rois.label_near(DVec3::new(0.2, 0.0, 0.0)), Some(5));
        assert_eq!(rois.label_near(DVec3::new(1.0, 0.0, 0.0)), Some(0));
        assert_eq!(rois.label_near(DVec3::new(3.0, 0.0, 0.0)), None);
    }

    #[test]
    fn test_reference_header_without_original() {
        let v = ScalarVolume::new(VoxelGrid::identity((4, 5, 6)), Array3::zeros((4, 5, 6))).unwrap();
        let h = v.reference_header();
        assert_eq!(&h.dim[..4], &[3, 4, 5, 6]);
        assert_eq!(h.sform_code, 1);
    }

    #[test]
    fn test_odf_values_per_voxel() {
        let grid = VoxelGrid::identity((2, 1, 1));
        let data = Array4::from_shape_fn((2, 1, 1, 3).f(), |(i, _, _, n)| (i * 10 + n) as f32);
        let odf = OdfVolume::new(grid, data).unwrap();
        assert_eq!(odf.len_values(), 3);
        assert_eq!(odf.data()[[1, 0, 0, 2]], 12.0);
    }
}
