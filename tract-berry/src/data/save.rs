//! 工作点体数据的持久化.
//!
//! 每个工作点可以单独写为 nifti 文件, 也可以整体写入一个 npz 归档.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use ndarray::{Array1, ArrayView3};
use ndarray_npy::NpzWriter;
use nifti::writer::WriterOptions;

use super::VolumeAttr;
use crate::density::OperatingPoint;
use crate::TrackResult;

/// 工作点的 nifti 文件名, 形如 `vol007_t0.0123.nii.gz`.
#[inline]
pub fn operating_point_filename(point: &OperatingPoint) -> String {
    format!("vol{:03}_t{}.nii.gz", point.index(), point.threshold())
}

/// 以 `like` 的 header 为参考, 将二值掩膜 `mask` 以 `int32` 写入 `path`.
pub fn save_mask<P, V>(path: P, mask: ArrayView3<u8>, like: &V) -> TrackResult<()>
where
    P: AsRef<Path>,
    V: VolumeAttr + ?Sized,
{
    let mut header = like.reference_header();
    // 掩膜按原值写出, 不做线性换算.
    (header.scl_slope, header.scl_inter) = (1.0, 0.0);
    let data = mask.mapv(i32::from);
    WriterOptions::new(path.as_ref())
        .reference_header(&header)
        .write_nifti(&data)?;
    Ok(())
}

/// 将工作点逐个写入目录 `dir` (不存在时自动创建). 返回写出的文件路径, 顺序与输入一致.
pub fn save_stack<P, I, V>(dir: P, points: I, like: &V) -> TrackResult<Vec<PathBuf>>
where
    P: AsRef<Path>,
    I: IntoIterator<Item = OperatingPoint>,
    V: VolumeAttr + ?Sized,
{
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;
    let mut written = Vec::new();
    for point in points {
        let path = dir.join(operating_point_filename(&point));
        save_mask(&path, point.mask(), like)?;
        written.push(path);
    }
    log::debug!("{} operating points written into {}", written.len(), dir.display());
    Ok(written)
}

/// 将工作点整体写入压缩 npz 归档 `path`.
///
/// 第 `i` 个工作点的掩膜存为 `vol{i:03}.npy`, 所有阈值按顺序存为 `thresholds.npy`.
/// 返回写入的工作点个数.
pub fn save_stack_npz<P, I>(path: P, points: I) -> TrackResult<usize>
where
    P: AsRef<Path>,
    I: IntoIterator<Item = OperatingPoint>,
{
    let mut npz = NpzWriter::new_compressed(File::create(path.as_ref())?);
    let mut thresholds = Vec::new();
    for point in points {
        npz.add_array(format!("vol{:03}.npy", point.index()), &point.mask())?;
        thresholds.push(point.threshold());
    }
    let n = thresholds.len();
    npz.add_array("thresholds.npy", &Array1::from(thresholds))?;
    npz.finish()?;
    Ok(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::density::DensityQuantizer;
    use crate::{ScalarVolume, VoxelGrid};
    use ndarray::{Array3, Ix1, Ix3, OwnedRepr};
    use ndarray_npy::NpzReader;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("tract-berry-{name}-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn sample_points() -> Vec<OperatingPoint> {
        let mut density = Array3::zeros((3, 3, 3));
        density[(1, 1, 1)] = 9.0f32;
        density[(0, 1, 1)] = 1.0;
        DensityQuantizer::default()
            .with_sigma(0.0)
            .with_levels(4)
            .operating_points(density)
            .collect()
    }

    #[test]
    fn test_filename() {
        let points = sample_points();
        assert_eq!(operating_point_filename(&points[0]), "vol000_t0.nii.gz");
        assert!(operating_point_filename(&points[1]).starts_with("vol001_t0.25"));
    }

    #[test]
    fn test_save_stack_nifti() {
        let dir = scratch_dir("nifti");
        let like = ScalarVolume::new(VoxelGrid::identity((3, 3, 3)), Array3::zeros((3, 3, 3))).unwrap();
        let points = sample_points();
        let paths = save_stack(&dir, points.clone(), &like).unwrap();
        assert_eq!(paths.len(), points.len());

        let back = ScalarVolume::open(&paths[1]).unwrap();
        assert!(back.grid().matches(like.grid()));
        let want = points[1].mask().mapv(f32::from);
        assert_eq!(back.data(), want.view());
        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_save_stack_npz() {
        let dir = scratch_dir("npz");
        let path = dir.join("stack.npz");
        let points = sample_points();
        assert_eq!(save_stack_npz(&path, points.clone()).unwrap(), points.len());

        let mut npz = NpzReader::new(File::open(&path).unwrap()).unwrap();
        assert_eq!(npz.len(), points.len() + 1);
        let t = npz.by_name::<OwnedRepr<f32>, Ix1>("thresholds.npy").unwrap();
        assert_eq!(t.len(), points.len());
        let v2 = npz.by_name::<OwnedRepr<u8>, Ix3>("vol002.npy").unwrap();
        assert_eq!(v2, points[2].mask());
        let mut names = npz.names().unwrap();
        names.sort();
        // M = log10(10) = 1, 步长 0.25, 共 4 个工作点.
        assert_eq!(points.len(), 4);
        assert_eq!(names, ["thresholds.npy", "vol000.npy", "vol001.npy", "vol002.npy", "vol003.npy"]);
        fs::remove_dir_all(dir).unwrap();
    }
}
