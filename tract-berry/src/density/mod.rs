//! 访问计数密度图, 高斯平滑, 以及对数阈值量化.

use std::str::FromStr;

use ndarray::Array3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::streamline::Bundle;
use crate::{TrackError, VoxelGrid};

mod gaussian;
mod quantize;

pub use gaussian::{gaussian_filter, gaussian_kernel};
pub use quantize::{DensityQuantizer, LogDensity, OperatingPoint, OperatingPoints};

/// 访问计数方式.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum VisitCounting {
    /// 一条纤维连续落在同一体素的若干点只计一次.
    #[default]
    PerPass,

    /// 每个点都计数.
    PerPoint,
}

impl FromStr for VisitCounting {
    type Err = TrackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pass" | "per-pass" | "per_pass" => Ok(Self::PerPass),
            "point" | "per-point" | "per_point" => Ok(Self::PerPoint),
            _ => Err(TrackError::InvalidConfig("visit counting must be `per-pass` or `per-point`")),
        }
    }
}

/// 统计 `bundle` 在网格 `grid` 上的访问次数.
///
/// 每个点映射到最近的体素, 网格外的点被忽略.
pub fn density_map(bundle: &Bundle, grid: &VoxelGrid, counting: VisitCounting) -> Array3<u32> {
    let mut counts = Array3::zeros(grid.shape());
    for s in bundle {
        let mut last = None;
        for p in s.points() {
            let voxel = grid.nearest_voxel(grid.world_to_voxel(*p));
            if let Some(idx) = voxel {
                if counting == VisitCounting::PerPoint || last != voxel {
                    counts[idx] += 1;
                }
            }
            last = voxel;
        }
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streamline::Streamline;
    use glam::DVec3;

    fn line(xs: &[f64]) -> Streamline {
        xs.iter().map(|&x| DVec3::new(x, 0.0, 0.0)).collect::<Vec<_>>().into()
    }

    #[test]
    fn test_counting_conventions() {
        let grid = VoxelGrid::identity((4, 1, 1));
        let bundle: Bundle = [line(&[0.0, 0.2, 0.4, 1.0, 1.2, 0.9, 5.0, 3.0])].into_iter().collect();

        let per_pass = density_map(&bundle, &grid, VisitCounting::PerPass);
        assert_eq!(per_pass.into_raw_vec(), vec![1, 1, 0, 1]);

        let per_point = density_map(&bundle, &grid, VisitCounting::PerPoint);
        assert_eq!(per_point.into_raw_vec(), vec![3, 3, 0, 1]);
    }

    #[test]
    fn test_leaving_and_returning_counts_again() {
        let grid = VoxelGrid::identity((2, 1, 1));
        let bundle: Bundle = [line(&[0.0, 0.0, 0.8, 0.1]), line(&[1.0])].into_iter().collect();
        let d = density_map(&bundle, &grid, VisitCounting::PerPass);
        assert_eq!(d.into_raw_vec(), vec![2, 2]);
    }

    #[test]
    fn test_parse_counting() {
        assert_eq!("per-point".parse::<VisitCounting>().unwrap(), VisitCounting::PerPoint);
        assert_eq!("PASS".parse::<VisitCounting>().unwrap(), VisitCounting::PerPass);
        assert!("twice".parse::<VisitCounting>().is_err());
    }
}
