//! 基于 ROI 标签的纤维连通性分组 (包含式).
//!
//! 一条纤维沿途经过的所有非零标签都计入, 不只看两个端点.
//! 对经过的每一对不同标签 `(a, b)` (`a < b`), 该纤维都被加入这一对的分组.

use std::collections::BTreeMap;
use std::str::FromStr;

use itertools::Itertools;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::{Bundle, Streamline};
use crate::consts::label::is_roi;
use crate::{LabelVolume, TrackError, VolumeAttr};

/// 目标 ROI 对.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum RoiPair {
    /// 按 ROI 序号指定: 序号是标签在 "ROI 体数据中出现过的非零标签升序列表" 中的位置.
    ///
    /// 默认的 `ByIndex(0, 1)` 即前两个 ROI.
    ByIndex(usize, usize),

    /// 直接按标签值指定. 背景标签 `0` 不是 ROI, 不能出现在这里.
    ByLabel(i32, i32),
}

impl Default for RoiPair {
    #[inline]
    fn default() -> Self {
        Self::ByIndex(0, 1)
    }
}

impl RoiPair {
    /// 在升序标签列表 `labels` 上解析出实际的标签对 `(a, b)`, 满足 `a < b`.
    ///
    /// 以下情况返回 `None`: 序号越界, 标签是背景 `0` 或不在 `labels` 中, 两个标签相同.
    pub fn resolve(&self, labels: &[i32]) -> Option<(i32, i32)> {
        let (a, b) = match *self {
            Self::ByIndex(i, j) => (*labels.get(i)?, *labels.get(j)?),
            Self::ByLabel(a, b) => {
                if !is_roi(a) || !is_roi(b) || !labels.contains(&a) || !labels.contains(&b) {
                    return None;
                }
                (a, b)
            }
        };
        match a.cmp(&b) {
            std::cmp::Ordering::Less => Some((a, b)),
            std::cmp::Ordering::Greater => Some((b, a)),
            std::cmp::Ordering::Equal => None,
        }
    }
}

/// 解析形如 `"0,1"` (按序号) 或 `"label:3,7"` (按标签值) 的字符串.
///
/// 按标签值指定时拒绝背景标签 `0`.
impl FromStr for RoiPair {
    type Err = TrackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || TrackError::InvalidConfig("roi pair must look like `0,1` or `label:3,7`");
        let (by_label, body) = match s.trim().strip_prefix("label:") {
            Some(rest) => (true, rest),
            None => (false, s.trim()),
        };
        let (a, b) = body.split_once(',').ok_or_else(bad)?;
        let (a, b) = (a.trim(), b.trim());
        if by_label {
            let a: i32 = a.parse().map_err(|_| bad())?;
            let b: i32 = b.parse().map_err(|_| bad())?;
            if !is_roi(a) || !is_roi(b) {
                log::warn!("background label 0 in roi pair `{s}`");
                return Err(TrackError::InvalidConfig("roi pair labels must be non-zero"));
            }
            Ok(Self::ByLabel(a, b))
        } else {
            Ok(Self::ByIndex(
                a.parse().map_err(|_| bad())?,
                b.parse().map_err(|_| bad())?,
            ))
        }
    }
}

/// 收集纤维 `s` 沿途经过的所有非零标签, 升序且去重.
///
/// 每个点映射到 `rois` 网格上最近的体素; 网格外的点被忽略.
pub fn touched_labels(s: &Streamline, rois: &LabelVolume) -> Vec<i32> {
    let grid = rois.grid();
    let mut labels: Vec<i32> = s
        .points()
        .iter()
        .filter_map(|p| rois.label_near(grid.world_to_voxel(*p)))
        .filter(|l| is_roi(*l))
        .collect();
    labels.sort_unstable();
    labels.dedup();
    labels
}

/// 标签对 -> 纤维下标 的分组.
#[derive(Debug, Clone, Default)]
pub struct ConnectivityGroups {
    groups: BTreeMap<(i32, i32), Vec<usize>>,
}

impl ConnectivityGroups {
    /// 对 `bundle` 中每条纤维做包含式分组.
    ///
    /// 只经过少于两个 ROI 的纤维不属于任何分组.
    pub fn build(bundle: &Bundle, rois: &LabelVolume) -> Self {
        let mut groups: BTreeMap<(i32, i32), Vec<usize>> = BTreeMap::new();
        for (index, s) in bundle.iter().enumerate() {
            for pair in touched_labels(s, rois).into_iter().tuple_combinations() {
                groups.entry(pair).or_default().push(index);
            }
        }
        Self { groups }
    }

    /// 标签对 `(a, b)` 的纤维下标 (升序). 标签对顺序无关.
    pub fn get(&self, a: i32, b: i32) -> &[usize] {
        let key = if a <= b { (a, b) } else { (b, a) };
        self.groups.get(&key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// 非空分组的个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// 是否没有任何分组.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// 按标签对升序迭代所有分组.
    pub fn iter(&self) -> impl Iterator<Item = ((i32, i32), &[usize])> {
        self.groups.iter().map(|(k, v)| (*k, v.as_slice()))
    }
}

/// 只保留同时经过目标 ROI 对的纤维, 顺序不变.
///
/// 目标对无法在 `rois` 上解析时, 返回空集合.
pub fn filter_by_pair(bundle: &Bundle, rois: &LabelVolume, pair: RoiPair) -> Bundle {
    let labels = rois.roi_labels();
    let Some((a, b)) = pair.resolve(&labels) else {
        log::warn!("roi pair {pair:?} cannot be resolved on labels {labels:?}");
        return Bundle::new();
    };
    let groups = ConnectivityGroups::build(bundle, rois);
    log::debug!("{} roi pairs connected, target ({a}, {b})", groups.len());
    bundle.select(groups.get(a, b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::VoxelGrid;
    use glam::DVec3;
    use ndarray::Array3;

    /// 10 x 1 x 1 的标签条带: `x` 处的标签为 `labels[x]`.
    fn strip(labels: [i32; 10]) -> LabelVolume {
        let data = Array3::from_shape_fn((10, 1, 1), |(x, _, _)| labels[x]);
        LabelVolume::new(VoxelGrid::identity((10, 1, 1)), data).unwrap()
    }

    fn segment(from: f64, to: f64) -> Streamline {
        let n = ((to - from) / 0.5).round() as usize;
        (0..=n)
            .map(|i| DVec3::new(from + i as f64 * 0.5, 0.0, 0.0))
            .collect::<Vec<_>>()
            .into()
    }

    #[test]
    fn test_resolve() {
        let labels = [1, 2, 5];
        assert_eq!(RoiPair::default().resolve(&labels), Some((1, 2)));
        assert_eq!(RoiPair::ByIndex(2, 0).resolve(&labels), Some((1, 5)));
        assert_eq!(RoiPair::ByIndex(0, 3).resolve(&labels), None);
        assert_eq!(RoiPair::ByIndex(1, 1).resolve(&labels), None);
        assert_eq!(RoiPair::ByLabel(5, 2).resolve(&labels), Some((2, 5)));
        assert_eq!(RoiPair::ByLabel(1, 9).resolve(&labels), None);
        // 即使标签列表里混入了 0, 背景也不能当作 ROI.
        assert_eq!(RoiPair::ByLabel(0, 2).resolve(&[0, 2, 5]), None);
    }

    #[test]
    fn test_parse() {
        assert_eq!("0,1".parse::<RoiPair>().unwrap(), RoiPair::ByIndex(0, 1));
        assert_eq!("label: 3 , 7".parse::<RoiPair>().unwrap(), RoiPair::ByLabel(3, 7));
        assert!("0;1".parse::<RoiPair>().is_err());
        assert!("label:a,7".parse::<RoiPair>().is_err());
        assert!(matches!(
            "label:0,7".parse::<RoiPair>(),
            Err(TrackError::InvalidConfig(_))
        ));
        // 按序号时 0 是第一个 ROI, 不是背景.
        assert_eq!("0,7".parse::<RoiPair>().unwrap(), RoiPair::ByIndex(0, 7));
    }

    #[test]
    fn test_touched_labels_ignores_outside_points() {
        let rois = strip([1, 0, 0, 2, 0, 0, 0, 0, 0, 5]);
        let s = segment(-3.0, 3.0);
        assert_eq!(touched_labels(&s, &rois), vec![1, 2]);
    }

    #[test]
    fn test_groups_are_inclusive() {
        let rois = strip([1, 0, 0, 2, 0, 0, 0, 0, 0, 5]);
        let bundle: Bundle = [
            segment(0.0, 9.0), // 1, 2, 5
            segment(3.0, 9.0), // 2, 5
            segment(0.0, 2.0), // 1
            segment(4.0, 8.0), // 无
        ]
        .into_iter()
        .collect();
        let groups = ConnectivityGroups::build(&bundle, &rois);
        assert_eq!(groups.len(), 3);
        assert_eq!(groups.get(1, 2), &[0]);
        assert_eq!(groups.get(5, 2), &[0, 1]);
        assert_eq!(groups.get(1, 5), &[0]);
        assert!(groups.get(0, 1).is_empty());
    }

    #[test]
    fn test_filter_by_pair() {
        let rois = strip([1, 0, 0, 2, 0, 0, 0, 0, 0, 5]);
        let bundle: Bundle = [segment(3.0, 9.0), segment(0.0, 3.0), segment(0.0, 1.0)]
            .into_iter()
            .collect();
        // 只经过 {2, 5} 的纤维不属于前两个 ROI (1, 2); 只经过单个 ROI 的纤维也被排除.
        let kept = filter_by_pair(&bundle, &rois, RoiPair::default());
        assert_eq!(kept.len(), 1);
        assert_eq!(kept.get(0), bundle.get(1));

        let kept = filter_by_pair(&bundle, &rois, RoiPair::ByLabel(2, 5));
        assert_eq!(kept.get(0), bundle.get(0));
    }

    #[test]
    fn test_filter_without_rois_is_empty() {
        let rois = strip([0; 10]);
        let bundle: Bundle = [segment(0.0, 9.0)].into_iter().collect();
        assert!(filter_by_pair(&bundle, &rois, RoiPair::default()).is_empty());
    }
}
