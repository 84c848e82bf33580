//! 纤维束 (streamlines) 与过滤.
//!
//! 纤维由追踪器一次性生成, 此后只读. 过滤操作总是产生新的 [`Bundle`],
//! 底层点列通过引用计数共享, 不会复制.

use std::sync::Arc;

use glam::DVec3;

pub mod connectivity;

pub use connectivity::{filter_by_pair, ConnectivityGroups, RoiPair};

/// 一条纤维: 物理空间 (毫米) 中的有序点列.
#[derive(Debug, Clone, PartialEq)]
pub struct Streamline {
    points: Arc<[DVec3]>,
}

impl Streamline {
    /// 由点列创建纤维.
    #[inline]
    pub fn new(points: Vec<DVec3>) -> Self {
        Self {
            points: points.into(),
        }
    }

    /// 点列.
    #[inline]
    pub fn points(&self) -> &[DVec3] {
        &self.points
    }

    /// 点的个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// 是否不含任何点.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// 纤维长度, 即相邻点欧氏距离之和. 少于两个点时为 0.
    pub fn length(&self) -> f64 {
        self.points.windows(2).map(|w| w[0].distance(w[1])).sum()
    }
}

impl From<Vec<DVec3>> for Streamline {
    #[inline]
    fn from(points: Vec<DVec3>) -> Self {
        Self::new(points)
    }
}

/// 有序纤维集合. 由追踪器生成时, 顺序即种子顺序.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bundle {
    streamlines: Vec<Streamline>,
}

impl Bundle {
    /// 创建空集合.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// 纤维条数.
    #[inline]
    pub fn len(&self) -> usize {
        self.streamlines.len()
    }

    /// 是否为空.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.streamlines.is_empty()
    }

    /// 按顺序迭代所有纤维.
    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, Streamline> {
        self.streamlines.iter()
    }

    /// 获取第 `index` 条纤维.
    #[inline]
    pub fn get(&self, index: usize) -> Option<&Streamline> {
        self.streamlines.get(index)
    }

    /// 每条纤维的长度.
    pub fn lengths(&self) -> Vec<f64> {
        self.streamlines.iter().map(Streamline::length).collect()
    }

    /// 保留长度严格大于 `min_length` 的纤维, 顺序不变.
    pub fn longer_than(&self, min_length: f64) -> Bundle {
        self.streamlines
            .iter()
            .filter(|s| s.length() > min_length)
            .cloned()
            .collect()
    }

    /// 按下标挑选纤维. 越界下标被忽略.
    pub fn select(&self, indices: &[usize]) -> Bundle {
        indices
            .iter()
            .filter_map(|&i| self.streamlines.get(i))
            .cloned()
            .collect()
    }

    /// 所有纤维的点数之和.
    pub fn total_points(&self) -> usize {
        self.streamlines.iter().map(Streamline::len).sum()
    }
}

impl FromIterator<Streamline> for Bundle {
    fn from_iter<I: IntoIterator<Item = Streamline>>(iter: I) -> Self {
        Self {
            streamlines: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Bundle {
    type Item = &'a Streamline;
    type IntoIter = std::slice::Iter<'a, Streamline>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl IntoIterator for Bundle {
    type Item = Streamline;
    type IntoIter = std::vec::IntoIter<Streamline>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.streamlines.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 沿 x 轴, 从原点出发, 步长 `step` 的 `n` 个点.
    pub(crate) fn straight(n: usize, step: f64) -> Streamline {
        (0..n)
            .map(|i| DVec3::new(i as f64 * step, 0.0, 0.0))
            .collect::<Vec<_>>()
            .into()
    }

    #[test]
    fn test_length() {
        assert_eq!(Streamline::new(vec![]).length(), 0.0);
        assert_eq!(Streamline::new(vec![DVec3::ONE]).length(), 0.0);
        assert!((straight(11, 0.2).length() - 2.0).abs() < 1e-12);
        let zigzag = Streamline::new(vec![DVec3::ZERO, DVec3::new(3.0, 4.0, 0.0), DVec3::new(3.0, 4.0, 1.0)]);
        assert!((zigzag.length() - 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_length_filter_is_strict() {
        // 长度 0.5 与 2.0 的两条纤维, 阈值 1.0 时只保留后者.
        let bundle: Bundle = [straight(2, 0.5), straight(5, 0.5), straight(3, 0.5)]
            .into_iter()
            .collect();
        assert_eq!(bundle.lengths(), vec![0.5, 2.0, 1.0]);
        let kept = bundle.longer_than(1.0);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept.get(0), bundle.get(1));
    }

    #[test]
    fn test_select() {
        let bundle: Bundle = (1..5).map(|n| straight(n, 1.0)).collect();
        let picked = bundle.select(&[3, 0, 9]);
        assert_eq!(picked.len(), 2);
        assert_eq!(picked.get(0).unwrap().len(), 4);
        assert_eq!(picked.get(1).unwrap().len(), 1);
        assert_eq!(bundle.total_points(), 10);
    }
}
