//! 分阶段运行计时.

use std::time::{Duration, Instant};

/// 累计计时器.
///
/// 该计时器支持 "中途中断" 与 "结束中断, 继续开始计时".
#[derive(Clone, Debug)]
struct AccTimer {
    consumed: Duration,
    since: Instant,
}

impl AccTimer {
    /// 初始化计时器. 初始化时会视为已经开始计时 (`self.start()`).
    #[inline]
    fn new() -> Self {
        Self {
            consumed: Duration::ZERO,
            since: Instant::now(),
        }
    }

    /// 开始计时.
    #[inline]
    fn start(&mut self) {
        self.since = Instant::now();
    }

    /// 结束计时, 并将这一区间的时间累加. 返回本轮计时时长.
    ///
    /// # 注意
    ///
    /// 上一次调用必须是 `self.start()`, 否则计算时间值无意义.
    #[inline]
    fn elapsed(&mut self) -> Duration {
        let d = self.since.elapsed();
        self.consumed += d;
        d
    }

    /// 获得总共累计下来的时间 (以微秒为单位).
    #[inline]
    fn get_total_us(&self) -> u64 {
        self.consumed.as_micros() as u64
    }
}

/// 一次运行各阶段 (读取, 追踪, 后处理, 写出) 的耗时.
#[derive(Clone, Debug)]
pub struct Profile {
    /// 当前阶段计时.
    stage: AccTimer,

    /// 全部阶段的累计计时.
    real_time: AccTimer,

    /// 已结束的阶段, 按结束顺序排列.
    stages: Vec<(&'static str, Duration)>,
}

impl Profile {
    /// 初始化, 同时开始计时.
    #[inline]
    pub fn new() -> Self {
        Self {
            stage: AccTimer::new(),
            real_time: AccTimer::new(),
            stages: Vec::new(),
        }
    }

    /// 开始一个新阶段.
    #[inline]
    pub fn stage_start(&mut self) {
        self.stage.start();
    }

    /// 结束当前阶段并命名为 `name`.
    #[inline]
    pub fn stage_elapsed(&mut self, name: &'static str) {
        let d = self.stage.elapsed();
        log::debug!("stage `{name}` took {} ms", d.as_millis());
        self.stages.push((name, d));
    }

    /// 结束全部计时.
    #[inline]
    pub fn finish(mut self) -> Self {
        self.real_time.elapsed();
        self
    }

    /// 已结束的阶段.
    #[inline]
    pub fn stages(&self) -> &[(&'static str, Duration)] {
        &self.stages
    }

    /// 以微秒为单位获得全部阶段的总自然时间.
    #[inline]
    pub fn get_stage_time_us(&self) -> u64 {
        self.stage.get_total_us()
    }

    /// 以微秒为单位获得运行到目前的总自然时间 (需先 `finish`).
    #[inline]
    pub fn get_real_time_us(&self) -> u64 {
        self.real_time.get_total_us()
    }

    /// 最耗时的阶段.
    pub fn get_most_time_consuming(&self) -> Option<(&'static str, Duration)> {
        self.stages.iter().copied().max_by_key(|(_, d)| *d)
    }
}

impl Default for Profile {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stages() {
        let mut p = Profile::new();
        p.stage_start();
        p.stage_elapsed("load");
        p.stage_start();
        std::thread::sleep(Duration::from_millis(2));
        p.stage_elapsed("track");
        let p = p.finish();

        let names: Vec<_> = p.stages().iter().map(|(n, _)| *n).collect();
        assert_eq!(names, ["load", "track"]);
        assert_eq!(p.get_most_time_consuming().map(|(n, _)| n), Some("track"));
        assert!(p.get_real_time_us() >= p.get_stage_time_us());
        assert!(p.get_stage_time_us() >= 2000);
    }
}
