//! 概率纤维追踪与密度图阈值量化.
//!
//! 输入目录下需要 `*fa.nii.gz`, `*odf.nii.gz`, `*inject.nii.gz`, ROI 后处理时还需要
//! `*rois.nii.gz`, DSI 数据还需要离散 PMF 的顶点表 `*sphere.npy`. 目录和配置见 `utils::loader`.

mod profile;
mod result;
mod runner;

use std::process::ExitCode;

use log::LevelFilter;
use simple_logger::SimpleLogger;

fn main() -> ExitCode {
    // `RUST_LOG` 可以覆盖默认的日志级别.
    if let Err(e) = SimpleLogger::new().with_level(LevelFilter::Info).env().init() {
        eprintln!("cannot install logger: {e}");
    }

    match runner::run() {
        Ok(report) => {
            if let Err(e) = report.analyze() {
                log::error!("cannot print report: {e}");
                return ExitCode::FAILURE;
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
