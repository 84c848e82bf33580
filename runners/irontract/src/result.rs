//! 运行结果.

use crate::profile::Profile;
use std::io::{self, Write};
use std::path::PathBuf;
use tract_berry::config::ProductKind;

const S4: &str = "    ";

/// 一种密度产品的写出结果.
#[derive(Debug, Clone)]
pub struct ProductReport {
    /// 产品类型.
    pub kind: ProductKind,

    /// 过滤后的纤维条数.
    pub streamlines: usize,

    /// 写出的掩膜文件.
    pub files: Vec<PathBuf>,

    /// npz 归档.
    pub archive: PathBuf,
}

/// 将 `product` 的结果写进 `w` 中.
fn describe_into<W: Write>(p: &ProductReport, w: &mut W) -> io::Result<()> {
    writeln!(w, "Product `{}`:", p.kind)?;
    writeln!(w, "{S4}Streamlines after filtering: {}", p.streamlines)?;
    writeln!(w, "{S4}Operating points: {}", p.files.len())?;
    match (p.files.first(), p.files.last()) {
        (Some(first), Some(last)) => {
            writeln!(w, "{S4}First: {}", first.display())?;
            writeln!(w, "{S4}Last: {}", last.display())?;
        }
        _ => writeln!(w, "{S4}Empty stack, no masks written")?,
    }
    write!(w, "{S4}Archive: {}", p.archive.display())
}

/// 将运行计时写进 `w` 中.
fn describe_profile_into<W: Write>(p: &Profile, w: &mut W) -> io::Result<()> {
    writeln!(w, "Profile:")?;
    for (name, d) in p.stages() {
        writeln!(w, "{S4}Stage `{name}`: {} us", d.as_micros())?;
    }
    if let Some((name, _)) = p.get_most_time_consuming() {
        writeln!(w, "{S4}Most time-consuming stage: `{name}`")?;
    }
    writeln!(w, "{S4}Total stage time: {} us", p.get_stage_time_us())?;
    write!(w, "{S4}Total machine time: {} us", p.get_real_time_us())
}

/// 一次运行的最终结果.
#[derive(Debug)]
pub struct RunReport {
    /// 种子个数.
    pub seeds: usize,

    /// 追踪得到的纤维条数.
    pub streamlines: usize,

    /// 全部纤维的点数.
    pub points: usize,

    /// 各产品的写出结果.
    pub products: Vec<ProductReport>,

    /// 分阶段计时.
    pub profile: Profile,
}

impl RunReport {
    /// 将完整报告写进 `w` 中.
    pub fn describe_into<W: Write>(&self, w: &mut W) -> io::Result<()> {
        utils::sep_to(&mut *w)?;
        writeln!(w, "Seeds: {}", self.seeds)?;
        writeln!(w, "Streamlines: {} ({} points)", self.streamlines, self.points)?;
        utils::sep_to(&mut *w)?;
        for p in self.products.iter() {
            describe_into(p, w)?;
            writeln!(w)?;
            utils::sep_to(&mut *w)?;
        }
        describe_profile_into(&self.profile, w)?;
        writeln!(w)?;
        utils::sep_to(&mut *w)
    }

    /// 打印运行结果.
    pub fn analyze(&self) -> io::Result<()> {
        let stdout = io::stdout();
        let mut lock = stdout.lock();
        self.describe_into(&mut lock)
    }
}
