use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Args;
use dxfmerge_config::MergeConfig;
use dxfmerge_engine::{MergeDriver, MergeOptions, MergeReport, collapse_to_group};
use dxfmerge_io::{DocumentLoader, DocumentSaver, DxfFacade};
use tracing::{info, warn};

use crate::sources::collect_sources;

#[derive(Debug, Args)]
pub struct MergeArgs {
    /// 合并结果的输出路径
    pub output: PathBuf,

    /// 按顺序合并的源文件
    pub files: Vec<PathBuf>,

    /// 额外合并该目录下（不递归）的全部匹配文件，按文件名排序
    #[arg(long)]
    pub folder: Option<PathBuf>,

    /// 目录扫描的扩展名，默认取配置中的值
    #[arg(long)]
    pub extension: Option<String>,

    /// 每个源文件的实体放到以文件名命名的图层
    #[arg(long)]
    pub layer_per_source: bool,

    /// 把合并报告以 JSON 写到该路径
    #[arg(long)]
    pub report: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct CollapseArgs {
    /// 需要处理的文件
    pub files: Vec<PathBuf>,

    /// 处理该目录下（不递归）的全部匹配文件
    #[arg(long)]
    pub folder: Option<PathBuf>,

    #[arg(long)]
    pub extension: Option<String>,

    /// 结果写入的目录，文件名保持不变
    #[arg(long)]
    pub out_dir: PathBuf,
}

fn extension_for<'a>(requested: Option<&'a str>, config: &'a MergeConfig) -> &'a str {
    requested
        .map(|ext| ext.trim_start_matches('.'))
        .unwrap_or_else(|| config.extension())
}

pub fn merge(args: &MergeArgs, config: &MergeConfig) -> Result<MergeReport> {
    let extension = extension_for(args.extension.as_deref(), config);
    let mut sources = collect_sources(&args.files, args.folder.as_deref(), extension)?;
    // 输出文件位于扫描目录时，不把上一次的结果再并进来。
    sources.retain(|path| path != &args.output);

    let options = MergeOptions {
        layer_per_source: args.layer_per_source || config.layer_per_source,
        default_layer: config.default_layer.clone(),
    };
    let driver = MergeDriver::new(DxfFacade::new(), DxfFacade::new(), options);
    let report = driver
        .run(&sources, &args.output)
        .with_context(|| format!("合并到 {} 失败", args.output.display()))?;

    if let Some(path) = &args.report {
        write_report(&report, path)?;
    }
    println!(
        "merged {} of {} files into {} ({} entities, {} warnings)",
        report.totals.succeeded,
        report.totals.sources,
        report.output.display(),
        report.totals.entities_copied,
        report.totals.warnings,
    );
    Ok(report)
}

fn write_report(report: &MergeReport, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("序列化合并报告失败")?;
    fs::write(path, json).with_context(|| format!("写入报告 {} 失败", path.display()))?;
    info!(path = %path.display(), "合并报告已写出");
    Ok(())
}

/// 把每个文件的全部实体收进以文件名命名的组，结果写到输出目录。
pub fn collapse(args: &CollapseArgs, config: &MergeConfig) -> Result<usize> {
    let extension = extension_for(args.extension.as_deref(), config);
    let sources = collect_sources(&args.files, args.folder.as_deref(), extension)?;
    fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("无法创建输出目录 {}", args.out_dir.display()))?;

    let facade = DxfFacade::new();
    let mut failed = 0;
    for path in &sources {
        info!(path = %path.display(), "处理文件");
        if let Err(err) = collapse_file(&facade, path, &args.out_dir) {
            warn!(path = %path.display(), error = %format!("{err:#}"), "处理失败，跳过");
            failed += 1;
        }
    }

    let done = sources.len() - failed;
    println!("collapsed {done} of {} files into {}", sources.len(), args.out_dir.display());
    if failed > 0 {
        bail!("{failed} of {} files could not be collapsed", sources.len());
    }
    Ok(done)
}

fn collapse_file(facade: &DxfFacade, path: &Path, out_dir: &Path) -> Result<()> {
    let (Some(stem), Some(file_name)) = (path.file_stem(), path.file_name()) else {
        bail!("{} 不是文件路径", path.display());
    };
    let name = stem.to_string_lossy();

    let mut document = facade.load(path)?;
    let report = collapse_to_group(&mut document, &name)
        .with_context(|| format!("无法以 {name:?} 为组名"))?;
    for (index, error) in &report.dropped {
        warn!(path = %path.display(), index, error = %error, "实体无法复制，已丢弃");
    }

    let output = out_dir.join(file_name);
    facade.save(&document, &output)?;
    info!(
        path = %path.display(),
        output = %output.display(),
        moved = report.moved,
        "已收进组"
    );
    Ok(())
}
