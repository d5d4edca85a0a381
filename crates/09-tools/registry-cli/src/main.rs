//! # 服务注册命令行工具
//!
//! 对一个类输出目录执行一次服务注册转换，结果写入另一个目录。
//! 不给出任何变更参数时按全量构建处理。

use anyhow::Context;
use clap::Parser;
use infrastructure_composition::{
    DirectoryUnitSink, DirectoryUnitSource, TransformBuilder, TransformConfig,
};
use registry_abstractions::UnitStatus;
use std::path::PathBuf;
use tracing::{error, info};

/// 命令行参数
#[derive(Parser, Debug)]
#[command(name = "service-registry")]
#[command(about = "编译期服务注册转换")]
struct Args {
    /// 编译输出目录
    #[arg(short, long)]
    input: PathBuf,

    /// 转换结果目录
    #[arg(short, long)]
    output: PathBuf,

    /// 快照目录，覆盖配置文件中的设置
    #[arg(long)]
    temp_dir: Option<PathBuf>,

    /// 配置文件路径
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 全量构建，丢弃旧快照
    #[arg(long)]
    full: bool,

    /// 新增的单元（相对输入目录）
    #[arg(long, value_name = "PATH")]
    added: Vec<String>,

    /// 变更的单元（相对输入目录）
    #[arg(long, value_name = "PATH")]
    changed: Vec<String>,

    /// 删除的单元（相对输入目录）
    #[arg(long, value_name = "PATH")]
    removed: Vec<String>,

    /// 日志级别
    #[arg(long)]
    log_level: Option<String>,

    /// 输出 JSON 日志
    #[arg(long)]
    json_logs: bool,
}

impl Args {
    fn changes(&self) -> Vec<(String, UnitStatus)> {
        let tagged = |paths: &[String], status: UnitStatus| {
            paths
                .iter()
                .map(move |path| (path.clone(), status))
                .collect::<Vec<_>>()
        };
        let mut changes = tagged(&self.added, UnitStatus::Added);
        changes.extend(tagged(&self.changed, UnitStatus::Changed));
        changes.extend(tagged(&self.removed, UnitStatus::Removed));
        changes
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = TransformConfig::load(args.config.as_deref()).context("加载配置失败")?;
    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }
    if args.json_logs {
        config.logging.json = true;
    }
    if let Some(temp_dir) = &args.temp_dir {
        config.temp_dir = temp_dir.clone();
    }

    let changes = args.changes();
    config.incremental = config.incremental && !args.full && !changes.is_empty();

    let logging = config.logging.to_logging_config()?;
    let incremental = config.incremental;
    let mut transform = TransformBuilder::from_config(config)
        .with_logging(logging)
        .build()?;

    let source = if incremental {
        info!("增量构建，变更单元 {} 个", changes.len());
        DirectoryUnitSource::with_changes(&args.input, changes)
    } else {
        info!("全量构建");
        DirectoryUnitSource::new(&args.input)
    };
    let mut sink = DirectoryUnitSink::new(&args.output);

    match transform.transform(&source, &mut sink).await {
        Ok(report) => {
            println!("{}", report);
            Ok(())
        }
        Err(e) => {
            error!("转换失败: {}", e);
            Err(e).context(format!("转换 {} 失败", args.input.display()))
        }
    }
}
