// 该文件是 Shanan （山南西风） 项目的一部分。
// src/bin/static_multiobject.rs - 静态多目标跟踪示例
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use anyhow::Result;
use clap::Parser;
use url::Url;

use shanan_vot::{
  FromUrl,
  config::SessionConfig,
  frame::ChannelSet,
  region::RegionFormat,
  session::Session,
  task::{MultiObjectTask, Task},
  tracker::StaticTracker,
};
use tracing::info;

/// 每帧都回报所有目标的初始区域
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 会话配置
  #[arg(long, value_name = "SESSION")]
  pub session: Option<Url>,
  /// 区域格式
  #[arg(long, default_value = "mask", value_name = "FORMAT")]
  pub format: RegionFormat,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  let config = match &args.session {
    Some(url) => SessionConfig::from_url(url)?,
    None => SessionConfig::from_env(),
  }
  .with_multiobject(Some(true));
  info!("工作目录: {}", config.workdir.display());

  let session = Session::from_config(&config, args.format, ChannelSet::Color, None)?;
  MultiObjectTask::default().run_task(session, StaticTracker::factory)?;

  Ok(())
}
