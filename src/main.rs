// 该文件是 Shanan （山南西风） 项目的一部分。
// src/main.rs - 项目主程序
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

mod args;

use std::sync::{
  Arc,
  atomic::{AtomicBool, Ordering},
};

use anyhow::Result;
use clap::Parser;
use tracing::info;

use args::TrackerKind;
use shanan_vot::{
  FromUrl,
  channel::ChannelWrapper,
  config::SessionConfig,
  session::Session,
  task::{MultiObjectTask, SingleObjectTask, Task},
  tracker::{StaticTracker, TrackerFactory},
};

fn run<F: TrackerFactory>(
  session: Session<ChannelWrapper>,
  factory: F,
  frame_number: Option<usize>,
  stop: Arc<AtomicBool>,
) -> Result<()> {
  if session.options().multiobject {
    MultiObjectTask::default()
      .with_frame_number(frame_number)
      .with_stop_flag(stop)
      .run_task(session, factory)
  } else {
    SingleObjectTask::default()
      .with_frame_number(frame_number)
      .with_stop_flag(stop)
      .run_task(session, factory)
  }
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = args::Args::parse();

  let config = match &args.session {
    Some(url) => SessionConfig::from_url(url)?,
    None => SessionConfig::from_env(),
  }
  .with_multiobject(args.multiobject);

  info!("区域格式: {}", args.format);
  info!("图像通道: {:?}", args.channels.channels());
  info!("工作目录: {}", config.workdir.display());
  info!("多目标模式: {}", config.multiobject);
  info!("跟踪器: {:?}", args.tracker);

  // 远程协议服务由外部评测工具提供，这里没有连接器时会回退到本地文件
  let session = Session::from_config(&config, args.format, args.channels, None)?;

  let stop = Arc::new(AtomicBool::new(false));
  {
    let stop = stop.clone();
    ctrlc::set_handler(move || {
      info!("收到中断信号，准备退出...");
      stop.store(true, Ordering::SeqCst);
    })?;
  }

  match args.tracker {
    TrackerKind::Static => run(session, StaticTracker::factory, args.frame_number, stop)?,
    #[cfg(feature = "ncc_tracker")]
    TrackerKind::Ncc => run(
      session,
      shanan_vot::tracker::NccTracker::factory,
      args.frame_number,
      stop,
    )?,
  }

  info!("处理完成!");
  Ok(())
}
