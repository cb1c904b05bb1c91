// 该文件是 Shanan （山南西风） 项目的一部分。
// src/args.rs - 项目参数配置
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use clap::{Parser, ValueEnum};
use url::Url;

use shanan_vot::{frame::ChannelSet, region::RegionFormat};

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackerKind {
  /// 每帧回报初始区域
  Static,
  /// 归一化互相关模板匹配
  #[cfg(feature = "ncc_tracker")]
  Ncc,
}

/// Shanan VOT 适配器参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 区域格式（rectangle、polygon、mask 或 point）
  #[arg(long, default_value = "rectangle", value_name = "FORMAT")]
  pub format: RegionFormat,

  /// 图像通道（color、rgbd、rgbt 或 ir）
  #[arg(long, default_value = "color", value_name = "CHANNELS")]
  pub channels: ChannelSet,

  /// 会话配置
  /// 例如: vot:///path/to/sequence?multiobject=1&remote=0
  /// 未指定时读取 VOT_USE_TRAX、VOT_MULTI_OBJECT，工作目录为当前目录
  #[arg(long, value_name = "SESSION")]
  pub session: Option<Url>,

  /// 是否为多目标模式，优先于会话配置
  #[arg(long, value_name = "BOOL")]
  pub multiobject: Option<bool>,

  /// 跟踪器
  #[arg(long, value_enum, default_value_t = TrackerKind::Static)]
  pub tracker: TrackerKind,

  /// 最大处理帧数（不含第一帧）
  #[arg(long, value_name = "FRAME_NUMBER")]
  pub frame_number: Option<usize>,
}
