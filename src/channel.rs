// 该文件是 Shanan （山南西风） 项目的一部分。
// src/channel.rs - 评测通道定义
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::path::PathBuf;

use thiserror::Error;

use crate::{
  frame::{Frame, ImageChannel},
  region::{DecodeError, Region, RegionFormat},
};

mod file_channel;
mod remote_channel;

pub use self::file_channel::FileChannel;
pub use self::remote_channel::{
  ProtocolServer, RemoteChannel, RemoteError, RemoteRegion, ServerRequest,
};

#[cfg(test)]
pub(crate) use self::remote_channel::tests as remote_testing;

#[derive(Error, Debug)]
pub enum ChannelError {
  // 配置错误
  #[error("缺少通道 {channel} 的帧列表文件: {}", .path.display())]
  MissingFramesFile { channel: ImageChannel, path: PathBuf },
  #[error("各通道帧列表行数不一致: {0:?}")]
  FrameCountMismatch(Vec<(ImageChannel, usize)>),
  #[error("帧列表为空")]
  EmptySequence,
  #[error("目录 {} 中未找到查询文件", .0.display())]
  NoQueryFile(PathBuf),
  #[error("查询文件 {} 的起始偏移为 {offset}，仅支持 0", .file.display())]
  UnsupportedOffset { file: PathBuf, offset: i64 },
  #[error("查询文件 {} 格式错误: {reason}", .file.display())]
  InvalidQuery { file: PathBuf, reason: String },
  #[error("查询文件 {} 区域解码失败: {source}", .file.display())]
  QueryDecode {
    file: PathBuf,
    #[source]
    source: DecodeError,
  },
  #[error("后端不支持区域格式: {0}")]
  UnsupportedFormat(RegionFormat),

  // 协议违例
  #[error("区域格式 {found} 不在允许范围 {allowed} 内（来源: {origin}）")]
  InvalidRegionFormat {
    origin: String,
    found: RegionFormat,
    allowed: RegionFormat,
  },
  #[error("只能在初始化时声明目标")]
  ObjectsRedeclared,
  #[error("状态数量 {actual} 与目标数量 {expected} 不一致")]
  StatusLengthMismatch { expected: usize, actual: usize },
  #[error("目标数量非法: {count}（多目标模式: {multiobject}）")]
  ObjectCount { count: usize, multiobject: bool },
  #[error("无法在远程协议中表达的区域: {0}")]
  UnsupportedRegion(RegionFormat),
  #[error("通道尚未启动")]
  NotStarted,
  #[error("通道已关闭")]
  Closed,

  #[error("远程服务错误: {0}")]
  Remote(#[from] RemoteError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

impl ChannelError {
  /// 缺失或不匹配的配置文件等，不可重试
  pub fn is_configuration(&self) -> bool {
    matches!(
      self,
      ChannelError::MissingFramesFile { .. }
        | ChannelError::FrameCountMismatch(_)
        | ChannelError::EmptySequence
        | ChannelError::NoQueryFile(_)
        | ChannelError::UnsupportedOffset { .. }
        | ChannelError::InvalidQuery { .. }
        | ChannelError::QueryDecode { .. }
        | ChannelError::UnsupportedFormat(_)
    )
  }

  /// 调用方或后端违反协议约定
  pub fn is_protocol_violation(&self) -> bool {
    matches!(
      self,
      ChannelError::InvalidRegionFormat { .. }
        | ChannelError::ObjectsRedeclared
        | ChannelError::StatusLengthMismatch { .. }
        | ChannelError::ObjectCount { .. }
        | ChannelError::UnsupportedRegion(_)
        | ChannelError::NotStarted
        | ChannelError::Closed
    )
  }
}

/// 连接评测端的传输能力
pub trait Channel {
  /// 声明区域格式与通道，取得全部初始目标与第一帧
  fn start(
    &mut self,
    format: RegionFormat,
    channels: &[ImageChannel],
    multiobject: bool,
  ) -> Result<(Vec<Region>, Frame), ChannelError>;

  /// 下一帧，序列结束时为 None
  fn next_frame(&mut self) -> Result<Option<Frame>, ChannelError>;

  /// 按初始目标顺序回报每个目标的区域
  fn send_status(&mut self, status: Vec<Region>) -> Result<(), ChannelError>;

  /// 可重复调用
  fn close(&mut self) -> Result<(), ChannelError>;
}

pub(crate) fn check_object_count(count: usize, multiobject: bool) -> Result<(), ChannelError> {
  if count == 0 || (!multiobject && count > 1) {
    return Err(ChannelError::ObjectCount { count, multiobject });
  }
  Ok(())
}

pub enum ChannelWrapper {
  Remote(RemoteChannel),
  File(FileChannel),
}

impl ChannelWrapper {
  pub fn as_file(&self) -> Option<&FileChannel> {
    match self {
      ChannelWrapper::File(channel) => Some(channel),
      ChannelWrapper::Remote(_) => None,
    }
  }
}

impl From<FileChannel> for ChannelWrapper {
  fn from(channel: FileChannel) -> Self {
    ChannelWrapper::File(channel)
  }
}

impl From<RemoteChannel> for ChannelWrapper {
  fn from(channel: RemoteChannel) -> Self {
    ChannelWrapper::Remote(channel)
  }
}

impl Channel for ChannelWrapper {
  fn start(
    &mut self,
    format: RegionFormat,
    channels: &[ImageChannel],
    multiobject: bool,
  ) -> Result<(Vec<Region>, Frame), ChannelError> {
    match self {
      ChannelWrapper::Remote(channel) => channel.start(format, channels, multiobject),
      ChannelWrapper::File(channel) => channel.start(format, channels, multiobject),
    }
  }

  fn next_frame(&mut self) -> Result<Option<Frame>, ChannelError> {
    match self {
      ChannelWrapper::Remote(channel) => channel.next_frame(),
      ChannelWrapper::File(channel) => channel.next_frame(),
    }
  }

  fn send_status(&mut self, status: Vec<Region>) -> Result<(), ChannelError> {
    match self {
      ChannelWrapper::Remote(channel) => channel.send_status(status),
      ChannelWrapper::File(channel) => channel.send_status(status),
    }
  }

  fn close(&mut self) -> Result<(), ChannelError> {
    match self {
      ChannelWrapper::Remote(channel) => channel.close(),
      ChannelWrapper::File(channel) => channel.close(),
    }
  }
}
