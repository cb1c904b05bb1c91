// 该文件是 Shanan （山南西风） 项目的一部分。
// src/frame.rs - 帧与图像通道定义
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

use std::{
  fmt,
  path::{Path, PathBuf},
  str::FromStr,
};

use thiserror::Error;

/// 图像通道
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ImageChannel {
  Color,
  Depth,
  Ir,
}

impl ImageChannel {
  pub fn as_str(&self) -> &'static str {
    match self {
      ImageChannel::Color => "color",
      ImageChannel::Depth => "depth",
      ImageChannel::Ir => "ir",
    }
  }
}

impl fmt::Display for ImageChannel {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("非法的通道配置: {0}")]
pub struct IllegalChannels(pub String);

/// 跟踪器支持的通道组合
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelSet {
  #[default]
  Color,
  Rgbd,
  Rgbt,
  Ir,
}

impl ChannelSet {
  pub fn channels(&self) -> &'static [ImageChannel] {
    match self {
      ChannelSet::Color => &[ImageChannel::Color],
      ChannelSet::Rgbd => &[ImageChannel::Color, ImageChannel::Depth],
      ChannelSet::Rgbt => &[ImageChannel::Color, ImageChannel::Ir],
      ChannelSet::Ir => &[ImageChannel::Ir],
    }
  }
}

impl FromStr for ChannelSet {
  type Err = IllegalChannels;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "color" => Ok(ChannelSet::Color),
      "rgbd" => Ok(ChannelSet::Rgbd),
      "rgbt" => Ok(ChannelSet::Rgbt),
      "ir" => Ok(ChannelSet::Ir),
      other => Err(IllegalChannels(other.to_string())),
    }
  }
}

/// 一步中交付的图像路径，每个通道一条
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
  images: Vec<(ImageChannel, PathBuf)>,
}

impl Frame {
  pub fn new(images: Vec<(ImageChannel, PathBuf)>) -> Self {
    Self { images }
  }

  pub fn single(channel: ImageChannel, path: impl Into<PathBuf>) -> Self {
    Self {
      images: vec![(channel, path.into())],
    }
  }

  /// 第一个通道（通常为彩色）的图像路径
  pub fn path(&self) -> Option<&Path> {
    self.images.first().map(|(_, p)| p.as_path())
  }

  pub fn channel(&self, channel: ImageChannel) -> Option<&Path> {
    self
      .images
      .iter()
      .find(|(c, _)| *c == channel)
      .map(|(_, p)| p.as_path())
  }

  pub fn images(&self) -> &[(ImageChannel, PathBuf)] {
    &self.images
  }

  pub fn len(&self) -> usize {
    self.images.len()
  }

  pub fn is_empty(&self) -> bool {
    self.images.is_empty()
  }
}
