// 该文件是 Shanan （山南西风） 项目的一部分。
// src/channel/remote_channel.rs - 远程协议评测通道
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
use tracing::{debug, info, warn};

use crate::{
  channel::{Channel, ChannelError, check_object_count},
  frame::{Frame, ImageChannel},
  region::{Mask, Region, RegionFormat},
};

/// 远程协议支持的区域格式
pub const REMOTE_FORMATS: [RegionFormat; 3] = [
  RegionFormat::Rectangle,
  RegionFormat::Polygon,
  RegionFormat::Mask,
];

#[derive(Error, Debug)]
pub enum RemoteError {
  #[error("连接错误: {0}")]
  Connection(String),
  #[error("协议错误: {0}")]
  Protocol(String),
}

/// 远程协议自身的区域表示
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteRegion {
  Rectangle {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
  },
  Polygon(Vec<(f64, f64)>),
  Mask(Mask),
}

impl From<RemoteRegion> for Region {
  fn from(region: RemoteRegion) -> Self {
    match region {
      RemoteRegion::Rectangle {
        x,
        y,
        width,
        height,
      } => Region::rectangle(x, y, width, height),
      RemoteRegion::Polygon(points) => Region::Polygon { points },
      RemoteRegion::Mask(mask) => Region::Mask(mask),
    }
  }
}

impl TryFrom<Region> for RemoteRegion {
  type Error = ChannelError;

  fn try_from(region: Region) -> Result<Self, Self::Error> {
    match region {
      // 未找到目标在协议中记为零矩形
      Region::Empty => Ok(RemoteRegion::Rectangle {
        x: 0.0,
        y: 0.0,
        width: 0.0,
        height: 0.0,
      }),
      Region::Point { .. } => Err(ChannelError::UnsupportedRegion(RegionFormat::Point)),
      Region::Rectangle {
        x,
        y,
        width,
        height,
      } => Ok(RemoteRegion::Rectangle {
        x,
        y,
        width,
        height,
      }),
      Region::Polygon { points } => Ok(RemoteRegion::Polygon(points)),
      Region::Mask(mask) => Ok(RemoteRegion::Mask(mask)),
    }
  }
}

/// 远程服务发出的请求
#[derive(Debug, Clone)]
pub enum ServerRequest {
  Initialize {
    objects: Vec<RemoteRegion>,
    images: Vec<(ImageChannel, PathBuf)>,
  },
  Frame {
    objects: Vec<RemoteRegion>,
    images: Vec<(ImageChannel, PathBuf)>,
  },
  Quit,
}

/// 外部协议服务，负责请求/响应的收发
pub trait ProtocolServer {
  /// 协议库版本，如 `4.0.1`
  fn version(&self) -> String;

  fn open(
    &mut self,
    formats: &[RegionFormat],
    channels: &[ImageChannel],
    multiobject: bool,
  ) -> Result<(), RemoteError>;

  fn wait(&mut self) -> Result<ServerRequest, RemoteError>;

  fn status(&mut self, objects: Vec<RemoteRegion>) -> Result<(), RemoteError>;

  fn quit(&mut self) -> Result<(), RemoteError>;
}

pub struct RemoteChannel {
  server: Box<dyn ProtocolServer>,
  object_count: Option<usize>,
  closed: bool,
}

impl RemoteChannel {
  pub fn new(server: Box<dyn ProtocolServer>) -> Self {
    Self {
      server,
      object_count: None,
      closed: false,
    }
  }
}

impl Channel for RemoteChannel {
  fn start(
    &mut self,
    format: RegionFormat,
    channels: &[ImageChannel],
    multiobject: bool,
  ) -> Result<(Vec<Region>, Frame), ChannelError> {
    if self.closed {
      return Err(ChannelError::Closed);
    }
    if self.object_count.is_some() {
      return Err(ChannelError::ObjectsRedeclared);
    }
    if !REMOTE_FORMATS.contains(&format) {
      return Err(ChannelError::UnsupportedFormat(format));
    }

    info!("使用远程协议通道，版本 {}", self.server.version());
    self.server.open(&[format], channels, multiobject)?;

    let (objects, images) = match self.server.wait()? {
      ServerRequest::Initialize { objects, images } => (objects, images),
      other => {
        return Err(ChannelError::Remote(RemoteError::Protocol(format!(
          "期望初始化请求，实际收到 {:?}",
          other
        ))));
      }
    };
    check_object_count(objects.len(), multiobject)?;

    // 初始化请求需要立即以初始区域作答
    self.server.status(objects.clone())?;
    self.object_count = Some(objects.len());

    let regions = objects.into_iter().map(Region::from).collect();
    Ok((regions, Frame::new(images)))
  }

  fn next_frame(&mut self) -> Result<Option<Frame>, ChannelError> {
    if self.closed {
      return Err(ChannelError::Closed);
    }
    if self.object_count.is_none() {
      return Err(ChannelError::NotStarted);
    }
    match self.server.wait()? {
      ServerRequest::Frame { objects, images } => {
        if !objects.is_empty() {
          return Err(ChannelError::ObjectsRedeclared);
        }
        debug!("收到新帧: {:?}", images);
        Ok(Some(Frame::new(images)))
      }
      ServerRequest::Initialize { .. } => Err(ChannelError::ObjectsRedeclared),
      ServerRequest::Quit => Ok(None),
    }
  }

  fn send_status(&mut self, status: Vec<Region>) -> Result<(), ChannelError> {
    if self.closed {
      return Err(ChannelError::Closed);
    }
    let expected = self.object_count.ok_or(ChannelError::NotStarted)?;
    if status.len() != expected {
      return Err(ChannelError::StatusLengthMismatch {
        expected,
        actual: status.len(),
      });
    }
    let objects = status
      .into_iter()
      .map(RemoteRegion::try_from)
      .collect::<Result<Vec<_>, _>>()?;
    self.server.status(objects)?;
    Ok(())
  }

  fn close(&mut self) -> Result<(), ChannelError> {
    if self.closed {
      return Ok(());
    }
    self.closed = true;
    self.server.quit()?;
    info!("远程协议通道已关闭");
    Ok(())
  }
}

impl Drop for RemoteChannel {
  fn drop(&mut self) {
    if let Err(e) = self.close() {
      warn!("关闭远程协议通道失败: {}", e);
    }
  }
}
