// 该文件是 Shanan （山南西风） 项目的一部分。
// src/session.rs - 评测会话状态机
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

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
  channel::{Channel, ChannelError, ChannelWrapper},
  config::{ServerConnector, SessionConfig},
  frame::{ChannelSet, Frame},
  region::{Region, RegionFormat},
};

/// 会话状态，只能单向前进：Created → Initialized → Running → Closed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
  Created,
  Initialized,
  Running,
  Closed,
}

#[derive(Error, Debug)]
pub enum SessionError {
  #[error("会话处于 {state:?} 状态，不能调用 {operation}")]
  InvalidState {
    operation: &'static str,
    state: SessionState,
  },
  #[error("目标只能在初始化时声明一次")]
  AlreadyInitialized,
  #[error("目标数量非法: {count}（多目标模式: {multiobject}）")]
  ObjectCount { count: usize, multiobject: bool },
  #[error("多目标模式下不能取单一初始区域")]
  MultiObjectMode,
  #[error("状态数量 {actual} 与目标数量 {expected} 不一致")]
  StatusLengthMismatch { expected: usize, actual: usize },
  #[error("通道错误: {0}")]
  Channel(#[from] ChannelError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
  pub format: RegionFormat,
  pub channels: ChannelSet,
  pub multiobject: bool,
}

impl SessionOptions {
  pub fn new(format: RegionFormat) -> Self {
    Self {
      format,
      channels: ChannelSet::default(),
      multiobject: false,
    }
  }

  pub fn with_channels(mut self, channels: ChannelSet) -> Self {
    self.channels = channels;
    self
  }

  pub fn with_multiobject(mut self, multiobject: bool) -> Self {
    self.multiobject = multiobject;
    self
  }
}

/// 一次回报的内容：单目标模式下为一个区域，多目标模式下按初始顺序排列
#[derive(Debug, Clone, PartialEq)]
pub enum Status {
  Single(Region),
  Multiple(Vec<Region>),
}

impl Status {
  pub fn into_regions(self) -> Vec<Region> {
    match self {
      Status::Single(region) => vec![region],
      Status::Multiple(regions) => regions,
    }
  }
}

impl From<Region> for Status {
  fn from(region: Region) -> Self {
    Status::Single(region)
  }
}

impl From<Vec<Region>> for Status {
  fn from(regions: Vec<Region>) -> Self {
    Status::Multiple(regions)
  }
}

pub struct Session<C: Channel> {
  channel: C,
  options: SessionOptions,
  state: SessionState,
  objects: Vec<Region>,
  first_frame: Option<Frame>,
}

impl Session<ChannelWrapper> {
  /// 按配置选择后端并完成初始化
  pub fn from_config(
    config: &SessionConfig,
    format: RegionFormat,
    channels: ChannelSet,
    connector: Option<&dyn ServerConnector>,
  ) -> Result<Self, SessionError> {
    let options = SessionOptions::new(format)
      .with_channels(channels)
      .with_multiobject(config.multiobject);
    Self::open(config.resolve(connector), options)
  }
}

impl<C: Channel> Session<C> {
  pub fn new(channel: C, options: SessionOptions) -> Self {
    Self {
      channel,
      options,
      state: SessionState::Created,
      objects: Vec::new(),
      first_frame: None,
    }
  }

  pub fn open(channel: C, options: SessionOptions) -> Result<Self, SessionError> {
    let mut session = Self::new(channel, options);
    session.initialize()?;
    Ok(session)
  }

  /// 从通道取得初始目标与第一帧
  pub fn initialize(&mut self) -> Result<(), SessionError> {
    if self.state != SessionState::Created {
      return Err(SessionError::AlreadyInitialized);
    }

    let (objects, first_frame) = self.channel.start(
      self.options.format,
      self.options.channels.channels(),
      self.options.multiobject,
    )?;

    let count = objects.len();
    if count == 0 || (!self.options.multiobject && count > 1) {
      return Err(SessionError::ObjectCount {
        count,
        multiobject: self.options.multiobject,
      });
    }

    info!(
      "会话已初始化: 格式 {}，{} 个目标",
      self.options.format, count
    );
    self.objects = objects;
    self.first_frame = Some(first_frame);
    self.state = SessionState::Initialized;
    Ok(())
  }

  pub fn state(&self) -> SessionState {
    self.state
  }

  pub fn options(&self) -> &SessionOptions {
    &self.options
  }

  pub fn channel(&self) -> &C {
    &self.channel
  }

  pub fn objects(&self) -> Result<&[Region], SessionError> {
    if self.state == SessionState::Created {
      return Err(SessionError::InvalidState {
        operation: "objects",
        state: self.state,
      });
    }
    Ok(&self.objects)
  }

  /// 单目标模式下的初始区域
  pub fn region(&self) -> Result<&Region, SessionError> {
    if self.options.multiobject {
      return Err(SessionError::MultiObjectMode);
    }
    match self.objects()? {
      [region] => Ok(region),
      objects => Err(SessionError::ObjectCount {
        count: objects.len(),
        multiobject: false,
      }),
    }
  }

  /// 下一帧；第一次调用直接交出初始化时取得的帧，序列结束时为 None
  pub fn frame(&mut self) -> Result<Option<Frame>, SessionError> {
    match self.state {
      SessionState::Initialized => {
        self.state = SessionState::Running;
        Ok(self.first_frame.take())
      }
      SessionState::Running => {
        let frame = self.channel.next_frame()?;
        if frame.is_none() {
          debug!("序列结束");
        }
        Ok(frame)
      }
      state => Err(SessionError::InvalidState {
        operation: "frame",
        state,
      }),
    }
  }

  pub fn report(&mut self, status: impl Into<Status>) -> Result<(), SessionError> {
    if self.state != SessionState::Running {
      return Err(SessionError::InvalidState {
        operation: "report",
        state: self.state,
      });
    }

    let regions = status.into().into_regions();
    if regions.len() != self.objects.len() {
      return Err(SessionError::StatusLengthMismatch {
        expected: self.objects.len(),
        actual: regions.len(),
      });
    }
    self.channel.send_status(regions)?;
    Ok(())
  }

  pub fn quit(&mut self) -> Result<(), SessionError> {
    match self.state {
      SessionState::Created => Err(SessionError::InvalidState {
        operation: "quit",
        state: self.state,
      }),
      SessionState::Closed => Ok(()),
      _ => {
        self.channel.close()?;
        self.state = SessionState::Closed;
        self.first_frame = None;
        info!("会话已关闭");
        Ok(())
      }
    }
  }
}

impl<C: Channel> Drop for Session<C> {
  fn drop(&mut self) {
    if !matches!(
      self.state,
      SessionState::Initialized | SessionState::Running
    ) {
      return;
    }
    if let Err(e) = self.quit() {
      warn!("会话关闭失败: {}", e);
    }
  }
}
