// 该文件是 Shanan （山南西风） 项目的一部分。
// src/tracker.rs - 单目标跟踪器接口
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

use crate::{frame::Frame, region::Region};

#[cfg(feature = "ncc_tracker")]
mod ncc;
#[cfg(feature = "ncc_tracker")]
pub use self::ncc::{NccError, NccTracker};

/// 逐帧更新一个目标
pub trait Tracker {
  fn track(&mut self, frame: &Frame) -> anyhow::Result<Region>;
}

impl<F> Tracker for F
where
  F: FnMut(&Frame) -> anyhow::Result<Region>,
{
  fn track(&mut self, frame: &Frame) -> anyhow::Result<Region> {
    self(frame)
  }
}

/// 用第一帧和初始区域创建跟踪器
pub trait TrackerFactory {
  type Tracker: Tracker;

  fn create(&self, frame: &Frame, region: &Region) -> anyhow::Result<Self::Tracker>;
}

impl<F, T> TrackerFactory for F
where
  F: Fn(&Frame, &Region) -> anyhow::Result<T>,
  T: Tracker,
{
  type Tracker = T;

  fn create(&self, frame: &Frame, region: &Region) -> anyhow::Result<T> {
    self(frame, region)
  }
}

/// 每帧都回报初始区域
#[derive(Debug, Clone)]
pub struct StaticTracker {
  region: Region,
}

impl StaticTracker {
  pub fn new(region: Region) -> Self {
    Self { region }
  }

  pub fn factory(_frame: &Frame, region: &Region) -> anyhow::Result<Self> {
    Ok(Self::new(region.clone()))
  }
}

impl Tracker for StaticTracker {
  fn track(&mut self, _frame: &Frame) -> anyhow::Result<Region> {
    Ok(self.region.clone())
  }
}
