// 该文件是 Shanan （山南西风） 项目的一部分。
// src/tracker/ncc.rs - 归一化互相关模板跟踪器
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

use image::{GrayImage, imageops};
use imageproc::template_matching::{MatchTemplateMethod, find_extremes, match_template};
use thiserror::Error;
use tracing::debug;

use crate::{
  frame::Frame,
  region::{Mask, Region},
  tracker::Tracker,
};

/// 低于该响应值时认为目标丢失
const RESPONSE_THRESHOLD: f32 = 0.5;

#[derive(Error, Debug)]
pub enum NccError {
  #[error("帧中没有图像路径")]
  MissingImage,
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("初始区域为空")]
  EmptyRegion,
  #[error("初始区域 {0:?} 与图像没有交集")]
  EmptyTemplate([f64; 4]),
}

fn load_gray(frame: &Frame) -> Result<GrayImage, NccError> {
  let path = frame.path().ok_or(NccError::MissingImage)?;
  Ok(image::open(path)?.to_luma8())
}

/// 在上一位置周围两倍目标大小的窗口内做模板匹配
pub struct NccTracker {
  template: GrayImage,
  position: (f64, f64),
  size: (f64, f64),
  window: f64,
  output_mask: bool,
}

impl NccTracker {
  pub fn new(frame: &Frame, region: &Region) -> Result<Self, NccError> {
    let image = load_gray(frame)?;
    let bounds = region.bounds().ok_or(NccError::EmptyRegion)?;
    let [x, y, width, height] = bounds;

    let left = x.max(0.0) as u32;
    let top = y.max(0.0) as u32;
    let right = (x + width).min(image.width() as f64 - 1.0).max(0.0) as u32;
    let bottom = (y + height).min(image.height() as f64 - 1.0).max(0.0) as u32;
    if right <= left || bottom <= top {
      return Err(NccError::EmptyTemplate(bounds));
    }
    let template = imageops::crop_imm(&image, left, top, right - left, bottom - top).to_image();

    Ok(Self {
      template,
      position: (x + width / 2.0, y + height / 2.0),
      size: (width, height),
      window: width.max(height) * 2.0,
      output_mask: matches!(region, Region::Mask(_)),
    })
  }

  pub fn factory(frame: &Frame, region: &Region) -> anyhow::Result<Self> {
    Ok(Self::new(frame, region)?)
  }

  fn last_rectangle(&self) -> [f64; 4] {
    [
      self.position.0 - self.size.0 / 2.0,
      self.position.1 - self.size.1 / 2.0,
      self.size.0,
      self.size.1,
    ]
  }

  fn output(&self, rect: [f64; 4], width: u32, height: u32) -> Region {
    if self.output_mask {
      Region::Mask(Mask::from_rectangle(rect, width as usize, height as usize))
    } else {
      Region::rectangle(rect[0], rect[1], rect[2], rect[3])
    }
  }
}

impl Tracker for NccTracker {
  fn track(&mut self, frame: &Frame) -> anyhow::Result<Region> {
    let image = load_gray(frame)?;
    let (width, height) = image.dimensions();
    let half = self.window / 2.0;

    let clamp = |v: f64, max: u32| v.round().clamp(0.0, max as f64) as u32;
    let left = clamp(self.position.0 - half, width.saturating_sub(1));
    let top = clamp(self.position.1 - half, height.saturating_sub(1));
    let right = clamp(self.position.0 + half, width.saturating_sub(1));
    let bottom = clamp(self.position.1 + half, height.saturating_sub(1));

    let (tw, th) = self.template.dimensions();
    if right.saturating_sub(left) < tw || bottom.saturating_sub(top) < th {
      // 搜索窗口放不下模板，沿用上一次的位置
      return Ok(self.output(self.last_rectangle(), width, height));
    }

    let cut = imageops::crop_imm(&image, left, top, right - left, bottom - top).to_image();
    let response = match_template(
      &cut,
      &self.template,
      MatchTemplateMethod::CrossCorrelationNormalized,
    );
    let extremes = find_extremes(&response);
    let (mx, my) = extremes.max_value_location;

    let rect = [
      (left + mx) as f64,
      (top + my) as f64,
      self.size.0,
      self.size.1,
    ];
    self.position = (rect[0] + self.size.0 / 2.0, rect[1] + self.size.1 / 2.0);

    if extremes.max_value < RESPONSE_THRESHOLD {
      debug!("匹配响应 {:.3} 过低，目标丢失", extremes.max_value);
      return Ok(Region::Empty);
    }
    Ok(self.output(rect, width, height))
  }
}

#[cfg(test)]
mod tests {
  use image::Luma;

  use super::*;
  use crate::frame::ImageChannel;

  fn write_frame(dir: &std::path::Path, name: &str, patch: (u32, u32)) -> Frame {
    let image = GrayImage::from_fn(64, 64, |x, y| {
      let inside = x >= patch.0 && x < patch.0 + 8 && y >= patch.1 && y < patch.1 + 8;
      if inside {
        Luma([((x - patch.0) * 37 + (y - patch.1) * 11) as u8 % 200 + 50])
      } else {
        Luma([0])
      }
    });
    let path = dir.join(name);
    image.save(&path).unwrap();
    Frame::single(ImageChannel::Color, path)
  }

  #[test]
  fn follows_a_shifted_patch() {
    let dir = tempfile::tempdir().unwrap();
    let first = write_frame(dir.path(), "0.png", (20, 20));
    let second = write_frame(dir.path(), "1.png", (24, 22));

    let mut tracker = NccTracker::new(&first, &Region::rectangle(20.0, 20.0, 8.0, 8.0)).unwrap();
    assert_eq!(
      tracker.track(&second).unwrap(),
      Region::rectangle(24.0, 22.0, 8.0, 8.0)
    );
  }

  #[test]
  fn mask_regions_produce_masks() {
    let dir = tempfile::tempdir().unwrap();
    let first = write_frame(dir.path(), "0.png", (20, 20));
    let mask = Mask::from_rectangle([20.0, 20.0, 8.0, 8.0], 64, 64);

    let mut tracker = NccTracker::factory(&first, &Region::Mask(mask.clone())).unwrap();
    let Region::Mask(tracked) = tracker.track(&first).unwrap() else {
      panic!("expected mask");
    };
    assert_eq!(tracked, mask);
  }

  #[test]
  fn empty_region_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let first = write_frame(dir.path(), "0.png", (20, 20));
    assert!(matches!(
      NccTracker::new(&first, &Region::Empty),
      Err(NccError::EmptyRegion)
    ));
  }
}
