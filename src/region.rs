// 该文件是 Shanan （山南西风） 项目的一部分。
// src/region.rs - 目标区域定义
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

use std::{fmt, str::FromStr};

use thiserror::Error;

pub mod codec;
pub use self::codec::{DecodeError, decode, encode, validate};

/// 二值掩码，覆盖整幅输出画布，按行优先存储 0/1
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
  data: Box<[u8]>,
  width: usize,
  height: usize,
}

impl Mask {
  /// 创建全零掩码
  pub fn new(width: usize, height: usize) -> Self {
    Self {
      data: vec![0u8; width * height].into_boxed_slice(),
      width,
      height,
    }
  }

  /// 创建全零掩码，像素数溢出时返回 None
  pub fn try_new(width: usize, height: usize) -> Option<Self> {
    let cells = width.checked_mul(height)?;
    Some(Self {
      data: vec![0u8; cells].into_boxed_slice(),
      width,
      height,
    })
  }

  /// 从行优先数据创建掩码，长度不匹配时返回 None；非零值统一记为 1
  pub fn from_raw(width: usize, height: usize, data: Vec<u8>) -> Option<Self> {
    if width.checked_mul(height) != Some(data.len()) {
      return None;
    }
    let data = data.into_iter().map(|v| u8::from(v != 0)).collect();
    Some(Self {
      data,
      width,
      height,
    })
  }

  /// 由矩形 [x, y, width, height] 生成指定画布大小的掩码，坐标四舍五入并裁剪到画布内
  pub fn from_rectangle(rect: [f64; 4], width: usize, height: usize) -> Self {
    let mut mask = Self::new(width, height);
    let clamp = |v: f64, max: usize| (v.round().max(0.0) as usize).min(max);
    let x0 = clamp(rect[0], width);
    let y0 = clamp(rect[1], height);
    let x1 = clamp(rect[0] + rect[2], width);
    let y1 = clamp(rect[1] + rect[3], height);
    for y in y0..y1 {
      mask.data[y * width + x0..y * width + x1.max(x0)].fill(1);
    }
    mask
  }

  pub fn width(&self) -> usize {
    self.width
  }

  pub fn height(&self) -> usize {
    self.height
  }

  pub fn as_slice(&self) -> &[u8] {
    &self.data
  }

  pub fn get(&self, x: usize, y: usize) -> bool {
    x < self.width && y < self.height && self.data[y * self.width + x] != 0
  }

  pub fn set(&mut self, x: usize, y: usize, value: bool) {
    if x < self.width && y < self.height {
      self.data[y * self.width + x] = u8::from(value);
    }
  }

  pub fn is_empty(&self) -> bool {
    self.data.iter().all(|&v| v == 0)
  }

  /// 非零像素的最小外接框 (x, y, width, height)，全零时为 None
  pub fn bounding_box(&self) -> Option<(usize, usize, usize, usize)> {
    let mut bounds: Option<(usize, usize, usize, usize)> = None;
    for (index, _) in self.data.iter().enumerate().filter(|(_, v)| **v != 0) {
      let (x, y) = (index % self.width, index / self.width);
      bounds = Some(match bounds {
        None => (x, y, x, y),
        Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
      });
    }
    bounds.map(|(x0, y0, x1, y1)| (x0, y0, x1 - x0 + 1, y1 - y0 + 1))
  }

  /// 向右、向下补零或裁剪到指定大小
  ///
  /// 解码得到的掩码只延伸到目标右下角，与图像尺寸对齐前需要调用此函数。
  pub fn fit(&self, width: usize, height: usize) -> Self {
    if width == self.width && height == self.height {
      return self.clone();
    }
    let mut mask = Self::new(width, height);
    let copy_w = width.min(self.width);
    for y in 0..height.min(self.height) {
      let src = &self.data[y * self.width..y * self.width + copy_w];
      mask.data[y * width..y * width + copy_w].copy_from_slice(src);
    }
    mask
  }
}

/// 区域格式标签
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegionFormat {
  Empty,
  Point,
  Rectangle,
  Polygon,
  Mask,
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("未知的区域格式: {0}")]
pub struct UnknownRegionFormat(pub String);

impl RegionFormat {
  pub fn as_str(&self) -> &'static str {
    match self {
      RegionFormat::Empty => "empty",
      RegionFormat::Point => "point",
      RegionFormat::Rectangle => "rectangle",
      RegionFormat::Polygon => "polygon",
      RegionFormat::Mask => "mask",
    }
  }
}

impl fmt::Display for RegionFormat {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for RegionFormat {
  type Err = UnknownRegionFormat;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "empty" => Ok(RegionFormat::Empty),
      "point" => Ok(RegionFormat::Point),
      "rectangle" => Ok(RegionFormat::Rectangle),
      "polygon" => Ok(RegionFormat::Polygon),
      "mask" => Ok(RegionFormat::Mask),
      other => Err(UnknownRegionFormat(other.to_string())),
    }
  }
}

/// 被跟踪目标的位置
#[derive(Debug, Clone, PartialEq)]
pub enum Region {
  /// 目标未找到
  Empty,
  Point {
    x: f64,
    y: f64,
  },
  Rectangle {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
  },
  Polygon {
    points: Vec<(f64, f64)>,
  },
  Mask(Mask),
}

impl Region {
  pub fn rectangle(x: f64, y: f64, width: f64, height: f64) -> Self {
    Region::Rectangle {
      x,
      y,
      width,
      height,
    }
  }

  pub fn format(&self) -> RegionFormat {
    match self {
      Region::Empty => RegionFormat::Empty,
      Region::Point { .. } => RegionFormat::Point,
      Region::Rectangle { .. } => RegionFormat::Rectangle,
      Region::Polygon { .. } => RegionFormat::Polygon,
      Region::Mask(_) => RegionFormat::Mask,
    }
  }

  /// 轴对齐外接框 [x, y, width, height]
  pub fn bounds(&self) -> Option<[f64; 4]> {
    match self {
      Region::Empty => None,
      Region::Point { x, y } => Some([*x, *y, 0.0, 0.0]),
      Region::Rectangle {
        x,
        y,
        width,
        height,
      } => Some([*x, *y, *width, *height]),
      Region::Polygon { points } => {
        let (first, rest) = points.split_first()?;
        let (mut x0, mut y0, mut x1, mut y1) = (first.0, first.1, first.0, first.1);
        for (x, y) in rest {
          x0 = x0.min(*x);
          y0 = y0.min(*y);
          x1 = x1.max(*x);
          y1 = y1.max(*y);
        }
        Some([x0, y0, x1 - x0, y1 - y0])
      }
      Region::Mask(mask) => mask
        .bounding_box()
        .map(|(x, y, w, h)| [x as f64, y as f64, w as f64, h as f64]),
    }
  }
}

impl From<Mask> for Region {
  fn from(mask: Mask) -> Self {
    Region::Mask(mask)
  }
}
