// 该文件是 Shanan （山南西风） 项目的一部分。
// src/region/codec.rs - 区域文本编解码
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

//! 区域的单行文本格式：
//!
//! - `0` 空区域
//! - `x,y` 点
//! - `x,y,w,h` 矩形
//! - `x1,y1,x2,y2,...` 多边形（超过 4 个数且为偶数）
//! - `m{ox},{oy},{w},{h},{r0,r1,...}` 掩码，外接框内按行优先做游程编码，
//!   第一个游程总是 0 值（可以为长度 0），之后 0/1 交替

use thiserror::Error;

use super::{Mask, Region, RegionFormat};

const MASK_MARKER: char = 'm';

/// 解码掩码时允许的最大画布像素数
pub const MAX_MASK_CELLS: usize = 1 << 28;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
  #[error("区域行为空")]
  EmptyLine,
  #[error("无法解析的数值: {0:?}")]
  InvalidNumber(String),
  #[error("无法识别的数值个数: {0}")]
  InvalidTokenCount(usize),
  #[error("掩码头部不完整，需要 4 个数值，实际 {0} 个")]
  MaskHeader(usize),
  #[error("掩码游程越界: 外接框共 {capacity} 个像素，游程总长至少 {required}")]
  MaskOverflow { capacity: usize, required: usize },
  #[error("掩码画布过大: {width}x{height}，上限 {limit} 个像素")]
  MaskTooLarge {
    width: usize,
    height: usize,
    limit: usize,
  },
}

/// 将区域编码为一行文本（不含换行符）
pub fn encode(region: &Region) -> String {
  match region {
    Region::Empty => "0".to_string(),
    Region::Point { x, y } => format!("{},{}", x, y),
    Region::Rectangle {
      x,
      y,
      width,
      height,
    } => format!("{},{},{},{}", x, y, width, height),
    Region::Polygon { points } => points
      .iter()
      .map(|(x, y)| format!("{},{}", x, y))
      .collect::<Vec<_>>()
      .join(","),
    Region::Mask(mask) => encode_mask(mask),
  }
}

fn encode_mask(mask: &Mask) -> String {
  // 全零掩码没有外接框，按空区域输出
  let Some((ox, oy, width, height)) = mask.bounding_box() else {
    return "0".to_string();
  };

  // 从 0 值游程开始计数，外接框首像素为 1 时自然产生一个长度为 0 的前导游程
  let mut runs = Vec::new();
  let mut current = false;
  let mut count = 0usize;
  for y in oy..oy + height {
    for x in ox..ox + width {
      let value = mask.get(x, y);
      if value == current {
        count += 1;
      } else {
        runs.push(count);
        current = value;
        count = 1;
      }
    }
  }
  runs.push(count);

  let runs = runs
    .iter()
    .map(usize::to_string)
    .collect::<Vec<_>>()
    .join(",");
  format!("{MASK_MARKER}{ox},{oy},{width},{height},{runs}")
}

/// 从一行文本解码区域
pub fn decode(line: &str) -> Result<Region, DecodeError> {
  let line = line.trim();
  if line.is_empty() {
    return Err(DecodeError::EmptyLine);
  }

  if let Some(body) = line.strip_prefix(MASK_MARKER) {
    return decode_mask(body).map(Region::Mask);
  }

  let tokens = line
    .split(',')
    .map(|token| {
      token
        .trim()
        .parse::<f64>()
        .map_err(|_| DecodeError::InvalidNumber(token.to_string()))
    })
    .collect::<Result<Vec<_>, _>>()?;

  match tokens.as_slice() {
    [_] => Ok(Region::Empty),
    [x, y] => Ok(Region::Point { x: *x, y: *y }),
    [x, y, width, height] => Ok(Region::rectangle(*x, *y, *width, *height)),
    values if values.len() > 4 && values.len() % 2 == 0 => Ok(Region::Polygon {
      points: values.chunks_exact(2).map(|p| (p[0], p[1])).collect(),
    }),
    values => Err(DecodeError::InvalidTokenCount(values.len())),
  }
}

fn decode_mask(body: &str) -> Result<Mask, DecodeError> {
  // 只容许一个结尾逗号，其余空字段都是错误
  let body = body.strip_suffix(',').unwrap_or(body);
  let values = body
    .split(',')
    .map(|token| {
      token
        .trim()
        .parse::<usize>()
        .map_err(|_| DecodeError::InvalidNumber(token.to_string()))
    })
    .collect::<Result<Vec<_>, _>>()?;

  let [ox, oy, width, height, runs @ ..] = values.as_slice() else {
    return Err(DecodeError::MaskHeader(values.len()));
  };
  let (ox, oy, width, height) = (*ox, *oy, *width, *height);

  let too_large = |w: usize, h: usize| DecodeError::MaskTooLarge {
    width: w,
    height: h,
    limit: MAX_MASK_CELLS,
  };
  let (Some(canvas_w), Some(canvas_h)) = (ox.checked_add(width), oy.checked_add(height)) else {
    return Err(too_large(ox.saturating_add(width), oy.saturating_add(height)));
  };
  // 画布不小于外接框，画布受限即外接框受限
  if canvas_w
    .checked_mul(canvas_h)
    .is_none_or(|cells| cells > MAX_MASK_CELLS)
  {
    return Err(too_large(canvas_w, canvas_h));
  }
  let capacity = width * height;

  // 偶数下标为 0 值游程（缓冲区已为零，直接跳过），奇数下标写 1
  let mut patch = vec![0u8; capacity];
  let mut index = 0usize;
  for (i, run) in runs.iter().enumerate() {
    let end = index
      .checked_add(*run)
      .filter(|end| *end <= capacity)
      .ok_or(DecodeError::MaskOverflow {
        capacity,
        required: index.saturating_add(*run),
      })?;
    if i % 2 == 1 {
      patch[index..end].fill(1);
    }
    index = end;
  }

  let mut mask = Mask::try_new(canvas_w, canvas_h).ok_or(too_large(canvas_w, canvas_h))?;
  for (i, value) in patch.iter().enumerate() {
    if *value != 0 {
      mask.set(ox + i % width, oy + i / width, true);
    }
  }
  Ok(mask)
}

/// 区域格式是否在允许集合内
pub fn validate(region: &Region, allowed: &[RegionFormat]) -> bool {
  allowed.contains(&region.format())
}
