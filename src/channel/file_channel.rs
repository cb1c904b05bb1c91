// 该文件是 Shanan （山南西风） 项目的一部分。
// src/channel/file_channel.rs - 本地文件评测通道
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
  collections::BTreeMap,
  fs,
  path::{Path, PathBuf},
};

use tracing::{debug, error, info, warn};

use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  channel::{Channel, ChannelError, check_object_count},
  config::SessionConfigError,
  frame::{Frame, ImageChannel},
  region::{Region, RegionFormat, decode, encode, validate},
};

const QUERY_PREFIX: &str = "query_";
const QUERY_SUFFIX: &str = ".txt";

/// 本地文件后端支持的区域格式
pub const FILE_FORMATS: [RegionFormat; 4] = [
  RegionFormat::Point,
  RegionFormat::Rectangle,
  RegionFormat::Polygon,
  RegionFormat::Mask,
];

struct TrackedObject {
  id: String,
  properties: BTreeMap<String, String>,
  trajectory: Vec<Region>,
}

/// 在没有远程评测服务时，从工作目录读取帧列表与查询文件，
/// 关闭时把每个目标的轨迹写入 `output_<id>.txt`。
///
/// 工作目录内容：
/// - `frames_<channel>.txt` 每个通道一行一个图像路径
/// - `query_<id>.txt` 第一行起始偏移（必须为 0），第二行初始区域，其余为 `key=value` 属性
pub struct FileChannel {
  workdir: PathBuf,
  frames: Vec<Frame>,
  position: usize,
  objects: Vec<TrackedObject>,
  started: bool,
  closed: bool,
}

impl FileChannel {
  pub fn new(workdir: impl Into<PathBuf>) -> Self {
    Self {
      workdir: workdir.into(),
      frames: Vec::new(),
      position: 0,
      objects: Vec::new(),
      started: false,
      closed: false,
    }
  }

  pub fn workdir(&self) -> &Path {
    &self.workdir
  }

  pub fn object_ids(&self) -> Vec<&str> {
    self.objects.iter().map(|o| o.id.as_str()).collect()
  }

  /// 查询文件中的附加属性
  pub fn properties(&self, id: &str) -> Option<&BTreeMap<String, String>> {
    self
      .objects
      .iter()
      .find(|o| o.id == id)
      .map(|o| &o.properties)
  }

  pub fn output_path(&self, id: &str) -> PathBuf {
    self.workdir.join(format!("output_{id}.txt"))
  }

  fn read_frames(&self, channels: &[ImageChannel]) -> Result<Vec<Frame>, ChannelError> {
    let mut lists = Vec::with_capacity(channels.len());
    for channel in channels {
      let path = self.workdir.join(format!("frames_{channel}.txt"));
      if !path.exists() {
        error!("缺少通道 {} 的帧列表文件: {}", channel, path.display());
        return Err(ChannelError::MissingFramesFile {
          channel: *channel,
          path,
        });
      }
      let lines = fs::read_to_string(&path)?
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| self.workdir.join(line))
        .collect::<Vec<_>>();
      lists.push(lines);
    }

    let count = lists.first().map_or(0, Vec::len);
    if lists.iter().any(|list| list.len() != count) {
      let counts = channels
        .iter()
        .copied()
        .zip(lists.iter().map(Vec::len))
        .collect();
      return Err(ChannelError::FrameCountMismatch(counts));
    }

    Ok(
      (0..count)
        .map(|i| {
          Frame::new(
            channels
              .iter()
              .zip(lists.iter())
              .map(|(channel, list)| (*channel, list[i].clone()))
              .collect(),
          )
        })
        .collect(),
    )
  }

  fn query_files(&self) -> Result<Vec<(String, PathBuf)>, ChannelError> {
    let mut queries = Vec::new();
    for entry in fs::read_dir(&self.workdir)? {
      let entry = entry?;
      let name = entry.file_name();
      let Some(name) = name.to_str() else {
        continue;
      };
      if let Some(id) = name
        .strip_prefix(QUERY_PREFIX)
        .and_then(|rest| rest.strip_suffix(QUERY_SUFFIX))
      {
        queries.push((id.to_string(), entry.path()));
      }
    }
    queries.sort();

    if queries.is_empty() {
      error!("目录 {} 中未找到查询文件", self.workdir.display());
      return Err(ChannelError::NoQueryFile(self.workdir.clone()));
    }
    Ok(queries)
  }

  fn read_query(
    id: String,
    file: &Path,
    format: RegionFormat,
  ) -> Result<TrackedObject, ChannelError> {
    let content = fs::read_to_string(file)?;
    let mut lines = content.lines().map(str::trim).filter(|l| !l.is_empty());

    let invalid = |reason: &str| ChannelError::InvalidQuery {
      file: file.to_path_buf(),
      reason: reason.to_string(),
    };

    let offset = lines
      .next()
      .ok_or_else(|| invalid("缺少起始偏移"))?
      .parse::<i64>()
      .map_err(|_| invalid("起始偏移不是整数"))?;
    if offset != 0 {
      error!("查询文件 {} 的起始偏移为 {}", file.display(), offset);
      return Err(ChannelError::UnsupportedOffset {
        file: file.to_path_buf(),
        offset,
      });
    }

    let line = lines.next().ok_or_else(|| invalid("缺少初始区域"))?;
    let region = decode(line).map_err(|source| ChannelError::QueryDecode {
      file: file.to_path_buf(),
      source,
    })?;
    if !validate(&region, &[format]) {
      return Err(ChannelError::InvalidRegionFormat {
        origin: file.display().to_string(),
        found: region.format(),
        allowed: format,
      });
    }

    let properties = lines
      .filter_map(|line| line.split_once('='))
      .map(|(k, v)| (k.to_string(), v.to_string()))
      .collect();

    Ok(TrackedObject {
      id,
      properties,
      trajectory: vec![region],
    })
  }
}

impl FromUrlWithScheme for FileChannel {
  const SCHEME: &'static str = "folder";
}

/// `folder:///path/to/workdir`
impl FromUrl for FileChannel {
  type Error = SessionConfigError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(SessionConfigError::SchemeMismatch {
        expected: Self::SCHEME.to_string(),
        found: url.scheme().to_string(),
      });
    }
    let path = urlencoding::decode(url.path())?;
    Ok(Self::new(path.into_owned()))
  }
}

impl Channel for FileChannel {
  fn start(
    &mut self,
    format: RegionFormat,
    channels: &[ImageChannel],
    multiobject: bool,
  ) -> Result<(Vec<Region>, Frame), ChannelError> {
    if self.closed {
      return Err(ChannelError::Closed);
    }
    if self.started {
      return Err(ChannelError::ObjectsRedeclared);
    }
    if !FILE_FORMATS.contains(&format) {
      return Err(ChannelError::UnsupportedFormat(format));
    }

    info!("使用本地文件通道: {}", self.workdir.display());
    let frames = self.read_frames(channels)?;

    let objects = self
      .query_files()?
      .into_iter()
      .map(|(id, file)| Self::read_query(id, &file, format))
      .collect::<Result<Vec<_>, _>>()?;
    check_object_count(objects.len(), multiobject)?;

    let first = frames.first().cloned().ok_or(ChannelError::EmptySequence)?;
    let regions = objects
      .iter()
      .map(|o| o.trajectory[0].clone())
      .collect::<Vec<_>>();

    info!("共 {} 帧，{} 个目标", frames.len(), objects.len());
    self.frames = frames;
    self.objects = objects;
    self.position = 1;
    self.started = true;

    Ok((regions, first))
  }

  fn next_frame(&mut self) -> Result<Option<Frame>, ChannelError> {
    if self.closed {
      return Err(ChannelError::Closed);
    }
    if !self.started {
      return Err(ChannelError::NotStarted);
    }
    let frame = self.frames.get(self.position).cloned();
    if frame.is_some() {
      self.position += 1;
    }
    Ok(frame)
  }

  fn send_status(&mut self, status: Vec<Region>) -> Result<(), ChannelError> {
    if self.closed {
      return Err(ChannelError::Closed);
    }
    if !self.started {
      return Err(ChannelError::NotStarted);
    }
    if status.len() != self.objects.len() {
      return Err(ChannelError::StatusLengthMismatch {
        expected: self.objects.len(),
        actual: status.len(),
      });
    }
    for (object, region) in self.objects.iter_mut().zip(status) {
      object.trajectory.push(region);
    }
    debug!("第 {} 帧状态已记录", self.position);
    Ok(())
  }

  fn close(&mut self) -> Result<(), ChannelError> {
    if self.closed {
      return Ok(());
    }

    // 每个目标都尝试写入，全部成功后才算关闭，失败时可以重试
    let mut failure = None;
    for object in &self.objects {
      let path = self.output_path(&object.id);
      let mut content = String::new();
      for region in &object.trajectory {
        content.push_str(&encode(region));
        content.push('\n');
      }
      match fs::write(&path, content) {
        Ok(()) => info!("目标 {} 的轨迹已写入 {}", object.id, path.display()),
        Err(e) => {
          error!("目标 {} 的轨迹写入 {} 失败: {}", object.id, path.display(), e);
          if failure.is_none() {
            failure = Some(e);
          }
        }
      }
    }
    if let Some(e) = failure {
      return Err(e.into());
    }

    self.closed = true;
    for object in &mut self.objects {
      object.trajectory.clear();
    }
    Ok(())
  }
}

impl Drop for FileChannel {
  fn drop(&mut self) {
    if let Err(e) = self.close() {
      warn!("关闭本地文件通道失败: {}", e);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn workdir(files: &[(&str, &str)]) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    for (name, content) in files {
      fs::write(dir.path().join(name), content).unwrap();
    }
    dir
  }

  #[test]
  fn reads_frames_and_queries() {
    let dir = workdir(&[
      ("frames_color.txt", "a.jpg\nb.jpg\n\n"),
      ("frames_depth.txt", "a.png\nb.png\n"),
      ("query_2.txt", "0\n1,1,2,2\nname=car\n"),
      ("query_1.txt", "0\n0,0,5,5\n"),
    ]);
    let mut channel = FileChannel::new(dir.path());
    let (objects, first) = channel
      .start(
        RegionFormat::Rectangle,
        &[ImageChannel::Color, ImageChannel::Depth],
        true,
      )
      .unwrap();

    assert_eq!(channel.object_ids(), vec!["1", "2"]);
    assert_eq!(objects[0], Region::rectangle(0.0, 0.0, 5.0, 5.0));
    assert_eq!(
      channel.properties("2").and_then(|p| p.get("name")),
      Some(&"car".to_string())
    );
    assert_eq!(first.len(), 2);
    assert_eq!(
      first.channel(ImageChannel::Depth),
      Some(dir.path().join("a.png").as_path())
    );

    assert!(channel.next_frame().unwrap().is_some());
    assert!(channel.next_frame().unwrap().is_none());
  }

  #[test]
  fn folder_url_names_the_workdir() {
    let url = Url::parse("folder:///data/seq%201").unwrap();
    let channel = FileChannel::from_url(&url).unwrap();
    assert_eq!(channel.workdir(), Path::new("/data/seq 1"));

    let url = Url::parse("vot:///data").unwrap();
    assert!(FileChannel::from_url(&url).is_err());
  }

  #[test]
  fn mismatched_frame_lists_are_rejected() {
    let dir = workdir(&[
      ("frames_color.txt", "a.jpg\nb.jpg\n"),
      ("frames_ir.txt", "a.png\n"),
      ("query_1.txt", "0\n0,0,5,5\n"),
    ]);
    let err = FileChannel::new(dir.path())
      .start(
        RegionFormat::Rectangle,
        &[ImageChannel::Color, ImageChannel::Ir],
        false,
      )
      .unwrap_err();
    assert!(matches!(err, ChannelError::FrameCountMismatch(_)));
    assert!(err.is_configuration());
  }

  #[test]
  fn missing_configuration_is_rejected() {
    let dir = workdir(&[("query_1.txt", "0\n0,0,5,5\n")]);
    let err = FileChannel::new(dir.path())
      .start(RegionFormat::Rectangle, &[ImageChannel::Color], false)
      .unwrap_err();
    assert!(matches!(err, ChannelError::MissingFramesFile { .. }));

    let dir = workdir(&[("frames_color.txt", "a.jpg\n")]);
    let err = FileChannel::new(dir.path())
      .start(RegionFormat::Rectangle, &[ImageChannel::Color], false)
      .unwrap_err();
    assert!(matches!(err, ChannelError::NoQueryFile(_)));
  }

  #[test]
  fn query_region_must_match_format() {
    let dir = workdir(&[
      ("frames_color.txt", "a.jpg\n"),
      ("query_1.txt", "0\n0,0,5,5\n"),
    ]);
    let err = FileChannel::new(dir.path())
      .start(RegionFormat::Mask, &[ImageChannel::Color], false)
      .unwrap_err();
    assert!(err.is_protocol_violation());

    let err = FileChannel::new(dir.path())
      .start(RegionFormat::Empty, &[ImageChannel::Color], false)
      .unwrap_err();
    assert!(matches!(
      err,
      ChannelError::UnsupportedFormat(RegionFormat::Empty)
    ));
  }

  #[test]
  fn status_length_must_match_and_close_is_idempotent() {
    let dir = workdir(&[
      ("frames_color.txt", "a.jpg\nb.jpg\n"),
      ("query_a.txt", "0\n1,2\n"),
    ]);
    let mut channel = FileChannel::new(dir.path());
    channel
      .start(RegionFormat::Point, &[ImageChannel::Color], false)
      .unwrap();
    channel.next_frame().unwrap();

    let err = channel.send_status(vec![]).unwrap_err();
    assert!(matches!(
      err,
      ChannelError::StatusLengthMismatch {
        expected: 1,
        actual: 0
      }
    ));
    channel
      .send_status(vec![Region::Point { x: 3.0, y: 4.5 }])
      .unwrap();

    channel.close().unwrap();
    channel.close().unwrap();
    let output = fs::read_to_string(channel.output_path("a")).unwrap();
    assert_eq!(output, "1,2\n3,4.5\n");
    assert!(matches!(channel.next_frame(), Err(ChannelError::Closed)));
  }

  #[test]
  fn failed_close_writes_other_objects_and_can_be_retried() {
    let dir = workdir(&[
      ("frames_color.txt", "a.jpg\nb.jpg\n"),
      ("query_a.txt", "0\n1,2\n"),
      ("query_b.txt", "0\n5,6\n"),
    ]);
    let mut channel = FileChannel::new(dir.path());
    channel
      .start(RegionFormat::Point, &[ImageChannel::Color], true)
      .unwrap();
    channel.next_frame().unwrap();
    channel
      .send_status(vec![
        Region::Point { x: 1.0, y: 3.0 },
        Region::Point { x: 5.0, y: 7.0 },
      ])
      .unwrap();

    // 目录占住输出路径，写入必然失败
    let blocked = channel.output_path("a");
    fs::create_dir(&blocked).unwrap();
    assert!(channel.close().is_err());
    let output_b = fs::read_to_string(channel.output_path("b")).unwrap();
    assert_eq!(output_b, "5,6\n5,7\n");

    fs::remove_dir(&blocked).unwrap();
    channel.close().unwrap();
    let output_a = fs::read_to_string(&blocked).unwrap();
    assert_eq!(output_a, "1,2\n1,3\n");
    assert!(matches!(channel.next_frame(), Err(ChannelError::Closed)));
  }
}
