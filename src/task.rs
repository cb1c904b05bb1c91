// 该文件是 Shanan （山南西风） 项目的一部分。
// src/task.rs - 跟踪任务循环
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

use std::sync::{
  Arc,
  atomic::{AtomicBool, Ordering},
};

use tracing::{debug, info, warn};

use crate::{
  channel::Channel,
  session::Session,
  tracker::{Tracker, TrackerFactory},
};

pub trait Task<C: Channel, F: TrackerFactory>: Sized {
  type Error;
  fn run_task(self, session: Session<C>, factory: F) -> Result<(), Self::Error>;
}

/// 帧数上限与中断标志，两者都只会让循环提前正常结束
#[derive(Default, Debug, Clone)]
struct LoopControl {
  frame_number: Option<usize>,
  stop: Option<Arc<AtomicBool>>,
}

impl LoopControl {
  fn should_stop(&self, frame_index: usize) -> bool {
    if self.frame_number.is_some_and(|n| frame_index >= n) {
      info!("达到指定帧数 {}, 退出任务循环", frame_index);
      return true;
    }
    if self.stop.as_ref().is_some_and(|s| s.load(Ordering::SeqCst)) {
      warn!("中断信号接收，退出任务循环");
      return true;
    }
    false
  }
}

/// 多目标管理：每个初始目标一个跟踪器，每帧汇总为一次回报
#[derive(Default, Debug)]
pub struct MultiObjectTask {
  control: LoopControl,
}

impl MultiObjectTask {
  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.control.frame_number = frame_number;
    self
  }

  pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
    self.control.stop = Some(stop);
    self
  }
}

impl<C: Channel, F: TrackerFactory> Task<C, F> for MultiObjectTask {
  type Error = anyhow::Error;

  fn run_task(self, mut session: Session<C>, factory: F) -> Result<(), Self::Error> {
    info!("开始多目标跟踪任务...");
    let objects = session.objects()?.to_vec();

    let Some(first) = session.frame()? else {
      warn!("序列中没有帧");
      session.quit()?;
      return Ok(());
    };

    let mut trackers = objects
      .iter()
      .map(|region| factory.create(&first, region))
      .collect::<anyhow::Result<Vec<_>>>()?;
    info!("已创建 {} 个跟踪器", trackers.len());

    let mut frame_index = 0;
    while let Some(frame) = session.frame()? {
      frame_index += 1;
      let status = trackers
        .iter_mut()
        .map(|tracker| tracker.track(&frame))
        .collect::<anyhow::Result<Vec<_>>>()?;
      session.report(status)?;
      debug!("第 {} 帧处理完成", frame_index);

      if self.control.should_stop(frame_index) {
        break;
      }
    }

    session.quit()?;
    info!("任务完成，共处理 {} 帧", frame_index);
    Ok(())
  }
}

/// 单目标模式
#[derive(Default, Debug)]
pub struct SingleObjectTask {
  control: LoopControl,
}

impl SingleObjectTask {
  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.control.frame_number = frame_number;
    self
  }

  pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
    self.control.stop = Some(stop);
    self
  }
}

impl<C: Channel, F: TrackerFactory> Task<C, F> for SingleObjectTask {
  type Error = anyhow::Error;

  fn run_task(self, mut session: Session<C>, factory: F) -> Result<(), Self::Error> {
    info!("开始单目标跟踪任务...");
    let region = session.region()?.clone();

    let Some(first) = session.frame()? else {
      warn!("序列中没有帧");
      session.quit()?;
      return Ok(());
    };
    let mut tracker = factory.create(&first, &region)?;

    let mut frame_index = 0;
    while let Some(frame) = session.frame()? {
      frame_index += 1;
      let region = tracker.track(&frame)?;
      session.report(region)?;

      if self.control.should_stop(frame_index) {
        break;
      }
    }

    session.quit()?;
    info!("任务完成，共处理 {} 帧", frame_index);
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use std::{cell::Cell, rc::Rc};

  use super::*;
  use crate::{
    channel::{
      RemoteChannel, RemoteRegion, ServerRequest,
      remote_testing::{ScriptedServer, images, rect},
    },
    frame::Frame,
    region::{Region, RegionFormat},
    session::SessionOptions,
    tracker::StaticTracker,
  };

  fn scripted_session(
    objects: usize,
    frames: usize,
  ) -> (Session<RemoteChannel>, ScriptedServer) {
    let mut requests = vec![ServerRequest::Initialize {
      objects: (0..objects).map(|i| rect(i as f64)).collect(),
      images: images("0.jpg"),
    }];
    for i in 1..frames {
      requests.push(ServerRequest::Frame {
        objects: vec![],
        images: images(&format!("{i}.jpg")),
      });
    }
    let server = ScriptedServer::new(requests);
    let options = SessionOptions::new(RegionFormat::Rectangle).with_multiobject(objects > 1);
    let session = Session::open(RemoteChannel::new(Box::new(server.clone())), options).unwrap();
    (session, server)
  }

  #[test]
  fn multi_object_reports_in_object_order() {
    let (session, server) = scripted_session(3, 4);
    let created = Rc::new(Cell::new(0));
    let counter = created.clone();
    let factory = move |_frame: &Frame, region: &Region| {
      counter.set(counter.get() + 1);
      StaticTracker::factory(_frame, region)
    };

    MultiObjectTask::default()
      .run_task(session, factory)
      .unwrap();

    assert_eq!(created.get(), 3);
    let statuses = server.statuses.lock().unwrap();
    // 初始化应答 + 3 帧
    assert_eq!(statuses.len(), 4);
    for status in statuses.iter().skip(1) {
      assert_eq!(status, &vec![rect(0.0), rect(1.0), rect(2.0)]);
    }
    assert_eq!(*server.quits.lock().unwrap(), 1);
  }

  #[test]
  fn stop_flag_and_frame_limit_end_the_loop() {
    let (session, server) = scripted_session(1, 10);
    MultiObjectTask::default()
      .with_frame_number(Some(2))
      .run_task(session, StaticTracker::factory)
      .unwrap();
    assert_eq!(server.statuses.lock().unwrap().len(), 3);
    assert_eq!(*server.quits.lock().unwrap(), 1);

    let (session, server) = scripted_session(1, 10);
    let stop = Arc::new(AtomicBool::new(true));
    SingleObjectTask::default()
      .with_stop_flag(stop)
      .run_task(session, StaticTracker::factory)
      .unwrap();
    assert_eq!(server.statuses.lock().unwrap().len(), 2);
  }

  #[test]
  fn tracker_errors_abort_the_task() {
    let (session, server) = scripted_session(1, 3);
    let factory = |_frame: &Frame, _region: &Region| {
      Ok::<_, anyhow::Error>(|_frame: &Frame| -> anyhow::Result<Region> {
        anyhow::bail!("lost")
      })
    };
    assert!(SingleObjectTask::default().run_task(session, factory).is_err());
    // 会话被丢弃时仍会关闭通道
    assert_eq!(*server.quits.lock().unwrap(), 1);
    assert_eq!(
      server.statuses.lock().unwrap().first(),
      Some(&vec![RemoteRegion::Rectangle {
        x: 0.0,
        y: 0.0,
        width: 10.0,
        height: 10.0
      }])
    );
  }
}
