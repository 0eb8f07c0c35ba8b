// 该文件是 Lupai （路牌） 项目的一部分。
// src/task.rs - 检测任务循环
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

use std::time::Instant;

use tracing::{debug, error, info, warn};

use crate::{
  announce::AnnouncementSink,
  config::{DetectorConfig, OverlayPolicy},
  consensus::ConsensusTracker,
  hold::DisplayHoldWindow,
  input::{CaptureError, FrameSource},
  lifecycle::{CancellationSignal, ProducerGuard},
  model::{ClassificationResult, Classifier, LabelCatalog},
  output::{DisplaySink, Overlay},
};

pub trait Task<S, C, D>: Sized {
  type Error;
  fn run_task(
    self,
    input: S,
    model: C,
    output: D,
    signal: &CancellationSignal,
  ) -> Result<TaskReport, Self::Error>;
}

/// 单调时钟，测试中可以替换
pub trait Clock {
  fn now(&mut self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&mut self) -> Instant {
    Instant::now()
  }
}

#[derive(Debug)]
pub enum StopReason {
  /// 帧源正常结束
  EndOfStream,
  /// 任意一方请求了停止
  StopRequested,
  /// 达到指定帧数
  FrameLimit,
  /// 帧源出错，按停止处理
  CaptureFailed(CaptureError),
}

#[derive(Debug)]
pub struct TaskReport {
  pub frames: usize,
  pub confirmations: usize,
  pub reason: StopReason,
}

/// 采集、分类、确认、播报、显示的生产者循环。
///
/// 帧源与显示端交给 [`ProducerGuard`]，循环以任何方式退出都会释放一次。
pub struct DetectionTask<'a, A, K = SystemClock> {
  config: DetectorConfig,
  catalog: &'a LabelCatalog,
  announcer: A,
  frame_number: Option<usize>,
  clock: K,
}

impl<'a, A> DetectionTask<'a, A> {
  pub fn new(config: DetectorConfig, catalog: &'a LabelCatalog, announcer: A) -> Self {
    Self {
      config,
      catalog,
      announcer,
      frame_number: None,
      clock: SystemClock,
    }
  }
}

impl<'a, A, K> DetectionTask<'a, A, K> {
  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }

  pub fn with_clock<K2: Clock>(self, clock: K2) -> DetectionTask<'a, A, K2> {
    DetectionTask {
      config: self.config,
      catalog: self.catalog,
      announcer: self.announcer,
      frame_number: self.frame_number,
      clock,
    }
  }

  pub fn announcer(&self) -> &A {
    &self.announcer
  }

  fn overlay(
    &self,
    hold: &DisplayHoldWindow,
    result: &ClassificationResult,
    now: Instant,
  ) -> Option<Overlay> {
    let held = hold.visible(now)?;
    let (label, confidence) = match self.config.overlay_policy {
      OverlayPolicy::Persistent => (held.label, held.confidence),
      OverlayPolicy::FollowClassification => (result.label?, result.confidence?),
    };
    Some(Overlay::new(
      label,
      self.catalog.resolve(label),
      confidence,
    ))
  }
}

impl<S, C, D, A, K, CE, DE, AE> Task<S, C, D> for DetectionTask<'_, A, K>
where
  S: FrameSource,
  C: Classifier<Error = CE>,
  D: DisplaySink<Error = DE>,
  A: AnnouncementSink<Error = AE>,
  K: Clock,
  CE: std::error::Error + Sync + Send + 'static,
  DE: std::error::Error + Sync + Send + 'static,
  AE: std::fmt::Display,
{
  type Error = anyhow::Error;

  fn run_task(
    mut self,
    input: S,
    mut model: C,
    output: D,
    signal: &CancellationSignal,
  ) -> Result<TaskReport, Self::Error> {
    info!("开始任务...");
    let mut guard = ProducerGuard::new(input, output, signal);
    let mut tracker = ConsensusTracker::new(self.config.consensus_run);
    let mut hold = DisplayHoldWindow::new(self.config.hold_duration);
    let mut frames = 0usize;
    let mut confirmations = 0usize;

    let reason = loop {
      if !signal.is_running() {
        warn!("停止请求接收，退出任务循环");
        break StopReason::StopRequested;
      }
      if self.frame_number.is_some_and(|n| frames >= n) {
        info!("达到指定帧数 {}, 退出任务循环", frames);
        break StopReason::FrameLimit;
      }

      let frame = match guard.source().next_frame() {
        Ok(frame) => frame,
        Err(CaptureError::Exhausted) => {
          info!("输入流结束，退出任务循环");
          break StopReason::EndOfStream;
        }
        Err(e) => {
          error!("采集失败: {}", e);
          break StopReason::CaptureFailed(e);
        }
      };
      assert_eq!(
        frame.dims(),
        self.config.frame_dims,
        "帧尺寸不匹配: 期望 {}, 实际 {}",
        self.config.frame_dims,
        frame.dims()
      );
      frames += 1;

      let now = self.clock.now();
      let result = model.classify(&frame)?;
      if let Some(label) = result.label {
        assert!(
          self.catalog.contains(label),
          "标签越界: {} (共 {} 个标签)",
          label,
          self.catalog.len()
        );
      }
      debug!(
        "第 {} 帧: 标签 {:?} 置信度 {:?}",
        frames, result.label, result.confidence
      );

      if let Some(detection) = tracker.observe(&result, now) {
        confirmations += 1;
        let name = self.catalog.resolve(detection.label);
        info!(
          "确认检测: {} {} 置信度 {:.2}%",
          detection.label,
          name,
          detection.confidence * 100.0
        );
        hold.on_confirmed(detection, now);
        if let Err(e) = self.announcer.announce(&detection, name) {
          warn!("播报失败: {}", e);
        }
      }

      let overlay = self.overlay(&hold, &result, now);
      guard.display().render(&frame, overlay.as_ref())?;

      if guard.display().poll_exit() {
        info!("显示端请求退出");
        signal.request_stop();
      }
    };

    drop(guard);
    info!(
      "任务完成，共处理 {} 帧，确认 {} 次，原因: {:?}",
      frames, confirmations, reason
    );
    Ok(TaskReport {
      frames,
      confirmations,
      reason,
    })
  }
}
