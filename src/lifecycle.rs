// 该文件是 Lupai （路牌） 项目的一部分。
// src/lifecycle.rs - 生产者与控制端的生命周期协调
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

//! # 协作式取消
//!
//! 生产者（采集 + 分类 + 确认）与控制端（UI 或主循环）只共享一个
//! [`CancellationSignal`]：
//!
//! ```text
//! Running ──request_stop()──▶ StopRequested ──生产者释放资源──▶ Stopped
//! ```
//!
//! - 任意一方都可以请求停止，重复请求不产生效果；
//! - `Stopped` 只由生产者在释放帧源与显示端之后设置，见 [`ProducerGuard`]；
//! - 控制端通过 [`Controller::shutdown`] 请求停止并等待生产者线程结束，
//!   该方法可以安全地多次调用。

use std::{
  sync::{
    Arc, Mutex, PoisonError,
    atomic::{AtomicU8, Ordering},
  },
  thread::{self, JoinHandle},
};

use tracing::{debug, info, warn};

use crate::{input::FrameSource, output::DisplaySink};

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
  Running = 0,
  StopRequested = 1,
  Stopped = 2,
}

impl LifecycleState {
  fn from_u8(value: u8) -> Self {
    match value {
      0 => LifecycleState::Running,
      1 => LifecycleState::StopRequested,
      _ => LifecycleState::Stopped,
    }
  }
}

#[derive(Debug)]
pub struct CancellationSignal {
  state: AtomicU8,
}

impl Default for CancellationSignal {
  fn default() -> Self {
    Self::new()
  }
}

impl CancellationSignal {
  pub fn new() -> Self {
    Self {
      state: AtomicU8::new(LifecycleState::Running as u8),
    }
  }

  pub fn state(&self) -> LifecycleState {
    LifecycleState::from_u8(self.state.load(Ordering::Acquire))
  }

  pub fn is_running(&self) -> bool {
    self.state() == LifecycleState::Running
  }

  pub fn is_stopped(&self) -> bool {
    self.state() == LifecycleState::Stopped
  }

  /// 只有第一次调用真正完成 Running → StopRequested，返回 `true`
  pub fn request_stop(&self) -> bool {
    let transitioned = self
      .state
      .compare_exchange(
        LifecycleState::Running as u8,
        LifecycleState::StopRequested as u8,
        Ordering::AcqRel,
        Ordering::Acquire,
      )
      .is_ok();
    if transitioned {
      info!("已请求停止");
    } else {
      debug!("重复的停止请求，忽略");
    }
    transitioned
  }

  fn mark_stopped(&self) {
    self.request_stop();
    self
      .state
      .store(LifecycleState::Stopped as u8, Ordering::Release);
  }
}

/// 生产者在整个循环期间独占帧源与显示端。
///
/// 无论循环如何退出（流结束、停止请求、错误返回或 panic），
/// `Drop` 都会恰好一次地关闭显示端、释放帧源，然后把信号置为 `Stopped`。
pub struct ProducerGuard<'a, S: FrameSource, D: DisplaySink> {
  source: S,
  display: D,
  signal: &'a CancellationSignal,
}

impl<'a, S: FrameSource, D: DisplaySink> ProducerGuard<'a, S, D> {
  pub fn new(source: S, display: D, signal: &'a CancellationSignal) -> Self {
    debug!("生产者获得帧源与显示端");
    Self {
      source,
      display,
      signal,
    }
  }

  pub fn source(&mut self) -> &mut S {
    &mut self.source
  }

  pub fn display(&mut self) -> &mut D {
    &mut self.display
  }

  pub fn signal(&self) -> &'a CancellationSignal {
    self.signal
  }
}

impl<S: FrameSource, D: DisplaySink> Drop for ProducerGuard<'_, S, D> {
  fn drop(&mut self) {
    if thread::panicking() {
      warn!("生产者异常退出，释放资源");
    }
    self.display.close();
    self.source.release();
    self.signal.mark_stopped();
    info!("帧源与显示端已释放");
  }
}

/// 控制端持有的生产者线程句柄
pub struct Controller<T> {
  signal: Arc<CancellationSignal>,
  worker: Mutex<Option<JoinHandle<T>>>,
}

impl<T: Send + 'static> Controller<T> {
  pub fn spawn<F>(signal: Arc<CancellationSignal>, producer: F) -> std::io::Result<Self>
  where
    F: FnOnce(Arc<CancellationSignal>) -> T + Send + 'static,
  {
    let producer_signal = Arc::clone(&signal);
    let handle = thread::Builder::new()
      .name("producer".to_string())
      .spawn(move || producer(producer_signal))?;
    info!("生产者线程已启动");

    Ok(Self {
      signal,
      worker: Mutex::new(Some(handle)),
    })
  }
}

impl<T> Controller<T> {
  pub fn signal(&self) -> &Arc<CancellationSignal> {
    &self.signal
  }

  pub fn request_stop(&self) -> bool {
    self.signal.request_stop()
  }

  pub fn is_finished(&self) -> bool {
    self
      .worker
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .as_ref()
      .is_none_or(JoinHandle::is_finished)
  }

  /// 请求停止并等待生产者线程结束。
  ///
  /// 只有第一次调用返回线程结果，之后的调用直接返回 `None`。
  /// 并发调用会等待正在进行的 join 完成。
  pub fn shutdown(&self) -> Option<thread::Result<T>> {
    self.signal.request_stop();
    let mut worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner);
    let handle = worker.take()?;
    info!("等待生产者线程退出...");
    let result = handle.join();
    if result.is_err() {
      warn!("生产者线程 panic 退出");
    }
    Some(result)
  }
}

impl<T> Drop for Controller<T> {
  fn drop(&mut self) {
    let _ = self.shutdown();
  }
}
