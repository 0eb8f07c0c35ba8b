// 该文件是 Lupai （路牌） 项目的一部分。
// src/consensus.rs - 多帧一致性确认
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

//! # 多帧一致性
//!
//! 单帧分类结果噪声很大。[`ConsensusTracker`] 收集连续 `K` 帧被接受的标签，
//! 只有当 `K` 个标签完全相同时才产生一次 [`ConfirmedDetection`]。
//!
//! - 任意一帧弃权都会清空窗口；
//! - 窗口在恰好达到 `K` 时判定一次，随后无论结果如何都清空（不滑动）；
//! - 同一个标志持续出现在画面中时，每 `K` 帧确认一次。

use std::time::Instant;

use tracing::{debug, trace};

use crate::model::{ClassificationResult, LabelId};

pub const DEFAULT_CONSENSUS_RUN: usize = 5;

/// 经过多帧一致性确认的检测
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfirmedDetection {
  pub label: LabelId,
  pub confidence: f64,
  pub confirmed_at: Instant,
}

#[derive(Debug, Clone)]
pub struct ConsensusTracker {
  run: usize,
  window: Vec<LabelId>,
  last_confirmed_at: Option<Instant>,
}

impl Default for ConsensusTracker {
  fn default() -> Self {
    Self::new(DEFAULT_CONSENSUS_RUN)
  }
}

impl ConsensusTracker {
  pub fn new(run: usize) -> Self {
    assert!(run > 0, "连续确认帧数必须大于 0");
    Self {
      run,
      window: Vec::with_capacity(run),
      last_confirmed_at: None,
    }
  }

  pub fn run(&self) -> usize {
    self.run
  }

  /// 当前窗口中已积累的帧数
  pub fn pending(&self) -> usize {
    self.window.len()
  }

  pub fn reset(&mut self) {
    self.window.clear();
  }

  pub fn observe(
    &mut self,
    result: &ClassificationResult,
    now: Instant,
  ) -> Option<ConfirmedDetection> {
    let Some(label) = result.label else {
      if !self.window.is_empty() {
        trace!("本帧弃权，清空 {} 帧的累积", self.window.len());
      }
      self.window.clear();
      return None;
    };

    self.window.push(label);
    if self.window.len() < self.run {
      return None;
    }

    let unanimous = self.window.iter().all(|&l| l == label);
    self.window.clear();
    if !unanimous {
      debug!("{} 帧内标签不一致，重新累积", self.run);
      return None;
    }

    debug_assert!(
      self.last_confirmed_at.is_none_or(|t| t <= now),
      "确认时间必须单调递增"
    );
    self.last_confirmed_at = Some(now);

    Some(ConfirmedDetection {
      label,
      confidence: result.confidence.unwrap_or_default(),
      confirmed_at: now,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn feed(tracker: &mut ConsensusTracker, labels: &[Option<LabelId>]) -> Vec<ConfirmedDetection> {
    let now = Instant::now();
    labels
      .iter()
      .filter_map(|&label| {
        let result = match label {
          Some(label) => ClassificationResult::accepted(label, 0.95),
          None => ClassificationResult::abstain(),
        };
        tracker.observe(&result, now)
      })
      .collect()
  }

  #[test]
  fn run_of_k_confirms_once_and_empties_window() {
    let mut tracker = ConsensusTracker::new(5);
    let confirmed = feed(&mut tracker, &[Some(14); 5]);
    assert_eq!(confirmed.len(), 1);
    assert_eq!(confirmed[0].label, 14);
    assert_eq!(tracker.pending(), 0);
  }

  #[test]
  fn late_disagreement_forces_restart() {
    for k in 2..=7 {
      let mut tracker = ConsensusTracker::new(k);
      let mut labels = vec![Some(1); k - 1];
      labels.push(Some(2));
      assert!(feed(&mut tracker, &labels).is_empty(), "k = {}", k);
      assert_eq!(tracker.pending(), 0);
    }
  }

  #[test]
  fn run_of_2k_confirms_twice() {
    let mut tracker = ConsensusTracker::new(5);
    assert_eq!(feed(&mut tracker, &[Some(7); 10]).len(), 2);
  }

  #[test]
  fn single_abstain_resets_progress() {
    let mut tracker = ConsensusTracker::new(5);
    feed(&mut tracker, &[Some(7); 4]);
    assert_eq!(tracker.pending(), 4);
    feed(&mut tracker, &[None]);
    assert_eq!(tracker.pending(), 0);
    assert!(feed(&mut tracker, &[Some(7); 4]).is_empty());
  }

  #[test]
  fn disagreeing_fifth_frame_then_clean_run() {
    let mut tracker = ConsensusTracker::new(5);
    let labels: Vec<_> = [5, 5, 5, 5, 3, 5, 5, 5, 5, 5].into_iter().map(Some).collect();
    let confirmed = feed(&mut tracker, &labels);
    assert_eq!(confirmed.len(), 1);
    assert_eq!(confirmed[0].label, 5);
  }

  #[test]
  fn confirmation_carries_last_confidence() {
    let mut tracker = ConsensusTracker::new(5);
    let now = Instant::now();
    let mut confirmed = None;
    for confidence in [0.91, 0.95, 0.92, 0.99, 0.93] {
      confirmed = tracker.observe(&ClassificationResult::accepted(14, confidence), now);
    }
    let confirmed = confirmed.expect("第 5 帧应当确认");
    assert_eq!(confirmed.label, 14);
    assert_eq!(confirmed.confidence, 0.93);
    assert_eq!(confirmed.confirmed_at, now);
  }

  #[test]
  fn run_of_one_confirms_every_accepted_frame() {
    let mut tracker = ConsensusTracker::new(1);
    assert_eq!(feed(&mut tracker, &[Some(1), None, Some(2)]).len(), 2);
  }

  #[test]
  #[should_panic]
  fn zero_run_is_rejected() {
    let _ = ConsensusTracker::new(0);
  }
}
