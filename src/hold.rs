// 该文件是 Lupai （路牌） 项目的一部分。
// src/hold.rs - 叠加显示保持窗口
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

use std::time::{Duration, Instant};

use crate::consensus::ConfirmedDetection;

pub const DEFAULT_HOLD_DURATION: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Default)]
pub struct HoldState {
  pub active: Option<ConfirmedDetection>,
  pub expires_at: Option<Instant>,
}

/// 确认之后叠加层保持可见的时间窗口，可见性只取决于当前时间
#[derive(Debug, Clone)]
pub struct DisplayHoldWindow {
  hold: Duration,
  state: HoldState,
}

impl Default for DisplayHoldWindow {
  fn default() -> Self {
    Self::new(DEFAULT_HOLD_DURATION)
  }
}

impl DisplayHoldWindow {
  pub fn new(hold: Duration) -> Self {
    Self {
      hold,
      state: HoldState::default(),
    }
  }

  pub fn hold_duration(&self) -> Duration {
    self.hold
  }

  pub fn state(&self) -> &HoldState {
    &self.state
  }

  /// 新的确认总是覆盖旧的
  pub fn on_confirmed(&mut self, detection: ConfirmedDetection, now: Instant) {
    self.state = HoldState {
      active: Some(detection),
      expires_at: Some(now + self.hold),
    };
  }

  pub fn visible(&self, now: Instant) -> Option<&ConfirmedDetection> {
    match (&self.state.active, self.state.expires_at) {
      (Some(detection), Some(expires_at)) if now < expires_at => Some(detection),
      _ => None,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn detection(label: usize, at: Instant) -> ConfirmedDetection {
    ConfirmedDetection {
      label,
      confidence: 0.95,
      confirmed_at: at,
    }
  }

  #[test]
  fn nothing_visible_before_first_confirmation() {
    let window = DisplayHoldWindow::default();
    assert!(window.visible(Instant::now()).is_none());
  }

  #[test]
  fn visible_strictly_before_expiry() {
    let t0 = Instant::now();
    let mut window = DisplayHoldWindow::new(Duration::from_secs(2));
    window.on_confirmed(detection(14, t0), t0);

    assert_eq!(window.visible(t0).map(|d| d.label), Some(14));
    assert!(window.visible(t0 + Duration::from_millis(1999)).is_some());
    assert!(window.visible(t0 + Duration::from_secs(2)).is_none());
    assert!(window.visible(t0 + Duration::from_secs(3)).is_none());
  }

  #[test]
  fn later_confirmation_wins() {
    let t0 = Instant::now();
    let t1 = t0 + Duration::from_millis(500);
    let mut window = DisplayHoldWindow::new(Duration::from_secs(2));
    window.on_confirmed(detection(14, t0), t0);
    window.on_confirmed(detection(13, t1), t1);

    let after_first_expiry = t0 + Duration::from_millis(2200);
    assert_eq!(window.visible(after_first_expiry).map(|d| d.label), Some(13));
    assert!(window.visible(t1 + Duration::from_secs(2)).is_none());
  }

  #[test]
  fn lapsed_hold_keeps_state_in_place() {
    let t0 = Instant::now();
    let mut window = DisplayHoldWindow::new(Duration::from_millis(10));
    window.on_confirmed(detection(1, t0), t0);
    assert!(window.visible(t0 + Duration::from_millis(20)).is_none());
    assert!(window.state().active.is_some());
  }
}
