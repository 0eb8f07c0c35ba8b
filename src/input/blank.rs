// 该文件是 Lupai （路牌） 项目的一部分。
// src/input/blank.rs - 合成帧输入
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

use std::time::Duration;

use tracing::{error, info};
use url::Url;

use crate::{
  FromUrlWithScheme,
  frame::{FrameDims, RgbFrame},
  input::{CaptureError, FrameSource},
};

/// 生成纯色帧的输入，`blank://?count=100&interval_ms=33&value=128`。
///
/// 不指定 `count` 时无限输出。
pub struct BlankInput {
  dims: FrameDims,
  remaining: Option<u64>,
  interval: Option<Duration>,
  value: u8,
}

impl FromUrlWithScheme for BlankInput {
  const SCHEME: &'static str = "blank";
}

impl crate::FromUrl for BlankInput {
  type Error = CaptureError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    Self::open(url, FrameDims::default())
  }
}

impl BlankInput {
  pub fn new(dims: FrameDims, count: Option<u64>) -> Self {
    Self {
      dims,
      remaining: count,
      interval: None,
      value: 0,
    }
  }

  pub fn open(url: &Url, dims: FrameDims) -> Result<Self, CaptureError> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(CaptureError::SchemeMismatch);
    }

    let mut input = Self::new(dims, None);
    for (k, v) in url.query_pairs() {
      match k.as_ref() {
        "count" => input.remaining = v.parse().ok(),
        "interval_ms" => input.interval = v.parse().ok().map(Duration::from_millis),
        "value" => input.value = v.parse().unwrap_or(0),
        _ => {}
      }
    }

    info!(
      "合成输入: {} 帧数 {}",
      dims,
      input
        .remaining
        .map(|n| n.to_string())
        .unwrap_or_else(|| "无限".to_string())
    );
    Ok(input)
  }
}

impl FrameSource for BlankInput {
  fn next_frame(&mut self) -> Result<RgbFrame, CaptureError> {
    if let Some(remaining) = self.remaining.as_mut() {
      if *remaining == 0 {
        return Err(CaptureError::Exhausted);
      }
      *remaining -= 1;
    }
    if let Some(interval) = self.interval {
      std::thread::sleep(interval);
    }

    let data = vec![self.value; self.dims.byte_len()];
    Ok(RgbFrame::new(self.dims, data))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn counted_input_is_exhausted() {
    let mut input = BlankInput::new(FrameDims::new(4, 4), Some(1));
    assert!(input.next_frame().is_ok());
    assert!(matches!(input.next_frame(), Err(CaptureError::Exhausted)));
  }

  #[test]
  fn fill_value_comes_from_query() {
    let url = Url::parse("blank://?count=1&value=200").unwrap();
    let mut input = BlankInput::open(&url, FrameDims::new(2, 1)).unwrap();
    assert_eq!(input.next_frame().unwrap().as_nhwc(), &[200u8; 6]);
  }
}
