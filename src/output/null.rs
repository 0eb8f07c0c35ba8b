// 该文件是 Lupai （路牌） 项目的一部分。
// src/output/null.rs - 无画面输出
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

use std::convert::Infallible;

use tracing::info;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::RgbFrame,
  output::{DisplaySink, Overlay},
};

/// 丢弃画面，只在叠加内容变化时记录日志
#[derive(Debug, Default)]
pub struct NullDisplay {
  current: Option<Overlay>,
  frames: u64,
}

impl FromUrlWithScheme for NullDisplay {
  const SCHEME: &'static str = "null";
}

impl FromUrl for NullDisplay {
  type Error = Infallible;

  fn from_url(_url: &url::Url) -> Result<Self, Self::Error> {
    Ok(Self::default())
  }
}

impl NullDisplay {
  pub fn frames(&self) -> u64 {
    self.frames
  }

  pub fn current(&self) -> Option<&Overlay> {
    self.current.as_ref()
  }
}

impl DisplaySink for NullDisplay {
  type Error = Infallible;

  fn render(&mut self, _frame: &RgbFrame, overlay: Option<&Overlay>) -> Result<(), Self::Error> {
    self.frames += 1;
    if self.current.as_ref() != overlay {
      match overlay {
        Some(overlay) => info!("显示: {}", overlay),
        None => info!("清除显示"),
      }
      self.current = overlay.cloned();
    }
    Ok(())
  }

  fn close(&mut self) {
    info!("显示输出关闭，共 {} 帧", self.frames);
  }
}
