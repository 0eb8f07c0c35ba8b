// 该文件是 Lupai （路牌） 项目的一部分。
// src/output.rs - 显示输出定义
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

use std::fmt;

use thiserror::Error;
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, frame::RgbFrame, model::LabelId};

/// 叠加在画面上的识别结果
#[derive(Debug, Clone, PartialEq)]
pub struct Overlay {
  pub label: LabelId,
  pub name: String,
  pub confidence: f64,
}

impl Overlay {
  pub fn new(label: LabelId, name: impl Into<String>, confidence: f64) -> Self {
    Self {
      label,
      name: name.into(),
      confidence,
    }
  }

  pub fn lines(&self) -> [String; 2] {
    [
      format!("CLASS: {} {}", self.label, self.name),
      format!("PROBABILITY: {:.2}%", self.confidence * 100.0),
    ]
  }
}

impl fmt::Display for Overlay {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let [class, probability] = self.lines();
    write!(f, "{} {}", class, probability)
  }
}

/// 每帧调用一次 `render`；`poll_exit` 返回 `true` 表示显示端收到了本地退出操作
pub trait DisplaySink {
  type Error;

  fn render(&mut self, frame: &RgbFrame, overlay: Option<&Overlay>) -> Result<(), Self::Error>;

  fn poll_exit(&mut self) -> bool {
    false
  }

  fn close(&mut self) {}
}

mod null;
pub use self::null::NullDisplay;

#[cfg(feature = "draw")]
pub mod draw;

#[cfg(feature = "save_image_file")]
mod directory_record;
#[cfg(feature = "save_image_file")]
pub use self::directory_record::{DirectoryRecordOutput, DirectoryRecordOutputError};

#[cfg(feature = "gstreamer_output")]
mod gstreamer_display;
#[cfg(feature = "gstreamer_output")]
pub use self::gstreamer_display::{GStreamerDisplay, GStreamerDisplayError};

#[derive(Error, Debug)]
pub enum DisplayError {
  #[cfg(feature = "save_image_file")]
  #[error("目录记录输出错误: {0}")]
  DirectoryRecordOutputError(#[from] DirectoryRecordOutputError),
  #[cfg(feature = "gstreamer_output")]
  #[error("GStreamer 显示错误: {0}")]
  GStreamerDisplayError(#[from] GStreamerDisplayError),
  #[error("URI 方案不匹配")]
  SchemeMismatch,
}

pub enum OutputWrapper {
  Null(NullDisplay),
  #[cfg(feature = "save_image_file")]
  DirectoryRecordOutput(DirectoryRecordOutput),
  #[cfg(feature = "gstreamer_output")]
  GStreamerDisplay(GStreamerDisplay),
}

impl FromUrl for OutputWrapper {
  type Error = DisplayError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      NullDisplay::SCHEME => Ok(OutputWrapper::Null(NullDisplay::default())),
      #[cfg(feature = "save_image_file")]
      DirectoryRecordOutput::SCHEME => {
        let output = DirectoryRecordOutput::from_url(url)?;
        Ok(OutputWrapper::DirectoryRecordOutput(output))
      }
      #[cfg(feature = "gstreamer_output")]
      GStreamerDisplay::SCHEME => {
        let output = GStreamerDisplay::from_url(url)?;
        Ok(OutputWrapper::GStreamerDisplay(output))
      }
      _ => Err(DisplayError::SchemeMismatch),
    }
  }
}

impl DisplaySink for OutputWrapper {
  type Error = DisplayError;

  fn render(&mut self, frame: &RgbFrame, overlay: Option<&Overlay>) -> Result<(), Self::Error> {
    match self {
      OutputWrapper::Null(output) => match output.render(frame, overlay) {
        Ok(()) => Ok(()),
        Err(never) => match never {},
      },
      #[cfg(feature = "save_image_file")]
      OutputWrapper::DirectoryRecordOutput(output) => output
        .render(frame, overlay)
        .map_err(DisplayError::from),
      #[cfg(feature = "gstreamer_output")]
      OutputWrapper::GStreamerDisplay(output) => output
        .render(frame, overlay)
        .map_err(DisplayError::from),
    }
  }

  fn poll_exit(&mut self) -> bool {
    match self {
      OutputWrapper::Null(output) => output.poll_exit(),
      #[cfg(feature = "save_image_file")]
      OutputWrapper::DirectoryRecordOutput(output) => output.poll_exit(),
      #[cfg(feature = "gstreamer_output")]
      OutputWrapper::GStreamerDisplay(output) => output.poll_exit(),
    }
  }

  fn close(&mut self) {
    match self {
      OutputWrapper::Null(output) => output.close(),
      #[cfg(feature = "save_image_file")]
      OutputWrapper::DirectoryRecordOutput(output) => output.close(),
      #[cfg(feature = "gstreamer_output")]
      OutputWrapper::GStreamerDisplay(output) => output.close(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn overlay_lines_follow_display_format() {
    let overlay = Overlay::new(14, "Stop", 0.93);
    assert_eq!(
      overlay.lines(),
      ["CLASS: 14 Stop".to_string(), "PROBABILITY: 93.00%".to_string()]
    );
  }

  #[test]
  fn null_scheme_builds_null_display() {
    let url = Url::parse("null://").unwrap();
    assert!(matches!(
      OutputWrapper::from_url(&url),
      Ok(OutputWrapper::Null(_))
    ));
  }

  #[test]
  fn unknown_scheme_is_rejected() {
    let url = Url::parse("rtsp://0.0.0.0:8554/live").unwrap();
    assert!(matches!(
      OutputWrapper::from_url(&url),
      Err(DisplayError::SchemeMismatch)
    ));
  }
}
