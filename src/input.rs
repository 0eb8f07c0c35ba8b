// 该文件是 Lupai （路牌） 项目的一部分。
// src/input.rs - 视频/图像输入
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

use thiserror::Error;
use url::Url;

use crate::{
  FromUrlWithScheme,
  frame::{FrameDims, RgbFrame},
};

/// 帧来源。`release` 在生产者退出时恰好调用一次
pub trait FrameSource {
  fn next_frame(&mut self) -> Result<RgbFrame, CaptureError>;

  fn release(&mut self) {}
}

mod blank;
pub use self::blank::BlankInput;

#[cfg(feature = "read_image_file")]
mod read_image_file;
#[cfg(feature = "read_image_file")]
pub use self::read_image_file::{ImageFileInput, ImageFileInputError};

#[cfg(feature = "gstreamer_input")]
mod gstreamer_input;
#[cfg(feature = "gstreamer_input")]
pub use self::gstreamer_input::{
  GStreamerInput, GStreamerInputError, GStreamerInputPipelineBuilder,
};

#[derive(Error, Debug)]
pub enum CaptureError {
  /// 输入流正常结束
  #[error("输入流已结束")]
  Exhausted,
  #[error("输入设备不可用: {0}")]
  Unavailable(String),
  #[cfg(feature = "read_image_file")]
  #[error("Image file input error: {0}")]
  ImageFileInputError(#[from] ImageFileInputError),
  #[cfg(feature = "gstreamer_input")]
  #[error("GStreamer input error: {0}")]
  GStreamerInputError(#[from] GStreamerInputError),
  #[error("URI scheme mismatch")]
  SchemeMismatch,
}

pub enum InputWrapper {
  Blank(BlankInput),
  #[cfg(feature = "read_image_file")]
  ReadImageFile(ImageFileInput),
  #[cfg(feature = "gstreamer_input")]
  GStreamerInput(GStreamerInput),
}

impl InputWrapper {
  /// 按 URL 方案打开输入，所有输入都输出 `dims` 尺寸的帧
  pub fn open(url: &Url, dims: FrameDims) -> Result<Self, CaptureError> {
    match url.scheme() {
      BlankInput::SCHEME => Ok(InputWrapper::Blank(BlankInput::open(url, dims)?)),
      #[cfg(feature = "read_image_file")]
      ImageFileInput::SCHEME => Ok(InputWrapper::ReadImageFile(ImageFileInput::open(
        url, dims,
      )?)),
      #[cfg(feature = "gstreamer_input")]
      GStreamerInputPipelineBuilder::SCHEME => {
        use crate::FromUrl;

        let input = GStreamerInputPipelineBuilder::from_url(url)?
          .frame_dims(dims)
          .build()?;
        Ok(InputWrapper::GStreamerInput(input))
      }
      _ => Err(CaptureError::SchemeMismatch),
    }
  }
}

impl FrameSource for InputWrapper {
  fn next_frame(&mut self) -> Result<RgbFrame, CaptureError> {
    match self {
      InputWrapper::Blank(input) => input.next_frame(),
      #[cfg(feature = "read_image_file")]
      InputWrapper::ReadImageFile(input) => input.next_frame(),
      #[cfg(feature = "gstreamer_input")]
      InputWrapper::GStreamerInput(input) => input.next_frame(),
    }
  }

  fn release(&mut self) {
    match self {
      InputWrapper::Blank(input) => input.release(),
      #[cfg(feature = "read_image_file")]
      InputWrapper::ReadImageFile(input) => input.release(),
      #[cfg(feature = "gstreamer_input")]
      InputWrapper::GStreamerInput(input) => input.release(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn unknown_scheme_is_rejected() {
    let url = Url::parse("rtmp://camera/live").unwrap();
    assert!(matches!(
      InputWrapper::open(&url, FrameDims::default()),
      Err(CaptureError::SchemeMismatch)
    ));
  }

  #[test]
  fn blank_input_dispatches_through_wrapper() {
    let url = Url::parse("blank://?count=2").unwrap();
    let mut input = InputWrapper::open(&url, FrameDims::new(8, 6)).unwrap();
    assert_eq!(input.next_frame().unwrap().dims(), FrameDims::new(8, 6));
    assert!(input.next_frame().is_ok());
    assert!(matches!(input.next_frame(), Err(CaptureError::Exhausted)));
  }
}
