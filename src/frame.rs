// 该文件是 Lupai （路牌） 项目的一部分。
// src/frame.rs - RGB 帧定义
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

pub const RGB_CHANNELS: usize = 3;

/// 帧尺寸（像素）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameDims {
  pub width: u32,
  pub height: u32,
}

impl FrameDims {
  pub const fn new(width: u32, height: u32) -> Self {
    Self { width, height }
  }

  /// RGB 打包格式下一帧所占字节数
  pub fn byte_len(&self) -> usize {
    RGB_CHANNELS * self.width as usize * self.height as usize
  }
}

impl Default for FrameDims {
  fn default() -> Self {
    Self::new(640, 480)
  }
}

impl fmt::Display for FrameDims {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}x{}", self.width, self.height)
  }
}

/// NHWC 排列的 RGB 帧，尺寸在运行时确定
#[derive(Debug, Clone)]
pub struct RgbFrame {
  dims: FrameDims,
  data: Box<[u8]>,
}

impl RgbFrame {
  /// 数据长度与尺寸不符属于调用方错误，直接 panic
  pub fn new(dims: FrameDims, data: Vec<u8>) -> Self {
    if data.len() != dims.byte_len() {
      panic!(
        "数据长度不匹配: 期望长度 {}, 实际长度 {}",
        dims.byte_len(),
        data.len()
      );
    }

    Self {
      dims,
      data: data.into_boxed_slice(),
    }
  }

  pub fn blank(dims: FrameDims) -> Self {
    Self {
      dims,
      data: vec![0u8; dims.byte_len()].into_boxed_slice(),
    }
  }

  pub fn dims(&self) -> FrameDims {
    self.dims
  }

  pub fn width(&self) -> usize {
    self.dims.width as usize
  }

  pub fn height(&self) -> usize {
    self.dims.height as usize
  }

  pub fn channels(&self) -> usize {
    RGB_CHANNELS
  }

  pub fn as_nhwc(&self) -> &[u8] {
    &self.data
  }
}

impl AsMut<[u8]> for RgbFrame {
  fn as_mut(&mut self) -> &mut [u8] {
    &mut self.data
  }
}
