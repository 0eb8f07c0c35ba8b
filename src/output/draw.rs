// 该文件是 Lupai （路牌） 项目的一部分。
// src/output/draw.rs - 识别结果叠加绘制
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

use std::path::Path;

use ab_glyph::{FontVec, PxScale};
use image::{ImageBuffer, Rgb, RgbImage};
use imageproc::drawing::draw_text_mut;
use thiserror::Error;
use tracing::info;

use crate::{frame::RgbFrame, output::Overlay};

// 文本渲染常量
pub const DEFAULT_FONT_PATH: &str = "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf";
const LABEL_FONT_SIZE: f32 = 24.0;
const LABEL_ORIGINS: [(i32, i32); 2] = [(20, 15), (20, 55)]; // 两行文本左上角
const LABEL_COLOR: [u8; 3] = [255, 0, 0]; // 红色

#[derive(Error, Debug)]
pub enum DrawError {
  #[error("无法读取字体文件: {0}")]
  IoError(#[from] std::io::Error),
  #[error("字体文件无效: {0}")]
  InvalidFont(#[from] ab_glyph::InvalidFont),
}

pub struct Draw {
  font: FontVec,
  font_size: f32,
  label_color: [u8; 3],
}

impl Draw {
  pub fn from_font_file(path: impl AsRef<Path>) -> Result<Self, DrawError> {
    let path = path.as_ref();
    let font = FontVec::try_from_vec(std::fs::read(path)?)?;
    info!("加载字体 {}", path.display());
    Ok(Self::with_font(font))
  }

  pub fn with_font(font: FontVec) -> Self {
    Self {
      font,
      font_size: LABEL_FONT_SIZE,
      label_color: LABEL_COLOR,
    }
  }

  pub fn draw_overlay_on_image(&self, image: &mut RgbImage, overlay: &Overlay) {
    let scale = PxScale::from(self.font_size);
    for ((x, y), line) in LABEL_ORIGINS.iter().zip(overlay.lines().iter()) {
      draw_text_mut(
        image,
        Rgb(self.label_color),
        *x,
        *y,
        scale,
        &self.font,
        line,
      );
    }
  }

  /// 没有叠加内容时原样返回画面
  pub fn draw_overlay(&self, frame: &RgbFrame, overlay: Option<&Overlay>) -> RgbImage {
    let mut image = frame.to_rgb_image();
    if let Some(overlay) = overlay {
      self.draw_overlay_on_image(&mut image, overlay);
    }
    image
  }
}

pub trait ToRgbImage {
  fn to_rgb_image(&self) -> RgbImage;
}

impl ToRgbImage for RgbFrame {
  fn to_rgb_image(&self) -> RgbImage {
    let width = self.width() as u32;
    let data = self.as_nhwc();

    ImageBuffer::from_fn(width, self.height() as u32, |x, y| {
      let idx = (y as usize * width as usize + x as usize) * 3;
      Rgb([data[idx], data[idx + 1], data[idx + 2]])
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::frame::FrameDims;

  #[test]
  fn frame_converts_to_rgb_image() {
    let frame = RgbFrame::new(FrameDims::new(2, 1), vec![1, 2, 3, 4, 5, 6]);
    let image = frame.to_rgb_image();
    assert_eq!(image.dimensions(), (2, 1));
    assert_eq!(image.get_pixel(1, 0), &Rgb([4, 5, 6]));
  }

  #[test]
  fn missing_font_file_is_reported() {
    assert!(matches!(
      Draw::from_font_file("/nonexistent/font.ttf"),
      Err(DrawError::IoError(_))
    ));
  }
}
