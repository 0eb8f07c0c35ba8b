// 该文件是 Lupai （路牌） 项目的一部分。
// src/input/read_image_file.rs - 图像文件输入
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

use std::path::{Path, PathBuf};

use image::{ImageReader, RgbImage, imageops::FilterType};
use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{FrameDims, RgbFrame},
  input::{CaptureError, FrameSource},
};

#[derive(Error, Debug)]
pub enum ImageFileInputError {
  #[error("URI schema mismatch")]
  SchemaMismatch,
  #[error("I/O error: {0}")]
  IoError(#[from] std::io::Error),
  #[error("Image loading error: {0}")]
  ImageLoadError(#[from] image::ImageError),
  #[error("No image found in {}", .0.display())]
  NoImage(PathBuf),
}

const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "bmp", "gif", "webp"];

/// 单张图片或目录中的全部图片（按文件名排序），`image:///path?repeat=N`
pub struct ImageFileInput {
  paths: Vec<PathBuf>,
  dims: FrameDims,
  repeat: usize,
  cursor: usize,
}

impl FromUrlWithScheme for ImageFileInput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for ImageFileInput {
  type Error = ImageFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    Self::open_images(url, FrameDims::default())
  }
}

impl ImageFileInput {
  pub fn open(url: &Url, dims: FrameDims) -> Result<Self, CaptureError> {
    Ok(Self::open_images(url, dims)?)
  }

  fn open_images(url: &Url, dims: FrameDims) -> Result<Self, ImageFileInputError> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ImageFileInputError::SchemaMismatch);
    }

    let path = Path::new(url.path());
    let paths = if path.is_dir() {
      let mut paths = std::fs::read_dir(path)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && is_image(p))
        .collect::<Vec<_>>();
      paths.sort();
      paths
    } else {
      vec![path.to_path_buf()]
    };

    if paths.is_empty() {
      return Err(ImageFileInputError::NoImage(path.to_path_buf()));
    }

    let repeat = url
      .query_pairs()
      .find(|(k, _)| k == "repeat")
      .and_then(|(_, v)| v.parse::<usize>().ok())
      .unwrap_or(1);

    info!(
      "图像输入: {} 张图片, 重复 {} 次, 输出尺寸 {}",
      paths.len(),
      repeat,
      dims
    );

    Ok(Self {
      paths,
      dims,
      repeat,
      cursor: 0,
    })
  }

  fn load(&self, path: &Path) -> Result<RgbFrame, ImageFileInputError> {
    debug!("读取图片 {}", path.display());
    let mut image: RgbImage = ImageReader::open(path)?.decode()?.into_rgb8();
    if image.dimensions() != (self.dims.width, self.dims.height) {
      image = image::imageops::resize(
        &image,
        self.dims.width,
        self.dims.height,
        FilterType::Triangle,
      );
    }
    Ok(RgbFrame::new(self.dims, image.into_raw()))
  }
}

impl FrameSource for ImageFileInput {
  fn next_frame(&mut self) -> Result<RgbFrame, CaptureError> {
    if self.cursor >= self.paths.len() * self.repeat {
      return Err(CaptureError::Exhausted);
    }
    let path = self.paths[self.cursor % self.paths.len()].clone();
    self.cursor += 1;
    Ok(self.load(&path)?)
  }
}

fn is_image(path: &Path) -> bool {
  path
    .extension()
    .and_then(|ext| ext.to_str())
    .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
    .unwrap_or(false)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn write_png(dir: &Path, name: &str, size: (u32, u32)) {
    RgbImage::from_pixel(size.0, size.1, image::Rgb([10, 20, 30]))
      .save(dir.join(name))
      .unwrap();
  }

  #[test]
  fn directory_is_read_in_order_and_scaled() {
    let dir = tempfile::tempdir().unwrap();
    write_png(dir.path(), "b.png", (8, 8));
    write_png(dir.path(), "a.png", (16, 12));
    std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

    let url = Url::parse(&format!("image://{}?repeat=2", dir.path().display())).unwrap();
    let mut input = ImageFileInput::open(&url, FrameDims::new(4, 4)).unwrap();
    assert_eq!(input.paths.len(), 2);
    assert!(input.paths[0].ends_with("a.png"));

    for _ in 0..4 {
      let frame = input.next_frame().unwrap();
      assert_eq!(frame.dims(), FrameDims::new(4, 4));
      assert_eq!(&frame.as_nhwc()[..3], &[10, 20, 30]);
    }
    assert!(matches!(input.next_frame(), Err(CaptureError::Exhausted)));
  }

  #[test]
  fn empty_directory_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let url = Url::parse(&format!("image://{}", dir.path().display())).unwrap();
    assert!(matches!(
      ImageFileInput::open(&url, FrameDims::default()),
      Err(CaptureError::ImageFileInputError(ImageFileInputError::NoImage(_)))
    ));
  }
}
