// 该文件是 Lupai （路牌） 项目的一部分。
// src/output/directory_record.rs - 目录记录输出
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

use chrono::{Datelike, Local};
use thiserror::Error;
use tracing::{debug, info};

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::RgbFrame,
  output::{
    DisplaySink, Overlay,
    draw::{DEFAULT_FONT_PATH, Draw, DrawError},
  },
};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("绘制错误: {0}")]
  DrawError(#[from] DrawError),
}

/// 把带叠加的画面保存到 `folder:///dir/YYYY/MM/DD/`，
/// 默认只保存有叠加内容的帧，`?always` 保存每一帧
pub struct DirectoryRecordOutput {
  directory: PathBuf,
  draw: Draw,
  frame_counter: u16,
  always: bool,
  saved: u64,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }

    let always = uri.query_pairs().any(|(k, _)| k == "always");
    let font = uri
      .query_pairs()
      .find(|(k, _)| k == "font")
      .map(|(_, v)| v.into_owned())
      .unwrap_or_else(|| DEFAULT_FONT_PATH.to_string());

    let directory = PathBuf::from(uri.path());
    std::fs::create_dir_all(&directory)?;
    info!("记录输出目录: {}", directory.display());

    Ok(Self::new(directory, Draw::from_font_file(font)?).always(always))
  }
}

impl DirectoryRecordOutput {
  pub fn new(directory: PathBuf, draw: Draw) -> Self {
    Self {
      directory,
      draw,
      frame_counter: 0,
      always: false,
      saved: 0,
    }
  }

  pub fn always(mut self, always: bool) -> Self {
    self.always = always;
    self
  }

  fn frame_id(&mut self) -> u16 {
    self.frame_counter = self.frame_counter.wrapping_add(1);
    self.frame_counter
  }

  fn frame_path(&mut self) -> Result<PathBuf, DirectoryRecordOutputError> {
    let now = Local::now();
    let directory = self
      .directory
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()));
    if !directory.exists() {
      std::fs::create_dir_all(&directory)?;
    }

    Ok(directory.join(format!(
      "{}-{:04X}.png",
      now.format("%H-%M-%S"),
      self.frame_id()
    )))
  }

  fn record(path: &Path, overlay: &Overlay) -> Result<(), std::io::Error> {
    std::fs::write(path.with_extension("txt"), overlay.lines().join("\n"))
  }
}

impl DisplaySink for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn render(&mut self, frame: &RgbFrame, overlay: Option<&Overlay>) -> Result<(), Self::Error> {
    if !self.always && overlay.is_none() {
      return Ok(());
    }

    let path = self.frame_path()?;
    self.draw.draw_overlay(frame, overlay).save(&path)?;
    if let Some(overlay) = overlay {
      Self::record(&path, overlay)?;
    }
    self.saved += 1;
    debug!("保存画面 {}", path.display());
    Ok(())
  }

  fn close(&mut self) {
    info!(
      "记录输出关闭，共保存 {} 帧到 {}",
      self.saved,
      self.directory.display()
    );
  }
}
