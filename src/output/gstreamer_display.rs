// 该文件是 Lupai （路牌） 项目的一部分。
// src/output/gstreamer_display.rs - GStreamer 窗口/视频文件输出
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

//! # GStreamer 显示输出
//!
//! - `gst://window?fps=15`：在桌面窗口中实时显示；关闭窗口会被当作本地退出操作；
//! - `gst://file/output.mp4?fps=30`：编码保存为视频文件（mp4 / mkv / avi / webm）。
//!
//! 两种方式都支持 `font=/path/to/font.ttf` 指定叠加文字的字体。

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::RgbFrame,
  output::{
    DisplaySink, Overlay,
    draw::{DEFAULT_FONT_PATH, Draw, DrawError},
  },
};

use gstreamer::{self as gst, prelude::*};
use gstreamer_app as gst_app;
use thiserror::Error;
use tracing::{error, info, warn};
use url::Url;

/// GStreamer 显示输出错误类型
#[derive(Error, Debug)]
pub enum GStreamerDisplayError {
  /// URI scheme 不匹配
  #[error("URI scheme mismatch")]
  SchemeMismatch,
  /// GStreamer 库错误
  #[error("GStreamer error: {0}")]
  GStreamerError(#[from] gst::glib::Error),
  /// 无法获取 appsrc 元素
  #[error("Failed to get appsrc element")]
  AppSrcNotFound,
  /// 无法转换元素为 appsrc
  #[error("Failed to convert element to appsrc")]
  AppSrcConversionFailed,
  /// 管道错误
  #[error("Pipeline error: {0}")]
  PipelineError(String),
  /// 状态改变错误
  #[error("State change error: {0}")]
  StateChangeError(#[from] gst::StateChangeError),
  /// 缓冲区创建错误
  #[error("Buffer creation error")]
  BufferCreationError,
  /// 字体加载错误
  #[error("Draw error: {0}")]
  DrawError(#[from] DrawError),
}

fn file_pipeline(file_path: &str) -> String {
  let encoder = if file_path.ends_with(".mkv") {
    "video/x-raw,format=I420 ! x264enc speed-preset=fast ! h264parse ! matroskamux"
  } else if file_path.ends_with(".avi") {
    "video/x-raw,format=I420 ! x264enc ! avimux"
  } else if file_path.ends_with(".webm") {
    "vp8enc ! webmmux"
  } else {
    "video/x-raw,format=I420 ! x264enc speed-preset=fast tune=zerolatency ! h264parse ! mp4mux"
  };
  format!(
    "appsrc name=src ! videoconvert ! {} ! filesink location={}",
    encoder, file_path
  )
}

const WINDOW_PIPELINE: &str = "appsrc name=src is-live=true ! videoconvert ! autovideosink sync=false";

pub struct GStreamerDisplay {
  pipeline: gst::Pipeline,
  appsrc: gst_app::AppSrc,
  draw: Draw,
  fps: i32,
  frame_count: u64,
  caps_set: bool,
  closed: bool,
}

impl FromUrlWithScheme for GStreamerDisplay {
  const SCHEME: &'static str = "gst";
}

impl FromUrl for GStreamerDisplay {
  type Error = GStreamerDisplayError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(GStreamerDisplayError::SchemeMismatch);
    }

    // 重复初始化是安全的
    gst::init()?;

    let query_pairs: std::collections::HashMap<_, _> = url.query_pairs().collect();
    let fps: i32 = query_pairs
      .get("fps")
      .and_then(|v| v.parse().ok())
      .unwrap_or(15);
    let font = query_pairs
      .get("font")
      .map(|v| v.to_string())
      .unwrap_or_else(|| DEFAULT_FONT_PATH.to_string());

    let pipeline_desc = match url.host_str() {
      Some("window") => WINDOW_PIPELINE.to_string(),
      Some("file") => file_pipeline(url.path()),
      _ => return Err(GStreamerDisplayError::SchemeMismatch),
    };
    info!("Creating display pipeline: {}", pipeline_desc);

    let pipeline = gst::parse::launch(&pipeline_desc)?
      .downcast::<gst::Pipeline>()
      .map_err(|_| GStreamerDisplayError::PipelineError("Failed to create pipeline".to_string()))?;

    let appsrc = pipeline
      .by_name("src")
      .ok_or(GStreamerDisplayError::AppSrcNotFound)?
      .downcast::<gst_app::AppSrc>()
      .map_err(|_| GStreamerDisplayError::AppSrcConversionFailed)?;
    appsrc.set_format(gst::Format::Time);

    let draw = Draw::from_font_file(font)?;
    pipeline.set_state(gst::State::Playing)?;

    Ok(GStreamerDisplay {
      pipeline,
      appsrc,
      draw,
      fps,
      frame_count: 0,
      caps_set: false,
      closed: false,
    })
  }
}

impl GStreamerDisplay {
  /// 在第一帧到来时根据帧尺寸设置 caps
  fn ensure_caps(&mut self, frame: &RgbFrame) {
    if self.caps_set {
      return;
    }
    let caps = gst::Caps::builder("video/x-raw")
      .field("format", "RGB")
      .field("width", frame.width() as i32)
      .field("height", frame.height() as i32)
      .field("framerate", gst::Fraction::new(self.fps, 1))
      .build();
    self.appsrc.set_caps(Some(&caps));
    self.caps_set = true;
    info!(
      "Display output initialized: {}x{} @ {} fps",
      frame.width(),
      frame.height(),
      self.fps
    );
  }

  fn push_frame(&mut self, data: &[u8]) -> Result<(), GStreamerDisplayError> {
    let mut buffer =
      gst::Buffer::with_size(data.len()).map_err(|_| GStreamerDisplayError::BufferCreationError)?;

    let timestamp = (self.frame_count * 1_000_000_000) / (self.fps as u64);
    self.frame_count += 1;

    {
      let buffer_ref = buffer
        .get_mut()
        .ok_or(GStreamerDisplayError::BufferCreationError)?;
      buffer_ref.set_pts(gst::ClockTime::from_nseconds(timestamp));
      buffer_ref.set_duration(gst::ClockTime::from_nseconds(
        1_000_000_000 / self.fps as u64,
      ));
      let mut buffer_map = buffer_ref.map_writable().map_err(|_| {
        GStreamerDisplayError::PipelineError("Failed to map buffer".to_string())
      })?;
      buffer_map.copy_from_slice(data);
    }

    self.appsrc.push_buffer(buffer).map_err(|e| {
      GStreamerDisplayError::PipelineError(format!("Failed to push buffer: {:?}", e))
    })?;

    Ok(())
  }
}

impl DisplaySink for GStreamerDisplay {
  type Error = GStreamerDisplayError;

  fn render(&mut self, frame: &RgbFrame, overlay: Option<&Overlay>) -> Result<(), Self::Error> {
    self.ensure_caps(frame);
    let image = self.draw.draw_overlay(frame, overlay);
    self.push_frame(image.as_raw())
  }

  /// 窗口被关闭时 sink 会在总线上报告错误或 EOS
  fn poll_exit(&mut self) -> bool {
    let Some(bus) = self.pipeline.bus() else {
      return false;
    };
    match bus.pop_filtered(&[gst::MessageType::Error, gst::MessageType::Eos]) {
      Some(message) => {
        match message.view() {
          gst::MessageView::Error(err) => warn!("显示管道错误: {}", err.error()),
          _ => info!("显示管道结束"),
        }
        true
      }
      None => false,
    }
  }

  fn close(&mut self) {
    if self.closed {
      return;
    }
    self.closed = true;

    // 发送 EOS 以便正确写完文件
    let _ = self.appsrc.end_of_stream();
    if let Some(bus) = self.pipeline.bus() {
      let _ = bus.timed_pop_filtered(
        gst::ClockTime::from_seconds(2),
        &[gst::MessageType::Eos, gst::MessageType::Error],
      );
    }

    if let Err(e) = self.pipeline.set_state(gst::State::Null) {
      warn!("Failed to stop GStreamer display pipeline: {}", e);
    }
    info!("Display output closed. Total frames written: {}", self.frame_count);
  }
}

impl Drop for GStreamerDisplay {
  fn drop(&mut self) {
    self.close();
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn file_pipeline_follows_extension() {
    assert!(file_pipeline("/tmp/out.mkv").contains("matroskamux"));
    assert!(file_pipeline("/tmp/out.webm").contains("vp8enc"));
    assert!(file_pipeline("/tmp/out").contains("mp4mux"));
  }
}
