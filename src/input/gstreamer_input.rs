// 该文件是 Lupai （路牌） 项目的一部分。
// src/input/gstreamer_input.rs - GStreamer 输入
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

//! # GStreamer 视频输入模块
//!
//! 支持摄像头（V4L2）与视频文件两类来源，输出统一缩放到配置的帧尺寸：
//!
//! - `gst://camera/dev/video0?format=YUY2&width=640&height=480&fps=30&rotate=90`
//! - `gst://file/path/to/video.mp4`
//!
//! ## 系统依赖
//!
//! **Ubuntu/Debian:**
//! ```bash
//! sudo apt-get install libgstreamer1.0-dev libgstreamer-plugins-base1.0-dev
//! ```
//!
//! ## 安全性注意
//!
//! 路径与参数会直接拼入管道描述。在生产环境中使用不可信输入时，
//! 应验证或限制 URL 以防止资源滥用。

use std::collections::HashMap;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{FrameDims, RgbFrame},
  input::{CaptureError, FrameSource},
};

use gstreamer::{self as gst, prelude::*};
use gstreamer_app as gst_app;
use gstreamer_video as gst_video;
use thiserror::Error;
use tracing::{error, info, warn};
use url::Url;

/// GStreamer 输入错误类型
#[derive(Error, Debug)]
pub enum GStreamerInputError {
  /// URI scheme 不匹配（期望 "gst://"）
  #[error("URI scheme mismatch")]
  SchemeMismatch,
  /// GStreamer 库错误
  #[error("GStreamer error: {0}")]
  GStreamerError(#[from] gst::glib::Error),
  /// 无法获取 appsink 元素
  #[error("Failed to get appsink element")]
  AppSinkNotFound,
  /// 无法转换元素为 appsink
  #[error("Failed to convert element to appsink")]
  AppSinkConversionFailed,
  /// 无法从 caps 获取视频信息
  #[error("Failed to get video info from caps")]
  VideoInfoError,
  /// 不支持的视频格式
  #[error("Unsupported video format")]
  UnsupportedFormat,
  /// 管道错误
  #[error("Pipeline error: {0}")]
  PipelineError(String),
  /// 缓冲区大小不匹配
  #[error("Buffer size mismatch: expected {expected} bytes, got {actual} bytes")]
  BufferSizeMismatch { expected: usize, actual: usize },
  /// 状态改变错误
  #[error("State change error: {0}")]
  StateChangeError(#[from] gst::StateChangeError),
}

pub enum GStreamerInputBuilderItem {
  FileSource(String),
  CameraSource {
    camera: String,
    io_mode: Option<u32>,
    format: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    fps: u32,
  },
  AspectRatio {
    ratio: (u32, u32),
  },
  Scale {
    width: u32,
    height: u32,
  },
  VideoFlip {
    method: u32,
    direction: u32,
  },
  TargetFormat {
    format: String,
  },
}

impl GStreamerInputBuilderItem {
  fn to_pipeline(&self) -> String {
    match self {
      GStreamerInputBuilderItem::FileSource(path) => {
        format!("filesrc location={} ! decodebin", path)
      }
      GStreamerInputBuilderItem::CameraSource {
        camera,
        io_mode,
        format,
        width,
        height,
        fps,
      } => {
        let io_mode_str = io_mode
          .map(|mode| format!(" io-mode={}", mode))
          .unwrap_or_default();
        let mut caps = String::from("video/x-raw");
        if let Some(format) = format {
          caps.push_str(&format!(",format={}", format));
        }
        if let Some(width) = width {
          caps.push_str(&format!(",width={}", width));
        }
        if let Some(height) = height {
          caps.push_str(&format!(",height={}", height));
        }
        format!(
          "v4l2src device={}{} ! {},framerate={}/1",
          camera, io_mode_str, caps, fps
        )
      }
      GStreamerInputBuilderItem::AspectRatio { ratio } => {
        format!("aspectratiocrop aspect-ratio={}/{}", ratio.0, ratio.1)
      }
      GStreamerInputBuilderItem::Scale { width, height } => {
        format!("videoscale ! video/x-raw,width={},height={}", width, height)
      }
      GStreamerInputBuilderItem::VideoFlip { method, direction } => {
        format!("videoflip method={} video-direction={}", method, direction)
      }
      GStreamerInputBuilderItem::TargetFormat { format } => {
        format!("videoconvert ! video/x-raw,format={}", format)
      }
    }
  }
}

/// GStreamer 输入管道构建器
pub struct GStreamerInputPipelineBuilder {
  items: Vec<GStreamerInputBuilderItem>,
  dims: FrameDims,
}

impl GStreamerInputPipelineBuilder {
  fn build_camera_pipeline(path: &str, query: &HashMap<String, String>) -> Self {
    let item = GStreamerInputBuilderItem::CameraSource {
      camera: path.to_string(),
      io_mode: query.get("io-mode").and_then(|v| v.parse::<u32>().ok()),
      format: query.get("format").cloned(),
      width: query.get("width").and_then(|v| v.parse::<u32>().ok()),
      height: query.get("height").and_then(|v| v.parse::<u32>().ok()),
      fps: query
        .get("fps")
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(15),
    };

    let mut items = vec![item];
    items.extend(Self::video_flip(query.get("rotate").map(|s| s.as_ref())));
    Self {
      items,
      dims: FrameDims::default(),
    }
  }

  fn build_file_pipeline(path: &str, query: &HashMap<String, String>) -> Self {
    let mut items = vec![GStreamerInputBuilderItem::FileSource(path.to_string())];
    items.extend(Self::video_flip(query.get("rotate").map(|s| s.as_ref())));
    Self {
      items,
      dims: FrameDims::default(),
    }
  }

  fn video_flip(rotate: Option<&str>) -> Option<GStreamerInputBuilderItem> {
    let (method, direction) = match rotate? {
      "90" => (1, 1),
      "180" => (2, 2),
      "270" => (3, 3),
      _ => (0, 0),
    };
    Some(GStreamerInputBuilderItem::VideoFlip { method, direction })
  }

  /// 输出帧尺寸，管道末尾裁剪并缩放到该尺寸
  pub fn frame_dims(mut self, dims: FrameDims) -> Self {
    self.dims = dims;
    self
  }

  pub fn pipeline_description(&self) -> String {
    let tail = [
      GStreamerInputBuilderItem::AspectRatio {
        ratio: (self.dims.width, self.dims.height),
      },
      GStreamerInputBuilderItem::Scale {
        width: self.dims.width,
        height: self.dims.height,
      },
      GStreamerInputBuilderItem::TargetFormat {
        format: "RGB".to_string(),
      },
    ];
    let basic_pipeline = self
      .items
      .iter()
      .chain(tail.iter())
      .map(GStreamerInputBuilderItem::to_pipeline)
      .collect::<Vec<String>>()
      .join(" ! ");
    format!(
      "{} ! appsink max-buffers=2 drop=true name=sink",
      basic_pipeline
    )
  }

  pub fn build(self) -> Result<GStreamerInput, GStreamerInputError> {
    gst::init()?;

    let full_pipeline = self.pipeline_description();
    info!("GStreamer pipeline description: {}", full_pipeline);

    let pipeline = gst::parse::launch(&full_pipeline)?
      .downcast::<gst::Pipeline>()
      .map_err(|_| GStreamerInputError::PipelineError("Failed to create pipeline".to_string()))?;

    let appsink = pipeline
      .by_name("sink")
      .ok_or(GStreamerInputError::AppSinkNotFound)?
      .downcast::<gst_app::AppSink>()
      .map_err(|_| GStreamerInputError::AppSinkConversionFailed)?;

    pipeline.set_state(gst::State::Playing)?;

    Ok(GStreamerInput {
      pipeline,
      appsink,
      dims: self.dims,
      released: false,
    })
  }
}

impl FromUrlWithScheme for GStreamerInputPipelineBuilder {
  const SCHEME: &'static str = "gst";
}

impl FromUrl for GStreamerInputPipelineBuilder {
  type Error = GStreamerInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(GStreamerInputError::SchemeMismatch);
    }

    let query: HashMap<String, String> = url
      .query_pairs()
      .map(|(k, v)| (String::from(k), String::from(v)))
      .collect();

    match url.host_str() {
      Some("camera") => Ok(Self::build_camera_pipeline(url.path(), &query)),
      Some("file") => Ok(Self::build_file_pipeline(url.path(), &query)),
      _ => Err(GStreamerInputError::SchemeMismatch),
    }
  }
}

/// GStreamer 视频输入，管理管道与 appsink
pub struct GStreamerInput {
  pipeline: gst::Pipeline,
  appsink: gst_app::AppSink,
  dims: FrameDims,
  released: bool,
}

impl Drop for GStreamerInput {
  fn drop(&mut self) {
    self.release();
  }
}

impl GStreamerInput {
  fn convert_sample(&self, sample: gst::Sample) -> Result<RgbFrame, GStreamerInputError> {
    let buffer = sample
      .buffer()
      .ok_or_else(|| GStreamerInputError::PipelineError("No buffer in sample".to_string()))?;
    let caps = sample
      .caps()
      .ok_or_else(|| GStreamerInputError::PipelineError("No caps in sample".to_string()))?;

    let video_info =
      gst_video::VideoInfo::from_caps(caps).map_err(|_| GStreamerInputError::VideoInfoError)?;

    let width = video_info.width() as usize;
    let height = video_info.height() as usize;
    let stride = video_info.stride()[0] as usize;

    let map = buffer.map_readable().map_err(|e| {
      GStreamerInputError::PipelineError(format!("Failed to map buffer for reading: {}", e))
    })?;
    let data = map.as_slice();

    let expected_size = stride * (height.saturating_sub(1)) + width * 3;
    if data.len() < expected_size {
      return Err(GStreamerInputError::BufferSizeMismatch {
        expected: expected_size,
        actual: data.len(),
      });
    }

    let dims = FrameDims::new(width as u32, height as u32);
    let mut pixels = Vec::with_capacity(dims.byte_len());
    match video_info.format() {
      gst_video::VideoFormat::Rgb => {
        for row in data.chunks(stride).take(height) {
          pixels.extend_from_slice(&row[..width * 3]);
        }
      }
      gst_video::VideoFormat::Bgr => {
        for row in data.chunks(stride).take(height) {
          for bgr in row[..width * 3].chunks_exact(3) {
            pixels.extend_from_slice(&[bgr[2], bgr[1], bgr[0]]);
          }
        }
      }
      _ => return Err(GStreamerInputError::UnsupportedFormat),
    }

    Ok(RgbFrame::new(dims, pixels))
  }
}

impl FrameSource for GStreamerInput {
  fn next_frame(&mut self) -> Result<RgbFrame, CaptureError> {
    let sample = match self.appsink.pull_sample() {
      Ok(sample) => sample,
      Err(_) if self.appsink.is_eos() => return Err(CaptureError::Exhausted),
      Err(e) => {
        error!("Failed to pull sample: {}", e);
        return Err(CaptureError::Unavailable(e.to_string()));
      }
    };

    let frame = self.convert_sample(sample)?;
    if frame.dims() != self.dims {
      warn!("GStreamer 输出尺寸 {} 与配置 {} 不一致", frame.dims(), self.dims);
    }
    Ok(frame)
  }

  fn release(&mut self) {
    if self.released {
      return;
    }
    self.released = true;
    if let Err(e) = self.pipeline.set_state(gst::State::Null) {
      warn!("Failed to stop GStreamer pipeline: {}", e);
    }
    info!("GStreamer 输入管道已停止");
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn camera_url_builds_scaled_pipeline() {
    let url = Url::parse("gst://camera/dev/video0?format=YUY2&fps=30&rotate=180").unwrap();
    let builder = GStreamerInputPipelineBuilder::from_url(&url)
      .unwrap()
      .frame_dims(FrameDims::new(320, 240));
    let description = builder.pipeline_description();

    assert!(description.starts_with(
      "v4l2src device=/dev/video0 ! video/x-raw,format=YUY2,framerate=30/1"
    ));
    assert!(description.contains("videoflip method=2"));
    assert!(description.contains("videoscale ! video/x-raw,width=320,height=240"));
    assert!(description.ends_with("appsink max-buffers=2 drop=true name=sink"));
  }

  #[test]
  fn unknown_host_is_rejected() {
    let url = Url::parse("gst://rtsp/stream").unwrap();
    assert!(GStreamerInputPipelineBuilder::from_url(&url).is_err());
  }
}
