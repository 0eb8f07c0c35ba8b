// 该文件是 Lupai （路牌） 项目的一部分。
// src/config.rs - 检测参数配置
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

use std::{path::PathBuf, time::Duration};

use thiserror::Error;
use tracing::info;

use crate::{
  announce::{AnnounceKind, AnnouncerWrapper, DEFAULT_SPEECH_COMMAND},
  consensus::DEFAULT_CONSENSUS_RUN,
  frame::FrameDims,
  hold::DEFAULT_HOLD_DURATION,
  model::{CatalogError, DEFAULT_ACCEPTANCE_THRESHOLD, LabelCatalog},
};

/// 保持期内叠加内容的来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OverlayPolicy {
  /// 显示最近一次确认的结果，直到保持期结束
  #[default]
  Persistent,
  /// 保持期内只在当前帧通过阈值时显示当前帧的结果
  FollowClassification,
}

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
  #[error("置信度阈值必须在 [0, 1] 之间: {0}")]
  InvalidThreshold(f64),
  #[error("连续确认帧数必须至少为 1")]
  ZeroConsensusRun,
  #[error("帧尺寸无效: {0}")]
  EmptyFrame(FrameDims),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectorConfig {
  pub frame_dims: FrameDims,
  pub acceptance_threshold: f64,
  pub consensus_run: usize,
  pub hold_duration: Duration,
  pub overlay_policy: OverlayPolicy,
}

impl Default for DetectorConfig {
  fn default() -> Self {
    Self {
      frame_dims: FrameDims::default(),
      acceptance_threshold: DEFAULT_ACCEPTANCE_THRESHOLD,
      consensus_run: DEFAULT_CONSENSUS_RUN,
      hold_duration: DEFAULT_HOLD_DURATION,
      overlay_policy: OverlayPolicy::default(),
    }
  }
}

impl DetectorConfig {
  pub fn validate(&self) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&self.acceptance_threshold) {
      return Err(ConfigError::InvalidThreshold(self.acceptance_threshold));
    }
    if self.consensus_run == 0 {
      return Err(ConfigError::ZeroConsensusRun);
    }
    if self.frame_dims.byte_len() == 0 {
      return Err(ConfigError::EmptyFrame(self.frame_dims));
    }
    Ok(())
  }
}

/// 两个可执行程序共用的检测参数
#[derive(clap::Args, Debug, Clone)]
pub struct DetectorArgs {
  /// 帧宽度
  #[arg(long, default_value_t = 640, value_name = "PIXELS")]
  pub width: u32,

  /// 帧高度
  #[arg(long, default_value_t = 480, value_name = "PIXELS")]
  pub height: u32,

  /// 置信度阈值 (0.0 - 1.0)，严格大于才接受
  #[arg(long, default_value_t = DEFAULT_ACCEPTANCE_THRESHOLD, value_name = "THRESHOLD")]
  pub threshold: f64,

  /// 确认所需的连续一致帧数
  #[arg(long, default_value_t = DEFAULT_CONSENSUS_RUN, value_name = "FRAMES")]
  pub consensus_run: usize,

  /// 确认后叠加显示的保持时间（毫秒）
  #[arg(long, default_value_t = 2000, value_name = "MILLIS")]
  pub hold_ms: u64,

  /// 保持期内的叠加策略
  #[arg(long, value_enum, default_value_t = OverlayPolicy::Persistent)]
  pub overlay: OverlayPolicy,

  /// 标签名文件，每行一个；缺省使用内置 GTSRB 标签
  #[arg(long, value_name = "FILE")]
  pub labels: Option<PathBuf>,

  /// 播报方式
  #[arg(long, value_enum, default_value_t = AnnounceKind::Speak)]
  pub announce: AnnounceKind,

  /// 语音合成命令，可带参数
  #[arg(long, default_value = DEFAULT_SPEECH_COMMAND, value_name = "COMMAND")]
  pub speech_command: String,

  /// 最大处理帧数，缺省不限制
  #[arg(long, value_name = "COUNT")]
  pub max_frames: Option<usize>,
}

impl DetectorArgs {
  pub fn to_config(&self) -> Result<DetectorConfig, ConfigError> {
    let config = DetectorConfig {
      frame_dims: FrameDims::new(self.width, self.height),
      acceptance_threshold: self.threshold,
      consensus_run: self.consensus_run,
      hold_duration: Duration::from_millis(self.hold_ms),
      overlay_policy: self.overlay,
    };
    config.validate()?;
    info!(
      "检测参数: {} 阈值 {} 连续 {} 帧 保持 {:?} 叠加 {:?}",
      config.frame_dims,
      config.acceptance_threshold,
      config.consensus_run,
      config.hold_duration,
      config.overlay_policy
    );
    Ok(config)
  }

  pub fn catalog(&self) -> Result<LabelCatalog, CatalogError> {
    match &self.labels {
      Some(path) => LabelCatalog::load(path),
      None => Ok(LabelCatalog::gtsrb()),
    }
  }

  pub fn announcer(&self) -> AnnouncerWrapper {
    AnnouncerWrapper::new(self.announce, &self.speech_command)
  }
}

#[cfg(test)]
mod tests {
  use clap::Parser;

  use super::*;

  #[derive(Parser)]
  struct Cli {
    #[command(flatten)]
    detector: DetectorArgs,
  }

  #[test]
  fn defaults_match_detector_config() {
    let cli = Cli::parse_from(["lupai"]);
    assert_eq!(cli.detector.to_config(), Ok(DetectorConfig::default()));
    assert!(cli.detector.max_frames.is_none());
  }

  #[test]
  fn flags_override_defaults() {
    let cli = Cli::parse_from([
      "lupai",
      "--consensus-run",
      "3",
      "--hold-ms",
      "500",
      "--overlay",
      "follow-classification",
      "--announce",
      "log",
    ]);
    let config = cli.detector.to_config().unwrap();
    assert_eq!(config.consensus_run, 3);
    assert_eq!(config.hold_duration, Duration::from_millis(500));
    assert_eq!(config.overlay_policy, OverlayPolicy::FollowClassification);
    assert!(matches!(cli.detector.announcer(), AnnouncerWrapper::Log(_)));
  }

  #[test]
  fn invalid_values_are_rejected() {
    let mut config = DetectorConfig {
      acceptance_threshold: 1.5,
      ..Default::default()
    };
    assert_eq!(config.validate(), Err(ConfigError::InvalidThreshold(1.5)));

    config.acceptance_threshold = 0.9;
    config.consensus_run = 0;
    assert_eq!(config.validate(), Err(ConfigError::ZeroConsensusRun));

    config.consensus_run = 5;
    config.frame_dims = FrameDims::new(0, 480);
    assert!(matches!(config.validate(), Err(ConfigError::EmptyFrame(_))));
  }

  #[test]
  fn missing_labels_file_falls_back_to_gtsrb() {
    let cli = Cli::parse_from(["lupai"]);
    assert_eq!(cli.detector.catalog().unwrap().resolve(14), "Stop");
  }
}
