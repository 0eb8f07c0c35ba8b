// 该文件是 Lupai （路牌） 项目的一部分。
// src/model.rs - 分类模型接口
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

use crate::frame::RgbFrame;

/// 标签目录中的下标
pub type LabelId = usize;

pub const DEFAULT_ACCEPTANCE_THRESHOLD: f64 = 0.90;

/// 单帧分类结果，`label` 为 `None` 表示没有类别通过阈值
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ClassificationResult {
  pub label: Option<LabelId>,
  pub confidence: Option<f64>,
}

impl ClassificationResult {
  pub fn accepted(label: LabelId, confidence: f64) -> Self {
    Self {
      label: Some(label),
      confidence: Some(confidence),
    }
  }

  pub fn abstain() -> Self {
    Self::default()
  }

  pub fn is_accepted(&self) -> bool {
    self.label.is_some()
  }
}

pub trait Classifier {
  type Error;

  fn classify(&mut self, frame: &RgbFrame) -> Result<ClassificationResult, Self::Error>;
}

/// 置信度门限：最大得分严格大于阈值才接受
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreGate {
  threshold: f64,
}

impl Default for ScoreGate {
  fn default() -> Self {
    Self::new(DEFAULT_ACCEPTANCE_THRESHOLD)
  }
}

impl ScoreGate {
  pub fn new(threshold: f64) -> Self {
    Self { threshold }
  }

  pub fn threshold(&self) -> f64 {
    self.threshold
  }

  pub fn accept(&self, label: LabelId, confidence: f64) -> ClassificationResult {
    if confidence > self.threshold {
      ClassificationResult::accepted(label, confidence)
    } else {
      ClassificationResult::abstain()
    }
  }

  /// 对概率向量取 argmax 后再过门限
  pub fn gate(&self, scores: &[f32]) -> ClassificationResult {
    let best = scores
      .iter()
      .copied()
      .enumerate()
      .filter(|(_, score)| !score.is_nan())
      .max_by(|(_, a), (_, b)| a.total_cmp(b));

    match best {
      Some((label, score)) => self.accept(label, score as f64),
      None => ClassificationResult::abstain(),
    }
  }
}

#[derive(Error, Debug)]
pub enum ClassifierError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("脚本第 {line} 行格式错误: {content}")]
  ScriptParse { line: usize, content: String },
}

mod labels;
pub use self::labels::{CatalogError, GTSRB_LABELS, LabelCatalog};

mod scripted;
pub use self::scripted::ScriptedClassifier;
