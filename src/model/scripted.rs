// 该文件是 Lupai （路牌） 项目的一部分。
// src/model/scripted.rs - 脚本回放分类器
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

//! 按顺序回放预先记录的分类结果，每帧消费一条。
//!
//! 脚本格式为每行一条记录：
//!
//! ```text
//! # 标签 置信度
//! 14 0.93
//! -
//! ```
//!
//! `-` 表示该帧没有任何输出。原始置信度仍会经过 [`ScoreGate`]。

use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::RgbFrame,
  model::{ClassificationResult, Classifier, ClassifierError, LabelId, ScoreGate},
};

type ScriptEntry = Option<(LabelId, f64)>;

pub struct ScriptedClassifier {
  entries: Vec<ScriptEntry>,
  cursor: usize,
  looping: bool,
  gate: ScoreGate,
}

impl FromUrlWithScheme for ScriptedClassifier {
  const SCHEME: &'static str = "script";
}

impl FromUrl for ScriptedClassifier {
  type Error = ClassifierError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ClassifierError::SchemeMismatch);
    }

    let content = std::fs::read_to_string(url.path())?;
    let entries = parse_script(&content)?;
    let looping = url.query_pairs().any(|(k, _)| k == "loop");
    info!(
      "加载分类脚本 {}: {} 条记录{}",
      url.path(),
      entries.len(),
      if looping { "（循环）" } else { "" }
    );

    Ok(Self::from_entries(entries).looping(looping))
  }
}

impl ScriptedClassifier {
  pub fn from_entries(entries: Vec<ScriptEntry>) -> Self {
    Self {
      entries,
      cursor: 0,
      looping: false,
      gate: ScoreGate::default(),
    }
  }

  pub fn looping(mut self, looping: bool) -> Self {
    self.looping = looping;
    self
  }

  pub fn with_gate(mut self, gate: ScoreGate) -> Self {
    self.gate = gate;
    self
  }

  fn next_entry(&mut self) -> ScriptEntry {
    if self.entries.is_empty() {
      return None;
    }
    if self.cursor >= self.entries.len() {
      if !self.looping {
        return None;
      }
      self.cursor = 0;
    }
    let entry = self.entries[self.cursor];
    self.cursor += 1;
    entry
  }
}

impl Classifier for ScriptedClassifier {
  type Error = ClassifierError;

  fn classify(&mut self, _frame: &RgbFrame) -> Result<ClassificationResult, Self::Error> {
    let result = match self.next_entry() {
      Some((label, confidence)) => self.gate.accept(label, confidence),
      None => ClassificationResult::abstain(),
    };
    debug!("脚本分类结果: {:?}", result);
    Ok(result)
  }
}

fn parse_script(content: &str) -> Result<Vec<ScriptEntry>, ClassifierError> {
  let mut entries = Vec::new();
  for (index, raw) in content.lines().enumerate() {
    let line = raw.trim();
    if line.is_empty() || line.starts_with('#') {
      continue;
    }
    if line == "-" {
      entries.push(None);
      continue;
    }

    let parse_error = || ClassifierError::ScriptParse {
      line: index + 1,
      content: raw.to_string(),
    };
    let mut fields = line.split_whitespace();
    let label = fields
      .next()
      .and_then(|v| v.parse::<LabelId>().ok())
      .ok_or_else(parse_error)?;
    let confidence = fields
      .next()
      .and_then(|v| v.parse::<f64>().ok())
      .ok_or_else(parse_error)?;
    if fields.next().is_some() {
      return Err(parse_error());
    }
    entries.push(Some((label, confidence)));
  }
  Ok(entries)
}

#[cfg(test)]
mod tests {
  use std::io::Write;

  use super::*;
  use crate::frame::FrameDims;

  fn frame() -> RgbFrame {
    RgbFrame::blank(FrameDims::new(2, 2))
  }

  #[test]
  fn replays_entries_through_gate() {
    let mut classifier =
      ScriptedClassifier::from_entries(vec![Some((14, 0.95)), Some((14, 0.5)), None]);

    assert_eq!(
      classifier.classify(&frame()).unwrap(),
      ClassificationResult::accepted(14, 0.95)
    );
    assert!(!classifier.classify(&frame()).unwrap().is_accepted());
    assert!(!classifier.classify(&frame()).unwrap().is_accepted());
    // 脚本结束后持续弃权
    assert!(!classifier.classify(&frame()).unwrap().is_accepted());
  }

  #[test]
  fn looping_script_wraps_around() {
    let mut classifier = ScriptedClassifier::from_entries(vec![Some((3, 0.99))]).looping(true);
    for _ in 0..3 {
      assert_eq!(classifier.classify(&frame()).unwrap().label, Some(3));
    }
  }

  #[test]
  fn loads_script_from_url() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "# 标签 置信度").unwrap();
    writeln!(file, "14 0.91").unwrap();
    writeln!(file, "-").unwrap();

    let url = Url::parse(&format!("script://{}", file.path().display())).unwrap();
    let mut classifier = ScriptedClassifier::from_url(&url).unwrap();
    assert_eq!(classifier.classify(&frame()).unwrap().label, Some(14));
    assert_eq!(classifier.classify(&frame()).unwrap().label, None);
  }

  #[test]
  fn malformed_line_reports_position() {
    let err = parse_script("14 0.9\nstop sign\n").unwrap_err();
    assert!(matches!(err, ClassifierError::ScriptParse { line: 2, .. }));
  }

  #[test]
  fn wrong_scheme_is_rejected() {
    let url = Url::parse("onnx:///model.onnx").unwrap();
    assert!(matches!(
      ScriptedClassifier::from_url(&url),
      Err(ClassifierError::SchemeMismatch)
    ));
  }
}
