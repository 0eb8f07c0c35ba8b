// 该文件是 Lupai （路牌） 项目的一部分。
// src/announce.rs - 识别结果播报
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

//! 每次确认检测调用一次播报。播报是同步的：
//! 语音合成期间生产者循环阻塞，不会分类新的帧。

use std::{
  io::Write,
  process::{Command, ExitStatus},
};

use thiserror::Error;
use tracing::{debug, info};

use crate::consensus::ConfirmedDetection;

pub const DEFAULT_SPEECH_COMMAND: &str = "espeak-ng";

#[derive(Error, Debug)]
pub enum AnnounceError {
  #[error("无法启动语音命令 {command}: {source}")]
  Spawn {
    command: String,
    source: std::io::Error,
  },
  #[error("语音命令 {command} 执行失败: {status}")]
  Failed { command: String, status: ExitStatus },
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 错误: {0}")]
  JsonError(#[from] serde_json::Error),
}

pub trait AnnouncementSink {
  type Error;

  fn speak(&mut self, text: &str) -> Result<(), Self::Error>;

  /// 默认只播报标签名
  fn announce(&mut self, detection: &ConfirmedDetection, name: &str) -> Result<(), Self::Error> {
    let _ = detection;
    self.speak(name)
  }
}

/// 调用外部语音合成程序，等待其播报结束
#[derive(Debug, Clone)]
pub struct CommandSpeaker {
  program: String,
  args: Vec<String>,
}

impl Default for CommandSpeaker {
  fn default() -> Self {
    Self::new(DEFAULT_SPEECH_COMMAND)
  }
}

impl CommandSpeaker {
  pub fn new(program: impl Into<String>) -> Self {
    Self {
      program: program.into(),
      args: Vec::new(),
    }
  }

  /// 支持 `"spd-say -w"` 形式的命令行
  pub fn from_command_line(command_line: &str) -> Self {
    let mut parts = command_line.split_whitespace().map(String::from);
    let program = parts
      .next()
      .unwrap_or_else(|| DEFAULT_SPEECH_COMMAND.to_string());
    Self {
      program,
      args: parts.collect(),
    }
  }

  pub fn program(&self) -> &str {
    &self.program
  }
}

impl AnnouncementSink for CommandSpeaker {
  type Error = AnnounceError;

  fn speak(&mut self, text: &str) -> Result<(), Self::Error> {
    let sanitized: String = text.chars().filter(|c| !c.is_control()).collect();
    debug!("{} 播报: {}", self.program, sanitized);

    let status = Command::new(&self.program)
      .args(&self.args)
      .arg(&sanitized)
      .status()
      .map_err(|source| AnnounceError::Spawn {
        command: self.program.clone(),
        source,
      })?;

    if !status.success() {
      return Err(AnnounceError::Failed {
        command: self.program.clone(),
        status,
      });
    }
    Ok(())
  }
}

/// 只写日志，用于没有音频设备的环境
#[derive(Debug, Default, Clone)]
pub struct LogAnnouncer;

impl AnnouncementSink for LogAnnouncer {
  type Error = AnnounceError;

  fn speak(&mut self, text: &str) -> Result<(), Self::Error> {
    info!("播报: {}", text);
    Ok(())
  }
}

/// 每次确认输出一行 JSON
pub struct JsonAnnouncer<W: Write> {
  out: W,
}

impl<W: Write> JsonAnnouncer<W> {
  pub fn new(out: W) -> Self {
    Self { out }
  }

  pub fn into_inner(self) -> W {
    self.out
  }
}

impl<W: Write> AnnouncementSink for JsonAnnouncer<W> {
  type Error = AnnounceError;

  fn speak(&mut self, text: &str) -> Result<(), Self::Error> {
    let record = serde_json::json!({
      "time": chrono::Local::now().to_rfc3339(),
      "text": text,
    });
    serde_json::to_writer(&mut self.out, &record)?;
    writeln!(self.out)?;
    self.out.flush()?;
    Ok(())
  }

  fn announce(&mut self, detection: &ConfirmedDetection, name: &str) -> Result<(), Self::Error> {
    let record = serde_json::json!({
      "time": chrono::Local::now().to_rfc3339(),
      "label": detection.label,
      "name": name,
      "confidence": detection.confidence,
    });
    serde_json::to_writer(&mut self.out, &record)?;
    writeln!(self.out)?;
    self.out.flush()?;
    Ok(())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum AnnounceKind {
  /// 调用语音合成命令
  #[default]
  Speak,
  /// 只写日志
  Log,
  /// 标准输出逐行 JSON
  Json,
}

pub enum AnnouncerWrapper {
  Speak(CommandSpeaker),
  Log(LogAnnouncer),
  Json(JsonAnnouncer<std::io::Stdout>),
}

impl AnnouncerWrapper {
  pub fn new(kind: AnnounceKind, speech_command: &str) -> Self {
    match kind {
      AnnounceKind::Speak => AnnouncerWrapper::Speak(CommandSpeaker::from_command_line(speech_command)),
      AnnounceKind::Log => AnnouncerWrapper::Log(LogAnnouncer),
          AnnounceKind::Json => AnnouncerWrapper::Json(JsonAnnouncer::new(std::io::stdout())),
    }
  }
}

impl AnnouncementSink for AnnouncerWrapper {
  type Error = AnnounceError;

  fn speak(&mut self, text: &str) -> Result<(), Self::Error> {
    match self {
      AnnouncerWrapper::Speak(sink) => sink.speak(text),
      AnnouncerWrapper::Log(sink) => sink.speak(text),
          AnnouncerWrapper::Json(sink) => sink.speak(text),
    }
  }

  fn announce(&mut self, detection: &ConfirmedDetection, name: &str) -> Result<(), Self::Error> {
    match self {
      AnnouncerWrapper::Speak(sink) => sink.announce(detection, name),
      AnnouncerWrapper::Log(sink) => sink.announce(detection, name),
          AnnouncerWrapper::Json(sink) => sink.announce(detection, name),
    }
  }
}

#[cfg(test)]
mod tests {
  use std::time::Instant;

  use super::*;

  #[test]
  fn command_line_is_split_into_program_and_args() {
    let speaker = CommandSpeaker::from_command_line("spd-say -w -l en");
    assert_eq!(speaker.program(), "spd-say");
    assert_eq!(speaker.args, vec!["-w", "-l", "en"]);
  }

  #[test]
  fn missing_speech_program_is_a_spawn_error() {
    let mut speaker = CommandSpeaker::new("/nonexistent/lupai-tts");
    assert!(matches!(
      speaker.speak("Stop"),
      Err(AnnounceError::Spawn { .. })
    ));
  }

  #[test]
  fn json_announcer_writes_one_line_per_detection() {
    let mut sink = JsonAnnouncer::new(Vec::new());
    let detection = ConfirmedDetection {
      label: 14,
      confidence: 0.93,
      confirmed_at: Instant::now(),
    };
    sink.announce(&detection, "Stop").unwrap();
    sink.announce(&detection, "Stop").unwrap();

    let output = String::from_utf8(sink.into_inner()).unwrap();
    let lines: Vec<_> = output.lines().collect();
    assert_eq!(lines.len(), 2);
    let record: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(record["label"], 14);
    assert_eq!(record["name"], "Stop");
    assert_eq!(record["confidence"], 0.93);
  }
}
