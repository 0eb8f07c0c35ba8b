// 该文件是 Lupai （路牌） 项目的一部分。
// src/bin/simple.rs - 单线程识别程序
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

use std::{sync::Arc, thread, time::Duration};

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};
use url::Url;

use lupai::{
  FromUrl,
  config::DetectorArgs,
  input::InputWrapper,
  lifecycle::CancellationSignal,
  model::{ScoreGate, ScriptedClassifier},
  output::OutputWrapper,
  task::{DetectionTask, StopReason, Task},
};

/// 路牌识别：采集、分类、连续帧确认与播报在同一个循环中完成
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 分类器
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 输入来源
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 显示输出
  #[arg(long, value_name = "OUTPUT", default_value = "null://")]
  pub output: Url,
  #[command(flatten)]
  pub detector: DetectorArgs,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("分类器: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let config = args.detector.to_config()?;
  let catalog = args.detector.catalog()?;

  let signal = Arc::new(CancellationSignal::new());
  let handler_signal = Arc::clone(&signal);
  ctrlc::set_handler(move || {
    info!("收到中断信号，准备退出...");
    if handler_signal.request_stop() {
      thread::spawn(|| {
        thread::sleep(Duration::from_secs(30));
        warn!("强制退出程序");
        std::process::exit(1);
      });
    }
  })?;

  let input = InputWrapper::open(&args.input, config.frame_dims)?;
  let model = ScriptedClassifier::from_url(&args.model)?
    .with_gate(ScoreGate::new(config.acceptance_threshold));
  let output = OutputWrapper::from_url(&args.output)?;

  let report = DetectionTask::new(config, &catalog, args.detector.announcer())
    .with_frame_number(args.detector.max_frames)
    .run_task(input, model, output, &signal)?;

  if let StopReason::CaptureFailed(e) = &report.reason {
    warn!("采集失败，会话结束: {}", e);
  }
  info!("退出，共确认 {} 次", report.confirmations);

  Ok(())
}
