// 该文件是 Lupai （路牌） 项目的一部分。
// src/bin/controlled.rs - 带控制端的识别程序
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

//! 生产者在独立线程中运行；主线程作为控制端等待退出操作
//! （Ctrl-C 或在标准输入键入 `q`），然后请求停止并等待资源释放。

use std::{
  io::BufRead,
  sync::{
    Arc,
    mpsc::{self, RecvTimeoutError},
  },
  thread,
  time::Duration,
};

use anyhow::{Result, anyhow};
use clap::Parser;
use tracing::{info, warn};
use url::Url;

use lupai::{
  FromUrl,
  config::DetectorArgs,
  input::InputWrapper,
  lifecycle::{CancellationSignal, Controller},
  model::{ScoreGate, ScriptedClassifier},
  output::OutputWrapper,
  task::{DetectionTask, StopReason, Task, TaskReport},
};

/// 路牌识别：生产者线程 + 控制端
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

#[derive(Debug)]
enum ExitAction {
  Interrupt,
  Quit,
}

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const FORCE_EXIT_AFTER: Duration = Duration::from_secs(30);

fn producer(args: Args, signal: Arc<CancellationSignal>) -> Result<TaskReport> {
  let config = args.detector.to_config()?;
  let catalog = args.detector.catalog()?;

  let input = InputWrapper::open(&args.input, config.frame_dims)?;
  let model = ScriptedClassifier::from_url(&args.model)?
    .with_gate(ScoreGate::new(config.acceptance_threshold));
  let output = OutputWrapper::from_url(&args.output)?;

  DetectionTask::new(config, &catalog, args.detector.announcer())
    .with_frame_number(args.detector.max_frames)
    .run_task(input, model, output, &signal)
}

fn spawn_stdin_reader(tx: mpsc::Sender<ExitAction>) -> std::io::Result<()> {
  thread::Builder::new()
    .name("stdin".to_string())
    .spawn(move || {
      for line in std::io::stdin().lock().lines() {
        match line {
          Ok(line) if line.trim() == "q" => {
            let _ = tx.send(ExitAction::Quit);
            return;
          }
          Ok(_) => {}
          Err(_) => return,
        }
      }
    })?;
  Ok(())
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("分类器: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);
  info!("按 Ctrl-C 或输入 q 回车退出");

  let (tx, rx) = mpsc::channel();
  let ctrlc_tx = tx.clone();
  ctrlc::set_handler(move || {
    let _ = ctrlc_tx.send(ExitAction::Interrupt);
  })?;
  spawn_stdin_reader(tx.clone())?;

  let signal = Arc::new(CancellationSignal::new());
  let controller = Controller::spawn(signal, move |signal| producer(args, signal))?;

  loop {
    match rx.recv_timeout(POLL_INTERVAL) {
      Ok(action) => {
        info!("收到退出操作 {:?}，准备退出...", action);
        thread::spawn(|| {
          thread::sleep(FORCE_EXIT_AFTER);
          warn!("强制退出程序");
          std::process::exit(1);
        });
        break;
      }
      Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => {
        if controller.is_finished() {
          info!("生产者已结束");
          break;
        }
      }
    }
  }

  let outcome = controller.shutdown();
  // 重复调用不会再次释放资源
  let _ = controller.shutdown();

  match outcome {
    Some(Ok(result)) => {
      let report = result?;
      if let StopReason::CaptureFailed(e) = &report.reason {
        warn!("采集失败，会话结束: {}", e);
      }
      info!(
        "退出，共处理 {} 帧，确认 {} 次",
        report.frames, report.confirmations
      );
      Ok(())
    }
    Some(Err(_)) => Err(anyhow!("生产者线程异常退出")),
    None => Ok(()),
  }
}
