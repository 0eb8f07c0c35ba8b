// 该文件是 Lupai （路牌） 项目的一部分。
// tests/detection.rs - 检测流程集成测试
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

use std::{
  convert::Infallible,
  io::Write,
  time::{Duration, Instant},
};

use url::Url;

use lupai::{
  FromUrl,
  announce::AnnouncementSink,
  config::DetectorConfig,
  frame::{FrameDims, RgbFrame},
  input::BlankInput,
  lifecycle::CancellationSignal,
  model::{LabelCatalog, ScriptedClassifier},
  output::{DisplaySink, Overlay},
  task::{Clock, DetectionTask, StopReason, Task},
};

const DIMS: FrameDims = FrameDims::new(8, 6);
const TICK: Duration = Duration::from_millis(100);

struct FakeClock {
  now: Instant,
}

impl Clock for &mut FakeClock {
  fn now(&mut self) -> Instant {
    let now = self.now;
    self.now += TICK;
    now
  }
}

#[derive(Default)]
struct Spoken(Vec<String>);

impl AnnouncementSink for &mut Spoken {
  type Error = Infallible;

  fn speak(&mut self, text: &str) -> Result<(), Self::Error> {
    self.0.push(text.to_string());
    Ok(())
  }
}

#[derive(Default)]
struct Rendered(Vec<Option<Overlay>>);

impl DisplaySink for &mut Rendered {
  type Error = Infallible;

  fn render(&mut self, frame: &RgbFrame, overlay: Option<&Overlay>) -> Result<(), Self::Error> {
    assert_eq!(frame.dims(), DIMS);
    self.0.push(overlay.cloned());
    Ok(())
  }
}

fn script(lines: &[&str]) -> tempfile::NamedTempFile {
  let mut file = tempfile::NamedTempFile::new().unwrap();
  for line in lines {
    writeln!(file, "{}", line).unwrap();
  }
  file
}

fn classifier(file: &tempfile::NamedTempFile) -> ScriptedClassifier {
  let url = Url::parse(&format!("script://{}", file.path().display())).unwrap();
  ScriptedClassifier::from_url(&url).unwrap()
}

fn config() -> DetectorConfig {
  DetectorConfig {
    frame_dims: DIMS,
    ..Default::default()
  }
}

#[test]
fn five_agreeing_stop_frames_confirm_once() {
  let file = script(&["14 0.91", "14 0.95", "14 0.92", "14 0.99", "14 0.93"]);
  let catalog = LabelCatalog::gtsrb();
  let mut spoken = Spoken::default();
  let mut rendered = Rendered::default();
  let mut clock = FakeClock {
    now: Instant::now(),
  };
  let signal = CancellationSignal::new();

  // 30 帧，每帧 100ms：第 5 帧 (t=400ms) 确认，保持 2s 到 t=2400ms
  let report = DetectionTask::new(config(), &catalog, &mut spoken)
    .with_clock(&mut clock)
    .run_task(
      BlankInput::new(DIMS, Some(30)),
      classifier(&file),
      &mut rendered,
      &signal,
    )
    .unwrap();

  assert!(matches!(report.reason, StopReason::EndOfStream));
  assert_eq!(report.frames, 30);
  assert_eq!(report.confirmations, 1);
  assert_eq!(spoken.0, vec!["Stop".to_string()]);

  let expected = Overlay::new(14, "Stop", 0.93);
  for (index, overlay) in rendered.0.iter().enumerate() {
    // 第 index 帧的时间为 index * 100ms
    if (4..24).contains(&index) {
      assert_eq!(overlay.as_ref(), Some(&expected), "frame {}", index);
    } else {
      assert_eq!(overlay, &None, "frame {}", index);
    }
  }
  assert_eq!(
    expected.lines(),
    ["CLASS: 14 Stop".to_string(), "PROBABILITY: 93.00%".to_string()]
  );
}

#[test]
fn disagreeing_fifth_frame_delays_confirmation() {
  let file = script(&[
    "5 0.95", "5 0.95", "5 0.95", "5 0.95", "3 0.95", "5 0.95", "5 0.95", "5 0.95", "5 0.95",
    "5 0.95",
  ]);
  let catalog = LabelCatalog::gtsrb();
  let mut spoken = Spoken::default();
  let mut rendered = Rendered::default();
  let mut clock = FakeClock {
    now: Instant::now(),
  };
  let signal = CancellationSignal::new();

  let report = DetectionTask::new(config(), &catalog, &mut spoken)
    .with_clock(&mut clock)
    .run_task(
      BlankInput::new(DIMS, Some(10)),
      classifier(&file),
      &mut rendered,
      &signal,
    )
    .unwrap();

  assert_eq!(report.confirmations, 1);
  assert_eq!(spoken.0, vec![catalog.resolve(5).to_string()]);
  assert!(rendered.0[..9].iter().all(Option::is_none));
  assert_eq!(rendered.0[9].as_ref().map(|o| o.label), Some(5));
}

#[test]
fn low_confidence_frames_never_confirm() {
  // 0.90 不严格大于阈值
  let file = script(&["14 0.90"]);
  let url = Url::parse(&format!("script://{}?loop", file.path().display())).unwrap();
  let catalog = LabelCatalog::gtsrb();
  let mut spoken = Spoken::default();
  let mut rendered = Rendered::default();
  let signal = CancellationSignal::new();

  let report = DetectionTask::new(config(), &catalog, &mut spoken)
    .run_task(
      BlankInput::new(DIMS, Some(12)),
      ScriptedClassifier::from_url(&url).unwrap(),
      &mut rendered,
      &signal,
    )
    .unwrap();

  assert_eq!(report.confirmations, 0);
  assert!(spoken.0.is_empty());
}

#[test]
fn sustained_sign_reconfirms_every_run() {
  let file = script(&["14 0.97"]);
  let url = Url::parse(&format!("script://{}?loop", file.path().display())).unwrap();
  let catalog = LabelCatalog::gtsrb();
  let mut spoken = Spoken::default();
  let mut rendered = Rendered::default();
  let signal = CancellationSignal::new();

  let report = DetectionTask::new(config(), &catalog, &mut spoken)
    .run_task(
      BlankInput::new(DIMS, Some(10)),
      ScriptedClassifier::from_url(&url).unwrap(),
      &mut rendered,
      &signal,
    )
    .unwrap();

  assert_eq!(report.confirmations, 2);
  assert_eq!(spoken.0.len(), 2);
}

#[test]
fn stop_requested_before_start_processes_nothing() {
  let file = script(&["14 0.97"]);
  let catalog = LabelCatalog::gtsrb();
  let mut spoken = Spoken::default();
  let mut rendered = Rendered::default();
  let signal = CancellationSignal::new();
  signal.request_stop();

  let report = DetectionTask::new(config(), &catalog, &mut spoken)
    .run_task(
      BlankInput::new(DIMS, None),
      classifier(&file),
      &mut rendered,
      &signal,
    )
    .unwrap();

  assert!(matches!(report.reason, StopReason::StopRequested));
  assert_eq!(report.frames, 0);
  assert!(rendered.0.is_empty());
  assert!(signal.is_stopped());
}
