// 该文件是 Lupai （路牌） 项目的一部分。
// src/model/labels.rs - 标签目录
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

use std::path::Path;

use thiserror::Error;
use tracing::info;

use crate::model::LabelId;

/// GTSRB 数据集的 43 个类别
pub const GTSRB_LABELS: [&str; 43] = [
  "Speed Limit 20 km/h",
  "Speed Limit 30 km/h",
  "Speed Limit 50 km/h",
  "Speed Limit 60 km/h",
  "Speed Limit 70 km/h",
  "Speed Limit 80 km/h",
  "End of Speed Limit 80 km/h",
  "Speed Limit 100 km/h",
  "Speed Limit 120 km/h",
  "No passing",
  "No passing for vehicles over 3.5 metric tons",
  "Right-of-way at the next intersection",
  "Priority road",
  "Yield",
  "Stop",
  "No vehicles",
  "Vehicles over 3.5 metric tons prohibited",
  "No entry",
  "General caution",
  "Dangerous curve to the left",
  "Dangerous curve to the right",
  "Double curve",
  "Bumpy road",
  "Slippery road",
  "Road narrows on the right",
  "Road work",
  "Traffic signals",
  "Pedestrians",
  "Children crossing",
  "Bicycles crossing",
  "Beware of ice/snow",
  "Wild animals crossing",
  "End of all speed and passing limits",
  "Turn right ahead",
  "Turn left ahead",
  "Ahead only",
  "Go straight or right",
  "Go straight or left",
  "Keep right",
  "Keep left",
  "Roundabout mandatory",
  "End of no passing",
  "End of no passing by vehicles over 3.5 metric tons",
];

#[derive(Error, Debug)]
pub enum CatalogError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("标签文件不含任何标签")]
  Empty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelCatalog {
  names: Vec<String>,
}

impl Default for LabelCatalog {
  fn default() -> Self {
    Self::gtsrb()
  }
}

impl LabelCatalog {
  pub fn gtsrb() -> Self {
    Self::from_names(GTSRB_LABELS)
  }

  pub fn from_names<I, S>(names: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self {
      names: names.into_iter().map(Into::into).collect(),
    }
  }

  /// 每行一个标签名，空行与 `#` 开头的行忽略
  pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;
    let catalog = Self::from_names(
      content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#')),
    );

    if catalog.is_empty() {
      return Err(CatalogError::Empty);
    }

    info!("从 {} 加载 {} 个标签", path.display(), catalog.len());
    Ok(catalog)
  }

  pub fn len(&self) -> usize {
    self.names.len()
  }

  pub fn is_empty(&self) -> bool {
    self.names.is_empty()
  }

  pub fn contains(&self, id: LabelId) -> bool {
    id < self.names.len()
  }

  /// 越界的标签说明分类器违反了约定，直接 panic
  pub fn resolve(&self, id: LabelId) -> &str {
    match self.names.get(id) {
      Some(name) => name,
      None => panic!("标签越界: {} 不在 [0, {}) 范围内", id, self.names.len()),
    }
  }
}
