// 该文件是 Leafscan （叶诊） 项目的一部分。
// src/output/directory_record.rs - 目录记录输出
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

use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU16, Ordering};

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::{
  DetectionResult, FromUrl, FromUrlWithScheme, input::InputImage, output::Render,
  url_file_path,
};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("无效的置信度阈值: {0}")]
  InvalidThreshold(String),
  #[error("JSON 序列化错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

/// 历史记录中保存的一条检测
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionRecord {
  pub source: String,
  pub detected_at: DateTime<Utc>,
  pub result: DetectionResult,
}

/// 按日期分目录保存检测历史：`<root>/YYYY/MM/DD/HH-MM-SS-XXXX.json`
///
/// `folder:///path?min_confidence=0.5` 只记录置信度不低于阈值的结果。
pub struct DirectoryRecordOutput {
  directory: PathBuf,
  min_confidence: Option<f32>,
  frame_counter: AtomicU16,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }

    let mut min_confidence = None;
    for (k, v) in uri.query_pairs() {
      if k == "min_confidence" {
        let threshold = v
          .parse::<f32>()
          .map_err(|_| DirectoryRecordOutputError::InvalidThreshold(v.to_string()))?;
        min_confidence = Some(threshold);
      }
    }

    Ok(DirectoryRecordOutput {
      directory: url_file_path(uri),
      min_confidence,
      frame_counter: AtomicU16::new(0),
    })
  }
}

impl DirectoryRecordOutput {
  fn frame_id(&self) -> u16 {
    self.frame_counter.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
  }

  /// 创建新的记录文件，不覆盖已有记录；同名文件已存在时递增序号重试
  fn create_record_file(
    &self,
    now: &DateTime<Utc>,
  ) -> Result<(PathBuf, File), DirectoryRecordOutputError> {
    let directory = self
      .directory
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()));
    std::fs::create_dir_all(&directory)?;

    let stem = now.format("%H-%M-%S");
    for _ in 0..=u16::MAX {
      let path = directory.join(format!("{}-{:04X}.json", stem, self.frame_id()));
      match OpenOptions::new().write(true).create_new(true).open(&path) {
        Ok(file) => return Ok((path, file)),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
          debug!("{} 已存在，尝试下一个序号", path.display());
        }
        Err(e) => return Err(e.into()),
      }
    }

    Err(DirectoryRecordOutputError::IoError(std::io::Error::new(
      ErrorKind::AlreadyExists,
      format!("{} 下 {} 的记录序号已用尽", directory.display(), stem),
    )))
  }

  fn should_record(&self, result: &DetectionResult) -> bool {
    self
      .min_confidence
      .map(|threshold| result.confidence >= threshold)
      .unwrap_or(true)
  }
}

impl Render<InputImage, DetectionResult> for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn render_result(&self, frame: &InputImage, result: &DetectionResult) -> Result<(), Self::Error> {
    if !self.should_record(result) {
      debug!(
        "{} 的置信度 {:.4} 低于阈值，不记录",
        frame.name, result.confidence
      );
      return Ok(());
    }

    let now = Utc::now();
    let (path, mut file) = self.create_record_file(&now)?;
    let record = DetectionRecord {
      source: frame.name.clone(),
      detected_at: now,
      result: result.clone(),
    };
    file.write_all(serde_json::to_string_pretty(&record)?.as_bytes())?;
    debug!("检测记录已保存到 {}", path.display());
    Ok(())
  }
}
