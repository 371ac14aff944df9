// 该文件是 Leafscan （叶诊） 项目的一部分。
// src/model/labels.rs - 类别标签表
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

use tracing::{info, warn};

use crate::DetectError;

/// 下标超出标签表范围时使用的病害名称
pub const UNKNOWN_DISEASE: &str = "Unknown Disease";

/// 与模型输出按位置对齐的类别名称表
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelTable {
  labels: Box<[String]>,
}

impl LabelTable {
  /// 按行解析标签：去除首尾空白，丢弃空行，保持原有顺序
  pub fn parse(content: &str) -> Self {
    let labels: Vec<String> = content
      .lines()
      .map(str::trim)
      .filter(|line| !line.is_empty())
      .map(str::to_string)
      .collect();
    Self {
      labels: labels.into_boxed_slice(),
    }
  }

  /// 读取标签文件；文件缺失、不可读或没有任何标签时返回 `LabelLoad`
  pub fn load(path: &Path) -> Result<Self, DetectError> {
    let content =
      std::fs::read_to_string(path).map_err(|e| DetectError::label_load(path, e))?;
    let table = Self::parse(&content);
    if table.is_empty() {
      return Err(DetectError::label_load(path, "标签文件为空"));
    }
    info!("加载标签文件 {}: {} 个类别", path.display(), table.len());
    Ok(table)
  }

  /// 读取标签文件，失败时降级为空标签表
  pub fn load_or_empty(path: &Path) -> Self {
    match Self::load(path) {
      Ok(table) => table,
      Err(e) => {
        warn!("{}，使用空标签表，所有结果将显示为 \"{}\"", e, UNKNOWN_DISEASE);
        Self::default()
      }
    }
  }

  /// 第 `index` 个类别的名称，越界时返回 [`UNKNOWN_DISEASE`]
  pub fn name(&self, index: usize) -> &str {
    self
      .labels
      .get(index)
      .map(String::as_str)
      .unwrap_or(UNKNOWN_DISEASE)
  }

  pub fn len(&self) -> usize {
    self.labels.len()
  }

  pub fn is_empty(&self) -> bool {
    self.labels.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = &str> {
    self.labels.iter().map(String::as_str)
  }
}

impl<S: Into<String>> FromIterator<S> for LabelTable {
  fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
    let labels: Vec<String> = iter.into_iter().map(Into::into).collect();
    Self {
      labels: labels.into_boxed_slice(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Write;
  use tempfile::NamedTempFile;

  #[test]
  fn parse_trims_and_drops_blank_lines() {
    let table = LabelTable::parse("  Early Blight \r\n\n healthy\n\t\nLate Blight\n");
    assert_eq!(
      table.iter().collect::<Vec<_>>(),
      vec!["Early Blight", "healthy", "Late Blight"]
    );
  }

  #[test]
  fn out_of_range_index_is_unknown() {
    let table: LabelTable = ["a", "b"].into_iter().collect();
    assert_eq!(table.name(1), "b");
    assert_eq!(table.name(2), UNKNOWN_DISEASE);
    assert_eq!(LabelTable::default().name(0), UNKNOWN_DISEASE);
  }

  #[test]
  fn load_reads_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "healthy").unwrap();
    writeln!(file, "early blight").unwrap();

    let table = LabelTable::load(file.path()).unwrap();
    assert_eq!(table.len(), 2);
    assert_eq!(table.name(0), "healthy");
  }

  #[test]
  fn missing_file_is_label_load_error() {
    let err = LabelTable::load(Path::new("/definitely/not/labels.txt")).unwrap_err();
    assert!(matches!(err, DetectError::LabelLoad { .. }));
  }

  #[test]
  fn empty_file_is_label_load_error_and_degrades() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "   ").unwrap();

    assert!(matches!(
      LabelTable::load(file.path()),
      Err(DetectError::LabelLoad { .. })
    ));
    assert!(LabelTable::load_or_empty(file.path()).is_empty());
  }
}
