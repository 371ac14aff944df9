// 该文件是 Leafscan （叶诊） 项目的一部分。
// src/result.rs - 检测结果
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

use serde::{Deserialize, Serialize};

fn default_disease_name() -> String {
  "Unknown".to_string()
}

fn default_description() -> String {
  "No description available".to_string()
}

fn default_treatment() -> String {
  "No treatment information available".to_string()
}

/// 一次检测的结果
///
/// JSON 字段名为 `diseaseName`、`description`、`treatment`、`confidence`，
/// 反序列化时缺失的字段使用默认值。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionResult {
  #[serde(default = "default_disease_name")]
  pub disease_name: String,
  #[serde(default = "default_description")]
  pub description: String,
  #[serde(default = "default_treatment")]
  pub treatment: String,
  #[serde(default)]
  pub confidence: f32,
}

impl Default for DetectionResult {
  fn default() -> Self {
    Self {
      disease_name: default_disease_name(),
      description: default_description(),
      treatment: default_treatment(),
      confidence: 0.0,
    }
  }
}

impl DetectionResult {
  pub fn to_json(&self) -> serde_json::Result<String> {
    serde_json::to_string(self)
  }

  pub fn from_json(json: &str) -> serde_json::Result<Self> {
    serde_json::from_str(json)
  }
}

impl std::fmt::Display for DetectionResult {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(
      f,
      "{} ({:.2}%)",
      self.disease_name,
      self.confidence * 100.0
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn json_round_trip_keeps_all_fields() {
    let result = DetectionResult {
      disease_name: "Early Blight".to_string(),
      description: "spots".to_string(),
      treatment: "fungicide".to_string(),
      confidence: 0.8734,
    };
    let json = result.to_json().unwrap();
    assert!(json.contains("\"diseaseName\":\"Early Blight\""));
    assert_eq!(DetectionResult::from_json(&json).unwrap(), result);
  }

  #[test]
  fn missing_fields_use_defaults() {
    let result = DetectionResult::from_json("{}").unwrap();
    assert_eq!(result, DetectionResult::default());
    assert_eq!(result.disease_name, "Unknown");
    assert_eq!(result.description, "No description available");
    assert_eq!(result.treatment, "No treatment information available");
    assert_eq!(result.confidence, 0.0);
  }

  #[test]
  fn partial_json_keeps_present_fields() {
    let result = DetectionResult::from_json(r#"{"diseaseName":"healthy","confidence":0.5}"#).unwrap();
    assert_eq!(result.disease_name, "healthy");
    assert_eq!(result.confidence, 0.5);
    assert_eq!(result.treatment, "No treatment information available");
  }
}
