// 该文件是 Leafscan （叶诊） 项目的一部分。
// src/output/json_file.rs - 保存 JSON 结果文件
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

use std::path::PathBuf;

use thiserror::Error;
use tracing::info;
use url::Url;

use crate::{
  DetectionResult, FromUrl, FromUrlWithScheme, input::InputImage, output::Render,
  url_file_path,
};

#[derive(Error, Debug)]
pub enum JsonFileOutputError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 序列化错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

/// 把检测结果写入指定的 JSON 文件，多次写入时覆盖为最新结果
pub struct JsonFileOutput {
  path: PathBuf,
}

impl FromUrlWithScheme for JsonFileOutput {
  const SCHEME: &'static str = "json";
}

impl FromUrl for JsonFileOutput {
  type Error = JsonFileOutputError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(JsonFileOutputError::SchemeMismatch(format!(
        "期望保存方式 '{}', 实际保存方式 '{}'",
        Self::SCHEME,
        uri.scheme()
      )));
    }

    Ok(JsonFileOutput {
      path: url_file_path(uri),
    })
  }
}

impl Render<InputImage, DetectionResult> for JsonFileOutput {
  type Error = JsonFileOutputError;

  fn render_result(&self, frame: &InputImage, result: &DetectionResult) -> Result<(), Self::Error> {
    if let Some(parent) = self.path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(result)?;
    std::fs::write(&self.path, json)?;
    info!("{} 的检测结果已保存到 {}", frame.name, self.path.display());
    Ok(())
  }
}
