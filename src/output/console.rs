// 该文件是 Leafscan （叶诊） 项目的一部分。
// src/output/console.rs - 控制台输出
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

use std::io::Write;

use thiserror::Error;
use url::Url;

use crate::{
  DetectionResult, FromUrl, FromUrlWithScheme, input::InputImage, output::Render,
};

#[derive(Error, Debug)]
pub enum ConsoleOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("JSON 序列化错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

/// 把检测结果以 JSON 形式打印到标准输出
///
/// `stdout:` 输出格式化 JSON，`stdout:?compact` 每个结果一行。
pub struct ConsoleOutput {
  compact: bool,
}

impl FromUrlWithScheme for ConsoleOutput {
  const SCHEME: &'static str = "stdout";
}

impl FromUrl for ConsoleOutput {
  type Error = ConsoleOutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ConsoleOutputError::SchemeMismatch);
    }

    let compact = url.query_pairs().any(|(k, _)| k == "compact");
    Ok(ConsoleOutput { compact })
  }
}

impl ConsoleOutput {
  fn format(&self, result: &DetectionResult) -> Result<String, ConsoleOutputError> {
    let text = if self.compact {
      serde_json::to_string(result)?
    } else {
      serde_json::to_string_pretty(result)?
    };
    Ok(text)
  }
}

impl Render<InputImage, DetectionResult> for ConsoleOutput {
  type Error = ConsoleOutputError;

  fn render_result(&self, _frame: &InputImage, result: &DetectionResult) -> Result<(), Self::Error> {
    let text = self.format(result)?;
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{}", text)?;
    Ok(())
  }
}
