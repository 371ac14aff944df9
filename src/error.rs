// 该文件是 Leafscan （叶诊） 项目的一部分。
// src/error.rs - 推理管线错误定义
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

/// 推理管线的错误种类
///
/// 调用方按种类分支处理，不需要解析错误信息文本。
#[derive(Error, Debug)]
pub enum DetectError {
  /// 模型资源缺失或损坏，服务无法启动
  #[error("模型资源加载失败: {path}: {reason}")]
  AssetLoad { path: PathBuf, reason: String },
  /// 标签资源缺失或为空，可降级为空标签表
  #[error("标签资源加载失败: {path}: {reason}")]
  LabelLoad { path: PathBuf, reason: String },
  /// 图像字节无法解码
  #[error("图像解码失败 ({byte_len} 字节): {source}")]
  Decode {
    byte_len: usize,
    #[source]
    source: image::ImageError,
  },
  /// 模型未加载或已释放
  #[error("模型未加载")]
  ModelNotLoaded,
  /// 模型前向推理失败
  ///
  /// `actual` 为 `None` 表示运行时未产生输出。
  #[error("模型推理失败 (期望输出 {expected:?}, {}): {source}", describe_output(.actual))]
  Inference {
    expected: Vec<usize>,
    actual: Option<usize>,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync + 'static>,
  },
  /// 张量长度与声明的形状不一致
  #[error("张量长度不匹配: 期望长度 {expected}, 实际长度 {actual}")]
  TensorShape { expected: usize, actual: usize },
  /// 外部病害知识文件无法读取或解析
  #[error("病害知识文件加载失败: {path}: {reason}")]
  Knowledge { path: PathBuf, reason: String },
}

fn describe_output(actual: &Option<usize>) -> String {
  match actual {
    Some(len) => format!("实际长度 {len}"),
    None => "运行时未产生输出".to_string(),
  }
}

impl DetectError {
  pub fn asset_load(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
    DetectError::AssetLoad {
      path: path.into(),
      reason: reason.to_string(),
    }
  }

  pub fn label_load(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
    DetectError::LabelLoad {
      path: path.into(),
      reason: reason.to_string(),
    }
  }

  /// 是否为启动期致命错误
  pub fn is_fatal(&self) -> bool {
    matches!(self, DetectError::AssetLoad { .. })
  }

  /// 是否为单次请求的错误（可由用户重新选择图片等方式纠正）
  pub fn is_per_request(&self) -> bool {
    matches!(
      self,
      DetectError::Decode { .. }
        | DetectError::ModelNotLoaded
        | DetectError::Inference { .. }
        | DetectError::TensorShape { .. }
    )
  }
}

/// 仅携带文本信息的错误，用于包装推理阶段的非结构化失败
#[derive(Error, Debug)]
#[error("{0}")]
pub struct SimpleError(pub String);

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fatal_and_per_request_kinds_are_disjoint() {
    let fatal = DetectError::asset_load("/missing.onnx", "not found");
    assert!(fatal.is_fatal());
    assert!(!fatal.is_per_request());

    let labels = DetectError::label_load("/missing.txt", "not found");
    assert!(!labels.is_fatal());
    assert!(!labels.is_per_request());

    assert!(DetectError::ModelNotLoaded.is_per_request());
    assert!(
      DetectError::TensorShape {
        expected: 12,
        actual: 3
      }
      .is_per_request()
    );
  }

  #[test]
  fn inference_message_distinguishes_runtime_failure() {
    let failed = DetectError::Inference {
      expected: vec![1, 38],
      actual: None,
      source: Box::new(SimpleError("session aborted".to_string())),
    };
    let msg = failed.to_string();
    assert!(msg.contains("运行时未产生输出"));
    assert!(!msg.contains("实际长度"));

    let mismatch = DetectError::Inference {
      expected: vec![1, 38],
      actual: Some(10),
      source: Box::new(SimpleError("length mismatch".to_string())),
    };
    assert!(mismatch.to_string().contains("实际长度 10"));
  }

  #[test]
  fn messages_carry_context() {
    let err = DetectError::TensorShape {
      expected: 150528,
      actual: 10,
    };
    let msg = err.to_string();
    assert!(msg.contains("150528"));
    assert!(msg.contains("10"));
  }
}
