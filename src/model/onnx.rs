// 该文件是 Leafscan （叶诊） 项目的一部分。
// src/model/onnx.rs - ONNX Runtime 分类模型
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
  path::{Path, PathBuf},
  sync::Mutex,
};

use ndarray::ArrayView4;
use ort::{
  session::{Session, builder::GraphOptimizationLevel},
  value::{TensorRef, ValueType},
};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::{
  DetectError, RgbNhwcTensor,
  frame::RGB_CHANNELS,
  model::{ClassifierModel, FromModelFile, Model},
};

const ONNX_NUM_INPUTS: usize = 1;
const ONNX_NUM_OUTPUTS: usize = 1;

#[derive(Error, Debug)]
pub enum OnnxModelError {
  #[error("模型加载错误: {0}")]
  ModelLoadError(#[from] std::io::Error),
  #[error("ONNX Runtime 错误: {0}")]
  OrtError(String),
  #[error("模型无效: {0}")]
  ModelInvalid(String),
  #[error("张量形状错误: {0}")]
  ShapeError(#[from] ndarray::ShapeError),
  #[error("推理会话锁已损坏")]
  SessionPoisoned,
}

/// ONNX Runtime 上的图像分类模型
///
/// 输入为 `[1, H, W, 3]` 的 f32 张量，输出为 `[1, C]` 的分数。
/// 会话由互斥锁保护，同一模型上的并发推理按顺序执行。
pub struct OnnxClassifier<const W: u32, const H: u32> {
  session: Mutex<Session>,
  input_name: String,
  output_name: String,
  num_classes: usize,
  model_path: PathBuf,
}

impl<const W: u32, const H: u32> std::fmt::Debug for OnnxClassifier<W, H> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("OnnxClassifier")
      .field("input_name", &self.input_name)
      .field("output_name", &self.output_name)
      .field("num_classes", &self.num_classes)
      .field("model_path", &self.model_path)
      .finish()
  }
}

/// 检查模型声明的输入输出形状，返回类别数 C
///
/// 批维度允许为动态（-1），其余维度必须与 `[1, H, W, 3]`、`[1, C]` 一致。
pub fn validate_io_shapes(
  input_shape: &[i64],
  output_shape: &[i64],
  width: u32,
  height: u32,
) -> Result<usize, OnnxModelError> {
  let batch_ok = |dim: i64| dim == 1 || dim < 0;
  let expected_input = [1, height as i64, width as i64, RGB_CHANNELS as i64];

  let input_ok = input_shape.len() == expected_input.len()
    && batch_ok(input_shape[0])
    && input_shape[1..] == expected_input[1..];
  if !input_ok {
    return Err(OnnxModelError::ModelInvalid(format!(
      "预期模型输入形状为 {:?}, 实际为 {:?}",
      expected_input, input_shape
    )));
  }

  match output_shape {
    [batch, classes] if batch_ok(*batch) && *classes > 0 => Ok(*classes as usize),
    _ => Err(OnnxModelError::ModelInvalid(format!(
      "预期模型输出形状为 [1, C], 实际为 {:?}",
      output_shape
    ))),
  }
}

fn ort_error(e: impl std::fmt::Display) -> OnnxModelError {
  OnnxModelError::OrtError(e.to_string())
}

fn tensor_shape(value_type: &ValueType) -> Option<Vec<i64>> {
  match value_type {
    ValueType::Tensor { shape, .. } => Some(shape.iter().copied().collect()),
    _ => None,
  }
}

impl<const W: u32, const H: u32> OnnxClassifier<W, H> {
  pub fn load(model_path: &Path) -> Result<Self, OnnxModelError> {
    info!("加载模型文件: {}", model_path.display());
    let model_data = std::fs::read(model_path)?;
    debug!(
      "模型文件大小: {:.2} MB",
      model_data.len() as f64 / (1024.0 * 1024.0)
    );

    info!("创建 ONNX Runtime 推理会话");
    let session = Session::builder()
      .map_err(ort_error)?
      .with_optimization_level(GraphOptimizationLevel::Level3)
      .map_err(ort_error)?
      .commit_from_memory(&model_data)
      .map_err(ort_error)?;

    if session.inputs.len() != ONNX_NUM_INPUTS || session.outputs.len() != ONNX_NUM_OUTPUTS {
      error!(
        "预期模型输入/输出数量为 {}/{}, 实际为 {}/{}",
        ONNX_NUM_INPUTS,
        ONNX_NUM_OUTPUTS,
        session.inputs.len(),
        session.outputs.len()
      );
      return Err(OnnxModelError::ModelInvalid(format!(
        "预期模型输入/输出数量为 {}/{}, 实际为 {}/{}",
        ONNX_NUM_INPUTS,
        ONNX_NUM_OUTPUTS,
        session.inputs.len(),
        session.outputs.len()
      )));
    }

    let input = &session.inputs[0];
    let output = &session.outputs[0];
    let input_shape = tensor_shape(&input.input_type)
      .ok_or_else(|| OnnxModelError::ModelInvalid("模型输入不是张量".to_string()))?;
    let output_shape = tensor_shape(&output.output_type)
      .ok_or_else(|| OnnxModelError::ModelInvalid("模型输出不是张量".to_string()))?;
    debug!("模型输入 {}: {:?}", input.name, input_shape);
    debug!("模型输出 {}: {:?}", output.name, output_shape);

    let num_classes = validate_io_shapes(&input_shape, &output_shape, W, H).inspect_err(|e| {
      error!("{}", e);
    })?;

    let input_name = input.name.clone();
    let output_name = output.name.clone();
    info!("模型加载完成, 共 {} 个类别", num_classes);

    Ok(OnnxClassifier {
      session: Mutex::new(session),
      input_name,
      output_name,
      num_classes,
      model_path: model_path.to_path_buf(),
    })
  }
}

impl<const W: u32, const H: u32> Model for OnnxClassifier<W, H> {
  type Input = RgbNhwcTensor<W, H>;
  type Output = Box<[f32]>;
  type Error = OnnxModelError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    let shape = RgbNhwcTensor::<W, H>::shape();
    let view = ArrayView4::from_shape(shape, input.as_slice())?;
    let input_tensor = TensorRef::from_array_view(view).map_err(ort_error)?;

    let mut session = self
      .session
      .lock()
      .map_err(|_| OnnxModelError::SessionPoisoned)?;

    debug!("执行模型推理");
    let outputs = session
      .run(ort::inputs![self.input_name.as_str() => input_tensor])
      .map_err(ort_error)?;

    debug!("获取模型输出");
    let (_, scores) = outputs[self.output_name.as_str()]
      .try_extract_tensor::<f32>()
      .map_err(ort_error)?;
    Ok(scores.to_vec().into_boxed_slice())
  }
}

impl<const W: u32, const H: u32> ClassifierModel<W, H> for OnnxClassifier<W, H> {
  fn num_classes(&self) -> usize {
    self.num_classes
  }
}

impl<const W: u32, const H: u32> FromModelFile for OnnxClassifier<W, H> {
  fn from_model_file(path: &Path) -> Result<Self, DetectError> {
    Self::load(path).map_err(|e| DetectError::asset_load(path, e))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn accepts_reference_shapes() {
    assert_eq!(
      validate_io_shapes(&[1, 224, 224, 3], &[1, 38], 224, 224).unwrap(),
      38
    );
  }

  #[test]
  fn accepts_dynamic_batch() {
    assert_eq!(
      validate_io_shapes(&[-1, 224, 224, 3], &[-1, 10], 224, 224).unwrap(),
      10
    );
  }

  #[test]
  fn rejects_nchw_input() {
    assert!(matches!(
      validate_io_shapes(&[1, 3, 224, 224], &[1, 10], 224, 224),
      Err(OnnxModelError::ModelInvalid(_))
    ));
  }

  #[test]
  fn rejects_wrong_geometry_and_output_rank() {
    assert!(validate_io_shapes(&[1, 256, 256, 3], &[1, 10], 224, 224).is_err());
    assert!(validate_io_shapes(&[1, 224, 224, 3], &[1, 7, 7, 10], 224, 224).is_err());
    assert!(validate_io_shapes(&[1, 224, 224, 3], &[1, -1], 224, 224).is_err());
  }

  #[test]
  fn missing_model_file_is_asset_load_error() {
    let err = OnnxClassifier::<224, 224>::from_model_file(Path::new("/definitely/not/model.onnx"))
      .unwrap_err();
    assert!(err.is_fatal());
  }

  #[test]
  fn corrupt_model_file_is_asset_load_error() {
    let file = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(file.path(), b"not an onnx graph").unwrap();
    let err = OnnxClassifier::<224, 224>::from_model_file(file.path()).unwrap_err();
    assert!(matches!(err, DetectError::AssetLoad { .. }));
  }
}
