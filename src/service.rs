// 该文件是 Leafscan （叶诊） 项目的一部分。
// src/service.rs - 病害检测服务
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
use tracing::{debug, error, info, warn};
use url::Url;

use crate::{
  DetectError, DetectionResult, FromUrl, FromUrlWithScheme, RgbNhwcTensor,
  input::{InputImage, preprocess},
  model::{
    ClassifierModel, ClassifierRunner, DiseaseKnowledge, FromModelFile, LabelTable, Model,
    ScoreNormalization,
  },
  url_file_path,
};

/// 标签文件的默认文件名，与模型文件位于同一目录
pub const DEFAULT_LABELS_FILE: &str = "labels.txt";

#[derive(Error, Debug)]
pub enum ServiceConfigError {
  #[error("模型路径必须使用 {0} 方案")]
  SchemeMismatch(&'static str),
  #[error("无效的参数 {0}: {1}")]
  InvalidParameter(String, String),
}

/// 服务启动时使用的资源位置与选项
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
  pub model_path: PathBuf,
  pub labels_path: PathBuf,
  /// 为 `None` 时使用内置知识表
  pub knowledge_path: Option<PathBuf>,
  pub normalization: ScoreNormalization,
}

impl ServiceConfig {
  /// 以模型路径创建配置，标签文件默认为同目录下的 `labels.txt`
  pub fn new(model_path: impl Into<PathBuf>) -> Self {
    let model_path = model_path.into();
    let labels_path = model_path
      .parent()
      .map(|dir| dir.join(DEFAULT_LABELS_FILE))
      .unwrap_or_else(|| PathBuf::from(DEFAULT_LABELS_FILE));
    Self {
      model_path,
      labels_path,
      knowledge_path: None,
      normalization: ScoreNormalization::default(),
    }
  }

  pub fn labels(mut self, path: impl Into<PathBuf>) -> Self {
    self.labels_path = path.into();
    self
  }

  pub fn knowledge(mut self, path: impl Into<PathBuf>) -> Self {
    self.knowledge_path = Some(path.into());
    self
  }

  pub fn normalization(mut self, normalization: ScoreNormalization) -> Self {
    self.normalization = normalization;
    self
  }
}

impl FromUrlWithScheme for ServiceConfig {
  const SCHEME: &'static str = "onnx";
}

impl FromUrl for ServiceConfig {
  type Error = ServiceConfigError;

  /// `onnx:///path/model.onnx?labels=/path/labels.txt&knowledge=/path/k.json&normalize=softmax`
  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ServiceConfigError::SchemeMismatch(Self::SCHEME));
    }

    let mut config = ServiceConfig::new(url_file_path(url));
    for (key, value) in url.query_pairs() {
      match &*key {
        "labels" => config = config.labels(value.into_owned()),
        "knowledge" => config = config.knowledge(value.into_owned()),
        "normalize" => {
          let normalization = value
            .parse()
            .map_err(|e| ServiceConfigError::InvalidParameter(key.to_string(), e))?;
          config = config.normalization(normalization);
        }
        other => warn!("忽略未知的模型参数: {}", other),
      }
    }
    Ok(config)
  }
}

/// 读取模型与标签资源
///
/// 模型加载失败为致命错误；标签加载失败只记录警告并返回空标签表。
pub fn load<M: FromModelFile>(config: &ServiceConfig) -> Result<(M, LabelTable), DetectError> {
  let model = M::from_model_file(&config.model_path).inspect_err(|e| {
    error!("{}", e);
  })?;
  let labels = LabelTable::load_or_empty(&config.labels_path);
  Ok((model, labels))
}

/// 持有已加载模型的检测服务
///
/// 模型句柄在服务的整个生命周期内只读共享，[`close`](Self::close) 释放它，
/// 重复调用无副作用；服务析构时也会释放。
pub struct DetectionService<const W: u32, const H: u32, M> {
  model: Option<M>,
  runner: ClassifierRunner,
}

impl<const W: u32, const H: u32, M> DetectionService<W, H, M>
where
  M: ClassifierModel<W, H>,
  M::Error: std::error::Error + Send + Sync + 'static,
{
  pub fn new(model: M, runner: ClassifierRunner) -> Self {
    let service = Self {
      model: Some(model),
      runner,
    };
    service.check_label_alignment();
    service
  }

  /// 加载模型、标签与知识表；模型加载失败时不创建服务
  pub fn load(config: &ServiceConfig) -> Result<Self, DetectError>
  where
    M: FromModelFile,
  {
    info!("正在加载模型 {}", config.model_path.display());
    let (model, labels) = load::<M>(config)?;
    let knowledge = match &config.knowledge_path {
      Some(path) => DiseaseKnowledge::from_json_file(path)?,
      None => DiseaseKnowledge::builtin(),
    };
    let runner = ClassifierRunner::new(labels, knowledge).with_normalization(config.normalization);
    Ok(Self::new(model, runner))
  }

  fn check_label_alignment(&self) {
    if let Some(model) = &self.model {
      let labels = self.runner.labels().len();
      if labels != model.num_classes() {
        warn!(
          "标签数量 ({}) 与模型类别数 ({}) 不一致，超出范围的类别将显示为未知病害",
          labels,
          model.num_classes()
        );
      }
    }

    let knowledge = self.runner.knowledge();
    for label in self.runner.labels().iter() {
      if !knowledge.contains(label) {
        warn!("病害知识表未收录标签 \"{}\"，将使用通用说明", label);
      }
    }
  }

  pub fn is_loaded(&self) -> bool {
    self.model.is_some()
  }

  pub fn runner(&self) -> &ClassifierRunner {
    &self.runner
  }

  /// 对已预处理的张量分类
  pub fn classify(&self, tensor: &RgbNhwcTensor<W, H>) -> Result<DetectionResult, DetectError> {
    self.runner.classify(tensor, self.model.as_ref())
  }

  /// 完整的一次检测：解码、预处理、分类
  pub fn detect(&self, image_bytes: &[u8]) -> Result<DetectionResult, DetectError> {
    if !self.is_loaded() {
      return Err(DetectError::ModelNotLoaded);
    }
    let tensor = preprocess::<W, H>(image_bytes)?;
    self.classify(&tensor)
  }

  /// 释放模型句柄，可重复调用
  pub fn close(&mut self) {
    if self.model.take().is_some() {
      info!("模型已释放");
    } else {
      debug!("模型已释放或从未加载，忽略");
    }
  }
}

impl<const W: u32, const H: u32, M> DetectionService<W, H, M> {
  /// 尚未加载模型的服务，所有检测请求返回 [`DetectError::ModelNotLoaded`]
  pub fn unloaded(runner: ClassifierRunner) -> Self {
    Self {
      model: None,
      runner,
    }
  }
}

impl<const W: u32, const H: u32, M> Drop for DetectionService<W, H, M> {
  fn drop(&mut self) {
    if self.model.take().is_some() {
      debug!("服务析构，释放模型");
    }
  }
}

impl<const W: u32, const H: u32, M> Model for DetectionService<W, H, M>
where
  M: ClassifierModel<W, H>,
  M::Error: std::error::Error + Send + Sync + 'static,
{
  type Input = InputImage;
  type Output = DetectionResult;
  type Error = DetectError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    debug!("检测 {} ({} 字节)", input.name, input.bytes.len());
    self.detect(&input.bytes)
  }
}

/// 参考配置下基于 ONNX Runtime 的检测服务
#[cfg(feature = "onnx")]
pub type LeafService = DetectionService<
  { crate::LEAF_INPUT_W },
  { crate::LEAF_INPUT_H },
  crate::model::OnnxClassifier<{ crate::LEAF_INPUT_W }, { crate::LEAF_INPUT_H }>,
>;
