// 该文件是 Leafscan （叶诊） 项目的一部分。
// src/model/runner.rs - 分类执行与结果解释
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

use tracing::{debug, warn};

use crate::{
  DetectError, DetectionResult, RgbNhwcTensor,
  error::SimpleError,
  model::{ClassifierModel, DiseaseKnowledge, LabelTable, ScoreNormalization, argmax},
};

/// 持有标签表与病害知识表，把模型输出解释为检测结果
#[derive(Debug, Clone, Default)]
pub struct ClassifierRunner {
  labels: LabelTable,
  knowledge: DiseaseKnowledge,
  normalization: ScoreNormalization,
}

impl ClassifierRunner {
  pub fn new(labels: LabelTable, knowledge: DiseaseKnowledge) -> Self {
    Self {
      labels,
      knowledge,
      normalization: ScoreNormalization::default(),
    }
  }

  pub fn with_normalization(mut self, normalization: ScoreNormalization) -> Self {
    self.normalization = normalization;
    self
  }

  pub fn labels(&self) -> &LabelTable {
    &self.labels
  }

  pub fn knowledge(&self) -> &DiseaseKnowledge {
    &self.knowledge
  }

  /// 对张量运行分类模型并解释结果
  ///
  /// `model` 为 `None` 时返回 [`DetectError::ModelNotLoaded`]，不产生任何部分结果。
  pub fn classify<const W: u32, const H: u32, M>(
    &self,
    tensor: &RgbNhwcTensor<W, H>,
    model: Option<&M>,
  ) -> Result<DetectionResult, DetectError>
  where
    M: ClassifierModel<W, H>,
    M::Error: std::error::Error + Send + Sync + 'static,
  {
    let model = model.ok_or(DetectError::ModelNotLoaded)?;
    let num_classes = model.num_classes();

    debug!("执行模型推理, 输入形状 {:?}", RgbNhwcTensor::<W, H>::shape());
    let scores = model.infer(tensor).map_err(|e| DetectError::Inference {
      expected: vec![1, num_classes],
      actual: None,
      source: Box::new(e),
    })?;

    if scores.len() != num_classes {
      return Err(DetectError::Inference {
        expected: vec![1, num_classes],
        actual: Some(scores.len()),
        source: Box::new(SimpleError("模型输出长度与声明的类别数不一致".to_string())),
      });
    }

    self.interpret(&scores)
  }

  /// 选出最高分类别并查表，分数相同时取下标最小者
  pub fn interpret(&self, scores: &[f32]) -> Result<DetectionResult, DetectError> {
    let scores = self.normalization.apply(scores);
    let (predicted_class, confidence) = argmax(&scores).ok_or_else(|| DetectError::Inference {
      expected: vec![1, self.labels.len()],
      actual: Some(scores.len()),
      source: Box::new(SimpleError("模型输出为空或全部为 NaN".to_string())),
    })?;

    if predicted_class >= self.labels.len() {
      warn!(
        "预测类别 {} 超出标签表范围 ({} 个标签)",
        predicted_class,
        self.labels.len()
      );
    }
    let disease_name = self.labels.name(predicted_class).to_string();
    let info = self.knowledge.lookup(&disease_name);

    debug!(
      "预测类别 {} ({}), 置信度 {:.4}",
      predicted_class, disease_name, confidence
    );

    Ok(DetectionResult {
      disease_name,
      description: info.description,
      treatment: info.treatment,
      confidence,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::{
    DiseaseInfo, Model, UNKNOWN_DISEASE,
    knowledge::{FALLBACK_DESCRIPTION, FALLBACK_TREATMENT},
  };

  struct FixedScores(Vec<f32>, usize);

  impl Model for FixedScores {
    type Input = RgbNhwcTensor<2, 2>;
    type Output = Box<[f32]>;
    type Error = SimpleError;

    fn infer(&self, _input: &Self::Input) -> Result<Self::Output, Self::Error> {
      Ok(self.0.clone().into_boxed_slice())
    }
  }

  impl ClassifierModel<2, 2> for FixedScores {
    fn num_classes(&self) -> usize {
      self.1
    }
  }

  struct Broken;

  impl Model for Broken {
    type Input = RgbNhwcTensor<2, 2>;
    type Output = Box<[f32]>;
    type Error = SimpleError;

    fn infer(&self, _input: &Self::Input) -> Result<Self::Output, Self::Error> {
      Err(SimpleError("shape mismatch".to_string()))
    }
  }

  impl ClassifierModel<2, 2> for Broken {
    fn num_classes(&self) -> usize {
      4
    }
  }

  fn runner(labels: &[&str]) -> ClassifierRunner {
    ClassifierRunner::new(
      labels.iter().copied().collect(),
      DiseaseKnowledge::builtin(),
    )
  }

  #[test]
  fn duplicate_maximum_selects_leftmost() {
    let result = runner(&["a", "b", "c", "d"])
      .interpret(&[0.2, 0.9, 0.9, 0.1])
      .unwrap();
    assert_eq!(result.disease_name, "b");
    assert_eq!(result.confidence, 0.9);
  }

  #[test]
  fn index_beyond_labels_is_unknown_disease() {
    let result = runner(&["healthy"]).interpret(&[0.1, 0.2, 0.7]).unwrap();
    assert_eq!(result.disease_name, UNKNOWN_DISEASE);
    assert_eq!(result.description, FALLBACK_DESCRIPTION);
    assert_eq!(result.treatment, FALLBACK_TREATMENT);
  }

  #[test]
  fn spaced_label_resolves_knowledge_entry() {
    let result = runner(&["Early Blight"]).interpret(&[1.0]).unwrap();
    let expected = DiseaseKnowledge::builtin().lookup("early_blight");
    assert_eq!(
      DiseaseInfo::new(result.description, result.treatment),
      expected
    );
  }

  #[test]
  fn missing_model_is_model_not_loaded() {
    let tensor = RgbNhwcTensor::<2, 2>::default();
    let err = runner(&["a"])
      .classify::<2, 2, FixedScores>(&tensor, None)
      .unwrap_err();
    assert!(matches!(err, DetectError::ModelNotLoaded));
  }

  #[test]
  fn failing_forward_pass_is_inference_error() {
    let tensor = RgbNhwcTensor::<2, 2>::default();
    let err = runner(&["a"]).classify(&tensor, Some(&Broken)).unwrap_err();
    assert!(matches!(err, DetectError::Inference { actual: None, .. }));
  }

  #[test]
  fn output_length_mismatch_is_inference_error() {
    let tensor = RgbNhwcTensor::<2, 2>::default();
    let model = FixedScores(vec![0.5, 0.5], 3);
    match runner(&["a"]).classify(&tensor, Some(&model)) {
      Err(DetectError::Inference { expected, actual, .. }) => {
        assert_eq!(expected, vec![1, 3]);
        assert_eq!(actual, Some(2));
      }
      other => panic!("unexpected result: {other:?}"),
    }
  }

  #[test]
  fn softmax_normalization_yields_probability() {
    let result = runner(&["a", "b"])
      .with_normalization(ScoreNormalization::Softmax)
      .interpret(&[0.0, 0.0])
      .unwrap();
    assert_eq!(result.disease_name, "a");
    assert!((result.confidence - 0.5).abs() < 1e-6);
  }

  #[test]
  fn softmax_with_infinite_logit_keeps_winning_class() {
    let result = runner(&["a", "b", "c"])
      .with_normalization(ScoreNormalization::Softmax)
      .interpret(&[0.1, 0.2, f32::INFINITY])
      .unwrap();
    assert_eq!(result.disease_name, "c");
    assert_eq!(result.confidence, 1.0);

    let json = result.to_json().unwrap();
    assert_eq!(DetectionResult::from_json(&json).unwrap(), result);
  }

  #[test]
  fn empty_scores_are_inference_error() {
    assert!(matches!(
      runner(&["a"]).interpret(&[]),
      Err(DetectError::Inference { .. })
    ));
  }
}
