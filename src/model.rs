// 该文件是 Leafscan （叶诊） 项目的一部分。
// src/model.rs - 模型
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

use crate::{DetectError, RgbNhwcTensor};

pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

impl<T: Model + ?Sized> Model for &T {
  type Input = T::Input;
  type Output = T::Output;
  type Error = T::Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    (**self).infer(input)
  }
}

/// 固定输入形状 `[1, H, W, 3]`、输出形状 `[1, C]` 的图像分类模型
pub trait ClassifierModel<const W: u32, const H: u32>:
  Model<Input = RgbNhwcTensor<W, H>, Output = Box<[f32]>>
{
  /// 模型声明的类别数 C
  fn num_classes(&self) -> usize;
}

/// 从打包的模型文件加载
pub trait FromModelFile: Sized {
  fn from_model_file(path: &Path) -> Result<Self, DetectError>;
}

/// 置信度的计算方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScoreNormalization {
  /// 直接使用模型输出的原始分数
  #[default]
  Raw,
  /// 先对输出做 softmax，适用于输出 logits 的模型
  Softmax,
}

impl std::str::FromStr for ScoreNormalization {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "raw" | "none" => Ok(ScoreNormalization::Raw),
      "softmax" => Ok(ScoreNormalization::Softmax),
      other => Err(format!("未知的分数归一化方式: {other}")),
    }
  }
}

impl ScoreNormalization {
  pub fn apply(self, scores: &[f32]) -> Vec<f32> {
    match self {
      ScoreNormalization::Raw => scores.to_vec(),
      ScoreNormalization::Softmax => softmax(scores),
    }
  }
}

/// NaN 视为零概率；存在 `+inf` 时概率平分给所有 `+inf` 项
fn softmax(scores: &[f32]) -> Vec<f32> {
  let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);

  if max == f32::INFINITY {
    let winners = scores.iter().filter(|&&s| s == f32::INFINITY).count() as f32;
    return scores
      .iter()
      .map(|&s| if s == f32::INFINITY { 1.0 / winners } else { 0.0 })
      .collect();
  }
  if max == f32::NEG_INFINITY {
    return vec![1.0 / scores.len() as f32; scores.len()];
  }

  let exps: Vec<f32> = scores
    .iter()
    .map(|&s| if s.is_nan() { 0.0 } else { (s - max).exp() })
    .collect();
  let sum: f32 = exps.iter().sum();
  exps.into_iter().map(|e| e / sum).collect()
}

/// 返回最大分数的下标与分数；多个最大值时取最左侧
///
/// NaN 分数不参与比较；全部为 NaN 时返回 `None`。
pub fn argmax(scores: &[f32]) -> Option<(usize, f32)> {
  let mut best: Option<(usize, f32)> = None;
  for (idx, &score) in scores.iter().enumerate() {
    if score.is_nan() {
      continue;
    }
    match best {
      Some((_, best_score)) if score <= best_score => {}
      _ => best = Some((idx, score)),
    }
  }
  best
}

mod knowledge;
mod labels;
#[cfg(feature = "onnx")]
mod onnx;
mod runner;

pub use self::knowledge::{DiseaseInfo, DiseaseKnowledge, disease_key};
pub use self::labels::{LabelTable, UNKNOWN_DISEASE};
#[cfg(feature = "onnx")]
pub use self::onnx::{OnnxClassifier, OnnxModelError};
pub use self::runner::ClassifierRunner;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn argmax_prefers_leftmost_maximum() {
    assert_eq!(argmax(&[0.2, 0.9, 0.9, 0.1]), Some((1, 0.9)));
  }

  #[test]
  fn argmax_of_empty_is_none() {
    assert_eq!(argmax(&[]), None);
  }

  #[test]
  fn argmax_handles_negative_scores() {
    assert_eq!(argmax(&[-3.0, -1.0, -2.0]), Some((1, -1.0)));
  }

  #[test]
  fn softmax_sums_to_one_and_keeps_order() {
    let probs = ScoreNormalization::Softmax.apply(&[1.0, 3.0, 2.0]);
    let sum: f32 = probs.iter().sum();
    assert!((sum - 1.0).abs() < 1e-6);
    assert_eq!(argmax(&probs).map(|(i, _)| i), Some(1));
  }

  #[test]
  fn softmax_gives_infinite_logits_all_the_mass() {
    let probs = ScoreNormalization::Softmax.apply(&[0.1, 0.2, f32::INFINITY]);
    assert_eq!(probs, vec![0.0, 0.0, 1.0]);
    assert_eq!(argmax(&probs), Some((2, 1.0)));

    let probs = ScoreNormalization::Softmax.apply(&[f32::INFINITY, 0.0, f32::INFINITY]);
    assert_eq!(probs, vec![0.5, 0.0, 0.5]);
    assert_eq!(argmax(&probs), Some((0, 0.5)));
  }

  #[test]
  fn softmax_stays_finite_for_degenerate_scores() {
    let probs = ScoreNormalization::Softmax.apply(&[f32::NEG_INFINITY, f32::NEG_INFINITY]);
    assert_eq!(probs, vec![0.5, 0.5]);

    let probs = ScoreNormalization::Softmax.apply(&[f32::NAN, 1.0, 0.0]);
    assert!(probs.iter().all(|p| p.is_finite()));
    assert_eq!(probs[0], 0.0);
    assert_eq!(argmax(&probs).map(|(i, _)| i), Some(1));
  }

  #[test]
  fn argmax_ignores_nan_scores() {
    assert_eq!(argmax(&[f32::NAN, 0.3, 0.7]), Some((2, 0.7)));
    assert_eq!(argmax(&[f32::NAN]), None);
  }

  #[test]
  fn raw_normalization_is_identity() {
    assert_eq!(ScoreNormalization::Raw.apply(&[0.05, 0.95]), vec![0.05, 0.95]);
  }

  #[test]
  fn parses_normalization_names() {
    assert_eq!("softmax".parse(), Ok(ScoreNormalization::Softmax));
    assert_eq!("RAW".parse(), Ok(ScoreNormalization::Raw));
    assert!("sigmoid".parse::<ScoreNormalization>().is_err());
  }
}
