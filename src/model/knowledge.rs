// 该文件是 Leafscan （叶诊） 项目的一部分。
// src/model/knowledge.rs - 病害知识表
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

use std::{collections::HashMap, path::Path};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::DetectError;

pub const FALLBACK_DESCRIPTION: &str =
  "Disease detected. Please consult with agricultural expert for detailed information.";
pub const FALLBACK_TREATMENT: &str =
  "Recommended to seek professional agricultural advice for proper treatment.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiseaseInfo {
  pub description: String,
  pub treatment: String,
}

impl DiseaseInfo {
  pub fn new(description: impl Into<String>, treatment: impl Into<String>) -> Self {
    Self {
      description: description.into(),
      treatment: treatment.into(),
    }
  }

  /// 知识表未收录时使用的通用说明
  pub fn fallback() -> Self {
    Self::new(FALLBACK_DESCRIPTION, FALLBACK_TREATMENT)
  }
}

/// 病害名称的查表键：转小写，空格替换为下划线
pub fn disease_key(name: &str) -> String {
  name.to_lowercase().replace(' ', "_")
}

/// 病害名称到描述与防治建议的不可变映射
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiseaseKnowledge {
  entries: HashMap<String, DiseaseInfo>,
}

const BUILTIN_ENTRIES: [(&str, &str, &str); 14] = [
  (
    "healthy",
    "The leaf appears healthy with no visible signs of disease.",
    "No treatment needed. Keep regular watering, balanced fertilization and routine monitoring.",
  ),
  (
    "early_blight",
    "Fungal disease caused by Alternaria solani. Dark concentric rings form target-like spots on older leaves, which yellow and drop.",
    "Remove infected lower leaves, mulch to prevent soil splash, rotate crops and apply chlorothalonil or copper-based fungicide.",
  ),
  (
    "late_blight",
    "Caused by Phytophthora infestans. Water-soaked grey-green lesions spread rapidly in cool, wet weather, with white mold on leaf undersides.",
    "Destroy infected plants immediately, avoid overhead irrigation and apply protective fungicides such as mancozeb before outbreaks.",
  ),
  (
    "leaf_mold",
    "Fungal disease caused by Passalora fulva. Pale yellow spots on the upper leaf surface with olive-green mold underneath.",
    "Improve ventilation, reduce humidity, remove affected leaves and apply a suitable fungicide.",
  ),
  (
    "septoria_leaf_spot",
    "Fungal disease causing many small circular spots with dark borders and grey centers, starting on lower leaves.",
    "Remove infected foliage, avoid wetting leaves, rotate crops and apply copper or chlorothalonil fungicide.",
  ),
  (
    "bacterial_spot",
    "Bacterial infection by Xanthomonas species producing small, dark, water-soaked spots on leaves and fruit.",
    "Use disease-free seed, avoid overhead watering, remove infected plants and apply copper-based bactericides.",
  ),
  (
    "target_spot",
    "Fungal disease caused by Corynespora cassiicola. Brown lesions with concentric rings and yellow halos.",
    "Improve air circulation, remove crop debris and apply a labeled fungicide at first symptoms.",
  ),
  (
    "powdery_mildew",
    "White powdery fungal growth on leaf surfaces that reduces photosynthesis and weakens the plant.",
    "Prune for airflow, avoid excess nitrogen and apply sulfur, potassium bicarbonate or neem oil.",
  ),
  (
    "common_rust",
    "Fungal disease producing small reddish-brown pustules on both leaf surfaces.",
    "Plant resistant varieties and apply fungicide when pustules first appear in susceptible crops.",
  ),
  (
    "apple_scab",
    "Fungal disease caused by Venturia inaequalis. Olive-green to black velvety spots on leaves and fruit.",
    "Rake and destroy fallen leaves, prune to open the canopy and apply fungicide from bud break.",
  ),
  (
    "black_rot",
    "Fungal disease producing circular brown leaf spots with purple margins and rotting fruit.",
    "Remove mummified fruit and cankered wood, sanitize pruning tools and apply a protective fungicide.",
  ),
  (
    "mosaic_virus",
    "Viral infection causing mottled light and dark green patterns, leaf curling and stunted growth.",
    "No cure exists. Remove infected plants, control aphids and disinfect tools and hands.",
  ),
  (
    "yellow_leaf_curl_virus",
    "Viral disease spread by whiteflies. Leaves curl upward, turn yellow at the margins and plants are stunted.",
    "Control whiteflies, use insect netting and resistant varieties, and remove infected plants.",
  ),
  (
    "spider_mites",
    "Infestation by tiny mites causing fine yellow stippling, bronzing and webbing on leaf undersides.",
    "Spray plants with water, introduce predatory mites and apply insecticidal soap or miticide.",
  ),
];

impl DiseaseKnowledge {
  /// 内置的默认知识表
  pub fn builtin() -> Self {
    BUILTIN_ENTRIES
      .iter()
      .map(|&(key, description, treatment)| (key, DiseaseInfo::new(description, treatment)))
      .collect()
  }

  /// 从 JSON 文件加载知识表，格式为 `{"病害名称": {"description": ..., "treatment": ...}}`
  ///
  /// 键在加载时统一规范化，因此文件中可以使用任意大小写与空格。
  pub fn from_json_file(path: &Path) -> Result<Self, DetectError> {
    let knowledge_error = |reason: String| DetectError::Knowledge {
      path: path.to_path_buf(),
      reason,
    };

    let content = std::fs::read_to_string(path).map_err(|e| knowledge_error(e.to_string()))?;
    let entries: HashMap<String, DiseaseInfo> =
      serde_json::from_str(&content).map_err(|e| knowledge_error(e.to_string()))?;

    let mut normalized: HashMap<String, (String, DiseaseInfo)> =
      HashMap::with_capacity(entries.len());
    for (name, info) in entries {
      let key = disease_key(&name);
      if let Some((previous, _)) = normalized.get(&key) {
        return Err(knowledge_error(format!(
          "\"{}\" 与 \"{}\" 规范化后均为 \"{}\"",
          previous, name, key
        )));
      }
      normalized.insert(key, (name, info));
    }

    let knowledge = Self {
      entries: normalized
        .into_iter()
        .map(|(key, (_, info))| (key, info))
        .collect(),
    };
    info!(
      "加载病害知识文件 {}: {} 条记录",
      path.display(),
      knowledge.len()
    );
    Ok(knowledge)
  }

  /// 按规范化键查表，未收录时返回通用说明
  pub fn lookup(&self, disease_name: &str) -> DiseaseInfo {
    let key = disease_key(disease_name);
    match self.entries.get(&key) {
      Some(info) => info.clone(),
      None => {
        debug!("知识表未收录 \"{}\"，使用通用说明", key);
        DiseaseInfo::fallback()
      }
    }
  }

  pub fn contains(&self, disease_name: &str) -> bool {
    self.entries.contains_key(&disease_key(disease_name))
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }
}

impl<K: AsRef<str>> FromIterator<(K, DiseaseInfo)> for DiseaseKnowledge {
  fn from_iter<I: IntoIterator<Item = (K, DiseaseInfo)>>(iter: I) -> Self {
    let entries = iter
      .into_iter()
      .map(|(key, info)| (disease_key(key.as_ref()), info))
      .collect();
    Self { entries }
  }
}
