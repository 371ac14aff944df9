// 该文件是 Leafscan （叶诊） 项目的一部分。
// src/args.rs - 命令行参数
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

use clap::Parser;
use url::Url;

/// 叶片病害检测
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 模型位置
  /// 例如: onnx:///models/leaf.onnx?labels=/models/labels.txt&normalize=softmax
  #[arg(long, value_name = "MODEL")]
  pub model: Url,

  /// 输入来源
  /// - 单张图片: image:///path/leaf.jpg
  /// - 图片目录: folder:///path/leaves
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,

  /// 输出位置
  /// - 标准输出: stdout: 或 stdout:?compact
  /// - JSON 文件: json:///path/result.json
  /// - 历史记录目录: folder:///path/history?min_confidence=0.5
  #[arg(long, value_name = "OUTPUT", default_value = "stdout:")]
  pub output: Url,

  /// 处理输入中的所有图片，而不只是第一张
  #[arg(long)]
  pub all: bool,

  /// 最多处理的图片数量（配合 --all 使用）
  #[arg(long, value_name = "COUNT")]
  pub max_images: Option<usize>,
}
