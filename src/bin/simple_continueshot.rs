// 该文件是 Leafscan （叶诊） 项目的一部分。
// src/bin/simple_continueshot.rs - 连续检测目录中的图片
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

use anyhow::Result;
use clap::Parser;
use url::Url;

use leafscan::{
  FromUrl, LeafService, ServiceConfig,
  input::InputWrapper,
  output::OutputWrapper,
  task::{ContinuousTask, Task},
};
use tracing::info;

/// 连续检测输入中的每张图片
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 模型位置
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 输入来源
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出位置
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,

  #[arg(long, value_name = "FRAME_NUMBER")]
  pub frame_number: Option<usize>,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("模型: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("输出位置: {}", args.output);

  let config = ServiceConfig::from_url(&args.model)?;
  let mut service = LeafService::load(&config)?;
  let input = InputWrapper::from_url(&args.input)?;
  let output = OutputWrapper::from_url(&args.output)?;

  ContinuousTask::default()
    .with_frame_number(args.frame_number)
    .run_task(input, &service, output)?;

  service.close();
  Ok(())
}
