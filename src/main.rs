// 该文件是 Leafscan （叶诊） 项目的一部分。
// src/main.rs - 项目主程序
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

mod args;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use leafscan::{
  FromUrl, LeafService, ServiceConfig,
  input::InputWrapper,
  output::OutputWrapper,
  task::{ContinuousTask, OneShotTask, Task},
};

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = args::Args::parse();

  info!("模型: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("输出位置: {}", args.output);

  let config = ServiceConfig::from_url(&args.model)?;
  let service = LeafService::load(&config)?;
  let input = InputWrapper::from_url(&args.input)?;
  let output = OutputWrapper::from_url(&args.output)?;

  if args.all {
    ContinuousTask::default()
      .with_frame_number(args.max_images)
      .run_task(input, service, output)?;
  } else {
    OneShotTask.run_task(input, service, output)?;
  }

  Ok(())
}
