// 该文件是 Leafscan （叶诊） 项目的一部分。
// src/task.rs - 检测任务
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
  sync::mpsc::{Receiver, channel},
  thread,
  time::{Duration, Instant},
};

use tracing::{error, info, warn};

use crate::{DetectError, model::Model, output::Render};

pub trait Task<I, M, O>: Sized {
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error>;
}

/// 只处理输入中的第一张图片
pub struct OneShotTask;

impl<
  F,
  D,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: Model<Input = F, Output = D, Error = ME>,
  O: Render<F, D, Error = RE>,
> Task<I, M, O> for OneShotTask
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入图片"))?;
    let now = Instant::now();
    let result = model.infer(&frame)?;
    info!("检测完成，耗时: {:.2?}", now.elapsed());
    output.render_result(&frame, &result)?;
    Ok(())
  }
}

/// 对同一张图片重复检测，统计平均耗时
pub struct RepeatShotTask {
  repeat_times: usize,
}

impl Default for RepeatShotTask {
  fn default() -> Self {
    Self { repeat_times: 1000 }
  }
}

/// 不计入平均值的预热次数
const WARMUP_ROUNDS: usize = 2;

impl RepeatShotTask {
  pub fn with_repeat_times(mut self, repeat_times: usize) -> Self {
    self.repeat_times = repeat_times.max(1);
    self
  }
}

fn average_after_warmup(times: &[Duration]) -> Option<Duration> {
  let measured = times.get(WARMUP_ROUNDS..).filter(|t| !t.is_empty())?;
  Some(measured.iter().sum::<Duration>() / measured.len() as u32)
}

impl<
  F,
  D,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: Model<Input = F, Output = D, Error = ME>,
  O: Render<F, D, Error = RE>,
> Task<I, M, O> for RepeatShotTask
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务，重复 {} 次...", self.repeat_times);
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入图片"))?;
    let mut times = Vec::with_capacity(self.repeat_times);
    for i in 0..self.repeat_times {
      let now = Instant::now();
      let result = model.infer(&frame)?;
      let elapsed = now.elapsed();
      info!("({}) 检测完成，耗时: {:.2?}", i, elapsed);
      output.render_result(&frame, &result)?;
      times.push(elapsed);
    }

    match average_after_warmup(&times) {
      Some(average) => warn!("平均检测时间: {:.2?}", average),
      None => warn!("重复次数不足 {}，不统计平均时间", WARMUP_ROUNDS + 1),
    }

    Ok(())
  }
}

/// 逐张处理输入中的所有图片，直到输入结束、达到指定数量或收到中断信号
///
/// 单张图片的检测错误只记录日志，不会中断任务；服务被关闭后任务结束。
#[derive(Default, Debug)]
pub struct ContinuousTask {
  frame_number: Option<usize>,
}

impl ContinuousTask {
  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }
}

fn install_interrupt_handler() -> Option<Receiver<()>> {
  let (tx, rx) = channel();
  let installed = ctrlc::set_handler(move || {
    info!("收到中断信号，准备退出...");
    let _ = tx.send(());
    thread::spawn(|| {
      thread::sleep(Duration::from_secs(30));
      warn!("强制退出程序");
      std::process::exit(1);
    });
  });

  match installed {
    Ok(()) => Some(rx),
    Err(e) => {
      warn!("无法设置中断处理: {}", e);
      None
    }
  }
}

impl<
  F,
  D,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: Model<Input = F, Output = D, Error = DetectError>,
  O: Render<F, D, Error = RE>,
> Task<I, M, O> for ContinuousTask
{
  type Error = anyhow::Error;

  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let interrupt = install_interrupt_handler();

    let mut frame_index = 0usize;
    let mut failures = 0usize;
    for frame in input {
      frame_index = frame_index.saturating_add(1);
      let now = Instant::now();
      match model.infer(&frame) {
        Ok(result) => {
          output.render_result(&frame, &result)?;
          info!("第 {} 张图片检测完成，耗时: {:.2?}", frame_index, now.elapsed());
        }
        Err(DetectError::ModelNotLoaded) => {
          error!("模型未加载，退出任务循环");
          break;
        }
        Err(e) => {
          failures += 1;
          error!("第 {} 张图片检测失败: {}", frame_index, e);
        }
      }

      if self.frame_number.map(|n| frame_index >= n).unwrap_or(false) {
        info!("达到指定数量 {}, 退出任务循环", frame_index);
        break;
      }
      if interrupt.as_ref().is_some_and(|rx| rx.try_recv().is_ok()) {
        warn!("中断信号接收，退出任务循环");
        break;
      }
    }

    info!("任务完成，共 {} 张图片，失败 {} 张", frame_index, failures);
    Ok(())
  }
}
