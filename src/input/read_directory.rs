// 该文件是 Leafscan （叶诊） 项目的一部分。
// src/input/read_directory.rs - 目录批量图片输入
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

use std::{collections::VecDeque, path::PathBuf};

use thiserror::Error;
use tracing::{error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  input::{InputImage, has_image_extension},
  url_file_path,
};

#[derive(Error, Debug)]
pub enum DirectoryInputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("目录中没有图片文件: {0}")]
  Empty(PathBuf),
}

/// 按文件名顺序逐张读取目录中的图片文件
pub struct DirectoryInput {
  pending: VecDeque<PathBuf>,
}

impl FromUrlWithScheme for DirectoryInput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryInput {
  type Error = DirectoryInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(DirectoryInputError::SchemeMismatch);
    }

    let directory = url_file_path(url);
    let mut files = Vec::new();
    for entry in std::fs::read_dir(&directory)? {
      let path = entry?.path();
      if path.is_file() && has_image_extension(&path) {
        files.push(path);
      }
    }

    if files.is_empty() {
      return Err(DirectoryInputError::Empty(directory));
    }

    files.sort();
    info!("目录 {} 中共有 {} 张图片", directory.display(), files.len());

    Ok(DirectoryInput {
      pending: files.into(),
    })
  }
}

impl DirectoryInput {
  pub fn remaining(&self) -> usize {
    self.pending.len()
  }
}

impl Iterator for DirectoryInput {
  type Item = InputImage;

  fn next(&mut self) -> Option<Self::Item> {
    // 读取失败的文件记录日志后跳过
    while let Some(path) = self.pending.pop_front() {
      match std::fs::read(&path) {
        Ok(bytes) => return Some(InputImage::new(path.display().to_string(), bytes)),
        Err(e) => error!("读取图片文件失败 {}: {}", path.display(), e),
      }
    }
    None
  }
}
