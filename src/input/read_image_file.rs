// 该文件是 Leafscan （叶诊） 项目的一部分。
// src/input/read_image_file.rs - 图像文件输入
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

use thiserror::Error;
use tracing::{debug, error};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, input::InputImage, url_file_path};

#[derive(Error, Debug)]
pub enum ImageFileInputError {
  #[error("URI schema mismatch")]
  SchemaMismatch,
  #[error("I/O error: {0}")]
  IoError(#[from] std::io::Error),
}

/// 单张图片文件输入，只产生一帧
///
/// 文件内容原样读出，不在此处解码；解码失败属于单次请求的错误。
pub struct ImageFileInput {
  image: Option<InputImage>,
}

impl FromUrlWithScheme for ImageFileInput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for ImageFileInput {
  type Error = ImageFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ImageFileInputError::SchemaMismatch);
    }

    let path = url_file_path(url);
    let bytes = std::fs::read(&path)?;
    debug!("读取图片文件 {}: {} 字节", path.display(), bytes.len());

    Ok(ImageFileInput {
      image: Some(InputImage::new(path.display().to_string(), bytes)),
    })
  }
}

impl Iterator for ImageFileInput {
  type Item = InputImage;

  fn next(&mut self) -> Option<Self::Item> {
    self.image.take()
  }
}
