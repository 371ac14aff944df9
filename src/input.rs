// 该文件是 Leafscan （叶诊） 项目的一部分。
// src/input.rs - 图像输入与预处理
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

use crate::FromUrl;

mod preprocess;
pub use self::preprocess::{image_to_tensor, preprocess};

#[cfg(feature = "read_image_file")]
mod read_image_file;
#[cfg(feature = "read_image_file")]
pub use self::read_image_file::{ImageFileInput, ImageFileInputError};

#[cfg(feature = "directory_input")]
mod read_directory;
#[cfg(feature = "directory_input")]
pub use self::read_directory::{DirectoryInput, DirectoryInputError};

/// 一次检测请求的原始图像
///
/// 字节的编码格式与尺寸均未知，由预处理阶段解码。
#[derive(Debug, Clone)]
pub struct InputImage {
  /// 来源名称（通常为文件路径），仅用于日志与记录
  pub name: String,
  pub bytes: Box<[u8]>,
}

impl InputImage {
  pub fn new(name: impl Into<String>, bytes: impl Into<Box<[u8]>>) -> Self {
    Self {
      name: name.into(),
      bytes: bytes.into(),
    }
  }
}

/// 支持的图片文件扩展名
pub const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "bmp", "gif", "webp"];

pub fn has_image_extension(path: &std::path::Path) -> bool {
  path
    .extension()
    .and_then(|ext| ext.to_str())
    .map(|ext| {
      let ext = ext.to_lowercase();
      IMAGE_EXTENSIONS.contains(&ext.as_str())
    })
    .unwrap_or(false)
}

#[derive(Error, Debug)]
pub enum InputError {
  #[cfg(feature = "read_image_file")]
  #[error("Image file input error: {0}")]
  ImageFileInputError(#[from] ImageFileInputError),
  #[cfg(feature = "directory_input")]
  #[error("Directory input error: {0}")]
  DirectoryInputError(#[from] DirectoryInputError),
  #[error("URI scheme mismatch")]
  SchemeMismatch,
}

pub enum InputWrapper {
  #[cfg(feature = "read_image_file")]
  ReadImageFile(ImageFileInput),
  #[cfg(feature = "directory_input")]
  Directory(DirectoryInput),
}

impl FromUrl for InputWrapper {
  type Error = InputError;

  fn from_url(url: &url::Url) -> Result<Self, Self::Error> {
    #[cfg(feature = "read_image_file")]
    {
      use crate::FromUrlWithScheme;

      if url.scheme() == ImageFileInput::SCHEME {
        let input = ImageFileInput::from_url(url)?;
        return Ok(InputWrapper::ReadImageFile(input));
      }
    }
    #[cfg(feature = "directory_input")]
    {
      use crate::FromUrlWithScheme;

      if url.scheme() == DirectoryInput::SCHEME {
        let input = DirectoryInput::from_url(url)?;
        return Ok(InputWrapper::Directory(input));
      }
    }
    Err(InputError::SchemeMismatch)
  }
}

impl Iterator for InputWrapper {
  type Item = InputImage;

  fn next(&mut self) -> Option<Self::Item> {
    match self {
      #[cfg(feature = "read_image_file")]
      InputWrapper::ReadImageFile(input) => input.next(),
      #[cfg(feature = "directory_input")]
      InputWrapper::Directory(input) => input.next(),
    }
  }
}
