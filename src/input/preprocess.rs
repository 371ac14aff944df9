// 该文件是 Leafscan （叶诊） 项目的一部分。
// src/input/preprocess.rs - 图像解码、缩放与归一化
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

use image::{DynamicImage, imageops::FilterType};
use tracing::debug;

use crate::{DetectError, RgbNhwcTensor, frame::RGB_CHANNELS};

// 与训练时的预处理保持一致：双线性缩放，不保持宽高比
const RESIZE_FILTER: FilterType = FilterType::Triangle;

/// 将任意编码的图像字节转换为 `[1, H, W, 3]` 浮点张量
///
/// 图像被拉伸到 `W x H`，每个通道除以 255，不做均值方差归一化。
/// 结果只取决于输入字节与 `W`、`H`。
pub fn preprocess<const W: u32, const H: u32>(
  bytes: &[u8],
) -> Result<RgbNhwcTensor<W, H>, DetectError> {
  let image = image::load_from_memory(bytes).map_err(|source| DetectError::Decode {
    byte_len: bytes.len(),
    source,
  })?;
  debug!(
    "解码图像: {}x{}, 颜色类型 {:?}",
    image.width(),
    image.height(),
    image.color()
  );

  image_to_tensor(&image)
}

/// 将已解码的图像缩放并归一化为张量，丢弃 alpha 通道
pub fn image_to_tensor<const W: u32, const H: u32>(
  image: &DynamicImage,
) -> Result<RgbNhwcTensor<W, H>, DetectError> {
  let rgb = image.to_rgb8();
  let resized = image::imageops::resize(&rgb, W, H, RESIZE_FILTER);

  let mut data = Vec::with_capacity(RGB_CHANNELS * W as usize * H as usize);
  for pixel in resized.pixels() {
    for c in 0..RGB_CHANNELS {
      data.push(pixel[c] as f32 / 255.0);
    }
  }

  RgbNhwcTensor::try_from(data)
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::{ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
  use std::io::Cursor;

  fn encode_png(image: DynamicImage) -> Vec<u8> {
    let mut bytes = Vec::new();
    image
      .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
      .unwrap();
    bytes
  }

  #[test]
  fn solid_red_maps_to_unit_red_channel() {
    let image = RgbImage::from_pixel(37, 19, Rgb([255, 0, 0]));
    let bytes = encode_png(DynamicImage::ImageRgb8(image));

    let tensor = preprocess::<8, 6>(&bytes).unwrap();
    assert_eq!(tensor.len(), 8 * 6 * 3);
    for chunk in tensor.as_slice().chunks_exact(3) {
      assert_eq!(chunk, &[1.0, 0.0, 0.0]);
    }
  }

  #[test]
  fn alpha_channel_is_discarded() {
    let image = RgbaImage::from_pixel(4, 4, Rgba([0, 0, 255, 10]));
    let bytes = encode_png(DynamicImage::ImageRgba8(image));

    let tensor = preprocess::<4, 4>(&bytes).unwrap();
    assert_eq!(tensor.len(), 4 * 4 * 3);
    for chunk in tensor.as_slice().chunks_exact(3) {
      assert_eq!(chunk, &[0.0, 0.0, 1.0]);
    }
  }

  #[test]
  fn rows_are_emitted_top_to_bottom() {
    // 上半部分白色，下半部分黑色
    let image = RgbImage::from_fn(4, 4, |_, y| {
      if y < 2 {
        Rgb([255, 255, 255])
      } else {
        Rgb([0, 0, 0])
      }
    });
    let tensor = image_to_tensor::<4, 4>(&DynamicImage::ImageRgb8(image)).unwrap();
    assert_eq!(tensor.pixel(0, 0), Some([1.0, 1.0, 1.0]));
    assert_eq!(tensor.pixel(3, 3), Some([0.0, 0.0, 0.0]));
  }

  fn gradient_rgb(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
      Rgb([
        (x * 255 / width.max(1)) as u8,
        (y * 255 / height.max(1)) as u8,
        ((x * 7 + y * 13) % 256) as u8,
      ])
    }))
  }

  fn assert_unit_range<const W: u32, const H: u32>(tensor: &RgbNhwcTensor<W, H>) {
    assert_eq!(tensor.len(), W as usize * H as usize * 3);
    assert!(
      tensor
        .as_slice()
        .iter()
        .all(|v| (0.0..=1.0).contains(v))
    );
  }

  #[test]
  fn identical_bytes_yield_bit_identical_tensors() {
    let bytes = encode_png(gradient_rgb(317, 211));

    let first = preprocess::<224, 224>(&bytes).unwrap();
    let second = preprocess::<224, 224>(&bytes).unwrap();
    assert_eq!(first.len(), second.len());
    assert!(
      first
        .as_slice()
        .iter()
        .zip(second.as_slice())
        .all(|(a, b)| a.to_bits() == b.to_bits())
    );
  }

  #[test]
  fn arbitrary_dimensions_map_into_unit_range() {
    let single = encode_png(DynamicImage::ImageRgb8(RgbImage::from_pixel(
      1,
      1,
      Rgb([12, 200, 99]),
    )));
    assert_unit_range(&preprocess::<224, 224>(&single).unwrap());

    let tall = encode_png(gradient_rgb(3, 517));
    assert_unit_range(&preprocess::<224, 224>(&tall).unwrap());

    let wide_rgba = RgbaImage::from_fn(1031, 377, |x, y| {
      Rgba([
        (x % 256) as u8,
        (y % 256) as u8,
        ((x ^ y) % 256) as u8,
        ((x + y) % 256) as u8,
      ])
    });
    let wide = encode_png(DynamicImage::ImageRgba8(wide_rgba));
    assert_unit_range(&preprocess::<224, 224>(&wide).unwrap());
  }

  #[test]
  fn garbage_bytes_fail_with_decode_error() {
    let bytes = b"definitely not an image";
    match preprocess::<4, 4>(bytes) {
      Err(DetectError::Decode { byte_len, .. }) => assert_eq!(byte_len, bytes.len()),
      other => panic!("unexpected result: {other:?}"),
    }
  }

  #[test]
  fn empty_input_fails_with_decode_error() {
    assert!(matches!(
      preprocess::<4, 4>(&[]),
      Err(DetectError::Decode { byte_len: 0, .. })
    ));
  }
}
