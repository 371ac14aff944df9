// 该文件是 Leafscan （叶诊） 项目的一部分。
// src/frame.rs - NHWC 浮点张量定义
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

use crate::{DetectError, LEAF_INPUT_H, LEAF_INPUT_W};

pub const RGB_CHANNELS: usize = 3;

/// `[1, H, W, 3]` 布局的 RGB 浮点张量，取值范围 `[0.0, 1.0]`
///
/// 数据按行优先排列：行自上而下，行内列自左而右，像素内按 R、G、B 顺序。
#[derive(Debug, Clone, PartialEq)]
pub struct RgbNhwcTensor<const W: u32, const H: u32> {
  data: Box<[f32]>,
}

/// 参考配置下的 224x224 输入张量
pub type LeafTensor = RgbNhwcTensor<LEAF_INPUT_W, LEAF_INPUT_H>;

impl<const W: u32, const H: u32> RgbNhwcTensor<W, H> {
  /// 张量元素个数 `H * W * 3`
  pub const LEN: usize = RGB_CHANNELS * W as usize * H as usize;

  /// 模型输入形状 `[1, H, W, 3]`
  pub fn shape() -> [usize; 4] {
    [1, H as usize, W as usize, RGB_CHANNELS]
  }

  pub fn as_slice(&self) -> &[f32] {
    &self.data
  }

  pub fn len(&self) -> usize {
    self.data.len()
  }

  pub fn is_empty(&self) -> bool {
    self.data.is_empty()
  }

  /// 读取 (x, y) 处像素的 RGB 分量，越界时返回 `None`
  pub fn pixel(&self, x: usize, y: usize) -> Option<[f32; 3]> {
    if x >= W as usize || y >= H as usize {
      return None;
    }
    let base = (y * W as usize + x) * RGB_CHANNELS;
    Some([self.data[base], self.data[base + 1], self.data[base + 2]])
  }
}

impl<const W: u32, const H: u32> TryFrom<Vec<f32>> for RgbNhwcTensor<W, H> {
  type Error = DetectError;

  fn try_from(data: Vec<f32>) -> Result<Self, Self::Error> {
    if data.len() != Self::LEN {
      return Err(DetectError::TensorShape {
        expected: Self::LEN,
        actual: data.len(),
      });
    }

    Ok(Self {
      data: data.into_boxed_slice(),
    })
  }
}

impl<const W: u32, const H: u32> Default for RgbNhwcTensor<W, H> {
  fn default() -> Self {
    let data = vec![0f32; Self::LEN].into_boxed_slice();
    Self { data }
  }
}

impl<const W: u32, const H: u32> AsRef<[f32]> for RgbNhwcTensor<W, H> {
  fn as_ref(&self) -> &[f32] {
    &self.data
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn rejects_wrong_length() {
    let err = RgbNhwcTensor::<2, 2>::try_from(vec![0.0; 5]).unwrap_err();
    match err {
      DetectError::TensorShape { expected, actual } => {
        assert_eq!(expected, 12);
        assert_eq!(actual, 5);
      }
      other => panic!("unexpected error: {other}"),
    }
  }

  #[test]
  fn pixel_reads_row_major_rgb() {
    let data: Vec<f32> = (0..12).map(|v| v as f32).collect();
    let tensor = RgbNhwcTensor::<2, 2>::try_from(data).unwrap();
    assert_eq!(tensor.pixel(0, 0), Some([0.0, 1.0, 2.0]));
    assert_eq!(tensor.pixel(1, 0), Some([3.0, 4.0, 5.0]));
    assert_eq!(tensor.pixel(0, 1), Some([6.0, 7.0, 8.0]));
  }

  #[test]
  fn pixel_outside_image_is_none() {
    let data: Vec<f32> = (0..12).map(|v| v as f32).collect();
    let tensor = RgbNhwcTensor::<2, 2>::try_from(data).unwrap();
    assert_eq!(tensor.pixel(2, 0), None);
    assert_eq!(tensor.pixel(0, 2), None);
    assert_eq!(tensor.pixel(5, 5), None);
  }

  #[test]
  fn reference_geometry() {
    assert_eq!(LeafTensor::LEN, 224 * 224 * 3);
    assert_eq!(LeafTensor::shape(), [1, 224, 224, 3]);
    assert_eq!(LeafTensor::default().len(), LeafTensor::LEN);
  }
}
