//! # 尺寸解析模块
//!
//! ## 设计思路
//!
//! 把“显式宽高 / 缩放倍数 / 原始尺寸”三类输入折算为最终像素尺寸，纯函数、无副作用。
//!
//! 规则按顺序匹配：
//! 1. 宽高都给出：原样使用（不保持宽高比，允许拉伸）
//! 2. 只给一边：按原始宽高比推算另一边，四舍五入（远离零）
//! 3. 只给缩放：原始尺寸乘以倍数，同样四舍五入
//! 4. 都没有：请求无效

use serde::{Deserialize, Serialize};

use super::ConvertError;

/// 调用方给出的尺寸参数。
///
/// 显式宽高优先于缩放倍数；二者的互斥关系由调用方（UI 层）保证。
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SizeSpec {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub scale: Option<f64>,
}

impl SizeSpec {
    pub fn exact(width: u32, height: u32) -> Self {
        Self {
            width: Some(width),
            height: Some(height),
            scale: None,
        }
    }

    pub fn width(width: u32) -> Self {
        Self {
            width: Some(width),
            ..Self::default()
        }
    }

    pub fn height(height: u32) -> Self {
        Self {
            height: Some(height),
            ..Self::default()
        }
    }

    pub fn scale(scale: f64) -> Self {
        Self {
            scale: Some(scale),
            ..Self::default()
        }
    }

    /// 是否至少给出了一项尺寸输入。
    pub fn has_any_input(&self) -> bool {
        self.width.is_some() || self.height.is_some() || self.scale.is_some()
    }
}

/// 源图原始尺寸（位图来自文件头，SVG 来自属性或默认值）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntrinsicSize {
    pub width: u32,
    pub height: u32,
}

/// 解析后的最终尺寸，宽高均 ≥ 1。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedSize {
    pub width: u32,
    pub height: u32,
}

/// 按规则解析最终尺寸。
///
/// # 示例
/// ```rust
/// use image_format_converter::{resolve_size, IntrinsicSize, SizeSpec};
///
/// let size = resolve_size(&SizeSpec::width(200), IntrinsicSize { width: 400, height: 300 })?;
/// assert_eq!((size.width, size.height), (200, 150));
/// # Ok::<(), image_format_converter::ConvertError>(())
/// ```
pub fn resolve_size(spec: &SizeSpec, intrinsic: IntrinsicSize) -> Result<ResolvedSize, ConvertError> {
    for (name, value) in [("width", spec.width), ("height", spec.height)] {
        if value == Some(0) {
            return Err(ConvertError::InvalidSizeSpec(format!("{} 不能为 0", name)));
        }
    }

    match (spec.width, spec.height) {
        (Some(width), Some(height)) => Ok(ResolvedSize { width, height }),
        (Some(width), None) => {
            ensure_aspect_ratio(intrinsic)?;
            let height = round_dimension(width as f64 * intrinsic.height as f64 / intrinsic.width as f64)?;
            Ok(ResolvedSize { width, height })
        }
        (None, Some(height)) => {
            ensure_aspect_ratio(intrinsic)?;
            let width = round_dimension(height as f64 * intrinsic.width as f64 / intrinsic.height as f64)?;
            Ok(ResolvedSize { width, height })
        }
        (None, None) => {
            let scale = spec.scale.ok_or_else(|| {
                ConvertError::InvalidSizeSpec("未提供宽度、高度或缩放倍数".to_string())
            })?;

            if !scale.is_finite() || scale <= 0.0 {
                return Err(ConvertError::InvalidSizeSpec(format!(
                    "缩放倍数必须为正数：{}",
                    scale
                )));
            }
            ensure_aspect_ratio(intrinsic)?;

            Ok(ResolvedSize {
                width: round_dimension(intrinsic.width as f64 * scale)?,
                height: round_dimension(intrinsic.height as f64 * scale)?,
            })
        }
    }
}

fn ensure_aspect_ratio(intrinsic: IntrinsicSize) -> Result<(), ConvertError> {
    if intrinsic.width == 0 || intrinsic.height == 0 {
        return Err(ConvertError::DegenerateAspectRatio {
            width: intrinsic.width,
            height: intrinsic.height,
        });
    }
    Ok(())
}

/// `f64::round` 即四舍五入远离零；推算结果不足 1 像素时取 1。
fn round_dimension(value: f64) -> Result<u32, ConvertError> {
    let rounded = value.round();
    if rounded > u32::MAX as f64 {
        return Err(ConvertError::ResourceLimit(format!("目标尺寸溢出：{}", value)));
    }
    Ok((rounded as u32).max(1))
}
