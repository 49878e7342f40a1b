//! # 配置模块
//!
//! ## 设计思路
//!
//! 将所有“可调策略”集中到 `ConvertConfig`，保证运行时行为可观测、可调整、可测试。
//! 其中性能档位（quality / balanced / speed）作为高层语义，映射到底层参数组合。
//!
//! ## 实现思路
//!
//! - `Default` 提供生产可用的平衡配置。
//! - 配置可从 JSON 读取，缺失字段回落到默认值（`#[serde(default)]`）。
//! - `ConvertPerformanceProfile` 负责档位字符串解析与反向输出。
//! - `apply_performance_profile` 将档位转换为具体参数。
//! - `infer_performance_profile` 用于从当前配置反推档位。

use std::path::Path;

use fast_image_resize as fr;
use image::imageops::FilterType;
use serde::{Deserialize, Serialize};

use super::ConvertError;

/// 重采样滤镜（可序列化，映射到 `image` 与 `fast_image_resize` 两套滤镜）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizeFilter {
    Nearest,
    Triangle,
    CatmullRom,
    Gaussian,
    Lanczos3,
}

impl ResizeFilter {
    pub(crate) fn to_image_filter(self) -> FilterType {
        match self {
            Self::Nearest => FilterType::Nearest,
            Self::Triangle => FilterType::Triangle,
            Self::CatmullRom => FilterType::CatmullRom,
            Self::Gaussian => FilterType::Gaussian,
            Self::Lanczos3 => FilterType::Lanczos3,
        }
    }

    pub(crate) fn to_fast_filter(self) -> fr::FilterType {
        match self {
            Self::Nearest => fr::FilterType::Box,
            Self::Triangle => fr::FilterType::Bilinear,
            Self::CatmullRom => fr::FilterType::CatmullRom,
            Self::Gaussian => fr::FilterType::Mitchell,
            Self::Lanczos3 => fr::FilterType::Lanczos3,
        }
    }
}

/// 转换引擎配置。
///
/// 字段覆盖了读取、解码、重采样与编码四个阶段。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertConfig {
    /// 读取原始字节时允许的最大文件体积（字节）。
    pub max_file_size: u64,
    /// 源图与目标图的像素上限（`width * height`）。
    pub max_decoded_pixels: u64,
    /// 按 RGBA 估算的单张图内存上限（字节）。
    pub max_decoded_bytes: u64,
    /// 重采样滤镜。
    pub resize_filter: ResizeFilter,
    /// 是否优先使用 `fast_image_resize`（失败时回退 `image::resize_exact`）。
    pub fast_resize: bool,
    /// JPEG 编码质量（1~100）。
    pub jpeg_quality: u8,
    /// SVG 缺少 width/height/viewBox 时使用的默认宽度。
    pub default_vector_width: u32,
    /// SVG 缺少 width/height/viewBox 时使用的默认高度。
    pub default_vector_height: u32,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            max_file_size: 50 * 1024 * 1024,
            max_decoded_pixels: 40_000_000,
            max_decoded_bytes: 160 * 1024 * 1024,
            resize_filter: ResizeFilter::Triangle,
            fast_resize: true,
            jpeg_quality: 92,
            default_vector_width: 300,
            default_vector_height: 150,
        }
    }
}

/// 性能档位（面向产品/用户语义）。
///
/// - `Quality`：尽量保真
/// - `Balanced`：质量与性能平衡
/// - `Speed`：优先转换速度
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvertPerformanceProfile {
    Quality,
    Balanced,
    Speed,
}

impl ConvertPerformanceProfile {
    /// 从外部字符串解析档位。
    ///
    /// # 示例
    /// ```rust
    /// use image_format_converter::ConvertPerformanceProfile;
    ///
    /// let p = ConvertPerformanceProfile::from_name("balanced")?;
    /// assert_eq!(p.as_str(), "balanced");
    /// # Ok::<(), image_format_converter::ConvertError>(())
    /// ```
    pub fn from_name(profile: &str) -> Result<Self, ConvertError> {
        match profile.trim().to_lowercase().as_str() {
            "quality" => Ok(Self::Quality),
            "balanced" => Ok(Self::Balanced),
            "speed" => Ok(Self::Speed),
            other => Err(ConvertError::InvalidInput(format!(
                "未知性能档位：{}（可选：quality / balanced / speed）",
                other
            ))),
        }
    }

    /// 将档位输出为稳定字符串，供前端展示与持久化。
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Quality => "quality",
            Self::Balanced => "balanced",
            Self::Speed => "speed",
        }
    }
}

impl ConvertConfig {
    /// 从 JSON 文本解析配置，缺失字段使用默认值。
    pub fn from_json_str(content: &str) -> Result<Self, ConvertError> {
        let config: Self = serde_json::from_str(content)
            .map_err(|e| ConvertError::InvalidInput(format!("解析配置失败：{}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// 从 JSON 文件读取配置；文件不存在时返回默认配置。
    pub fn load_from_path(path: &Path) -> Result<Self, ConvertError> {
        if !path.exists() {
            log::debug!("配置文件不存在，使用默认配置：{}", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ConvertError::FileSystem(format!("读取配置文件失败：{}", e)))?;
        Self::from_json_str(&content)
    }

    /// 校验数值范围。
    pub fn validate(&self) -> Result<(), ConvertError> {
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(ConvertError::InvalidInput(
                "jpeg_quality 必须在 1~100 之间".to_string(),
            ));
        }
        if self.max_decoded_pixels == 0 || self.max_decoded_bytes == 0 || self.max_file_size == 0 {
            return Err(ConvertError::InvalidInput("资源上限不能为 0".to_string()));
        }
        if self.default_vector_width == 0 || self.default_vector_height == 0 {
            return Err(ConvertError::InvalidInput("默认 SVG 尺寸不能为 0".to_string()));
        }
        Ok(())
    }

    /// 基于当前参数反推性能档位。
    pub(crate) fn infer_performance_profile(&self) -> ConvertPerformanceProfile {
        match self.resize_filter {
            ResizeFilter::Lanczos3 | ResizeFilter::CatmullRom if self.jpeg_quality >= 95 => {
                ConvertPerformanceProfile::Quality
            }
            ResizeFilter::Nearest => ConvertPerformanceProfile::Speed,
            _ if self.jpeg_quality <= 80 => ConvertPerformanceProfile::Speed,
            _ => ConvertPerformanceProfile::Balanced,
        }
    }

    /// 应用指定性能档位到实际参数。
    pub(crate) fn apply_performance_profile(&mut self, profile: ConvertPerformanceProfile) {
        match profile {
            ConvertPerformanceProfile::Quality => {
                self.resize_filter = ResizeFilter::Lanczos3;
                self.jpeg_quality = 95;
            }
            ConvertPerformanceProfile::Balanced => {
                self.resize_filter = ResizeFilter::Triangle;
                self.jpeg_quality = 92;
            }
            ConvertPerformanceProfile::Speed => {
                self.resize_filter = ResizeFilter::Nearest;
                self.jpeg_quality = 80;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_balanced() {
        let config = ConvertConfig::default();
        assert_eq!(
            config.infer_performance_profile(),
            ConvertPerformanceProfile::Balanced
        );
    }

    #[test]
    fn profile_round_trips_through_config() {
        for profile in [
            ConvertPerformanceProfile::Quality,
            ConvertPerformanceProfile::Balanced,
            ConvertPerformanceProfile::Speed,
        ] {
            let mut config = ConvertConfig::default();
            config.apply_performance_profile(profile);
            assert_eq!(config.infer_performance_profile(), profile);
        }
    }

    #[test]
    fn unknown_profile_is_rejected() {
        let result = ConvertPerformanceProfile::from_name("turbo");
        assert!(matches!(result, Err(ConvertError::InvalidInput(_))));
    }

    #[test]
    fn json_config_fills_missing_fields_with_defaults() {
        let config = ConvertConfig::from_json_str(r#"{ "jpeg_quality": 70, "resize_filter": "lanczos3" }"#)
            .expect("parse config failed");

        assert_eq!(config.jpeg_quality, 70);
        assert_eq!(config.resize_filter, ResizeFilter::Lanczos3);
        assert_eq!(config.max_file_size, ConvertConfig::default().max_file_size);
    }

    #[test]
    fn json_config_rejects_out_of_range_quality() {
        let result = ConvertConfig::from_json_str(r#"{ "jpeg_quality": 0 }"#);
        assert!(matches!(result, Err(ConvertError::InvalidInput(_))));
    }

    #[test]
    fn missing_config_file_falls_back_to_default() {
        let dir = tempfile::tempdir().expect("create temp dir failed");
        let config = ConvertConfig::load_from_path(&dir.path().join("converter.json"))
            .expect("load config failed");

        assert_eq!(config, ConvertConfig::default());
    }
}
