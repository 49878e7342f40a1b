//! # 输出模型
//!
//! `TargetFormat` 描述请求的目标格式，`ConversionResult` 是单次转换的最终产物。
//! 结果交给调用方后引擎不再持有任何引用。

use base64::{Engine as _, engine::general_purpose};
use serde::{Deserialize, Serialize};

use super::dimension::ResolvedSize;

/// 输出文件名前缀，完整文件名为 `converted_image.<ext>`。
const OUTPUT_FILE_STEM: &str = "converted_image";

/// 目标格式。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetFormat {
    /// SVG 矢量文档。
    Svg,
    Png,
    Jpeg,
    WebP,
}

impl TargetFormat {
    /// 按前端下拉框的取值解析目标格式。
    ///
    /// 无法识别的取值按 PNG 处理（保留原有的兜底策略）。
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "svg" => Self::Svg,
            "png" => Self::Png,
            "jpeg" | "jpg" => Self::Jpeg,
            "webp" => Self::WebP,
            other => {
                log::warn!("⚠️ 未知目标格式 {:?}，按 PNG 输出", other);
                Self::Png
            }
        }
    }

    pub fn is_vector(self) -> bool {
        matches!(self, Self::Svg)
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Svg => "svg",
            Self::Png => "png",
            Self::Jpeg => "jpeg",
            Self::WebP => "webp",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Svg => "image/svg+xml",
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::WebP => "image/webp",
        }
    }

    /// 建议的下载文件名。
    pub fn suggested_file_name(self) -> String {
        format!("{}.{}", OUTPUT_FILE_STEM, self.extension())
    }
}

/// 转换结果：输出字节、MIME 类型与建议文件名。
#[derive(Debug, Clone)]
pub struct ConversionResult {
    pub payload: Vec<u8>,
    pub mime_type: &'static str,
    pub file_name: String,
    /// 输出图像声明的尺寸（SVG 为根元素的 width/height）。
    pub size: ResolvedSize,
}

impl ConversionResult {
    pub(crate) fn new(target: TargetFormat, payload: Vec<u8>, size: ResolvedSize) -> Self {
        Self {
            payload,
            mime_type: target.mime_type(),
            file_name: target.suggested_file_name(),
            size,
        }
    }

    /// 以 Data URL 形式输出，供下载触发器直接使用。
    pub fn data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.mime_type,
            general_purpose::STANDARD.encode(&self.payload)
        )
    }
}
