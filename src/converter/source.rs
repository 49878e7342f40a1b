//! # 数据源与中间模型
//!
//! ## 设计思路
//!
//! 将“外部输入类型”和“流水线中间结果”解耦：
//! - `InputSource` 表示外部来源语义
//! - `SourceFormat` 表示识别后的源格式（SVG 或三种位图）
//! - `RawImageData` 表示已加载但未解码的字节
//! - `ConversionRequest` 是单次转换的完整请求

use std::path::PathBuf;

use super::dimension::{IntrinsicSize, SizeSpec};
use super::output::TargetFormat;

/// 图片输入来源。
#[derive(Debug, Clone)]
pub enum InputSource {
    /// 内存中的原始字节。
    Bytes(Vec<u8>),
    /// Base64（支持 Data URL 与纯 Base64 字符串）。
    Base64(String),
    /// 本地文件路径来源。
    FilePath(PathBuf),
}

/// 识别后的源格式。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Svg,
    Png,
    Jpeg,
    WebP,
}

impl SourceFormat {
    /// 按 MIME 类型识别，忽略大小写与参数（如 `; charset=utf-8`）。
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        match essence.as_str() {
            "image/svg+xml" => Some(Self::Svg),
            "image/png" => Some(Self::Png),
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/webp" => Some(Self::WebP),
            _ => None,
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

    pub fn is_vector(self) -> bool {
        matches!(self, Self::Svg)
    }

    /// 对应的 `image` 解码格式；SVG 没有位图解码器。
    pub(crate) fn image_format(self) -> Option<image::ImageFormat> {
        match self {
            Self::Svg => None,
            Self::Png => Some(image::ImageFormat::Png),
            Self::Jpeg => Some(image::ImageFormat::Jpeg),
            Self::WebP => Some(image::ImageFormat::WebP),
        }
    }
}

/// 加载阶段输出：原始字节与来源标识。
#[derive(Debug)]
pub(crate) struct RawImageData {
    /// 原始图片字节。
    pub(crate) bytes: Vec<u8>,
    /// Data URL 自带的 MIME 类型（若有）。
    pub(crate) embedded_mime: Option<String>,
    /// 来源提示（用于日志与诊断）。
    pub(crate) source_hint: &'static str,
}

/// 单次转换请求。
///
/// `intrinsic_size` 缺省时由引擎自行探测（位图读文件头，SVG 读属性）。
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    pub input: Option<InputSource>,
    pub source_mime: Option<String>,
    pub intrinsic_size: Option<IntrinsicSize>,
    pub target: TargetFormat,
    pub size: SizeSpec,
}

impl ConversionRequest {
    pub fn new(input: InputSource, target: TargetFormat, size: SizeSpec) -> Self {
        Self {
            input: Some(input),
            source_mime: None,
            intrinsic_size: None,
            target,
            size,
        }
    }

    pub fn with_source_mime(mut self, mime: impl Into<String>) -> Self {
        self.source_mime = Some(mime.into());
        self
    }

    pub fn with_intrinsic_size(mut self, width: u32, height: u32) -> Self {
        self.intrinsic_size = Some(IntrinsicSize { width, height });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_parsing_ignores_case_and_parameters() {
        assert_eq!(SourceFormat::from_mime("IMAGE/PNG"), Some(SourceFormat::Png));
        assert_eq!(
            SourceFormat::from_mime("image/svg+xml; charset=utf-8"),
            Some(SourceFormat::Svg)
        );
        assert_eq!(SourceFormat::from_mime("image/jpg"), Some(SourceFormat::Jpeg));
        assert_eq!(SourceFormat::from_mime("image/gif"), None);
    }

    #[test]
    fn only_svg_is_vector() {
        assert!(SourceFormat::Svg.is_vector());
        assert!(!SourceFormat::WebP.is_vector());
        assert!(SourceFormat::Svg.image_format().is_none());
    }
}
