//! # 错误模型模块
//!
//! ## 设计思路
//!
//! 使用单一错误枚举承载转换链路中的所有错误来源，避免字符串拼接式错误处理。
//! 通过 `thiserror` 保持人类可读错误，同时让调用侧可按分支匹配。
//!
//! 所有错误都是终止性的：不重试、不回退尺寸、不返回部分结果。

use serde::Serialize;

use super::handler::ConversionStage;

/// 转换链路统一错误类型。
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    /// 请求未携带任何输入内容（或内容为空）。
    #[error("缺少输入文件")]
    MissingInputFile,

    /// 既没有显式宽高，也没有缩放倍数。
    #[error("缺少尺寸参数：至少提供宽度、高度或缩放倍数之一")]
    MissingSizeInput,

    /// 尺寸参数本身不合法（零值、负数缩放、非有限数等）。
    #[error("尺寸参数无效：{0}")]
    InvalidSizeSpec(String),

    /// 原始宽高含 0，无法计算宽高比。
    #[error("原始尺寸 {width}x{height} 无法计算宽高比")]
    DegenerateAspectRatio { width: u32, height: u32 },

    /// SVG 文档无法解析或缺少根 `<svg>` 元素。
    #[error("SVG 文档格式错误：{0}")]
    MalformedVectorDocument(String),

    /// 位图无法识别或解码失败。
    #[error("位图无法解码：{0}")]
    UnsupportedOrCorruptRaster(String),

    /// 输入内容本身不合法（Base64 / Data URL 损坏、类型无法识别）。
    #[error("输入无效：{0}")]
    InvalidInput(String),

    #[error("文件错误：{0}")]
    FileSystem(String),

    #[error("资源限制：{0}")]
    ResourceLimit(String),

    #[error("编码失败：{0}")]
    EncodeFailed(String),

    /// 后台解码线程异常退出。
    #[error("转换任务异常：{0}")]
    Worker(String),
}

impl ConvertError {
    /// 稳定错误码，供前端按码展示提示文案。
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingInputFile => "MISSING_INPUT_FILE",
            Self::MissingSizeInput => "MISSING_SIZE_INPUT",
            Self::InvalidSizeSpec(_) => "INVALID_SIZE_SPEC",
            Self::DegenerateAspectRatio { .. } => "DEGENERATE_ASPECT_RATIO",
            Self::MalformedVectorDocument(_) => "MALFORMED_VECTOR_DOCUMENT",
            Self::UnsupportedOrCorruptRaster(_) => "UNSUPPORTED_OR_CORRUPT_RASTER",
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::FileSystem(_) => "FILE_SYSTEM",
            Self::ResourceLimit(_) => "RESOURCE_LIMIT",
            Self::EncodeFailed(_) => "ENCODE_FAILED",
            Self::Worker(_) => "WORKER",
        }
    }
}

/// 引擎返回的失败：错误本身加上发生时所处的阶段。
///
/// 同一种错误可能出现在不同阶段（例如 SVG 解析既发生在尺寸探测，也发生在改写），
/// 阶段以引擎的状态机为准。
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct ConversionFailure {
    pub stage: ConversionStage,
    #[source]
    pub error: ConvertError,
}

impl ConversionFailure {
    pub fn code(&self) -> &'static str {
        self.error.code()
    }
}

/// 对外（UI 胶水层）返回的结构化错误。
#[derive(Debug, Clone, Serialize)]
pub struct ErrorReport {
    pub code: &'static str,
    pub stage: &'static str,
    pub message: String,
}

impl From<ConversionFailure> for ErrorReport {
    fn from(failure: ConversionFailure) -> Self {
        Self {
            code: failure.code(),
            stage: failure.stage.as_str(),
            message: failure.error.to_string(),
        }
    }
}

impl From<ConvertError> for String {
    fn from(error: ConvertError) -> Self {
        error.to_string()
    }
}
