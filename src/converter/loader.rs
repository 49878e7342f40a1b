//! # 加载与校验模块
//!
//! ## 设计思路
//!
//! 统一处理不同来源（内存字节 / Base64 / 本地文件）的原始字节加载，并在“尽可能早”的阶段执行输入校验。
//! 目标是尽快失败，减少不必要内存与 CPU 消耗。
//!
//! ## 实现思路
//!
//! - 字节：非空 + 体积校验。
//! - Base64：Data URL 解析（保留其 MIME）+ 解码前体积估算 + 解码后体积限制。
//! - 文件：存在性 + metadata 体积限制 + 读取（异步版本使用 `tokio::fs`）。
//! - 源格式识别：优先声明的 MIME，其次文件签名（`infer`），最后 SVG 文本探测。

use base64::{Engine as _, engine::general_purpose};
use std::path::Path;

use super::source::{InputSource, RawImageData, SourceFormat};
use super::{ConvertConfig, ConvertError};

/// 只在前 4KB 内查找 `<svg`，避免对大文件做全量扫描。
const SVG_SNIFF_BYTES: usize = 4096;

/// 同步加载（阻塞读取文件）。
pub(crate) fn load_blocking(
    source: InputSource,
    config: &ConvertConfig,
) -> Result<RawImageData, ConvertError> {
    match source {
        InputSource::Bytes(bytes) => load_from_bytes(bytes, config),
        InputSource::Base64(data) => load_from_base64(&data, config),
        InputSource::FilePath(path) => {
            log::info!("📁 开始读取本地图片 - 路径: {}", path.display());
            check_file_size(&path, config)?;
            let bytes = std::fs::read(&path)
                .map_err(|e| ConvertError::FileSystem(format!("无法读取图片文件：{}", e)))?;
            finish_file_load(bytes, config)
        }
    }
}

/// 异步加载：文件读取是流水线的第一个挂起点。
pub(crate) async fn load(
    source: InputSource,
    config: &ConvertConfig,
) -> Result<RawImageData, ConvertError> {
    match source {
        InputSource::FilePath(path) => {
            log::info!("📁 开始读取本地图片 - 路径: {}", path.display());
            check_file_size(&path, config)?;
            let bytes = tokio::fs::read(&path)
                .await
                .map_err(|e| ConvertError::FileSystem(format!("无法读取图片文件：{}", e)))?;
            finish_file_load(bytes, config)
        }
        other => load_blocking(other, config),
    }
}

fn load_from_bytes(bytes: Vec<u8>, config: &ConvertConfig) -> Result<RawImageData, ConvertError> {
    if bytes.is_empty() {
        return Err(ConvertError::MissingInputFile);
    }
    check_payload_len(bytes.len() as u64, config)?;

    Ok(RawImageData {
        bytes,
        embedded_mime: None,
        source_hint: "bytes",
    })
}

fn load_from_base64(data: &str, config: &ConvertConfig) -> Result<RawImageData, ConvertError> {
    log::info!("📝 开始处理 base64 图片");

    let (embedded_mime, bytes) = parse_base64_with_limit(data, config.max_file_size)?;
    if bytes.is_empty() {
        return Err(ConvertError::MissingInputFile);
    }
    check_payload_len(bytes.len() as u64, config)?;

    Ok(RawImageData {
        bytes,
        embedded_mime,
        source_hint: "base64",
    })
}

fn check_file_size(path: &Path, config: &ConvertConfig) -> Result<(), ConvertError> {
    if !path.exists() {
        return Err(ConvertError::FileSystem(format!(
            "文件不存在：{}",
            path.display()
        )));
    }

    let metadata = std::fs::metadata(path)
        .map_err(|e| ConvertError::FileSystem(format!("无法读取文件信息：{}", e)))?;
    check_payload_len(metadata.len(), config)
}

fn finish_file_load(bytes: Vec<u8>, config: &ConvertConfig) -> Result<RawImageData, ConvertError> {
    if bytes.is_empty() {
        return Err(ConvertError::MissingInputFile);
    }
    check_payload_len(bytes.len() as u64, config)?;

    Ok(RawImageData {
        bytes,
        embedded_mime: None,
        source_hint: "file",
    })
}

fn check_payload_len(len: u64, config: &ConvertConfig) -> Result<(), ConvertError> {
    if len > config.max_file_size {
        return Err(ConvertError::ResourceLimit(format!(
            "文件过大：{:.2} MB（限制：{:.2} MB）",
            len as f64 / 1024.0 / 1024.0,
            config.max_file_size as f64 / 1024.0 / 1024.0
        )));
    }
    Ok(())
}

fn estimate_base64_decoded_upper_bound_len(base64_data: &str) -> Result<u64, ConvertError> {
    let len = base64_data.trim().len() as u64;
    let groups = len
        .checked_add(3)
        .ok_or_else(|| ConvertError::ResourceLimit("Base64 输入长度溢出".to_string()))?
        / 4;

    groups
        .checked_mul(3)
        .ok_or_else(|| ConvertError::ResourceLimit("Base64 解码体积估算溢出".to_string()))
}

/// 解析 Data URL 或纯 Base64，返回 `(Data URL 中的 MIME, 解码字节)`。
pub(crate) fn parse_base64_with_limit(
    data: &str,
    max_file_size: u64,
) -> Result<(Option<String>, Vec<u8>), ConvertError> {
    let normalized = data.trim();

    let (mime, base64_data) = match normalized.strip_prefix("data:") {
        Some(rest) => {
            let marker = rest
                .find(";base64,")
                .ok_or_else(|| ConvertError::InvalidInput("缺少 base64 标记".to_string()))?;
            let mime = rest[..marker].trim();
            let mime = (!mime.is_empty()).then(|| mime.to_string());
            (mime, &rest[marker + 8..])
        }
        None => (None, normalized),
    };

    let estimated_len = estimate_base64_decoded_upper_bound_len(base64_data)?;
    if estimated_len > max_file_size {
        return Err(ConvertError::ResourceLimit(format!(
            "Base64 预计解码体积过大：{:.2} MB（限制：{:.2} MB）",
            estimated_len as f64 / 1024.0 / 1024.0,
            max_file_size as f64 / 1024.0 / 1024.0
        )));
    }

    let bytes = general_purpose::STANDARD
        .decode(base64_data.trim())
        .map_err(|e| ConvertError::InvalidInput(format!("Base64 解码失败：{}", e)))?;

    Ok((mime, bytes))
}

/// 识别源格式：声明的 MIME → 文件签名 → SVG 文本探测。
pub(crate) fn detect_source_format(
    bytes: &[u8],
    declared_mime: Option<&str>,
) -> Result<SourceFormat, ConvertError> {
    if let Some(mime) = declared_mime {
        match SourceFormat::from_mime(mime) {
            Some(format) => return Ok(format),
            None => log::warn!("⚠️ 无法识别声明的类型 {:?}，改用内容探测", mime),
        }
    }

    let kind = infer::get(bytes);
    if let Some(kind) = kind.filter(|k| k.matcher_type() == infer::MatcherType::Image) {
        return SourceFormat::from_mime(kind.mime_type()).ok_or_else(|| {
            ConvertError::UnsupportedOrCorruptRaster(format!(
                "不支持的图片格式：{}",
                kind.mime_type()
            ))
        });
    }

    // `<?xml` 开头的 SVG 会被签名识别为 text/xml，先做文本探测
    if looks_like_svg(bytes) {
        return Ok(SourceFormat::Svg);
    }

    match kind {
        Some(kind) => Err(ConvertError::InvalidInput(format!(
            "文件签名不是图片类型：{}",
            kind.mime_type()
        ))),
        None => Err(ConvertError::InvalidInput("无法识别图片类型".to_string())),
    }
}

fn looks_like_svg(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(SVG_SNIFF_BYTES)];
    String::from_utf8_lossy(head).contains("<svg")
}
