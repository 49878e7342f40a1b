//! # 位图包装模块
//!
//! 位图 → SVG 不做像素转换：生成一个最小 SVG 容器，
//! 以内嵌 Data URL 的 `<image>` 引用原始位图字节，不解码位图。

use std::io::Cursor;

use base64::{Engine as _, engine::general_purpose};
use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, Event};

use super::ConvertError;
use super::dimension::ResolvedSize;
use super::source::SourceFormat;

const SVG_NAMESPACE: &str = "http://www.w3.org/2000/svg";

/// 生成包装 SVG 文本。
pub fn wrap_raster(
    payload: &[u8],
    format: SourceFormat,
    size: ResolvedSize,
) -> Result<String, ConvertError> {
    let width = size.width.to_string();
    let height = size.height.to_string();
    let href = format!(
        "data:{};base64,{}",
        format.mime_type(),
        general_purpose::STANDARD.encode(payload)
    );

    let mut root = BytesStart::new("svg");
    root.push_attribute(("xmlns", SVG_NAMESPACE));
    root.push_attribute(("width", width.as_str()));
    root.push_attribute(("height", height.as_str()));

    let mut image = BytesStart::new("image");
    image.push_attribute(("href", href.as_str()));
    image.push_attribute(("width", width.as_str()));
    image.push_attribute(("height", height.as_str()));

    let mut writer = Writer::new(Cursor::new(Vec::with_capacity(href.len() + 256)));
    for event in [
        Event::Start(root),
        Event::Empty(image),
        Event::End(BytesEnd::new("svg")),
    ] {
        writer
            .write_event(event)
            .map_err(|e| ConvertError::EncodeFailed(format!("SVG 写出失败：{}", e)))?;
    }

    String::from_utf8(writer.into_inner().into_inner())
        .map_err(|e| ConvertError::EncodeFailed(format!("SVG 输出不是 UTF-8：{}", e)))
}
