//! # SVG 文档处理模块
//!
//! ## 设计思路
//!
//! SVG 按文本事件流处理：只改写根 `<svg>` 元素的 `width` / `height` / `viewBox`，
//! 其余内容（声明、注释、子元素）原样透传，不做 DOM 级重建。
//!
//! ## 实现思路
//!
//! - `quick-xml` 读取事件并写回同一事件，保证非根内容逐字节不变。
//! - 长度属性拆为“数值 + 单位”，缩放时保留单位。
//! - viewBox 只更新宽高，偏移量（minX / minY）保持不变。

use std::borrow::Cow;
use std::fmt;
use std::io::Cursor;

use once_cell::sync::Lazy;
use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};
use regex::Regex;

use super::ConvertError;
use super::dimension::{IntrinsicSize, ResolvedSize};

/// SVG 长度：数值 + 可选单位（`px` / `mm` / `%` ...）。
static LENGTH_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([+-]?(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?)\s*([A-Za-z%]*)\s*$").unwrap()
});

/// 改写目标。宽高可单独设置；二者都缺省时才使用缩放倍数。
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RescaleTarget {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub scale: Option<f64>,
}

impl From<ResolvedSize> for RescaleTarget {
    fn from(size: ResolvedSize) -> Self {
        Self {
            width: Some(size.width),
            height: Some(size.height),
            scale: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Length {
    value: f64,
    unit: String,
}

impl Length {
    fn parse(raw: &str) -> Option<Self> {
        let caps = LENGTH_PATTERN.captures(raw)?;
        let value = caps.get(1)?.as_str().parse::<f64>().ok()?;
        Some(Self {
            value,
            unit: caps.get(2).map_or("", |m| m.as_str()).to_string(),
        })
    }

    /// 绝对单位按 CSS 96 dpi 换算为像素；`%` / `em` 等相对单位无法换算。
    fn as_pixels(&self) -> Option<f64> {
        let per_unit = match self.unit.to_ascii_lowercase().as_str() {
            "" | "px" => 1.0,
            "in" => 96.0,
            "cm" => 96.0 / 2.54,
            "mm" => 96.0 / 25.4,
            "pt" => 4.0 / 3.0,
            "pc" => 16.0,
            _ => return None,
        };
        Some(self.value * per_unit)
    }
}

impl fmt::Display for Length {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", format_number(self.value), self.unit)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ViewBox {
    min_x: f64,
    min_y: f64,
    width: f64,
    height: f64,
}

impl ViewBox {
    /// 四个数字，空白或逗号分隔。
    fn parse(raw: &str) -> Option<Self> {
        let numbers = raw
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|part| !part.is_empty())
            .map(|part| part.parse::<f64>().ok())
            .collect::<Option<Vec<_>>>()?;

        match numbers.as_slice() {
            &[min_x, min_y, width, height] => Some(Self {
                min_x,
                min_y,
                width,
                height,
            }),
            _ => None,
        }
    }
}

impl fmt::Display for ViewBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            format_number(self.min_x),
            format_number(self.min_y),
            format_number(self.width),
            format_number(self.height)
        )
    }
}

/// 根元素属性（保持原有顺序）。
#[derive(Debug, Default)]
struct RootAttributes {
    entries: Vec<(String, String)>,
}

impl RootAttributes {
    fn from_element(elem: &BytesStart<'_>, reader: &Reader<&[u8]>) -> Result<Self, ConvertError> {
        let mut entries = Vec::new();
        for attr in elem.attributes() {
            let attr = attr.map_err(|e| malformed(format!("属性解析失败：{}", e)))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr
                .decode_and_unescape_value(reader.decoder())
                .map_err(|e| malformed(format!("属性值解析失败：{}", e)))?;
            entries.push((key, value.into_owned()));
        }
        Ok(Self { entries })
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn set(&mut self, key: &str, value: String) {
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key.to_string(), value)),
        }
    }

    fn into_element(self, name: String) -> BytesStart<'static> {
        let mut elem = BytesStart::new(name);
        for (key, value) in &self.entries {
            elem.push_attribute((key.as_str(), value.as_str()));
        }
        elem
    }
}

fn malformed(message: impl Into<String>) -> ConvertError {
    ConvertError::MalformedVectorDocument(message.into())
}

/// 整数值不带小数点输出（`200` 而不是 `200.0`）。
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

/// 将原始字节视为 UTF-8 SVG 文本。
pub(crate) fn document_text(bytes: &[u8]) -> Result<&str, ConvertError> {
    std::str::from_utf8(bytes).map_err(|e| malformed(format!("SVG 不是合法的 UTF-8：{}", e)))
}

fn is_svg_root(elem: &BytesStart<'_>) -> bool {
    elem.local_name().as_ref() == b"svg"
}

/// 读取根 `<svg>` 元素属性。
fn read_root_attributes(svg: &str) -> Result<RootAttributes, ConvertError> {
    let mut reader = Reader::from_str(svg);

    loop {
        match reader.read_event() {
            Ok(Event::Start(elem)) | Ok(Event::Empty(elem)) => {
                if !is_svg_root(&elem) {
                    return Err(malformed("根元素不是 <svg>"));
                }
                return RootAttributes::from_element(&elem, &reader);
            }
            Ok(Event::Eof) => return Err(malformed("缺少 <svg> 根元素")),
            Ok(_) => {}
            Err(e) => {
                return Err(malformed(format!(
                    "XML 解析失败（位置 {}）：{}",
                    reader.error_position(),
                    e
                )));
            }
        }
    }
}

/// 逐事件复制文档，仅把根元素交给 `edit` 改写。
fn rewrite_root<F>(svg: &str, edit: F) -> Result<String, ConvertError>
where
    F: FnOnce(&mut RootAttributes) -> Result<(), ConvertError>,
{
    let mut reader = Reader::from_str(svg);
    let mut writer = Writer::new(Cursor::new(Vec::with_capacity(svg.len() + 64)));
    let mut edit = Some(edit);

    loop {
        let event = match reader.read_event() {
            Ok(Event::Eof) => break,
            Ok(event) => event,
            Err(e) => {
                return Err(malformed(format!(
                    "XML 解析失败（位置 {}）：{}",
                    reader.error_position(),
                    e
                )));
            }
        };

        let event = match (event, edit.take()) {
            (Event::Start(elem), Some(edit)) => Event::Start(rewrite_element(&elem, &reader, edit)?),
            (Event::Empty(elem), Some(edit)) => Event::Empty(rewrite_element(&elem, &reader, edit)?),
            (event, pending) => {
                edit = pending;
                event
            }
        };

        writer
            .write_event(event)
            .map_err(|e| ConvertError::EncodeFailed(format!("SVG 写出失败：{}", e)))?;
    }

    if edit.is_some() {
        return Err(malformed("缺少 <svg> 根元素"));
    }

    String::from_utf8(writer.into_inner().into_inner())
        .map_err(|e| ConvertError::EncodeFailed(format!("SVG 输出不是 UTF-8：{}", e)))
}

fn rewrite_element<F>(
    elem: &BytesStart<'_>,
    reader: &Reader<&[u8]>,
    edit: F,
) -> Result<BytesStart<'static>, ConvertError>
where
    F: FnOnce(&mut RootAttributes) -> Result<(), ConvertError>,
{
    if !is_svg_root(elem) {
        return Err(malformed("根元素不是 <svg>"));
    }

    let name = String::from_utf8_lossy(elem.name().as_ref()).into_owned();
    let mut attrs = RootAttributes::from_element(elem, reader)?;
    edit(&mut attrs)?;
    Ok(attrs.into_element(name))
}

/// 改写根元素尺寸与 viewBox，返回重新序列化的文档。
///
/// # 示例
/// ```rust
/// use image_format_converter::{rescale_document, RescaleTarget};
///
/// let svg = r#"<svg width="100" height="50" viewBox="0 0 100 50"/>"#;
/// let target = RescaleTarget { width: Some(200), height: Some(100), scale: None };
/// let out = rescale_document(svg, &target)?;
/// assert_eq!(out, r#"<svg width="200" height="100" viewBox="0 0 200 100"/>"#);
/// # Ok::<(), image_format_converter::ConvertError>(())
/// ```
pub fn rescale_document(svg: &str, target: &RescaleTarget) -> Result<String, ConvertError> {
    rewrite_root(svg, |attrs| {
        if let Some(width) = target.width {
            attrs.set("width", width.to_string());
        }
        if let Some(height) = target.height {
            attrs.set("height", height.to_string());
        }

        if target.width.is_none() && target.height.is_none() {
            if let Some(scale) = target.scale {
                if !scale.is_finite() || scale <= 0.0 {
                    return Err(ConvertError::InvalidSizeSpec(format!(
                        "缩放倍数必须为正数：{}",
                        scale
                    )));
                }
                for key in ["width", "height"] {
                    let Some(raw) = attrs.get(key).map(str::to_owned) else {
                        continue;
                    };
                    let mut length = Length::parse(&raw)
                        .ok_or_else(|| malformed(format!("{} 不是合法长度：{:?}", key, raw)))?;
                    length.value *= scale;
                    attrs.set(key, length.to_string());
                }
            }
        }

        if let Some(raw) = attrs.get("viewBox").map(str::to_owned) {
            let original = ViewBox::parse(&raw)
                .ok_or_else(|| malformed(format!("viewBox 格式错误：{:?}", raw)))?;
            let updated = ViewBox {
                width: target.width.map_or(original.width, f64::from),
                height: target.height.map_or(original.height, f64::from),
                ..original
            };
            attrs.set("viewBox", updated.to_string());
        }

        Ok(())
    })
}

/// 读取 SVG 的原始尺寸：width/height 属性 → viewBox 宽高 → 默认值。
///
/// 只给出一个属性时，另一边按 viewBox 宽高比推算。
pub fn probe_intrinsic_size(svg: &str, fallback: IntrinsicSize) -> Result<IntrinsicSize, ConvertError> {
    let attrs = read_root_attributes(svg)?;

    let pixels = |key: &str| {
        attrs
            .get(key)
            .and_then(Length::parse)
            .and_then(|length| length.as_pixels())
    };
    let view_box = attrs
        .get("viewBox")
        .and_then(ViewBox::parse)
        .filter(|vb| vb.width > 0.0 && vb.height > 0.0);

    let (width, height) = match (pixels("width"), pixels("height"), view_box) {
        (Some(width), None, Some(vb)) => (Some(width), Some(width * vb.height / vb.width)),
        (None, Some(height), Some(vb)) => (Some(height * vb.width / vb.height), Some(height)),
        (width, height, vb) => (
            width.or(vb.map(|vb| vb.width)),
            height.or(vb.map(|vb| vb.height)),
        ),
    };

    Ok(IntrinsicSize {
        width: width.map_or(fallback.width, to_pixel_count),
        height: height.map_or(fallback.height, to_pixel_count),
    })
}

fn to_pixel_count(value: f64) -> u32 {
    // `as` 对超范围与 NaN 做饱和转换
    value.round().max(0.0) as u32
}

/// 日志用的根元素摘要。
pub(crate) fn describe_root(svg: &str) -> Cow<'static, str> {
    match read_root_attributes(svg) {
        Ok(attrs) => Cow::Owned(format!(
            "width={:?} height={:?} viewBox={:?}",
            attrs.get("width"),
            attrs.get("height"),
            attrs.get("viewBox")
        )),
        Err(_) => Cow::Borrowed("<unparsable>"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEFAULT_SIZE: IntrinsicSize = IntrinsicSize {
        width: 300,
        height: 150,
    };

    fn root_attr(svg: &str, key: &str) -> Option<String> {
        read_root_attributes(svg)
            .expect("root should parse")
            .get(key)
            .map(str::to_owned)
    }

    #[test]
    fn resolved_size_rewrites_dimensions_and_view_box() {
        let svg = r#"<svg xmlns="http://www.w3.org/2000/svg" width="100" height="50" viewBox="0 0 100 50"><rect width="10" height="10"/></svg>"#;
        let out = rescale_document(svg, &ResolvedSize { width: 200, height: 100 }.into())
            .expect("rescale failed");

        assert_eq!(root_attr(&out, "width").as_deref(), Some("200"));
        assert_eq!(root_attr(&out, "height").as_deref(), Some("100"));
        assert_eq!(root_attr(&out, "viewBox").as_deref(), Some("0 0 200 100"));
        assert!(out.contains(r#"<rect width="10" height="10"/>"#));
    }

    #[test]
    fn rescale_is_idempotent() {
        let svg = r#"<svg width="100" height="50" viewBox="-5 7.5 100 50"></svg>"#;
        let target = RescaleTarget::from(ResolvedSize { width: 320, height: 160 });

        let once = rescale_document(svg, &target).expect("first rescale failed");
        let twice = rescale_document(&once, &target).expect("second rescale failed");

        assert_eq!(once, twice);
    }

    #[test]
    fn view_box_offset_is_preserved() {
        let svg = r#"<svg width="10" height="10" viewBox="-5,7.5 10,10"/>"#;
        let out = rescale_document(svg, &ResolvedSize { width: 40, height: 30 }.into())
            .expect("rescale failed");

        assert_eq!(root_attr(&out, "viewBox").as_deref(), Some("-5 7.5 40 30"));
    }

    #[test]
    fn single_axis_keeps_other_view_box_extent() {
        let svg = r#"<svg width="100" height="50" viewBox="0 0 100 50"/>"#;
        let target = RescaleTarget {
            width: Some(400),
            ..RescaleTarget::default()
        };
        let out = rescale_document(svg, &target).expect("rescale failed");

        assert_eq!(root_attr(&out, "width").as_deref(), Some("400"));
        assert_eq!(root_attr(&out, "height").as_deref(), Some("50"));
        assert_eq!(root_attr(&out, "viewBox").as_deref(), Some("0 0 400 50"));
    }

    #[test]
    fn scale_only_multiplies_attributes_and_keeps_units() {
        let svg = r#"<svg width="10.5mm" height="4" viewBox="0 0 21 8"/>"#;
        let target = RescaleTarget {
            scale: Some(2.0),
            ..RescaleTarget::default()
        };
        let out = rescale_document(svg, &target).expect("rescale failed");

        assert_eq!(root_attr(&out, "width").as_deref(), Some("21mm"));
        assert_eq!(root_attr(&out, "height").as_deref(), Some("8"));
        assert_eq!(root_attr(&out, "viewBox").as_deref(), Some("0 0 21 8"));
    }

    #[test]
    fn missing_attributes_are_added() {
        let out = rescale_document(
            r#"<svg xmlns="http://www.w3.org/2000/svg"></svg>"#,
            &ResolvedSize { width: 8, height: 6 }.into(),
        )
        .expect("rescale failed");

        assert_eq!(root_attr(&out, "width").as_deref(), Some("8"));
        assert_eq!(root_attr(&out, "viewBox"), None);
    }

    #[test]
    fn prolog_and_comments_pass_through() {
        let svg = "<?xml version=\"1.0\"?>\n<!-- logo -->\n<svg width=\"1\" height=\"1\"><title>a &amp; b</title></svg>";
        let out = rescale_document(svg, &ResolvedSize { width: 2, height: 2 }.into())
            .expect("rescale failed");

        assert!(out.starts_with("<?xml version=\"1.0\"?>\n<!-- logo -->\n<svg"));
        assert!(out.contains("<title>a &amp; b</title>"));
    }

    #[test]
    fn non_svg_root_is_malformed() {
        let result = rescale_document("<html><svg/></html>", &RescaleTarget::default());
        assert!(matches!(result, Err(ConvertError::MalformedVectorDocument(_))));
    }

    #[test]
    fn empty_document_is_malformed() {
        let result = rescale_document("   ", &RescaleTarget::default());
        assert!(matches!(result, Err(ConvertError::MalformedVectorDocument(_))));
    }

    #[test]
    fn broken_view_box_is_malformed() {
        let result = rescale_document(
            r#"<svg viewBox="0 0 auto"/>"#,
            &ResolvedSize { width: 2, height: 2 }.into(),
        );
        assert!(matches!(result, Err(ConvertError::MalformedVectorDocument(_))));
    }

    #[test]
    fn intrinsic_size_prefers_attributes_then_view_box_then_default() {
        let size = probe_intrinsic_size(r#"<svg width="100px" height="50"/>"#, DEFAULT_SIZE)
            .expect("size read failed");
        assert_eq!(size, IntrinsicSize { width: 100, height: 50 });

        let size = probe_intrinsic_size(r#"<svg width="50%" viewBox="0 0 64 32"/>"#, DEFAULT_SIZE)
            .expect("size read failed");
        assert_eq!(size, IntrinsicSize { width: 64, height: 32 });

        let size = probe_intrinsic_size("<svg/>", DEFAULT_SIZE).expect("size read failed");
        assert_eq!(size, DEFAULT_SIZE);
    }

    #[test]
    fn absolute_units_convert_at_96_dpi() {
        let size = probe_intrinsic_size(r#"<svg width="1in" height="2.54cm"/>"#, DEFAULT_SIZE)
            .expect("size read failed");
        assert_eq!(size, IntrinsicSize { width: 96, height: 96 });

        let size = probe_intrinsic_size(r#"<svg width="10mm" height="5mm" viewBox="0 0 100 50"/>"#, DEFAULT_SIZE)
            .expect("size read failed");
        assert_eq!(size, IntrinsicSize { width: 38, height: 19 });

        let size = probe_intrinsic_size(r#"<svg width="72pt" height="6pc"/>"#, DEFAULT_SIZE)
            .expect("size read failed");
        assert_eq!(size, IntrinsicSize { width: 96, height: 96 });
    }

    #[test]
    fn single_attribute_follows_view_box_ratio() {
        let size = probe_intrinsic_size(r#"<svg width="100" viewBox="0 0 10 5"/>"#, DEFAULT_SIZE)
            .expect("size read failed");
        assert_eq!(size, IntrinsicSize { width: 100, height: 50 });

        let size = probe_intrinsic_size(r#"<svg height="1in" viewBox="0 0 30 10"/>"#, DEFAULT_SIZE)
            .expect("size read failed");
        assert_eq!(size, IntrinsicSize { width: 288, height: 96 });
    }

    #[test]
    fn single_attribute_without_view_box_uses_default_for_other_axis() {
        let size = probe_intrinsic_size(r#"<svg width="40"/>"#, DEFAULT_SIZE).expect("size read failed");
        assert_eq!(size, IntrinsicSize { width: 40, height: DEFAULT_SIZE.height });
    }

    #[test]
    fn numbers_render_without_trailing_zero() {
        assert_eq!(format_number(200.0), "200");
        assert_eq!(format_number(7.5), "7.5");
        assert_eq!(format_number(-5.0), "-5");
    }
}
