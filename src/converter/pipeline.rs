//! # 解码与变换流水线模块
//!
//! ## 设计思路
//!
//! 将“字节 → 像素面 → 目标格式字节”的过程集中管理，并在关键节点增加资源上限控制。
//! 优先做尺寸检查，再进行完整解码，降低恶意输入触发高内存开销的风险。
//!
//! ## 实现思路
//!
//! 1. 读取 header 尺寸
//! 2. 按像素 / 内存上限快速拒绝（源图与目标尺寸都要检查）
//! 3. 完整解码为 RGBA 像素面
//! 4. 拉伸到目标尺寸（不保持宽高比、不留边）
//! 5. 按目标格式编码

use std::io::Cursor;

use fast_image_resize as fr;
use image::buffer::ConvertBuffer;
use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageBuffer, ImageEncoder, ImageFormat, ImageReader, Rgba, RgbImage, RgbaImage};

use super::dimension::ResolvedSize;
use super::output::TargetFormat;
use super::source::SourceFormat;
use super::{ConvertConfig, ConvertError};

/// 位图编码方式。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RasterEncoding {
    Png,
    Jpeg,
    WebP,
}

impl RasterEncoding {
    /// 目标为 WebP 时编码 WebP；`jpeg` 编码 JPEG；其余一律 PNG。
    pub(crate) fn for_target(target: TargetFormat) -> Self {
        match target {
            TargetFormat::WebP => Self::WebP,
            TargetFormat::Jpeg => Self::Jpeg,
            TargetFormat::Png | TargetFormat::Svg => Self::Png,
        }
    }
}

/// 位图转码主入口：解码 → 拉伸 → 编码。
pub(crate) fn transcode(
    bytes: &[u8],
    source: SourceFormat,
    target: TargetFormat,
    size: ResolvedSize,
    config: &ConvertConfig,
) -> Result<Vec<u8>, ConvertError> {
    validate_pixel_limits(config, size.width, size.height)?;
    validate_decoded_memory_limits(config, size.width, size.height)?;

    let surface = decode_raster(bytes, source, config)?;
    let (raw_width, raw_height) = surface.dimensions();
    let surface = resize_surface(surface, size, config);
    let encoding = RasterEncoding::for_target(target);
    let encoded = encode_surface(&surface, encoding, config)?;

    log::info!(
        "✅ 位图转码成功 - {:?} {}x{} -> {:?} {}x{} ({} KB)",
        source,
        raw_width,
        raw_height,
        encoding,
        size.width,
        size.height,
        encoded.len() / 1024
    );

    Ok(encoded)
}

/// 仅通过内存中的图片头信息读取宽高。
///
/// 用于在完整解码前做像素限制检查，也用于位图包装时获取原始尺寸。
pub(crate) fn inspect_dimensions_from_memory(
    bytes: &[u8],
    source: SourceFormat,
) -> Result<(u32, u32), ConvertError> {
    open_reader(bytes, source)?
        .into_dimensions()
        .map_err(|e| ConvertError::UnsupportedOrCorruptRaster(format!("无法读取图片尺寸：{}", e)))
}

fn open_reader(bytes: &[u8], source: SourceFormat) -> Result<ImageReader<Cursor<&[u8]>>, ConvertError> {
    let cursor = Cursor::new(bytes);
    match source.image_format() {
        Some(format) => Ok(ImageReader::with_format(cursor, format)),
        None => ImageReader::new(cursor)
            .with_guessed_format()
            .map_err(|e| ConvertError::UnsupportedOrCorruptRaster(format!("无法识别图片格式：{}", e))),
    }
}

/// 解码为 RGBA 像素面（解码完成后才会进入编码）。
pub(crate) fn decode_raster(
    bytes: &[u8],
    source: SourceFormat,
    config: &ConvertConfig,
) -> Result<RgbaImage, ConvertError> {
    let (header_width, header_height) = inspect_dimensions_from_memory(bytes, source)?;
    validate_pixel_limits(config, header_width, header_height)?;
    validate_decoded_memory_limits(config, header_width, header_height)?;

    let decoded = open_reader(bytes, source)?
        .decode()
        .map_err(|e| ConvertError::UnsupportedOrCorruptRaster(format!("图片解码失败：{}", e)))?;

    Ok(decoded.to_rgba8())
}

/// 校验像素数量是否超过配置上限。
pub(crate) fn validate_pixel_limits(
    config: &ConvertConfig,
    width: u32,
    height: u32,
) -> Result<(), ConvertError> {
    let pixels = (width as u64)
        .checked_mul(height as u64)
        .ok_or_else(|| ConvertError::ResourceLimit("图片像素数溢出".to_string()))?;

    if pixels > config.max_decoded_pixels {
        return Err(ConvertError::ResourceLimit(format!(
            "图片像素过大：{} 像素（限制：{} 像素）",
            pixels, config.max_decoded_pixels
        )));
    }

    Ok(())
}

pub(crate) fn validate_decoded_memory_limits(
    config: &ConvertConfig,
    width: u32,
    height: u32,
) -> Result<(), ConvertError> {
    let estimated = (width as u64)
        .checked_mul(height as u64)
        .and_then(|pixels| pixels.checked_mul(4))
        .ok_or_else(|| ConvertError::ResourceLimit("图片解码内存估算溢出".to_string()))?;

    if estimated > config.max_decoded_bytes {
        return Err(ConvertError::ResourceLimit(format!(
            "图片解码预计内存过大：{:.2} MB（限制：{:.2} MB）",
            estimated as f64 / 1024.0 / 1024.0,
            config.max_decoded_bytes as f64 / 1024.0 / 1024.0
        )));
    }

    Ok(())
}

/// 拉伸像素面到目标尺寸；尺寸相同则原样返回。
pub(crate) fn resize_surface(surface: RgbaImage, size: ResolvedSize, config: &ConvertConfig) -> RgbaImage {
    if surface.dimensions() == (size.width, size.height) {
        return surface;
    }

    if !config.fast_resize {
        return image::imageops::resize(
            &surface,
            size.width,
            size.height,
            config.resize_filter.to_image_filter(),
        );
    }

    match resize_with_fast_image_resize(&surface, size, config) {
        Ok(resized) => resized,
        Err(err) => {
            log::warn!(
                "⚠️ fast_image_resize 缩放失败，回退 image::imageops::resize：{}",
                err
            );
            image::imageops::resize(
                &surface,
                size.width,
                size.height,
                config.resize_filter.to_image_filter(),
            )
        }
    }
}

fn resize_with_fast_image_resize(
    surface: &RgbaImage,
    size: ResolvedSize,
    config: &ConvertConfig,
) -> Result<RgbaImage, ConvertError> {
    let (src_width, src_height) = surface.dimensions();

    let src_image = fr::images::Image::from_vec_u8(
        src_width,
        src_height,
        surface.as_raw().clone(),
        fr::PixelType::U8x4,
    )
    .map_err(|e| ConvertError::EncodeFailed(format!("构建源图像缓冲失败：{}", e)))?;

    let mut dst_image = fr::images::Image::new(size.width, size.height, fr::PixelType::U8x4);

    let mut resizer = fr::Resizer::new();
    let options = fr::ResizeOptions::new()
        .resize_alg(fr::ResizeAlg::Convolution(config.resize_filter.to_fast_filter()));

    resizer
        .resize(&src_image, &mut dst_image, Some(&options))
        .map_err(|e| ConvertError::EncodeFailed(format!("fast_image_resize 执行失败：{}", e)))?;

    ImageBuffer::<Rgba<u8>, Vec<u8>>::from_raw(size.width, size.height, dst_image.into_vec())
        .ok_or_else(|| ConvertError::EncodeFailed("fast_image_resize 输出缓冲长度异常".to_string()))
}

/// 将像素面编码为目标格式。JPEG 不含 alpha；WebP 为无损编码。
pub(crate) fn encode_surface(
    surface: &RgbaImage,
    encoding: RasterEncoding,
    config: &ConvertConfig,
) -> Result<Vec<u8>, ConvertError> {
    let mut buffer = Vec::new();

    let result = match encoding {
        RasterEncoding::Png => surface.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png),
        RasterEncoding::WebP => surface.write_to(&mut Cursor::new(&mut buffer), ImageFormat::WebP),
        RasterEncoding::Jpeg => {
            let rgb: RgbImage = surface.convert();
            JpegEncoder::new_with_quality(&mut buffer, config.jpeg_quality).write_image(
                rgb.as_raw(),
                rgb.width(),
                rgb.height(),
                ExtendedColorType::Rgb8,
            )
        }
    };

    result.map_err(|e| ConvertError::EncodeFailed(format!("{:?} 编码失败：{}", encoding, e)))?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::GenericImageView;

    fn create_image_bytes(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
        let img = RgbaImage::from_fn(width, height, |x, y| {
            let r = (x % 255) as u8;
            let g = (y % 255) as u8;
            let b = ((x + y) % 255) as u8;
            Rgba([r, g, b, 255])
        });

        let mut cursor = Cursor::new(Vec::new());
        let written = match format {
            ImageFormat::Jpeg => {
                let rgb: RgbImage = img.convert();
                rgb.write_to(&mut cursor, format)
            }
            _ => img.write_to(&mut cursor, format),
        };
        written.expect("failed to encode test image");
        cursor.into_inner()
    }

    fn decoded_dimensions(bytes: &[u8], format: ImageFormat) -> (u32, u32) {
        image::load_from_memory_with_format(bytes, format)
            .expect("output should decode")
            .dimensions()
    }

    #[test]
    fn png_to_jpeg_is_stretched_to_resolved_size() {
        let png = create_image_bytes(400, 300, ImageFormat::Png);
        let size = ResolvedSize { width: 123, height: 321 };

        let out = transcode(&png, SourceFormat::Png, TargetFormat::Jpeg, size, &ConvertConfig::default())
            .expect("transcode failed");

        assert_eq!(image::guess_format(&out).expect("guess failed"), ImageFormat::Jpeg);
        assert_eq!(decoded_dimensions(&out, ImageFormat::Jpeg), (123, 321));
    }

    #[test]
    fn jpeg_to_webp_encodes_webp() {
        let jpeg = create_image_bytes(64, 48, ImageFormat::Jpeg);
        let size = ResolvedSize { width: 32, height: 24 };

        let out = transcode(&jpeg, SourceFormat::Jpeg, TargetFormat::WebP, size, &ConvertConfig::default())
            .expect("transcode failed");

        assert_eq!(decoded_dimensions(&out, ImageFormat::WebP), (32, 24));
    }

    #[test]
    fn webp_to_png_round_trips_size() {
        let webp = create_image_bytes(20, 10, ImageFormat::WebP);
        let size = ResolvedSize { width: 20, height: 10 };

        let out = transcode(&webp, SourceFormat::WebP, TargetFormat::Png, size, &ConvertConfig::default())
            .expect("transcode failed");

        assert_eq!(decoded_dimensions(&out, ImageFormat::Png), (20, 10));
    }

    #[test]
    fn slow_resize_path_matches_requested_size() {
        let png = create_image_bytes(50, 50, ImageFormat::Png);
        let config = ConvertConfig {
            fast_resize: false,
            ..ConvertConfig::default()
        };

        let out = transcode(&png, SourceFormat::Png, TargetFormat::Png, ResolvedSize { width: 7, height: 90 }, &config)
            .expect("transcode failed");

        assert_eq!(decoded_dimensions(&out, ImageFormat::Png), (7, 90));
    }

    #[test]
    fn corrupt_payload_is_rejected() {
        let result = transcode(
            b"\x89PNG\r\n\x1a\nnot really a png",
            SourceFormat::Png,
            TargetFormat::Jpeg,
            ResolvedSize { width: 10, height: 10 },
            &ConvertConfig::default(),
        );

        assert!(matches!(result, Err(ConvertError::UnsupportedOrCorruptRaster(_))));
    }

    #[test]
    fn stress_rejects_too_many_source_pixels() {
        let config = ConvertConfig {
            max_decoded_pixels: 1_000_000,
            ..ConvertConfig::default()
        };
        let png = create_image_bytes(2000, 2000, ImageFormat::Png);

        let result = decode_raster(&png, SourceFormat::Png, &config);

        assert!(matches!(result, Err(ConvertError::ResourceLimit(_))));
    }

    #[test]
    fn oversized_target_is_rejected_before_decode() {
        let config = ConvertConfig {
            max_decoded_pixels: 10_000,
            ..ConvertConfig::default()
        };

        let result = transcode(
            b"never decoded",
            SourceFormat::Png,
            TargetFormat::Png,
            ResolvedSize { width: 1000, height: 1000 },
            &config,
        );

        assert!(matches!(result, Err(ConvertError::ResourceLimit(_))));
    }

    #[test]
    fn header_inspection_reads_dimensions_without_decode() {
        let png = create_image_bytes(17, 9, ImageFormat::Png);
        assert_eq!(
            inspect_dimensions_from_memory(&png, SourceFormat::Png).expect("inspect failed"),
            (17, 9)
        );
    }

    #[test]
    fn unknown_targets_fall_back_to_png_encoding() {
        assert_eq!(RasterEncoding::for_target(TargetFormat::Svg), RasterEncoding::Png);
        assert_eq!(RasterEncoding::for_target(TargetFormat::Jpeg), RasterEncoding::Jpeg);
    }
}
