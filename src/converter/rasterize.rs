//! # SVG 栅格化模块
//!
//! SVG → 位图：由 `resvg` 渲染到目标尺寸（拉伸填满），
//! 再把 tiny-skia 的预乘 alpha 像素还原为普通 RGBA，交给位图编码器。

use image::{Rgba, RgbaImage};
use resvg::{tiny_skia, usvg};

use super::ConvertError;
use super::dimension::ResolvedSize;

/// 将 SVG 渲染为 `size` 大小的 RGBA 像素面。
pub(crate) fn rasterize_vector(svg: &[u8], size: ResolvedSize) -> Result<RgbaImage, ConvertError> {
    let options = usvg::Options::default();
    let tree = usvg::Tree::from_data(svg, &options)
        .map_err(|e| ConvertError::MalformedVectorDocument(format!("SVG 渲染解析失败：{}", e)))?;

    let tree_size = tree.size();
    let mut pixmap = tiny_skia::Pixmap::new(size.width, size.height).ok_or_else(|| {
        ConvertError::ResourceLimit(format!("无法分配 {}x{} 渲染画布", size.width, size.height))
    })?;

    let transform = tiny_skia::Transform::from_scale(
        size.width as f32 / tree_size.width(),
        size.height as f32 / tree_size.height(),
    );
    resvg::render(&tree, transform, &mut pixmap.as_mut());

    log::debug!(
        "🖌️ SVG 栅格化完成 - 文档尺寸 {}x{} -> {}x{}",
        tree_size.width(),
        tree_size.height(),
        size.width,
        size.height
    );

    Ok(pixmap_to_rgba(&pixmap))
}

fn pixmap_to_rgba(pixmap: &tiny_skia::Pixmap) -> RgbaImage {
    let pixels = pixmap.pixels();
    RgbaImage::from_fn(pixmap.width(), pixmap.height(), |x, y| {
        let color = pixels[(y * pixmap.width() + x) as usize].demultiply();
        Rgba([color.red(), color.green(), color.blue(), color.alpha()])
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED_SQUARE: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="10" height="10"><rect width="10" height="10" fill="#ff0000"/></svg>"##;

    #[test]
    fn renders_at_requested_size() {
        let surface = rasterize_vector(RED_SQUARE.as_bytes(), ResolvedSize { width: 40, height: 20 })
            .expect("rasterize failed");

        assert_eq!(surface.dimensions(), (40, 20));
        assert_eq!(surface.get_pixel(20, 10), &Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn transparent_area_stays_transparent() {
        let svg = r#"<svg xmlns="http://www.w3.org/2000/svg" width="10" height="10"><rect width="5" height="10" fill="blue"/></svg>"#;
        let surface = rasterize_vector(svg.as_bytes(), ResolvedSize { width: 10, height: 10 })
            .expect("rasterize failed");

        assert_eq!(surface.get_pixel(8, 5)[3], 0);
        assert_eq!(surface.get_pixel(2, 5), &Rgba([0, 0, 255, 255]));
    }

    #[test]
    fn garbage_is_malformed() {
        let result = rasterize_vector(b"not svg at all", ResolvedSize { width: 1, height: 1 });
        assert!(matches!(result, Err(ConvertError::MalformedVectorDocument(_))));
    }
}
