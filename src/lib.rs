//! # 图片格式转换引擎：库入口
//!
//! ## 架构总览
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │              调用方 (UI 胶水层 / 下载触发器)               │
//! │                                                          │
//! │  ConversionRequest { input, target, size }               │
//! └───────┼──────────────────────────────────────────────────┘
//!         ↕ Result<ConversionResult, ConversionFailure>
//! ┌───────┼──────────────────────────────────────────────────┐
//! │       ↕            引擎 (Rust)                           │
//! │                                                          │
//! │  ┌─ ConversionEngine ── 状态机 + 配置快照                 │
//! │  │   Idle → Validating → Resolving → Converting → Done   │
//! │  │                                                       │
//! │  ├─ loader ────── 字节 / Base64 / 文件 + 体积校验          │
//! │  ├─ dimension ─── 宽高比保持的尺寸解析                     │
//! │  ├─ vector ────── SVG 尺寸 / viewBox 改写 (quick-xml)     │
//! │  ├─ wrapper ───── 位图内嵌为 SVG                          │
//! │  ├─ rasterize ─── SVG 渲染为位图 (resvg)                  │
//! │  └─ pipeline ──── 解码 · 拉伸 · 编码 (image + fir)        │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 模块职责
//!
//! | 模块 | 职责 |
//! |------|------|
//! | [`converter`] | 转换引擎全部实现，常用类型在 crate 根重新导出 |

pub mod converter;

pub use converter::{
    ConversionEngine, ConversionFailure, ConversionRequest, ConversionResult, ConversionStage,
    ConversionStrategy, ConvertConfig, ConvertError, ConvertPerformanceProfile, ErrorReport,
    InputSource, IntrinsicSize, RescaleTarget, ResizeFilter, ResolvedSize, SizeSpec, SourceFormat,
    TargetFormat, probe_intrinsic_size, rescale_document, resolve_size, wrap_raster,
};
