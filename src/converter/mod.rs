//! # 图片格式转换模块（converter）
//!
//! ## 设计思路
//!
//! 该模块将“输入加载 → 来源识别 → 尺寸解析 → 策略分派 → 编码输出”
//! 按职责拆分为多个子模块，避免单文件膨胀与耦合。
//!
//! - `handler`：编排整条处理流水线（状态机 + 策略分类）
//! - `loader`：负责字节/Base64/文件加载、体积校验与来源识别
//! - `dimension`：纯函数尺寸解析
//! - `vector`：SVG 根元素尺寸与 viewBox 改写、原始尺寸探测
//! - `wrapper`：位图 → SVG 内嵌包装
//! - `pipeline`：位图解码、像素限制、拉伸、编码
//! - `rasterize`：SVG → 位图渲染
//! - `config/error/source/output`：配置、错误、输入与输出数据模型
//!
//! ## 实现思路
//!
//! 对外仅暴露必要类型与入口函数，内部细节保持 `mod` 私有。
//! 引擎本身不持有请求级状态，多个请求可并行，各自拥有独立缓冲区。
//!
//! ## 新同事快速上手
//!
//! 可以按下面顺序理解调用链：
//!
//! ```text
//! 调用方（UI 胶水层）
//!    ↓
//! handler.rs（校验 + 阶段耗时日志）
//!    ├─ loader.rs（读取输入 + 体积校验 + 格式识别）
//!    ├─ dimension.rs（解析最终尺寸）
//!    └─ 按策略分派：
//!         ├─ vector.rs（SVG → SVG）
//!         ├─ wrapper.rs（位图 → SVG）
//!         ├─ rasterize.rs + pipeline.rs（SVG → 位图）
//!         └─ pipeline.rs（位图 ↔ 位图 / WebP）
//!    ↓
//! ConversionResult 或 ConversionFailure（错误 + 失败阶段）
//! ```
//!
//! ## 分层职责建议
//!
//! - 配置与档位变更优先改 `config.rs`
//! - 流程顺序或策略分类变更优先改 `handler.rs`
//! - 单阶段行为优化分别改 `loader/vector/wrapper/pipeline/rasterize`

mod config;
mod dimension;
mod error;
mod handler;
mod loader;
mod output;
mod pipeline;
mod rasterize;
mod source;
mod vector;
mod wrapper;

pub use config::{ConvertConfig, ConvertPerformanceProfile, ResizeFilter};
pub use dimension::{IntrinsicSize, ResolvedSize, SizeSpec, resolve_size};
pub use error::{ConversionFailure, ConvertError, ErrorReport};
pub use handler::{ConversionEngine, ConversionStage, ConversionStrategy};
pub use output::{ConversionResult, TargetFormat};
pub use source::{ConversionRequest, InputSource, SourceFormat};
pub use vector::{RescaleTarget, probe_intrinsic_size, rescale_document};
pub use wrapper::wrap_raster;
