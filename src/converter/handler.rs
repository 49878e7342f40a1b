//! # 核心编排模块
//!
//! ## 设计思路
//!
//! `ConversionEngine` 只负责流程编排与配置管理，不持有任何请求级状态。
//! 单次请求的状态机固定为：
//!
//! ```text
//! Idle → Validating → Resolving → Converting → Done
//!            └────────────┴────────────┴──→ Failed（任一阶段，终止，不重试）
//! ```
//!
//! ## 实现思路
//!
//! - 配置通过 `Arc<RwLock<ConvertConfig>>` 支持运行时动态切档。
//! - 单次请求内使用“同一配置快照”，避免处理中途配置漂移。
//! - 异步入口有两个挂起点：读取输入完成、后台解码转换完成（`spawn_blocking`）。
//! - 记录 `load/resolve/convert/total` 阶段耗时，便于性能诊断。

use std::sync::{Arc, RwLock};
use std::time::Instant;

use super::dimension::{IntrinsicSize, ResolvedSize, SizeSpec, resolve_size};
use super::output::{ConversionResult, TargetFormat};
use super::pipeline::{self, RasterEncoding};
use super::source::{ConversionRequest, InputSource, RawImageData, SourceFormat};
use super::vector::{self, RescaleTarget};
use super::error::ConversionFailure;
use super::{ConvertConfig, ConvertError, ConvertPerformanceProfile, loader, rasterize, wrapper};

/// 请求生命周期阶段。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionStage {
    Idle,
    Validating,
    Resolving,
    Converting,
    Done,
    Failed,
}

impl ConversionStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Validating => "validating",
            Self::Resolving => "resolving",
            Self::Converting => "converting",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

/// 按 (是否矢量源, 目标格式) 分类出的转换策略。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionStrategy {
    /// SVG → SVG：改写尺寸与 viewBox。
    VectorRescale,
    /// 位图 → SVG：内嵌包装。
    RasterWrap,
    /// SVG → 位图：栅格化后编码。
    VectorRasterize,
    /// 非 WebP → WebP，或 WebP → 位图。
    WebpTranscode,
    /// 其余位图互转（PNG ↔ JPEG）。
    RasterTranscode,
}

impl ConversionStrategy {
    pub fn classify(source: SourceFormat, target: TargetFormat) -> Self {
        match (source.is_vector(), target.is_vector()) {
            (true, true) => Self::VectorRescale,
            (false, true) => Self::RasterWrap,
            (true, false) => Self::VectorRasterize,
            (false, false) if source == SourceFormat::WebP || target == TargetFormat::WebP => {
                Self::WebpTranscode
            }
            (false, false) => Self::RasterTranscode,
        }
    }
}

/// 通过校验、等待加载的请求其余部分。
struct PendingConversion {
    source_mime: Option<String>,
    intrinsic_size: Option<IntrinsicSize>,
    target: TargetFormat,
    size: SizeSpec,
}

/// 单次请求的阶段记录（仅用于日志，不跨请求保留）。
struct StageTracker {
    stage: ConversionStage,
}

impl StageTracker {
    fn new() -> Self {
        Self {
            stage: ConversionStage::Idle,
        }
    }

    fn enter(&mut self, next: ConversionStage) {
        log::debug!("转换阶段：{} -> {}", self.stage.as_str(), next.as_str());
        self.stage = next;
    }

    /// 以当前阶段包装错误，并进入 `Failed`。
    fn fail(&mut self, error: ConvertError) -> ConversionFailure {
        let stage = self.stage;
        log::warn!(
            "❌ 转换失败 - 阶段: {} 错误码: {} 详情: {}",
            stage.as_str(),
            error.code(),
            error
        );
        self.stage = ConversionStage::Failed;
        ConversionFailure { stage, error }
    }
}

/// 转换引擎。
///
/// 持有可热切换的配置，并编排各子模块实现完整流程。
pub struct ConversionEngine {
    config: Arc<RwLock<ConvertConfig>>,
}

impl ConversionEngine {
    /// 根据初始配置创建引擎。
    ///
    /// # 示例
    /// ```rust
    /// use image_format_converter::{ConversionEngine, ConvertConfig};
    ///
    /// let engine = ConversionEngine::new(ConvertConfig::default())?;
    /// # Ok::<(), image_format_converter::ConvertError>(())
    /// ```
    pub fn new(config: ConvertConfig) -> Result<Self, ConvertError> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(RwLock::new(config)),
        })
    }

    /// 获取配置快照。
    ///
    /// 作用：保证单次请求链路使用一致参数。
    pub fn config_snapshot(&self) -> Result<ConvertConfig, ConvertError> {
        self.config
            .read()
            .map(|cfg| cfg.clone())
            .map_err(|_| ConvertError::ResourceLimit("配置读取锁已中毒".to_string()))
    }

    /// 整体替换配置（先校验）。
    pub fn set_config(&self, config: ConvertConfig) -> Result<(), ConvertError> {
        config.validate()?;
        let mut current = self
            .config
            .write()
            .map_err(|_| ConvertError::ResourceLimit("配置写入锁已中毒".to_string()))?;
        *current = config;
        Ok(())
    }

    /// 设置性能档位。
    pub fn set_performance_profile(&self, profile: ConvertPerformanceProfile) -> Result<(), ConvertError> {
        let mut config = self
            .config
            .write()
            .map_err(|_| ConvertError::ResourceLimit("配置写入锁已中毒".to_string()))?;
        config.apply_performance_profile(profile);

        log::info!(
            "⚙️ 已切换转换性能档位：{:?}（filter={:?}, jpeg_quality={}）",
            profile,
            config.resize_filter,
            config.jpeg_quality
        );

        Ok(())
    }

    /// 获取当前生效档位。
    pub fn get_performance_profile(&self) -> Result<ConvertPerformanceProfile, ConvertError> {
        let config = self
            .config
            .read()
            .map_err(|_| ConvertError::ResourceLimit("配置读取锁已中毒".to_string()))?;
        Ok(config.infer_performance_profile())
    }

    /// 同步入口：在当前线程完成读取、解析与转换。
    pub fn convert_blocking(&self, request: ConversionRequest) -> Result<ConversionResult, ConversionFailure> {
        let total_start = Instant::now();
        let mut tracker = StageTracker::new();
        let config = self.config_snapshot().map_err(|e| tracker.fail(e))?;

        let (input, pending) = validate_request(request, &mut tracker)?;

        let load_start = Instant::now();
        let raw = loader::load_blocking(input, &config).map_err(|e| tracker.fail(e))?;
        let load_elapsed = load_start.elapsed();

        let result = run_pipeline(raw, pending, &config, &mut tracker)?;

        log::info!(
            "✅ 转换完成 - {} load={}ms total={}ms",
            result.file_name,
            load_elapsed.as_millis(),
            total_start.elapsed().as_millis()
        );
        Ok(result)
    }

    /// 异步入口。
    ///
    /// # 示例
    /// ```rust,no_run
    /// use image_format_converter::{
    ///     ConversionEngine, ConversionRequest, ConvertConfig, InputSource, SizeSpec, TargetFormat,
    /// };
    ///
    /// # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
    /// let engine = ConversionEngine::new(ConvertConfig::default())?;
    /// let request = ConversionRequest::new(
    ///     InputSource::FilePath("/tmp/photo.png".into()),
    ///     TargetFormat::WebP,
    ///     SizeSpec::width(800),
    /// );
    /// let result = engine.convert(request).await?;
    /// assert_eq!(result.file_name, "converted_image.webp");
    /// # Ok(())
    /// # }
    /// ```
    pub async fn convert(&self, request: ConversionRequest) -> Result<ConversionResult, ConversionFailure> {
        let total_start = Instant::now();
        let mut tracker = StageTracker::new();
        let config = self.config_snapshot().map_err(|e| tracker.fail(e))?;

        let (input, pending) = validate_request(request, &mut tracker)?;

        let load_start = Instant::now();
        let raw = loader::load(input, &config).await.map_err(|e| tracker.fail(e))?;
        let load_elapsed = load_start.elapsed();

        let result = tokio::task::spawn_blocking(move || run_pipeline(raw, pending, &config, &mut tracker))
            .await
            .map_err(|e| {
                log::warn!("❌ 转换后台任务异常：{}", e);
                ConversionFailure {
                    stage: ConversionStage::Converting,
                    error: ConvertError::Worker(e.to_string()),
                }
            })??;

        log::info!(
            "✅ 转换完成 - {} load={}ms total={}ms",
            result.file_name,
            load_elapsed.as_millis(),
            total_start.elapsed().as_millis()
        );
        Ok(result)
    }
}

/// Validating：必须有输入内容，且至少给出一项尺寸参数。
fn validate_request(
    request: ConversionRequest,
    tracker: &mut StageTracker,
) -> Result<(InputSource, PendingConversion), ConversionFailure> {
    tracker.enter(ConversionStage::Validating);

    let ConversionRequest {
        input,
        source_mime,
        intrinsic_size,
        target,
        size,
    } = request;

    let input = match input {
        None => return Err(tracker.fail(ConvertError::MissingInputFile)),
        Some(InputSource::Bytes(bytes)) if bytes.is_empty() => {
            return Err(tracker.fail(ConvertError::MissingInputFile));
        }
        Some(InputSource::Base64(data)) if data.trim().is_empty() => {
            return Err(tracker.fail(ConvertError::MissingInputFile));
        }
        Some(input) => input,
    };

    if !size.has_any_input() {
        return Err(tracker.fail(ConvertError::MissingSizeInput));
    }

    Ok((
        input,
        PendingConversion {
            source_mime,
            intrinsic_size,
            target,
            size,
        },
    ))
}

/// 输入已就绪后的同步流水线：识别 → 解析尺寸 → 分派转换。
fn run_pipeline(
    raw: RawImageData,
    pending: PendingConversion,
    config: &ConvertConfig,
    tracker: &mut StageTracker,
) -> Result<ConversionResult, ConversionFailure> {
    let declared = pending.source_mime.as_deref().or(raw.embedded_mime.as_deref());
    let source = loader::detect_source_format(&raw.bytes, declared).map_err(|e| tracker.fail(e))?;

    tracker.enter(ConversionStage::Resolving);
    let resolve_start = Instant::now();
    let intrinsic = match pending.intrinsic_size {
        Some(intrinsic) => intrinsic,
        None => probe_intrinsic_size(&raw.bytes, source, config).map_err(|e| tracker.fail(e))?,
    };
    let size = resolve_size(&pending.size, intrinsic).map_err(|e| tracker.fail(e))?;
    let resolve_elapsed = resolve_start.elapsed();

    tracker.enter(ConversionStage::Converting);
    let convert_start = Instant::now();
    let strategy = ConversionStrategy::classify(source, pending.target);
    log::info!(
        "🔀 转换分派 - 来源: {} 格式: {:?} -> {:?} 策略: {:?} 尺寸: {}x{} -> {}x{}",
        raw.source_hint,
        source,
        pending.target,
        strategy,
        intrinsic.width,
        intrinsic.height,
        size.width,
        size.height
    );

    let payload = execute_strategy(strategy, &raw.bytes, source, pending.target, size, config)
        .map_err(|e| tracker.fail(e))?;
    let convert_elapsed = convert_start.elapsed();

    tracker.enter(ConversionStage::Done);
    log::info!(
        "⏱️ 阶段耗时 - resolve={}ms convert={}ms output={}KB",
        resolve_elapsed.as_millis(),
        convert_elapsed.as_millis(),
        payload.len() / 1024
    );

    Ok(ConversionResult::new(pending.target, payload, size))
}

fn probe_intrinsic_size(
    bytes: &[u8],
    source: SourceFormat,
    config: &ConvertConfig,
) -> Result<IntrinsicSize, ConvertError> {
    if source.is_vector() {
        let fallback = IntrinsicSize {
            width: config.default_vector_width,
            height: config.default_vector_height,
        };
        return vector::probe_intrinsic_size(vector::document_text(bytes)?, fallback);
    }

    let (width, height) = pipeline::inspect_dimensions_from_memory(bytes, source)?;
    Ok(IntrinsicSize { width, height })
}

fn execute_strategy(
    strategy: ConversionStrategy,
    bytes: &[u8],
    source: SourceFormat,
    target: TargetFormat,
    size: ResolvedSize,
    config: &ConvertConfig,
) -> Result<Vec<u8>, ConvertError> {
    match strategy {
        ConversionStrategy::VectorRescale => {
            let document = vector::document_text(bytes)?;
            if log::log_enabled!(log::Level::Debug) {
                log::debug!("SVG 根元素（改写前）：{}", vector::describe_root(document));
            }
            let rescaled = vector::rescale_document(document, &RescaleTarget::from(size))?;
            Ok(rescaled.into_bytes())
        }
        ConversionStrategy::RasterWrap => Ok(wrapper::wrap_raster(bytes, source, size)?.into_bytes()),
        ConversionStrategy::VectorRasterize => {
            pipeline::validate_pixel_limits(config, size.width, size.height)?;
            pipeline::validate_decoded_memory_limits(config, size.width, size.height)?;
            let surface = rasterize::rasterize_vector(bytes, size)?;
            pipeline::encode_surface(&surface, RasterEncoding::for_target(target), config)
        }
        ConversionStrategy::WebpTranscode | ConversionStrategy::RasterTranscode => {
            pipeline::transcode(bytes, source, target, size, config)
        }
    }
}
