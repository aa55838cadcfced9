//! Pipeline identity and the per-device pipeline-state cache.
//!
//! Responsibilities:
//! - define the structural cache key (shader class, flags, color states,
//!   variation, blend, target format)
//! - insert-if-absent caching of compiled pipeline handles
//! - the compile retry ladder: progressively relaxed effort, hard error when
//!   every rung fails

use std::collections::HashMap;

use crate::error::GpuError;
use crate::image::{ColorStates, ImageFormat};

/// Shader-op classes shipped by this core.
///
/// Each maps to one vertex+fragment WGSL pair in the concrete backend.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ShaderKind {
    /// Flat premultiplied vertex color.
    Color,
    /// Sampled texture modulated by vertex color.
    Texture,
    /// Two-stop linear gradient along the quad's u axis.
    LinearGradient,
    /// Sampled texture through a 4x4 color matrix + offset.
    ColorMatrix,
}

impl ShaderKind {
    /// Stable shader name, used for module lookup and labels.
    pub const fn shader_name(self) -> &'static str {
        match self {
            ShaderKind::Color => "color",
            ShaderKind::Texture => "texture",
            ShaderKind::LinearGradient => "lineargradient",
            ShaderKind::ColorMatrix => "colormatrix",
        }
    }
}

/// Per-draw shader specialization flags.
///
/// Flags select compiled-in shader paths, so they are part of the pipeline
/// cache key. Runtime-varying data belongs in the globals/storage buffers
/// instead.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub struct ShaderFlags(u32);

impl ShaderFlags {
    /// Source texture carries straight alpha and must be premultiplied on
    /// sample.
    pub const STRAIGHT_ALPHA: ShaderFlags = ShaderFlags(1 << 0);
    /// Fine clip against the clip rect in the fragment shader (scissor only
    /// covers the axis-aligned whole-pixel case).
    pub const CLIP_RECT: ShaderFlags = ShaderFlags(1 << 1);
    /// Sample with linear filtering instead of nearest.
    pub const LINEAR_SAMPLING: ShaderFlags = ShaderFlags(1 << 2);

    pub const fn empty() -> Self {
        ShaderFlags(0)
    }

    pub const fn contains(self, other: ShaderFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn to_raw(self) -> u32 {
        self.0
    }
}

impl std::ops::BitOr for ShaderFlags {
    type Output = ShaderFlags;

    fn bitor(self, rhs: ShaderFlags) -> ShaderFlags {
        ShaderFlags(self.0 | rhs.0)
    }
}

/// Blend modes understood by every backend's blend table.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Blend {
    /// No blending; source replaces destination.
    None,
    /// Premultiplied source-over.
    Over,
    /// Additive.
    Add,
    /// Writes transparent black scaled by source alpha (destination-out).
    Clear,
}

/// Compile effort for the shader retry ladder.
///
/// `Full` applies all specialization; each lower rung strips specialization
/// the compiler might choke on. The ladder exists as a mitigation for shader
/// compiler bugs under default settings.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CompileEffort {
    Full,
    /// Specialization constants forced to zero; the shader takes its generic
    /// paths.
    Relaxed,
    /// Additionally forces the default color-state path.
    Minimal,
}

impl CompileEffort {
    const LADDER: [CompileEffort; 3] = [
        CompileEffort::Full,
        CompileEffort::Relaxed,
        CompileEffort::Minimal,
    ];
}

/// Structural pipeline identity.
///
/// Equal keys must produce behaviorally identical pipeline state; the cache
/// relies on that to hand out one handle per distinct configuration.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct PipelineKey {
    pub shader: ShaderKind,
    pub flags: ShaderFlags,
    pub color_states: ColorStates,
    pub variation: u32,
    pub blend: Blend,
    pub format: ImageFormat,
}

/// Insert-if-absent cache of compiled pipeline handles.
///
/// Entries are immutable once inserted. `P` is a cheap-clone backend handle
/// (internally refcounted); cloning it does not duplicate pipeline state.
#[derive(Debug)]
pub struct PipelineCache<P> {
    pipelines: HashMap<PipelineKey, P>,
    compiles: u64,
}

impl<P: Clone> PipelineCache<P> {
    pub fn new() -> Self {
        Self {
            pipelines: HashMap::new(),
            compiles: 0,
        }
    }

    /// Number of compiles performed so far (cache misses, including retry
    /// rungs counted once per successful pipeline).
    pub fn compile_count(&self) -> u64 {
        self.compiles
    }

    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }

    /// Looks up `key`, compiling on miss via `compile`.
    ///
    /// On a miss the retry ladder runs `compile` with progressively relaxed
    /// effort; each failed rung is logged. If every rung fails, the error is
    /// surfaced instead of caching a broken pipeline — a hard-fail policy, so
    /// a draw can never reach the GPU with null shader state.
    pub fn get_or_compile<F>(&mut self, key: PipelineKey, mut compile: F) -> Result<P, GpuError>
    where
        F: FnMut(&PipelineKey, CompileEffort) -> Result<P, GpuError>,
    {
        if let Some(pipeline) = self.pipelines.get(&key) {
            return Ok(pipeline.clone());
        }

        let mut last_err = None;
        for effort in CompileEffort::LADDER {
            match compile(&key, effort) {
                Ok(pipeline) => {
                    if effort != CompileEffort::Full {
                        log::warn!(
                            "pipeline for {:?} compiled at reduced effort {:?}",
                            key,
                            effort
                        );
                    }
                    self.compiles += 1;
                    self.pipelines.insert(key, pipeline.clone());
                    return Ok(pipeline);
                }
                Err(err) => {
                    log::warn!(
                        "pipeline compile for {:?} failed at {:?}: {}",
                        key,
                        effort,
                        err
                    );
                    last_err = Some(err);
                }
            }
        }

        // All rungs failed. Do not cache anything for this key; a later
        // request retries from scratch (e.g. after a driver update).
        Err(match last_err {
            Some(GpuError::PipelineCompile { key, reason }) => {
                GpuError::PipelineCompile { key, reason }
            }
            Some(other) => GpuError::PipelineCompile {
                key,
                reason: other.to_string(),
            },
            None => GpuError::PipelineCompile {
                key,
                reason: "no compile attempted".into(),
            },
        })
    }
}

impl<P: Clone> Default for PipelineCache<P> {
    fn default() -> Self {
        Self::new()
    }
}
