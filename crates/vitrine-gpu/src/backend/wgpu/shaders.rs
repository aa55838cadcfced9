//! WGSL shader sources and specialized module cache.
//!
//! Specialization goes through generated `const` declarations prepended to
//! the WGSL source instead of pipeline-overridable constants; the generated
//! header is part of the module cache key.

use std::cell::RefCell;
use std::collections::HashMap;

use crate::error::GpuError;
use crate::pipeline::{Blend, CompileEffort, PipelineKey, ShaderFlags, ShaderKind};

fn shader_source(kind: ShaderKind) -> &'static str {
    match kind {
        ShaderKind::Color => include_str!("shaders/color.wgsl"),
        ShaderKind::Texture => include_str!("shaders/texture.wgsl"),
        ShaderKind::LinearGradient => include_str!("shaders/lineargradient.wgsl"),
        ShaderKind::ColorMatrix => include_str!("shaders/colormatrix.wgsl"),
    }
}

/// Specialization constants after applying compile effort.
///
/// `Relaxed` zeroes the per-draw specialization so the shader takes its
/// generic paths; `Minimal` additionally forces the default color-state path.
fn specialize(key: &PipelineKey, effort: CompileEffort) -> (u32, u32, u32) {
    match effort {
        CompileEffort::Full => (key.flags.to_raw(), key.color_states.to_raw(), key.variation),
        CompileEffort::Relaxed => (0, key.color_states.to_raw(), 0),
        CompileEffort::Minimal => (0, 0, 0),
    }
}

/// Generated `const` block prepended to every WGSL source.
///
/// The `FLAG_*` constants are emitted from the [`ShaderFlags`] bit values so
/// the WGSL flag tests can never drift from the Rust definitions.
fn specialization_header(flags: u32, color_states: u32, variation: u32) -> String {
    format!(
        "const SHADER_FLAGS: u32 = {flags}u;\n\
         const COLOR_STATES: u32 = {color_states}u;\n\
         const VARIATION: u32 = {variation}u;\n\
         const FLAG_STRAIGHT_ALPHA: u32 = {}u;\n\
         const FLAG_CLIP_RECT: u32 = {}u;\n",
        ShaderFlags::STRAIGHT_ALPHA.to_raw(),
        ShaderFlags::CLIP_RECT.to_raw(),
    )
}

#[derive(Copy, Clone, Eq, PartialEq, Hash)]
struct ModuleKey {
    kind: ShaderKind,
    flags: u32,
    color_states: u32,
    variation: u32,
}

/// Cache of specialized shader modules.
///
/// Distinct pipeline keys often share a module (blend and target format are
/// not part of the WGSL), so modules are cached separately from pipelines.
pub(crate) struct ShaderLibrary {
    modules: RefCell<HashMap<ModuleKey, wgpu::ShaderModule>>,
}

impl ShaderLibrary {
    pub(crate) fn new() -> Self {
        Self {
            modules: RefCell::new(HashMap::new()),
        }
    }

    /// Returns the module for `key` at the given effort, compiling on miss.
    pub(crate) fn module(
        &self,
        device: &wgpu::Device,
        key: &PipelineKey,
        effort: CompileEffort,
    ) -> Result<wgpu::ShaderModule, GpuError> {
        let (flags, color_states, variation) = specialize(key, effort);
        let module_key = ModuleKey {
            kind: key.shader,
            flags,
            color_states,
            variation,
        };

        if let Some(module) = self.modules.borrow().get(&module_key) {
            return Ok(module.clone());
        }

        let source = format!(
            "{}\n{}",
            specialization_header(flags, color_states, variation),
            shader_source(key.shader)
        );

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(key.shader.shader_name()),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });
        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            return Err(GpuError::PipelineCompile {
                key: *key,
                reason: format!("shader module rejected: {err}"),
            });
        }

        self.modules.borrow_mut().insert(module_key, module.clone());
        Ok(module)
    }
}

/// Blend table. All modes assume premultiplied-alpha sources.
pub(crate) fn blend_state(blend: Blend) -> Option<wgpu::BlendState> {
    match blend {
        Blend::None => None,
        Blend::Over => Some(wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING),
        Blend::Add => Some(wgpu::BlendState {
            color: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::One,
                dst_factor: wgpu::BlendFactor::One,
                operation: wgpu::BlendOperation::Add,
            },
            alpha: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::One,
                dst_factor: wgpu::BlendFactor::One,
                operation: wgpu::BlendOperation::Add,
            },
        }),
        // Destination-out: erases covered pixels proportionally to source
        // alpha.
        Blend::Clear => Some(wgpu::BlendState {
            color: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::Zero,
                dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
                operation: wgpu::BlendOperation::Add,
            },
            alpha: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::Zero,
                dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
                operation: wgpu::BlendOperation::Add,
            },
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_flag_constants_track_the_rust_definitions() {
        let header = specialization_header(0, 0, 0);
        assert!(header.contains(&format!(
            "const FLAG_STRAIGHT_ALPHA: u32 = {}u;",
            ShaderFlags::STRAIGHT_ALPHA.to_raw()
        )));
        assert!(header.contains(&format!(
            "const FLAG_CLIP_RECT: u32 = {}u;",
            ShaderFlags::CLIP_RECT.to_raw()
        )));
    }

    #[test]
    fn shader_sources_test_flags_through_named_constants() {
        for kind in [
            ShaderKind::Color,
            ShaderKind::Texture,
            ShaderKind::LinearGradient,
            ShaderKind::ColorMatrix,
        ] {
            let source = shader_source(kind);
            assert!(
                source.contains("FLAG_CLIP_RECT"),
                "{} lacks the named clip flag",
                kind.shader_name()
            );
            // No literal flag masks; bit values come from the header.
            assert!(
                !source.contains("SHADER_FLAGS & 1u") && !source.contains("SHADER_FLAGS & 2u"),
                "{} hard-codes a flag bit",
                kind.shader_name()
            );
        }

        assert!(shader_source(ShaderKind::Texture).contains("FLAG_STRAIGHT_ALPHA"));
        assert!(shader_source(ShaderKind::ColorMatrix).contains("FLAG_STRAIGHT_ALPHA"));
    }
}
