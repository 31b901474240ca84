//! Program building.
//!
//! Compiles a [`KernelSource`] for the context's device and creates one compute
//! pipeline per declared signature. A [`Program`] only exists after the whole
//! build succeeded.

use tracing::{debug, info, warn};

use super::GpuContext;
use super::signature::{Access, KernelSignature, KernelSource, Param};
use crate::error::{HarnessError, Result};

/// A compiled entry point ready to be launched.
#[derive(Debug)]
pub struct Kernel {
    signature: KernelSignature,
    layout: wgpu::BindGroupLayout,
    pipeline: wgpu::ComputePipeline,
}

impl Kernel {
    /// Entry point name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.signature.entry_point
    }

    /// The contract the kernel was built against.
    #[must_use]
    pub const fn signature(&self) -> &KernelSignature {
        &self.signature
    }

    pub(crate) const fn layout(&self) -> &wgpu::BindGroupLayout {
        &self.layout
    }

    pub(crate) const fn pipeline(&self) -> &wgpu::ComputePipeline {
        &self.pipeline
    }
}

/// Device-executable form of a kernel source.
#[derive(Debug)]
pub struct Program {
    label: &'static str,
    kernels: Vec<Kernel>,
}

impl Program {
    /// Source label the program was built from.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        self.label
    }

    /// Looks up an entry point by name.
    ///
    /// # Errors
    ///
    /// [`HarnessError::EntryPointNotFound`] if the program does not declare it.
    pub fn kernel(&self, name: &str) -> Result<&Kernel> {
        self.kernels
            .iter()
            .find(|k| k.name() == name)
            .ok_or_else(|| HarnessError::EntryPointNotFound {
                name: name.to_string(),
                available: self.entry_points().map(str::to_string).collect(),
            })
    }

    /// Names of all entry points.
    pub fn entry_points(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.kernels.iter().map(Kernel::name)
    }
}

/// Compiles kernel sources against one device.
pub struct ProgramBuilder<'ctx> {
    ctx: &'ctx GpuContext,
}

impl<'ctx> ProgramBuilder<'ctx> {
    /// Builder for the given context.
    #[must_use]
    pub const fn new(ctx: &'ctx GpuContext) -> Self {
        Self { ctx }
    }

    /// Validates, compiles and links `source`.
    ///
    /// # Errors
    ///
    /// [`HarnessError::Build`] carrying the full diagnostic log if the source
    /// does not match its signatures, fails to compile, or a pipeline cannot
    /// be created for one of its entry points.
    pub fn build(&self, source: &KernelSource) -> Result<Program> {
        source.validate()?;
        let device = &self.ctx.device;

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(source.label()),
            source: wgpu::ShaderSource::Wgsl(source.wgsl().into()),
        });
        let compilation = pollster::block_on(module.get_compilation_info());
        let scope_error = pollster::block_on(device.pop_error_scope());

        let mut log = Vec::new();
        let mut failed = scope_error.is_some();
        for message in &compilation.messages {
            let severity = match message.message_type {
                wgpu::CompilationMessageType::Error => {
                    failed = true;
                    "error"
                }
                wgpu::CompilationMessageType::Warning => "warning",
                _ => "info",
            };
            let line = match &message.location {
                Some(loc) => format!(
                    "{}:{}:{}: {severity}: {}",
                    source.label(),
                    loc.line_number,
                    loc.line_position,
                    message.message
                ),
                None => format!("{}: {severity}: {}", source.label(), message.message),
            };
            log.push(line);
        }
        if let Some(err) = scope_error {
            log.push(err.to_string());
        }
        if failed {
            warn!(source = source.label(), "kernel compilation failed");
            return Err(HarnessError::Build {
                log: log.join("\n"),
            });
        }
        for line in &log {
            debug!(source = source.label(), "{line}");
        }

        let kernels = source
            .signatures()
            .iter()
            .map(|sig| self.link(&module, sig))
            .collect::<Result<Vec<_>>>()?;

        info!(
            source = source.label(),
            entry_points = kernels.len(),
            "kernel program built"
        );
        Ok(Program {
            label: source.label(),
            kernels,
        })
    }

    fn link(&self, module: &wgpu::ShaderModule, sig: &KernelSignature) -> Result<Kernel> {
        let device = &self.ctx.device;
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let entries = layout_entries(sig);
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(sig.entry_point),
            entries: &entries,
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(sig.entry_point),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some(sig.entry_point),
            layout: Some(&pipeline_layout),
            module,
            entry_point: Some(sig.entry_point),
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            cache: None,
        });

        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            return Err(HarnessError::Build {
                log: format!("linking `{}` failed: {err}", sig.entry_point),
            });
        }
        Ok(Kernel {
            signature: sig.clone(),
            layout,
            pipeline,
        })
    }
}

fn layout_entries(sig: &KernelSignature) -> Vec<wgpu::BindGroupLayoutEntry> {
    let mut entries: Vec<_> = sig
        .params
        .iter()
        .filter_map(|p| match p {
            Param::Buffer { access, .. } => Some(*access),
            Param::Scalar(_) => None,
        })
        .enumerate()
        .map(|(binding, access)| wgpu::BindGroupLayoutEntry {
            binding: binding as u32,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage {
                    read_only: access == Access::ReadOnly,
                },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        })
        .collect();

    if sig.scalar_count() > 0 {
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: entries.len() as u32,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        });
    }
    entries
}
