use std::fs;
use std::path::PathBuf;

use crate::device::{GraphicsDevice, ProgramHandle, ShaderHandle, ShaderStage, UniformValue};
use crate::error::ShaderSourceError;

pub const PARTICLE_VERTEX_WGSL: &str = include_str!("shaders/particle_vertex.wgsl");
pub const PARTICLE_FRAGMENT_WGSL: &str = include_str!("shaders/particle_fragment.wgsl");

/// Where the text of one shader stage comes from.
#[derive(Clone, Debug, PartialEq)]
pub enum ShaderSource {
    Embedded(&'static str),
    File(PathBuf),
}

impl ShaderSource {
    pub fn load(&self) -> Result<String, ShaderSourceError> {
        match self {
            ShaderSource::Embedded(text) => Ok((*text).to_string()),
            ShaderSource::File(path) => {
                fs::read_to_string(path).map_err(|source| ShaderSourceError::Read {
                    path: path.clone(),
                    source,
                })
            }
        }
    }

    /// Reads the source, falling back to `fallback` when the file is unreadable.
    pub fn load_or(&self, fallback: &'static str) -> String {
        match self.load() {
            Ok(text) => text,
            Err(e) => {
                log::error!("{e}; using the built-in shader instead");
                fallback.to_string()
            }
        }
    }
}

/// A linked shader program plus the stage objects that went into it.
///
/// Build failures are logged and never abort: a broken program still gets a
/// handle, and the backend drops draws made with it.
#[derive(Copy, Clone, Debug, Default)]
pub struct ShaderProgram {
    id: Option<ProgramHandle>,
    stages: [Option<ShaderHandle>; 3],
    linked: bool,
}

impl ShaderProgram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load_shader<D: GraphicsDevice>(
        &mut self,
        device: &mut D,
        source: &str,
        stage: ShaderStage,
    ) {
        let (handle, report) = device.compile_shader(stage, source);
        if report.success {
            log::info!("Compiled {} shader {:?} {}", stage.name(), handle, report.log);
        } else {
            log::warn!("Shader compilation error ({} stage): {}", stage.name(), report.log);
        }
        self.stages[stage.index()] = Some(handle);
    }

    pub fn create_program<D: GraphicsDevice>(&mut self, device: &mut D) {
        if self.id.is_some() {
            log::warn!("Shader program already created, relinking");
        }
        let attached: Vec<ShaderHandle> = self.stages.iter().flatten().copied().collect();
        let (id, report) = device.link_program(&attached);
        if report.success {
            log::info!("Linked shader program {:?} from {} stage(s)", id, attached.len());
        } else {
            log::warn!("Program linker error: {}", report.log);
        }
        self.id = Some(id);
        self.linked = report.success;
    }

    pub fn use_program<D: GraphicsDevice>(&self, device: &mut D) {
        match self.id {
            Some(id) => device.use_program(id),
            None => log::warn!("use_program called before create_program"),
        }
    }

    /// Looks the uniform up by name on every call. Unknown names do nothing.
    pub fn set_uniform<D: GraphicsDevice>(
        &self,
        device: &mut D,
        name: &str,
        value: impl Into<UniformValue>,
    ) {
        let Some(id) = self.id else {
            return;
        };
        let location = device.uniform_location(id, name);
        device.set_uniform(location, value.into());
    }

    pub fn is_linked(&self) -> bool {
        self.linked
    }
}
