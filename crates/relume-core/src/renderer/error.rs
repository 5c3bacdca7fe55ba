// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Error types of the rendering API.

use crate::renderer::api::{RenderPipelineId, ShaderModuleId};
use std::fmt;

/// An error raised while compiling a shader module.
#[derive(Debug)]
pub enum ShaderError {
    /// The backend rejected the source.
    CompilationError {
        /// Label of the module.
        label: String,
        /// Compiler output.
        details: String,
    },
    /// The module id is unknown.
    NotFound {
        /// The missing id.
        id: ShaderModuleId,
    },
}

impl fmt::Display for ShaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderError::CompilationError { label, details } => {
                write!(f, "Shader compilation failed for '{label}': {details}")
            }
            ShaderError::NotFound { id } => {
                write!(f, "Shader module not found for ID: {id:?}")
            }
        }
    }
}

impl std::error::Error for ShaderError {}

/// An error raised while building a pipeline.
#[derive(Debug)]
pub enum PipelineError {
    /// A bind group layout referenced by the layout is unknown.
    LayoutCreationFailed(String),
    /// The backend failed to build the pipeline.
    CompilationFailed {
        /// Label of the pipeline.
        label: Option<String>,
        /// Backend output.
        details: String,
    },
    /// A shader module referenced by the pipeline is unknown.
    InvalidShaderModuleForPipeline {
        /// The unknown module.
        id: ShaderModuleId,
        /// Label of the pipeline.
        pipeline_label: Option<String>,
    },
    /// The pipeline id is unknown.
    InvalidRenderPipeline {
        /// The unknown id.
        id: RenderPipelineId,
    },
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::LayoutCreationFailed(msg) => {
                write!(f, "Pipeline layout creation failed: {msg}")
            }
            PipelineError::CompilationFailed { label, details } => write!(
                f,
                "Pipeline compilation failed for '{}': {}",
                label.as_deref().unwrap_or("Unknown"),
                details
            ),
            PipelineError::InvalidShaderModuleForPipeline { id, pipeline_label } => write!(
                f,
                "Invalid shader module {:?} for pipeline '{}'",
                id,
                pipeline_label.as_deref().unwrap_or("Unknown")
            ),
            PipelineError::InvalidRenderPipeline { id } => {
                write!(f, "Invalid render pipeline ID: {id:?}")
            }
        }
    }
}

impl std::error::Error for PipelineError {}

/// An error raised while creating or using a GPU resource.
#[derive(Debug)]
pub enum ResourceError {
    /// Shader failure.
    Shader(ShaderError),
    /// Pipeline failure.
    Pipeline(PipelineError),
    /// The id does not name a live resource.
    NotFound,
    /// A write or read falls outside the resource.
    OutOfBounds,
    /// The backend reported an error.
    BackendError(String),
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceError::Shader(err) => write!(f, "Shader resource error: {err}"),
            ResourceError::Pipeline(err) => write!(f, "Pipeline resource error: {err}"),
            ResourceError::NotFound => write!(f, "Resource not found with ID."),
            ResourceError::OutOfBounds => write!(f, "Resource access out of bounds."),
            ResourceError::BackendError(msg) => {
                write!(f, "Backend-specific resource error: {msg}")
            }
        }
    }
}

impl std::error::Error for ResourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ResourceError::Shader(err) => Some(err),
            ResourceError::Pipeline(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ShaderError> for ResourceError {
    fn from(err: ShaderError) -> Self {
        ResourceError::Shader(err)
    }
}

impl From<PipelineError> for ResourceError {
    fn from(err: PipelineError) -> Self {
        ResourceError::Pipeline(err)
    }
}

/// A frame level rendering failure.
#[derive(Debug)]
pub enum RenderError {
    /// No usable adapter or device could be created.
    InitializationFailed(String),
    /// A resource operation failed while rendering.
    ResourceError(ResourceError),
    /// The device was lost.
    DeviceLost,
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::InitializationFailed(msg) => {
                write!(f, "Failed to initialize graphics backend: {msg}")
            }
            RenderError::ResourceError(err) => {
                write!(f, "Graphics resource operation failed: {err}")
            }
            RenderError::DeviceLost => write!(
                f,
                "The graphics device was lost and needs to be reinitialized."
            ),
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::ResourceError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ResourceError> for RenderError {
    fn from(err: ResourceError) -> Self {
        RenderError::ResourceError(err)
    }
}

impl From<ShaderError> for RenderError {
    fn from(err: ShaderError) -> Self {
        RenderError::ResourceError(err.into())
    }
}

impl From<PipelineError> for RenderError {
    fn from(err: PipelineError) -> Self {
        RenderError::ResourceError(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn resource_error_wraps_shader_error() {
        let res_err: ResourceError = ShaderError::NotFound {
            id: ShaderModuleId(42),
        }
        .into();
        assert_eq!(
            format!("{res_err}"),
            "Shader resource error: Shader module not found for ID: ShaderModuleId(42)"
        );
        assert!(res_err.source().is_some());
    }

    #[test]
    fn render_error_chains_to_resource_error() {
        let err: RenderError = PipelineError::InvalidRenderPipeline {
            id: RenderPipelineId(7),
        }
        .into();
        assert_eq!(
            format!("{err}"),
            "Graphics resource operation failed: Pipeline resource error: Invalid render pipeline ID: RenderPipelineId(7)"
        );
        assert!(err.source().is_some());
        assert!(RenderError::DeviceLost.source().is_none());
    }
}
