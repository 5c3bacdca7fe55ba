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

//! Shader modules.

use crate::relume_bitflags;
use std::borrow::Cow;

/// An opaque handle to a compiled shader module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderModuleId(pub usize);

/// Source code of a shader module.
#[derive(Debug, Clone)]
pub enum ShaderSourceData<'a> {
    /// WGSL text.
    Wgsl(Cow<'a, str>),
}

/// Describes a shader module to create.
#[derive(Debug, Clone)]
pub struct ShaderModuleDescriptor<'a> {
    /// Debug label.
    pub label: Option<&'a str>,
    /// The source code.
    pub source: ShaderSourceData<'a>,
}

relume_bitflags! {
    /// Shader stages a binding is visible to.
    pub struct ShaderStages: u32 {
        /// Vertex stage.
        const VERTEX = 1 << 0;
        /// Fragment stage.
        const FRAGMENT = 1 << 1;
    }
}
