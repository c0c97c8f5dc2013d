//! D3D11 element list schema.
//!
//! An [`ElementSchema`] is the ordered description of one game's vertex
//! layout: element names (`POSITION`, `NORMAL`, `TEXCOORD1`, ...), their byte
//! formats, and the category each element's bytes are emitted under
//! (`Position`, `Blend`, `Texcoord`, ...). The order of the list defines the
//! interleaved record layout; the sum of byte widths is the record stride.
//!
//! Schemas are immutable once loaded and shared read-only across every
//! extraction call for a mesh batch. They are usually loaded from the
//! `tmp.json` description the frame-dump tooling writes
//! (`{"WorkGameType": ..., "D3D11ElementList": [...]}`).

use std::fmt;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Byte format of one vertex element, matching D3D11 `DXGI_FORMAT` spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DxgiFormat {
    #[serde(rename = "R32G32B32A32_FLOAT")]
    R32G32B32A32Float,
    #[serde(rename = "R32G32B32A32_UINT")]
    R32G32B32A32Uint,
    #[serde(rename = "R32G32B32A32_SINT")]
    R32G32B32A32Sint,
    #[serde(rename = "R32G32B32_FLOAT")]
    R32G32B32Float,
    #[serde(rename = "R16G16B16A16_FLOAT")]
    R16G16B16A16Float,
    #[serde(rename = "R16G16B16A16_SNORM")]
    R16G16B16A16Snorm,
    #[serde(rename = "R16G16B16A16_UINT")]
    R16G16B16A16Uint,
    #[serde(rename = "R32G32_FLOAT")]
    R32G32Float,
    #[serde(rename = "R32G32_UINT")]
    R32G32Uint,
    #[serde(rename = "R32G32_SINT")]
    R32G32Sint,
    #[serde(rename = "R16G16_FLOAT")]
    R16G16Float,
    #[serde(rename = "R16G16_UNORM")]
    R16G16Unorm,
    #[serde(rename = "R8G8B8A8_UNORM")]
    R8G8B8A8Unorm,
    #[serde(rename = "R8G8B8A8_SNORM")]
    R8G8B8A8Snorm,
    #[serde(rename = "R8G8B8A8_UINT")]
    R8G8B8A8Uint,
    #[serde(rename = "R32_UINT")]
    R32Uint,
    #[serde(rename = "R32_SINT")]
    R32Sint,
    #[serde(rename = "R16_UINT")]
    R16Uint,
    #[serde(rename = "R8_UINT")]
    R8Uint,
    #[serde(rename = "R8_UNORM")]
    R8Unorm,
}

impl DxgiFormat {
    /// The D3D11 format string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::R32G32B32A32Float => "R32G32B32A32_FLOAT",
            Self::R32G32B32A32Uint => "R32G32B32A32_UINT",
            Self::R32G32B32A32Sint => "R32G32B32A32_SINT",
            Self::R32G32B32Float => "R32G32B32_FLOAT",
            Self::R16G16B16A16Float => "R16G16B16A16_FLOAT",
            Self::R16G16B16A16Snorm => "R16G16B16A16_SNORM",
            Self::R16G16B16A16Uint => "R16G16B16A16_UINT",
            Self::R32G32Float => "R32G32_FLOAT",
            Self::R32G32Uint => "R32G32_UINT",
            Self::R32G32Sint => "R32G32_SINT",
            Self::R16G16Float => "R16G16_FLOAT",
            Self::R16G16Unorm => "R16G16_UNORM",
            Self::R8G8B8A8Unorm => "R8G8B8A8_UNORM",
            Self::R8G8B8A8Snorm => "R8G8B8A8_SNORM",
            Self::R8G8B8A8Uint => "R8G8B8A8_UINT",
            Self::R32Uint => "R32_UINT",
            Self::R32Sint => "R32_SINT",
            Self::R16Uint => "R16_UINT",
            Self::R8Uint => "R8_UINT",
            Self::R8Unorm => "R8_UNORM",
        }
    }

    /// Number of components the format name declares.
    #[must_use]
    pub fn component_count(&self) -> usize {
        match self {
            Self::R32G32B32A32Float
            | Self::R32G32B32A32Uint
            | Self::R32G32B32A32Sint
            | Self::R16G16B16A16Float
            | Self::R16G16B16A16Snorm
            | Self::R16G16B16A16Uint
            | Self::R8G8B8A8Unorm
            | Self::R8G8B8A8Snorm
            | Self::R8G8B8A8Uint => 4,
            Self::R32G32B32Float => 3,
            Self::R32G32Float
            | Self::R32G32Uint
            | Self::R32G32Sint
            | Self::R16G16Float
            | Self::R16G16Unorm => 2,
            Self::R32Uint | Self::R32Sint | Self::R16Uint | Self::R8Uint | Self::R8Unorm => 1,
        }
    }

    /// Byte size of one component.
    #[must_use]
    pub fn unit_size(&self) -> usize {
        match self {
            Self::R32G32B32A32Float
            | Self::R32G32B32A32Uint
            | Self::R32G32B32A32Sint
            | Self::R32G32B32Float
            | Self::R32G32Float
            | Self::R32G32Uint
            | Self::R32G32Sint
            | Self::R32Uint
            | Self::R32Sint => 4,
            Self::R16G16B16A16Float
            | Self::R16G16B16A16Snorm
            | Self::R16G16B16A16Uint
            | Self::R16G16Float
            | Self::R16G16Unorm
            | Self::R16Uint => 2,
            Self::R8G8B8A8Unorm | Self::R8G8B8A8Snorm | Self::R8G8B8A8Uint | Self::R8Uint | Self::R8Unorm => 1,
        }
    }

    /// Byte size the format name implies for one element.
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.component_count() * self.unit_size()
    }

    /// Single-channel formats may be declared with a byte width that is a
    /// multiple of the unit size, packing an array of values into one element
    /// (WWMI stores 8 one-byte blend indices as `R8_UINT` with byte width 8).
    #[must_use]
    pub fn is_single_channel(&self) -> bool {
        self.component_count() == 1
    }
}

impl fmt::Display for DxgiFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One element of a D3D11 vertex layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct D3d11Element {
    /// Element name, e.g. `POSITION`, `TEXCOORD1`, `BLENDINDICES`.
    #[serde(rename = "ElementName")]
    pub name: String,
    /// Semantic index (slot) for repeated semantics.
    #[serde(rename = "SemanticIndex", default)]
    pub semantic_index: u32,
    /// Byte format of the element's data.
    #[serde(rename = "Format")]
    pub format: DxgiFormat,
    /// Declared byte width of one vertex's worth of this element.
    #[serde(rename = "ByteWidth")]
    pub byte_width: usize,
    /// Output buffer category, e.g. `Position`, `Blend`, `Texcoord`.
    #[serde(rename = "Category")]
    pub category: String,
}

impl D3d11Element {
    /// Number of values this element stores per vertex. Equals the format's
    /// component count except for single-channel array elements, where the
    /// byte width decides.
    #[must_use]
    pub fn component_count(&self) -> usize {
        if self.format.is_single_channel() {
            self.byte_width / self.format.unit_size()
        } else {
            self.format.component_count()
        }
    }
}

/// On-disk shape of the element list description (`tmp.json`).
#[derive(Debug, Deserialize)]
struct ElementListFile {
    #[serde(rename = "WorkGameType", default)]
    work_game_type: Option<String>,
    #[serde(rename = "D3D11ElementList")]
    elements: Vec<D3d11Element>,
}

/// An ordered, validated D3D11 element list.
#[derive(Debug, Clone)]
pub struct ElementSchema {
    elements: Vec<D3d11Element>,
    /// Interleave byte offset of each element within one vertex record.
    offsets: Vec<usize>,
    /// Category name → slice byte width, in first-appearance order.
    category_strides: IndexMap<String, usize>,
    total_stride: usize,
    work_game_type: Option<String>,
}

impl ElementSchema {
    /// Build a schema from an ordered element list.
    ///
    /// # Errors
    /// Returns [`Error::Schema`] if an element's declared byte width does not
    /// match the byte count its format implies, or if a name repeats.
    pub fn new(elements: Vec<D3d11Element>) -> Result<Self> {
        Self::with_game_type(elements, None)
    }

    fn with_game_type(elements: Vec<D3d11Element>, work_game_type: Option<String>) -> Result<Self> {
        let mut offsets = Vec::with_capacity(elements.len());
        let mut category_strides: IndexMap<String, usize> = IndexMap::new();
        let mut total_stride = 0usize;

        for (i, element) in elements.iter().enumerate() {
            if elements[..i].iter().any(|e| e.name == element.name) {
                return Err(Error::Schema {
                    element: element.name.clone(),
                    message: "duplicate element name".into(),
                });
            }

            let implied = element.format.size_bytes();
            let valid = if element.format.is_single_channel() {
                element.byte_width > 0 && element.byte_width % element.format.unit_size() == 0
            } else {
                element.byte_width == implied
            };
            if !valid {
                return Err(Error::Schema {
                    element: element.name.clone(),
                    message: format!(
                        "declared byte width {} does not match format {} ({} bytes)",
                        element.byte_width, element.format, implied
                    ),
                });
            }

            offsets.push(total_stride);
            total_stride += element.byte_width;
            *category_strides.entry(element.category.clone()).or_insert(0) += element.byte_width;
        }

        Ok(Self {
            elements,
            offsets,
            category_strides,
            total_stride,
            work_game_type,
        })
    }

    /// Parse a schema from the `tmp.json` element list description.
    ///
    /// # Errors
    /// Returns an error if the JSON is malformed or the element list fails
    /// validation.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let file: ElementListFile = serde_json::from_str(json)?;
        tracing::debug!(
            "Loaded element list: {} elements, game type {:?}",
            file.elements.len(),
            file.work_game_type
        );
        Self::with_game_type(file.elements, file.work_game_type)
    }

    /// Read and parse a schema description file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or fails validation.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// The elements in interleave order.
    #[must_use]
    pub fn ordered_fields(&self) -> &[D3d11Element] {
        &self.elements
    }

    /// Interleave byte offset of element `index` within one vertex record.
    #[must_use]
    pub fn offset_of(&self, index: usize) -> usize {
        self.offsets[index]
    }

    /// Byte width of one full interleaved vertex record.
    #[must_use]
    pub fn total_stride(&self) -> usize {
        self.total_stride
    }

    /// Byte width of one vertex's slice of the named category buffer.
    #[must_use]
    pub fn stride_of(&self, category: &str) -> Option<usize> {
        self.category_strides.get(category).copied()
    }

    /// Category names in first-appearance order.
    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.category_strides.keys().map(String::as_str)
    }

    /// Whether any element belongs to the named category.
    #[must_use]
    pub fn has_category(&self, category: &str) -> bool {
        self.category_strides.contains_key(category)
    }

    /// Look up an element by name.
    #[must_use]
    pub fn element(&self, name: &str) -> Option<&D3d11Element> {
        self.elements.iter().find(|e| e.name == name)
    }

    /// Total number of blend influences per vertex the layout stores, summed
    /// over all `BLENDINDICES` elements. Zero for unskinned layouts.
    #[must_use]
    pub fn blend_influence_count(&self) -> usize {
        self.elements
            .iter()
            .filter(|e| e.name.starts_with("BLENDINDICES"))
            .map(D3d11Element::component_count)
            .sum()
    }

    /// The `WorkGameType` tag from the description file, if it carried one.
    #[must_use]
    pub fn work_game_type(&self) -> Option<&str> {
        self.work_game_type.as_deref()
    }
}
