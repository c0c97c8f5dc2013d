//! Error types for `migotomesh`

use thiserror::Error;

/// The error type for `migotomesh` operations.
///
/// All variants are fatal for the mesh or frame being processed: the core
/// never returns a partially encoded buffer. The caller decides whether to
/// skip the affected mesh or abort the whole batch.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum Error {
    // ==================== IO Errors ====================
    /// IO error from reading a schema description file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error from a schema description file.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ==================== Schema Errors ====================
    /// The element list description is malformed.
    #[error("invalid schema: element '{element}': {message}")]
    Schema {
        /// The offending element name.
        element: String,
        /// Description of what is invalid.
        message: String,
    },

    /// The schema names a byte format this element type does not implement.
    #[error("unsupported format {format} for element '{element}'")]
    UnsupportedFormat {
        /// The element name.
        element: String,
        /// The D3D11 format string.
        format: String,
    },

    // ==================== Source Mesh Errors ====================
    /// A required attribute channel is absent on the source mesh.
    #[error("mesh is missing required attribute layer '{layer}' for element '{element}'")]
    MissingAttribute {
        /// The element name that needs the layer.
        element: String,
        /// The missing layer name.
        layer: String,
    },

    /// The mesh has no skinning data where the schema requires it.
    #[error("no vertex group data found for element '{element}': the mesh needs at least one valid vertex group")]
    NoVertexGroup {
        /// The blend element that found no slot-0 data.
        element: String,
    },

    /// A blend index exceeds the encodable range of the target format.
    #[error("blend index {index} in element '{element}' exceeds the maximum {max} of format {format}")]
    IndexOverflow {
        /// The element name.
        element: String,
        /// The offending index value.
        index: u32,
        /// The largest value the target format can hold.
        max: u32,
        /// The D3D11 format string.
        format: String,
    },

    /// The mesh's loop count is not a multiple of 3 (not a triangle list).
    #[error("loop count {loop_count} is not a multiple of 3: mesh must be triangulated")]
    NotTriangulated {
        /// The loop count found.
        loop_count: usize,
    },

    /// The loop-to-vertex index slice does not cover every extracted loop.
    #[error("loop vertex index count {indices} does not match loop count {loops}")]
    LoopIndexMismatch {
        /// Length of the loop-to-vertex index slice.
        indices: usize,
        /// Loop count of the extracted attributes.
        loops: usize,
    },

    // ==================== Internal Invariant Errors ====================
    /// The interleaved record size does not match the schema stride.
    ///
    /// Indicates a bug in the extractor or schema, never recoverable.
    #[error("interleaved row size mismatch for element '{element}': got {actual} bytes, schema declares {expected}")]
    RowSizeMismatch {
        /// The element whose data had the wrong size.
        element: String,
        /// Bytes actually produced.
        actual: usize,
        /// Bytes the schema stride requires.
        expected: usize,
    },

    // ==================== Delta Encoding Errors ====================
    /// Base and target position buffers have different vertex counts.
    #[error("topology mismatch: base has {base} vertices, target has {target}")]
    TopologyMismatch {
        /// Vertex count of the base buffer.
        base: usize,
        /// Vertex count of the target buffer.
        target: usize,
    },
}

/// A specialized Result type for `migotomesh` operations.
pub type Result<T> = std::result::Result<T, Error>;
