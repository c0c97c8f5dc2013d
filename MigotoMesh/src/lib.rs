//! # MigotoMesh
//!
//! A pure-Rust library for converting polygon meshes into the binary
//! vertex/index buffers 3DMigoto-style game mods inject at draw time.
//!
//! ## Pipeline
//!
//! - **Schema** - the ordered D3D11 element list describing one game's
//!   vertex layout (names, byte formats, categories, stride)
//! - **Extract** - per-loop attribute arrays byte-encoded to each element's
//!   format, with engine conventions from an explicit [`EngineProfile`]
//! - **Pack** - interleave, deduplicate on (attribute bytes, source vertex),
//!   and emit the index buffer plus per-category vertex buffers
//! - **Delta** - sparse per-frame position deltas for shape-key and
//!   animation playback mods
//!
//! ## Quick Start
//!
//! ```no_run
//! use migotomesh::prelude::*;
//!
//! # fn export(mesh: &dyn MeshSource) -> migotomesh::Result<()> {
//! let schema = ElementSchema::from_json_file("tmp.json")?;
//!
//! verify_attributes(mesh, &schema)?;
//! let attrs = extract(mesh, &schema, EngineProfile::Unreal)?;
//! let packed = pack(&attrs, &schema, mesh.loop_vertex_indices())?;
//!
//! println!(
//!     "{} loops -> {} vertices",
//!     packed.index_buffer.len(),
//!     packed.vertex_count
//! );
//! # Ok(())
//! # }
//! ```
//!
//! The host application supplies the mesh through the [`MeshSource`] trait
//! and writes the resulting buffers to disk itself - the bytes are already
//! little-endian and tightly packed per the schema stride.
//!
//! [`EngineProfile`]: extract::EngineProfile
//! [`MeshSource`]: extract::MeshSource

pub mod codec;
pub mod delta;
pub mod error;
pub mod extract;
pub mod pack;
pub mod schema;

// Re-exports for convenience
pub use error::{Error, Result};

/// Prelude module for common imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::schema::{D3d11Element, DxgiFormat, ElementSchema};
    pub use crate::extract::{
        extract, verify_attributes, BlendData, EngineProfile, LoopAttributeSet, MeshSource,
    };
    pub use crate::pack::{pack, PackedMesh};
    pub use crate::delta::{
        apply_delta, encode_delta, encode_frames, DeltaFrame, DeltaMode, DELTA_EPSILON,
    };
}

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
