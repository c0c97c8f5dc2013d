//! The abstract host-mesh collaborator.
//!
//! The host application (a DCC tool, an engine extraction layer, a file
//! loader) owns the real mesh representation; the pipeline only needs the
//! per-vertex and per-loop accessors below. A *loop* is one mesh-corner
//! attribute record - a shared vertex may have several loops with different
//! normals or UVs.

use std::collections::BTreeMap;

use crate::error::Result;

/// Precomputed skinning data, grouped by semantic slot.
///
/// Slot `n` holds the data for `BLENDWEIGHT`/`BLENDINDICES` semantic index
/// `n`. Each slot's array is flattened per-loop with [`influences_per_slot`]
/// values per loop: `slots[s][loop * influences_per_slot + k]`.
///
/// [`influences_per_slot`]: BlendData::influences_per_slot
#[derive(Debug, Clone, Default)]
pub struct BlendData {
    /// Values per loop in each slot array.
    pub influences_per_slot: usize,
    /// Slot → flattened per-loop weights.
    pub weights: BTreeMap<u32, Vec<f32>>,
    /// Slot → flattened per-loop vertex-group indices.
    pub indices: BTreeMap<u32, Vec<u32>>,
}

/// Read access to the source mesh's attribute arrays.
///
/// Contract: all per-loop slices have length `loop_count()`, all per-vertex
/// slices have length `vertex_count()`, and every value in
/// `loop_vertex_indices()` is `< vertex_count()`. The mesh must be
/// triangulated - loops come in polygon order, three per triangle.
pub trait MeshSource {
    /// Number of distinct vertices.
    fn vertex_count(&self) -> usize;

    /// Number of loops (face corners). Three per triangle.
    fn loop_count(&self) -> usize;

    /// Undeformed vertex coordinates, per vertex.
    fn vertex_positions(&self) -> &[[f32; 3]];

    /// Source vertex id of each loop.
    fn loop_vertex_indices(&self) -> &[u32];

    /// Split normals, per loop.
    fn loop_normals(&self) -> &[[f32; 3]];

    /// Tangents, per loop.
    fn loop_tangents(&self) -> &[[f32; 3]];

    /// Bitangent signs (`+1.0` / `-1.0`), per loop.
    fn loop_bitangent_signs(&self) -> &[f32];

    /// Bitangents, per loop.
    fn loop_bitangents(&self) -> &[[f32; 3]];

    /// RGBA color layer by name, per loop. `None` if the layer is absent.
    fn vertex_colors(&self, layer: &str) -> Option<&[[f32; 4]]>;

    /// UV layer by name (`TEXCOORD.xy` convention), per loop. `None` if the
    /// layer is absent.
    fn uv_layer(&self, name: &str) -> Option<&[[f32; 2]]>;

    /// Precompute per-loop blend weights and vertex-group indices, capped at
    /// `max_influences` influences per vertex.
    ///
    /// # Errors
    /// Returns an error if the host cannot provide skinning data at all.
    fn blend_weights_indices(&self, max_influences: usize) -> Result<BlendData>;
}
