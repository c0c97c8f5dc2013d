//! Sparse delta encoding between animation frames.
//!
//! Given a base position buffer and target buffers that share the same
//! deduplicated vertex indexing (same topology, different pose), emits a
//! compact list of changed vertices plus a full-length lookup map. This is
//! the buffer pair shape-key and frame-playback mods feed to the injection
//! layer.

use glam::Vec3;
use rayon::prelude::*;

use crate::error::{Error, Result};

/// Componentwise change threshold. Deltas below this are floating-point
/// noise, not pose changes, and emitting them would bloat every frame.
pub const DELTA_EPSILON: f32 = 1e-6;

/// Whether changed values store the difference from base or the target
/// position verbatim.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeltaMode {
    /// Store `target - base`.
    #[default]
    Delta,
    /// Store the target position itself.
    Absolute,
}

/// Sparse encoding of one frame against the base pose.
#[derive(Debug, Clone, PartialEq)]
pub struct DeltaFrame {
    /// Indices of changed vertices, ascending.
    pub changed_vertex_indices: Vec<u32>,
    /// Flattened `(x, y, z)` per changed vertex, in the same order.
    pub changed_values: Vec<f32>,
    /// Full-length map: emission-order slot into `changed_values`, or `-1`
    /// for vertices unchanged from base. Length equals the vertex count.
    pub vertex_map: Vec<i32>,
    /// How `changed_values` are to be interpreted.
    pub mode: DeltaMode,
}

impl DeltaFrame {
    /// Number of changed vertices.
    #[must_use]
    pub fn changed_count(&self) -> usize {
        self.changed_vertex_indices.len()
    }

    /// True if the frame is identical to base within the epsilon.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changed_vertex_indices.is_empty()
    }
}

/// Encode one target buffer against the base.
///
/// A vertex counts as changed when any component of `target - base` exceeds
/// [`DELTA_EPSILON`] in magnitude.
///
/// # Errors
/// [`Error::TopologyMismatch`] if the buffers differ in vertex count.
pub fn encode_delta(base: &[[f32; 3]], target: &[[f32; 3]], mode: DeltaMode) -> Result<DeltaFrame> {
    if base.len() != target.len() {
        return Err(Error::TopologyMismatch {
            base: base.len(),
            target: target.len(),
        });
    }

    let mut changed_vertex_indices = Vec::new();
    let mut changed_values = Vec::new();
    let mut vertex_map = vec![-1i32; base.len()];

    for (i, (b, t)) in base.iter().zip(target).enumerate() {
        let delta = Vec3::from_array(*t) - Vec3::from_array(*b);
        if delta.abs().max_element() > DELTA_EPSILON {
            vertex_map[i] = changed_vertex_indices.len() as i32;
            changed_vertex_indices.push(i as u32);
            let value = match mode {
                DeltaMode::Delta => delta.to_array(),
                DeltaMode::Absolute => *t,
            };
            changed_values.extend_from_slice(&value);
        }
    }

    tracing::debug!(
        "Delta frame: {} of {} vertices changed",
        changed_vertex_indices.len(),
        base.len()
    );

    Ok(DeltaFrame {
        changed_vertex_indices,
        changed_values,
        vertex_map,
        mode,
    })
}

/// Reconstruct the target buffer from base plus a frame.
///
/// Inverse of [`encode_delta`]: unchanged vertices come from base verbatim.
#[must_use]
pub fn apply_delta(base: &[[f32; 3]], frame: &DeltaFrame) -> Vec<[f32; 3]> {
    base.iter()
        .zip(&frame.vertex_map)
        .map(|(b, &slot)| {
            if slot < 0 {
                *b
            } else {
                let v = &frame.changed_values[slot as usize * 3..slot as usize * 3 + 3];
                match frame.mode {
                    DeltaMode::Delta => [b[0] + v[0], b[1] + v[1], b[2] + v[2]],
                    DeltaMode::Absolute => [v[0], v[1], v[2]],
                }
            }
        })
        .collect()
}

/// Encode several frames against one base. Frames are independent (no shared
/// mutable state), so they encode in parallel.
///
/// # Errors
/// [`Error::TopologyMismatch`] if any frame differs in vertex count.
pub fn encode_frames(
    base: &[[f32; 3]],
    targets: &[Vec<[f32; 3]>],
    mode: DeltaMode,
) -> Result<Vec<DeltaFrame>> {
    targets
        .par_iter()
        .map(|target| encode_delta(base, target, mode))
        .collect()
}
