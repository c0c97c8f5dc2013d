//! Attribute extraction.
//!
//! Reads the abstract mesh source's per-loop and per-vertex attributes and
//! produces, for every element of the schema, a per-loop array already
//! byte-encoded to the element's target format. Engine-specific sign and
//! axis conventions come from the [`EngineProfile`] passed in - never from
//! global state.

mod mesh_source;
mod profile;

pub use mesh_source::{BlendData, MeshSource};
pub use profile::EngineProfile;

use std::borrow::Cow;

use byteorder::{LittleEndian, WriteBytesExt};
use indexmap::IndexMap;

use crate::codec;
use crate::error::{Error, Result};
use crate::schema::{D3d11Element, DxgiFormat, ElementSchema};

/// Per-loop attribute data, byte-encoded per element.
///
/// Transient: produced once per mesh per schema and consumed immediately by
/// [`pack`](crate::pack::pack).
#[derive(Debug, Clone)]
pub struct LoopAttributeSet {
    loop_count: usize,
    fields: IndexMap<String, Vec<u8>>,
}

impl LoopAttributeSet {
    /// Number of loops each field covers.
    #[must_use]
    pub fn loop_count(&self) -> usize {
        self.loop_count
    }

    /// Encoded bytes for one element, `loop_count × byte_width` long.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&[u8]> {
        self.fields.get(name).map(Vec::as_slice)
    }

    /// All fields in schema order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

/// Pre-flight check that the source mesh can satisfy the schema.
///
/// Reports the first missing required COLOR layer and missing skinning data
/// for BLENDINDICES, so a batch caller can reject a mesh before paying for
/// extraction. UV layers are only warned about: absent TEXCOORD halves are
/// zero-filled during extraction, not errors.
///
/// # Errors
/// [`Error::MissingAttribute`] or [`Error::NoVertexGroup`].
pub fn verify_attributes(mesh: &dyn MeshSource, schema: &ElementSchema) -> Result<()> {
    // Precomputed once: hosts may pay a full skinning pass per call.
    let blend = if schema
        .ordered_fields()
        .iter()
        .any(|e| e.name.starts_with("BLENDINDICES"))
    {
        Some(mesh.blend_weights_indices(4)?)
    } else {
        None
    };

    for element in schema.ordered_fields() {
        if element.name.starts_with("COLOR") && mesh.vertex_colors(&element.name).is_none() {
            return Err(Error::MissingAttribute {
                element: element.name.clone(),
                layer: element.name.clone(),
            });
        }

        if element.name.starts_with("TEXCOORD") {
            let xy = format!("{}.xy", element.name);
            if mesh.uv_layer(&xy).is_none() {
                tracing::warn!("mesh has no UV layer '{}': TEXCOORD half will be zero-filled", xy);
            }
        }

        if element.name.starts_with("BLENDINDICES") {
            let has_slot0 = blend.as_ref().is_some_and(|b| b.indices.contains_key(&0));
            if !has_slot0 {
                return Err(Error::NoVertexGroup {
                    element: element.name.clone(),
                });
            }
        }
    }
    Ok(())
}

/// Extract every schema element from the mesh into byte-encoded per-loop
/// arrays.
///
/// # Errors
/// - [`Error::MissingAttribute`] if a required COLOR layer is absent.
/// - [`Error::NoVertexGroup`] if skinning data is required but slot 0 has none.
/// - [`Error::IndexOverflow`] if a blend index exceeds the target width.
/// - [`Error::UnsupportedFormat`] if the schema names a format the element
///   type does not implement.
pub fn extract(
    mesh: &dyn MeshSource,
    schema: &ElementSchema,
    profile: EngineProfile,
) -> Result<LoopAttributeSet> {
    let loop_count = mesh.loop_count();
    let needs_blend = schema
        .ordered_fields()
        .iter()
        .any(|e| e.name.starts_with("BLENDINDICES") || e.name.starts_with("BLENDWEIGHT"));

    let blend = if needs_blend {
        let max_influences = if profile.blend_influences_from_schema() {
            let n = schema.blend_influence_count();
            if n == 0 { 4 } else { n }
        } else {
            4
        };
        tracing::debug!("Precomputing blend data with {max_influences} influences");
        let mut data = mesh.blend_weights_indices(max_influences)?;
        if schema.has_category("Blend") {
            normalize_blend_weights(&mut data, loop_count);
        }
        Some(data)
    } else {
        None
    };

    let mut fields = IndexMap::with_capacity(schema.ordered_fields().len());

    for element in schema.ordered_fields() {
        let name = element.name.as_str();
        let bytes = if name.starts_with("POSITION") {
            extract_position(mesh, element)?
        } else if name.starts_with("NORMAL") {
            extract_normal(mesh, element, profile)?
        } else if name.starts_with("TANGENT") {
            extract_tangent(mesh, element, profile)?
        } else if name.starts_with("BINORMAL") {
            extract_binormal(mesh, element, profile)?
        } else if name.starts_with("COLOR") {
            extract_color(mesh, element)?
        } else if name.starts_with("TEXCOORD") {
            extract_texcoord(mesh, element)?
        } else if name.starts_with("BLENDINDICES") {
            let blend = blend.as_ref().ok_or_else(|| Error::NoVertexGroup {
                element: element.name.clone(),
            })?;
            extract_blend_indices(element, blend, loop_count)?
        } else if name.starts_with("BLENDWEIGHT") {
            let blend = blend.as_ref().ok_or_else(|| Error::NoVertexGroup {
                element: element.name.clone(),
            })?;
            extract_blend_weights(element, blend, loop_count)?
        } else {
            return Err(unsupported(element));
        };

        fields.insert(element.name.clone(), bytes);
    }

    Ok(LoopAttributeSet { loop_count, fields })
}

fn unsupported(element: &D3d11Element) -> Error {
    Error::UnsupportedFormat {
        element: element.name.clone(),
        format: element.format.to_string(),
    }
}

/// Renormalize each loop's weights to unit sum across all slots.
fn normalize_blend_weights(blend: &mut BlendData, loop_count: usize) {
    let per = blend.influences_per_slot.max(1);

    let mut sums = vec![0.0f32; loop_count];
    for values in blend.weights.values() {
        for (i, row) in values.chunks_exact(per).enumerate() {
            sums[i] += row.iter().sum::<f32>();
        }
    }

    for values in blend.weights.values_mut() {
        for (i, row) in values.chunks_exact_mut(per).enumerate() {
            if sums[i] > 0.0 {
                for w in row {
                    *w /= sums[i];
                }
            }
        }
    }
}

fn write_f32s(buf: &mut Vec<u8>, values: &[f32]) -> Result<()> {
    for &v in values {
        buf.write_f32::<LittleEndian>(v)?;
    }
    Ok(())
}

fn write_halves(buf: &mut Vec<u8>, values: &[f32]) -> Result<()> {
    for &v in values {
        buf.write_u16::<LittleEndian>(codec::f32_to_half(v))?;
    }
    Ok(())
}

fn write_snorm16s(buf: &mut Vec<u8>, values: &[f32]) -> Result<()> {
    for &v in values {
        buf.write_i16::<LittleEndian>(codec::encode_snorm16(v))?;
    }
    Ok(())
}

/// POSITION: per-vertex coordinates expanded to per-loop. 4-wide float32
/// appends a constant 0; 4-wide half appends a homogeneous 1.0.
fn extract_position(mesh: &dyn MeshSource, element: &D3d11Element) -> Result<Vec<u8>> {
    let positions = mesh.vertex_positions();
    let loop_vertex_indices = mesh.loop_vertex_indices();
    let mut buf = Vec::with_capacity(loop_vertex_indices.len() * element.byte_width);

    for &vertex in loop_vertex_indices {
        let p = positions[vertex as usize];
        match element.format {
            DxgiFormat::R32G32B32Float => write_f32s(&mut buf, &p)?,
            DxgiFormat::R32G32B32A32Float => write_f32s(&mut buf, &[p[0], p[1], p[2], 0.0])?,
            DxgiFormat::R16G16B16A16Float => write_halves(&mut buf, &[p[0], p[1], p[2], 1.0])?,
            _ => return Err(unsupported(element)),
        }
    }
    Ok(buf)
}

/// NORMAL: per-loop split normals. The fourth channel depends on the profile:
/// SNORM carries `-bitangent_sign` where the engine recovers handedness from
/// the normal, UNORM remaps components to [0, 1] and uses the profile's
/// constant.
fn extract_normal(
    mesh: &dyn MeshSource,
    element: &D3d11Element,
    profile: EngineProfile,
) -> Result<Vec<u8>> {
    let normals = mesh.loop_normals();
    let mut buf = Vec::with_capacity(normals.len() * element.byte_width);

    match element.format {
        DxgiFormat::R16G16B16A16Float => {
            for n in normals {
                write_halves(&mut buf, &[n[0], n[1], n[2], 1.0])?;
            }
        }
        DxgiFormat::R32G32B32A32Float => {
            for n in normals {
                write_f32s(&mut buf, &[n[0], n[1], n[2], 1.0])?;
            }
        }
        DxgiFormat::R32G32B32Float => {
            for n in normals {
                write_f32s(&mut buf, n)?;
            }
        }
        DxgiFormat::R8G8B8A8Snorm => {
            let signs = mesh.loop_bitangent_signs();
            for (i, n) in normals.iter().enumerate() {
                let w = if profile.normal_w_carries_handedness() {
                    -signs[i]
                } else {
                    1.0
                };
                buf.extend_from_slice(&codec::f32x4_to_snorm8x4([n[0], n[1], n[2], w]));
            }
        }
        DxgiFormat::R8G8B8A8Unorm => {
            // Normal data is [-1, 1]; a UNORM target implies the (n+1)/2 remap.
            let w = profile.unorm_normal_w();
            for n in normals {
                buf.extend_from_slice(&codec::f32x4_to_unorm8x4([
                    (n[0] + 1.0) * 0.5,
                    (n[1] + 1.0) * 0.5,
                    (n[2] + 1.0) * 0.5,
                    w,
                ]));
            }
        }
        _ => return Err(unsupported(element)),
    }
    Ok(buf)
}

/// TANGENT: per-loop tangents. The fourth channel is a fixed `1.0` for
/// profiles that store handedness elsewhere, or the flipped bitangent sign
/// for profiles that recover handedness from `TANGENT.w`.
fn extract_tangent(
    mesh: &dyn MeshSource,
    element: &D3d11Element,
    profile: EngineProfile,
) -> Result<Vec<u8>> {
    let tangents = mesh.loop_tangents();
    let mut buf = Vec::with_capacity(tangents.len() * element.byte_width);

    // 3-wide variant stores no handedness at all
    if element.format == DxgiFormat::R32G32B32Float {
        for t in tangents {
            write_f32s(&mut buf, t)?;
        }
        return Ok(buf);
    }

    let signs = mesh.loop_bitangent_signs();
    for (i, t) in tangents.iter().enumerate() {
        let w = if profile.tangent_w_is_fixed_one() {
            1.0
        } else {
            -signs[i]
        };
        let row = [t[0], t[1], t[2], w];
        match element.format {
            DxgiFormat::R32G32B32A32Float => write_f32s(&mut buf, &row)?,
            DxgiFormat::R16G16B16A16Float => write_halves(&mut buf, &row)?,
            DxgiFormat::R16G16B16A16Snorm => write_snorm16s(&mut buf, &row)?,
            DxgiFormat::R8G8B8A8Snorm => buf.extend_from_slice(&codec::f32x4_to_snorm8x4(row)),
            DxgiFormat::R8G8B8A8Unorm => buf.extend_from_slice(&codec::f32x4_to_unorm8x4(row)),
            _ => return Err(unsupported(element)),
        }
    }
    Ok(buf)
}

/// BINORMAL: per-loop bitangents with profile-specific axis flips and a
/// constant `1.0` fourth channel.
fn extract_binormal(
    mesh: &dyn MeshSource,
    element: &D3d11Element,
    profile: EngineProfile,
) -> Result<Vec<u8>> {
    let bitangents = mesh.loop_bitangents();
    let flip = profile.flip_binormal_xy();
    let mut buf = Vec::with_capacity(bitangents.len() * element.byte_width);

    for b in bitangents {
        let (x, y) = if flip { (-b[0], -b[1]) } else { (b[0], b[1]) };
        let row = [x, y, b[2], 1.0];
        match element.format {
            DxgiFormat::R32G32B32A32Float => write_f32s(&mut buf, &row)?,
            DxgiFormat::R16G16B16A16Snorm => write_snorm16s(&mut buf, &row)?,
            _ => return Err(unsupported(element)),
        }
    }
    Ok(buf)
}

/// COLOR*: per-loop RGBA floats. The 2-component UNORM16 variant packs only
/// the first two channels (lossy by design: the smoothed-normal-in-UV-channel
/// workaround stores two half floats there).
fn extract_color(mesh: &dyn MeshSource, element: &D3d11Element) -> Result<Vec<u8>> {
    let colors = mesh.vertex_colors(&element.name).ok_or_else(|| Error::MissingAttribute {
        element: element.name.clone(),
        layer: element.name.clone(),
    })?;
    let mut buf = Vec::with_capacity(colors.len() * element.byte_width);

    match element.format {
        DxgiFormat::R32G32B32A32Float => {
            for c in colors {
                write_f32s(&mut buf, c)?;
            }
        }
        DxgiFormat::R16G16B16A16Float => {
            for c in colors {
                write_halves(&mut buf, c)?;
            }
        }
        DxgiFormat::R8G8B8A8Unorm => {
            for c in colors {
                buf.extend_from_slice(&codec::f32x4_to_unorm8x4(*c));
            }
        }
        DxgiFormat::R16G16Float => {
            for c in colors {
                write_halves(&mut buf, &c[..2])?;
            }
        }
        DxgiFormat::R16G16Unorm => {
            for c in colors {
                for v in codec::f32x2_to_unorm16x2([c[0], c[1]]) {
                    buf.write_u16::<LittleEndian>(v)?;
                }
            }
        }
        _ => return Err(unsupported(element)),
    }
    Ok(buf)
}

/// TEXCOORD*: UV halves named `<element>.xy` / `<element>.zw`. The V channel
/// is flipped (`1 - v`) to match the target coordinate convention. An absent
/// half is zero-filled so the record stride never changes.
fn extract_texcoord(mesh: &dyn MeshSource, element: &D3d11Element) -> Result<Vec<u8>> {
    let components = element.component_count();
    let halves: &[&str] = if components >= 4 { &[".xy", ".zw"] } else { &[".xy"] };

    let loop_count = mesh.loop_count();
    let mut values = vec![0.0f32; loop_count * components];

    for (half, suffix) in halves.iter().enumerate() {
        let layer = format!("{}{suffix}", element.name);
        if let Some(uvs) = mesh.uv_layer(&layer) {
            for (i, uv) in uvs.iter().enumerate() {
                values[i * components + half * 2] = uv[0];
                values[i * components + half * 2 + 1] = 1.0 - uv[1];
            }
        } else {
            tracing::debug!("UV layer '{layer}' absent, half left zero-filled");
        }
    }

    let mut buf = Vec::with_capacity(loop_count * element.byte_width);
    match element.format {
        DxgiFormat::R32G32Float | DxgiFormat::R32G32B32A32Float => write_f32s(&mut buf, &values)?,
        DxgiFormat::R16G16Float | DxgiFormat::R16G16B16A16Float => write_halves(&mut buf, &values)?,
        _ => return Err(unsupported(element)),
    }
    Ok(buf)
}

/// Fetch a blend slot's values, falling back to an all-zero array shaped
/// like slot 0 for missing slots beyond 0. Missing slot 0 is fatal.
fn blend_slot<'a, T: Copy + Default>(
    slots: &'a std::collections::BTreeMap<u32, Vec<T>>,
    element: &D3d11Element,
) -> Result<Cow<'a, [T]>> {
    if let Some(values) = slots.get(&element.semantic_index) {
        return Ok(Cow::Borrowed(values));
    }
    let slot0 = slots.get(&0).ok_or_else(|| Error::NoVertexGroup {
        element: element.name.clone(),
    })?;
    tracing::debug!(
        "blend slot {} absent for '{}', using zero fill",
        element.semantic_index,
        element.name
    );
    Ok(Cow::Owned(vec![T::default(); slot0.len()]))
}

/// BLENDINDICES*: vertex-group indices. Narrow integer targets are validated,
/// never truncated - an index the format cannot hold is a fatal overflow.
fn extract_blend_indices(
    element: &D3d11Element,
    blend: &BlendData,
    loop_count: usize,
) -> Result<Vec<u8>> {
    let values = blend_slot(&blend.indices, element)?;
    let per = blend.influences_per_slot.max(1);
    let needed = element.component_count();

    let check = |index: u32, max: u32| -> Result<u32> {
        if index > max {
            return Err(Error::IndexOverflow {
                element: element.name.clone(),
                index,
                max,
                format: element.format.to_string(),
            });
        }
        Ok(index)
    };

    let mut buf = Vec::with_capacity(loop_count * element.byte_width);
    for i in 0..loop_count {
        let row = &values[i * per..(i + 1) * per];
        for k in 0..needed {
            let index = if k < per { row[k] } else { 0 };
            match element.format {
                DxgiFormat::R32G32B32A32Uint
                | DxgiFormat::R32G32B32A32Sint
                | DxgiFormat::R32G32Uint
                | DxgiFormat::R32G32Sint
                | DxgiFormat::R32Uint
                | DxgiFormat::R32Sint => buf.write_u32::<LittleEndian>(index)?,
                DxgiFormat::R16G16B16A16Uint | DxgiFormat::R16Uint => {
                    buf.write_u16::<LittleEndian>(check(index, u32::from(u16::MAX))? as u16)?;
                }
                DxgiFormat::R8G8B8A8Uint | DxgiFormat::R8Uint => {
                    buf.write_u8(check(index, u32::from(u8::MAX))? as u8)?;
                }
                _ => return Err(unsupported(element)),
            }
        }
    }
    Ok(buf)
}

/// BLENDWEIGHT*: per-loop weights, already renormalized to unit sum when the
/// schema declares a "Blend" category. UNORM8 targets go through the
/// renormalizing weight encoder so each byte row sums to 255.
fn extract_blend_weights(
    element: &D3d11Element,
    blend: &BlendData,
    loop_count: usize,
) -> Result<Vec<u8>> {
    let values = blend_slot(&blend.weights, element)?;
    let per = blend.influences_per_slot.max(1);
    let needed = element.component_count();

    let mut buf = Vec::with_capacity(loop_count * element.byte_width);
    let mut row = vec![0.0f32; needed];
    for i in 0..loop_count {
        let slot_row = &values[i * per..(i + 1) * per];
        for (k, value) in row.iter_mut().enumerate() {
            *value = if k < per { slot_row[k] } else { 0.0 };
        }
        match element.format {
            DxgiFormat::R32G32B32A32Float | DxgiFormat::R32G32Float => write_f32s(&mut buf, &row)?,
            DxgiFormat::R16G16B16A16Float => write_halves(&mut buf, &row)?,
            DxgiFormat::R8G8B8A8Snorm => {
                buf.extend_from_slice(&codec::f32x4_to_snorm8x4([row[0], row[1], row[2], row[3]]));
            }
            DxgiFormat::R8G8B8A8Unorm | DxgiFormat::R8Unorm => {
                buf.extend_from_slice(&codec::encode_unorm8_weights(&row));
            }
            _ => return Err(unsupported(element)),
        }
    }
    Ok(buf)
}
