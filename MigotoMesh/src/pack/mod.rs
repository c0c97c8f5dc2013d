//! Vertex packing and deduplication.
//!
//! Assembles the extracted per-element arrays into one interleaved byte
//! record per loop, deduplicates identical records into a dense vertex list,
//! and emits the index buffer plus per-category vertex buffers the target
//! engine ingests. Hash-map based, O(loop count) - real inputs run to
//! hundreds of thousands of loops.

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::error::{Error, Result};
use crate::extract::LoopAttributeSet;
use crate::schema::ElementSchema;

/// Composite deduplication key: the interleaved attribute bytes of one loop
/// plus its source vertex id.
///
/// The source vertex id is part of equality on purpose: two loops with
/// identical shading bytes but different source vertices must stay distinct,
/// because downstream per-vertex remapping (frame deltas, shape keys) has to
/// trace each unique vertex back to exactly one source vertex.
#[derive(PartialEq, Eq, Hash)]
struct LoopKey<'a> {
    row: &'a [u8],
    source_vertex: u32,
}

/// The packed output of one mesh: index buffer, per-category vertex buffers,
/// and the mappings back to loops and source vertices.
///
/// Buffer bytes are little-endian and tightly packed per the schema stride -
/// no header, no padding. Invariants: every `index_buffer` value is
/// `< vertex_count`; each category buffer is `vertex_count × category stride`
/// bytes; triangle winding is reversed relative to the source mesh.
#[derive(Debug, Clone)]
pub struct PackedMesh {
    /// Triangle-list indices, one per loop, winding-flipped.
    pub index_buffer: Vec<u32>,
    /// Category name → contiguous vertex buffer bytes, in schema category order.
    pub category_buffers: IndexMap<String, Vec<u8>>,
    /// Number of deduplicated vertices.
    pub vertex_count: usize,
    /// Dense unique-vertex index of each loop.
    pub loop_to_unique: Vec<u32>,
    /// Source vertex id of each unique vertex (from the loop that first
    /// produced its key).
    pub unique_to_source_vertex: Vec<u32>,
}

/// Interleave, deduplicate and slice the extracted attributes into the final
/// buffer set.
///
/// Dense indices are assigned in first-occurrence order, so identical input
/// always yields identical output.
///
/// # Errors
/// - [`Error::NotTriangulated`] if the loop count is not a multiple of 3.
/// - [`Error::LoopIndexMismatch`] if the index slice does not cover every
///   loop of the extracted attributes.
/// - [`Error::RowSizeMismatch`] if an element's data does not match the
///   schema's declared widths (an extractor/schema bug, never recoverable).
pub fn pack(
    attrs: &LoopAttributeSet,
    schema: &ElementSchema,
    loop_vertex_indices: &[u32],
) -> Result<PackedMesh> {
    let loop_count = attrs.loop_count();
    if loop_count % 3 != 0 {
        return Err(Error::NotTriangulated { loop_count });
    }
    if loop_vertex_indices.len() != loop_count {
        return Err(Error::LoopIndexMismatch {
            indices: loop_vertex_indices.len(),
            loops: loop_count,
        });
    }

    let stride = schema.total_stride();

    // Interleave all elements in schema order into fixed-width records.
    let mut rows = vec![0u8; loop_count * stride];
    for (index, element) in schema.ordered_fields().iter().enumerate() {
        let expected = loop_count * element.byte_width;
        let bytes = attrs.field(&element.name).ok_or_else(|| Error::RowSizeMismatch {
            element: element.name.clone(),
            actual: 0,
            expected,
        })?;
        if bytes.len() != expected {
            return Err(Error::RowSizeMismatch {
                element: element.name.clone(),
                actual: bytes.len(),
                expected,
            });
        }

        let offset = schema.offset_of(index);
        let width = element.byte_width;
        for i in 0..loop_count {
            let dst = i * stride + offset;
            rows[dst..dst + width].copy_from_slice(&bytes[i * width..(i + 1) * width]);
        }
    }

    // Deduplicate on (record bytes, source vertex id), first occurrence wins.
    let mut key_to_unique: HashMap<LoopKey<'_>, u32> = HashMap::with_capacity(loop_count);
    let mut loop_to_unique = Vec::with_capacity(loop_count);
    let mut unique_first_loop: Vec<u32> = Vec::new();
    let mut unique_to_source_vertex: Vec<u32> = Vec::new();

    for i in 0..loop_count {
        let key = LoopKey {
            row: &rows[i * stride..(i + 1) * stride],
            source_vertex: loop_vertex_indices[i],
        };
        let next = unique_first_loop.len() as u32;
        let unique = *key_to_unique.entry(key).or_insert(next);
        if unique == next {
            unique_first_loop.push(i as u32);
            unique_to_source_vertex.push(loop_vertex_indices[i]);
        }
        loop_to_unique.push(unique);
    }

    let vertex_count = unique_first_loop.len();
    tracing::debug!("Packed {loop_count} loops into {vertex_count} unique vertices");

    // Index buffer: per source triangle, the 3 dense indices in reversed
    // order. The host mesh's front-face winding is opposite the target
    // engine's convention.
    let mut index_buffer = Vec::with_capacity(loop_count);
    for triangle in loop_to_unique.chunks_exact(3) {
        index_buffer.push(triangle[2]);
        index_buffer.push(triangle[1]);
        index_buffer.push(triangle[0]);
    }

    // Slice the deduplicated records into one contiguous buffer per category.
    let mut category_buffers: IndexMap<String, Vec<u8>> = IndexMap::new();
    for category in schema.categories() {
        let ranges: Vec<(usize, usize)> = schema
            .ordered_fields()
            .iter()
            .enumerate()
            .filter(|(_, e)| e.category == category)
            .map(|(i, e)| (schema.offset_of(i), e.byte_width))
            .collect();

        let category_stride: usize = ranges.iter().map(|(_, w)| w).sum();
        let mut buffer = Vec::with_capacity(vertex_count * category_stride);
        for &first_loop in &unique_first_loop {
            let row = &rows[first_loop as usize * stride..(first_loop as usize + 1) * stride];
            for &(offset, width) in &ranges {
                buffer.extend_from_slice(&row[offset..offset + width]);
            }
        }
        category_buffers.insert(category.to_string(), buffer);
    }

    Ok(PackedMesh {
        index_buffer,
        category_buffers,
        vertex_count,
        loop_to_unique,
        unique_to_source_vertex,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{self, EngineProfile};
    use crate::schema::{D3d11Element, DxgiFormat, ElementSchema};
    use pretty_assertions::assert_eq;

    fn position_schema() -> ElementSchema {
        ElementSchema::new(vec![D3d11Element {
            name: "POSITION".into(),
            semantic_index: 0,
            format: DxgiFormat::R32G32B32Float,
            byte_width: 12,
            category: "Position".into(),
        }])
        .unwrap()
    }

    fn triangle_attrs(mesh: &crate::extract::tests::TestMesh, schema: &ElementSchema) -> LoopAttributeSet {
        extract::extract(mesh, schema, EngineProfile::Unity).unwrap()
    }

    #[test]
    fn single_triangle_packs_to_three_vertices_reversed() {
        let mesh = crate::extract::tests::TestMesh::triangle();
        let schema = position_schema();
        let attrs = triangle_attrs(&mesh, &schema);

        let packed = pack(&attrs, &schema, &mesh.loop_vertex_indices).unwrap();
        assert_eq!(packed.vertex_count, 3);
        assert_eq!(packed.index_buffer, vec![2, 1, 0]);
        assert_eq!(packed.loop_to_unique, vec![0, 1, 2]);
        assert_eq!(packed.unique_to_source_vertex, vec![0, 1, 2]);
        assert_eq!(packed.category_buffers["Position"].len(), 36);
    }

    #[test]
    fn identical_bytes_same_vertex_collapse() {
        let mut mesh = crate::extract::tests::TestMesh::triangle();
        // two triangles sharing vertex ids and positions: 6 loops, 3 unique
        mesh.loop_vertex_indices = vec![0, 1, 2, 0, 1, 2];
        mesh.normals = vec![[0.0, 0.0, 1.0]; 6];
        mesh.tangents = vec![[1.0, 0.0, 0.0]; 6];
        mesh.bitangent_signs = vec![1.0; 6];
        mesh.bitangents = vec![[0.0, 1.0, 0.0]; 6];
        let schema = position_schema();
        let attrs = triangle_attrs(&mesh, &schema);

        let packed = pack(&attrs, &schema, &mesh.loop_vertex_indices).unwrap();
        assert_eq!(packed.vertex_count, 3);
        assert_eq!(packed.index_buffer, vec![2, 1, 0, 2, 1, 0]);
    }

    #[test]
    fn identical_bytes_different_vertex_stay_distinct() {
        let mut mesh = crate::extract::tests::TestMesh::triangle();
        // vertices 0 and 1 share identical coordinates but keep separate ids
        mesh.positions = vec![[0.0, 0.0, 0.0], [0.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
        let schema = position_schema();
        let attrs = triangle_attrs(&mesh, &schema);

        let packed = pack(&attrs, &schema, &mesh.loop_vertex_indices).unwrap();
        assert_eq!(packed.vertex_count, 3);
        assert_eq!(packed.unique_to_source_vertex, vec![0, 1, 2]);
    }

    #[test]
    fn packing_is_deterministic() {
        let mesh = crate::extract::tests::TestMesh::triangle();
        let schema = position_schema();
        let attrs = triangle_attrs(&mesh, &schema);

        let a = pack(&attrs, &schema, &mesh.loop_vertex_indices).unwrap();
        let b = pack(&attrs, &schema, &mesh.loop_vertex_indices).unwrap();
        assert_eq!(a.loop_to_unique, b.loop_to_unique);
        assert_eq!(a.category_buffers["Position"], b.category_buffers["Position"]);
    }

    #[test]
    fn non_triangulated_loop_count_rejected() {
        let mut mesh = crate::extract::tests::TestMesh::triangle();
        mesh.loop_vertex_indices = vec![0, 1, 2, 0];
        mesh.normals = vec![[0.0, 0.0, 1.0]; 4];
        mesh.tangents = vec![[1.0, 0.0, 0.0]; 4];
        mesh.bitangent_signs = vec![1.0; 4];
        mesh.bitangents = vec![[0.0, 1.0, 0.0]; 4];
        let schema = position_schema();
        let attrs = triangle_attrs(&mesh, &schema);

        let result = pack(&attrs, &schema, &mesh.loop_vertex_indices);
        assert!(matches!(result, Err(Error::NotTriangulated { loop_count: 4 })));
    }

    #[test]
    fn short_loop_index_slice_rejected() {
        let mesh = crate::extract::tests::TestMesh::triangle();
        let schema = position_schema();
        let attrs = triangle_attrs(&mesh, &schema);

        let result = pack(&attrs, &schema, &mesh.loop_vertex_indices[..2]);
        assert!(matches!(
            result,
            Err(Error::LoopIndexMismatch { indices: 2, loops: 3 })
        ));
    }

    #[test]
    fn categories_split_into_separate_buffers() {
        let mut mesh = crate::extract::tests::TestMesh::triangle();
        mesh.uvs.insert("TEXCOORD.xy".into(), vec![[0.0, 0.0]; 3]);
        let schema = ElementSchema::new(vec![
            D3d11Element {
                name: "POSITION".into(),
                semantic_index: 0,
                format: DxgiFormat::R32G32B32Float,
                byte_width: 12,
                category: "Position".into(),
            },
            D3d11Element {
                name: "TEXCOORD".into(),
                semantic_index: 0,
                format: DxgiFormat::R32G32Float,
                byte_width: 8,
                category: "Texcoord".into(),
            },
        ])
        .unwrap();
        let attrs = triangle_attrs(&mesh, &schema);

        let packed = pack(&attrs, &schema, &mesh.loop_vertex_indices).unwrap();
        assert_eq!(packed.category_buffers["Position"].len(), 3 * 12);
        assert_eq!(packed.category_buffers["Texcoord"].len(), 3 * 8);
    }
}
