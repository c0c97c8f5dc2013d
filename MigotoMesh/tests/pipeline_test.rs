//! End-to-end pipeline tests: schema → extract → pack → delta.

use std::collections::BTreeMap;

use migotomesh::prelude::*;
use pretty_assertions::assert_eq;

/// Two triangles forming a quad: 4 vertices, 6 loops, shared corners carry
/// identical shading attributes so they deduplicate.
struct QuadMesh {
    positions: Vec<[f32; 3]>,
    loop_vertex_indices: Vec<u32>,
    normals: Vec<[f32; 3]>,
    tangents: Vec<[f32; 3]>,
    bitangent_signs: Vec<f32>,
    bitangents: Vec<[f32; 3]>,
    colors: BTreeMap<String, Vec<[f32; 4]>>,
    uvs: BTreeMap<String, Vec<[f32; 2]>>,
}

impl QuadMesh {
    fn new() -> Self {
        let positions = vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 1.0, 0.0],
        ];
        let loop_vertex_indices = vec![0, 1, 2, 0, 2, 3];
        let loop_count = loop_vertex_indices.len();

        // UVs follow the vertex, so shared corners have identical bytes
        let uv_per_loop: Vec<[f32; 2]> = loop_vertex_indices
            .iter()
            .map(|&v| [positions[v as usize][0], positions[v as usize][1]])
            .collect();

        let mut uvs = BTreeMap::new();
        uvs.insert("TEXCOORD.xy".to_string(), uv_per_loop);

        let mut colors = BTreeMap::new();
        colors.insert("COLOR".to_string(), vec![[1.0, 1.0, 1.0, 1.0]; loop_count]);

        Self {
            positions,
            loop_vertex_indices,
            normals: vec![[0.0, 0.0, 1.0]; loop_count],
            tangents: vec![[1.0, 0.0, 0.0]; loop_count],
            bitangent_signs: vec![1.0; loop_count],
            bitangents: vec![[0.0, 1.0, 0.0]; loop_count],
            colors,
            uvs,
        }
    }
}

impl MeshSource for QuadMesh {
    fn vertex_count(&self) -> usize {
        self.positions.len()
    }
    fn loop_count(&self) -> usize {
        self.loop_vertex_indices.len()
    }
    fn vertex_positions(&self) -> &[[f32; 3]] {
        &self.positions
    }
    fn loop_vertex_indices(&self) -> &[u32] {
        &self.loop_vertex_indices
    }
    fn loop_normals(&self) -> &[[f32; 3]] {
        &self.normals
    }
    fn loop_tangents(&self) -> &[[f32; 3]] {
        &self.tangents
    }
    fn loop_bitangent_signs(&self) -> &[f32] {
        &self.bitangent_signs
    }
    fn loop_bitangents(&self) -> &[[f32; 3]] {
        &self.bitangents
    }
    fn vertex_colors(&self, layer: &str) -> Option<&[[f32; 4]]> {
        self.colors.get(layer).map(Vec::as_slice)
    }
    fn uv_layer(&self, name: &str) -> Option<&[[f32; 2]]> {
        self.uvs.get(name).map(Vec::as_slice)
    }
    fn blend_weights_indices(&self, _max_influences: usize) -> Result<BlendData> {
        let loop_count = self.loop_count();
        Ok(BlendData {
            influences_per_slot: 4,
            weights: BTreeMap::from([(0, [1.0, 0.0, 0.0, 0.0].repeat(loop_count))]),
            indices: BTreeMap::from([(0, [2u32, 0, 0, 0].repeat(loop_count))]),
        })
    }
}

const SCHEMA_JSON: &str = r#"{
    "WorkGameType": "WWMI",
    "D3D11ElementList": [
        {"ElementName": "POSITION", "SemanticIndex": 0, "Format": "R32G32B32_FLOAT", "ByteWidth": 12, "Category": "Position"},
        {"ElementName": "NORMAL", "SemanticIndex": 0, "Format": "R8G8B8A8_SNORM", "ByteWidth": 4, "Category": "Vertex"},
        {"ElementName": "TANGENT", "SemanticIndex": 0, "Format": "R32G32B32A32_FLOAT", "ByteWidth": 16, "Category": "Vertex"},
        {"ElementName": "COLOR", "SemanticIndex": 0, "Format": "R8G8B8A8_UNORM", "ByteWidth": 4, "Category": "Vertex"},
        {"ElementName": "TEXCOORD", "SemanticIndex": 0, "Format": "R32G32_FLOAT", "ByteWidth": 8, "Category": "Vertex"},
        {"ElementName": "BLENDWEIGHT", "SemanticIndex": 0, "Format": "R8G8B8A8_UNORM", "ByteWidth": 4, "Category": "Blend"},
        {"ElementName": "BLENDINDICES", "SemanticIndex": 0, "Format": "R8G8B8A8_UINT", "ByteWidth": 4, "Category": "Blend"}
    ]
}"#;

fn packed_quad() -> (QuadMesh, ElementSchema, PackedMesh) {
    let mesh = QuadMesh::new();
    let schema = ElementSchema::from_json_str(SCHEMA_JSON).unwrap();
    verify_attributes(&mesh, &schema).unwrap();
    let attrs = extract(&mesh, &schema, EngineProfile::Unreal).unwrap();
    let packed = pack(&attrs, &schema, mesh.loop_vertex_indices()).unwrap();
    (mesh, schema, packed)
}

#[test]
fn quad_dedups_shared_corners() {
    let (_, _, packed) = packed_quad();

    assert_eq!(packed.vertex_count, 4);
    assert_eq!(packed.loop_to_unique, vec![0, 1, 2, 0, 2, 3]);
    assert_eq!(packed.unique_to_source_vertex, vec![0, 1, 2, 3]);
}

#[test]
fn index_buffer_covers_all_loops_with_reversed_winding() {
    let (_, _, packed) = packed_quad();

    assert_eq!(packed.index_buffer.len(), 6);
    assert!(packed.index_buffer.iter().all(|&i| (i as usize) < packed.vertex_count));
    // each source triangle's dense indices come out reversed
    assert_eq!(packed.index_buffer, vec![2, 1, 0, 3, 2, 0]);
}

#[test]
fn category_buffers_have_declared_strides() {
    let (_, schema, packed) = packed_quad();

    for category in ["Position", "Vertex", "Blend"] {
        let stride = schema.stride_of(category).unwrap();
        assert_eq!(
            packed.category_buffers[category].len(),
            packed.vertex_count * stride,
            "category {category}"
        );
    }
}

#[test]
fn position_buffer_round_trips_to_source_coordinates() {
    let (mesh, _, packed) = packed_quad();

    let floats: &[f32] = bytemuck::cast_slice(&packed.category_buffers["Position"]);
    for (unique, &source_vertex) in packed.unique_to_source_vertex.iter().enumerate() {
        let decoded = &floats[unique * 3..unique * 3 + 3];
        assert_eq!(decoded, &mesh.positions[source_vertex as usize]);
    }
}

#[test]
fn blend_bytes_encode_unit_weights_and_indices() {
    let (_, schema, packed) = packed_quad();

    let stride = schema.stride_of("Blend").unwrap();
    assert_eq!(stride, 8);
    for vertex in packed.category_buffers["Blend"].chunks_exact(stride) {
        let weight_sum: u32 = vertex[..4].iter().map(|&b| u32::from(b)).sum();
        assert_eq!(weight_sum, 255);
        assert_eq!(&vertex[4..], &[2, 0, 0, 0]);
    }
}

#[test]
fn delta_frames_over_packed_positions() {
    let (_, _, packed) = packed_quad();

    let base: Vec<[f32; 3]> = bytemuck::cast_slice::<u8, f32>(&packed.category_buffers["Position"])
        .chunks_exact(3)
        .map(|c| [c[0], c[1], c[2]])
        .collect();

    let mut target = base.clone();
    target[2][2] += 0.5;

    let frames = encode_frames(&base, &[base.clone(), target.clone()], DeltaMode::Delta).unwrap();
    assert!(frames[0].is_empty());
    assert_eq!(frames[1].changed_vertex_indices, vec![2]);
    assert_eq!(frames[1].vertex_map, vec![-1, -1, 0, -1]);
    assert_eq!(apply_delta(&base, &frames[1]), target);
}

#[test]
fn malformed_schema_byte_width_is_rejected() {
    let json = r#"{
        "D3D11ElementList": [
            {"ElementName": "POSITION", "Format": "R32G32B32A32_FLOAT", "ByteWidth": 8, "Category": "Position"}
        ]
    }"#;
    assert!(matches!(
        ElementSchema::from_json_str(json),
        Err(Error::Schema { .. })
    ));
}
