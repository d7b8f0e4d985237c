use nalgebra::Vector3;

use crate::scene::{Face, MeshObject};

/// Vertex normals of one shape: the normalized sum of the (area weighted)
/// normals of every included face touching the vertex. Vertices touched by
/// no included face, or only by degenerate ones, get a zero normal.
pub(crate) fn shape_vertex_normals(
    positions: &[[f32; 3]],
    faces: &[Face],
    include_face: impl Fn(&Face) -> bool,
) -> Vec<Vector3<f32>> {
    let mut sums = vec![Vector3::<f32>::zeros(); positions.len()];

    for face in faces.iter().filter(|face| include_face(face)) {
        let Some(normal) = face_normal(positions, face) else {
            continue;
        };
        for corner in &face.loops {
            if let Some(sum) = sums.get_mut(corner.vertex) {
                *sum += normal;
            }
        }
    }

    sums.into_iter()
        .map(|sum| sum.try_normalize(f32::EPSILON).unwrap_or_else(Vector3::zeros))
        .collect()
}

fn face_normal(positions: &[[f32; 3]], face: &Face) -> Option<Vector3<f32>> {
    let corner = |index: usize| -> Option<Vector3<f32>> {
        let vertex = face.loops.get(index)?.vertex;
        positions.get(vertex).copied().map(Vector3::from)
    };
    let origin = corner(0)?;
    let mut normal = Vector3::zeros();
    for index in 1..face.loops.len().saturating_sub(1) {
        let a = corner(index)? - origin;
        let b = corner(index + 1)? - origin;
        normal += a.cross(&b);
    }
    Some(normal)
}

/// Normal deltas (`target - reference`) for every morph target of `mesh`,
/// indexed by source vertex, in host axes.
///
/// Shape keys carry positions only, so both sides use face normals rebuilt
/// from the shape's geometry; the authored loop normals are not consulted.
///
/// `excluded_slots[slot]` removes faces of that material slot from both the
/// reference and the target normals.
pub(crate) fn morph_normal_deltas(
    mesh: &MeshObject,
    excluded_slots: &[bool],
) -> Vec<Vec<Vector3<f32>>> {
    let include = |face: &Face| !excluded_slots.get(face.material_slot).copied().unwrap_or(false);
    let reference_positions = mesh
        .shape_keys
        .first()
        .map(|key| key.positions.as_slice())
        .unwrap_or(mesh.positions.as_slice());
    let reference = shape_vertex_normals(
        &complete_shape(reference_positions, &mesh.positions),
        &mesh.faces,
        include,
    );

    mesh.morph_targets()
        .iter()
        .map(|target| {
            let target_normals = shape_vertex_normals(
                &complete_shape(&target.positions, &mesh.positions),
                &mesh.faces,
                include,
            );
            target_normals
                .iter()
                .zip(&reference)
                .map(|(target, reference)| target - reference)
                .collect()
        })
        .collect()
}

/// Shape-key positions padded with the mesh positions when the key is
/// shorter than the vertex list.
pub(crate) fn complete_shape(shape: &[[f32; 3]], base: &[[f32; 3]]) -> Vec<[f32; 3]> {
    base.iter()
        .enumerate()
        .map(|(index, fallback)| shape.get(index).copied().unwrap_or(*fallback))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Loop, ShapeKey};

    fn quad(slot: usize, vertices: [usize; 4]) -> Face {
        Face {
            material_slot: slot,
            loops: vertices
                .iter()
                .map(|&vertex| Loop {
                    vertex,
                    normal: [0.0, 0.0, 1.0],
                    uvs: Vec::new(),
                })
                .collect(),
        }
    }

    fn plane_mesh() -> MeshObject {
        let flat = vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 1.0, 0.0],
        ];
        let tilted = vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 1.0],
            [1.0, 1.0, 1.0],
            [0.0, 1.0, 0.0],
        ];
        MeshObject {
            name: "Plane".into(),
            positions: flat.clone(),
            faces: vec![quad(0, [0, 1, 2, 3])],
            material_slots: vec![Some(0)],
            shape_keys: vec![
                ShapeKey {
                    name: "Basis".into(),
                    positions: flat,
                },
                ShapeKey {
                    name: "Tilt".into(),
                    positions: tilted,
                },
            ],
            ..MeshObject::default()
        }
    }

    #[test]
    fn given_flat_quad_when_computing_normals_then_they_point_up() {
        let mesh = plane_mesh();
        let normals = shape_vertex_normals(&mesh.positions, &mesh.faces, |_| true);
        assert!(normals.iter().all(|n| *n == Vector3::z()));
    }

    #[test]
    fn given_tilted_target_when_diffing_then_delta_is_target_minus_reference() {
        let mesh = plane_mesh();

        let deltas = morph_normal_deltas(&mesh, &[false]);

        assert_eq!(deltas.len(), 1);
        let half = std::f32::consts::FRAC_1_SQRT_2;
        let expected = Vector3::new(-half, 0.0, half) - Vector3::z();
        for delta in &deltas[0] {
            assert!((delta - expected).amax() < 1e-6);
        }
    }

    #[test]
    fn given_custom_loop_normals_when_diffing_then_face_geometry_decides() {
        let mut mesh = plane_mesh();
        for corner in &mut mesh.faces[0].loops {
            corner.normal = [1.0, 0.0, 0.0];
        }

        let deltas = morph_normal_deltas(&mesh, &[false]);

        assert_eq!(deltas, morph_normal_deltas(&plane_mesh(), &[false]));
        assert!(deltas[0].iter().all(|delta| delta.x < 0.0 && delta.z < 0.0));
    }

    #[test]
    fn given_opted_out_material_when_diffing_then_deltas_are_zero() {
        let mesh = plane_mesh();
        let deltas = morph_normal_deltas(&mesh, &[true]);
        assert!(deltas[0].iter().all(|delta| *delta == Vector3::zeros()));
    }
}
