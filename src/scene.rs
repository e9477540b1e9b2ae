use crate::frame::FramePlan;

const SQRT_3: f32 = 1.732_050_8;

pub const CLEAR_COLOR: [f32; 4] = [0.07, 0.13, 0.17, 1.0];
pub const FLAT_COLOR: [f32; 4] = [0.8, 0.3, 0.02, 1.0];
pub const VERTEX_COLOR: [f32; 4] = [1.0, 0.0, 0.0, 1.0];

#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(C)]
pub struct Vertex {
    pub position: [f32; 3],
}

/// Equilateral triangle centered on the origin.
pub const TRIANGLE: [Vertex; 3] = [
    Vertex {
        position: [-0.5, -0.5 * SQRT_3 / 3.0, 0.0],
    },
    Vertex {
        position: [0.5, -0.5 * SQRT_3 / 3.0, 0.0],
    },
    Vertex {
        position: [0.0, 0.5 * SQRT_3 * 2.0 / 3.0, 0.0],
    },
];

const FLAT_VERT: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/flat.vert.spv"));
const FLAT_FRAG: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/flat.frag.spv"));
const COLORED_VERT: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/colored.vert.spv"));
const COLORED_FRAG: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/colored.frag.spv"));

/// SPIR-V for one vertex/fragment pair.
#[derive(Debug, Clone, Copy)]
pub struct Shaders {
    pub vertex: &'static [u8],
    pub fragment: &'static [u8],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    /// Background color only, nothing is drawn.
    Background,
    /// Triangle with a constant fragment color.
    Flat,
    /// Triangle colored by its vertex stage.
    Colored,
}

impl Variant {
    pub fn name(self) -> &'static str {
        match self {
            Variant::Background => "background",
            Variant::Flat => "flat",
            Variant::Colored => "colored",
        }
    }

    pub fn shaders(self) -> Option<Shaders> {
        match self {
            Variant::Background => None,
            Variant::Flat => Some(Shaders {
                vertex: FLAT_VERT,
                fragment: FLAT_FRAG,
            }),
            Variant::Colored => Some(Shaders {
                vertex: COLORED_VERT,
                fragment: COLORED_FRAG,
            }),
        }
    }

    /// Color of every pixel covered by the triangle.
    pub fn triangle_color(self) -> Option<[f32; 4]> {
        match self {
            Variant::Background => None,
            Variant::Flat => Some(FLAT_COLOR),
            Variant::Colored => Some(VERTEX_COLOR),
        }
    }

    pub fn frame_plan(self) -> FramePlan {
        let plan = FramePlan::clear(CLEAR_COLOR);
        match self {
            Variant::Background => plan,
            Variant::Flat | Variant::Colored => plan.with_draw(0..TRIANGLE.len() as u32),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem;

    const ALL: [Variant; 3] = [Variant::Background, Variant::Flat, Variant::Colored];

    fn distance(a: &Vertex, b: &Vertex) -> f32 {
        a.position
            .iter()
            .zip(b.position.iter())
            .map(|(x, y)| (x - y) * (x - y))
            .sum::<f32>()
            .sqrt()
    }

    #[test]
    fn vertex_is_three_packed_floats() {
        assert_eq!(mem::size_of::<Vertex>(), 12);
        assert_eq!(mem::size_of_val(&TRIANGLE), 36);
    }

    #[test]
    fn triangle_is_equilateral() {
        let [a, b, c] = TRIANGLE;
        let ab = distance(&a, &b);
        assert!((ab - 1.0).abs() < 1e-5);
        assert!((distance(&b, &c) - ab).abs() < 1e-5);
        assert!((distance(&c, &a) - ab).abs() < 1e-5);
    }

    #[test]
    fn triangle_centroid_is_origin() {
        let sum = TRIANGLE
            .iter()
            .fold([0.0f32; 3], |acc, v| {
                [acc[0] + v.position[0], acc[1] + v.position[1], acc[2] + v.position[2]]
            });
        for component in sum.iter() {
            assert!(component.abs() < 1e-5);
        }
    }

    #[test]
    fn every_frame_clears_to_background() {
        for variant in ALL.iter() {
            assert_eq!(variant.frame_plan().clear_color(), [0.07, 0.13, 0.17, 1.0]);
        }
    }

    #[test]
    fn triangle_variants_draw_three_vertices_once() {
        for variant in [Variant::Flat, Variant::Colored].iter() {
            let plan = variant.frame_plan();
            assert_eq!(plan.draws().len(), 1);
            assert_eq!(plan.draws()[0].vertices, 0..3);
            assert_eq!(plan.vertex_count(), 3);
        }
    }

    #[test]
    fn background_draws_nothing() {
        assert!(Variant::Background.frame_plan().draws().is_empty());
        assert!(Variant::Background.shaders().is_none());
        assert!(Variant::Background.triangle_color().is_none());
    }

    #[test]
    fn triangle_colors() {
        assert_eq!(Variant::Flat.triangle_color(), Some([0.8, 0.3, 0.02, 1.0]));
        assert_eq!(Variant::Colored.triangle_color(), Some([1.0, 0.0, 0.0, 1.0]));
    }

    #[test]
    fn shader_sources_use_the_same_colors() {
        let flat = include_str!("data/flat.frag");
        assert!(flat.contains("vec4(0.8, 0.3, 0.02, 1.0)"));
        let colored = include_str!("data/colored.vert");
        assert!(colored.contains("vec4(1.0, 0.0, 0.0, 1.0)"));
        let passthrough = include_str!("data/colored.frag");
        assert!(passthrough.contains("FragColor = vertexColor;"));
    }

    #[test]
    fn embedded_shaders_are_spirv() {
        const MAGIC: [u8; 4] = 0x0723_0203u32.to_le_bytes();
        for variant in [Variant::Flat, Variant::Colored].iter() {
            let shaders = variant.shaders().unwrap();
            assert_eq!(shaders.vertex[..4], MAGIC);
            assert_eq!(shaders.fragment[..4], MAGIC);
            assert_eq!(shaders.vertex.len() % 4, 0);
        }
    }

    #[test]
    fn variant_names_are_distinct() {
        assert_eq!(Variant::Background.name(), "background");
        assert_ne!(Variant::Flat.name(), Variant::Colored.name());
    }
}
