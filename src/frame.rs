use std::ops::Range;

#[derive(Debug, Clone, PartialEq)]
pub struct Draw {
    pub vertices: Range<u32>,
    pub instances: Range<u32>,
}

/// Everything a single frame does: clear, then the draws in order.
#[derive(Debug, Clone, PartialEq)]
pub struct FramePlan {
    clear_color: [f32; 4],
    draws: Vec<Draw>,
}

impl FramePlan {
    pub fn clear(clear_color: [f32; 4]) -> Self {
        FramePlan {
            clear_color,
            draws: Vec::new(),
        }
    }

    pub fn with_draw(mut self, vertices: Range<u32>) -> Self {
        self.draws.push(Draw {
            vertices,
            instances: 0..1,
        });
        self
    }

    pub fn clear_color(&self) -> [f32; 4] {
        self.clear_color
    }

    pub fn draws(&self) -> &[Draw] {
        &self.draws
    }

    pub fn vertex_count(&self) -> u32 {
        self.draws
            .iter()
            .map(|draw| {
                (draw.vertices.end - draw.vertices.start)
                    * (draw.instances.end - draw.instances.start)
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_only_has_no_draws() {
        let plan = FramePlan::clear([0.0, 0.0, 0.0, 1.0]);
        assert!(plan.draws().is_empty());
        assert_eq!(plan.vertex_count(), 0);
    }

    #[test]
    fn draws_keep_their_order() {
        let plan = FramePlan::clear([0.0; 4]).with_draw(0..3).with_draw(3..6);
        assert_eq!(plan.draws()[0].vertices, 0..3);
        assert_eq!(plan.draws()[1].vertices, 3..6);
        assert_eq!(plan.vertex_count(), 6);
    }

    #[test]
    fn draws_are_single_instance() {
        let plan = FramePlan::clear([0.0; 4]).with_draw(0..3);
        assert_eq!(plan.draws()[0].instances, 0..1);
    }
}
