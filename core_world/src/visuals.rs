use bevy::prelude::*;

use world_proto::LandmarkKind;

/// Classification data a renderer consumes to materialize a landmark. The
/// headless host carries no meshes or materials; this component plus the
/// entity's `Transform` are the whole visual contract.
#[derive(Component, Debug, Clone)]
pub struct LandmarkVisual {
    pub landmark_id: String,
    pub kind: LandmarkKind,
    pub label: String,
}

/// Display recipe for one landmark kind: linear-RGB tint and footprint in
/// world units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisualStyle {
    pub tint: [f32; 3],
    pub footprint: Vec3,
}

pub fn style_for(kind: LandmarkKind) -> VisualStyle {
    match kind {
        LandmarkKind::Settlement => VisualStyle {
            tint: [0.55, 0.27, 0.07],
            footprint: Vec3::new(20.0, 20.0, 15.0),
        },
        LandmarkKind::Fortress => VisualStyle {
            tint: [0.5, 0.5, 0.5],
            footprint: Vec3::new(25.0, 25.0, 30.0),
        },
        LandmarkKind::Monastery => VisualStyle {
            tint: [1.0, 0.84, 0.0],
            footprint: Vec3::new(15.0, 30.0, 20.0),
        },
        LandmarkKind::Ruin => VisualStyle {
            tint: [0.4, 0.5, 0.3],
            footprint: Vec3::new(15.0, 15.0, 8.0),
        },
        LandmarkKind::Natural => VisualStyle {
            tint: [0.2, 0.6, 0.8],
            footprint: Vec3::new(10.0, 10.0, 10.0),
        },
    }
}
