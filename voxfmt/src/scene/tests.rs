use pretty_assertions::assert_eq;

use super::*;
use crate::math::{GridPoint, Rgba};

fn single_voxel(at: [i32; 3], index: u8) -> RawVolume {
    let mut v = RawVolume::new(Region::single(at)).unwrap();
    v.set_voxel(at, Voxel::Generic(index));
    v
}

#[test]
fn new_graph_has_only_root() {
    let g = SceneGraph::new();
    assert_eq!(g.len(), 1);
    assert!(g.is_empty());
    assert_eq!(g.root().kind(), &SceneNodeKind::Root);
    assert_eq!(g.root().parent(), None);
}

#[test]
fn add_links_parent_and_children() {
    let mut g = SceneGraph::new();
    let group = g.add_to_root(SceneNode::group("limbs"));
    let arm = g
        .add(SceneNode::model("arm", single_voxel([0, 0, 0], 1)), group)
        .unwrap();
    let leg = g
        .add(SceneNode::model("leg", single_voxel([0, 0, 0], 2)), group)
        .unwrap();

    assert_eq!(g.root().children(), &[group]);
    assert_eq!(g.node(group).unwrap().children(), &[arm, leg]);
    assert_eq!(g.node(leg).unwrap().parent(), Some(group));
    assert_eq!(g.model_count(), 2);
    let names: Vec<&str> = g.model_nodes().map(|(_, n)| n.name()).collect();
    assert_eq!(names, vec!["arm", "leg"]);
}

#[test]
fn add_to_missing_parent_fails() {
    let mut g = SceneGraph::new();
    let bogus = NodeId(5);
    assert_eq!(
        g.add(SceneNode::group("x"), bogus),
        Err(SceneGraphError::MissingParent(bogus))
    );
    assert_eq!(g.len(), 1);
}

#[test]
fn clear_drops_everything_but_root() {
    let mut g = SceneGraph::new();
    g.add_to_root(SceneNode::model("a", single_voxel([0, 0, 0], 1)));
    g.clear();
    assert_eq!(g.len(), 1);
    assert!(g.root().children().is_empty());
}

#[test]
fn world_translation_accumulates() {
    let mut g = SceneGraph::new();
    let group = g.add_to_root(
        SceneNode::group("g").with_transform(Transform::from_translation(GridVector::new(1, 2, 3))),
    );
    let model = g
        .add(
            SceneNode::model("m", single_voxel([0, 0, 0], 1))
                .with_transform(Transform::from_translation(GridVector::new(10, 0, 0))),
            group,
        )
        .unwrap();
    assert_eq!(g.world_translation(model), Some(GridVector::new(11, 2, 3)));
    assert_eq!(g.world_region(model), Some(Region::single([11, 2, 3])));
}

#[test]
fn nested_extreme_translations_overflow() {
    let far = Transform::from_translation(GridVector::new(i32::MAX, 0, 0));
    let mut g = SceneGraph::new();
    let outer = g.add_to_root(SceneNode::group("outer"));
    let inner = g.add(SceneNode::group("inner").with_transform(far), outer).unwrap();
    let model = g
        .add(
            SceneNode::model("m", single_voxel([0, 0, 0], 1)).with_transform(far),
            inner,
        )
        .unwrap();
    assert_eq!(g.world_translation(inner), Some(GridVector::new(i32::MAX, 0, 0)));
    assert_eq!(g.world_translation(model), None);
    assert_eq!(g.world_region(model), None);
    assert!(matches!(g.merge(), Err(VolumeError::Region(_))));
}

#[test]
fn resolved_palette_walks_up() {
    let red = Palette::from_colors([Rgba::rgb(255, 0, 0)]).unwrap();
    let mut g = SceneGraph::new();
    let group = g.add_to_root(SceneNode::group("g").with_palette(red.clone()));
    let model = g
        .add(SceneNode::model("m", single_voxel([0, 0, 0], 0)), group)
        .unwrap();
    let loose = g.add_to_root(SceneNode::model("n", single_voxel([0, 0, 0], 0)));
    assert_eq!(g.resolved_palette(model), red);
    assert_eq!(g.resolved_palette(loose), Palette::builtin());
}

#[test]
fn merge_with_shared_palette_keeps_indices() {
    let palette = Palette::from_colors([Rgba::WHITE, Rgba::BLACK]).unwrap();
    let mut g = SceneGraph::new();
    g.add_to_root(SceneNode::model("a", single_voxel([0, 0, 0], 1)).with_palette(palette.clone()));
    g.add_to_root(
        SceneNode::model("b", single_voxel([0, 0, 0], 0))
            .with_palette(palette.clone())
            .with_transform(Transform::from_translation(GridVector::new(0, 4, 0))),
    );
    let merged = g.merge().unwrap().unwrap();
    assert_eq!(
        merged.volume.region(),
        Region::checked_from_lower_upper([0, 0, 0], [0, 4, 0]).unwrap()
    );
    assert_eq!(merged.volume.voxel([0, 0, 0]), Voxel::Generic(1));
    assert_eq!(merged.volume.voxel([0, 4, 0]), Voxel::Generic(0));
    assert_eq!(merged.palette, palette);
}

#[test]
fn merge_with_different_palettes_requantizes() {
    let mut g = SceneGraph::new();
    g.add_to_root(
        SceneNode::model("a", single_voxel([0, 0, 0], 0))
            .with_palette(Palette::from_colors([Rgba::rgb(0, 0, 255)]).unwrap()),
    );
    g.add_to_root(
        SceneNode::model("b", single_voxel([1, 0, 0], 1)).with_palette(
            Palette::from_colors([Rgba::rgb(0, 0, 255), Rgba::rgb(0, 255, 0)]).unwrap(),
        ),
    );
    let merged = g.merge().unwrap().unwrap();
    let color_at = |p: GridPoint| {
        merged
            .palette
            .color(merged.volume.voxel(p).color_index().unwrap())
    };
    assert_eq!(color_at(GridPoint::new(0, 0, 0)), Rgba::rgb(0, 0, 255));
    assert_eq!(color_at(GridPoint::new(1, 0, 0)), Rgba::rgb(0, 255, 0));
}

#[test]
fn merge_of_empty_graph() {
    assert_eq!(SceneGraph::new().merge().unwrap(), None);
}

#[test]
fn shared_palette_of_differently_paletted_models() {
    let mut g = SceneGraph::new();
    g.add_to_root(
        SceneNode::model("a", single_voxel([0, 0, 0], 0))
            .with_palette(Palette::from_colors([Rgba::WHITE]).unwrap()),
    );
    g.add_to_root(
        SceneNode::model("b", single_voxel([0, 0, 0], 1))
            .with_palette(Palette::from_colors([Rgba::BLACK, Rgba::WHITE]).unwrap()),
    );
    let (palette, volumes) = g.models_with_shared_palette();
    assert_eq!(palette.colors(), &[Rgba::WHITE]);
    assert_eq!(volumes.len(), 2);
    assert_eq!(volumes[1].1.voxel([0, 0, 0]), Voxel::Generic(0));
}
