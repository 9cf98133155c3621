use pretty_assertions::assert_eq;

use super::*;

fn region(lower: [i32; 3], upper: [i32; 3]) -> Region {
    Region::checked_from_lower_upper(lower, upper).unwrap()
}

#[test]
fn new_volume_is_air() {
    let v = RawVolume::new(region([0, 0, 0], [2, 3, 4])).unwrap();
    assert!(v.is_empty());
    assert_eq!(v.solid_count(), 0);
    assert_eq!(v.voxel([1, 1, 1]), Voxel::Air);
    assert_eq!(v.occupied_region(), None);
}

#[test]
fn set_and_get() {
    let mut v = RawVolume::new(region([-1, -1, -1], [1, 1, 1])).unwrap();
    assert!(v.set_voxel([-1, 0, 1], Voxel::Generic(7)));
    assert_eq!(v.voxel([-1, 0, 1]), Voxel::Generic(7));
    assert_eq!(v.solid_count(), 1);
    assert_eq!(v.occupied_region(), Some(Region::single([-1, 0, 1])));
}

#[test]
fn out_of_region_writes_are_dropped() {
    let mut v = RawVolume::new(region([0, 0, 0], [1, 1, 1])).unwrap();
    assert!(!v.set_voxel([2, 0, 0], Voxel::Generic(1)));
    assert!(!v.set_voxel([0, -1, 0], Voxel::Generic(1)));
    assert!(v.is_empty());
    assert_eq!(v.voxel([100, 100, 100]), Voxel::Air);
}

#[test]
fn too_large_is_an_error() {
    let huge = region([0, 0, 0], [4095, 4095, 4095]);
    assert_eq!(
        RawVolume::new(huge),
        Err(VolumeError::TooLarge { region: huge })
    );
}

#[test]
fn crop_to_content() {
    let mut v = RawVolume::new(region([0, 0, 0], [9, 9, 9])).unwrap();
    v.set_voxel([2, 3, 4], Voxel::Generic(1));
    v.set_voxel([5, 3, 4], Voxel::Generic(2));
    let cropped = v.cropped().unwrap();
    assert_eq!(cropped.region(), region([2, 3, 4], [5, 3, 4]));
    assert_eq!(cropped.voxel([5, 3, 4]), Voxel::Generic(2));
    assert_eq!(cropped.solid_count(), 2);
}

#[test]
fn mirrored_reflects_within_region() {
    let mut v = RawVolume::new(region([0, 0, 0], [0, 0, 3])).unwrap();
    v.set_voxel([0, 0, 0], Voxel::Generic(1));
    let m = v.mirrored(Axis::Z);
    assert_eq!(m.voxel([0, 0, 3]), Voxel::Generic(1));
    assert_eq!(m.voxel([0, 0, 0]), Voxel::Air);
}

#[test]
fn merge_produces_union() {
    let mut a = RawVolume::new(region([0, 0, 0], [1, 1, 1])).unwrap();
    a.set_voxel([0, 0, 0], Voxel::Generic(1));
    let mut b = RawVolume::new(region([0, 0, 0], [0, 0, 0])).unwrap();
    b.set_voxel([0, 0, 0], Voxel::Generic(2));

    let merged = merge_volumes([
        (&a, GridVector::zero()),
        (&b, GridVector::new(5, 0, 0)),
    ])
    .unwrap()
    .unwrap();
    assert_eq!(merged.region(), region([0, 0, 0], [5, 1, 1]));
    assert_eq!(merged.voxel([0, 0, 0]), Voxel::Generic(1));
    assert_eq!(merged.voxel([5, 0, 0]), Voxel::Generic(2));
    assert_eq!(merged.solid_count(), 2);

    assert_eq!(
        merge_volumes(Vec::<(&RawVolume, GridVector)>::new()).unwrap(),
        None
    );
}

#[test]
fn merge_air_does_not_overwrite() {
    let mut dest = RawVolume::new(region([0, 0, 0], [1, 0, 0])).unwrap();
    dest.set_voxel([0, 0, 0], Voxel::Generic(3));
    let source = RawVolume::new(region([0, 0, 0], [1, 0, 0])).unwrap();
    let written = dest.merge_from(&source, source.region(), GridPoint::origin());
    assert_eq!(written, 0);
    assert_eq!(dest.voxel([0, 0, 0]), Voxel::Generic(3));
}

#[test]
fn resized_keeps_common_voxels() {
    let mut v = RawVolume::new(region([0, 0, 0], [1, 1, 1])).unwrap();
    v.set_voxel([1, 1, 1], Voxel::Generic(4));
    let bigger = v.resized(region([-2, 0, 0], [3, 3, 3])).unwrap();
    assert_eq!(bigger.voxel([1, 1, 1]), Voxel::Generic(4));
    assert_eq!(bigger.solid_count(), 1);
}

#[test]
fn merge_from_far_away_source() {
    let mut source = RawVolume::new(region([i32::MIN, 0, 0], [i32::MIN + 1, 0, 0])).unwrap();
    source.set_voxel([i32::MIN, 0, 0], Voxel::Generic(1));
    source.set_voxel([i32::MIN + 1, 0, 0], Voxel::Generic(2));
    let mut dest = RawVolume::new(region([i32::MAX - 1, 0, 0], [i32::MAX, 0, 0])).unwrap();
    let written = dest.merge_from(&source, source.region(), GridPoint::new(i32::MAX, 0, 0));
    // the second voxel would land past i32::MAX
    assert_eq!(written, 1);
    assert_eq!(dest.voxel([i32::MAX, 0, 0]), Voxel::Generic(1));
}
