//! [`RawVolume`], the dense voxel grid every model node owns.

use crate::Voxel;
use crate::math::{Axis, GridPoint, GridVector, Region, RegionError};

/// Upper bound on the number of voxels a single [`RawVolume`] may hold.
///
/// Every codec validates declared dimensions against its own smaller caps first;
/// this is the last line against allocations derived from corrupt headers.
pub const MAX_VOLUME_VOXELS: usize = 1 << 30;

/// A dense three-dimensional grid of [`Voxel`]s covering a [`Region`].
///
/// The region is fixed at construction; “resizing” means constructing a new volume
/// and copying into it (see [`RawVolume::resized()`]).
#[derive(Clone, Eq, PartialEq)]
pub struct RawVolume {
    region: Region,
    /// Indexed by [`Region::index()`].
    data: Box<[Voxel]>,
}

impl RawVolume {
    /// Constructs a volume over `region` in which every voxel is [`Voxel::Air`].
    pub fn new(region: Region) -> Result<Self, VolumeError> {
        let len = region
            .volume()
            .filter(|&len| len <= MAX_VOLUME_VOXELS)
            .ok_or(VolumeError::TooLarge { region })?;
        Ok(Self {
            region,
            data: vec![Voxel::Air; len].into_boxed_slice(),
        })
    }

    /// The region this volume covers.
    #[inline]
    pub fn region(&self) -> Region {
        self.region
    }

    /// Returns the voxel at `point`, or [`Voxel::Air`] if `point` is outside the region.
    #[inline]
    pub fn voxel(&self, point: impl Into<GridPoint>) -> Voxel {
        match self.region.index(point.into()) {
            Some(i) => self.data[i],
            None => Voxel::Air,
        }
    }

    /// Stores `voxel` at `point`.
    ///
    /// Returns `false`, and changes nothing, if `point` is outside the region.
    #[inline]
    pub fn set_voxel(&mut self, point: impl Into<GridPoint>, voxel: Voxel) -> bool {
        match self.region.index(point.into()) {
            Some(i) => {
                self.data[i] = voxel;
                true
            }
            None => false,
        }
    }

    /// Iterates over every position in the region together with its voxel,
    /// in [`Region::iter()`] order.
    pub fn iter(&self) -> impl Iterator<Item = (GridPoint, Voxel)> + '_ {
        self.region.iter().zip(self.data.iter().copied())
    }

    /// Iterates over the non-air voxels.
    pub fn solid_voxels(&self) -> impl Iterator<Item = (GridPoint, u8)> + '_ {
        self.iter()
            .filter_map(|(point, voxel)| Some((point, voxel.color_index()?)))
    }

    /// Number of non-air voxels.
    pub fn solid_count(&self) -> usize {
        self.data.iter().filter(|v| !v.is_air()).count()
    }

    /// Whether every voxel is air.
    pub fn is_empty(&self) -> bool {
        self.data.iter().all(|v| v.is_air())
    }

    /// Smallest region containing every non-air voxel, or [`None`] if there are none.
    pub fn occupied_region(&self) -> Option<Region> {
        self.solid_voxels()
            .map(|(point, _)| Region::single(point))
            .reduce(Region::union)
    }

    /// Returns a copy of this volume covering `region` instead.
    ///
    /// Voxels inside both regions are copied; positions new to `region` are air.
    pub fn resized(&self, region: Region) -> Result<RawVolume, VolumeError> {
        let mut new = RawVolume::new(region)?;
        if let Some(common) = self.region.intersection(region) {
            for point in common.iter() {
                new.set_voxel(point, self.voxel(point));
            }
        }
        Ok(new)
    }

    /// Returns a copy of this volume shrunk to [`RawVolume::occupied_region()`],
    /// or [`None`] if it contains no solid voxels.
    pub fn cropped(&self) -> Option<RawVolume> {
        let occupied = self.occupied_region()?;
        if occupied == self.region {
            return Some(self.clone());
        }
        self.resized(occupied).ok()
    }

    /// Returns the same voxels moved by `offset`.
    pub fn translated(&self, offset: GridVector) -> Result<RawVolume, RegionError> {
        Ok(RawVolume {
            region: self.region.translate(offset)?,
            data: self.data.clone(),
        })
    }

    /// Returns the same voxels reflected along `axis` within the region.
    #[must_use]
    pub fn mirrored(&self, axis: Axis) -> RawVolume {
        let mut new = RawVolume {
            region: self.region,
            data: vec![Voxel::Air; self.data.len()].into_boxed_slice(),
        };
        for (point, voxel) in self.iter() {
            new.set_voxel(self.region.mirror(axis, point), voxel);
        }
        new
    }

    /// Copies the solid voxels of `source` lying in `source_region` into this volume,
    /// placing `source_region.lower()` at `dest_lower`.
    ///
    /// Air in the source never overwrites existing voxels. Voxels landing outside this
    /// volume's region, or outside the coordinate range, are dropped. Returns the number
    /// of voxels written.
    pub fn merge_from(
        &mut self,
        source: &RawVolume,
        source_region: Region,
        dest_lower: GridPoint,
    ) -> usize {
        let Some(source_region) = source_region.intersection(source.region) else {
            return 0;
        };
        let lower = source_region.lower();
        // in i64, since the source and destination may be far apart
        let shift = |d: i32, l: i32, p: i32| {
            i32::try_from(i64::from(d) + i64::from(p) - i64::from(l)).ok()
        };
        let mut written = 0;
        for point in source_region.iter() {
            let voxel = source.voxel(point);
            if voxel.is_air() {
                continue;
            }
            let dest = match (
                shift(dest_lower.x, lower.x, point.x),
                shift(dest_lower.y, lower.y, point.y),
                shift(dest_lower.z, lower.z, point.z),
            ) {
                (Some(x), Some(y), Some(z)) => GridPoint::new(x, y, z),
                _ => continue,
            };
            if self.set_voxel(dest, voxel) {
                written += 1;
            }
        }
        written
    }
}

/// Composites several volumes, each placed at an offset, into one new volume whose
/// region is the union of the placed regions.
///
/// Later volumes overwrite earlier ones where both are solid. Returns [`Ok(None)`] if
/// `volumes` is empty.
pub fn merge_volumes<'a>(
    volumes: impl IntoIterator<Item = (&'a RawVolume, GridVector)>,
) -> Result<Option<RawVolume>, VolumeError> {
    let placed: Vec<(&RawVolume, Region)> = volumes
        .into_iter()
        .map(|(volume, offset)| {
            volume
                .region()
                .translate(offset)
                .map(|region| (volume, region))
                .map_err(VolumeError::Region)
        })
        .collect::<Result<_, _>>()?;
    let Some(union) = placed.iter().map(|&(_, r)| r).reduce(Region::union) else {
        return Ok(None);
    };
    let mut merged = RawVolume::new(union)?;
    for (volume, placed_region) in placed {
        merged.merge_from(volume, volume.region(), placed_region.lower());
    }
    Ok(Some(merged))
}

impl std::fmt::Debug for RawVolume {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawVolume")
            .field("region", &self.region)
            .field("solid_count", &self.solid_count())
            .finish_non_exhaustive()
    }
}

/// Errors from constructing a [`RawVolume`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum VolumeError {
    /// The region holds more voxels than [`MAX_VOLUME_VOXELS`].
    #[error("region {region:?} is too large to allocate as a volume")]
    TooLarge {
        /// The requested region.
        region: Region,
    },

    /// A derived region could not be represented.
    #[error(transparent)]
    Region(RegionError),
}

#[cfg(test)]
mod tests;
