//! Axis-aligned closed integer boxes ([`Region`]) and iteration over them.

use core::fmt;
use core::iter::FusedIterator;

use crate::math::{Axis, GridCoordinate, GridPoint, GridSize, GridVector, checked_offset};

/// A closed axis-aligned box of voxel positions, `[min, max]` on every axis.
///
/// Unlike a half-open box, a [`Region`] always contains at least one position:
/// the constructors guarantee that the lower corner is not greater than the upper corner
/// on any axis. Consequently the size on each axis is `max - min + 1`.
#[derive(Clone, Copy, Eq, Hash, PartialEq)]
pub struct Region {
    lower: GridPoint,
    /// Constructor checks ensure this is not smaller than `lower`.
    upper: GridPoint,
}

impl Region {
    /// The single position `[0, 0, 0]`.
    pub const ORIGIN_VOXEL: Region = Region {
        lower: GridPoint::new(0, 0, 0),
        upper: GridPoint::new(0, 0, 0),
    };

    /// Constructs a [`Region`] from inclusive lower and upper corners.
    ///
    /// Returns [`Err`] if any component of `upper` is less than the same component of `lower`.
    #[inline]
    pub fn checked_from_lower_upper(
        lower: impl Into<GridPoint>,
        upper: impl Into<GridPoint>,
    ) -> Result<Self, RegionError> {
        let lower = lower.into();
        let upper = upper.into();
        if upper.x < lower.x || upper.y < lower.y || upper.z < lower.z {
            return Err(RegionError::Inverted { lower, upper });
        }
        Ok(Region { lower, upper })
    }

    /// Constructs a [`Region`] from its lower corner and its size.
    ///
    /// Returns [`Err`] if any size component is zero or the upper corner would overflow.
    #[inline]
    pub fn checked_from_lower_size(
        lower: impl Into<GridPoint>,
        size: impl Into<GridSize>,
    ) -> Result<Self, RegionError> {
        let lower = lower.into();
        let size = size.into();
        if size.width == 0 || size.height == 0 || size.depth == 0 {
            return Err(RegionError::ZeroSize { size });
        }
        let extend = |l: GridCoordinate, s: u32| l.checked_add_unsigned(s - 1);
        match (
            extend(lower.x, size.width),
            extend(lower.y, size.height),
            extend(lower.z, size.depth),
        ) {
            (Some(x), Some(y), Some(z)) => Ok(Region {
                lower,
                upper: GridPoint::new(x, y, z),
            }),
            _ => Err(RegionError::Overflow { lower, size }),
        }
    }

    /// Constructs a [`Region`] whose lower corner is the origin and whose size is `size`.
    #[inline]
    pub fn checked_from_size(size: impl Into<GridSize>) -> Result<Self, RegionError> {
        Self::checked_from_lower_size(GridPoint::origin(), size)
    }

    /// Constructs a [`Region`] containing exactly one position.
    #[inline]
    pub fn single(point: impl Into<GridPoint>) -> Self {
        let point = point.into();
        Region {
            lower: point,
            upper: point,
        }
    }

    /// Inclusive lower corner.
    #[inline]
    pub fn lower(&self) -> GridPoint {
        self.lower
    }

    /// Inclusive upper corner.
    #[inline]
    pub fn upper(&self) -> GridPoint {
        self.upper
    }

    /// Number of positions along each axis.
    ///
    /// An axis spanning the entire coordinate range has 2<sup>32</sup> positions and is
    /// reported as [`u32::MAX`]; [`Region::volume()`] is exact.
    #[inline]
    pub fn size(&self) -> GridSize {
        GridSize::new(self.width(), self.height(), self.depth())
    }

    /// Number of positions along the X axis.
    #[inline]
    pub fn width(&self) -> u32 {
        self.upper.x.abs_diff(self.lower.x).saturating_add(1)
    }

    /// Number of positions along the Y axis.
    #[inline]
    pub fn height(&self) -> u32 {
        self.upper.y.abs_diff(self.lower.y).saturating_add(1)
    }

    /// Number of positions along the Z axis.
    #[inline]
    pub fn depth(&self) -> u32 {
        self.upper.z.abs_diff(self.lower.z).saturating_add(1)
    }

    /// Total number of positions, or [`None`] if that does not fit in [`usize`].
    #[inline]
    pub fn volume(&self) -> Option<usize> {
        let extent = |l: GridCoordinate, u: GridCoordinate| {
            usize::try_from(u64::from(u.abs_diff(l)) + 1).ok()
        };
        extent(self.lower.x, self.upper.x)?
            .checked_mul(extent(self.lower.y, self.upper.y)?)?
            .checked_mul(extent(self.lower.z, self.upper.z)?)
    }

    /// Whether `point` lies inside this region.
    #[inline]
    pub fn contains(&self, point: impl Into<GridPoint>) -> bool {
        let p = point.into();
        p.x >= self.lower.x
            && p.x <= self.upper.x
            && p.y >= self.lower.y
            && p.y <= self.upper.y
            && p.z >= self.lower.z
            && p.z <= self.upper.z
    }

    /// Whether `other` lies entirely inside this region.
    #[inline]
    pub fn contains_region(&self, other: Region) -> bool {
        self.contains(other.lower) && self.contains(other.upper)
    }

    /// Returns the smallest region containing both `self` and `other`.
    #[inline]
    #[must_use]
    pub fn union(self, other: Region) -> Region {
        Region {
            lower: self.lower.min(other.lower),
            upper: self.upper.max(other.upper),
        }
    }

    /// Returns the smallest region containing both `self` and `point`.
    #[inline]
    #[must_use]
    pub fn union_point(self, point: GridPoint) -> Region {
        self.union(Region::single(point))
    }

    /// Returns the positions contained in both regions, if there are any.
    #[inline]
    pub fn intersection(self, other: Region) -> Option<Region> {
        Region::checked_from_lower_upper(self.lower.max(other.lower), self.upper.min(other.upper))
            .ok()
    }

    /// Moves the region by `offset`.
    ///
    /// Returns [`Err`] if the result would not be representable.
    #[inline]
    pub fn translate(&self, offset: impl Into<GridVector>) -> Result<Region, RegionError> {
        let offset = offset.into();
        match (
            checked_offset(self.lower, offset),
            checked_offset(self.upper, offset),
        ) {
            (Some(lower), Some(upper)) => Ok(Region { lower, upper }),
            _ => Err(RegionError::Overflow {
                lower: self.lower,
                size: self.size(),
            }),
        }
    }

    /// Reflects `point` across the middle of this region along `axis`,
    /// so that the lower bound maps to the upper bound and vice versa.
    ///
    /// Points outside the region are reflected by the same formula.
    #[inline]
    pub fn mirror(&self, axis: Axis, point: GridPoint) -> GridPoint {
        // Computed in i64 so that extreme bounds do not overflow.
        let reflect = |l: GridCoordinate, u: GridCoordinate, c: GridCoordinate| {
            (i64::from(l) + i64::from(u) - i64::from(c)) as GridCoordinate
        };
        let mut p = point;
        match axis {
            Axis::X => p.x = reflect(self.lower.x, self.upper.x, p.x),
            Axis::Y => p.y = reflect(self.lower.y, self.upper.y, p.y),
            Axis::Z => p.z = reflect(self.lower.z, self.upper.z, p.z),
        }
        p
    }

    /// Linear index of `point` within a dense array covering this region,
    /// in the same order as [`Region::iter()`] produces points.
    ///
    /// Returns [`None`] if the point is outside the region.
    #[inline]
    pub fn index(&self, point: GridPoint) -> Option<usize> {
        if !self.contains(point) {
            return None;
        }
        let dx = point.x.abs_diff(self.lower.x) as usize;
        let dy = point.y.abs_diff(self.lower.y) as usize;
        let dz = point.z.abs_diff(self.lower.z) as usize;
        Some((dx * self.height() as usize + dy) * self.depth() as usize + dz)
    }

    /// Iterates over every position in the region.
    ///
    /// The order is X-major: Z varies fastest, then Y, then X.
    #[inline]
    pub fn iter(&self) -> RegionIter {
        RegionIter {
            region: *self,
            next: Some(self.lower),
        }
    }
}

impl fmt::Debug for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Region { lower, upper } = self;
        write!(
            f,
            "Region({}..={}, {}..={}, {}..={})",
            lower.x, upper.x, lower.y, upper.y, lower.z, upper.z
        )
    }
}

impl IntoIterator for &Region {
    type Item = GridPoint;
    type IntoIter = RegionIter;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator produced by [`Region::iter()`].
#[derive(Clone, Debug)]
pub struct RegionIter {
    region: Region,
    next: Option<GridPoint>,
}

impl Iterator for RegionIter {
    type Item = GridPoint;

    #[inline]
    fn next(&mut self) -> Option<GridPoint> {
        let current = self.next?;
        let Region { lower, upper } = self.region;
        self.next = if current.z < upper.z {
            Some(GridPoint::new(current.x, current.y, current.z + 1))
        } else if current.y < upper.y {
            Some(GridPoint::new(current.x, current.y + 1, lower.z))
        } else if current.x < upper.x {
            Some(GridPoint::new(current.x + 1, lower.y, lower.z))
        } else {
            None
        };
        Some(current)
    }
}

impl FusedIterator for RegionIter {}

/// Error when a [`Region`] cannot be constructed from the given bounds.
#[derive(Clone, Copy, Debug, Eq, PartialEq, displaydoc::Display)]
#[non_exhaustive]
pub enum RegionError {
    /// region lower bounds {lower:?} exceed upper bounds {upper:?}
    Inverted {
        /// Requested lower corner.
        lower: GridPoint,
        /// Requested upper corner.
        upper: GridPoint,
    },
    /// region size {size:?} is zero on some axis
    ZeroSize {
        /// Requested size.
        size: GridSize,
    },
    /// region at {lower:?} with size {size:?} overflows the coordinate range
    Overflow {
        /// Requested lower corner.
        lower: GridPoint,
        /// Requested size.
        size: GridSize,
    },
}

impl core::error::Error for RegionError {}
