use euclid::{Point3D, Size3D, Vector3D};

mod color;
pub use color::*;
mod region;
pub use region::*;

// We make an assumption in several places that `usize` is at least 32 bits.
#[cfg(target_pointer_width = "16")]
compile_error!("voxfmt does not support platforms with less than 32-bit `usize`");

/// Unit-of-measure marker for coordinates on the voxel grid.
///
/// Used as the `euclid` unit parameter of [`GridPoint`], [`GridVector`] and [`GridSize`],
/// so that grid coordinates cannot be accidentally mixed with other coordinate systems.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[allow(clippy::exhaustive_enums)]
pub enum Grid {}

/// Coordinates that are locked to the voxel grid.
pub type GridCoordinate = i32;

/// Numeric type in a [`GridSize`].
pub type GridSizeCoord = u32;

/// Positions that are locked to the voxel grid.
pub type GridPoint = Point3D<GridCoordinate, Grid>;

/// Vectors that are locked to the voxel grid.
pub type GridVector = Vector3D<GridCoordinate, Grid>;

/// Sizes of grid-aligned objects.
pub type GridSize = Size3D<GridSizeCoord, Grid>;

/// Adds two grid vectors, or returns [`None`] if any component overflows.
#[inline]
pub fn checked_add_vectors(a: GridVector, b: GridVector) -> Option<GridVector> {
    Some(GridVector::new(
        a.x.checked_add(b.x)?,
        a.y.checked_add(b.y)?,
        a.z.checked_add(b.z)?,
    ))
}

/// Moves `point` by `offset`, or returns [`None`] if any component overflows.
#[inline]
pub fn checked_offset(point: GridPoint, offset: GridVector) -> Option<GridPoint> {
    checked_add_vectors(point.to_vector(), offset).map(GridVector::to_point)
}

/// Axis identifier, used for mirroring and axis swaps.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[allow(clippy::exhaustive_enums)]
pub enum Axis {
    /// The X axis (east/west).
    X,
    /// The Y axis (up/down).
    Y,
    /// The Z axis (south/north).
    Z,
}

impl Axis {
    /// All three axes, in order.
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    /// Returns the component of `point` along this axis.
    #[inline]
    pub fn of(self, point: GridPoint) -> GridCoordinate {
        match self {
            Axis::X => point.x,
            Axis::Y => point.y,
            Axis::Z => point.z,
        }
    }
}
