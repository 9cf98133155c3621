//! Pieces shared by the SLAB6 formats, `.kvx` and `.kv6`.
//!
//! Both store columns along x and then y, with z pointing down; so file `y` is our `z`
//! and file `z` is our `y` flipped.

use voxfmt::math::{GridPoint, GridVector, Rgba};
use voxfmt::stream::{ByteReader, ByteWriter};
use voxfmt::{Palette, RawVolume, Voxel};

use crate::FormatError;

/// Bytes of a 256-entry palette of 6-bit components.
pub(crate) const VGA_PALETTE_LEN: usize = 3 * 256;

/// Widens a 6-bit VGA intensity to 8 bits.
fn widen(v: u8) -> u8 {
    let v = v & 0x3F;
    (v << 2) | (v >> 4)
}

pub(crate) fn read_vga_color(r: &mut ByteReader<'_>) -> Result<Rgba, FormatError> {
    let [red, green, blue] = r.read_array()?;
    Ok(Rgba::rgb(widen(red), widen(green), widen(blue)))
}

pub(crate) fn write_vga_color(w: &mut ByteWriter, color: Rgba) {
    w.write_bytes(&[color.r() >> 2, color.g() >> 2, color.b() >> 2]);
}

pub(crate) fn read_vga_palette(r: &mut ByteReader<'_>) -> Result<Palette, FormatError> {
    let colors = (0..256)
        .map(|_| read_vga_color(r))
        .collect::<Result<Vec<Rgba>, FormatError>>()?;
    Ok(Palette::from_colors(colors)?)
}

/// Writes all 256 entries, padding with black.
pub(crate) fn write_vga_palette(w: &mut ByteWriter, palette: &Palette) {
    for index in 0..=u8::MAX {
        write_vga_color(w, palette.get(index).unwrap_or(Rgba::BLACK));
    }
}

/// Bits of the face visibility byte, each set when that neighbor is air.
/// Directions are in file coordinates.
const FACES: [(u8, [i32; 3]); 6] = [
    (1 << 0, [-1, 0, 0]),
    (1 << 1, [1, 0, 0]),
    // file -y and +y
    (1 << 2, [0, 0, -1]),
    (1 << 3, [0, 0, 1]),
    // file -z is up
    (1 << 4, [0, 1, 0]),
    (1 << 5, [0, -1, 0]),
];

/// Returns which faces of the voxel at `point` are exposed, or 0 if it is air.
pub(crate) fn face_visibility(volume: &RawVolume, point: GridPoint) -> u8 {
    if volume.voxel(point) == Voxel::Air {
        return 0;
    }
    FACES
        .into_iter()
        .filter(|&(_, offset)| volume.voxel(point + GridVector::from(offset)) == Voxel::Air)
        .fold(0, |bits, (bit, _)| bits | bit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use voxfmt::math::Region;

    #[test]
    fn widening_covers_full_range() {
        assert_eq!(widen(0), 0);
        assert_eq!(widen(63), 255);
        assert_eq!(widen(32), 130);
    }

    #[test]
    fn visibility_of_a_column() {
        let mut volume = RawVolume::new(Region::checked_from_size([1, 3, 1]).unwrap()).unwrap();
        for y in 0..3 {
            volume.set_voxel([0, y, 0], Voxel::Generic(1));
        }
        // sides are outside the volume and so exposed
        let sides = 0b1111;
        assert_eq!(face_visibility(&volume, GridPoint::new(0, 2, 0)), sides | 1 << 4);
        assert_eq!(face_visibility(&volume, GridPoint::new(0, 1, 0)), sides);
        assert_eq!(face_visibility(&volume, GridPoint::new(0, 0, 0)), sides | 1 << 5);
        assert_eq!(face_visibility(&volume, GridPoint::new(1, 0, 0)), 0);
    }
}
