//! [BinVox](https://www.patrickmin.com/binvox/binvox.html): a text header and a
//! run-length encoded occupancy grid.

use voxfmt::math::GridVector;
use voxfmt::stream::{ByteReader, ByteWriter};
use voxfmt::{MergedVolume, SceneGraph, SceneNode, Transform, Voxel};

use crate::FormatError;
use crate::util::{merged_for_save, parse_numbers, volume_from_size};


const MAX_LINE_LEN: usize = 512;
const MAX_SIZE: u32 = 512;
/// Version 1 only distinguishes solid from empty.
const SAVE_VERSION: u32 = 1;
const MAX_RUN: u8 = u8::MAX;

#[derive(Clone, Copy, Debug, PartialEq)]
struct Header {
    version: u32,
    /// In file order: x, then z, then y.
    dim: [u32; 3],
    translate: [f32; 3],
    scale: f32,
}

fn read_header(r: &mut ByteReader<'_>) -> Result<Header, FormatError> {
    let first = r.read_line(MAX_LINE_LEN)?;
    let version = first
        .strip_prefix("#binvox ")
        .and_then(|v| v.trim().parse().ok())
        .ok_or_else(|| FormatError::InvalidMagic {
            expected: "#binvox",
            found: first.escape_debug().to_string(),
        })?;
    if !(1..=3).contains(&version) {
        log::warn!("binvox version {version} is unknown; reading it as version 2");
    }

    let mut dim = None;
    let mut translate = [0.0; 3];
    let mut scale = 1.0;
    loop {
        let line = r.read_line(MAX_LINE_LEN)?;
        let (keyword, rest) = line.split_once(' ').unwrap_or((line.as_str(), ""));
        match keyword {
            "dim" => dim = Some(parse_numbers("binvox dim", rest)?),
            "translate" => translate = parse_numbers("binvox translate", rest)?,
            "scale" => [scale] = parse_numbers("binvox scale", rest)?,
            "data" => break,
            _ => {
                return Err(FormatError::malformed(format!(
                    "unknown binvox header line {line:?}"
                )));
            }
        }
    }
    let dim = dim.ok_or_else(|| FormatError::malformed("binvox header has no dim line"))?;
    Ok(Header {
        version,
        dim,
        translate,
        scale,
    })
}

/// Reads the value of one run. Version 3 stores four bytes, of which the first
/// nonzero one counts.
fn read_value(r: &mut ByteReader<'_>, version: u32) -> Result<u8, FormatError> {
    if version >= 3 {
        let bytes: [u8; 4] = r.read_array()?;
        Ok(bytes.into_iter().find(|&b| b != 0).unwrap_or(0))
    } else {
        Ok(r.read_u8()?)
    }
}

pub(crate) fn load(bytes: &[u8]) -> Result<SceneGraph, FormatError> {
    let r = &mut ByteReader::new(bytes);
    let header = read_header(r)?;
    log::debug!("binvox header {header:?}");
    let [sx, sz, sy] = header.dim;
    let mut volume = volume_from_size("binvox dim", [sx, sy, sz], MAX_SIZE)?;

    // y runs fastest, then z, then x
    let total = u64::from(sx) * u64::from(sy) * u64::from(sz);
    let mut index: u64 = 0;
    while index < total {
        let value = read_value(r, header.version)?;
        let count = u64::from(r.read_u8()?);
        let end = index + count;
        if end > total {
            return Err(FormatError::malformed(format!(
                "binvox run ends at voxel {end} of {total}"
            )));
        }
        if value != 0 {
            for i in index..end {
                let y = (i % u64::from(sy)) as i32;
                let z = ((i / u64::from(sy)) % u64::from(sz)) as i32;
                let x = (i / (u64::from(sy) * u64::from(sz))) as i32;
                volume.set_voxel([x, y, z], Voxel::Generic(value));
            }
        }
        index = end;
    }
    if !r.is_eof() {
        log::warn!("ignoring {} bytes after binvox data", r.remaining());
    }

    let [tx, tz, ty] = header.translate.map(|t| -t.round() as i32);
    let mut graph = SceneGraph::new();
    graph.add_to_root(
        SceneNode::model("binvox", volume)
            .with_transform(Transform::from_translation(GridVector::new(tx, ty, tz)))
            .with_property("scale", header.scale.to_string()),
    );
    Ok(graph)
}

// -------------------------------------------------------------------------------------------------

fn write_run(w: &mut ByteWriter, value: u8, count: u8) {
    w.write_u8(value);
    w.write_u8(count);
}

pub(crate) fn save(graph: &SceneGraph) -> Result<Vec<u8>, FormatError> {
    let MergedVolume { volume, .. } = merged_for_save(graph)?;
    let region = volume.region();
    let size = region.size();
    let lower = region.lower();

    let mut w = ByteWriter::new();
    w.write_string(&format!("#binvox {SAVE_VERSION}\n"));
    w.write_string(&format!("dim {} {} {}\n", size.width, size.depth, size.height));
    w.write_string(&format!("translate {} {} {}\n", -lower.x, -lower.z, -lower.y));
    w.write_string("scale 1\ndata\n");

    let mut run: Option<(u8, u8)> = None;
    for x in 0..size.width as i32 {
        for z in 0..size.depth as i32 {
            for y in 0..size.height as i32 {
                let value = match volume.voxel(lower + GridVector::new(x, y, z)) {
                    Voxel::Air => 0,
                    Voxel::Generic(_) => 1,
                };
                run = match run {
                    Some((v, count)) if v == value && count < MAX_RUN => Some((v, count + 1)),
                    Some((v, count)) => {
                        write_run(&mut w, v, count);
                        Some((value, 1))
                    }
                    None => Some((value, 1)),
                };
            }
        }
    }
    if let Some((value, count)) = run {
        write_run(&mut w, value, count);
    }
    Ok(w.into_inner())
}
