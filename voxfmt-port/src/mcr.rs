//! Minecraft region files (`.mca`, `.mcr`): a table of up to 1024 chunks, each a
//! compressed NBT document whose sections hold 16³ blocks.
//!
//! Every chunk with blocks becomes one model, colored from a fixed table of block colors.
//! Three block layouts are understood, chosen by the chunk's `DataVersion`:
//!
//! * before the flattening, a byte array of numeric block ids;
//! * block state palettes with indices packed across 64-bit word boundaries;
//! * since 1.16, indices packed without crossing word boundaries.

use std::io::Read as _;

use voxfmt::math::{GridPoint, Region};
use voxfmt::stream::ByteReader;
use voxfmt::{RawVolume, SceneGraph, SceneNode, Transform, Voxel};

use crate::FormatError;
use crate::util::inflate;

mod blocks;
mod nbt;
use nbt::Tag;


const SECTOR_LEN: usize = 4096;
const CHUNK_COUNT: usize = 1024;
/// Offset table followed by the modification time table.
const HEADER_LEN: usize = 2 * SECTOR_LEN;
const MAX_CHUNK_LEN: u32 = 0x1FF_FFFF;
const MAX_NBT_LEN: usize = 64 << 20;

const COMPRESSION_GZIP: u8 = 1;
const COMPRESSION_ZLIB: u8 = 2;
const COMPRESSION_NONE: u8 = 3;

const SECTION_SIZE: i32 = 16;
const SECTION_BLOCKS: usize = 4096;
const MAX_SECTION_PALETTE: usize = 4096;

/// Data versions at which the chunk layout changed.
const VERSION_FLATTENING: i64 = 1343;
const VERSION_ALIGNED_PACKING: i64 = 2529;
const VERSION_TOP_LEVEL_SECTIONS: i64 = 2844;

pub(crate) fn load(bytes: &[u8]) -> Result<SceneGraph, FormatError> {
    let r = &mut ByteReader::new(bytes);
    let offsets = (0..CHUNK_COUNT)
        .map(|_| {
            let [a, b, c, sectors] = r.read_array()?;
            let sector = u32::from_be_bytes([0, a, b, c]) as usize;
            Ok((sector * SECTOR_LEN, sectors))
        })
        .collect::<Result<Vec<(usize, u8)>, FormatError>>()?;
    // modification times
    r.skip(CHUNK_COUNT * 4)?;

    let mut graph = SceneGraph::new();
    for (i, &(offset, sectors)) in offsets.iter().enumerate() {
        if sectors == 0 || offset < HEADER_LEN {
            continue;
        }
        if offset + 5 > bytes.len() {
            log::warn!("region chunk {i} at {offset} is past the end of the file");
            continue;
        }
        let Some(document) = read_chunk(&bytes[offset..])? else {
            continue;
        };
        if let Some(node) = chunk_model(&document)? {
            graph.add_to_root(node);
        }
    }

    if graph.model_count() == 0 {
        return Err(FormatError::EmptyScene);
    }
    Ok(graph)
}

/// Decompresses and parses one chunk. Returns [`None`] for a chunk of length zero.
fn read_chunk(bytes: &[u8]) -> Result<Option<Tag>, FormatError> {
    let r = &mut ByteReader::new(bytes);
    let len = r.read_u32_be()?;
    if len == 0 {
        log::debug!("empty region chunk");
        return Ok(None);
    }
    FormatError::check_limit("region chunk length", len, MAX_CHUNK_LEN)?;
    let compression = r.read_u8()?;
    // the length includes the compression byte
    let data = r.read_bytes(len as usize - 1)?;
    let nbt = match compression {
        COMPRESSION_GZIP => {
            let mut out = Vec::new();
            flate2::read::GzDecoder::new(data)
                .take(MAX_NBT_LEN as u64)
                .read_to_end(&mut out)
                .map_err(FormatError::Compression)?;
            out
        }
        COMPRESSION_ZLIB => inflate(data, MAX_NBT_LEN)?,
        COMPRESSION_NONE => data.to_vec(),
        other => {
            return Err(FormatError::Unsupported(format!(
                "region chunk compression {other}"
            )));
        }
    };
    nbt::parse(&nbt).map(Some)
}

fn get_i64(tag: &Tag, key: &str) -> Option<i64> {
    tag.get(key).and_then(Tag::as_i64)
}

fn list<'a>(tag: &'a Tag, key: &str) -> Result<&'a [Tag], FormatError> {
    tag.get(key)
        .ok_or_else(|| FormatError::malformed(format!("chunk has no {key:?} tag")))?
        .as_list()
        .ok_or_else(|| FormatError::malformed(format!("chunk {key:?} tag is not a list")))
}

/// Blocks of one section, as palette indices in y, z, x order.
type SectionBlocks = Vec<Option<u8>>;

/// Builds the model for one chunk, or [`None`] if it contains no blocks.
fn chunk_model(root: &Tag) -> Result<Option<SceneNode>, FormatError> {
    let data_version = get_i64(root, "DataVersion").unwrap_or(0);
    log::debug!("region chunk data version {data_version}");

    let (level, sections) = if data_version >= VERSION_TOP_LEVEL_SECTIONS {
        (root, list(root, "sections")?)
    } else {
        let level = root
            .get("Level")
            .filter(|level| matches!(level, Tag::Compound(_)))
            .ok_or_else(|| FormatError::malformed("chunk has no Level compound"))?;
        let status = root.get("Status").or_else(|| level.get("Status"));
        if let Some(status) = status.and_then(Tag::as_str) {
            log::debug!("chunk status {status:?}");
        }
        (level, list(level, "Sections")?)
    };
    let chunk_x = get_i64(level, "xPos").unwrap_or(0);
    let chunk_z = get_i64(level, "zPos").unwrap_or(0);

    let mut voxels: Vec<(GridPoint, u8)> = Vec::new();
    for section in sections {
        let Some(states) = section_blocks(data_version, section)? else {
            continue;
        };
        let section_y = get_i64(section, "Y").unwrap_or(0);
        let origin = section_origin(chunk_x, section_y, chunk_z)?;
        for (i, block) in states.into_iter().enumerate() {
            let Some(index) = block else { continue };
            let i = i as i32;
            let point = GridPoint::new(
                origin[0] + i % SECTION_SIZE,
                origin[1] + i / (SECTION_SIZE * SECTION_SIZE),
                origin[2] + i / SECTION_SIZE % SECTION_SIZE,
            );
            voxels.push((point, index));
        }
    }

    // No counter of blocks is kept; a chunk is empty exactly when no block decodes to
    // something other than air.
    let Some(bounds) = voxels
        .iter()
        .map(|&(point, _)| Region::single(point))
        .reduce(Region::union)
    else {
        log::debug!("chunk {chunk_x} {chunk_z} has no blocks");
        return Ok(None);
    };
    let offset = bounds.lower().to_vector();
    let mut volume = RawVolume::new(Region::checked_from_size(bounds.size())?)?;
    for (point, index) in voxels {
        volume.set_voxel(point - offset, Voxel::Generic(index));
    }
    Ok(Some(
        SceneNode::model(format!("chunk {chunk_x} {chunk_z}"), volume)
            .with_palette(blocks::palette())
            .with_transform(Transform::from_translation(offset)),
    ))
}

/// Position of the lowest block of a section, checked so that every block of the
/// section is representable.
fn section_origin(chunk_x: i64, section_y: i64, chunk_z: i64) -> Result<[i32; 3], FormatError> {
    let scale = |c: i64| {
        let lower = i32::try_from(c).ok()?.checked_mul(SECTION_SIZE)?;
        lower.checked_add(SECTION_SIZE - 1).map(|_| lower)
    };
    match (scale(chunk_x), scale(section_y), scale(chunk_z)) {
        (Some(x), Some(y), Some(z)) => Ok([x, y, z]),
        _ => Err(FormatError::malformed(format!(
            "section {chunk_x} {section_y} {chunk_z} is outside the coordinate range"
        ))),
    }
}

/// Decodes the blocks of one section, or [`None`] if it has no block data.
fn section_blocks(data_version: i64, section: &Tag) -> Result<Option<SectionBlocks>, FormatError> {
    let (palette_tag, data) = if data_version >= VERSION_TOP_LEVEL_SECTIONS {
        let Some(states) = section.get("block_states") else {
            return Ok(None);
        };
        let palette = states
            .get("palette")
            .ok_or_else(|| FormatError::malformed("block_states without a palette"))?;
        (Some(palette), states.get("data"))
    } else {
        let key = if data_version <= VERSION_FLATTENING { "Blocks" } else { "BlockStates" };
        (section.get("Palette"), section.get(key))
    };

    // An empty array of block states is the same as none.
    let data = data.filter(|tag| !matches!(tag, Tag::LongArray(words) if words.is_empty()));
    let palette = match palette_tag {
        Some(tag) => section_palette(tag)?,
        None => Vec::new(),
    };

    match (data, palette.as_slice()) {
        (Some(Tag::ByteArray(ids)), []) => {
            if ids.len() < SECTION_BLOCKS {
                return Err(FormatError::malformed(format!(
                    "section of {} block ids",
                    ids.len()
                )));
            }
            Ok(Some(ids[..SECTION_BLOCKS].iter().map(|&id| blocks::by_legacy_id(id)).collect()))
        }
        (Some(Tag::LongArray(words)), _) if !palette.is_empty() => {
            let indices = if data_version < VERSION_ALIGNED_PACKING {
                unpack_straddling(words)?
            } else {
                unpack_aligned(words, index_bits(palette.len()))?
            };
            Ok(Some(
                indices
                    .into_iter()
                    .map(|i| palette.get(usize::from(i)).copied().flatten())
                    .collect(),
            ))
        }
        // A single-state palette needs no data.
        (None, [only]) => Ok(Some(vec![*only; SECTION_BLOCKS])),
        (None, _) => Ok(None),
        (Some(_), []) => Err(FormatError::malformed(
            "section block data without a palette is not a byte array",
        )),
        (Some(_), _) => Err(FormatError::malformed(
            "section block states are not a long array",
        )),
    }
}

fn section_palette(tag: &Tag) -> Result<Vec<Option<u8>>, FormatError> {
    let entries = tag
        .as_list()
        .ok_or_else(|| FormatError::malformed("section palette is not a list"))?;
    FormatError::check_limit("section palette size", entries.len() as u64, MAX_SECTION_PALETTE as u64)?;
    entries
        .iter()
        .map(|entry| match entry {
            Tag::Compound(_) => Ok(entry.get("Name").and_then(Tag::as_str).and_then(blocks::by_name)),
            _ => Err(FormatError::malformed("section palette entry is not a compound")),
        })
        .collect()
}

/// Width of block state indices for a palette of `len` entries: enough bits to index it,
/// and at least 4.
fn index_bits(len: usize) -> u32 {
    len.next_power_of_two().trailing_zeros().max(4)
}

fn check_bits(bits: u32) -> Result<(), FormatError> {
    if (1..=16).contains(&bits) {
        Ok(())
    } else {
        Err(FormatError::malformed(format!("block states of {bits} bits")))
    }
}

/// Unpacks 4096 indices stored back to back, where an index may continue in the next
/// word. The width follows from the number of words.
fn unpack_straddling(words: &[i64]) -> Result<Vec<u16>, FormatError> {
    let bits = (words.len() * 64 / SECTION_BLOCKS) as u32;
    check_bits(bits)?;
    let mask = (1u64 << bits) - 1;
    Ok((0..SECTION_BLOCKS)
        .map(|i| {
            let start = i * bits as usize;
            let (word, shift) = (start / 64, start % 64);
            let mut value = words[word] as u64 >> shift;
            if shift + bits as usize > 64 {
                value |= (words[word + 1] as u64) << (64 - shift);
            }
            (value & mask) as u16
        })
        .collect())
}

/// Unpacks 4096 indices of `bits` each, where indices never cross word boundaries and
/// leftover high bits of each word are unused.
fn unpack_aligned(words: &[i64], bits: u32) -> Result<Vec<u16>, FormatError> {
    check_bits(bits)?;
    let per_word = 64 / bits as usize;
    let needed = SECTION_BLOCKS.div_ceil(per_word);
    if words.len() < needed {
        return Err(FormatError::malformed(format!(
            "{} words of block states, expected {needed}",
            words.len()
        )));
    }
    let mask = (1u64 << bits) - 1;
    Ok((0..SECTION_BLOCKS)
        .map(|i| {
            let shift = (i % per_word) * bits as usize;
            ((words[i / per_word] as u64 >> shift) & mask) as u16
        })
        .collect())
}
