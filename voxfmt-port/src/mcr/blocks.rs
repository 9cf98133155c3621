//! Representative colors of Minecraft blocks, by flattened name and by pre-1.13 numeric id.

use voxfmt::Palette;
use voxfmt::math::Rgba;

struct Block {
    /// Numeric id before the flattening, or 0 for blocks added since.
    legacy_id: u8,
    names: &'static [&'static str],
    color: Rgba,
}

const fn block(legacy_id: u8, names: &'static [&'static str], rgb: [u8; 3]) -> Block {
    Block {
        legacy_id,
        names,
        color: Rgba::rgb(rgb[0], rgb[1], rgb[2]),
    }
}

/// Used for blocks missing from [`BLOCKS`].
const FALLBACK: u8 = 0;

#[rustfmt::skip]
static BLOCKS: &[Block] = &[
    block(1, &["stone", "smooth_stone"], [125, 125, 125]),
    block(2, &["grass_block"], [95, 159, 53]),
    block(3, &["dirt", "coarse_dirt", "rooted_dirt", "dirt_path"], [134, 96, 67]),
    block(4, &["cobblestone", "cobblestone_stairs", "cobblestone_slab", "cobblestone_wall"], [122, 122, 122]),
    block(5, &["oak_planks", "oak_stairs", "oak_slab", "oak_fence"], [162, 130, 78]),
    block(6, &["oak_sapling"], [71, 102, 37]),
    block(7, &["bedrock"], [85, 85, 85]),
    block(9, &["water", "bubble_column"], [47, 67, 244]),
    block(8, &[], [47, 67, 244]),
    block(11, &["lava"], [207, 92, 20]),
    block(10, &[], [207, 92, 20]),
    block(12, &["sand", "suspicious_sand"], [219, 207, 163]),
    block(13, &["gravel", "suspicious_gravel"], [136, 126, 126]),
    block(14, &["gold_ore", "deepslate_gold_ore", "nether_gold_ore"], [143, 140, 125]),
    block(15, &["iron_ore", "deepslate_iron_ore"], [136, 130, 127]),
    block(16, &["coal_ore", "deepslate_coal_ore"], [116, 116, 116]),
    block(17, &["oak_log", "oak_wood", "stripped_oak_log"], [109, 85, 50]),
    block(18, &["oak_leaves"], [60, 192, 41]),
    block(19, &["sponge", "wet_sponge"], [195, 192, 74]),
    block(20, &["glass", "glass_pane"], [175, 213, 219]),
    block(21, &["lapis_ore", "deepslate_lapis_ore"], [99, 110, 132]),
    block(22, &["lapis_block"], [30, 67, 140]),
    block(24, &["sandstone", "cut_sandstone", "smooth_sandstone", "sandstone_stairs", "sandstone_slab"], [216, 203, 155]),
    block(31, &["short_grass", "grass", "tall_grass", "fern", "large_fern"], [100, 150, 50]),
    block(32, &["dead_bush"], [107, 78, 40]),
    block(35, &["white_wool"], [234, 236, 237]),
    block(37, &["dandelion", "sunflower"], [245, 238, 50]),
    block(38, &["poppy", "rose_bush", "red_tulip"], [237, 48, 44]),
    block(41, &["gold_block"], [246, 208, 61]),
    block(42, &["iron_block"], [220, 220, 220]),
    block(43, &["stone_slab", "smooth_stone_slab"], [158, 158, 158]),
    block(45, &["bricks", "brick_stairs", "brick_slab"], [150, 97, 83]),
    block(46, &["tnt"], [219, 68, 26]),
    block(47, &["bookshelf"], [117, 94, 59]),
    block(48, &["mossy_cobblestone"], [110, 118, 94]),
    block(49, &["obsidian", "crying_obsidian"], [20, 18, 29]),
    block(50, &["torch", "wall_torch"], [255, 216, 0]),
    block(54, &["chest", "trapped_chest", "barrel"], [164, 116, 42]),
    block(56, &["diamond_ore", "deepslate_diamond_ore"], [121, 141, 140]),
    block(57, &["diamond_block"], [98, 237, 228]),
    block(58, &["crafting_table"], [119, 73, 42]),
    block(59, &["wheat"], [172, 162, 40]),
    block(60, &["farmland"], [81, 44, 15]),
    block(61, &["furnace", "blast_furnace", "smoker"], [110, 110, 110]),
    block(73, &["redstone_ore", "deepslate_redstone_ore"], [133, 107, 107]),
    block(78, &["snow"], [240, 251, 251]),
    block(79, &["ice"], [145, 183, 253]),
    block(80, &["snow_block", "powder_snow"], [249, 254, 254]),
    block(81, &["cactus"], [85, 127, 43]),
    block(82, &["clay"], [160, 166, 179]),
    block(83, &["sugar_cane"], [148, 192, 101]),
    block(85, &["oak_fence_gate"], [162, 130, 78]),
    block(86, &["pumpkin", "carved_pumpkin", "jack_o_lantern"], [198, 118, 24]),
    block(87, &["netherrack"], [97, 38, 38]),
    block(88, &["soul_sand", "soul_soil"], [81, 62, 50]),
    block(89, &["glowstone"], [171, 131, 84]),
    block(98, &["stone_bricks", "mossy_stone_bricks", "cracked_stone_bricks", "stone_brick_stairs", "stone_brick_slab"], [122, 121, 122]),
    block(99, &["brown_mushroom_block", "mushroom_stem"], [149, 111, 81]),
    block(100, &["red_mushroom_block"], [200, 46, 45]),
    block(103, &["melon"], [111, 145, 30]),
    block(106, &["vine"], [58, 90, 22]),
    block(110, &["mycelium"], [111, 99, 105]),
    block(111, &["lily_pad"], [32, 128, 48]),
    block(112, &["nether_bricks", "nether_brick_fence"], [44, 21, 26]),
    block(121, &["end_stone", "end_stone_bricks"], [219, 222, 158]),
    block(129, &["emerald_ore", "deepslate_emerald_ore"], [108, 136, 115]),
    block(133, &["emerald_block"], [42, 203, 87]),
    block(155, &["quartz_block", "smooth_quartz", "quartz_pillar"], [235, 229, 222]),
    block(159, &["white_terracotta"], [209, 178, 161]),
    block(161, &["acacia_leaves", "dark_oak_leaves"], [58, 170, 32]),
    block(162, &["acacia_log", "dark_oak_log"], [103, 96, 86]),
    block(172, &["terracotta"], [152, 94, 67]),
    block(174, &["packed_ice", "blue_ice"], [141, 180, 250]),
    block(0, &["granite", "polished_granite"], [149, 103, 85]),
    block(0, &["diorite", "polished_diorite"], [188, 188, 188]),
    block(0, &["andesite", "polished_andesite"], [136, 136, 136]),
    block(0, &["podzol"], [91, 63, 24]),
    block(0, &["red_sand"], [190, 102, 33]),
    block(0, &["spruce_planks", "spruce_stairs", "spruce_slab"], [114, 84, 48]),
    block(0, &["birch_planks", "birch_stairs", "birch_slab"], [192, 175, 121]),
    block(0, &["jungle_planks"], [160, 115, 80]),
    block(0, &["spruce_log", "spruce_wood"], [58, 37, 16]),
    block(0, &["birch_log", "birch_wood"], [216, 215, 210]),
    block(0, &["jungle_log", "jungle_wood"], [85, 67, 25]),
    block(0, &["spruce_leaves"], [42, 94, 42]),
    block(0, &["birch_leaves"], [80, 167, 48]),
    block(0, &["jungle_leaves", "mangrove_leaves"], [48, 170, 20]),
    block(0, &["azalea_leaves", "flowering_azalea_leaves"], [90, 115, 44]),
    block(0, &["kelp", "kelp_plant", "seagrass", "tall_seagrass"], [36, 92, 20]),
    block(0, &["deepslate", "cobbled_deepslate", "polished_deepslate", "deepslate_bricks", "deepslate_tiles"], [80, 80, 82]),
    block(0, &["tuff"], [108, 109, 102]),
    block(0, &["calcite"], [223, 224, 220]),
    block(0, &["copper_ore", "deepslate_copper_ore"], [124, 125, 120]),
    block(0, &["moss_block", "moss_carpet"], [89, 109, 45]),
    block(0, &["dripstone_block", "pointed_dripstone"], [134, 107, 92]),
    block(0, &["mud", "packed_mud", "mud_bricks"], [60, 57, 61]),
    block(0, &["blackstone", "basalt", "smooth_basalt"], [42, 36, 41]),
    block(0, &["amethyst_block", "budding_amethyst"], [133, 97, 191]),
    block(0, &["prismarine", "prismarine_bricks", "dark_prismarine"], [99, 156, 151]),
    block(0, &["sea_lantern"], [172, 199, 190]),
    block(0, &["magma_block"], [142, 63, 31]),
    block(0, &["bone_block"], [229, 225, 207]),
];

/// Names of blocks that are stored as air.
const AIR: &[&str] = &["air", "cave_air", "void_air"];

fn index(block: usize) -> u8 {
    u8::try_from(block).unwrap_or(FALLBACK)
}

/// Palette whose indices are positions in the block table.
pub(super) fn palette() -> Palette {
    Palette::from_colors(BLOCKS.iter().map(|block| block.color)).unwrap_or_default()
}

/// Palette index for a namespaced block name such as `minecraft:stone`, or [`None`] for air.
///
/// Unknown blocks are given the color of stone.
pub(super) fn by_name(name: &str) -> Option<u8> {
    let name = name.strip_prefix("minecraft:").unwrap_or(name);
    if AIR.contains(&name) {
        return None;
    }
    Some(match BLOCKS.iter().position(|block| block.names.contains(&name)) {
        Some(position) => index(position),
        None => {
            log::debug!("no color for block {name:?}");
            FALLBACK
        }
    })
}

/// Palette index for a block id of the pre-flattening format, or [`None`] for air.
pub(super) fn by_legacy_id(id: u8) -> Option<u8> {
    if id == 0 {
        return None;
    }
    Some(
        BLOCKS
            .iter()
            .position(|block| block.legacy_id == id)
            .map_or(FALLBACK, index),
    )
}
