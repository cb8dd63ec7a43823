use engine::{AssetError, AssetManager, Material};
use tracing::info;

const CAR_TEXTURE_WIDTH: u32 = 16;
const CAR_TEXTURE_HEIGHT: u32 = 32;
const FLOOR_TEXTURE_SIZE: u32 = 8;

pub(crate) fn skin_texture_name(skin: &str, map: &str) -> String {
    format!("textures/cars/{skin}/{map}.tga")
}

/// Color, normal and specular maps of a car skin. Missing normal and
/// specular maps stay unset.
pub(crate) fn load_skin(assets: &mut AssetManager, skin: &str) -> Material {
    Material::new(assets.texture(&skin_texture_name(skin, "color")))
        .with_normal(assets.texture(&skin_texture_name(skin, "normal")))
        .with_specular(assets.texture(&skin_texture_name(skin, "specular")))
}

/// Registers generated stand-ins for the car color maps and the floor when
/// they are absent from disk. Returns how many were generated.
pub(crate) fn ensure_fallback_textures(
    assets: &mut AssetManager,
    skins: &[String],
    floor: &str,
) -> Result<usize, AssetError> {
    let mut generated = 0;
    for skin in skins {
        let name = skin_texture_name(skin, "color");
        if assets.texture(&name).is_none() {
            assets.insert_rgba(&name, CAR_TEXTURE_WIDTH, CAR_TEXTURE_HEIGHT, car_body_rgba())?;
            info!(texture = %name, "fallback_texture_generated");
            generated += 1;
        }
    }
    if assets.texture(floor).is_none() {
        assets.insert_rgba(floor, FLOOR_TEXTURE_SIZE, FLOOR_TEXTURE_SIZE, floor_rgba())?;
        info!(texture = floor, "fallback_texture_generated");
        generated += 1;
    }
    Ok(generated)
}

/// Top-down car body: light paint that takes the sprite tint, a dark
/// windshield band toward the front (top rows) and clipped corners.
fn car_body_rgba() -> Vec<u8> {
    let (width, height) = (CAR_TEXTURE_WIDTH, CAR_TEXTURE_HEIGHT);
    let mut pixels = Vec::with_capacity((width * height * 4) as usize);
    for y in 0..height {
        for x in 0..width {
            let edge_x = x.min(width - 1 - x);
            let edge_y = y.min(height - 1 - y);
            let texel = if edge_x + edge_y < 2 {
                [0, 0, 0, 0]
            } else if (7..11).contains(&y) && edge_x >= 2 {
                [40, 48, 60, 255]
            } else if edge_x == 0 || edge_y == 0 {
                [150, 150, 150, 255]
            } else {
                [235, 235, 235, 255]
            };
            pixels.extend_from_slice(&texel);
        }
    }
    pixels
}

/// Two-tone asphalt checker, tiled across the floor quad.
fn floor_rgba() -> Vec<u8> {
    let size = FLOOR_TEXTURE_SIZE;
    let half = size / 2;
    let mut pixels = Vec::with_capacity((size * size * 4) as usize);
    for y in 0..size {
        for x in 0..size {
            let texel = if (x < half) == (y < half) {
                [58, 60, 64, 255]
            } else {
                [70, 72, 77, 255]
            };
            pixels.extend_from_slice(&texel);
        }
    }
    pixels
}
