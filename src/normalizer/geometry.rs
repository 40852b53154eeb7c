//! Target-size arithmetic and orientation transforms.

use std::io::Cursor;

use image::DynamicImage;

/// Compute dimensions whose longest edge is at most `target_edge`,
/// preserving aspect ratio. Small images are NOT upscaled.
pub fn compute_fit_dimensions(width: u32, height: u32, target_edge: u32) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (1, 1);
    }

    let scale = (target_edge as f32 / width as f32).min(target_edge as f32 / height as f32);
    let scale = scale.min(1.0);

    let new_w = ((width as f32 * scale).round() as u32).max(1).min(target_edge);
    let new_h = ((height as f32 * scale).round() as u32).max(1).min(target_edge);

    (new_w, new_h)
}

/// Centered square crop: `(x, y, side)` where `side` is the shorter edge.
pub fn center_square(width: u32, height: u32) -> (u32, u32, u32) {
    let side = width.min(height);
    ((width - side) / 2, (height - side) / 2, side)
}

/// Read EXIF orientation tag 0x0112 from raw image bytes.
/// Returns 1 (normal) if no EXIF data or tag not present.
pub fn read_exif_orientation(bytes: &[u8]) -> u32 {
    let mut cursor = Cursor::new(bytes);
    let Ok(reader) = exif::Reader::new().read_from_container(&mut cursor) else {
        return 1;
    };

    reader
        .get_field(exif::Tag::Orientation, exif::In::PRIMARY)
        .and_then(|f| f.value.get_uint(0))
        .unwrap_or(1)
}

/// Rotate/flip so the decoded pixels match how the camera held the sensor.
///
/// 1 = Normal, 2 = Mirrored, 3 = 180deg, 4 = Flipped V,
/// 5 = Mirrored + 90deg CW, 6 = 90deg CW, 7 = Mirrored + 270deg CW, 8 = 270deg CW
pub fn apply_orientation(img: DynamicImage, orientation: u32) -> DynamicImage {
    match orientation {
        2 => img.fliph(),
        3 => img.rotate180(),
        4 => img.flipv(),
        5 => img.rotate90().fliph(),
        6 => img.rotate90(),
        7 => img.rotate270().fliph(),
        8 => img.rotate270(),
        _ => img,
    }
}
