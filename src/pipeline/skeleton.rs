// MediaPipe pose topology, 33 landmarks.
pub const POSE_CONNECTIONS: &[(usize, usize)] = &[
    (0, 1),
    (1, 2),
    (2, 3),
    (3, 7),
    (0, 4),
    (4, 5),
    (5, 6),
    (6, 8),
    (9, 10),
    (11, 12),
    (11, 13),
    (13, 15),
    (15, 17),
    (15, 19),
    (15, 21),
    (17, 19),
    (12, 14),
    (14, 16),
    (16, 18),
    (16, 20),
    (16, 22),
    (18, 20),
    (11, 23),
    (12, 24),
    (23, 24),
    (23, 25),
    (24, 26),
    (25, 27),
    (26, 28),
    (27, 29),
    (28, 30),
    (29, 31),
    (30, 32),
    (27, 31),
    (28, 32),
];

pub const POSE_LINE_THICKNESS: i32 = 3;
const JOINT_RADIUS: i32 = 4;

pub fn draw_pose(buffer: &mut [u8], width: u32, height: u32, points: &[(f32, f32)]) {
    if points.len() < 2 {
        return;
    }

    let bone_color = [226u8, 232u8, 240u8, 255u8];
    for &(a, b) in POSE_CONNECTIONS {
        if let (Some(pa), Some(pb)) = (points.get(a), points.get(b)) {
            draw_segment(buffer, width, height, *pa, *pb, bone_color, POSE_LINE_THICKNESS);
        }
    }

    let joint_color = [248u8, 113u8, 113u8, 255u8];
    for &(x, y) in points {
        stamp_disc(
            buffer,
            width,
            height,
            (x as i32, y as i32),
            JOINT_RADIUS,
            joint_color,
        );
    }
}

fn draw_segment(
    buffer: &mut [u8],
    width: u32,
    height: u32,
    p0: (f32, f32),
    p1: (f32, f32),
    color: [u8; 4],
    thickness: i32,
) {
    let dx = p1.0 - p0.0;
    let dy = p1.1 - p0.1;
    let steps = dx.abs().max(dy.abs()).ceil().max(1.0) as i32;
    let radius = (thickness.max(1) - 1) / 2;

    for step in 0..=steps {
        let t = step as f32 / steps as f32;
        let x = (p0.0 + dx * t).round() as i32;
        let y = (p0.1 + dy * t).round() as i32;
        stamp_disc(buffer, width, height, (x, y), radius, color);
    }
}

fn stamp_disc(
    buffer: &mut [u8],
    width: u32,
    height: u32,
    center: (i32, i32),
    radius: i32,
    color: [u8; 4],
) {
    let (cx, cy) = center;
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy <= radius * radius {
                put_pixel_safe(buffer, width, height, cx + dx, cy + dy, color);
            }
        }
    }
}

fn put_pixel_safe(buffer: &mut [u8], width: u32, height: u32, x: i32, y: i32, color: [u8; 4]) {
    if x < 0 || y < 0 {
        return;
    }
    let (ux, uy) = (x as u32, y as u32);
    if ux >= width || uy >= height {
        return;
    }
    let idx = ((uy * width + ux) as usize) * 4;
    if idx + 3 < buffer.len() {
        buffer[idx..idx + 4].copy_from_slice(&color);
    }
}
