#![allow(dead_code)]

use std::path::{Path, PathBuf};

use image::{Rgba, RgbaImage};

/// Fresh scratch directory under the system temp dir.
pub struct TempDir {
    pub path: PathBuf,
}

impl TempDir {
    pub fn new(tag: &str) -> Self {
        let path = std::env::temp_dir().join(format!("gb7studio-{}-{}", tag, uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&path).expect("create temp dir");
        Self { path }
    }

    pub fn join(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.path);
    }
}

pub fn solid(w: u32, h: u32, px: [u8; 4]) -> RgbaImage {
    RgbaImage::from_pixel(w, h, Rgba(px))
}

/// Opaque on the right half, fully transparent on the left.
pub fn half_transparent(w: u32, h: u32, gray: u8) -> RgbaImage {
    RgbaImage::from_fn(w, h, |x, _| {
        let a = if x < w / 2 { 0 } else { 255 };
        Rgba([gray, gray, gray, a])
    })
}

pub fn write_png(path: &Path, img: &RgbaImage) {
    img.save(path).expect("write png fixture");
}

pub fn read_png(path: &Path) -> RgbaImage {
    image::open(path).expect("read png").into_rgba8()
}
