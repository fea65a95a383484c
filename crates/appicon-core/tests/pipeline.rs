use std::{
    fs,
    io::Cursor,
    path::{Path, PathBuf},
};

use appicon_config::config::BackingStrategy;
use appicon_core::{
    extract::ExtractError,
    get_icon, inspect,
    locate::LocateMethod,
    sniff::png_dimensions,
    try_get_icon, AppImageThumbnailer, IconError, IconFormat, Settings, Thumbnailer,
};
use backhand::{FilesystemWriter, NodeHeader};
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgba};
use tempfile::{tempdir, TempDir};

/// ELF64 header plus a one-entry section table ending at this offset.
const ELF_LEN: usize = 0x80;

enum Entry<'a> {
    File(&'a str, &'a [u8]),
    Symlink(&'a str, &'a str),
    Dir(&'a str),
}

fn png(width: u32, height: u32) -> Vec<u8> {
    let buffer = ImageBuffer::from_pixel(width, height, Rgba([10u8, 120, 240, 255]));
    let mut data = Vec::new();
    DynamicImage::ImageRgba8(buffer)
        .write_to(&mut Cursor::new(&mut data), ImageFormat::Png)
        .unwrap();
    data
}

fn runtime_elf() -> Vec<u8> {
    let mut elf = vec![0u8; ELF_LEN];
    elf[..4].copy_from_slice(b"\x7fELF");
    elf[4] = 2;
    elf[5] = 1;
    elf[6] = 1;
    elf[8..11].copy_from_slice(b"AI\x02");
    elf[0x28..0x30].copy_from_slice(&0x40u64.to_le_bytes());
    elf[0x3a..0x3c].copy_from_slice(&64u16.to_le_bytes());
    elf[0x3c..0x3e].copy_from_slice(&1u16.to_le_bytes());
    elf[0x58..0x60].copy_from_slice(&0x40u64.to_le_bytes());
    elf[0x60..0x68].copy_from_slice(&0x20u64.to_le_bytes());
    elf
}

fn squashfs(entries: &[Entry]) -> Vec<u8> {
    let mut writer = FilesystemWriter::default();
    for entry in entries {
        match entry {
            Entry::File(path, data) => {
                writer
                    .push_file(Cursor::new(data.to_vec()), *path, NodeHeader::default())
                    .unwrap();
            }
            Entry::Symlink(path, target) => {
                writer
                    .push_symlink(*target, *path, NodeHeader::default())
                    .unwrap();
            }
            Entry::Dir(path) => writer.push_dir(*path, NodeHeader::default()).unwrap(),
        }
    }
    let mut out = Cursor::new(Vec::new());
    writer.write(&mut out).unwrap();
    out.into_inner()
}

/// Writes `[runtime ELF][zero padding up to payload_at][squashfs]`.
fn appimage(dir: &Path, name: &str, payload_at: usize, entries: &[Entry]) -> PathBuf {
    appimage_with(dir, name, payload_at, &squashfs(entries))
}

fn appimage_with(dir: &Path, name: &str, payload_at: usize, payload: &[u8]) -> PathBuf {
    let mut image = runtime_elf();
    image.resize(payload_at, 0);
    image.extend_from_slice(payload);
    let path = dir.join(name);
    fs::write(&path, image).unwrap();
    path
}

/// Points the fragment table of a written image at an offset nothing can be
/// read from, leaving the fragment count in place.
fn break_fragment_table(payload: &mut [u8]) {
    payload[80..88].copy_from_slice(&u64::MAX.to_le_bytes());
}

fn settings_in(temp: &TempDir) -> Settings {
    Settings {
        temp_dir: Some(temp.path().to_path_buf()),
        backing: BackingStrategy::TempFile,
        ..Settings::default()
    }
}

fn assert_no_leftovers(temp: &TempDir) {
    assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 0);
}

#[test]
fn test_png_round_trip() {
    let dir = tempdir().unwrap();
    let scratch = tempdir().unwrap();
    let icon = png(1, 1);
    let path = appimage(
        dir.path(),
        "app.AppImage",
        ELF_LEN,
        &[Entry::File(".DirIcon", &icon)],
    );

    let found = try_get_icon(&path, &settings_in(&scratch)).unwrap();
    assert_eq!(found.data, icon);
    assert_eq!(found.format, IconFormat::Png);
    assert_eq!(found.extension(), "png");
    assert_eq!(found.dimensions(), Some((1, 1)));
    assert_no_leftovers(&scratch);
}

#[test]
fn test_window_backing_round_trip() {
    let dir = tempdir().unwrap();
    let icon = png(48, 48);
    let path = appimage(
        dir.path(),
        "app.AppImage",
        ELF_LEN,
        &[Entry::File(".DirIcon", &icon)],
    );

    let settings = Settings {
        backing: BackingStrategy::Window,
        ..Settings::default()
    };
    let found = get_icon(&path, &settings).unwrap();
    assert_eq!(found.data, icon);
}

#[test]
fn test_marker_flip_is_not_an_appimage() {
    let dir = tempdir().unwrap();
    let path = appimage(
        dir.path(),
        "app.AppImage",
        ELF_LEN,
        &[Entry::File(".DirIcon", &png(1, 1))],
    );
    let mut bytes = fs::read(&path).unwrap();
    bytes[10] = 0x01;
    fs::write(&path, bytes).unwrap();

    let err = try_get_icon(&path, &Settings::default()).unwrap_err();
    assert!(matches!(err, IconError::NotAnAppImage { .. }));
}

#[test]
fn test_no_superblock_anywhere() {
    let dir = tempdir().unwrap();
    let mut bytes = runtime_elf();
    bytes.resize(256 * 1024, 0x5a);
    let path = dir.path().join("hollow.AppImage");
    fs::write(&path, bytes).unwrap();

    let err = try_get_icon(&path, &Settings::default()).unwrap_err();
    assert!(matches!(err, IconError::OffsetNotFound { .. }));
    assert!(get_icon(&path, &Settings::default()).is_none());
}

#[test]
fn test_empty_icon_is_no_icon() {
    let dir = tempdir().unwrap();
    let scratch = tempdir().unwrap();
    let path = appimage(
        dir.path(),
        "app.AppImage",
        ELF_LEN,
        &[Entry::File(".DirIcon", b"")],
    );

    let err = try_get_icon(&path, &settings_in(&scratch)).unwrap_err();
    assert!(matches!(
        err,
        IconError::Extraction(ExtractError::Empty(_))
    ));
    assert_no_leftovers(&scratch);
}

#[test]
fn test_missing_dir_icon() {
    let dir = tempdir().unwrap();
    let path = appimage(
        dir.path(),
        "app.AppImage",
        ELF_LEN,
        &[Entry::File("app.png", &png(1, 1))],
    );

    let err = try_get_icon(&path, &Settings::default()).unwrap_err();
    assert!(matches!(
        err,
        IconError::Extraction(ExtractError::NotFound(_))
    ));
}

#[test]
fn test_symlink_chain_is_followed() {
    let dir = tempdir().unwrap();
    let icon = png(16, 16);
    let path = appimage(
        dir.path(),
        "app.AppImage",
        ELF_LEN,
        &[
            Entry::File("real.png", &icon),
            Entry::Symlink("middle.png", "/real.png"),
            Entry::Symlink(".DirIcon", "middle.png"),
        ],
    );

    let found = try_get_icon(&path, &Settings::default()).unwrap();
    assert_eq!(found.data, icon);
}

#[test]
fn test_symlink_cycle_fails_closed() {
    let dir = tempdir().unwrap();
    let path = appimage(
        dir.path(),
        "app.AppImage",
        ELF_LEN,
        &[
            Entry::Symlink(".DirIcon", "other"),
            Entry::Symlink("other", "/.DirIcon"),
        ],
    );

    let err = try_get_icon(&path, &Settings::default()).unwrap_err();
    assert!(matches!(
        err,
        IconError::Extraction(ExtractError::SymlinkCycle(_))
    ));
}

#[test]
fn test_symlink_depth_is_bounded() {
    let dir = tempdir().unwrap();
    let icon = png(1, 1);
    let path = appimage(
        dir.path(),
        "app.AppImage",
        ELF_LEN,
        &[
            Entry::File("icon.png", &icon),
            Entry::Symlink("c", "icon.png"),
            Entry::Symlink("b", "c"),
            Entry::Symlink("a", "b"),
            Entry::Symlink(".DirIcon", "a"),
        ],
    );

    let shallow = Settings {
        max_symlink_depth: 3,
        ..Settings::default()
    };
    let err = try_get_icon(&path, &shallow).unwrap_err();
    assert!(matches!(
        err,
        IconError::Extraction(ExtractError::SymlinkDepth { limit: 3 })
    ));

    assert_eq!(try_get_icon(&path, &Settings::default()).unwrap().data, icon);
}

#[test]
fn test_directory_has_no_icon_data() {
    let dir = tempdir().unwrap();
    let path = appimage(dir.path(), "app.AppImage", ELF_LEN, &[Entry::Dir(".DirIcon")]);

    let err = try_get_icon(&path, &Settings::default()).unwrap_err();
    assert!(matches!(
        err,
        IconError::Extraction(ExtractError::NoData { .. })
    ));
}

#[test]
fn test_unsupported_image() {
    let dir = tempdir().unwrap();
    let path = appimage(
        dir.path(),
        "app.AppImage",
        ELF_LEN,
        &[Entry::File(".DirIcon", b"<svg xmlns=\"http://www.w3.org/2000/svg\"/>")],
    );

    let err = try_get_icon(&path, &Settings::default()).unwrap_err();
    assert!(matches!(err, IconError::UnsupportedImage));
}

#[test]
fn test_icon_size_limit() {
    let dir = tempdir().unwrap();
    let path = appimage(
        dir.path(),
        "app.AppImage",
        ELF_LEN,
        &[Entry::File(".DirIcon", &png(64, 64))],
    );

    let tight = Settings {
        max_icon_size: 16,
        ..Settings::default()
    };
    let err = try_get_icon(&path, &tight).unwrap_err();
    assert!(matches!(
        err,
        IconError::Extraction(ExtractError::TooLarge { limit: 16, .. })
    ));
}

#[test]
fn test_scan_fallback_when_elf_size_is_wrong() {
    let dir = tempdir().unwrap();
    let icon = png(1, 1);
    let path = appimage(
        dir.path(),
        "app.AppImage",
        0x3000,
        &[Entry::File(".DirIcon", &icon)],
    );

    let report = inspect(&path, &Settings::default()).unwrap();
    let located = report.located.unwrap();
    assert_eq!(located.offset, 0x3000);
    assert_eq!(located.method, LocateMethod::Scan);
    assert_eq!(report.elf.unwrap().logical_size, ELF_LEN as u64);

    assert_eq!(try_get_icon(&path, &Settings::default()).unwrap().data, icon);
}

#[test]
fn test_inspect_reports_elf_size_hit() {
    let dir = tempdir().unwrap();
    let path = appimage(
        dir.path(),
        "app.AppImage",
        ELF_LEN,
        &[Entry::File(".DirIcon", &png(20, 10))],
    );

    let report = inspect(&path, &Settings::default()).unwrap();
    assert!(report.is_appimage);
    let located = report.located.unwrap();
    assert_eq!(located.method, LocateMethod::ElfSize);
    assert_eq!(located.superblock.version_major, 4);
    assert_eq!(report.icon_format, Some(IconFormat::Png));
    assert_eq!(report.icon_dimensions, Some((20, 10)));
    assert!(report.icon_error.is_none());
}

#[test]
fn test_thumbnailer_downscales() {
    let dir = tempdir().unwrap();
    let path = appimage(
        dir.path(),
        "app.AppImage",
        ELF_LEN,
        &[Entry::File(".DirIcon", &png(256, 256))],
    );

    let mut thumbnailer = AppImageThumbnailer::new(Settings {
        thumbnail_size: 64,
        ..Settings::default()
    });
    assert!(thumbnailer.can_provide(&path));

    let thumb = thumbnailer.make_thumbnail(&path).unwrap();
    assert_eq!(png_dimensions(&thumb), Some((64, 64)));
    assert_eq!(thumbnailer.file_name_extension(), Some("png"));
}

#[test]
fn test_fragment_icon_without_fragment_table() {
    let dir = tempdir().unwrap();
    let scratch = tempdir().unwrap();
    let icon = png(4, 4);
    let mut payload = squashfs(&[
        Entry::File(".DirIcon", &icon),
        Entry::File("AppRun", b"#!/bin/sh\n"),
    ]);
    break_fragment_table(&mut payload);
    let path = appimage_with(dir.path(), "app.AppImage", ELF_LEN, &payload);

    let err = try_get_icon(&path, &settings_in(&scratch)).unwrap_err();
    assert!(matches!(
        err,
        IconError::Extraction(ExtractError::FragmentsUnavailable(_))
    ));
    assert!(get_icon(&path, &settings_in(&scratch)).is_none());
    assert_no_leftovers(&scratch);
}

#[test]
fn test_whole_block_icon_survives_broken_fragment_table() {
    let dir = tempdir().unwrap();
    let scratch = tempdir().unwrap();

    // Exactly one data block, so nothing of it lands in a fragment.
    let mut icon = png(2, 2);
    icon.resize(128 * 1024, 0);
    let mut payload = squashfs(&[
        Entry::File(".DirIcon", &icon),
        Entry::File("AppRun", b"#!/bin/sh\n"),
    ]);
    break_fragment_table(&mut payload);
    let path = appimage_with(dir.path(), "app.AppImage", ELF_LEN, &payload);

    let found = try_get_icon(&path, &settings_in(&scratch)).unwrap();
    assert_eq!(found.data, icon);
    assert_eq!(found.format, IconFormat::Png);
    assert_eq!(found.dimensions(), Some((2, 2)));
    assert_no_leftovers(&scratch);
}

#[test]
fn test_declared_but_missing_compressor_options() {
    let dir = tempdir().unwrap();
    let icon = png(16, 16);
    let mut payload = squashfs(&[Entry::File(".DirIcon", &icon)]);
    let flags = u16::from_le_bytes([payload[24], payload[25]]) | 0x0400;
    payload[24..26].copy_from_slice(&flags.to_le_bytes());
    let path = appimage_with(dir.path(), "app.AppImage", ELF_LEN, &payload);

    let report = inspect(&path, &Settings::default()).unwrap();
    let located = report.located.unwrap();
    assert!(located.superblock.has_compressor_options());

    let settings = Settings {
        backing: BackingStrategy::Window,
        ..Settings::default()
    };
    let found = try_get_icon(&path, &settings).unwrap();
    assert_eq!(found.data, icon);
}
