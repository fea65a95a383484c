use std::path::Path;

use appicon_core::{inspect, Inspection, Settings};
use appicon_utils::bytes::format_bytes;
use nu_ansi_term::Color::{Cyan, Green, Red, Yellow};
use tracing::info;

use crate::{error::Result, utils::Colored};

fn yes_no(value: bool) -> Colored<&'static str> {
    if value {
        Colored(Green, "yes")
    } else {
        Colored(Red, "no")
    }
}

fn print_report(report: &Inspection) {
    info!(
        "{}: {}",
        Colored(Cyan, "File"),
        report.path.display()
    );
    info!(
        "{}: {} ({} bytes)",
        Colored(Cyan, "Size"),
        format_bytes(report.file_size, 2),
        report.file_size
    );
    info!(
        "{}: {}",
        Colored(Cyan, "Type-2 AppImage"),
        yes_no(report.is_appimage)
    );

    match (&report.elf, &report.elf_error) {
        (Some(elf), _) => {
            info!(
                "{}: {:?} {:?}, {} sections at {:#x}, logical size {:#x}",
                Colored(Cyan, "ELF"),
                elf.header.class,
                elf.header.endian,
                elf.header.shnum,
                elf.header.shoff,
                elf.logical_size
            );
        }
        (None, Some(err)) => info!("{}: {}", Colored(Cyan, "ELF"), Colored(Yellow, err)),
        (None, None) => {}
    }

    if let Some(located) = &report.located {
        let sb = &located.superblock;
        info!(
            "{}: {:#x} (found by {:?})",
            Colored(Cyan, "Squashfs offset"),
            located.offset,
            located.method
        );
        info!(
            "{}: v{}.{}, {}, block size {}, {} inodes, {} fragments, {} used",
            Colored(Cyan, "Superblock"),
            sb.version_major,
            sb.version_minor,
            sb.compression_name(),
            format_bytes(u64::from(sb.block_size), 0),
            sb.inode_count,
            sb.fragment_count,
            format_bytes(sb.bytes_used, 2)
        );
    }
    if let Some(backing) = report.backing {
        info!("{}: {:?}", Colored(Cyan, "Backing"), backing);
    }

    if let Some(format) = report.icon_format {
        let size = report.icon_size.unwrap_or_default() as u64;
        match report.icon_dimensions {
            Some((w, h)) => {
                info!(
                    "{}: {format}, {w}x{h}, {}",
                    Colored(Cyan, "Icon"),
                    format_bytes(size, 2)
                )
            }
            None => info!("{}: {format}, {}", Colored(Cyan, "Icon"), format_bytes(size, 2)),
        }
    }
    if let Some(err) = &report.icon_error {
        info!("{}: {}", Colored(Cyan, "Icon"), Colored(Red, err));
    }
}

/// Returns whether an icon was found.
pub fn inspect_appimage(path: &Path, settings: &Settings, json: bool) -> Result<bool> {
    let report = inspect(path, settings)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(report.icon_format.is_some())
}
