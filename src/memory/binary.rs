// Tue Jan 13 2026 - Alex

use crate::memory::{
    Address, ImageDatabase, MemoryError, MemoryRange, PointerWidth, Protection, Segment,
};
use goblin::elf::section_header::{SHF_ALLOC, SHF_EXECINSTR, SHF_WRITE, SHT_NOBITS};
use goblin::elf::Elf;
use goblin::mach::{Mach, MachO};
use goblin::pe::section_table::{
    IMAGE_SCN_CNT_CODE, IMAGE_SCN_MEM_EXECUTE, IMAGE_SCN_MEM_READ, IMAGE_SCN_MEM_WRITE,
};
use goblin::pe::PE;
use goblin::Object;
use memmap2::Mmap;
use serde::Serialize;
use std::fmt;
use std::fs::File;
use std::path::Path;

/// Section names only GCC-family toolchains emit into a PE image.
const GNU_SECTION_MARKERS: &[&str] = &[".eh_frame", ".debug_info", ".gcc_except_table"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ImageFormat {
    Pe,
    Elf,
    MachO,
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pe => write!(f, "PE"),
            Self::Elf => write!(f, "ELF"),
            Self::MachO => write!(f, "Mach-O"),
        }
    }
}

/// Facts about an image gathered while loading it.
#[derive(Debug, Clone, Serialize)]
pub struct ImageInfo {
    pub format: ImageFormat,
    pub width: PointerWidth,
    pub image_base: Address,
    pub machine: u32,
    pub gnu_sections: bool,
}

pub struct BinaryImage {
    pub database: ImageDatabase,
    pub info: ImageInfo,
}

impl BinaryImage {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, MemoryError> {
        let file = File::open(path.as_ref()).map_err(MemoryError::Io)?;
        let mmap = unsafe { Mmap::map(&file) }.map_err(MemoryError::Io)?;
        Self::parse(&mmap)
    }

    pub fn parse(data: &[u8]) -> Result<Self, MemoryError> {
        let object = Object::parse(data)
            .map_err(|e| MemoryError::BinaryParseError(format!("Failed to parse binary: {}", e)))?;
        match object {
            Object::PE(pe) => Ok(Self::from_pe(&pe, data)),
            Object::Elf(elf) => Ok(Self::from_elf(&elf, data)),
            Object::Mach(Mach::Binary(macho)) => Ok(Self::from_macho(&macho, data)),
            Object::Mach(Mach::Fat(_)) => Err(MemoryError::BinaryParseError(
                "Fat binaries not supported".to_string(),
            )),
            _ => Err(MemoryError::NotSupported("unrecognised image format".to_string())),
        }
    }

    fn from_pe(pe: &PE, data: &[u8]) -> Self {
        let image_base = pe.image_base as u64;
        let mut database = ImageDatabase::new();
        let mut gnu_sections = false;

        for section in &pe.sections {
            let name = section.name().unwrap_or("").to_string();
            if GNU_SECTION_MARKERS.contains(&name.as_str()) {
                gnu_sections = true;
            }
            let virtual_size = if section.virtual_size == 0 {
                section.size_of_raw_data
            } else {
                section.virtual_size
            } as u64;
            if virtual_size == 0 {
                continue;
            }

            let characteristics = section.characteristics;
            let protection = Protection::from_rwx(
                characteristics & IMAGE_SCN_MEM_READ != 0,
                characteristics & IMAGE_SCN_MEM_WRITE != 0,
                characteristics & (IMAGE_SCN_MEM_EXECUTE | IMAGE_SCN_CNT_CODE) != 0,
            );
            let start = Address::new(image_base + section.virtual_address as u64);
            let raw_size = (section.size_of_raw_data as u64).min(virtual_size);
            let bytes = file_bytes(data, section.pointer_to_raw_data as u64, raw_size);
            let segment = Segment::new(MemoryRange::from_start_size(start, virtual_size), protection, name)
                .with_file_size(bytes.len() as u64);
            database.add_segment(segment, bytes);
        }

        Self {
            database,
            info: ImageInfo {
                format: ImageFormat::Pe,
                width: PointerWidth::from_is_64(pe.is_64),
                image_base: Address::new(image_base),
                machine: pe.header.coff_header.machine as u32,
                gnu_sections,
            },
        }
    }

    fn from_elf(elf: &Elf, data: &[u8]) -> Self {
        let mut database = ImageDatabase::new();
        let mut image_base = u64::MAX;

        for header in &elf.section_headers {
            if header.sh_flags & SHF_ALLOC as u64 == 0 || header.sh_size == 0 {
                continue;
            }
            let name = elf.shdr_strtab.get_at(header.sh_name).unwrap_or("").to_string();
            let protection = Protection::from_rwx(
                true,
                header.sh_flags & SHF_WRITE as u64 != 0,
                header.sh_flags & SHF_EXECINSTR as u64 != 0,
            );
            let bytes = if header.sh_type == SHT_NOBITS {
                Vec::new()
            } else {
                file_bytes(data, header.sh_offset, header.sh_size)
            };
            image_base = image_base.min(header.sh_addr);
            let range = MemoryRange::from_start_size(Address::new(header.sh_addr), header.sh_size);
            let segment = Segment::new(range, protection, name).with_file_size(bytes.len() as u64);
            database.add_segment(segment, bytes);
        }

        Self {
            database,
            info: ImageInfo {
                format: ImageFormat::Elf,
                width: PointerWidth::from_is_64(elf.is_64),
                image_base: Address::new(if image_base == u64::MAX { 0 } else { image_base }),
                machine: elf.header.e_machine as u32,
                gnu_sections: true,
            },
        }
    }

    fn from_macho(macho: &MachO, data: &[u8]) -> Self {
        let mut database = ImageDatabase::new();
        let mut image_base = u64::MAX;

        for segment in &macho.segments {
            let segname = std::str::from_utf8(&segment.segname)
                .unwrap_or("")
                .trim_end_matches('\0')
                .to_string();
            let protection = Protection::from_vm_prot(segment.initprot);
            if protection == Protection::None || segment.vmsize == 0 {
                continue;
            }
            let bytes = file_bytes(data, segment.fileoff, segment.filesize.min(segment.vmsize));
            image_base = image_base.min(segment.vmaddr);
            let range = MemoryRange::from_start_size(Address::new(segment.vmaddr), segment.vmsize);
            let seg = Segment::new(range, protection, segname).with_file_size(bytes.len() as u64);
            database.add_segment(seg, bytes);
        }

        Self {
            database,
            info: ImageInfo {
                format: ImageFormat::MachO,
                width: PointerWidth::from_is_64(macho.is_64),
                image_base: Address::new(if image_base == u64::MAX { 0 } else { image_base }),
                machine: macho.header.cputype,
                gnu_sections: false,
            },
        }
    }
}

fn file_bytes(data: &[u8], offset: u64, size: u64) -> Vec<u8> {
    let start = offset as usize;
    let end = start.saturating_add(size as usize).min(data.len());
    data.get(start..end).map(<[u8]>::to_vec).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_bytes_clamps_to_file() {
        let data = [1u8, 2, 3, 4];
        assert_eq!(file_bytes(&data, 2, 8), vec![3, 4]);
        assert!(file_bytes(&data, 9, 1).is_empty());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(BinaryImage::parse(&[0u8; 16]).is_err());
    }
}
