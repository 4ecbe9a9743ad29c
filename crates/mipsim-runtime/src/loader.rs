use goblin::elf::{self, header, section_header};
use log::{debug, info};
use mipsim_vm::VirtualMachine;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed ELF: {0}")]
    Elf(#[from] goblin::error::Error),

    #[error("expected a 32-bit ELF")]
    NotElf32,

    #[error("expected a big-endian ELF")]
    LittleEndian,

    #[error("ELF machine {0} is not MIPS")]
    WrongMachine(u16),

    #[error("section {name} runs past the end of the file")]
    Truncated { name: String },
}

/// On-disk program formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgramFormat {
    /// Raw big-endian instruction words, loaded at a base address.
    Binary,
    /// ELF32 big-endian MIPS executable.
    Elf,
}

pub struct ProgramLoader;

impl ProgramLoader {
    /// Load `path` and point the PC at the program's first instruction:
    /// `base` for raw binaries, the ELF entry point otherwise.
    pub fn load_file(
        vm: &mut VirtualMachine,
        path: &Path,
        format: ProgramFormat,
        base: u32,
    ) -> Result<u32, LoadError> {
        let buffer = fs::read(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let entry = match format {
            ProgramFormat::Binary => {
                Self::load_binary(vm, &buffer, base);
                base
            }
            ProgramFormat::Elf => Self::load_elf(vm, &buffer)?,
        };
        vm.set_pc(entry);
        info!("loaded {} ({} bytes), entry {:#010x}", path.display(), buffer.len(), entry);
        Ok(entry)
    }

    /// Write `bytes` as big-endian words from `base`. A trailing partial
    /// word is zero-padded. Returns the number of words written.
    pub fn load_binary(vm: &mut VirtualMachine, bytes: &[u8], base: u32) -> usize {
        let mut addr = base;
        let mut words = 0;
        for chunk in bytes.chunks(4) {
            let mut word = [0u8; 4];
            word[..chunk.len()].copy_from_slice(chunk);
            vm.write_word(addr, u32::from_be_bytes(word));
            addr = addr.wrapping_add(4);
            words += 1;
        }
        debug!("{} words written from {:#010x}", words, base);
        words
    }

    /// Copy every allocated section with a load address into memory and
    /// return the entry point. No relocation is performed.
    pub fn load_elf(vm: &mut VirtualMachine, bytes: &[u8]) -> Result<u32, LoadError> {
        let elf = elf::Elf::parse(bytes)?;

        if elf.is_64 {
            return Err(LoadError::NotElf32);
        }
        if elf.little_endian {
            return Err(LoadError::LittleEndian);
        }
        if elf.header.e_machine != header::EM_MIPS {
            return Err(LoadError::WrongMachine(elf.header.e_machine));
        }

        for sh in &elf.section_headers {
            let alloc = sh.sh_flags & u64::from(section_header::SHF_ALLOC) != 0;
            if !alloc || sh.sh_addr == 0 {
                continue;
            }
            let name = elf.shdr_strtab.get_at(sh.sh_name).unwrap_or("<unnamed>");
            let addr = sh.sh_addr as u32;

            match sh.sh_type {
                section_header::SHT_PROGBITS => {
                    let data = sh
                        .file_range()
                        .and_then(|range| bytes.get(range))
                        .ok_or_else(|| LoadError::Truncated {
                            name: name.to_string(),
                        })?;
                    for (i, byte) in data.iter().enumerate() {
                        vm.write_byte(addr.wrapping_add(i as u32), *byte);
                    }
                    debug!("{}: {} bytes at {:#010x}", name, data.len(), addr);
                }
                section_header::SHT_NOBITS => {
                    for i in 0..sh.sh_size as u32 {
                        vm.write_byte(addr.wrapping_add(i), 0);
                    }
                    debug!("{}: {} zero bytes at {:#010x}", name, sh.sh_size, addr);
                }
                _ => {}
            }
        }

        Ok(elf.entry as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mipsim_vm::VmConfig;

    fn vm() -> VirtualMachine {
        VirtualMachine::new(VmConfig::default()).unwrap()
    }

    #[test]
    fn binary_words_are_big_endian() {
        let mut vm = vm();
        let words = ProgramLoader::load_binary(
            &mut vm,
            &[0x20, 0x02, 0x00, 0xC8, 0x12, 0x34],
            0x0040_0000,
        );
        assert_eq!(words, 2);
        assert_eq!(vm.read_word(0x0040_0000), 0x2002_00C8);
        assert_eq!(vm.read_word(0x0040_0004), 0x1234_0000);
    }

    struct ElfBuilder {
        machine: u16,
        data: u8,
        entry: u32,
        sections: Vec<[u32; 10]>,
        payload: Vec<u8>,
    }

    const EHDR_SIZE: u32 = 52;
    const SHDR_SIZE: u32 = 40;

    fn push16(out: &mut Vec<u8>, v: u16) {
        out.extend_from_slice(&v.to_be_bytes());
    }

    impl ElfBuilder {
        fn mips() -> Self {
            Self {
                machine: header::EM_MIPS,
                data: header::ELFDATA2MSB,
                entry: 0,
                // index 0 is the null section
                sections: vec![[0; 10]],
                payload: Vec::new(),
            }
        }

        fn section(mut self, kind: u32, flags: u32, addr: u32, contents: &[u8], size: u32) -> Self {
            let offset = EHDR_SIZE + self.payload.len() as u32;
            self.payload.extend_from_slice(contents);
            self.sections
                .push([0, kind, flags, addr, offset, size, 0, 0, 4, 0]);
            self
        }

        fn build(self) -> Vec<u8> {
            let shoff = EHDR_SIZE + self.payload.len() as u32;
            let mut out = vec![0x7F, b'E', b'L', b'F', 1, self.data, 1];
            out.resize(16, 0);
            push16(&mut out, header::ET_EXEC);
            push16(&mut out, self.machine);
            for v in [1, self.entry, 0, shoff, 0] {
                out.extend_from_slice(&v.to_be_bytes());
            }
            for v in [
                EHDR_SIZE as u16,
                32,
                0,
                SHDR_SIZE as u16,
                self.sections.len() as u16,
                0,
            ] {
                push16(&mut out, v);
            }
            out.extend_from_slice(&self.payload);
            for section in &self.sections {
                for field in section {
                    out.extend_from_slice(&field.to_be_bytes());
                }
            }
            out
        }
    }

    #[test]
    fn elf_sections_are_placed_at_their_addresses() {
        let alloc = section_header::SHF_ALLOC;
        let code = [0x20, 0x02, 0x00, 0xC8, 0x00, 0x00, 0x00, 0x0D];
        let mut builder = ElfBuilder::mips()
            .section(section_header::SHT_PROGBITS, alloc, 0x0040_0000, &code, 8)
            .section(section_header::SHT_NOBITS, alloc, 0x1000_0000, &[], 4)
            .section(section_header::SHT_PROGBITS, 0, 0x2000_0000, &[0xFF; 4], 4);
        builder.entry = 0x0040_0000;
        let image = builder.build();

        let mut vm = vm();
        vm.write_word(0x1000_0000, 0xFFFF_FFFF);
        let entry = ProgramLoader::load_elf(&mut vm, &image).unwrap();

        assert_eq!(entry, 0x0040_0000);
        assert_eq!(vm.read_word(0x0040_0000), 0x2002_00C8);
        assert_eq!(vm.read_word(0x0040_0004), 0x0000_000D);
        assert_eq!(vm.read_word(0x1000_0000), 0);
        // not allocated
        assert_eq!(vm.read_word(0x2000_0000), 0);
    }

    #[test]
    fn elf_for_another_machine_is_rejected() {
        let mut builder = ElfBuilder::mips();
        builder.machine = header::EM_X86_64;
        let err = ProgramLoader::load_elf(&mut vm(), &builder.build()).unwrap_err();
        assert!(matches!(err, LoadError::WrongMachine(header::EM_X86_64)));
    }

    #[test]
    fn little_endian_elf_is_rejected() {
        let mut builder = ElfBuilder::mips();
        builder.data = header::ELFDATA2LSB;
        let err = ProgramLoader::load_elf(&mut vm(), &builder.build()).unwrap_err();
        // The header itself is written big-endian, so goblin may refuse it
        // before the endianness check does.
        assert!(matches!(err, LoadError::LittleEndian | LoadError::Elf(_)));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = ProgramLoader::load_file(
            &mut vm(),
            Path::new("/nonexistent/program.bin"),
            ProgramFormat::Binary,
            0,
        )
        .unwrap_err();
        assert!(err.to_string().contains("/nonexistent/program.bin"));
    }
}
