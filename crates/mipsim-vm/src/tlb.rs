use crate::cop0::{Cop0, Cop0Reg, TLB_ENTRIES};

const VPN2_MASK: u32 = 0xFFFF_E000;
const ASID_MASK: u32 = 0x0000_00FF;
const GLOBAL: u32 = 1;
const INDEX_PROBE_FAILED: u32 = 0x8000_0000;

/// One joint TLB entry as written by TLBWI/TLBWR.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TlbEntry {
    pub page_mask: u32,
    pub entry_hi: u32,
    pub entry_lo0: u32,
    pub entry_lo1: u32,
}

impl TlbEntry {
    fn global(&self) -> bool {
        self.entry_lo0 & self.entry_lo1 & GLOBAL != 0
    }

    fn matches(&self, entry_hi: u32) -> bool {
        let vpn_mask = VPN2_MASK & !self.page_mask;
        let same_page = (self.entry_hi ^ entry_hi) & vpn_mask == 0;
        let same_asid = (self.entry_hi ^ entry_hi) & ASID_MASK == 0;
        same_page && (self.global() || same_asid)
    }
}

/// The TLB as plain data. Addresses are never translated through it; the
/// management instructions only move entries to and from COP0.
#[derive(Debug, Default, Clone)]
pub struct Tlb {
    entries: [TlbEntry; TLB_ENTRIES as usize],
}

impl Tlb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[TlbEntry] {
        &self.entries
    }

    fn slot(index: u32) -> usize {
        (index % TLB_ENTRIES) as usize
    }

    /// TLBR: load the entry at Index into the COP0 staging registers.
    pub fn read_indexed(&self, cop0: &mut Cop0) {
        let entry = self.entries[Self::slot(cop0.read(Cop0Reg::INDEX))];
        cop0.write_hardware(Cop0Reg::PAGE_MASK, entry.page_mask);
        cop0.write_hardware(Cop0Reg::ENTRY_HI, entry.entry_hi);
        cop0.write_hardware(Cop0Reg::ENTRY_LO0, entry.entry_lo0);
        cop0.write_hardware(Cop0Reg::ENTRY_LO1, entry.entry_lo1);
    }

    /// TLBWI
    pub fn write_indexed(&mut self, cop0: &Cop0) {
        let index = cop0.read(Cop0Reg::INDEX);
        self.write(index, cop0);
    }

    /// TLBWR
    pub fn write_random(&mut self, cop0: &Cop0) {
        let index = cop0.read(Cop0Reg::RANDOM);
        self.write(index, cop0);
    }

    fn write(&mut self, index: u32, cop0: &Cop0) {
        self.entries[Self::slot(index)] = TlbEntry {
            page_mask: cop0.read(Cop0Reg::PAGE_MASK),
            entry_hi: cop0.read(Cop0Reg::ENTRY_HI),
            entry_lo0: cop0.read(Cop0Reg::ENTRY_LO0),
            entry_lo1: cop0.read(Cop0Reg::ENTRY_LO1),
        };
    }

    /// TLBP: search for EntryHi. Index gets the match, or the P bit when
    /// there is none.
    pub fn probe(&self, cop0: &mut Cop0) {
        let entry_hi = cop0.read(Cop0Reg::ENTRY_HI);
        let index = self
            .entries
            .iter()
            .position(|entry| entry.matches(entry_hi))
            .map_or(INDEX_PROBE_FAILED, |i| i as u32);
        cop0.write_hardware(Cop0Reg::INDEX, index);
    }
}
