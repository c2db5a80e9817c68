//! Component C2: the TLB table.
//!
//! A fixed-size two-dimensional array indexed by `[mmu_idx][page_slot]`,
//! where `page_slot = (addr >> PAGE_SHIFT) & (TLB_SIZE - 1)`. It is a
//! direct-mapped cache with no policy of its own — matching, dispatch and
//! refill all live in [`crate::softmmu`]; this module only stores and
//! mutates entries.

use crate::{IO_MEM_NB_ENTRIES, PAGE_MASK, PAGE_SHIFT, TLB_SIZE};
use vm_core::error::MemoryError;
use vm_core::GuestAddr;

/// Set on a tagged `addr_*` field when the masked comparison should never
/// match (used on `mmu_idx` columns that have never been installed).
const TLB_INVALID_MASK: u64 = 1 << 3;
/// Marks an entry as routed to the host bus rather than RAM. Whether an MMIO
/// write specifically goes to the notdirty hook is not a separate tag bit:
/// it's decided by comparing the entry's `io_index` against
/// [`crate::IO_MEM_NOTDIRTY_INDEX`], the same region-table lookup the source
/// performs on the parallel `iotlb` slot.
pub const TLB_MMIO: u64 = 1 << 4;
/// Self-invalidates on first probe; forces the next access of any width
/// back through `tlb_fill` even if the reinstalled entry is identical.
/// Exists to let PMP/MPU regions narrower than a page be re-checked on
/// every access.
pub const TLB_ONE_SHOT: u64 = 1 << 6;

const STATUS_BITS: u64 = TLB_INVALID_MASK | TLB_MMIO | TLB_ONE_SHOT;

/// Sentinel tag that never matches any guest address (the `-1` convention
/// of the source: an all-ones field has `TLB_INVALID_MASK` set, and that bit
/// falls inside `PAGE_MASK`'s cleared range on the compared side, so it can
/// never equal a real address's masked page number).
const NEVER_MATCH: u64 = u64::MAX;

/// One TLB entry, shared by all three access columns of a single
/// `(mmu_idx, page_slot)` cell.
#[derive(Debug, Clone, Copy)]
pub struct TlbEntry {
    pub addr_read: u64,
    pub addr_write: u64,
    pub addr_code: u64,
    /// Signed offset such that `host_ptr = guest_addr.wrapping_add(addend)`.
    /// Meaningless (and unused) for MMIO entries.
    pub addend: i64,
    /// Parallel `iotlb` slot: index into the host I/O memory-region table.
    pub io_index: u64,
}

impl Default for TlbEntry {
    fn default() -> Self {
        TlbEntry {
            addr_read: NEVER_MATCH,
            addr_write: NEVER_MATCH,
            addr_code: NEVER_MATCH,
            addend: 0,
            io_index: 0,
        }
    }
}

/// Which of the three tagged columns a probe is against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlbColumn {
    Read,
    Write,
    Code,
}

impl TlbEntry {
    fn field(&self, column: TlbColumn) -> u64 {
        match column {
            TlbColumn::Read => self.addr_read,
            TlbColumn::Write => self.addr_write,
            TlbColumn::Code => self.addr_code,
        }
    }

    fn field_mut(&mut self, column: TlbColumn) -> &mut u64 {
        match column {
            TlbColumn::Read => &mut self.addr_read,
            TlbColumn::Write => &mut self.addr_write,
            TlbColumn::Code => &mut self.addr_code,
        }
    }

    /// Raw tag with `TLB_ONE_SHOT` masked off, for the match test.
    fn match_tag(&self, column: TlbColumn) -> u64 {
        self.field(column) & !TLB_ONE_SHOT
    }

    pub fn is_one_shot(&self, column: TlbColumn) -> bool {
        self.field(column) & TLB_ONE_SHOT != 0
    }

    pub fn is_mmio(&self, column: TlbColumn) -> bool {
        self.match_tag(column) & !PAGE_MASK == TLB_MMIO
    }

    /// The match test from the access engine: ignoring `TLB_ONE_SHOT`, do
    /// the high-order (page) bits of `addr` equal the tag's, allowing the
    /// tag to additionally carry `TLB_INVALID_MASK`?
    pub fn matches(&self, column: TlbColumn, addr: GuestAddr) -> bool {
        (addr.0 & PAGE_MASK) == (self.match_tag(column) & (PAGE_MASK | TLB_INVALID_MASK))
    }
}

/// Parameters an external `tlb_fill` supplies when installing a page.
///
/// `io_index` is the parallel `iotlb` slot: an index into the host I/O
/// memory-region table (§6). For an MMIO fill, the installer sets it to
/// whichever region the access resolved to; [`crate::IO_MEM_NOTDIRTY_INDEX`]
/// is the one designated index the access engine routes to the
/// notdirty-writeback hook instead of the generic bus write.
#[derive(Debug, Clone, Copy)]
pub struct TlbFillEntry {
    pub readable: bool,
    pub writable: bool,
    pub executable: bool,
    pub mmio: bool,
    pub one_shot: bool,
    pub addend: i64,
    pub io_index: u64,
}

fn page_slot(addr: GuestAddr) -> usize {
    ((addr.0 >> PAGE_SHIFT) as usize) & (TLB_SIZE - 1)
}

fn build_tag(page_base: u64, permitted: bool, mmio: bool, one_shot: bool) -> u64 {
    if !permitted {
        return NEVER_MATCH;
    }
    let mut tag = page_base & PAGE_MASK;
    if mmio {
        tag |= TLB_MMIO;
    }
    if one_shot {
        tag |= TLB_ONE_SHOT;
    }
    debug_assert_eq!(tag & STATUS_BITS & PAGE_MASK, 0);
    tag
}

struct TlbColumnStorage {
    entries: Vec<TlbEntry>,
}

impl TlbColumnStorage {
    fn new() -> Self {
        TlbColumnStorage {
            entries: vec![TlbEntry::default(); TLB_SIZE],
        }
    }
}

/// Owns one `[mmu_idx][page_slot]` array plus the parallel `iotlb`
/// structure described in the data model.
pub struct TlbTable {
    columns: Vec<TlbColumnStorage>,
}

impl TlbTable {
    pub fn new(mmu_idx_count: usize) -> Self {
        TlbTable {
            columns: (0..mmu_idx_count).map(|_| TlbColumnStorage::new()).collect(),
        }
    }

    pub fn mmu_idx_count(&self) -> usize {
        self.columns.len()
    }

    fn check_mmu_idx(&self, mmu_idx: usize) -> Result<(), MemoryError> {
        if mmu_idx >= self.columns.len() {
            return Err(MemoryError::InvalidMmuIndex {
                index: mmu_idx,
                max: self.columns.len(),
            });
        }
        Ok(())
    }

    /// Probe by address: returns the entry occupying `addr`'s slot,
    /// regardless of whether it actually matches (callers run the match
    /// test themselves, as the access engine does).
    pub fn probe(&self, mmu_idx: usize, addr: GuestAddr) -> Result<&TlbEntry, MemoryError> {
        self.check_mmu_idx(mmu_idx)?;
        Ok(&self.columns[mmu_idx].entries[page_slot(addr)])
    }

    pub fn probe_mut(&mut self, mmu_idx: usize, addr: GuestAddr) -> Result<&mut TlbEntry, MemoryError> {
        self.check_mmu_idx(mmu_idx)?;
        let slot = page_slot(addr);
        Ok(&mut self.columns[mmu_idx].entries[slot])
    }

    /// Install a freshly-filled page, as called by the external `tlb_fill`
    /// contract after it has consulted the PMP unit (or equivalent).
    pub fn install(&mut self, mmu_idx: usize, addr: GuestAddr, fill: TlbFillEntry) -> Result<(), MemoryError> {
        self.check_mmu_idx(mmu_idx)?;
        let page_base = addr.0;
        let slot = page_slot(addr);
        let entry = TlbEntry {
            addr_read: build_tag(page_base, fill.readable, fill.mmio, fill.one_shot),
            addr_write: build_tag(page_base, fill.writable, fill.mmio, fill.one_shot),
            addr_code: build_tag(page_base, fill.executable, fill.mmio, fill.one_shot),
            addend: fill.addend,
            io_index: fill.io_index % IO_MEM_NB_ENTRIES as u64,
        };
        self.columns[mmu_idx].entries[slot] = entry;
        Ok(())
    }

    /// Invalidate the single page containing `addr`, on every mmu index.
    pub fn invalidate_page(&mut self, addr: GuestAddr) {
        let slot = page_slot(addr);
        for column in &mut self.columns {
            column.entries[slot] = TlbEntry::default();
        }
    }

    /// Invalidate only `mmu_idx`'s copy of the page containing `addr`; used
    /// by the one-shot pre-flush, which only needs to re-check the column
    /// the current access is using.
    pub fn invalidate_page_idx(&mut self, mmu_idx: usize, addr: GuestAddr) -> Result<(), MemoryError> {
        self.check_mmu_idx(mmu_idx)?;
        let slot = page_slot(addr);
        self.columns[mmu_idx].entries[slot] = TlbEntry::default();
        Ok(())
    }

    /// Bulk-flush every mmu index. Called after any PMP mutation, since a
    /// changed rule can invalidate translations installed under the old
    /// configuration.
    pub fn invalidate_all(&mut self) {
        for column in &mut self.columns {
            for entry in &mut column.entries {
                *entry = TlbEntry::default();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fill(addend: i64) -> TlbFillEntry {
        TlbFillEntry {
            readable: true,
            writable: true,
            executable: false,
            mmio: false,
            one_shot: false,
            addend,
            io_index: 0,
        }
    }

    #[test]
    fn fresh_table_never_matches() {
        let table = TlbTable::new(2);
        let entry = table.probe(0, GuestAddr(0x1000)).unwrap();
        assert!(!entry.matches(TlbColumn::Read, GuestAddr(0x1000)));
    }

    #[test]
    fn install_then_match() {
        let mut table = TlbTable::new(1);
        table.install(0, GuestAddr(0x2000), fill(0x1000)).unwrap();
        let entry = table.probe(0, GuestAddr(0x2000)).unwrap();
        assert!(entry.matches(TlbColumn::Read, GuestAddr(0x2000)));
        assert!(entry.matches(TlbColumn::Write, GuestAddr(0x2000)));
        assert!(!entry.matches(TlbColumn::Code, GuestAddr(0x2000)));
        assert_eq!(entry.addend, 0x1000);
    }

    #[test]
    fn match_ignores_page_offset() {
        let mut table = TlbTable::new(1);
        table.install(0, GuestAddr(0x2000), fill(0)).unwrap();
        let entry = table.probe(0, GuestAddr(0x2ABC)).unwrap();
        assert!(entry.matches(TlbColumn::Read, GuestAddr(0x2ABC)));
    }

    #[test]
    fn invalidate_page_clears_all_columns() {
        let mut table = TlbTable::new(2);
        table.install(0, GuestAddr(0x3000), fill(0)).unwrap();
        table.install(1, GuestAddr(0x3000), fill(0)).unwrap();
        table.invalidate_page(GuestAddr(0x3000));
        assert!(!table
            .probe(0, GuestAddr(0x3000))
            .unwrap()
            .matches(TlbColumn::Read, GuestAddr(0x3000)));
        assert!(!table
            .probe(1, GuestAddr(0x3000))
            .unwrap()
            .matches(TlbColumn::Read, GuestAddr(0x3000)));
    }

    #[test]
    fn one_shot_tag_is_reported() {
        let mut table = TlbTable::new(1);
        let mut f = fill(0);
        f.one_shot = true;
        table.install(0, GuestAddr(0x4000), f).unwrap();
        let entry = table.probe(0, GuestAddr(0x4000)).unwrap();
        assert!(entry.is_one_shot(TlbColumn::Read));
        assert!(entry.matches(TlbColumn::Read, GuestAddr(0x4000)));
    }

    #[test]
    fn mmio_tag_and_io_index_are_reported() {
        let mut table = TlbTable::new(1);
        let mut f = fill(0);
        f.mmio = true;
        f.io_index = crate::IO_MEM_NOTDIRTY_INDEX;
        table.install(0, GuestAddr(0x5000), f).unwrap();
        let entry = table.probe(0, GuestAddr(0x5000)).unwrap();
        assert!(entry.is_mmio(TlbColumn::Read));
        assert_eq!(entry.io_index, crate::IO_MEM_NOTDIRTY_INDEX);
    }

    #[test]
    fn out_of_range_mmu_idx_errors() {
        let table = TlbTable::new(1);
        assert!(table.probe(5, GuestAddr(0)).is_err());
    }
}
