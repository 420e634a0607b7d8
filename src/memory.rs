//! Memory mapper for the pPIM row address space
//!
//! Matrices are placed greedily, one after another, starting at row 0.
//! Space is never reclaimed during a compilation; [`MemoryMapper::reset`]
//! clears everything for the next one.
//!
//! Elements are stored row-major, `elements_per_row` to a physical memory
//! row, so a small matrix shares a single row and a large one spans many.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use crate::ast::Dimensions;
use crate::error::{CompileError, CompileResult};
use crate::hardware::ArchConfig;

/// Placement of one matrix
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryBinding {
    pub name: String,
    pub start_address: u16,
    pub dimensions: Dimensions,
    /// Number of memory rows occupied
    pub size: u16,
}

impl MemoryBinding {
    pub fn range(&self) -> AddressRange {
        AddressRange {
            start: self.start_address,
            end: self.start_address + self.size - 1,
        }
    }
}

/// Inclusive range of row addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressRange {
    pub start: u16,
    pub end: u16,
}

impl AddressRange {
    pub fn contains(&self, address: u16) -> bool {
        (self.start..=self.end).contains(&address)
    }
}

/// Allocates matrices to row addresses and assigns banks to elements
#[derive(Debug, Clone)]
pub struct MemoryMapper {
    address_rows: u32,
    elements_per_row: u32,
    banks: u32,
    /// Bindings in allocation order
    bindings: Vec<MemoryBinding>,
    /// name -> index into `bindings`
    index: HashMap<String, usize>,
    /// Next free row address
    next_row: u32,
}

impl MemoryMapper {
    pub fn new() -> Self {
        let arch = ArchConfig::default();
        Self {
            address_rows: arch.address_rows,
            elements_per_row: arch.elements_per_row,
            banks: arch.banks,
            bindings: Vec::new(),
            index: HashMap::new(),
            next_row: 0,
        }
    }

    /// Mapper using the geometry of a specific hardware profile
    pub fn with_arch(arch: &ArchConfig) -> CompileResult<Self> {
        arch.validate()?;
        Ok(Self {
            address_rows: arch.address_rows,
            elements_per_row: arch.elements_per_row,
            banks: arch.banks,
            ..Self::new()
        })
    }

    /// Clear all bindings and restart allocation at row 0
    pub fn reset(&mut self) {
        self.bindings.clear();
        self.index.clear();
        self.next_row = 0;
    }

    /// Memory rows needed to hold a matrix, at least one
    pub fn calculate_matrix_size(&self, dimensions: Dimensions) -> u32 {
        let rows = dimensions
            .elements()
            .div_ceil(u64::from(self.elements_per_row))
            .max(1);
        u32::try_from(rows).unwrap_or(u32::MAX)
    }

    /// Place a matrix at the next free row and return its start address
    pub fn map_matrix(&mut self, name: &str, dimensions: Dimensions) -> CompileResult<u16> {
        if self.is_mapped(name) {
            return Err(CompileError::AlreadyMapped {
                name: name.to_string(),
            });
        }

        let size = self.calculate_matrix_size(dimensions);
        let available = self.available_rows();
        if size > available {
            return Err(CompileError::OutOfSpace {
                name: name.to_string(),
                requested: size,
                available,
            });
        }

        // Both fit in 9 bits: next_row + size <= address_rows <= 512
        let start = self.next_row as u16;
        let binding = MemoryBinding {
            name: name.to_string(),
            start_address: start,
            dimensions,
            size: size as u16,
        };
        debug!(matrix = name, shape = %dimensions, start, size, "mapped matrix");

        self.index.insert(name.to_string(), self.bindings.len());
        self.bindings.push(binding);
        self.next_row += size;

        Ok(start)
    }

    fn binding(&self, name: &str) -> CompileResult<&MemoryBinding> {
        self.index
            .get(name)
            .map(|&i| &self.bindings[i])
            .ok_or_else(|| CompileError::not_mapped(name))
    }

    fn checked(&self, name: &str, row: u32, col: u32) -> CompileResult<&MemoryBinding> {
        let binding = self.binding(name)?;
        let dims = binding.dimensions;
        if row >= dims.rows || col >= dims.cols {
            return Err(CompileError::IndexOutOfRange {
                name: name.to_string(),
                row,
                col,
                rows: dims.rows,
                cols: dims.cols,
            });
        }
        Ok(binding)
    }

    fn linear_address(&self, binding: &MemoryBinding, row: u32, col: u32) -> u16 {
        let linear = u64::from(row) * u64::from(binding.dimensions.cols) + u64::from(col);
        // linear < rows * cols, so the offset is below the binding's size
        let offset = linear / u64::from(self.elements_per_row);
        binding.start_address + offset as u16
    }

    /// Row address holding element `(row, col)`
    pub fn element_address(&self, name: &str, row: u32, col: u32) -> CompileResult<u16> {
        let binding = self.checked(name, row, col)?;
        Ok(self.linear_address(binding, row, col))
    }

    /// Row address where matrix row `row` begins
    pub fn row_address(&self, name: &str, row: u32) -> CompileResult<u16> {
        let binding = self.binding(name)?;
        let dims = binding.dimensions;
        if row >= dims.rows {
            return Err(CompileError::IndexOutOfRange {
                name: name.to_string(),
                row,
                col: 0,
                rows: dims.rows,
                cols: dims.cols,
            });
        }
        Ok(self.linear_address(binding, row, 0))
    }

    /// Bank serving element `(row, col)`
    pub fn bank_index(&self, name: &str, row: u32, col: u32) -> CompileResult<u8> {
        self.checked(name, row, col)?;
        let bank = (u64::from(row) + u64::from(col)) % u64::from(self.banks);
        Ok(bank as u8)
    }

    pub fn is_mapped(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn dimensions(&self, name: &str) -> CompileResult<Dimensions> {
        Ok(self.binding(name)?.dimensions)
    }

    pub fn address_range(&self, name: &str) -> CompileResult<AddressRange> {
        Ok(self.binding(name)?.range())
    }

    /// All bindings in allocation order
    pub fn bindings(&self) -> &[MemoryBinding] {
        &self.bindings
    }

    /// Rows still free at the end of the address space
    pub fn available_rows(&self) -> u32 {
        self.address_rows - self.next_row
    }
}

impl Default for MemoryMapper {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn dims(rows: u32, cols: u32) -> Dimensions {
        Dimensions::new(rows, cols)
    }

    #[test]
    fn test_matrix_size() {
        let mapper = MemoryMapper::new();
        assert_eq!(mapper.calculate_matrix_size(dims(3, 2)), 1);
        assert_eq!(mapper.calculate_matrix_size(dims(100, 100)), 40);
        assert_eq!(mapper.calculate_matrix_size(dims(16, 16)), 1);
        assert_eq!(mapper.calculate_matrix_size(dims(16, 17)), 2);
        assert_eq!(mapper.calculate_matrix_size(dims(0, 5)), 1);
    }

    #[test]
    fn test_greedy_allocation() {
        let mut mapper = MemoryMapper::new();
        // 10, 40 and 300 rows respectively
        assert_eq!(mapper.map_matrix("A", dims(10, 256)).unwrap(), 0);
        assert_eq!(mapper.map_matrix("B", dims(100, 100)).unwrap(), 10);
        assert_eq!(mapper.map_matrix("C", dims(300, 256)).unwrap(), 50);
        assert_eq!(mapper.available_rows(), 162);

        let err = mapper.map_matrix("D", dims(163, 256)).unwrap_err();
        assert!(matches!(err, CompileError::OutOfSpace { requested: 163, available: 162, .. }));

        // Exactly filling the space still works
        assert_eq!(mapper.map_matrix("E", dims(162, 256)).unwrap(), 350);
        assert_eq!(mapper.available_rows(), 0);
    }

    #[test]
    fn test_ranges_do_not_overlap() {
        let mut mapper = MemoryMapper::new();
        mapper.map_matrix("A", dims(3, 2)).unwrap();
        mapper.map_matrix("B", dims(100, 100)).unwrap();
        mapper.map_matrix("C", dims(2, 4)).unwrap();

        assert_eq!(mapper.address_range("A").unwrap(), AddressRange { start: 0, end: 0 });
        assert_eq!(mapper.address_range("B").unwrap(), AddressRange { start: 1, end: 40 });
        assert_eq!(mapper.address_range("C").unwrap(), AddressRange { start: 41, end: 41 });
    }

    #[test]
    fn test_already_mapped() {
        let mut mapper = MemoryMapper::new();
        mapper.map_matrix("A", dims(2, 2)).unwrap();
        assert!(matches!(
            mapper.map_matrix("A", dims(2, 2)),
            Err(CompileError::AlreadyMapped { .. })
        ));
    }

    #[test]
    fn test_lookups_require_mapping() {
        let mapper = MemoryMapper::new();
        assert!(!mapper.is_mapped("A"));
        assert!(matches!(mapper.element_address("A", 0, 0), Err(CompileError::NotMapped { .. })));
        assert!(matches!(mapper.row_address("A", 0), Err(CompileError::NotMapped { .. })));
        assert!(matches!(mapper.bank_index("A", 0, 0), Err(CompileError::NotMapped { .. })));
        assert!(matches!(mapper.dimensions("A"), Err(CompileError::NotMapped { .. })));
        assert!(matches!(mapper.address_range("A"), Err(CompileError::NotMapped { .. })));
    }

    #[test]
    fn test_index_out_of_range() {
        let mut mapper = MemoryMapper::new();
        mapper.map_matrix("A", dims(3, 2)).unwrap();
        assert!(matches!(
            mapper.element_address("A", 3, 0),
            Err(CompileError::IndexOutOfRange { .. })
        ));
        assert!(matches!(
            mapper.element_address("A", 0, 2),
            Err(CompileError::IndexOutOfRange { .. })
        ));
        assert!(matches!(mapper.row_address("A", 3), Err(CompileError::IndexOutOfRange { .. })));
        assert!(matches!(mapper.bank_index("A", 0, 5), Err(CompileError::IndexOutOfRange { .. })));
    }

    #[test]
    fn test_element_addresses_row_major() {
        let mut mapper = MemoryMapper::new();
        mapper.map_matrix("pad", dims(1, 1)).unwrap();
        mapper.map_matrix("M", dims(4, 300)).unwrap();

        // Linear index 0..1200 over rows of 256 elements, starting at row 1
        assert_eq!(mapper.element_address("M", 0, 0).unwrap(), 1);
        assert_eq!(mapper.element_address("M", 0, 255).unwrap(), 1);
        assert_eq!(mapper.element_address("M", 0, 256).unwrap(), 2);
        assert_eq!(mapper.element_address("M", 3, 299).unwrap(), 5);
        assert!(mapper.address_range("M").unwrap().contains(5));
    }

    #[test]
    fn test_row_address_matches_first_element() {
        let mut mapper = MemoryMapper::new();
        mapper.map_matrix("M", dims(200, 3)).unwrap();

        for row in [0, 84, 85, 86, 199] {
            assert_eq!(
                mapper.row_address("M", row).unwrap(),
                mapper.element_address("M", row, 0).unwrap()
            );
        }
        // 85 * 3 = 255 still fits in the first row, 86 * 3 = 258 does not
        assert_eq!(mapper.row_address("M", 85).unwrap(), 0);
        assert_eq!(mapper.row_address("M", 86).unwrap(), 1);
    }

    #[test]
    fn test_bank_index() {
        let mut mapper = MemoryMapper::new();
        mapper.map_matrix("A", dims(8, 8)).unwrap();
        mapper.map_matrix("B", dims(6, 4)).unwrap();

        assert_eq!(mapper.bank_index("A", 5, 3).unwrap(), 0);
        assert_eq!(mapper.bank_index("B", 5, 3).unwrap(), 0);
        assert_eq!(mapper.bank_index("A", 1, 2).unwrap(), 3);
    }

    #[test]
    fn test_reset() {
        let mut mapper = MemoryMapper::new();
        mapper.map_matrix("A", dims(10, 256)).unwrap();
        mapper.reset();

        assert!(!mapper.is_mapped("A"));
        assert!(mapper.bindings().is_empty());
        assert_eq!(mapper.map_matrix("B", dims(1, 1)).unwrap(), 0);
    }

    #[test]
    fn test_custom_geometry() {
        let arch = ArchConfig {
            address_rows: 4,
            elements_per_row: 16,
            banks: 2,
            ..ArchConfig::default()
        };
        let mut mapper = MemoryMapper::with_arch(&arch).unwrap();

        assert_eq!(mapper.map_matrix("A", dims(4, 8)).unwrap(), 0);
        assert_eq!(mapper.element_address("A", 2, 0).unwrap(), 1);
        assert_eq!(mapper.bank_index("A", 1, 2).unwrap(), 1);
        assert!(matches!(
            mapper.map_matrix("B", dims(8, 8)),
            Err(CompileError::OutOfSpace { .. })
        ));
    }
}
