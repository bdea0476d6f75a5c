use std::fmt;

/// A QuakeC global or entity field slot.
///
/// Cells are untagged 32-bit words. The opcode that reads a cell decides whether it holds a float,
/// a string handle, an entity number, a field offset or pointer, a function number, or a raw
/// integer. Vectors occupy three consecutive cells.
///
/// None of the accessors validate anything; bounds and handle checks happen where the cell is
/// used as an address.
#[derive(Copy, Clone, Default, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Cell(u32);

/// Three consecutive float cells.
pub type Vector = [f32; 3];

impl Cell {
    pub const ZERO: Cell = Cell(0);

    pub const fn from_bits(bits: u32) -> Cell { Cell(bits) }

    pub const fn to_bits(self) -> u32 { let Cell(bits) = self; bits }

    pub fn from_float(value: f32) -> Cell { Cell(value.to_bits()) }

    pub const fn from_int(value: i32) -> Cell { Cell(value as u32) }

    pub fn as_float(self) -> f32 { f32::from_bits(self.0) }

    pub const fn as_int(self) -> i32 { self.0 as i32 }

    pub const fn as_string(self) -> i32 { self.0 as i32 }

    pub const fn as_entity(self) -> i32 { self.0 as i32 }

    /// A field offset, or after `ADDRESS`, a pointer into the entity field area.
    pub const fn as_field(self) -> i32 { self.0 as i32 }

    pub const fn as_function(self) -> i32 { self.0 as i32 }

    /// Test a cell the way `IF`, `IFNOT`, `NOT_F`, `AND` and `OR` do.
    ///
    /// Only the sign bit is ignored, so `0.0` and `-0.0` are false while every other bit pattern,
    /// NaNs and denormals included, is true.
    pub const fn is_true(self) -> bool { self.0 & 0x7fff_ffff != 0 }
}

impl From<f32> for Cell {
    fn from(value: f32) -> Cell { Cell::from_float(value) }
}

impl From<i32> for Cell {
    fn from(value: i32) -> Cell { Cell::from_int(value) }
}

impl From<bool> for Cell {
    fn from(value: bool) -> Cell { Cell::from_float(if value { 1.0 } else { 0.0 }) }
}

impl fmt::Debug for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}/{:#x}", self.as_float(), self.0)
    }
}

pub fn load_vector(cells: &[Cell]) -> Vector {
    [cells[0].as_float(), cells[1].as_float(), cells[2].as_float()]
}

pub fn store_vector(cells: &mut [Cell], value: Vector) {
    for (cell, value) in cells[..3].iter_mut().zip(value) {
        *cell = Cell::from_float(value);
    }
}
