use crate::vm::Cell;

/// The entity field storage a program runs against.
///
/// Entities are numbered from 0, the world, and each owns `fields_per_entity` cells. Pointers
/// produced by `ADDRESS` are flat offsets `entity * fields_per_entity + field` into this area.
///
/// `field_block` and `field_block_mut` are only called with `entity < max_entities()` and must
/// return exactly `fields_per_entity()` cells. Both limits are sampled when an invocation starts
/// and again after every builtin returns, so builtins may grow the store.
pub trait Entities {
    fn fields_per_entity(&self) -> usize;
    fn max_entities(&self) -> usize;
    fn field_block(&self, entity: usize) -> &[Cell];
    fn field_block_mut(&mut self, entity: usize) -> &mut [Cell];
}

/// A contiguous entity store with a fixed field layout.
pub struct EdictStore {
    fields: usize,
    len: usize,
    cells: Vec<Cell>,
}

impl EdictStore {
    /// Create a store holding only the world.
    pub fn new(fields_per_entity: usize) -> EdictStore {
        EdictStore { fields: fields_per_entity, len: 1, cells: vec![Cell::ZERO; fields_per_entity] }
    }

    /// Add a cleared entity and return its number.
    pub fn spawn(&mut self) -> usize {
        let entity = self.len;
        self.len += 1;
        self.cells.resize(self.len * self.fields, Cell::ZERO);
        entity
    }

    pub fn len(&self) -> usize { self.len }

    pub fn clear(&mut self, entity: usize) {
        self.field_block_mut(entity).fill(Cell::ZERO);
    }

    pub fn get(&self, entity: usize, field: usize) -> Cell {
        self.field_block(entity)[field]
    }

    pub fn set(&mut self, entity: usize, field: usize, value: impl Into<Cell>) {
        self.field_block_mut(entity)[field] = value.into();
    }
}

impl Entities for EdictStore {
    fn fields_per_entity(&self) -> usize { self.fields }

    fn max_entities(&self) -> usize { self.len }

    fn field_block(&self, entity: usize) -> &[Cell] {
        let start = entity * self.fields;
        &self.cells[start..start + self.fields]
    }

    fn field_block_mut(&mut self, entity: usize) -> &mut [Cell] {
        let start = entity * self.fields;
        &mut self.cells[start..start + self.fields]
    }
}
