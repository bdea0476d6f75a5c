use crate::vm::{Entities, ErrorKind};

/// A snapshot of the entity area's dimensions, used to check every computed address.
#[derive(Copy, Clone, Debug)]
pub(crate) struct Bounds {
    fields: usize,
    entities: usize,
}

impl Bounds {
    pub(crate) fn of<W: Entities + ?Sized>(world: &W) -> Bounds {
        let fields = world.fields_per_entity();
        // Pointers are stored in 32-bit cells.
        let entities = match fields {
            0 => world.max_entities(),
            fields => usize::min(world.max_entities(), i32::MAX as usize / fields),
        };
        Bounds { fields, entities }
    }

    pub(crate) fn entity(&self, entity: i32) -> Result<usize, ErrorKind> {
        let index = entity as u32 as usize;
        if index >= self.entities {
            return Err(ErrorKind::OutOfBoundsEntity { entity, max: self.entities });
        }
        Ok(index)
    }

    /// Check an entity number and the `width` cells of a field, as read by `LOAD_*`.
    pub(crate) fn field(&self, entity: i32, field: i32, width: usize) -> Result<(usize, usize), ErrorKind> {
        let entity = self.entity(entity)?;
        let index = field as u32 as usize;
        if index + width > self.fields {
            return Err(ErrorKind::OutOfBoundsField { field, max: self.fields });
        }
        Ok((entity, index))
    }

    /// Compute the pointer `ADDRESS` produces for an entity's field.
    pub(crate) fn address(&self, entity: i32, field: i32) -> Result<i32, ErrorKind> {
        let (entity, field) = self.field(entity, field, 1)?;
        Ok((entity * self.fields + field) as i32)
    }

    /// Split a pointer stored through by `STOREP_*` into an entity and field.
    pub(crate) fn pointer(&self, pointer: i32, width: usize) -> Result<(usize, usize), ErrorKind> {
        let area = self.fields * self.entities;
        let index = pointer as u32 as usize;
        if index + width > area || index % self.fields + width > self.fields {
            return Err(ErrorKind::OutOfBoundsPointer { pointer, area });
        }
        Ok((index / self.fields, index % self.fields))
    }
}

/// Compute the address of element `index` of the global array at `base`.
///
/// The array's highest valid index is stored as an integer in the cell before `base`, and the
/// element must also lie inside the global array.
pub(crate) fn indexed(
    globals: usize, base: usize, max: i32, index: f32, width: usize
) -> Result<usize, ErrorKind> {
    let index = index as i32;
    if index < 0 || index > max {
        return Err(ErrorKind::OutOfBoundsIndexedGlobal { index, max });
    }
    let ofs = base + index as usize * width;
    if ofs + width > globals {
        return Err(ErrorKind::OutOfBoundsIndexedGlobal { index, max });
    }
    Ok(ofs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds() -> Bounds {
        Bounds { fields: 10, entities: 4 }
    }

    #[test]
    fn field() {
        let bounds = bounds();
        assert!(matches!(bounds.field(3, 9, 1), Ok((3, 9))));
        assert!(matches!(bounds.field(3, 7, 3), Ok((3, 7))));

        assert!(matches!(bounds.field(4, 0, 1), Err(ErrorKind::OutOfBoundsEntity { entity: 4, max: 4 })));
        assert!(matches!(bounds.field(-1, 0, 1), Err(ErrorKind::OutOfBoundsEntity { entity: -1, .. })));
        assert!(matches!(bounds.field(0, 10, 1), Err(ErrorKind::OutOfBoundsField { field: 10, max: 10 })));
        assert!(matches!(bounds.field(0, 8, 3), Err(ErrorKind::OutOfBoundsField { field: 8, .. })));
        assert!(matches!(bounds.field(0, -1, 1), Err(ErrorKind::OutOfBoundsField { field: -1, .. })));
    }

    #[test]
    fn pointer() {
        let bounds = bounds();
        assert!(matches!(bounds.address(2, 5), Ok(25)));
        assert!(matches!(bounds.pointer(25, 1), Ok((2, 5))));
        assert!(matches!(bounds.pointer(5, 1), Ok((0, 5))));
        assert!(matches!(bounds.pointer(39, 1), Ok((3, 9))));

        assert!(matches!(bounds.pointer(38, 3), Err(ErrorKind::OutOfBoundsPointer { pointer: 38, area: 40 })));
        assert!(matches!(bounds.pointer(17, 3), Ok((1, 7))));
        assert!(matches!(bounds.pointer(18, 3), Err(ErrorKind::OutOfBoundsPointer { pointer: 18, .. })));
        assert!(matches!(bounds.pointer(9, 2), Err(ErrorKind::OutOfBoundsPointer { pointer: 9, .. })));
        assert!(matches!(bounds.pointer(40, 1), Err(ErrorKind::OutOfBoundsPointer { .. })));
        assert!(matches!(bounds.pointer(-1, 1), Err(ErrorKind::OutOfBoundsPointer { .. })));

        let empty = Bounds { fields: 0, entities: 1 };
        assert!(matches!(empty.pointer(0, 1), Err(ErrorKind::OutOfBoundsPointer { .. })));
    }

    #[test]
    fn indexed_globals() {
        assert!(matches!(indexed(100, 50, 4, 4.0, 1), Ok(54)));
        assert!(matches!(indexed(100, 50, 4, 2.9, 3), Ok(56)));
        assert!(matches!(indexed(100, 50, 4, 0.0, 1), Ok(50)));

        assert!(matches!(indexed(100, 50, 4, 5.0, 1), Err(ErrorKind::OutOfBoundsIndexedGlobal { index: 5, max: 4 })));
        assert!(matches!(indexed(100, 50, 4, -1.0, 1), Err(ErrorKind::OutOfBoundsIndexedGlobal { index: -1, .. })));
        assert!(matches!(indexed(52, 50, 4, 1.0, 3), Err(ErrorKind::OutOfBoundsIndexedGlobal { index: 1, .. })));
    }
}
