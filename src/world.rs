use glam::{EulerRot, Mat3, Vec3};
use log::{debug, warn};

use crate::mesh::Mesh;

pub const MAX_GAME_OBJECTS: usize = 200;

/// Generational handle to a [`World`] slot. Stale after the object is destroyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectId {
    index: u32,
    generation: u32,
}

impl ObjectId {
    pub fn index(&self) -> usize {
        self.index as usize
    }
}

/// Something placed in the world, optionally with a (skinned) mesh.
#[derive(Debug, Clone)]
pub struct GameObject {
    pub name: String,
    pub tag: String,
    pub position: Vec3,
    /// Euler angles in degrees.
    pub rotation: Vec3,
    pub mesh: Option<Mesh>,
    pub active: bool,
}

impl GameObject {
    pub fn new(name: impl Into<String>, position: Vec3, rotation: Vec3) -> Self {
        Self {
            name: name.into(),
            tag: String::new(),
            position,
            rotation,
            mesh: None,
            active: true,
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    pub fn with_mesh(mut self, mesh: Mesh) -> Self {
        self.mesh = Some(mesh);
        self
    }

    /// Yaw, then pitch, then roll, the same order the camera uses.
    pub fn rotation_matrix(&self) -> Mat3 {
        Mat3::from_euler(
            EulerRot::YXZ,
            self.rotation.y.to_radians(),
            self.rotation.x.to_radians(),
            self.rotation.z.to_radians(),
        )
    }
}

#[derive(Debug, Clone, Default)]
struct Slot {
    generation: u32,
    object: Option<GameObject>,
}

/// Fixed capacity object store with slot reuse.
#[derive(Debug, Clone)]
pub struct World {
    slots: Vec<Slot>,
    capacity: usize,
}

impl Default for World {
    fn default() -> Self {
        Self::with_capacity(MAX_GAME_OBJECTS)
    }
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::new(),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.object.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Places `object` in the first free slot. Returns `None` when the world is full.
    pub fn create(&mut self, object: GameObject) -> Option<ObjectId> {
        let index = match self.slots.iter().position(|slot| slot.object.is_none()) {
            Some(index) => index,
            None if self.slots.len() < self.capacity => {
                self.slots.push(Slot::default());
                self.slots.len() - 1
            }
            None => {
                warn!("world is full ({} objects), {} not created", self.capacity, object.name);
                return None;
            }
        };
        debug!("created {} in slot {index}", object.name);
        let slot = &mut self.slots[index];
        slot.object = Some(object);
        Some(ObjectId {
            index: u32::try_from(index).ok()?,
            generation: slot.generation,
        })
    }

    /// Removes the object and frees its slot for reuse.
    pub fn destroy(&mut self, id: ObjectId) -> Option<GameObject> {
        let slot = self.slot_mut(id)?;
        let object = slot.object.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        debug!("destroyed {}", object.name);
        Some(object)
    }

    pub fn get(&self, id: ObjectId) -> Option<&GameObject> {
        self.slots
            .get(id.index())
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.object.as_ref())
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut GameObject> {
        self.slot_mut(id).and_then(|slot| slot.object.as_mut())
    }

    pub fn by_name(&self, name: &str) -> Option<ObjectId> {
        self.ids().find(|(_, object)| object.name == name).map(|(id, _)| id)
    }

    pub fn with_tag(&self, tag: &str) -> Vec<ObjectId> {
        self.ids()
            .filter(|(_, object)| object.tag == tag)
            .map(|(id, _)| id)
            .collect()
    }

    pub fn active(&self) -> Vec<ObjectId> {
        self.ids()
            .filter(|(_, object)| object.active)
            .map(|(id, _)| id)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &GameObject> {
        self.slots.iter().filter_map(|slot| slot.object.as_ref())
    }

    /// Applies a mutation to the object named `name`.
    pub fn update<F, R>(&mut self, name: &str, updater: F) -> Option<R>
    where
        F: FnOnce(&mut GameObject) -> R,
    {
        let id = self.by_name(name)?;
        self.get_mut(id).map(updater)
    }

    pub fn set_position(&mut self, name: &str, position: Vec3) -> bool {
        self.update(name, |object| object.position = position).is_some()
    }

    pub fn set_rotation(&mut self, name: &str, rotation: Vec3) -> bool {
        self.update(name, |object| object.rotation = rotation).is_some()
    }

    pub fn set_active(&mut self, name: &str, active: bool) -> bool {
        self.update(name, |object| object.active = active).is_some()
    }

    fn ids(&self) -> impl Iterator<Item = (ObjectId, &GameObject)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            let object = slot.object.as_ref()?;
            let id = ObjectId {
                index: index as u32,
                generation: slot.generation,
            };
            Some((id, object))
        })
    }

    fn slot_mut(&mut self, id: ObjectId) -> Option<&mut Slot> {
        self.slots
            .get_mut(id.index())
            .filter(|slot| slot.generation == id.generation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object(name: &str) -> GameObject {
        GameObject::new(name, Vec3::ZERO, Vec3::ZERO)
    }

    #[test]
    fn create_and_find_by_name() {
        let mut world = World::new();
        let player = world.create(object("Player").with_tag("player")).unwrap();
        world.create(object("Crate")).unwrap();
        assert_eq!(world.by_name("Player"), Some(player));
        assert_eq!(world.with_tag("player"), vec![player]);
        assert!(world.by_name("Ghost").is_none());
        assert_eq!(world.len(), 2);
    }

    #[test]
    fn destroyed_slots_are_reused_and_old_ids_go_stale() {
        let mut world = World::new();
        let first = world.create(object("A")).unwrap();
        assert_eq!(world.destroy(first).unwrap().name, "A");
        assert!(world.destroy(first).is_none());

        let second = world.create(object("B")).unwrap();
        assert_eq!(second.index(), first.index());
        assert!(world.get(first).is_none());
        assert_eq!(world.get(second).unwrap().name, "B");
    }

    #[test]
    fn capacity_is_enforced() {
        let mut world = World::with_capacity(2);
        assert!(world.create(object("A")).is_some());
        assert!(world.create(object("B")).is_some());
        assert!(world.create(object("C")).is_none());
        assert_eq!(world.capacity(), 2);
    }

    #[test]
    fn setters_report_missing_objects() {
        let mut world = World::new();
        world.create(object("Door")).unwrap();
        assert!(world.set_position("Door", Vec3::X));
        assert!(!world.set_position("Window", Vec3::X));
        assert!(world.set_active("Door", false));
        assert!(world.active().is_empty());
        let door = world.by_name("Door").unwrap();
        assert_eq!(world.get(door).unwrap().position, Vec3::X);
    }

    #[test]
    fn rotation_matrix_uses_degrees() {
        let spun = GameObject::new("Spinner", Vec3::ZERO, Vec3::new(0.0, 90.0, 0.0));
        let rotated = spun.rotation_matrix() * Vec3::Z;
        assert!((rotated - Vec3::X).length() < 1e-5, "{rotated:?}");
    }
}
