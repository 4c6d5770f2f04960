//! Tile Arena
//!
//! Generational slot map holding the live tiles. A `TileId` stays valid
//! until its tile is removed; after that the slot may be reused but the
//! old id never resolves again.

use crate::Tile;

/// Stable reference to a tile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileId {
    pub index: u32,
    pub generation: u32,
}

/// Generational arena of tiles
#[derive(Debug, Default)]
pub struct TileArena {
    slots: Vec<Option<(Tile, u32)>>,
    free_list: Vec<u32>,
    generations: Vec<u32>,
    live: usize,
}

impl TileArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, tile: Tile) -> TileId {
        self.live += 1;
        if let Some(index) = self.free_list.pop() {
            let generation = self.generations[index as usize];
            self.slots[index as usize] = Some((tile, generation));
            TileId { index, generation }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Some((tile, 0)));
            self.generations.push(0);
            TileId { index, generation: 0 }
        }
    }

    pub fn get(&self, id: TileId) -> Option<&Tile> {
        self.slots
            .get(id.index as usize)
            .and_then(|slot| slot.as_ref())
            .filter(|(_, g)| *g == id.generation)
            .map(|(tile, _)| tile)
    }

    pub fn get_mut(&mut self, id: TileId) -> Option<&mut Tile> {
        self.slots
            .get_mut(id.index as usize)
            .and_then(|slot| slot.as_mut())
            .filter(|(_, g)| *g == id.generation)
            .map(|(tile, _)| tile)
    }

    pub fn contains(&self, id: TileId) -> bool {
        self.get(id).is_some()
    }

    pub fn remove(&mut self, id: TileId) -> Option<Tile> {
        let index = id.index as usize;
        if !matches!(self.slots.get(index), Some(Some((_, g))) if *g == id.generation) {
            return None;
        }
        let (tile, _) = self.slots[index].take()?;
        self.generations[index] += 1;
        self.free_list.push(id.index);
        self.live -= 1;
        Some(tile)
    }

    /// Live tiles in slot order
    pub fn iter(&self) -> impl Iterator<Item = (TileId, &Tile)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.as_ref().map(|(tile, generation)| {
                (
                    TileId {
                        index: index as u32,
                        generation: *generation,
                    },
                    tile,
                )
            })
        })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (TileId, &mut Tile)> {
        self.slots.iter_mut().enumerate().filter_map(|(index, slot)| {
            slot.as_mut().map(|(tile, generation)| {
                (
                    TileId {
                        index: index as u32,
                        generation: *generation,
                    },
                    tile,
                )
            })
        })
    }

    /// Remove every tile, invalidating all outstanding ids
    pub fn drain(&mut self) -> Vec<Tile> {
        let mut drained = Vec::with_capacity(self.live);
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if let Some((tile, _)) = slot.take() {
                self.generations[index] += 1;
                self.free_list.push(index as u32);
                drained.push(tile);
            }
        }
        self.live = 0;
        drained
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }
}
