//! Breadth-first distance fields used for unit movement.
//!
//! A gradient holds 255 on source tiles and one less per step away from
//! the nearest source, down to 1. Zero marks an obstacle or a tile no
//! source can reach. Units climb the gradient one neighbour at a time.
//!
//! A gradient covers either the whole toroidal map or a square window
//! around a building; both are addressed with map coordinates.

use std::collections::VecDeque;

/// Value on source tiles.
pub const SOURCE: u8 = 255;

/// Value on obstacles and unreachable tiles.
pub const UNREACHABLE: u8 = 0;

/// Side of the window used for building-local gradients.
pub const LOCAL_GRADIENT_SIZE: i32 = 32;

/// Neighbour offsets, indexed by unit direction (clockwise from top-left).
pub const NEIGHBOURS: [(i32, i32); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
];

/// Direction index of a step, if it is one of the eight neighbours.
#[must_use]
pub fn direction_of(dx: i32, dy: i32) -> Option<u8> {
    NEIGHBOURS
        .iter()
        .position(|&n| n == (dx, dy))
        .map(|i| i as u8)
}

/// Rectangle of the map covered by a gradient.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GradientArea {
    /// Left edge, in map coordinates.
    pub x: i32,
    /// Top edge, in map coordinates.
    pub y: i32,
    /// Covered width.
    pub width: i32,
    /// Covered height.
    pub height: i32,
    /// Map width (power of two).
    pub map_width: i32,
    /// Map height (power of two).
    pub map_height: i32,
}

impl GradientArea {
    /// The whole map.
    #[must_use]
    pub const fn whole_map(map_width: i32, map_height: i32) -> Self {
        Self {
            x: 0,
            y: 0,
            width: map_width,
            height: map_height,
            map_width,
            map_height,
        }
    }

    /// A square window of `size` tiles centred on `(cx, cy)`, clamped to the map.
    #[must_use]
    pub fn window(cx: i32, cy: i32, size: i32, map_width: i32, map_height: i32) -> Self {
        let width = size.min(map_width);
        let height = size.min(map_height);
        Self {
            x: (cx - width / 2).rem_euclid(map_width),
            y: (cy - height / 2).rem_euclid(map_height),
            width,
            height,
            map_width,
            map_height,
        }
    }

    /// Local index of map tile `(x, y)`, if covered.
    #[must_use]
    pub fn index(&self, x: i32, y: i32) -> Option<usize> {
        let lx = (x - self.x).rem_euclid(self.map_width);
        let ly = (y - self.y).rem_euclid(self.map_height);
        if lx < self.width && ly < self.height {
            Some((ly * self.width + lx) as usize)
        } else {
            None
        }
    }

    /// Whether the rectangle `(x, y, w, h)` overlaps this area.
    #[must_use]
    ///
    /// Rectangles wider than the map cover every column.
    pub fn intersects(&self, x: i32, y: i32, w: i32, h: i32) -> bool {
        let (x, y) = (x.rem_euclid(self.map_width), y.rem_euclid(self.map_height));
        let (w, h) = (w.min(self.map_width), h.min(self.map_height));
        (0..h).any(|dy| (0..w).any(|dx| self.index(x + dx, y + dy).is_some()))
    }

    fn position(&self, index: usize) -> (i32, i32) {
        let i = index as i32;
        (
            (self.x + i % self.width) & (self.map_width - 1),
            (self.y + i / self.width) & (self.map_height - 1),
        )
    }

    fn len(&self) -> usize {
        (self.width * self.height) as usize
    }
}

/// Distance field over a [`GradientArea`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gradient {
    area: GradientArea,
    values: Vec<u8>,
}

impl Gradient {
    /// Compute a gradient by breadth-first search from every source tile.
    ///
    /// Sources take precedence over obstacles, so a building footprint can
    /// be the source of a gradient that units walk around.
    #[must_use]
    pub fn compute(
        area: GradientArea,
        is_source: impl Fn(i32, i32) -> bool,
        is_obstacle: impl Fn(i32, i32) -> bool,
    ) -> Self {
        let mut values = vec![UNREACHABLE; area.len()];
        let mut queue = VecDeque::new();

        for (index, value) in values.iter_mut().enumerate() {
            let (x, y) = area.position(index);
            if is_source(x, y) {
                *value = SOURCE;
                queue.push_back(index);
            }
        }

        while let Some(index) = queue.pop_front() {
            let next = values[index] - 1;
            if next == UNREACHABLE {
                continue;
            }
            let (x, y) = area.position(index);
            for (dx, dy) in NEIGHBOURS {
                let Some(n) = area.index(x + dx, y + dy) else {
                    continue;
                };
                if values[n] != UNREACHABLE {
                    continue;
                }
                let (nx, ny) = area.position(n);
                if is_obstacle(nx, ny) {
                    continue;
                }
                values[n] = next;
                queue.push_back(n);
            }
        }

        Self { area, values }
    }

    /// Covered area.
    #[must_use]
    pub const fn area(&self) -> &GradientArea {
        &self.area
    }

    /// Value at map tile `(x, y)`; zero outside the covered area.
    #[must_use]
    pub fn value(&self, x: i32, y: i32) -> u8 {
        self.area.index(x, y).map_or(UNREACHABLE, |i| self.values[i])
    }

    /// Whether `(x, y)` is covered by this gradient.
    #[must_use]
    pub fn covers(&self, x: i32, y: i32) -> bool {
        self.area.index(x, y).is_some()
    }

    /// Whether any tile other than the sources is reachable.
    #[must_use]
    pub fn has_reachable_tiles(&self) -> bool {
        self.values.iter().any(|&v| v != UNREACHABLE && v != SOURCE)
    }

    /// Neighbour step climbing the gradient from `(x, y)`.
    ///
    /// Returns the offset to the highest neighbour strictly above the
    /// current value, first in [`NEIGHBOURS`] order on ties.
    #[must_use]
    pub fn best_step(&self, x: i32, y: i32) -> Option<(i32, i32)> {
        let mut best = self.value(x, y);
        let mut step = None;
        for (dx, dy) in NEIGHBOURS {
            let v = self.value(x + dx, y + dy);
            if v > best {
                best = v;
                step = Some((dx, dy));
            }
        }
        step
    }
}
