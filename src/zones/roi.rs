use crate::zones::grid::{CellId, SpatialGrid};
use crate::Errors;
use anyhow::Result;
use log::warn;
use std::collections::BTreeSet;

/// Globally unique zone token
pub type ZoneId = u64;

/// Outcome of the membership evaluation of one track for one step
///
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Outside -> Inside
    Entered { cell: CellId },
    /// Inside -> Inside, the cell changed
    Moved { from: CellId, to: CellId },
    /// Inside -> Outside, also produced when the track departs while inside
    Exited { from: CellId },
    /// Inside -> Inside, same cell
    Stayed { cell: CellId },
    /// Outside -> Outside
    Outside,
}

impl Transition {
    /// The cell to persist, only entries and moves are persisted
    ///
    pub fn persisted_cell(&self) -> Option<CellId> {
        match self {
            Transition::Entered { cell } => Some(*cell),
            Transition::Moved { to, .. } => Some(*to),
            _ => None,
        }
    }
}

/// Region of interest made of grid cells. Keeps the number of tracks currently inside.
///
#[derive(Debug, Clone)]
pub struct RoiZone {
    id: ZoneId,
    cells: BTreeSet<CellId>,
    occupancy: u32,
}

impl RoiZone {
    pub fn new<I>(cells: I) -> Self
    where
        I: IntoIterator<Item = CellId>,
    {
        Self {
            id: rand::random(),
            cells: cells.into_iter().collect(),
            occupancy: 0,
        }
    }

    /// Selects the cells of a divided grid by a rectangle given with two corners.
    ///
    /// A cell is selected when one of its vertical edges lies within `[x1, x2)` and one
    /// of its horizontal edges lies within `[y1, y2)`.
    ///
    pub fn from_rect(grid: &SpatialGrid, corner1: (u32, u32), corner2: (u32, u32)) -> Result<Self> {
        if !grid.is_divided() {
            return Err(Errors::GridNotDivided.into());
        }
        let (x1, x2) = (corner1.0.min(corner2.0), corner1.0.max(corner2.0));
        let (y1, y2) = (corner1.1.min(corner2.1), corner1.1.max(corner2.1));
        let edge_within = |start: u32, lo: u32, hi: u32| {
            let end = start + grid.cell_size();
            (lo <= start && start < hi) || (lo <= end && end < hi)
        };
        let cells = grid
            .cells()
            .iter()
            .filter(|c| edge_within(c.x, x1, x2) && edge_within(c.y, y1, y2))
            .map(|c| c.id);
        Ok(Self::new(cells))
    }

    pub fn id(&self) -> ZoneId {
        self.id
    }

    pub fn cells(&self) -> &BTreeSet<CellId> {
        &self.cells
    }

    pub fn contains(&self, cell: CellId) -> bool {
        self.cells.contains(&cell)
    }

    /// Number of tracks currently inside
    ///
    pub fn occupancy(&self) -> u32 {
        self.occupancy
    }

    fn inside(&self, cell: Option<CellId>) -> Option<CellId> {
        cell.filter(|c| self.contains(*c))
    }

    /// Evaluates the membership change of a track and updates the occupancy
    ///
    /// # Parameters
    /// * `current` - grid cell of the track center for the step, `None` outside the frame
    /// * `previous` - grid cell of the previous snapshot, `None` for a new track
    ///
    pub fn evaluate(&mut self, current: Option<CellId>, previous: Option<CellId>) -> Transition {
        match (self.inside(previous), self.inside(current)) {
            (None, Some(cell)) => {
                self.occupancy += 1;
                Transition::Entered { cell }
            }
            (Some(from), Some(to)) if from != to => Transition::Moved { from, to },
            (Some(_), Some(cell)) => Transition::Stayed { cell },
            (Some(from), None) => {
                match self.occupancy.checked_sub(1) {
                    Some(o) => self.occupancy = o,
                    None => warn!("Zone {:x} exit without a matching entry", self.id),
                }
                Transition::Exited { from }
            }
            (None, None) => Transition::Outside,
        }
    }

    /// The track left the active set, an inside track exits
    ///
    pub fn depart(&mut self, previous: Option<CellId>) -> Transition {
        self.evaluate(None, previous)
    }
}

#[cfg(test)]
mod tests {
    use crate::zones::grid::SpatialGrid;
    use crate::zones::roi::{RoiZone, Transition};

    #[test]
    fn transition_scenario() {
        let mut zone = RoiZone::new([0, 1]);
        // cell 0 -> cell 1 -> outside the zone (cell 2) -> cell 0
        let trace = [Some(0), Some(1), Some(2), Some(0)];
        let mut previous = None;
        let mut got = vec![];
        for current in trace {
            let t = zone.evaluate(current, previous);
            got.push((t, zone.occupancy()));
            previous = current;
        }
        assert_eq!(
            got,
            vec![
                (Transition::Entered { cell: 0 }, 1),
                (Transition::Moved { from: 0, to: 1 }, 1),
                (Transition::Exited { from: 1 }, 0),
                (Transition::Entered { cell: 0 }, 1),
            ]
        );
    }

    #[test]
    fn persisted_cells() {
        assert_eq!(Transition::Entered { cell: 3 }.persisted_cell(), Some(3));
        assert_eq!(Transition::Moved { from: 3, to: 4 }.persisted_cell(), Some(4));
        assert_eq!(Transition::Exited { from: 3 }.persisted_cell(), None);
        assert_eq!(Transition::Stayed { cell: 3 }.persisted_cell(), None);
        assert_eq!(Transition::Outside.persisted_cell(), None);
    }

    #[test]
    fn occupancy_never_negative() {
        let mut zone = RoiZone::new([5]);
        let mut entries = 0;
        let mut exits = 0;
        let trace = [
            (Some(5), None),
            (Some(5), Some(5)),
            (None, Some(5)),
            (None, None),
            (Some(7), None),
            (Some(5), Some(7)),
        ];
        for (current, previous) in trace {
            match zone.evaluate(current, previous) {
                Transition::Entered { .. } => entries += 1,
                Transition::Exited { .. } => exits += 1,
                _ => {}
            }
        }
        assert_eq!(zone.occupancy(), entries - exits);
        assert_eq!(zone.occupancy(), 1);

        assert_eq!(zone.depart(Some(5)), Transition::Exited { from: 5 });
        assert_eq!(zone.occupancy(), 0);
        // an unbalanced exit keeps the counter at zero
        zone.depart(Some(5));
        assert_eq!(zone.occupancy(), 0);
        assert_eq!(zone.depart(None), Transition::Outside);
    }

    #[test]
    fn rect_selection() {
        let grid = SpatialGrid::divided(100, 400, 300).unwrap();
        let zone = RoiZone::from_rect(&grid, (150, 250), (50, 50)).unwrap();
        // columns 0 and 1 (edges 0..200 intersect [50, 150)), rows 0, 1 and 2
        assert_eq!(zone.cells().iter().copied().collect::<Vec<_>>(), vec![0, 1, 4, 5, 8, 9]);

        let undivided = SpatialGrid::new(100).unwrap();
        assert!(RoiZone::from_rect(&undivided, (0, 0), (10, 10)).is_err());
    }

    #[test]
    fn unique_ids() {
        assert_ne!(RoiZone::new([0]).id(), RoiZone::new([0]).id());
    }
}
