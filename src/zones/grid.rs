use crate::Errors;
use anyhow::Result;
use log::{info, warn};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Cell identifier, sequential in row-major scan order
pub type CellId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    /// left edge
    pub x: u32,
    /// top edge
    pub y: u32,
    pub size: u32,
    pub id: CellId,
    /// accumulated score, filled from the store for analytics
    pub score: f32,
}

impl Cell {
    /// Half-open containment: `[x, x + size) x [y, y + size)`
    ///
    pub fn contains(&self, point: &Point2<f32>) -> bool {
        let (x, y) = (self.x as f32, self.y as f32);
        let size = self.size as f32;
        point.x >= x && point.x < x + size && point.y >= y && point.y < y + size
    }
}

/// Partition of the frame into `cell_size` squares. Cells of the last column and row
/// may extend past the frame border; points outside the frame belong to no cell.
///
#[derive(Debug, Clone)]
pub struct SpatialGrid {
    cell_size: u32,
    frame: Option<(u32, u32)>,
    columns: u32,
    cells: Vec<Cell>,
}

impl SpatialGrid {
    pub fn new(cell_size: u32) -> Result<Self> {
        if cell_size == 0 {
            return Err(Errors::InvalidCellSize.into());
        }
        Ok(Self {
            cell_size,
            frame: None,
            columns: 0,
            cells: Vec::default(),
        })
    }

    /// Creates and divides the grid in one call
    ///
    pub fn divided(cell_size: u32, width: u32, height: u32) -> Result<Self> {
        let mut grid = Self::new(cell_size)?;
        grid.divide(width, height)?;
        Ok(grid)
    }

    /// Partitions the frame starting at `(0, 0)`, row by row. The geometry is fixed
    /// afterwards, a second call fails.
    ///
    pub fn divide(&mut self, width: u32, height: u32) -> Result<&[Cell]> {
        if self.frame.is_some() {
            return Err(Errors::GridAlreadyDivided.into());
        }
        if width == 0 || height == 0 {
            return Err(Errors::InvalidFrameDimensions(width, height).into());
        }

        let columns = (width + self.cell_size - 1) / self.cell_size;
        let rows = (height + self.cell_size - 1) / self.cell_size;
        let mut id = 0;
        for row in 0..rows {
            for column in 0..columns {
                self.cells.push(Cell {
                    x: column * self.cell_size,
                    y: row * self.cell_size,
                    size: self.cell_size,
                    id,
                    score: 0.0,
                });
                id += 1;
            }
        }
        self.columns = columns;
        self.frame = Some((width, height));

        info!(
            "Source: {}x{} - Cell Size: {}x{} - Cells: {}",
            width,
            height,
            self.cell_size,
            self.cell_size,
            self.cells.len()
        );
        Ok(&self.cells)
    }

    pub fn cell_size(&self) -> u32 {
        self.cell_size
    }

    pub fn frame(&self) -> Option<(u32, u32)> {
        self.frame
    }

    pub fn is_divided(&self) -> bool {
        self.frame.is_some()
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// The cell containing the point, `None` outside the frame or before `divide`
    ///
    pub fn in_cell(&self, point: &Point2<f32>) -> Option<&Cell> {
        let (width, height) = self.frame?;
        if !(point.x >= 0.0
            && point.y >= 0.0
            && point.x < width as f32
            && point.y < height as f32)
        {
            return None;
        }
        let column = (point.x / self.cell_size as f32) as u32;
        let row = (point.y / self.cell_size as f32) as u32;
        self.cells
            .get((row * self.columns + column) as usize)
            .filter(|c| c.contains(point))
    }

    pub fn cell(&self, id: CellId) -> Option<&Cell> {
        self.cells.get(id as usize)
    }

    /// Attaches persisted per-cell scores to the regenerated grid
    ///
    pub fn with_scores<I>(&mut self, scores: I) -> Result<()>
    where
        I: IntoIterator<Item = (CellId, f32)>,
    {
        if !self.is_divided() {
            return Err(Errors::GridNotDivided.into());
        }
        for (id, score) in scores {
            match self.cells.get_mut(id as usize) {
                Some(cell) => cell.score = score,
                None => {
                    warn!("Grid has no cell {} to attach a score to", id);
                    return Err(Errors::MissingCell(id).into());
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::zones::grid::SpatialGrid;
    use crate::Errors;
    use nalgebra::Point2;

    #[test]
    fn divide() {
        let mut grid = SpatialGrid::new(100).unwrap();
        let cells = grid.divide(250, 120).unwrap();
        // 3 columns (the last one is partial) and 2 rows
        assert_eq!(cells.len(), 6);
        assert_eq!((cells[2].x, cells[2].y, cells[2].id), (200, 0, 2));
        assert_eq!((cells[3].x, cells[3].y, cells[3].id), (0, 100, 3));

        let err = grid.divide(250, 120).unwrap_err();
        assert_eq!(
            err.downcast_ref::<Errors>(),
            Some(&Errors::GridAlreadyDivided)
        );
    }

    #[test]
    fn invalid_arguments() {
        assert!(SpatialGrid::new(0).is_err());
        let mut grid = SpatialGrid::new(10).unwrap();
        assert!(grid.divide(0, 10).is_err());
        assert!(grid.in_cell(&Point2::new(1.0, 1.0)).is_none());
        assert!(grid.with_scores([(0, 1.0)]).is_err());
    }

    #[test]
    fn lookup_round_trip() {
        let grid = SpatialGrid::divided(100, 640, 480).unwrap();
        for cell in grid.cells() {
            for (dx, dy) in [(0.0, 0.0), (50.0, 50.0), (99.5, 99.5)] {
                let p = Point2::new(cell.x as f32 + dx, cell.y as f32 + dy);
                if p.x < 640.0 && p.y < 480.0 {
                    assert_eq!(grid.in_cell(&p).map(|c| c.id), Some(cell.id));
                }
            }
            assert_eq!(grid.cell(cell.id), Some(cell));
        }
    }

    #[test]
    fn reproducible_ids() {
        let a = SpatialGrid::divided(100, 640, 480).unwrap();
        let b = SpatialGrid::divided(100, 640, 480).unwrap();
        let layout = |g: &SpatialGrid| {
            g.cells()
                .iter()
                .map(|c| (c.x, c.y, c.id))
                .collect::<Vec<_>>()
        };
        assert_eq!(layout(&a), layout(&b));
        assert_eq!(a.cells().len(), 7 * 5);

        for (x, y) in [(0.0, 0.0), (99.99, 0.0), (100.0, 99.99), (639.5, 479.5), (321.0, 250.0)] {
            let p = Point2::new(x, y);
            let id = a.in_cell(&p).map(|c| c.id);
            assert!(id.is_some());
            assert_eq!(id, b.in_cell(&p).map(|c| c.id));
            assert_eq!(id, a.in_cell(&p).map(|c| c.id));
            // the arithmetic lookup agrees with a scan over the cells
            assert_eq!(id, a.cells().iter().find(|c| c.contains(&p)).map(|c| c.id));
        }
    }

    #[test]
    fn boundaries() {
        let grid = SpatialGrid::divided(100, 200, 200).unwrap();
        // the shared edge belongs to the right cell
        assert_eq!(grid.in_cell(&Point2::new(100.0, 0.0)).map(|c| c.id), Some(1));
        assert_eq!(grid.in_cell(&Point2::new(0.0, 100.0)).map(|c| c.id), Some(2));
        assert!(grid.in_cell(&Point2::new(200.0, 10.0)).is_none());
        assert!(grid.in_cell(&Point2::new(-0.5, 10.0)).is_none());
        assert!(grid.in_cell(&Point2::new(f32::NAN, 10.0)).is_none());
        assert!(grid.cell(4).is_none());
    }

    #[test]
    fn scores() {
        let mut grid = SpatialGrid::divided(10, 20, 20).unwrap();
        grid.with_scores([(1, 0.5), (3, 0.75)]).unwrap();
        assert_eq!(grid.cell(1).map(|c| c.score), Some(0.5));
        assert_eq!(grid.cell(0).map(|c| c.score), Some(0.0));
        assert!(grid.with_scores([(9, 0.1)]).is_err());
    }
}
