//! Print the cell table for a layout.

use gridsync_grid_model::layout::{compute_cells, GRID_MARGIN};

use super::{parse_layout, parse_size};

pub fn run(layout: String, size: String, sources: usize, json: bool) -> anyhow::Result<()> {
    let grid = parse_layout(&layout)?;
    let canvas = parse_size(&size)?;
    let cells = compute_cells(grid, canvas, sources)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&cells)?);
        return Ok(());
    }

    println!("Layout {grid} on {canvas} (margin {GRID_MARGIN}px)");
    println!("{:>5} {:>6} {:>6} {:>6} {:>6}", "cell", "x", "y", "width", "height");
    for cell in &cells {
        println!(
            "{:>5} {:>6} {:>6} {:>6} {:>6}",
            cell.index, cell.x, cell.y, cell.width, cell.height
        );
    }
    if sources > cells.len() {
        println!("{} source(s) beyond capacity would be ignored", sources - cells.len());
    }
    Ok(())
}
