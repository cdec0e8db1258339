//! ASCII plotting for terminal output.
//!
//! This is intentionally "dumb" (fixed-size grid), optimized for:
//! - quick visual sanity checks in a terminal
//! - deterministic output (helpful for golden tests)
//!
//! Plot elements:
//! - interpolation curve: `-` line
//! - identity (linear) reference: `.` line
//! - batch steps at (raw alpha, effective alpha): `o`

use crate::domain::{AlphaSequence, InterpolationModel};
use crate::models::evaluate;

/// Render the sequence's curve with its steps overlaid.
///
/// Both axes span `[0, 1]`, widened when a step extrapolates outside it.
pub fn render_curve_preview(sequence: &AlphaSequence, width: usize, height: usize) -> String {
    let width = width.max(10);
    let height = height.max(5);

    let (x_min, x_max) = widen_unit(sequence.iter().map(|s| s.raw));
    let (y_min, y_max) = widen_unit(
        sequence
            .iter()
            .map(|s| s.effective)
            .chain(sample(sequence.model, x_min, x_max, width).into_iter().map(|(_, y)| y)),
    );
    let frame = Frame {
        x_min,
        x_max,
        y_min,
        y_max,
        width,
        height,
    };

    let mut grid = vec![vec![' '; width]; height];

    // Curve first, then the identity fills the cells it leaves blank.
    draw_polyline(&mut grid, &frame, &sample(sequence.model, x_min, x_max, width), '-');
    draw_polyline(&mut grid, &frame, &sample(InterpolationModel::Exact, x_min, x_max, width), '.');

    for step in sequence.iter() {
        let x = frame.map_x(step.raw);
        let y = frame.map_y(step.effective);
        grid[y][x] = 'o';
    }

    let mut out = format!(
        "Curve: {} | alpha=[{x_min:.2}, {x_max:.2}] | weight=[{y_min:.2}, {y_max:.2}]\n",
        sequence.model.display_name()
    );
    for row in grid {
        out.push_str(&row.into_iter().collect::<String>());
        out.push('\n');
    }
    out
}

struct Frame {
    x_min: f64,
    x_max: f64,
    y_min: f64,
    y_max: f64,
    width: usize,
    height: usize,
}

impl Frame {
    fn map_x(&self, x: f64) -> usize {
        let u = ((x - self.x_min) / (self.x_max - self.x_min)).clamp(0.0, 1.0);
        (u * (self.width as f64 - 1.0)).round() as usize
    }

    fn map_y(&self, y: f64) -> usize {
        let u = ((y - self.y_min) / (self.y_max - self.y_min)).clamp(0.0, 1.0);
        // y=top is max -> row 0
        (self.height as f64 - 1.0 - (u * (self.height as f64 - 1.0))).round() as usize
    }
}

/// `[min(0, values), max(1, values)]`, ignoring non-finite values.
fn widen_unit(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values
        .filter(|v| v.is_finite())
        .fold((0.0_f64, 1.0_f64), |(lo, hi), v| (lo.min(v), hi.max(v)))
}

fn sample(model: InterpolationModel, x_min: f64, x_max: f64, n: usize) -> Vec<(f64, f64)> {
    let n = n.max(2);
    (0..n)
        .map(|i| {
            let u = i as f64 / (n as f64 - 1.0);
            let x = x_min + u * (x_max - x_min);
            (x, evaluate(model, x))
        })
        .collect()
}

fn draw_polyline(grid: &mut [Vec<char>], frame: &Frame, points: &[(f64, f64)], ch: char) {
    let mut prev = None;
    for &(x, y) in points {
        let cell = (frame.map_x(x), frame.map_y(y));
        match prev {
            Some(from) => draw_line(grid, from, cell, ch),
            None => draw_line(grid, cell, cell, ch),
        }
        prev = Some(cell);
    }
}

/// Integer line drawing (Bresenham-ish). Only blank cells are written.
fn draw_line(grid: &mut [Vec<char>], from: (usize, usize), to: (usize, usize), ch: char) {
    let (mut x0, mut y0) = (from.0 as isize, from.1 as isize);
    let (x1, y1) = (to.0 as isize, to.1 as isize);

    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if y0 >= 0
            && (y0 as usize) < grid.len()
            && x0 >= 0
            && (x0 as usize) < grid[0].len()
            && grid[y0 as usize][x0 as usize] == ' '
        {
            grid[y0 as usize][x0 as usize] = ch;
        }

        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}
