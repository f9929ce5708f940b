use lexipen::host::{Rect as PageRect, Viewport};
use lexipen::indicator::Anchor;
use ratatui::layout::Rect;

/// Logical page units per terminal column and row.
pub const UNITS_PER_COL: i32 = 10;
pub const UNITS_PER_ROW: i32 = 20;

/// Viewport that exactly fills `area` at the fixed scale.
pub fn viewport_for(area: Rect) -> Viewport {
    Viewport {
        width: i32::from(area.width) * UNITS_PER_COL,
        height: i32::from(area.height) * UNITS_PER_ROW,
    }
}

/// Maps a page rectangle into `area`, clipped. `None` when nothing of it is
/// on screen. Anything on the page gets at least one cell.
pub fn to_cells(rect: PageRect, area: Rect) -> Option<Rect> {
    let x = rect.x / UNITS_PER_COL;
    let y = rect.y / UNITS_PER_ROW;
    let w = (rect.width / UNITS_PER_COL).max(1);
    let h = (rect.height / UNITS_PER_ROW).max(1);
    clip(x, y, w, h, area)
}

/// Cell rectangle for an indicator label of `width` columns: its top edge
/// at `anchor.top`, its right edge `anchor.right` units from the viewport's
/// right edge.
pub fn indicator_cells(anchor: Anchor, width: u16, viewport: Viewport, area: Rect) -> Option<Rect> {
    let right = (viewport.width - anchor.right) / UNITS_PER_COL;
    let width = i32::from(width);
    let top = anchor.top.max(0) / UNITS_PER_ROW;
    clip(right - width, top, width, 1, area)
}

fn clip(x: i32, y: i32, w: i32, h: i32, area: Rect) -> Option<Rect> {
    let area_w = i32::from(area.width);
    let area_h = i32::from(area.height);
    let x0 = x.clamp(0, area_w);
    let y0 = y.clamp(0, area_h);
    let x1 = (x + w).clamp(0, area_w);
    let y1 = (y + h).clamp(0, area_h);
    if x1 <= x0 || y1 <= y0 {
        return None;
    }
    Some(Rect {
        x: area.x + x0 as u16,
        y: area.y + y0 as u16,
        width: (x1 - x0) as u16,
        height: (y1 - y0) as u16,
    })
}

pub fn contains(area: Rect, column: u16, row: u16) -> bool {
    column >= area.x && column < area.right() && row >= area.y && row < area.bottom()
}

/// First `max` characters of `text` on one line, with an ellipsis when cut.
pub fn excerpt(text: &str, max: usize) -> String {
    let flat = text.replace('\n', " ");
    if flat.chars().count() <= max {
        return flat;
    }
    let mut out: String = flat.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}
