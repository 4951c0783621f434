//! Paints a [`View`] onto a [`Surface`]: prompt at the bottom, list growing
//! upwards, optional preview box on the right half.

use ratatui::style::{Color, Modifier, Style};

use super::FinderOptions;
use super::scorer::eq_fold;
use super::state::{Layout, View, char_width};
use super::surface::Surface;

const PROMPT: Style = Style::new().fg(Color::Blue);
const QUERY: Style = Style::new().add_modifier(Modifier::BOLD);
const HEADER: Style = Style::new().fg(Color::Green);
const COUNTER: Style = Style::new().fg(Color::Yellow);
const CURSOR: Style = Style::new().fg(Color::Red).bg(Color::Black);
const MATCHED: Style = Style::new().fg(Color::Green);
const CURRENT: Style = Style::new()
    .fg(Color::Yellow)
    .bg(Color::Black)
    .add_modifier(Modifier::BOLD);
const CURRENT_MATCHED: Style = Style::new()
    .fg(Color::Cyan)
    .bg(Color::Black)
    .add_modifier(Modifier::BOLD);
const BORDER: Style = Style::new().fg(Color::DarkGray);

/// Columns left of every item row: cursor and selection markers.
const ITEM_INDENT: u16 = 2;

pub fn render<S: Surface>(surface: &mut S, view: &View, options: &FinderOptions) {
    let (width, height) = surface.size();
    surface.clear();
    if width == 0 || height == 0 {
        return;
    }
    let layout = Layout::new(
        width,
        height,
        options.preview.is_some(),
        options.header.is_some(),
    );

    let mut row = height - 1;
    draw_prompt(surface, view, &options.prompt, row, layout.list_width);

    if let Some(header) = options.header.as_deref() {
        let Some(above) = row.checked_sub(1) else {
            return;
        };
        row = above;
        let limit = usize::from(layout.list_width).saturating_sub(usize::from(ITEM_INDENT));
        put_str(surface, ITEM_INDENT, row, &truncate(header, limit), HEADER, layout.list_width);
    }

    let Some(counter_row) = row.checked_sub(1) else {
        return;
    };
    let counter = format!("{}/{}", view.matches.len(), view.items.len());
    put_str(surface, ITEM_INDENT, counter_row, &counter, COUNTER, layout.list_width);

    draw_items(surface, view, &layout, options.multi);

    if options.preview.is_some() {
        draw_preview(surface, view, options, &layout);
    }
}

fn draw_prompt<S: Surface>(surface: &mut S, view: &View, prompt: &str, row: u16, max_width: u16) {
    let mut x = put_str(surface, 0, row, prompt, PROMPT, max_width);
    let mut caret_x = x;
    for (position, &ch) in view.query.iter().enumerate() {
        if position == view.caret {
            caret_x = x;
        }
        let advance = char_width(ch) as u16;
        if x + advance <= max_width {
            surface.set_cell(x, row, ch, QUERY);
        }
        x = x.saturating_add(advance);
    }
    if view.caret >= view.query.len() {
        caret_x = x;
    }
    surface.show_cursor(caret_x.min(max_width.saturating_sub(1)), row);
}

fn draw_items<S: Surface>(surface: &mut S, view: &View, layout: &Layout, multi: bool) {
    let area = layout.item_area_height;
    if area == 0 || view.matches.is_empty() {
        return;
    }
    let bottom = area - 1;
    let start = view.y.saturating_sub(view.cursor_y);
    let max_width = layout.list_width;

    for (offset, entry) in view.matches.iter().skip(start).take(area).enumerate() {
        let row = (bottom - offset) as u16;
        let current = offset == view.cursor_y;
        if current {
            surface.set_cell(0, row, '>', CURSOR);
            surface.set_cell(1, row, ' ', CURSOR);
        }
        if multi
            && view
                .selections
                .as_ref()
                .is_some_and(|selections| selections.contains_key(&entry.index))
        {
            surface.set_cell(1, row, '>', CURSOR);
        }

        let Some(label) = view.items.get(entry.index) else {
            continue;
        };
        let mut pending = 0;
        let mut x = ITEM_INDENT;
        for (position, &ch) in label.iter().enumerate() {
            let highlighted = match &entry.highlight {
                Some(range) if range.contains(&position) && pending < view.query.len() => {
                    let hit = eq_fold(view.query[pending], ch);
                    if hit {
                        pending += 1;
                    }
                    hit
                }
                _ => false,
            };
            let style = match (current, highlighted) {
                (true, true) => CURRENT_MATCHED,
                (true, false) => CURRENT,
                (false, true) => MATCHED,
                (false, false) => Style::new(),
            };

            let advance = char_width(ch) as u16;
            if advance == 0 {
                continue;
            }
            if x + advance + 2 > max_width {
                put_ellipsis(surface, x, row, style, max_width);
                break;
            }
            surface.set_cell(x, row, ch, style);
            x += advance;
        }
    }
}

fn draw_preview<S: Surface>(surface: &mut S, view: &View, options: &FinderOptions, layout: &Layout) {
    let left = layout.list_width;
    let right = layout.width.saturating_sub(1);
    let bottom = layout.height.saturating_sub(1);
    if right <= left || bottom == 0 {
        return;
    }

    for x in left..=right {
        let (top, base) = if x == left {
            ('┌', '└')
        } else if x == right {
            ('┐', '┘')
        } else {
            ('─', '─')
        };
        surface.set_cell(x, 0, top, BORDER);
        surface.set_cell(x, bottom, base, BORDER);
    }
    for y in 1..bottom {
        surface.set_cell(left, y, '│', BORDER);
        surface.set_cell(right, y, '│', BORDER);
    }

    let Some(preview) = options.preview.as_ref() else {
        return;
    };
    let pane_width = layout.width - left;
    let index = view.highlighted().map(|entry| entry.index);
    let Some(text) = preview(index, pane_width, layout.height) else {
        return;
    };

    for (line_no, line) in text.lines().take(usize::from(bottom - 1)).enumerate() {
        let y = 1 + line_no as u16;
        let mut x = left + 2;
        for ch in line.chars() {
            let ch = if ch.is_control() { ' ' } else { ch };
            let advance = char_width(ch) as u16;
            if advance == 0 {
                continue;
            }
            if x + advance + 2 > right {
                put_ellipsis(surface, x, y, Style::new(), right);
                break;
            }
            surface.set_cell(x, y, ch, Style::new());
            x += advance;
        }
    }
}

fn put_str<S: Surface>(surface: &mut S, x: u16, y: u16, text: &str, style: Style, limit: u16) -> u16 {
    let mut x = x;
    for ch in text.chars() {
        let advance = char_width(ch) as u16;
        if x + advance > limit {
            break;
        }
        if advance > 0 {
            surface.set_cell(x, y, ch, style);
        }
        x += advance;
    }
    x
}

fn put_ellipsis<S: Surface>(surface: &mut S, x: u16, y: u16, style: Style, limit: u16) {
    for dot in [x, x + 1] {
        if dot < limit {
            surface.set_cell(dot, y, '.', style);
        }
    }
}

/// Cuts `text` to `limit` display cells, marking the cut with "..".
fn truncate(text: &str, limit: usize) -> String {
    let total = text.chars().map(char_width).sum::<usize>();
    if total <= limit {
        return text.to_string();
    }
    let mut out = String::new();
    let mut used = 0;
    for ch in text.chars() {
        let advance = char_width(ch);
        if used + advance + 2 > limit {
            break;
        }
        out.push(ch);
        used += advance;
    }
    if limit >= 2 {
        out.push_str("..");
    }
    out
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use ratatui::style::{Color, Modifier};

    use super::{render, truncate};
    use crate::finder::FinderOptions;
    use crate::finder::matcher::{Mode, find_all, identity};
    use crate::finder::state::View;
    use crate::finder::surface::MemorySurface;

    fn view(labels: &[&str], query: &str) -> View {
        let items = labels
            .iter()
            .map(|label| label.chars().collect::<Vec<_>>())
            .collect::<Vec<_>>();
        let query = query.chars().collect::<Vec<_>>();
        let matches = if query.is_empty() {
            identity(items.len())
        } else {
            find_all(&query, &items, Mode::Smart).expect("filter")
        };
        View {
            items: Arc::new(items),
            matches: Arc::new(matches),
            caret: query.len(),
            query,
            y: 0,
            cursor_y: 0,
            selections: None,
        }
    }

    fn cursor_rows(surface: &MemorySurface, height: u16) -> Vec<u16> {
        (0..height)
            .filter(|&y| surface.buffer()[(0, y)].symbol() == ">")
            .collect()
    }

    #[test]
    fn draws_prompt_counter_and_items_bottom_up() {
        let (mut surface, _events) = MemorySurface::new(20, 6);
        let view = view(&["alpha", "beta", "gamma"], "");
        render(&mut surface, &view, &FinderOptions::default());

        assert_eq!(surface.row_text(5), ">");
        assert_eq!(surface.row_text(4), "  3/3");
        assert_eq!(surface.row_text(3), "> alpha");
        assert_eq!(surface.row_text(2), "  beta");
        assert_eq!(surface.row_text(1), "  gamma");
        assert_eq!(surface.cursor(), Some((2, 5)));
        assert_eq!(surface.style_at(0, 5).fg, Some(Color::Blue));
        assert_eq!(surface.style_at(2, 4).fg, Some(Color::Yellow));
    }

    #[test]
    fn item_rows_never_exceed_area() {
        let labels = (0..30).map(|i| format!("ctx-{i}")).collect::<Vec<_>>();
        let refs = labels.iter().map(String::as_str).collect::<Vec<_>>();
        let (mut surface, _events) = MemorySurface::new(20, 8);
        let mut view = view(&refs, "");
        view.y = 10;
        view.cursor_y = 3;
        render(&mut surface, &view, &FinderOptions::default());

        // six item rows, the fourth from the bottom is current
        assert_eq!(cursor_rows(&surface, 8), vec![2, 7]);
        assert_eq!(surface.row_text(5), "  ctx-7");
        assert_eq!(surface.row_text(2), "> ctx-10");
        assert_eq!(surface.row_text(0), "  ctx-12");
        assert!(surface.style_at(2, 2).add_modifier.contains(Modifier::BOLD));
        assert_eq!(surface.style_at(2, 2).bg, Some(Color::Black));
    }

    #[test]
    fn highlights_matched_runes() {
        let (mut surface, _events) = MemorySurface::new(30, 5);
        let view = view(&["xx-prod", "other"], "pd");
        render(&mut surface, &view, &FinderOptions::default());

        assert_eq!(surface.row_text(2), "> xx-prod");
        let p = surface.style_at(5, 2);
        let r = surface.style_at(6, 2);
        let d = surface.style_at(8, 2);
        assert_eq!(p.fg, Some(Color::Cyan));
        assert_eq!(r.fg, Some(Color::Yellow));
        assert_eq!(d.fg, Some(Color::Cyan));
    }

    #[test]
    fn long_items_end_with_dots() {
        let (mut surface, _events) = MemorySurface::new(10, 4);
        let view = view(&["abcdefghijklmnop"], "");
        render(&mut surface, &view, &FinderOptions::default());
        assert_eq!(surface.row_text(1), "> abcdef..");
    }

    #[test]
    fn wide_runes_advance_two_cells() {
        let (mut surface, _events) = MemorySurface::new(20, 4);
        let view = view(&["東京-prod"], "");
        render(&mut surface, &view, &FinderOptions::default());
        assert_eq!(surface.buffer()[(2, 1)].symbol(), "東");
        assert_eq!(surface.buffer()[(4, 1)].symbol(), "京");
        assert_eq!(surface.buffer()[(6, 1)].symbol(), "-");
    }

    #[test]
    fn caret_column_counts_display_width() {
        let (mut surface, _events) = MemorySurface::new(20, 4);
        let mut view = view(&["x"], "東a");
        view.caret = 1;
        render(&mut surface, &view, &FinderOptions::default());
        assert_eq!(surface.cursor(), Some((4, 3)));
    }

    #[test]
    fn header_is_truncated_and_shifts_counter() {
        let (mut surface, _events) = MemorySurface::new(12, 6);
        let view = view(&["a"], "");
        let options = FinderOptions::default().with_header("contexts from everywhere");
        render(&mut surface, &view, &options);

        assert_eq!(surface.row_text(4), "  contexts..");
        assert_eq!(surface.style_at(2, 4).fg, Some(Color::Green));
        assert_eq!(surface.row_text(3), "  1/1");
        assert_eq!(surface.row_text(2), "> a");
    }

    #[test]
    fn marks_selected_rows_in_multi_select() {
        let (mut surface, _events) = MemorySurface::new(20, 6);
        let mut view = view(&["a", "b", "c"], "");
        view.selections = Some(HashMap::from([(1, 0)]));
        let mut options = FinderOptions::default();
        options.multi = true;
        render(&mut surface, &view, &options);

        assert_eq!(surface.row_text(3), "> a");
        assert_eq!(surface.row_text(2), " >b");
    }

    #[test]
    fn preview_pane_is_boxed_and_receives_current_index() {
        let (mut surface, _events) = MemorySurface::new(30, 6);
        let mut view = view(&["first", "second"], "");
        view.y = 1;
        view.cursor_y = 1;
        let options = FinderOptions::default().with_preview(|index, width, height| {
            Some(format!("idx={index:?} {width}x{height}\nline two is rather long"))
        });
        render(&mut surface, &view, &options);

        assert_eq!(surface.buffer()[(15, 0)].symbol(), "┌");
        assert_eq!(surface.buffer()[(29, 0)].symbol(), "┐");
        assert_eq!(surface.buffer()[(15, 5)].symbol(), "└");
        assert_eq!(surface.buffer()[(29, 3)].symbol(), "│");
        assert_eq!(surface.row_text(1), "               │ idx=Some(1..│");
        assert_eq!(surface.row_text(2), "> second       │ line two i..│");
        assert_eq!(surface.row_text(3), "  first        │             │");
    }

    #[test]
    fn preview_gets_none_without_matches() {
        let (mut surface, _events) = MemorySurface::new(30, 6);
        let view = view(&["first"], "zzz");
        let options = FinderOptions::default()
            .with_preview(|index, _, _| index.is_none().then(|| "nothing".to_string()));
        render(&mut surface, &view, &options);

        assert_eq!(cursor_rows(&surface, 6), vec![5]);
        assert!(surface.row_text(1).ends_with("│ nothing     │"));
    }

    #[test]
    fn truncate_respects_display_width() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("東京東京東京", 8), "東京東..");
    }
}
