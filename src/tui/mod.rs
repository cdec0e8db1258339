//! Ratatui-based terminal UI.
//!
//! The TUI lists the checkpoints of a folder for model A and model B, offers a
//! settings panel for the alpha progression, previews the interpolation curve,
//! and runs merge batches with a live progress log.
//!
//! Merging runs on the UI thread; the log is redrawn after every progress
//! event, and keys are not read until the batch ends.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use chrono::Local;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph},
};

use crate::app::pipeline::{BatchRequest, ProgressEvent, run_batch};
use crate::cli::TuiArgs;
use crate::domain::{AlphaParams, AlphaSequence, BatchConfig, Precision};
use crate::error::AppError;
use crate::io::checkpoint::{ensure_batch_dir, list_checkpoints};
use crate::io::manifest::{format_alpha, manifest, write_manifest};
use crate::io::settings::Settings;
use crate::models::evaluate;
use crate::sequence::{batch_end, demo_grid, round2, sequence_from};

mod plotters_chart;

use plotters_chart::AlphaCurveChart;

/// Manifest file written by `c`, inside the batch output directory.
pub const MANIFEST_FILE: &str = "xy_manifest.txt";

const SETTINGS_FIELDS: usize = 5;
const MAX_LOG_LINES: usize = 500;
const MAX_STEPS: usize = 100;

/// Start the TUI.
pub fn run(args: TuiArgs, settings: Settings) -> Result<(), AppError> {
    let _guard = TerminalGuard::new()?;

    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal = Terminal::new(backend)
        .map_err(|e| AppError::new(4, format!("Failed to initialize terminal: {e}")))?;

    let mut app = App::new(&args, settings, Some(Settings::path_from_env()));
    app.event_loop(&mut terminal)
}

/// Ensures the terminal is restored (raw mode, alternate screen) on exit.
struct TerminalGuard;

impl TerminalGuard {
    fn new() -> Result<Self, AppError> {
        enable_raw_mode().map_err(|e| AppError::new(4, format!("Failed to enable raw mode: {e}")))?;
        if let Err(e) = execute!(io::stdout(), EnterAlternateScreen) {
            let _ = disable_raw_mode();
            return Err(AppError::new(4, format!("Failed to enter alternate screen: {e}")));
        }
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Focus {
    ModelA,
    ModelB,
    Settings,
}

impl Focus {
    fn next(self) -> Self {
        match self {
            Focus::ModelA => Focus::ModelB,
            Focus::ModelB => Focus::Settings,
            Focus::Settings => Focus::ModelA,
        }
    }

    fn prev(self) -> Self {
        match self {
            Focus::ModelA => Focus::Settings,
            Focus::ModelB => Focus::ModelA,
            Focus::Settings => Focus::ModelB,
        }
    }
}

/// What the event loop should do after a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    None,
    Quit,
    Merge,
}

struct App {
    folder: PathBuf,
    folder_input: String,
    editing_folder: bool,
    files: Vec<String>,
    focus: Focus,
    cursor_a: usize,
    cursor_b: usize,
    model_a: Option<String>,
    model_b: Option<String>,
    alpha: AlphaParams,
    precision: Precision,
    marker: String,
    selected_field: usize,
    settings: Settings,
    /// Where settings are saved; `None` disables saving.
    settings_path: Option<PathBuf>,
    log: Vec<String>,
    status: String,
}

impl App {
    fn new(args: &TuiArgs, settings: Settings, settings_path: Option<PathBuf>) -> Self {
        let mut app = Self {
            folder: crate::app::resolve_folder(args.folder.clone(), &settings),
            folder_input: String::new(),
            editing_folder: false,
            files: Vec::new(),
            focus: Focus::ModelA,
            cursor_a: 0,
            cursor_b: 0,
            model_a: None,
            model_b: None,
            alpha: args.alpha.resolve(settings.alpha),
            precision: args.precision.unwrap_or(settings.precision),
            marker: args.marker.clone().unwrap_or_else(|| settings.marker.clone()),
            selected_field: 0,
            settings,
            settings_path,
            log: Vec::new(),
            status: String::new(),
        };
        app.reload_files();
        app
    }

    fn event_loop<B: ratatui::backend::Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<(), AppError> {
        let mut needs_redraw = true;
        loop {
            if needs_redraw {
                terminal
                    .draw(|f| self.draw(f))
                    .map_err(|e| AppError::new(4, format!("Terminal draw error: {e}")))?;
                needs_redraw = false;
            }

            if !event::poll(Duration::from_millis(100))
                .map_err(|e| AppError::new(4, format!("Event poll error: {e}")))?
            {
                continue;
            }

            match event::read().map_err(|e| AppError::new(4, format!("Event read error: {e}")))? {
                Event::Key(key) => {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    match self.handle_key(key.code) {
                        Action::Quit => break,
                        Action::Merge => self.run_merge(&mut |app: &App| {
                            // A failed redraw only delays the log; the batch keeps going.
                            let _ = terminal.draw(|f| app.draw(f));
                        }),
                        Action::None => {}
                    }
                    needs_redraw = true;
                }
                Event::Resize(_, _) => {
                    needs_redraw = true;
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn handle_key(&mut self, code: KeyCode) -> Action {
        if self.editing_folder {
            self.handle_folder_edit(code);
            return Action::None;
        }

        match code {
            KeyCode::Char('q') => return Action::Quit,
            KeyCode::Char('m') => return Action::Merge,
            KeyCode::Char('c') => self.write_manifest_file(),
            KeyCode::Char('f') => {
                self.editing_folder = true;
                self.folder_input = self.folder.display().to_string();
                self.status = "Editing folder. Enter to apply, Esc to cancel.".to_string();
            }
            KeyCode::Tab => self.focus = self.focus.next(),
            KeyCode::BackTab => self.focus = self.focus.prev(),
            KeyCode::Up => self.move_cursor(-1),
            KeyCode::Down => self.move_cursor(1),
            KeyCode::Left => self.adjust_field(-1),
            KeyCode::Right => self.adjust_field(1),
            KeyCode::Enter => self.select_model(),
            _ => {}
        }
        Action::None
    }

    fn handle_folder_edit(&mut self, code: KeyCode) {
        match code {
            KeyCode::Esc => {
                self.editing_folder = false;
                self.status = "Folder edit canceled.".to_string();
            }
            KeyCode::Enter => {
                self.editing_folder = false;
                self.apply_folder_input();
            }
            KeyCode::Backspace => {
                self.folder_input.pop();
            }
            KeyCode::Char(c) => self.folder_input.push(c),
            _ => {}
        }
    }

    fn apply_folder_input(&mut self) {
        let candidate = PathBuf::from(self.folder_input.trim());
        if !candidate.is_dir() {
            self.status = format!("Not a folder: {}", candidate.display());
            return;
        }
        self.folder = candidate;
        self.model_a = None;
        self.model_b = None;
        self.cursor_a = 0;
        self.cursor_b = 0;
        self.reload_files();
        self.settings.folder = Some(self.folder.clone());
        self.save_settings();
    }

    fn reload_files(&mut self) {
        match list_checkpoints(&self.folder) {
            Ok(files) => {
                self.status = format!("{} checkpoint(s) in {}", files.len(), self.folder.display());
                self.files = files;
            }
            Err(err) => {
                self.files.clear();
                self.status = AppError::from(err).to_string();
            }
        }
        let last = self.files.len().saturating_sub(1);
        self.cursor_a = self.cursor_a.min(last);
        self.cursor_b = self.cursor_b.min(last);
    }

    fn move_cursor(&mut self, delta: isize) {
        let last = self.files.len().saturating_sub(1);
        let step = |cur: usize, max: usize| cur.saturating_add_signed(delta).min(max);
        match self.focus {
            Focus::ModelA => self.cursor_a = step(self.cursor_a, last),
            Focus::ModelB => self.cursor_b = step(self.cursor_b, last),
            Focus::Settings => self.selected_field = step(self.selected_field, SETTINGS_FIELDS - 1),
        }
    }

    fn select_model(&mut self) {
        let (cursor, slot, label) = match self.focus {
            Focus::ModelA => (self.cursor_a, &mut self.model_a, "A"),
            Focus::ModelB => (self.cursor_b, &mut self.model_b, "B"),
            Focus::Settings => return,
        };
        let Some(name) = self.files.get(cursor) else {
            self.status = "No checkpoint to select.".to_string();
            return;
        };
        *slot = Some(name.clone());
        self.status = format!("Model {label}: {name}");
    }

    fn adjust_field(&mut self, delta: i32) {
        if self.focus != Focus::Settings {
            return;
        }
        let nudge = 0.01 * f64::from(delta);
        match self.selected_field {
            0 => self.alpha.start = round2(self.alpha.start + nudge).clamp(0.0, 1.0),
            1 => self.alpha.step = round2(self.alpha.step + nudge).clamp(0.01, 1.0),
            2 => {
                self.alpha.count = self
                    .alpha
                    .count
                    .saturating_add_signed(delta as isize)
                    .clamp(1, MAX_STEPS)
            }
            3 => {
                self.alpha.model = if delta >= 0 {
                    self.alpha.model.next()
                } else {
                    self.alpha.model.prev()
                }
            }
            4 => self.precision = self.precision.toggle(),
            _ => {}
        }
    }

    /// Request for the current selection, or `None` (with a status) when
    /// something is missing.
    fn batch_request(&mut self) -> Option<BatchRequest> {
        let (Some(model_a), Some(model_b)) = (self.model_a.clone(), self.model_b.clone()) else {
            self.status = "Select model A and model B first (Enter on a list).".to_string();
            return None;
        };
        let config = BatchConfig {
            folder: self.folder.clone(),
            model_a,
            model_b,
            alpha: self.alpha,
            precision: self.precision,
            marker: self.marker.clone(),
            plot: false,
            plot_width: 0,
            plot_height: 0,
        };
        match BatchRequest::from_config(&config) {
            Ok(request) => Some(request),
            Err(err) => {
                self.status = err.to_string();
                None
            }
        }
    }

    /// Run a batch, calling `redraw` after every progress line.
    fn run_merge(&mut self, redraw: &mut dyn FnMut(&App)) {
        let Some(request) = self.batch_request() else {
            return;
        };
        self.status = format!("Merging {} step(s)...", request.alphas.len());
        redraw(self);

        let result = run_batch(&request, &mut |event: &ProgressEvent| {
            self.push_log(event.to_string());
            redraw(self);
        });

        match result {
            Ok(written) => {
                self.status = format!("Wrote {} checkpoint(s).", written.len());
                self.settings.folder = Some(self.folder.clone());
                self.settings.alpha = self.alpha;
                self.settings.precision = self.precision;
                self.settings.marker = self.marker.clone();
                self.save_settings();
            }
            Err(err) => {
                let err = AppError::from(err);
                self.push_log(format!("ERROR: {err}"));
                self.status = "Merge failed, see log.".to_string();
            }
        }
    }

    fn write_manifest_file(&mut self) {
        let (Some(model_a), Some(model_b)) = (&self.model_a, &self.model_b) else {
            self.status = "Select model A and model B first (Enter on a list).".to_string();
            return;
        };
        let alphas = match sequence_from(&self.alpha) {
            Ok(alphas) => alphas,
            Err(err) => {
                self.status = err.to_string();
                return;
            }
        };
        let text = manifest(model_a, model_b, &alphas.raw(), alphas.model);

        let written = ensure_batch_dir(&self.folder)
            .map_err(AppError::from)
            .map(|dir| dir.join(MANIFEST_FILE))
            .and_then(|path| write_manifest(&path, &text).map(|()| path));
        match written {
            Ok(path) => {
                self.push_log(text);
                self.status = format!("Manifest written to {}", path.display());
            }
            Err(err) => self.status = err.to_string(),
        }
    }

    fn save_settings(&mut self) {
        let Some(path) = &self.settings_path else {
            return;
        };
        if let Err(err) = self.settings.save_to(path) {
            self.push_log(format!("Could not save settings: {err}"));
        }
    }

    fn push_log(&mut self, message: impl AsRef<str>) {
        let stamp = Local::now().format("%H:%M:%S");
        self.log.push(format!("[{stamp}] {}", message.as_ref()));
        if self.log.len() > MAX_LOG_LINES {
            let excess = self.log.len() - MAX_LOG_LINES;
            self.log.drain(..excess);
        }
    }

    fn draw(&self, frame: &mut ratatui::Frame<'_>) {
        let size = frame.area();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(4), Constraint::Min(0), Constraint::Length(3)])
            .split(size);

        self.draw_header(frame, chunks[0]);
        self.draw_body(frame, chunks[1]);
        self.draw_footer(frame, chunks[2]);
    }

    fn draw_header(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let folder = if self.editing_folder {
            format!("{}_", self.folder_input)
        } else {
            self.folder.display().to_string()
        };
        let lines = vec![
            Line::from(vec![
                Span::styled("bcm", Style::default().fg(Color::Cyan)),
                Span::raw(" | batch checkpoint merger"),
            ]),
            Line::from(Span::styled(
                format!(
                    "folder: {folder} | A: {} | B: {}",
                    self.model_a.as_deref().unwrap_or("-"),
                    self.model_b.as_deref().unwrap_or("-"),
                ),
                Style::default().fg(if self.editing_folder { Color::Yellow } else { Color::Gray }),
            )),
        ];

        let p = Paragraph::new(Text::from(lines)).block(Block::default().borders(Borders::ALL));
        frame.render_widget(p, area);
    }

    fn draw_body(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
            .split(area);

        let left = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Percentage(50),
                Constraint::Percentage(50),
                Constraint::Length(SETTINGS_FIELDS as u16 + 3),
            ])
            .split(columns[0]);
        self.draw_models(frame, left[0], Focus::ModelA);
        self.draw_models(frame, left[1], Focus::ModelB);
        self.draw_settings(frame, left[2]);

        let right = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(0), Constraint::Length(10)])
            .split(columns[1]);
        self.draw_chart(frame, right[0]);
        self.draw_log(frame, right[1]);
    }

    fn draw_models(&self, frame: &mut ratatui::Frame<'_>, area: Rect, which: Focus) {
        let (title, cursor, chosen) = match which {
            Focus::ModelA => ("Model A", self.cursor_a, self.model_a.as_deref()),
            _ => ("Model B", self.cursor_b, self.model_b.as_deref()),
        };
        let focused = self.focus == which;

        let items: Vec<ListItem> = self
            .files
            .iter()
            .map(|name| {
                let mark = if Some(name.as_str()) == chosen { "* " } else { "  " };
                ListItem::new(format!("{mark}{name}"))
            })
            .collect();

        let list = List::new(items)
            .block(focus_block(title, focused))
            .highlight_style(Style::default().fg(Color::Black).bg(Color::White))
            .highlight_symbol("» ");

        let mut state = ListState::default();
        if focused && !self.files.is_empty() {
            state.select(Some(cursor));
        }
        frame.render_stateful_widget(list, area, &mut state);
    }

    fn draw_settings(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let end = batch_end(self.alpha.start, self.alpha.step, self.alpha.count);
        let items = vec![
            ListItem::new(format!("Start: {}", format_alpha(self.alpha.start))),
            ListItem::new(format!("Step: {}", format_alpha(self.alpha.step))),
            ListItem::new(format!("Steps: {} (ends at {})", self.alpha.count, format_alpha(end))),
            ListItem::new(format!("Interpolation: {}", self.alpha.model.display_name())),
            ListItem::new(format!("Precision: {}", self.precision.display_name())),
        ];

        let focused = self.focus == Focus::Settings;
        let list = List::new(items)
            .block(focus_block("Settings", focused))
            .highlight_style(Style::default().fg(Color::Black).bg(Color::White))
            .highlight_symbol("» ");

        let mut state = ListState::default();
        if focused {
            state.select(Some(self.selected_field));
        }
        frame.render_stateful_widget(list, area, &mut state);

        let hint = Paragraph::new(format!("marker: {}", self.marker))
            .style(Style::default().fg(Color::Gray).add_modifier(Modifier::ITALIC));
        let rect = Rect {
            x: area.x + 2,
            y: area.y + area.height.saturating_sub(2),
            width: area.width.saturating_sub(4),
            height: 1,
        };
        frame.render_widget(hint, rect);
    }

    fn draw_chart(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let block = Block::default()
            .title(format!("Curve: {}", self.alpha.model.display_name()))
            .borders(Borders::ALL);
        let inner = block.inner(area);
        frame.render_widget(block, area);
        frame.render_widget(Clear, inner);

        let alphas = match sequence_from(&self.alpha) {
            Ok(alphas) => alphas,
            Err(err) => {
                let msg = Paragraph::new(err.to_string()).style(Style::default().fg(Color::Yellow));
                frame.render_widget(msg, inner);
                return;
            }
        };
        let series = chart_series(&alphas);

        let (chart_rect, insets) = chart_layout(inner);
        let widget = AlphaCurveChart {
            curve: &series.curve,
            identity: &series.identity,
            steps: &series.steps,
            x_bounds: series.x_bounds,
            y_bounds: series.y_bounds,
            x_label: "alpha",
            y_label: "weight",
            fmt_x: fmt_axis,
            fmt_y: fmt_axis,
        };

        frame.render_widget(widget, chart_rect);
        if let Some(insets) = insets {
            draw_axis_ticks(frame, inner, chart_rect, insets, series.x_bounds, series.y_bounds);
        }
    }

    fn draw_log(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let block = Block::default().title("Log").borders(Borders::ALL);
        let visible = block.inner(area).height as usize;
        let start = self.log.len().saturating_sub(visible);
        let lines: Vec<Line> = self.log[start..].iter().map(|l| Line::from(l.as_str())).collect();
        frame.render_widget(Paragraph::new(Text::from(lines)).block(block), area);
    }

    fn draw_footer(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let help = "Tab focus  ↑/↓ move  ←/→ adjust  Enter select  f folder  m merge  c manifest  q quit";
        let line = Line::from(vec![
            Span::styled(help, Style::default().fg(Color::Gray)),
            Span::raw(" | "),
            Span::styled(&self.status, Style::default().fg(Color::Yellow)),
        ]);
        let p = Paragraph::new(line).block(Block::default().borders(Borders::ALL));
        frame.render_widget(p, area);
    }
}

fn focus_block(title: &str, focused: bool) -> Block<'_> {
    let style = if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    };
    Block::default().title(title).borders(Borders::ALL).border_style(style)
}

/// Series and bounds for the curve chart.
#[derive(Debug, Clone, PartialEq)]
struct ChartSeries {
    curve: Vec<(f64, f64)>,
    identity: Vec<(f64, f64)>,
    steps: Vec<(f64, f64)>,
    x_bounds: [f64; 2],
    y_bounds: [f64; 2],
}

fn chart_series(alphas: &AlphaSequence) -> ChartSeries {
    let (mut x0, mut x1) = (0.0_f64, 1.0_f64);
    for step in alphas.iter() {
        x0 = x0.min(step.raw);
        x1 = x1.max(step.raw);
    }

    let curve: Vec<(f64, f64)> = demo_grid()
        .into_iter()
        .map(|u| {
            let x = x0 + u * (x1 - x0);
            (x, evaluate(alphas.model, x))
        })
        .collect();
    let identity = vec![(x0, x0), (x1, x1)];
    let steps: Vec<(f64, f64)> = alphas.iter().map(|s| (s.raw, s.effective)).collect();

    let (mut y0, mut y1) = (x0, x1);
    for &(_, y) in curve.iter().chain(&steps) {
        y0 = y0.min(y);
        y1 = y1.max(y);
    }
    let pad = ((y1 - y0).abs() * 0.05).max(1e-12);

    ChartSeries {
        curve,
        identity,
        steps,
        x_bounds: [x0, x1],
        y_bounds: [y0 - pad, y1 + pad],
    }
}

fn fmt_axis(v: f64) -> String {
    format!("{v:.2}")
}

#[derive(Debug, Clone, Copy)]
struct AxisInsets {
    left: u16,
    right: u16,
    top: u16,
    bottom: u16,
}

fn chart_layout(inner: Rect) -> (Rect, Option<AxisInsets>) {
    let insets = AxisInsets {
        left: 7,
        right: 2,
        top: 1,
        bottom: 2,
    };

    if inner.width <= insets.left + insets.right + 10
        || inner.height <= insets.top + insets.bottom + 5
    {
        return (inner, None);
    }

    let rect = Rect {
        x: inner.x + insets.left,
        y: inner.y + insets.top,
        width: inner.width - insets.left - insets.right,
        height: inner.height - insets.top - insets.bottom,
    };

    (rect, Some(insets))
}

fn draw_axis_ticks(
    frame: &mut ratatui::Frame<'_>,
    inner: Rect,
    chart: Rect,
    insets: AxisInsets,
    x_bounds: [f64; 2],
    y_bounds: [f64; 2],
) {
    let ticks = 5usize;
    let style = Style::default().fg(Color::Gray);

    for i in 0..ticks {
        let u = i as f64 / (ticks as f64 - 1.0);
        let x_val = x_bounds[0] + u * (x_bounds[1] - x_bounds[0]);
        let x = chart.x + ((chart.width - 1) as f64 * u).round() as u16;
        let label = fmt_axis(x_val);
        let label_len = label.len() as u16;
        let start = x.saturating_sub(label_len / 2);
        let y = chart.y + chart.height;
        if y >= inner.y + inner.height - 1 {
            continue;
        }
        frame.render_widget(
            Paragraph::new(label).style(style),
            Rect {
                x: start,
                y,
                width: label_len,
                height: 1,
            },
        );
    }

    for i in 0..ticks {
        let u = i as f64 / (ticks as f64 - 1.0);
        let y_val = y_bounds[0] + u * (y_bounds[1] - y_bounds[0]);
        let y = chart.y + (chart.height - 1) - ((chart.height - 1) as f64 * u).round() as u16;
        let label = fmt_axis(y_val);
        let label_len = label.len() as u16;
        let x = inner.x + insets.left.saturating_sub(1);
        let start = x.saturating_sub(label_len);
        if start < inner.x {
            continue;
        }
        frame.render_widget(
            Paragraph::new(label).style(style),
            Rect {
                x: start,
                y,
                width: label_len,
                height: 1,
            },
        );
    }

    let x_label = Paragraph::new("alpha")
        .alignment(Alignment::Center)
        .style(Style::default().fg(Color::Gray));
    let x_rect = Rect {
        x: chart.x,
        y: chart.y + chart.height + 1,
        width: chart.width,
        height: 1,
    };
    if x_rect.y < inner.y + inner.height {
        frame.render_widget(x_label, x_rect);
    }

    let y_label = Paragraph::new("weight")
        .style(Style::default().fg(Color::Gray).add_modifier(Modifier::BOLD));
    let y_rect = Rect {
        x: inner.x,
        y: inner.y,
        width: insets.left.saturating_sub(1),
        height: 1,
    };
    frame.render_widget(y_label, y_rect);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{SyntheticConfig, write_pair};
    use crate::domain::InterpolationModel;
    use crate::io::checkpoint::batch_dir;

    fn demo_app() -> (tempfile::TempDir, App) {
        let dir = tempfile::tempdir().unwrap();
        let config = SyntheticConfig {
            layers: 1,
            width: 4,
            ..SyntheticConfig::default()
        };
        write_pair(dir.path(), &config).unwrap();
        let args = TuiArgs {
            folder: Some(dir.path().to_path_buf()),
            ..TuiArgs::default()
        };
        let app = App::new(&args, Settings::default(), None);
        (dir, app)
    }

    fn press(app: &mut App, keys: &[KeyCode]) {
        for &key in keys {
            assert_eq!(app.handle_key(key), Action::None, "{key:?}");
        }
    }

    fn select_both(app: &mut App) {
        press(app, &[KeyCode::Enter, KeyCode::Tab, KeyCode::Down, KeyCode::Enter]);
    }

    #[test]
    fn lists_folder_and_selects_models() {
        let (_dir, mut app) = demo_app();
        assert_eq!(app.files, vec!["demo_a.ckpt", "demo_b.ckpt"]);

        select_both(&mut app);
        assert_eq!(app.model_a.as_deref(), Some("demo_a.ckpt"));
        assert_eq!(app.model_b.as_deref(), Some("demo_b.ckpt"));
        assert_eq!(app.status, "Model B: demo_b.ckpt");

        // Cursor stops at the last entry.
        press(&mut app, &[KeyCode::Down, KeyCode::Down]);
        assert_eq!(app.cursor_b, 1);
    }

    #[test]
    fn settings_fields_adjust_and_clamp() {
        let (_dir, mut app) = demo_app();
        press(&mut app, &[KeyCode::BackTab]);
        assert_eq!(app.focus, Focus::Settings);

        press(&mut app, &[KeyCode::Right]);
        assert_eq!(app.alpha.start, 0.06);
        press(&mut app, &[KeyCode::Down, KeyCode::Left, KeyCode::Left, KeyCode::Left, KeyCode::Left, KeyCode::Left]);
        assert_eq!(app.alpha.step, 0.01);
        press(&mut app, &[KeyCode::Down, KeyCode::Right]);
        assert_eq!(app.alpha.count, 9);
        press(&mut app, &[KeyCode::Down, KeyCode::Right]);
        assert_eq!(app.alpha.model, InterpolationModel::SmootherStep);
        press(&mut app, &[KeyCode::Down, KeyCode::Right]);
        assert_eq!(app.precision, Precision::Full);
        press(&mut app, &[KeyCode::Down]);
        assert_eq!(app.selected_field, SETTINGS_FIELDS - 1);
    }

    #[test]
    fn merge_needs_both_models() {
        let (_dir, mut app) = demo_app();
        assert_eq!(app.handle_key(KeyCode::Char('m')), Action::Merge);
        app.run_merge(&mut |_| {});
        assert!(app.status.starts_with("Select model A"));
        assert!(app.log.is_empty());
    }

    #[test]
    fn merge_writes_batch_and_logs_progress() {
        let (dir, mut app) = demo_app();
        select_both(&mut app);
        app.alpha.count = 2;

        let mut redraws = 0;
        app.run_merge(&mut |_| redraws += 1);

        assert_eq!(app.status, "Wrote 2 checkpoint(s).");
        // status redraw + start + 2 * 9 + complete
        assert_eq!(redraws, 1 + 1 + 18 + 1);
        assert!(app.log.last().unwrap().contains("Merge Batch Complete"));
        assert!(app.log.iter().any(|l| l.contains("(2/2) Converting to FP16... Done!")));
        for name in ["demo_a_demo_b_0.05_SmoothStep.ckpt", "demo_a_demo_b_0.1_SmoothStep.ckpt"] {
            assert!(batch_dir(dir.path()).join(name).is_file(), "{name}");
        }
    }

    #[test]
    fn manifest_key_writes_file() {
        let (dir, mut app) = demo_app();
        select_both(&mut app);
        app.alpha.count = 1;
        press(&mut app, &[KeyCode::Char('c')]);

        let written = std::fs::read_to_string(batch_dir(dir.path()).join(MANIFEST_FILE)).unwrap();
        assert_eq!(
            written,
            "demo_a.ckpt, demo_a_demo_b_0.05_SmoothStep.ckpt, demo_b.ckpt\n"
        );
        assert!(app.status.starts_with("Manifest written to"));
    }

    #[test]
    fn folder_edit_switches_and_rejects_bad_paths() {
        let (_dir, mut app) = demo_app();
        let other = tempfile::tempdir().unwrap();
        std::fs::write(other.path().join("x.safetensors"), b"").unwrap();

        press(&mut app, &[KeyCode::Char('f')]);
        assert!(app.editing_folder);
        // Keys are text while editing.
        app.folder_input.clear();
        for c in other.path().display().to_string().chars() {
            press(&mut app, &[KeyCode::Char(c)]);
        }
        press(&mut app, &[KeyCode::Enter]);
        assert!(!app.editing_folder);
        assert_eq!(app.folder, other.path());
        assert_eq!(app.files, vec!["x.safetensors"]);

        press(&mut app, &[KeyCode::Char('f'), KeyCode::Char('/'), KeyCode::Char('x'), KeyCode::Enter]);
        assert!(app.status.starts_with("Not a folder"));
        assert_eq!(app.folder, other.path());
    }

    #[test]
    fn chart_series_spans_unit_square() {
        let alphas = sequence_from(&AlphaParams::default()).unwrap();
        let series = chart_series(&alphas);
        assert_eq!(series.x_bounds, [0.0, 1.0]);
        assert!(series.y_bounds[0] < 0.0 && series.y_bounds[1] > 1.0);
        assert_eq!(series.curve.first(), Some(&(0.0, 0.0)));
        assert_eq!(series.curve.last(), Some(&(1.0, 1.0)));
        assert_eq!(series.curve.len(), 101);
        assert_eq!(series.steps.len(), 8);
        assert_eq!(series.steps[0].0, 0.05);
    }
}
