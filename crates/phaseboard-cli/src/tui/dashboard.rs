//! Dashboard view: per-phase issue table, detail pane and status bar.
//!
//! Key bindings: `/` search, `i` ISA filter, `t` track filter, `p` phase
//! filter, j/k navigate, Enter detail, `r` refresh, Esc clear, `q` quit.

use chrono::{DateTime, Local, Utc};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use phaseboard_core::debounce::QueryInput;
use phaseboard_core::filter::{FilterState, cycle_option};
use phaseboard_core::model::{Issue, IsaFilter, Phase, Track};
use phaseboard_core::refresh::{
    Clock, CycleOutcome, LoadStatus, Reconciler, SnapshotLoader, SystemClock,
};
use phaseboard_core::status::{
    StatusClass, StatusConfig, belongs_to_phase, is_approval, issue_progress,
};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols::border,
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState, Wrap},
};
use std::time::{Duration, Instant};

/// How long a transient status-bar message stays visible.
const STATUS_MSG_TTL: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputMode {
    #[default]
    Normal,
    Search,
}

/// Interactive dashboard state.
pub struct Dashboard<L, C = SystemClock> {
    reconciler: Reconciler<L, C>,
    status: StatusConfig,
    all_subtasks: bool,
    /// Active filters; `filter.query` mirrors the committed search text.
    filter: FilterState,
    query: QueryInput,
    /// Committed query before entering search mode (restored on Esc).
    search_prev: String,
    /// Retained issues in phase order.
    visible: Vec<Issue>,
    /// Index into `visible` where each phase group starts.
    phase_starts: Vec<usize>,
    match_count: usize,
    table_state: TableState,
    input_mode: InputMode,
    show_detail: bool,
    detail_scroll: u16,
    should_quit: bool,
    status_msg: Option<(String, Instant)>,
}

impl<L: SnapshotLoader, C: Clock> Dashboard<L, C> {
    pub fn new(
        reconciler: Reconciler<L, C>,
        status: StatusConfig,
        all_subtasks: bool,
        debounce: Duration,
    ) -> Self {
        let mut view = Self {
            reconciler,
            status,
            all_subtasks,
            filter: FilterState::default(),
            query: QueryInput::new(debounce),
            search_prev: String::new(),
            visible: Vec::new(),
            phase_starts: Vec::new(),
            match_count: 0,
            table_state: TableState::default(),
            input_mode: InputMode::default(),
            show_detail: false,
            detail_scroll: 0,
            should_quit: false,
            status_msg: None,
        };
        view.rebuild();
        view
    }

    /// Recompute the visible rows from the current snapshot and filters,
    /// keeping the selected issue selected when it survives.
    fn rebuild(&mut self) {
        let selected_key = self.selected_issue().map(|issue| issue.key.clone());
        self.visible.clear();
        self.phase_starts.clear();
        self.match_count = 0;

        if let Some(snapshot) = self.reconciler.snapshot() {
            let view = self.filter.apply(snapshot);
            self.match_count = view.match_count;
            for (_, issues) in view.non_empty_phases() {
                self.phase_starts.push(self.visible.len());
                self.visible.extend(issues.iter().cloned());
            }
        }

        let selected = selected_key
            .and_then(|key| self.visible.iter().position(|issue| issue.key == key))
            .or_else(|| (!self.visible.is_empty()).then_some(0))
            .map(|idx| idx.min(self.visible.len().saturating_sub(1)));
        self.table_state.select(selected);
    }

    fn set_status(&mut self, msg: impl Into<String>) {
        self.status_msg = Some((msg.into(), Instant::now()));
    }

    #[must_use]
    pub const fn should_quit(&self) -> bool {
        self.should_quit
    }

    #[must_use]
    pub const fn input_mode(&self) -> InputMode {
        self.input_mode
    }

    #[must_use]
    pub const fn filter(&self) -> &FilterState {
        &self.filter
    }

    #[must_use]
    pub const fn reconciler(&self) -> &Reconciler<L, C> {
        &self.reconciler
    }

    #[must_use]
    pub fn visible(&self) -> &[Issue] {
        &self.visible
    }

    #[must_use]
    pub fn selected_issue(&self) -> Option<&Issue> {
        self.table_state
            .selected()
            .and_then(|idx| self.visible.get(idx))
    }

    /// Periodic housekeeping: commit the debounced query and run the refresh
    /// cycle when due. Returns true when the view changed.
    pub fn tick(&mut self, now: Instant) -> bool {
        let mut dirty = false;
        if self.query.tick(now) {
            self.commit_query();
            dirty = true;
        }
        let had_notice = self.reconciler.notice().is_some();
        if let Some(outcome) = self.reconciler.poll() {
            self.after_cycle(&outcome);
            dirty = true;
        }
        dirty || had_notice != self.reconciler.notice().is_some()
    }

    fn commit_query(&mut self) {
        self.query.committed().clone_into(&mut self.filter.query);
        self.rebuild();
    }

    fn after_cycle(&mut self, outcome: &CycleOutcome) {
        match outcome {
            CycleOutcome::Refreshed { .. } => self.rebuild(),
            CycleOutcome::Stale(err) | CycleOutcome::Failed(err) => {
                tracing::debug!(error = %err, "refresh cycle failed");
            }
        }
    }

    fn refresh_now(&mut self) {
        match self.reconciler.run_cycle() {
            Ok(outcome) => {
                if matches!(outcome, CycleOutcome::Refreshed { changed: false, .. }) {
                    self.set_status("Refreshed; no changes");
                }
                self.after_cycle(&outcome);
            }
            Err(err) => self.set_status(err.to_string()),
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        match self.input_mode {
            InputMode::Search => self.handle_search_key(key),
            InputMode::Normal => self.handle_normal_key(key),
        }
    }

    fn handle_normal_key(&mut self, key: KeyEvent) {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('c') if ctrl => self.should_quit = true,

            KeyCode::Char('j') | KeyCode::Down => self.select_next(),
            KeyCode::Char('k') | KeyCode::Up => self.select_prev(),
            KeyCode::Char('g') | KeyCode::Home => self.select_first(),
            KeyCode::Char('G') | KeyCode::End => self.select_last(),
            KeyCode::PageDown => self.detail_scroll = self.detail_scroll.saturating_add(5),
            KeyCode::PageUp => self.detail_scroll = self.detail_scroll.saturating_sub(5),

            KeyCode::Enter => {
                self.show_detail = !self.show_detail && self.selected_issue().is_some();
                self.detail_scroll = 0;
            }

            KeyCode::Char('/') => {
                self.query.committed().clone_into(&mut self.search_prev);
                self.input_mode = InputMode::Search;
            }
            KeyCode::Char('i') => {
                self.filter.isa = cycle_option(self.filter.isa, &IsaFilter::ALL);
                self.rebuild();
            }
            KeyCode::Char('t') => {
                self.filter.track = cycle_option(self.filter.track, &Track::ALL);
                self.rebuild();
            }
            KeyCode::Char('p') => {
                self.filter.phase = cycle_option(self.filter.phase, &Phase::ALL);
                self.rebuild();
            }
            KeyCode::Char('r') => self.refresh_now(),

            KeyCode::Esc => {
                if self.filter.is_empty() && !self.query.is_pending() {
                    self.show_detail = false;
                } else {
                    self.query.clear();
                    self.filter = FilterState::default();
                    self.rebuild();
                    self.set_status("Filters cleared");
                }
            }
            _ => {}
        }
    }

    fn handle_search_key(&mut self, key: KeyEvent) {
        let now = Instant::now();
        match key.code {
            KeyCode::Esc => {
                let prev = std::mem::take(&mut self.search_prev);
                self.query.set(&prev, now);
                self.query.flush();
                self.commit_query();
                self.input_mode = InputMode::Normal;
            }
            KeyCode::Enter => {
                self.query.flush();
                self.commit_query();
                self.input_mode = InputMode::Normal;
            }
            KeyCode::Backspace => self.query.pop(now),
            KeyCode::Char(c) => self.query.push(c, now),
            _ => {}
        }
    }

    fn select_next(&mut self) {
        if self.visible.is_empty() {
            return;
        }
        let next = self
            .table_state
            .selected()
            .map_or(0, |idx| (idx + 1).min(self.visible.len() - 1));
        self.table_state.select(Some(next));
        self.detail_scroll = 0;
    }

    fn select_prev(&mut self) {
        if self.visible.is_empty() {
            return;
        }
        let prev = self
            .table_state
            .selected()
            .map_or(0, |idx| idx.saturating_sub(1));
        self.table_state.select(Some(prev));
        self.detail_scroll = 0;
    }

    fn select_first(&mut self) {
        if !self.visible.is_empty() {
            self.table_state.select(Some(0));
            self.detail_scroll = 0;
        }
    }

    fn select_last(&mut self) {
        if !self.visible.is_empty() {
            self.table_state.select(Some(self.visible.len() - 1));
            self.detail_scroll = 0;
        }
    }

    /// Table row for a visible index, accounting for phase header rows.
    fn table_row_from_visible_index(&self, idx: usize) -> usize {
        idx + self.phase_starts.iter().filter(|start| **start <= idx).count()
    }

    pub fn render(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        render_into(frame, self, area);
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn class_marker(class: StatusClass) -> (&'static str, Color) {
    match class {
        StatusClass::Done => ("✓", Color::Green),
        StatusClass::InProgress => ("◐", Color::Yellow),
        StatusClass::NotStarted => ("○", Color::DarkGray),
    }
}

fn format_local(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format("%H:%M:%S").to_string()
}

fn build_row(issue: &Issue, status: &StatusConfig, all_subtasks: bool) -> Row<'static> {
    let progress = issue_progress(issue, status, all_subtasks);
    let mut tags = Vec::new();
    let isa = issue.isa_value();
    if !isa.is_empty() {
        tags.push(isa);
    }
    if let Some(track) = issue.track() {
        tags.push(track.to_string());
    }
    let days = issue
        .days_in_phase
        .map_or_else(String::new, |d| format!("{d}d"));

    Row::new(vec![
        Cell::from(Span::styled(
            issue.key.clone(),
            Style::default().fg(Color::Cyan),
        )),
        Cell::from(issue.summary.clone()),
        Cell::from(Span::styled(
            tags.join(" · "),
            Style::default().fg(Color::DarkGray),
        )),
        Cell::from(format!(
            "{}/{}",
            progress.tasks.done, progress.tasks.total
        )),
        Cell::from(Span::styled(days, Style::default().fg(Color::DarkGray))),
    ])
}

fn phase_header_row(phase: Phase, count: usize) -> Row<'static> {
    let style = Style::default()
        .fg(Color::Magenta)
        .add_modifier(Modifier::BOLD);
    Row::new(vec![
        Cell::from(Span::styled("▸", style)),
        Cell::from(Span::styled(format!("{phase} ({count})"), style)),
    ])
}

fn detail_lines(issue: &Issue, status: &StatusConfig, all_subtasks: bool) -> Vec<Line<'static>> {
    let label = Style::default().fg(Color::DarkGray);
    let progress = issue_progress(issue, status, all_subtasks);
    let mut lines = vec![
        Line::from(Span::styled(
            format!("{}  {}", issue.key, issue.summary),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
    ];

    let mut kv = |key: &str, value: String| {
        lines.push(Line::from(vec![
            Span::styled(format!("{key:<14}"), label),
            Span::raw(value),
        ]));
    };
    kv(
        "Phase",
        issue.days_in_phase.map_or_else(
            || issue.phase.to_string(),
            |d| format!("{} ({d}d)", issue.phase),
        ),
    );
    let isa = issue.isa_value();
    kv("ISA", if isa.is_empty() { "-".into() } else { isa });
    kv(
        "Track",
        issue.track().map_or_else(|| "-".into(), |t| t.to_string()),
    );
    if let Some(github) = &issue.github {
        kv("GitHub", github.clone());
    }
    kv(
        "Tasks",
        format!(
            "{}/{} done, {} in progress ({}%)",
            progress.tasks.done,
            progress.tasks.total,
            progress.tasks.in_progress,
            progress.tasks.percent()
        ),
    );
    kv(
        "Approvals",
        format!("{}/{}", progress.approvals.done, progress.approvals.total),
    );
    if let Some(next) = progress.next_approval {
        kv("Next approval", next);
    }

    if !issue.subtasks.is_empty() {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled("Subtasks", label)));
        for subtask in &issue.subtasks {
            let (marker, color) = class_marker(status.classify(&subtask.status));
            let current = all_subtasks || belongs_to_phase(subtask, issue.phase);
            let text_style = if current {
                Style::default()
            } else {
                Style::default().fg(Color::DarkGray)
            };
            let approval = if is_approval(subtask) { " ⚑" } else { "" };
            lines.push(Line::from(vec![
                Span::styled(format!(" {marker} "), Style::default().fg(color)),
                Span::styled(format!("{:<12} ", subtask.key), text_style),
                Span::styled(format!("{}{approval}", subtask.summary), text_style),
            ]));
        }
    }

    let links: Vec<_> = issue.surfaced_links().collect();
    if !links.is_empty() {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled("Linked issues", label)));
        for link in links {
            lines.push(Line::from(format!(
                " {} {}  {}",
                link.relationship, link.key, link.summary
            )));
        }
    }
    lines
}

fn render_detail_panel<L: SnapshotLoader, C: Clock>(
    frame: &mut ratatui::Frame<'_>,
    app: &Dashboard<L, C>,
    area: Rect,
) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_set(border::ROUNDED)
        .border_style(Style::default().fg(Color::Green))
        .title(" Detail ")
        .title_style(
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        );
    let inner = block.inner(area);
    frame.render_widget(block, area);

    if let Some(issue) = app.selected_issue() {
        frame.render_widget(
            Paragraph::new(detail_lines(issue, &app.status, app.all_subtasks))
                .scroll((app.detail_scroll, 0))
                .wrap(Wrap { trim: false }),
            inner,
        );
    } else {
        frame.render_widget(
            Paragraph::new(Line::from(Span::styled(
                "No issue selected",
                Style::default().fg(Color::DarkGray),
            ))),
            inner,
        );
    }
}

/// Banner line for the update notice or a stale/failed load.
fn build_banner<L: SnapshotLoader, C: Clock>(app: &Dashboard<L, C>) -> Option<Line<'static>> {
    if let Some(notice) = app.reconciler.notice() {
        return Some(Line::from(Span::styled(
            format!(" ● {}", notice.message),
            Style::default().fg(Color::Black).bg(Color::Green),
        )));
    }
    match app.reconciler.status() {
        LoadStatus::Stale { message } => Some(Line::from(Span::styled(
            format!(" ⚠ {message}"),
            Style::default().fg(Color::Black).bg(Color::Yellow),
        ))),
        LoadStatus::Failed { message } => Some(Line::from(Span::styled(
            format!(" ✗ {message}"),
            Style::default().fg(Color::White).bg(Color::Red),
        ))),
        LoadStatus::Loading | LoadStatus::Ready => None,
    }
}

fn render_into<L: SnapshotLoader, C: Clock>(
    frame: &mut ratatui::Frame<'_>,
    app: &Dashboard<L, C>,
    area: Rect,
) {
    let banner = build_banner(app);
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(u16::from(banner.is_some())),
            Constraint::Min(3),
            Constraint::Length(1),
        ])
        .split(area);
    let (banner_area, content_area, status_area) = (chunks[0], chunks[1], chunks[2]);

    if let Some(line) = banner {
        frame.render_widget(Paragraph::new(line), banner_area);
    }

    let content_chunks = if app.show_detail {
        Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
            .split(content_area)
    } else {
        Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(100), Constraint::Percentage(0)])
            .split(content_area)
    };
    let table_area = content_chunks[0];
    let detail_area = content_chunks[1];

    let block_title = match app.input_mode {
        InputMode::Search => format!(" phaseboard — search: {}▏", app.query.raw()),
        InputMode::Normal => {
            let total = app.reconciler.snapshot().map_or(0, |s| s.issue_count());
            format!(
                " phaseboard — {} of {} issues ",
                app.visible.len(),
                total
            )
        }
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_set(border::ROUNDED)
        .border_style(if app.show_detail {
            Style::default().fg(Color::DarkGray)
        } else {
            Style::default().fg(Color::Green)
        })
        .title(block_title)
        .title_style(
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        );

    if app.visible.is_empty() {
        let (text, color) = match app.reconciler.status() {
            LoadStatus::Loading => ("Loading…", Color::DarkGray),
            LoadStatus::Failed { .. } => ("No data to display.", Color::Red),
            LoadStatus::Ready | LoadStatus::Stale { .. } => {
                ("No issues match the current filters.", Color::DarkGray)
            }
        };
        frame.render_widget(
            Paragraph::new(Line::from(Span::styled(text, Style::default().fg(color))))
                .alignment(Alignment::Center)
                .block(block),
            table_area,
        );
    } else {
        let mut rows: Vec<Row<'static>> = Vec::with_capacity(app.visible.len() + app.phase_starts.len());
        for (group, start) in app.phase_starts.iter().enumerate() {
            let end = app
                .phase_starts
                .get(group + 1)
                .copied()
                .unwrap_or(app.visible.len());
            let issues = &app.visible[*start..end];
            if let Some(first) = issues.first() {
                rows.push(phase_header_row(first.phase, issues.len()));
            }
            rows.extend(
                issues
                    .iter()
                    .map(|issue| build_row(issue, &app.status, app.all_subtasks)),
            );
        }

        let widths = [
            Constraint::Length(12),
            Constraint::Min(20),
            Constraint::Length(20),
            Constraint::Length(7),
            Constraint::Length(5),
        ];
        let table = Table::new(rows, widths)
            .block(block)
            .row_highlight_style(
                Style::default()
                    .bg(Color::DarkGray)
                    .add_modifier(Modifier::BOLD),
            )
            .highlight_symbol(" ");

        let selected_visible = app.table_state.selected();
        let mut render_state = app.table_state.clone();
        render_state.select(selected_visible.map(|idx| app.table_row_from_visible_index(idx)));
        frame.render_stateful_widget(table, table_area, &mut render_state);
    }

    if app.show_detail && detail_area.width > 0 {
        render_detail_panel(frame, app, detail_area);
    }

    let status_line = build_status_bar(app);
    frame.render_widget(
        Paragraph::new(status_line).alignment(Alignment::Left),
        status_area,
    );
}

/// Build the status bar line from the current filter and refresh state.
fn build_status_bar<L: SnapshotLoader, C: Clock>(app: &Dashboard<L, C>) -> Line<'static> {
    if let Some((ref msg, at)) = app.status_msg {
        if at.elapsed() < STATUS_MSG_TTL {
            return Line::from(vec![Span::styled(
                msg.clone(),
                Style::default().fg(Color::Cyan),
            )]);
        }
    }

    let key_style = Style::default().fg(Color::Cyan);
    let val_style = Style::default().fg(Color::White);
    let dim_style = Style::default().fg(Color::DarkGray);
    let mut spans: Vec<Span<'static>> = Vec::new();

    match app.input_mode {
        InputMode::Search => {
            spans.push(Span::styled("ESC", key_style));
            spans.push(Span::styled(" cancel  ", dim_style));
            spans.push(Span::styled("ENTER", key_style));
            spans.push(Span::styled(" apply", dim_style));
            if app.query.is_pending() {
                spans.push(Span::styled("  …", dim_style));
            }
        }
        InputMode::Normal => {
            let isa = app.filter.isa.map_or("all", IsaFilter::as_str);
            let track = app.filter.track.map_or("all", Track::as_str);
            let phase = app.filter.phase.map_or("all", Phase::as_str);
            for (key, label, value) in [
                ("i", " isa:", isa),
                ("t", " track:", track),
                ("p", " phase:", phase),
            ] {
                spans.push(Span::styled(key, key_style));
                spans.push(Span::styled(label, dim_style));
                spans.push(Span::styled(format!("{value}  "), val_style));
            }
            if !app.filter.query.is_empty() {
                spans.push(Span::styled("/", key_style));
                spans.push(Span::styled(format!("{}  ", app.filter.query), val_style));
            }
            for (key, label) in [
                ("j/k", " move  "),
                ("⏎", " detail  "),
                ("r", " refresh  "),
                ("esc", " clear  "),
                ("q", " quit"),
            ] {
                spans.push(Span::styled(key, key_style));
                spans.push(Span::styled(label, dim_style));
            }
        }
    }

    spans.push(Span::styled(format!("  │ {} matches", app.match_count), dim_style));
    if let Some(at) = app.reconciler.refreshed_at() {
        spans.push(Span::styled(
            format!(" · refreshed {}", format_local(at)),
            dim_style,
        ));
    }
    Line::from(spans)
}
