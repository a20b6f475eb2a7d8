// ABOUTME: Terminal User Interface rendering and layout management
// ABOUTME: Draws the simple and advanced views, tier-colored charts, and the per-adapter table

use crossterm::{
    event::{KeyCode, KeyEvent},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Cell, Chart, Clear, Dataset, GraphType, Paragraph, Row, Table},
    Frame, Terminal,
};
use std::io;

use crate::config::ViewMode;
use crate::engine::{format_rate, EngineView};
use crate::quality::{QualityTier, TierSeries};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiAction {
    None,
    Quit,
    Reload,
}

#[derive(Debug, Clone, Default)]
pub struct TuiState {
    pub mode: ViewMode,
    pub show_help: bool,
    pub status: Option<String>,
}

impl TuiState {
    pub fn new(mode: ViewMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> UiAction {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return UiAction::Quit,
            KeyCode::Char('h') | KeyCode::F(1) => {
                self.show_help = !self.show_help;
            }
            KeyCode::Char('m') => {
                self.mode = self.mode.toggled();
            }
            KeyCode::Char('r') => return UiAction::Reload,
            _ => {}
        }
        UiAction::None
    }
}

pub struct TuiApp {
    terminal: Terminal<CrosstermBackend<io::Stdout>>,
    state: TuiState,
}

impl TuiApp {
    pub fn new(mode: ViewMode) -> anyhow::Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;

        Ok(Self {
            terminal,
            state: TuiState::new(mode),
        })
    }

    pub fn set_status(&mut self, status: String) {
        self.state.status = Some(status);
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> UiAction {
        self.state.handle_key(key)
    }

    pub fn draw(&mut self, view: &EngineView) -> anyhow::Result<()> {
        let state = &self.state;
        self.terminal.draw(|f| render(f, view, state))?;
        Ok(())
    }
}

impl Drop for TuiApp {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(self.terminal.backend_mut(), LeaveAlternateScreen);
        let _ = self.terminal.show_cursor();
    }
}

pub fn tier_color(tier: QualityTier) -> Color {
    match tier {
        QualityTier::Good => Color::Green,
        QualityTier::Acceptable => Color::Yellow,
        QualityTier::Poor => Color::Red,
    }
}

pub fn render(f: &mut Frame, view: &EngineView, state: &TuiState) {
    let area = f.area();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(1)])
        .split(area);

    match state.mode {
        ViewMode::Simple => render_simple(f, chunks[0], view),
        ViewMode::Advanced => render_advanced(f, chunks[0], view),
    }
    render_footer(f, chunks[1], state);

    if state.show_help {
        render_help(f, area);
    }
}

fn render_simple(f: &mut Frame, area: Rect, view: &EngineView) {
    let big = Style::default().add_modifier(Modifier::BOLD);
    let lines = vec![
        Line::from(Span::styled(
            format!("Connected — {}", view.simple_adapter),
            Style::default().fg(Color::Gray),
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled(
                format!("{} {}", view.rate_tier.symbol(), format_rate(view.smoothed.total_mbps)),
                big.fg(tier_color(view.rate_tier)),
            ),
            Span::raw("  /  "),
            Span::styled(
                format!("{} {}", view.latency_tier.symbol(), view.latency_label()),
                big.fg(tier_color(view.latency_tier)),
            ),
        ]),
        Line::from(""),
        Line::from(format!(
            "↓ {}   ↑ {}",
            format_rate(view.smoothed.down_mbps),
            format_rate(view.smoothed.up_mbps)
        )),
        Line::from(format!(
            "↑ {:.2} MB   ↓ {:.2} MB",
            view.total_sent_mib, view.total_received_mib
        )),
        Line::from(Span::styled(
            format!("now {}", format_rate(view.simple_latest.total_mbps)),
            Style::default().fg(Color::DarkGray),
        )),
    ];

    let paragraph = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(" netpulse "))
        .alignment(Alignment::Center);
    f.render_widget(paragraph, area);
}

fn render_advanced(f: &mut Frame, area: Rect, view: &EngineView) {
    let table_height = view.rows.len() as u16 + 3;
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(6),
            Constraint::Min(6),
            Constraint::Min(6),
            Constraint::Length(table_height),
        ])
        .split(area);

    let info = vec![
        Line::from(format!(
            "Active: {}   |   Simple: {}   |   Graph: {}   |   Target: {}",
            view.active_adapter, view.simple_adapter, view.graph_adapter, view.ping_host
        )),
        Line::from(format!(
            "Graph Total: {:.2} Mbps   |   Ping: {}",
            view.graph_latest.total_mbps,
            view.latency_label()
        )),
        Line::from(format!(
            "Requests: {} (ok {} / fail {})   |   Sent {:.2} MB   Recv {:.2} MB",
            view.probes.sent,
            view.probes.ok,
            view.probes.fail,
            view.total_sent_mib,
            view.total_received_mib
        )),
        Line::from(format!("Adapters: {}", view.adapters.join(", "))),
    ];
    f.render_widget(
        Paragraph::new(info).block(Block::default().borders(Borders::ALL)),
        chunks[0],
    );

    let rate_title = format!(
        "Throughput (Mbps)  good ≥ {}  ok ≥ {}",
        view.rate_thresholds.good, view.rate_thresholds.ok
    );
    let ping_title = format!(
        "Ping (ms)  good ≤ {}  ok ≤ {}",
        view.ping_thresholds.good, view.ping_thresholds.ok
    );
    render_tier_chart(f, chunks[1], &rate_title, &view.rate_series);
    render_tier_chart(f, chunks[2], &ping_title, &view.latency_series);
    render_adapter_table(f, chunks[3], view);
}

/// Plot each finite run of each tier as its own line so gaps stay gaps.
fn render_tier_chart(f: &mut Frame, area: Rect, title: &str, series: &TierSeries) {
    let block = Block::default().borders(Borders::ALL).title(format!(" {title} "));
    if series.is_empty() {
        f.render_widget(Paragraph::new("collecting samples…").block(block), area);
        return;
    }

    let tiers = [QualityTier::Good, QualityTier::Acceptable, QualityTier::Poor];
    let runs: Vec<(QualityTier, Vec<Vec<(f64, f64)>>)> =
        tiers.iter().map(|t| (*t, series.segments(*t))).collect();

    let datasets: Vec<Dataset> = runs
        .iter()
        .flat_map(|(tier, segments)| {
            segments.iter().map(move |points| {
                Dataset::default()
                    .marker(symbols::Marker::Braille)
                    .graph_type(GraphType::Line)
                    .style(Style::default().fg(tier_color(*tier)))
                    .data(points)
            })
        })
        .collect();

    let x_min = series.xs.first().copied().unwrap_or(0.0);
    let x_max = series.xs.last().copied().unwrap_or(1.0).max(x_min + 1.0);
    let y_max = tiers
        .iter()
        .flat_map(|t| series.series(*t).iter())
        .copied()
        .filter(|v| v.is_finite())
        .fold(0.0_f64, f64::max);
    let y_max = if y_max > 0.0 { y_max * 1.1 } else { 1.0 };

    let chart = Chart::new(datasets)
        .block(block)
        .x_axis(
            Axis::default()
                .title(format!("last {} samples", series.len()))
                .bounds([x_min, x_max]),
        )
        .y_axis(
            Axis::default()
                .bounds([0.0, y_max])
                .labels([Span::raw("0"), Span::raw(format!("{y_max:.1}"))]),
        );
    f.render_widget(chart, area);
}

fn render_adapter_table(f: &mut Frame, area: Rect, view: &EngineView) {
    let header = Row::new(["Adapter", "Total", "Down", "Up", "Sent/Recv MB"])
        .style(Style::default().add_modifier(Modifier::BOLD));
    let rows = view.rows.iter().map(|r| {
        Row::new(vec![
            Cell::from(r.name.clone()),
            Cell::from(format!("{:.2}", r.rates.total_mbps)),
            Cell::from(format!("{:.2}", r.rates.down_mbps)),
            Cell::from(format!("{:.2}", r.rates.up_mbps)),
            Cell::from(format!("{:.2}/{:.2}", r.sent_mib, r.received_mib)),
        ])
    });

    let table = Table::new(
        rows,
        [
            Constraint::Percentage(30),
            Constraint::Percentage(15),
            Constraint::Percentage(15),
            Constraint::Percentage(15),
            Constraint::Percentage(25),
        ],
    )
    .header(header)
    .block(Block::default().borders(Borders::ALL).title(" Adapters "));
    f.render_widget(table, area);
}

fn render_footer(f: &mut Frame, area: Rect, state: &TuiState) {
    let mut text = String::from("q quit · m mode · r reload · h help");
    if let Some(status) = &state.status {
        text.push_str("   ");
        text.push_str(status);
    }
    f.render_widget(
        Paragraph::new(text).style(Style::default().fg(Color::DarkGray)),
        area,
    );
}

fn render_help(f: &mut Frame, area: Rect) {
    let help_text = [
        "netpulse Help",
        "",
        "CONTROLS:",
        "  m           - Toggle simple/advanced view",
        "  r           - Reload configuration file",
        "  q / Esc     - Quit application",
        "  h / F1      - Toggle this help",
        "",
        "COLORS:",
        "  green       - Good (fast link, low ping)",
        "  yellow      - Acceptable",
        "  red         - Poor, or no ping result",
    ];

    let popup = centered(area, 50, 14);
    f.render_widget(Clear, popup);
    f.render_widget(
        Paragraph::new(help_text.join("\n"))
            .block(Block::default().borders(Borders::ALL).title(" Help "))
            .alignment(Alignment::Left),
        popup,
    );
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::engine::Engine;
    use chrono::Utc;
    use crossterm::event::KeyModifiers;
    use ratatui::backend::TestBackend;
    use std::sync::Arc;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn buffer_text(terminal: &Terminal<TestBackend>) -> String {
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|c| c.symbol())
            .collect()
    }

    #[test]
    fn test_key_handling() {
        let mut state = TuiState::new(ViewMode::Simple);
        assert_eq!(state.handle_key(key(KeyCode::Char('m'))), UiAction::None);
        assert_eq!(state.mode, ViewMode::Advanced);
        assert_eq!(state.handle_key(key(KeyCode::Char('h'))), UiAction::None);
        assert!(state.show_help);
        assert_eq!(state.handle_key(key(KeyCode::Char('r'))), UiAction::Reload);
        assert_eq!(state.handle_key(key(KeyCode::Char('q'))), UiAction::Quit);
    }

    #[test]
    fn test_render_both_modes() {
        let view = Engine::new(Arc::new(Config::default()), Utc::now()).view();
        let mut terminal = Terminal::new(TestBackend::new(100, 40)).unwrap();

        let state = TuiState::new(ViewMode::Simple);
        terminal.draw(|f| render(f, &view, &state)).unwrap();
        assert!(buffer_text(&terminal).contains("netpulse"));

        let mut state = TuiState::new(ViewMode::Advanced);
        state.show_help = true;
        terminal.draw(|f| render(f, &view, &state)).unwrap();
        let text = buffer_text(&terminal);
        assert!(text.contains("Requests: 0"));
        assert!(text.contains("Help"));
    }

    #[test]
    fn test_centered_fits_small_area() {
        let area = Rect::new(0, 0, 20, 5);
        let popup = centered(area, 50, 14);
        assert_eq!(popup, Rect::new(0, 0, 20, 5));
    }
}
