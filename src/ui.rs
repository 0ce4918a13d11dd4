use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{BarChart, Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};
use sales_ledger::{Record, Summary};
use std::io;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Sales,
    Items,
    Chart,
}

impl Page {
    pub fn next(&self) -> Self {
        match self {
            Page::Sales => Page::Items,
            Page::Items => Page::Chart,
            Page::Chart => Page::Sales,
        }
    }

    pub fn previous(&self) -> Self {
        match self {
            Page::Sales => Page::Chart,
            Page::Items => Page::Sales,
            Page::Chart => Page::Items,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Page::Sales => "Sales",
            Page::Items => "By Item",
            Page::Chart => "Chart",
        }
    }
}

pub struct App {
    pub records: Vec<Record>,
    pub summary: Summary,
    pub state: TableState,
    pub items_state: TableState,
    pub current_page: Page,
    pub show_detail: bool,
    pub grammar_hint: String,
}

impl App {
    pub fn new(records: Vec<Record>, grammar_hint: &str) -> Self {
        let mut state = TableState::default();
        if !records.is_empty() {
            // newest sale is the most interesting one
            state.select(Some(records.len() - 1));
        }

        let summary = Summary::of(&records);
        let mut items_state = TableState::default();
        if !summary.by_item.is_empty() {
            items_state.select(Some(0));
        }

        Self {
            records,
            summary,
            state,
            items_state,
            current_page: Page::Sales,
            show_detail: false,
            grammar_hint: grammar_hint.to_string(),
        }
    }

    pub fn toggle_detail(&mut self) {
        self.show_detail = !self.show_detail;
    }

    pub fn selected_record(&self) -> Option<&Record> {
        self.state.selected().and_then(|i| self.records.get(i))
    }

    pub fn next_page(&mut self) {
        self.current_page = self.current_page.next();
    }

    pub fn previous_page(&mut self) {
        self.current_page = self.current_page.previous();
    }

    fn active(&mut self) -> (&mut TableState, usize) {
        match self.current_page {
            Page::Items => (&mut self.items_state, self.summary.by_item.len()),
            _ => (&mut self.state, self.records.len()),
        }
    }

    pub fn next(&mut self) {
        let (state, len) = self.active();
        if len == 0 {
            return;
        }
        let i = match state.selected() {
            Some(i) if i + 1 < len => i + 1,
            _ => 0,
        };
        state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let (state, len) = self.active();
        if len == 0 {
            return;
        }
        let i = match state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        state.select(Some(i));
    }

    pub fn page_down(&mut self) {
        let (state, len) = self.active();
        if len == 0 {
            return;
        }
        let i = state.selected().map_or(0, |i| (i + 20).min(len - 1));
        state.select(Some(i));
    }

    pub fn page_up(&mut self) {
        let (state, len) = self.active();
        if len == 0 {
            return;
        }
        let i = state.selected().map_or(0, |i| i.saturating_sub(20));
        state.select(Some(i));
    }

    pub fn first(&mut self) {
        let (state, len) = self.active();
        if len > 0 {
            state.select(Some(0));
        }
    }

    pub fn last(&mut self) {
        let (state, len) = self.active();
        if len > 0 {
            state.select(Some(len - 1));
        }
    }
}

pub fn run_ui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res?;
    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                KeyCode::Enter => app.toggle_detail(),
                KeyCode::Tab => {
                    if key.modifiers.contains(KeyModifiers::SHIFT) {
                        app.previous_page();
                    } else {
                        app.next_page();
                    }
                }
                KeyCode::BackTab => app.previous_page(),
                KeyCode::Down | KeyCode::Char('j') => app.next(),
                KeyCode::Up | KeyCode::Char('k') => app.previous(),
                KeyCode::PageDown => app.page_down(),
                KeyCode::PageUp => app.page_up(),
                KeyCode::Home => app.first(),
                KeyCode::End => app.last(),
                _ => {}
            }
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header with navigation
            Constraint::Min(0),    // Content area
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    if app.show_detail && app.current_page == Page::Sales {
        let content_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(chunks[1]);

        render_sales(f, content_chunks[0], app);
        render_detail_panel(f, content_chunks[1], app);
    } else {
        match app.current_page {
            Page::Sales => render_sales(f, chunks[1], app),
            Page::Items => render_items(f, chunks[1], app),
            Page::Chart => render_chart(f, chunks[1], app),
        }
    }

    render_status_bar(f, chunks[2], app);
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let pages = [Page::Sales, Page::Items, Page::Chart];

    let mut tab_spans = vec![];
    for (i, page) in pages.iter().enumerate() {
        if i > 0 {
            tab_spans.push(Span::raw(" │ "));
        }

        let style = if *page == app.current_page {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(Color::DarkGray)
        };

        tab_spans.push(Span::styled(page.title().to_string(), style));
    }

    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(
        format!("Sales: {}", app.summary.count),
        Style::default().fg(Color::White),
    ));
    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(
        format!("Total: {}", format_total(app.summary.grand_total)),
        Style::default().fg(Color::Green),
    ));

    let header = Paragraph::new(vec![Line::from(tab_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)),
    );

    f.render_widget(header, area);
}

fn header_row(titles: &[&'static str]) -> Row<'static> {
    let cells = titles.iter().map(|h| {
        Cell::from(*h).style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )
    });

    Row::new(cells)
        .style(Style::default().bg(Color::DarkGray))
        .height(1)
}

fn render_sales(f: &mut Frame, area: Rect, app: &mut App) {
    let rows = app.records.iter().map(|r| {
        let cells = vec![
            Cell::from(r.timestamp.format("%Y-%m-%d %H:%M").to_string()),
            Cell::from(truncate(&r.item, 30)),
            Cell::from(r.qty.map(|q| q.to_string()).unwrap_or_default()),
            Cell::from(r.price.to_string()),
            Cell::from(r.total_label()).style(Style::default().fg(Color::Green)),
            Cell::from(r.source.name().to_string()),
        ];
        Row::new(cells).height(1)
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(17),
            Constraint::Length(32),
            Constraint::Length(6),
            Constraint::Length(12),
            Constraint::Length(16),
            Constraint::Length(10),
        ],
    )
    .header(header_row(&["Time", "Item", "Qty", "Price", "Total", "Source"]))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" Sales "),
    )
    .highlight_style(
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.state);
}

fn render_items(f: &mut Frame, area: Rect, app: &mut App) {
    let rows = app.summary.by_item.iter().map(|t| {
        let avg = t.total / t.count as f64;
        Row::new(vec![
            Cell::from(truncate(&t.item, 30)),
            Cell::from(t.count.to_string()),
            Cell::from(format_total(t.total)).style(Style::default().fg(Color::Green)),
            Cell::from(format_total(avg)),
        ])
        .height(1)
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(32),
            Constraint::Length(10),
            Constraint::Length(18),
            Constraint::Length(18),
        ],
    )
    .header(header_row(&["Item", "Sales", "Total", "Avg"]))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" Summary by Item "),
    )
    .highlight_style(
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.items_state);
}

fn render_chart(f: &mut Frame, area: Rect, app: &App) {
    let labels: Vec<(String, u64)> = app
        .summary
        .by_item
        .iter()
        .map(|t| (truncate(&t.item, 10), t.total.round() as u64))
        .collect();
    let data: Vec<(&str, u64)> = labels.iter().map(|(l, v)| (l.as_str(), *v)).collect();

    let chart = BarChart::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Total per Item "),
        )
        .data(data.as_slice())
        .bar_width(10)
        .bar_gap(2)
        .bar_style(Style::default().fg(Color::Cyan))
        .value_style(Style::default().fg(Color::Black).bg(Color::Cyan));

    f.render_widget(chart, area);
}

fn render_detail_panel(f: &mut Frame, area: Rect, app: &App) {
    let label = Style::default().fg(Color::Yellow);

    let content = match app.selected_record() {
        Some(r) => vec![
            Line::from(vec![Span::styled("Item:     ", label), Span::raw(r.item.clone())]),
            Line::from(vec![
                Span::styled("Qty:      ", label),
                Span::raw(r.qty.map(|q| q.to_string()).unwrap_or_else(|| "-".to_string())),
            ]),
            Line::from(vec![Span::styled("Price:    ", label), Span::raw(r.price.to_string())]),
            Line::from(vec![Span::styled("Total:    ", label), Span::raw(r.total_label())]),
            Line::from(""),
            Line::from(vec![Span::styled("Source:   ", label), Span::raw(r.source.name().to_string())]),
            Line::from(vec![Span::styled("Time:     ", label), Span::raw(r.timestamp.to_rfc3339())]),
            Line::from(vec![Span::styled("ID:       ", label), Span::raw(r.id.to_string())]),
        ],
        None => vec![Line::from("No sale selected")],
    };

    let panel = Paragraph::new(content).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
            .title(" Sale Detail "),
    );

    f.render_widget(panel, area);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let (selected, total) = match app.current_page {
        Page::Items => (app.items_state.selected(), app.summary.by_item.len()),
        _ => (app.state.selected(), app.records.len()),
    };
    let selected = selected.map(|i| i + 1).unwrap_or(0);

    let key = Style::default().fg(Color::Yellow);
    let status_spans = vec![
        Span::styled(format!(" Row: {}/{} ", selected, total), Style::default().fg(Color::Cyan)),
        Span::raw(" | Format: "),
        Span::styled(app.grammar_hint.clone(), Style::default().fg(Color::Green)),
        Span::raw(" | "),
        Span::styled("Enter", key),
        Span::raw(" Details | "),
        Span::styled("Tab", key),
        Span::raw(" Page | "),
        Span::styled("↑/↓", key),
        Span::raw(" Nav | "),
        Span::styled("q", Style::default().fg(Color::Red)),
        Span::raw(" Quit"),
    ];

    let status_bar = Paragraph::new(vec![Line::from(status_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

fn format_total(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{:.2}", value)
    }
}
