use crate::error::{CertError, Result};
use crate::owner::Owner;
use crate::search::{self, SearchCriteria, SearchMode};
use crate::store::Stores;
use crossterm::{
    event::{self, Event, KeyCode},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};
use std::io;

const PAGE_SIZE: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    /// Typing a vehicle number
    Vehicle,
    /// Typing "FROM TO" dates
    DateRange,
}

pub struct App<'a> {
    stores: &'a Stores,
    pub owners: Vec<Owner>,
    pub state: TableState,
    pub show_detail: bool,
    pub input_mode: InputMode,
    pub input: String,
    pub criteria: SearchCriteria,
    pub error: Option<String>,
}

impl<'a> App<'a> {
    /// Starts on the merged view of both stores
    pub fn new(stores: &'a Stores) -> Result<Self> {
        let mut app = Self {
            stores,
            owners: Vec::new(),
            state: TableState::default(),
            show_detail: false,
            input_mode: InputMode::Normal,
            input: String::new(),
            criteria: SearchCriteria::default(),
            error: None,
        };
        app.apply_search(SearchCriteria::default())?;
        Ok(app)
    }

    pub fn toggle_detail(&mut self) {
        self.show_detail = !self.show_detail;
    }

    pub fn selected_owner(&self) -> Option<&Owner> {
        self.state.selected().and_then(|i| self.owners.get(i))
    }

    /// Run the search filter; malformed dates are shown, not fatal
    pub fn apply_search(&mut self, criteria: SearchCriteria) -> Result<()> {
        match search::filter(self.stores, &criteria) {
            Ok(owners) => {
                self.owners = owners;
                self.criteria = criteria;
                self.error = None;
            }
            Err(CertError::Parse(e)) => {
                self.error = Some(format!("Invalid date ({}), use YYYY-MM-DD", e));
                return Ok(());
            }
            Err(e) => return Err(e),
        }

        // Reset selection to first item
        if self.owners.is_empty() {
            self.state.select(None);
        } else {
            self.state.select(Some(0));
        }
        Ok(())
    }

    pub fn clear_search(&mut self) -> Result<()> {
        self.apply_search(SearchCriteria::default())
    }

    pub fn start_input(&mut self, mode: InputMode) {
        self.input_mode = mode;
        self.input.clear();
    }

    /// Turn the typed text into criteria and search
    pub fn submit_input(&mut self) -> Result<()> {
        let criteria = match self.input_mode {
            InputMode::Vehicle => SearchCriteria::vehicle(&self.input),
            InputMode::DateRange => {
                let mut parts = self.input.split_whitespace();
                match (parts.next(), parts.next()) {
                    (Some(from), Some(to)) => SearchCriteria::date_range(from, to),
                    _ => {
                        self.error = Some("Enter two dates: FROM TO".to_string());
                        self.input_mode = InputMode::Normal;
                        return Ok(());
                    }
                }
            }
            InputMode::Normal => return Ok(()),
        };

        self.input_mode = InputMode::Normal;
        self.apply_search(criteria)
    }

    pub fn next(&mut self) {
        let len = self.owners.len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(i) if i >= len - 1 => 0,
            Some(i) => i + 1,
            None => 0,
        };
        self.state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let len = self.owners.len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(0) => len - 1,
            Some(i) => i - 1,
            None => 0,
        };
        self.state.select(Some(i));
    }

    pub fn page_down(&mut self) {
        let len = self.owners.len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(i) => (i + PAGE_SIZE).min(len - 1),
            None => 0,
        };
        self.state.select(Some(i));
    }

    pub fn page_up(&mut self) {
        if self.owners.is_empty() {
            return;
        }
        let i = self.state.selected().map_or(0, |i| i.saturating_sub(PAGE_SIZE));
        self.state.select(Some(i));
    }

    fn criteria_label(&self) -> String {
        match self.criteria.mode() {
            SearchMode::Vehicle(v) => format!("Vehicle ~ {} (primary)", v),
            SearchMode::DateRange { from, to } => format!("{} → {} (primary)", from, to),
            SearchMode::All => "All records (merged)".to_string(),
        }
    }
}

pub fn run_ui(app: &mut App<'_>) -> anyhow::Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run the app
    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App<'_>,
) -> anyhow::Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        let Event::Key(key) = event::read()? else {
            continue;
        };

        if app.input_mode != InputMode::Normal {
            match key.code {
                KeyCode::Enter => app.submit_input()?,
                KeyCode::Esc => app.input_mode = InputMode::Normal,
                KeyCode::Backspace => {
                    app.input.pop();
                }
                KeyCode::Char(c) => app.input.push(c),
                _ => {}
            }
            continue;
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
            KeyCode::Enter => app.toggle_detail(),
            KeyCode::Char('/') => app.start_input(InputMode::Vehicle),
            KeyCode::Char('d') => app.start_input(InputMode::DateRange),
            KeyCode::Char('c') => app.clear_search()?,
            KeyCode::Down | KeyCode::Char('j') => app.next(),
            KeyCode::Up | KeyCode::Char('k') => app.previous(),
            KeyCode::PageDown => app.page_down(),
            KeyCode::PageUp => app.page_up(),
            KeyCode::Home => app.state.select(Some(0)),
            KeyCode::End => {
                if !app.owners.is_empty() {
                    app.state.select(Some(app.owners.len() - 1));
                }
            }
            _ => {}
        }
    }
}

fn ui(f: &mut Frame, app: &mut App<'_>) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(0),    // Records
            Constraint::Length(3), // Status bar / input
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    if app.show_detail {
        let content_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(chunks[1]);

        render_table(f, content_chunks[0], app);
        render_detail_panel(f, content_chunks[1], app);
    } else {
        render_table(f, chunks[1], app);
    }

    render_status_bar(f, chunks[2], app);
}

fn render_header(f: &mut Frame, area: Rect, app: &App<'_>) {
    let header = Paragraph::new(Line::from(vec![
        Span::styled(
            "Vehicle Certificates",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw("  |  "),
        Span::styled(app.criteria_label(), Style::default().fg(Color::Green)),
        Span::raw("  |  "),
        Span::styled(
            format!("Shown: {}", app.owners.len()),
            Style::default().fg(Color::White),
        ),
    ]))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)),
    );

    f.render_widget(header, area);
}

fn render_table(f: &mut Frame, area: Rect, app: &mut App<'_>) {
    let header_cells = ["No.", "Vehicle No.", "Owner", "Model", "Registered"]
        .iter()
        .map(|h| {
            Cell::from(*h).style(
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            )
        });

    let header = Row::new(header_cells)
        .style(Style::default().bg(Color::DarkGray))
        .height(1);

    let rows = app.owners.iter().map(|owner| {
        Row::new(vec![
            Cell::from(owner.id.to_string()),
            Cell::from(owner.vehicle_no.clone()).style(Style::default().fg(Color::Cyan)),
            Cell::from(truncate(&owner.owner_name, 28)),
            Cell::from(truncate(&owner.vehicle_model, 18)),
            Cell::from(owner.today_date.format("%d/%m/%Y").to_string()),
        ])
        .height(1)
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(6),
            Constraint::Length(16),
            Constraint::Length(30),
            Constraint::Length(20),
            Constraint::Length(12),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" Owners "),
    )
    .highlight_style(
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.state);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App<'_>) {
    let spans = match app.input_mode {
        InputMode::Vehicle => vec![
            Span::styled(" Vehicle no: ", Style::default().fg(Color::Yellow)),
            Span::raw(app.input.as_str()),
            Span::styled("█", Style::default().fg(Color::Yellow)),
        ],
        InputMode::DateRange => vec![
            Span::styled(" From To (YYYY-MM-DD YYYY-MM-DD): ", Style::default().fg(Color::Yellow)),
            Span::raw(app.input.as_str()),
            Span::styled("█", Style::default().fg(Color::Yellow)),
        ],
        InputMode::Normal => {
            let selected = app.state.selected().map(|i| i + 1).unwrap_or(0);
            let mut spans = vec![Span::styled(
                format!(" Row: {}/{} ", selected, app.owners.len()),
                Style::default().fg(Color::Cyan),
            )];

            if let Some(error) = &app.error {
                spans.push(Span::raw(" | "));
                spans.push(Span::styled(error.as_str(), Style::default().fg(Color::Red)));
            }

            for (key, label) in [("/", " Vehicle"), ("d", " Dates"), ("c", " Clear"), ("Enter", " Details")] {
                spans.push(Span::raw(" | "));
                spans.push(Span::styled(key, Style::default().fg(Color::Yellow)));
                spans.push(Span::raw(label));
            }
            spans.push(Span::raw(" | "));
            spans.push(Span::styled("q", Style::default().fg(Color::Red)));
            spans.push(Span::raw(" Quit"));
            spans
        }
    };

    let status_bar = Paragraph::new(Line::from(spans)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}

fn render_detail_panel(f: &mut Frame, area: Rect, app: &App<'_>) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" Owner Details ");

    let Some(owner) = app.selected_owner() else {
        f.render_widget(Paragraph::new("No record selected").block(block), area);
        return;
    };

    let label = Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD);
    let field = |name: &'static str, value: String| {
        vec![
            Line::from(vec![Span::styled(format!("  {}: ", name), label), Span::raw(value)]),
            Line::from(""),
        ]
    };

    let mut content = vec![Line::from("")];
    content.extend(field("Certificate No.", owner.id.to_string()));
    content.extend(field("Owner", owner.owner_name.clone()));
    content.extend(field("Father", owner.father_name.clone()));
    content.extend(field("Mobile", owner.mobile_no.clone()));
    content.extend(field("Vehicle No.", owner.vehicle_no.clone()));
    content.extend(field("Model", owner.vehicle_model.clone()));
    content.extend(field("Chassis", owner.chassis_no.clone()));
    content.extend(field("Engine", owner.engine_no.clone()));
    content.extend(field("Registered", owner.today_date.format("%d/%m/%Y").to_string()));
    content.push(Line::from("  ─────────────────────────────────────"));
    content.push(Line::from(""));
    content.push(Line::from(vec![
        Span::raw("  "),
        Span::styled(
            wrap_text(&owner.address, 35),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        ),
    ]));

    f.render_widget(Paragraph::new(content).block(block), area);
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

fn wrap_text(text: &str, width: usize) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut current_line = String::new();

    for word in text.split_whitespace() {
        if !current_line.is_empty() && current_line.len() + word.len() + 1 > width {
            lines.push(std::mem::take(&mut current_line));
        }
        if !current_line.is_empty() {
            current_line.push(' ');
        }
        current_line.push_str(word);
    }

    if !current_line.is_empty() {
        lines.push(current_line);
    }

    lines.join("\n  ")
}
