mod charts;
mod help;

use crate::viewer::Rendered;
use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::Color,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Terminal,
};
use std::{io, time::Duration};

struct UiState {
    title: String,
    show_table: bool,
    show_help: bool,
}

/// Whether `rendered` has anything worth drawing beyond plain text.
pub fn is_interactive(rendered: &Rendered) -> bool {
    matches!(rendered, Rendered::Fsc(_) | Rendered::Histogram { .. })
}

/// Show a chart viewer until the user quits. Blocks the calling thread.
pub fn show(title: String, rendered: &Rendered) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).ok();

    let backend = CrosstermBackend::new(stdout);
    let res = match Terminal::new(backend).context("create terminal") {
        Ok(mut terminal) => {
            terminal.clear().ok();
            event_loop(&mut terminal, title, rendered)
        }
        Err(e) => Err(e),
    };

    disable_raw_mode().ok();
    let mut stdout = io::stdout();
    execute!(stdout, LeaveAlternateScreen).ok();
    res
}

fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    title: String,
    rendered: &Rendered,
) -> Result<()> {
    let mut state = UiState {
        title,
        show_table: false,
        show_help: false,
    };
    loop {
        terminal
            .draw(|f| draw(f.area(), f, &state, rendered))
            .context("draw frame")?;

        if !event::poll(Duration::from_millis(250)).unwrap_or(false) {
            continue;
        }
        if let Ok(Event::Key(k)) = event::read() {
            if k.kind != KeyEventKind::Press {
                continue;
            }
            match (k.modifiers, k.code) {
                (_, KeyCode::Char('q'))
                | (_, KeyCode::Esc)
                | (KeyModifiers::CONTROL, KeyCode::Char('c')) => return Ok(()),
                (_, KeyCode::Char('t')) => state.show_table = !state.show_table,
                (_, KeyCode::Char('?')) => state.show_help = !state.show_help,
                _ => {}
            }
        }
    }
}

fn draw(area: Rect, f: &mut ratatui::Frame, state: &UiState, rendered: &Rendered) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0), Constraint::Length(1)].as_ref())
        .split(area);

    let header = Paragraph::new(Line::from(Span::styled(
        state.title.as_str(),
        Style::default().fg(Color::Cyan),
    )))
    .block(Block::default().borders(Borders::ALL).title("spoc-cli"));
    f.render_widget(header, chunks[0]);

    if state.show_table {
        let lines: Vec<Line> = rendered.lines().into_iter().map(Line::from).collect();
        f.render_widget(
            Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Table")),
            chunks[1],
        );
    } else {
        match rendered {
            Rendered::Fsc(view) => charts::draw_fsc(chunks[1], f, view),
            Rendered::Histogram { hist, metrics } => {
                charts::draw_histogram(chunks[1], f, hist, *metrics)
            }
            Rendered::Files(_) => {
                let lines: Vec<Line> = rendered.lines().into_iter().map(Line::from).collect();
                f.render_widget(Paragraph::new(lines), chunks[1]);
            }
        }
    }

    f.render_widget(
        Paragraph::new(Line::from(vec![
            Span::styled("q", Style::default().fg(Color::Magenta)),
            Span::raw(" quit  "),
            Span::styled("t", Style::default().fg(Color::Magenta)),
            Span::raw(" table  "),
            Span::styled("?", Style::default().fg(Color::Magenta)),
            Span::raw(" help"),
        ])),
        chunks[2],
    );

    if state.show_help {
        let w = area.width.min(60);
        let h = area.height.min(12);
        let popup = Rect {
            x: area.x + (area.width - w) / 2,
            y: area.y + (area.height - h) / 2,
            width: w,
            height: h,
        };
        help::draw_help(popup, f);
    }
}
