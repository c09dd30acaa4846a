use std::time::Duration;

use anyhow::Result;
use crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event as CEvent, KeyCode, KeyEventKind,
        MouseButton, MouseEvent, MouseEventKind,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use guessme_canvas::{PointerEvent, RasterSurface, SurfaceRect};
use guessme_network::DigitPredictor;
use guessme_session::{
    controls::EMPTY_PREDICTIONS_HINT, LiveBoard, LiveControls, SimpleBoard,
};
use guessme_types::prediction::{ConfidenceTone, DEFAULT_TOP_N};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph},
    Frame, Terminal,
};
use tokio::runtime::Handle;

const SIDE_PANEL_WIDTH: u16 = 34;
const POLL: Duration = Duration::from_millis(100);

/// Pointer routing shared by both boards.
trait PointerTarget {
    fn down(&mut self, event: &PointerEvent);
    fn drag(&mut self, event: &PointerEvent);
    fn up(&mut self, event: &PointerEvent);
}

impl<P: DigitPredictor + 'static> PointerTarget for SimpleBoard<RasterSurface, P> {
    fn down(&mut self, event: &PointerEvent) {
        self.pointer_down(event);
    }

    fn drag(&mut self, event: &PointerEvent) {
        self.pointer_move(event);
    }

    fn up(&mut self, event: &PointerEvent) {
        self.pointer_up(event);
    }
}

impl PointerTarget for LiveBoard<RasterSurface> {
    fn down(&mut self, event: &PointerEvent) {
        self.pointer_down(event);
    }

    fn drag(&mut self, event: &PointerEvent) {
        self.pointer_move(event);
    }

    fn up(&mut self, event: &PointerEvent) {
        self.pointer_up(event);
    }
}

pub fn run_draw<P>(
    board: &mut SimpleBoard<RasterSurface, P>,
    runtime: &Handle,
    summary: &str,
) -> Result<()>
where
    P: DigitPredictor + 'static,
{
    with_terminal(|terminal| draw_loop(terminal, board, runtime, summary))
}

pub fn run_live(board: &mut LiveBoard<RasterSurface>, summary: &str) -> Result<()> {
    with_terminal(|terminal| live_loop(terminal, board, summary))
}

type Term = Terminal<CrosstermBackend<std::io::Stdout>>;

fn with_terminal<F>(body: F) -> Result<()>
where
    F: FnOnce(&mut Term) -> Result<()>,
{
    enable_raw_mode()?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.hide_cursor()?;

    let res = body(&mut terminal);

    terminal.show_cursor()?;
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        DisableMouseCapture,
        LeaveAlternateScreen
    )?;
    res
}

fn draw_loop<P>(
    terminal: &mut Term,
    board: &mut SimpleBoard<RasterSurface, P>,
    runtime: &Handle,
    summary: &str,
) -> Result<()>
where
    P: DigitPredictor + 'static,
{
    loop {
        board.sync();
        let controls = board.controls();

        terminal.draw(|f| {
            let (canvas, side) = frame_layout(f, "Guessme: draw a digit", summary, DRAW_KEYS);
            render_canvas(f, canvas, board.capture_mut().surface_mut());

            let mut lines = vec![
                Line::from(vec![
                    Span::styled("[s] ", key_style(controls.send_enabled)),
                    Span::raw(controls.send_label),
                ]),
                Line::from(vec![
                    Span::styled("[c] ", key_style(controls.clear_enabled)),
                    Span::raw("Clear"),
                ]),
                Line::raw(""),
            ];
            match &controls.result_card {
                Some(card) => {
                    match card.digit {
                        Some(digit) => {
                            lines.push(Line::from(Span::styled(
                                format!("Prediction: {digit}"),
                                Style::default().add_modifier(Modifier::BOLD),
                            )));
                            lines.push(Line::from(Span::styled(
                                format!("Confidence: {:.0}%", card.confidence),
                                tone_style(card.tone),
                            )));
                        }
                        None => {
                            lines.push(Line::from(Span::styled(
                                "Prediction failed",
                                Style::default().fg(Color::Red),
                            )));
                        }
                    }
                    if let Some(error) = &card.error {
                        lines.push(Line::raw(error.clone()));
                        lines.push(Line::raw("[r] Retry"));
                    }
                    lines.push(Line::raw("[t] Try Again"));
                }
                None => lines.push(Line::raw("Draw with the mouse, then send.")),
            }
            let panel =
                Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Result"));
            f.render_widget(panel, side);
        })?;

        if !event::poll(POLL)? {
            continue;
        }
        match event::read()? {
            CEvent::Key(key) if key.kind == KeyEventKind::Press => match key.code {
                KeyCode::Char('q') | KeyCode::Esc => break,
                KeyCode::Char('s') if controls.send_enabled => {
                    let game = board.game();
                    runtime.spawn(async move { game.submit_drawing().await });
                }
                KeyCode::Char('c') => board.clear(),
                KeyCode::Char('t') => board.try_again(),
                KeyCode::Char('r') => board.retry(),
                KeyCode::Char('n') => board.new_game(),
                _ => {}
            },
            CEvent::Mouse(mouse) => route_mouse(board, mouse),
            _ => {}
        }
    }
    Ok(())
}

fn live_loop(terminal: &mut Term, board: &mut LiveBoard<RasterSurface>, summary: &str) -> Result<()> {
    loop {
        board.sync();
        let controls = board.controls();
        let ranked = board.predictions(DEFAULT_TOP_N);
        let final_card = board.final_card();
        let time_left = board.time_left();
        let warning = board.is_warning();

        terminal.draw(|f| {
            let (canvas, side) = frame_layout(f, "Guessme: live round", summary, LIVE_KEYS);
            render_canvas(f, canvas, board.capture_mut().surface_mut());

            let panels = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Length(5), Constraint::Min(0)].as_ref())
                .split(side);

            let timer_style = if warning {
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::Cyan)
            };
            let status = match controls {
                LiveControls::Start => Line::raw("[Enter] Start"),
                LiveControls::Playing { clear, submit } => Line::from(vec![
                    Span::styled("[s] ", key_style(submit)),
                    Span::raw("Submit  "),
                    Span::styled("[c] ", key_style(clear)),
                    Span::raw("Clear"),
                ]),
                LiveControls::GameOver => Line::raw("[Enter] New Game"),
            };
            let header = Paragraph::new(vec![
                Line::from(Span::styled(format!("{time_left}s"), timer_style)),
                status,
            ])
            .block(Block::default().borders(Borders::ALL).title("Round"));
            f.render_widget(header, panels[0]);

            if let Some(card) = &final_card {
                let result = Paragraph::new(vec![
                    Line::from(Span::styled(
                        card.label.clone(),
                        Style::default().add_modifier(Modifier::BOLD),
                    )),
                    Line::from(Span::styled(
                        format!("{:.0}% confidence", card.confidence),
                        tone_style(card.tone),
                    )),
                ])
                .block(Block::default().borders(Borders::ALL).title("Final"));
                f.render_widget(result, panels[1]);
            } else if ranked.is_empty() {
                let hint = Paragraph::new(EMPTY_PREDICTIONS_HINT)
                    .block(Block::default().borders(Borders::ALL).title("Predictions"));
                f.render_widget(hint, panels[1]);
            } else {
                let items: Vec<ListItem> = ranked
                    .iter()
                    .map(|entry| {
                        let style = if entry.leader {
                            Style::default()
                                .fg(Color::Yellow)
                                .add_modifier(Modifier::BOLD)
                        } else {
                            Style::default()
                        };
                        ListItem::new(Line::from(Span::styled(
                            format!("{:<10} {:>3.0}%", entry.label, entry.confidence),
                            style,
                        )))
                    })
                    .collect();
                let list = List::new(items)
                    .block(Block::default().borders(Borders::ALL).title("Predictions"));
                f.render_widget(list, panels[1]);
            }
        })?;

        if !event::poll(POLL)? {
            continue;
        }
        match event::read()? {
            CEvent::Key(key) if key.kind == KeyEventKind::Press => match key.code {
                KeyCode::Char('q') | KeyCode::Esc => break,
                KeyCode::Enter => match controls {
                    LiveControls::Start => board.start(),
                    LiveControls::GameOver => board.new_game(),
                    LiveControls::Playing { .. } => {}
                },
                KeyCode::Char('s') => {
                    if let LiveControls::Playing { submit: true, .. } = controls {
                        board.submit();
                    }
                }
                KeyCode::Char('c') => {
                    if let LiveControls::Playing { clear: true, .. } = controls {
                        board.clear();
                    }
                }
                _ => {}
            },
            CEvent::Mouse(mouse) => route_mouse(board, mouse),
            _ => {}
        }
    }
    Ok(())
}

const DRAW_KEYS: &str = "mouse draw  s send  c clear  t try again  r retry  n new  q quit";
const LIVE_KEYS: &str = "mouse draw  Enter start/new  s submit  c clear  q quit";

/// Header, canvas, side panel and footer. Returns the canvas and side areas.
fn frame_layout(f: &mut Frame, title: &str, summary: &str, keys: &str) -> (Rect, Rect) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length(3),
                Constraint::Min(0),
                Constraint::Length(1),
            ]
            .as_ref(),
        )
        .split(f.size());
    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(0), Constraint::Length(SIDE_PANEL_WIDTH)].as_ref())
        .split(rows[1]);

    let header = Paragraph::new(Line::from(vec![
        Span::styled(
            title.to_string(),
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw("  "),
        Span::styled("server:", Style::default().fg(Color::Magenta)),
        Span::raw(" "),
        Span::raw(summary.to_string()),
    ]))
    .block(Block::default().borders(Borders::ALL));
    f.render_widget(header, rows[0]);

    let footer = Paragraph::new(Span::styled(
        keys.to_string(),
        Style::default().fg(Color::DarkGray),
    ));
    f.render_widget(footer, rows[2]);

    (body[0], body[1])
}

/// Draw the raster into `area` and move the surface viewport onto the
/// block's inner cells, so the next pointer event maps against what is shown.
fn render_canvas(f: &mut Frame, area: Rect, surface: Option<&mut RasterSurface>) {
    let block = Block::default().borders(Borders::ALL).title("Canvas");
    let inner = block.inner(area);
    let Some(surface) = surface else {
        f.render_widget(block, area);
        return;
    };
    surface.set_viewport(SurfaceRect {
        left: f64::from(inner.x),
        top: f64::from(inner.y),
        width: f64::from(inner.width),
        height: f64::from(inner.height),
    });
    let lines: Vec<Line> = surface
        .downsample(usize::from(inner.width), usize::from(inner.height))
        .into_iter()
        .map(|row| {
            Line::raw(
                row.into_iter()
                    .map(|painted| if painted { '█' } else { ' ' })
                    .collect::<String>(),
            )
        })
        .collect();
    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn route_mouse<T: PointerTarget>(target: &mut T, mouse: MouseEvent) {
    // Aim at the centre of the cell.
    let event = PointerEvent::mouse(f64::from(mouse.column) + 0.5, f64::from(mouse.row) + 0.5);
    match mouse.kind {
        MouseEventKind::Down(MouseButton::Left) => target.down(&event),
        MouseEventKind::Drag(MouseButton::Left) => target.drag(&event),
        MouseEventKind::Up(MouseButton::Left) => target.up(&event),
        _ => {}
    }
}

fn key_style(enabled: bool) -> Style {
    if enabled {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::DarkGray)
    }
}

fn tone_style(tone: ConfidenceTone) -> Style {
    match tone {
        ConfidenceTone::High => Style::default().fg(Color::Green),
        ConfidenceTone::Medium => Style::default().fg(Color::Yellow),
        ConfidenceTone::Low => Style::default().fg(Color::Red),
    }
}
