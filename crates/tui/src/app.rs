use std::{io, thread, time::Duration};

use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime};
use crossterm::{
    event::{self, Event as InputEvent, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use hangout_core::{
    view::render_events, AppConfig, Event, EventsView, Feed, GameCard, GameKey, GamesView,
    Planner, Update,
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
    Frame, Terminal,
};
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::form::{EventForm, TextInput, FIELD_LABELS};

const TICK_RATE: Duration = Duration::from_millis(250);
const MAX_GAME_NAME_LEN: usize = 64;

const ACCENT: Color = Color::Cyan;
const MUTED: Color = Color::DarkGray;
const SUCCESS: Color = Color::Green;
const WARNING: Color = Color::Yellow;

enum AppEvent {
    Input(InputEvent),
    Tick,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Panel {
    Events,
    Games,
}

enum Modal {
    Event(EventForm),
    GameName(TextInput),
}

/// Terminal front end over a [`Planner`].
pub struct HangoutApp {
    planner: Planner,
    config: AppConfig,
    feed: Option<Feed>,
    events: Vec<Event>,
    games: GamesView,
    panel: Panel,
    show_all_events: bool,
    event_cursor: usize,
    game_cursor: usize,
    modal: Option<Modal>,
    status: String,
    events_loaded: bool,
    should_quit: bool,
}

impl HangoutApp {
    pub fn new(planner: Planner, config: AppConfig) -> Self {
        Self {
            planner,
            config,
            feed: None,
            events: Vec::new(),
            games: GamesView::default(),
            panel: Panel::Events,
            show_all_events: false,
            event_cursor: 0,
            game_cursor: 0,
            modal: None,
            status: "Loading…".to_string(),
            events_loaded: false,
            should_quit: false,
        }
    }

    pub fn attach_feed(&mut self, feed: Feed) {
        self.feed = Some(feed);
    }

    pub async fn run(&mut self) -> Result<()> {
        let mut stdout = io::stdout();
        enable_raw_mode().context("failed to enter raw mode")?;
        execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend).context("failed to create terminal")?;
        terminal.hide_cursor()?;
        terminal.clear()?;

        let (event_tx, mut event_rx) = mpsc::channel::<AppEvent>(128);
        spawn_input_thread(event_tx);

        let mut feed = self.feed.take();

        loop {
            terminal.draw(|frame| self.draw(frame))?;
            if self.should_quit {
                break;
            }

            if let Some(active) = feed.as_mut() {
                let mut feed_closed = false;
                tokio::select! {
                    maybe_event = event_rx.recv() => {
                        if !self.process_app_event(maybe_event) {
                            break;
                        }
                    }
                    maybe_update = active.next() => {
                        match maybe_update {
                            Some(update) => self.apply_update(update),
                            None => feed_closed = true,
                        }
                    }
                }
                if feed_closed {
                    error!("Change feed closed");
                    self.status = "Lost connection to the store".to_string();
                    feed = None;
                }
            } else {
                let maybe_event = event_rx.recv().await;
                if !self.process_app_event(maybe_event) {
                    break;
                }
            }
        }

        restore_terminal(&mut terminal)?;
        Ok(())
    }

    fn now() -> NaiveDateTime {
        Local::now().naive_local()
    }

    fn apply_update(&mut self, update: Update) {
        match update {
            Update::Events(events) => {
                info!(total = events.len(), "Events refreshed");
                self.events = events;
                self.clamp_cursors();
                // Later snapshots echo our own writes; keep their confirmation visible.
                if !self.events_loaded {
                    self.events_loaded = true;
                    self.status = format!("{} events loaded", self.events.len());
                }
            }
            Update::Games(games) => {
                info!(
                    favourites = games.fan_favourites.len(),
                    considered = games.in_consideration.len(),
                    "Games refreshed"
                );
                self.games = games;
                self.clamp_cursors();
            }
        }
    }

    fn process_app_event(&mut self, maybe_event: Option<AppEvent>) -> bool {
        match maybe_event {
            Some(AppEvent::Input(InputEvent::Key(key))) if key.kind == KeyEventKind::Press => {
                self.handle_key(key);
                true
            }
            Some(AppEvent::Input(_)) | Some(AppEvent::Tick) => true,
            None => false,
        }
    }

    fn events_view(&self) -> EventsView {
        let limit = if self.show_all_events {
            None
        } else {
            self.config.upcoming_limit()
        };
        render_events(self.events.clone(), Self::now(), limit)
    }

    fn game_cards(&self) -> Vec<&GameCard> {
        self.games
            .fan_favourites
            .iter()
            .chain(self.games.in_consideration.iter())
            .collect()
    }

    fn selected_event(&self) -> Option<Event> {
        let view = self.events_view();
        let id = view.cards.get(self.event_cursor)?.id;
        self.events.iter().find(|event| event.id == id).cloned()
    }

    fn selected_game(&self) -> Option<(usize, String)> {
        self.game_cards()
            .get(self.game_cursor)
            .map(|card| (card.position, card.name.clone()))
    }

    fn clamp_cursors(&mut self) {
        let events = self.events_view().cards.len();
        self.event_cursor = self.event_cursor.min(events.saturating_sub(1));
        let games = self.games.len();
        self.game_cursor = self.game_cursor.min(games.saturating_sub(1));
    }

    fn move_cursor(&mut self, delta: isize) {
        let len = match self.panel {
            Panel::Events => self.events_view().cards.len(),
            Panel::Games => self.games.len(),
        };
        let cursor = match self.panel {
            Panel::Events => &mut self.event_cursor,
            Panel::Games => &mut self.game_cursor,
        };
        if len == 0 {
            *cursor = 0;
            return;
        }
        let next = (*cursor as isize + delta).clamp(0, len as isize - 1);
        *cursor = next as usize;
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.should_quit = true;
            return;
        }
        match self.modal.take() {
            Some(Modal::Event(form)) => self.handle_event_form_key(form, key),
            Some(Modal::GameName(input)) => self.handle_game_name_key(input, key),
            None => self.handle_browse_key(key),
        }
    }

    fn handle_browse_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Tab | KeyCode::BackTab => {
                self.panel = match self.panel {
                    Panel::Events => Panel::Games,
                    Panel::Games => Panel::Events,
                };
            }
            KeyCode::Up | KeyCode::Char('k') => self.move_cursor(-1),
            KeyCode::Down | KeyCode::Char('j') => self.move_cursor(1),
            KeyCode::Char('t') => {
                self.show_all_events = !self.show_all_events;
                self.clamp_cursors();
            }
            _ => match self.panel {
                Panel::Events => self.handle_events_key(key),
                Panel::Games => self.handle_games_key(key),
            },
        }
    }

    fn handle_events_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('a') => self.modal = Some(Modal::Event(EventForm::blank())),
            KeyCode::Char('e') | KeyCode::Enter => match self.selected_event() {
                Some(event) => self.modal = Some(Modal::Event(EventForm::for_event(&event))),
                None => self.status = "No event selected".to_string(),
            },
            KeyCode::Char('d') => {
                let Some(event) = self.selected_event() else {
                    self.status = "No event selected".to_string();
                    return;
                };
                let deleted = self.planner.events().delete(event.id);
                match deleted {
                    Ok(true) => self.status = format!("Deleted {}", event.title),
                    Ok(false) => self.status = format!("{} was already gone", event.title),
                    Err(err) => self.report(err),
                }
            }
            _ => {}
        }
    }

    fn handle_games_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('a') | KeyCode::Char('n') => {
                self.modal = Some(Modal::GameName(TextInput::default()))
            }
            KeyCode::Char('v') | KeyCode::Enter => self.cast_vote(true),
            KeyCode::Char('u') => self.cast_vote(false),
            KeyCode::Char('x') => {
                let Some((position, name)) = self.selected_game() else {
                    self.status = "No game selected".to_string();
                    return;
                };
                let removed = self.planner.games().remove(position);
                match removed {
                    Ok(Some(_)) => self.status = format!("Removed {name}"),
                    Ok(None) => self.status = format!("{name} was already gone"),
                    Err(err) => self.report(err),
                }
            }
            _ => {}
        }
    }

    fn cast_vote(&mut self, vote: bool) {
        let Some(voter) = self.config.voter_name.clone() else {
            self.status = "Set voter_name in config.toml to vote".to_string();
            return;
        };
        let Some((_, name)) = self.selected_game() else {
            self.status = "No game selected".to_string();
            return;
        };
        let key = GameKey::Name(&name);
        let result = if vote {
            self.planner.games().vote(key, &voter)
        } else {
            self.planner.games().unvote(key, &voter)
        };
        match result {
            Ok(game) => {
                let tally = self.planner.rule().tally(&game);
                self.status = if tally.is_fan_favourite {
                    format!("{} is a fan favourite ({} votes)", game.name, tally.vote_count)
                } else {
                    format!(
                        "{}: {} votes, {} more needed",
                        game.name, tally.vote_count, tally.votes_needed
                    )
                };
            }
            Err(err) => self.report(err),
        }
    }

    fn handle_event_form_key(&mut self, mut form: EventForm, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => {
                self.status = "Cancelled".to_string();
                return;
            }
            KeyCode::Enter => {
                match self.submit_event_form(&form) {
                    Ok(message) => self.status = message,
                    Err(err) => {
                        self.status = format!("Error: {err}");
                        self.modal = Some(Modal::Event(form));
                    }
                }
                return;
            }
            KeyCode::Tab | KeyCode::Down => form.next_field(),
            KeyCode::BackTab | KeyCode::Up => form.previous_field(),
            KeyCode::Left => form.focused().move_cursor(-1),
            KeyCode::Right => form.focused().move_cursor(1),
            KeyCode::Home => form.focused().move_home(),
            KeyCode::End => form.focused().move_end(),
            KeyCode::Backspace => form.focused().backspace(),
            KeyCode::Delete => form.focused().delete(),
            KeyCode::Char(ch) => form.focused().insert(ch),
            _ => {}
        }
        self.modal = Some(Modal::Event(form));
    }

    fn submit_event_form(&mut self, form: &EventForm) -> Result<String> {
        let draft = form.draft()?;
        let scheduler = self.planner.events();
        let message = match form.editing {
            Some(id) => match scheduler.edit(id, draft)? {
                Some(event) => format!("Saved {}", event.title),
                None => format!("Event {id} no longer exists"),
            },
            None => format!("Added {}", scheduler.add(draft)?.title),
        };
        Ok(message)
    }

    fn handle_game_name_key(&mut self, mut input: TextInput, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => {
                self.status = "Cancelled".to_string();
                return;
            }
            KeyCode::Enter => {
                let added = self.planner.games().add(&input.value());
                match added {
                    Ok(game) => self.status = format!("Added {}", game.name),
                    Err(err) => {
                        self.status = format!("Error: {err}");
                        self.modal = Some(Modal::GameName(input));
                    }
                }
                return;
            }
            KeyCode::Left => input.move_cursor(-1),
            KeyCode::Right => input.move_cursor(1),
            KeyCode::Home => input.move_home(),
            KeyCode::End => input.move_end(),
            KeyCode::Backspace => input.backspace(),
            KeyCode::Delete => input.delete(),
            KeyCode::Char(ch) if input.value().chars().count() < MAX_GAME_NAME_LEN => {
                input.insert(ch)
            }
            _ => {}
        }
        self.modal = Some(Modal::GameName(input));
    }

    fn report(&mut self, err: impl std::fmt::Display) {
        error!(%err, "Action failed");
        self.status = format!("Error: {err}");
    }

    fn draw(&mut self, frame: &mut Frame) {
        let area = frame.size();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(8), Constraint::Length(4)])
            .split(area);

        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
            .split(chunks[0]);

        self.render_events(frame, body[0]);
        self.render_games(frame, body[1]);
        self.render_status(frame, chunks[1]);

        match &self.modal {
            Some(Modal::Event(form)) => render_event_form(frame, form),
            Some(Modal::GameName(input)) => render_game_prompt(frame, input),
            None => {}
        }
    }

    fn panel_block(&self, panel: Panel, title: String) -> Block<'static> {
        let style = if self.panel == panel {
            Style::default().fg(ACCENT)
        } else {
            Style::default().fg(MUTED)
        };
        Block::default()
            .borders(Borders::ALL)
            .border_style(style)
            .title(title)
    }

    fn render_events(&self, frame: &mut Frame, area: Rect) {
        let view = self.events_view();
        let title = if self.show_all_events {
            "All Upcoming Events".to_string()
        } else {
            "Upcoming Events".to_string()
        };
        let block = self.panel_block(Panel::Events, title);

        if let Some(message) = view.empty_message() {
            let paragraph = Paragraph::new(Line::from(Span::styled(
                message,
                Style::default().fg(MUTED),
            )))
            .block(block)
            .alignment(Alignment::Center);
            frame.render_widget(paragraph, area);
            return;
        }

        let items: Vec<ListItem> = view
            .cards
            .iter()
            .map(|card| {
                ListItem::new(vec![
                    Line::from(Span::styled(
                        card.title.clone(),
                        Style::default().add_modifier(Modifier::BOLD),
                    )),
                    Line::from(format!("  📅 {}", card.when)),
                    Line::from(format!("  📍 {}", card.location)),
                    Line::from(format!("  🎯 {}", card.activity)),
                    Line::from(format!("  👥 {}", card.people)),
                    Line::from(""),
                ])
            })
            .collect();

        let mut state = ListState::default();
        if self.panel == Panel::Events {
            state.select(Some(self.event_cursor));
        }
        let list = List::new(items)
            .block(block)
            .highlight_style(Style::default().fg(ACCENT))
            .highlight_symbol("▶ ");
        frame.render_stateful_widget(list, area, &mut state);
    }

    fn render_games(&self, frame: &mut Frame, area: Rect) {
        let title = format!("Fan Favourites ({} votes needed)", self.games.threshold);
        let block = self.panel_block(Panel::Games, title);

        if let Some(message) = self.games.empty_message() {
            let paragraph = Paragraph::new(Line::from(Span::styled(
                message,
                Style::default().fg(MUTED),
            )))
            .block(block)
            .alignment(Alignment::Center);
            frame.render_widget(paragraph, area);
            return;
        }

        let voter = self.config.voter_name.as_deref();
        let mut items = Vec::new();
        let mut selectable_rows = Vec::new();
        for (heading, cards) in [
            ("★ Fan Favourites", &self.games.fan_favourites),
            ("In Consideration", &self.games.in_consideration),
        ] {
            items.push(ListItem::new(Line::from(Span::styled(
                heading,
                Style::default().fg(WARNING).add_modifier(Modifier::BOLD),
            ))));
            if cards.is_empty() {
                items.push(ListItem::new(Line::from(Span::styled(
                    "  (none)",
                    Style::default().fg(MUTED),
                ))));
            }
            for card in cards {
                selectable_rows.push(items.len());
                items.push(game_item(card, voter));
            }
        }

        let mut state = ListState::default();
        if self.panel == Panel::Games {
            state.select(selectable_rows.get(self.game_cursor).copied());
        }
        let list = List::new(items)
            .block(block)
            .highlight_style(Style::default().fg(ACCENT))
            .highlight_symbol("▶ ");
        frame.render_stateful_widget(list, area, &mut state);
    }

    fn render_status(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default().borders(Borders::ALL).title("Status");
        let help = match self.panel {
            Panel::Events => "a add · e edit · d delete · t all/upcoming · Tab games · q quit",
            Panel::Games => "a add · v vote · u unvote · x remove · Tab events · q quit",
        };
        let voter = match self.config.voter_name.as_deref() {
            Some(name) => format!("Voting as {name}"),
            None => "Read-only voting (no voter_name)".to_string(),
        };
        let paragraph = Paragraph::new(vec![
            Line::from(self.status.clone()),
            Line::from(Span::styled(
                format!("{voter}  •  {help}"),
                Style::default().fg(MUTED),
            )),
        ])
        .block(block)
        .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, area);
    }
}

fn game_item(card: &GameCard, voter: Option<&str>) -> ListItem<'static> {
    let voted = voter.is_some_and(|name| card.voters.iter().any(|v| v == name));
    let marker = if voted { "✓" } else { " " };
    let detail = if card.tally.is_fan_favourite {
        format!("{} votes", card.tally.vote_count)
    } else {
        format!(
            "{} votes · {} more needed",
            card.tally.vote_count, card.tally.votes_needed
        )
    };
    let name_style = if card.tally.is_fan_favourite {
        Style::default().fg(SUCCESS).add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    };
    ListItem::new(Line::from(vec![
        Span::raw(format!("  {marker} ")),
        Span::styled(card.name.clone(), name_style),
        Span::styled(format!("  {detail}"), Style::default().fg(MUTED)),
    ]))
}

fn render_event_form(frame: &mut Frame, form: &EventForm) {
    let height = (FIELD_LABELS.len() as u16) * 2 + 4;
    let area = centered_rect(64, height, frame.size());
    let mut lines = Vec::new();
    for (index, (label, field)) in FIELD_LABELS.iter().zip(form.fields.iter()).enumerate() {
        let focused = index == form.focus;
        let label_style = if focused {
            Style::default().fg(ACCENT).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(MUTED)
        };
        lines.push(Line::from(Span::styled(*label, label_style)));
        lines.push(Line::from(format!("  {}", field.display(focused))));
    }
    lines.push(Line::from(Span::styled(
        "Tab next field · Enter save · Esc cancel",
        Style::default().fg(MUTED),
    )));
    let paragraph = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title(form.title())
            .border_style(Style::default().fg(ACCENT)),
    );
    frame.render_widget(Clear, area);
    frame.render_widget(paragraph, area);
}

fn render_game_prompt(frame: &mut Frame, input: &TextInput) {
    let area = centered_rect(48, 5, frame.size());
    let paragraph = Paragraph::new(vec![
        Line::from(input.display(true)),
        Line::from(Span::styled(
            "Enter add · Esc cancel",
            Style::default().fg(MUTED),
        )),
    ])
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title("Add Game")
            .border_style(Style::default().fg(ACCENT)),
    );
    frame.render_widget(Clear, area);
    frame.render_widget(paragraph, area);
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode().context("failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("failed to leave alternate screen")?;
    terminal.show_cursor()?;
    Ok(())
}

fn spawn_input_thread(sender: mpsc::Sender<AppEvent>) {
    thread::spawn(move || loop {
        match event::poll(TICK_RATE) {
            Ok(true) => match event::read() {
                Ok(evt) => {
                    if sender.blocking_send(AppEvent::Input(evt)).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            },
            Ok(false) => {
                if sender.blocking_send(AppEvent::Tick).is_err() {
                    break;
                }
            }
            Err(_) => break,
        }
    });
}
