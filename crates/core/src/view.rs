//! View-ready projections of the two collections.
//!
//! These are pure: the front end feeds in records and the current time and
//! gets back everything it needs to draw, without touching storage.

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::{
    models::{Event, EventId, Game},
    schedule::upcoming,
    tally::{MajorityRule, Standing, Tally},
};

/// Message shown when no events are upcoming.
pub const NO_EVENTS: &str = "No upcoming events scheduled.";
/// Message shown when the game list is empty.
pub const NO_GAMES: &str = "No games added yet.";

/// One event as displayed on a card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventCard {
    /// Id used for edit and delete actions.
    pub id: EventId,
    /// Card headline.
    pub title: String,
    /// Human readable date and optional time, e.g. `Sat, Jan 31, 2026 at 2:00 PM`.
    pub when: String,
    /// Where it happens.
    pub location: String,
    /// What is planned.
    pub activity: String,
    /// Who is coming, as entered.
    pub people: String,
}

impl EventCard {
    fn from_event(event: Event) -> Self {
        Self {
            when: format_when(&event),
            id: event.id,
            title: event.title,
            location: event.location,
            activity: event.activity,
            people: event.people,
        }
    }
}

/// Upcoming events, earliest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventsView {
    /// Cards in display order.
    pub cards: Vec<EventCard>,
}

impl EventsView {
    /// Placeholder text when there is nothing to show.
    pub fn empty_message(&self) -> Option<&'static str> {
        self.cards.is_empty().then_some(NO_EVENTS)
    }
}

/// One game with its derived vote figures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GameCard {
    /// Position in the stored list, used to target votes and removal.
    pub position: usize,
    /// Display name.
    pub name: String,
    /// Who voted, sorted.
    pub voters: Vec<String>,
    /// Vote figures against the configured majority.
    pub tally: Tally,
}

impl GameCard {
    /// Convenience accessor for the game's standing.
    pub fn standing(&self) -> Standing {
        self.tally.standing()
    }
}

/// Games split into fan favourites and the rest, recomputed on every render.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GamesView {
    /// Games at or above the majority threshold, in list order.
    pub fan_favourites: Vec<GameCard>,
    /// Games still below it, in list order.
    pub in_consideration: Vec<GameCard>,
    /// Votes needed to become a fan favourite.
    pub threshold: usize,
}

impl GamesView {
    /// Total number of games in both groups.
    pub fn len(&self) -> usize {
        self.fan_favourites.len() + self.in_consideration.len()
    }

    /// Whether the list holds no games at all.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Placeholder text when there is nothing to show.
    pub fn empty_message(&self) -> Option<&'static str> {
        self.is_empty().then_some(NO_GAMES)
    }
}

/// Project events for display: drop past ones, sort, then apply `limit`.
pub fn render_events(events: Vec<Event>, now: NaiveDateTime, limit: Option<usize>) -> EventsView {
    EventsView {
        cards: upcoming(events, now, limit)
            .into_iter()
            .map(EventCard::from_event)
            .collect(),
    }
}

/// Project games for display, partitioned by the majority rule.
pub fn render_games(games: Vec<Game>, rule: MajorityRule) -> GamesView {
    let (fan_favourites, in_consideration) = games
        .into_iter()
        .enumerate()
        .map(|(position, game)| GameCard {
            position,
            tally: rule.tally(&game),
            voters: game.votes.into_iter().collect(),
            name: game.name,
        })
        .partition(|card| card.tally.is_fan_favourite);
    GamesView {
        fan_favourites,
        in_consideration,
        threshold: rule.threshold(),
    }
}

fn format_when(event: &Event) -> String {
    let date = event.date.format("%a, %b %-d, %Y").to_string();
    match event.time {
        Some(time) => format!("{date} at {}", time.format("%-I:%M %p")),
        None => date,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EventDraft;

    fn event(id: u64, title: &str, date: &str, time: &str) -> Event {
        let draft = EventDraft::parse(title, date, time, "Ambience", "Movie", "Ana").unwrap();
        Event::from_draft(EventId(id), draft)
    }

    fn noon(date: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(&format!("{date} 12:00"), "%Y-%m-%d %H:%M").unwrap()
    }

    #[test]
    fn formats_dates_like_the_cards() {
        assert_eq!(
            format_when(&event(1, "x", "2026-01-31", "14:00")),
            "Sat, Jan 31, 2026 at 2:00 PM"
        );
        assert_eq!(
            format_when(&event(1, "x", "2026-02-01", "09:05")),
            "Sun, Feb 1, 2026 at 9:05 AM"
        );
        assert_eq!(
            format_when(&event(1, "x", "2026-02-01", "")),
            "Sun, Feb 1, 2026"
        );
    }

    #[test]
    fn renders_upcoming_cards_in_order() {
        let events = vec![
            event(1, "Game Night", "2026-01-31", "19:00"),
            event(2, "Yesterday", "2026-01-30", "19:00"),
            event(3, "MARTY SUPREMEEEE", "2026-01-31", "14:00"),
        ];
        let view = render_events(events.clone(), noon("2026-01-31"), None);
        let ids: Vec<EventId> = view.cards.iter().map(|card| card.id).collect();
        assert_eq!(ids, vec![EventId(3), EventId(1)]);
        assert_eq!(view.empty_message(), None);

        let short = render_events(events.clone(), noon("2026-01-31"), Some(1));
        assert_eq!(short.cards.len(), 1);

        let later = render_events(events, noon("2026-02-02"), Some(2));
        assert_eq!(later.empty_message(), Some(NO_EVENTS));
    }

    #[test]
    fn partitions_games_by_majority() {
        let mut favourite = Game::new("Among Us");
        for voter in ["A", "B", "C", "D", "E", "F", "G", "H"] {
            favourite.votes.insert(voter.to_string());
        }
        let mut partial = Game::new("Gartic Phone");
        partial.votes.insert("A".to_string());
        let games = vec![Game::new("Chess"), favourite, partial];

        let view = render_games(games, MajorityRule::default());
        assert_eq!(view.threshold, 8);
        assert_eq!(view.len(), 3);
        assert_eq!(view.fan_favourites.len(), 1);
        assert_eq!(view.fan_favourites[0].position, 1);
        assert_eq!(view.fan_favourites[0].standing(), Standing::FanFavourite);

        let names: Vec<&str> = view
            .in_consideration
            .iter()
            .map(|card| card.name.as_str())
            .collect();
        assert_eq!(names, vec!["Chess", "Gartic Phone"]);
        assert_eq!(view.in_consideration[1].tally.votes_needed, 7);
        assert_eq!(view.in_consideration[1].voters, vec!["A".to_string()]);
    }

    #[test]
    fn smaller_groups_need_fewer_votes() {
        let mut game = Game::new("Chess");
        game.votes.insert("A".to_string());
        game.votes.insert("B".to_string());
        let view = render_games(vec![game], MajorityRule::new(4));
        assert_eq!(view.fan_favourites.len(), 1);
        assert_eq!(
            render_games(Vec::new(), MajorityRule::new(4)).empty_message(),
            Some(NO_GAMES)
        );
    }
}
