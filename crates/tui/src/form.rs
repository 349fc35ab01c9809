use hangout_core::{Event, EventDraft, EventId, PlannerResult};

/// Single-line text input with a cursor.
#[derive(Debug, Clone, Default)]
pub struct TextInput {
    buffer: Vec<char>,
    cursor: usize,
}

impl TextInput {
    pub fn with_value(value: &str) -> Self {
        let buffer: Vec<char> = value.chars().collect();
        let cursor = buffer.len();
        Self { buffer, cursor }
    }

    pub fn move_cursor(&mut self, delta: isize) {
        let len = self.buffer.len() as isize;
        let next = (self.cursor as isize + delta).clamp(0, len);
        self.cursor = next as usize;
    }

    pub fn move_home(&mut self) {
        self.cursor = 0;
    }

    pub fn move_end(&mut self) {
        self.cursor = self.buffer.len();
    }

    pub fn insert(&mut self, ch: char) {
        self.buffer.insert(self.cursor, ch);
        self.cursor += 1;
    }

    pub fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            self.buffer.remove(self.cursor);
        }
    }

    pub fn delete(&mut self) {
        if self.cursor < self.buffer.len() {
            self.buffer.remove(self.cursor);
        }
    }

    pub fn value(&self) -> String {
        self.buffer.iter().collect()
    }

    /// Text with a block cursor spliced in, for display.
    pub fn display(&self, focused: bool) -> String {
        let mut text = self.value();
        if focused {
            let byte_index = text
                .char_indices()
                .nth(self.cursor)
                .map(|(index, _)| index)
                .unwrap_or(text.len());
            text.insert(byte_index, '▏');
        }
        text
    }
}

pub const FIELD_LABELS: [&str; 6] = [
    "Title",
    "Date (YYYY-MM-DD)",
    "Time (HH:MM, optional)",
    "Location",
    "Activity",
    "People",
];

/// Add/edit form for an event.
#[derive(Debug, Clone)]
pub struct EventForm {
    /// `Some` when editing an existing event.
    pub editing: Option<EventId>,
    pub fields: [TextInput; 6],
    pub focus: usize,
}

impl EventForm {
    pub fn blank() -> Self {
        Self {
            editing: None,
            fields: Default::default(),
            focus: 0,
        }
    }

    pub fn for_event(event: &Event) -> Self {
        let time = event
            .time
            .map(|time| time.format("%H:%M").to_string())
            .unwrap_or_default();
        Self {
            editing: Some(event.id),
            fields: [
                TextInput::with_value(&event.title),
                TextInput::with_value(&event.date.format("%Y-%m-%d").to_string()),
                TextInput::with_value(&time),
                TextInput::with_value(&event.location),
                TextInput::with_value(&event.activity),
                TextInput::with_value(&event.people),
            ],
            focus: 0,
        }
    }

    pub fn title(&self) -> &'static str {
        if self.editing.is_some() {
            "Edit Event"
        } else {
            "Add Event"
        }
    }

    pub fn focused(&mut self) -> &mut TextInput {
        &mut self.fields[self.focus]
    }

    pub fn next_field(&mut self) {
        self.focus = (self.focus + 1) % self.fields.len();
    }

    pub fn previous_field(&mut self) {
        self.focus = self.focus.checked_sub(1).unwrap_or(self.fields.len() - 1);
    }

    pub fn draft(&self) -> PlannerResult<EventDraft> {
        let [title, date, time, location, activity, people] = &self.fields;
        EventDraft::parse(
            &title.value(),
            &date.value(),
            &time.value(),
            &location.value(),
            &activity.value(),
            &people.value(),
        )
    }
}
