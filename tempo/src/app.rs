use crate::config::Config;
use crate::host::Driver;
use crate::scheduler::Scheduler;
use crossterm::event::{Event, KeyCode, KeyEvent, KeyModifiers};
use tempo_ipc::PreferenceField;

pub struct App {
    pub scheduler: Scheduler,
    pub mode: AppMode,
    pub input_buffer: String,
    pub selected_field: usize,
    pub selected_preset: usize,
    pub config: Config,
    pub should_quit: bool,
}

#[derive(Default, Clone, Copy, PartialEq, Debug)]
pub enum AppMode {
    #[default]
    Normal,
    EditingField(PreferenceField),
    SelectingPreset,
}

impl App {
    pub fn new(config: Config, scheduler: Scheduler) -> Self {
        Self {
            scheduler,
            mode: AppMode::Normal,
            input_buffer: String::new(),
            selected_field: 0,
            selected_preset: 0,
            config,
            should_quit: false,
        }
    }

    pub fn selected(&self) -> PreferenceField {
        PreferenceField::ALL[self.selected_field]
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.should_quit = true;
            return;
        }
        match self.mode {
            AppMode::Normal => match key.code {
                KeyCode::Char('q') => self.should_quit = true,
                KeyCode::Char(' ') => self.scheduler.toggle(),
                KeyCode::Char('s') => self.scheduler.skip(),
                KeyCode::Char('r') => self.scheduler.reset_phase(),
                KeyCode::Char('R') => self.scheduler.reset_all(),
                KeyCode::Char('p') => {
                    self.selected_preset = 0;
                    self.mode = AppMode::SelectingPreset;
                }
                KeyCode::Enter => self.edit_selected_field(),
                KeyCode::Up | KeyCode::Char('k') => self.move_selection_up(),
                KeyCode::Down | KeyCode::Char('j') => self.move_selection_down(),
                _ => {}
            },
            AppMode::EditingField(_) => match key.code {
                KeyCode::Esc => {
                    self.mode = AppMode::Normal;
                    self.input_buffer.clear();
                }
                KeyCode::Enter => self.handle_char('\n'),
                KeyCode::Backspace => self.handle_backspace(),
                KeyCode::Char(c) => self.handle_char(c),
                _ => {}
            },
            AppMode::SelectingPreset => match key.code {
                KeyCode::Esc => self.mode = AppMode::Normal,
                KeyCode::Enter => self.apply_selected_preset(),
                KeyCode::Up | KeyCode::Char('k') => {
                    self.selected_preset = self.selected_preset.saturating_sub(1);
                }
                KeyCode::Down | KeyCode::Char('j') => {
                    let last = self.scheduler.presets().len().saturating_sub(1);
                    self.selected_preset = (self.selected_preset + 1).min(last);
                }
                KeyCode::Char(c) => self.handle_char(c),
                _ => {}
            },
        }
    }

    /// Flags flip in place; numbers open the input overlay.
    pub fn edit_selected_field(&mut self) {
        let field = self.selected();
        if field.is_flag() {
            let flipped = self.scheduler.preferences().get(field) != "true";
            self.scheduler.set_preference(field, &flipped.to_string());
        } else {
            self.input_buffer = self.scheduler.preferences().get(field);
            self.mode = AppMode::EditingField(field);
        }
    }

    pub fn move_selection_up(&mut self) {
        self.selected_field = self.selected_field.saturating_sub(1);
    }

    pub fn move_selection_down(&mut self) {
        self.selected_field = (self.selected_field + 1).min(PreferenceField::ALL.len() - 1);
    }

    pub fn handle_char(&mut self, c: char) {
        match self.mode {
            AppMode::EditingField(field) => {
                if c == '\n' {
                    self.scheduler.set_preference(field, &self.input_buffer);
                    self.input_buffer.clear();
                    self.mode = AppMode::Normal;
                } else {
                    self.input_buffer.push(c);
                }
            }
            AppMode::SelectingPreset => {
                let index = c.to_digit(10).unwrap_or(0) as usize;
                if index > 0 && index <= self.scheduler.presets().len() {
                    self.selected_preset = index - 1;
                    self.apply_selected_preset();
                }
            }
            AppMode::Normal => {}
        }
    }

    pub fn handle_backspace(&mut self) {
        if matches!(self.mode, AppMode::EditingField(_)) {
            self.input_buffer.pop();
        }
    }

    fn apply_selected_preset(&mut self) {
        if let Some(preset) = self.scheduler.presets().get(self.selected_preset).cloned() {
            self.scheduler.apply_preset(&preset);
            self.mode = AppMode::Normal;
        }
    }
}

impl Driver for App {
    type Local = Event;

    fn scheduler(&mut self) -> &mut Scheduler {
        &mut self.scheduler
    }

    fn local(&mut self, event: Event) {
        if let Event::Key(key) = event {
            self.handle_key(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::tests::ManualClock;
    use crate::notify::tests::RecordingSink;
    use crate::persistence::{MemoryKeyValue, PreferenceStore};
    use crate::preferences::{self, Preset};
    use tempo_ipc::Phase;

    fn app() -> App {
        let scheduler = Scheduler::new(
            PreferenceStore::open(Box::new(MemoryKeyValue::default())),
            Box::new(ManualClock::default()),
            Box::new(RecordingSink::default()),
            Preset::builtin(),
        );
        App::new(Config::default(), scheduler)
    }

    fn press(app: &mut App, code: KeyCode) {
        app.handle_key(KeyEvent::new(code, KeyModifiers::NONE));
    }

    fn type_str(app: &mut App, text: &str) {
        for c in text.chars() {
            press(app, KeyCode::Char(c));
        }
    }

    #[test]
    fn space_toggles_and_s_skips() {
        let mut app = app();
        press(&mut app, KeyCode::Char(' '));
        assert!(app.scheduler.is_running());
        press(&mut app, KeyCode::Char('s'));
        assert!(!app.scheduler.is_running());
        assert_eq!(app.scheduler.phase(), Phase::Break);
        press(&mut app, KeyCode::Char('R'));
        assert_eq!(app.scheduler.phase(), Phase::Work);
    }

    #[test]
    fn editing_a_duration_goes_through_clamping() {
        let mut app = app();
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.mode, AppMode::EditingField(PreferenceField::WorkMinutes));
        assert_eq!(app.input_buffer, "25");

        press(&mut app, KeyCode::Backspace);
        press(&mut app, KeyCode::Backspace);
        type_str(&mut app, "9999");
        press(&mut app, KeyCode::Enter);

        assert_eq!(app.mode, AppMode::Normal);
        assert_eq!(app.scheduler.preferences().work_minutes, 180);
        assert_eq!(app.scheduler.seconds_remaining(), 180 * 60);
    }

    #[test]
    fn escape_abandons_an_edit() {
        let mut app = app();
        press(&mut app, KeyCode::Enter);
        type_str(&mut app, "0");
        press(&mut app, KeyCode::Esc);
        assert_eq!(app.scheduler.preferences().work_minutes, 25);
        assert!(app.input_buffer.is_empty());
    }

    #[test]
    fn enter_on_a_flag_flips_it() {
        let mut app = app();
        for _ in 0..4 {
            press(&mut app, KeyCode::Down);
        }
        assert_eq!(app.selected(), PreferenceField::AutoStartNext);
        press(&mut app, KeyCode::Enter);
        assert!(app.scheduler.preferences().auto_start_next);
        assert_eq!(app.mode, AppMode::Normal);

        for _ in 0..10 {
            press(&mut app, KeyCode::Char('j'));
        }
        assert_eq!(app.selected(), PreferenceField::NotificationsEnabled);
    }

    #[test]
    fn digits_pick_presets() {
        let mut app = app();
        press(&mut app, KeyCode::Char('p'));
        type_str(&mut app, "9");
        assert_eq!(app.mode, AppMode::SelectingPreset);
        type_str(&mut app, "3");
        assert_eq!(app.mode, AppMode::Normal);
        assert_eq!(app.scheduler.preferences().work_minutes, 50);
        assert_eq!(app.scheduler.seconds_remaining(), 50 * 60);
    }

    #[test]
    fn presets_past_the_ninth_are_reachable_with_the_cursor() {
        let extra: Vec<Preset> = (0..8)
            .map(|i| Preset {
                label: format!("Custom {i}"),
                work_minutes: 30 + i,
                break_minutes: 5,
                long_break_minutes: 20,
                long_break_every: 2,
            })
            .collect();
        let scheduler = Scheduler::new(
            PreferenceStore::open(Box::new(MemoryKeyValue::default())),
            Box::new(ManualClock::default()),
            Box::new(RecordingSink::default()),
            preferences::catalog(&extra),
        );
        let mut app = App::new(Config::default(), scheduler);
        assert_eq!(app.scheduler.presets().len(), 12);

        press(&mut app, KeyCode::Char('p'));
        for _ in 0..20 {
            press(&mut app, KeyCode::Char('j'));
        }
        assert_eq!(app.selected_preset, 11);
        press(&mut app, KeyCode::Up);
        press(&mut app, KeyCode::Enter);

        assert_eq!(app.mode, AppMode::Normal);
        assert_eq!(app.scheduler.preferences().work_minutes, 36);
        assert_eq!(app.scheduler.seconds_remaining(), 36 * 60);
    }

    #[test]
    fn q_and_ctrl_c_quit() {
        let mut app = app();
        press(&mut app, KeyCode::Char('p'));
        app.handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert!(app.should_quit);

        let mut app = self::app();
        press(&mut app, KeyCode::Char('q'));
        assert!(app.should_quit);
    }
}
