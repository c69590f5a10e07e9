// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::{AppMode, RelationKind, ScreenKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppState {
    pub mode: AppMode,
    pub active_screen: ScreenKind,
    pub include_inactive: bool,
    pub status_line: Option<String>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            mode: AppMode::Browse,
            active_screen: ScreenKind::Alignments,
            include_inactive: false,
            status_line: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    NextScreen,
    PrevScreen,
    GoTo(ScreenKind),
    EnterFilter,
    ExitToBrowse,
    OpenForm(RelationKind),
    ToggleInactive,
    SetStatus(String),
    ClearStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    ModeChanged(AppMode),
    ScreenChanged(ScreenKind),
    InactiveFilterChanged(bool),
    StatusUpdated(String),
    StatusCleared,
}

impl AppState {
    pub fn dispatch(&mut self, command: AppCommand) -> Vec<AppEvent> {
        match command {
            AppCommand::NextScreen => self.rotate_screen(1),
            AppCommand::PrevScreen => self.rotate_screen(-1),
            AppCommand::GoTo(screen) => {
                if self.active_screen == screen {
                    return Vec::new();
                }
                self.active_screen = screen;
                vec![AppEvent::ScreenChanged(screen)]
            }
            AppCommand::EnterFilter => {
                self.mode = AppMode::Filter;
                vec![AppEvent::ModeChanged(self.mode)]
            }
            AppCommand::ExitToBrowse => {
                self.mode = AppMode::Browse;
                vec![AppEvent::ModeChanged(self.mode)]
            }
            AppCommand::OpenForm(kind) => {
                self.mode = AppMode::Form(kind);
                vec![AppEvent::ModeChanged(self.mode)]
            }
            AppCommand::ToggleInactive => {
                self.include_inactive = !self.include_inactive;
                let label = if self.include_inactive {
                    "inactive shown in pickers"
                } else {
                    "inactive hidden in pickers"
                };
                vec![
                    AppEvent::InactiveFilterChanged(self.include_inactive),
                    self.set_status(label),
                ]
            }
            AppCommand::SetStatus(message) => vec![self.set_status(&message)],
            AppCommand::ClearStatus => {
                self.status_line = None;
                vec![AppEvent::StatusCleared]
            }
        }
    }

    fn rotate_screen(&mut self, delta: isize) -> Vec<AppEvent> {
        let screens = ScreenKind::ALL;
        let current = screens
            .iter()
            .position(|screen| *screen == self.active_screen)
            .unwrap_or(0) as isize;
        let len = screens.len() as isize;
        let next = (current + delta).rem_euclid(len) as usize;
        self.active_screen = screens[next];
        vec![AppEvent::ScreenChanged(self.active_screen)]
    }

    fn set_status(&mut self, message: &str) -> AppEvent {
        self.status_line = Some(message.to_owned());
        AppEvent::StatusUpdated(message.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::{AppCommand, AppEvent, AppState};
    use crate::{AppMode, RelationKind, ScreenKind};

    #[test]
    fn screen_rotation_wraps() {
        let mut state = AppState::default();
        let events = state.dispatch(AppCommand::NextScreen);
        assert_eq!(state.active_screen, ScreenKind::Instruments);
        assert_eq!(events, vec![AppEvent::ScreenChanged(ScreenKind::Instruments)]);

        state.dispatch(AppCommand::PrevScreen);
        assert_eq!(state.active_screen, ScreenKind::Alignments);
    }

    #[test]
    fn goto_same_screen_is_quiet() {
        let mut state = AppState::default();
        assert!(state.dispatch(AppCommand::GoTo(ScreenKind::Alignments)).is_empty());
        assert_eq!(
            state.dispatch(AppCommand::GoTo(ScreenKind::Axes)),
            vec![AppEvent::ScreenChanged(ScreenKind::Axes)]
        );
    }

    #[test]
    fn form_and_filter_modes_return_to_browse() {
        let mut state = AppState::default();
        state.dispatch(AppCommand::OpenForm(RelationKind::IndicatorLink));
        assert_eq!(state.mode, AppMode::Form(RelationKind::IndicatorLink));
        state.dispatch(AppCommand::ExitToBrowse);
        assert_eq!(state.mode, AppMode::Browse);
        state.dispatch(AppCommand::EnterFilter);
        assert_eq!(state.mode, AppMode::Filter);
    }

    #[test]
    fn toggle_inactive_sets_status() {
        let mut state = AppState::default();
        let events = state.dispatch(AppCommand::ToggleInactive);
        assert!(state.include_inactive);
        assert_eq!(
            events,
            vec![
                AppEvent::InactiveFilterChanged(true),
                AppEvent::StatusUpdated("inactive shown in pickers".to_owned()),
            ]
        );
        state.dispatch(AppCommand::ClearStatus);
        assert_eq!(state.status_line, None);
    }
}
