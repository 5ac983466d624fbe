//! Input requests and incoming UI events

use super::Library;
use crate::core::style;
use crate::core::Tag;
use crate::error::{GlkError, Result};
use crate::event::{Event, UiEvent};

impl Library {
    fn check_input_window(&self, win: Tag) -> Result<()> {
        let window = self.window(win)?;
        if window.supports_input() {
            Ok(())
        } else {
            Err(self.report_err(GlkError::WrongWindowType(win)))
        }
    }

    /// Start waiting for a key press; returns the request id
    pub fn request_char_event(&mut self, win: Tag, unicode: bool) -> Result<u32> {
        self.check_input_window(win)?;
        let result = self.window_mut(win)?.input.begin_char(win, unicode);
        self.report(result)
    }

    /// Start waiting for a line of input; returns the request id
    pub fn request_line_event(
        &mut self,
        win: Tag,
        unicode: bool,
        max_len: usize,
        initial: Option<&str>,
    ) -> Result<u32> {
        self.check_input_window(win)?;
        let result = self
            .window_mut(win)?
            .input
            .begin_line(win, unicode, max_len, initial);
        self.report(result)
    }

    pub fn cancel_char_event(&mut self, win: Tag) -> Result<()> {
        self.window_mut(win)?.input.cancel_char();
        Ok(())
    }

    /// Cancel a line request, turning the partial text into a line event.
    ///
    /// Returns `None` if no line request was pending.
    pub fn cancel_line_event(&mut self, win: Tag, partial: &str) -> Result<Option<Event>> {
        let text = self.window_mut(win)?.input.cancel_line(partial);
        Ok(text.map(|text| {
            self.echo_line(win, &text);
            Event::line_input(win, text)
        }))
    }

    /// Resubmit a pending request under a new id; old responses become stale
    pub fn reissue_input(&mut self, win: Tag) -> Result<Option<u32>> {
        Ok(self.window_mut(win)?.input.reissue())
    }

    pub fn set_echo_line_event(&mut self, win: Tag, echo: bool) -> Result<()> {
        self.window_mut(win)?.echo_line_input = echo;
        Ok(())
    }

    /// Apply a response from the presentation side.
    ///
    /// A response whose request id is not current fails with
    /// `StaleResponse` and leaves the window untouched.
    pub fn apply_ui_event(&mut self, event: &UiEvent) -> Result<Event> {
        let win = event.win();
        if !self.windows.contains_key(&win) {
            return Err(GlkError::UnknownTag(win));
        }
        let window = self.window_mut(win)?;
        match event {
            UiEvent::Char { request_id, ch, .. } => {
                let ch = window.input.accept_char(win, *request_id, *ch)?;
                Ok(Event::char_input(win, ch))
            }
            UiEvent::Line {
                request_id, text, ..
            } => {
                let text = window.input.accept_line(win, *request_id, text)?;
                self.echo_line(win, &text);
                Ok(Event::line_input(win, text))
            }
        }
    }

    /// Echo accepted input into a buffer window in the input style
    fn echo_line(&mut self, win: Tag, text: &str) {
        let Some(window) = self.windows.get_mut(&win) else {
            return;
        };
        if !window.echo_line_input || window.buffer().is_none() {
            return;
        }
        window.put_styled(text, style::INPUT);
        window.put_styled("\n", style::INPUT);
        let echo = window.echo_stream;
        if let Some(echo) = echo {
            self.write_echo(echo, &format!("{text}\n"));
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::core::geometry::{Division, SplitDir, SplitMethod};
    use crate::core::library::tests::library;
    use crate::core::library::Library;
    use crate::core::{style, Tag, WindowType};
    use crate::error::GlkError;
    use crate::event::{EventType, UiEvent};

    fn with_buffer() -> (Library, Tag) {
        let mut lib = library();
        let win = lib
            .open_window(
                None,
                SplitMethod::new(SplitDir::Above, Division::Fixed),
                0,
                WindowType::TextBuffer,
                0,
            )
            .unwrap();
        (lib, win)
    }

    #[test]
    fn test_duplicate_request_fails() {
        let (mut lib, win) = with_buffer();
        lib.request_line_event(win, false, 80, None).unwrap();
        assert!(matches!(
            lib.request_char_event(win, false),
            Err(GlkError::DuplicateInputRequest(_))
        ));
        assert!(lib.window(win).unwrap().input.line_request());
    }

    #[test]
    fn test_line_event_echoes_in_input_style() {
        let (mut lib, win) = with_buffer();
        let id = lib.request_line_event(win, false, 80, None).unwrap();
        let ev = lib
            .apply_ui_event(&UiEvent::Line {
                win,
                request_id: id,
                text: "open door".to_string(),
            })
            .unwrap();
        assert_eq!(ev.event_type, EventType::LineInput);
        assert_eq!(ev.line.as_deref(), Some("open door"));

        let buffer = lib.window(win).unwrap().buffer().unwrap();
        let line = &buffer.lines()[0];
        assert_eq!(line.concat(), "open door");
        assert_eq!(line.spans[0].style, style::INPUT);
        assert!(lib.window(win).unwrap().input.is_idle());
    }

    #[test]
    fn test_no_echo_when_disabled() {
        let (mut lib, win) = with_buffer();
        lib.set_echo_line_event(win, false).unwrap();
        let id = lib.request_line_event(win, false, 80, None).unwrap();
        lib.apply_ui_event(&UiEvent::Line {
            win,
            request_id: id,
            text: "x".to_string(),
        })
        .unwrap();
        assert!(lib.window(win).unwrap().buffer().unwrap().lines().is_empty());
    }

    #[test]
    fn test_stale_event_dropped_after_reissue() {
        let (mut lib, win) = with_buffer();
        assert_eq!(lib.request_line_event(win, false, 80, None).unwrap(), 1);
        assert_eq!(lib.reissue_input(win).unwrap(), Some(2));

        let err = lib
            .apply_ui_event(&UiEvent::Line {
                win,
                request_id: 1,
                text: "look".to_string(),
            })
            .unwrap_err();
        assert!(err.is_benign());
        let input = &lib.window(win).unwrap().input;
        assert!(input.line_request());
        assert_eq!(input.request_id(), 2);
        assert!(lib.window(win).unwrap().buffer().unwrap().lines().is_empty());
    }

    #[test]
    fn test_cancel_line_synthesizes_event() {
        let (mut lib, win) = with_buffer();
        lib.request_line_event(win, true, 80, Some("tak")).unwrap();
        let ev = lib.cancel_line_event(win, "take la").unwrap().unwrap();
        assert_eq!(ev.line.as_deref(), Some("take la"));
        assert_eq!(ev.val1, 7);
        assert!(lib.cancel_line_event(win, "").unwrap().is_none());
    }

    #[test]
    fn test_char_event() {
        let (mut lib, win) = with_buffer();
        let id = lib.request_char_event(win, true).unwrap();
        let ev = lib
            .apply_ui_event(&UiEvent::Char {
                win,
                request_id: id,
                ch: 'y' as u32,
            })
            .unwrap();
        assert_eq!(ev.event_type, EventType::CharInput);
        assert_eq!(ev.val1, 'y' as u32);
    }

    #[test]
    fn test_event_for_unknown_window() {
        let (mut lib, _) = with_buffer();
        let err = lib
            .apply_ui_event(&UiEvent::Char {
                win: Tag::new(77),
                request_id: 1,
                ch: 0,
            })
            .unwrap_err();
        assert!(matches!(err, GlkError::UnknownTag(_)));
    }

    #[test]
    fn test_input_on_pair_rejected() {
        let (mut lib, win) = with_buffer();
        lib.open_window(
            Some(win),
            SplitMethod::new(SplitDir::Left, Division::Proportional),
            50,
            WindowType::TextGrid,
            0,
        )
        .unwrap();
        let pair = lib.root().unwrap();
        assert!(matches!(
            lib.request_char_event(pair, false),
            Err(GlkError::WrongWindowType(_))
        ));
    }
}
