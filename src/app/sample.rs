//! A small interactive program
//!
//! Exercises the library the way a story interpreter does: a one-row status
//! grid above the main buffer window, a read-eval loop, save and restore
//! through prompted file references, and an optional timer.
//!
//! Commands: `clear`, `save`, `load`, `timer <ms>`, `quit`. Anything else
//! is echoed back.

use serde_json::json;

use crate::core::{
    style, usage, Archive, ArchiveError, Division, FileMode, SplitDir, SplitMethod, Tag, WindowType,
};
use crate::error::{GlkError, Result};
use crate::event::{EventType, Session};

const MAX_LINE: usize = 256;

/// Windows and counters of the running program
#[derive(Debug)]
struct Game {
    main: Tag,
    status: Tag,
    turn: u64,
    ticks: u64,
}

impl Game {
    fn open(session: &mut Session) -> Result<Self> {
        let main = session.open_window(
            None,
            SplitMethod::new(SplitDir::Above, Division::Fixed),
            0,
            WindowType::TextBuffer,
            1,
        )?;
        let status = session.open_window(
            Some(main),
            SplitMethod::new(SplitDir::Above, Division::Fixed),
            1,
            WindowType::TextGrid,
            2,
        )?;
        let stream = session.window_stream(main)?;
        session.set_current_stream(stream)?;
        Ok(Self {
            main,
            status,
            turn: 0,
            ticks: 0,
        })
    }

    fn draw_status(&self, session: &mut Session) -> Result<()> {
        let stream = session
            .window_stream(self.status)?
            .ok_or_else(|| GlkError::InvalidOperation("status window has no stream".into()))?;
        session.clear_window(self.status)?;
        let mut line = format!(" Turn {}", self.turn);
        if self.ticks > 0 {
            line.push_str(&format!("   Ticks {}", self.ticks));
        }
        session.put_string_stream(stream, &line)
    }

    fn say(&self, session: &mut Session, text: &str) {
        session.put_string(text);
        session.put_string("\n");
    }

    fn save(&self, session: &mut Session) -> Result<()> {
        let Some(fref) = session.fileref_create_by_prompt(usage::SAVED_GAME, FileMode::Write, 0)?
        else {
            self.say(session, "Canceled.");
            return Ok(());
        };
        let path = session.fileref(fref)?.pathname();
        session.fileref_destroy(fref)?;

        let extra = json!({
            "main": self.main,
            "status": self.status,
            "turn": self.turn,
        });
        let archive = session.to_archive(extra);
        let written = match path.parent() {
            Some(dir) => std::fs::create_dir_all(dir).map_err(ArchiveError::from),
            None => Ok(()),
        }
        .and_then(|()| archive.save(&path));
        match written {
            Ok(()) => self.say(session, "Saved."),
            Err(e) => {
                tracing::warn!("save to {} failed: {}", path.display(), e);
                self.say(session, "Save failed.");
            }
        }
        Ok(())
    }

    fn load(&mut self, session: &mut Session) -> Result<()> {
        let Some(fref) = session.fileref_create_by_prompt(usage::SAVED_GAME, FileMode::Read, 0)?
        else {
            self.say(session, "No such saved game.");
            return Ok(());
        };
        let path = session.fileref(fref)?.pathname();
        session.fileref_destroy(fref)?;

        let restored = Archive::load(&path).and_then(|archive| {
            let extra = archive.extra.clone();
            session.restore(archive)?;
            Ok(extra)
        });
        match restored {
            Ok(extra) => {
                let tag = |key: &str, fallback: Tag| {
                    extra[key]
                        .as_u64()
                        .and_then(|raw| u32::try_from(raw).ok())
                        .map_or(fallback, Tag::new)
                };
                self.main = tag("main", self.main);
                self.status = tag("status", self.status);
                self.turn = extra["turn"].as_u64().unwrap_or(self.turn);
                self.say(session, "Restored.");
            }
            Err(e) => {
                tracing::warn!("restore from {} failed: {}", path.display(), e);
                self.say(session, "Restore failed.");
            }
        }
        Ok(())
    }

    /// Wait for the next line typed into the main window
    fn read_line(&mut self, session: &mut Session) -> Result<String> {
        self.draw_status(session)?;
        session.request_line_event(self.main, true, MAX_LINE, None)?;
        loop {
            let event = session.select()?;
            match event.event_type {
                EventType::LineInput if event.win == Some(self.main) => {
                    return Ok(event.line.unwrap_or_default());
                }
                EventType::Timer => {
                    self.ticks += 1;
                    self.draw_status(session)?;
                }
                EventType::Arrange => {
                    tracing::debug!("rearranged to {:?}", session.bounds());
                }
                _ => {}
            }
        }
    }
}

/// Run the program until the player quits or the host asks to exit
pub fn run(session: &mut Session) -> Result<()> {
    let mut game = Game::open(session)?;
    session.set_style(style::HEADER);
    game.say(session, "Glk Bridge");
    session.set_style(style::NORMAL);
    game.say(session, "Type something. 'quit' to stop.");

    loop {
        let line = game.read_line(session)?;
        game.turn += 1;
        let command = line.trim().to_lowercase();
        let mut words = command.split_whitespace();
        match (words.next(), words.next()) {
            (Some("quit"), _) => {
                game.say(session, "Goodbye.");
                game.draw_status(session)?;
                return Ok(());
            }
            (Some("clear"), _) => session.clear_window(game.main)?,
            (Some("save"), _) => game.save(session)?,
            (Some("load"), _) => game.load(session)?,
            (Some("timer"), Some(ms)) => match ms.parse::<u32>() {
                Ok(ms) => {
                    session.request_timer_events(ms);
                    game.say(session, if ms == 0 { "Timer off." } else { "Timer on." });
                }
                Err(_) => game.say(session, "Usage: timer <milliseconds>"),
            },
            (None, _) => game.say(session, "Say again?"),
            _ => {
                session.set_style(style::EMPHASIZED);
                game.say(session, &format!("You said: {}", line.trim()));
                session.set_style(style::NORMAL);
            }
        }
    }
}
