use crossterm::event::KeyCode;

use crate::types::VerdictCategory;
use crate::view::Column;

/// A fully parsed `:` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Quit,
    Refresh,
    ClearFilters,
    SetSort(VerdictCategory),
    SetFilter(Column, String),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CommandState {
    #[default]
    Idle,
    AwaitingCommandChar,
    AwaitingSortSubcmd,
    AwaitingFilterColumn,
    /// `pattern` is `None` until the `/` separator has been typed.
    AwaitingFilterPattern {
        column: Column,
        pattern: Option<String>,
    },
}

/// What a keystroke did to the interpreter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Feed {
    /// Not a command key; the caller should handle it.
    Ignored,
    /// Consumed, command still incomplete.
    Pending,
    /// Sequence abandoned (Escape or an invalid key). Nothing to apply.
    Cancelled,
    Command(Command),
}

/// State machine for the `:q`, `:r`, `:c`, `:s<key>` and `:f<col>/<regex>`
/// command grammar. Any key that does not fit the grammar drops back to
/// `Idle` without producing a command.
#[derive(Debug, Default)]
pub struct CommandInterpreter {
    state: CommandState,
    buffer: String,
}

impl CommandInterpreter {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn state(&self) -> &CommandState {
        &self.state
    }

    pub fn is_active(&self) -> bool {
        self.state != CommandState::Idle
    }

    /// Keystrokes typed so far, for the status line.
    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn feed(&mut self, key: KeyCode) -> Feed {
        if self.state == CommandState::Idle {
            return match key {
                KeyCode::Char(':') => {
                    self.buffer.clear();
                    self.buffer.push(':');
                    self.state = CommandState::AwaitingCommandChar;
                    Feed::Pending
                }
                _ => Feed::Ignored,
            };
        }

        if key == KeyCode::Esc {
            return self.cancel();
        }

        match (std::mem::take(&mut self.state), key) {
            (CommandState::AwaitingCommandChar, KeyCode::Char(c)) => match c {
                'q' => self.finish(Command::Quit),
                'r' => self.finish(Command::Refresh),
                'c' => self.finish(Command::ClearFilters),
                's' => self.advance(c, CommandState::AwaitingSortSubcmd),
                'f' => self.advance(c, CommandState::AwaitingFilterColumn),
                _ => self.cancel(),
            },
            (CommandState::AwaitingSortSubcmd, KeyCode::Char(c)) => match sort_key(c) {
                Some(key) => self.finish(Command::SetSort(key)),
                None => self.cancel(),
            },
            (CommandState::AwaitingFilterColumn, KeyCode::Char(c)) => match Column::from_key(c) {
                Some(column) => self.advance(
                    c,
                    CommandState::AwaitingFilterPattern {
                        column,
                        pattern: None,
                    },
                ),
                None => self.cancel(),
            },
            (
                CommandState::AwaitingFilterPattern {
                    column,
                    pattern: None,
                },
                KeyCode::Char('/'),
            ) => self.advance(
                '/',
                CommandState::AwaitingFilterPattern {
                    column,
                    pattern: Some(String::new()),
                },
            ),
            (
                CommandState::AwaitingFilterPattern {
                    column,
                    pattern: Some(pattern),
                },
                key,
            ) => self.capture(column, pattern, key),
            _ => self.cancel(),
        }
    }

    fn capture(&mut self, column: Column, mut pattern: String, key: KeyCode) -> Feed {
        match key {
            KeyCode::Enter => self.finish(Command::SetFilter(column, pattern)),
            KeyCode::Char(c) => {
                pattern.push(c);
                self.advance(
                    c,
                    CommandState::AwaitingFilterPattern {
                        column,
                        pattern: Some(pattern),
                    },
                )
            }
            KeyCode::Backspace => {
                if pattern.pop().is_some() {
                    self.buffer.pop();
                }
                self.state = CommandState::AwaitingFilterPattern {
                    column,
                    pattern: Some(pattern),
                };
                Feed::Pending
            }
            _ => self.cancel(),
        }
    }

    fn advance(&mut self, typed: char, next: CommandState) -> Feed {
        self.buffer.push(typed);
        self.state = next;
        Feed::Pending
    }

    fn finish(&mut self, command: Command) -> Feed {
        self.reset();
        Feed::Command(command)
    }

    fn cancel(&mut self) -> Feed {
        tracing::debug!(buffer = %self.buffer, "command cancelled");
        self.reset();
        Feed::Cancelled
    }

    fn reset(&mut self) {
        self.state = CommandState::Idle;
        self.buffer.clear();
    }
}

fn sort_key(c: char) -> Option<VerdictCategory> {
    match c {
        'a' => Some(VerdictCategory::Ack),
        's' => Some(VerdictCategory::StaleAck),
        'n' => Some(VerdictCategory::Nack),
        'c' => Some(VerdictCategory::ConceptAck),
        _ => None,
    }
}
