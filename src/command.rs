//! Protocol command parsing.
//!
//! This module defines the [`Command`] enum, the parsed form of one client line. A line is
//! split on its first run of whitespace into a verb and an argument; the verb is matched
//! case-insensitively and the argument is trimmed but otherwise kept as sent (group names are
//! case-sensitive).
//!
//! Lines that cannot become a command produce a [`CommandError`], which maps straight to the
//! `500`/`501` reply the session sends back.
//!
//! # Example
//! ```rust
//! use usenet_sim::Command;
//!
//! let cmd: Command = "group comp.example".try_into().unwrap();
//! assert_eq!(cmd, Command::Group("comp.example".to_string()));
//! ```
use thiserror::Error;

use crate::{protocol::Response, storage::ArticleId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("unrecognized command '{0}'")]
    UnrecognizedCommand(String),

    #[error("missing group name")]
    MissingGroup,

    #[error("missing article id")]
    MissingArticleId,

    #[error("invalid article id '{0}'")]
    InvalidArticleId(String),

    #[error("no command provided")]
    Empty,
}

impl CommandError {
    /// Reply sent to the client for this error.
    pub fn response(&self) -> Response {
        match self {
            CommandError::UnrecognizedCommand(_) | CommandError::Empty => {
                Response::UnknownCommand
            }
            CommandError::MissingGroup => Response::SyntaxError("Missing group name"),
            CommandError::MissingArticleId => Response::SyntaxError("Missing article id"),
            CommandError::InvalidArticleId(_) => Response::SyntaxError("Invalid article id"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Quit,
    List,
    Group(String),
    /// Any integer parses. Integers outside the id range become `None`, which never
    /// matches an article.
    Article(Option<ArticleId>),
    Post,
}

impl Command {
    pub fn verb(&self) -> &'static str {
        match self {
            Command::Quit => "QUIT",
            Command::List => "LIST",
            Command::Group(_) => "GROUP",
            Command::Article(_) => "ARTICLE",
            Command::Post => "POST",
        }
    }
}

/// Splits a line into its upper-cased verb and trimmed argument.
pub fn split_line(line: &str) -> Option<(String, &str)> {
    let line = line.trim_start();
    if line.is_empty() {
        return None;
    }

    let (verb, arg) = line
        .split_once(char::is_whitespace)
        .unwrap_or((line, ""));
    Some((verb.to_uppercase(), arg.trim()))
}

fn parse_article_id(arg: &str) -> Result<Option<ArticleId>, CommandError> {
    let digits = arg.strip_prefix(['-', '+']).unwrap_or(arg);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CommandError::InvalidArticleId(arg.to_string()));
    }
    if arg.starts_with('-') {
        return Ok(None);
    }
    Ok(arg.parse::<ArticleId>().ok())
}

impl TryFrom<&str> for Command {
    type Error = CommandError;

    fn try_from(line: &str) -> Result<Self, Self::Error> {
        let (verb, arg) = split_line(line).ok_or(CommandError::Empty)?;

        match verb.as_str() {
            "QUIT" => Ok(Command::Quit),
            "LIST" => Ok(Command::List),
            "POST" => Ok(Command::Post),
            "GROUP" if arg.is_empty() => Err(CommandError::MissingGroup),
            "GROUP" => Ok(Command::Group(arg.to_string())),
            "ARTICLE" if arg.is_empty() => Err(CommandError::MissingArticleId),
            "ARTICLE" => parse_article_id(arg).map(Command::Article),
            _ => Err(CommandError::UnrecognizedCommand(verb)),
        }
    }
}
