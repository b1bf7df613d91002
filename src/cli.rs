//! CLI utilities for the news client.
//!
//! The utilities present in this module back the interactive terminal client: reading a
//! user command and collecting an article to post.
use std::io::{self, BufRead, Write};

use thiserror::Error;

use crate::protocol::Draft;

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("unrecognized command '{0}'")]
    Unrecognized(String),
    #[error("'{0}' requires an argument")]
    MissingArgument(&'static str),
    #[error("input closed")]
    Closed,
    #[error("prompt io error: {0}")]
    Io(#[from] io::Error),
}

/// Possible commands from a user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UserCommand {
    /// `list`
    List,
    /// `group <name>`
    Group(String),
    /// `article <id>`
    Article(String),
    /// `post`
    Post,
    /// `quit`
    Quit,
    /// Blank input
    Empty,
}

/// Prompt the user for a client command.
pub fn prompt<R, W>(mut reader: R, mut writer: W) -> Result<UserCommand, PromptError>
where
    R: BufRead,
    W: Write,
{
    write!(&mut writer, "> ")?;
    writer.flush()?;

    let s = read_input(&mut reader)?;
    parse(s.trim())
}

fn parse(input: &str) -> Result<UserCommand, PromptError> {
    if input.is_empty() {
        return Ok(UserCommand::Empty);
    }

    let (verb, arg) = input
        .split_once(char::is_whitespace)
        .map(|(v, a)| (v, a.trim()))
        .unwrap_or((input, ""));

    match verb.to_lowercase().as_str() {
        "list" => Ok(UserCommand::List),
        "post" => Ok(UserCommand::Post),
        "quit" => Ok(UserCommand::Quit),
        "group" if arg.is_empty() => Err(PromptError::MissingArgument("group")),
        "group" => Ok(UserCommand::Group(arg.to_string())),
        "article" if arg.is_empty() => Err(PromptError::MissingArgument("article")),
        "article" => Ok(UserCommand::Article(arg.to_string())),
        _ => Err(PromptError::Unrecognized(input.to_string())),
    }
}

/// Asks for the headers of a new article, then body lines until a lone `.`.
pub fn read_draft<R, W>(mut reader: R, mut writer: W) -> Result<Draft, PromptError>
where
    R: BufRead,
    W: Write,
{
    let mut ask = |label: &str, reader: &mut R| -> Result<String, PromptError> {
        write!(&mut writer, "{label}: ")?;
        writer.flush()?;
        Ok(read_input(reader)?.trim().to_string())
    };

    let newsgroups = ask("Newsgroups", &mut reader)?;
    let subject = ask("Subject", &mut reader)?;
    let from = ask("From", &mut reader)?;

    writeln!(
        &mut writer,
        "Enter body lines. Finish with a single dot on its own line."
    )?;
    writer.flush()?;

    let mut body = Vec::new();
    loop {
        let line = read_input(&mut reader)?;
        let line = line.trim_end_matches(['\r', '\n']);
        if line == "." {
            break;
        }
        body.push(line.to_string());
    }

    Ok(Draft {
        newsgroups,
        subject,
        from,
        body,
    })
}

fn read_input<R: BufRead>(reader: &mut R) -> Result<String, PromptError> {
    let mut s = String::default();
    if reader.read_line(&mut s)? == 0 {
        return Err(PromptError::Closed);
    }
    Ok(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_prints_correctly() {
        let input = b"quit\n";
        let mut output = Vec::new();

        prompt(&input[..], &mut output).unwrap();

        let output = String::from_utf8(output).expect("not valid UTF-8");
        assert_eq!("> ", output);
    }

    #[test]
    fn prompt_parses_commands() {
        let inputs = vec![
            ("list\n", UserCommand::List),
            ("LIST\n", UserCommand::List),
            ("group comp.Example\n", UserCommand::Group("comp.Example".to_string())),
            ("article 3\n", UserCommand::Article("3".to_string())),
            ("post\n", UserCommand::Post),
            ("  quit  \n", UserCommand::Quit),
            ("\n", UserCommand::Empty),
        ];

        for (input, expected) in inputs {
            let cmd = prompt(input.as_bytes(), Vec::new()).unwrap();
            assert_eq!(cmd, expected);
        }
    }

    #[test]
    #[should_panic(expected = "Unrecognized")]
    fn prompt_unrecognized_command() {
        prompt(&b"delete 1\n"[..], Vec::new()).unwrap();
    }

    #[test]
    fn prompt_requires_arguments() {
        let err = prompt(&b"group\n"[..], Vec::new()).unwrap_err();
        assert!(matches!(err, PromptError::MissingArgument("group")));
    }

    #[test]
    fn prompt_reports_closed_input() {
        let err = prompt(&b""[..], Vec::new()).unwrap_err();
        assert!(matches!(err, PromptError::Closed));
    }

    #[test]
    fn read_draft_collects_headers_and_body() {
        let input = b"alt.test\nHello\nme@example\nfirst\n.dotted\n\n.\nignored\n";
        let mut output = Vec::new();

        let draft = read_draft(&input[..], &mut output).unwrap();

        assert_eq!(
            draft,
            Draft {
                newsgroups: "alt.test".to_string(),
                subject: "Hello".to_string(),
                from: "me@example".to_string(),
                body: vec![
                    "first".to_string(),
                    ".dotted".to_string(),
                    String::new()
                ],
            }
        );
        let output = String::from_utf8(output).unwrap();
        assert!(output.starts_with("Newsgroups: Subject: From: "));
    }
}
