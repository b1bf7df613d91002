use std::{
    collections::HashMap,
    io::{BufRead, Write},
    sync::Arc,
};

use log::{debug, info, warn};

use crate::{
    Command,
    command::split_line,
    protocol::{LineTransport, Response, transport::TransportError},
    storage::{ArticleId, ArticleStore},
};

const DEFAULT_SUBJECT: &str = "No subject";
const DEFAULT_FROM: &str = "anonymous";

/// Group selection of a session.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    GroupSelected(String),
}

/// Protocol state machine for one connection.
///
/// The session owns its transport and shares the store. The store lock is only taken inside
/// individual [`ArticleStore`] calls, never across a read from or write to the client.
pub struct Session<R: BufRead, W: Write> {
    transport: LineTransport<R, W>,
    store: Arc<ArticleStore>,
    state: SessionState,
}

impl<R: BufRead, W: Write> Session<R, W> {
    pub fn new(transport: LineTransport<R, W>, store: Arc<ArticleStore>) -> Self {
        Self {
            transport,
            store,
            state: SessionState::Idle,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Greets the client and serves commands until `QUIT` or end of stream.
    pub fn run(&mut self) -> Result<(), TransportError> {
        self.send(&Response::Ready)?;

        while let Some(line) = self.transport.read_line()? {
            if split_line(&line).is_none() {
                continue;
            }

            let command = match Command::try_from(line.as_str()) {
                Ok(command) => command,
                Err(e) => {
                    debug!("rejected line {line:?}: {e}");
                    self.send(&e.response())?;
                    continue;
                }
            };
            debug!("received command: {command:?}");

            let response = self.handle(command.clone())?;
            self.send(&response)?;

            if command == Command::Quit {
                break;
            }
        }
        Ok(())
    }

    /// Executes one command and returns the final reply. `POST` exchanges its intermediate
    /// `340` and reads the article from the transport before returning.
    pub fn handle(&mut self, command: Command) -> Result<Response, TransportError> {
        let response = match command {
            Command::Quit => Response::Goodbye,
            Command::List => Response::GroupList(self.store.list_groups()),
            Command::Group(name) => self.select_group(name),
            Command::Article(id) => self.article(id),
            Command::Post => self.post()?,
        };
        Ok(response)
    }

    fn select_group(&mut self, name: String) -> Response {
        if !self.store.has_group(&name) {
            return Response::NoSuchGroup;
        }

        let count = self.store.count_articles(&name);
        self.state = SessionState::GroupSelected(name.clone());
        Response::GroupSelected { count, name }
    }

    fn article(&self, id: Option<ArticleId>) -> Response {
        let Some(id) = id else {
            return Response::NoSuchArticle;
        };

        // Scoped to the selected group when there is one, otherwise global.
        let article = match &self.state {
            SessionState::GroupSelected(group) => self.store.get_article(group, id),
            SessionState::Idle => self.store.get_article_any(id),
        };
        article.map_or(Response::NoSuchArticle, Response::ArticleFollows)
    }

    fn post(&mut self) -> Result<Response, TransportError> {
        self.send(&Response::SendArticle)?;

        let mut headers = HashMap::new();
        while let Some(line) = self.transport.read_line()? {
            if line.is_empty() {
                break;
            }
            if let Some((key, value)) = parse_header(&line) {
                headers.insert(key, value);
            }
        }
        let body = self.transport.read_dot_terminated_block()?.join("\n");

        let Some(group) = headers.get("newsgroups").filter(|g| !g.is_empty()) else {
            debug!("post rejected: no Newsgroups header");
            return Ok(Response::PostingFailed("no Newsgroups header"));
        };
        let subject = headers.get("subject").map_or(DEFAULT_SUBJECT, String::as_str);
        let from = headers.get("from").map_or(DEFAULT_FROM, String::as_str);

        let Some(id) = self.store.add_article(group, subject, from, &body) else {
            warn!("post to {group} rejected: article numbers exhausted");
            return Ok(Response::PostingFailed("article numbers exhausted"));
        };
        info!("article {id} posted to {group}");
        Ok(Response::Posted(id))
    }

    fn send(&mut self, response: &Response) -> Result<(), TransportError> {
        self.transport.write_line(&response.status_line())?;
        if let Some(lines) = response.block() {
            self.transport.write_dot_terminated_block(lines)?;
        }
        self.transport.flush()
    }
}

/// Parses `Key: value` into a lowercased key and trimmed value. Lines without a colon are
/// not headers.
fn parse_header(line: &str) -> Option<(String, String)> {
    let (key, value) = line.split_once(':')?;
    Some((key.trim().to_lowercase(), value.trim().to_string()))
}
