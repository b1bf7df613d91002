use std::{
    io::{BufRead, BufReader, BufWriter, Write},
    net::{TcpStream, ToSocketAddrs},
};

use thiserror::Error;

use super::{LineTransport, transport::TransportError};

/// Replies that are followed by a dot-terminated block.
const MULTILINE_CODES: [u16; 2] = [215, 220];
const SEND_ARTICLE: u16 = 340;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("connection closed by server")]
    Closed,
    #[error("malformed reply '{0}'")]
    Malformed(String),
}

impl From<std::io::Error> for ClientError {
    fn from(e: std::io::Error) -> Self {
        ClientError::Transport(e.into())
    }
}

/// A server reply: the status line plus the block that follows multi-line replies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub code: u16,
    pub text: String,
    pub lines: Vec<String>,
}

impl Reply {
    pub fn parse(line: &str) -> Result<Self, ClientError> {
        let (code, text) = line.split_once(' ').unwrap_or((line, ""));
        let code = code
            .parse::<u16>()
            .ok()
            .filter(|c| (100..1000).contains(c))
            .ok_or_else(|| ClientError::Malformed(line.to_string()))?;

        Ok(Self {
            code,
            text: text.to_string(),
            lines: Vec::new(),
        })
    }

    pub fn status_line(&self) -> String {
        format!("{} {}", self.code, self.text)
    }

    pub fn is_success(&self) -> bool {
        self.code < 400
    }
}

/// An article to post.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Draft {
    pub newsgroups: String,
    pub subject: String,
    pub from: String,
    pub body: Vec<String>,
}

/// Client side of the protocol.
pub struct NewsClient<R: BufRead, W: Write> {
    transport: LineTransport<R, W>,
    greeting: Reply,
}

impl NewsClient<BufReader<TcpStream>, BufWriter<TcpStream>> {
    pub fn connect<A: ToSocketAddrs>(address: A) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(address)?;
        Self::new(LineTransport::from_stream(stream)?)
    }
}

impl<R: BufRead, W: Write> NewsClient<R, W> {
    /// Wraps `transport` and reads the server greeting.
    pub fn new(mut transport: LineTransport<R, W>) -> Result<Self, ClientError> {
        let line = transport.read_line()?.ok_or(ClientError::Closed)?;
        let greeting = Reply::parse(&line)?;
        Ok(Self {
            transport,
            greeting,
        })
    }

    pub fn greeting(&self) -> &Reply {
        &self.greeting
    }

    pub fn list(&mut self) -> Result<Reply, ClientError> {
        self.request("LIST")
    }

    pub fn group(&mut self, name: &str) -> Result<Reply, ClientError> {
        self.request(&format!("GROUP {name}"))
    }

    /// `id` is sent verbatim so the server decides whether it is a valid number.
    pub fn article(&mut self, id: &str) -> Result<Reply, ClientError> {
        self.request(&format!("ARTICLE {id}"))
    }

    /// Posts `draft`. A reply other than `340` to `POST` is returned as is and nothing
    /// else is sent.
    pub fn post(&mut self, draft: &Draft) -> Result<Reply, ClientError> {
        let reply = self.request("POST")?;
        if reply.code != SEND_ARTICLE {
            return Ok(reply);
        }

        self.transport
            .write_line(&format!("Newsgroups: {}", draft.newsgroups))?;
        self.transport
            .write_line(&format!("Subject: {}", draft.subject))?;
        self.transport.write_line(&format!("From: {}", draft.from))?;
        self.transport.write_line("")?;
        self.transport.write_dot_terminated_block(&draft.body)?;
        self.transport.flush()?;
        self.read_reply()
    }

    pub fn quit(mut self) -> Result<Reply, ClientError> {
        self.request("QUIT")
    }

    /// Sends a raw command line and reads its reply.
    pub fn request(&mut self, line: &str) -> Result<Reply, ClientError> {
        self.transport.write_line(line)?;
        self.transport.flush()?;
        self.read_reply()
    }

    fn read_reply(&mut self) -> Result<Reply, ClientError> {
        let line = self.transport.read_line()?.ok_or(ClientError::Closed)?;
        let mut reply = Reply::parse(&line)?;
        if MULTILINE_CODES.contains(&reply.code) {
            reply.lines = self.transport.read_dot_terminated_block()?;
        }
        Ok(reply)
    }
}
