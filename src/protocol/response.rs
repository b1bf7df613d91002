use crate::storage::{Article, ArticleId};

/// Every reply the server can send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Ready,
    Goodbye,
    GroupSelected { count: usize, name: String },
    GroupList(Vec<String>),
    ArticleFollows(Article),
    Posted(ArticleId),
    SendArticle,
    NoSuchGroup,
    NoSuchArticle,
    PostingFailed(&'static str),
    UnknownCommand,
    SyntaxError(&'static str),
}

impl Response {
    pub fn code(&self) -> u16 {
        match self {
            Response::Ready => 200,
            Response::Goodbye => 205,
            Response::GroupSelected { .. } => 211,
            Response::GroupList(_) => 215,
            Response::ArticleFollows(_) => 220,
            Response::Posted(_) => 240,
            Response::SendArticle => 340,
            Response::NoSuchGroup => 411,
            Response::NoSuchArticle => 423,
            Response::PostingFailed(_) => 441,
            Response::UnknownCommand => 500,
            Response::SyntaxError(_) => 501,
        }
    }

    /// First line of the reply, code included.
    pub fn status_line(&self) -> String {
        let text = match self {
            Response::Ready => "Usenet-simulator ready".to_string(),
            Response::Goodbye => "Goodbye".to_string(),
            Response::GroupSelected { count, name } => format!("{count} {name}"),
            Response::GroupList(_) => "list of newsgroups follows".to_string(),
            Response::ArticleFollows(_) => "Article follows".to_string(),
            Response::Posted(id) => format!("Article posted, assigned number {id}"),
            Response::SendArticle => "Send article; end with <CR-LF>.<CR-LF>".to_string(),
            Response::NoSuchGroup => "No such group".to_string(),
            Response::NoSuchArticle => "No such article number here".to_string(),
            Response::PostingFailed(reason) => format!("Posting failed: {reason}"),
            Response::UnknownCommand => "Unknown command".to_string(),
            Response::SyntaxError(reason) => reason.to_string(),
        };
        format!("{} {text}", self.code())
    }

    /// Lines of the dot-terminated block following the status line, if any.
    /// Lines are returned unstuffed.
    pub fn block(&self) -> Option<Vec<String>> {
        match self {
            Response::GroupList(groups) => Some(groups.clone()),
            Response::ArticleFollows(article) => {
                let mut lines = vec![
                    format!("Subject: {}", article.subject),
                    format!("From: {}", article.from),
                    String::new(),
                ];
                lines.extend(article.body_lines().map(str::to_string));
                Some(lines)
            }
            _ => None,
        }
    }
}
