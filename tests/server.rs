use std::{
    io::{BufRead, BufReader, Write},
    net::{SocketAddr, TcpStream},
    sync::Arc,
    thread::{self, JoinHandle},
};

use tempdir::TempDir;
use usenet_sim::{
    ArticleStore,
    protocol::{
        Draft, NewsClient, ServerConfig, ServerError, Shutdown, UsenetServer, load_or_seed,
        seed_sample,
    },
    storage::Snapshot,
};

struct Running {
    addr: SocketAddr,
    store: Arc<ArticleStore>,
    shutdown: Arc<Shutdown>,
    handle: JoinHandle<Result<(), ServerError>>,
    config: ServerConfig,
}

impl Running {
    fn start(temp: &TempDir, store: ArticleStore) -> Self {
        let mut config = ServerConfig::new("127.0.0.1", 0);
        config.backup = temp.path().join("storage_backup.json");

        let server = UsenetServer::bind(&config, store).unwrap();
        let addr = server.local_addr().unwrap();
        let store = server.store();
        let shutdown = server.shutdown_handle();
        let handle = thread::spawn(move || server.listen());

        Self {
            addr,
            store,
            shutdown,
            handle,
            config,
        }
    }

    fn stop(self) -> ServerConfig {
        self.shutdown.trigger();
        self.handle.join().unwrap().unwrap();
        self.config
    }
}

fn seeded() -> ArticleStore {
    let store = ArticleStore::new();
    seed_sample(&store);
    store
}

fn draft(group: &str, subject: &str, body: &[&str]) -> Draft {
    Draft {
        newsgroups: group.to_string(),
        subject: subject.to_string(),
        from: "tester@example".to_string(),
        body: body.iter().map(|l| l.to_string()).collect(),
    }
}

#[test]
fn seeded_server_walkthrough() {
    let temp = TempDir::new("server").unwrap();
    let server = Running::start(&temp, seeded());
    let mut client = NewsClient::connect(server.addr).unwrap();

    assert_eq!(
        client.greeting().status_line(),
        "200 Usenet-simulator ready"
    );

    let list = client.list().unwrap();
    assert_eq!(list.code, 215);
    assert!(list.lines.contains(&"comp.example".to_string()));

    let group = client.group("comp.example").unwrap();
    assert_eq!(group.status_line(), "211 1 comp.example");

    let article = client.article("1").unwrap();
    assert_eq!(article.code, 220);
    assert_eq!(
        article.lines,
        vec![
            "Subject: Welcome",
            "From: admin@example",
            "",
            "This is a sample article."
        ]
    );

    assert_eq!(client.quit().unwrap().code, 205);
    server.stop();
}

#[test]
fn error_replies() {
    let temp = TempDir::new("server").unwrap();
    let server = Running::start(&temp, seeded());
    let mut client = NewsClient::connect(server.addr).unwrap();

    assert_eq!(client.group("unknown.group").unwrap().code, 411);
    assert_eq!(client.request("GROUP").unwrap().code, 501);
    assert_eq!(client.article("abc").unwrap().code, 501);
    assert_eq!(client.article("4242").unwrap().code, 423);
    assert_eq!(client.request("NEWNEWS").unwrap().code, 500);

    server.stop();
}

#[test]
fn posted_article_is_readable_without_group() {
    let temp = TempDir::new("server").unwrap();
    let server = Running::start(&temp, seeded());
    let mut client = NewsClient::connect(server.addr).unwrap();

    let before: usize = client
        .group("comp.example")
        .unwrap()
        .text
        .split(' ')
        .next()
        .unwrap()
        .parse()
        .unwrap();

    let mut other = NewsClient::connect(server.addr).unwrap();
    let posted = other
        .post(&draft("comp.example", "Dots", &[".", "..x", "plain"]))
        .unwrap();
    assert_eq!(posted.status_line(), "240 Article posted, assigned number 2");

    let after = client.group("comp.example").unwrap();
    assert_eq!(after.status_line(), format!("211 {} comp.example", before + 1));

    let article = other.article("2").unwrap();
    assert_eq!(
        article.lines,
        vec![
            "Subject: Dots",
            "From: tester@example",
            "",
            ".",
            "..x",
            "plain"
        ]
    );

    server.stop();
}

#[test]
fn post_without_newsgroups_changes_nothing() {
    let temp = TempDir::new("server").unwrap();
    let server = Running::start(&temp, seeded());
    let mut client = NewsClient::connect(server.addr).unwrap();

    let reply = client.post(&draft("", "nowhere", &["body"])).unwrap();
    assert_eq!(reply.code, 441);
    assert_eq!(server.store.len(), 1);

    server.stop();
}

#[test]
fn raw_post_creates_group() {
    let temp = TempDir::new("server").unwrap();
    let server = Running::start(&temp, seeded());

    let stream = TcpStream::connect(server.addr).unwrap();
    let mut reader = BufReader::new(stream.try_clone().unwrap());
    let mut writer = stream;
    let mut line = String::new();
    reader.read_line(&mut line).unwrap();

    writer
        .write_all(b"post\r\nNewsgroups: alt.fresh\r\n\r\nhello\r\n.\r\ngroup alt.fresh\r\nquit\r\n")
        .unwrap();

    let replies: Vec<String> = reader
        .lines()
        .map(|l| l.unwrap().trim_end().to_string())
        .collect();
    assert_eq!(
        replies,
        vec![
            "340 Send article; end with <CR-LF>.<CR-LF>",
            "240 Article posted, assigned number 2",
            "211 1 alt.fresh",
            "205 Goodbye",
        ]
    );
    assert!(server.store.has_group("alt.fresh"));

    server.stop();
}

#[test]
fn concurrent_posts_get_distinct_contiguous_ids() {
    let temp = TempDir::new("server").unwrap();
    let server = Running::start(&temp, ArticleStore::new());

    let posters: Vec<_> = (0..8)
        .map(|t| {
            let addr = server.addr;
            thread::spawn(move || {
                let mut client = NewsClient::connect(addr).unwrap();
                let ids: Vec<u64> = (0..10)
                    .map(|i| {
                        let reply = client
                            .post(&draft("load.test", &format!("{t}-{i}"), &["x"]))
                            .unwrap();
                        assert_eq!(reply.code, 240);
                        reply.text.rsplit(' ').next().unwrap().parse().unwrap()
                    })
                    .collect();
                client.quit().unwrap();
                ids
            })
        })
        .collect();

    let mut ids: Vec<u64> = posters
        .into_iter()
        .flat_map(|p| p.join().unwrap())
        .collect();
    ids.sort_unstable();

    assert_eq!(ids, (1..=80).collect::<Vec<_>>());
    assert_eq!(server.store.count_articles("load.test"), 80);

    server.stop();
}

#[test]
fn shutdown_closes_idle_sessions_and_backs_up() {
    let temp = TempDir::new("server").unwrap();
    let server = Running::start(&temp, seeded());

    let mut idle = NewsClient::connect(server.addr).unwrap();
    idle.post(&draft("comp.example", "kept", &["saved"])).unwrap();

    let config = server.stop();
    assert!(idle.list().is_err());

    let snapshot = Snapshot::load(&config.backup).unwrap().unwrap();
    assert_eq!(snapshot.articles.len(), 2);
    assert_eq!(snapshot.next_id, 3);

    let restored = load_or_seed(&config.backup);
    assert_eq!(restored.get_article("comp.example", 2).unwrap().subject, "kept");
    assert_eq!(
        restored.add_article("comp.example", "next", "x", ""),
        Some(3)
    );
}
