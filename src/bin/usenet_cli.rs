use std::{
    error::Error,
    io::{self, Write},
};

use clap::Parser;
use usenet_sim::{
    UserCommand,
    cli::PromptError,
    protocol::{DEFAULT_PORT, NewsClient, Reply},
    prompt, read_draft,
};

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Server host
    #[arg(long, default_value = "127.0.0.1")]
    host: String,
    /// Server port
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,
}

fn main() -> Result<(), Box<dyn Error>> {
    // Initialize env_logger; For logging to STDOUT/STDERR
    env_logger::init();

    let cli = Cli::parse();
    let mut client = NewsClient::connect((cli.host.as_str(), cli.port))?;
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{}", client.greeting().status_line())?;
    writeln!(stdout, "Commands: list, group <name>, article <id>, post, quit")?;

    loop {
        let cmd = match prompt(io::stdin().lock(), &mut stdout) {
            Ok(cmd) => cmd,
            Err(PromptError::Closed) => UserCommand::Quit,
            Err(PromptError::Io(e)) => return Err(e.into()),
            Err(e) => {
                eprintln!("error: {e}");
                continue;
            }
        };

        let reply = match cmd {
            UserCommand::Empty => continue,
            UserCommand::Quit => {
                print_reply(&mut stdout, &client.quit()?)?;
                break;
            }
            UserCommand::List => client.list()?,
            UserCommand::Group(name) => client.group(&name)?,
            UserCommand::Article(id) => client.article(&id)?,
            UserCommand::Post => {
                let draft = read_draft(io::stdin().lock(), &mut stdout)?;
                client.post(&draft)?
            }
        };
        print_reply(&mut stdout, &reply)?;
    }

    Ok(())
}

fn print_reply<W: Write>(out: &mut W, reply: &Reply) -> io::Result<()> {
    writeln!(out, "{}", reply.status_line())?;
    for line in &reply.lines {
        writeln!(out, "{line}")?;
    }
    out.flush()
}
