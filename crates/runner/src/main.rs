#![forbid(unsafe_code)]

use ladder_storage::{migrations, AppliedStep, MigrationStore, StoreError};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;

const DEFAULT_DB: &str = "ladder.db";

fn usage() -> &'static str {
    "ladder_runner — apply and revert schema revisions against a SQLite database\n\n\
USAGE:\n\
  ladder_runner [--db PATH] status [--json]\n\
  ladder_runner [--db PATH] history\n\
  ladder_runner [--db PATH] upgrade [--to REV]\n\
  ladder_runner [--db PATH] downgrade [--to REV | --steps N]\n\n\
NOTES:\n\
  - `upgrade` goes to head unless `--to` names a revision on the chain.\n\
  - `downgrade` reverts one step unless `--to` or `--steps` says otherwise.\n\
  - The database defaults to `ladder.db` in the working directory.\n"
}

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Status { json: bool },
    History,
    Upgrade { to: Option<String> },
    Downgrade { to: Option<String>, steps: usize },
}

#[derive(Debug, PartialEq, Eq)]
struct Args {
    db: PathBuf,
    command: Command,
}

fn parse_args(argv: &[String]) -> Result<Args, String> {
    let mut db: Option<String> = None;
    let mut command: Option<&str> = None;
    let mut json = false;
    let mut to: Option<String> = None;
    let mut steps: Option<usize> = None;

    let mut index = 0;
    while index < argv.len() {
        let token = argv[index].as_str();
        match token {
            "--db" => {
                index += 1;
                let value = argv
                    .get(index)
                    .ok_or_else(|| "--db requires a path".to_string())?;
                db = Some(value.clone());
            }
            "--json" => json = true,
            "--to" => {
                index += 1;
                let value = argv
                    .get(index)
                    .ok_or_else(|| "--to requires a revision".to_string())?;
                to = Some(value.clone());
            }
            "--steps" => {
                index += 1;
                let value = argv
                    .get(index)
                    .ok_or_else(|| "--steps requires a count".to_string())?;
                let count = value
                    .parse::<usize>()
                    .map_err(|_| format!("invalid --steps value '{value}'"))?;
                if count == 0 {
                    return Err("--steps must be at least 1".to_string());
                }
                steps = Some(count);
            }
            "status" | "history" | "upgrade" | "downgrade" => {
                if command.is_some() {
                    return Err(format!("unexpected extra command '{token}'"));
                }
                command = Some(token);
            }
            other => return Err(format!("unknown argument '{other}'")),
        }
        index += 1;
    }

    let db = PathBuf::from(db.unwrap_or_else(|| DEFAULT_DB.to_string()));
    let command = match command.ok_or_else(|| "missing command".to_string())? {
        "status" => {
            if to.is_some() || steps.is_some() {
                return Err("status takes no --to/--steps".to_string());
            }
            Command::Status { json }
        }
        "history" => {
            if json || to.is_some() || steps.is_some() {
                return Err("history takes no flags".to_string());
            }
            Command::History
        }
        "upgrade" => {
            if json || steps.is_some() {
                return Err("upgrade takes only --to".to_string());
            }
            Command::Upgrade { to }
        }
        "downgrade" => {
            if json {
                return Err("downgrade takes no --json".to_string());
            }
            if to.is_some() && steps.is_some() {
                return Err("use either --to or --steps, not both".to_string());
            }
            Command::Downgrade {
                to,
                steps: steps.unwrap_or(1),
            }
        }
        _ => unreachable!(),
    };
    Ok(Args { db, command })
}

#[derive(Debug, Serialize)]
struct StatusReport {
    current: Option<String>,
    head: Option<String>,
    pending: usize,
}

fn report_steps(verb: &str, steps: &[AppliedStep]) {
    if steps.is_empty() {
        println!("nothing to {verb}");
        return;
    }
    for step in steps {
        println!("{verb} {} — {}", step.revision, step.title);
    }
}

fn run(args: Args) -> Result<(), StoreError> {
    let registry = migrations::registry()?;
    let mut store = MigrationStore::open(&args.db)?;
    match args.command {
        Command::Status { json } => {
            let status = store.status(&registry)?;
            if json {
                let report = StatusReport {
                    current: status.current,
                    head: status.head,
                    pending: status.pending,
                };
                println!(
                    "{}",
                    serde_json::to_string_pretty(&report)
                        .map_err(|_| StoreError::InvalidInput("status is not serializable"))?
                );
            } else {
                println!(
                    "current: {}",
                    status.current.as_deref().unwrap_or("(base)")
                );
                println!("head:    {}", status.head.as_deref().unwrap_or("(none)"));
                println!("pending: {}", status.pending);
            }
        }
        Command::History => {
            let rows = store.history()?;
            if rows.is_empty() {
                println!("no revisions applied");
            }
            for row in rows {
                println!("{}  applied_at_ms={}", row.revision, row.applied_at_ms);
            }
        }
        Command::Upgrade { to } => {
            let applied = store.upgrade(&registry, to.as_deref())?;
            report_steps("applied", &applied);
        }
        Command::Downgrade { to, steps } => {
            let reverted = match to {
                Some(target) => store.downgrade(&registry, Some(&target))?,
                None => store.downgrade_steps(&registry, steps)?,
            };
            report_steps("reverted", &reverted);
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let argv: Vec<String> = std::env::args().skip(1).collect();
    let args = match parse_args(&argv) {
        Ok(args) => args,
        Err(message) => {
            eprintln!("{message}\n\n{}", usage());
            return ExitCode::from(2);
        }
    };
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("ladder_runner: {err}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(tokens: &[&str]) -> Vec<String> {
        tokens.iter().map(|token| token.to_string()).collect()
    }

    #[test]
    fn parses_default_db_and_upgrade() {
        let args = parse_args(&argv(&["upgrade"])).expect("upgrade must parse");
        assert_eq!(args.db, PathBuf::from(DEFAULT_DB));
        assert_eq!(args.command, Command::Upgrade { to: None });
    }

    #[test]
    fn parses_db_flag_and_targets() {
        let args = parse_args(&argv(&[
            "--db",
            "/tmp/app.db",
            "upgrade",
            "--to",
            "84b29e2ae377",
        ]))
        .expect("upgrade --to must parse");
        assert_eq!(args.db, PathBuf::from("/tmp/app.db"));
        assert_eq!(
            args.command,
            Command::Upgrade {
                to: Some("84b29e2ae377".to_string())
            }
        );
    }

    #[test]
    fn downgrade_defaults_to_one_step() {
        let args = parse_args(&argv(&["downgrade"])).expect("downgrade must parse");
        assert_eq!(
            args.command,
            Command::Downgrade { to: None, steps: 1 }
        );

        let args =
            parse_args(&argv(&["downgrade", "--steps", "3"])).expect("--steps must parse");
        assert_eq!(
            args.command,
            Command::Downgrade { to: None, steps: 3 }
        );
    }

    #[test]
    fn rejects_bad_invocations() {
        assert!(parse_args(&argv(&[])).is_err());
        assert!(parse_args(&argv(&["upgrade", "--steps", "2"])).is_err());
        assert!(parse_args(&argv(&["downgrade", "--to", "r1", "--steps", "2"])).is_err());
        assert!(parse_args(&argv(&["downgrade", "--steps", "0"])).is_err());
        assert!(parse_args(&argv(&["status", "extra"])).is_err());
        assert!(parse_args(&argv(&["--db"])).is_err());
    }

    #[test]
    fn status_accepts_json() {
        let args = parse_args(&argv(&["status", "--json"])).expect("status --json must parse");
        assert_eq!(args.command, Command::Status { json: true });
    }
}
