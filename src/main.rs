use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use std::io::{BufRead, Write};
use std::path::PathBuf;

mod analytics;
mod books;
mod builder;
mod cache;
mod calendar;
mod config;
mod dashboard;
mod error;
mod init;
mod ledger;
mod model;
mod report;
mod roster;

use analytics::{PersonFilter, Scope, mode_distribution, monthly_presence, person_summary};
use books::Catalog;
use builder::{MarkArg, Selections, SkipReason};
use calendar::{default_range, generate_mondays, today_status, write_calendar};
use config::Config;
use dashboard::Dashboard;
use model::{Slot, format_date, parse_date};

#[derive(Parser, Debug)]
#[command(author, version, about = "Frequência do Momento Áureo", long_about = None)]
struct Cli {
    #[command(flatten)]
    config: Config,

    #[command(subcommand)]
    command: Commands,
}

/// A line typed into the interactive shell.
#[derive(Parser, Debug)]
#[command(no_binary_name = true, disable_version_flag = true)]
struct ShellLine {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the data directory and any missing data file
    Init,
    /// Regenerate the calendar of meeting days (every Monday in the range)
    Calendar {
        #[arg(long, value_parser = parse_date_arg)]
        from: Option<NaiveDate>,
        #[arg(long, value_parser = parse_date_arg)]
        to: Option<NaiveDate>,
    },
    /// Check whether a date is a meeting day
    Check {
        #[arg(value_parser = parse_date_arg)]
        date: NaiveDate,
    },
    /// Tell whether today is a meeting day
    Today,
    /// List the participants of a slot
    Participants {
        #[arg(value_parser = parse_slot_arg)]
        slot: Slot,
    },
    /// Record attendance for a slot
    Submit {
        #[arg(value_parser = parse_slot_arg)]
        slot: Slot,
        /// Meeting date, today when omitted
        #[arg(short, long, value_parser = parse_date_arg)]
        date: Option<NaiveDate>,
        /// NAME=FLAGS with FLAGS from presente, ausente, presencial, online
        #[arg(short, long = "mark", required = true)]
        marks: Vec<MarkArg>,
    },
    /// Monthly presence percentage per slot
    Monthly {
        /// Every row of this year instead of only correct dates
        #[arg(long)]
        year: Option<i32>,
    },
    /// Share of each presence type
    Modes {
        #[arg(long)]
        year: Option<i32>,
    },
    /// Attendance of one person
    Person {
        name: String,
        #[arg(long, value_parser = parse_date_arg)]
        from: Option<NaiveDate>,
        #[arg(long, value_parser = parse_date_arg)]
        to: Option<NaiveDate>,
        #[arg(long, value_parser = parse_slot_arg)]
        slot: Option<Slot>,
        #[arg(long)]
        year: Option<i32>,
    },
    /// Write the aggregates to an xlsx workbook
    Export {
        #[arg(short, long)]
        out: Option<PathBuf>,
        #[arg(long)]
        year: Option<i32>,
    },
    /// Book catalog
    Books {
        #[command(subcommand)]
        command: BookCommands,
    },
    /// Read commands from stdin until `sair`
    Shell,
}

#[derive(Subcommand, Debug)]
enum BookCommands {
    List,
    Add {
        title: String,
        author: String,
        year: i32,
        /// Cover image, stored under its file name
        cover: PathBuf,
    },
}

fn parse_date_arg(s: &str) -> Result<NaiveDate, error::FrequenciaError> {
    parse_date(s)
}

fn parse_slot_arg(s: &str) -> Result<Slot, String> {
    s.trim()
        .trim_end_matches(['º', 'o'])
        .parse::<u8>()
        .ok()
        .and_then(|n| Slot::try_from(n).ok())
        .ok_or_else(|| format!("momento inválido: {s:?} (use 1 ou 2)"))
}

fn scope(year: Option<i32>) -> Scope {
    year.map(Scope::Year).unwrap_or(Scope::ValidOnly)
}

fn print_warnings(warnings: impl IntoIterator<Item = String>) {
    for warning in warnings {
        println!("Aviso: {warning}");
    }
}

fn run(command: Commands, dashboard: &mut Dashboard) -> Result<()> {
    match command {
        Commands::Init => {
            init::init_data_dir(dashboard.config())?;
            dashboard.reload_calendar();
        }
        Commands::Calendar { from, to } => {
            let (default_from, default_to) = default_range();
            let dates = generate_mondays(from.unwrap_or(default_from), to.unwrap_or(default_to));
            write_calendar(dashboard.config().calendar_file(), &dates)?;
            dashboard.reload_calendar();
            println!("Calendário gerado com {} segundas-feiras.", dates.len());
        }
        Commands::Check { date } => {
            let eligibility = dashboard.eligibility(date);
            print_warnings(eligibility.warning);
            if eligibility.eligible {
                println!("{} é um dia de Momento Áureo.", format_date(date));
            } else {
                println!("{} não é um dia de Momento Áureo.", format_date(date));
            }
        }
        Commands::Today => {
            let calendar = dashboard
                .calendar()
                .map_err(|e| anyhow::anyhow!("{e}"))?;
            let status = today_status(calendar, Local::now().date_naive());
            print!("{}", report::render_today(&status));
        }
        Commands::Participants { slot } => {
            let roster = dashboard.roster();
            print_warnings(dashboard.take_warnings());
            let members = roster::slot_members(&roster, slot);
            print!("{}", report::render_members(slot, &members));
        }
        Commands::Submit { slot, date, marks } => {
            let date = date.unwrap_or_else(|| Local::now().date_naive());
            let selections = Selections::from_marks(marks);
            let outcome = dashboard
                .submit(slot, date, &selections)
                .context("frequência não registrada")?;
            print_warnings(outcome.warnings);
            let unmarked = outcome
                .skipped
                .iter()
                .filter(|s| s.reason == SkipReason::Unset)
                .count();
            if unmarked > 0 {
                println!("{unmarked} participante(s) sem marcação não foram registrados.");
            }
            if outcome.written == 0 {
                println!("Nenhuma frequência registrada.");
            } else {
                println!(
                    "Frequência registrada com sucesso! {} registro(s) em {} ({}º momento).",
                    outcome.written,
                    format_date(outcome.date),
                    outcome.slot
                );
                if !outcome.date_valid {
                    println!("Atenção: {} não é um dia de Momento Áureo.", format_date(outcome.date));
                }
            }
        }
        Commands::Monthly { year } => {
            let records = dashboard.ledger_snapshot();
            print_warnings(dashboard.take_warnings());
            let scope = scope(year);
            print!("{}", report::render_monthly(&monthly_presence(&records, scope), scope));
        }
        Commands::Modes { year } => {
            let records = dashboard.ledger_snapshot();
            print_warnings(dashboard.take_warnings());
            let scope = scope(year);
            print!("{}", report::render_modes(&mode_distribution(&records, scope), scope));
        }
        Commands::Person {
            name,
            from,
            to,
            slot,
            year,
        } => {
            let records = dashboard.ledger_snapshot();
            print_warnings(dashboard.take_warnings());
            let filter = PersonFilter { from, to, slot };
            let summary = person_summary(&records, &name, scope(year), &filter);
            print!("{}", report::render_person(&summary, &filter));
        }
        Commands::Export { out, year } => {
            let records = dashboard.ledger_snapshot();
            print_warnings(dashboard.take_warnings());
            let scope = scope(year);
            let path = report::output_path(&dashboard.config().data_dir, out, scope);
            report::export_workbook(&path, &records, scope)
                .with_context(|| format!("exportando {}", path.display()))?;
            println!("Relatório gerado: {}", path.display());
        }
        Commands::Books { command } => {
            let config = dashboard.config();
            let catalog = Catalog::open(config.catalog_file(), config.cover_dir());
            match command {
                BookCommands::List => {
                    let books = catalog.list()?;
                    if books.is_empty() {
                        println!("Nenhum livro cadastrado.");
                    }
                    for book in books {
                        println!("- {} ({}), {} [{}]", book.title, book.author, book.year, book.cover);
                    }
                }
                BookCommands::Add {
                    title,
                    author,
                    year,
                    cover,
                } => {
                    let book = catalog.add(&title, &author, year, &cover)?;
                    println!("Livro cadastrado: {}", book.title);
                }
            }
        }
        Commands::Shell => println!("Já estamos no modo interativo."),
    }
    Ok(())
}

/// Splits a shell line on whitespace, keeping double-quoted parts together.
fn split_line(line: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut started = false;
    for c in line.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                started = true;
            }
            c if c.is_whitespace() && !quoted => {
                if started {
                    words.push(std::mem::take(&mut current));
                    started = false;
                }
            }
            c => {
                current.push(c);
                started = true;
            }
        }
    }
    if started {
        words.push(current);
    }
    words
}

fn shell(dashboard: &mut Dashboard) -> Result<()> {
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    println!("Frequência do Momento Áureo. Digite `help` para ajuda ou `sair` para encerrar.");
    loop {
        print!("frequencia> ");
        stdout.flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let words = split_line(&line);
        match words.first().map(String::as_str) {
            None => continue,
            Some("sair" | "exit" | "quit") => break,
            Some(_) => {}
        }
        match ShellLine::try_parse_from(words) {
            Ok(parsed) => {
                if let Err(e) = run(parsed.command, dashboard) {
                    log::error!("{e:#}");
                    println!("Erro: {e:#}");
                }
            }
            Err(e) => {
                let _ = e.print();
            }
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    let mut dashboard = Dashboard::new(cli.config);
    match cli.command {
        Commands::Shell => shell(&mut dashboard),
        command => run(command, &mut dashboard),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submit_line_parses_marks_and_date() {
        let line = ShellLine::try_parse_from(split_line(
            r#"submit 1 --date 06/01/2025 -m "Ana Paula=presencial" -m Bia=ausente"#,
        ))
        .unwrap();
        match line.command {
            Commands::Submit { slot, date, marks } => {
                assert_eq!(slot, Slot::First);
                assert_eq!(date, NaiveDate::from_ymd_opt(2025, 1, 6));
                assert_eq!(marks.len(), 2);
                assert_eq!(marks[0].name, "Ana Paula");
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn slot_accepts_ordinals() {
        assert_eq!(parse_slot_arg("2º").unwrap(), Slot::Second);
        assert_eq!(parse_slot_arg("1").unwrap(), Slot::First);
        assert!(parse_slot_arg("3").is_err());
    }

    #[test]
    fn split_line_keeps_quoted_words() {
        assert_eq!(
            split_line(r#"person "Ana Paula" --slot 1 """#),
            ["person", "Ana Paula", "--slot", "1", ""]
        );
        assert!(split_line("   \n").is_empty());
    }

    #[test]
    fn cli_requires_a_mark_to_submit() {
        assert!(Cli::try_parse_from(["frequencia", "submit", "1"]).is_err());
    }

    #[test]
    fn bad_mark_is_a_parse_error() {
        assert!(Cli::try_parse_from(["frequencia", "submit", "1", "-m", "Ana=talvez"]).is_err());
    }
}
