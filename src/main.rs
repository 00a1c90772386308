use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Input, Select};
use tracing_subscriber::EnvFilter;

mod aggregate;
mod api;
mod client;
mod export;
mod models;
mod session;

use crate::aggregate::SessionExpired;
use crate::client::{ApiClient, ClientConfig, FetchError};
use crate::models::{ResultRecord, Section, SectionKind, StudentIndex};
use crate::session::Session;

#[derive(Parser)]
#[command(name = "portfolio-export")]
#[command(
    about = "Export peer competency evaluations from a portfolio API into a wide CSV",
    long_about = None
)]
struct Cli {
    /// Base URL of the portfolio API
    #[arg(long, default_value = client::DEFAULT_BASE_URL)]
    base_url: String,

    /// Output file for full-cohort exports
    #[arg(long, default_value = "results.csv")]
    out: PathBuf,

    /// Append the reviewer's name to each exported evaluation
    #[arg(long)]
    include_reviewer: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    tokio::spawn(async {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("\nInterrupted. Goodbye!");
            std::process::exit(130);
        }
    });

    let token = prompt_token()?;
    let config = ClientConfig {
        base_url: cli.base_url.clone(),
        ..ClientConfig::default()
    };
    let mut session = Session::new(ApiClient::new(config, token)?);

    loop {
        let Some(students) = choose_students(&mut session).await? else {
            println!("Goodbye!");
            return Ok(());
        };

        if students.is_empty() {
            println!("No students found.");
            continue;
        }

        println!("\nStudents ({}):", students.len());
        for student in students.iter() {
            if student.has_access {
                println!("- {}", student.name);
            } else {
                println!("- {} (no shared portfolio)", student.name);
            }
        }

        run_output_menu(&mut session, &students, &cli).await?;
    }
}

fn prompt_token() -> Result<String> {
    let token: String = Input::with_theme(&ColorfulTheme::default())
        .with_prompt("Bearer token")
        .interact_text()?;
    Ok(token.trim().to_string())
}

fn renew_token(session: &mut Session) -> Result<()> {
    println!("Token expired, please enter a new one.");
    session.renew_token(prompt_token()?);
    Ok(())
}

/// Top-level fetching menu. Returns None when the user quits. Token expiry
/// is handled here: re-prompt and stay in the menu.
async fn choose_students(session: &mut Session) -> Result<Option<StudentIndex>> {
    loop {
        let choice = Select::with_theme(&ColorfulTheme::default())
            .with_prompt("Choose student fetching method")
            .items(&[
                "All students with a shared collection",
                "Students from a section roster",
                "Quit",
            ])
            .default(0)
            .interact()?;

        let fetched = match choice {
            0 => api::fetch_shared_students(&session.client).await,
            1 => match choose_section(session).await? {
                Some(section_id) => api::fetch_roster(&session.client, section_id).await,
                None => continue,
            },
            _ => return Ok(None),
        };

        match fetched {
            Ok(students) => return Ok(Some(students)),
            Err(FetchError::AuthExpired) => renew_token(session)?,
            Err(FetchError::NotFound) => println!("Nothing found for this selection."),
            Err(FetchError::Failed) => println!("The server is not responding, try again later."),
        }
    }
}

/// Pick a section from the cached catalog, coaching groups first, then
/// guilds, then the rest. Falls back to manual id entry when the catalog
/// cannot be fetched. Returns None to go back to the method menu.
async fn choose_section(session: &mut Session) -> Result<Option<i64>> {
    let sections = loop {
        match session.sections().await {
            Ok(sections) => break sections,
            Err(FetchError::AuthExpired) => renew_token(session)?,
            Err(_) => {
                println!("Could not load the section catalog.");
                let id: i64 = Input::with_theme(&ColorfulTheme::default())
                    .with_prompt("Enter a section id")
                    .interact_text()?;
                return Ok(Some(id));
            }
        }
    };

    if sections.is_empty() {
        println!("No sections available.");
        return Ok(None);
    }

    let mut ordered: Vec<&Section> = Vec::new();
    for kind in [SectionKind::Coaching, SectionKind::Guild, SectionKind::Other] {
        ordered.extend(sections.iter().filter(|s| s.kind() == kind));
    }

    let mut labels: Vec<String> = ordered
        .iter()
        .map(|section| match section.kind() {
            SectionKind::Coaching => format!("[coaching] {}", section.name),
            SectionKind::Guild => format!("[guild] {}", section.name),
            SectionKind::Other => section.name.clone(),
        })
        .collect();
    labels.push("Back".to_string());

    let choice = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Choose a section")
        .items(&labels)
        .default(0)
        .interact()?;

    if choice == ordered.len() {
        return Ok(None);
    }
    Ok(Some(ordered[choice].id))
}

async fn run_output_menu(
    session: &mut Session,
    students: &StudentIndex,
    cli: &Cli,
) -> Result<()> {
    let choice = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Choose output option")
        .items(&[
            "Single student",
            "All students (export to CSV)",
            "Back to main menu",
        ])
        .default(1)
        .interact()?;

    match choice {
        0 => show_single_student(session, students, cli).await,
        1 => export_all_students(session, students, cli).await,
        _ => Ok(()),
    }
}

async fn show_single_student(
    session: &mut Session,
    students: &StudentIndex,
    cli: &Cli,
) -> Result<()> {
    let name: String = Input::with_theme(&ColorfulTheme::default())
        .with_prompt("Student name exactly as shown")
        .interact_text()?;

    let Some(student) = students.get(name.trim()) else {
        println!("Student not found.");
        return Ok(());
    };

    match aggregate::collect_results(&session.client, student, cli.include_reviewer).await {
        Ok(records) => print_student_summary(&student.name, &records),
        Err(SessionExpired) => println!("Token expired, returning to main menu."),
    }
    Ok(())
}

/// Collect every student sequentially and write one CSV afterwards. Token
/// expiry anywhere halts the export; nothing is written in that case, so a
/// partial run never overwrites a previous export.
async fn export_all_students(
    session: &mut Session,
    students: &StudentIndex,
    cli: &Cli,
) -> Result<()> {
    let mut all_records = Vec::new();

    for student in students.iter() {
        println!("Processing {}...", student.name);
        match aggregate::collect_results(&session.client, student, cli.include_reviewer).await {
            Ok(records) => all_records.extend(records),
            Err(SessionExpired) => {
                println!("Token expired, returning to main menu.");
                return Ok(());
            }
        }
    }

    if export::export_csv(&all_records, &cli.out, export::GOAL_ORDER)? {
        println!("CSV exported to {}", cli.out.display());
    } else {
        println!("No data to export.");
    }
    Ok(())
}

/// Per-goal console summary for one student, in aggregation order.
fn print_student_summary(name: &str, records: &[ResultRecord]) {
    println!("\n{name}");
    if records.is_empty() {
        println!("No evaluations found.");
        return;
    }

    let mut goals: Vec<&str> = Vec::new();
    for record in records {
        if !goals.contains(&record.goal_name.as_str()) {
            goals.push(&record.goal_name);
        }
    }

    for goal in goals {
        let labels: Vec<String> = records
            .iter()
            .filter(|record| record.goal_name == goal)
            .map(export::cell_label)
            .collect();
        println!("{goal}: {}", labels.join(", "));
    }
}
