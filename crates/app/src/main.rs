use std::fmt;
use std::path::PathBuf;

use exam_core::model::{AssessmentOutcome, CourseId, ModuleId, OptionId, SessionResult};
use exam_core::{Clock, SessionPhase};
use services::proctoring::{PageVisibility, VisibilitySender, visibility_channel};
use services::{AssessmentLauncher, ProctorSources, SessionController, SessionSnapshot};
use storage::repository::Storage;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    Missing { flag: &'static str, env: &'static str },
    UnknownArg(String),
    InvalidId { flag: &'static str, raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::Missing { flag, env } => write!(f, "{flag} (or {env}) is required"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidId { flag, raw } => write!(f, "invalid {flag} value: {raw:?}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- --catalog <path> --course <id> --module <id>");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  PROCTOR_CATALOG, PROCTOR_COURSE_ID, PROCTOR_MODULE_ID, RUST_LOG");
    eprintln!();
    eprintln!("Commands while the assessment runs:");
    eprintln!("  <option-id>     select (or toggle) an option on the current question");
    eprintln!("  n | p | g <i>   next, previous, go to question i (1-based)");
    eprintln!("  hide | show     simulate leaving or returning to the page");
    eprintln!("  dismiss         hide the security message");
    eprintln!("  submit          submit the assessment");
    eprintln!("  quit            leave without submitting");
}

struct Args {
    catalog: PathBuf,
    course_id: CourseId,
    module_id: ModuleId,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Option<Self>, ArgsError> {
        let mut catalog = std::env::var("PROCTOR_CATALOG").ok();
        let mut course = std::env::var("PROCTOR_COURSE_ID").ok();
        let mut module = std::env::var("PROCTOR_MODULE_ID").ok();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--catalog" => catalog = Some(require_value(args, "--catalog")?),
                "--course" => course = Some(require_value(args, "--course")?),
                "--module" => module = Some(require_value(args, "--module")?),
                "--help" | "-h" => return Ok(None),
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        let catalog = catalog.filter(|c| !c.trim().is_empty()).ok_or(ArgsError::Missing {
            flag: "--catalog",
            env: "PROCTOR_CATALOG",
        })?;
        let course = course.ok_or(ArgsError::Missing {
            flag: "--course",
            env: "PROCTOR_COURSE_ID",
        })?;
        let module = module.ok_or(ArgsError::Missing {
            flag: "--module",
            env: "PROCTOR_MODULE_ID",
        })?;

        Ok(Some(Self {
            catalog: PathBuf::from(catalog),
            course_id: course.parse().map_err(|_| ArgsError::InvalidId {
                flag: "--course",
                raw: course.clone(),
            })?,
            module_id: module.parse().map_err(|_| ArgsError::InvalidId {
                flag: "--module",
                raw: module.clone(),
            })?,
        }))
    }
}

fn render(snapshot: &SessionSnapshot) {
    println!();
    println!(
        "[{}] question {}/{}  answered {}/{}",
        snapshot.countdown,
        snapshot.current_index + 1,
        snapshot.progress.total,
        snapshot.progress.answered,
        snapshot.progress.total,
    );
    if let Some(question) = &snapshot.current_question {
        println!("{} ({}, {} pts)", question.text(), question.kind(), question.points());
        for option in question.options() {
            println!("  {}) {}", option.id, option.text);
        }
    }
    if let Some(answer) = &snapshot.current_answer {
        println!("current answer: {answer:?}");
    }
    if let Some(message) = snapshot.security.message().filter(|m| m.visible) {
        println!("!! {}", message.text);
    }
}

/// Apply one stdin command. Returns `false` when the user quits.
async fn apply(
    controller: &SessionController,
    visibility: &VisibilitySender,
    line: &str,
) -> Result<bool, Box<dyn std::error::Error>> {
    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        return Ok(true);
    };

    let outcome = match command {
        "quit" | "q" => return Ok(false),
        "n" => controller.next().map(drop),
        "p" => controller.previous().map(drop),
        "g" => {
            let index = words
                .next()
                .and_then(|raw| raw.parse::<usize>().ok())
                .unwrap_or(1);
            controller.go_to(index.saturating_sub(1)).map(drop)
        }
        "hide" => {
            visibility.send(PageVisibility::Hidden)?;
            Ok(())
        }
        "show" => {
            visibility.send(PageVisibility::Visible)?;
            Ok(())
        }
        "dismiss" => {
            controller.dismiss_security_message();
            Ok(())
        }
        "submit" => controller.submit().await.map(|completion| {
            if let Err(err) = completion.report {
                eprintln!("result could not be reported: {err}");
            }
        }),
        option => {
            let snapshot = controller.snapshot()?;
            match snapshot.current_question {
                Some(question) => controller
                    .answer(question.id(), &OptionId::new(option))
                    .map(drop),
                None => Ok(()),
            }
        }
    };

    if let Err(err) = outcome {
        eprintln!("{err}");
    }
    Ok(true)
}

fn print_result(result: &SessionResult) -> Result<(), Box<dyn std::error::Error>> {
    println!();
    println!(
        "Finished ({:?}): {}% ({} / {} points) in {}s, {}",
        result.reason,
        result.score_percent,
        result.earned_points,
        result.total_points,
        result.seconds_used,
        if result.passed { "passed" } else { "not passed" },
    );
    let outcome = AssessmentOutcome::from(result);
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv = std::env::args().skip(1);
    let Some(args) = Args::parse(&mut argv).inspect_err(|_| print_usage())? else {
        print_usage();
        return Ok(());
    };

    let (storage, _repo) = Storage::from_catalog(&args.catalog)?;
    info!(catalog = %args.catalog.display(), "catalog loaded");

    let launcher = AssessmentLauncher::new(Clock::default(), &storage);
    let (visibility, receiver) = visibility_channel();
    let controller = launcher
        .launch(
            args.course_id,
            args.module_id,
            ProctorSources::default().with_visibility(receiver),
        )
        .await?;

    let mut phases = controller.subscribe_phase();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    render(&controller.snapshot()?);

    loop {
        tokio::select! {
            changed = phases.changed() => {
                if changed.is_err() || *phases.borrow_and_update() == SessionPhase::Finished {
                    break;
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                if !apply(&controller, &visibility, line.trim()).await? {
                    break;
                }
                if controller.phase() == SessionPhase::Active {
                    render(&controller.snapshot()?);
                }
            }
        }
    }

    if controller.phase() == SessionPhase::Active {
        controller.teardown().await;
        println!("Left without submitting.");
        return Ok(());
    }

    let result = controller.finished().await?;
    print_result(&result)
}

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
