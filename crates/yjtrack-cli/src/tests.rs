use clap::Parser;

use super::*;

#[test]
fn parses_run_all() {
    let cli = Cli::try_parse_from(["yjtrack", "run"]).expect("expected valid cli args");
    assert!(matches!(
        cli.command,
        Some(Commands::Run {
            task: None,
            dry_run: false
        })
    ));
}

#[test]
fn parses_run_single_task_with_dry_run() {
    let cli = Cli::try_parse_from(["yjtrack", "run", "detention-census", "--dry-run"])
        .expect("expected valid cli args");
    match cli.command {
        Some(Commands::Run { task, dry_run }) => {
            assert_eq!(task.as_deref(), Some("detention-census"));
            assert!(dry_run);
        }
        other => panic!("expected run command, got: {other:?}"),
    }
}

#[test]
fn parses_health_command() {
    let cli = Cli::try_parse_from(["yjtrack", "health"]).expect("expected valid cli args");
    assert!(matches!(cli.command, Some(Commands::Health)));
}

#[test]
fn parses_runs_with_limit() {
    let cli =
        Cli::try_parse_from(["yjtrack", "runs", "--limit", "5"]).expect("expected valid cli args");
    assert!(matches!(cli.command, Some(Commands::Runs { limit: 5 })));
}

#[test]
fn runs_limit_defaults_to_twenty() {
    let cli = Cli::try_parse_from(["yjtrack", "runs"]).expect("expected valid cli args");
    assert!(matches!(cli.command, Some(Commands::Runs { limit: 20 })));
}

#[test]
fn parses_alerts_all() {
    let cli = Cli::try_parse_from(["yjtrack", "alerts", "--all"]).expect("expected valid cli args");
    assert!(matches!(cli.command, Some(Commands::Alerts { all: true })));
}

#[test]
fn parses_db_migrate_command() {
    let cli = Cli::try_parse_from(["yjtrack", "db", "migrate"]).expect("expected valid cli args");
    assert!(matches!(
        cli.command,
        Some(Commands::Db {
            command: DbCommands::Migrate
        })
    ));
}

#[test]
fn parses_schedule_command() {
    let cli = Cli::try_parse_from(["yjtrack", "schedule"]).expect("expected valid cli args");
    assert!(matches!(cli.command, Some(Commands::Schedule)));
}

#[test]
fn no_command_is_none() {
    let cli = Cli::try_parse_from(["yjtrack"]).expect("expected valid cli args");
    assert!(cli.command.is_none());
}

#[test]
fn rejects_unknown_command() {
    assert!(Cli::try_parse_from(["yjtrack", "explode"]).is_err());
}
