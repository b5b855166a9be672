//! `run-job` mode: run exactly one job and exit.
//!
//! Both binaries check their arguments for this mode before doing anything
//! else, which lets [`ProcessLauncher`](crate::launcher::ProcessLauncher)
//! re-execute them as job children.

use mpc_core::job::JobName;
use mpc_core::kind::EntityKind;
use mpc_core::status::ErrorLevel;

use crate::context::JobContext;
use crate::table::{execute, JobArgs, JobOutcome, JobRequest};

pub const RUN_JOB_COMMAND: &str = "run-job";

/// Exit codes of a child that ran its job. The outcome is also recorded in
/// the entity's status.
pub const EXIT_SUCCEEDED: i32 = 0;
pub const EXIT_SKIPPED: i32 = 10;
pub const EXIT_FAILED_WARNING: i32 = 11;
pub const EXIT_FAILED_ERROR: i32 = 12;
/// Exit code when the entity could not be loaded.
pub const EXIT_ENTITY_UNAVAILABLE: i32 = 3;
/// Exit code for malformed arguments or a failed bootstrap.
pub const EXIT_USAGE: i32 = 64;

pub fn exit_code(outcome: JobOutcome) -> i32 {
    match outcome {
        JobOutcome::Succeeded => EXIT_SUCCEEDED,
        JobOutcome::Skipped => EXIT_SKIPPED,
        JobOutcome::Failed(ErrorLevel::Error) => EXIT_FAILED_ERROR,
        JobOutcome::Failed(_) => EXIT_FAILED_WARNING,
        JobOutcome::EntityUnavailable => EXIT_ENTITY_UNAVAILABLE,
    }
}

/// Inverse of [`exit_code`]. `None` for codes a job child never exits with
/// on its own (usage errors, crashes).
pub fn outcome_from_exit(code: i32) -> Option<JobOutcome> {
    match code {
        EXIT_SUCCEEDED => Some(JobOutcome::Succeeded),
        EXIT_SKIPPED => Some(JobOutcome::Skipped),
        EXIT_FAILED_WARNING => Some(JobOutcome::Failed(ErrorLevel::Warning)),
        EXIT_FAILED_ERROR => Some(JobOutcome::Failed(ErrorLevel::Error)),
        EXIT_ENTITY_UNAVAILABLE => Some(JobOutcome::EntityUnavailable),
        _ => None,
    }
}

pub fn request_to_args(request: &JobRequest) -> Vec<String> {
    let mut args = vec![
        request.name.as_str().to_string(),
        request.entity_id.clone(),
        request.kind.as_str().to_string(),
    ];
    if request.name == JobName::Heartbeat {
        args.push(request.args.beat.to_string());
    }
    args
}

/// Parse the arguments following `run-job`.
pub fn parse_args(args: &[String]) -> Result<JobRequest, String> {
    let [name, entity_id, kind, rest @ ..] = args else {
        return Err("usage: run-job <job_name> <entity_id> <kind> [beat]".into());
    };
    let name = JobName::from_name(name).ok_or_else(|| format!("unknown job `{name}`"))?;
    let kind = EntityKind::from_name(kind).ok_or_else(|| format!("unknown kind `{kind}`"))?;
    let beat = match rest {
        [] => false,
        [beat] => beat
            .parse()
            .map_err(|_| format!("beat must be `true` or `false`, got `{beat}`"))?,
        _ => return Err("too many arguments".into()),
    };
    Ok(JobRequest::new(name, entity_id.clone(), kind).with_args(JobArgs { beat }))
}

/// If `argv` selects `run-job` mode, return the arguments after the command.
pub fn child_args(argv: &[String]) -> Option<&[String]> {
    match argv {
        [_, command, rest @ ..] if command == RUN_JOB_COMMAND => Some(rest),
        _ => None,
    }
}

/// Run one job from `run-job` arguments and return the process exit code.
pub async fn run_from_args(args: &[String]) -> i32 {
    let request = match parse_args(args) {
        Ok(request) => request,
        Err(e) => {
            tracing::error!(error = %e, "Invalid run-job arguments");
            return EXIT_USAGE;
        }
    };

    let ctx = match JobContext::from_env().await {
        Ok(ctx) => ctx,
        Err(e) => {
            tracing::error!(error = %e, "Failed to build job context");
            return EXIT_USAGE;
        }
    };

    exit_code(execute(&ctx, &request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn args_round_trip() {
        let request = JobRequest::new(JobName::Heartbeat, "12", EntityKind::Ems)
            .with_args(JobArgs { beat: true });
        assert_eq!(parse_args(&request_to_args(&request)).unwrap(), request);
    }

    #[test]
    fn unknown_job_is_rejected() {
        let err = parse_args(&strings(&["explode", "1", "ems"])).unwrap_err();
        assert!(err.contains("explode"));
    }

    #[test]
    fn missing_arguments_are_rejected() {
        assert!(parse_args(&strings(&["predict", "1"])).is_err());
    }

    #[test]
    fn exit_codes_carry_the_outcome() {
        for outcome in [
            JobOutcome::Succeeded,
            JobOutcome::Skipped,
            JobOutcome::Failed(ErrorLevel::Warning),
            JobOutcome::Failed(ErrorLevel::Error),
            JobOutcome::EntityUnavailable,
        ] {
            assert_eq!(outcome_from_exit(exit_code(outcome)), Some(outcome));
        }
        assert_eq!(outcome_from_exit(EXIT_USAGE), None);
        assert_eq!(outcome_from_exit(1), None);
    }

    #[test]
    fn child_mode_is_detected_from_argv() {
        let argv = strings(&["mpc-worker", "run-job", "predict", "1", "ems"]);
        assert_eq!(child_args(&argv), Some(&argv[2..]));
        assert_eq!(child_args(&strings(&["mpc-worker"])), None);
    }
}
