use super::CliError;
use anyhow::Context;
use rtplan_core::common::{MachineProfile, load_machine_profile};
use rtplan_core::domain::{Plan, PlanError, Structure};
use rtplan_core::io::{load_plan, load_structure, write_metrics};
use rtplan_core::metrics::{BeamMetrics, PlanMetrics, calculate_beam_metrics, calculate_plan_metrics};
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;
use tracing::info;

#[derive(clap::Args)]
pub(super) struct InputArgs {
    /// Plan JSON path
    #[arg(long)]
    plan: PathBuf,

    /// Target structure JSON path, enables aperture modulation
    #[arg(long)]
    structure: Option<PathBuf>,

    /// Machine profile JSON path, defaults to the reference linac
    #[arg(long)]
    machine: Option<PathBuf>,

    /// Write metrics JSON here instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,

    /// Keep per-control-point detail in the output
    #[arg(long)]
    include_control_points: bool,
}

#[derive(clap::Args)]
pub(super) struct MetricsArgs {
    #[command(flatten)]
    input: InputArgs,
}

#[derive(clap::Args)]
pub(super) struct BeamArgs {
    /// Beam number to report
    #[arg(long = "beam")]
    beam_number: i32,

    #[command(flatten)]
    input: InputArgs,
}

struct LoadedInputs {
    plan: Plan,
    structure: Option<Structure>,
    profile: MachineProfile,
}

fn load_inputs(input: &InputArgs) -> Result<LoadedInputs, PlanError> {
    let plan = load_plan(&input.plan)?;
    let structure = input.structure.as_ref().map(load_structure).transpose()?;
    let profile = match &input.machine {
        Some(path) => load_machine_profile(path)?,
        None => MachineProfile::default(),
    };

    info!(
        plan = %plan.label,
        beams = plan.beams.len(),
        with_structure = structure.is_some(),
        "loaded plan"
    );
    Ok(LoadedInputs {
        plan,
        structure,
        profile,
    })
}

fn emit<T: Serialize>(input: &InputArgs, metrics: &T, summary: &str) -> Result<(), CliError> {
    match &input.output {
        Some(path) => {
            write_metrics(path, metrics)?;
            println!("{summary}");
            println!("Metrics written to {}", path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            serde_json::to_writer_pretty(&mut stdout, metrics)
                .context("failed to write metrics JSON to stdout")?;
            writeln!(stdout).context("failed to write metrics JSON to stdout")?;
        }
    }
    Ok(())
}

pub(super) fn run_metrics_command(args: MetricsArgs) -> Result<i32, CliError> {
    let input = args.input;
    let loaded = load_inputs(&input)?;
    let mut metrics =
        calculate_plan_metrics(&loaded.plan, &loaded.profile, loaded.structure.as_ref());
    if !input.include_control_points {
        metrics = metrics.without_control_points();
    }

    emit(&input, &metrics, &plan_summary(&metrics))?;
    Ok(0)
}

pub(super) fn run_beam_command(args: BeamArgs) -> Result<i32, CliError> {
    let input = args.input;
    let loaded = load_inputs(&input)?;
    let beam = loaded
        .plan
        .beams
        .iter()
        .find(|beam| beam.number == args.beam_number)
        .ok_or_else(|| {
            let available: Vec<String> = loaded
                .plan
                .beams
                .iter()
                .map(|beam| beam.number.to_string())
                .collect();
            PlanError::input_validation(
                "INPUT.BEAM_NUMBER",
                format!(
                    "beam {} is not in plan '{}' (available: {})",
                    args.beam_number,
                    loaded.plan.label,
                    available.join(", ")
                ),
            )
        })?;

    let mut metrics = calculate_beam_metrics(beam, &loaded.profile, loaded.structure.as_ref());
    if !input.include_control_points {
        metrics.control_point_metrics.clear();
    }

    emit(&input, &metrics, &beam_summary(&metrics))?;
    Ok(0)
}

fn plan_summary(metrics: &PlanMetrics) -> String {
    let time = metrics
        .total_delivery_time
        .map_or_else(|| "n/a".to_string(), |seconds| format!("{seconds:.1} s"));
    format!(
        "Plan '{}': {} beam(s), {:.1} MU, MCS {:.4}, delivery {}",
        metrics.plan_label,
        metrics.beam_metrics.len(),
        metrics.total_mu,
        metrics.mcs,
        time
    )
}

fn beam_summary(metrics: &BeamMetrics) -> String {
    let mcs = metrics
        .mcs
        .map_or_else(|| "n/a".to_string(), |mcs| format!("{mcs:.4}"));
    format!(
        "Beam {} '{}': {} control point(s), {:.1} MU, MCS {}, delivery {:.1} s",
        metrics.beam_number,
        metrics.beam_name,
        metrics.number_of_control_points,
        metrics.beam_mu,
        mcs,
        metrics.estimated_delivery_time
    )
}
