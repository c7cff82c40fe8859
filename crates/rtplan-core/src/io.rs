//! JSON input and output for the engine's data model.

use crate::common::MachineProfileError;
use crate::domain::{Plan, PlanError, PlanResult, Structure, validate_plan};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum InputLoadError {
    #[error("failed to read {kind} '{}': {source}", path.display())]
    Read {
        kind: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {kind} '{}': {source}", path.display())]
    Parse {
        kind: &'static str,
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl From<InputLoadError> for PlanError {
    fn from(error: InputLoadError) -> Self {
        match &error {
            InputLoadError::Read { .. } => PlanError::io_system("IO.INPUT_READ", error.to_string()),
            InputLoadError::Parse { .. } => {
                PlanError::input_validation("INPUT.JSON_PARSE", error.to_string())
            }
        }
    }
}

impl From<MachineProfileError> for PlanError {
    fn from(error: MachineProfileError) -> Self {
        match &error {
            MachineProfileError::Read { .. } => {
                PlanError::io_system("IO.MACHINE_PROFILE", error.to_string())
            }
            _ => PlanError::input_validation("INPUT.MACHINE_PROFILE", error.to_string()),
        }
    }
}

fn load_json<T: DeserializeOwned>(kind: &'static str, path: &Path) -> Result<T, InputLoadError> {
    let source = fs::read_to_string(path).map_err(|source| InputLoadError::Read {
        kind,
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&source).map_err(|source| InputLoadError::Parse {
        kind,
        path: path.to_path_buf(),
        source,
    })
}

/// Reads a plan and rejects it if it is structurally invalid.
pub fn load_plan(path: impl AsRef<Path>) -> PlanResult<Plan> {
    let plan: Plan = load_json("plan", path.as_ref())?;
    validate_plan(&plan)?;
    Ok(plan)
}

pub fn load_structure(path: impl AsRef<Path>) -> PlanResult<Structure> {
    Ok(load_json("structure", path.as_ref())?)
}

pub fn metrics_to_json<T: Serialize>(metrics: &T, pretty: bool) -> PlanResult<String> {
    let rendered = if pretty {
        serde_json::to_string_pretty(metrics)
    } else {
        serde_json::to_string(metrics)
    };
    rendered.map_err(|error| {
        PlanError::internal(
            "RUN.SERIALIZE",
            format!("failed to serialize metrics: {error}"),
        )
    })
}

pub fn write_metrics<T: Serialize>(path: impl AsRef<Path>, metrics: &T) -> PlanResult<()> {
    let path = path.as_ref();
    let mut rendered = metrics_to_json(metrics, true)?;
    rendered.push('\n');
    fs::write(path, rendered).map_err(|source| {
        PlanError::io_system(
            "IO.OUTPUT_WRITE",
            format!("failed to write '{}': {}", path.display(), source),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::{load_plan, load_structure, metrics_to_json, write_metrics};
    use crate::domain::PlanErrorCategory;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn missing_plan_is_an_io_error() {
        let temp = TempDir::new().expect("tempdir should be created");
        let error = load_plan(temp.path().join("plan.json")).expect_err("missing plan should fail");
        assert_eq!(error.category(), PlanErrorCategory::IoSystemError);
        assert_eq!(error.placeholder(), "IO.INPUT_READ");
        assert_eq!(error.exit_code(), 3);
    }

    #[test]
    fn malformed_json_is_an_input_error() {
        let temp = TempDir::new().expect("tempdir should be created");
        let path = temp.path().join("plan.json");
        fs::write(&path, "{ \"beams\": [ }").expect("plan should be written");

        let error = load_plan(&path).expect_err("malformed plan should fail");
        assert_eq!(error.category(), PlanErrorCategory::InputValidationError);
        assert!(error.message().contains("plan.json"));
    }

    #[test]
    fn plans_are_validated_after_parsing() {
        let temp = TempDir::new().expect("tempdir should be created");
        let path = temp.path().join("plan.json");
        fs::write(
            &path,
            r#"{ "label": "p", "beams": [{ "number": 4, "controlPoints": [] }] }"#,
        )
        .expect("plan should be written");

        let error = load_plan(&path).expect_err("beam without control points should fail");
        assert_eq!(error.placeholder(), "INPUT.BEAM_CONTROL_POINTS");
    }

    #[test]
    fn structure_round_trips_through_disk() {
        let temp = TempDir::new().expect("tempdir should be created");
        let path = temp.path().join("ptv.json");
        fs::write(
            &path,
            r#"{ "name": "PTV", "contours": [{ "points": [[0, 0, 0], [1, 0, 0], [1, 1, 0]] }] }"#,
        )
        .expect("structure should be written");

        let structure = load_structure(&path).expect("structure should load");
        assert_eq!(structure.name, "PTV");
        assert_eq!(structure.point_count(), 3);

        let output = temp.path().join("out.json");
        write_metrics(&output, &structure).expect("output should be written");
        let written = fs::read_to_string(&output).expect("output should be readable");
        assert!(written.ends_with('\n'));
        assert_eq!(
            metrics_to_json(&structure, false).expect("compact json"),
            serde_json::to_string(&structure).expect("reference json")
        );
    }
}
