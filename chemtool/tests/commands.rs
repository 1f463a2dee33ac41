use std::path::Path;

use chemconfig::{data::ConfigModel, prefs::Preferences};
use chemtool::{cli::Cli, commands::ConfigHandler};
use clap::Parser;
use serde_json::json;

fn run(dir: &Path, args: &[&str]) -> anyhow::Result<()> {
    let prefs = dir.join("prefs.toml");
    let mut argv = vec!["chemtool", "--prefs", prefs.to_str().unwrap()];
    argv.extend_from_slice(args);
    let cli = Cli::parse_from(argv);
    let mut handler = ConfigHandler::new(&cli)?;
    handler.handle(cli.command)
}

fn load(path: &Path) -> ConfigModel {
    let mut model = ConfigModel::builtin().unwrap();
    model.load(Some(path)).unwrap();
    model
}

#[test]
fn new_then_edit_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("h2.txt");
    let input_arg = input.to_str().unwrap();

    run(dir.path(), &["new", input_arg]).unwrap();
    assert!(run(dir.path(), &["new", input_arg]).is_err());

    run(dir.path(), &["set", input_arg, "backend", "shots", "2048"]).unwrap();
    run(
        dir.path(),
        &["set", input_arg, "algorithm", "name", "ExactEigensolver"],
    )
    .unwrap();

    let model = load(&input);
    assert_eq!(model.section_property("backend", "shots"), Some(&json!(2048)));
    assert_eq!(
        serde_json::Value::Object(model.section_properties("algorithm")),
        json!({"name": "ExactEigensolver", "k": 1})
    );

    let prefs = Preferences::load(dir.path().join("prefs.toml")).unwrap();
    assert_eq!(prefs.recent_files.first(), Some(&input));
}

#[test]
fn rejected_edit_leaves_file_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("h2.txt");
    let input_arg = input.to_str().unwrap();
    run(dir.path(), &["new", input_arg]).unwrap();
    let before = std::fs::read_to_string(&input).unwrap();

    assert!(run(dir.path(), &["set", input_arg, "backend", "shots", "many"]).is_err());
    assert!(run(dir.path(), &["set", input_arg, "backend", "color", "red"]).is_err());
    assert!(run(dir.path(), &["set", input_arg, "algorithm", "name", "Grover"]).is_err());
    assert_eq!(std::fs::read_to_string(&input).unwrap(), before);
}

#[test]
fn output_option_writes_elsewhere() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("h2.txt");
    let output = dir.path().join("h2.json");
    run(dir.path(), &["new", input.to_str().unwrap()]).unwrap();
    let before = std::fs::read_to_string(&input).unwrap();

    run(
        dir.path(),
        &[
            "text",
            input.to_str().unwrap(),
            "psi4",
            "--set",
            "molecule h2 {\n  H 0 0 0\n  H 0 0 0.7\n}",
            "-o",
            output.to_str().unwrap(),
        ],
    )
    .unwrap();

    assert_eq!(std::fs::read_to_string(&input).unwrap(), before);
    let model = load(&output);
    assert_eq!(
        model.section_text("psi4"),
        "molecule h2 {\n  H 0 0 0\n  H 0 0 0.7\n}"
    );
}

#[test]
fn section_commands_and_export() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("h2.txt");
    let input_arg = input.to_str().unwrap();
    run(dir.path(), &["new", input_arg]).unwrap();

    run(dir.path(), &["remove-section", input_arg, "optimizer"]).unwrap();
    // loading merges the dependency back in
    assert!(load(&input).section("optimizer").is_some());

    run(dir.path(), &["set", input_arg, "initial_state", "name", "HartreeFock"]).unwrap();
    run(
        dir.path(),
        &["set", input_arg, "operator", "qubit_mapping", "jordan_wigner"],
    )
    .unwrap();
    run(dir.path(), &["substitute", input_arg]).unwrap();
    assert_eq!(
        load(&input).section_property("initial_state", "qubit_mapping"),
        Some(&json!("jordan_wigner"))
    );

    run(dir.path(), &["validate", input_arg]).unwrap();
    run(dir.path(), &["show", input_arg]).unwrap();
    run(dir.path(), &["choices", input_arg, "algorithm"]).unwrap();
    assert!(run(dir.path(), &["choices", input_arg, "backend"]).is_err());
    assert!(run(dir.path(), &["show", input_arg, "missing"]).is_err());

    let out = dir.path().join("dict.json");
    run(dir.path(), &["export", input_arg, out.to_str().unwrap()]).unwrap();
    let dict: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(dict["operator"]["qubit_mapping"], json!("jordan_wigner"));
}

#[test]
fn prefs_command_updates_file() {
    let dir = tempfile::tempdir().unwrap();
    run(dir.path(), &["prefs", "--populate-defaults", "false"]).unwrap();
    let prefs = Preferences::load(dir.path().join("prefs.toml")).unwrap();
    assert!(!prefs.populate_defaults);

    run(dir.path(), &["prefs", "--json-schema"]).unwrap();
}
