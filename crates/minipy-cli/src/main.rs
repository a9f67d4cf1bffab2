use std::{env, fs, process::ExitCode, time::Instant};

use minipy::{NoopTracer, Program, ResourceLimits, Runner, StderrTracer};

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();
    let mut file_path: Option<&str> = None;
    let mut trace = false;
    for arg in &args[1..] {
        match arg.as_str() {
            "--trace" => trace = true,
            "--help" | "-h" => {
                print_usage();
                return ExitCode::SUCCESS;
            }
            path if file_path.is_none() => file_path = Some(path),
            unexpected => {
                eprintln!("error: unexpected argument '{unexpected}'");
                print_usage();
                return ExitCode::FAILURE;
            }
        }
    }
    let Some(file_path) = file_path else {
        print_usage();
        return ExitCode::FAILURE;
    };

    let program = match read_program(file_path) {
        Ok(program) => program,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };
    let runner = Runner::new(program);

    let start = Instant::now();
    let result = if trace {
        runner.run_with(vec![], ResourceLimits::default(), &mut StderrTracer::new())
    } else {
        runner.run_with(vec![], ResourceLimits::default(), &mut NoopTracer)
    };
    let elapsed = start.elapsed();

    match result {
        Ok(value) => {
            eprintln!("success after: {elapsed:?}");
            println!("{value}");
            ExitCode::SUCCESS
        }
        Err(fault) => {
            eprintln!("error after: {elapsed:?}\n{fault}");
            ExitCode::FAILURE
        }
    }
}

fn print_usage() {
    eprintln!("usage: minipy-cli <program.json | program.bin> [--trace]");
    eprintln!();
    eprintln!("Runs a serialized minipy program: JSON from Program::to_json,");
    eprintln!("or the binary format from Program::dump / Runner::dump.");
}

/// Loads a program from a JSON or binary dump, chosen by file extension.
fn read_program(file_path: &str) -> Result<Program, String> {
    let metadata = fs::metadata(file_path).map_err(|err| format!("cannot read {file_path}: {err}"))?;
    if !metadata.is_file() {
        return Err(format!("{file_path} is not a file"));
    }

    if file_path.ends_with(".json") {
        let json = fs::read_to_string(file_path).map_err(|err| format!("cannot read {file_path}: {err}"))?;
        Program::from_json(&json).map_err(|err| format!("invalid program JSON: {err}"))
    } else {
        let bytes = fs::read(file_path).map_err(|err| format!("cannot read {file_path}: {err}"))?;
        Program::load(&bytes).map_err(|err| format!("invalid program dump: {err}"))
    }
}
