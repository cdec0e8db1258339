use std::process::ExitCode;

fn main() -> ExitCode {
    match batch_ckpt_merge::app::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::from(err.exit_code())
        }
    }
}
