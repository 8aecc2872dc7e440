use std::process::ExitCode;

fn main() -> ExitCode {
    jsh::lib_main()
}
