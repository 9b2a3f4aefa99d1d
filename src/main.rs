fn main() {
    if let Err(err) = captcha_solver_lib::run() {
        eprintln!("error: {err:#}");
        eprintln!("{}", captcha_solver_lib::commands::USAGE);
        std::process::exit(1);
    }
}
