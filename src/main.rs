fn main() {
    if let Err(error) = cmdgate::cli::run_cli() {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}
