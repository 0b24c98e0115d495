fn main() {
    if let Err(err) = centinela::cli::run() {
        centinela::ui::eprintln_error(&err);
        std::process::exit(centinela::exit::exit_code(&err));
    }
}
