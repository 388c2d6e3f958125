//! Binary entry point: wires up logging and hands off to the CLI surface.

fn main() {
    tracing_subscriber::fmt().with_thread_ids(true).init();

    let code = sentinel::cli::run(std::env::args().collect());
    std::process::exit(code);
}
