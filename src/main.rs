use colored::Colorize;
use rbind::cli;

fn main() {
    if let Err(e) = cli::run() {
        // Diagnostics for generation failures were already printed.
        if e.to_string() != cli::GENERATION_FAILED {
            eprintln!("{} {e:?}", "error:".red().bold());
        }
        std::process::exit(1);
    }
}
