use colored::Colorize;

mod cli;

fn main() {
    if let Err(err) = cli::run() {
        eprintln!("{} {}", "error:".red().bold(), err);
        std::process::exit(1);
    }
}
