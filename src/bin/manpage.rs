use clap::CommandFactory;
use std::fs;
use std::io;
use std::path::PathBuf;

/// Writes upswatch(1) and one page per subcommand into `man/`, or the
/// directory given as the first argument.
fn main() -> io::Result<()> {
    let man_dir = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("man"));
    fs::create_dir_all(&man_dir)?;

    clap_mangen::generate_to(upswatch::cli::Cli::command(), &man_dir)?;

    let mut pages: Vec<_> = fs::read_dir(&man_dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .collect();
    pages.sort();
    for page in pages {
        println!("Generated {}", page.display());
    }

    Ok(())
}
