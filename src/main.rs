use std::fs;
use std::io::{self, Read, Write};

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use diff_carve::{
    CarveError, MultiFilePatch, build_multi_file_patch, format_patches, parse_diffs,
    parse_file_refs, resolve_rows,
};

#[derive(Parser)]
#[command(name = "diff-carve")]
#[command(about = "Carve stage/unstage patches out of unified diffs by line selection")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show a diff with explicit line numbers for selector use
    Show {
        /// Diff file to read, or '-' for stdin
        #[arg(default_value = "-")]
        diff: String,
    },
    /// Print the patch staging the selected lines (pipe into `git apply --cached`)
    Stage {
        /// File and line references (e.g. "flake.nix:137" or "flake.nix:10..15,-20")
        file_refs: Vec<String>,
        /// Diff file to read, or '-' for stdin
        #[arg(long, default_value = "-")]
        diff: String,
    },
    /// Print the patch unstaging the selected lines (pipe into `git apply --cached`)
    Unstage {
        /// File and line references against the staged diff
        file_refs: Vec<String>,
        /// Diff file to read, or '-' for stdin
        #[arg(long, default_value = "-")]
        diff: String,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
    /// Generate a man page
    #[command(hide = true)]
    Man,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Show { diff } => {
            let patches = read_patches(&diff)?;
            println!("{}", format_patches(&patches));
        }
        Commands::Stage { file_refs, diff } => {
            let patches = read_patches(&diff)?;
            let rows = resolve_all(&patches, &file_refs)?;
            print!("{}", patches.stage_patch_for_lines(&rows));
        }
        Commands::Unstage { file_refs, diff } => {
            let patches = read_patches(&diff)?;
            let rows = resolve_all(&patches, &file_refs)?;
            print!("{}", patches.unstage_patch_for_lines(&rows));
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            let name = command.get_name().to_string();
            clap_complete::generate(shell, &mut command, name, &mut io::stdout());
        }
        Commands::Man => {
            let man = clap_mangen::Man::new(Cli::command());
            let mut rendered = Vec::new();
            man.render(&mut rendered)?;
            io::stdout().write_all(&rendered)?;
        }
    }

    Ok(())
}

fn read_patches(source: &str) -> Result<MultiFilePatch, Box<dyn std::error::Error>> {
    let text = if source == "-" {
        let mut text = String::new();
        io::stdin().read_to_string(&mut text)?;
        text
    } else {
        fs::read_to_string(source)?
    };
    Ok(build_multi_file_patch(&parse_diffs(&text)?)?)
}

fn resolve_all(
    patches: &MultiFilePatch,
    file_refs: &[String],
) -> Result<std::collections::BTreeSet<usize>, CarveError> {
    let mut rows = std::collections::BTreeSet::new();
    for file_ref in file_refs {
        let refs = parse_file_refs(file_ref)?;
        rows.extend(resolve_rows(patches, &refs)?);
    }
    Ok(rows)
}
